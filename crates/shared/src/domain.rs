use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(SectionId);

impl SectionId {
    /// Fresh client-side identifier for a section that is about to be created.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseLabelError {
    pub kind: &'static str,
    pub value: String,
}

/// Pipe diameter used to water a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PipeType {
    Rura16mm,
    Rura25mm,
    Rura32mm,
}

impl PipeType {
    pub const ALL: [PipeType; 3] = [PipeType::Rura16mm, PipeType::Rura25mm, PipeType::Rura32mm];

    pub fn label(self) -> &'static str {
        match self {
            PipeType::Rura16mm => "Rura 16mm",
            PipeType::Rura25mm => "Rura 25mm",
            PipeType::Rura32mm => "Rura 32mm",
        }
    }

    pub fn diameter_mm(self) -> u32 {
        match self {
            PipeType::Rura16mm => 16,
            PipeType::Rura25mm => 25,
            PipeType::Rura32mm => 32,
        }
    }
}

impl fmt::Display for PipeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PipeType {
    type Err = ParseLabelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_lowercase();
        let digits = normalized
            .trim_start_matches("rura")
            .trim()
            .trim_end_matches("mm")
            .trim();

        PipeType::ALL
            .into_iter()
            .find(|pipe| digits == pipe.diameter_mm().to_string())
            .ok_or_else(|| ParseLabelError {
                kind: "pipe type",
                value: raw.to_string(),
            })
    }
}

impl TryFrom<String> for PipeType {
    type Error = ParseLabelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PipeType> for String {
    fn from(value: PipeType) -> Self {
        value.label().to_string()
    }
}

/// Weekday labels offered by the day selector, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Weekday {
    Pn,
    Wt,
    Sr,
    Cz,
    Pt,
    Sb,
    Nd,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Pn,
        Weekday::Wt,
        Weekday::Sr,
        Weekday::Cz,
        Weekday::Pt,
        Weekday::Sb,
        Weekday::Nd,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Weekday::Pn => "pn",
            Weekday::Wt => "wt",
            Weekday::Sr => "śr",
            Weekday::Cz => "cz",
            Weekday::Pt => "pt",
            Weekday::Sb => "sb",
            Weekday::Nd => "nd",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Weekday {
    type Err = ParseLabelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let label = raw.trim().to_lowercase();
        Weekday::ALL
            .into_iter()
            .find(|day| day.label() == label)
            .ok_or_else(|| ParseLabelError {
                kind: "weekday",
                value: raw.to_string(),
            })
    }
}

/// A watering zone. Field names on the wire follow the records already
/// stored in the realtime database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "Id")]
    pub id: SectionId,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "StartTime")]
    pub start_time: String,
    #[serde(rename = "Duration")]
    pub duration_minutes: u32,
    #[serde(rename = "SelectedDays", default)]
    pub selected_days: String,
    #[serde(rename = "WateringType")]
    pub watering_type: PipeType,
    #[serde(rename = "ElapsedTime", default)]
    pub elapsed_seconds: u64,
}

/// The five user-authored fields of a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionFields {
    pub name: String,
    pub start_time: String,
    pub duration_minutes: u32,
    pub selected_days: String,
    pub watering_type: PipeType,
}

impl Section {
    pub fn new(id: SectionId, fields: SectionFields) -> Self {
        Self {
            id,
            name: fields.name,
            start_time: fields.start_time,
            duration_minutes: fields.duration_minutes,
            selected_days: fields.selected_days,
            watering_type: fields.watering_type,
            elapsed_seconds: 0,
        }
    }

    /// Overwrites the authored fields; `id` and `elapsed_seconds` are kept.
    pub fn apply_fields(&mut self, fields: SectionFields) {
        self.name = fields.name;
        self.start_time = fields.start_time;
        self.duration_minutes = fields.duration_minutes;
        self.selected_days = fields.selected_days;
        self.watering_type = fields.watering_type;
    }
}
