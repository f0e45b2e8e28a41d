use shared::domain::{PipeType, SectionFields, Weekday};

use crate::{
    days::{DaySelector, DayState},
    error::SectionError,
};

/// Raw values typed into the "new section" form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionDraft {
    pub name: String,
    pub start_time: String,
    pub duration: String,
    pub pipe: Option<PipeType>,
}

#[derive(Debug, Clone, Default)]
pub struct SectionComposer {
    pub draft: SectionDraft,
    days: DaySelector,
}

impl SectionComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_day(&mut self, day: Weekday) -> DayState {
        self.days.toggle(day)
    }

    pub fn days(&self) -> &DaySelector {
        &self.days
    }

    /// Checks the draft and turns it into the fields of a new section.
    pub fn validated_fields(&self) -> Result<SectionFields, SectionError> {
        let draft = &self.draft;
        let mut missing = Vec::new();
        if is_blank(&draft.name) {
            missing.push("name");
        }
        if is_blank(&draft.start_time) {
            missing.push("start time");
        }
        if is_blank(&draft.duration) {
            missing.push("duration");
        }
        if draft.pipe.is_none() {
            missing.push("pipe type");
        }
        if !missing.is_empty() {
            return Err(SectionError::Validation(format!(
                "missing {}",
                missing.join(", ")
            )));
        }

        Ok(SectionFields {
            name: draft.name.trim().to_string(),
            start_time: draft.start_time.trim().to_string(),
            duration_minutes: parse_duration(&draft.duration)?,
            selected_days: self.days.joined(),
            watering_type: draft.pipe.ok_or_else(|| {
                SectionError::Validation("missing pipe type".to_string())
            })?,
        })
    }

    /// Empties the form after a section was saved.
    pub fn clear(&mut self) {
        self.draft = SectionDraft::default();
        self.days.reset();
    }
}

pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub(crate) fn parse_duration(raw: &str) -> Result<u32, SectionError> {
    raw.trim().parse::<u32>().map_err(|_| {
        SectionError::Validation(format!(
            "duration '{}' is not a whole number of minutes",
            raw.trim()
        ))
    })
}

pub(crate) fn parse_pipe(raw: &str) -> Result<PipeType, SectionError> {
    raw.parse::<PipeType>()
        .map_err(|err| SectionError::Validation(err.to_string()))
}
