use std::{collections::HashSet, sync::Arc};

use shared::{
    domain::{PipeType, Section, SectionFields, SectionId, UserId},
    error::ErrorReport,
};
use storage::SectionStore;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

pub mod compose;
pub mod days;
pub mod error;
pub mod interaction;
mod list;
pub mod realtime;
mod timers;

pub use compose::{SectionComposer, SectionDraft};
pub use days::{DaySelector, DayState};
pub use error::SectionError;
pub use interaction::{Interaction, SilentInteraction};
pub use list::{SectionList, TimerTransition};
pub use realtime::RealtimeDatabaseStore;
pub use timers::TICK_PERIOD;

use compose::{is_blank, parse_duration, parse_pipe};

const ALREADY_RUNNING_TITLE: &str = "Info";
const ALREADY_RUNNING_MESSAGE: &str = "The timer for this section is already running!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Loaded { count: usize },
    SectionAdded(Section),
    /// The entry at `index` was swapped for a new value.
    SectionReplaced { index: usize, section: Section },
    SectionRemoved { section_id: SectionId },
    TimerStarted { section_id: SectionId },
    TimerStopped { section_id: SectionId, elapsed_seconds: u64 },
    PersistFailed { section_id: SectionId, message: String },
    OperationFailed(ErrorReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditField {
    Name,
    StartTime,
    Duration,
    Days,
    Pipe,
}

impl EditField {
    fn label(self) -> &'static str {
        match self {
            EditField::Name => "name",
            EditField::StartTime => "start time",
            EditField::Duration => "duration",
            EditField::Days => "days",
            EditField::Pipe => "pipe type",
        }
    }

    fn title(self) -> &'static str {
        match self {
            EditField::Name => "Edit section",
            EditField::StartTime => "Edit start time",
            EditField::Duration => "Edit duration",
            EditField::Days => "Edit days",
            EditField::Pipe => "Edit pipe",
        }
    }

    fn message(self) -> String {
        match self {
            EditField::Name => "Enter the new section name:".to_string(),
            EditField::StartTime => "Enter the new start time (HH:mm):".to_string(),
            EditField::Duration => "Enter the new duration (minutes):".to_string(),
            EditField::Days => {
                "Enter the new weekdays separated by commas (e.g. pn, wt, śr):".to_string()
            }
            EditField::Pipe => {
                let diameters: Vec<_> = PipeType::ALL
                    .iter()
                    .map(|pipe| format!("{}mm", pipe.diameter_mm()))
                    .collect();
                format!("Enter the new pipe type ({}):", diameters.join(", "))
            }
        }
    }
}

/// One user's section session: the list worker plus the store and the
/// front-end dialogs the flows need.
///
/// Must be created inside a tokio runtime.
pub struct SectionsClient {
    user_id: UserId,
    store: Arc<dyn SectionStore>,
    interaction: Arc<dyn Interaction>,
    list: SectionList,
}

impl SectionsClient {
    pub fn new(
        user_id: UserId,
        store: Arc<dyn SectionStore>,
        interaction: Arc<dyn Interaction>,
    ) -> Self {
        let list = SectionList::spawn(user_id.clone(), Arc::clone(&store));
        Self {
            user_id,
            store,
            interaction,
            list,
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn sections(&self) -> Vec<Section> {
        self.list.snapshot()
    }

    pub fn section(&self, section_id: &SectionId) -> Option<Section> {
        self.list.find(section_id)
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<Vec<Section>> {
        self.list.subscribe_snapshots()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.list.subscribe_events()
    }

    /// Replaces the list with what the store holds for this user. Without a
    /// user this does nothing.
    pub async fn load(&self) -> Result<usize, SectionError> {
        if self.user_id.is_empty() {
            debug!("no user bound to the session; skipping section load");
            return Ok(0);
        }

        let sections = self
            .store
            .list_sections(&self.user_id)
            .await
            .map_err(SectionError::Io)?;
        let count = self.list.replace(sections).await?;
        info!(user_id = %self.user_id, count, "loaded sections");
        Ok(count)
    }

    /// Saves the composed section and, once stored, appends it to the list and
    /// clears the composer. A failed save leaves list and composer untouched.
    pub async fn add(&self, composer: &mut SectionComposer) -> Result<Section, SectionError> {
        if self.user_id.is_empty() {
            return Err(SectionError::Validation(
                "no user is bound to the session".to_string(),
            ));
        }
        let fields = composer.validated_fields()?;
        let section = Section::new(self.allocate_id(), fields);

        self.store
            .upsert_section(&self.user_id, &section)
            .await
            .map_err(SectionError::Io)?;
        self.list.append(section.clone()).await?;
        composer.clear();

        info!(section_id = %section.id, name = %section.name, "section added");
        Ok(section)
    }

    /// Asks for confirmation, halts a running timer, then removes the section
    /// from the store and the list. Returns `false` when the user declined.
    pub async fn delete(&self, section_id: &SectionId) -> Result<bool, SectionError> {
        let section = self
            .list
            .find(section_id)
            .ok_or_else(|| SectionError::NotFound(section_id.clone()))?;

        let confirmed = self
            .interaction
            .confirm(
                "Delete section",
                &format!(
                    "Are you sure you want to delete section \"{}\"?",
                    section.name
                ),
            )
            .await;
        if !confirmed {
            debug!(section_id = %section_id, "delete declined");
            return Ok(false);
        }

        // no tick may persist into the record once the store delete starts
        self.list.pause(section_id).await?;
        self.store
            .delete_section(&self.user_id, section_id)
            .await
            .map_err(SectionError::Io)?;
        self.list.remove(section_id).await?;

        info!(section_id = %section_id, "section deleted");
        Ok(true)
    }

    /// Prompts for all five authored fields, then saves them in one write.
    /// A blank answer or invalid value aborts before anything is written.
    pub async fn edit(&self, section_id: &SectionId) -> Result<Section, SectionError> {
        let current = self
            .list
            .find(section_id)
            .ok_or_else(|| SectionError::NotFound(section_id.clone()))?;

        let name = self.prompt_field(EditField::Name, &current.name).await?;
        let start_time = self
            .prompt_field(EditField::StartTime, &current.start_time)
            .await?;
        let duration = self
            .prompt_field(EditField::Duration, &current.duration_minutes.to_string())
            .await?;
        let selected_days = self
            .prompt_field(EditField::Days, &current.selected_days)
            .await?;
        let pipe = self
            .prompt_field(EditField::Pipe, current.watering_type.label())
            .await?;

        let fields = SectionFields {
            name,
            start_time,
            duration_minutes: parse_duration(&duration)?,
            selected_days,
            watering_type: parse_pipe(&pipe)?,
        };

        // the timer may have ticked while the prompts were open
        let mut updated = self
            .list
            .find(section_id)
            .ok_or_else(|| SectionError::NotFound(section_id.clone()))?;
        updated.apply_fields(fields.clone());
        self.store
            .upsert_section(&self.user_id, &updated)
            .await
            .map_err(SectionError::Io)?;

        let applied = self
            .list
            .update_fields(section_id, fields)
            .await?
            .ok_or_else(|| SectionError::NotFound(section_id.clone()))?;
        info!(section_id = %section_id, "section edited");
        Ok(applied)
    }

    async fn prompt_field(&self, field: EditField, initial: &str) -> Result<String, SectionError> {
        let answer = self
            .interaction
            .prompt_text(field.title(), &field.message(), initial)
            .await;
        match answer {
            Some(value) if !is_blank(&value) => Ok(value.trim().to_string()),
            _ => Err(SectionError::Cancelled {
                field: field.label(),
            }),
        }
    }

    /// Starts the section's timer. A second start only notifies the user.
    pub async fn start(&self, section_id: &SectionId) -> Result<TimerTransition, SectionError> {
        let transition = self
            .list
            .start(section_id)
            .await?
            .ok_or_else(|| SectionError::NotFound(section_id.clone()))?;

        if transition == TimerTransition::AlreadyRunning {
            self.interaction
                .notify(ALREADY_RUNNING_TITLE, ALREADY_RUNNING_MESSAGE)
                .await;
        }
        Ok(transition)
    }

    /// Halts a running timer keeping its count; when no timer is tracked for
    /// the section, zeroes the count instead.
    pub async fn stop(&self, section_id: &SectionId) -> Result<TimerTransition, SectionError> {
        let transition = self
            .list
            .stop(section_id)
            .await?
            .ok_or_else(|| SectionError::NotFound(section_id.clone()))?;
        self.persist_transition(section_id, transition).await?;
        Ok(transition)
    }

    /// Halts a running timer keeping its count. Idle sections are untouched.
    pub async fn pause(&self, section_id: &SectionId) -> Result<TimerTransition, SectionError> {
        let transition = self
            .list
            .pause(section_id)
            .await?
            .ok_or_else(|| SectionError::NotFound(section_id.clone()))?;
        self.persist_transition(section_id, transition).await?;
        Ok(transition)
    }

    /// Halts any running timer and sets the count back to zero.
    pub async fn reset(&self, section_id: &SectionId) -> Result<TimerTransition, SectionError> {
        let transition = self
            .list
            .reset(section_id)
            .await?
            .ok_or_else(|| SectionError::NotFound(section_id.clone()))?;
        self.persist_transition(section_id, transition).await?;
        Ok(transition)
    }

    /// Ids with a running timer, sorted.
    pub async fn running(&self) -> Result<Vec<SectionId>, SectionError> {
        self.list.running().await
    }

    async fn persist_transition(
        &self,
        section_id: &SectionId,
        transition: TimerTransition,
    ) -> Result<(), SectionError> {
        let elapsed_seconds = match transition {
            TimerTransition::Paused { elapsed_seconds } => elapsed_seconds,
            TimerTransition::Reset => 0,
            TimerTransition::Started
            | TimerTransition::AlreadyRunning
            | TimerTransition::AlreadyIdle { .. } => return Ok(()),
        };

        self.store
            .update_elapsed_time(&self.user_id, section_id, elapsed_seconds)
            .await
            .map_err(SectionError::Io)
    }

    /// Top-level handler for failed operations. Missing sections and
    /// abandoned edits stay silent; everything else is logged, published and
    /// shown to the user.
    pub async fn report(&self, err: &SectionError) {
        let report = err.report();
        if !report.code.is_user_visible() {
            debug!(code = ?report.code, error = %report.message, "section operation skipped");
            return;
        }

        warn!(code = ?report.code, error = %report.message, "section operation failed");
        self.list.publish(ClientEvent::OperationFailed(report.clone()));
        self.interaction.notify(err.title(), &report.message).await;
    }

    fn allocate_id(&self) -> SectionId {
        let existing: HashSet<SectionId> = self
            .list
            .snapshot()
            .into_iter()
            .map(|section| section.id)
            .collect();
        loop {
            let candidate = SectionId::generate();
            if !existing.contains(&candidate) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
