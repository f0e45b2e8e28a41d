//! Test doubles shared by the client_core test modules.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::{PipeType, Section, SectionFields, SectionId, UserId};
use storage::{MemoryStore, SectionStore};
use tokio::sync::Mutex;

use crate::{Interaction, SectionsClient};

pub(crate) fn user() -> UserId {
    UserId::new("user-1")
}

pub(crate) fn section(id: &str, name: &str) -> Section {
    Section::new(
        SectionId::new(id),
        SectionFields {
            name: name.to_string(),
            start_time: "06:00".to_string(),
            duration_minutes: 15,
            selected_days: "pn".to_string(),
            watering_type: PipeType::Rura16mm,
        },
    )
}

/// Memory store that counts calls and can be switched to fail.
#[derive(Default)]
pub(crate) struct RecordingStore {
    inner: MemoryStore,
    failing: AtomicBool,
    pub lists: AtomicUsize,
    pub upserts: AtomicUsize,
    pub deletes: AtomicUsize,
    pub elapsed_writes: Mutex<Vec<(SectionId, u64)>>,
    /// Extra time a delete takes after the record is gone.
    pub delete_delay: std::sync::Mutex<Option<Duration>>,
}

impl RecordingStore {
    pub async fn seeded(sections: Vec<Section>) -> Arc<Self> {
        let store = Arc::new(Self::default());
        for section in &sections {
            store
                .inner
                .upsert_section(&user(), section)
                .await
                .expect("seed");
        }
        store
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("store unreachable"));
        }
        Ok(())
    }

    pub async fn stored(&self) -> Vec<Section> {
        self.inner.list_sections(&user()).await.expect("list")
    }

    pub async fn stored_section(&self, id: &str) -> Option<Section> {
        self.stored()
            .await
            .into_iter()
            .find(|section| section.id.as_str() == id)
    }
}

#[async_trait]
impl SectionStore for RecordingStore {
    async fn list_sections(&self, user_id: &UserId) -> Result<Vec<Section>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.list_sections(user_id).await
    }

    async fn upsert_section(&self, user_id: &UserId, section: &Section) -> Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.upsert_section(user_id, section).await
    }

    async fn delete_section(&self, user_id: &UserId, section_id: &SectionId) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.delete_section(user_id, section_id).await?;
        let delay = *self.delete_delay.lock().expect("delay");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn update_elapsed_time(
        &self,
        user_id: &UserId,
        section_id: &SectionId,
        elapsed_seconds: u64,
    ) -> Result<()> {
        self.elapsed_writes
            .lock()
            .await
            .push((section_id.clone(), elapsed_seconds));
        self.check()?;
        self.inner
            .update_elapsed_time(user_id, section_id, elapsed_seconds)
            .await
    }
}

/// Answers dialogs from a script and records what was shown.
#[derive(Default)]
pub(crate) struct ScriptedInteraction {
    confirmations: Mutex<VecDeque<bool>>,
    pub answers: Mutex<VecDeque<Option<String>>>,
    pub prompts: Mutex<Vec<(String, String)>>,
    pub notices: Mutex<Vec<(String, String)>>,
    /// Time the user takes to answer each prompt.
    pub answer_delay: Option<Duration>,
}

impl ScriptedInteraction {
    pub fn confirming(confirm: bool) -> Arc<Self> {
        let interaction = Self::default();
        interaction.confirmations.try_lock().expect("fresh").push_back(confirm);
        Arc::new(interaction)
    }

    pub fn answering(answers: &[Option<&str>]) -> Arc<Self> {
        Arc::new(Self::scripted(answers, None))
    }

    pub fn answering_slowly(answers: &[Option<&str>], delay: Duration) -> Arc<Self> {
        Arc::new(Self::scripted(answers, Some(delay)))
    }

    fn scripted(answers: &[Option<&str>], answer_delay: Option<Duration>) -> Self {
        let interaction = Self {
            answer_delay,
            ..Self::default()
        };
        interaction
            .answers
            .try_lock()
            .expect("fresh")
            .extend(answers.iter().map(|answer| answer.map(str::to_string)));
        interaction
    }

    pub async fn notice_count(&self) -> usize {
        self.notices.lock().await.len()
    }
}

#[async_trait]
impl Interaction for ScriptedInteraction {
    async fn confirm(&self, _title: &str, _message: &str) -> bool {
        self.confirmations.lock().await.pop_front().unwrap_or(false)
    }

    async fn prompt_text(&self, title: &str, _message: &str, initial_value: &str) -> Option<String> {
        self.prompts
            .lock()
            .await
            .push((title.to_string(), initial_value.to_string()));
        if let Some(delay) = self.answer_delay {
            tokio::time::sleep(delay).await;
        }
        self.answers.lock().await.pop_front().flatten()
    }

    async fn notify(&self, title: &str, message: &str) {
        self.notices
            .lock()
            .await
            .push((title.to_string(), message.to_string()));
    }
}

/// Client over `sections`, already loaded.
pub(crate) async fn loaded_client(
    sections: Vec<Section>,
    interaction: Arc<ScriptedInteraction>,
) -> (SectionsClient, Arc<RecordingStore>) {
    let store = RecordingStore::seeded(sections).await;
    let client = SectionsClient::new(user(), store.clone(), interaction);
    client.load().await.expect("load");
    (client, store)
}
