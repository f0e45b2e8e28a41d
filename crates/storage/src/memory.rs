use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use shared::domain::{Section, SectionId, UserId};
use tokio::sync::RwLock;

use crate::SectionStore;

/// Process-local store. Sections keep their insertion order per user.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<UserId, Vec<Section>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_sections(user_id: &UserId, sections: Vec<Section>) -> Self {
        let store = Self::new();
        store.users.write().await.insert(user_id.clone(), sections);
        store
    }
}

#[async_trait]
impl SectionStore for MemoryStore {
    async fn list_sections(&self, user_id: &UserId) -> Result<Vec<Section>> {
        let users = self.users.read().await;
        Ok(users.get(user_id).cloned().unwrap_or_default())
    }

    async fn upsert_section(&self, user_id: &UserId, section: &Section) -> Result<()> {
        let mut users = self.users.write().await;
        let sections = users.entry(user_id.clone()).or_default();
        match sections.iter_mut().find(|stored| stored.id == section.id) {
            Some(stored) => *stored = section.clone(),
            None => sections.push(section.clone()),
        }
        Ok(())
    }

    async fn delete_section(&self, user_id: &UserId, section_id: &SectionId) -> Result<()> {
        let mut users = self.users.write().await;
        if let Some(sections) = users.get_mut(user_id) {
            sections.retain(|stored| &stored.id != section_id);
        }
        Ok(())
    }

    async fn update_elapsed_time(
        &self,
        user_id: &UserId,
        section_id: &SectionId,
        elapsed_seconds: u64,
    ) -> Result<()> {
        let mut users = self.users.write().await;
        if let Some(section) = users
            .get_mut(user_id)
            .and_then(|sections| sections.iter_mut().find(|stored| &stored.id == section_id))
        {
            section.elapsed_seconds = elapsed_seconds;
        }
        Ok(())
    }
}
