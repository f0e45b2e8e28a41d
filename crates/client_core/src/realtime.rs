//! Section store backed by a realtime database REST endpoint
//! (`{base}/users/{user}/sections/{section}.json`).

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use shared::{
    domain::{Section, SectionId, UserId},
    protocol::{decode_sections_document, section_path, sections_path, ElapsedTimePatch},
};
use storage::SectionStore;
use tracing::warn;
use url::Url;

pub struct RealtimeDatabaseStore {
    http: Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl RealtimeDatabaseStore {
    pub fn new(base_url: &str, auth_token: Option<String>) -> Result<Self> {
        let base_url = Url::parse(base_url.trim())
            .with_context(|| format!("invalid realtime database url '{base_url}'"))?;
        if base_url.cannot_be_a_base() {
            bail!("realtime database url '{base_url}' cannot hold a path");
        }

        Ok(Self {
            http: Client::new(),
            base_url,
            auth_token: auth_token.filter(|token| !token.trim().is_empty()),
        })
    }

    /// Appends `segments` to the base url, percent-encoding each one.
    fn endpoint(&self, segments: &[String]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("realtime database url '{}' cannot hold a path", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair("auth", token);
        }
        Ok(url)
    }
}

#[async_trait]
impl SectionStore for RealtimeDatabaseStore {
    async fn list_sections(&self, user_id: &UserId) -> Result<Vec<Section>> {
        let document: Value = self
            .http
            .get(self.endpoint(&sections_path(user_id))?)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("sections of user '{user_id}' are not valid json"))?;

        let decoded = decode_sections_document(document)
            .with_context(|| format!("sections of user '{user_id}' are malformed"))?;
        for rejected in &decoded.rejected {
            warn!(user_id = %user_id, key = %rejected.key, reason = %rejected.reason, "skipping unreadable section record");
        }
        Ok(decoded.sections)
    }

    async fn upsert_section(&self, user_id: &UserId, section: &Section) -> Result<()> {
        self.http
            .put(self.endpoint(&section_path(user_id, &section.id))?)
            .json(section)
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("failed to save section '{}'", section.id))?;
        Ok(())
    }

    async fn delete_section(&self, user_id: &UserId, section_id: &SectionId) -> Result<()> {
        self.http
            .delete(self.endpoint(&section_path(user_id, section_id))?)
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("failed to delete section '{section_id}'"))?;
        Ok(())
    }

    async fn update_elapsed_time(
        &self,
        user_id: &UserId,
        section_id: &SectionId,
        elapsed_seconds: u64,
    ) -> Result<()> {
        self.http
            .patch(self.endpoint(&section_path(user_id, section_id))?)
            .json(&ElapsedTimePatch { elapsed_seconds })
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("failed to update elapsed time of section '{section_id}'"))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/realtime_tests.rs"]
mod tests;
