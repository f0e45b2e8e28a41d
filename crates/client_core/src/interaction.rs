use async_trait::async_trait;
use tracing::debug;

/// Dialogs the section flows need from whatever front-end hosts them.
#[async_trait]
pub trait Interaction: Send + Sync {
    async fn confirm(&self, title: &str, message: &str) -> bool;
    /// `None` when the user dismissed the prompt.
    async fn prompt_text(&self, title: &str, message: &str, initial_value: &str) -> Option<String>;
    async fn notify(&self, title: &str, message: &str);
}

/// Declines every confirmation and cancels every prompt.
pub struct SilentInteraction;

#[async_trait]
impl Interaction for SilentInteraction {
    async fn confirm(&self, title: &str, _message: &str) -> bool {
        debug!(title, "declining confirmation without a front-end");
        false
    }

    async fn prompt_text(&self, title: &str, _message: &str, _initial_value: &str) -> Option<String> {
        debug!(title, "cancelling prompt without a front-end");
        None
    }

    async fn notify(&self, title: &str, message: &str) {
        debug!(title, message, "dropping notice without a front-end");
    }
}
