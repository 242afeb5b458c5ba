//! Console email service for development. Logs emails to tracing output.

use async_trait::async_trait;
use shelfguard_application::EmailService;
use shelfguard_core::AppResult;
use tracing::info;

/// Development email service that logs emails to the console instead of
/// sending them.
#[derive(Clone, Default)]
pub struct ConsoleEmailService;

impl ConsoleEmailService {
    /// Creates a new console email service.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailService for ConsoleEmailService {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        _html_body: Option<&str>,
    ) -> AppResult<()> {
        info!(to, subject, body = text_body, "email suppressed, printed to console");
        Ok(())
    }
}
