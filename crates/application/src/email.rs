use async_trait::async_trait;
use shelfguard_core::AppResult;

/// Port for delivering account-recovery email. The core only defines *when*
/// to send and *what* must appear in the payload; SMTP delivery mechanics
/// are an external collaborator's concern.
#[async_trait]
pub trait EmailService: Send + Sync {
    /// Sends a single email.
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: Option<&str>,
    ) -> AppResult<()>;
}
