//! Notification channel (mock email).
//!
//! DESIGN
//! ======
//! The store only sees the `Notifier` trait. `LogNotifier` simulates
//! delivery with a delay and a log line; tests swap in mocks that record or
//! fail. Failures are reported once and never retried.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

pub const DEFAULT_FROM: &str = "shadownet@example.com";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Details of a join request sent to a college's moderators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequestNotice {
    pub nickname: String,
    pub email: String,
    pub college_id: String,
    pub college_name: String,
}

/// A rendered outgoing email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Tell a college's moderators that someone wants in.
    async fn send_join_request_notice(&self, notice: &JoinRequestNotice) -> Result<(), NotifyError>;

    /// Send a verification code to the address being verified.
    async fn send_verification_code(&self, email: &str, code: &str) -> Result<(), NotifyError>;
}

#[must_use]
pub fn moderator_address(college_id: &str) -> String {
    format!("moderator-{college_id}@example.com")
}

#[must_use]
pub fn render_join_request_email(notice: &JoinRequestNotice) -> Email {
    let JoinRequestNotice { nickname, email, college_id, college_name } = notice;
    Email {
        to: moderator_address(college_id),
        from: DEFAULT_FROM.to_owned(),
        subject: format!("ShadowNet: Request to join {college_name} group"),
        body: format!(
            "User {nickname} ({email}) has requested to join the {college_name} chat group.\n\n\
             To approve this request, please log in to your moderator account.\n\n\
             Regards,\nShadowNet Team\n"
        ),
    }
}

#[must_use]
pub fn render_verification_email(email: &str, code: &str) -> Email {
    Email {
        to: email.to_owned(),
        from: DEFAULT_FROM.to_owned(),
        subject: "ShadowNet Email Verification".to_owned(),
        body: format!(
            "Your verification code for ShadowNet is: {code}\n\n\
             Please enter this code on the profile page to complete your verification.\n\n\
             Thank you,\nShadowNet Team\n"
        ),
    }
}

/// Pretends to send mail: waits, then logs the envelope (never the body).
#[derive(Debug, Clone)]
pub struct LogNotifier {
    delay: Duration,
}

impl LogNotifier {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    async fn deliver(&self, email: &Email) -> Result<(), NotifyError> {
        if !email.to.contains('@') {
            return Err(NotifyError::InvalidRecipient(email.to.clone()));
        }
        info!(to = %email.to, from = %email.from, subject = %email.subject, "sending email");
        tokio::time::sleep(self.delay).await;
        info!(to = %email.to, "email sent");
        Ok(())
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_join_request_notice(&self, notice: &JoinRequestNotice) -> Result<(), NotifyError> {
        self.deliver(&render_join_request_email(notice)).await
    }

    async fn send_verification_code(&self, email: &str, code: &str) -> Result<(), NotifyError> {
        // Debug only, so the demo can be completed by hand.
        debug!(to = %email, %code, "verification code");
        self.deliver(&render_verification_email(email, code)).await
    }
}

#[cfg(test)]
#[path = "notify_test.rs"]
mod tests;
