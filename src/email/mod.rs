//! Transactional email.
//!
//! A [`Mailer`] trait with two backends: `ConsoleMailer` for development
//! and `SmtpMailer` (lettre) for production, plus the invitation email
//! composer used by the invite endpoint.

mod console;
mod smtp;

pub use console::ConsoleMailer;
pub use smtp::{SmtpConfig, SmtpMailer};

use crate::error::Result;
use crate::platform::types::InvitationRow;
use async_trait::async_trait;

/// An email message to be sent.
#[derive(Debug, Clone)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
}

impl Email {
    pub fn new(from: impl Into<String>, to: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            text: None,
            html: None,
        }
    }

    /// Set the plain text body.
    #[must_use]
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.text = Some(body.into());
        self
    }

    /// Set the HTML body.
    #[must_use]
    pub fn html(mut self, body: impl Into<String>) -> Self {
        self.html = Some(body.into());
        self
    }
}

/// Email sending backend.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<()>;
}

/// Compose the invitation email for an invitation record.
///
/// The acceptance link embeds the unguessable token; `app_url` is the
/// public base URL of the application.
#[must_use]
pub fn compose_invitation_email(
    invitation: &InvitationRow,
    from_address: &str,
    app_url: &str,
) -> Email {
    let accept_url = format!(
        "{}/invitations/accept?token={}",
        app_url.trim_end_matches('/'),
        invitation.token
    );
    let subject = format!("You're invited to join {}", invitation.organization_name);

    let mut text = format!(
        "You have been invited to join {} as a {}.\n\nAccept the invitation: {}\n\nThis invitation expires on {}.",
        invitation.organization_name,
        invitation.role,
        accept_url,
        invitation.expires_at.format("%Y-%m-%d"),
    );
    if let Some(message) = &invitation.message {
        text.push_str(&format!("\n\nMessage from the inviter:\n{message}"));
    }

    let html = format!(
        "<p>You have been invited to join <strong>{}</strong> as a <strong>{}</strong>.</p>\
         <p><a href=\"{}\">Accept the invitation</a></p>\
         <p>This invitation expires on {}.</p>",
        invitation.organization_name,
        invitation.role,
        accept_url,
        invitation.expires_at.format("%Y-%m-%d"),
    );

    Email::new(from_address, invitation.email.clone(), subject)
        .text(text)
        .html(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn invitation() -> InvitationRow {
        InvitationRow {
            id: "inv_1".into(),
            organization_id: "org_1".into(),
            organization_name: "Riverside Library".into(),
            email: "bob@example.com".into(),
            role: "librarian".into(),
            token: "secret-token".into(),
            status: "pending".into(),
            message: Some("Welcome aboard".into()),
            invited_by: "user_1".into(),
            expires_at: Utc::now() + chrono::Duration::days(7),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn invitation_email_carries_token_link() {
        let email = compose_invitation_email(
            &invitation(),
            "noreply@example.com",
            "https://app.example.com/",
        );
        assert_eq!(email.to, "bob@example.com");
        assert!(email.subject.contains("Riverside Library"));
        let text = email.text.unwrap();
        assert!(text.contains("https://app.example.com/invitations/accept?token=secret-token"));
        assert!(text.contains("librarian"));
        assert!(text.contains("Welcome aboard"));
    }
}
