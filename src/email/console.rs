//! Console mailer for development.
//!
//! Prints emails to stdout instead of sending them. Body content may
//! carry tokens and PII, so it is redacted unless explicitly enabled;
//! do not use this mailer in production.

use super::{Email, Mailer};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Mutex;

/// A mailer that prints emails to stdout instead of sending them.
///
/// Also records sent emails so tests can assert on them.
#[derive(Debug, Default)]
pub struct ConsoleMailer {
    show_full_content: bool,
    sent: Mutex<Vec<Email>>,
}

impl ConsoleMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Show full body content. Development only.
    #[must_use]
    pub fn with_full_output(mut self, show: bool) -> Self {
        self.show_full_content = show;
        self
    }

    /// Emails sent so far (for test assertions).
    #[must_use]
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        println!("━━━ EMAIL ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("From:    {}", email.from);
        println!("To:      {}", email.to);
        println!("Subject: {}", email.subject);
        if self.show_full_content {
            if let Some(text) = &email.text {
                println!("─────────────────────────────────────────");
                println!("{text}");
            }
        } else {
            println!("Body:    [redacted, enable with_full_output]");
        }
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_sent_emails() {
        let mailer = ConsoleMailer::new();
        let email = Email::new("from@example.com", "to@example.com", "Hello").text("Hi!");
        mailer.send(&email).await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "to@example.com");
    }
}
