//! SMTP mailer using lettre.

use super::{Email, Mailer};
use crate::config::EmailConfig;
use crate::error::{LibrariumError, Result};
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// SMTP connection settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl SmtpConfig {
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 587,
            username: None,
            password: None,
        }
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

impl From<&EmailConfig> for SmtpConfig {
    fn from(config: &EmailConfig) -> Self {
        let mut smtp = SmtpConfig::new(config.smtp_host.clone()).port(config.smtp_port);
        if !config.smtp_username.is_empty() {
            smtp = smtp.credentials(config.smtp_username.clone(), config.smtp_password.clone());
        }
        smtp
    }
}

/// Production mailer delivering over SMTP with STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| LibrariumError::internal(format!("smtp transport: {e}")))?
            .port(config.port);

        if let (Some(username), Some(password)) = (config.username, config.password) {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        let from: Mailbox = email
            .from
            .parse()
            .map_err(|e| LibrariumError::bad_request(format!("invalid from address: {e}")))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| LibrariumError::bad_request(format!("invalid to address: {e}")))?;

        let builder = Message::builder()
            .from(from)
            .to(to)
            .subject(&email.subject);

        let message = match (&email.text, &email.html) {
            (Some(text), Some(html)) => builder
                .multipart(MultiPart::alternative_plain_html(
                    text.clone(),
                    html.clone(),
                ))
                .map_err(|e| LibrariumError::internal(format!("build email: {e}")))?,
            (Some(text), None) => builder
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(text.clone()),
                )
                .map_err(|e| LibrariumError::internal(format!("build email: {e}")))?,
            (None, Some(html)) => builder
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(html.clone()),
                )
                .map_err(|e| LibrariumError::internal(format!("build email: {e}")))?,
            (None, None) => {
                return Err(LibrariumError::bad_request("email has no body"));
            }
        };

        self.transport
            .send(message)
            .await
            .map_err(|e| LibrariumError::service_unavailable(format!("smtp send: {e}")))?;
        Ok(())
    }
}
