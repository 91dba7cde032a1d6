//! Outbound mail for password reset codes.
//!
//! Transport selection: SMTP when `SMTP_HOST` is set, else an HTTP relay
//! (`MAIL_WEBHOOK_URL`), else the log.

use std::sync::Mutex;
use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde::Serialize;
use thiserror::Error;

use crate::config::{Config, SmtpConfig};

/// Network timeout for a single delivery.
const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Minutes a reset code stays valid; quoted in the message body.
pub const RESET_CODE_VALID_MINUTES: i64 = 5;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Cannot reach mail relay at {0}")]
    Connection(String),

    #[error("Mail relay rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Invalid mail address {address}: {reason}")]
    Address { address: String, reason: String },

    #[error("SMTP error: {0}")]
    Smtp(String),
}

/// Rendered message handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

pub trait Mailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;

    /// Transport name for startup logs.
    fn transport(&self) -> &'static str;

    /// Sender address used in `From:`.
    fn from_address(&self) -> &str;

    fn send_password_reset(&self, email: &str, code: &str) -> Result<(), MailError> {
        self.send(&password_reset_mail(self.from_address(), email, code))
    }
}

pub fn password_reset_mail(from: &str, to: &str, code: &str) -> OutgoingMail {
    OutgoingMail {
        from: from.to_string(),
        to: to.to_string(),
        subject: "Password reset".into(),
        text: format!(
            "Hello!\n\n\
             You requested a password reset. Your verification code is:\n\n\
             {code}\n\n\
             The code is valid for {RESET_CODE_VALID_MINUTES} minutes.\n\n\
             If you did not request a password reset, ignore this email."
        ),
    }
}

/// Build the mailer described by the configuration.
pub fn mailer_from_config(config: &Config) -> Result<Box<dyn Mailer + Send + Sync>, MailError> {
    if let Some(smtp) = &config.smtp {
        return Ok(Box::new(SmtpMailer::new(smtp, &config.mail_from, SEND_TIMEOUT)?));
    }
    match &config.mail_webhook_url {
        Some(url) => Ok(Box::new(WebhookMailer::new(url, &config.mail_from, SEND_TIMEOUT)?)),
        None => {
            tracing::warn!("Neither SMTP_HOST nor MAIL_WEBHOOK_URL set; reset mail will not be delivered");
            Ok(Box::new(LogMailer::new(&config.mail_from)))
        }
    }
}

// ═══════════════════════════════════════════════════════════
// SMTP
// ═══════════════════════════════════════════════════════════

/// Delivers through an SMTP relay with a pooled blocking transport.
pub struct SmtpMailer {
    from: String,
    relay: SmtpTransport,
}

impl SmtpMailer {
    /// Builds the transport only; no connection is made until the first send.
    pub fn new(smtp: &SmtpConfig, from: &str, timeout: Duration) -> Result<Self, MailError> {
        let builder = if smtp.secure {
            SmtpTransport::relay(&smtp.host)
        } else {
            SmtpTransport::starttls_relay(&smtp.host)
        }
        .map_err(|e| MailError::Smtp(e.to_string()))?;

        let mut builder = builder.port(smtp.port).timeout(Some(timeout));
        if let Some(user) = &smtp.user {
            let password = smtp.password.clone().unwrap_or_default();
            builder = builder.credentials(Credentials::new(user.clone(), password));
        }

        parse_mailbox(from)?;
        Ok(Self {
            from: from.to_string(),
            relay: builder.build(),
        })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse::<Mailbox>().map_err(|e| MailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

impl Mailer for SmtpMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(parse_mailbox(&mail.from)?)
            .to(parse_mailbox(&mail.to)?)
            .subject(mail.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.text.clone())
            .map_err(|e| MailError::Smtp(e.to_string()))?;

        self.relay
            .send(&message)
            .map_err(|e| MailError::Smtp(e.to_string()))?;
        tracing::info!(subject = %mail.subject, "Mail sent over SMTP");
        Ok(())
    }

    fn transport(&self) -> &'static str {
        "smtp"
    }

    fn from_address(&self) -> &str {
        &self.from
    }
}

// ═══════════════════════════════════════════════════════════
// Webhook relay
// ═══════════════════════════════════════════════════════════

/// Posts each message as JSON to an HTTP relay.
pub struct WebhookMailer {
    url: String,
    from: String,
    client: reqwest::blocking::Client,
}

impl WebhookMailer {
    /// Must be built outside the async runtime (blocking client).
    pub fn new(url: &str, from: &str, timeout: Duration) -> Result<Self, MailError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailError::HttpClient(e.to_string()))?;
        Ok(Self {
            url: url.to_string(),
            from: from.to_string(),
            client,
        })
    }
}

impl Mailer for WebhookMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.url)
            .json(mail)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    MailError::Connection(self.url.clone())
                } else {
                    MailError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        tracing::info!(subject = %mail.subject, "Mail relayed");
        Ok(())
    }

    fn transport(&self) -> &'static str {
        "webhook"
    }

    fn from_address(&self) -> &str {
        &self.from
    }
}

// ═══════════════════════════════════════════════════════════
// Development and test mailers
// ═══════════════════════════════════════════════════════════

/// Writes messages to the log instead of delivering them.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: &str) -> Self {
        Self {
            from: from.to_string(),
        }
    }
}

impl Mailer for LogMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        tracing::warn!(subject = %mail.subject, "Mail not delivered: no transport configured");
        tracing::debug!(to = %mail.to, body = %mail.text, "Undelivered mail");
        Ok(())
    }

    fn transport(&self) -> &'static str {
        "log"
    }

    fn from_address(&self) -> &str {
        &self.from
    }
}

/// Keeps every message in memory for assertions.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Connection("recording".into()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(mail.clone());
        }
        Ok(())
    }

    fn transport(&self) -> &'static str {
        "recording"
    }

    fn from_address(&self) -> &str {
        "MedicHelp <test@medichelp.local>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_mail_contains_code_and_validity() {
        let mail = password_reset_mail("MedicHelp <a@b.c>", "p@clinic.test", "123456");
        assert_eq!(mail.to, "p@clinic.test");
        assert!(mail.text.contains("123456"));
        assert!(mail.text.contains("5 minutes"));
    }

    #[test]
    fn recording_mailer_records() {
        let mailer = RecordingMailer::new();
        mailer.send_password_reset("p@clinic.test", "654321").unwrap();
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("654321"));
        assert_eq!(sent[0].from, "MedicHelp <test@medichelp.local>");
    }

    #[test]
    fn failing_mailer_errors() {
        let mailer = RecordingMailer::failing();
        assert!(mailer.send_password_reset("p@clinic.test", "1").is_err());
        assert!(mailer.sent().is_empty());
    }

    fn smtp_config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.clinic.test".into(),
            port: 2525,
            secure: false,
            user: Some("robot@clinic.test".into()),
            password: Some("hunter2".into()),
        }
    }

    #[test]
    fn config_without_transport_logs() {
        let config = Config::for_tests("/tmp/unused.db".into());
        let mailer = mailer_from_config(&config).unwrap();
        assert_eq!(mailer.transport(), "log");
        assert_eq!(mailer.from_address(), config.mail_from);
        assert!(mailer.send_password_reset("p@clinic.test", "111111").is_ok());
    }

    #[test]
    fn config_with_webhook_relays() {
        let mut config = Config::for_tests("/tmp/unused.db".into());
        config.mail_webhook_url = Some("http://127.0.0.1:9/mail".into());
        let mailer = mailer_from_config(&config).unwrap();
        assert_eq!(mailer.transport(), "webhook");
    }

    #[test]
    fn smtp_host_takes_precedence() {
        let mut config = Config::for_tests("/tmp/unused.db".into());
        config.mail_webhook_url = Some("http://127.0.0.1:9/mail".into());
        config.smtp = Some(smtp_config());
        config.mail_from = "\"MedicHelp\" <robot@clinic.test>".into();
        let mailer = mailer_from_config(&config).unwrap();
        assert_eq!(mailer.transport(), "smtp");
        assert_eq!(mailer.from_address(), "\"MedicHelp\" <robot@clinic.test>");
    }

    #[test]
    fn smtp_rejects_malformed_sender() {
        let err = SmtpMailer::new(&smtp_config(), "not an address", SEND_TIMEOUT);
        assert!(matches!(err, Err(MailError::Address { .. })));
    }

    #[test]
    fn smtp_send_to_malformed_recipient_fails_before_connecting() {
        let mailer = SmtpMailer::new(&smtp_config(), "MedicHelp <robot@clinic.test>", SEND_TIMEOUT)
            .unwrap();
        let err = mailer.send_password_reset("nobody", "123456");
        assert!(matches!(err, Err(MailError::Address { .. })));
    }
}
