//! Mail transport.
//!
//! Holds the validated SMTP transport settings handed to route groups that
//! send mail. Message composition and delivery belong to those groups.

use thiserror::Error;
use url::Url;

use crate::config::MailerConfig;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("invalid mail transport {url}: {reason}")]
    InvalidTransport { url: String, reason: String },

    #[error("invalid sender address: {0}")]
    InvalidSender(String),

    #[error("mail transport credentials are incomplete")]
    IncompleteCredentials,
}

/// An initialized mail transport.
#[derive(Debug, Clone)]
pub struct Mailer {
    transport: Url,
    from: String,
    authenticated: bool,
}

impl Mailer {
    pub fn new(config: &MailerConfig) -> Result<Self, MailerError> {
        let scheme = if config.secure { "smtps" } else { "smtp" };
        let raw = format!("{scheme}://{}:{}", config.host, config.port);
        let transport = Url::parse(&raw).map_err(|e| MailerError::InvalidTransport {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        if transport.host_str().map_or(true, str::is_empty) {
            return Err(MailerError::InvalidTransport {
                url: raw,
                reason: "missing host".into(),
            });
        }

        let authenticated = match (&config.user, &config.pass) {
            (Some(_), Some(_)) => true,
            (None, None) => false,
            _ => return Err(MailerError::IncompleteCredentials),
        };

        let from = config.from.trim();
        match from.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(MailerError::InvalidSender(config.from.clone())),
        }

        tracing::info!(transport = %transport, from, authenticated, "Mail transport initialized");

        Ok(Self {
            transport,
            from: from.to_string(),
            authenticated,
        })
    }

    /// Transport URL (`smtp://` or `smtps://`), without credentials.
    pub fn transport_url(&self) -> &Url {
        &self.transport
    }

    pub fn sender(&self) -> &str {
        &self.from
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}
