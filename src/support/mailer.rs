use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::Mailbox,
    transport::smtp::authentication::Credentials,
};
use tracing::{info, warn};

use crate::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: bool,
    pub preview_url: Option<String>,
}

/// SMTP transport with a preview-mode fallback: when credentials are missing
/// or a send fails, the message body is logged and the caller gets
/// `delivered: false`. Mail never fails a request.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: String,
    pub support_to: String,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Self {
        let transport = match (&config.smtp_user, &config.smtp_pass) {
            (Some(user), Some(pass)) => {
                let builder = if config.smtp_port == 465 {
                    AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
                } else {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                };
                match builder {
                    Ok(builder) => Some(
                        builder
                            .port(config.smtp_port)
                            .credentials(Credentials::new(user.clone(), pass.clone()))
                            .build(),
                    ),
                    Err(e) => {
                        warn!("SMTP transport misconfigured, mail runs in preview mode: {e}");
                        None
                    }
                }
            }
            _ => {
                warn!("SMTP credentials missing: set SMTP_USER and SMTP_PASS; mail runs in preview mode");
                None
            }
        };

        Self {
            transport,
            from: config.smtp_from.clone(),
            support_to: config.support_to.clone(),
        }
    }

    /// A mailer with no transport at all. Everything goes to the log.
    pub fn preview(support_to: impl Into<String>) -> Self {
        Self {
            transport: None,
            from: "no-reply@cohabify.local".to_string(),
            support_to: support_to.into(),
        }
    }

    pub async fn send(
        &self,
        sender_label: &str,
        subject: &str,
        text: String,
        reply_to: Option<&str>,
    ) -> Delivery {
        let undelivered = Delivery {
            delivered: false,
            preview_url: None,
        };

        let Some(transport) = &self.transport else {
            info!("mail preview (no SMTP transport) [{subject}]:\n{text}");
            return undelivered;
        };

        let from: Mailbox = match format!("{sender_label} <{}>", self.from).parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                warn!("invalid SMTP_FROM address: {e}");
                return undelivered;
            }
        };
        let to: Mailbox = match self.support_to.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                warn!("invalid SUPPORT_TO address: {e}");
                return undelivered;
            }
        };

        let mut builder = Message::builder().from(from).to(to).subject(subject);
        if let Some(reply_to) = reply_to.and_then(|r| r.parse::<Mailbox>().ok()) {
            builder = builder.reply_to(reply_to);
        }
        let message = match builder.body(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("failed to build mail message: {e}");
                return undelivered;
            }
        };

        match transport.send(message).await {
            Ok(_) => Delivery {
                delivered: true,
                preview_url: None,
            },
            Err(e) => {
                warn!("SMTP send failed (soft-fail): {e}");
                undelivered
            }
        }
    }

    pub async fn verify(&self) -> Result<bool, String> {
        match &self.transport {
            Some(transport) => transport.test_connection().await.map_err(|e| e.to_string()),
            None => Err("SMTP transport not configured".to_string()),
        }
    }
}
