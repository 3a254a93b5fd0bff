//! Optional SMTP delivery of the daily report.
//!
//! This module provides a thin wrapper that sends mail when the `email`
//! feature is enabled and does nothing otherwise. This allows the report
//! pipeline to call it unconditionally.
//!
//! # Environment
//!
//! | Variable | Default |
//! |----------|---------|
//! | `JOB_REPORT_SMTP_HOST` | required |
//! | `JOB_REPORT_SMTP_PORT` | `587` |
//! | `JOB_REPORT_SMTP_USER` | required |
//! | `JOB_REPORT_SMTP_PASS` | required |
//! | `JOB_REPORT_TO` | required |
//! | `JOB_REPORT_FROM` | the SMTP user |
//!
//! # Feature Flag
//!
//! Enable with: `cargo build --features email`

pub const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub to: String,
    pub from: String,
}

impl SmtpSettings {
    /// `None` unless host, user, password and recipient are all set.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let host = non_empty("JOB_REPORT_SMTP_HOST")?;
        let user = non_empty("JOB_REPORT_SMTP_USER")?;
        let pass = non_empty("JOB_REPORT_SMTP_PASS")?;
        let to = non_empty("JOB_REPORT_TO")?;
        let port = non_empty("JOB_REPORT_SMTP_PORT")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_SMTP_PORT);
        let from = non_empty("JOB_REPORT_FROM").unwrap_or_else(|| user.clone());
        Some(Self {
            host,
            port,
            user,
            pass,
            to,
            from,
        })
    }

    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// Mail the report over STARTTLS.
///
/// # Returns
///
/// * `true` if the message was accepted by the SMTP server
/// * `false` if SMTP is not configured or sending failed (logged)
#[cfg(feature = "email")]
pub async fn send_report(subject: &str, body: &str) -> bool {
    use lettre::message::header::ContentType;
    use lettre::message::Mailbox;
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{Message, SmtpTransport, Transport};
    use tracing::{info, warn};

    let Some(settings) = SmtpSettings::from_env() else {
        info!("SMTP not configured; skipping email");
        return false;
    };

    let message = match (settings.from.parse::<Mailbox>(), settings.to.parse::<Mailbox>()) {
        (Ok(from), Ok(to)) => Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string()),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "Invalid email address; skipping email");
            return false;
        }
    };
    let message = match message {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "Could not build email");
            return false;
        }
    };

    let result = tokio::task::spawn_blocking(move || {
        let mailer = SmtpTransport::starttls_relay(&settings.host)?
            .port(settings.port)
            .credentials(Credentials::new(settings.user, settings.pass))
            .build();
        mailer.send(&message)
    })
    .await;

    match result {
        Ok(Ok(_)) => {
            info!("Emailed daily report");
            true
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Could not send email");
            false
        }
        Err(e) => {
            warn!(error = %e, "Email task failed");
            false
        }
    }
}

/// Mail the report (no-op when `email` feature is disabled).
#[cfg(not(feature = "email"))]
pub async fn send_report(_subject: &str, _body: &str) -> bool {
    if SmtpSettings::from_env().is_some() {
        tracing::info!("SMTP configured but the `email` feature is disabled; skipping email");
    }
    false
}
