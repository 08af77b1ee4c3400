//! SMTP transport over STARTTLS using `lettre`.

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::error::NotifyError;
use crate::notifier::queue::SmtpSettings;

const SMTP_RELAY: &str = "smtp.gmail.com";

/// Sends one message; reconnects and retries once on a disconnect.
pub fn send(settings: &SmtpSettings, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
    let (username, password, from) = match (&settings.username, &settings.password, &settings.from_address) {
        (Some(u), Some(p), Some(f)) => (u, p, f),
        _ => return Err(NotifyError::NotConfigured),
    };

    let message = Message::builder()
        .from(from.parse().map_err(|e: lettre::address::AddressError| NotifyError::Smtp(e.to_string()))?)
        .to(to.parse().map_err(|e: lettre::address::AddressError| NotifyError::Smtp(e.to_string()))?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| NotifyError::Smtp(e.to_string()))?;

    let creds = Credentials::new(username.clone(), password.clone());
    let mailer = SmtpTransport::starttls_relay(SMTP_RELAY)
        .map_err(|e| NotifyError::Smtp(e.to_string()))?
        .credentials(creds)
        .build();

    match mailer.send(&message) {
        Ok(_) => Ok(()),
        Err(first_err) => mailer
            .send(&message)
            .map(|_| ())
            .map_err(|_| NotifyError::Smtp(first_err.to_string())),
    }
}
