//! SMTP delivery.
//!
//! Receipts and support messages go out through the user's own Gmail
//! mailbox (XOAUTH2 with an access token minted from their stored refresh
//! token). App-level mail (welcome, password reset) uses an optional
//! system relay from `SMTP_*`; when it is absent the send downgrades to a
//! warning.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::error::{AppError, AppResult};
use crate::models::Tenant;
use crate::schemas::{SupportMessageInput, UserConfig};
use crate::services::{oauth, receipts};
use crate::state::AppState;

const GMAIL_RELAY: &str = "smtp.gmail.com";

type Transport = AsyncSmtpTransport<Tokio1Executor>;

/// Gmail transports keyed by mail identity. A changed address or refresh
/// token produces a new key, so stale handles are never reused.
#[derive(Clone, Default)]
pub struct MailerCache {
    transports: Arc<Mutex<HashMap<String, Transport>>>,
}

impl MailerCache {
    fn get(&self, key: &str) -> Option<Transport> {
        self.transports.lock().ok()?.get(key).cloned()
    }

    fn insert(&self, key: String, transport: Transport) {
        if let Ok(mut transports) = self.transports.lock() {
            transports.insert(key, transport);
        }
    }
}

fn require_mail_identity(config: &UserConfig) -> AppResult<()> {
    if config.has_mail_identity() {
        Ok(())
    } else {
        Err(AppError::MailAuth(
            "Email sending is not configured. Connect a Gmail account first.".to_string(),
        ))
    }
}

/// Get or build the user's Gmail transport.
pub async fn gmail_transport(state: &AppState, config: &UserConfig) -> AppResult<Transport> {
    require_mail_identity(config)?;

    let key = config.mail_identity_key();
    if let Some(transport) = state.mailers.get(&key) {
        return Ok(transport);
    }

    let access_token =
        oauth::mint_access_token(state, &config.email.oauth2.refresh_token).await?;

    let transport = Transport::relay(GMAIL_RELAY)
        .map_err(|error| AppError::MailAuth(format!("Could not reach the Gmail relay: {error}")))?
        .authentication(vec![Mechanism::Xoauth2])
        .credentials(Credentials::new(config.email.user.clone(), access_token))
        .build();

    state.mailers.insert(key, transport.clone());
    Ok(transport)
}

fn sender_mailbox(config: &UserConfig) -> AppResult<Mailbox> {
    let address = if config.email.from.trim().is_empty() {
        config.email.user.trim()
    } else {
        config.email.from.trim()
    };
    format!("{} <{}>", config.app_name, address)
        .parse()
        .map_err(|_| AppError::MailAuth("The configured sender address is invalid.".to_string()))
}

fn parse_mailbox(address: &str, label: &str) -> AppResult<Mailbox> {
    address
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid {label} email address.")))
}

/// Send one month's receipt with the rendered PDF attached. The sender is
/// blind-copied so the owner keeps a trace in their own mailbox.
pub async fn send_receipt_email(
    state: &AppState,
    config: &UserConfig,
    tenant: &Tenant,
    pdf_bytes: &[u8],
    month: u32,
    year: i32,
) -> AppResult<()> {
    let to = tenant
        .email
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("This tenant has no email address.".to_string()))?;
    let to = parse_mailbox(to, "tenant")?;
    let from = sender_mailbox(config)?;
    let bcc = parse_mailbox(&config.email.user, "sender")?;

    let month_label = receipts::month_name(month);
    let subject = format!("Quittance de loyer - {month_label} {year}");
    let body = format!(
        "Bonjour {},\n\nVeuillez trouver ci-joint votre quittance de loyer \
         pour le mois de {month_label} {year}.\n\nCordialement,\n{}",
        tenant.full_name(),
        config.owner_full_name(),
    );
    let filename = format!(
        "quittance_{}_{month}_{year}.pdf",
        tenant.last_name.to_lowercase().replace(' ', "_")
    );

    let pdf_content_type = ContentType::parse("application/pdf")
        .map_err(|error| AppError::Internal(format!("Invalid attachment type: {error}")))?;
    let attachment = Attachment::new(filename).body(pdf_bytes.to_vec(), pdf_content_type);

    let message = Message::builder()
        .from(from)
        .to(to)
        .bcc(bcc)
        .subject(subject)
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(body))
                .singlepart(attachment),
        )
        .map_err(|error| AppError::MailSend(format!("Could not build the email: {error}")))?;

    let transport = gmail_transport(state, config).await?;
    transport
        .send(message)
        .await
        .map_err(|error| AppError::MailSend(format!("Email delivery failed: {error}")))?;

    tracing::info!(tenant_id = %tenant.id, month, year, "Receipt email sent");
    Ok(())
}

/// Verify that the Gmail credential actually opens an SMTP session.
pub async fn verify_gmail(state: &AppState, config: &UserConfig) -> AppResult<()> {
    let transport = gmail_transport(state, config).await?;
    let healthy = transport
        .test_connection()
        .await
        .map_err(|error| AppError::MailAuth(format!("SMTP connection failed: {error}")))?;
    if healthy {
        Ok(())
    } else {
        Err(AppError::MailAuth(
            "The Gmail relay rejected the connection.".to_string(),
        ))
    }
}

/// Support messages land in the owner's own mailbox, with the reporter's
/// contact details inlined in the body.
pub async fn send_support_email(
    state: &AppState,
    config: &UserConfig,
    input: &SupportMessageInput,
) -> AppResult<()> {
    let from = sender_mailbox(config)?;
    let to = parse_mailbox(&config.email.user, "sender")?;

    let body = format!(
        "Nouveau message de support\n\nNom : {}\nEmail : {}\n\nMessage :\n{}",
        input.name.as_deref().unwrap_or("(non renseign\u{e9})"),
        input.email.as_deref().unwrap_or("(non renseign\u{e9})"),
        input.message.trim(),
    );

    let message = Message::builder()
        .from(from)
        .to(to)
        .subject("Message de support")
        .body(body)
        .map_err(|error| AppError::MailSend(format!("Could not build the email: {error}")))?;

    let transport = gmail_transport(state, config).await?;
    transport
        .send(message)
        .await
        .map_err(|error| AppError::MailSend(format!("Email delivery failed: {error}")))?;
    Ok(())
}

fn system_transport(state: &AppState) -> Option<Transport> {
    let host = state.config.smtp_host.as_deref()?;
    let mut builder = Transport::starttls_relay(host).ok()?.port(state.config.smtp_port);
    if let (Some(user), Some(password)) = (
        state.config.smtp_user.as_deref(),
        state.config.smtp_password.as_deref(),
    ) {
        builder = builder.credentials(Credentials::new(user.to_string(), password.to_string()));
    }
    Some(builder.build())
}

/// Best-effort transactional mail over the system relay. A missing relay
/// or a failed send logs a warning and returns normally.
pub async fn send_system_email(state: &AppState, to: &str, subject: &str, body: &str) {
    let Some(transport) = system_transport(state) else {
        tracing::warn!(subject, "System SMTP relay is not configured, skipping email");
        return;
    };
    let from = state
        .config
        .smtp_from
        .as_deref()
        .or(state.config.smtp_user.as_deref())
        .unwrap_or_default();

    let message = Message::builder()
        .from(match from.parse() {
            Ok(mailbox) => mailbox,
            Err(error) => {
                tracing::warn!(%error, "Invalid SMTP_FROM address, skipping email");
                return;
            }
        })
        .to(match to.trim().parse() {
            Ok(mailbox) => mailbox,
            Err(error) => {
                tracing::warn!(%error, "Invalid recipient address, skipping email");
                return;
            }
        })
        .subject(subject)
        .body(body.to_string());

    match message {
        Ok(message) => {
            if let Err(error) = transport.send(message).await {
                tracing::warn!(%error, subject, "System email delivery failed");
            }
        }
        Err(error) => {
            tracing::warn!(%error, subject, "Could not build system email");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_mailbox, require_mail_identity, sender_mailbox, MailerCache};
    use crate::schemas::UserConfig;

    fn configured() -> UserConfig {
        let mut config = UserConfig::default();
        config.email.user = "owner@gmail.com".to_string();
        config.email.oauth2.refresh_token = "refresh-token".to_string();
        config
    }

    #[test]
    fn identity_is_required() {
        assert!(require_mail_identity(&UserConfig::default()).is_err());
        assert!(require_mail_identity(&configured()).is_ok());
    }

    #[test]
    fn sender_falls_back_to_the_account_address() {
        let mut config = configured();
        let mailbox = sender_mailbox(&config).unwrap();
        assert_eq!(mailbox.email.to_string(), "owner@gmail.com");

        config.email.from = "noreply@example.com".to_string();
        let mailbox = sender_mailbox(&config).unwrap();
        assert_eq!(mailbox.email.to_string(), "noreply@example.com");
    }

    #[test]
    fn rejects_bad_addresses() {
        assert!(parse_mailbox("not-an-email", "tenant").is_err());
        assert!(parse_mailbox("tenant@example.com", "tenant").is_ok());
    }

    #[test]
    fn cache_round_trip_is_keyed() {
        let cache = MailerCache::default();
        assert!(cache.get("a|b").is_none());
    }
}
