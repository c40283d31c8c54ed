//! Certificate notification dispatch.
//!
//! Sends the `successfulCertificatePayment` email to each recipient with the
//! QR image embedded inline. An SMTP provider is used in production; the
//! mock provider records deliveries for tests and SMTP-less environments.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use std::sync::Mutex;

use crate::config::SmtpConfig;
use crate::error::AppError;

const SUBJECT: &str = "Congratulations you received restaurant certificate";
const QR_CONTENT_ID: &str = "qr-code";

/// Rendered content of one certificate email, matching the
/// `successfulCertificatePayment` template contract.
#[derive(Debug, Clone)]
pub struct CertificateDelivery {
    pub to: String,
    /// Buyer's full name.
    pub from: String,
    /// Recipient greeting name.
    pub greeting: String,
    /// Buyer's greeting message.
    pub description: String,
    /// Formatted nominal value, e.g. "25.00€".
    pub value: String,
    /// Formatted expiry date, dd/mm/yyyy.
    pub valid_until: String,
    /// PNG raster of the redemption QR code.
    pub qr_code: Vec<u8>,
}

#[async_trait]
pub trait CertificateMailer: Send + Sync {
    async fn send_certificate_email(&self, delivery: &CertificateDelivery)
        -> Result<(), AppError>;
}

pub struct SmtpMailer {
    config: SmtpConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Result<Self, AppError> {
        let creds = Credentials::new(
            config.user.clone(),
            config.password.expose_secret().clone(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Failed to create SMTP relay: {}", e))
            })?
            .port(config.port)
            .credentials(creds)
            .build();

        tracing::info!(host = %config.host, "SMTP mailer initialized");

        Ok(Self { config, transport })
    }

    fn render_html(delivery: &CertificateDelivery) -> String {
        format!(
            r#"<html>
                <body style="font-family: Arial, sans-serif;">
                    <h2>You received a restaurant gift certificate!</h2>
                    <p><b>{from}</b> sent you a certificate worth <b>{value}</b>.</p>
                    <p>To: {to}</p>
                    <p>{description}</p>
                    <p><img src="cid:{cid}" alt="Certificate QR code"/></p>
                    <p>Show this QR code at the restaurant to redeem your certificate.</p>
                    <p>Valid until: {valid_until}</p>
                </body>
            </html>"#,
            from = delivery.from,
            value = delivery.value,
            to = delivery.greeting,
            description = delivery.description,
            cid = QR_CONTENT_ID,
            valid_until = delivery.valid_until,
        )
    }
}

#[async_trait]
impl CertificateMailer for SmtpMailer {
    async fn send_certificate_email(
        &self,
        delivery: &CertificateDelivery,
    ) -> Result<(), AppError> {
        let from_mailbox: Mailbox =
            format!("{} <{}>", self.config.from_name, self.config.from_email)
                .parse()
                .map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!("Invalid from address: {}", e))
                })?;

        let to_mailbox: Mailbox = delivery
            .to
            .parse()
            .map_err(|e| AppError::Email(format!("Invalid recipient address: {}", e)))?;

        let png_type = ContentType::parse("image/png")
            .map_err(|e| AppError::Email(format!("Invalid attachment content type: {}", e)))?;
        let qr_part = Attachment::new_inline(QR_CONTENT_ID.to_string())
            .body(delivery.qr_code.clone(), png_type);

        let message = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(SUBJECT)
            .multipart(
                MultiPart::related()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(Self::render_html(delivery)),
                    )
                    .singlepart(qr_part),
            )
            .map_err(|e| AppError::Email(format!("Failed to build message: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Email(format!("Failed to send email: {}", e)))?;

        tracing::info!(to = %delivery.to, "Certificate email sent");
        Ok(())
    }
}

/// Mock mailer for tests. Records every delivery instead of sending it, and
/// can be told to start refusing deliveries after a number of successes.
#[derive(Default)]
pub struct MockMailer {
    deliveries: Mutex<Vec<CertificateDelivery>>,
    fail_after: Mutex<Option<usize>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<CertificateDelivery> {
        self.deliveries
            .lock()
            .expect("mock mailer lock poisoned")
            .clone()
    }

    pub fn send_count(&self) -> usize {
        self.deliveries
            .lock()
            .expect("mock mailer lock poisoned")
            .len()
    }

    /// Refuse every delivery once `successes` deliveries have been recorded.
    pub fn fail_after(&self, successes: usize) {
        *self.fail_after.lock().expect("mock mailer lock poisoned") = Some(successes);
    }

    /// Accept deliveries again.
    pub fn clear_failure(&self) {
        *self.fail_after.lock().expect("mock mailer lock poisoned") = None;
    }
}

#[async_trait]
impl CertificateMailer for MockMailer {
    async fn send_certificate_email(
        &self,
        delivery: &CertificateDelivery,
    ) -> Result<(), AppError> {
        let mut deliveries = self.deliveries.lock().expect("mock mailer lock poisoned");
        if let Some(limit) = *self.fail_after.lock().expect("mock mailer lock poisoned") {
            if deliveries.len() >= limit {
                tracing::warn!(to = %delivery.to, "[MOCK] Certificate email refused");
                return Err(AppError::Email("mock delivery refused".to_string()));
            }
        }
        tracing::info!(to = %delivery.to, "[MOCK] Certificate email would be sent");
        deliveries.push(delivery.clone());
        Ok(())
    }
}
