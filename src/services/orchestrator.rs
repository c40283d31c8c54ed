//! Payment orchestrator: the state machine between checkout, the payment
//! gateway, and certificate issuance.
//!
//! `initiate_creation` builds a signed order, registers it with the gateway
//! and persists the pending payment. `verification_creation` consumes the
//! gateway's signed callback and converts the pending payment into issued
//! certificates exactly once.

use chrono::{Months, Utc};
use mongodb::bson::DateTime;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::UrlConfig;
use crate::dtos::{
    CertificateCreationRequest, CertificateCreationResponse, CertificateVerificationResponse,
    PaymentMethodInfo, PaymentValidationResponse,
};
use crate::error::AppError;
use crate::models::{Certificate, Payment, PaymentCustomer, PaymentStatus};
use crate::services::email::{CertificateDelivery, CertificateMailer};
use crate::services::gateway::{
    BillingAddress, GatewayClient, OrderCallbackClaims, OrderLineItem, OrderPayload,
    OrderPaymentMethod,
};
use crate::services::repository::LedgerRepository;
use crate::services::token::TokenCodec;
use crate::utils::encode_qr_png;

const CURRENCY: &str = "EUR";
const LOCALE: &str = "et";
const COUNTRY: &str = "EE";
const SETTLED_STATUS: &str = "PAID";

#[derive(Clone)]
pub struct PaymentOrchestrator {
    repository: LedgerRepository,
    gateway: GatewayClient,
    codec: TokenCodec,
    mailer: Arc<dyn CertificateMailer>,
    gateway_access_key: String,
    urls: UrlConfig,
}

impl PaymentOrchestrator {
    pub fn new(
        repository: LedgerRepository,
        gateway: GatewayClient,
        codec: TokenCodec,
        mailer: Arc<dyn CertificateMailer>,
        gateway_access_key: String,
        urls: UrlConfig,
    ) -> Self {
        Self {
            repository,
            gateway,
            codec,
            mailer,
            gateway_access_key,
            urls,
        }
    }

    /// Start a checkout session: register the order with the gateway and
    /// persist the pending payment with its line items.
    pub async fn initiate_creation(
        &self,
        request: CertificateCreationRequest,
    ) -> Result<CertificateCreationResponse, AppError> {
        let merchant_reference = Uuid::new_v4().to_string();
        let payload = build_order_payload(
            &request,
            &merchant_reference,
            &self.gateway_access_key,
            &self.urls,
        );

        // Gateway first: if the order is refused nothing is persisted.
        let redirect_url = self.gateway.create_order(&payload).await?;

        let sender = self
            .repository
            .find_or_create_user(&request.buyer.from_email, Some(&request.buyer.from_full_name))
            .await?;

        if let Some(business) = &request.business_information {
            self.repository
                .find_or_create_business(business, sender.id)
                .await?;
        }

        let now = DateTime::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            from_email: request.buyer.from_email.clone(),
            from_full_name: request.buyer.from_full_name.clone(),
            status: PaymentStatus::Pending,
            merchant_reference: merchant_reference.clone(),
            customers: request
                .certificates
                .iter()
                .map(|ci| PaymentCustomer {
                    email: ci.email.clone(),
                    greeting: ci.greeting.clone(),
                    greeting_text: ci.greeting_text.clone(),
                    value: ci.nominal_value,
                })
                .collect(),
            created_at: now,
            updated_at: now,
        };
        self.repository.create_payment(payment).await?;

        tracing::info!(
            merchant_reference = %merchant_reference,
            buyer = %request.buyer.from_email,
            certificates = request.certificates.len(),
            grand_total = payload.grand_total,
            "Payment initiated"
        );

        Ok(CertificateCreationResponse { redirect_url })
    }

    /// Handle the gateway's asynchronous settlement callback.
    ///
    /// The PENDING -> PAID transition is claimed with a conditional update,
    /// so duplicate or concurrent callbacks for an already-settled payment
    /// return success without reissuing certificates or resending emails.
    pub async fn verification_creation(
        &self,
        order_token: &str,
    ) -> Result<CertificateVerificationResponse, AppError> {
        let claims: OrderCallbackClaims = self.codec.verify(order_token)?;

        if self
            .repository
            .find_payment_by_merchant_reference(&claims.merchant_reference)
            .await?
            .is_none()
        {
            return Err(AppError::PaymentNotFound(claims.merchant_reference.clone()));
        }

        if claims.payment_status != SETTLED_STATUS || claims.access_key != self.gateway_access_key {
            tracing::warn!(
                merchant_reference = %claims.merchant_reference,
                payment_status = %claims.payment_status,
                "Callback claims do not authorize settlement"
            );
            return Err(AppError::PaymentRejected(
                "payment status or access key does not authorize settlement".to_string(),
            ));
        }

        let Some(claimed) = self
            .repository
            .claim_pending_payment(&claims.merchant_reference)
            .await?
        else {
            // Lost the claim: the payment was settled by an earlier or
            // concurrent callback. Idempotent success, no side effects.
            tracing::info!(
                merchant_reference = %claims.merchant_reference,
                "Payment already settled, skipping reissue"
            );
            return Ok(CertificateVerificationResponse {
                message: "Payment already processed".to_string(),
            });
        };

        match self.issue_certificates(&claimed).await {
            Ok(issued) => {
                tracing::info!(
                    merchant_reference = %claimed.merchant_reference,
                    certificates = issued,
                    "Payment settled and certificates issued"
                );
                Ok(CertificateVerificationResponse {
                    message: "Certificate was successful created and sent to the receiver"
                        .to_string(),
                })
            }
            Err(e) => {
                self.roll_back_issuance(&claimed).await;
                Err(e)
            }
        }
    }

    /// Issue one certificate per line item: resolve the holder account,
    /// persist the certificate, QR-encode the redemption payload and email
    /// the recipient. Any failure aborts the remaining iterations.
    async fn issue_certificates(&self, payment: &Payment) -> Result<usize, AppError> {
        let sender = self
            .repository
            .find_user_by_email(&payment.from_email)
            .await?
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "buyer account missing for payment {}, it must exist from initiation",
                    payment.id
                ))
            })?;

        let valid_until = Utc::now() + Months::new(12);

        for customer in &payment.customers {
            let holder = self
                .repository
                .find_or_create_user(&customer.email, None)
                .await?;

            let certificate = Certificate {
                id: Uuid::new_v4(),
                holder_id: holder.id,
                sender_id: sender.id,
                greeting: customer.greeting.clone(),
                greeting_text: customer.greeting_text.clone(),
                value: customer.value,
                valid_until,
                active: true,
                created_by_admin: false,
                payment_id: payment.id,
                created_at: DateTime::now(),
            };
            self.repository.insert_certificate(&certificate).await?;

            let qr_payload = serde_json::json!({
                "certificate_id": certificate.id.to_string(),
                "name": customer.greeting,
                "remainingValue": format!("{:.2}", customer.value),
            })
            .to_string();
            let qr_code = encode_qr_png(&qr_payload)?;

            let delivery = CertificateDelivery {
                to: customer.email.clone(),
                from: payment.from_full_name.clone(),
                greeting: customer.greeting.clone(),
                description: customer.greeting_text.clone(),
                value: format!("{:.2}€", customer.value),
                valid_until: valid_until.format("%d/%m/%Y").to_string(),
                qr_code,
            };
            self.mailer.send_certificate_email(&delivery).await?;
        }

        Ok(payment.customers.len())
    }

    /// Compensate a failed issuance so no half-issued state survives: drop
    /// the certificates written for this payment, then revert the status to
    /// PENDING, leaving the payment eligible for a later valid callback.
    ///
    /// The claim is released only after the delete succeeded. If the delete
    /// fails the payment stays PAID, so a later callback short-circuits
    /// instead of issuing a second set on top of the leftovers.
    async fn roll_back_issuance(&self, payment: &Payment) {
        match self
            .repository
            .delete_certificates_for_payment(payment.id)
            .await
        {
            Ok(removed) => {
                tracing::warn!(
                    merchant_reference = %payment.merchant_reference,
                    removed,
                    "Rolled back certificates after failed issuance"
                );
                if let Err(e) = self
                    .repository
                    .release_claimed_payment(&payment.merchant_reference)
                    .await
                {
                    tracing::error!(
                        merchant_reference = %payment.merchant_reference,
                        error = %e,
                        "Failed to revert payment status to PENDING"
                    );
                }
            }
            Err(e) => {
                tracing::error!(
                    merchant_reference = %payment.merchant_reference,
                    error = %e,
                    "Failed to roll back certificates, payment stays PAID"
                );
            }
        }
    }

    /// Lightweight token pre-check for the front end. No ledger access.
    pub fn validate_token(&self, order_token: &str) -> PaymentValidationResponse {
        PaymentValidationResponse {
            success: self.codec.is_valid(order_token),
        }
    }

    /// Proxy the gateway payment-methods catalog, grouped by country.
    pub async fn payment_methods(
        &self,
    ) -> Result<BTreeMap<String, Vec<PaymentMethodInfo>>, AppError> {
        self.gateway.payment_methods().await
    }
}

/// Assemble the typed gateway order payload for a checkout request. The
/// grand total is the exact sum of the line-item nominal values.
pub fn build_order_payload(
    request: &CertificateCreationRequest,
    merchant_reference: &str,
    access_key: &str,
    urls: &UrlConfig,
) -> OrderPayload {
    let grand_total: f64 = request.certificates.iter().map(|ci| ci.nominal_value).sum();

    OrderPayload {
        access_key: access_key.to_string(),
        merchant_reference: merchant_reference.to_string(),
        return_url: format!(
            "{}/personal-coupon-order/order-details",
            urls.frontend_base_url
        ),
        notification_url: format!(
            "{}{}/payment/verificationCreation",
            urls.api_base_url, urls.api_base_path
        ),
        grand_total,
        currency: CURRENCY.to_string(),
        payment: OrderPaymentMethod {
            method: "paymentInitiation".to_string(),
            currency: CURRENCY.to_string(),
            amount: grand_total,
        },
        billing_address: BillingAddress {
            first_name: request.buyer.from_full_name.clone(),
            last_name: request
                .business_information
                .as_ref()
                .map(|b| b.business_name.clone()),
            email: request.buyer.from_email.clone(),
            phone_number: request.buyer.from_phone.clone(),
            address_line1: format!(
                "{} - {}",
                request.address.street, request.address.apartment_number
            ),
            locality: request.address.city.clone(),
            region: request.address.state.clone(),
            postal_code: request.address.zip_code.clone(),
            country: COUNTRY.to_string(),
        },
        locale: LOCALE.to_string(),
        line_items: request
            .certificates
            .iter()
            .map(|ci| OrderLineItem {
                name: format!("Certificate - {}", ci.greeting),
                quantity: 1,
                final_price: ci.nominal_value,
            })
            .collect(),
    }
}
