//! Payment endpoints: checkout initiation, the gateway's settlement
//! callback, token pre-validation and the payment-methods catalog.

use axum::{extract::State, Json};
use std::collections::BTreeMap;
use validator::Validate;

use crate::dtos::{
    CertificateCreationRequest, CertificateCreationResponse, CertificateVerificationRequest,
    CertificateVerificationResponse, PaymentMethodInfo, PaymentValidationRequest,
    PaymentValidationResponse,
};
use crate::error::AppError;
use crate::AppState;

/// `POST /payment/initiateCreation`: start a checkout session and return
/// the gateway redirect URL for the buyer's browser.
pub async fn initiate_creation(
    State(state): State<AppState>,
    Json(payload): Json<CertificateCreationRequest>,
) -> Result<Json<CertificateCreationResponse>, AppError> {
    payload.validate()?;

    tracing::info!(
        buyer = %payload.buyer.from_email,
        certificates = payload.certificates.len(),
        "Initiating certificate payment"
    );

    let response = state.orchestrator.initiate_creation(payload).await?;
    Ok(Json(response))
}

/// `POST /payment/verificationCreation`: the gateway's asynchronous
/// settlement callback.
pub async fn verification_creation(
    State(state): State<AppState>,
    Json(payload): Json<CertificateVerificationRequest>,
) -> Result<Json<CertificateVerificationResponse>, AppError> {
    let response = state
        .orchestrator
        .verification_creation(&payload.order_token)
        .await?;
    Ok(Json(response))
}

/// `POST /payment/validate`: boolean token pre-check used by the front end
/// on the return URL before calling the full verification endpoint.
pub async fn validate_payment(
    State(state): State<AppState>,
    Json(payload): Json<PaymentValidationRequest>,
) -> Json<PaymentValidationResponse> {
    Json(state.orchestrator.validate_token(&payload.order_token))
}

/// `GET /payment/methods`: gateway payment-methods catalog grouped by
/// country.
pub async fn payment_methods(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, Vec<PaymentMethodInfo>>>, AppError> {
    let methods = state.orchestrator.payment_methods().await?;
    Ok(Json(methods))
}
