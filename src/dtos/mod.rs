use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request body for `POST /payment/initiateCreation`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CertificateCreationRequest {
    #[validate(nested)]
    pub buyer: BuyerInformation,
    #[validate(nested)]
    pub address: AddressInformation,
    #[validate(nested)]
    pub business_information: Option<BusinessInformation>,
    #[validate(length(min = 1, message = "at least one certificate is required"), nested)]
    pub certificates: Vec<CertificateInformation>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BuyerInformation {
    #[validate(length(min = 1))]
    pub from_full_name: String,
    #[validate(email)]
    pub from_email: String,
    #[validate(length(min = 1))]
    pub from_phone: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressInformation {
    #[validate(length(min = 1))]
    pub street: String,
    pub apartment_number: String,
    #[validate(length(min = 1))]
    pub city: String,
    pub state: String,
    #[validate(length(min = 1))]
    pub zip_code: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BusinessInformation {
    #[validate(length(min = 1))]
    pub business_name: String,
    pub register_code: i64,
    pub business_kmkr: Option<String>,
}

/// One certificate line item: the recipient and the nominal value bought
/// for them.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInformation {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub greeting: String,
    pub greeting_text: String,
    #[validate(range(min = 0.0))]
    pub nominal_value: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateCreationResponse {
    pub redirect_url: String,
}

/// Request body for `POST /payment/verificationCreation`, carrying the
/// gateway's signed callback token.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateVerificationRequest {
    pub order_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateVerificationResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentValidationRequest {
    pub order_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentValidationResponse {
    pub success: bool,
}

/// One entry of the gateway payment-methods catalog, as exposed to the
/// front end.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodInfo {
    pub payment_name: String,
    pub payment_code: String,
    pub logo_url: String,
}
