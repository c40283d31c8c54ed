//! Payment gateway client.
//!
//! Implements the gateway's signed-token order API: order creation for
//! payment initiation and the payment-methods catalog. Callback tokens are
//! verified elsewhere; this module owns the wire schema.

use chrono::Duration;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::GatewayConfig;
use crate::dtos::PaymentMethodInfo;
use crate::error::AppError;
use crate::services::token::TokenCodec;

#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    config: GatewayConfig,
    codec: TokenCodec,
}

/// Order payload signed into the outbound token. Field names follow the
/// gateway's camelCase wire format.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub access_key: String,
    pub merchant_reference: String,
    pub return_url: String,
    pub notification_url: String,
    pub grand_total: f64,
    pub currency: String,
    pub payment: OrderPaymentMethod,
    pub billing_address: BillingAddress,
    pub locale: String,
    pub line_items: Vec<OrderLineItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPaymentMethod {
    pub method: String,
    pub currency: String,
    pub amount: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingAddress {
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub email: String,
    pub phone_number: String,
    pub address_line1: String,
    pub locality: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    pub name: String,
    pub quantity: u32,
    pub final_price: f64,
}

/// Claims the gateway signs into its asynchronous status callback.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCallbackClaims {
    pub merchant_reference: String,
    pub payment_status: String,
    pub access_key: String,
}

#[derive(Serialize)]
struct SignedOrderRequest {
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    payment_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CatalogClaims {
    access_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentMethodsResponse {
    payment_methods: PaymentMethodCatalog,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentMethodCatalog {
    payment_initiation: PaymentInitiationMethods,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentInitiationMethods {
    setup: BTreeMap<String, CountryMethods>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountryMethods {
    payment_methods: Vec<PaymentMethodEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentMethodEntry {
    name: String,
    code: String,
    logo_url: String,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig, codec: TokenCodec) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

        Ok(Self {
            client,
            config,
            codec,
        })
    }

    /// Create an order at the gateway and return the buyer redirect URL.
    ///
    /// Single attempt, no retries; retry policy belongs to the caller.
    pub async fn create_order(&self, payload: &OrderPayload) -> Result<String, AppError> {
        let token = self.codec.sign(payload, Duration::minutes(10))?;
        let url = format!("{}/orders", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .json(&SignedOrderRequest { data: token })
            .send()
            .await
            .map_err(|e| AppError::GatewayUnavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::GatewayUnavailable(e.to_string()))?;

        tracing::debug!(status = %status, body = %body, "Gateway create_order response");

        if !status.is_success() {
            tracing::error!(
                status = %status,
                merchant_reference = %payload.merchant_reference,
                "Gateway rejected order creation"
            );
            return Err(AppError::GatewayRejected {
                status: status.as_u16(),
                body,
            });
        }

        let order: OrderResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::GatewayProtocol(format!("Malformed order response: {}", e)))?;

        tracing::info!(
            merchant_reference = %payload.merchant_reference,
            grand_total = payload.grand_total,
            "Gateway order created"
        );

        Ok(order.payment_url)
    }

    /// Fetch the gateway payment-methods catalog, grouped by country.
    pub async fn payment_methods(
        &self,
    ) -> Result<BTreeMap<String, Vec<PaymentMethodInfo>>, AppError> {
        let token = self.codec.sign(
            &CatalogClaims {
                access_key: self.config.access_key.clone(),
            },
            Duration::hours(1),
        )?;
        let url = format!("{}/stores/payment-methods", self.config.api_base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::GatewayUnavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::GatewayUnavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(AppError::GatewayRejected {
                status: status.as_u16(),
                body,
            });
        }

        let catalog: PaymentMethodsResponse = serde_json::from_str(&body).map_err(|e| {
            AppError::GatewayProtocol(format!("Malformed payment-methods response: {}", e))
        })?;

        let mut grouped = BTreeMap::new();
        for (country, methods) in catalog.payment_methods.payment_initiation.setup {
            let entries = methods
                .payment_methods
                .into_iter()
                .map(|m| PaymentMethodInfo {
                    payment_name: m.name,
                    payment_code: m.code,
                    logo_url: m.logo_url,
                })
                .collect();
            grouped.insert(country, entries);
        }

        Ok(grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_payload_serializes_with_gateway_field_names() {
        let payload = OrderPayload {
            access_key: "ak".to_string(),
            merchant_reference: "ref-1".to_string(),
            return_url: "https://shop.example/return".to_string(),
            notification_url: "https://api.example/payment/verificationCreation".to_string(),
            grand_total: 25.0,
            currency: "EUR".to_string(),
            payment: OrderPaymentMethod {
                method: "paymentInitiation".to_string(),
                currency: "EUR".to_string(),
                amount: 25.0,
            },
            billing_address: BillingAddress {
                first_name: "Mari Maasikas".to_string(),
                last_name: None,
                email: "mari@example.com".to_string(),
                phone_number: "+3725551234".to_string(),
                address_line1: "Pikk 12 - 4".to_string(),
                locality: "Tallinn".to_string(),
                region: "Harjumaa".to_string(),
                postal_code: "10123".to_string(),
                country: "EE".to_string(),
            },
            locale: "et".to_string(),
            line_items: vec![OrderLineItem {
                name: "Certificate - Anna".to_string(),
                quantity: 1,
                final_price: 25.0,
            }],
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["accessKey"], "ak");
        assert_eq!(json["merchantReference"], "ref-1");
        assert_eq!(json["grandTotal"], 25.0);
        assert_eq!(json["notificationUrl"].as_str().unwrap(), payload.notification_url);
        assert_eq!(json["billingAddress"]["addressLine1"], "Pikk 12 - 4");
        assert_eq!(json["lineItems"][0]["finalPrice"], 25.0);
        // Absent business name must not serialize a null lastName.
        assert!(json["billingAddress"].get("lastName").is_none());
    }

    #[test]
    fn callback_claims_deserialize_from_gateway_names() {
        let claims: OrderCallbackClaims = serde_json::from_str(
            r#"{"merchantReference":"ref-9","paymentStatus":"PAID","accessKey":"ak"}"#,
        )
        .unwrap();
        assert_eq!(claims.merchant_reference, "ref-9");
        assert_eq!(claims.payment_status, "PAID");
        assert_eq!(claims.access_key, "ak");
    }
}
