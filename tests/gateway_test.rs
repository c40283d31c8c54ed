//! Gateway client tests against a wiremock server: happy path, the three
//! failure modes, and the wire framing of the signed order request.

use certificate_service::config::GatewayConfig;
use certificate_service::error::AppError;
use certificate_service::services::gateway::{
    BillingAddress, GatewayClient, OrderLineItem, OrderPayload, OrderPaymentMethod,
};
use certificate_service::services::TokenCodec;
use secrecy::Secret;
use serde_json::json;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "gateway-secret";

fn client_for(base_url: &str) -> GatewayClient {
    let config = GatewayConfig {
        api_base_url: base_url.to_string(),
        access_key: "access-key".to_string(),
        secret_key: Secret::new(SECRET.to_string()),
        timeout_seconds: 5,
    };
    GatewayClient::new(config, TokenCodec::new(Secret::new(SECRET.to_string())))
        .expect("Failed to build gateway client")
}

fn order_payload() -> OrderPayload {
    OrderPayload {
        access_key: "access-key".to_string(),
        merchant_reference: "ref-42".to_string(),
        return_url: "https://shop.test/personal-coupon-order/order-details".to_string(),
        notification_url: "https://api.test/api/v1/payment/verificationCreation".to_string(),
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
        line_items: vec![
            OrderLineItem {
                name: "Certificate - Anna".to_string(),
                quantity: 1,
                final_price: 10.0,
            },
            OrderLineItem {
                name: "Certificate - Jaan".to_string(),
                quantity: 1,
                final_price: 15.0,
            },
        ],
    }
}

#[tokio::test]
async fn create_order_returns_redirect_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "paymentUrl": "https://gateway.test/pay/abc" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let url = client
        .create_order(&order_payload())
        .await
        .expect("Order creation failed");

    assert_eq!(url, "https://gateway.test/pay/abc");
}

#[tokio::test]
async fn create_order_posts_a_signed_token_carrying_the_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "paymentUrl": "https://gateway.test/pay/abc" })),
        )
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    client
        .create_order(&order_payload())
        .await
        .expect("Order creation failed");

    let requests = server
        .received_requests()
        .await
        .expect("Request recording disabled");
    assert_eq!(requests.len(), 1);

    let body: serde_json::Value =
        serde_json::from_slice(&requests[0].body).expect("Body is not JSON");
    let token = body["data"].as_str().expect("Missing data field");

    // The token must verify against the shared secret and carry the order
    // payload as claims.
    let codec = TokenCodec::new(Secret::new(SECRET.to_string()));
    let claims: serde_json::Value = codec.verify(token).expect("Token does not verify");
    assert_eq!(claims["accessKey"], "access-key");
    assert_eq!(claims["merchantReference"], "ref-42");
    assert_eq!(claims["grandTotal"], 25.0);
    assert_eq!(claims["lineItems"].as_array().unwrap().len(), 2);
    assert!(claims["exp"].as_i64().is_some());
}

#[tokio::test]
async fn non_success_status_is_gateway_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(422).set_body_string("no such store"))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let result = client.create_order(&order_payload()).await;

    match result {
        Err(AppError::GatewayRejected { status, body }) => {
            assert_eq!(status, 422);
            assert_eq!(body, "no such store");
        }
        other => panic!("Expected GatewayRejected, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn malformed_response_is_gateway_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let result = client.create_order(&order_payload()).await;

    assert!(matches!(result, Err(AppError::GatewayProtocol(_))));
}

#[tokio::test]
async fn unreachable_gateway_is_gateway_unavailable() {
    // Nothing listens on port 1.
    let client = client_for("http://127.0.0.1:1");
    let result = client.create_order(&order_payload()).await;

    assert!(matches!(result, Err(AppError::GatewayUnavailable(_))));
}

#[tokio::test]
async fn payment_methods_are_grouped_by_country() {
    let server = MockServer::start().await;
    // The catalog request must authenticate with a bearer token.
    Mock::given(method("GET"))
        .and(path("/stores/payment-methods"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "paymentMethods": {
                "paymentInitiation": {
                    "setup": {
                        "EE": {
                            "paymentMethods": [
                                { "name": "Test Pank", "code": "test_ee", "logoUrl": "https://gateway.test/logos/test_ee.png" }
                            ]
                        },
                        "FI": {
                            "paymentMethods": [
                                { "name": "Suomi Pankki", "code": "suomi_fi", "logoUrl": "https://gateway.test/logos/suomi_fi.png" },
                                { "name": "Toinen Pankki", "code": "toinen_fi", "logoUrl": "https://gateway.test/logos/toinen_fi.png" }
                            ]
                        }
                    }
                }
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let methods = client
        .payment_methods()
        .await
        .expect("Catalog fetch failed");

    assert_eq!(methods.len(), 2);
    assert_eq!(methods["EE"].len(), 1);
    assert_eq!(methods["EE"][0].payment_code, "test_ee");
    assert_eq!(methods["FI"].len(), 2);
    assert_eq!(methods["FI"][1].payment_name, "Toinen Pankki");
}
