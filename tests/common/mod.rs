#![allow(dead_code)]

use certificate_service::config::{
    Config, DatabaseConfig, GatewayConfig, ServerConfig, SmtpConfig, UrlConfig,
};
use certificate_service::services::email::MockMailer;
use certificate_service::services::gateway::OrderCallbackClaims;
use certificate_service::services::TokenCodec;
use certificate_service::Application;
use secrecy::Secret;
use std::sync::Arc;

pub const TEST_GATEWAY_SECRET: &str = "test-gateway-secret";
pub const TEST_ACCESS_KEY: &str = "test-access-key";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub db: mongodb::Database,
    pub db_name: String,
    pub mailer: Arc<MockMailer>,
}

impl TestApp {
    /// Spawn the application against a fresh database, with the gateway
    /// pointed at `gateway_base_url` (usually a wiremock server) and a mock
    /// mailer recording deliveries.
    pub async fn spawn(gateway_base_url: &str) -> Self {
        let db_name = format!("certificate_test_{}", uuid::Uuid::new_v4());

        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Random port
            },
            database: DatabaseConfig {
                url: Secret::new(
                    std::env::var("TEST_MONGODB_URI")
                        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
                ),
                db_name: db_name.clone(),
            },
            gateway: GatewayConfig {
                api_base_url: gateway_base_url.to_string(),
                access_key: TEST_ACCESS_KEY.to_string(),
                secret_key: Secret::new(TEST_GATEWAY_SECRET.to_string()),
                timeout_seconds: 5,
            },
            smtp: SmtpConfig {
                enabled: false,
                host: "localhost".to_string(),
                port: 587,
                user: String::new(),
                password: Secret::new(String::new()),
                from_email: "noreply@test.local".to_string(),
                from_name: "Certificate Service Test".to_string(),
            },
            urls: UrlConfig {
                frontend_base_url: "https://shop.test".to_string(),
                api_base_url: "https://api.test".to_string(),
                api_base_path: "/api/v1".to_string(),
            },
        };

        let mailer = Arc::new(MockMailer::new());
        let app = Application::build_with_mailer(config, mailer.clone())
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);
        let db = app.db().clone();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the HTTP server to be ready by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            db,
            db_name,
            mailer,
        }
    }

    /// Sign a gateway settlement callback token with the test secret.
    pub fn sign_callback(
        merchant_reference: &str,
        payment_status: &str,
        access_key: &str,
        ttl: chrono::Duration,
    ) -> String {
        sign_callback_with_secret(
            TEST_GATEWAY_SECRET,
            merchant_reference,
            payment_status,
            access_key,
            ttl,
        )
    }

    pub async fn cleanup(&self) {
        self.db
            .drop(None)
            .await
            .expect("Failed to drop test database");
    }
}

pub fn sign_callback_with_secret(
    secret: &str,
    merchant_reference: &str,
    payment_status: &str,
    access_key: &str,
    ttl: chrono::Duration,
) -> String {
    let codec = TokenCodec::new(Secret::new(secret.to_string()));
    codec
        .sign(
            &OrderCallbackClaims {
                merchant_reference: merchant_reference.to_string(),
                payment_status: payment_status.to_string(),
                access_key: access_key.to_string(),
            },
            ttl,
        )
        .expect("Failed to sign callback token")
}
