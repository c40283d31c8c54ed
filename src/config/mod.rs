use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    pub smtp: SmtpConfig,
    pub urls: UrlConfig,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub db_name: String,
}

/// Payment gateway connection settings. The secret key signs outbound order
/// tokens and verifies inbound callback tokens; the access key authorizes
/// callbacks at the claims level.
#[derive(Deserialize, Clone, Debug)]
pub struct GatewayConfig {
    pub api_base_url: String,
    pub access_key: String,
    pub secret_key: Secret<String>,
    pub timeout_seconds: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret<String>,
    pub from_email: String,
    pub from_name: String,
}

/// Base URLs used to assemble the buyer return URL and the gateway
/// notification (webhook) URL embedded in outbound order payloads.
#[derive(Deserialize, Clone, Debug)]
pub struct UrlConfig {
    pub frontend_base_url: String,
    pub api_base_url: String,
    pub api_base_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("CERTIFICATE_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("CERTIFICATE_SERVICE_PORT")
            .unwrap_or_else(|_| "3005".to_string())
            .parse()?;

        let db_url =
            env::var("CERTIFICATE_DATABASE_URL").expect("CERTIFICATE_DATABASE_URL must be set");
        let db_name =
            env::var("CERTIFICATE_DATABASE_NAME").unwrap_or_else(|_| "certificate_db".to_string());

        let gateway_url = env::var("GATEWAY_API_URL").expect("GATEWAY_API_URL must be set");
        let gateway_access_key =
            env::var("GATEWAY_ACCESS_KEY").expect("GATEWAY_ACCESS_KEY must be set");
        let gateway_secret_key =
            env::var("GATEWAY_SECRET_KEY").expect("GATEWAY_SECRET_KEY must be set");
        let gateway_timeout = env::var("GATEWAY_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;

        let smtp_enabled = env::var("SMTP_ENABLED")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);
        let smtp_host = env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string());
        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse()?;
        let smtp_user = env::var("SMTP_USER").unwrap_or_default();
        let smtp_password = env::var("SMTP_PASSWORD").unwrap_or_default();
        let smtp_from_email =
            env::var("SMTP_FROM_EMAIL").unwrap_or_else(|_| "noreply@localhost".to_string());
        let smtp_from_name =
            env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Certificate Service".to_string());

        let frontend_base_url =
            env::var("FRONTEND_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let api_base_url =
            env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:3005".to_string());
        let api_base_path = env::var("API_BASE_PATH").unwrap_or_else(|_| "/api/v1".to_string());

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                db_name,
            },
            gateway: GatewayConfig {
                api_base_url: gateway_url,
                access_key: gateway_access_key,
                secret_key: Secret::new(gateway_secret_key),
                timeout_seconds: gateway_timeout,
            },
            smtp: SmtpConfig {
                enabled: smtp_enabled,
                host: smtp_host,
                port: smtp_port,
                user: smtp_user,
                password: Secret::new(smtp_password),
                from_email: smtp_from_email,
                from_name: smtp_from_name,
            },
            urls: UrlConfig {
                frontend_base_url,
                api_base_url,
                api_base_path,
            },
        })
    }
}
