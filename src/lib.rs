pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use mongodb::{options::ClientOptions, Client};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use config::Config;
use services::email::{CertificateMailer, MockMailer, SmtpMailer};
use services::{GatewayClient, LedgerRepository, PaymentOrchestrator, TokenCodec};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: PaymentOrchestrator,
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
    db: mongodb::Database,
}

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let mailer: Arc<dyn CertificateMailer> = if config.smtp.enabled {
            Arc::new(SmtpMailer::new(config.smtp.clone())?)
        } else {
            tracing::warn!("SMTP disabled - certificate emails will not leave the process");
            Arc::new(MockMailer::new())
        };
        Self::build_with_mailer(config, mailer).await
    }

    /// Build with an explicit mailer. Tests pass a `MockMailer` here to
    /// observe dispatched certificate emails.
    pub async fn build_with_mailer(
        config: Config,
        mailer: Arc<dyn CertificateMailer>,
    ) -> anyhow::Result<Self> {
        let mut client_options = ClientOptions::parse(config.database.url.expose_secret()).await?;
        client_options.app_name = Some("certificate-service".to_string());

        let client = Client::with_options(client_options)?;
        let db = client.database(&config.database.db_name);

        let repository = LedgerRepository::new(&db);
        repository.init_indexes().await?;

        let codec = TokenCodec::new(config.gateway.secret_key.clone());
        let gateway = GatewayClient::new(config.gateway.clone(), codec.clone())?;
        let orchestrator = PaymentOrchestrator::new(
            repository,
            gateway,
            codec,
            mailer,
            config.gateway.access_key.clone(),
            config.urls.clone(),
        );

        let state = AppState { orchestrator };

        // Only the storefront origin may call this API from a browser.
        let cors = CorsLayer::new()
            .allow_origin(
                config
                    .urls
                    .frontend_base_url
                    .parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid frontend origin: {}", e))?,
            )
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]);

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route(
                "/payment/initiateCreation",
                post(handlers::payment::initiate_creation),
            )
            .route(
                "/payment/verificationCreation",
                post(handlers::payment::verification_creation),
            )
            .route(
                "/payment/validate",
                post(handlers::payment::validate_payment),
            )
            .route("/payment/methods", get(handlers::payment::payment_methods))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                }),
            )
            .layer(cors)
            .with_state(state);

        // Port 0 picks a random free port, used by the test harness.
        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router,
            db,
        })
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        tracing::info!("Listening on {}", self.listener.local_addr()?);
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn db(&self) -> &mongodb::Database {
        &self.db
    }
}
