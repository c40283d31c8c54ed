pub mod email;
pub mod gateway;
pub mod orchestrator;
pub mod repository;
pub mod token;

pub use gateway::GatewayClient;
pub use orchestrator::PaymentOrchestrator;
pub use repository::LedgerRepository;
pub use token::TokenCodec;
