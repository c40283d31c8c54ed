use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role given to lazily created buyer/holder accounts.
pub const CUSTOMER_ROLE: &str = "ROLE_CUSTOMER";

/// One checkout session. Line items are embedded so that initiation persists
/// the payment and its recipients in a single atomic document insert.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Payment {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub from_email: String,
    pub from_full_name: String,
    pub status: PaymentStatus,
    /// Idempotency key correlating the outbound order request with its
    /// eventual callback. Unique-indexed, immutable after creation.
    pub merchant_reference: String,
    pub customers: Vec<PaymentCustomer>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Status is monotonic: PENDING -> PAID, at most once.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

/// One purchased certificate's intended recipient, captured at checkout
/// time. Immutable; consumed read-only during verification.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PaymentCustomer {
    pub email: String,
    pub greeting: String,
    pub greeting_text: String,
    pub value: f64,
}

/// The redeemable value instrument, created only by a PAID transition.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Certificate {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub holder_id: Uuid,
    pub sender_id: Uuid,
    pub greeting: String,
    pub greeting_text: String,
    pub value: f64,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub valid_until: chrono::DateTime<chrono::Utc>,
    pub active: bool,
    pub created_by_admin: bool,
    pub payment_id: Uuid,
    pub created_at: DateTime,
}

/// User record keyed by email, lazily created with an unactivated
/// customer-role account the first time an email is seen.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub activated: bool,
    pub roles: Vec<String>,
}

/// Business record attached to a buyer, de-duplicated by its natural key
/// (register_code, representative_id).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Business {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub business_name: String,
    pub register_code: i64,
    pub business_kmkr: Option<String>,
    pub representative_id: Uuid,
}
