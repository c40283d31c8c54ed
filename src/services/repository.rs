//! Payment ledger backed by MongoDB.
//!
//! Payments embed their line items, so initiation persists everything in a
//! single atomic document insert. The PENDING -> PAID transition is a
//! conditional update, so only one of several concurrent verification calls
//! for the same merchant reference can claim the payment.

use mongodb::bson::{doc, to_bson, Bson, DateTime};
use mongodb::options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};
use uuid::Uuid;

use crate::dtos::BusinessInformation;
use crate::error::AppError;
use crate::models::{Business, Certificate, Payment, PaymentStatus, User, CUSTOMER_ROLE};

#[derive(Clone)]
pub struct LedgerRepository {
    payments: Collection<Payment>,
    certificates: Collection<Certificate>,
    users: Collection<User>,
    businesses: Collection<Business>,
}

fn status_bson(status: &PaymentStatus) -> Result<Bson, AppError> {
    to_bson(status).map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
}

/// E11000: an insert or upsert collided with a unique index.
fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        ErrorKind::Command(command_error) => command_error.code == 11000,
        _ => false,
    }
}

impl LedgerRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            payments: db.collection("payments"),
            certificates: db.collection("certificates"),
            users: db.collection("users"),
            businesses: db.collection("businesses"),
        }
    }

    /// Initialize indexes. The unique index on `merchant_reference` backs the
    /// idempotency-key uniqueness invariant.
    pub async fn init_indexes(&self) -> Result<(), AppError> {
        let merchant_reference_index = IndexModel::builder()
            .keys(doc! { "merchant_reference": 1 })
            .options(
                IndexOptions::builder()
                    .name("merchant_reference_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();
        self.payments
            .create_index(merchant_reference_index, None)
            .await?;

        let user_email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .name("user_email_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();
        self.users.create_index(user_email_index, None).await?;

        let business_key_index = IndexModel::builder()
            .keys(doc! { "register_code": 1, "representative_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("business_natural_key_idx".to_string())
                    .build(),
            )
            .build();
        self.businesses
            .create_index(business_key_index, None)
            .await?;

        let certificate_payment_index = IndexModel::builder()
            .keys(doc! { "payment_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("certificate_payment_idx".to_string())
                    .build(),
            )
            .build();
        self.certificates
            .create_index(certificate_payment_index, None)
            .await?;

        tracing::info!("Certificate ledger indexes initialized");
        Ok(())
    }

    pub async fn create_payment(&self, payment: Payment) -> Result<(), AppError> {
        self.payments.insert_one(payment, None).await?;
        Ok(())
    }

    pub async fn find_payment_by_merchant_reference(
        &self,
        merchant_reference: &str,
    ) -> Result<Option<Payment>, AppError> {
        let filter = doc! { "merchant_reference": merchant_reference };
        let payment = self.payments.find_one(filter, None).await?;
        Ok(payment)
    }

    /// Atomically claim a payment for settlement: PENDING -> PAID, first
    /// caller wins. Returns `None` when no pending payment matched, which
    /// means the payment is missing or already settled.
    pub async fn claim_pending_payment(
        &self,
        merchant_reference: &str,
    ) -> Result<Option<Payment>, AppError> {
        let filter = doc! {
            "merchant_reference": merchant_reference,
            "status": status_bson(&PaymentStatus::Pending)?,
        };
        let update = doc! {
            "$set": {
                "status": status_bson(&PaymentStatus::Paid)?,
                "updated_at": DateTime::now(),
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let payment = self
            .payments
            .find_one_and_update(filter, update, options)
            .await?;
        Ok(payment)
    }

    /// Compensation for a failed issuance: revert PAID -> PENDING so a
    /// corrected callback can retry.
    pub async fn release_claimed_payment(&self, merchant_reference: &str) -> Result<(), AppError> {
        let filter = doc! {
            "merchant_reference": merchant_reference,
            "status": status_bson(&PaymentStatus::Paid)?,
        };
        let update = doc! {
            "$set": {
                "status": status_bson(&PaymentStatus::Pending)?,
                "updated_at": DateTime::now(),
            }
        };
        self.payments.update_one(filter, update, None).await?;
        Ok(())
    }

    pub async fn insert_certificate(&self, certificate: &Certificate) -> Result<(), AppError> {
        self.certificates
            .insert_one(certificate.clone(), None)
            .await?;
        Ok(())
    }

    /// Compensation for a failed issuance: remove any certificates already
    /// written for this payment.
    pub async fn delete_certificates_for_payment(
        &self,
        payment_id: Uuid,
    ) -> Result<u64, AppError> {
        let filter = doc! { "payment_id": payment_id.to_string() };
        let result = self.certificates.delete_many(filter, None).await?;
        Ok(result.deleted_count)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let filter = doc! { "email": email };
        let user = self.users.find_one(filter, None).await?;
        Ok(user)
    }

    /// Resolve a user by email, lazily creating an unactivated customer-role
    /// account when the email has never been seen. Idempotent upsert; when
    /// two first-time upserts race on the unique email index, the loser
    /// re-reads the row the winner inserted.
    pub async fn find_or_create_user(
        &self,
        email: &str,
        full_name: Option<&str>,
    ) -> Result<User, AppError> {
        let filter = doc! { "email": email };
        let update = doc! {
            "$setOnInsert": {
                "_id": Uuid::new_v4().to_string(),
                "email": email,
                "full_name": full_name,
                "activated": false,
                "roles": [CUSTOMER_ROLE],
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let user = match self
            .users
            .find_one_and_update(filter.clone(), update, options)
            .await
        {
            Ok(user) => user,
            Err(e) if is_duplicate_key(&e) => self.users.find_one(filter, None).await?,
            Err(e) => return Err(e.into()),
        };

        user.ok_or_else(|| {
            AppError::DatabaseError(anyhow::anyhow!("upsert returned no user for {}", email))
        })
    }

    /// Upsert a business by its natural key (register code + representative).
    /// An equivalent existing record is left untouched.
    pub async fn find_or_create_business(
        &self,
        info: &BusinessInformation,
        representative_id: Uuid,
    ) -> Result<(), AppError> {
        let filter = doc! {
            "register_code": info.register_code,
            "representative_id": representative_id.to_string(),
        };

        if self.businesses.find_one(filter, None).await?.is_some() {
            return Ok(());
        }

        let business = Business {
            id: Uuid::new_v4(),
            business_name: info.business_name.clone(),
            register_code: info.register_code,
            business_kmkr: info.business_kmkr.clone(),
            representative_id,
        };
        self.businesses.insert_one(business, None).await?;
        Ok(())
    }
}
