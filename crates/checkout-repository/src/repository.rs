use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{RepositoryError, RepositoryResult};
use crate::models::{
    CheckoutRecord, InvoicePeriod, MasterAccount, PaymentMethod, PaymentOutcome, PaymentResult,
    Subscription, SubscriptionStatus, TempCardBundle, TransactionRecord, User, UserStatus,
};

/// Entry point for all persistence in this workspace: a pooled connection
/// plus the transactional `begin()` handle used by the Persist step.
#[derive(Clone)]
pub struct Repository {
    pool: PgPool,
}

impl Repository {
    pub fn new(pool: PgPool) -> Self {
        Repository { pool }
    }

    pub async fn connect(database_url: &str) -> RepositoryResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(RepositoryError::from)?;
        Ok(Repository { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Open one transaction covering every write the Persist step makes.
    /// Dropping the handle without calling `commit` rolls back, matching
    /// `sqlx::Transaction`'s own `Drop` semantics.
    pub async fn begin(&self) -> RepositoryResult<PersistTransaction<'_>> {
        let tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        Ok(PersistTransaction { tx })
    }

    pub async fn find_checkout(&self, checkout_id: &str) -> RepositoryResult<CheckoutRecord> {
        sqlx::query_as::<_, CheckoutRecord>(
            "SELECT checkout_id, customer_name, customer_email, username, address, \
             passphrase_hash, plans, created_at FROM checkout_records WHERE checkout_id = $1",
        )
        .bind(checkout_id)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }

    pub async fn find_temp_card_bundle(
        &self,
        checkout_id: &str,
    ) -> RepositoryResult<Option<TempCardBundle>> {
        sqlx::query_as::<_, TempCardBundle>(
            "SELECT checkout_id, pan, expiry_month, expiry_year, cvv, cardholder_name, created_at \
             FROM temp_card_bundles WHERE checkout_id = $1",
        )
        .bind(checkout_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }

    /// Idempotent under replay: deleting an already-gone bundle is a no-op.
    pub async fn delete_temp_card_bundle(&self, checkout_id: &str) -> RepositoryResult<()> {
        sqlx::query("DELETE FROM temp_card_bundles WHERE checkout_id = $1")
            .bind(checkout_id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }

    pub async fn find_payment_result(
        &self,
        request_id: &str,
    ) -> RepositoryResult<Option<PaymentResult>> {
        sqlx::query_as::<_, PaymentResult>(
            "SELECT request_id, checkout_id, status, transaction_id, error_message, updated_at \
             FROM payment_results WHERE request_id = $1",
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }

    /// Idempotent upsert: a replayed workflow run overwrites its own prior
    /// outcome row rather than erroring on the unique `request_id`.
    pub async fn upsert_payment_result(
        &self,
        request_id: &str,
        checkout_id: &str,
        status: PaymentOutcome,
        transaction_id: Option<&str>,
        error_message: Option<&str>,
    ) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO payment_results (request_id, checkout_id, status, transaction_id, error_message, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (request_id) DO UPDATE SET \
             status = EXCLUDED.status, transaction_id = EXCLUDED.transaction_id, \
             error_message = EXCLUDED.error_message, updated_at = EXCLUDED.updated_at",
        )
        .bind(request_id)
        .bind(checkout_id)
        .bind(status)
        .bind(transaction_id)
        .bind(error_message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    pub async fn find_master_account_by_checkout(
        &self,
        checkout_id: &str,
    ) -> RepositoryResult<Option<MasterAccount>> {
        sqlx::query_as::<_, MasterAccount>(
            "SELECT master_reference, checkout_id, created_at FROM master_accounts \
             WHERE checkout_id = $1",
        )
        .bind(checkout_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }

    /// Terminal-failure side effect: idempotent, safe to call more than once.
    pub async fn mark_user_inactive(&self, master_reference: Uuid) -> RepositoryResult<()> {
        sqlx::query(
            "UPDATE users SET status = $2 WHERE master_reference = $1",
        )
        .bind(master_reference)
        .bind(UserStatus::PaymentError)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    /// Terminal-failure side effect for a checkout that never reached
    /// Persist (no `MasterAccount`/`users` row exists yet to update). Marks
    /// the shadow status row keyed by `checkout_id` instead, so a decline
    /// before Persist still surfaces `payment_error` without minting a
    /// `MasterAccount`. Idempotent upsert.
    pub async fn mark_checkout_payment_error(&self, checkout_id: &str) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO checkout_user_status (checkout_id, status, updated_at) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (checkout_id) DO UPDATE SET \
             status = EXCLUDED.status, updated_at = EXCLUDED.updated_at",
        )
        .bind(checkout_id)
        .bind(UserStatus::PaymentError)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    pub async fn find_checkout_user_status(
        &self,
        checkout_id: &str,
    ) -> RepositoryResult<Option<UserStatus>> {
        let row: Option<(UserStatus,)> =
            sqlx::query_as("SELECT status FROM checkout_user_status WHERE checkout_id = $1")
                .bind(checkout_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(RepositoryError::from)?;
        Ok(row.map(|(status,)| status))
    }

    pub async fn find_subscription(
        &self,
        master_reference: Uuid,
    ) -> RepositoryResult<Option<Subscription>> {
        sqlx::query_as::<_, Subscription>(
            "SELECT master_reference, subscription_id, plan_code, status FROM subscriptions \
             WHERE master_reference = $1",
        )
        .bind(master_reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }

    pub async fn update_subscription_status(
        &self,
        master_reference: Uuid,
        status: SubscriptionStatus,
    ) -> RepositoryResult<()> {
        sqlx::query("UPDATE subscriptions SET status = $2 WHERE master_reference = $1")
            .bind(master_reference)
            .bind(status)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }
}

/// One open transaction covering every Persist-step write. Every `save_*`
/// call is `ON CONFLICT DO NOTHING`/`DO UPDATE` so a transaction replayed
/// after a partial prior success (e.g. the process crashed between commit
/// and the caller recording success) does not error.
pub struct PersistTransaction<'a> {
    tx: Transaction<'a, Postgres>,
}

impl<'a> PersistTransaction<'a> {
    pub async fn save_master_account(
        &mut self,
        master_reference: Uuid,
        checkout_id: &str,
    ) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO master_accounts (master_reference, checkout_id, created_at) \
             VALUES ($1, $2, $3) ON CONFLICT (master_reference) DO NOTHING",
        )
        .bind(master_reference)
        .bind(checkout_id)
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    pub async fn save_user(&mut self, user: &User) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO users (master_reference, username, email, passphrase_hash, status) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (master_reference) DO UPDATE SET \
             username = EXCLUDED.username, email = EXCLUDED.email, \
             passphrase_hash = EXCLUDED.passphrase_hash, status = EXCLUDED.status",
        )
        .bind(user.master_reference)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.passphrase_hash)
        .bind(user.status)
        .execute(&mut *self.tx)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    pub async fn save_payment_method(&mut self, method: &PaymentMethod) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO payment_methods (master_reference, transaction_id, cardholder_name, pan_last_four) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (master_reference, transaction_id) DO NOTHING",
        )
        .bind(method.master_reference)
        .bind(&method.transaction_id)
        .bind(&method.cardholder_name)
        .bind(&method.pan_last_four)
        .execute(&mut *self.tx)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    pub async fn save_invoice(
        &mut self,
        master_reference: Uuid,
        period: InvoicePeriod,
        amount_cents: i64,
        due_at: chrono::DateTime<Utc>,
    ) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO invoices (id, master_reference, period, amount_cents, due_at) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT (master_reference, period) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(master_reference)
        .bind(period)
        .bind(amount_cents)
        .bind(due_at)
        .execute(&mut *self.tx)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    pub async fn save_transaction_record(
        &mut self,
        record: &TransactionRecord,
    ) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO transactions (transaction_id, master_reference, checkout_id, amount_cents, currency, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (transaction_id) DO NOTHING",
        )
        .bind(&record.transaction_id)
        .bind(record.master_reference)
        .bind(&record.checkout_id)
        .bind(record.amount_cents)
        .bind(&record.currency)
        .bind(record.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    pub async fn save_subscription(&mut self, sub: &Subscription) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO subscriptions (master_reference, subscription_id, plan_code, status) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (master_reference) DO UPDATE SET \
             subscription_id = EXCLUDED.subscription_id, plan_code = EXCLUDED.plan_code, \
             status = EXCLUDED.status",
        )
        .bind(sub.master_reference)
        .bind(&sub.subscription_id)
        .bind(&sub.plan_code)
        .bind(sub.status)
        .execute(&mut *self.tx)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    pub async fn commit(self) -> RepositoryResult<()> {
        self.tx.commit().await.map_err(RepositoryError::from)
    }

    pub async fn rollback(self) -> RepositoryResult<()> {
        self.tx.rollback().await.map_err(RepositoryError::from)
    }
}
