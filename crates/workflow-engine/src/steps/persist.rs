use checkout_repository::{
    CheckoutRecord, InvoicePeriod, PaymentMethod, Repository, Subscription, SubscriptionStatus,
    TransactionRecord, User, UserStatus,
};
use uuid::Uuid;

use crate::error::WorkflowResult;
use crate::ids::master_reference_for;

pub struct PersistInput<'a> {
    pub checkout: &'a CheckoutRecord,
    pub request_id: &'a str,
    pub transaction_id: &'a str,
    pub subscription_id: &'a str,
    pub plan_code: &'a str,
    pub amount_cents: i64,
    pub currency: &'a str,
    pub cardholder_name: &'a str,
    pub pan_last_four: &'a str,
}

/// Writes every domain row for a checkout inside a single transaction, or
/// none. Skipped entirely if a `MasterAccount` already exists for this
/// checkout (the idempotency check named in the saga's Persist step).
pub async fn run(repo: &Repository, input: PersistInput<'_>) -> WorkflowResult<Uuid> {
    if let Some(existing) = repo
        .find_master_account_by_checkout(&input.checkout.checkout_id)
        .await?
    {
        tracing::info!(
            checkout_id = %input.checkout.checkout_id,
            master_reference = %existing.master_reference,
            "persist skipped: master account already exists"
        );
        return Ok(existing.master_reference);
    }

    let master_reference = master_reference_for(input.request_id);

    let mut tx = repo.begin().await?;
    tx.save_master_account(master_reference, &input.checkout.checkout_id)
        .await?;
    tx.save_user(&User {
        master_reference,
        username: input.checkout.username.clone(),
        email: input.checkout.customer_email.clone(),
        passphrase_hash: input.checkout.passphrase_hash.clone(),
        status: UserStatus::Active,
    })
    .await?;
    tx.save_payment_method(&PaymentMethod {
        master_reference,
        transaction_id: input.transaction_id.to_string(),
        cardholder_name: input.cardholder_name.to_string(),
        pan_last_four: input.pan_last_four.to_string(),
    })
    .await?;
    tx.save_invoice(master_reference, InvoicePeriod::Trial, 0, chrono::Utc::now())
        .await?;
    tx.save_invoice(
        master_reference,
        InvoicePeriod::Future,
        input.amount_cents,
        chrono::Utc::now() + chrono::Duration::days(30),
    )
    .await?;
    tx.save_transaction_record(&TransactionRecord {
        transaction_id: input.transaction_id.to_string(),
        master_reference,
        checkout_id: input.checkout.checkout_id.clone(),
        amount_cents: input.amount_cents,
        currency: input.currency.to_string(),
        created_at: chrono::Utc::now(),
    })
    .await?;
    tx.save_subscription(&Subscription {
        master_reference,
        subscription_id: input.subscription_id.to_string(),
        plan_code: input.plan_code.to_string(),
        status: SubscriptionStatus::Pending,
    })
    .await?;
    tx.commit().await?;

    tracing::info!(
        checkout_id = %input.checkout.checkout_id,
        %master_reference,
        "persist succeeded"
    );

    Ok(master_reference)
}
