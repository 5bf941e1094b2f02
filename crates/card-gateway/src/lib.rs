mod card;
mod client;
mod error;
mod gateway;
mod mock;
mod types;

pub use card::Card;
pub use client::{GatewayConfig, HttpCardGateway};
pub use error::{GatewayError, GatewayResult};
pub use gateway::CardGateway;
pub use mock::MockCardGateway;
pub use types::{
    AuthorizeOutcome, BillingInterval, BillingPlan, SubscriptionOutcome, SubscriptionStatus,
    VoidOutcome,
};
