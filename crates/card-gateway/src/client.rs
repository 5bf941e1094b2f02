use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::card::Card;
use crate::error::GatewayError;
use crate::gateway::CardGateway;
use crate::types::{AuthorizeOutcome, BillingPlan, SubscriptionOutcome, VoidOutcome};

/// Configuration for the upstream card processor. Mirrors the env-var
/// loading convention used across this workspace: one var per field, no
/// implicit defaults for secrets.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub secret_key: String,
    pub account_id: String,
    pub sandbox: bool,
    pub base_path: String,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, GatewayError> {
        let secret_key = std::env::var("CARD_GATEWAY_SECRET_KEY")
            .map_err(|_| GatewayError::GatewayInvalid("missing CARD_GATEWAY_SECRET_KEY".into()))?;
        let account_id = std::env::var("CARD_GATEWAY_ACCOUNT_ID")
            .map_err(|_| GatewayError::GatewayInvalid("missing CARD_GATEWAY_ACCOUNT_ID".into()))?;
        let sandbox = std::env::var("CARD_GATEWAY_SANDBOX")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);
        let base_path = if sandbox {
            "https://sandbox-api.card-gateway.example".to_string()
        } else {
            "https://api.card-gateway.example".to_string()
        };

        Ok(GatewayConfig {
            secret_key,
            account_id,
            sandbox,
            base_path,
        })
    }
}

/// HTTP-backed `CardGateway` implementation. Every request carries the
/// caller's `request_id` as an idempotency key so a retried authorize/void
/// does not double-charge or double-void upstream.
#[derive(Clone)]
pub struct HttpCardGateway {
    config: GatewayConfig,
    http: Client,
}

impl HttpCardGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GatewayError::GatewayUnreachable(e.to_string()))?;
        Ok(HttpCardGateway { config, http })
    }

    async fn post<T: serde::de::DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        request_id: &str,
    ) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.config.base_path, path);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.secret_key))
            .header("gateway-account", &self.config.account_id)
            .header("Idempotency-Key", request_id)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::GatewayUnreachable(e.to_string()))?;

        self.handle_response(response).await
    }

    async fn delete<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        request_id: &str,
    ) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.config.base_path, path);
        let response = self
            .http
            .delete(&url)
            .header("Authorization", format!("Bearer {}", self.config.secret_key))
            .header("gateway-account", &self.config.account_id)
            .header("Idempotency-Key", request_id)
            .send()
            .await
            .map_err(|e| GatewayError::GatewayUnreachable(e.to_string()))?;

        self.handle_response(response).await
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| GatewayError::GatewayInvalid(e.to_string()))
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Err(GatewayError::GatewayNotFound(
                response.text().await.unwrap_or_default(),
            ))
        } else if status == reqwest::StatusCode::CONFLICT
            || status == reqwest::StatusCode::UNPROCESSABLE_ENTITY
        {
            Err(GatewayError::GatewayState(
                response.text().await.unwrap_or_default(),
            ))
        } else if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Err(GatewayError::GatewayUnreachable(format!(
                "upstream returned {}",
                status
            )))
        } else {
            let body: DeclineBody = response
                .json()
                .await
                .unwrap_or_else(|_| DeclineBody::generic(status.as_u16()));
            Err(GatewayError::GatewayDeclined {
                code: body.code,
                message: body.message,
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeclineBody {
    code: String,
    message: String,
}

impl DeclineBody {
    fn generic(status: u16) -> Self {
        DeclineBody {
            code: status.to_string(),
            message: "request declined by upstream processor".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AuthorizeRequest<'a> {
    amount: i64,
    currency: &'a str,
    pan: &'a str,
    cvv: &'a str,
    expiry_month: u32,
    expiry_year: u32,
    cardholder_name: &'a str,
    capture_method: &'static str,
}

#[derive(Debug, Deserialize)]
struct AuthorizeResponse {
    id: String,
    amount: i64,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct VoidResponse {
    id: String,
    voided_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
struct CreateSubscriptionRequest<'a> {
    pan: &'a str,
    cvv: &'a str,
    expiry_month: u32,
    expiry_year: u32,
    cardholder_name: &'a str,
    plan_code: &'a str,
    amount: i64,
    currency: &'a str,
    interval: &'static str,
}

#[derive(Debug, Deserialize)]
struct SubscriptionResponse {
    id: String,
    status: String,
}

#[async_trait]
impl CardGateway for HttpCardGateway {
    async fn authorize(
        &self,
        card: &Card,
        amount_cents: i64,
        currency: &str,
        request_id: &str,
    ) -> Result<AuthorizeOutcome, GatewayError> {
        card.validate()?;

        let request = AuthorizeRequest {
            amount: amount_cents,
            currency,
            pan: &card.pan,
            cvv: &card.cvv,
            expiry_month: card.expiry_month,
            expiry_year: card.expiry_year,
            cardholder_name: &card.cardholder_name,
            capture_method: "automatic",
        };

        let response: AuthorizeResponse =
            self.post("/v1/authorizations", &request, request_id).await?;

        Ok(AuthorizeOutcome {
            transaction_id: response.id,
            authorized_amount_cents: response.amount,
            currency: response.currency,
        })
    }

    async fn void(&self, transaction_id: &str, request_id: &str) -> Result<VoidOutcome, GatewayError> {
        let path = format!("/v1/authorizations/{}", transaction_id);
        let response: VoidResponse = self.delete(&path, request_id).await?;
        Ok(VoidOutcome {
            transaction_id: response.id,
            voided_at: response.voided_at,
        })
    }

    async fn create_subscription(
        &self,
        card: &Card,
        plan: &BillingPlan,
        request_id: &str,
    ) -> Result<SubscriptionOutcome, GatewayError> {
        card.validate()?;

        let interval = match plan.interval {
            crate::types::BillingInterval::Monthly => "monthly",
            crate::types::BillingInterval::Yearly => "yearly",
        };

        let request = CreateSubscriptionRequest {
            pan: &card.pan,
            cvv: &card.cvv,
            expiry_month: card.expiry_month,
            expiry_year: card.expiry_year,
            cardholder_name: &card.cardholder_name,
            plan_code: &plan.plan_code,
            amount: plan.amount_cents,
            currency: &plan.currency,
            interval,
        };

        let response: SubscriptionResponse =
            self.post("/v1/subscriptions", &request, request_id).await?;

        let status = match response.status.as_str() {
            "canceled" => crate::types::SubscriptionStatus::Canceled,
            _ => crate::types::SubscriptionStatus::Active,
        };

        Ok(SubscriptionOutcome {
            subscription_id: response.id,
            status,
        })
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        request_id: &str,
    ) -> Result<(), GatewayError> {
        let path = format!("/v1/subscriptions/{}", subscription_id);
        let _: SubscriptionResponse = self.delete(&path, request_id).await?;
        Ok(())
    }
}
