use card_gateway::{BillingInterval, BillingPlan, Card, CardGateway, MockCardGateway};

fn test_card() -> Card {
    Card {
        pan: "4111111111111111".to_string(),
        cvv: "123".to_string(),
        expiry_month: 12,
        expiry_year: 2099,
        cardholder_name: "Jordan Buyer".to_string(),
    }
}

#[tokio::test]
async fn authorize_then_void_round_trips() {
    let gateway = MockCardGateway::new();
    let outcome = gateway
        .authorize(&test_card(), 5_000, "usd", "req-1")
        .await
        .unwrap();
    assert_eq!(outcome.authorized_amount_cents, 5_000);

    let void = gateway.void(&outcome.transaction_id, "req-1-void").await.unwrap();
    assert_eq!(void.transaction_id, outcome.transaction_id);
    assert_eq!(gateway.voided_transactions(), vec![outcome.transaction_id]);
}

#[tokio::test]
async fn authorize_rejects_invalid_card_before_any_network_behavior() {
    let gateway = MockCardGateway::always_declines();
    let mut card = test_card();
    card.pan = "1234567890123".to_string();

    let err = gateway.authorize(&card, 1_000, "usd", "req-2").await.unwrap_err();
    assert!(matches!(err, card_gateway::GatewayError::CardInvalid(_)));
}

#[tokio::test]
async fn declining_gateway_reports_declined_not_retryable() {
    let gateway = MockCardGateway::always_declines();
    let err = gateway
        .authorize(&test_card(), 1_000, "usd", "req-3")
        .await
        .unwrap_err();
    assert!(!err.retryable());
}

#[tokio::test]
async fn unreachable_gateway_is_retryable_then_recovers() {
    let gateway = MockCardGateway::unreachable_for_next(2);

    for _ in 0..2 {
        let err = gateway
            .authorize(&test_card(), 1_000, "usd", "req-4")
            .await
            .unwrap_err();
        assert!(err.retryable());
    }

    let ok = gateway.authorize(&test_card(), 1_000, "usd", "req-4").await;
    assert!(ok.is_ok());
}

#[tokio::test]
async fn create_subscription_returns_active_status() {
    let gateway = MockCardGateway::new();
    let plan = BillingPlan {
        plan_code: "pro-monthly".to_string(),
        amount_cents: 2_999,
        currency: "usd".to_string(),
        interval: BillingInterval::Monthly,
    };
    let outcome = gateway
        .create_subscription(&test_card(), &plan, "req-5")
        .await
        .unwrap();
    assert_eq!(outcome.status, card_gateway::SubscriptionStatus::Active);
}
