//! End-to-end integration tests
//!
//! These tests drive the full HTTP surface (router, orchestrator, reconciler,
//! store) against the sandbox gateway. Each test:
//! 1. Builds the router over a fresh sandbox gateway and in-memory store
//! 2. Sends requests through `tower::ServiceExt::oneshot`
//! 3. Checks status codes and JSON bodies
//!
//! Scenarios cover:
//! - Happy path (create, confirm, status)
//! - Duplicate click and client retries
//! - Validation failures (amount below minimum, malformed bodies)
//! - Gateway failures and the production/development error envelopes

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use order_payments::api::{build_router, AppState};
    use order_payments::core::{GatewayClient, InMemoryPaymentStore, OperatingMode, ServiceConfig};
    use order_payments::gateway::sandbox::AUTHORIZE_ONLY_INSTRUMENT;
    use order_payments::gateway::{GatewayOp, SandboxGateway};
    use order_payments::types::{GatewayError, GatewayErrorCategory, RemoteStatus};
    use rstest::rstest;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        gateway: Arc<SandboxGateway>,
    }

    fn app_with(gateway: SandboxGateway, config: ServiceConfig) -> TestApp {
        let gateway = Arc::new(gateway);
        let store = Arc::new(InMemoryPaymentStore::new());
        let router = build_router(AppState::new(gateway.clone(), store, config));
        TestApp { router, gateway }
    }

    fn app() -> TestApp {
        app_with(SandboxGateway::new(), ServiceConfig::default())
    }

    fn production() -> ServiceConfig {
        ServiceConfig {
            mode: OperatingMode::Production,
            ..Default::default()
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(router, request).await
    }

    async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        send(router, request).await
    }

    async fn create(router: &Router, order_id: &str, amount: Value) -> (StatusCode, Value) {
        post(
            router,
            "/api/payments/intents",
            json!({ "orderId": order_id, "amount": amount, "currency": "lkr" }),
        )
        .await
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let (status, body) = get(&app.router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_happy_path_create_confirm_status() {
        let app = app();

        let (status, created) = post(
            &app.router,
            "/api/payments/intents",
            json!({
                "orderId": "ORD-1",
                "amount": 1000,
                "currency": "lkr",
                "customerEmail": "nimal@example.com",
                "customerName": "Nimal Perera"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["success"], json!(true));
        assert_eq!(created["reused"], json!(false));
        assert!(created.get("message").is_none());
        let intent_id = created["paymentIntentId"].as_str().unwrap().to_string();
        assert!(created["clientSecret"]
            .as_str()
            .unwrap()
            .starts_with(&format!("{}_secret_", intent_id)));

        // Client completes authentication with the gateway
        app.gateway.confirm(&intent_id, "pm_card_visa").await.unwrap();

        let (status, confirmed) = post(
            &app.router,
            "/api/payments/confirm",
            json!({ "paymentIntentId": intent_id }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(confirmed["status"], json!("completed"));
        assert_eq!(confirmed["remoteStatus"], json!("succeeded"));
        assert_eq!(confirmed["remoteDetails"]["id"], json!(intent_id));
        assert_eq!(confirmed["remoteDetails"]["amount"], json!("1000.00"));

        let (status, by_order) = get(&app.router, "/api/payments/orders/ORD-1/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(by_order["payment"]["orderId"], json!("ORD-1"));
        assert_eq!(by_order["payment"]["status"], json!("completed"));
        assert_eq!(by_order["payment"]["currency"], json!("lkr"));
        assert_eq!(by_order["payment"]["amount"], json!("1000.00"));
        assert_eq!(by_order["payment"]["id"], confirmed["paymentId"]);

        let (status, by_intent) = get(
            &app.router,
            &format!("/api/payments/intents/{}/status", intent_id),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(by_intent["payment"], by_order["payment"]);
    }

    #[tokio::test]
    async fn test_retry_after_lost_response_reuses_intent() {
        let app = app();

        let (_, first) = create(&app.router, "ORD-1", json!(1000)).await;
        let (status, second) = create(&app.router, "ORD-1", json!("1000")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["reused"], json!(true));
        assert_eq!(second["paymentIntentId"], first["paymentIntentId"]);
        assert_eq!(second["clientSecret"], first["clientSecret"]);
        assert!(second["message"].is_string());
        assert_eq!(app.gateway.calls(GatewayOp::Create), 1);
    }

    #[tokio::test]
    async fn test_duplicate_click_conflicts() {
        let app = app_with(
            SandboxGateway::new().with_create_delay(Duration::from_millis(50)),
            ServiceConfig::default(),
        );

        let ((status_a, body_a), (status_b, body_b)) = tokio::join!(
            create(&app.router, "ORD-2", json!(1000)),
            create(&app.router, "ORD-2", json!(1000)),
        );

        let mut statuses = [status_a, status_b];
        statuses.sort_by_key(|s| s.as_u16());
        assert_eq!(statuses, [StatusCode::OK, StatusCode::CONFLICT]);

        let (winner, loser) = if status_a == StatusCode::OK {
            (body_a, body_b)
        } else {
            (body_b, body_a)
        };
        assert_eq!(loser["success"], json!(false));
        assert_eq!(loser["kind"], json!("ConflictError"));
        assert_eq!(loser["retryable"], json!(true));

        let (status, retry) = create(&app.router, "ORD-2", json!(1000)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(retry["reused"], json!(true));
        assert_eq!(retry["paymentIntentId"], winner["paymentIntentId"]);
    }

    #[tokio::test]
    async fn test_amount_below_minimum() {
        let app = app();

        let (status, body) = create(&app.router, "ORD-3", json!(50)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], json!("ValidationError"));
        assert_eq!(body["retryable"], json!(false));
        let message = body["message"].as_str().unwrap();
        assert!(message.contains("150"));
        assert!(message.contains("50"));
        assert_eq!(app.gateway.calls(GatewayOp::Create), 0);
    }

    #[rstest]
    #[case::missing_order(json!({ "amount": 1000 }))]
    #[case::missing_amount(json!({ "orderId": "ORD-1" }))]
    #[case::non_numeric_amount(json!({ "orderId": "ORD-1", "amount": "ten" }))]
    #[case::wrong_type(json!({ "orderId": 42, "amount": 1000 }))]
    #[tokio::test]
    async fn test_invalid_create_bodies(#[case] body: Value) {
        let app = app();

        let (status, response) = post(&app.router, "/api/payments/intents", body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["success"], json!(false));
        assert_eq!(response["kind"], json!("ValidationError"));
    }

    #[tokio::test]
    async fn test_malformed_json_uses_error_envelope() {
        let app = app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/payments/intents")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = send(&app.router, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], json!("ValidationError"));
    }

    #[tokio::test]
    async fn test_gateway_unreachable_is_retryable() {
        let app = app();
        app.gateway
            .fail_next(GatewayOp::Create, GatewayError::connection("connection refused"));

        let (status, body) = create(&app.router, "ORD-4", json!(1000)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["kind"], json!("GatewayUnreachable"));
        assert_eq!(body["retryable"], json!(true));

        let (status, retry) = create(&app.router, "ORD-4", json!(1000)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(retry["reused"], json!(false));
    }

    fn amount_too_small() -> GatewayError {
        GatewayError::new(
            GatewayErrorCategory::InvalidRequest,
            "Amount must convert to at least 50 cents.",
        )
        .with_code("amount_too_small")
        .with_param("amount")
    }

    #[tokio::test]
    async fn test_development_mode_exposes_details() {
        let app = app();
        app.gateway.fail_next(GatewayOp::Create, amount_too_small());

        let (status, body) = create(&app.router, "ORD-5", json!(1000)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], json!("InvalidRequest"));
        assert_eq!(body["details"]["code"], json!("amount_too_small"));
        assert_eq!(body["details"]["param"], json!("amount"));
        assert_eq!(body["details"]["type"], json!("invalid_request_error"));
    }

    #[tokio::test]
    async fn test_production_mode_hides_details() {
        let app = app_with(SandboxGateway::new(), production());
        app.gateway.fail_next(GatewayOp::Create, amount_too_small());

        let (status, body) = create(&app.router, "ORD-5", json!(1000)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.get("details").is_none());
        assert!(!body["message"].as_str().unwrap().contains("50 cents"));
    }

    #[tokio::test]
    async fn test_declined_message_reaches_caller() {
        let app = app_with(SandboxGateway::new(), production());
        app.gateway.fail_next(
            GatewayOp::Create,
            GatewayError::declined("Your card has insufficient funds."),
        );

        let (status, body) = create(&app.router, "ORD-6", json!(1000)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], json!("InstrumentDeclined"));
        assert_eq!(body["message"], json!("Your card has insufficient funds."));
    }

    #[tokio::test]
    async fn test_confirm_captures_authorized_payment() {
        let app = app();
        let (_, created) = create(&app.router, "ORD-7", json!(1000)).await;
        let intent_id = created["paymentIntentId"].as_str().unwrap().to_string();
        app.gateway
            .confirm(&intent_id, AUTHORIZE_ONLY_INSTRUMENT)
            .await
            .unwrap();

        let (status, body) = post(
            &app.router,
            "/api/payments/confirm",
            json!({ "paymentIntentId": intent_id }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], json!("completed"));
        assert_eq!(app.gateway.calls(GatewayOp::Capture), 1);
    }

    #[tokio::test]
    async fn test_confirm_requires_intent_id() {
        let app = app();
        let (status, body) = post(&app.router, "/api/payments/confirm", json!({})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], json!("ValidationError"));
    }

    #[tokio::test]
    async fn test_status_polling_never_captures() {
        let app = app();
        let (_, created) = create(&app.router, "ORD-8", json!(1000)).await;
        let intent_id = created["paymentIntentId"].as_str().unwrap().to_string();
        app.gateway.set_status(&intent_id, RemoteStatus::RequiresCapture);

        let (status, body) = get(
            &app.router,
            &format!("/api/payments/intents/{}/status", intent_id),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["payment"]["status"], json!("pending"));
        assert_eq!(body["remoteStatus"], json!("requires_capture"));
        assert_eq!(app.gateway.calls(GatewayOp::Capture), 0);
    }

    #[tokio::test]
    async fn test_canceled_intent_fails_record_and_allows_new_one() {
        let app = app();
        let (_, first) = create(&app.router, "ORD-9", json!(1000)).await;
        let first_id = first["paymentIntentId"].as_str().unwrap().to_string();
        app.gateway.set_status(&first_id, RemoteStatus::Canceled);

        let (_, polled) = get(&app.router, "/api/payments/orders/ORD-9/status").await;
        assert_eq!(polled["payment"]["status"], json!("failed"));

        let (status, second) = create(&app.router, "ORD-9", json!(1000)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["reused"], json!(false));
        assert_ne!(second["paymentIntentId"], first["paymentIntentId"]);
    }

    #[rstest]
    #[case::unknown_intent("/api/payments/intents/pi_404/status")]
    #[case::unknown_order("/api/payments/orders/ORD-404/status")]
    #[tokio::test]
    async fn test_status_not_found(#[case] uri: &str) {
        let app = app();
        let (status, body) = get(&app.router, uri).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], json!("NotFoundError"));
    }
}
