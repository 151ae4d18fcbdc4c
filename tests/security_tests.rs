//! Authentication through the full gateway with the static token strategy.

mod common;

use common::temp_files::create_temp_yaml;
use routegate::registry::{handler_fn, HandlerRegistry};
use routegate::security::{Principal, StaticTokenStrategy};
use routegate::spec::{load_route_table, LoadOptions};
use routegate::{ErrorCode, Gateway, GatewayRequest, ResponseEnvelope};
use serde_json::json;

const ROUTES: &str = r#"
authentication:
  partner:
    strategy: tokens
    token_parameter: api_key
    parameters:
      account_id: { type: string, pattern: "[0-9]+" }
  internal:
    strategy: ldap
routes:
  - method: get
    endpoint: /accounts/{account_id}/orders
    library: lib/orders
    callback: list_orders
    authentication: partner
    required_permissions: ["orders:read"]
  - method: get
    endpoint: /admin
    library: lib/admin
    callback: overview
    authentication: internal
errors:
  InternalError: { status_code: 500, user_error_code: 9000, user_message: oops }
  AuthenticationFailed: { status_code: 401, user_error_code: 2001, user_message: denied }
  InvalidAuthenticationScheme: { status_code: 401, user_error_code: 2002, user_message: bad scheme }
"#;

fn gateway() -> Gateway {
    let file = create_temp_yaml(ROUTES);
    let table = load_route_table(file.path(), &LoadOptions::default()).unwrap();

    let mut registry = HandlerRegistry::new();
    registry.register_handler(
        "lib/orders",
        "list_orders",
        handler_fn(|ctx| async move {
            let subject = ctx.principal.map(|p| p.subject);
            Ok::<_, anyhow::Error>(ResponseEnvelope::ok(json!({ "subject": subject })))
        }),
    );
    registry.register_handler(
        "lib/admin",
        "overview",
        handler_fn(|_ctx| async move { Ok::<_, anyhow::Error>(ResponseEnvelope::ok(json!({}))) }),
    );

    let tokens = StaticTokenStrategy::new()
        .token(
            "reader",
            Principal::new("reader")
                .with_account("42")
                .with_permissions(["orders:read"]),
        )
        .token("guest", Principal::new("guest").with_account("42"))
        .token("roamer", Principal::new("roamer").with_permissions(["orders:read"]));

    Gateway::builder(table)
        .registry(registry)
        .strategy("tokens", tokens)
        .build()
        .unwrap()
}

fn bearer(target: &str, token: &str) -> GatewayRequest {
    GatewayRequest::get(target).with_header("Authorization", format!("Bearer {token}"))
}

#[tokio::test]
async fn test_scoped_principal_with_permission_is_admitted() {
    let gw = gateway();
    let response = gw.handle(bearer("/accounts/42/orders", "reader")).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.json_body().unwrap()["subject"], json!("reader"));
}

#[tokio::test]
async fn test_unscoped_principal_may_use_any_account() {
    let gw = gateway();
    let response = gw.handle(bearer("/accounts/7/orders", "roamer")).await;
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_account_mismatch_is_rejected_with_violation() {
    let gw = gateway();
    let response = gw.handle(bearer("/accounts/7/orders", "reader")).await;

    assert_eq!(response.status, 401);
    let doc = response.error_document().unwrap();
    assert_eq!(doc.error_type, ErrorCode::AuthenticationFailed);
    assert_eq!(doc.message_detail.len(), 1);
    assert_eq!(doc.message_detail[0].property, "account_id");
}

#[tokio::test]
async fn test_missing_permission_is_rejected() {
    let gw = gateway();
    let response = gw.handle(bearer("/accounts/42/orders", "guest")).await;

    assert_eq!(response.status, 401);
    let doc = response.error_document().unwrap();
    assert_eq!(doc.message_detail[0].property, "permissions");
    assert!(doc.message_detail[0].message.contains("orders:read"));
}

#[tokio::test]
async fn test_custom_token_parameter_is_honoured() {
    let gw = gateway();

    let ok = gw
        .handle(GatewayRequest::get("/accounts/42/orders?api_key=reader"))
        .await;
    assert_eq!(ok.status, 200);

    let default_name = gw
        .handle(GatewayRequest::get("/accounts/42/orders?access_token=reader"))
        .await;
    assert_eq!(default_name.status, 401);
}

#[tokio::test]
async fn test_header_wins_over_token_parameter() {
    let gw = gateway();
    let response = gw
        .handle(bearer("/accounts/42/orders?api_key=reader", "nobody"))
        .await;
    assert_eq!(response.status, 401);
}

#[tokio::test]
async fn test_unregistered_strategy_is_internal_error() {
    let gw = gateway();
    let response = gw.handle(bearer("/admin", "reader")).await;

    assert_eq!(response.status, 500);
    let doc = response.error_document().unwrap();
    assert_eq!(doc.error_type, ErrorCode::InternalError);
    assert!(doc.debug_info.unwrap().contains("ldap"));
}

#[tokio::test]
async fn test_scheme_without_token_is_rejected() {
    let gw = gateway();
    let response = gw
        .handle(GatewayRequest::get("/accounts/42/orders").with_header("Authorization", "Bearer"))
        .await;

    assert_eq!(response.status, 401);
    assert_eq!(
        response.error_document().unwrap().error_type,
        ErrorCode::InvalidAuthenticationScheme
    );
}
