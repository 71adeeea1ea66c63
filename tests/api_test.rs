mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use clubledger::{
    api::create_app,
    domain::{self, NewTransaction, Payer, TransactionCategory},
    payments::order_id,
};
use common::*;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const PASSWORD: &str = "wicket-keeper-42";

fn app(t: &TestContext) -> Router {
    create_app(t.ctx.clone(), Some(t.payments.clone()), Arc::new(test_settings()))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn onboard_with_login(t: &TestContext, first_name: &str, phone_number: &str, is_admin: bool) -> (Payer, String) {
    let mut request = payer_request(first_name, phone_number);
    request.password = Some(PASSWORD.to_string());
    request.is_admin = is_admin;
    let payer = t.ctx.payer_service.onboard(request).await.unwrap();

    let response = app(t)
        .oneshot(
            Request::post("/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "phone_number": phone_number, "password": PASSWORD }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .expect("session cookie")
        .to_string();

    (payer, cookie)
}

fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn health_and_root_respond() {
    let t = setup().await;

    let response = app(&t)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");

    let response = app(&t)
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let t = setup().await;
    onboard_with_login(&t, "Asha", "+919800000001", false).await;

    let response = app(&t)
        .oneshot(json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "phone_number": "+919800000001", "password": "not-the-password" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn initiation_follows_the_endpoint_contract() {
    let t = setup().await;
    let (owner, owner_cookie) = onboard_with_login(&t, "Owner", "+919800000001", false).await;
    let (_other, other_cookie) = onboard_with_login(&t, "Other", "+919800000002", false).await;
    let fee = unpaid_fee(&t.ctx, &owner, dec!(500)).await;
    let paid = insert(
        &t.ctx,
        NewTransaction::settled(owner.id, TransactionCategory::Merchandise, dec!(150), domain::today()),
    )
    .await;

    let initiate = |cookie: Option<&str>, body: Value| json_request("POST", "/api/payments/initiate", cookie, body);

    let response = app(&t).oneshot(initiate(None, json!({ "transaction_id": fee.id }))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app(&t)
        .oneshot(initiate(Some(&other_cookie), json!({ "transaction_id": fee.id })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app(&t)
        .oneshot(initiate(Some(&owner_cookie), json!({ "transaction_id": 987654 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app(&t).oneshot(initiate(Some(&owner_cookie), json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app(&t)
        .oneshot(initiate(Some(&owner_cookie), json!({ "transaction_id": paid.id })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(t.gateway.initiation_count(), 0);

    let response = app(&t)
        .oneshot(initiate(Some(&owner_cookie), json!({ "transaction_id": fee.id })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let merchant_order_id = body["merchant_order_id"].as_str().unwrap();
    assert_eq!(order_id::transaction_id(merchant_order_id), Some(fee.id));
    assert!(body["payment_url"].as_str().unwrap().starts_with("https://gateway.test/"));

    *t.gateway.fail_with.lock().unwrap() = Some("upstream 502".to_string());
    let response = app(&t)
        .oneshot(initiate(Some(&owner_cookie), json!({ "transaction_id": fee.id })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Payment initiation failed");
    assert!(body["details"].as_str().unwrap().contains("upstream 502"));
}

#[tokio::test]
async fn callback_accepts_json_with_an_inline_checksum() {
    let t = setup().await;
    let payer = onboard(&t.ctx, "Asha", "+919800000001").await;
    let fee = unpaid_fee(&t.ctx, &payer, dec!(500)).await;
    let (payload, checksum) = signed_callback(&order_id::mint(fee.id), "PAYMENT_SUCCESS", "COMPLETED", 50000);

    let response = app(&t)
        .oneshot(json_request(
            "POST",
            "/api/payments/callback",
            None,
            json!({ "response": payload, "checksum": checksum }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "success");
    assert!(transaction(&t.ctx, fee.id).await.paid);
}

#[tokio::test]
async fn callback_accepts_a_form_post_signed_in_the_header() {
    let t = setup().await;
    let payer = onboard(&t.ctx, "Asha", "+919800000001").await;
    let fee = unpaid_fee(&t.ctx, &payer, dec!(500)).await;
    let (payload, checksum) = signed_callback(&order_id::mint(fee.id), "PAYMENT_SUCCESS", "COMPLETED", 50000);

    let form = serde_urlencoded::to_string([("response", payload.as_str()), ("checksum", "stale")]).unwrap();
    let response = app(&t)
        .oneshot(
            Request::post("/api/payments/callback")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .header("X-VERIFY", checksum)
                .body(Body::from(form))
                .unwrap(),
        )
        .await
        .unwrap();

    // the header wins over the stale body checksum
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "success");
    assert!(transaction(&t.ctx, fee.id).await.paid);
}

#[tokio::test]
async fn callback_rejects_bad_signatures_and_missing_fields() {
    let t = setup().await;
    let payer = onboard(&t.ctx, "Asha", "+919800000001").await;
    let fee = unpaid_fee(&t.ctx, &payer, dec!(500)).await;
    let (payload, _) = signed_callback(&order_id::mint(fee.id), "PAYMENT_SUCCESS", "COMPLETED", 50000);

    let callback = |body: Value| json_request("POST", "/api/payments/callback", None, body);

    let response = app(&t)
        .oneshot(callback(json!({ "response": payload, "checksum": "deadbeef###1" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app(&t).oneshot(callback(json!({ "response": payload }))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app(&t).oneshot(callback(json!({ "checksum": "deadbeef###1" }))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(!transaction(&t.ctx, fee.id).await.paid);
    assert!(t.channel.payments_received().is_empty());
}

#[tokio::test]
async fn callback_for_an_unknown_transaction_is_acknowledged() {
    let t = setup().await;
    let (payload, checksum) = signed_callback("TXN31337_0badf00d", "PAYMENT_SUCCESS", "COMPLETED", 100);

    let response = app(&t)
        .oneshot(json_request(
            "POST",
            "/api/payments/callback",
            None,
            json!({ "response": payload, "checksum": checksum }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ignored");
}

#[tokio::test]
async fn payments_are_unavailable_without_a_gateway() {
    let t = setup().await;
    let (payer, cookie) = onboard_with_login(&t, "Asha", "+919800000001", false).await;
    let fee = unpaid_fee(&t.ctx, &payer, dec!(500)).await;

    let app = create_app(t.ctx.clone(), None, Arc::new(test_settings()));
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/payments/initiate",
            Some(&cookie),
            json!({ "transaction_id": fee.id }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn payers_see_only_their_own_ledger() {
    let t = setup().await;
    let (owner, owner_cookie) = onboard_with_login(&t, "Owner", "+919800000001", false).await;
    let (_other, other_cookie) = onboard_with_login(&t, "Other", "+919800000002", false).await;
    let fee = unpaid_fee(&t.ctx, &owner, dec!(500)).await;

    let response = app(&t)
        .oneshot(
            Request::get("/api/transactions")
                .header(header::COOKIE, &owner_cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    // admission fee plus the tournament fee
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);

    let response = app(&t)
        .oneshot(
            Request::get(format!("/api/transactions/{}", fee.id))
                .header(header::COOKIE, &other_cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app(&t)
        .oneshot(
            Request::get("/api/payers/me")
                .header(header::COOKIE, &owner_cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let profile = body_json(response).await;
    assert_eq!(profile["id"], owner.id.to_string());
    assert_eq!(profile["membership_active"], true);
}

#[tokio::test]
async fn admin_routes_require_an_admin() {
    let t = setup().await;
    let (_member, member_cookie) = onboard_with_login(&t, "Member", "+919800000001", false).await;
    let (_admin, admin_cookie) = onboard_with_login(&t, "Admin", "+919800000002", true).await;

    let run = |cookie: &str, body: &'static str| {
        Request::post("/admin/billing/run")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, cookie)
            .body(Body::from(body))
            .unwrap()
    };

    let response = app(&t).oneshot(run(&member_cookie, "")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app(&t)
        .oneshot(run(&admin_cookie, r#"{"billing_date": "2024-06-15"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let summary = body_json(response).await;
    assert_eq!(summary["billable_payers"], 2);
    assert_eq!(summary["created_invoices"].as_array().unwrap().len(), 2);

    let response = app(&t).oneshot(run(&admin_cookie, "")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(&t).oneshot(run(&admin_cookie, "{not json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admins_can_settle_entries_by_hand() {
    let t = setup().await;
    let (payer, _) = onboard_with_login(&t, "Member", "+919800000001", false).await;
    let (_admin, admin_cookie) = onboard_with_login(&t, "Admin", "+919800000002", true).await;
    let fee = unpaid_fee(&t.ctx, &payer, dec!(500)).await;

    let response = app(&t)
        .oneshot(json_request(
            "PUT",
            &format!("/admin/transactions/{}", fee.id),
            Some(&admin_cookie),
            json!({ "paid": true, "payment_date": "2024-06-20" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["paid"], true);
    assert_eq!(body["payment_date"], "2024-06-20");
    assert_eq!(t.channel.payments_received().len(), 1);

    let response = app(&t)
        .oneshot(json_request(
            "PUT",
            &format!("/admin/transactions/{}", fee.id),
            Some(&admin_cookie),
            json!({ "paid": false }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn admins_drive_the_fee_rules_over_http() {
    let t = setup().await;
    let (_admin, admin_cookie) = onboard_with_login(&t, "Admin", "+919800000002", true).await;

    let response = app(&t)
        .oneshot(json_request(
            "POST",
            "/admin/payers",
            Some(&admin_cookie),
            json!({ "first_name": "New", "last_name": "Player", "phone_number": "+919800000003" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let payer_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = app(&t)
        .oneshot(json_request(
            "POST",
            "/admin/tournaments",
            Some(&admin_cookie),
            json!({ "name": "Monsoon Cup", "start_date": "2024-07-01", "entry_fee": "500.00" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let tournament_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let enroll = json_request(
        "POST",
        &format!("/admin/tournaments/{}/participants", tournament_id),
        Some(&admin_cookie),
        json!({ "payer_id": payer_id }),
    );
    let response = app(&t).oneshot(enroll).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["entry_fee"]["amount"], "500.00");

    let enroll_again = json_request(
        "POST",
        &format!("/admin/tournaments/{}/participants", tournament_id),
        Some(&admin_cookie),
        json!({ "payer_id": payer_id }),
    );
    let response = app(&t).oneshot(enroll_again).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app(&t)
        .oneshot(
            Request::get(format!("/admin/tournaments/{}/participants", tournament_id))
                .header(header::COOKIE, &admin_cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let participants = body_json(response).await;
    assert_eq!(participants.as_array().map(Vec::len), Some(1));
    assert_eq!(participants[0]["payer_id"], payer_id.as_str());

    let response = app(&t)
        .oneshot(json_request(
            "POST",
            "/admin/inventory/items",
            Some(&admin_cookie),
            json!({ "name": "Club cap", "item_type": "merchandise", "price": "150.00", "quantity": 10 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let item_id = body_json(response).await["id"].as_str().unwrap().to_string();

    let response = app(&t)
        .oneshot(json_request(
            "POST",
            "/admin/sales",
            Some(&admin_cookie),
            json!({ "item_id": item_id, "payer_id": payer_id, "quantity": 2, "sale_date": "2024-06-01" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let sale = body_json(response).await;
    assert_eq!(sale["transaction"]["amount"], "300.00");
    assert_eq!(sale["transaction"]["paid"], true);
    assert_eq!(sale["transaction"]["payment_date"], "2024-06-01");
}
