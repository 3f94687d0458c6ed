//! Checkout, payment notification and reconciliation endpoints, run against a throw-away SQLite store and a scripted
//! gateway.
use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{Duration, Utc};
use conference_payment_engine::{
    db_types::{NewUserAccount, OrderStatusType, PaymentOption, Role, TradeNo},
    events::EventProducers,
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        MockGateway,
    },
    traits::{AccountManagement, PaymentGatewayDatabase, PaymentOptions},
    OrderFlowApi,
    SqliteDatabase,
};
use ecpay_tools::{CHECK_MAC_VALUE, TRADE_STATUS_FAILED};
use serde_json::{json, Value};

use super::helpers::{get_request, post_form, post_request, valid_token};
use crate::{
    config::ServerOptions,
    data_objects::CheckoutResponse,
    routes::{CheckoutRoute, GatewayCallbackRoute, QueryPaymentRoute, ReconcileAllRoute, ReconcileUserRoute},
};

type Api = OrderFlowApi<SqliteDatabase, MockGateway>;

struct TestSystem {
    db: SqliteDatabase,
    gateway: MockGateway,
}

impl TestSystem {
    async fn new() -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let now = Utc::now();
        let options = [
            ("regular", 1200, now - Duration::days(30), now + Duration::days(30)),
            ("early", 900, now - Duration::days(60), now - Duration::days(31)),
            ("student", 500, now + Duration::days(5), now + Duration::days(30)),
        ];
        for (id, price, valid_from, valid_until) in options {
            let option = PaymentOption { option_id: id.into(), name: format!("{id} ticket"), price, valid_from, valid_until };
            db.upsert_payment_option(option).await.expect("Error creating payment option");
        }
        for user in ["alice", "bob"] {
            db.upsert_user(NewUserAccount::new(user).with_email(format!("{user}@example.com")))
                .await
                .expect("Error creating user");
        }
        Self { db, gateway: MockGateway::new() }
    }

    fn api(&self) -> Api {
        OrderFlowApi::new(self.db.clone(), self.gateway.clone(), EventProducers::default())
    }

    fn configure(&self) -> impl FnOnce(&mut ServiceConfig) {
        let api = self.api();
        move |cfg: &mut ServiceConfig| {
            cfg.service(CheckoutRoute::<SqliteDatabase, MockGateway>::new())
                .service(GatewayCallbackRoute::<SqliteDatabase, MockGateway>::new())
                .service(QueryPaymentRoute::<SqliteDatabase, MockGateway>::new())
                .service(ReconcileAllRoute::<SqliteDatabase, MockGateway>::new())
                .service(ReconcileUserRoute::<SqliteDatabase, MockGateway>::new())
                .app_data(web::Data::new(api))
                .app_data(web::Data::new(ServerOptions::default()));
        }
    }

    async fn issue(&self, user_id: &str) -> TradeNo {
        self.api().issue_order(user_id, "regular", Utc::now()).await.expect("Error issuing order").order.trade_no
    }

    async fn status_of(&self, trade_no: &TradeNo) -> OrderStatusType {
        self.db.fetch_order_by_trade_no(trade_no).await.unwrap().expect("Order does not exist").status
    }

    async fn is_paid(&self, user_id: &str) -> bool {
        self.db.fetch_user(user_id).await.unwrap().expect("User does not exist").paid
    }
}

//----------------------------------------------   Checkout  ----------------------------------------------------

#[actix_web::test]
async fn checkout_issues_a_signed_order() {
    let system = TestSystem::new().await;
    let token = valid_token("alice", vec![Role::User]);
    let (status, body) = post_request(&token, "/checkout", json!({ "option_id": "regular" }), system.configure())
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let checkout: CheckoutResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(checkout.action, "https://payment-stage.ecpay.com.tw/Cashier/AioCheckOut/V5");
    assert_eq!(checkout.params.get("MerchantTradeNo"), Some(checkout.trade_no.as_str()));
    assert_eq!(checkout.params.get("TotalAmount"), Some("1200"));
    assert_eq!(checkout.params.get("ItemName"), Some("regular ticket"));
    let presented = checkout.params.get(CHECK_MAC_VALUE).expect("Checkout form is not signed");
    assert!(system.gateway.sign(checkout.params.without(&[CHECK_MAC_VALUE])).get(CHECK_MAC_VALUE) == Some(presented));

    let order = system.db.fetch_order_by_trade_no(&TradeNo(checkout.trade_no.clone())).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Created);
    assert_eq!(order.amount, 1200);
    assert_eq!(order.user_id, "alice");
    assert_eq!(order.request_params, checkout.params);
}

#[actix_web::test]
async fn checkout_outside_the_window_is_rejected() {
    let system = TestSystem::new().await;
    let token = valid_token("alice", vec![Role::User]);
    let (status, body) = post_request(&token, "/checkout", json!({ "option_id": "early" }), system.configure())
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("This payment option expired at"), "{body}");
    let (status, body) = post_request(&token, "/checkout", json!({ "option_id": "student" }), system.configure())
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("This payment option is not available until"), "{body}");
    let (status, _) = post_request(&token, "/checkout", json!({ "option_id": "vip" }), system.configure())
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(system.db.fetch_orders_for_user("alice").await.unwrap().is_empty());
}

#[actix_web::test]
async fn checkout_after_payment_is_rejected() {
    let system = TestSystem::new().await;
    system.db.mark_user_paid("alice", Utc::now()).await.unwrap();
    let token = valid_token("alice", vec![Role::User]);
    let (status, body) = post_request(&token, "/checkout", json!({ "option_id": "regular" }), system.configure())
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, r#"{"error":"The registration fee has already been paid"}"#);
}

#[actix_web::test]
async fn checkout_for_unregistered_user() {
    let system = TestSystem::new().await;
    let token = valid_token("mallory", vec![Role::User]);
    let (status, _) = post_request(&token, "/checkout", json!({ "option_id": "regular" }), system.configure())
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn checkout_waits_for_an_unreachable_gateway() {
    let system = TestSystem::new().await;
    let trade_no = system.issue("alice").await;
    system.gateway.set_unreachable(trade_no.as_str(), "connection reset");
    let token = valid_token("alice", vec![Role::User]);
    let (status, body) = post_request(&token, "/checkout", json!({ "option_id": "regular" }), system.configure())
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("please try again later"), "{body}");
    assert!(!body.contains("connection reset"), "{body}");
    assert_eq!(system.db.fetch_orders_for_user("alice").await.unwrap().len(), 1);
}

//----------------------------------------------   Gateway callback  ----------------------------------------------------

#[actix_web::test]
async fn callback_marks_order_paid_and_acknowledges_duplicates() {
    let system = TestSystem::new().await;
    let trade_no = system.issue("alice").await;
    let payload = system.gateway.callback_payload(trade_no.as_str(), "1", 1200);
    let (status, body) =
        post_form("/callback", payload.to_urlencoded(), system.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "1|OK");
    assert_eq!(system.status_of(&trade_no).await, OrderStatusType::Paid);
    assert!(system.is_paid("alice").await);
    assert!(!system.is_paid("bob").await);

    let (status, body) =
        post_form("/callback", payload.to_urlencoded(), system.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "1|OK");
    assert_eq!(system.status_of(&trade_no).await, OrderStatusType::Paid);
    let audit = system.db.fetch_gateway_callbacks(10).await.unwrap();
    assert_eq!(audit.len(), 2);
}

#[actix_web::test]
async fn tampered_callback_is_rejected() {
    let system = TestSystem::new().await;
    let trade_no = system.issue("alice").await;
    let mut payload = system.gateway.callback_payload(trade_no.as_str(), "1", 1200);
    payload.insert("TradeAmt", 1);
    let (status, body) =
        post_form("/callback", payload.to_urlencoded(), system.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let err: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(err["error"], "Invalid payment notification. CheckMacValue verification failed");
    assert_eq!(system.status_of(&trade_no).await, OrderStatusType::Created);
    assert!(!system.is_paid("alice").await);
    // Rejected notifications are still in the audit log
    assert_eq!(system.db.fetch_gateway_callbacks(10).await.unwrap().len(), 1);
}

#[actix_web::test]
async fn undecodable_callback_is_audited_before_rejection() {
    let system = TestSystem::new().await;
    let trade_no = system.issue("alice").await;
    let mut body = format!("MerchantID=3002607&MerchantTradeNo={trade_no}&RtnMsg=").into_bytes();
    body.extend_from_slice(&[0xff, 0xfe, b'&', b'x']);
    let (status, body) = post_form("/callback", body, system.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Missing required field: RtnCode"), "{body}");
    let audit = system.db.fetch_gateway_callbacks(10).await.unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].raw_body, format!("MerchantID=3002607&MerchantTradeNo={trade_no}&RtnMsg=\u{fffd}\u{fffd}&x"));
    assert_eq!(audit[0].remote_ip.as_deref(), Some("175.99.72.1"));
    assert_eq!(system.status_of(&trade_no).await, OrderStatusType::Created);
}

#[actix_web::test]
async fn callback_missing_fields_or_unknown_order() {
    let system = TestSystem::new().await;
    let trade_no = system.issue("alice").await;
    let payload = system.gateway.callback_payload(trade_no.as_str(), "1", 1200).without(&["RtnCode"]);
    let (status, body) =
        post_form("/callback", payload.to_urlencoded(), system.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Missing required field: RtnCode"), "{body}");

    let payload = system.gateway.callback_payload("0000000000000000beef", "1", 1200);
    let (status, body) =
        post_form("/callback", payload.to_urlencoded(), system.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Unknown trade number: 0000000000000000beef"), "{body}");
    assert_eq!(system.status_of(&trade_no).await, OrderStatusType::Created);
}

#[actix_web::test]
async fn unsuccessful_payment_is_acknowledged_without_change() {
    let system = TestSystem::new().await;
    let trade_no = system.issue("bob").await;
    let payload = system.gateway.callback_payload(trade_no.as_str(), "10100058", 1200);
    let (status, body) =
        post_form("/callback", payload.to_urlencoded(), system.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "1|OK");
    assert_eq!(system.status_of(&trade_no).await, OrderStatusType::Created);
}

//----------------------------------------------   Query & sweep  ----------------------------------------------------

#[actix_web::test]
async fn admin_queries_payment_status() {
    let system = TestSystem::new().await;
    let trade_no = system.issue("alice").await;
    system.gateway.set_trade_status(trade_no.as_str(), "1");
    let token = valid_token("admin", vec![Role::Admin]);
    let path = format!("/payment/query/{trade_no}");
    let (status, body) = get_request(&token, &path, system.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let res: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(res["success"], true);
    assert_eq!(res["order"]["MerchantTradeNo"], trade_no.as_str());
    assert_eq!(res["order"]["TradeStatus"], "1");
    assert_eq!(res["order"]["paymentStatus"], "paid");
    assert_eq!(res["order"]["isPaid"], true);
    assert!(system.is_paid("alice").await);
}

#[actix_web::test]
async fn query_payment_errors() {
    let system = TestSystem::new().await;
    let trade_no = system.issue("alice").await;
    let admin = valid_token("admin", vec![Role::Admin]);
    let (status, _) = get_request(&admin, "/payment/query/0000000000000000beef", system.configure())
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);

    system.gateway.set_unreachable(trade_no.as_str(), "connection reset");
    let path = format!("/payment/query/{trade_no}");
    let (status, _) = get_request(&admin, &path, system.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(system.status_of(&trade_no).await, OrderStatusType::Created);

    let user = valid_token("alice", vec![Role::User]);
    let err = get_request(&user, &path, system.configure()).await.expect_err("Request should have failed");
    assert_eq!(err, "Insufficient permissions.");
}

#[actix_web::test]
async fn admin_sweeps_outstanding_orders() {
    let system = TestSystem::new().await;
    let paid = system.issue("alice").await;
    let failed = system.issue("bob").await;
    let pending = system.issue("bob").await;
    system.gateway.set_trade_status(paid.as_str(), "1");
    system.gateway.set_trade_status(failed.as_str(), TRADE_STATUS_FAILED);
    let token = valid_token("admin", vec![Role::Admin]);
    let (status, body) =
        post_request(&token, "/payment/reconcile", json!({}), system.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let res: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(res["checked"], 3);
    assert_eq!(res["transitions"].as_array().unwrap().len(), 2);
    assert_eq!(system.status_of(&paid).await, OrderStatusType::Paid);
    assert_eq!(system.status_of(&failed).await, OrderStatusType::Failed);
    assert_eq!(system.status_of(&pending).await, OrderStatusType::Created);
    assert!(system.is_paid("alice").await);
    assert!(!system.is_paid("bob").await);

    system.gateway.set_trade_status(pending.as_str(), "1");
    let (status, body) =
        post_request(&token, "/payment/reconcile/bob", json!({}), system.configure()).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let res: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(res["checked"], 1);
    assert!(system.is_paid("bob").await);
}
