use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use conference_payment_engine::{
    db_types::{Order, OrderStatusType, Role, TradeNo, UserAccount},
    AccountApi,
};
use ecpay_tools::TradeParams;
use log::debug;
use serde_json::Value;

use super::helpers::{get_request, valid_token};
use crate::{
    endpoint_tests::mocks::MockAccountManager,
    routes::{CheckTokenRoute, MyOrdersRoute, OrdersRoute},
};

#[actix_web::test]
async fn fetch_my_orders_no_headers() {
    let _ = env_logger::try_init().ok();
    let err = get_request("", "/orders", configure).await.expect_err("Expected error");
    assert_eq!(
        err,
        "An error occurred, no cookie containing a jwt was found in the request. Please first authenticate with this \
         application."
    );
}

#[actix_web::test]
async fn fetch_my_orders() {
    let _ = env_logger::try_init().ok();
    let token = valid_token("att-0042", vec![Role::User]);
    let (status, body) = get_request(&token, "/orders", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let summary: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(summary["user"]["user_id"], "att-0042");
    assert_eq!(summary["user"]["paid"], true);
    assert_eq!(summary["order_ids"], serde_json::json!(["0000000000000000a001", "0000000000000000a002"]));
    assert_eq!(summary["orders"][0]["status"], "failed");
    assert_eq!(summary["orders"][1]["status"], "paid");
    assert_eq!(summary["orders"][1]["amount"], 900);
}

#[actix_web::test]
async fn fetch_my_orders_invalid_sig() {
    let _ = env_logger::try_init().ok();
    let mut token = valid_token("att-0042", vec![Role::User]);
    token.replace_range(token.len() - 10..token.len() - 5, "00000");
    debug!("Calling /orders with invalid token {token}");
    let err = get_request(&token, "/orders", configure).await.expect_err("Expected error");
    assert_eq!(err, "An error occurred validating the jwt.\n\t Error: \"signature has failed verification\"");
}

#[actix_web::test]
async fn fetch_orders_for_unregistered_user() {
    let _ = env_logger::try_init().ok();
    let token = valid_token("nobody", vec![Role::User]);
    let (status, body) = get_request(&token, "/orders", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. User nobody is not registered"}"#);
}

#[actix_web::test]
async fn fetch_another_users_orders_as_admin() {
    let _ = env_logger::try_init().ok();
    let token = valid_token("admin", vec![Role::Admin]);
    let (status, body) = get_request(&token, "/orders/att-0042", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let summary: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(summary["user"]["user_id"], "att-0042");
}

#[actix_web::test]
async fn fetch_another_users_orders_as_normal_user() {
    let _ = env_logger::try_init().ok();
    let token = valid_token("att-0099", vec![Role::User]);
    let err = get_request(&token, "/orders/att-0042", configure).await.expect_err("Request should have failed");
    assert_eq!(err, "Insufficient permissions.");
}

#[actix_web::test]
async fn check_token() {
    let _ = env_logger::try_init().ok();
    let token = valid_token("att-0042", vec![Role::User]);
    let (status, body) = get_request(&token, "/check_token", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"success":true,"message":"Token is valid."}"#);
    let token = valid_token("att-0042", vec![]);
    let err = get_request(&token, "/check_token", configure).await.expect_err("Request should have failed");
    assert_eq!(err, "Insufficient permissions.");
}

fn configure(cfg: &mut ServiceConfig) {
    let mut account_manager = MockAccountManager::new();
    account_manager.expect_fetch_user().returning(|user_id| {
        Ok((user_id == "att-0042").then(|| UserAccount {
            user_id: user_id.to_string(),
            email: Some("ada@example.com".into()),
            display_name: Some("Ada".into()),
            paid: true,
            paid_at: Some(Utc.with_ymd_and_hms(2025, 3, 1, 10, 5, 0).unwrap()),
            ..UserAccount::default()
        }))
    });
    account_manager
        .expect_fetch_trade_nos_for_user()
        .returning(|_| Ok(orders_response().into_iter().map(|o| o.trade_no).collect()));
    account_manager.expect_fetch_orders_for_user().returning(|_| Ok(orders_response()));
    let accounts_api = AccountApi::new(account_manager);
    cfg.service(MyOrdersRoute::<MockAccountManager>::new())
        .service(OrdersRoute::<MockAccountManager>::new())
        .service(CheckTokenRoute::new())
        .app_data(web::Data::new(accounts_api));
}

// Mock response to `fetch_orders_for_user` call
fn orders_response() -> Vec<Order> {
    vec![
        Order {
            id: 1,
            trade_no: TradeNo("0000000000000000a001".into()),
            user_id: "att-0042".into(),
            option_id: "early".into(),
            amount: 900,
            status: OrderStatusType::Failed,
            request_params: TradeParams::default(),
            gateway_response: Some(TradeParams::new().with("TradeStatus", "10200095")),
            created_at: Utc.with_ymd_and_hms(2025, 2, 27, 13, 30, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 2, 27, 13, 45, 0).unwrap(),
        },
        Order {
            id: 2,
            trade_no: TradeNo("0000000000000000a002".into()),
            user_id: "att-0042".into(),
            option_id: "early".into(),
            amount: 900,
            status: OrderStatusType::Paid,
            request_params: TradeParams::default(),
            gateway_response: Some(TradeParams::new().with("RtnCode", "1")),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 3, 1, 10, 5, 0).unwrap(),
        },
    ]
}
