use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use conference_payment_engine::{
    db_types::{PaymentOption, Role, UserAccount},
    traits::PaymentOptionError,
    AccountApi,
    PaymentOptionsApi,
};
use serde_json::{json, Value};

use super::helpers::{get_request, put_request, valid_token};
use crate::{
    endpoint_tests::mocks::{MockAccountManager, MockPaymentOptionsManager},
    routes::{PaymentOptionsRoute, UpsertPaymentOptionRoute, UpsertUserRoute},
};

#[actix_web::test]
async fn list_active_payment_options() {
    let _ = env_logger::try_init().ok();
    let token = valid_token("att-0042", vec![Role::User]);
    let (status, body) = get_request(&token, "/payment_options", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let options: Value = serde_json::from_str(&body).unwrap();
    let ids = options.as_array().unwrap().iter().map(|o| o["option_id"].as_str().unwrap()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["regular"]);
}

#[actix_web::test]
async fn admin_upserts_payment_option() {
    let _ = env_logger::try_init().ok();
    let token = valid_token("admin", vec![Role::Admin]);
    let body = json!({
        "option_id": "student",
        "name": "Student",
        "price": 500,
        "valid_from": "2025-01-01T00:00:00Z",
        "valid_until": "2025-06-01T00:00:00Z"
    });
    let (status, body) = put_request(&token, "/payment_options", body, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let option: PaymentOption = serde_json::from_str(&body).unwrap();
    assert_eq!(option.option_id, "student");
    assert_eq!(option.price, 500);
}

#[actix_web::test]
async fn inverted_window_is_rejected() {
    let _ = env_logger::try_init().ok();
    let token = valid_token("admin", vec![Role::Admin]);
    let body = json!({
        "option_id": "student",
        "name": "Student",
        "price": 500,
        "valid_from": "2025-06-01T00:00:00Z",
        "valid_until": "2025-01-01T00:00:00Z"
    });
    let (status, body) = put_request(&token, "/payment_options", body, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("is after valid_until"));
}

#[actix_web::test]
async fn users_cannot_upsert_payment_options() {
    let _ = env_logger::try_init().ok();
    let token = valid_token("att-0042", vec![Role::User]);
    let body = json!({
        "option_id": "free",
        "name": "Free",
        "price": 1,
        "valid_from": "2025-01-01T00:00:00Z",
        "valid_until": "2025-06-01T00:00:00Z"
    });
    let err = put_request(&token, "/payment_options", body, configure).await.expect_err("Request should have failed");
    assert_eq!(err, "Insufficient permissions.");
}

#[actix_web::test]
async fn admin_upserts_user() {
    let _ = env_logger::try_init().ok();
    let token = valid_token("admin", vec![Role::Admin]);
    let body = json!({ "user_id": "att-0100", "email": "grace@example.com", "display_name": "Grace" });
    let (status, body) = put_request(&token, "/users", body, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let user: UserAccount = serde_json::from_str(&body).unwrap();
    assert_eq!(user.user_id, "att-0100");
    assert_eq!(user.email.as_deref(), Some("grace@example.com"));
    assert!(!user.paid);
}

fn configure(cfg: &mut ServiceConfig) {
    let mut options = MockPaymentOptionsManager::new();
    options.expect_fetch_payment_options().returning(|| Ok(payment_options()));
    options.expect_upsert_payment_option().returning(Ok::<PaymentOption, PaymentOptionError>);
    let mut accounts = MockAccountManager::new();
    accounts.expect_upsert_user().returning(|user| {
        Ok(UserAccount {
            user_id: user.user_id,
            email: user.email,
            display_name: user.display_name,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ..UserAccount::default()
        })
    });
    cfg.service(PaymentOptionsRoute::<MockPaymentOptionsManager>::new())
        .service(UpsertPaymentOptionRoute::<MockPaymentOptionsManager>::new())
        .service(UpsertUserRoute::<MockAccountManager>::new())
        .app_data(web::Data::new(PaymentOptionsApi::new(options)))
        .app_data(web::Data::new(AccountApi::new(accounts)));
}

// One option that has expired, one that runs well into the future
fn payment_options() -> Vec<PaymentOption> {
    vec![
        PaymentOption {
            option_id: "early".into(),
            name: "Early bird".into(),
            price: 900,
            valid_from: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            valid_until: Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap(),
        },
        PaymentOption {
            option_id: "regular".into(),
            name: "Regular".into(),
            price: 1200,
            valid_from: Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 1).unwrap(),
            valid_until: Utc.with_ymd_and_hms(2099, 12, 31, 0, 0, 0).unwrap(),
        },
    ]
}
