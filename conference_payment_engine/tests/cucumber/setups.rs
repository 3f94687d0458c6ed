use chrono::NaiveDate;
use conference_payment_engine::{
    db_types::{NewUserAccount, PaymentOption},
    traits::{AccountManagement, PaymentOptions},
};
use cucumber::given;

use crate::cucumber::{payment_world::PaymentSystem, PaymentWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut PaymentWorld) {
    let system = PaymentSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "a payment option '{word}' named {string} priced {int} valid from {word} until {word}")]
async fn payment_option(world: &mut PaymentWorld, option_id: String, name: String, price: i64, from: String, until: String) {
    let option = PaymentOption {
        option_id,
        name,
        price,
        valid_from: parse_date(&from),
        valid_until: parse_date(&until),
    };
    world.api().db().upsert_payment_option(option).await.expect("Error saving payment option");
}

#[given(expr = "an attendee '{word}'")]
async fn attendee(world: &mut PaymentWorld, user_id: String) {
    let user = NewUserAccount::new(user_id.as_str()).with_display_name(user_id.as_str());
    world.api().db().upsert_user(user).await.expect("Error saving attendee");
}

pub fn parse_date(s: &str) -> chrono::DateTime<chrono::Utc> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .expect("Dates must be YYYY-MM-DD")
        .and_hms_opt(0, 0, 0)
        .expect("Midnight is a valid time")
        .and_utc()
}
