use std::time::Duration;

use conference_payment_engine::{
    db_types::OrderStatusType,
    traits::{AccountManagement, PaymentGatewayClient},
};
use cucumber::{then, when};
use ecpay_tools::CHECK_MAC_VALUE;

use crate::cucumber::{setups::parse_date, PaymentWorld};

#[when(expr = "'{word}' checks out with option '{word}' on {word}")]
async fn check_out(world: &mut PaymentWorld, user_id: String, option_id: String, date: String) {
    match world.api().issue_order(&user_id, &option_id, parse_date(&date)).await {
        Ok(draft) => {
            world.last_order = Some(draft);
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "the gateway reports TradeStatus {word} for the order")]
async fn gateway_reports(world: &mut PaymentWorld, code: String) {
    let trade_no = world.last_order().order.trade_no.clone();
    world.system().gateway.set_trade_status(trade_no.as_str(), &code);
}

#[when("an administrator queries the order status")]
async fn admin_query(world: &mut PaymentWorld) {
    let trade_no = world.last_order().order.trade_no.clone();
    world.api().query_status(&trade_no).await.expect("Error querying order status");
}

#[when(expr = "the gateway notifies that the order was paid")]
async fn gateway_notifies(world: &mut PaymentWorld) {
    let order = world.last_order().order.clone();
    let payload = world.system().gateway.callback_payload(order.trade_no.as_str(), "1", order.amount);
    world.api().process_callback(&payload.to_urlencoded(), None).await.expect("Notification should be accepted");
}

#[then(expr = "the order has status {word} and amount {int}")]
async fn order_status_and_amount(world: &mut PaymentWorld, status: String, amount: i64) {
    let trade_no = world.last_order().order.trade_no.clone();
    let order = world.api().db().fetch_order_by_trade_no(&trade_no).await.expect("Error fetching order");
    let order = order.expect("The order does not exist");
    let expected: OrderStatusType = status.parse().expect("Not a valid order status");
    assert_eq!(order.status, expected, "Order status is incorrect");
    assert_eq!(order.amount, amount, "Order amount is incorrect");
}

#[then("the checkout form is signed")]
async fn checkout_form_signed(world: &mut PaymentWorld) {
    let draft = world.last_order();
    let mac = draft.params.get(CHECK_MAC_VALUE).expect("No CheckMacValue in the checkout form");
    assert!(world.system().gateway.verify_checksum(&draft.params, mac));
}

#[then(expr = "the checkout is refused with {string}")]
async fn checkout_refused(world: &mut PaymentWorld, message: String) {
    let err = world.last_error.as_ref().expect("The checkout was not refused");
    assert!(err.to_string().contains(&message), "Unexpected error: {err}");
}

#[then(expr = "attendee '{word}' has paid")]
async fn attendee_paid(world: &mut PaymentWorld, user_id: String) {
    let user = world.api().db().fetch_user(&user_id).await.expect("Error fetching attendee");
    assert!(user.expect("Attendee does not exist").paid, "{user_id} should have paid");
}

#[then(expr = "attendee '{word}' has not paid")]
async fn attendee_not_paid(world: &mut PaymentWorld, user_id: String) {
    let user = world.api().db().fetch_user(&user_id).await.expect("Error fetching attendee");
    assert!(!user.expect("Attendee does not exist").paid, "{user_id} should not have paid");
}

#[then(expr = "{int} payment confirmation(s) were/was sent")]
async fn confirmations_sent(world: &mut PaymentWorld, count: usize) {
    // Handlers run on their own tasks. Give them a moment to catch up.
    for _ in 0..50 {
        if world.system().confirmation_count() >= count {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(world.system().confirmation_count(), count, "Wrong number of confirmations");
}
