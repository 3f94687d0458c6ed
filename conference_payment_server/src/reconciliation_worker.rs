use std::time::Duration;

use conference_payment_engine::{
    events::EventProducers,
    order_objects::{StatusTransition, SweepResult},
    OrderFlowApi,
    SqliteDatabase,
};
use ecpay_tools::EcPayApi;
use log::*;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

/// Starts the reconciliation worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, every order still in `created` is checked against the gateway. This picks up payments whose
/// notification never arrived.
pub fn start_reconciliation_worker(
    db: SqliteDatabase,
    gateway: EcPayApi,
    producers: EventProducers,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let api = OrderFlowApi::new(db, gateway, producers);
        info!("🕰️ Reconciliation worker started. Sweeping every {}s", interval.as_secs());
        // The first tick completes immediately. Skip it so that a restart loop doesn't hammer the gateway.
        timer.tick().await;
        loop {
            timer.tick().await;
            info!("🕰️ Running reconciliation sweep");
            match api.reconcile_all().await {
                Ok(result) => log_sweep(&result),
                Err(e) => {
                    error!("🕰️ Error running reconciliation sweep: {e}");
                },
            }
        }
    })
}

fn log_sweep(result: &SweepResult) {
    info!(
        "🕰️ {} orders checked. {} paid, {} failed, {} could not be checked",
        result.checked,
        result.paid_count(),
        result.failed_count(),
        result.failures.len()
    );
    if !result.transitions.is_empty() {
        debug!("🕰️ Transitions: {}", transition_list(&result.transitions));
    }
    for failure in &result.failures {
        warn!("🕰️ Could not reconcile {}: {}", failure.subject, failure.reason);
    }
}

fn transition_list(transitions: &[StatusTransition]) -> String {
    transitions
        .iter()
        .map(|t| format!("[{}] user: {} {} -> {}", t.trade_no, t.user_id, t.from, t.to))
        .collect::<Vec<String>>()
        .join(", ")
}
