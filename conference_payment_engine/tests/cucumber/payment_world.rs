use std::{
    fmt::Debug,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use conference_payment_engine::{
    events::{EventHandler, EventProducers, PaymentConfirmedEvent},
    order_objects::OrderDraft,
    test_utils::{
        prepare_env::{create_database, random_db_path, run_migrations},
        MockGateway,
    },
    IssuanceError,
    OrderFlowApi,
    SqliteDatabase,
};
use cucumber::World;
use log::*;

#[derive(Default, Debug, World)]
pub struct PaymentWorld {
    pub system: Option<PaymentSystem>,
    pub last_order: Option<OrderDraft>,
    pub last_error: Option<IssuanceError>,
}

pub struct PaymentSystem {
    pub db_path: String,
    pub api: OrderFlowApi<SqliteDatabase, MockGateway>,
    pub gateway: MockGateway,
    pub confirmations: Arc<AtomicUsize>,
}

impl Debug for PaymentSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentSystem ({})", self.db_path)
    }
}

impl PaymentWorld {
    pub fn system(&self) -> &PaymentSystem {
        self.system.as_ref().expect("Payment system not initialised")
    }

    pub fn api(&self) -> &OrderFlowApi<SqliteDatabase, MockGateway> {
        &self.system().api
    }

    pub fn last_order(&self) -> &OrderDraft {
        self.last_order.as_ref().expect("No order has been issued")
    }
}

impl PaymentSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 1).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let confirmations = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&confirmations);
        let handler = EventHandler::<PaymentConfirmedEvent>::new(
            10,
            Arc::new(move |ev: PaymentConfirmedEvent| {
                let counter = Arc::clone(&counter);
                Box::pin(async move {
                    info!("🪝️ Confirmation for {} ({})", ev.user.user_id, ev.order.trade_no);
                    counter.fetch_add(1, Ordering::SeqCst);
                }) as Pin<Box<dyn Future<Output = ()> + Send>>
            }),
        );
        let mut producers = EventProducers::default();
        producers.payment_confirmed_producer.push(handler.subscribe());
        tokio::spawn(handler.start_handler());
        let gateway = MockGateway::new();
        let api = OrderFlowApi::new(db, gateway.clone(), producers);
        Self { db_path: url, api, gateway, confirmations }
    }

    pub fn confirmation_count(&self) -> usize {
        self.confirmations.load(Ordering::SeqCst)
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}
