use std::time::Duration;

use actix_jwt_auth_middleware::use_jwt::UseJWTOnApp;
use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use conference_payment_engine::{
    events::EventProducers,
    traits::PaymentGatewayDatabase,
    AccountApi,
    OrderFlowApi,
    PaymentOptionsApi,
    SqliteDatabase,
};
use ecpay_tools::EcPayApi;
use futures::{future::ok, FutureExt};
use log::*;

use crate::{
    auth::build_cpg_authority,
    config::{ServerConfig, ServerOptions},
    errors::{AuthError, ServerError, ServerError::AuthenticationError},
    helpers::{get_remote_ip, is_whitelisted},
    notifications::{create_notification_event_handlers, ConfirmationMailer},
    reconciliation_worker::start_reconciliation_worker,
    routes::{
        health,
        CheckTokenRoute,
        CheckoutRoute,
        GatewayCallbackRoute,
        MyOrdersRoute,
        OrdersRoute,
        PaymentOptionsRoute,
        QueryPaymentRoute,
        ReconcileAllRoute,
        ReconcileUserRoute,
        UpsertPaymentOptionRoute,
        UpsertUserRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let mut db = SqliteDatabase::new_with_url(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(format!("Migrations failed. {e}")))?;
    let gateway = EcPayApi::new(config.ecpay.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let mailer = ConfirmationMailer::new(&config.mail);
    let handlers = create_notification_event_handlers(mailer);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let worker = config
        .reconcile_interval
        .map(|interval| start_reconciliation_worker(db.clone(), gateway.clone(), producers.clone(), interval));
    let srv = create_server_instance(config, db.clone(), gateway, producers)?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    if let Some(worker) = worker {
        worker.abort();
    }
    info!("🗃️ Closing the database connection pool");
    if let Err(e) = db.close().await {
        warn!("🗃️ Could not close the database cleanly. {e}");
    }
    result
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: EcPayApi,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let authority = build_cpg_authority(config.auth.clone())?;
    let options = ServerOptions::from_config(&config);
    let whitelist = config.gateway_whitelist.clone();
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone(), gateway.clone(), producers.clone());
        let accounts_api = AccountApi::new(db.clone());
        let options_api = PaymentOptionsApi::new(db.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("cpg::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(accounts_api))
            .app_data(web::Data::new(options_api))
            .app_data(web::Data::new(options));
        // Routes that require authentication
        let auth_scope = web::scope("/api")
            .service(PaymentOptionsRoute::<SqliteDatabase>::new())
            .service(CheckoutRoute::<SqliteDatabase, EcPayApi>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(OrdersRoute::<SqliteDatabase>::new())
            .service(QueryPaymentRoute::<SqliteDatabase, EcPayApi>::new())
            .service(ReconcileAllRoute::<SqliteDatabase, EcPayApi>::new())
            .service(ReconcileUserRoute::<SqliteDatabase, EcPayApi>::new())
            .service(UpsertUserRoute::<SqliteDatabase>::new())
            .service(UpsertPaymentOptionRoute::<SqliteDatabase>::new())
            .service(CheckTokenRoute::new());
        let whitelist = whitelist.clone();
        let gateway_scope = web::scope("/gateway")
            .wrap_fn(move |req, srv| {
                let peer_ip = get_remote_ip(req.request(), options.use_x_forwarded_for, options.use_forwarded);
                if is_whitelisted(peer_ip, &whitelist) {
                    srv.call(req).boxed_local()
                } else {
                    warn!("📥️ Refused a gateway request from {peer_ip:?}. The address is not whitelisted.");
                    ok(req.error_response(AuthenticationError(AuthError::ForbiddenPeer))).boxed_local()
                }
            })
            .service(GatewayCallbackRoute::<SqliteDatabase, EcPayApi>::new());
        app.use_jwt(authority.clone(), auth_scope).service(health).service(gateway_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
