//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Anything that talks to the database or the payment gateway is
//! therefore written as an async function, so that the worker can serve other requests while it waits.
//!
//! Routes fall into three groups:
//! * `/health`, which is public.
//! * `/gateway/callback`, which is called by the payment gateway. It is authenticated by `CheckMacValue` and,
//!   optionally, an IP whitelist. Never by JWT.
//! * Everything under `/api`, which requires an access token in the `tpg_access_token` header. Routes marked
//!   `requires [Role::Admin]` additionally need the admin role.
use std::str::FromStr;

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use conference_payment_engine::{
    db_types::{NewUserAccount, PaymentOption, Role, TradeNo},
    traits::{AccountManagement, PaymentGatewayClient, PaymentGatewayDatabase, PaymentOptions},
    AccountApi,
    OrderFlowApi,
    PaymentOptionsApi,
};
use log::*;

use crate::{
    auth::JwtClaims,
    config::ServerOptions,
    data_objects::{CheckoutRequestBody, CheckoutResponse, JsonResponse, OrderStatusResponse},
    errors::ServerError,
    helpers::get_remote_ip,
};

/// The body the gateway expects in reply to every accepted payment notification.
pub const CALLBACK_ACK: &str = "1|OK";

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal requires [$($roles:expr),*]) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name)
                        .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),*]));
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),*])  => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),*]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Gateway  ----------------------------------------------------
route!(gateway_callback => Post "/callback" impl PaymentGatewayDatabase, PaymentGatewayClient);
/// Route handler for the payment gateway's server-to-server notification (`ReturnURL`).
///
/// The body is the gateway's form-encoded parameter set. Notifications that are missing a required field, fail
/// `CheckMacValue` verification, or name an order we never issued are refused with a 400 and a JSON error, and
/// nothing is changed. Every other notification is acknowledged with `1|OK`, even if recording it failed
/// internally, because the gateway keeps retrying until it sees that acknowledgement.
pub async fn gateway_callback<B, G>(
    req: HttpRequest,
    body: web::Bytes,
    options: web::Data<ServerOptions>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: PaymentGatewayClient,
{
    let raw_body = String::from_utf8_lossy(&body);
    if std::str::from_utf8(&body).is_err() {
        warn!("📥️ Payment notification body is not valid UTF-8. It will be audited with replacement characters.");
    }
    let remote_ip = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded).map(|ip| ip.to_string());
    debug!("📥️ Payment notification received from {}", remote_ip.as_deref().unwrap_or("unknown"));
    let ack = api.process_callback(&raw_body, remote_ip.as_deref()).await?;
    match (&ack.transition, &ack.error) {
        (_, Some(e)) => error!("📥️ Notification for {} acknowledged, but not applied. {e}", ack.trade_no),
        (Some(t), None) => info!("📥️ Order {} moved from {} to {}", t.trade_no, t.from, t.to),
        (None, None) => debug!("📥️ Notification for {} acknowledged. No change", ack.trade_no),
    }
    Ok(HttpResponse::Ok().content_type("text/plain").body(CALLBACK_ACK))
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(payment_options => Get "/payment_options" impl PaymentOptions);
/// Route handler for the payment options endpoint
///
/// Lists the payment options that can be bought right now.
pub async fn payment_options<B: PaymentOptions>(api: web::Data<PaymentOptionsApi<B>>) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET payment_options");
    let options = api.active_options(Utc::now()).await?;
    Ok(HttpResponse::Ok().json(options))
}

route!(checkout => Post "/checkout" impl PaymentGatewayDatabase, PaymentGatewayClient);
/// Route handler for the checkout endpoint
///
/// Issues a new order for the user identified by the access token and returns the signed form that the browser must
/// post to the gateway. Business-rule rejections (unknown or inactive option, already paid) come back as 4xx
/// responses with a message that can be shown to the attendee.
pub async fn checkout<B, G>(
    claims: JwtClaims,
    body: web::Json<CheckoutRequestBody>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: PaymentGatewayClient,
{
    let CheckoutRequestBody { option_id } = body.into_inner();
    debug!("💻️ POST checkout for {} ({option_id})", claims.user_id);
    let draft = api.issue_order(&claims.user_id, &option_id, Utc::now()).await.map_err(|e| {
        info!("💻️ Could not issue an order for {}. {e}", claims.user_id);
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(CheckoutResponse::from(draft)))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(my_orders => Get "/orders" impl AccountManagement);
/// Route handler for the orders endpoint
///
/// Authenticated users can fetch their own payment state using this endpoint: the paid flag, and every order issued to
/// them. The user id is extracted from the JWT token supplied in the `tpg_access_token` header.
///
/// Admin users can use the `/orders/{user_id}` endpoint to fetch orders for any attendee.
pub async fn my_orders<B: AccountManagement>(
    claims: JwtClaims,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_orders for {}", claims.user_id);
    get_payment_summary(&claims.user_id, api.as_ref()).await
}

route!(orders => Get "/orders/{user_id}" impl AccountManagement where requires [Role::Admin]);
/// Route handler for the orders/{user_id} endpoint
///
/// Admin users can fetch the payment state of any attendee using this endpoint.
pub async fn orders<B: AccountManagement>(
    path: web::Path<String>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    debug!("💻️ GET orders for {user_id}");
    get_payment_summary(&user_id, api.as_ref()).await
}

async fn get_payment_summary<B: AccountManagement>(
    user_id: &str,
    api: &AccountApi<B>,
) -> Result<HttpResponse, ServerError> {
    let summary = api.payment_summary(user_id).await.map_err(|e| {
        debug!("💻️ Could not fetch the payment summary for {user_id}. {e}");
        ServerError::from(e)
    })?;
    match summary {
        Some(summary) => Ok(HttpResponse::Ok().json(summary)),
        None => Err(ServerError::NoRecordFound(format!("User {user_id} is not registered"))),
    }
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(query_payment => Get "/payment/query/{trade_no}" impl PaymentGatewayDatabase, PaymentGatewayClient where requires [Role::Admin]);
/// Route handler for the payment query endpoint
///
/// Asks the gateway for the current state of an order, applies it, and returns everything the gateway reported along
/// with the order's `paymentStatus` and the owner's `isPaid` flag.
pub async fn query_payment<B, G>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: PaymentGatewayClient,
{
    let trade_no = TradeNo::from_str(&path.into_inner()).map_err(|e| ServerError::InvalidRequestPath(e.to_string()))?;
    debug!("💻️ GET payment status for {trade_no}");
    let order = api.query_status(&trade_no).await.map_err(|e| {
        warn!("💻️ Could not query the payment status of {trade_no}. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(OrderStatusResponse { success: true, order }))
}

route!(reconcile_all => Post "/payment/reconcile" impl PaymentGatewayDatabase, PaymentGatewayClient where requires [Role::Admin]);
/// Route handler for the sweep endpoint
///
/// Reconciles every outstanding order of every attendee with the gateway. Orders and attendees that cannot be
/// reconciled are reported in the result's `failures` and skipped.
pub async fn reconcile_all<B, G>(api: web::Data<OrderFlowApi<B, G>>) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: PaymentGatewayClient,
{
    info!("🔁️ POST reconcile all outstanding orders");
    let result = api.reconcile_all().await?;
    info!(
        "🔁️ Sweep complete. {} checked, {} paid, {} failed, {} errors",
        result.checked,
        result.paid_count(),
        result.failed_count(),
        result.failures.len()
    );
    Ok(HttpResponse::Ok().json(result))
}

route!(reconcile_user => Post "/payment/reconcile/{user_id}" impl PaymentGatewayDatabase, PaymentGatewayClient where requires [Role::Admin]);
pub async fn reconcile_user<B, G>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: PaymentGatewayClient,
{
    let user_id = path.into_inner();
    info!("🔁️ POST reconcile outstanding orders for {user_id}");
    let result = api.reconcile_user(&user_id).await?;
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(upsert_user => Put "/users" impl AccountManagement where requires [Role::Admin]);
/// Route handler for the user upsert endpoint
///
/// The registration system of record pushes attendees here. Existing attendees have their contact details updated.
/// The paid flag is never touched.
pub async fn upsert_user<B: AccountManagement>(
    body: web::Json<NewUserAccount>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user = body.into_inner();
    debug!("💻️ PUT user {}", user.user_id);
    let user = api.upsert_user(user).await?;
    Ok(HttpResponse::Ok().json(user))
}

route!(upsert_payment_option => Put "/payment_options" impl PaymentOptions where requires [Role::Admin]);
pub async fn upsert_payment_option<B: PaymentOptions>(
    body: web::Json<PaymentOption>,
    api: web::Data<PaymentOptionsApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let option = body.into_inner();
    debug!("💻️ PUT payment option {}", option.option_id);
    let option = api.upsert_option(option).await?;
    Ok(HttpResponse::Ok().json(option))
}

//----------------------------------------------   Check Token  ----------------------------------------------------
route!(check_token => Get "/check_token" requires [Role::User]);
pub async fn check_token(claims: JwtClaims) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET check_token for {}", claims.user_id);
    Ok(HttpResponse::Ok().json(JsonResponse::success("Token is valid.")))
}
