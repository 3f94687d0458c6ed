use std::str::FromStr;

use clap::{Args, Parser, Subcommand};
use conference_payment_engine::db_types::Role;
use log::*;
use serde::Serialize;

mod checksum;
mod client;
mod jwt_token;
mod keys;
mod notify;

use crate::{
    checksum::print_checksum,
    client::PaymentServerClient,
    jwt_token::print_jwt_token,
    keys::print_new_keys,
    notify::send_notification,
};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8360";

#[derive(Parser, Debug)]
#[command(version = "0.1.0", about = "Operator tools for the conference payment server")]
pub struct Arguments {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a new JWT signing key pair for CPG_JWT_SIGNING_KEY and CPG_JWT_VERIFICATION_KEY
    #[clap(name = "keys")]
    NewKeys,
    /// Sign an access token for an attendee or an administrator
    #[clap(name = "token")]
    AccessToken {
        /// The server's JWT signing key, in hex
        #[arg(short = 's', long = "seckey", env = "CPG_JWT_SIGNING_KEY", hide_env_values = true)]
        secret: String,
        /// The attendee's user id
        #[arg(short = 'u', long = "user")]
        user_id: String,
        /// Roles you want the token to grant
        #[arg(short = 'r', long = "roles", default_value = "user", value_parser = Role::from_str)]
        roles: Vec<Role>,
        /// How long the token is valid for, in hours. The default is 24.
        #[arg(long = "hours")]
        hours: Option<u64>,
    },
    /// Calculate a CheckMacValue, or verify the one included in the parameters
    #[clap(name = "checksum")]
    Checksum(ChecksumParams),
    /// Send a signed payment result notification to a (test) server
    #[clap(name = "callback")]
    Callback(CallbackParams),
    /// Check that the server is up and that the access token is accepted
    #[clap(name = "health")]
    Health(ServerParams),
    /// List the payment options that can be bought right now
    #[clap(name = "options")]
    Options(ServerParams),
    /// Show an attendee's payment summary. Without a user id, the token's own summary is shown.
    #[clap(name = "orders")]
    Orders {
        #[command(flatten)]
        server: ServerParams,
        #[arg(short = 'u', long = "user")]
        user_id: Option<String>,
    },
    /// Ask the gateway for the status of an order and apply it
    #[clap(name = "query")]
    Query {
        #[command(flatten)]
        server: ServerParams,
        /// The merchant trade number of the order
        trade_no: String,
    },
    /// Reconcile outstanding orders with the gateway
    #[clap(name = "sweep")]
    Sweep {
        #[command(flatten)]
        server: ServerParams,
        /// Only reconcile this attendee's orders
        #[arg(short = 'u', long = "user")]
        user_id: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct ServerParams {
    /// The payment server's base URL
    #[arg(long = "server", env = "CPG_SERVER_URL", default_value = DEFAULT_SERVER)]
    server: String,
    /// An access token, as issued by `cpgtools token`
    #[arg(short = 't', long = "token", env = "CPG_ACCESS_TOKEN", hide_env_values = true)]
    token: String,
}

#[derive(Debug, Args)]
pub struct ChecksumParams {
    /// Gateway parameters as Key=Value pairs
    pairs: Vec<String>,
    /// Read the parameters from a flat JSON object in this file instead
    #[arg(long = "json", conflicts_with = "form")]
    json: Option<String>,
    /// Read the parameters from a url-encoded form body instead
    #[arg(long = "form")]
    form: Option<String>,
}

#[derive(Debug, Args)]
pub struct CallbackParams {
    /// The payment server's base URL
    #[arg(long = "server", env = "CPG_SERVER_URL", default_value = DEFAULT_SERVER)]
    server: String,
    /// The merchant trade number of the order that was paid
    trade_no: String,
    /// The amount paid
    #[arg(short = 'a', long = "amount")]
    amount: i64,
    /// The gateway's result code. 1 means success.
    #[arg(long = "rtn-code", default_value = "1")]
    rtn_code: String,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();
    let cli = Arguments::parse();
    let result = match cli.command {
        Command::NewKeys => {
            print_new_keys();
            Ok(())
        },
        Command::AccessToken { secret, user_id, roles, hours } => {
            print_jwt_token(secret, user_id, roles, hours);
            Ok(())
        },
        Command::Checksum(params) => {
            print_checksum(params);
            Ok(())
        },
        Command::Callback(params) => send_notification(params).await,
        Command::Health(server) => health(server).await,
        Command::Options(server) => options(server).await,
        Command::Orders { server, user_id } => orders(server, user_id).await,
        Command::Query { server, trade_no } => query(server, trade_no).await,
        Command::Sweep { server, user_id } => sweep(server, user_id).await,
    };
    if let Err(e) = result {
        error!("{e}");
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn connect(params: ServerParams) -> anyhow::Result<PaymentServerClient> {
    PaymentServerClient::new(&params.server, params.token)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn health(params: ServerParams) -> anyhow::Result<()> {
    let client = connect(params)?;
    let status = client.health().await?;
    println!("{}: {status}", client.server());
    let token = client.check_token().await?;
    println!("{}", token.message);
    Ok(())
}

async fn options(params: ServerParams) -> anyhow::Result<()> {
    let client = connect(params)?;
    let options = client.payment_options().await?;
    print_json(&options)
}

async fn orders(params: ServerParams, user_id: Option<String>) -> anyhow::Result<()> {
    let client = connect(params)?;
    let summary = match user_id {
        Some(id) => client.orders_for(&id).await?,
        None => client.my_orders().await?,
    };
    print_json(&summary)
}

async fn query(params: ServerParams, trade_no: String) -> anyhow::Result<()> {
    let client = connect(params)?;
    let status = client.query_payment(&trade_no).await?;
    print_json(&status.order)
}

async fn sweep(params: ServerParams, user_id: Option<String>) -> anyhow::Result<()> {
    let client = connect(params)?;
    let result = client.reconcile(user_id.as_deref()).await?;
    println!(
        "{} orders checked. {} paid, {} failed, {} errors.",
        result.checked,
        result.paid_count(),
        result.failed_count(),
        result.failures.len()
    );
    for t in &result.transitions {
        println!("  {} ({}): {} -> {}", t.trade_no, t.user_id, t.from, t.to);
    }
    for f in &result.failures {
        println!("  {}: {}", f.subject, f.reason);
    }
    Ok(())
}
