use std::{env, io::Write, net::IpAddr, time::Duration};

use conference_payment_engine::db::db_url;
use cpg_common::helpers::env_or_default;
use ecpay_tools::EcPayConfig;
use log::*;
use rand::thread_rng;
use serde_json::json;
use tari_jwt::{
    tari_crypto::{
        keys::PublicKey,
        ristretto::{RistrettoPublicKey, RistrettoSecretKey},
        tari_utilities::hex::Hex,
    },
    Ristretto256SigningKey,
    Ristretto256VerifyingKey,
};
use tempfile::NamedTempFile;

use crate::errors::ServerError;

const DEFAULT_CPG_HOST: &str = "127.0.0.1";
const DEFAULT_CPG_PORT: u16 = 8360;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_MAIL_FROM: &str = "registration@localhost";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub auth: AuthConfig,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    /// If supplied, requests against the /gateway endpoints will be checked against this whitelist of IP addresses.
    pub gateway_whitelist: Option<Vec<IpAddr>>,
    /// If supplied, every outstanding order is reconciled with the gateway at this interval.
    pub reconcile_interval: Option<Duration>,
    pub mail: MailConfig,
    pub ecpay: EcPayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CPG_HOST.to_string(),
            port: DEFAULT_CPG_PORT,
            database_url: String::default(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            auth: AuthConfig::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            gateway_whitelist: None,
            reconcile_interval: None,
            mail: MailConfig::default(),
            ecpay: EcPayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("CPG_HOST").ok().unwrap_or_else(|| DEFAULT_CPG_HOST.into());
        let port = env::var("CPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for CPG_PORT. {e} Using the default, {DEFAULT_CPG_PORT}, instead."
                    );
                    DEFAULT_CPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_CPG_PORT);
        let database_url = db_url();
        let db_max_connections = env_or_default("CPG_DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS);
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let use_x_forwarded_for =
            env::var("CPG_USE_X_FORWARDED_FOR").map(|s| &s == "1" || &s == "true").unwrap_or(false);
        let use_forwarded = env::var("CPG_USE_FORWARDED").map(|s| &s == "1" || &s == "true").unwrap_or(false);
        let gateway_whitelist = env::var("CPG_GATEWAY_IP_WHITELIST").ok().and_then(|s| parse_whitelist(&s));
        log_whitelist(&gateway_whitelist);
        let reconcile_interval = configure_reconcile_interval();
        let mail = MailConfig::from_env_or_default();
        let ecpay = EcPayConfig::new_from_env_or_default();
        Self {
            host,
            port,
            database_url,
            db_max_connections,
            auth,
            use_x_forwarded_for,
            use_forwarded,
            gateway_whitelist,
            reconcile_interval,
            mail,
            ecpay,
        }
    }
}

/// Parses a comma-separated list of IP addresses. "none", "false" and "0" explicitly disable the whitelist.
pub fn parse_whitelist(s: &str) -> Option<Vec<IpAddr>> {
    if ["none", "false", "0", ""].contains(&s.trim().to_lowercase().as_str()) {
        info!(
            "🪛️ Gateway IP whitelist is disabled. If this is not what you want, set CPG_GATEWAY_IP_WHITELIST to a \
             comma-separated list of IP addresses to enable it."
        );
        return None;
    }
    let ip_addrs = s
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            s.parse()
                .map_err(|e| {
                    warn!("🪛️ Ignoring invalid IP address ({s}) in CPG_GATEWAY_IP_WHITELIST: {e}");
                })
                .ok()
        })
        .collect::<Vec<IpAddr>>();
    Some(ip_addrs)
}

fn log_whitelist(whitelist: &Option<Vec<IpAddr>>) {
    match whitelist {
        Some(whitelist) if whitelist.is_empty() => {
            warn!(
                "🚨️ The gateway IP whitelist was configured, but is empty. The server will run, but won't accept any \
                 payment notifications."
            );
        },
        None => {
            info!("🪛️ No gateway IP whitelist is set. Only CheckMacValue validation will be used.");
        },
        Some(v) => {
            let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
            info!("🪛️ Gateway IP whitelist: {addrs}");
        },
    }
}

fn configure_reconcile_interval() -> Option<Duration> {
    let minutes = env::var("CPG_RECONCILE_INTERVAL_MINUTES")
        .map_err(|_| info!("🪛️ CPG_RECONCILE_INTERVAL_MINUTES is not set. The periodic sweep is disabled."))
        .and_then(|s| {
            s.trim()
                .parse::<u64>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for CPG_RECONCILE_INTERVAL_MINUTES. {e}"))
        })
        .ok()?;
    if minutes == 0 {
        info!("🪛️ CPG_RECONCILE_INTERVAL_MINUTES is 0. The periodic sweep is disabled.");
        return None;
    }
    info!("🪛️ Outstanding orders will be reconciled every {minutes} minutes.");
    Some(Duration::from_secs(minutes * 60))
}

//-------------------------------------------------  MailConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct MailConfig {
    /// The HTTP endpoint that relays confirmation mail. If `None`, confirmations are only logged.
    pub relay_url: Option<String>,
    pub from: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self { relay_url: None, from: DEFAULT_MAIL_FROM.to_string() }
    }
}

impl MailConfig {
    pub fn from_env_or_default() -> Self {
        let relay_url = env::var("CPG_MAIL_RELAY_URL").ok().filter(|s| !s.trim().is_empty());
        if relay_url.is_none() {
            warn!("🪛️ CPG_MAIL_RELAY_URL is not set. Payment confirmations will be logged, but not sent.");
        }
        let from = env::var("CPG_MAIL_FROM").unwrap_or_else(|_| DEFAULT_MAIL_FROM.to_string());
        Self { relay_url, from }
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// This is the secret key used to sign JWTs. It must be in hex format and be a valid Ristretto secret key.
    pub jwt_signing_key: Ristretto256SigningKey,
    /// This is the public key used to verify JWTs. It must be in hex format and be the public key corresponding to
    /// the `jwt_signing_key`.
    pub jwt_verification_key: Ristretto256VerifyingKey,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let mut tmpfile = NamedTempFile::new().ok().and_then(|f| f.keep().ok());
        warn!(
            "🚨️🚨️🚨️ The JWT signing key has not been set. I'm using a random value for this session. DO NOT operate \
             on production like this since every issued access token becomes invalid on restart. 🚨️🚨️🚨️"
        );
        let mut rng = thread_rng();
        let (sk, pk) = RistrettoPublicKey::random_keypair(&mut rng);
        match &mut tmpfile {
            Some((f, p)) => {
                let key_data = json!({
                    "jwt_signing_key": sk.to_hex(),
                    "jwt_verification_key": pk.to_hex(),
                })
                .to_string();
                match writeln!(f, "{key_data}") {
                    Ok(()) => warn!(
                        "🚨️🚨️🚨️ The JWT signing key for this session was written to {}. If this is a production \
                         instance, you are doing it wrong! Set the CPG_JWT_SIGNING_KEY and CPG_JWT_VERIFICATION_KEY \
                         environment variables instead. 🚨️🚨️🚨️",
                        p.to_str().unwrap_or("???")
                    ),
                    Err(e) => warn!("🪛️ Could not write the JWT signing key to the temporary file. {e}"),
                }
            },
            None => {
                warn!("🪛️ Could not create a temporary file to store the JWT signing key. ");
            },
        }
        Self { jwt_signing_key: Ristretto256SigningKey(sk), jwt_verification_key: Ristretto256VerifyingKey(pk) }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let jwt_sk_hex = env::var("CPG_JWT_SIGNING_KEY")
            .map_err(|e| ServerError::ConfigurationError(format!("{e} [CPG_JWT_SIGNING_KEY]")))?;
        let jwt_pk_hex = env::var("CPG_JWT_VERIFICATION_KEY")
            .map_err(|e| ServerError::ConfigurationError(format!("{e} [CPG_JWT_VERIFICATION_KEY]")))?;
        Self::from_hex(&jwt_sk_hex, &jwt_pk_hex)
    }

    /// Builds the configuration from a hex-encoded key pair. The public key must match the secret key.
    pub fn from_hex(signing_key: &str, verification_key: &str) -> Result<Self, ServerError> {
        let sk = RistrettoSecretKey::from_hex(signing_key.trim())
            .map_err(|e| ServerError::ConfigurationError(format!("Invalid signing key in CPG_JWT_SIGNING_KEY: {e}")))?;
        let expected = RistrettoPublicKey::from_secret_key(&sk);
        let vk = RistrettoPublicKey::from_hex(verification_key.trim()).map_err(|e| {
            ServerError::ConfigurationError(format!("Invalid verification key in CPG_JWT_VERIFICATION_KEY: {e}"))
        })?;
        if vk == expected {
            Ok(Self { jwt_signing_key: Ristretto256SigningKey(sk), jwt_verification_key: Ristretto256VerifyingKey(vk) })
        } else {
            Err(ServerError::ConfigurationError(
                "The verification key does not match the signing key. Check your configuration.".to_string(),
            ))
        }
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// The part of the configuration that request handlers need. Secrets stay out of it.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}
