//! JWT access tokens.
//!
//! Access tokens are signed with the server's Ristretto key and carry the attendee's user id and roles. The server
//! never logs anyone in itself: tokens are minted by whoever holds the signing key (see `cpgtools token`), typically
//! the registration system that owns the attendee list.
use std::time::Duration;

use actix_jwt_auth_middleware::{Authority, FromRequest, TokenSigner};
use actix_web::{error::Error as ActixWebError, Handler};
use conference_payment_engine::db_types::Roles;
use serde::{Deserialize, Serialize};
use tari_jwt::{jwt_compact::Header, Ristretto256, Ristretto256SigningKey};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

/// The request header that carries the access token.
pub const ACCESS_TOKEN_HEADER: &str = "tpg_access_token";
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60 * 24);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRequest)]
pub struct JwtClaims {
    pub user_id: String,
    pub roles: Roles,
}

fn build_jwt_signer(jwt_signing_key: Ristretto256SigningKey) -> Result<TokenSigner<JwtClaims, Ristretto256>, ServerError> {
    let header = Header::empty().with_token_type("JWT");
    TokenSigner::new()
        .signing_key(jwt_signing_key)
        .algorithm(Ristretto256)
        .header(header)
        .build()
        .map_err(|e| ServerError::InitializeError(format!("Failed to build token signer. {e}")))
}

pub fn build_cpg_authority(
    auth_config: AuthConfig,
) -> Result<Authority<JwtClaims, Ristretto256, impl Handler<(), Output = Result<(), ActixWebError>>, ()>, ServerError>
{
    let AuthConfig { jwt_signing_key, jwt_verification_key } = auth_config;
    let token_signer = build_jwt_signer(jwt_signing_key)?;
    Authority::<JwtClaims, Ristretto256, _, _>::new()
        .refresh_authorizer(|| async { Ok::<(), ActixWebError>(()) })
        .enable_header_tokens(true)
        .algorithm(Ristretto256)
        .verifying_key(jwt_verification_key)
        .token_signer(Some(token_signer))
        .build()
        .map_err(|e| ServerError::InitializeError(format!("Failed to build JWT authority. {e}")))
}

pub struct TokenIssuer {
    signer: TokenSigner<JwtClaims, Ristretto256>,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Result<Self, ServerError> {
        let signer = build_jwt_signer(config.jwt_signing_key.clone())?;
        Ok(Self { signer })
    }

    /// Issue a new access token for the given claims. Tokens are valid for a day unless `duration` says otherwise.
    ///
    /// No check is made that the user exists or is entitled to the roles. That is the caller's job.
    pub fn issue_token(&self, claims: JwtClaims, duration: Option<Duration>) -> Result<String, AuthError> {
        let duration = duration.unwrap_or(DEFAULT_TOKEN_LIFETIME);
        self.signer
            .create_signed_token(&claims, duration)
            .map_err(|e| AuthError::ValidationError(format!("{e:?}")))
    }
}
