use std::time::Duration;

use anyhow::{anyhow, Result};
use conference_payment_engine::db_types::Role;
use conference_payment_server::{
    auth::{JwtClaims, TokenIssuer},
    config::AuthConfig,
};

use crate::keys::KeyInfo;

/// Signs an access token for `user_id`. The server only accepts it if `secret` is the server's
/// `CPG_JWT_SIGNING_KEY`.
pub fn create_access_token(secret: &str, user_id: &str, roles: Vec<Role>, hours: Option<u64>) -> Result<String> {
    let keys = KeyInfo::from_hex(secret)?;
    let config = AuthConfig::from_hex(&keys.signing_key_hex(), &keys.verification_key_hex())?;
    let issuer = TokenIssuer::new(&config)?;
    let mut roles = roles;
    if roles.is_empty() {
        roles.push(Role::User);
    }
    let claims = JwtClaims { user_id: user_id.to_string(), roles };
    let duration = hours.map(|h| Duration::from_secs(h * 3600));
    issuer.issue_token(claims, duration).map_err(|e| anyhow!("Could not sign the token. {e}"))
}

pub fn print_jwt_token(secret: String, user_id: String, roles: Vec<Role>, hours: Option<u64>) {
    let roles_str = roles.iter().map(|r| r.to_string()).collect::<Vec<String>>().join(",");
    match create_access_token(&secret, &user_id, roles, hours) {
        Ok(token) => {
            println!("----------------------------- Access Token -----------------------------");
            println!("user: {user_id}");
            println!("roles: {roles_str}");
            println!("valid for: {} hours", hours.unwrap_or(24));
            println!("token:\n{token}");
            println!("------------------------------------------------------------------------");
        },
        Err(e) => eprintln!("{e}"),
    }
}

#[cfg(test)]
mod test {
    use tari_jwt::{
        jwt_compact::{AlgorithmExt, UntrustedToken},
        Ristretto256,
        Ristretto256VerifyingKey,
    };

    use super::*;

    #[test]
    fn token_carries_the_requested_claims() {
        let keys = KeyInfo::random();
        let token = create_access_token(&keys.signing_key_hex(), "att-0042", vec![Role::Admin], Some(2)).unwrap();
        let untrusted = UntrustedToken::new(&token).unwrap();
        let verified = Ristretto256
            .validator::<JwtClaims>(&Ristretto256VerifyingKey(keys.pk.clone()))
            .validate(&untrusted)
            .unwrap();
        assert_eq!(verified.claims().custom.user_id, "att-0042");
        assert_eq!(verified.claims().custom.roles, vec![Role::Admin]);
    }

    #[test]
    fn roles_default_to_user() {
        let keys = KeyInfo::random();
        let token = create_access_token(&keys.signing_key_hex(), "att-0042", vec![], None).unwrap();
        let untrusted = UntrustedToken::new(&token).unwrap();
        let verified = Ristretto256
            .validator::<JwtClaims>(&Ristretto256VerifyingKey(keys.pk))
            .validate(&untrusted)
            .unwrap();
        assert_eq!(verified.claims().custom.roles, vec![Role::User]);
    }

    #[test]
    fn bad_secret() {
        assert!(create_access_token("zz", "att-0042", vec![], None).is_err());
    }
}
