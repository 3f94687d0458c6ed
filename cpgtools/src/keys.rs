use rand::thread_rng;
use tari_jwt::tari_crypto::{
    keys::PublicKey,
    ristretto::{RistrettoPublicKey, RistrettoSecretKey},
    tari_utilities::hex::Hex,
};

/// A JWT signing key pair for the payment server.
pub struct KeyInfo {
    pub sk: RistrettoSecretKey,
    pub pk: RistrettoPublicKey,
}

impl KeyInfo {
    pub fn random() -> Self {
        let (sk, pk) = RistrettoPublicKey::random_keypair(&mut thread_rng());
        Self { sk, pk }
    }

    pub fn from_secret_key(secret_key: RistrettoSecretKey) -> Self {
        let pk = RistrettoPublicKey::from_secret_key(&secret_key);
        Self { sk: secret_key, pk }
    }

    pub fn from_hex(secret_key: &str) -> anyhow::Result<Self> {
        let sk = RistrettoSecretKey::from_hex(secret_key.trim())
            .map_err(|e| anyhow::anyhow!("Invalid secret key. {e}"))?;
        Ok(Self::from_secret_key(sk))
    }

    pub fn signing_key_hex(&self) -> String {
        self.sk.to_hex()
    }

    pub fn verification_key_hex(&self) -> String {
        self.pk.to_hex()
    }
}

pub fn print_new_keys() {
    let info = KeyInfo::random();
    println!("------------------------------ JWT Keys --------------------------------");
    println!("CPG_JWT_SIGNING_KEY={}", info.signing_key_hex());
    println!("CPG_JWT_VERIFICATION_KEY={}", info.verification_key_hex());
    println!("------------------------------------------------------------------------");
}
