//! HMAC request signing for the authenticated exchange endpoints.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384};

use crate::utils::config::Credentials;

type HmacSha256 = Hmac<Sha256>;
type HmacSha384 = Hmac<Sha384>;

pub struct RequestSigner<'a> {
    credentials: &'a Credentials,
}

impl<'a> RequestSigner<'a> {
    pub fn new(credentials: &'a Credentials) -> Self {
        Self { credentials }
    }

    /// Lowercase hex HMAC-SHA256 of `message`.
    pub fn sign_sha256(&self, message: &str) -> String {
        // HMAC accepts keys of any length, new_from_slice cannot fail here
        let mut mac = match HmacSha256::new_from_slice(self.credentials.expose_secret().as_bytes()) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC can take key of any size"),
        };
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Lowercase hex HMAC-SHA384 of `message`.
    pub fn sign_sha384(&self, message: &str) -> String {
        let mut mac = match HmacSha384::new_from_slice(self.credentials.expose_secret().as_bytes()) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC can take key of any size"),
        };
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Bitfinex v2: `/api/<path><nonce><body>` signed with SHA-384.
    pub fn bitfinex_signature(&self, api_path: &str, nonce: &str, body: &str) -> String {
        self.sign_sha384(&format!("/api/{}{}{}", api_path.trim_start_matches('/'), nonce, body))
    }

    /// CoinEx v2: `<METHOD><path><body><timestamp>` signed with SHA-256.
    pub fn coinex_signature(&self, method: &str, path: &str, body: &str, timestamp: &str) -> String {
        self.sign_sha256(&format!("{}{}{}{}", method, path, body, timestamp))
    }
}
