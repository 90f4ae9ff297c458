use crate::error::{BotError, Result};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

pub const API_KEY_ENV: &str = "BINANCE_API_KEY";
pub const API_SECRET_ENV: &str = "BINANCE_API_SECRET";

/// API key pair for signed endpoints. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ApiCredentials {
    api_key: String,
    api_secret: String,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

impl ApiCredentials {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
        }
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| BotError::Auth(format!("{API_KEY_ENV} must be set")))?;
        let api_secret = std::env::var(API_SECRET_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| BotError::Auth(format!("{API_SECRET_ENV} must be set")))?;

        Ok(Self::new(api_key, api_secret))
    }
}

/// Signs Binance query strings with HMAC-SHA256
#[derive(Clone)]
pub struct HmacAuth {
    credentials: ApiCredentials,
    recv_window_ms: u64,
}

impl HmacAuth {
    pub fn new(credentials: ApiCredentials, recv_window_ms: u64) -> Self {
        Self {
            credentials,
            recv_window_ms,
        }
    }

    /// Current timestamp in milliseconds
    fn timestamp_ms() -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default()
    }

    /// Hex encoded HMAC-SHA256 of `payload`
    pub fn sign(&self, payload: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.api_secret.as_bytes())
            .map_err(|e| BotError::Auth(format!("HMAC init failed: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Append `recvWindow`, `timestamp` and `signature` to an encoded query
    pub fn signed_query(&self, query: &str) -> Result<String> {
        self.signed_query_at(query, Self::timestamp_ms())
    }

    fn signed_query_at(&self, query: &str, timestamp_ms: u128) -> Result<String> {
        let mut payload = String::with_capacity(query.len() + 48);
        if !query.is_empty() {
            payload.push_str(query);
            payload.push('&');
        }
        payload.push_str(&format!(
            "recvWindow={}&timestamp={}",
            self.recv_window_ms, timestamp_ms
        ));

        let signature = self.sign(&payload)?;
        tracing::trace!(query = %payload, "signed request");

        Ok(format!("{payload}&signature={signature}"))
    }

    /// Headers carried by every authenticated request
    pub fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-MBX-APIKEY",
            HeaderValue::from_str(&self.credentials.api_key)
                .map_err(|e| BotError::Auth(format!("Invalid API key header: {}", e)))?,
        );
        Ok(headers)
    }
}
