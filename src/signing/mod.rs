pub mod hmac;

pub use hmac::{ApiCredentials, HmacAuth, API_KEY_ENV, API_SECRET_ENV};
