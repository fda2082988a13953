//! Request extractors that authenticate the caller's shop.
//!
//! - [`AdminShop`] - merchant endpoints, by per-shop admin key
//! - [`ProxyShop`] - storefront proxy endpoints, by request signature

mod app_proxy;
mod auth;

pub use app_proxy::ProxyShop;
pub use auth::{AdminShop, hash_admin_key};

#[cfg(test)]
pub use app_proxy::signing_message;
