//! Storefront proxy authentication.
//!
//! Storefront requests reach us through the platform's app proxy, which
//! appends `shop`, `timestamp` and a `signature` to the query string. The
//! signature is hex HMAC-SHA256, keyed with the app secret, over every other
//! param sorted by key and written as `key=value` with no separator. Repeated
//! keys join their values with `,`.

use std::collections::BTreeMap;

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AppError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Max clock skew accepted on the proxy `timestamp` param.
const MAX_SKEW_SECS: i64 = 300;

/// Shop a storefront proxy request was signed for.
#[derive(Debug, Clone)]
pub struct ProxyShop {
    pub shop: String,
}

/// Sorted `key=value` concatenation that the signature covers.
pub fn signing_message(query: &str) -> String {
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if key != "signature" {
            params
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }
    }

    params
        .into_iter()
        .map(|(key, values)| format!("{}={}", key, values.join(",")))
        .collect()
}

fn query_param(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// The signed shop, if the query carries a valid signature.
pub fn verify_query(query: &str, secret: &str, now: DateTime<Utc>) -> Option<String> {
    let signature = hex::decode(query_param(query, "signature")?).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(signing_message(query).as_bytes());
    mac.verify_slice(&signature).ok()?;

    if let Some(timestamp) = query_param(query, "timestamp") {
        let timestamp: i64 = timestamp.parse().ok()?;
        if (now.timestamp() - timestamp).abs() > MAX_SKEW_SECS {
            return None;
        }
    }

    query_param(query, "shop").filter(|shop| !shop.is_empty())
}

impl FromRequestParts<AppState> for ProxyShop {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let query = parts.uri.query().unwrap_or_default();

        if let Some(shop) = verify_query(query, &state.config.app_api_secret, Utc::now()) {
            return Ok(ProxyShop { shop });
        }

        if state.config.dev_bypass_app_proxy && query_param(query, "signature").is_none() {
            if let Some(shop) = query_param(query, "shop").filter(|s| !s.is_empty()) {
                tracing::warn!(shop = %shop, "accepting unsigned proxy request (dev bypass)");
                return Ok(ProxyShop { shop });
            }
        }

        tracing::warn!(path = %parts.uri.path(), "rejected proxy request with bad signature");
        Err(AppError::External(
            StatusCode::UNAUTHORIZED,
            "Invalid proxy signature",
        ))
    }
}
