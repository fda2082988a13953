//! Merchant authentication by per-shop admin key.
//!
//! Usage: Add `AdminShop` as an extractor parameter to require a valid key.
//! Only the SHA-256 of each key is stored; the shop is whichever row holds
//! the matching hash.
//!
//! ```ignore
//! async fn my_handler(admin: AdminShop, ...) -> ... {
//!     // admin.shop is available here
//! }
//! ```

use axum::{
    Json, RequestPartsExt,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use sha2::{Digest, Sha256};

use crate::state::AppState;

/// Shop whose admin key authenticated the request.
#[derive(Debug, Clone)]
pub struct AdminShop {
    pub shop: String,
}

pub fn hash_admin_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

impl FromRequestParts<AppState> for AdminShop {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AuthError::MissingToken)?;

        let settings = state
            .repos
            .shops
            .find_by_admin_key_hash(&hash_admin_key(bearer.token()))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "admin key lookup failed");
                AuthError::InvalidToken
            })?
            .ok_or(AuthError::InvalidToken)?;

        Ok(AdminShop {
            shop: settings.shop,
        })
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing authorization token"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid admin key"),
        };

        let body = serde_json::json!({ "error": message });

        (status, Json(body)).into_response()
    }
}
