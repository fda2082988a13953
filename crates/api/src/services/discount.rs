//! Reward discount code issuance.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rand::RngCore;

use crate::repos::DiscountRepo;

const CODE_PREFIX: &str = "THANKYOU-";

/// Issues single-use reward codes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiscountIssuer: Send + Sync {
    /// Issue a new code for `percentage` off and return it.
    async fn issue(&self, shop: &str, percentage: i32, customer_name: &str) -> Result<String>;
}

/// `THANKYOU-` followed by 4 random bytes as upper-case hex.
pub fn generate_code() -> String {
    let mut bytes = [0u8; 4];
    rand::rng().fill_bytes(&mut bytes);
    format!("{}{}", CODE_PREFIX, hex::encode_upper(bytes))
}

/// Issuer that records codes in the durable store. Creating the matching
/// price rule in the commerce platform happens outside this service.
pub struct RecordedDiscountIssuer {
    repo: Arc<dyn DiscountRepo>,
}

impl RecordedDiscountIssuer {
    pub fn new(repo: Arc<dyn DiscountRepo>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl DiscountIssuer for RecordedDiscountIssuer {
    async fn issue(&self, shop: &str, percentage: i32, customer_name: &str) -> Result<String> {
        let code = generate_code();

        if !self.repo.record(shop, &code, percentage).await? {
            anyhow::bail!("discount code collision for {}", shop);
        }

        tracing::info!(shop, customer_name, code = %code, percentage, "issued review reward code");
        Ok(code)
    }
}
