//! External service abstractions.
//!
//! This module contains traits and implementations for outbound
//! collaborators. Each service is abstracted behind a trait to enable
//! mocking in tests.
//!
//! ## Services
//!
//! - **email** - Customer email via Resend (prod) or SMTP (dev)
//! - **discount** - Reward code issuance
//!
//! ## Usage
//!
//! ```ignore
//! let issuer = RecordedDiscountIssuer::new(repos.discounts.clone());
//! let code = issuer.issue(&shop, 10, "Ann").await?;
//! state.email.send(&email, &EmailMessage::DiscountReward { .. }).await?;
//! ```

mod discount;
mod email;

pub use discount::{DiscountIssuer, RecordedDiscountIssuer};
pub use email::{EmailMessage, EmailSender, EmailSenderImpl, ProductLinks, shop_display_name};

#[cfg(test)]
pub use discount::MockDiscountIssuer;
#[cfg(test)]
pub use email::MockEmailSender;
