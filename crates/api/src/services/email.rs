//! Email sending abstraction.
//!
//! Uses Resend in production, SMTP (lettre) in development.
//! This allows local development without a Resend account.

use anyhow::Result;
use async_trait::async_trait;
use lettre::{
    Message, SmtpTransport, Transport,
    message::{Mailbox, header::ContentType},
};
use resend_rs::types::CreateEmailBaseOptions;

/// Store name shown to customers, derived from the shop domain.
pub fn shop_display_name(shop: &str) -> &str {
    shop.strip_suffix(".myshopify.com").unwrap_or(shop)
}

/// Review links for one product in a review request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductLinks {
    pub product_title: String,
    pub review_url: String,
    pub five_star_url: String,
    pub four_star_url: String,
    pub three_star_url: String,
}

/// Transactional messages sent to customers.
#[derive(Debug, Clone, PartialEq)]
pub enum EmailMessage {
    ReviewRequest {
        customer_name: String,
        order_name: Option<String>,
        shop_name: String,
        products: Vec<ProductLinks>,
    },
    DiscountReward {
        customer_name: String,
        shop_name: String,
        code: String,
        percentage: i32,
    },
}

impl EmailMessage {
    pub fn subject(&self) -> String {
        match self {
            EmailMessage::ReviewRequest { order_name, .. } => match order_name {
                Some(order) => format!("How was your order {}? Leave a review!", order),
                None => "How was your order? Leave a review!".to_string(),
            },
            EmailMessage::DiscountReward { percentage, .. } => {
                format!("Thanks for your review! Here's {}% off your next order", percentage)
            }
        }
    }

    pub fn text_body(&self) -> String {
        match self {
            EmailMessage::ReviewRequest {
                customer_name,
                shop_name,
                products,
                ..
            } => {
                let mut body = format!(
                    "Hi {},\n\nThanks for shopping at {}! We'd love to hear what you think.\n",
                    customer_name, shop_name
                );
                for product in products {
                    body.push_str(&format!(
                        "\n{}\n  5 stars: {}\n  4 stars: {}\n  3 stars: {}\n  Write a review: {}\n",
                        product.product_title,
                        product.five_star_url,
                        product.four_star_url,
                        product.three_star_url,
                        product.review_url
                    ));
                }
                body.push_str("\nEach link can be used once and expires in 30 days.\n");
                body
            }
            EmailMessage::DiscountReward {
                customer_name,
                shop_name,
                code,
                percentage,
            } => format!(
                "Hi {},\n\nThank you for reviewing {}! Here is {}% off your next order.\n\n\
                 Your code: {}\n\nThe code can be used once and expires in 30 days.\n",
                customer_name, shop_name, percentage, code
            ),
        }
    }
}

/// Outbound notifier. Callers log failures; none are fatal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, message: &EmailMessage) -> Result<()>;
}

/// Email sender selected from config.
pub enum EmailSenderImpl {
    /// Resend API sender (for production)
    Resend(ResendSender),
    /// SMTP-based sender using lettre (for development)
    Smtp(SmtpSender),
    /// No transport configured; every send fails and is logged.
    Disabled,
}

impl EmailSenderImpl {
    /// Uses Resend if an api key is provided, otherwise SMTP, otherwise disabled.
    pub fn new(
        resend_api_key: Option<String>,
        smtp_url: Option<String>,
        from: String,
    ) -> Result<Self> {
        if let Some(api_key) = resend_api_key.filter(|k| !k.is_empty()) {
            Ok(Self::Resend(ResendSender::new(api_key, from)))
        } else if let Some(url) = smtp_url.filter(|u| !u.is_empty()) {
            Ok(Self::Smtp(SmtpSender::new(&url, &from)?))
        } else {
            tracing::warn!("no email transport configured, customer emails are disabled");
            Ok(Self::Disabled)
        }
    }
}

#[async_trait]
impl EmailSender for EmailSenderImpl {
    async fn send(&self, to: &str, message: &EmailMessage) -> Result<()> {
        match self {
            Self::Resend(sender) => sender.send(to, message).await,
            Self::Smtp(sender) => sender.send(to, message).await,
            Self::Disabled => {
                tracing::warn!(subject = %message.subject(), "email disabled, not sending");
                anyhow::bail!("email transport not configured")
            }
        }
    }
}

/// SMTP sender using lettre.
pub struct SmtpSender {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpSender {
    pub fn new(smtp_url: &str, from: &str) -> Result<Self> {
        let transport = SmtpTransport::from_url(smtp_url)?.build();

        Ok(Self {
            transport,
            from: from.parse()?,
        })
    }

    pub async fn send(&self, to: &str, message: &EmailMessage) -> Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(None, to.parse()?))
            .subject(message.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(message.text_body())?;

        // lettre's SMTP transport is blocking.
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&email)).await??;

        Ok(())
    }
}

/// Resend API sender.
pub struct ResendSender {
    client: resend_rs::Resend,
    from: String,
}

impl ResendSender {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            client: resend_rs::Resend::new(&api_key),
            from,
        }
    }

    pub async fn send(&self, to: &str, message: &EmailMessage) -> Result<()> {
        let email = CreateEmailBaseOptions::new(&self.from, [to], message.subject())
            .with_text(&message.text_body());

        self.client.emails.send(email).await?;

        Ok(())
    }
}
