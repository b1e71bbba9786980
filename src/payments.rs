use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

/// Payment-processor seam: the one call this service makes outbound.
/// Webhook verification lives in `billing::webhook` since it never leaves
/// the process.
#[async_trait]
pub trait PaymentClient: Send + Sync {
    /// Start a subscription checkout and return the hosted checkout URL.
    async fn create_checkout_session(&self, email: &str, user_id: Uuid)
        -> anyhow::Result<String>;
}

#[derive(Clone)]
pub struct StripePayments {
    http: reqwest::Client,
    api_base_url: String,
    secret_key: String,
    price_id: String,
    app_domain: String,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionReply {
    id: String,
    url: Option<String>,
}

impl StripePayments {
    pub fn new(secret_key: &str, price_id: &str, app_domain: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base_url: "https://api.stripe.com".to_string(),
            secret_key: secret_key.to_string(),
            price_id: price_id.to_string(),
            app_domain: app_domain.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PaymentClient for StripePayments {
    async fn create_checkout_session(
        &self,
        email: &str,
        user_id: Uuid,
    ) -> anyhow::Result<String> {
        let url = format!("{}/v1/checkout/sessions", self.api_base_url);
        let user_id = user_id.to_string();
        let success_url = format!("{}/dashboard?success=true", self.app_domain);
        let cancel_url = format!("{}/dashboard?canceled=true", self.app_domain);

        let params = [
            ("mode", "subscription"),
            ("payment_method_types[0]", "card"),
            ("customer_email", email),
            ("line_items[0][price]", self.price_id.as_str()),
            ("line_items[0][quantity]", "1"),
            ("success_url", success_url.as_str()),
            ("cancel_url", cancel_url.as_str()),
            ("metadata[user_id]", user_id.as_str()),
        ];

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.secret_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await
            .context("stripe checkout session request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("stripe API error ({status}): {body}");
        }

        let session: CheckoutSessionReply = response
            .json()
            .await
            .context("parse stripe checkout session reply")?;

        session
            .url
            .ok_or_else(|| anyhow::anyhow!("checkout session {} has no url", session.id))
    }
}
