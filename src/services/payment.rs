//! Payment-intent creation against a Stripe-compatible REST API.

use crate::errors::{IntakeError, IntakeResult, response_text};
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::info;

pub const DEFAULT_STRIPE_BASE_URL: &str = "https://api.stripe.com";

#[derive(Clone, Debug)]
pub struct PaymentIntentRequest {
    pub amount_cents: u64,
    pub currency: String,
    pub description: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    #[serde(default)]
    pub amount: u64,
    #[serde(default)]
    pub currency: String,
}

pub struct PaymentClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl PaymentClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    pub async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> IntakeResult<PaymentIntent> {
        if request.amount_cents == 0 {
            return Err(IntakeError::Validation("amount must be positive".into()));
        }

        let resp = self
            .http
            .post(format!("{}/v1/payment_intents", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .form(&form_fields(request))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = response_text(resp).await;
            return Err(IntakeError::Payment {
                status: status.as_u16(),
                body,
            });
        }

        let intent: PaymentIntent = resp.json().await?;
        info!(
            id = %intent.id,
            amount = intent.amount,
            currency = %intent.currency,
            "payment intent created"
        );
        Ok(intent)
    }
}

fn form_fields(request: &PaymentIntentRequest) -> Vec<(String, String)> {
    let mut fields = vec![
        ("amount".to_string(), request.amount_cents.to_string()),
        ("currency".to_string(), request.currency.to_ascii_lowercase()),
        (
            "automatic_payment_methods[enabled]".to_string(),
            "true".to_string(),
        ),
    ];
    if let Some(description) = &request.description {
        fields.push(("description".to_string(), description.clone()));
    }
    for (key, value) in &request.metadata {
        fields.push((format!("metadata[{key}]"), value.clone()));
    }
    fields
}
