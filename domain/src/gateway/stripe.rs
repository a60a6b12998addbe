use super::{CheckoutSession, PaymentGateway};
use crate::error::{DomainErrorKind, Error, ExternalErrorKind, InternalErrorKind};
use crate::{events, reservations, Id};
use async_trait::async_trait;
use log::*;
use serde::Deserialize;
use service::config::Config;

/// Stripe Checkout Sessions API client.
pub struct StripeClient {
    client: reqwest::Client,
    base_url: String,
    currency: String,
    config: Config,
}

/// The subset of a checkout session response we rely on. `url` is absent
/// for sessions that cannot be paid through a redirect.
#[derive(Debug, Deserialize)]
struct CheckoutSessionResponse {
    id: String,
    url: Option<String>,
}

impl StripeClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let client = build_client(config)?;

        Ok(Self {
            client,
            base_url: config.payment_api_base_url().trim_end_matches('/').to_string(),
            currency: config.payment_currency().to_lowercase(),
            config: config.clone(),
        })
    }

    fn checkout_form(&self, event: &events::Model, user_id: Id) -> Vec<(String, String)> {
        let event_id = event.id.to_string();
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            (
                "client_reference_id".to_string(),
                reservations::key(event.id, user_id),
            ),
            (
                "line_items[0][price_data][currency]".to_string(),
                self.currency.clone(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                event.title.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                unit_amount(event.price).to_string(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            (
                "success_url".to_string(),
                self.config.payment_success_url(&event_id),
            ),
            (
                "cancel_url".to_string(),
                self.config.payment_cancel_url(&event_id),
            ),
            ("metadata[eventId]".to_string(), event_id),
            ("metadata[userId]".to_string(), user_id.to_string()),
        ];

        if let Some(image_url) = &event.image_url {
            form.push((
                "line_items[0][price_data][product_data][images][0]".to_string(),
                image_url.clone(),
            ));
        }

        form
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        event: &events::Model,
        user_id: Id,
    ) -> Result<CheckoutSession, Error> {
        let url = format!("{}/checkout/sessions", self.base_url);
        info!("Creating checkout session for event {} and user {user_id}", event.id);

        let response = self
            .client
            .post(&url)
            .form(&self.checkout_form(event, user_id))
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to send checkout session request: {e:?}");
                Error::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("Checkout session request failed: {status} - {error_text}");
            return Err(Error {
                source: None,
                error_kind: DomainErrorKind::External(ExternalErrorKind::Other(format!(
                    "Payment provider responded with {status}"
                ))),
            });
        }

        let session: CheckoutSessionResponse = response.json().await.map_err(|e| {
            warn!("Failed to decode checkout session response: {e:?}");
            Error {
                source: Some(Box::new(e)),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Other(
                    "Malformed checkout session response".to_string(),
                )),
            }
        })?;

        match session.url {
            Some(url) if !url.is_empty() => {
                debug!("Checkout session {} created", session.id);
                Ok(CheckoutSession {
                    id: session.id,
                    url,
                })
            }
            _ => {
                warn!("Checkout session {} has no redirect URL", session.id);
                Err(Error {
                    source: None,
                    error_kind: DomainErrorKind::External(ExternalErrorKind::Other(
                        "Checkout session without redirect URL".to_string(),
                    )),
                })
            }
        }
    }
}

/// Price in the smallest currency unit, rounded to the nearest one.
fn unit_amount(price: f64) -> i64 {
    (price * 100.0).round() as i64
}

fn build_client(config: &Config) -> Result<reqwest::Client, Error> {
    let headers = build_auth_headers(config)?;

    Ok(reqwest::Client::builder()
        .use_rustls_tls()
        .default_headers(headers)
        .timeout(std::time::Duration::from_secs(20))
        .build()?)
}

fn build_auth_headers(config: &Config) -> Result<reqwest::header::HeaderMap, Error> {
    let api_key = config.payment_api_key().ok_or_else(|| {
        warn!("Failed to get payment API key from config");
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
        }
    })?;

    let mut headers = reqwest::header::HeaderMap::new();
    let mut auth_header = reqwest::header::HeaderValue::from_str(&format!("Bearer {api_key}"))
        .map_err(|err| {
            warn!("Failed to create authorization header value: {err:?}");
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                    "Failed to create authorization header value".to_string(),
                )),
            }
        })?;
    auth_header.set_sensitive(true);
    headers.insert(reqwest::header::AUTHORIZATION, auth_header);

    Ok(headers)
}
