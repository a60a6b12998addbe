//! Signed payment webhooks.
//!
//! The provider signs `"{timestamp}.{body}"` with HMAC-SHA256 and sends
//! `t=<unix seconds>,v1=<hex digest>` in the `Stripe-Signature` header.
//! Several `v1` entries may appear while a secret is being rotated.

use crate::error::{DomainErrorKind, EntityErrorKind, Error, InternalErrorKind};
use crate::reservation::PaymentConfirmation;
use crate::Id;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use log::*;
use serde::Deserialize;
use service::config::Config;
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

pub struct WebhookVerifier {
    secret: Option<String>,
    tolerance_secs: u64,
}

impl WebhookVerifier {
    pub fn new(secret: Option<String>, tolerance_secs: u64) -> Self {
        Self {
            secret,
            tolerance_secs,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.payment_webhook_secret(),
            config.payment_webhook_tolerance_secs,
        )
    }

    /// Checks `signature_header` against `body`. Without a configured secret
    /// nothing verifies.
    pub fn verify(
        &self,
        signature_header: Option<&str>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let secret = self.secret.as_deref().ok_or_else(|| {
            error!("Payment webhook received but no webhook secret is configured");
            Error {
                source: None,
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
            }
        })?;

        let header = signature_header.ok_or_else(|| rejected("Missing signature header"))?;
        let (timestamp, signatures) = parse_signature_header(header)?;

        // abs_diff cannot overflow on extreme header values
        if now.timestamp().abs_diff(timestamp) > self.tolerance_secs {
            warn!("Rejecting payment webhook with stale timestamp {timestamp}");
            return Err(rejected("Signature timestamp outside tolerance"));
        }

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| rejected("Invalid HMAC key"))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);

        let verified = signatures
            .iter()
            .any(|signature| mac.clone().verify_slice(signature).is_ok());

        if verified {
            Ok(())
        } else {
            warn!("Rejecting payment webhook with invalid signature");
            Err(rejected("Invalid signature"))
        }
    }
}

fn rejected(reason: &str) -> Error {
    let reason: String = reason.to_string();
    Error {
        source: Some(reason.into()),
        error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(
            EntityErrorKind::Unauthenticated,
        )),
    }
}

fn parse_signature_header(header: &str) -> Result<(i64, Vec<Vec<u8>>), Error> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| rejected("Invalid signature timestamp"))?,
                );
            }
            Some(("v1", value)) => {
                // Entries that are not hex cannot match; skip them.
                if let Ok(signature) = hex::decode(value) {
                    signatures.push(signature);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| rejected("Missing signature timestamp"))?;
    if signatures.is_empty() {
        return Err(rejected("Missing v1 signature"));
    }

    Ok((timestamp, signatures))
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: CheckoutSessionObject,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    pub payment_status: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// What a verified webhook asks of us.
#[derive(Debug, PartialEq)]
pub enum WebhookAction {
    /// Payment settled; record the reservation.
    Confirm(PaymentConfirmation),
    /// The payer walked away. Nothing was reserved, so nothing to undo.
    Abandoned { session_id: String },
    /// Not an event type we act on.
    Ignored { event_type: String },
}

impl WebhookEvent {
    pub fn parse(body: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(body).map_err(|e| {
            warn!("Failed to decode payment webhook payload: {e}");
            Error::invalid("Malformed webhook payload")
        })
    }

    pub fn action(&self) -> Result<WebhookAction, Error> {
        let session = &self.data.object;

        match self.event_type.as_str() {
            "checkout.session.completed"
                if session.payment_status.as_deref() == Some("paid") =>
            {
                Ok(WebhookAction::Confirm(session.confirmation()?))
            }
            "checkout.session.async_payment_succeeded" => {
                Ok(WebhookAction::Confirm(session.confirmation()?))
            }
            "checkout.session.expired" | "checkout.session.async_payment_failed" => {
                Ok(WebhookAction::Abandoned {
                    session_id: session.id.clone(),
                })
            }
            other => Ok(WebhookAction::Ignored {
                event_type: other.to_string(),
            }),
        }
    }
}

impl CheckoutSessionObject {
    fn confirmation(&self) -> Result<PaymentConfirmation, Error> {
        Ok(PaymentConfirmation {
            event_id: self.metadata_id("eventId")?,
            user_id: self.metadata_id("userId")?,
        })
    }

    fn metadata_id(&self, key: &str) -> Result<Id, Error> {
        self.metadata
            .get(key)
            .and_then(|value| Id::parse_str(value).ok())
            .ok_or_else(|| {
                error!("Checkout session {} has no usable {key} metadata", self.id);
                Error::invalid(format!("Checkout session metadata is missing {key}"))
            })
    }
}
