//! Clients for external services.

use crate::error::{DomainErrorKind, Error, InternalErrorKind};
use crate::{events, Id};
use async_trait::async_trait;
use log::*;
use serde::Deserialize;
use service::config::Config;
use std::sync::Arc;

pub mod stripe;
pub mod webhook;

/// A hosted payment page the payer is redirected to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Creates hosted payment sessions for paid events.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a checkout session for one ticket to `event`, paid by `user_id`.
    /// The session carries both ids as metadata so the settlement webhook can
    /// find its way back.
    async fn create_checkout_session(
        &self,
        event: &events::Model,
        user_id: Id,
    ) -> Result<CheckoutSession, Error>;
}

/// The configured payment gateway. Without an API key every checkout attempt
/// fails, so paid reservations are refused rather than given away.
pub fn from_config(config: &Config) -> Arc<dyn PaymentGateway> {
    match stripe::StripeClient::new(config) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            warn!("Payment gateway disabled, paid reservations will fail: {err}");
            Arc::new(Unconfigured)
        }
    }
}

struct Unconfigured;

#[async_trait]
impl PaymentGateway for Unconfigured {
    async fn create_checkout_session(
        &self,
        event: &events::Model,
        _user_id: Id,
    ) -> Result<CheckoutSession, Error> {
        error!("Checkout requested for event {} with no payment API key", event.id);
        Err(Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
        })
    }
}
