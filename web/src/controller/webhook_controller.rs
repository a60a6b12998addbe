//! Controller for signed payment-provider webhooks.
//!
//! A settled checkout session is turned into a reservation with the same
//! atomic commit free events use. The endpoint is unauthenticated and relies
//! on the signature alone.

use crate::{AppState, Error};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use domain::error::ReservationErrorKind;
use domain::gateway::webhook::{WebhookAction, WebhookEvent, SIGNATURE_HEADER};
use domain::reservation::ReservationOutcome;
use log::*;
use serde::Serialize;

/// Response for webhook acknowledgment
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: String,
}

impl WebhookResponse {
    fn new(status: &str) -> Json<Self> {
        Json(Self {
            status: status.to_string(),
        })
    }
}

/// POST /webhooks/payments
///
/// Handles payment settlement callbacks. Replays of a confirmation are
/// acknowledged without writing anything new.
#[utoipa::path(
    post,
    path = "/webhooks/payments",
    request_body(content = String, description = "Raw provider event JSON", content_type = "application/json"),
    responses(
        (status = 200, description = "Webhook acknowledged"),
        (status = 401, description = "Missing or invalid signature"),
        (status = 422, description = "Malformed payload or metadata"),
        (status = 500, description = "No webhook secret configured"),
        (status = 503, description = "Storage unavailable, the provider should retry")
    )
)]
pub async fn payment_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, Error> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    app_state
        .webhook_verifier
        .verify(signature, &body, Utc::now())?;

    let webhook = WebhookEvent::parse(&body)?;
    debug!("Received payment webhook: {}", webhook.event_type);

    let confirmation = match webhook.action()? {
        WebhookAction::Confirm(confirmation) => confirmation,
        WebhookAction::Abandoned { session_id } => {
            info!("Checkout session {session_id} was abandoned, nothing reserved");
            return Ok((StatusCode::OK, WebhookResponse::new("abandoned")));
        }
        WebhookAction::Ignored { event_type } => {
            debug!("Ignoring payment webhook of type {event_type}");
            return Ok((StatusCode::OK, WebhookResponse::new("ignored")));
        }
    };

    match app_state
        .reservation_engine
        .confirm_payment(confirmation)
        .await
    {
        Ok(ReservationOutcome::Confirmed { reservation }) => {
            info!("Payment settled, reservation {} confirmed", reservation.id);
            Ok((StatusCode::OK, WebhookResponse::new("confirmed")))
        }
        Ok(ReservationOutcome::AlreadyReserved { reservation }) => {
            info!("Payment settlement replayed for reservation {}", reservation.id);
            Ok((StatusCode::OK, WebhookResponse::new("already_reserved")))
        }
        Ok(ReservationOutcome::RedirectRequired { .. }) => {
            // Settlement never asks for another payment.
            error!(
                "Settlement for event {} and user {} asked for a redirect",
                confirmation.event_id, confirmation.user_id
            );
            Ok((StatusCode::OK, WebhookResponse::new("ignored")))
        }
        Err(err) => match err.reservation_kind() {
            Some(ReservationErrorKind::SoldOut) => {
                error!(
                    "Payment settled for sold out event {} by user {}; refund required",
                    confirmation.event_id, confirmation.user_id
                );
                Ok((StatusCode::OK, WebhookResponse::new("sold_out")))
            }
            Some(ReservationErrorKind::EventNotReservable) => {
                error!(
                    "Payment settled for unavailable event {} by user {}; refund required",
                    confirmation.event_id, confirmation.user_id
                );
                Ok((StatusCode::OK, WebhookResponse::new("event_not_reservable")))
            }
            _ => Err(err.into()),
        },
    }
}
