use crate::controller::ApiResponse;
use crate::extractors::{
    authenticated_user::{AuthenticatedUser, CurrentUser},
    compare_api_version::CompareApiVersion,
};
use crate::{AppState, Error};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domain::error::Error as DomainError;
use domain::event as EventApi;
use domain::reservation::ReservationOutcome;
use domain::Id;
use service::config::ApiVersion;

use log::*;

/// POST reserve a spot at an event for the signed-in user.
///
/// Free events are confirmed immediately. Paid events answer with the URL of
/// the hosted payment page; the spot is recorded once the payment settles.
#[utoipa::path(
    post,
    path = "/events/{id}/reservations",
    params(
        ApiVersion,
        ("id" = Uuid, Path, description = "Event id to reserve a spot at")
    ),
    responses(
        (status = 201, description = "Reservation confirmed", body = domain::reservation::ReservationOutcome),
        (status = 200, description = "Already reserved, or redirect to payment", body = domain::reservation::ReservationOutcome),
        (status = 401, description = "Please sign in to reserve a spot"),
        (status = 409, description = "Sold out"),
        (status = 422, description = "Event is not taking reservations"),
        (status = 502, description = "Payment provider unavailable"),
        (status = 503, description = "Service temporarily unavailable")
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn create(
    CompareApiVersion(_v): CompareApiVersion,
    CurrentUser(user): CurrentUser,
    State(app_state): State<AppState>,
    Path(event_id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    let user_id = user.map(|user| user.id);
    debug!("POST reservation for event {event_id} by user {user_id:?}");

    let event = EventApi::find_by_id(app_state.catalog.as_ref(), event_id)
        .await
        .map_err(DomainError::into_reservation_error)?;

    let outcome = app_state
        .reservation_engine
        .attempt_reservation(&event, user_id)
        .await?;

    let status = match outcome {
        ReservationOutcome::Confirmed { .. } => StatusCode::CREATED,
        ReservationOutcome::AlreadyReserved { .. } | ReservationOutcome::RedirectRequired { .. } => {
            StatusCode::OK
        }
    };

    Ok((status, Json(ApiResponse::new(status.into(), outcome))))
}

/// GET the signed-in user's reservation for an event, if they hold one.
#[utoipa::path(
    get,
    path = "/events/{id}/reservations/me",
    params(
        ApiVersion,
        ("id" = Uuid, Path, description = "Event id")
    ),
    responses(
        (status = 200, description = "The caller's reservation, or null", body = Option<domain::reservations::Model>),
        (status = 401, description = "Unauthorized"),
        (status = 503, description = "Service temporarily unavailable")
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn read_own(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(user): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(event_id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET reservation for event {event_id} by user {}", user.id);

    let reservation = app_state
        .reservation_engine
        .find_reservation(event_id, user.id)
        .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), reservation)))
}

/// POST mark the signed-in user as interested in an event. Takes no ticket.
#[utoipa::path(
    post,
    path = "/events/{id}/interest",
    params(
        ApiVersion,
        ("id" = Uuid, Path, description = "Event id")
    ),
    responses(
        (status = 200, description = "Interest recorded; an existing spot is kept", body = domain::reservations::Model),
        (status = 401, description = "Please sign in to reserve a spot"),
        (status = 422, description = "Event is not taking reservations"),
        (status = 503, description = "Service temporarily unavailable")
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn interest(
    CompareApiVersion(_v): CompareApiVersion,
    CurrentUser(user): CurrentUser,
    State(app_state): State<AppState>,
    Path(event_id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    let user_id = user.map(|user| user.id);
    debug!("POST interest in event {event_id} by user {user_id:?}");

    let event = EventApi::find_by_id(app_state.catalog.as_ref(), event_id)
        .await
        .map_err(DomainError::into_reservation_error)?;

    let reservation = app_state
        .reservation_engine
        .express_interest(&event, user_id)
        .await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), reservation)))
}
