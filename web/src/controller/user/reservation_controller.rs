use crate::controller::ApiResponse;
use crate::extractors::compare_api_version::CompareApiVersion;
use crate::{AppState, Error};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domain::Id;
use service::config::ApiVersion;

use log::*;

/// GET the events a user is going to (their attendee dashboard), soonest first.
#[utoipa::path(
    get,
    path = "/users/{id}/reservations",
    params(
        ApiVersion,
        ("id" = Uuid, Path, description = "User id whose reservations to retrieve")
    ),
    responses(
        (status = 200, description = "Successfully retrieved the events the user is going to", body = [domain::events::Model]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 503, description = "Service temporarily unavailable")
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn index(
    CompareApiVersion(_v): CompareApiVersion,
    State(app_state): State<AppState>,
    Path(user_id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET events user {user_id} is going to");

    let events = app_state.reservation_engine.attending(user_id).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), events)))
}
