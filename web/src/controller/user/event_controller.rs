use crate::controller::ApiResponse;
use crate::extractors::compare_api_version::CompareApiVersion;
use crate::{AppState, Error};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domain::event as EventApi;
use domain::Id;
use service::config::ApiVersion;

use log::*;

/// GET the events a user hosts (their host dashboard).
#[utoipa::path(
    get,
    path = "/users/{id}/events",
    params(
        ApiVersion,
        ("id" = Uuid, Path, description = "User id whose hosted events to retrieve")
    ),
    responses(
        (status = 200, description = "Successfully retrieved the user's hosted events", body = [domain::events::Model]),
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
    debug!("GET events hosted by user {user_id}");

    let events = EventApi::find_by_host(app_state.catalog.as_ref(), user_id).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), events)))
}
