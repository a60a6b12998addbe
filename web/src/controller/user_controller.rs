use crate::extractors::{
    authenticated_user::AuthenticatedUser, compare_api_version::CompareApiVersion,
};
use crate::params::user::UpdateRoleParams;
use crate::{controller::ApiResponse, AppState, Error};
use ::sse::message::{Event as SseEvent, Message as SseMessage, MessageScope};
use axum::extract::{Path, State};
use axum::{http::StatusCode, response::IntoResponse, Json};
use domain::user::NewUser;
use domain::{user as UserApi, users, Id};
use service::config::ApiVersion;

use log::*;

/// CREATE a new User (sign-up). Every new account is an attendee.
#[utoipa::path(
    post,
    path = "/users",
    params(
        ApiVersion,
    ),
    request_body = domain::user::NewUser,
    responses(
        (status = 201, description = "Successfully created a new User", body = domain::users::Model),
        (status = 409, description = "Email address already registered"),
        (status = 422, description = "Unprocessable Entity"),
        (status = 405, description = "Method not allowed")
    )
)]
pub async fn create(
    CompareApiVersion(_v): CompareApiVersion,
    State(app_state): State<AppState>,
    Json(new_user): Json<NewUser>,
) -> Result<impl IntoResponse, Error> {
    debug!("CREATE new User with email: {}", new_user.email);

    let user: users::Model = UserApi::create(app_state.db_conn_ref(), new_user).await?;

    debug!("Newly created User {:?}", &user);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(StatusCode::CREATED.into(), user)),
    ))
}

/// GET all users. Administrators only.
#[utoipa::path(
    get,
    path = "/users",
    params(ApiVersion),
    responses(
        (status = 200, description = "Successfully retrieved all users", body = [domain::users::Model]),
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
) -> Result<impl IntoResponse, Error> {
    let users = UserApi::find_all(app_state.db_conn_ref()).await?;

    debug!("Found {} user(s)", users.len());

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), users)))
}

/// PUT a new role for a user. Administrators only; the admin role cannot be granted.
#[utoipa::path(
    put,
    path = "/users/{id}/role",
    params(
        ApiVersion,
        ("id" = Uuid, Path, description = "Id of the user whose role changes"),
    ),
    request_body = UpdateRoleParams,
    responses(
        (status = 200, description = "Successfully updated the user's role", body = domain::users::Model),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found"),
        (status = 503, description = "Service temporarily unavailable")
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn update_role(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(actor): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(user_id): Path<Id>,
    Json(params): Json<UpdateRoleParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("PUT role {} for user {user_id}", params.role);

    let user = UserApi::set_role(app_state.db_conn_ref(), &actor, user_id, params.role).await?;

    // The user's open pages re-check what they may do.
    app_state.sse_manager.send_message(SseMessage {
        event: SseEvent::RoleChanged {
            role: user.role.to_string(),
        },
        scope: MessageScope::User {
            user_id: user.id.to_string(),
        },
    });

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), user)))
}
