use crate::protect::{authorize, Predicate, UserIsAdmin, UserIsNotSelf, UserIsSelf};
use crate::{extractors::authenticated_user::AuthenticatedUser, AppState};
use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::IntoResponse,
};
use domain::Id;

// checks:
// - the authenticated user is an administrator
pub(crate) async fn index(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    request: Request,
    next: Next,
) -> impl IntoResponse {
    let checks = vec![Predicate::new(UserIsAdmin, vec![])];
    authorize(&app_state, user, request, next, checks).await
}

// checks:
// - the authenticated user is an administrator
// - they are not changing their own role
pub(crate) async fn update_role(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(user_id): Path<Id>,
    request: Request,
    next: Next,
) -> impl IntoResponse {
    let checks = vec![
        Predicate::new(UserIsAdmin, vec![]),
        Predicate::new(UserIsNotSelf, vec![user_id]),
    ];
    authorize(&app_state, user, request, next, checks).await
}

// checks:
// - the `user_id` matches the authenticated user's id
pub(crate) async fn own_dashboard(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(user_id): Path<Id>,
    request: Request,
    next: Next,
) -> impl IntoResponse {
    let checks = vec![Predicate::new(UserIsSelf, vec![user_id])];
    authorize(&app_state, user, request, next, checks).await
}
