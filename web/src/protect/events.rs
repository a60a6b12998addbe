use crate::protect::{authorize, Predicate, UserCanHost, UserIsAdmin};
use crate::{extractors::authenticated_user::AuthenticatedUser, AppState};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};

// checks:
// - the authenticated user may host events
pub(crate) async fn create(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    request: Request,
    next: Next,
) -> impl IntoResponse {
    let checks = vec![Predicate::new(UserCanHost, vec![])];
    authorize(&app_state, user, request, next, checks).await
}

// checks:
// - the authenticated user is an administrator
pub(crate) async fn delete(
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
pub(crate) async fn index_all(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    request: Request,
    next: Next,
) -> impl IntoResponse {
    let checks = vec![Predicate::new(UserIsAdmin, vec![])];
    authorize(&app_state, user, request, next, checks).await
}
