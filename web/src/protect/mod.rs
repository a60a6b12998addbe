//! Authorization middleware for the web routes.
//!
//! The domain checks roles again at every privileged operation; these rules
//! turn the common refusals into a 403 before a handler runs.

pub(crate) mod events;
pub(crate) mod users;

use crate::AppState;
use async_trait::async_trait;
use axum::{extract::Request, http::StatusCode, middleware::Next, response::IntoResponse};
use domain::Id;
use log::*;

/// Trait representing a single authorization rule.
///
/// Implementors answer **“is the authenticated user allowed to proceed?”**.
/// The rule receives:
/// * shared application state (`AppState`)
/// * the authenticated [`domain::users::Model`]
/// * any additional [`Id`] parameters supplied by the caller.
///
/// Example:
/// ```rust,ignore
/// #[async_trait]
/// impl Check for UserIsAdmin {
///     async fn eval(&self, _app: &AppState, user: &domain::users::Model, _args: Vec<Id>) -> bool {
///         user.role.is_admin()
///     }
/// }
/// ```
#[async_trait]
pub trait Check: Send + Sync {
    async fn eval(&self, app: &AppState, user: &domain::users::Model, args: Vec<Id>) -> bool;
}

/// Pairs a [`Check`] implementation with the concrete arguments that the rule
/// should receive when evaluated.
pub(crate) struct Predicate {
    predicate: Box<dyn Check>,
    args: Vec<Id>,
}

impl Predicate {
    pub(crate) fn new<C: Check + 'static>(predicate: C, args: Vec<Id>) -> Self {
        Self {
            predicate: Box::new(predicate),
            args,
        }
    }

    pub(crate) async fn check(&self, app_state: &AppState, user: &domain::users::Model) -> bool {
        self.predicate
            .eval(app_state, user, self.args.clone())
            .await
    }
}

/// Axum middleware that enforces one or more [`Predicate`]s.
///
/// Each predicate is evaluated in the order supplied; if any rule returns
/// `false` the request is aborted with **403 FORBIDDEN**.  When all rules
/// pass the wrapped handler (`next`) is executed.
pub(crate) async fn authorize(
    app_state: &AppState,
    authenticated_user: domain::users::Model,
    request: Request,
    next: Next,
    checks: Vec<Predicate>,
) -> impl IntoResponse {
    for check in checks {
        if !check.check(app_state, &authenticated_user).await {
            warn!(
                "User {} ({}) refused access to {}",
                authenticated_user.id,
                authenticated_user.role,
                request.uri()
            );
            return (StatusCode::FORBIDDEN, "FORBIDDEN").into_response();
        }
    }
    next.run(request).await
}

pub struct UserIsAdmin;

#[async_trait]
impl Check for UserIsAdmin {
    async fn eval(
        &self,
        _app_state: &AppState,
        authenticated_user: &domain::users::Model,
        _args: Vec<Id>,
    ) -> bool {
        authenticated_user.role.is_admin()
    }
}

pub struct UserCanHost;

#[async_trait]
impl Check for UserCanHost {
    async fn eval(
        &self,
        _app_state: &AppState,
        authenticated_user: &domain::users::Model,
        _args: Vec<Id>,
    ) -> bool {
        authenticated_user.role.can_host()
    }
}

/// Passes when the first argument is the authenticated user's own id.
pub struct UserIsSelf;

#[async_trait]
impl Check for UserIsSelf {
    async fn eval(
        &self,
        _app_state: &AppState,
        authenticated_user: &domain::users::Model,
        args: Vec<Id>,
    ) -> bool {
        args.first() == Some(&authenticated_user.id)
    }
}

pub struct UserIsNotSelf;

#[async_trait]
impl Check for UserIsNotSelf {
    async fn eval(
        &self,
        _app_state: &AppState,
        authenticated_user: &domain::users::Model,
        args: Vec<Id>,
    ) -> bool {
        args.first().is_some_and(|id| *id != authenticated_user.id)
    }
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use crate::test_support::{app_state, user};
    use domain::catalog::in_memory::InMemoryStore;
    use domain::roles::Role;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn state() -> AppState {
        app_state(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
            Arc::new(InMemoryStore::new()),
        )
    }

    #[tokio::test]
    async fn role_rules_follow_the_role_predicates() {
        let state = state();
        let attendee = user(Role::Attendee);
        let host = user(Role::Host);
        let admin = user(Role::Admin);

        assert!(!UserCanHost.eval(&state, &attendee, vec![]).await);
        assert!(UserCanHost.eval(&state, &host, vec![]).await);
        assert!(UserCanHost.eval(&state, &admin, vec![]).await);

        assert!(!UserIsAdmin.eval(&state, &host, vec![]).await);
        assert!(UserIsAdmin.eval(&state, &admin, vec![]).await);
    }

    #[tokio::test]
    async fn self_rules_compare_against_the_first_argument() {
        let state = state();
        let attendee = user(Role::Attendee);
        let other = Id::new_v4();

        assert!(UserIsSelf.eval(&state, &attendee, vec![attendee.id]).await);
        assert!(!UserIsSelf.eval(&state, &attendee, vec![other]).await);
        assert!(!UserIsSelf.eval(&state, &attendee, vec![]).await);

        assert!(UserIsNotSelf.eval(&state, &attendee, vec![other]).await);
        assert!(!UserIsNotSelf.eval(&state, &attendee, vec![attendee.id]).await);
    }
}
