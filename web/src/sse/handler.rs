use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::AppState;
use ::sse::connection::ConnectionId;
use ::sse::Manager;
use async_stream::stream;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use log::*;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Unregisters its connection when the response stream is dropped, which is
/// how a client disconnect reaches us.
struct ConnectionGuard {
    manager: Arc<Manager>,
    connection_id: ConnectionId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        debug!("SSE connection {} closed", self.connection_id.as_str());
        self.manager.unregister_connection(&self.connection_id);
    }
}

/// Opens the live catalog stream for the signed-in user.
#[utoipa::path(
    get,
    path = "/sse",
    responses(
        (status = 200, description = "Event stream of catalog changes (event_created, event_deleted, inventory_changed)"),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub(crate) async fn sse_handler(
    AuthenticatedUser(user): AuthenticatedUser,
    State(app_state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Establishing SSE connection for user {}", user.id);

    let (tx, mut rx) = mpsc::unbounded_channel();

    let guard = ConnectionGuard {
        connection_id: app_state
            .sse_manager
            .register_connection(user.id.to_string(), tx),
        manager: Arc::clone(&app_state.sse_manager),
    };

    let stream = stream! {
        let _guard = guard;
        while let Some(event) = rx.recv().await {
            yield event;
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod tests {
    use crate::test_support::{app, app_state, login, login_db, request, user};
    use axum::body::Body;
    use axum::http::StatusCode;
    use domain::catalog::in_memory::InMemoryStore;
    use domain::roles::Role;
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn stream_registers_and_releases_the_connection() {
        let attendee = user(Role::Attendee);
        let state = app_state(login_db(&attendee, 1), Arc::new(InMemoryStore::new()));
        let manager = Arc::clone(&state.sse_manager);
        let app = app(state);
        let cookie = login(&app, &attendee).await;

        let response = app
            .oneshot(request("GET", "/sse", Some(&cookie)).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(manager.connection_count(), 1);

        drop(response);
        assert_eq!(manager.connection_count(), 0);
    }

    #[tokio::test]
    async fn anonymous_callers_cannot_open_a_stream() {
        let state = app_state(
            sea_orm::MockDatabase::new(sea_orm::DatabaseBackend::Postgres).into_connection(),
            Arc::new(InMemoryStore::new()),
        );
        let response = app(state)
            .oneshot(request("GET", "/sse", None).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
