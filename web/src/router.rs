use crate::{
    controller::health_check_controller, middleware::auth::require_auth, params, protect,
    sse::handler, AppState,
};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};

use crate::controller::{
    event_controller, reservation_controller, user, user_controller, user_session_controller,
    webhook_controller,
};

use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_rapidoc::RapiDoc;

// Global definition of the OpenAPI document. A path or schema must be
// listed here to be rendered.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Hyperlocal Events API"
        ),
        paths(
            health_check_controller::health_check,
            event_controller::index,
            event_controller::read,
            event_controller::create,
            event_controller::delete,
            event_controller::index_all,
            reservation_controller::create,
            reservation_controller::read_own,
            reservation_controller::interest,
            user_controller::create,
            user_controller::index,
            user_controller::update_role,
            user::event_controller::index,
            user::reservation_controller::index,
            user_session_controller::login,
            user_session_controller::delete,
            webhook_controller::payment_webhook,
            handler::sse_handler,
        ),
        components(
            schemas(
                domain::events::Model,
                domain::reservations::Model,
                domain::users::Model,
                domain::roles::Role,
                domain::reservation_status::ReservationStatus,
                domain::event::NewEvent,
                domain::listing::Window,
                domain::reservation::ReservationOutcome,
                domain::user::Credentials,
                domain::user::NewUser,
                params::user::UpdateRoleParams,
            )
        ),
        modifiers(&SecurityAddon),
        tags(
            (name = "hyperlocal_platform", description = "Hyperlocal event listings and reservations API")
        )
    )]
struct ApiDoc;

struct SecurityAddon;

// Defines our cookie session based authentication requirement for gaining access to our
// API endpoints for OpenAPI.
impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "cookie_auth",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "id",
                    "Session id value returned from successful login via Set-Cookie header",
                ))),
            )
        }
    }
}

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(event_routes(app_state.clone()))
        .merge(reservation_routes(app_state.clone()))
        .merge(user_routes(app_state.clone()))
        .merge(user_dashboard_routes(app_state.clone()))
        .merge(user_session_routes(app_state.clone()))
        .merge(user_session_protected_routes(app_state.clone()))
        .merge(webhook_routes(app_state.clone()))
        .merge(sse_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi2.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn event_routes(app_state: AppState) -> Router {
    Router::new()
        // The listing and event pages are public
        .route("/events", get(event_controller::index))
        .route("/events/{id}", get(event_controller::read))
        .merge(
            Router::new()
                .merge(
                    // POST /events
                    Router::new()
                        .route("/events", post(event_controller::create))
                        .route_layer(from_fn_with_state(
                            app_state.clone(),
                            protect::events::create,
                        )),
                )
                .merge(
                    // GET /admin/events
                    Router::new()
                        .route("/admin/events", get(event_controller::index_all))
                        .route_layer(from_fn_with_state(
                            app_state.clone(),
                            protect::events::index_all,
                        )),
                )
                .merge(
                    // DELETE /events/{id}
                    Router::new()
                        .route("/events/{id}", delete(event_controller::delete))
                        .route_layer(from_fn_with_state(
                            app_state.clone(),
                            protect::events::delete,
                        )),
                )
                .route_layer(from_fn(require_auth)),
        )
        .with_state(app_state)
}

fn reservation_routes(app_state: AppState) -> Router {
    Router::new()
        // Anonymous callers reach the engine, which asks them to sign in
        .route(
            "/events/{id}/reservations",
            post(reservation_controller::create),
        )
        .route(
            "/events/{id}/interest",
            post(reservation_controller::interest),
        )
        .merge(
            Router::new()
                .route(
                    "/events/{id}/reservations/me",
                    get(reservation_controller::read_own),
                )
                .route_layer(from_fn(require_auth)),
        )
        .with_state(app_state)
}

fn user_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/users", post(user_controller::create))
        .merge(
            Router::new()
                .merge(
                    // GET /users
                    Router::new()
                        .route("/users", get(user_controller::index))
                        .route_layer(from_fn_with_state(
                            app_state.clone(),
                            protect::users::index,
                        )),
                )
                .merge(
                    // PUT /users/{id}/role
                    Router::new()
                        .route("/users/{id}/role", put(user_controller::update_role))
                        .route_layer(from_fn_with_state(
                            app_state.clone(),
                            protect::users::update_role,
                        )),
                )
                .route_layer(from_fn(require_auth)),
        )
        .with_state(app_state)
}

fn user_dashboard_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/users/{id}/events", get(user::event_controller::index))
        .route(
            "/users/{id}/reservations",
            get(user::reservation_controller::index),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            protect::users::own_dashboard,
        ))
        .route_layer(from_fn(require_auth))
        .with_state(app_state)
}

fn user_session_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/login", post(user_session_controller::login))
        .with_state(app_state)
}

fn user_session_protected_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/delete", delete(user_session_controller::delete))
        .route_layer(from_fn(require_auth))
        .with_state(app_state)
}

fn webhook_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/webhooks/payments",
            post(webhook_controller::payment_webhook),
        )
        .with_state(app_state)
}

fn sse_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/sse", get(handler::sse_handler))
        .route_layer(from_fn(require_auth))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_the_reservation_endpoints() {
        let doc = ApiDoc::openapi();

        for path in [
            "/events",
            "/events/{id}",
            "/admin/events",
            "/events/{id}/reservations",
            "/events/{id}/reservations/me",
            "/events/{id}/interest",
            "/users/{id}/role",
            "/webhooks/payments",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path}");
        }
    }
}
