use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use axum_login::AuthManagerLayerBuilder;
use domain::catalog::{Catalog, Ledger, SeaOrmStore};
use domain::gateway::{webhook::WebhookVerifier, PaymentGateway};
use domain::reservation::ReservationEngine;
use domain::user::Backend;
use events::EventPublisher;
use log::*;
use service::config::ApiVersion;
use std::ops::Deref;
use std::sync::Arc;
use time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_sessions::{cookie::SameSite, Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

mod controller;
mod error;
mod extractors;
mod middleware;
mod params;
mod protect;
mod router;
mod sse;

pub use error::{Error, Result};

/// Web-level state: the service infrastructure plus the domain collaborators
/// every request handler shares.
#[derive(Clone)]
pub struct AppState {
    service: service::AppState,
    pub sse_manager: Arc<::sse::Manager>,
    pub event_publisher: EventPublisher,
    pub catalog: Arc<dyn Catalog>,
    pub reservation_engine: ReservationEngine,
    pub webhook_verifier: Arc<WebhookVerifier>,
}

impl AppState {
    /// State backed by the PostgreSQL catalog and ledger.
    pub fn new(
        service: service::AppState,
        sse_manager: Arc<::sse::Manager>,
        event_publisher: EventPublisher,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let store = Arc::new(SeaOrmStore::new(&service.database_connection));
        Self::with_store(service, sse_manager, event_publisher, store, gateway)
    }

    /// State backed by `store`, which serves as both catalog and ledger so
    /// that a reservation commit stays atomic.
    pub fn with_store<S>(
        service: service::AppState,
        sse_manager: Arc<::sse::Manager>,
        event_publisher: EventPublisher,
        store: Arc<S>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self
    where
        S: Catalog + Ledger + 'static,
    {
        let catalog: Arc<dyn Catalog> = store.clone();
        let ledger: Arc<dyn Ledger> = store;
        let reservation_engine = ReservationEngine::new(
            Arc::clone(&catalog),
            ledger,
            gateway,
            event_publisher.clone(),
        );
        let webhook_verifier = Arc::new(WebhookVerifier::from_config(&service.config));

        Self {
            service,
            sse_manager,
            event_publisher,
            catalog,
            reservation_engine,
            webhook_verifier,
        }
    }
}

impl Deref for AppState {
    type Target = service::AppState;

    fn deref(&self) -> &Self::Target {
        &self.service
    }
}

pub async fn init_server(
    app_state: AppState,
) -> core::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Connecting to DB with URI: {}", app_state.config.database_url());

    // Sessions live next to the application tables in the same database.
    let session_store = PostgresStore::new(
        app_state
            .db_conn_ref()
            .get_postgres_connection_pool()
            .to_owned(),
    )
    .with_schema_name(&app_state.config.db_schema)?
    .with_table_name("authorized_sessions")?;

    session_store.migrate().await?;

    let session_expiry =
        i64::try_from(app_state.config.backend_session_expiry_seconds).unwrap_or(i64::MAX);

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(app_state.config.is_production())
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(session_expiry)));

    let backend = Backend::new(&app_state.database_connection);
    let auth_layer = AuthManagerLayerBuilder::new(backend, session_layer).build();

    let server_url = format!(
        "{}:{}",
        app_state
            .config
            .interface
            .as_deref()
            .unwrap_or("127.0.0.1"),
        app_state.config.port
    );

    let listener = TcpListener::bind(&server_url).await?;

    let allowed_origins: Vec<HeaderValue> = app_state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();
    info!("allowed_origins: {allowed_origins:#?}");

    let cors_layer = CorsLayer::new()
        .allow_methods([
            Method::DELETE,
            Method::GET,
            Method::OPTIONS,
            Method::POST,
            Method::PUT,
        ])
        .allow_credentials(true)
        .allow_headers([
            AUTHORIZATION,
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static(ApiVersion::field_name()),
        ])
        .allow_origin(allowed_origins);

    info!("Server starting... listening for connections on http://{server_url}");

    axum::serve(
        listener,
        router::define_routes(app_state)
            .layer(cors_layer)
            .layer(auth_layer)
            .into_make_service(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
#[cfg(feature = "mock")]
pub(crate) mod test_support {
    //! Builds a routed app over the in-memory store with a stubbed gateway.

    use super::*;
    use async_trait::async_trait;
    use axum::{body::Body, http::Request, Router};
    use axum_login::tower_sessions::{MemoryStore, SessionManagerLayer};
    use chrono::Utc;
    use clap::Parser;
    use domain::catalog::in_memory::InMemoryStore;
    use domain::gateway::CheckoutSession;
    use domain::{events, roles::Role, users, Id};
    use password_auth::generate_hash;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
    use service::config::Config;
    use tower::ServiceExt;

    pub(crate) const PASSWORD: &str = "porchlight42";
    pub(crate) const WEBHOOK_SECRET: &str = "whsec_router";

    pub(crate) struct StubGateway;

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn create_checkout_session(
            &self,
            event: &events::Model,
            _user_id: Id,
        ) -> core::result::Result<CheckoutSession, domain::error::Error> {
            Ok(CheckoutSession {
                id: "cs_test".to_string(),
                url: format!("https://checkout.test/pay/{}", event.id),
            })
        }
    }

    pub(crate) fn config() -> Config {
        Config::try_parse_from(["hyperlocal_platform_rs"])
            .unwrap()
            .set_payment_webhook_secret(WEBHOOK_SECRET.to_string())
    }

    pub(crate) fn user(role: Role) -> users::Model {
        let now = Utc::now();
        users::Model {
            id: Id::new_v4(),
            email: format!("{role}@hyperlocal.test"),
            display_name: None,
            password: generate_hash(PASSWORD),
            role,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    pub(crate) fn event(price: f64, remaining_tickets: i32) -> events::Model {
        let now = Utc::now();
        events::Model {
            id: Id::new_v4(),
            host_id: Id::new_v4(),
            title: "Porch concert".to_string(),
            description: "Acoustic sets on the porch at dusk".to_string(),
            location_name: "12 Maple Ave".to_string(),
            latitude: 40.0,
            longitude: -75.0,
            image_url: None,
            date: (now + chrono::Duration::days(2)).into(),
            price,
            total_tickets: remaining_tickets.max(1),
            remaining_tickets,
            average_rating: 0.0,
            review_count: 0,
            is_active: true,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    /// Mock database answering the login lookup, the post-login user read
    /// and one session read per later request for `user`.
    pub(crate) fn login_db(user: &users::Model, requests: usize) -> DatabaseConnection {
        let mut db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user.clone()]])
            .append_query_results([[user.clone()]]);
        for _ in 0..requests {
            db = db.append_query_results([[user.clone()]]);
        }
        db.into_connection()
    }

    pub(crate) fn app_state(db: DatabaseConnection, store: Arc<InMemoryStore>) -> AppState {
        let db = Arc::new(db);
        let sse_manager = Arc::new(::sse::Manager::new());
        let publisher = EventPublisher::new().with_handler(Arc::new(
            ::sse::SseDomainEventHandler::new(Arc::clone(&sse_manager)),
        ));
        AppState::with_store(
            service::AppState::new(config(), &db),
            sse_manager,
            publisher,
            store,
            Arc::new(StubGateway),
        )
    }

    pub(crate) fn app(app_state: AppState) -> Router {
        let session_layer = SessionManagerLayer::new(MemoryStore::default()).with_secure(false);
        let backend = Backend::new(&app_state.database_connection);
        let auth_layer = AuthManagerLayerBuilder::new(backend, session_layer).build();

        router::define_routes(app_state).layer(auth_layer)
    }

    /// Logs `user` in and returns the session cookie.
    pub(crate) async fn login(app: &Router, user: &users::Model) -> String {
        let request = Request::builder()
            .uri("/login")
            .method("POST")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(format!(
                "email={}&password={PASSWORD}",
                user.email
            )))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        response
            .headers()
            .get("set-cookie")
            .and_then(|c| c.to_str().ok())
            .and_then(|c| c.split(';').next())
            .expect("Login should return session cookie")
            .to_string()
    }

    pub(crate) fn request(
        method: &str,
        uri: &str,
        cookie: Option<&str>,
    ) -> axum::http::request::Builder {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(ApiVersion::field_name(), ApiVersion::default_version());
        match cookie {
            Some(cookie) => builder.header("cookie", cookie),
            None => builder,
        }
    }

    pub(crate) async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
