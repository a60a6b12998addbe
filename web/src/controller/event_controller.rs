use crate::controller::ApiResponse;
use crate::extractors::{
    authenticated_user::AuthenticatedUser, compare_api_version::CompareApiVersion,
};
use crate::params::event::IndexParams;
use crate::{AppState, Error};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use domain::event::{self as EventApi, NewEvent};
use domain::{events::Model, listing, Id};
use service::config::ApiVersion;

use log::*;

/// GET upcoming active events, soonest first
#[utoipa::path(
    get,
    path = "/events",
    params(ApiVersion, IndexParams),
    responses(
        (status = 200, description = "Successfully retrieved the event listing", body = [domain::events::Model]),
        (status = 400, description = "Bad Request"),
        (status = 503, description = "Service temporarily unavailable")
    )
)]
pub async fn index(
    CompareApiVersion(_v): CompareApiVersion,
    State(app_state): State<AppState>,
    Query(params): Query<IndexParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET events listing with params: {params:?}");

    let listing = listing::list(
        app_state.catalog.as_ref(),
        params.window,
        Utc::now(),
        app_state.config.listing_timezone,
    )
    .await?;
    let events: Vec<Model> = listing.iter().cloned().collect();

    debug!("Found {} event(s) for the listing", events.len());

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), events)))
}

/// GET a particular event specified by its id.
#[utoipa::path(
    get,
    path = "/events/{id}",
    params(
        ApiVersion,
        ("id" = Uuid, Path, description = "Event id to retrieve")
    ),
    responses(
        (status = 200, description = "Successfully retrieved a specific event by its id", body = domain::events::Model),
        (status = 404, description = "Event not found"),
        (status = 503, description = "Service temporarily unavailable")
    )
)]
pub async fn read(
    CompareApiVersion(_v): CompareApiVersion,
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET event by id: {id}");

    let event = EventApi::find_by_id(app_state.catalog.as_ref(), id).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), event)))
}

/// GET every event, inactive and past ones included, newest first. Administrators only.
#[utoipa::path(
    get,
    path = "/admin/events",
    params(ApiVersion),
    responses(
        (status = 200, description = "Successfully retrieved all events", body = [domain::events::Model]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 503, description = "Service temporarily unavailable")
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn index_all(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(user): AuthenticatedUser,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET all events for moderation");

    let events = EventApi::find_all(app_state.catalog.as_ref(), &user).await?;

    debug!("Found {} event(s) in total", events.len());

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), events)))
}

/// POST publish a new event hosted by the authenticated user
#[utoipa::path(
    post,
    path = "/events",
    params(ApiVersion),
    request_body = domain::event::NewEvent,
    responses(
        (status = 201, description = "Successfully published a new event", body = domain::events::Model),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "Unprocessable Entity"),
        (status = 503, description = "Service temporarily unavailable")
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn create(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(user): AuthenticatedUser,
    State(app_state): State<AppState>,
    Json(new_event): Json<NewEvent>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST create a new event from: {new_event:?}");

    let event = EventApi::create(
        app_state.catalog.as_ref(),
        &app_state.event_publisher,
        &user,
        new_event,
    )
    .await?;

    debug!("New event: {event:?}");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(StatusCode::CREATED.into(), event)),
    ))
}

/// DELETE an event and its reservations. Administrators only.
#[utoipa::path(
    delete,
    path = "/events/{id}",
    params(
        ApiVersion,
        ("id" = Uuid, Path, description = "Event id to delete")
    ),
    responses(
        (status = 200, description = "Successfully deleted the event"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Event not found"),
        (status = 503, description = "Service temporarily unavailable")
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn delete(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(user): AuthenticatedUser,
    State(app_state): State<AppState>,
    Path(id): Path<Id>,
) -> Result<impl IntoResponse, Error> {
    debug!("DELETE event by id: {id}");

    EventApi::delete(
        app_state.catalog.as_ref(),
        &app_state.event_publisher,
        &user,
        id,
    )
    .await?;

    Ok(Json(ApiResponse::<()>::no_content(StatusCode::OK.into())))
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod tests {
    use crate::test_support::{app, app_state, body_json, event, login, login_db, request, user};
    use axum::body::Body;
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use domain::catalog::in_memory::InMemoryStore;
    use domain::roles::Role;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn anonymous_app(store: Arc<InMemoryStore>) -> axum::Router {
        app(app_state(
            MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
            store,
        ))
    }

    #[tokio::test]
    async fn listing_is_public_ordered_and_windowed() {
        let now = Utc::now();
        let mut later = event(0.0, 5);
        later.date = (now + Duration::days(20)).into();
        let mut soon = event(0.0, 5);
        soon.date = (now + Duration::days(3)).into();
        let mut past = event(0.0, 5);
        past.date = (now - Duration::days(2)).into();
        let mut inactive = event(0.0, 5);
        inactive.is_active = false;

        let store = Arc::new(InMemoryStore::with_events([
            later.clone(),
            soon.clone(),
            past,
            inactive,
        ]));
        let app = anonymous_app(store);

        let response = app
            .clone()
            .oneshot(request("GET", "/events", None).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let ids: Vec<String> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec![soon.id.to_string(), later.id.to_string()]);

        let response = app
            .oneshot(
                request("GET", "/events?window=this_week", None)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["id"], json!(soon.id.to_string()));
    }

    #[tokio::test]
    async fn listing_requires_an_api_version() {
        let response = anonymous_app(Arc::new(InMemoryStore::new()))
            .oneshot(
                axum::http::Request::builder()
                    .uri("/events")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_event_is_404() {
        let response = anonymous_app(Arc::new(InMemoryStore::new()))
            .oneshot(
                request("GET", &format!("/events/{}", domain::Id::new_v4()), None)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    fn new_event_body() -> String {
        json!({
            "title": "Block party",
            "description": "Music, food trucks and a bouncy castle on Oak Street",
            "location_name": "Oak Street",
            "latitude": 40.71,
            "longitude": -74.0,
            "date": (Utc::now() + Duration::days(5)).to_rfc3339(),
            "price": 0.0,
            "is_free": true,
            "total_tickets": 50
        })
        .to_string()
    }

    #[tokio::test]
    async fn hosts_can_publish_events() {
        let host = user(Role::Host);
        let store = Arc::new(InMemoryStore::new());
        let app = app(app_state(login_db(&host, 1), Arc::clone(&store)));
        let cookie = login(&app, &host).await;

        let response = app
            .oneshot(
                request("POST", "/events", Some(&cookie))
                    .header("content-type", "application/json")
                    .body(Body::from(new_event_body()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["data"]["host_id"], json!(host.id.to_string()));
        assert_eq!(body["data"]["remaining_tickets"], json!(50));
    }

    #[tokio::test]
    async fn attendees_cannot_publish_events() {
        let attendee = user(Role::Attendee);
        let app = app(app_state(
            login_db(&attendee, 2),
            Arc::new(InMemoryStore::new()),
        ));
        let cookie = login(&app, &attendee).await;

        let response = app
            .oneshot(
                request("POST", "/events", Some(&cookie))
                    .header("content-type", "application/json")
                    .body(Body::from(new_event_body()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn only_admins_delete_events() {
        let listed = event(0.0, 5);
        let store = Arc::new(InMemoryStore::with_events([listed.clone()]));

        let host = user(Role::Host);
        let host_app = app(app_state(login_db(&host, 2), Arc::clone(&store)));
        let cookie = login(&host_app, &host).await;
        let response = host_app
            .oneshot(
                request("DELETE", &format!("/events/{}", listed.id), Some(&cookie))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(store.event(listed.id).is_some());

        let admin = user(Role::Admin);
        let admin_app = app(app_state(login_db(&admin, 2), Arc::clone(&store)));
        let cookie = login(&admin_app, &admin).await;
        let response = admin_app
            .oneshot(
                request("DELETE", &format!("/events/{}", listed.id), Some(&cookie))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(store.event(listed.id).is_none());
    }

    #[tokio::test]
    async fn only_admins_list_all_events() {
        let mut inactive = event(0.0, 5);
        inactive.is_active = false;
        let store = Arc::new(InMemoryStore::with_events([inactive.clone()]));

        let attendee = user(Role::Attendee);
        let attendee_app = app(app_state(login_db(&attendee, 2), Arc::clone(&store)));
        let cookie = login(&attendee_app, &attendee).await;
        let response = attendee_app
            .oneshot(
                request("GET", "/admin/events", Some(&cookie))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let admin = user(Role::Admin);
        let admin_app = app(app_state(login_db(&admin, 2), Arc::clone(&store)));
        let cookie = login(&admin_app, &admin).await;
        let response = admin_app
            .oneshot(
                request("GET", "/admin/events", Some(&cookie))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["id"], json!(inactive.id.to_string()));
        assert_eq!(body["data"][0]["is_active"], json!(false));
    }
}
