//! Host authoring and administration of catalog events.

use crate::catalog::Catalog;
use crate::error::Error;
use crate::{events, users, Id};
use ::events::{DomainEvent, EventPublisher};
use chrono::{DateTime, FixedOffset, Utc};
use log::*;
use serde::Deserialize;
use utoipa::ToSchema;

const MIN_TITLE_CHARS: usize = 5;
const MIN_DESCRIPTION_CHARS: usize = 20;

/// A host's submission for a new event.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[schema(value_type = String, format = DateTime)]
    pub date: DateTime<FixedOffset>,
    #[serde(default)]
    pub price: f64,
    /// Forces the price to zero when set.
    #[serde(default)]
    pub is_free: bool,
    pub total_tickets: i32,
}

impl NewEvent {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), Error> {
        if self.title.trim().chars().count() < MIN_TITLE_CHARS {
            return Err(Error::invalid(format!(
                "Title must be at least {MIN_TITLE_CHARS} characters"
            )));
        }
        if self.description.trim().chars().count() < MIN_DESCRIPTION_CHARS {
            return Err(Error::invalid(format!(
                "Description must be at least {MIN_DESCRIPTION_CHARS} characters"
            )));
        }
        if self.location_name.trim().is_empty() {
            return Err(Error::invalid("Location is required"));
        }
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude)
        {
            return Err(Error::invalid("Coordinates are out of range"));
        }
        if self.date.with_timezone(&Utc) <= now {
            return Err(Error::invalid("Event date must be in the future"));
        }
        if !self.is_free && (!self.price.is_finite() || self.price < 0.0) {
            return Err(Error::invalid("Price must be zero or more"));
        }
        if self.total_tickets < 1 {
            return Err(Error::invalid("An event needs at least one ticket"));
        }
        Ok(())
    }

    fn into_model(self, host_id: Id) -> events::Model {
        let now = Utc::now();
        let price = if self.is_free { 0.0 } else { self.price };

        events::Model {
            id: Id::nil(),
            host_id,
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            location_name: self.location_name.trim().to_string(),
            latitude: self.latitude,
            longitude: self.longitude,
            image_url: self.image_url.filter(|url| !url.trim().is_empty()),
            date: self.date,
            price,
            total_tickets: self.total_tickets,
            remaining_tickets: self.total_tickets,
            average_rating: 0.0,
            review_count: 0,
            is_active: true,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }
}

/// Publishes a new event hosted by `host`. Only hosts and admins may.
pub async fn create(
    catalog: &dyn Catalog,
    publisher: &EventPublisher,
    host: &users::Model,
    new_event: NewEvent,
) -> Result<events::Model, Error> {
    if !host.role.can_host() {
        warn!("User {} with role {} tried to create an event", host.id, host.role);
        return Err(Error::forbidden("Only hosts can create events"));
    }

    new_event.validate(Utc::now())?;

    let event = catalog
        .insert_event(new_event.into_model(host.id), host.id)
        .await?;
    info!("User {} created event {}", host.id, event.id);

    match serde_json::to_value(&event) {
        Ok(value) => publisher.publish(DomainEvent::EventCreated { event: value }).await,
        Err(e) => error!("Failed to serialize event {} for publishing: {e}", event.id),
    }

    Ok(event)
}

/// Removes an event and its reservations. Administrators only.
pub async fn delete(
    catalog: &dyn Catalog,
    publisher: &EventPublisher,
    actor: &users::Model,
    id: Id,
) -> Result<(), Error> {
    if !actor.role.is_admin() {
        warn!("User {} with role {} tried to delete event {id}", actor.id, actor.role);
        return Err(Error::forbidden("Only administrators can delete events"));
    }

    catalog.delete_event(id).await?;
    info!("Admin {} deleted event {id}", actor.id);

    publisher
        .publish(DomainEvent::EventDeleted { event_id: id })
        .await;

    Ok(())
}

pub async fn find_by_id(catalog: &dyn Catalog, id: Id) -> Result<events::Model, Error> {
    catalog.find_event(id).await?.ok_or_else(Error::not_found)
}

/// Every event, including deactivated ones, for moderation. Administrators only.
pub async fn find_all(
    catalog: &dyn Catalog,
    actor: &users::Model,
) -> Result<Vec<events::Model>, Error> {
    if !actor.role.is_admin() {
        warn!("User {} with role {} tried to list all events", actor.id, actor.role);
        return Err(Error::forbidden("Only administrators can list all events"));
    }

    catalog.all_events().await
}

pub async fn find_by_host(catalog: &dyn Catalog, host_id: Id) -> Result<Vec<events::Model>, Error> {
    catalog.events_by_host(host_id).await
}
