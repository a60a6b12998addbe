use super::error::{EntityApiErrorKind, Error};
use super::query::{self, QueryFilterMap};
use entity::events::{ActiveModel, Column, Entity, Model};
use entity::Id;
use log::*;
use sea_orm::{entity::prelude::*, ConnectionTrait, QueryOrder, Set, Value};

/// Inserts a newly authored event. Inventory starts full and the ratings
/// start empty; whatever the caller put in those fields is ignored.
pub async fn create(
    db: &impl ConnectionTrait,
    event_model: Model,
    host_id: Id,
) -> Result<Model, Error> {
    debug!("New Event Model to be inserted: {:?}", event_model.title);

    let now = chrono::Utc::now();
    let event_active_model = ActiveModel {
        host_id: Set(host_id),
        title: Set(event_model.title),
        description: Set(event_model.description),
        location_name: Set(event_model.location_name),
        latitude: Set(event_model.latitude),
        longitude: Set(event_model.longitude),
        image_url: Set(event_model.image_url),
        date: Set(event_model.date),
        price: Set(event_model.price),
        total_tickets: Set(event_model.total_tickets),
        remaining_tickets: Set(event_model.total_tickets),
        average_rating: Set(0.0),
        review_count: Set(0),
        is_active: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    };

    Ok(event_active_model.insert(db).await?)
}

pub async fn find_by_id(db: &impl ConnectionTrait, id: Id) -> Result<Model, Error> {
    Entity::find_by_id(id).one(db).await?.ok_or_else(|| {
        debug!("Event with id {id} not found");
        Error::not_found()
    })
}

/// Active events ordered by date, then id so that equal dates list stably.
pub async fn find_active_ordered(db: &impl ConnectionTrait) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::IsActive.eq(true))
        .order_by_asc(Column::Date)
        .order_by_asc(Column::Id)
        .all(db)
        .await?)
}

/// Active events in storage order.
pub async fn find_active(db: &impl ConnectionTrait) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::IsActive.eq(true))
        .all(db)
        .await?)
}

/// Every event, active or not, newest date first. Backs admin moderation.
pub async fn find_all(db: &impl ConnectionTrait) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .order_by_desc(Column::Date)
        .order_by_asc(Column::Id)
        .all(db)
        .await?)
}

pub async fn find_by_host(db: &impl ConnectionTrait, host_id: Id) -> Result<Vec<Model>, Error> {
    let mut query_filter_map = QueryFilterMap::new();
    query_filter_map.insert(
        "host_id".to_string(),
        Some(Value::Uuid(Some(Box::new(host_id)))),
    );

    let mut events = query::find_by::<Entity, Column>(db, query_filter_map).await?;
    events.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
    Ok(events)
}

pub async fn delete_by_id(db: &impl ConnectionTrait, id: Id) -> Result<(), Error> {
    let result = Entity::delete_by_id(id).exec(db).await?;

    if result.rows_affected == 0 {
        error!("Event with id {id} not found");
        return Err(Error {
            source: None,
            error_kind: EntityApiErrorKind::RecordNotFound,
        });
    }

    Ok(())
}
