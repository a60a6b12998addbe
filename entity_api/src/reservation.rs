//! The reservation ledger. A record's id is the `"{event_id}_{user_id}"` key,
//! so the primary key alone rules out double-booking.

use super::error::{EntityApiErrorKind, Error};
use entity::reservation_status::ReservationStatus;
use entity::reservations::{self, ActiveModel, Column, Entity, Model};
use entity::{events, Id};
use log::*;
use sea_orm::{
    entity::prelude::*,
    sea_query::{Expr, OnConflict},
    ConnectionTrait, QueryOrder, Set, SqlErr, TransactionTrait,
};

/// Result of the conditional reserve-and-decrement transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Commit {
    /// A `going` record was written and one ticket was taken.
    Committed {
        reservation: Model,
        remaining_tickets: i32,
    },
    /// A `going` record already existed. Nothing was written.
    AlreadyReserved(Model),
    /// The event had no tickets left. Nothing was written.
    SoldOut,
    /// The event is gone, inactive or already started. Nothing was written.
    EventUnavailable,
}

pub async fn find_by_key(
    db: &impl ConnectionTrait,
    event_id: Id,
    user_id: Id,
) -> Result<Option<Model>, Error> {
    Ok(Entity::find_by_id(reservations::key(event_id, user_id))
        .one(db)
        .await?)
}

pub async fn find_by_user(db: &impl ConnectionTrait, user_id: Id) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::UserId.eq(user_id))
        .order_by_desc(Column::CreatedAt)
        .all(db)
        .await?)
}

/// Writes a `going` record for (event, user) and takes one ticket from the
/// event, both or neither.
///
/// The insert only wins when no record exists or the existing one is merely
/// `interested`. The decrement only applies while the event is active, in
/// the future and has tickets left. Either guard failing rolls back the
/// whole transaction.
pub async fn confirm(
    db: &impl TransactionTrait,
    event_id: Id,
    user_id: Id,
    now: DateTimeWithTimeZone,
) -> Result<Commit, Error> {
    let key = reservations::key(event_id, user_id);
    let txn = db.begin().await?;

    let record = ActiveModel {
        id: Set(key.clone()),
        event_id: Set(event_id),
        user_id: Set(user_id),
        status: Set(ReservationStatus::Going),
        created_at: Set(now),
    };

    let inserted = Entity::insert(record.clone())
        .on_conflict(
            OnConflict::column(Column::Id)
                .update_columns([Column::Status, Column::CreatedAt])
                .action_and_where(Column::Status.ne(ReservationStatus::Going))
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await;

    let inserted = match inserted {
        Ok(rows) => rows,
        Err(err) => match missing_parent(err.sql_err()) {
            Some(MissingParent::Event) => {
                warn!("Reservation {key} refers to an event that no longer exists");
                txn.rollback().await?;
                return Ok(Commit::EventUnavailable);
            }
            Some(MissingParent::User) => {
                warn!("Reservation {key} refers to a user that no longer exists");
                txn.rollback().await?;
                return Err(Error {
                    source: Some(err),
                    error_kind: EntityApiErrorKind::RecordNotFound,
                });
            }
            None => return Err(err.into()),
        },
    };

    if inserted == 0 {
        let existing = Entity::find_by_id(key.clone()).one(&txn).await?;
        txn.rollback().await?;

        return match existing {
            Some(existing) => {
                debug!("Reservation {key} already confirmed");
                Ok(Commit::AlreadyReserved(existing))
            }
            None => Err(Error::not_found()),
        };
    }

    let decremented = events::Entity::update_many()
        .col_expr(
            events::Column::RemainingTickets,
            Expr::col(events::Column::RemainingTickets).sub(1),
        )
        .col_expr(events::Column::UpdatedAt, Expr::value(now))
        .filter(events::Column::Id.eq(event_id))
        .filter(events::Column::RemainingTickets.gt(0))
        .filter(events::Column::IsActive.eq(true))
        .filter(events::Column::Date.gt(now))
        .exec_with_returning(&txn)
        .await?;

    let Some(event) = decremented.into_iter().next() else {
        let event = events::Entity::find_by_id(event_id).one(&txn).await?;
        txn.rollback().await?;

        return Ok(match event {
            Some(event) if event.is_active && event.date > now => {
                info!("Event {event_id} is sold out, reservation {key} not written");
                Commit::SoldOut
            }
            _ => Commit::EventUnavailable,
        });
    };

    txn.commit().await?;
    info!("Reservation {key} confirmed");

    Ok(Commit::Committed {
        reservation: Model {
            id: key,
            event_id,
            user_id,
            status: ReservationStatus::Going,
            created_at: now,
        },
        remaining_tickets: event.remaining_tickets,
    })
}

// Constraint name created by the reservations migration.
const USER_FOREIGN_KEY: &str = "reservations_user_id_fkey";

/// The row a reservation insert pointed at that no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MissingParent {
    Event,
    User,
}

fn missing_parent(sql_err: Option<SqlErr>) -> Option<MissingParent> {
    match sql_err {
        Some(SqlErr::ForeignKeyConstraintViolation(message)) => {
            // The table has exactly two foreign keys.
            if message.contains(USER_FOREIGN_KEY) {
                Some(MissingParent::User)
            } else {
                Some(MissingParent::Event)
            }
        }
        _ => None,
    }
}

/// Writes an `interested` record when the pair has no record yet. An existing
/// record of either status is returned untouched.
pub async fn record_interest(
    db: &impl ConnectionTrait,
    event_id: Id,
    user_id: Id,
    now: DateTimeWithTimeZone,
) -> Result<Model, Error> {
    let record = ActiveModel {
        id: Set(reservations::key(event_id, user_id)),
        event_id: Set(event_id),
        user_id: Set(user_id),
        status: Set(ReservationStatus::Interested),
        created_at: Set(now),
    };

    Entity::insert(record)
        .on_conflict(OnConflict::column(Column::Id).do_nothing().to_owned())
        .exec_without_returning(db)
        .await?;

    find_by_key(db, event_id, user_id)
        .await?
        .ok_or_else(Error::not_found)
}
