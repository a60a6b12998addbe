//! Storage seams for the event catalog and the reservation ledger.
//!
//! The reserve-and-decrement commit touches both, so one store type
//! implements both traits and keeps that commit atomic.

use crate::error::Error;
use crate::{events, reservations, Id};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity_api::{event, reservation};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub use entity_api::reservation::Commit;

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn find_event(&self, id: Id) -> Result<Option<events::Model>, Error>;

    /// Active events, ordered by date then id.
    async fn active_events_ordered(&self) -> Result<Vec<events::Model>, Error>;

    /// Active events in no particular order.
    async fn active_events(&self) -> Result<Vec<events::Model>, Error>;

    /// Every event including inactive ones, newest date first.
    async fn all_events(&self) -> Result<Vec<events::Model>, Error>;

    async fn events_by_host(&self, host_id: Id) -> Result<Vec<events::Model>, Error>;

    async fn insert_event(&self, event: events::Model, host_id: Id)
        -> Result<events::Model, Error>;

    async fn delete_event(&self, id: Id) -> Result<(), Error>;
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn find(&self, event_id: Id, user_id: Id)
        -> Result<Option<reservations::Model>, Error>;

    async fn find_by_user(&self, user_id: Id) -> Result<Vec<reservations::Model>, Error>;

    /// Writes a `going` record and takes one ticket, both or neither.
    async fn commit(&self, event_id: Id, user_id: Id, now: DateTime<Utc>)
        -> Result<Commit, Error>;

    /// Writes an `interested` record unless the pair already has one.
    async fn record_interest(
        &self,
        event_id: Id,
        user_id: Id,
        now: DateTime<Utc>,
    ) -> Result<reservations::Model, Error>;
}

/// PostgreSQL-backed catalog and ledger.
#[derive(Clone)]
pub struct SeaOrmStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmStore {
    pub fn new(db: &Arc<DatabaseConnection>) -> Self {
        Self { db: Arc::clone(db) }
    }
}

#[async_trait]
impl Catalog for SeaOrmStore {
    async fn find_event(&self, id: Id) -> Result<Option<events::Model>, Error> {
        match event::find_by_id(self.db.as_ref(), id).await {
            Ok(event) => Ok(Some(event)),
            Err(err) if err.error_kind == entity_api::error::EntityApiErrorKind::RecordNotFound => {
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn active_events_ordered(&self) -> Result<Vec<events::Model>, Error> {
        Ok(event::find_active_ordered(self.db.as_ref()).await?)
    }

    async fn active_events(&self) -> Result<Vec<events::Model>, Error> {
        Ok(event::find_active(self.db.as_ref()).await?)
    }

    async fn all_events(&self) -> Result<Vec<events::Model>, Error> {
        Ok(event::find_all(self.db.as_ref()).await?)
    }

    async fn events_by_host(&self, host_id: Id) -> Result<Vec<events::Model>, Error> {
        Ok(event::find_by_host(self.db.as_ref(), host_id).await?)
    }

    async fn insert_event(
        &self,
        event: events::Model,
        host_id: Id,
    ) -> Result<events::Model, Error> {
        Ok(event::create(self.db.as_ref(), event, host_id).await?)
    }

    async fn delete_event(&self, id: Id) -> Result<(), Error> {
        Ok(event::delete_by_id(self.db.as_ref(), id).await?)
    }
}

#[async_trait]
impl Ledger for SeaOrmStore {
    async fn find(
        &self,
        event_id: Id,
        user_id: Id,
    ) -> Result<Option<reservations::Model>, Error> {
        Ok(reservation::find_by_key(self.db.as_ref(), event_id, user_id).await?)
    }

    async fn find_by_user(&self, user_id: Id) -> Result<Vec<reservations::Model>, Error> {
        Ok(reservation::find_by_user(self.db.as_ref(), user_id).await?)
    }

    async fn commit(
        &self,
        event_id: Id,
        user_id: Id,
        now: DateTime<Utc>,
    ) -> Result<Commit, Error> {
        Ok(reservation::confirm(self.db.as_ref(), event_id, user_id, now.into()).await?)
    }

    async fn record_interest(
        &self,
        event_id: Id,
        user_id: Id,
        now: DateTime<Utc>,
    ) -> Result<reservations::Model, Error> {
        Ok(reservation::record_interest(self.db.as_ref(), event_id, user_id, now.into()).await?)
    }
}

/// A process-local catalog and ledger for tests. One lock guards both maps,
/// so `commit` is atomic exactly like the database transaction.
#[cfg(any(test, feature = "mock"))]
pub mod in_memory {
    use super::*;
    use crate::reservation_status::ReservationStatus;
    use crate::error::{DomainErrorKind, InternalErrorKind};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct State {
        events: HashMap<Id, events::Model>,
        reservations: HashMap<String, reservations::Model>,
    }

    #[derive(Default)]
    pub struct InMemoryStore {
        state: Mutex<State>,
        fail_ordered_reads: AtomicBool,
        fail_writes: AtomicBool,
    }

    impl InMemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_events(events: impl IntoIterator<Item = events::Model>) -> Self {
            let store = Self::new();
            {
                let mut state = store.lock();
                for event in events {
                    state.events.insert(event.id, event);
                }
            }
            store
        }

        /// Makes `active_events_ordered` fail, as a backend without sort support would.
        pub fn fail_ordered_reads(&self) {
            self.fail_ordered_reads.store(true, Ordering::SeqCst);
        }

        /// Makes every ledger write fail with a storage error.
        pub fn fail_writes(&self) {
            self.fail_writes.store(true, Ordering::SeqCst);
        }

        pub fn event(&self, id: Id) -> Option<events::Model> {
            self.lock().events.get(&id).cloned()
        }

        pub fn reservations(&self) -> Vec<reservations::Model> {
            self.lock().reservations.values().cloned().collect()
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, State> {
            // A panicking test thread must not hide the state from the others.
            self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }

        fn storage_error() -> Error {
            Error {
                source: None,
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                    "in-memory store unavailable".to_string(),
                )),
            }
        }

        fn check_writes(&self) -> Result<(), Error> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Self::storage_error());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Catalog for InMemoryStore {
        async fn find_event(&self, id: Id) -> Result<Option<events::Model>, Error> {
            Ok(self.event(id))
        }

        async fn active_events_ordered(&self) -> Result<Vec<events::Model>, Error> {
            if self.fail_ordered_reads.load(Ordering::SeqCst) {
                return Err(Self::storage_error());
            }
            let mut events = self.active_events().await?;
            events.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
            Ok(events)
        }

        async fn active_events(&self) -> Result<Vec<events::Model>, Error> {
            Ok(self
                .lock()
                .events
                .values()
                .filter(|event| event.is_active)
                .cloned()
                .collect())
        }

        async fn all_events(&self) -> Result<Vec<events::Model>, Error> {
            let mut events: Vec<events::Model> = self.lock().events.values().cloned().collect();
            events.sort_by(|a, b| b.date.cmp(&a.date).then(a.id.cmp(&b.id)));
            Ok(events)
        }

        async fn events_by_host(&self, host_id: Id) -> Result<Vec<events::Model>, Error> {
            let mut events: Vec<events::Model> = self
                .lock()
                .events
                .values()
                .filter(|event| event.host_id == host_id)
                .cloned()
                .collect();
            events.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
            Ok(events)
        }

        async fn insert_event(
            &self,
            event: events::Model,
            host_id: Id,
        ) -> Result<events::Model, Error> {
            self.check_writes()?;
            let now = Utc::now();
            let stored = events::Model {
                id: Id::new_v4(),
                host_id,
                remaining_tickets: event.total_tickets,
                average_rating: 0.0,
                review_count: 0,
                is_active: true,
                created_at: now.into(),
                updated_at: now.into(),
                ..event
            };
            self.lock().events.insert(stored.id, stored.clone());
            Ok(stored)
        }

        async fn delete_event(&self, id: Id) -> Result<(), Error> {
            self.check_writes()?;
            let mut state = self.lock();
            match state.events.remove(&id) {
                Some(_) => {
                    state.reservations.retain(|_, r| r.event_id != id);
                    Ok(())
                }
                None => Err(Error::not_found()),
            }
        }
    }

    #[async_trait]
    impl Ledger for InMemoryStore {
        async fn find(
            &self,
            event_id: Id,
            user_id: Id,
        ) -> Result<Option<reservations::Model>, Error> {
            Ok(self
                .lock()
                .reservations
                .get(&reservations::key(event_id, user_id))
                .cloned())
        }

        async fn find_by_user(&self, user_id: Id) -> Result<Vec<reservations::Model>, Error> {
            let mut records: Vec<reservations::Model> = self
                .lock()
                .reservations
                .values()
                .filter(|r| r.user_id == user_id)
                .cloned()
                .collect();
            records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(records)
        }

        async fn commit(
            &self,
            event_id: Id,
            user_id: Id,
            now: DateTime<Utc>,
        ) -> Result<Commit, Error> {
            self.check_writes()?;
            let key = reservations::key(event_id, user_id);
            let mut state = self.lock();

            if let Some(existing) = state.reservations.get(&key) {
                if existing.status == ReservationStatus::Going {
                    return Ok(Commit::AlreadyReserved(existing.clone()));
                }
            }

            let Some(event) = state.events.get_mut(&event_id) else {
                return Ok(Commit::EventUnavailable);
            };
            if !event.is_active || event.date <= now {
                return Ok(Commit::EventUnavailable);
            }
            if event.remaining_tickets <= 0 {
                return Ok(Commit::SoldOut);
            }

            event.remaining_tickets -= 1;
            event.updated_at = now.into();
            let remaining_tickets = event.remaining_tickets;

            let reservation = reservations::Model {
                id: key.clone(),
                event_id,
                user_id,
                status: ReservationStatus::Going,
                created_at: now.into(),
            };
            state.reservations.insert(key, reservation.clone());

            Ok(Commit::Committed {
                reservation,
                remaining_tickets,
            })
        }

        async fn record_interest(
            &self,
            event_id: Id,
            user_id: Id,
            now: DateTime<Utc>,
        ) -> Result<reservations::Model, Error> {
            self.check_writes()?;
            let key = reservations::key(event_id, user_id);
            let mut state = self.lock();

            Ok(state
                .reservations
                .entry(key.clone())
                .or_insert_with(|| reservations::Model {
                    id: key,
                    event_id,
                    user_id,
                    status: ReservationStatus::Interested,
                    created_at: now.into(),
                })
                .clone())
        }
    }
}
