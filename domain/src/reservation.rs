//! The reservation engine: claims a ticket for a user without overselling
//! and without booking anyone twice.
//!
//! Free events are committed straight away. Paid events hand the payer to
//! the payment gateway and are committed later, when the signed settlement
//! webhook arrives, through the same atomic commit.

use crate::catalog::{Catalog, Commit, Ledger};
use crate::error::{Error, ReservationErrorKind};
use crate::gateway::PaymentGateway;
use crate::reservation_status::ReservationStatus;
use crate::{events, reservations, Id};
use chrono::{DateTime, Utc};
use ::events::{DomainEvent, EventPublisher};
use log::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReservationOutcome {
    /// A new `going` record was written and one ticket taken.
    Confirmed { reservation: reservations::Model },
    /// The user already holds a spot. Nothing changed.
    AlreadyReserved { reservation: reservations::Model },
    /// Paid event: send the user to this hosted payment page.
    RedirectRequired { url: String },
}

/// Payment settled for (event, user), as reported by the payment webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PaymentConfirmation {
    pub event_id: Id,
    pub user_id: Id,
}

#[derive(Clone)]
pub struct ReservationEngine {
    catalog: Arc<dyn Catalog>,
    ledger: Arc<dyn Ledger>,
    gateway: Arc<dyn PaymentGateway>,
    publisher: EventPublisher,
}

/// Whether `event` still takes reservations at `now`.
pub fn is_reservable(event: &events::Model, now: DateTime<Utc>) -> bool {
    event.is_active && event.date.with_timezone(&Utc) > now
}

impl ReservationEngine {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        ledger: Arc<dyn Ledger>,
        gateway: Arc<dyn PaymentGateway>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            catalog,
            ledger,
            gateway,
            publisher,
        }
    }

    /// Reserves a spot at `event` for `user_id`.
    ///
    /// Every error returned carries a `ReservationErrorKind`.
    pub async fn attempt_reservation(
        &self,
        event: &events::Model,
        user_id: Option<Id>,
    ) -> Result<ReservationOutcome, Error> {
        let user_id = user_id
            .ok_or_else(|| Error::reservation(ReservationErrorKind::AuthenticationRequired))?;

        self.reserve(event, user_id)
            .await
            .map_err(Error::into_reservation_error)
    }

    async fn reserve(
        &self,
        event: &events::Model,
        user_id: Id,
    ) -> Result<ReservationOutcome, Error> {
        let now = Utc::now();

        if !is_reservable(event, now) {
            debug!("Event {} is not taking reservations", event.id);
            return Err(Error::reservation(ReservationErrorKind::EventNotReservable));
        }

        if let Some(existing) = self.ledger.find(event.id, user_id).await? {
            if existing.status == ReservationStatus::Going {
                return Ok(ReservationOutcome::AlreadyReserved {
                    reservation: existing,
                });
            }
        }

        if event.is_free() {
            return self.commit(event.id, user_id, now).await;
        }

        if event.is_sold_out() {
            return Err(Error::reservation(ReservationErrorKind::SoldOut));
        }

        let session = self
            .gateway
            .create_checkout_session(event, user_id)
            .await
            .map_err(|err| {
                warn!("Checkout session for event {} failed: {err}", event.id);
                Error {
                    source: Some(Box::new(err)),
                    error_kind: crate::error::DomainErrorKind::Reservation(
                        ReservationErrorKind::Gateway,
                    ),
                }
            })?;

        info!(
            "Redirecting user {user_id} to checkout session {} for event {}",
            session.id, event.id
        );
        Ok(ReservationOutcome::RedirectRequired { url: session.url })
    }

    /// Records a settled payment. Applying the same confirmation again is a
    /// no-op that reports `AlreadyReserved`.
    pub async fn confirm_payment(
        &self,
        confirmation: PaymentConfirmation,
    ) -> Result<ReservationOutcome, Error> {
        let PaymentConfirmation { event_id, user_id } = confirmation;

        let result = async {
            let event = self
                .catalog
                .find_event(event_id)
                .await?
                .ok_or_else(|| Error::reservation(ReservationErrorKind::EventNotReservable))?;

            self.commit(event.id, user_id, Utc::now()).await
        }
        .await;

        result.map_err(Error::into_reservation_error)
    }

    /// Marks `user_id` as interested in `event`. Never takes a ticket and
    /// never downgrades an existing `going` record.
    pub async fn express_interest(
        &self,
        event: &events::Model,
        user_id: Option<Id>,
    ) -> Result<reservations::Model, Error> {
        let user_id = user_id
            .ok_or_else(|| Error::reservation(ReservationErrorKind::AuthenticationRequired))?;
        let now = Utc::now();

        if !is_reservable(event, now) {
            return Err(Error::reservation(ReservationErrorKind::EventNotReservable));
        }

        self.ledger
            .record_interest(event.id, user_id, now)
            .await
            .map_err(Error::into_reservation_error)
    }

    pub async fn find_reservation(
        &self,
        event_id: Id,
        user_id: Id,
    ) -> Result<Option<reservations::Model>, Error> {
        self.ledger
            .find(event_id, user_id)
            .await
            .map_err(Error::into_reservation_error)
    }

    /// Events `user_id` holds a `going` record for, soonest first. Records
    /// whose event has since been removed are skipped.
    pub async fn attending(&self, user_id: Id) -> Result<Vec<events::Model>, Error> {
        let mut attending = Vec::new();

        for record in self.ledger.find_by_user(user_id).await? {
            if record.status != ReservationStatus::Going {
                continue;
            }
            if let Some(event) = self.catalog.find_event(record.event_id).await? {
                attending.push(event);
            }
        }

        attending.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        Ok(attending)
    }

    async fn commit(
        &self,
        event_id: Id,
        user_id: Id,
        now: DateTime<Utc>,
    ) -> Result<ReservationOutcome, Error> {
        match self.ledger.commit(event_id, user_id, now).await? {
            Commit::Committed {
                reservation,
                remaining_tickets,
            } => {
                self.publisher
                    .publish(DomainEvent::InventoryChanged {
                        event_id,
                        remaining_tickets,
                    })
                    .await;
                Ok(ReservationOutcome::Confirmed { reservation })
            }
            Commit::AlreadyReserved(reservation) => {
                Ok(ReservationOutcome::AlreadyReserved { reservation })
            }
            Commit::SoldOut => Err(Error::reservation(ReservationErrorKind::SoldOut)),
            Commit::EventUnavailable => Err(Error::reservation(
                ReservationErrorKind::EventNotReservable,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::in_memory::InMemoryStore;
    use crate::error::{DomainErrorKind, ExternalErrorKind};
    use crate::gateway::CheckoutSession;
    use ::events::EventHandler;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeGateway {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeGateway {
        fn working() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn broken() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn create_checkout_session(
            &self,
            event: &events::Model,
            _user_id: Id,
        ) -> Result<CheckoutSession, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error {
                    source: None,
                    error_kind: DomainErrorKind::External(ExternalErrorKind::Network),
                });
            }
            Ok(CheckoutSession {
                id: "cs_test".to_string(),
                url: format!("https://pay.test/{}", event.id),
            })
        }
    }

    #[derive(Default)]
    struct InventoryRecorder {
        seen: Mutex<Vec<(Id, i32)>>,
    }

    #[async_trait]
    impl EventHandler for InventoryRecorder {
        async fn handle(&self, event: &DomainEvent) {
            if let DomainEvent::InventoryChanged {
                event_id,
                remaining_tickets,
            } = event
            {
                self.seen.lock().unwrap().push((*event_id, *remaining_tickets));
            }
        }
    }

    fn event(price: f64, total_tickets: i32, remaining_tickets: i32) -> events::Model {
        let now = Utc::now();
        events::Model {
            id: Id::new_v4(),
            host_id: Id::new_v4(),
            title: "Porch concert".to_string(),
            description: "Acoustic sets on three porches".to_string(),
            location_name: "Maple Avenue".to_string(),
            latitude: 45.0,
            longitude: -122.0,
            image_url: None,
            date: (now + Duration::days(1)).into(),
            price,
            total_tickets,
            remaining_tickets,
            average_rating: 0.0,
            review_count: 0,
            is_active: true,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    fn engine_with(
        store: &Arc<InMemoryStore>,
        gateway: Arc<FakeGateway>,
    ) -> ReservationEngine {
        ReservationEngine::new(
            store.clone(),
            store.clone(),
            gateway,
            EventPublisher::default(),
        )
    }

    fn going_records(store: &InMemoryStore, event_id: Id) -> usize {
        store
            .reservations()
            .iter()
            .filter(|r| r.event_id == event_id && r.status == ReservationStatus::Going)
            .count()
    }

    fn kind(result: Result<ReservationOutcome, Error>) -> Option<ReservationErrorKind> {
        result.err().and_then(|err| err.reservation_kind())
    }

    #[tokio::test]
    async fn reservations_require_a_signed_in_user() {
        let free = event(0.0, 10, 10);
        let store = Arc::new(InMemoryStore::with_events([free.clone()]));
        let engine = engine_with(&store, FakeGateway::working());

        assert_eq!(
            kind(engine.attempt_reservation(&free, None).await),
            Some(ReservationErrorKind::AuthenticationRequired)
        );
        assert!(store.reservations().is_empty());
    }

    #[tokio::test]
    async fn inactive_and_past_events_are_not_reservable() {
        let inactive = events::Model {
            is_active: false,
            ..event(0.0, 10, 10)
        };
        let past = events::Model {
            date: (Utc::now() - Duration::hours(1)).into(),
            ..event(0.0, 10, 10)
        };
        let store = Arc::new(InMemoryStore::with_events([inactive.clone(), past.clone()]));
        let engine = engine_with(&store, FakeGateway::working());

        for snapshot in [&inactive, &past] {
            assert_eq!(
                kind(engine.attempt_reservation(snapshot, Some(Id::new_v4())).await),
                Some(ReservationErrorKind::EventNotReservable)
            );
        }
        assert!(store.reservations().is_empty());
    }

    #[tokio::test]
    async fn same_user_twice_books_once_and_decrements_once() {
        let free = event(0.0, 10, 10);
        let store = Arc::new(InMemoryStore::with_events([free.clone()]));
        let engine = engine_with(&store, FakeGateway::working());
        let user_id = Id::new_v4();

        let first = engine.attempt_reservation(&free, Some(user_id)).await.unwrap();
        let second = engine.attempt_reservation(&free, Some(user_id)).await.unwrap();

        assert!(matches!(first, ReservationOutcome::Confirmed { .. }));
        assert!(matches!(second, ReservationOutcome::AlreadyReserved { .. }));
        assert_eq!(going_records(&store, free.id), 1);
        assert_eq!(store.event(free.id).unwrap().remaining_tickets, 9);
    }

    #[tokio::test]
    async fn stale_snapshots_still_cannot_book_twice() {
        let free = event(0.0, 10, 10);
        let store = Arc::new(InMemoryStore::with_events([free.clone()]));
        let engine = engine_with(&store, FakeGateway::working());
        let user_id = Id::new_v4();

        engine.attempt_reservation(&free, Some(user_id)).await.unwrap();
        // Skip the pre-check and go straight at the commit.
        let again = engine.commit(free.id, user_id, Utc::now()).await.unwrap();

        assert!(matches!(again, ReservationOutcome::AlreadyReserved { .. }));
        assert_eq!(store.event(free.id).unwrap().remaining_tickets, 9);
    }

    #[tokio::test]
    async fn confirmed_reservations_conserve_inventory() {
        let free = event(0.0, 12, 12);
        let store = Arc::new(InMemoryStore::with_events([free.clone()]));
        let engine = engine_with(&store, FakeGateway::working());

        for _ in 0..5 {
            engine
                .attempt_reservation(&free, Some(Id::new_v4()))
                .await
                .unwrap();
        }

        assert_eq!(store.event(free.id).unwrap().remaining_tickets, 12 - 5);
        assert_eq!(going_records(&store, free.id), 5);
    }

    #[tokio::test]
    async fn last_ticket_goes_to_exactly_one_of_two_concurrent_users() {
        let free = event(0.0, 1, 1);
        let store = Arc::new(InMemoryStore::with_events([free.clone()]));
        let engine = engine_with(&store, FakeGateway::working());

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let engine = engine.clone();
                let free = free.clone();
                tokio::spawn(async move {
                    engine.attempt_reservation(&free, Some(Id::new_v4())).await
                })
            })
            .collect();

        let mut confirmed = 0;
        let mut sold_out = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(ReservationOutcome::Confirmed { .. }) => confirmed += 1,
                Err(err) if err.reservation_kind() == Some(ReservationErrorKind::SoldOut) => {
                    sold_out += 1
                }
                other => panic!("unexpected outcome {other:?}"),
            }
        }

        assert_eq!((confirmed, sold_out), (1, 1));
        assert_eq!(store.event(free.id).unwrap().remaining_tickets, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_attempts_never_oversell() {
        let free = event(0.0, 10, 10);
        let store = Arc::new(InMemoryStore::with_events([free.clone()]));
        let engine = engine_with(&store, FakeGateway::working());

        let handles: Vec<_> = (0..25)
            .map(|_| {
                let engine = engine.clone();
                let free = free.clone();
                tokio::spawn(async move {
                    engine.attempt_reservation(&free, Some(Id::new_v4())).await
                })
            })
            .collect();

        let mut confirmed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(ReservationOutcome::Confirmed { .. }) => confirmed += 1,
                Err(err) => assert_eq!(err.reservation_kind(), Some(ReservationErrorKind::SoldOut)),
                Ok(other) => panic!("unexpected outcome {other:?}"),
            }
        }

        assert_eq!(confirmed, 10);
        assert_eq!(going_records(&store, free.id), 10);
        assert_eq!(store.event(free.id).unwrap().remaining_tickets, 0);
    }

    #[tokio::test]
    async fn paid_events_redirect_without_touching_inventory() {
        let paid = event(25.0, 5, 5);
        let store = Arc::new(InMemoryStore::with_events([paid.clone()]));
        let gateway = FakeGateway::working();
        let engine = engine_with(&store, gateway.clone());

        let outcome = engine
            .attempt_reservation(&paid, Some(Id::new_v4()))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReservationOutcome::RedirectRequired {
                url: format!("https://pay.test/{}", paid.id)
            }
        );
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.event(paid.id).unwrap().remaining_tickets, 5);
        assert!(store.reservations().is_empty());
    }

    #[tokio::test]
    async fn sold_out_paid_events_never_reach_the_gateway() {
        let paid = event(25.0, 5, 0);
        let store = Arc::new(InMemoryStore::with_events([paid.clone()]));
        let gateway = FakeGateway::working();
        let engine = engine_with(&store, gateway.clone());

        assert_eq!(
            kind(engine.attempt_reservation(&paid, Some(Id::new_v4())).await),
            Some(ReservationErrorKind::SoldOut)
        );
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn gateway_failures_surface_as_gateway_errors() {
        let paid = event(25.0, 5, 5);
        let store = Arc::new(InMemoryStore::with_events([paid.clone()]));
        let engine = engine_with(&store, FakeGateway::broken());

        assert_eq!(
            kind(engine.attempt_reservation(&paid, Some(Id::new_v4())).await),
            Some(ReservationErrorKind::Gateway)
        );
        assert!(store.reservations().is_empty());
    }

    #[tokio::test]
    async fn storage_failures_surface_as_storage_errors() {
        let free = event(0.0, 5, 5);
        let store = Arc::new(InMemoryStore::with_events([free.clone()]));
        store.fail_writes();
        let engine = engine_with(&store, FakeGateway::working());

        assert_eq!(
            kind(engine.attempt_reservation(&free, Some(Id::new_v4())).await),
            Some(ReservationErrorKind::Storage)
        );
        assert_eq!(store.event(free.id).unwrap().remaining_tickets, 5);
    }

    #[tokio::test]
    async fn payment_confirmation_commits_once() {
        let paid = event(25.0, 5, 5);
        let store = Arc::new(InMemoryStore::with_events([paid.clone()]));
        let engine = engine_with(&store, FakeGateway::working());
        let confirmation = PaymentConfirmation {
            event_id: paid.id,
            user_id: Id::new_v4(),
        };

        let first = engine.confirm_payment(confirmation).await.unwrap();
        let replay = engine.confirm_payment(confirmation).await.unwrap();

        assert!(matches!(first, ReservationOutcome::Confirmed { .. }));
        assert!(matches!(replay, ReservationOutcome::AlreadyReserved { .. }));
        assert_eq!(store.event(paid.id).unwrap().remaining_tickets, 4);
        assert_eq!(going_records(&store, paid.id), 1);
    }

    #[tokio::test]
    async fn payment_confirmation_for_a_sold_out_event_writes_nothing() {
        let paid = event(25.0, 5, 0);
        let store = Arc::new(InMemoryStore::with_events([paid.clone()]));
        let engine = engine_with(&store, FakeGateway::working());

        let result = engine
            .confirm_payment(PaymentConfirmation {
                event_id: paid.id,
                user_id: Id::new_v4(),
            })
            .await;

        assert_eq!(kind(result), Some(ReservationErrorKind::SoldOut));
        assert!(store.reservations().is_empty());
    }

    #[tokio::test]
    async fn payment_confirmation_for_an_unknown_event_is_not_reservable() {
        let store = Arc::new(InMemoryStore::new());
        let engine = engine_with(&store, FakeGateway::working());

        let result = engine
            .confirm_payment(PaymentConfirmation {
                event_id: Id::new_v4(),
                user_id: Id::new_v4(),
            })
            .await;

        assert_eq!(kind(result), Some(ReservationErrorKind::EventNotReservable));
    }

    #[tokio::test]
    async fn interest_is_upgraded_by_a_reservation_but_never_downgrades_one() {
        let free = event(0.0, 3, 3);
        let store = Arc::new(InMemoryStore::with_events([free.clone()]));
        let engine = engine_with(&store, FakeGateway::working());
        let user_id = Id::new_v4();

        let interested = engine.express_interest(&free, Some(user_id)).await.unwrap();
        assert_eq!(interested.status, ReservationStatus::Interested);
        assert_eq!(store.event(free.id).unwrap().remaining_tickets, 3);

        let outcome = engine.attempt_reservation(&free, Some(user_id)).await.unwrap();
        assert!(matches!(outcome, ReservationOutcome::Confirmed { .. }));
        assert_eq!(store.event(free.id).unwrap().remaining_tickets, 2);

        let after = engine.express_interest(&free, Some(user_id)).await.unwrap();
        assert_eq!(after.status, ReservationStatus::Going);
        assert_eq!(
            engine.find_reservation(free.id, user_id).await.unwrap().map(|r| r.status),
            Some(ReservationStatus::Going)
        );
    }

    #[tokio::test]
    async fn confirmed_reservations_publish_the_new_inventory() {
        let free = event(0.0, 4, 4);
        let store = Arc::new(InMemoryStore::with_events([free.clone()]));
        let recorder = Arc::new(InventoryRecorder::default());
        let engine = ReservationEngine::new(
            store.clone(),
            store.clone(),
            FakeGateway::working(),
            EventPublisher::new().with_handler(recorder.clone()),
        );
        let user_id = Id::new_v4();

        engine.attempt_reservation(&free, Some(user_id)).await.unwrap();
        engine.attempt_reservation(&free, Some(user_id)).await.unwrap();

        assert_eq!(*recorder.seen.lock().unwrap(), vec![(free.id, 3)]);
    }

    #[tokio::test]
    async fn attending_lists_going_events_soonest_first() {
        let later = events::Model {
            date: (Utc::now() + Duration::days(6)).into(),
            ..event(0.0, 4, 4)
        };
        let sooner = event(0.0, 4, 4);
        let only_interested = event(0.0, 4, 4);
        let store = Arc::new(InMemoryStore::with_events([
            later.clone(),
            sooner.clone(),
            only_interested.clone(),
        ]));
        let engine = engine_with(&store, FakeGateway::working());
        let user_id = Id::new_v4();

        engine.attempt_reservation(&later, Some(user_id)).await.unwrap();
        engine.attempt_reservation(&sooner, Some(user_id)).await.unwrap();
        engine
            .express_interest(&only_interested, Some(user_id))
            .await
            .unwrap();

        let attending: Vec<Id> = engine
            .attending(user_id)
            .await
            .unwrap()
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(attending, vec![sooner.id, later.id]);
    }
}
