//! Which events a listing shows, and in what order.

use crate::catalog::Catalog;
use crate::error::Error;
use crate::events;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use log::*;
use serde::Deserialize;
use utoipa::ToSchema;

/// Date window a listing is restricted to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    #[default]
    All,
    Today,
    ThisWeek,
}

/// Bounds of one listing evaluation, fixed at `now`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    start_of_today: DateTime<Utc>,
    start_of_tomorrow: DateTime<Utc>,
    week_end: DateTime<Utc>,
}

impl Bounds {
    pub fn new(now: DateTime<Utc>, tz: Tz) -> Self {
        let today = now.with_timezone(&tz).date_naive();
        let tomorrow = today.succ_opt().unwrap_or(today);

        Self {
            start_of_today: local_midnight(tz, today),
            start_of_tomorrow: local_midnight(tz, tomorrow),
            week_end: now + Duration::days(7),
        }
    }

    /// Whether `event` belongs in a listing for `window`.
    pub fn admits(&self, window: Window, event: &events::Model) -> bool {
        let date = event.date.with_timezone(&Utc);

        if !event.is_active || date < self.start_of_today {
            return false;
        }

        match window {
            Window::All => true,
            Window::Today => date < self.start_of_tomorrow,
            Window::ThisWeek => date <= self.week_end,
        }
    }
}

/// A listing over one catalog snapshot. Iterating is lazy and can be
/// repeated; each request builds a fresh `Listing`.
pub struct Listing {
    events: Vec<events::Model>,
    window: Window,
    bounds: Bounds,
}

impl Listing {
    pub fn new(events: Vec<events::Model>, window: Window, bounds: Bounds) -> Self {
        Self {
            events,
            window,
            bounds,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &events::Model> + '_ {
        self.events
            .iter()
            .filter(move |event| self.bounds.admits(self.window, event))
    }
}

/// Reads active events ordered by date. When the ordered read fails, reads
/// them unordered and sorts in process instead.
pub async fn snapshot(catalog: &dyn Catalog) -> Result<Vec<events::Model>, Error> {
    match catalog.active_events_ordered().await {
        Ok(events) => Ok(events),
        Err(err) => {
            warn!("Ordered event read failed, sorting in process instead: {err}");
            let mut events = catalog.active_events().await?;
            events.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
            Ok(events)
        }
    }
}

pub async fn list(
    catalog: &dyn Catalog,
    window: Window,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<Listing, Error> {
    let events = snapshot(catalog).await?;
    debug!("Listing {} active event(s) for window {window:?}", events.len());
    Ok(Listing::new(events, window, Bounds::new(now, tz)))
}

fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // Midnight skipped by a DST change; the day starts an hour later.
        None => tz
            .from_local_datetime(&(midnight + Duration::hours(1)))
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| midnight.and_utc()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::in_memory::InMemoryStore;
    use crate::Id;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn event_on(date: DateTime<Utc>) -> events::Model {
        events::Model {
            id: Id::new_v4(),
            host_id: Id::new_v4(),
            title: "Street food fair".to_string(),
            description: "Twenty stalls and a live band".to_string(),
            location_name: "Market Street".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            image_url: None,
            date: date.into(),
            price: 0.0,
            total_tickets: 10,
            remaining_tickets: 10,
            average_rating: 0.0,
            review_count: 0,
            is_active: true,
            created_at: date.into(),
            updated_at: date.into(),
        }
    }

    #[test]
    fn events_earlier_today_stay_but_yesterday_goes() {
        let now = at("2026-05-12T15:00:00Z");
        let bounds = Bounds::new(now, chrono_tz::UTC);

        assert!(bounds.admits(Window::All, &event_on(at("2026-05-12T08:00:00Z"))));
        assert!(!bounds.admits(Window::All, &event_on(at("2026-05-11T23:59:59Z"))));
    }

    #[test]
    fn inactive_events_are_never_listed() {
        let now = at("2026-05-12T15:00:00Z");
        let inactive = events::Model {
            is_active: false,
            ..event_on(at("2026-05-13T10:00:00Z"))
        };

        assert!(!Bounds::new(now, chrono_tz::UTC).admits(Window::All, &inactive));
    }

    #[test]
    fn today_ends_at_local_midnight() {
        let now = at("2026-05-12T15:00:00Z");
        let bounds = Bounds::new(now, chrono_tz::UTC);

        assert!(bounds.admits(Window::Today, &event_on(at("2026-05-12T23:30:00Z"))));
        assert!(!bounds.admits(Window::Today, &event_on(at("2026-05-13T00:30:00Z"))));
    }

    #[test]
    fn today_follows_the_listing_time_zone() {
        // 22:00 UTC on the 12th is already the 13th in Berlin.
        let now = at("2026-05-12T22:30:00Z");
        let bounds = Bounds::new(now, chrono_tz::Europe::Berlin);

        assert!(bounds.admits(Window::Today, &event_on(at("2026-05-13T10:00:00Z"))));
        assert!(!bounds.admits(Window::All, &event_on(at("2026-05-12T21:00:00Z"))));
    }

    #[test]
    fn this_week_reaches_seven_days_ahead() {
        let now = at("2026-05-12T12:00:00Z");
        let bounds = Bounds::new(now, chrono_tz::UTC);

        assert!(bounds.admits(Window::ThisWeek, &event_on(at("2026-05-19T12:00:00Z"))));
        assert!(!bounds.admits(Window::ThisWeek, &event_on(at("2026-05-19T12:00:01Z"))));
    }

    #[tokio::test]
    async fn list_orders_by_date_and_can_be_iterated_twice() {
        let now = Utc::now();
        let later = event_on(now + Duration::days(3));
        let sooner = event_on(now + Duration::hours(2));
        let store = InMemoryStore::with_events([later.clone(), sooner.clone()]);

        let listing = list(&store, Window::All, now, chrono_tz::UTC).await.unwrap();

        let first: Vec<Id> = listing.iter().map(|e| e.id).collect();
        let second: Vec<Id> = listing.iter().map(|e| e.id).collect();
        assert_eq!(first, vec![sooner.id, later.id]);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn snapshot_falls_back_to_an_in_process_sort() {
        let now = Utc::now();
        let events: Vec<events::Model> = (1..=5)
            .rev()
            .map(|days| event_on(now + Duration::days(days)))
            .collect();
        let store = InMemoryStore::with_events(events);
        store.fail_ordered_reads();

        let snapshot = snapshot(&store).await.unwrap();

        assert_eq!(snapshot.len(), 5);
        assert!(snapshot.windows(2).all(|pair| pair[0].date <= pair[1].date));
    }
}
