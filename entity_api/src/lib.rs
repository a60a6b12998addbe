use chrono::{Duration, Utc};
use password_auth::generate_hash;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set, Value};
use std::collections::HashMap;

pub use entity::{events, reservation_status, reservations, roles, users, Id};

pub mod error;
pub mod event;
pub mod query;
pub mod reservation;
pub mod user;

/// `QueryFilterMap` is a data structure that serves as a bridge for translating filter parameters
/// between different layers of the application. It is essentially a wrapper around a `HashMap`
/// where the keys are filter parameter names (as `String`) and the values are optional `Value` types
/// from `sea_orm`.
///
/// This structure is particularly useful in scenarios where you need to pass filter parameters
/// from a web request down to the database query layer in a type-safe and organized manner.
///
/// # Example
///
/// ```
/// use sea_orm::Value;
/// use entity_api::QueryFilterMap;
///
/// let mut query_filter_map = QueryFilterMap::new();
/// query_filter_map.insert("host_id".to_string(), Some(Value::String(Some(Box::new("a_host_id".to_string())))));
/// let filter_value = query_filter_map.get("host_id");
/// ```
pub struct QueryFilterMap {
    map: HashMap<String, Option<Value>>,
}

impl QueryFilterMap {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        // HashMap.get returns an Option and so we need to "flatten" this to a single Option
        self.map
            .get(key)
            .and_then(|inner_option| inner_option.clone())
    }

    pub fn insert(&mut self, key: String, value: Option<Value>) {
        self.map.insert(key, value);
    }
}

impl Default for QueryFilterMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Fills an empty database with one user per role and a handful of upcoming
/// events around a single neighbourhood.
pub async fn seed_database(db: &DatabaseConnection) -> Result<(), error::Error> {
    let now = Utc::now();

    users::ActiveModel {
        email: Set("admin@hyperlocal.test".to_owned()),
        display_name: Set(Some("Admin User".to_owned())),
        password: Set(generate_hash("dLxNxnjn&b!2sqkwFbb4s8jX")),
        role: Set(roles::Role::Admin),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let host = users::ActiveModel {
        email: Set("host@hyperlocal.test".to_owned()),
        display_name: Set(Some("Rosa the Host".to_owned())),
        password: Set(generate_hash("password")),
        role: Set(roles::Role::Host),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    users::ActiveModel {
        email: Set("attendee@hyperlocal.test".to_owned()),
        display_name: Set(Some("Sam Neighbour".to_owned())),
        password: Set(generate_hash("password")),
        role: Set(roles::Role::Attendee),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let samples = [
        (
            "Saturday Farmers Market",
            "Local growers, bakers and a coffee cart on the square.",
            "Town Square",
            Duration::hours(5),
            0.0,
            200,
        ),
        (
            "Rooftop Jazz Night",
            "A quartet plays standards while the sun sets over the river.",
            "The Loft, 5th Floor",
            Duration::days(2),
            25.0,
            60,
        ),
        (
            "Neighbourhood Cleanup",
            "Gloves and bags provided, meet by the fountain at nine.",
            "Riverside Park",
            Duration::days(5),
            0.0,
            40,
        ),
        (
            "Pottery for Beginners",
            "Two hours at the wheel with all materials included.",
            "Clay Studio on Main",
            Duration::days(12),
            45.0,
            8,
        ),
    ];

    for (title, description, location_name, starts_in, price, total_tickets) in samples {
        events::ActiveModel {
            host_id: Set(host.id),
            title: Set(title.to_owned()),
            description: Set(description.to_owned()),
            location_name: Set(location_name.to_owned()),
            latitude: Set(40.7128),
            longitude: Set(-74.0060),
            image_url: Set(None),
            date: Set((now + starts_in).into()),
            price: Set(price),
            total_tickets: Set(total_tickets),
            remaining_tickets: Set(total_tickets),
            average_rating: Set(0.0),
            review_count: Set(0),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    Ok(())
}
