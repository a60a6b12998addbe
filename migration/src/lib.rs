pub use sea_orm_migration::prelude::*;

mod m20260301_090000_create_schema;
mod m20260301_091500_create_users;
mod m20260301_093000_create_events;
mod m20260301_094500_create_reservations;
mod m20260302_080000_add_event_listing_index;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_090000_create_schema::Migration),
            Box::new(m20260301_091500_create_users::Migration),
            Box::new(m20260301_093000_create_events::Migration),
            Box::new(m20260301_094500_create_reservations::Migration),
            Box::new(m20260302_080000_add_event_listing_index::Migration),
        ]
    }
}
