use uuid::Uuid;

pub mod events;
pub mod reservation_status;
pub mod reservations;
pub mod roles;
pub mod users;

/// A type alias that represents any Entity's internal id field data type.
/// Aliased so that it's easy to change the underlying type if necessary.
pub type Id = Uuid;
