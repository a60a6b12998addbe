use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    Eq,
    PartialEq,
    EnumIter,
    Deserialize,
    Default,
    Serialize,
    DeriveActiveEnum,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "reservation_status"
)]
pub enum ReservationStatus {
    /// Holds a ticket; counted against the event's inventory.
    #[sea_orm(string_value = "going")]
    #[default]
    Going,
    /// Bookmarked only; never consumes inventory.
    #[sea_orm(string_value = "interested")]
    Interested,
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReservationStatus::Going => write!(fmt, "going"),
            ReservationStatus::Interested => write!(fmt, "interested"),
        }
    }
}
