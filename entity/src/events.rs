//! SeaORM Entity for the events table (the catalog).

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::events::Model)]
#[sea_orm(schema_name = "hyperlocal", table_name = "events")]
pub struct Model {
    #[serde(skip_deserializing)]
    #[sea_orm(primary_key)]
    pub id: Id,
    #[serde(skip_deserializing)]
    pub host_id: Id,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub image_url: Option<String>,
    #[schema(value_type = String, format = DateTime)]
    pub date: DateTimeWithTimeZone,
    /// Ticket price in major currency units; zero means the event is free.
    pub price: f64,
    pub total_tickets: i32,
    #[serde(skip_deserializing)]
    pub remaining_tickets: i32,
    #[serde(skip_deserializing)]
    pub average_rating: f64,
    #[serde(skip_deserializing)]
    pub review_count: i32,
    #[serde(skip_deserializing)]
    pub is_active: bool,
    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,
    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn is_free(&self) -> bool {
        self.price == 0.0
    }

    pub fn is_sold_out(&self) -> bool {
        self.remaining_tickets <= 0
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::HostId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
    #[sea_orm(has_many = "super::reservations::Entity")]
    Reservations,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::reservations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reservations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
