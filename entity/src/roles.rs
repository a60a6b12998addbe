use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The closed set of authorities a user can hold.
///
/// Every privileged operation checks one of the predicates below at its entry
/// point instead of inspecting the variant ad hoc.
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
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "role")]
pub enum Role {
    #[sea_orm(string_value = "attendee")]
    #[default]
    Attendee,
    #[sea_orm(string_value = "host")]
    Host,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl Role {
    /// Hosts and administrators may publish events.
    pub fn can_host(&self) -> bool {
        matches!(self, Role::Host | Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        *self == Role::Admin
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Attendee => write!(fmt, "attendee"),
            Role::Host => write!(fmt, "host"),
            Role::Admin => write!(fmt, "admin"),
        }
    }
}
