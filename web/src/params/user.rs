use domain::roles::Role;
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub(crate) struct UpdateRoleParams {
    #[schema(value_type = String, example = "host")]
    pub(crate) role: Role,
}
