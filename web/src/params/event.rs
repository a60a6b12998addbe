use domain::listing::Window;
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct IndexParams {
    /// Restricts the listing to events happening `today` or `this_week`.
    /// Defaults to `all`.
    #[serde(default)]
    #[param(value_type = Option<String>, example = "this_week")]
    pub(crate) window: Window,
}
