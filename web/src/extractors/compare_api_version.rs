use crate::extractors::RejectionType;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use log::*;
use semver::Version;
use service::config::ApiVersion;

/// Rejects requests whose `x-version` header names no API version this
/// server exposes.
pub(crate) struct CompareApiVersion(pub Version);

impl<S> FromRequestParts<S> for CompareApiVersion
where
    S: Send + Sync,
{
    type Rejection = RejectionType;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(ApiVersion::field_name())
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("Missing {} header", ApiVersion::field_name()),
                )
            })?;

        let version = Version::parse(header).map_err(|e| {
            debug!("Unparseable API version {header:?}: {e}");
            (
                StatusCode::BAD_REQUEST,
                format!("Invalid API version: {header}"),
            )
        })?;

        let supported = ApiVersion::versions()
            .iter()
            .filter_map(|v| Version::parse(v).ok())
            .any(|v| v == version);

        if supported {
            Ok(CompareApiVersion(version))
        } else {
            warn!("Request for unsupported API version {version}");
            Err((
                StatusCode::BAD_REQUEST,
                format!("Unsupported API version: {version}"),
            ))
        }
    }
}
