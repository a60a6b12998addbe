use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use domain::error::{
    DomainErrorKind, EntityErrorKind, Error as DomainError, ExternalErrorKind, InternalErrorKind,
    ReservationErrorKind,
};
use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(DomainError);

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl Error {
    /// The message a domain validation or authorization failure was raised with.
    fn message(&self) -> Option<String> {
        self.0.source.as_ref().map(|source| source.to_string())
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html#associatedconstant.UNPROCESSABLE_ENTITY
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self.0.error_kind {
            DomainErrorKind::Reservation(kind) => reservation_response(*kind, &self),
            DomainErrorKind::Internal(internal_error_kind) => match internal_error_kind {
                InternalErrorKind::Entity(entity_error_kind) => match entity_error_kind {
                    EntityErrorKind::NotFound => {
                        (StatusCode::NOT_FOUND, "NOT FOUND").into_response()
                    }
                    EntityErrorKind::Invalid => (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        self.message()
                            .unwrap_or_else(|| "UNPROCESSABLE ENTITY".to_string()),
                    )
                        .into_response(),
                    EntityErrorKind::Unauthenticated => {
                        (StatusCode::UNAUTHORIZED, "UNAUTHORIZED").into_response()
                    }
                    EntityErrorKind::Conflict => {
                        (StatusCode::CONFLICT, "CONFLICT").into_response()
                    }
                    EntityErrorKind::DbTransaction | EntityErrorKind::Other(_) => {
                        error!("Entity error: {self}");
                        (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
                    }
                },
                InternalErrorKind::Forbidden => (
                    StatusCode::FORBIDDEN,
                    self.message().unwrap_or_else(|| "FORBIDDEN".to_string()),
                )
                    .into_response(),
                InternalErrorKind::Config | InternalErrorKind::Other(_) => {
                    error!("Internal error: {self}");
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
                }
            },
            DomainErrorKind::External(external_error_kind) => match external_error_kind {
                ExternalErrorKind::Network => {
                    (StatusCode::BAD_GATEWAY, "BAD GATEWAY").into_response()
                }
                ExternalErrorKind::Other(_) => {
                    error!("External error: {self}");
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
                }
            },
        }
    }
}

fn reservation_response(kind: ReservationErrorKind, err: &Error) -> Response {
    match kind {
        ReservationErrorKind::AuthenticationRequired => {
            (StatusCode::UNAUTHORIZED, "Please sign in to reserve a spot").into_response()
        }
        ReservationErrorKind::EventNotReservable => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "This event is no longer taking reservations",
        )
            .into_response(),
        ReservationErrorKind::SoldOut => {
            (StatusCode::CONFLICT, "This event is sold out").into_response()
        }
        ReservationErrorKind::Gateway => {
            warn!("Reservation failed at the payment gateway: {err}");
            (
                StatusCode::BAD_GATEWAY,
                "The payment provider is unavailable, please try again",
            )
                .into_response()
        }
        ReservationErrorKind::Storage => {
            error!("Reservation failed in storage: {err}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Reservations are temporarily unavailable, please try again",
            )
                .into_response()
        }
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
