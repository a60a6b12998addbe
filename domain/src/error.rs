//! Error types for the `domain` layer.
use entity_api::error::{EntityApiErrorKind, Error as EntityApiError};
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums that represent the kinds of errors that can occur in the domain layer or
/// in lower layers. The `source` field is used to hold the original error that caused
/// the domain error. The intent is to translate errors between layers while maintaining
/// layer boundaries. Ex. `domain` is dependent on `entity_api`, and `web` is dependent on `domain`.
/// but `web` should not be dependent, directly, on `entity_api`. Ultimately the various
/// `error_kind`s are used by `web` to return appropriate HTTP status codes and messages.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
    /// Failures surfaced by the reservation engine. Every error leaving the
    /// engine carries one of these.
    Reservation(ReservationErrorKind),
}

/// Enum representing the various kinds of internal errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Entity(EntityErrorKind),
    /// The acting user's role does not allow the operation.
    Forbidden,
    Config,
    Other(String),
}

/// Entity errors translated up from `entity_api`, reduced to what the domain cares about.
#[derive(Debug, PartialEq)]
pub enum EntityErrorKind {
    NotFound,
    Invalid,
    Unauthenticated,
    /// A uniqueness or check constraint rejected the write.
    Conflict,
    DbTransaction,
    Other(String),
}

/// Enum representing the various kinds of external errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    Network,
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationErrorKind {
    /// No signed-in user.
    AuthenticationRequired,
    /// The event is inactive, already started, or gone.
    EventNotReservable,
    /// No tickets left.
    SoldOut,
    /// The payment provider failed or answered without a redirect URL.
    Gateway,
    /// Catalog or ledger storage failed.
    Storage,
}

impl Error {
    /// A validation failure whose message is safe to show to the caller.
    pub fn invalid(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Error {
            source: Some(message.into()),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(
                EntityErrorKind::Invalid,
            )),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Error {
            source: Some(message.into()),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Forbidden),
        }
    }

    pub fn not_found() -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(
                EntityErrorKind::NotFound,
            )),
        }
    }

    pub fn reservation(kind: ReservationErrorKind) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Reservation(kind),
        }
    }

    /// Folds any error into the reservation taxonomy, keeping the original as
    /// `source`. Collaborator failures become `Storage` or `Gateway`.
    pub fn into_reservation_error(self) -> Self {
        let kind = match self.error_kind {
            DomainErrorKind::Reservation(_) => return self,
            DomainErrorKind::External(_) => ReservationErrorKind::Gateway,
            DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::NotFound)) => {
                ReservationErrorKind::EventNotReservable
            }
            DomainErrorKind::Internal(_) => ReservationErrorKind::Storage,
        };

        Error {
            source: Some(Box::new(self)),
            error_kind: DomainErrorKind::Reservation(kind),
        }
    }

    /// The reservation kind, if this error came out of the reservation engine.
    pub fn reservation_kind(&self) -> Option<ReservationErrorKind> {
        match self.error_kind {
            DomainErrorKind::Reservation(kind) => Some(kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {self:?}")
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// This is where we translate errors from the `entity_api` layer to the `domain` layer.
impl From<EntityApiError> for Error {
    fn from(err: EntityApiError) -> Self {
        let entity_error_kind = match err.error_kind {
            EntityApiErrorKind::RecordNotFound => EntityErrorKind::NotFound,
            EntityApiErrorKind::InvalidQueryTerm | EntityApiErrorKind::ValidationError => {
                EntityErrorKind::Invalid
            }
            EntityApiErrorKind::RecordUnauthenticated => EntityErrorKind::Unauthenticated,
            EntityApiErrorKind::ConstraintViolation => EntityErrorKind::Conflict,
            EntityApiErrorKind::SystemError => EntityErrorKind::DbTransaction,
            _ => EntityErrorKind::Other("EntityErrorKind".to_string()),
        };

        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(entity_error_kind)),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Errors that result from issues building the reqwest::Client instance. This
        // type of error will occur prior to any network calls being made.
        if err.is_builder() {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                    "Failed to build reqwest client".to_string(),
                )),
            }
        // Errors that result from issues with the network call itself.
        } else {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Network),
            }
        }
    }
}
