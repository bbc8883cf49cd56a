use axum::http::StatusCode;
use thiserror::Error;

use corpreg_infra::ServiceError;

/// Error kinds visible on the wire.
///
/// Display text is what goes into `status_text`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Missing/invalid token, or caller region not permitted.
    #[error("not authorized")]
    Unauthorized,

    /// Malformed query, body or path id.
    #[error("{0}")]
    BadRequest(&'static str),

    /// The addressed company does not exist (update/delete).
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Storage(String),

    /// Event publish failed; the paired write was rolled back.
    #[error("{0}")]
    Publish(String),

    #[error("request cancelled")]
    Cancelled,

    /// The handler panicked.
    #[error("internal server error")]
    Internal,
}

/// Envelope `status_code` for every failure.
pub const SERVER_ERROR_CODE: u16 = 500;

impl ApiError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Classify a service failure, keeping its stage-labelled text.
    pub fn from_service(err: ServiceError) -> Self {
        let text = err.to_string();
        Self::classify(err, text)
    }

    /// Classify a service failure but report `masked` instead of its text.
    pub fn from_service_masked(err: ServiceError, masked: &'static str) -> Self {
        Self::classify(err, masked.to_string())
    }

    fn classify(err: ServiceError, text: String) -> Self {
        match err {
            ServiceError::Cancelled => ApiError::Cancelled,
            ServiceError::Publish { .. } => ApiError::Publish(text),
            ref e if e.is_not_found() => ApiError::NotFound(text),
            _ => ApiError::Storage(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpreg_events::EmitError;
    use corpreg_infra::{Stage, StoreError};

    #[test]
    fn only_unauthorized_maps_to_401() {
        assert_eq!(ApiError::Unauthorized.http_status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Cancelled.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ApiError::BadRequest("incorrect params").http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn publish_failures_stay_distinct_from_storage() {
        let err = ApiError::from_service(ServiceError::Publish {
            stage: Stage::SendUpdateEvent,
            source: EmitError::Rejected("down".to_string()),
        });
        assert_eq!(
            err,
            ApiError::Publish(
                "failed to send company update event: event log rejected message: down"
                    .to_string()
            )
        );
    }

    #[test]
    fn missing_rows_are_not_found_and_masking_keeps_kind() {
        let err = ServiceError::Storage {
            stage: Stage::UpdateCompany,
            source: StoreError::NotFound,
        };
        assert!(matches!(ApiError::from_service(err), ApiError::NotFound(_)));

        let err = ServiceError::Publish {
            stage: Stage::SendCreateEvent,
            source: EmitError::Closed,
        };
        assert_eq!(
            ApiError::from_service_masked(err, "server error"),
            ApiError::Publish("server error".to_string())
        );
    }

    #[test]
    fn cancellation_is_never_masked() {
        assert_eq!(
            ApiError::from_service_masked(ServiceError::Cancelled, "global error"),
            ApiError::Cancelled
        );
    }
}
