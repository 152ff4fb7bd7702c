use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use database::{DbError, Reason};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

pub const MSG_NOT_FOUND: &str = "not found";
pub const MSG_BAD_REQUEST: &str = "bad request body";
pub const MSG_ALREADY_EXISTS: &str = "already exists";
pub const MSG_UNHANDLED: &str = "unhandled error";
pub const MSG_VALIDATION: &str = "required fields are missing or invalid";
pub const MSG_TIMEOUT: &str = "request timed out";

/// Everything the service layer can fail with.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Validation failed: {fields:?}")]
    Validation { fields: BTreeMap<String, String> },
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// The error body sent to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub status: StatusCode,
    pub message: String,
    pub debug: Option<String>,
    pub validation: Option<BTreeMap<String, String>>,
}

#[derive(Serialize)]
struct TransportBody<'a> {
    code: String,
    status: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation: Option<&'a BTreeMap<String, String>>,
}

impl TransportError {
    fn new(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            message: message.to_string(),
            debug: None,
            validation: None,
        }
    }

    pub fn body(&self) -> serde_json::Value {
        let body = TransportBody {
            code: self.status.as_u16().to_string(),
            status: self.status.canonical_reason().unwrap_or_default(),
            message: &self.message,
            debug: self.debug.as_deref(),
            validation: self.validation.as_ref(),
        };
        serde_json::to_value(body).unwrap_or_default()
    }
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body())).into_response()
    }
}

/// Converts service errors into transport errors.
///
/// The raw error text is attached as `debug` only when the mapper is built with
/// `expose_debug`. It is off unless configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceErrorMapper {
    expose_debug: bool,
}

impl ServiceErrorMapper {
    pub fn new(expose_debug: bool) -> Self {
        Self { expose_debug }
    }

    pub fn status_for(reason: Reason) -> (StatusCode, &'static str) {
        match reason {
            Reason::NotFound | Reason::NoRowsChanged => (StatusCode::NOT_FOUND, MSG_NOT_FOUND),
            Reason::ParentNotFound | Reason::FailsCheckConstraint => {
                (StatusCode::BAD_REQUEST, MSG_BAD_REQUEST)
            }
            Reason::AlreadyExists => (StatusCode::CONFLICT, MSG_ALREADY_EXISTS),
            Reason::Unhandled => (StatusCode::INTERNAL_SERVER_ERROR, MSG_UNHANDLED),
        }
    }

    pub fn to_transport(&self, err: &AppError) -> TransportError {
        let mut transport = match err {
            AppError::Database(DbError::Classified(classified)) => {
                let (status, message) = Self::status_for(classified.reason());
                TransportError::new(status, message)
            }
            AppError::Database(DbError::DeadlineExceeded(_)) => {
                TransportError::new(StatusCode::GATEWAY_TIMEOUT, MSG_TIMEOUT)
            }
            AppError::Database(_) => {
                TransportError::new(StatusCode::INTERNAL_SERVER_ERROR, MSG_UNHANDLED)
            }
            AppError::Validation { fields } => TransportError {
                validation: Some(fields.clone()),
                ..TransportError::new(StatusCode::BAD_REQUEST, MSG_VALIDATION)
            },
            AppError::BadRequest(_) => TransportError::new(StatusCode::BAD_REQUEST, MSG_BAD_REQUEST),
        };

        if self.expose_debug {
            transport.debug = Some(err.to_string());
        }
        transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::{ClassifiedError, SqlValue, classify};
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;
    use std::time::Duration;

    #[derive(Debug)]
    struct UniqueViolation;

    impl fmt::Display for UniqueViolation {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("duplicate key value violates unique constraint")
        }
    }

    impl StdError for UniqueViolation {}

    impl DatabaseError for UniqueViolation {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed("23505"))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    fn classified(reason: Reason) -> AppError {
        AppError::Database(ClassifiedError::new(reason, "SELECT 1", &[]).into())
    }

    #[test]
    fn every_reason_maps_to_a_fixed_status() {
        let mapper = ServiceErrorMapper::default();
        let expected = [
            (Reason::NotFound, 404, MSG_NOT_FOUND),
            (Reason::ParentNotFound, 400, MSG_BAD_REQUEST),
            (Reason::AlreadyExists, 409, MSG_ALREADY_EXISTS),
            (Reason::NoRowsChanged, 404, MSG_NOT_FOUND),
            (Reason::FailsCheckConstraint, 400, MSG_BAD_REQUEST),
            (Reason::Unhandled, 500, MSG_UNHANDLED),
        ];
        assert_eq!(expected.len(), Reason::ALL.len());

        for (reason, status, message) in expected {
            let transport = mapper.to_transport(&classified(reason));
            assert_eq!(transport.status.as_u16(), status, "{reason}");
            assert_eq!(transport.message, message);
            assert_eq!(transport.debug, None);
            assert_eq!(transport.validation, None);
        }
    }

    #[test]
    fn unclassified_errors_are_internal_without_echoing_the_cause() {
        let mapper = ServiceErrorMapper::default();
        let err = AppError::Database(DbError::Driver(sqlx::Error::PoolTimedOut));

        let transport = mapper.to_transport(&err);
        assert_eq!(transport.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(transport.message, MSG_UNHANDLED);
        assert!(transport.body().get("debug").is_none());
    }

    #[test]
    fn deadline_maps_to_gateway_timeout() {
        let mapper = ServiceErrorMapper::default();
        let err = AppError::Database(DbError::DeadlineExceeded(Duration::from_millis(50)));

        let transport = mapper.to_transport(&err);
        assert_eq!(transport.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(transport.message, MSG_TIMEOUT);
    }

    #[test]
    fn validation_carries_the_field_map() {
        let fields = BTreeMap::from([("star".to_string(), "must be between 1 and 5".to_string())]);
        let transport = ServiceErrorMapper::default().to_transport(&AppError::Validation {
            fields: fields.clone(),
        });

        assert_eq!(transport.status, StatusCode::BAD_REQUEST);
        let body = transport.body();
        assert_eq!(body["code"], "400");
        assert_eq!(body["status"], "Bad Request");
        assert_eq!(body["message"], MSG_VALIDATION);
        assert_eq!(body["validation"]["star"], "must be between 1 and 5");
    }

    #[test]
    fn debug_is_attached_only_when_exposed() {
        let err = classified(Reason::AlreadyExists);

        let hidden = ServiceErrorMapper::new(false).to_transport(&err);
        assert_eq!(hidden.debug, None);

        let shown = ServiceErrorMapper::new(true).to_transport(&err);
        assert!(shown.debug.as_deref().is_some_and(|debug| debug.contains("SELECT 1")));
        assert_eq!(shown.body()["code"], "409");
        assert_eq!(shown.body()["message"], MSG_ALREADY_EXISTS);
    }

    #[test]
    fn driver_errors_reach_the_client_with_their_classified_status() {
        let mapper = ServiceErrorMapper::default();
        let stmt = "INSERT INTO user_favourite (users_id, recipe_id) VALUES ($1, $2)";
        let args = [SqlValue::Int(1), SqlValue::Int(2)];

        let duplicate = classify(sqlx::Error::Database(Box::new(UniqueViolation)), stmt, &args);
        let transport = mapper.to_transport(&AppError::from(duplicate));
        assert_eq!(transport.status, StatusCode::CONFLICT);
        assert_eq!(transport.body()["code"], "409");
        assert_eq!(transport.body()["message"], MSG_ALREADY_EXISTS);

        let missing = classify(sqlx::Error::RowNotFound, "SELECT * FROM recipe WHERE id = $1", &args[..1]);
        let transport = mapper.to_transport(&AppError::from(missing));
        assert_eq!(transport.status, StatusCode::NOT_FOUND);
        assert_eq!(transport.body()["code"], "404");
        assert_eq!(transport.body()["message"], MSG_NOT_FOUND);
    }
}
