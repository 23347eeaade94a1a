use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use moneta_core::error::root_cause_message;

/// One rejected field of a validation failure.
///
/// `message_key` is the catalog descriptor resolved to the user message at
/// render time; `developer_message` is the violation's own descriptive string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message_key: String,
    pub developer_message: String,
}

impl FieldViolation {
    pub fn new(
        field: impl Into<String>,
        message_key: impl Into<String>,
        developer_message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message_key: message_key.into(),
            developer_message: developer_message.into(),
        }
    }
}

/// Closed classification of request failures.
///
/// Handlers never render error payloads themselves: they return (or bubble
/// up) an `AppError` and the `ErrorTranslatorLayer` turns it into the JSON
/// array body. `Unclassified` is the accepted gap — it renders as a bare 500
/// with no structured body.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Request body could not be parsed into the expected shape (400)
    MalformedBody { developer_message: String },
    /// One or more fields rejected by declarative constraints (400)
    Validation { violations: Vec<FieldViolation> },
    /// Lookup by identifier found no matching record (404)
    NotFound { developer_message: String },
    /// Write rejected by a storage-level constraint (400)
    IntegrityViolation { root_cause: String },
    /// Everything else — hosting default, no structured body (500)
    Unclassified { detail: String },
}

impl AppError {
    pub fn malformed_body(developer_message: impl Into<String>) -> Self {
        Self::MalformedBody {
            developer_message: developer_message.into(),
        }
    }

    pub fn validation(violations: Vec<FieldViolation>) -> Self {
        Self::Validation { violations }
    }

    pub fn not_found(developer_message: impl Into<String>) -> Self {
        Self::NotFound {
            developer_message: developer_message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MalformedBody { .. } => StatusCode::BAD_REQUEST,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::IntegrityViolation { .. } => StatusCode::BAD_REQUEST,
            Self::Unclassified { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound {
                developer_message: err.to_string(),
            },
            sqlx::Error::Database(db_err)
                if db_err
                    .code()
                    .as_deref()
                    .is_some_and(|code| code.starts_with("23")) =>
            {
                // SQLSTATE class 23: integrity constraint violations
                AppError::IntegrityViolation {
                    root_cause: root_cause_message(&err),
                }
            }
            _ => AppError::Unclassified {
                detail: err.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Unclassified { detail } = &self {
            tracing::error!(detail = %detail, "unclassified request failure");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }

        // Body is rendered by ErrorTranslatorLayer, which reads the
        // classification back out of the response extensions.
        let mut response = self.status().into_response();
        response.extensions_mut().insert(self);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_classification_table() {
        assert_eq!(
            AppError::malformed_body("x").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::validation(vec![]).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::IntegrityViolation {
                root_cause: "x".into()
            }
            .status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn row_not_found_classifies_as_not_found() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[test]
    fn unrelated_sqlx_error_stays_unclassified() {
        let err: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, AppError::Unclassified { .. }));
    }

    #[test]
    fn classified_response_carries_failure_in_extensions() {
        let response = AppError::not_found("no row for codigo=1").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<AppError>().is_some());
    }

    #[test]
    fn unclassified_response_has_no_failure_extension() {
        let response = AppError::Unclassified { detail: "x".into() }.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<AppError>().is_none());
    }
}
