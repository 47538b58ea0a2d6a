use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    UnprocessableEntity(String),

    /// Receipt rendering failed (bad inputs to the PDF layer).
    #[error("{0}")]
    Render(String),

    /// The Gmail credential was rejected or could not be refreshed.
    #[error("{0}")]
    MailAuth(String),

    /// The SMTP transport accepted the credential but the send failed.
    #[error("{0}")]
    MailSend(String),

    /// Datastore or other upstream dependency failure.
    #[error("{0}")]
    Dependency(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Render(_) | Self::MailAuth(_) | Self::MailSend(_) | Self::Dependency(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        tracing::error!(db_error = %error, "Database query failed");
        match &error {
            sqlx::Error::RowNotFound => Self::NotFound("Record not found.".to_string()),
            sqlx::Error::Database(db_error) if db_error.code().as_deref() == Some("23505") => {
                Self::Conflict("Duplicate value violates a unique constraint.".to_string())
            }
            _ => Self::Dependency("Database operation failed.".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AppError;
    use axum::http::StatusCode;

    #[test]
    fn maps_status_codes() {
        assert_eq!(
            AppError::BadRequest(String::new()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Conflict(String::new()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::MailAuth(String::new()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }
}
