use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use coach_core::CoreError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Core(CoreError::ValidationError(_)) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Core(CoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Core(CoreError::Conflict { .. }) => StatusCode::CONFLICT,
            AppError::Core(CoreError::StorageError(_)) | AppError::Anyhow(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            AppError::Core(CoreError::ValidationError(msg)) => msg.clone(),
            AppError::Core(CoreError::StorageError(_)) | AppError::Anyhow(_) => {
                tracing::error!("Internal Server Error: {}", self);
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::from(CoreError::conflict("3")).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::from(CoreError::trip_not_found(9)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(CoreError::ValidationError("token is required".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(CoreError::StorageError("pool timed out".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
