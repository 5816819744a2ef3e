use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use report_pipeline::PipelineError;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("All fields are required.")]
    MissingFields,

    #[error("Invalid upload: {0}")]
    Multipart(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingFields | ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(err) => StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
