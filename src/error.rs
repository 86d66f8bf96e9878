use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found")]
    NotFound,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::StoreUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Infrastructure details stay in the logs, not in the response body
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("{self}");
            return (status, "Internal Server Error".to_string()).into_response();
        }

        (status, self.to_string()).into_response()
    }
}
