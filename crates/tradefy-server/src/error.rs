use axum::response::{IntoResponse, Response};
use axum::Json;
use tradefy_common::error::AppError;

/// Handler error: renders an [`AppError`] as its status and JSON body.
#[derive(Debug)]
pub struct ApiError(pub AppError);

pub type ApiResult<T> = Result<Json<T>, ApiError>;

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if !self.0.is_client_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (self.0.status_code(), Json(self.0.to_error_body())).into_response()
    }
}
