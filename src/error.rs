use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub const MSG_CLASSIFIER_UNAVAILABLE: &str = "Model klasifikasi tidak tersedia di server.";
pub const MSG_NO_FILE_PART: &str = "Request tidak menyertakan file gambar";
pub const MSG_EMPTY_FILENAME: &str = "Tidak ada file yang dipilih untuk diunggah";
pub const MSG_INVALID_FILENAME: &str = "Nama file tidak valid";
pub const MSG_BAD_IMAGE: &str = "Format gambar tidak didukung atau file korup";
pub const MSG_TOO_LARGE: &str = "Ukuran file melebihi batas yang diizinkan";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(message) = &self {
            tracing::error!("internal error: {}", message);
        }
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
