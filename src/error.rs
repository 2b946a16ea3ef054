use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::db::StoreError;
use crate::services::image_gen::ImageGenError;
use crate::services::image_host::ImageHostError;
use crate::services::mailer::MailError;

/// Failures of the generation flow, mapped to plain-text HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A query parameter is missing or empty.
    #[error("Missing or invalid parameter: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    /// The image generation API failed.
    #[error("Image generation failed: {0}")]
    ImageGeneration(#[from] ImageGenError),

    /// Downloading or re-hosting the generated image failed.
    #[error("Image hosting failed: {0}")]
    ImageHosting(#[from] ImageHostError),

    #[error("Job store failed: {0}")]
    JobStore(#[from] StoreError),

    /// The approval email could not be delivered.
    #[error("Notification failed: {0}")]
    Notification(#[from] MailError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::ImageGeneration(_) => StatusCode::BAD_GATEWAY,
            AppError::ImageHosting(ImageHostError::Download(_)) => StatusCode::BAD_GATEWAY,
            AppError::ImageHosting(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::JobStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Notification(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Response body; upstream details stay in the logs.
    fn body(&self) -> String {
        match self {
            AppError::Validation(_) | AppError::Unauthorized => self.to_string(),
            AppError::ImageGeneration(_) => "Image generation failed".to_string(),
            AppError::ImageHosting(ImageHostError::Download(_)) => "Image download failed".to_string(),
            AppError::ImageHosting(_) => "Image storage failed".to_string(),
            AppError::JobStore(_) => "Job store unavailable".to_string(),
            AppError::Notification(_) => "Approval email could not be sent".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, self.body()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Validation("prompt: not set".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::from(ImageGenError::EmptyResponse).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::from(StoreError::NotFound("a@b.com".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(MailError::Build("x".into())).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_bodies() {
        assert_eq!(AppError::Unauthorized.body(), "Unauthorized");
        assert_eq!(
            AppError::Validation("email: not set".into()).body(),
            "Missing or invalid parameter: email: not set"
        );
        let storage = ImageHostError::Io(std::io::Error::other("disk full"));
        assert_eq!(AppError::from(storage).body(), "Image storage failed");
    }
}
