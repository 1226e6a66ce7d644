use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use thiserror::Error;

/// Result type for campaign operations.
pub type CampaignResult<T> = Result<T, CampaignError>;

/// Errors produced by the campaign dispatch engine.
#[derive(Debug, Error)]
pub enum CampaignError {
    /// Bad input at intake; nothing was persisted.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Job, recipient, or suppression entry missing.
    #[error("{0}")]
    NotFound(String),

    /// Illegal lifecycle transition, advance while not processing, or a
    /// concurrent-advance collision. The job is left unchanged.
    #[error("{0}")]
    StateConflict(String),

    /// Credential decrypt failure. Fatal for the current step only; a later
    /// advance can retry once the credential is fixed.
    #[error("Credential error: {0}")]
    Credential(String),

    /// Send failure from the mail transport. Recovered at batch granularity,
    /// never aborts the job.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Storage failure. Aborts the in-flight step without marking anything
    /// sent, so a retried advance re-selects the same batch.
    #[error("Database error: {0}")]
    Database(String),

    /// Invariant violation or unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for CampaignError {
    fn from(err: sea_orm::DbErr) -> Self {
        CampaignError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for CampaignError {
    fn from(err: serde_json::Error) -> Self {
        CampaignError::Internal(format!("JSON serialization error: {}", err))
    }
}

/// Convert CampaignError to AppError for standardized error responses
impl From<CampaignError> for AppError {
    fn from(err: CampaignError) -> Self {
        match err {
            CampaignError::Validation(msg) => AppError::BadRequest(msg),
            CampaignError::NotFound(msg) => AppError::NotFound(msg),
            CampaignError::StateConflict(msg) => AppError::Conflict(msg),
            CampaignError::Credential(msg) => AppError::ServiceUnavailable(msg),
            CampaignError::Transport(msg) => {
                AppError::InternalServerError(format!("Send failed: {}", msg))
            }
            CampaignError::Database(msg) => {
                AppError::InternalServerError(format!("Database error: {}", msg))
            }
            CampaignError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for CampaignError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
