// error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("question {0} does not exist")]
    UnknownQuestion(i64),

    #[error("choice {choice_id} does not belong to question {question_id}")]
    ChoiceMismatch { question_id: i64, choice_id: i64 },

    #[error("end date {end_date} is before publication date {pub_date}")]
    InvalidWindow {
        pub_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    },
}

/// Reasons a vote submission is turned down.
#[derive(Error, Debug)]
pub enum VoteError {
    #[error("question not found")]
    NotFound,

    #[error("This poll has not been published yet.")]
    NotPublished,

    #[error("The voting period for this poll has ended.")]
    VotingClosed,

    #[error("You didn't select a choice.")]
    InvalidChoice,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Store(StoreError::InvalidWindow { .. })
            | AppError::Store(StoreError::ChoiceMismatch { .. }) => StatusCode::BAD_REQUEST,
            AppError::Store(StoreError::UnknownQuestion(_)) => StatusCode::NOT_FOUND,
            AppError::Store(e) => {
                tracing::error!(error = %e, "storage failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
