use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{auth::repo::StoreError, views};

/// Failure that escapes a handler. Rendered as a generic 500 page.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request failed");
        views::respond(
            &views::PageContext::default(),
            StatusCode::INTERNAL_SERVER_ERROR,
            views::internal_error(),
        )
    }
}
