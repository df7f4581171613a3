//! HTTP error mapping for sbn-admin

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use sbn_common::integrity::Notification;
use sbn_common::Error;

/// Handler error: a common error plus an optional user-facing notification
#[derive(Debug)]
pub struct ApiError {
    pub error: Error,
    pub notification: Option<Notification>,
}

impl ApiError {
    pub fn with_notification(error: Error, notification: Notification) -> Self {
        Self {
            error,
            notification: Some(notification),
        }
    }

    pub fn status(&self) -> StatusCode {
        match &self.error {
            Error::InvalidInput(_) | Error::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::CleanupInProgress(_) => StatusCode::CONFLICT,
            Error::Transport(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self {
            error,
            notification: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.error);
        }

        let mut body = json!({
            "error": self.error.to_string(),
        });
        if let Some(notification) = self.notification {
            body["notification"] = json!(notification);
        }

        (status, Json(body)).into_response()
    }
}
