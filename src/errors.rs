use crate::models::message::TRANSACTION_ID_HEADER;
use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for handler errors that keeps the wire contract
/// local: the exact status code, the stable JSON message callers match on,
/// and the transaction id to echo back.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub transaction_id: Option<String>,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            transaction_id: None,
        }
    }

    /// Attach the transaction id so the response echoes it.
    pub fn with_transaction_id(mut self, tid: impl Into<String>) -> Self {
        self.transaction_id = Some(tid.into());
        self
    }

    /// The 404 produced when a path segment is not a canonical UUID.
    /// Mirrors a router mismatch, so the body stays empty.
    pub fn route_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "")
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = if self.message.is_empty() {
            self.status.into_response()
        } else {
            (self.status, Json(json!({ "message": self.message }))).into_response()
        };
        if let Some(tid) = &self.transaction_id {
            if let Ok(value) = HeaderValue::from_str(tid) {
                response.headers_mut().insert(TRANSACTION_ID_HEADER, value);
            }
        }
        response
    }
}
