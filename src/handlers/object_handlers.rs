//! HTTP handlers for the UUID-keyed resource operations.
//!
//! Translates verbs and paths into Reader/Writer calls and write statuses
//! into the stable response table. Bulk responses stream straight from the
//! reader's pipe so nothing is buffered whole.

use crate::{
    errors::AppError,
    handlers::AppState,
    models::message::{new_transaction_id, TRANSACTION_ID_HEADER},
    services::writer::WriteStatus,
};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;
use tracing::{error, info};
use uuid::Uuid;

/// Per-request header that forces a PUT even when hashes match.
const IGNORE_HASH_HEADER: &str = "X-Ignore-Hash";

/// Query params accepted by the resource routes.
#[derive(Debug, Deserialize)]
pub struct ScopeQuery {
    /// Key scope used when no bucket prefix is configured.
    #[serde(default)]
    pub path: String,
}

/// PUT `/{uuid}` — upsert the payload under the derived key.
pub async fn write_object(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    Query(scope): Query<ScopeQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, AppError> {
    require_canonical_uuid(&uuid)?;
    let tid = transaction_id(&headers);
    let ignore_hash = headers
        .get(IGNORE_HASH_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let payload = axum::body::to_bytes(body, usize::MAX).await.map_err(|err| {
        error!(transaction_id = %tid, uuid = %uuid, %err, "error reading request body");
        AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "Unknown internal error")
            .with_transaction_id(&tid)
    })?;

    let status = match state
        .writer
        .write(
            &uuid,
            &scope.path,
            &payload,
            content_type.as_deref(),
            &tid,
            ignore_hash,
        )
        .await
    {
        Ok(status) => status,
        Err(err) => err.status(),
    };

    let (code, message) = match status {
        WriteStatus::Created => {
            info!(transaction_id = %tid, uuid = %uuid, "record created in store");
            (StatusCode::CREATED, Some("Created concept record in store"))
        }
        WriteStatus::Updated => {
            info!(transaction_id = %tid, uuid = %uuid, "record updated in store");
            (StatusCode::OK, Some("Updated concept record in store"))
        }
        WriteStatus::Unchanged => (StatusCode::NOT_MODIFIED, None),
        WriteStatus::InternalError => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Some("An error occurred whilst processing request"),
        ),
        WriteStatus::ServiceUnavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            Some("Downstream service responded with error"),
        ),
    };

    let mut response = match message {
        Some(msg) => (code, Json(json!({ "message": msg }))).into_response(),
        None => code.into_response(),
    };
    set_transaction_id(response.headers_mut(), &tid);
    Ok(response)
}

/// GET `/{uuid}` — fetch one payload.
pub async fn read_object(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    Query(scope): Query<ScopeQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    require_canonical_uuid(&uuid)?;
    let tid = transaction_id(&headers);

    let fetched = state.reader.get(&uuid, &scope.path).await.map_err(|err| {
        error!(transaction_id = %tid, uuid = %uuid, %err, "error from reader");
        service_unavailable(&tid)
    })?;
    let Some(object) = fetched else {
        return Err(AppError::new(StatusCode::NOT_FOUND, "Item not found").with_transaction_id(&tid));
    };

    let payload = object
        .body
        .collect()
        .await
        .map_err(|err| {
            error!(transaction_id = %tid, uuid = %uuid, %err, "error reading body");
            AppError::new(
                StatusCode::BAD_GATEWAY,
                "Error while communicating to other service",
            )
            .with_transaction_id(&tid)
        })?
        .into_bytes();

    let mut response = payload.into_response();
    if let Some(ct) = object.content_type.filter(|ct| !ct.is_empty()) {
        if let Ok(value) = HeaderValue::from_str(&ct) {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
    }
    set_transaction_id(response.headers_mut(), &tid);
    Ok(response)
}

/// DELETE `/{uuid}` — remove the object; missing keys delete as a no-op.
pub async fn delete_object(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    Query(scope): Query<ScopeQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    require_canonical_uuid(&uuid)?;
    let tid = transaction_id(&headers);

    state
        .writer
        .delete(&uuid, &scope.path, &tid)
        .await
        .map_err(|err| {
            error!(transaction_id = %tid, uuid = %uuid, %err, "error deleting object");
            service_unavailable(&tid)
        })?;

    info!(transaction_id = %tid, uuid = %uuid, "delete successful");
    let mut response = StatusCode::NO_CONTENT.into_response();
    set_transaction_id(response.headers_mut(), &tid);
    Ok(response)
}

/// GET `/__count` — number of surviving keys, as a bare JSON integer.
pub async fn count(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let tid = transaction_id(&headers);
    let total = state.reader.count().await.map_err(|err| {
        error!(transaction_id = %tid, %err, "error from reader");
        service_unavailable(&tid)
    })?;

    info!(transaction_id = %tid, total, "counted records");
    let mut response = (
        [(header::CONTENT_TYPE, "application/json")],
        total.to_string(),
    )
        .into_response();
    set_transaction_id(response.headers_mut(), &tid);
    Ok(response)
}

/// GET `/__ids` — newline-delimited `{"ID":"<uuid>"}` stream.
pub async fn ids(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let tid = transaction_id(&headers);
    let pipe = state.reader.ids().await.map_err(|err| {
        error!(transaction_id = %tid, %err, "error from reader");
        service_unavailable(&tid)
    })?;
    Ok(stream_response(pipe, &tid))
}

/// GET `/` — every payload, newline-separated, order unspecified.
pub async fn get_all(
    State(state): State<AppState>,
    Query(scope): Query<ScopeQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let tid = transaction_id(&headers);
    let pipe = state.reader.get_all(&scope.path).await.map_err(|err| {
        error!(transaction_id = %tid, %err, "error from reader");
        service_unavailable(&tid)
    })?;
    Ok(stream_response(pipe, &tid))
}

fn stream_response(pipe: tokio::io::DuplexStream, tid: &str) -> Response {
    let mut response = Body::from_stream(ReaderStream::new(pipe)).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    set_transaction_id(response.headers_mut(), tid);
    response
}

/// Reject anything that is not the canonical lowercase hyphenated form; the
/// route then behaves as if it never matched.
fn require_canonical_uuid(raw: &str) -> Result<(), AppError> {
    match Uuid::try_parse(raw) {
        Ok(parsed) if parsed.as_hyphenated().to_string() == raw => Ok(()),
        _ => Err(AppError::route_not_found()),
    }
}

fn transaction_id(headers: &HeaderMap) -> String {
    headers
        .get(TRANSACTION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(new_transaction_id)
}

fn set_transaction_id(headers: &mut HeaderMap, tid: &str) {
    if let Ok(value) = HeaderValue::from_str(tid) {
        headers.insert(TRANSACTION_ID_HEADER, value);
    }
}

fn service_unavailable(tid: &str) -> AppError {
    AppError::new(
        StatusCode::SERVICE_UNAVAILABLE,
        "Service currently unavailable",
    )
    .with_transaction_id(tid)
}
