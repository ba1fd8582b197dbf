//! Route composition for the gateway.
//!
//! ## Structure
//! - **Resource endpoints** (mounted under the optional resource path)
//!   - `PUT    /{uuid}` — upsert payload
//!   - `GET    /{uuid}` — fetch payload
//!   - `DELETE /{uuid}` — remove payload
//!   - `GET    /__count` — count surviving keys
//!   - `GET    /__ids` — stream `{"ID":"<uuid>"}` lines
//!   - `GET    /` — stream every payload
//!
//! - **Admin endpoints** (always at the root)
//!   - `GET /__ping`, `GET /ping`, `GET /__build-info`, `GET /build-info`,
//!     `GET /__health`, `GET /__gtg`
//!
//! UUID validation happens in the handlers; a non-canonical segment answers
//! like a routing miss.

use crate::handlers::{
    health_handlers::{build_info, good_to_go, health, ping},
    object_handlers::{count, delete_object, get_all, ids, read_object, write_object},
    AppState,
};
use axum::{
    routing::{get, put},
    Router,
};

/// Build the router. `resource_path` must be empty or start with `/`.
pub fn routes(resource_path: &str) -> Router<AppState> {
    let resource = Router::new()
        .route("/", get(get_all))
        .route("/__count", get(count))
        .route("/__ids", get(ids))
        .route(
            "/{uuid}",
            put(write_object).get(read_object).delete(delete_object),
        );

    let admin = Router::new()
        .route("/__ping", get(ping))
        .route("/ping", get(ping))
        .route("/__build-info", get(build_info))
        .route("/build-info", get(build_info))
        .route("/__health", get(health))
        .route("/__gtg", get(good_to_go));

    if resource_path.is_empty() {
        admin.merge(resource)
    } else {
        admin.nest(resource_path, resource)
    }
}
