//! HTTP layer: resource handlers, admin/health handlers, and the shared
//! state they all receive from the router.

use crate::services::healthcheck::HealthCheck;
use crate::services::reader::Reader;
use crate::services::writer::Writer;
use std::sync::Arc;

pub mod health_handlers;
pub mod object_handlers;

/// Shared handler state. Writer and Reader are stateless given their
/// configuration, so a clone per request is free.
#[derive(Clone)]
pub struct AppState {
    pub writer: Writer,
    pub reader: Reader,
    pub health: Arc<HealthCheck>,
}
