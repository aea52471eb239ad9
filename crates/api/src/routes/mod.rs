//! HTTP route handlers.

pub mod appointments;
pub mod charges;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod sellers;
pub mod webhooks;

use uuid::Uuid;

use crate::error::ApiError;

/// Parses a path id, naming the parameter in the error.
pub(crate) fn parse_uuid(name: &str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|e| ApiError::BadRequest(format!("Invalid {name}: {e}")))
}
