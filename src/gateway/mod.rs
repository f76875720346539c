//! Persistence gateway — load and save one serialized scene per user.
//!
//! DESIGN
//! ======
//! `CanvasGateway` is the seam between the editor and the remote store. Three
//! implementations share it: `PgGateway` talks to Postgres directly,
//! `RestGateway` goes through the hosted backend's REST layer, and
//! `MemoryGateway` keeps everything in process for tests and local tooling.
//!
//! Saves are whole-scene upserts; the last write wins and there is no merge
//! across sessions.
//!
//! ERROR HANDLING
//! ==============
//! Stores disagree on how `canvas_state` comes back: a JSON string, an
//! already-parsed object, an empty string, or null. `decode_canvas_state`
//! folds all of them into "never saved", a normalized snapshot, or
//! `CorruptData`. Network and server failures are `Transient` and retryable.

pub mod memory;
pub mod postgres;
pub mod rest;


use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::scene::{Scene, Snapshot};

pub use memory::MemoryGateway;
pub use postgres::PgGateway;
pub use rest::RestGateway;

/// Identifier of a profile owner.
pub type UserId = Uuid;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("profile not found: {0}")]
    NotFound(UserId),
    #[error("store unavailable: {0}")]
    Transient(String),
    #[error("stored canvas is not a valid scene: {0}")]
    CorruptData(String),
}

impl ErrorCode for GatewayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_PROFILE_NOT_FOUND",
            Self::Transient(_) => "E_STORE_TRANSIENT",
            Self::CorruptData(_) => "E_CANVAS_CORRUPT",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

// =============================================================================
// TRAIT
// =============================================================================

/// Remote store for persisted profile canvases.
#[async_trait]
pub trait CanvasGateway: Send + Sync {
    /// Fetch the stored snapshot. `Ok(None)` means the profile exists but has
    /// never saved a canvas.
    ///
    /// # Errors
    ///
    /// `NotFound` if the profile row is missing, `CorruptData` if the payload
    /// is not a scene, `Transient` on store failure.
    async fn load(&self, user_id: UserId) -> Result<Option<Snapshot>, GatewayError>;

    /// Upsert the snapshot for `user_id`.
    ///
    /// # Errors
    ///
    /// `Transient` on store failure.
    async fn save(&self, user_id: UserId, snapshot: &Snapshot) -> Result<(), GatewayError>;
}

// =============================================================================
// DECODING
// =============================================================================

/// Normalize a raw `canvas_state` column value.
///
/// # Errors
///
/// Returns `CorruptData` when the value is present but is not a scene.
pub fn decode_canvas_state(raw: Option<Value>) -> Result<Option<Snapshot>, GatewayError> {
    let value = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(text)) => {
            if text.trim().is_empty() {
                return Ok(None);
            }
            serde_json::from_str::<Value>(&text).map_err(|e| GatewayError::CorruptData(e.to_string()))?
        }
        Some(value @ Value::Object(_)) => value,
        Some(other) => {
            return Err(GatewayError::CorruptData(format!("unexpected canvas_state type: {}", json_kind(&other))));
        }
    };

    let scene = Scene::from_value(value).map_err(|e| GatewayError::CorruptData(e.to_string()))?;
    let snapshot = scene.snapshot().map_err(|e| GatewayError::CorruptData(e.to_string()))?;
    Ok(Some(snapshot))
}

/// Snapshot as the structured JSON value stores write into `canvas_state`.
///
/// # Errors
///
/// Returns `CorruptData` if the snapshot text is not JSON.
pub fn encode_canvas_state(snapshot: &Snapshot) -> Result<Value, GatewayError> {
    snapshot.to_value().map_err(|e| GatewayError::CorruptData(e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
