//! In-process gateway backed by a map of raw `canvas_state` values.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::{CanvasGateway, GatewayError, UserId, decode_canvas_state, encode_canvas_state};
use crate::scene::Snapshot;

/// Profiles keyed by user id. A registered user with `None` has never saved.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    profiles: Mutex<HashMap<UserId, Option<Value>>>,
}

impl MemoryGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a profile row with no saved canvas.
    pub async fn register_user(&self, user_id: UserId) {
        self.profiles.lock().await.entry(user_id).or_insert(None);
    }

    /// Store a raw column value as-is, bypassing validation.
    pub async fn put_raw(&self, user_id: UserId, raw: Value) {
        self.profiles.lock().await.insert(user_id, Some(raw));
    }

    /// The raw column value last written for `user_id`.
    pub async fn stored(&self, user_id: UserId) -> Option<Value> {
        self.profiles.lock().await.get(&user_id).cloned().flatten()
    }
}

#[async_trait]
impl CanvasGateway for MemoryGateway {
    async fn load(&self, user_id: UserId) -> Result<Option<Snapshot>, GatewayError> {
        let raw = {
            let profiles = self.profiles.lock().await;
            match profiles.get(&user_id) {
                Some(raw) => raw.clone(),
                None => return Err(GatewayError::NotFound(user_id)),
            }
        };
        decode_canvas_state(raw)
    }

    async fn save(&self, user_id: UserId, snapshot: &Snapshot) -> Result<(), GatewayError> {
        let value = encode_canvas_state(snapshot)?;
        self.profiles.lock().await.insert(user_id, Some(value));
        debug!(%user_id, "canvas stored in memory");
        Ok(())
    }
}
