//! Postgres gateway over the `profiles` table.
//!
//! Expects `profiles(id uuid primary key, canvas_state jsonb)`. Schema
//! management lives with the backend, not here.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use super::{CanvasGateway, GatewayError, UserId, decode_canvas_state, encode_canvas_state};
use crate::config::env_parse;
use crate::consts::DEFAULT_DB_MAX_CONNECTIONS;
use crate::scene::Snapshot;

/// Initialize the PostgreSQL connection pool.
///
/// # Errors
///
/// Returns an error if the connection fails.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let max_connections = env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS);
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    info!(max_connections, "database pool ready");
    Ok(pool)
}

pub struct PgGateway {
    pool: PgPool,
}

impl PgGateway {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and wrap a fresh pool.
    ///
    /// # Errors
    ///
    /// Returns `Transient` if the database is unreachable.
    pub async fn connect(database_url: &str) -> Result<Self, GatewayError> {
        let pool = init_pool(database_url).await.map_err(transient)?;
        Ok(Self::new(pool))
    }
}

fn transient(e: sqlx::Error) -> GatewayError {
    GatewayError::Transient(e.to_string())
}

#[async_trait]
impl CanvasGateway for PgGateway {
    async fn load(&self, user_id: UserId) -> Result<Option<Snapshot>, GatewayError> {
        let row = sqlx::query("SELECT canvas_state FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(transient)?;
        let Some(row) = row else {
            return Err(GatewayError::NotFound(user_id));
        };
        let raw: Option<Value> = row
            .try_get("canvas_state")
            .map_err(|e| GatewayError::CorruptData(e.to_string()))?;
        debug!(%user_id, present = raw.is_some(), "canvas row fetched");
        decode_canvas_state(raw)
    }

    async fn save(&self, user_id: UserId, snapshot: &Snapshot) -> Result<(), GatewayError> {
        let value = encode_canvas_state(snapshot)?;
        sqlx::query(
            r"INSERT INTO profiles (id, canvas_state)
              VALUES ($1, $2)
              ON CONFLICT (id) DO UPDATE SET canvas_state = EXCLUDED.canvas_state",
        )
        .bind(user_id)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(transient)?;
        debug!(%user_id, "canvas upserted");
        Ok(())
    }
}
