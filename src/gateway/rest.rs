//! REST gateway for the hosted backend's auto-generated table API.
//!
//! Thin HTTP wrapper around `/rest/v1/<table>`. URL building, status mapping
//! and row parsing are pure functions so they can be tested without a server.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{CanvasGateway, GatewayError, UserId, decode_canvas_state, encode_canvas_state};
use crate::consts::{STORE_CONNECT_TIMEOUT_SECS, STORE_REQUEST_TIMEOUT_SECS};
use crate::scene::Snapshot;

const UPSERT_PREFER: &str = "resolution=merge-duplicates,return=minimal";

// =============================================================================
// CLIENT
// =============================================================================

pub struct RestGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    table: String,
}

impl RestGateway {
    /// Build a client for `base_url`. Requests authenticate with
    /// `access_token` when present and fall back to the anonymous `api_key`.
    ///
    /// # Errors
    ///
    /// Returns `Transient` if the HTTP client cannot be constructed.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        access_token: Option<String>,
        table: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(STORE_REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(STORE_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| GatewayError::Transient(e.to_string()))?;
        Ok(Self { http, base_url: base_url.into(), api_key: api_key.into(), access_token, table: table.into() })
    }

    fn bearer(&self) -> &str {
        self.access_token.as_deref().unwrap_or(&self.api_key)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(u16, String), GatewayError> {
        let response = request
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(|e| GatewayError::Transient(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transient(e.to_string()))?;
        Ok((status, body))
    }
}

#[async_trait]
impl CanvasGateway for RestGateway {
    async fn load(&self, user_id: UserId) -> Result<Option<Snapshot>, GatewayError> {
        let url = select_url(&self.base_url, &self.table, user_id);
        let (status, body) = self.send(self.http.get(url)).await?;
        check_status(user_id, status, &body)?;
        debug!(%user_id, status, "canvas row fetched");
        parse_profile_rows(user_id, &body)
    }

    async fn save(&self, user_id: UserId, snapshot: &Snapshot) -> Result<(), GatewayError> {
        let body = upsert_body(user_id, snapshot)?;
        let request = self
            .http
            .post(upsert_url(&self.base_url, &self.table))
            .header("Prefer", UPSERT_PREFER)
            .json(&body);
        let (status, text) = self.send(request).await?;
        check_save_status(status, &text)?;
        debug!(%user_id, status, "canvas upserted");
        Ok(())
    }
}

// =============================================================================
// WIRE HELPERS
// =============================================================================

fn table_url(base_url: &str, table: &str) -> String {
    format!("{}/rest/v1/{table}", base_url.trim_end_matches('/'))
}

fn select_url(base_url: &str, table: &str, user_id: UserId) -> String {
    format!("{}?id=eq.{user_id}&select=id,canvas_state", table_url(base_url, table))
}

fn upsert_url(base_url: &str, table: &str) -> String {
    format!("{}?on_conflict=id", table_url(base_url, table))
}

fn upsert_body(user_id: UserId, snapshot: &Snapshot) -> Result<Value, GatewayError> {
    let canvas_state = encode_canvas_state(snapshot)?;
    Ok(serde_json::json!([{ "id": user_id, "canvas_state": canvas_state }]))
}

fn check_status(user_id: UserId, status: u16, body: &str) -> Result<(), GatewayError> {
    match status {
        200..=299 => Ok(()),
        404 => Err(GatewayError::NotFound(user_id)),
        _ => Err(GatewayError::Transient(format!("status {status}: {body}"))),
    }
}

/// Any non-2xx answer to an upsert is transient.
fn check_save_status(status: u16, body: &str) -> Result<(), GatewayError> {
    match status {
        200..=299 => Ok(()),
        _ => Err(GatewayError::Transient(format!("status {status}: {body}"))),
    }
}

#[derive(serde::Deserialize)]
struct ProfileRow {
    #[serde(default)]
    canvas_state: Option<Value>,
}

/// The select endpoint answers with an array; no rows means no profile.
fn parse_profile_rows(user_id: UserId, body: &str) -> Result<Option<Snapshot>, GatewayError> {
    let rows: Vec<ProfileRow> =
        serde_json::from_str(body).map_err(|e| GatewayError::Transient(format!("unexpected response: {e}")))?;
    match rows.into_iter().next() {
        Some(row) => decode_canvas_state(row.canvas_state),
        None => Err(GatewayError::NotFound(user_id)),
    }
}

#[cfg(test)]
#[path = "rest_test.rs"]
mod rest_test;
