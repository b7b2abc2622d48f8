//! HTTP client for the shared bank endpoint.
//!
//! Contract: GET returns the full remote document; POST carries the
//! shared secret plus one action (`setSnapshot` or `setHidden`) for one
//! player. The secret is a bearer credential validated server-side; the
//! client only requires it to be non-empty.

use log::debug;
use serde::Serialize;

use crate::types::{RemoteMirror, Settings, Snapshot, SyncError};

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PostAction {
    SetSnapshot,
    SetHidden,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPayload<'a> {
    pub secret: &'a str,
    pub action: PostAction,
    pub player: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<&'a Snapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<&'a [i64]>,
}

impl<'a> PostPayload<'a> {
    pub fn set_snapshot(secret: &'a str, player: &'a str, snapshot: &'a Snapshot) -> Self {
        Self { secret, action: PostAction::SetSnapshot, player, snapshot: Some(snapshot), hidden: None }
    }

    pub fn set_hidden(secret: &'a str, player: &'a str, hidden: &'a [i64]) -> Self {
        Self { secret, action: PostAction::SetHidden, player, snapshot: None, hidden: Some(hidden) }
    }
}

/// Fetch the remote document. `last_refresh_utc` is left for the caller
/// to stamp.
pub async fn api_get(client: &reqwest::Client, settings: &Settings) -> Result<RemoteMirror, SyncError> {
    if settings.endpoint_url.is_empty() {
        return Err(SyncError::Validation("endpoint URL missing".into()));
    }

    let resp = client
        .get(&settings.endpoint_url)
        .send()
        .await
        .map_err(|e| SyncError::Network(format!("GET failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(SyncError::Network(format!("GET failed: {}", resp.status())));
    }

    resp.json::<RemoteMirror>()
        .await
        .map_err(|e| SyncError::Network(format!("GET body invalid: {e}")))
}

/// POST one action; returns the endpoint's acknowledgement body.
pub async fn api_post(
    client: &reqwest::Client,
    settings: &Settings,
    payload: &PostPayload<'_>,
) -> Result<serde_json::Value, SyncError> {
    if settings.endpoint_url.is_empty() {
        return Err(SyncError::Validation("endpoint URL missing".into()));
    }

    debug!("POST {:?} for {}", payload.action, payload.player);
    let resp = client
        .post(&settings.endpoint_url)
        .json(payload)
        .send()
        .await
        .map_err(|e| SyncError::Network(format!("POST failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(SyncError::Network(format!("POST failed: {}", resp.status())));
    }

    resp.json::<serde_json::Value>()
        .await
        .map_err(|e| SyncError::Network(format!("POST ack invalid: {e}")))
}

/// Settings-screen connection probe: fetch once and report the server
/// clock, if the endpoint exposes one.
pub async fn test_connection(
    client: &reqwest::Client,
    settings: &Settings,
) -> Result<Option<String>, SyncError> {
    let mirror = api_get(client, settings).await?;
    Ok(mirror.server_time_utc)
}
