//! Core data types for the bank sync companion.
//!
//! Wire and document fields use camelCase so the JSON matches the
//! shared endpoint contract and the persisted local document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// One bank item inside a snapshot. `qty` is the sum of all TSV rows
/// that contributed this id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    /// May be empty or "unknown" for items the export could not name.
    #[serde(default)]
    pub name: String,
    pub qty: i64,
}

/// Where the current snapshot came from. A remote-sourced snapshot
/// cannot be re-synced without an explicit re-import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Tsv,
    Remote,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotMeta {
    pub imported_at_local: Option<DateTime<Utc>>,
    pub source: Option<SnapshotSource>,
    pub app_version: Option<String>,
}

/// Full inventory for one player at one point in time. Items keep
/// first-seen id order from the import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub items: Vec<Item>,
    pub meta: SnapshotMeta,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_qty(&self) -> i64 {
        self.items.iter().map(|i| i.qty).sum()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerTimestamps {
    /// Raw remote `lastUpdatedUtc` as received; parsed lazily by the
    /// freshness evaluator so an unparseable value degrades to "In sync".
    pub remote_snapshot_last_updated_utc: Option<String>,
    pub remote_hidden_last_updated_utc: Option<String>,
    pub local_imported_at: Option<DateTime<Utc>>,
    pub last_refresh: Option<DateTime<Utc>>,
}

/// Per-player local state: the snapshot plus everything tracked
/// independently of it (hidden ids, timestamps, import warnings).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerState {
    pub snapshot: Snapshot,
    /// Set semantics; order is not significant.
    pub hidden_ids: Vec<i64>,
    pub timestamps: PlayerTimestamps,
    pub last_synced_remote: Option<DateTime<Utc>>,
    pub warnings: Vec<String>,
    pub show_hidden_items: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub endpoint_url: String,
    pub secret: String,
}

/// The two fixed player identities. Replaces loose string keys so a
/// caller can never address a player that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Player {
    Ad,
    Sic,
}

impl Player {
    pub const ALL: [Player; 2] = [Player::Ad, Player::Sic];

    /// Wire name used by the remote endpoint and the local document.
    pub fn display_name(self) -> &'static str {
        match self {
            Player::Ad => "Ad The Saint",
            Player::Sic => "Sic Saint",
        }
    }
}

/// Column a view is sorted by. Player tables use Name/Id/Qty; the
/// compare view additionally sorts by the per-side quantities and delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Id,
    Qty,
    AdQty,
    SicQty,
    Delta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

/// Sort state for one view. Clicking the active column again reverses
/// the direction; a new column resets to ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub key: SortKey,
    pub dir: SortDir,
}

impl Default for SortState {
    fn default() -> Self {
        Self { key: SortKey::Name, dir: SortDir::Asc }
    }
}

impl SortState {
    pub fn toggle(&mut self, key: SortKey) {
        if self.key == key {
            self.dir = match self.dir {
                SortDir::Asc => SortDir::Desc,
                SortDir::Desc => SortDir::Asc,
            };
        } else {
            self.key = key;
            self.dir = SortDir::Asc;
        }
    }
}

/// One player's entry in the remote endpoint's GET response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemotePlayer {
    pub snapshot: Option<Snapshot>,
    pub hidden: Option<Vec<i64>>,
    pub last_updated_utc: Option<String>,
    pub hidden_last_updated_utc: Option<String>,
}

/// Cached copy of the remote endpoint's last GET response. Overwritten
/// wholesale on every successful refresh, never merged field-by-field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteMirror {
    pub players: HashMap<String, RemotePlayer>,
    pub server_time_utc: Option<String>,
    #[serde(skip_deserializing)]
    pub last_refresh_utc: Option<DateTime<Utc>>,
}

impl RemoteMirror {
    pub fn player(&self, player: Player) -> Option<&RemotePlayer> {
        self.players.get(player.display_name())
    }
}

/// The single persisted JSON value: settings plus both players' state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalDocument {
    pub settings: Settings,
    pub players: HashMap<String, PlayerState>,
}

impl LocalDocument {
    /// Make sure both fixed players have an entry, so reads never miss.
    pub fn normalize(&mut self) {
        for player in Player::ALL {
            self.players.entry(player.display_name().to_string()).or_default();
        }
    }

    pub fn player(&self, player: Player) -> &PlayerState {
        // normalize() runs at construction; entries for the two fixed
        // players are never removed afterwards.
        &self.players[player.display_name()]
    }

    pub fn player_mut(&mut self, player: Player) -> &mut PlayerState {
        self.players.entry(player.display_name().to_string()).or_default()
    }
}

/// Failures surfaced to the caller. Row-level parse problems are
/// warnings, not errors, and a declined confirmation is a no-op rather
/// than an error (see `reconcile::Outcome`).
#[derive(Debug, Error)]
pub enum SyncError {
    /// Rejected before any network call (missing secret, empty or
    /// remote-sourced snapshot, missing remote data).
    #[error("{0}")]
    Validation(String),
    /// Transport failure or non-2xx response; local state is left as it
    /// was before the call.
    #[error("{0}")]
    Network(String),
}

impl SyncError {
    /// Prefix the message with the operation that failed.
    pub fn in_op(self, op: &str) -> SyncError {
        match self {
            SyncError::Validation(m) => SyncError::Validation(format!("{op}: {m}")),
            SyncError::Network(m) => SyncError::Network(format!("{op}: {m}")),
        }
    }
}
