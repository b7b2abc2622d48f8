//! Shared application state.
//!
//! Holds the persisted local document and the cached remote mirror
//! behind RwLocks. All mutation happens through these methods; every
//! local mutation is persisted immediately.

use chrono::Utc;
use log::{debug, info, warn};
use std::path::PathBuf;
use tokio::sync::RwLock;

use crate::freshness::{self, Freshness};
use crate::persistence;
use crate::tsv::parse_tsv;
use crate::types::{
    Item, LocalDocument, Player, RemoteMirror, Settings, Snapshot, SnapshotMeta, SnapshotSource,
    SortDir, SortKey, SortState,
};

/// Per-player header line: item counts plus sync status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSummary {
    pub unique_items: usize,
    pub total_qty: i64,
    pub freshness: Freshness,
    pub warnings: usize,
}

pub struct AppState {
    /// Local document (settings + both players). Persisted as a whole.
    pub data: RwLock<LocalDocument>,
    /// Cached remote mirror; replaced wholesale on each refresh.
    pub remote: RwLock<RemoteMirror>,
    store_path: Option<PathBuf>,
}

impl AppState {
    fn with_document(mut doc: LocalDocument, store_path: Option<PathBuf>) -> Self {
        doc.normalize();
        Self {
            data: RwLock::new(doc),
            remote: RwLock::new(RemoteMirror::default()),
            store_path,
        }
    }

    /// Fresh state backed by the on-disk document location.
    pub fn new() -> Self {
        Self::with_document(LocalDocument::default(), persistence::document_path())
    }

    /// Fresh state with no disk backing. Used by tests.
    pub fn in_memory() -> Self {
        Self::with_document(LocalDocument::default(), None)
    }

    /// Load the persisted document, falling back to full defaults when
    /// it is missing or corrupt.
    pub fn load_from_disk() -> Self {
        let store_path = persistence::document_path();
        let doc = match &store_path {
            Some(path) => match persistence::load_document(path) {
                Ok(Some(doc)) => {
                    debug!("Loaded local document from {}", path.display());
                    doc
                }
                Ok(None) => LocalDocument::default(),
                Err(e) => {
                    warn!("Failed to read local document: {}", e);
                    LocalDocument::default()
                }
            },
            None => LocalDocument::default(),
        };
        Self::with_document(doc, store_path)
    }

    /// Write the whole document to disk. Errors are logged, never
    /// propagated; the in-memory document stays authoritative.
    pub async fn persist(&self) {
        let Some(path) = &self.store_path else { return };
        let doc = self.data.read().await.clone();
        if let Err(e) = persistence::save_document(path, &doc) {
            warn!("Failed to persist local document: {}", e);
        }
    }

    pub async fn settings(&self) -> Settings {
        self.data.read().await.settings.clone()
    }

    pub async fn save_settings(&self, settings: Settings) {
        {
            let mut doc = self.data.write().await;
            doc.settings = settings;
        }
        info!("Settings saved");
        self.persist().await;
    }

    /// Replace a player's snapshot from raw TSV text. Returns the parse
    /// warnings, which are also stored on the player.
    pub async fn import_tsv(&self, player: Player, text: &str) -> Vec<String> {
        let parsed = parse_tsv(text);
        let now = Utc::now();
        {
            let mut doc = self.data.write().await;
            let pd = doc.player_mut(player);
            pd.snapshot = Snapshot {
                items: parsed.items,
                meta: SnapshotMeta {
                    imported_at_local: Some(now),
                    source: Some(SnapshotSource::Tsv),
                    app_version: Some(env!("CARGO_PKG_VERSION").to_string()),
                },
            };
            pd.timestamps.local_imported_at = Some(now);
            pd.warnings = parsed.warnings.clone();
            info!(
                "Imported TSV for {}: {} items, {} warnings",
                player.display_name(),
                pd.snapshot.items.len(),
                pd.warnings.len()
            );
        }
        self.persist().await;
        parsed.warnings
    }

    /// Symmetric-difference toggle on one hidden id. Persisted
    /// immediately; the remote push is a separate, non-rollback step
    /// (`reconcile::push_hidden`). Returns whether the id is now hidden.
    pub async fn toggle_hidden(&self, player: Player, id: i64) -> bool {
        let now_hidden;
        {
            let mut doc = self.data.write().await;
            let pd = doc.player_mut(player);
            if let Some(pos) = pd.hidden_ids.iter().position(|&h| h == id) {
                pd.hidden_ids.remove(pos);
                now_hidden = false;
            } else {
                pd.hidden_ids.push(id);
                now_hidden = true;
            }
            debug!("Toggled hidden id {} for {}: hidden={}", id, player.display_name(), now_hidden);
        }
        self.persist().await;
        now_hidden
    }

    pub async fn hidden_ids(&self, player: Player) -> Vec<i64> {
        self.data.read().await.player(player).hidden_ids.clone()
    }

    pub async fn set_show_hidden(&self, player: Player, show: bool) {
        {
            let mut doc = self.data.write().await;
            doc.player_mut(player).show_hidden_items = show;
        }
        self.persist().await;
    }

    /// The player's items with hidden ids filtered out, unless the
    /// caller asks for them. Feeds both the compare engine and the
    /// player tables.
    pub async fn visible_items(&self, player: Player, include_hidden: bool) -> Vec<Item> {
        let doc = self.data.read().await;
        let pd = doc.player(player);
        pd.snapshot
            .items
            .iter()
            .filter(|item| include_hidden || !pd.hidden_ids.contains(&item.id))
            .cloned()
            .collect()
    }

    /// Player table rows: free-text term (name or id substring),
    /// unknown-name filter, hidden filtering per `show_hidden_items`,
    /// sorted by the given column.
    pub async fn player_table(
        &self,
        player: Player,
        term: &str,
        unknown_only: bool,
        sort: SortState,
    ) -> Vec<Item> {
        let show_hidden = self.data.read().await.player(player).show_hidden_items;
        let term = term.trim().to_lowercase();
        let mut items: Vec<Item> = self
            .visible_items(player, show_hidden)
            .await
            .into_iter()
            .filter(|item| {
                term.is_empty()
                    || item.name.to_lowercase().contains(&term)
                    || item.id.to_string().contains(&term)
            })
            .filter(|item| {
                !unknown_only || item.name.is_empty() || item.name.eq_ignore_ascii_case("unknown")
            })
            .collect();
        sort_items(&mut items, sort);
        items
    }

    pub async fn snapshot(&self, player: Player) -> Snapshot {
        self.data.read().await.player(player).snapshot.clone()
    }

    pub async fn has_local_snapshot(&self, player: Player) -> bool {
        let doc = self.data.read().await;
        let pd = doc.player(player);
        pd.timestamps.local_imported_at.is_some() && !pd.snapshot.is_empty()
    }

    /// Sync requires a non-empty local snapshot that came from a TSV
    /// import. A remote-sourced snapshot must be re-imported first.
    pub async fn can_sync(&self, player: Player) -> bool {
        if !self.has_local_snapshot(player).await {
            return false;
        }
        let doc = self.data.read().await;
        doc.player(player).snapshot.meta.source == Some(SnapshotSource::Tsv)
    }

    /// Freshness is always recomputed from the current timestamps, not
    /// a cached classification.
    pub async fn freshness(&self, player: Player) -> Freshness {
        let doc = self.data.read().await;
        let ts = &doc.player(player).timestamps;
        freshness::evaluate(ts.local_imported_at, ts.remote_snapshot_last_updated_utc.as_deref())
    }

    pub async fn player_summary(&self, player: Player) -> PlayerSummary {
        let freshness = self.freshness(player).await;
        let doc = self.data.read().await;
        let pd = doc.player(player);
        PlayerSummary {
            unique_items: pd.snapshot.items.len(),
            total_qty: pd.snapshot.total_qty(),
            freshness,
            warnings: pd.warnings.len(),
        }
    }

    /// Reinstate defaults for one player, behind the injected
    /// confirmation.
    pub async fn reset_player(&self, player: Player, confirm: &dyn Fn(&str) -> bool) -> bool {
        let prompt = format!("Reset local data for {}?", player.display_name());
        if !confirm(&prompt) {
            return false;
        }
        {
            let mut doc = self.data.write().await;
            *doc.player_mut(player) = Default::default();
        }
        info!("Reset local data for {}", player.display_name());
        self.persist().await;
        true
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_items(items: &mut [Item], sort: SortState) {
    items.sort_by(|a, b| {
        let ord = match sort.key {
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::Id => a.id.cmp(&b.id),
            _ => a.qty.cmp(&b.qty),
        };
        match sort.dir {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        }
    });
}
