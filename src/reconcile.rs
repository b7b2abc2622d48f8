//! Reconciliation engine: the explicit operations that move data
//! between the local document and the remote copy.
//!
//! Sync pushes a TSV-imported snapshot to the endpoint, pull copies the
//! remote snapshot down, hydrate bootstraps local state from the cached
//! mirror, and refresh replaces the mirror wholesale. Destructive
//! overwrites go through an injected confirmation callback so the
//! engine works headless; a declined confirmation is a no-op, not an
//! error.

use chrono::Utc;
use log::{debug, info, warn};

use crate::freshness::{parse_remote_ts, Freshness};
use crate::remote::{self, PostPayload};
use crate::state::AppState;
use crate::types::{Player, SnapshotSource, SyncError};

/// How an operation ended when it was not an error: either the change
/// was applied, or the caller declined the overwrite and nothing was
/// touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrateMode {
    /// Unconditional overwrite; used right after saving new settings or
    /// an explicit first-run bootstrap.
    Force,
    /// Only populate a player whose local snapshot is empty, so the
    /// background refresh never clobbers unsynced local work.
    OnlyIfEmpty,
}

/// How one field reconciles when remote data arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPolicy {
    /// Overwriting existing local data needs an explicit confirmation.
    OverwriteOnConfirm,
    /// The last GET always wins; there is no local-only unsynced state.
    AlwaysFromRemote,
}

impl FieldPolicy {
    pub fn requires_confirmation(self) -> bool {
        matches!(self, FieldPolicy::OverwriteOnConfirm)
    }
}

/// The full per-field reconciliation table. Snapshots are guarded
/// because an overwrite loses a local import; hidden ids are low-risk
/// and simply follow the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePolicy {
    pub snapshot: FieldPolicy,
    pub hidden: FieldPolicy,
}

impl ReconcilePolicy {
    pub const fn standard() -> Self {
        Self {
            snapshot: FieldPolicy::OverwriteOnConfirm,
            hidden: FieldPolicy::AlwaysFromRemote,
        }
    }
}

const SYNC_OVERWRITE_PROMPT: &str =
    "Remote snapshot is newer than your local import. Syncing now will overwrite remote data. Continue?";
const PULL_OVERWRITE_PROMPT: &str =
    "Remote is newer and will overwrite the local snapshot. Continue?";

/// GET the endpoint and replace the cached mirror wholesale, then
/// re-derive every player's remote timestamps and (per policy) re-copy
/// hidden ids. A failed GET leaves the existing mirror untouched.
pub async fn refresh_remote(state: &AppState, client: &reqwest::Client) -> Result<(), SyncError> {
    let settings = state.settings().await;
    let mut mirror = remote::api_get(client, &settings).await.map_err(|e| e.in_op("refresh"))?;

    let now = Utc::now();
    mirror.last_refresh_utc = Some(now);
    {
        let mut cached = state.remote.write().await;
        *cached = mirror.clone();
    }

    let policy = ReconcilePolicy::standard();
    {
        let mut doc = state.data.write().await;
        for player in Player::ALL {
            let entry = mirror.player(player).cloned().unwrap_or_default();
            let pd = doc.player_mut(player);
            pd.timestamps.remote_snapshot_last_updated_utc = entry.last_updated_utc.clone();
            pd.timestamps.remote_hidden_last_updated_utc = entry.hidden_last_updated_utc.clone();
            pd.timestamps.last_refresh = Some(now);
            if policy.hidden == FieldPolicy::AlwaysFromRemote {
                if let Some(hidden) = entry.hidden {
                    pd.hidden_ids = hidden;
                }
            }
        }
    }
    state.persist().await;
    debug!("Remote mirror refreshed");
    Ok(())
}

/// Bootstrap local state from the cached mirror. Hidden ids and their
/// timestamp are always taken from the mirror; snapshot contents only
/// per the mode rule.
pub async fn hydrate(state: &AppState, mode: HydrateMode) {
    let mirror = state.remote.read().await.clone();
    let mut changed = false;
    {
        let mut doc = state.data.write().await;
        for player in Player::ALL {
            let Some(entry) = mirror.player(player) else { continue };
            let pd = doc.player_mut(player);

            pd.hidden_ids = entry.hidden.clone().unwrap_or_default();
            pd.timestamps.remote_hidden_last_updated_utc = entry.hidden_last_updated_utc.clone();

            let Some(snapshot) = &entry.snapshot else { continue };
            if mode == HydrateMode::OnlyIfEmpty && !pd.snapshot.is_empty() {
                continue;
            }
            pd.snapshot = snapshot.clone();
            pd.timestamps.local_imported_at =
                Some(parse_remote_ts(entry.last_updated_utc.as_deref()).unwrap_or_else(Utc::now));
            pd.warnings.clear();
            changed = true;
            info!("Hydrated {} from remote ({:?})", player.display_name(), mode);
        }
    }
    if changed {
        state.persist().await;
    }
}

/// Push a player's local snapshot to the endpoint.
///
/// Validation happens before any network call: the secret must be
/// configured and the snapshot must be a non-empty TSV import. When the
/// remote is newer, the confirmation gates the overwrite. On success
/// `last_synced_remote` is stamped and the mirror is refreshed.
pub async fn sync_now(
    state: &AppState,
    client: &reqwest::Client,
    player: Player,
    confirm: &dyn Fn(&str) -> bool,
) -> Result<Outcome, SyncError> {
    let settings = state.settings().await;
    if settings.secret.is_empty() {
        return Err(SyncError::Validation("sync: set the shared secret first".into()));
    }
    if !state.can_sync(player).await {
        return Err(SyncError::Validation(
            "sync: import a TSV with at least one item before syncing".into(),
        ));
    }

    let policy = ReconcilePolicy::standard();
    if policy.snapshot.requires_confirmation()
        && state.freshness(player).await == Freshness::RemoteNewer
        && !confirm(SYNC_OVERWRITE_PROMPT)
    {
        return Ok(Outcome::Declined);
    }

    let snapshot = state.snapshot(player).await;
    remote::api_post(
        client,
        &settings,
        &PostPayload::set_snapshot(&settings.secret, player.display_name(), &snapshot),
    )
    .await
    .map_err(|e| e.in_op("sync"))?;

    {
        let mut doc = state.data.write().await;
        doc.player_mut(player).last_synced_remote = Some(Utc::now());
    }
    state.persist().await;
    info!("Synced {} snapshot to remote", player.display_name());

    if let Err(e) = refresh_remote(state, client).await {
        warn!("Post-sync refresh failed: {}", e);
    }
    Ok(Outcome::Applied)
}

/// Copy the remote snapshot into local state, refreshing the mirror
/// first so the decision is made against current data.
pub async fn pull_latest(
    state: &AppState,
    client: &reqwest::Client,
    player: Player,
    confirm: &dyn Fn(&str) -> bool,
) -> Result<Outcome, SyncError> {
    refresh_remote(state, client).await.map_err(|e| e.in_op("pull"))?;
    pull_from_mirror(state, player, confirm).await
}

/// The local half of pull, against the already-refreshed mirror.
async fn pull_from_mirror(
    state: &AppState,
    player: Player,
    confirm: &dyn Fn(&str) -> bool,
) -> Result<Outcome, SyncError> {
    let entry = state.remote.read().await.player(player).cloned().unwrap_or_default();
    let Some(snapshot) = entry.snapshot else {
        return Err(SyncError::Validation(
            "pull: no remote snapshot found for this player".into(),
        ));
    };

    let remote_ts = parse_remote_ts(entry.last_updated_utc.as_deref());
    let (local_imported_at, local_non_empty) = {
        let doc = state.data.read().await;
        let pd = doc.player(player);
        (pd.timestamps.local_imported_at, !pd.snapshot.is_empty())
    };

    let remote_newer = matches!(
        (remote_ts, local_imported_at),
        (Some(remote), Some(local)) if remote > local
    );
    if remote_newer && local_non_empty && !confirm(PULL_OVERWRITE_PROMPT) {
        return Ok(Outcome::Declined);
    }

    {
        let mut doc = state.data.write().await;
        let pd = doc.player_mut(player);
        pd.snapshot = snapshot;
        pd.snapshot.meta.source = Some(SnapshotSource::Remote);
        pd.timestamps.local_imported_at = Some(remote_ts.unwrap_or_else(Utc::now));
        pd.hidden_ids = entry.hidden.unwrap_or_default();
        // A pulled snapshot carries no parse warnings.
        pd.warnings.clear();
    }
    state.persist().await;
    info!("Pulled remote snapshot for {}", player.display_name());
    Ok(Outcome::Applied)
}

/// Push a player's hidden-id set to the endpoint. Skipped silently when
/// the endpoint or secret is not configured; a failed push is reported
/// but never rolls back the local toggle.
pub async fn push_hidden(
    state: &AppState,
    client: &reqwest::Client,
    player: Player,
) -> Result<(), SyncError> {
    let settings = state.settings().await;
    if settings.secret.is_empty() || settings.endpoint_url.is_empty() {
        debug!("Hidden push skipped: endpoint or secret not configured");
        return Ok(());
    }

    let hidden = state.hidden_ids(player).await;
    remote::api_post(
        client,
        &settings,
        &PostPayload::set_hidden(&settings.secret, player.display_name(), &hidden),
    )
    .await
    .map_err(|e| e.in_op("hidden push"))?;

    // Let the authoritative hiddenLastUpdatedUtc propagate back.
    if let Err(e) = refresh_remote(state, client).await {
        warn!("Post-hidden-push refresh failed: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Item, RemotePlayer, Settings, Snapshot, SnapshotMeta};

    fn no_confirm(_: &str) -> bool {
        panic!("confirmation must not be requested");
    }

    async fn state_with_secret() -> AppState {
        let state = AppState::in_memory();
        state
            .save_settings(Settings {
                endpoint_url: "http://127.0.0.1:1/unreachable".into(),
                secret: "hunter2".into(),
            })
            .await;
        state
    }

    fn remote_snapshot(qty: i64) -> Snapshot {
        Snapshot {
            items: vec![Item { id: 9, name: "Remote coal".into(), qty }],
            meta: SnapshotMeta { imported_at_local: None, source: Some(SnapshotSource::Tsv), app_version: None },
        }
    }

    #[test]
    fn standard_policy_table() {
        let policy = ReconcilePolicy::standard();
        assert_eq!(policy.snapshot, FieldPolicy::OverwriteOnConfirm);
        assert_eq!(policy.hidden, FieldPolicy::AlwaysFromRemote);
        assert!(policy.snapshot.requires_confirmation());
        assert!(!policy.hidden.requires_confirmation());
    }

    #[tokio::test]
    async fn sync_rejects_missing_secret_before_network() {
        let state = AppState::in_memory();
        state.import_tsv(Player::Ad, "1\tCoal\t5").await;
        let client = reqwest::Client::new();
        let err = sync_now(&state, &client, Player::Ad, &no_confirm).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[tokio::test]
    async fn sync_rejects_remote_sourced_snapshot_before_network() {
        let state = state_with_secret().await;
        {
            let mut doc = state.data.write().await;
            let pd = doc.player_mut(Player::Ad);
            pd.snapshot = remote_snapshot(3);
            pd.snapshot.meta.source = Some(SnapshotSource::Remote);
            pd.timestamps.local_imported_at = Some(Utc::now());
        }
        let client = reqwest::Client::new();
        // A validation error (not a network error) proves the endpoint
        // was never contacted; the panicking callback proves no
        // confirmation was requested either.
        let err = sync_now(&state, &client, Player::Ad, &no_confirm).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[tokio::test]
    async fn sync_rejects_empty_snapshot_before_network() {
        let state = state_with_secret().await;
        let client = reqwest::Client::new();
        let err = sync_now(&state, &client, Player::Sic, &no_confirm).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[tokio::test]
    async fn pull_fails_without_remote_snapshot() {
        let state = AppState::in_memory();
        {
            let mut mirror = state.remote.write().await;
            mirror.players.insert(
                Player::Ad.display_name().to_string(),
                RemotePlayer { hidden: Some(vec![1]), ..Default::default() },
            );
        }
        let err = pull_from_mirror(&state, Player::Ad, &no_confirm).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[tokio::test]
    async fn declined_pull_leaves_local_state_untouched() {
        let state = AppState::in_memory();
        state.import_tsv(Player::Ad, "1\tCoal\t5").await;
        let before = state.data.read().await.player(Player::Ad).clone();

        {
            let mut mirror = state.remote.write().await;
            mirror.players.insert(
                Player::Ad.display_name().to_string(),
                RemotePlayer {
                    snapshot: Some(remote_snapshot(3)),
                    hidden: Some(vec![9]),
                    last_updated_utc: Some("2099-01-01T00:00:00Z".into()),
                    hidden_last_updated_utc: None,
                },
            );
        }

        let outcome = pull_from_mirror(&state, Player::Ad, &|_| false).await.unwrap();
        assert_eq!(outcome, Outcome::Declined);

        let after = state.data.read().await.player(Player::Ad).clone();
        assert_eq!(
            serde_json::to_string(&before).unwrap(),
            serde_json::to_string(&after).unwrap()
        );
    }

    #[tokio::test]
    async fn confirmed_pull_copies_snapshot_and_tags_source() {
        let state = AppState::in_memory();
        state.import_tsv(Player::Ad, "1\tCoal\t5\nbad row").await;
        assert_eq!(state.player_summary(Player::Ad).await.warnings, 1);

        {
            let mut mirror = state.remote.write().await;
            mirror.players.insert(
                Player::Ad.display_name().to_string(),
                RemotePlayer {
                    snapshot: Some(remote_snapshot(3)),
                    hidden: Some(vec![9]),
                    last_updated_utc: Some("2099-01-01T00:00:00Z".into()),
                    hidden_last_updated_utc: None,
                },
            );
        }

        let outcome = pull_from_mirror(&state, Player::Ad, &|_| true).await.unwrap();
        assert_eq!(outcome, Outcome::Applied);

        let pd = state.data.read().await.player(Player::Ad).clone();
        assert_eq!(pd.snapshot.items[0].id, 9);
        assert_eq!(pd.snapshot.meta.source, Some(SnapshotSource::Remote));
        assert_eq!(pd.hidden_ids, vec![9]);
        assert!(pd.warnings.is_empty());
        assert_eq!(
            pd.timestamps.local_imported_at,
            parse_remote_ts(Some("2099-01-01T00:00:00Z"))
        );
        // A pulled snapshot cannot be re-synced without a fresh import.
        assert!(!state.can_sync(Player::Ad).await);
    }

    #[tokio::test]
    async fn pull_without_newer_remote_needs_no_confirmation() {
        let state = AppState::in_memory();
        state.import_tsv(Player::Ad, "1\tCoal\t5").await;

        {
            let mut mirror = state.remote.write().await;
            mirror.players.insert(
                Player::Ad.display_name().to_string(),
                RemotePlayer {
                    snapshot: Some(remote_snapshot(3)),
                    hidden: None,
                    last_updated_utc: Some("2000-01-01T00:00:00Z".into()),
                    hidden_last_updated_utc: None,
                },
            );
        }

        let outcome = pull_from_mirror(&state, Player::Ad, &no_confirm).await.unwrap();
        assert_eq!(outcome, Outcome::Applied);
    }

    #[tokio::test]
    async fn hydrate_only_if_empty_skips_populated_snapshot() {
        let state = AppState::in_memory();
        state.import_tsv(Player::Ad, "1\tCoal\t5").await;

        {
            let mut mirror = state.remote.write().await;
            mirror.players.insert(
                Player::Ad.display_name().to_string(),
                RemotePlayer {
                    snapshot: Some(remote_snapshot(3)),
                    hidden: Some(vec![7]),
                    last_updated_utc: Some("2099-01-01T00:00:00Z".into()),
                    hidden_last_updated_utc: Some("2099-01-01T00:00:00Z".into()),
                },
            );
            mirror.players.insert(
                Player::Sic.display_name().to_string(),
                RemotePlayer {
                    snapshot: Some(remote_snapshot(4)),
                    hidden: None,
                    last_updated_utc: None,
                    hidden_last_updated_utc: None,
                },
            );
        }

        hydrate(&state, HydrateMode::OnlyIfEmpty).await;

        // Ad keeps the local import, but hidden state still refreshed.
        let ad = state.data.read().await.player(Player::Ad).clone();
        assert_eq!(ad.snapshot.items[0].id, 1);
        assert_eq!(ad.hidden_ids, vec![7]);
        assert_eq!(
            ad.timestamps.remote_hidden_last_updated_utc.as_deref(),
            Some("2099-01-01T00:00:00Z")
        );

        // Sic was empty and gets populated.
        let sic = state.data.read().await.player(Player::Sic).clone();
        assert_eq!(sic.snapshot.items[0].qty, 4);
        assert!(sic.timestamps.local_imported_at.is_some());
    }

    #[tokio::test]
    async fn hydrate_force_overwrites_populated_snapshot() {
        let state = AppState::in_memory();
        state.import_tsv(Player::Ad, "1\tCoal\t5").await;

        {
            let mut mirror = state.remote.write().await;
            mirror.players.insert(
                Player::Ad.display_name().to_string(),
                RemotePlayer {
                    snapshot: Some(remote_snapshot(3)),
                    hidden: None,
                    last_updated_utc: Some("2024-05-01T00:00:00Z".into()),
                    hidden_last_updated_utc: None,
                },
            );
        }

        hydrate(&state, HydrateMode::Force).await;

        let ad = state.data.read().await.player(Player::Ad).clone();
        assert_eq!(ad.snapshot.items[0].id, 9);
        // Absent remote hidden list clears the local one on hydrate.
        assert!(ad.hidden_ids.is_empty());
        assert_eq!(
            ad.timestamps.local_imported_at,
            parse_remote_ts(Some("2024-05-01T00:00:00Z"))
        );
        assert!(ad.warnings.is_empty());
    }

    #[tokio::test]
    async fn push_hidden_is_a_noop_without_configuration() {
        let state = AppState::in_memory();
        state.toggle_hidden(Player::Ad, 5).await;
        let client = reqwest::Client::new();
        // No endpoint or secret configured: silently skipped, local
        // toggle stands.
        push_hidden(&state, &client, Player::Ad).await.unwrap();
        assert_eq!(state.hidden_ids(Player::Ad).await, vec![5]);
    }
}
