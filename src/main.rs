//! OSRS Bank Companion - headless sync daemon.
//!
//! Loads the persisted local document, optionally imports TSV exports
//! and applies settings from the environment, bootstraps local state
//! from the remote endpoint, and then keeps the remote mirror fresh on
//! a fixed interval.

use env_logger::Builder;
use log::{debug, info, warn, LevelFilter};
use std::sync::Arc;
use std::time::Duration;

use osrs_bank_companion::compare;
use osrs_bank_companion::reconcile::{self, HydrateMode, Outcome};
use osrs_bank_companion::state::AppState;
use osrs_bank_companion::types::{Player, Settings};

const POLL_INTERVAL: Duration = Duration::from_secs(25);

/// Non-interactive runs must never approve a destructive overwrite.
fn decline_overwrite(prompt: &str) -> bool {
    warn!("Overwrite declined (non-interactive): {}", prompt);
    false
}

fn import_env_var(player: Player) -> &'static str {
    match player {
        Player::Ad => "OSRS_BANK_IMPORT_AD",
        Player::Sic => "OSRS_BANK_IMPORT_SIC",
    }
}

/// Apply OSRS_BANK_ENDPOINT / OSRS_BANK_SECRET overrides, if present.
async fn apply_env_settings(state: &AppState) {
    let endpoint = std::env::var("OSRS_BANK_ENDPOINT").ok();
    let secret = std::env::var("OSRS_BANK_SECRET").ok();
    if endpoint.is_none() && secret.is_none() {
        return;
    }
    let current = state.settings().await;
    state
        .save_settings(Settings {
            endpoint_url: endpoint.unwrap_or(current.endpoint_url),
            secret: secret.unwrap_or(current.secret),
        })
        .await;
}

/// Import and sync any TSV files pointed at by the environment.
async fn import_from_env(state: &AppState, client: &reqwest::Client) {
    for player in Player::ALL {
        let Ok(path) = std::env::var(import_env_var(player)) else { continue };
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                let warnings = state.import_tsv(player, &text).await;
                for w in &warnings {
                    warn!("{} import: {}", player.display_name(), w);
                }
                match reconcile::sync_now(state, client, player, &decline_overwrite).await {
                    Ok(Outcome::Applied) => {}
                    Ok(Outcome::Declined) => {
                        warn!("{}: remote is newer, sync skipped", player.display_name())
                    }
                    Err(e) => warn!("{}: {}", player.display_name(), e),
                }
            }
            Err(e) => warn!("Cannot read import file {}: {}", path, e),
        }
    }
}

async fn log_status(state: &AppState) {
    for player in Player::ALL {
        let summary = state.player_summary(player).await;
        info!(
            "{}: {} items, total qty {}, {}",
            player.display_name(),
            summary.unique_items,
            summary.total_qty,
            summary.freshness
        );
    }
    let ad = state.visible_items(Player::Ad, false).await;
    let sic = state.visible_items(Player::Sic, false).await;
    let s = compare::summarize(&compare::build_rows(&ad, &sic));
    info!(
        "Compare: {} rows, unique to Ad {}, unique to Sic {}, in both {}, differences {}",
        s.total_rows, s.unique_ad, s.unique_sic, s.in_both, s.differences
    );
}

#[tokio::main]
async fn main() {
    // Load .env (dev convenience); absence is fine.
    let _ = dotenvy::dotenv();

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("osrs_bank_companion", LevelFilter::Debug)
        .init();

    info!("OSRS Bank Companion v{} starting...", env!("CARGO_PKG_VERSION"));

    let state = Arc::new(AppState::load_from_disk());
    apply_env_settings(&state).await;

    let client = reqwest::Client::new();
    let settings = state.settings().await;
    if settings.endpoint_url.is_empty() {
        info!("No endpoint configured; running local-only. Set OSRS_BANK_ENDPOINT to enable sync.");
    } else {
        match osrs_bank_companion::remote::test_connection(&client, &settings).await {
            Ok(server_time) => {
                info!("Connected. serverTimeUtc = {}", server_time.as_deref().unwrap_or("(missing)"))
            }
            Err(e) => warn!("Connection test failed: {}", e),
        }

        // Bootstrap: refresh the mirror and populate any player whose
        // local snapshot is empty. Unsynced local work is never
        // clobbered here.
        match reconcile::refresh_remote(&state, &client).await {
            Ok(()) => reconcile::hydrate(&state, HydrateMode::OnlyIfEmpty).await,
            Err(e) => warn!("Offline or endpoint unreachable: {}", e),
        }
    }

    import_from_env(&state, &client).await;
    log_status(&state).await;

    loop {
        tokio::time::sleep(POLL_INTERVAL).await;
        let settings = state.settings().await;
        if settings.endpoint_url.is_empty() {
            continue;
        }
        match reconcile::refresh_remote(&state, &client).await {
            Ok(()) => {
                reconcile::hydrate(&state, HydrateMode::OnlyIfEmpty).await;
                log_status(&state).await;
            }
            Err(e) => debug!("Background refresh failed: {}", e),
        }
    }
}
