/// TeniskoLive — Live Sync
///
/// Co dělá:
///   1. Načte dnešní tenisové predikce z SQLite (plní je upstream workflow)
///   2. Jednou vyrendruje Flashscore live listing přes headless Chrome
///   3. Pro každou predikci spočítá skóre / status / vítěze (score_engine)
///   4. Idempotentní upsert do live_matches, opakovaný běh nic nerozbije
///
/// Co NEDĚLÁ: nemění predictions, nechodí na detail zápasu, nehlídá odds
///
/// Plánování řeší externí scheduler (cron / n8n, typicky co 2 hodiny).
/// Default je jeden pass a konec; LIVE_SYNC_LOOP_SECS=N zapne interní smyčku.
///
/// Spuštění:
///   cargo run --bin live-sync

use anyhow::{Context, Result};
use chrono::Utc;
use dotenv::dotenv;
use logger::{
    now_iso, EventLogger, MatchNotFoundEvent, MatchReconciledEvent, ReconcileErrorEvent,
    ScrapeStatusEvent, SyncSummaryEvent,
};
use score_engine::{reconcile_all, Disposition, MatchStatus};
use std::env;
use std::fs::File;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

mod match_db;
use match_db::MatchDb;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!("=== TeniskoLive Sync — RECONCILING PREDICTED MATCHES ===");

    // Single instance lock: dva překrývající se passy by si upsert přežil,
    // ale dva Chromy najednou ne
    let lock_file_path = env::temp_dir().join("teniskolive_sync.lock");
    let lock_file = match File::create(&lock_file_path) {
        Ok(f) => f,
        Err(e) => {
            warn!("Failed to create lock file at {:?}: {}", lock_file_path, e);
            return Ok(());
        }
    };

    let mut lock = fd_lock::RwLock::new(lock_file);
    let _write_guard = match lock.try_write() {
        Ok(guard) => {
            info!("Acquired single-instance lock.");
            guard
        }
        Err(_) => {
            warn!("Another instance of live-sync is already running! Exiting.");
            return Ok(());
        }
    };

    let db_path = env::var("MATCH_DB_PATH").unwrap_or_else(|_| "data/tennis.db".to_string());
    let listing_url = env::var("FLASHSCORE_LIVE_URL")
        .unwrap_or_else(|_| "https://www.flashscore.com/tennis/".to_string());
    let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let ntfy_topic = env::var("NTFY_TOPIC").ok();

    // 0 / nevalidní / nenastaveno = jeden pass a konec
    let loop_secs = env::var("LIVE_SYNC_LOOP_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    info!("DB: {}", db_path);
    info!("Listing: {}", listing_url);
    info!("Logs: ./{}/", log_dir);

    let event_log = EventLogger::new(&log_dir);

    if loop_secs == 0 {
        if let Err(e) = run_pass(&db_path, &listing_url, &event_log).await {
            error!("Sync pass failed: {e:#}");
            alert_pass_failure(ntfy_topic.as_deref(), &e).await;
            return Err(e);
        }
        return Ok(());
    }

    info!("Loop mode: pass every {}s", loop_secs);
    loop {
        if let Err(e) = run_pass(&db_path, &listing_url, &event_log).await {
            error!("Sync pass failed: {e:#}");
            alert_pass_failure(ntfy_topic.as_deref(), &e).await;
        }
        sleep(Duration::from_secs(loop_secs)).await;
    }
}

async fn alert_pass_failure(topic: Option<&str>, err: &anyhow::Error) {
    if let Some(topic) = topic {
        logger::send_ntfy_alert(
            topic,
            &format!("live-sync pass failed: {err:#}"),
            "TeniskoLive sync",
        )
        .await;
    }
}

/// Jeden rekonciliační pass. Systémová chyba (scrape, DB nejde otevřít)
/// vrací Err a řádky zůstávají, jak byly; chyba jednoho zápasu pass nezastaví.
async fn run_pass(db_path: &str, listing_url: &str, event_log: &EventLogger) -> Result<()> {
    let started = Instant::now();

    let db = MatchDb::open(db_path).context("open match db")?;
    let today = Utc::now().date_naive();
    let predictions = db
        .todays_predictions(today)
        .context("load todays predictions")?;

    if predictions.is_empty() {
        info!("No predictions for {} — nothing to reconcile.", today);
        return Ok(());
    }
    info!("Reconciling {} predicted matches for {}", predictions.len(), today);

    let fragments = match flashscore_scraper::fetch_live_fragments(listing_url).await {
        Ok(fragments) => {
            let _ = event_log.log(&ScrapeStatusEvent {
                ts: now_iso(),
                event: "SCRAPE_STATUS",
                source: "flashscore".to_string(),
                ok: true,
                fragment_count: fragments.len(),
                message: "ok".to_string(),
            });
            fragments
        }
        Err(e) => {
            let _ = event_log.log(&ScrapeStatusEvent {
                ts: now_iso(),
                event: "SCRAPE_STATUS",
                source: "flashscore".to_string(),
                ok: false,
                fragment_count: 0,
                message: format!("{e:#}"),
            });
            return Err(e.context("fetch live fragments"));
        }
    };
    info!("Listing: {} match fragments", fragments.len());

    let mut reconciled = 0usize;
    let mut not_found = 0usize;
    let mut errors = 0usize;
    let mut live = 0usize;
    let mut completed = 0usize;
    let mut not_started = 0usize;

    for (m, outcome) in predictions.iter().zip(reconcile_all(&predictions, &fragments)) {
        // upsert i pro NotFound a Failed: fallback řádek do DB patří taky
        if let Err(e) = db.upsert_live_state(&outcome.state) {
            warn!("Upsert failed for {}: {e:#}", outcome.state.match_id);
            errors += 1;
            let _ = event_log.log(&ReconcileErrorEvent {
                ts: now_iso(),
                event: "RECONCILE_ERROR",
                match_id: outcome.state.match_id.clone(),
                reason: format!("upsert: {e:#}"),
            });
            continue;
        }

        match outcome.state.status {
            MatchStatus::Live => live += 1,
            MatchStatus::Completed => completed += 1,
            MatchStatus::NotStarted => not_started += 1,
        }

        match &outcome.disposition {
            Disposition::Found => {
                reconciled += 1;
                info!(
                    "✅ {} vs {} → '{}' [{}] winner: {}",
                    m.player1,
                    m.player2,
                    outcome.state.live_score,
                    outcome.state.status.as_str(),
                    outcome.state.winner.as_deref().unwrap_or("?"),
                );
                let _ = event_log.log(&MatchReconciledEvent {
                    ts: now_iso(),
                    event: "MATCH_RECONCILED",
                    match_id: m.match_id.clone(),
                    player1: m.player1.clone(),
                    player2: m.player2.clone(),
                    tournament: m.tournament.clone(),
                    live_score: outcome.state.live_score.clone(),
                    live_status: outcome.state.status.as_str().to_string(),
                    winner: outcome.state.winner.clone(),
                });
            }
            Disposition::NotFound => {
                not_found += 1;
                info!("{} vs {} not on live page (yet)", m.player1, m.player2);
                let _ = event_log.log(&MatchNotFoundEvent {
                    ts: now_iso(),
                    event: "MATCH_NOT_FOUND",
                    match_id: m.match_id.clone(),
                    player1: m.player1.clone(),
                    player2: m.player2.clone(),
                    tournament: m.tournament.clone(),
                });
            }
            Disposition::Failed(reason) => {
                errors += 1;
                warn!("🔴 Reconcile failed for {}: {}", m.match_id, reason);
                let _ = event_log.log(&ReconcileErrorEvent {
                    ts: now_iso(),
                    event: "RECONCILE_ERROR",
                    match_id: m.match_id.clone(),
                    reason: reason.to_string(),
                });
            }
        }
    }

    let _ = event_log.log(&SyncSummaryEvent {
        ts: now_iso(),
        event: "SYNC_SUMMARY",
        predictions: predictions.len(),
        reconciled,
        not_found,
        errors,
        live,
        completed,
        not_started,
        duration_ms: started.elapsed().as_millis() as u64,
    });

    info!(
        "Pass done in {:.1}s: {} reconciled, {} not on page, {} errors ({} live, {} completed, {} not started)",
        started.elapsed().as_secs_f64(),
        reconciled,
        not_found,
        errors,
        live,
        completed,
        not_started,
    );

    Ok(())
}
