/// TeniskoLive — Logger
/// JSONL event stream (per-day soubory), NTFY alerts

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

pub struct EventLogger {
    log_dir: PathBuf,
}

impl EventLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        let dir = log_dir.into();
        fs::create_dir_all(&dir).ok();
        Self { log_dir: dir }
    }

    /// Připíše event jako jeden JSON řádek do dnešního souboru.
    /// Append-only, soubor na den - rekonciliace se dá zpětně přehrát.
    pub fn log<T: Serialize>(&self, event: &T) -> Result<()> {
        let date  = Utc::now().format("%Y-%m-%d").to_string();
        let path  = self.log_dir.join(format!("{date}.jsonl"));
        let line  = serde_json::to_string(event)?;
        let mut f = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

// ── Event typy ────────────────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
pub struct MatchReconciledEvent {
    pub ts:          String,
    pub event:       &'static str,   // "MATCH_RECONCILED"
    pub match_id:    String,
    pub player1:     String,
    pub player2:     String,
    pub tournament:  String,
    pub live_score:  String,
    pub live_status: String,         // "not_started" | "live" | "completed"
    pub winner:      Option<String>,
}

#[derive(Serialize, Debug)]
pub struct MatchNotFoundEvent {
    pub ts:         String,
    pub event:      &'static str,    // "MATCH_NOT_FOUND"
    pub match_id:   String,
    pub player1:    String,
    pub player2:    String,
    pub tournament: String,
}

#[derive(Serialize, Debug)]
pub struct ReconcileErrorEvent {
    pub ts:       String,
    pub event:    &'static str,      // "RECONCILE_ERROR"
    pub match_id: String,
    pub reason:   String,
}

#[derive(Serialize, Debug)]
pub struct ScrapeStatusEvent {
    pub ts:             String,
    pub event:          &'static str, // "SCRAPE_STATUS"
    pub source:         String,       // "flashscore"
    pub ok:             bool,
    pub fragment_count: usize,
    pub message:        String,
}

#[derive(Serialize, Debug)]
pub struct SyncSummaryEvent {
    pub ts:          String,
    pub event:       &'static str,   // "SYNC_SUMMARY"
    pub predictions: usize,
    pub reconciled:  usize,
    pub not_found:   usize,
    pub errors:      usize,
    pub live:        usize,
    pub completed:   usize,
    pub not_started: usize,
    pub duration_ms: u64,
}

/// Pošli čitelný push alert na zadaný ntfy topic
pub async fn send_ntfy_alert(topic: &str, msg: &str, title: &str) {
    let client = reqwest::Client::new();
    match client
        .post(format!("https://ntfy.sh/{topic}"))
        .header("Title", title)
        .header("Priority", "high")
        .header("Tags", "tennis")
        .body(msg.to_string())
        .send()
        .await
    {
        Ok(_)  => tracing::info!("NTFY sent: {}", title),
        Err(e) => tracing::warn!("NTFY failed: {}", e),
    }
}
