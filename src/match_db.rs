//! SQLite vrstva pro `predictions` a `live_matches`.
//!
//! Jména sloupců drží původní schéma pipeline (dashboard i bot je čtou přes
//! JOIN match_id = match_identifier), tak se jich tady nesmí nikdo dotknout.
//! Zápis je synchronní: jeden pass dělá pár desítek upsertů, writer thread
//! by tu byl zbytečný.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use score_engine::{LiveMatchState, PredictedMatch};
use std::path::Path;

/// Řádek `live_matches` tak, jak leží v DB
#[derive(Debug, Clone, PartialEq)]
pub struct LiveMatchRow {
    pub match_identifier: String,
    pub live_score: String,
    pub live_status: String,
    pub actual_winner: Option<String>,
    pub last_updated: String,
}

pub struct MatchDb {
    conn: Connection,
}

impl MatchDb {
    pub fn open(path: &str) -> Result<Self> {
        let db_path = Path::new(path);
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let conn = Connection::open(db_path).context("open sqlite db")?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();

        init_schema(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory db")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Predikce na daný den, v pořadí vložení. Read-only: predikce plní
    /// upstream workflow, sync je nikdy nemění.
    pub fn todays_predictions(&self, day: NaiveDate) -> Result<Vec<PredictedMatch>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT match_id, player1, player2, tournament
                 FROM predictions WHERE prediction_day = ?1 ORDER BY id",
            )
            .context("prepare predictions query")?;

        let rows = stmt
            .query_map(params![day.to_string()], |r| {
                Ok(PredictedMatch {
                    match_id: r.get(0)?,
                    player1: r.get(1)?,
                    player2: r.get(2)?,
                    tournament: r.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("read predictions")?;

        Ok(rows)
    }

    /// Ruční seed predikce (testy, lokální zkoušení). V produkci řádky
    /// vkládá upstream, proto OR IGNORE přes UNIQUE match_id.
    pub fn insert_prediction(&self, m: &PredictedMatch, day: NaiveDate) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO predictions(match_id, player1, player2, tournament, prediction_day)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![m.match_id, m.player1, m.player2, m.tournament, day.to_string()],
            )
            .context("insert prediction")?;
        Ok(())
    }

    /// Idempotentní upsert live stavu: plné nahrazení mutable sloupců,
    /// `last_updated` se razítkuje při každém zápisu. Jeden řádek na zápas,
    /// opakovaný běh nad stejnou stránkou nevyrobí duplikáty.
    pub fn upsert_live_state(&self, state: &LiveMatchState) -> Result<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO live_matches(match_identifier, live_score, live_status, actual_winner, last_updated)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(match_identifier) DO UPDATE SET
                    live_score=excluded.live_score,
                    live_status=excluded.live_status,
                    actual_winner=excluded.actual_winner,
                    last_updated=excluded.last_updated
                "#,
                params![
                    state.match_id,
                    state.live_score,
                    state.status.as_str(),
                    state.winner,
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("upsert live_matches")?;
        Ok(())
    }

    pub fn live_state(&self, match_id: &str) -> Result<Option<LiveMatchRow>> {
        self.conn
            .query_row(
                "SELECT match_identifier, live_score, live_status, actual_winner, last_updated
                 FROM live_matches WHERE match_identifier = ?1",
                params![match_id],
                |r| {
                    Ok(LiveMatchRow {
                        match_identifier: r.get(0)?,
                        live_score: r.get(1)?,
                        live_status: r.get(2)?,
                        actual_winner: r.get(3)?,
                        last_updated: r.get(4)?,
                    })
                },
            )
            .optional()
            .context("read live_matches row")
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS predictions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            match_id TEXT NOT NULL UNIQUE,
            player1 TEXT NOT NULL,
            player2 TEXT NOT NULL,
            tournament TEXT NOT NULL DEFAULT '',
            prediction_day TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_predictions_day ON predictions(prediction_day);

        CREATE TABLE IF NOT EXISTS live_matches (
            match_identifier TEXT PRIMARY KEY,
            live_score TEXT NOT NULL DEFAULT '',
            live_status TEXT NOT NULL DEFAULT 'not_started',
            actual_winner TEXT,
            last_updated TEXT NOT NULL
        );
        "#,
    )
    .context("init schema")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use score_engine::{reconcile_all, LiveFragment, MatchStatus};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn predicted(id: &str, p1: &str, p2: &str) -> PredictedMatch {
        PredictedMatch {
            match_id: id.to_string(),
            player1: p1.to_string(),
            player2: p2.to_string(),
            tournament: "ATP Test Open".to_string(),
        }
    }

    #[test]
    fn upsert_creates_then_replaces_single_row() {
        let db = MatchDb::open_in_memory().unwrap();

        let mut state = LiveMatchState {
            match_id: "m1".to_string(),
            live_score: "6-4 2-3".to_string(),
            status: MatchStatus::Live,
            winner: None,
        };
        db.upsert_live_state(&state).unwrap();

        let row = db.live_state("m1").unwrap().unwrap();
        assert_eq!(row.live_score, "6-4 2-3");
        assert_eq!(row.live_status, "live");
        assert_eq!(row.actual_winner, None);
        assert!(!row.last_updated.is_empty());

        // stejný zápas znovu, tentokrát dohraný
        state.live_score = "6-4 6-3".to_string();
        state.status = MatchStatus::Completed;
        state.winner = Some("Novak A.".to_string());
        db.upsert_live_state(&state).unwrap();

        let row = db.live_state("m1").unwrap().unwrap();
        assert_eq!(row.live_score, "6-4 6-3");
        assert_eq!(row.live_status, "completed");
        assert_eq!(row.actual_winner.as_deref(), Some("Novak A."));
    }

    #[test]
    fn completed_without_winner_persists_null() {
        let db = MatchDb::open_in_memory().unwrap();
        let state = LiveMatchState {
            match_id: "m1".to_string(),
            live_score: "6-4 4-6".to_string(),
            status: MatchStatus::Completed,
            winner: None,
        };
        db.upsert_live_state(&state).unwrap();

        let row = db.live_state("m1").unwrap().unwrap();
        assert_eq!(row.live_status, "completed");
        assert_eq!(row.actual_winner, None);
    }

    #[test]
    fn todays_predictions_filters_by_day_and_keeps_order() {
        let db = MatchDb::open_in_memory().unwrap();
        let other_day = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();

        db.insert_prediction(&predicted("m2", "C", "D"), day()).unwrap();
        db.insert_prediction(&predicted("m1", "A", "B"), day()).unwrap();
        db.insert_prediction(&predicted("m3", "E", "F"), other_day).unwrap();

        let todays = db.todays_predictions(day()).unwrap();
        assert_eq!(todays.len(), 2);
        assert_eq!(todays[0].match_id, "m2");
        assert_eq!(todays[1].match_id, "m1");
    }

    #[test]
    fn insert_prediction_is_idempotent_on_match_id() {
        let db = MatchDb::open_in_memory().unwrap();
        db.insert_prediction(&predicted("m1", "A", "B"), day()).unwrap();
        db.insert_prediction(&predicted("m1", "A", "B"), day()).unwrap();
        assert_eq!(db.todays_predictions(day()).unwrap().len(), 1);
    }

    #[test]
    fn repeated_pass_over_same_page_changes_nothing() {
        let db = MatchDb::open_in_memory().unwrap();
        db.insert_prediction(&predicted("m1", "Novak A.", "Smith B."), day()).unwrap();
        db.insert_prediction(&predicted("m2", "Garcia L.", "Dvorak P."), day()).unwrap();

        let fragments = vec![
            LiveFragment {
                home_name: "Novak A.".to_string(),
                away_name: "Smith B.".to_string(),
                set_home: vec!["6".to_string(), "76".to_string()],
                set_away: vec!["4".to_string(), "64".to_string()],
                sets_won_home: "2".to_string(),
                sets_won_away: "0".to_string(),
                status_text: "Finished".to_string(),
                emphasis_home: true,
                emphasis_away: false,
            },
            // m2 na stránce není -> fallback not_started
        ];

        let run_pass = |db: &MatchDb| {
            let predictions = db.todays_predictions(day()).unwrap();
            for outcome in reconcile_all(&predictions, &fragments) {
                db.upsert_live_state(&outcome.state).unwrap();
            }
        };

        let snapshot = |db: &MatchDb| {
            ["m1", "m2"]
                .iter()
                .map(|id| {
                    let row = db.live_state(id).unwrap().unwrap();
                    (row.match_identifier, row.live_score, row.live_status, row.actual_winner)
                })
                .collect::<Vec<_>>()
        };

        run_pass(&db);
        let first = snapshot(&db);
        assert_eq!(first[0].1, "6-4 7-6");
        assert_eq!(first[0].2, "completed");
        assert_eq!(first[0].3.as_deref(), Some("Novak A."));
        assert_eq!(first[1].2, "not_started");

        // druhý běh nad identickou stránkou: pořád jeden řádek na zápas,
        // identický obsah (mimo razítko)
        run_pass(&db);
        assert_eq!(snapshot(&db), first);

        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(1) FROM live_matches", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }
}
