use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

fn main() -> Result<()> {
    let db_path = std::env::var("MATCH_DB_PATH").unwrap_or_else(|_| "data/tennis.db".to_string());
    let conn = Connection::open(&db_path).with_context(|| format!("open db at {db_path}"))?;

    let tables = ["predictions", "live_matches"];

    println!("db_path={db_path}");
    for t in tables {
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(1) FROM {t}"), [], |r| r.get(0))
            .with_context(|| format!("count {t}"))?;
        println!("{t}: {count}");
    }

    let mut stmt = conn
        .prepare("SELECT live_status, COUNT(1) FROM live_matches GROUP BY live_status ORDER BY live_status")
        .context("prepare status breakdown")?;
    let breakdown = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("read status breakdown")?;
    for (status, count) in breakdown {
        println!("  {status}: {count}");
    }

    let last: Option<(String, String, String, Option<String>, String)> = conn
        .query_row(
            "SELECT match_identifier, live_score, live_status, actual_winner, last_updated
             FROM live_matches ORDER BY last_updated DESC LIMIT 1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
        )
        .optional()
        .context("read last updated row")?;

    if let Some((id, score, status, winner, ts)) = last {
        println!(
            "last_update: ts={ts} match={id} status={status} score='{score}' winner={}",
            winner.unwrap_or_else(|| "<none>".to_string())
        );
    } else {
        println!("last_update: <none>");
    }

    Ok(())
}
