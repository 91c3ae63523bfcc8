//! Per-collection overview of the document store.
//!
//! Used by `sbook stats` to confirm that imports landed where expected.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::migrate;

/// Document count and last write time for one collection.
struct CollectionStats {
    collection: String,
    doc_count: i64,
    replaced_count: i64,
    last_update_ts: i64,
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply_schema(&pool).await?;

    let rows = sqlx::query(
        r#"
        SELECT
            collection,
            COUNT(*) AS doc_count,
            SUM(CASE WHEN revision > 1 THEN 1 ELSE 0 END) AS replaced_count,
            MAX(updated_at) AS last_update_ts
        FROM documents
        GROUP BY collection
        ORDER BY collection ASC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let stats: Vec<CollectionStats> = rows
        .iter()
        .map(|row| CollectionStats {
            collection: row.get("collection"),
            doc_count: row.get("doc_count"),
            replaced_count: row.get("replaced_count"),
            last_update_ts: row.get("last_update_ts"),
        })
        .collect();

    let total: i64 = stats.iter().map(|s| s.doc_count).sum();

    println!("Database:  {}", config.db.path.display());
    println!("Documents: {}", total);

    if !stats.is_empty() {
        println!();
        println!(
            "{:<20} {:>8} {:>10}  {}",
            "COLLECTION", "DOCS", "REPLACED", "LAST UPDATE (UTC)"
        );
        for s in &stats {
            println!(
                "{:<20} {:>8} {:>10}  {}",
                s.collection,
                s.doc_count,
                s.replaced_count,
                utc_minute(s.last_update_ts)
            );
        }
    }

    pool.close().await;
    Ok(())
}

fn utc_minute(ts: i64) -> String {
    match chrono::DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => ts.to_string(),
    }
}
