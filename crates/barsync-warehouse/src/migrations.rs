//! Versioned schema migrations for the bar warehouse.

use ::duckdb::Connection;
use ::duckdb::ToSql;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_daily_bars",
        sql: r#"
CREATE TABLE IF NOT EXISTS daily_bars (
    symbol TEXT NOT NULL,
    date DATE NOT NULL,
    open DOUBLE NOT NULL,
    high DOUBLE NOT NULL,
    low DOUBLE NOT NULL,
    close DOUBLE NOT NULL,
    volume UBIGINT NOT NULL,
    source TEXT,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY(symbol, date)
);

CREATE TABLE IF NOT EXISTS ingest_log (
    request_id TEXT NOT NULL,
    symbol TEXT,
    source TEXT NOT NULL,
    dataset TEXT NOT NULL,
    status TEXT NOT NULL,
    latency_ms BIGINT,
    timestamp TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Migration {
        version: "0002_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_ingest_log_symbol_ts ON ingest_log(symbol, timestamp);
"#,
    },
    Migration {
        version: "0003_sync_ranges",
        sql: r#"
CREATE TABLE IF NOT EXISTS sync_ranges (
    symbol TEXT NOT NULL,
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    request_id TEXT NOT NULL,
    recorded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_sync_ranges_symbol ON sync_ranges(symbol);
"#,
    },
];

/// Apply every migration that has not been recorded in `schema_migrations`.
///
/// # Errors
/// Returns an error if a migration statement fails.
pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let params: [&dyn ToSql; 1] = [&migration.version];
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            params.as_slice(),
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            tracing::debug!(version = migration.version, "applying warehouse migration");
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                params.as_slice(),
            )?;
        }
    }

    Ok(())
}
