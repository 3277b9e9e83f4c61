//! Database views for analytical queries.

use ::duckdb::Connection;

/// Create `vw_symbol_coverage`: first/last stored date and bar count per symbol.
///
/// # Errors
/// Returns an error if the view creation SQL fails to execute.
pub fn create_views(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r"
CREATE OR REPLACE VIEW vw_symbol_coverage AS
SELECT
    symbol,
    MIN(date) AS first_date,
    MAX(date) AS last_date,
    COUNT(*) AS bar_count
FROM daily_bars
GROUP BY symbol;
",
    )?;

    Ok(())
}
