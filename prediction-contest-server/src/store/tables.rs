use super::Store;
use crate::Error;

/// `CREATE TABLE` statements of all tables. `{}` is replaced by the table prefix.
const TABLES: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS {}tournaments (id BIGINT UNSIGNED PRIMARY KEY, name TEXT NOT NULL, results BLOB)",
    "CREATE TABLE IF NOT EXISTS {}teams (id BIGINT UNSIGNED PRIMARY KEY, tournament_id BIGINT UNSIGNED NOT NULL, name TEXT NOT NULL)",
    "CREATE TABLE IF NOT EXISTS {}matches (id BIGINT UNSIGNED PRIMARY KEY, tournament_id BIGINT UNSIGNED NOT NULL, number INT UNSIGNED NOT NULL, kind TINYINT UNSIGNED NOT NULL, team_a BIGINT UNSIGNED, team_b BIGINT UNSIGNED, start DATETIME NOT NULL, status TINYINT UNSIGNED NOT NULL, outcome BLOB, UNIQUE (tournament_id, number))",
    "CREATE TABLE IF NOT EXISTS {}predictions (user_id BIGINT UNSIGNED NOT NULL, match_id BIGINT UNSIGNED NOT NULL, match_number INT UNSIGNED NOT NULL, picks BLOB NOT NULL, submitted_at DATETIME NOT NULL, scheduled_for DATETIME, score BLOB, PRIMARY KEY (user_id, match_id), INDEX (match_id), INDEX (scheduled_for))",
    "CREATE TABLE IF NOT EXISTS {}entries (tournament_id BIGINT UNSIGNED NOT NULL, user_id BIGINT UNSIGNED NOT NULL, season_team BIGINT UNSIGNED NOT NULL, picks BLOB NOT NULL, joined_at DATETIME NOT NULL, points BIGINT NOT NULL DEFAULT 0, penalties BIGINT UNSIGNED NOT NULL DEFAULT 0, bonus BLOB, position INT UNSIGNED NOT NULL DEFAULT 0, PRIMARY KEY (tournament_id, user_id))",
];

fn statements(prefix: &str) -> impl Iterator<Item = String> + '_ {
    TABLES.iter().map(move |sql| sql.replacen("{}", prefix, 1))
}

/// Creates all missing tables.
pub async fn migrate(store: &Store) -> Result<(), Error> {
    for sql in statements(&store.table_prefix) {
        log::debug!("{}", sql);
        sqlx::query(&sql).execute(&store.pool).await?;
    }

    log::info!("Created {} tables", TABLES.len());
    Ok(())
}
