use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Stored schema version {0:?} is not a number")]
    BadVersion(String),
}

/// One schema migration step. Statements run inside a single transaction
/// together with the version bump; a failure rolls the whole step back and
/// aborts startup.
struct Migration {
    version: i64,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        statements: &[
            "CREATE TABLE subscription(
                name TEXT PRIMARY KEY,
                url TEXT NOT NULL
            )",
            "CREATE TABLE download(
                url TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            )",
        ],
    },
    // External download-client handle, bound lazily after dispatch.
    Migration {
        version: 2,
        statements: &["ALTER TABLE download ADD COLUMN handle INTEGER"],
    },
    // Per-subscription title word filters.
    Migration {
        version: 3,
        statements: &[
            "ALTER TABLE subscription ADD COLUMN include_words TEXT NOT NULL DEFAULT ''",
            "ALTER TABLE subscription ADD COLUMN exclude_words TEXT NOT NULL DEFAULT ''",
        ],
    },
];

/// Open the ledger database and bring its schema up to date.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, DbError> {
    // An in-memory database exists per connection; a pool of them would be
    // a pool of unrelated empty databases.
    let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

/// Apply all migrations above the stored schema version, strictly ascending.
pub async fn migrate(pool: &SqlitePool) -> Result<(), DbError> {
    sqlx::query("CREATE TABLE IF NOT EXISTS infos(key TEXT PRIMARY KEY, value TEXT NOT NULL)")
        .execute(pool)
        .await?;

    let stored: Option<(String,)> =
        sqlx::query_as("SELECT value FROM infos WHERE key = 'schema_version'")
            .fetch_optional(pool)
            .await?;
    let current = match stored {
        Some((value,)) => value
            .parse::<i64>()
            .map_err(|_| DbError::BadVersion(value))?,
        None => 0,
    };

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tracing::info!("Applying ledger migration {}", migration.version);
        let mut tx = pool.begin().await?;
        for statement in migration.statements {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        sqlx::query("REPLACE INTO infos(key, value) VALUES('schema_version', $1)")
            .bind(migration.version.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
    }

    Ok(())
}
