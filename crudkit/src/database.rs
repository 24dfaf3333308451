//! Database connection pool management and schema helpers

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::{
    config::DatabaseConfig,
    error::{sanitize_url, DatabaseError, DatabaseErrorKind, DatabaseOperation, Result},
    repository::is_identifier,
};

/// Create a PostgreSQL connection pool with retry logic
///
/// Used by `AppStateBuilder`; retries according to the configuration.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    create_pool_with_retries(config, config.max_retries).await
}

/// Create a PostgreSQL connection pool with configurable retries
///
/// Uses exponential backoff strategy for retries
async fn create_pool_with_retries(config: &DatabaseConfig, max_retries: u32) -> Result<PgPool> {
    let mut attempt = 0;
    let base_delay = Duration::from_secs(config.retry_delay_secs);

    loop {
        match try_create_pool(config).await {
            Ok(pool) => {
                if attempt > 0 {
                    tracing::info!(
                        "Database connection established after {} attempt(s)",
                        attempt + 1
                    );
                } else {
                    tracing::info!(
                        "Database connection pool created: max={}, min={}",
                        config.max_connections,
                        config.min_connections
                    );
                }
                return Ok(pool);
            }
            Err(e) => {
                attempt += 1;

                if attempt > max_retries {
                    tracing::error!(
                        "Failed to connect to database after {} attempts: {}",
                        max_retries + 1,
                        e
                    );
                    return Err(e);
                }

                let delay = base_delay * 2_u32.pow(attempt.saturating_sub(1));

                tracing::warn!(
                    "Database connection attempt {} failed: {}. Retrying in {:?}...",
                    attempt,
                    e,
                    delay
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Attempt to create a database pool (single try)
async fn try_create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| {
            DatabaseError::connection_failed(format!("{}: {}", categorize_db_error(&e), e))
                .add_context(sanitize_url(&config.url))
        })?;

    Ok(pool)
}

/// Categorize database error for better user guidance
fn categorize_db_error(err: &sqlx::Error) -> &'static str {
    use sqlx::Error;
    match err {
        Error::Configuration(_) => "Configuration error",
        Error::Database(_) => "Database query error",
        Error::Io(_) => "Network I/O error - check connectivity",
        Error::Tls(_) => "TLS/SSL error - check certificate configuration",
        Error::PoolTimedOut => "Connection pool timeout - database may be overloaded",
        Error::PoolClosed => "Connection pool closed",
        Error::WorkerCrashed => "Database worker crashed",
        _ => "Connection error",
    }
}

/// Whether `table` carries a constraint called `name`
pub async fn has_constraint(pool: &PgPool, table: &str, name: &str) -> Result<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM pg_constraint c \
         JOIN pg_class t ON t.oid = c.conrelid \
         WHERE t.relname = $1 AND c.conname = $2)",
    )
    .bind(table)
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Add `UNIQUE (columns)` as constraint `name` unless it already exists
///
/// Returns whether the constraint was created. Pair with
/// [`CrudRepository::create_or_update`](crate::repository::CrudRepository::create_or_update)
/// to seed idempotently.
pub async fn ensure_unique_constraint(
    pool: &PgPool,
    table: &str,
    name: &str,
    columns: &[&str],
) -> Result<bool> {
    let sql = unique_constraint_sql(table, name, columns)?;
    if has_constraint(pool, table, name).await? {
        tracing::debug!(table, constraint = name, "Constraint already present");
        return Ok(false);
    }
    sqlx::query(&sql).execute(pool).await?;
    tracing::info!(table, constraint = name, "Created unique constraint");
    Ok(true)
}

/// Drop each listed constraint that exists, returning how many were dropped
pub async fn drop_constraints(pool: &PgPool, table: &str, names: &[&str]) -> Result<usize> {
    let mut dropped = 0;
    for name in names {
        let sql = drop_constraint_sql(table, name)?;
        if has_constraint(pool, table, name).await? {
            sqlx::query(&sql).execute(pool).await?;
            tracing::info!(table, constraint = *name, "Dropped constraint");
            dropped += 1;
        }
    }
    Ok(dropped)
}

fn check_identifiers<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<()> {
    for name in names {
        if !is_identifier(name) {
            return Err(DatabaseError::new(
                DatabaseOperation::Migration,
                DatabaseErrorKind::Configuration,
                format!("invalid identifier {:?}", name),
            )
            .into());
        }
    }
    Ok(())
}

fn unique_constraint_sql(table: &str, name: &str, columns: &[&str]) -> Result<String> {
    if columns.is_empty() {
        return Err(DatabaseError::new(
            DatabaseOperation::Migration,
            DatabaseErrorKind::Configuration,
            "a unique constraint needs at least one column",
        )
        .into());
    }
    check_identifiers([table, name].into_iter().chain(columns.iter().copied()))?;
    Ok(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
        table,
        name,
        columns.join(", ")
    ))
}

fn drop_constraint_sql(table: &str, name: &str) -> Result<String> {
    check_identifiers([table, name])?;
    Ok(format!("ALTER TABLE {} DROP CONSTRAINT {}", table, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_unique_constraint_sql() {
        assert_eq!(
            unique_constraint_sql("permissions", "cons_uniq", &["id_role", "type", "target"]).unwrap(),
            "ALTER TABLE permissions ADD CONSTRAINT cons_uniq UNIQUE (id_role, type, target)"
        );
    }

    #[test]
    fn test_constraint_sql_rejects_unsafe_identifiers() {
        for (table, name, columns) in [
            ("permissions", "cons uniq", &["id_role"][..]),
            ("permissions;", "cons_uniq", &["id_role"][..]),
            ("permissions", "cons_uniq", &["id_role) --"][..]),
            ("permissions", "cons_uniq", &[][..]),
        ] {
            let err = unique_constraint_sql(table, name, columns).unwrap_err();
            match err {
                Error::Database(db) => assert_eq!(db.kind, DatabaseErrorKind::Configuration),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_drop_constraint_sql() {
        assert_eq!(
            drop_constraint_sql("permissions", "permissions_target_key").unwrap(),
            "ALTER TABLE permissions DROP CONSTRAINT permissions_target_key"
        );
        assert!(drop_constraint_sql("permissions", "x y").is_err());
    }

    #[test]
    fn test_categorize_db_error() {
        assert_eq!(
            categorize_db_error(&sqlx::Error::PoolTimedOut),
            "Connection pool timeout - database may be overloaded"
        );
        assert_eq!(
            categorize_db_error(&sqlx::Error::PoolClosed),
            "Connection pool closed"
        );
    }

    #[sqlx::test(migrations = false)]
    async fn test_constraint_helpers_against_store(pool: PgPool) {
        sqlx::raw_sql("CREATE TABLE tags (id BIGSERIAL PRIMARY KEY, label TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();

        assert!(!has_constraint(&pool, "tags", "tags_label_key").await.unwrap());
        assert!(ensure_unique_constraint(&pool, "tags", "tags_label_key", &["label"])
            .await
            .unwrap());
        assert!(has_constraint(&pool, "tags", "tags_label_key").await.unwrap());
        assert!(!ensure_unique_constraint(&pool, "tags", "tags_label_key", &["label"])
            .await
            .unwrap());

        let duplicate = sqlx::query("INSERT INTO tags (label) VALUES ('a'), ('a')")
            .execute(&pool)
            .await;
        assert!(duplicate.is_err());

        let dropped = drop_constraints(&pool, "tags", &["tags_label_key", "tags_missing_key"])
            .await
            .unwrap();
        assert_eq!(dropped, 1);
        assert!(!has_constraint(&pool, "tags", "tags_label_key").await.unwrap());
        sqlx::query("INSERT INTO tags (label) VALUES ('a'), ('a')")
            .execute(&pool)
            .await
            .unwrap();
    }
}
