use sqlx::SqlitePool;

use crate::models::Subscription;

const SELECT_SUBSCRIPTION: &str = "SELECT name, url, include_words, exclude_words FROM subscription";

pub struct SubscriptionRepository;

impl SubscriptionRepository {
    /// All subscriptions, in name order.
    pub async fn list(pool: &SqlitePool) -> Result<Vec<Subscription>, sqlx::Error> {
        let query = format!("{SELECT_SUBSCRIPTION} ORDER BY name");
        sqlx::query_as::<_, Subscription>(&query).fetch_all(pool).await
    }

    pub async fn get(pool: &SqlitePool, name: &str) -> Result<Option<Subscription>, sqlx::Error> {
        let query = format!("{SELECT_SUBSCRIPTION} WHERE name = $1");
        sqlx::query_as::<_, Subscription>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Create or replace a subscription under its unique name.
    pub async fn upsert(pool: &SqlitePool, sub: &Subscription) -> Result<(), sqlx::Error> {
        sqlx::query(
            "REPLACE INTO subscription(name, url, include_words, exclude_words)
             VALUES($1, $2, $3, $4)",
        )
        .bind(&sub.name)
        .bind(&sub.url)
        .bind(&sub.include_words)
        .bind(&sub.exclude_words)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Delete by name. Ledger entries are left in place; removing the
    /// associated downloads is an explicit user action.
    pub async fn delete(pool: &SqlitePool, name: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM subscription WHERE name = $1")
            .bind(name)
            .execute(pool)
            .await?;
        Ok(())
    }
}
