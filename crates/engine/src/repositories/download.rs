use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::DownloadRecord;

const SELECT_DOWNLOAD: &str = "SELECT url, created_at, handle FROM download";

pub struct DownloadRepository;

impl DownloadRepository {
    pub async fn exists(pool: &SqlitePool, url: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM download WHERE url = $1")
            .bind(url)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    /// The dedup gate: atomically record the url unless it is already known.
    ///
    /// Returns whether this call created the record; callers must skip every
    /// external side effect when it did not.
    pub async fn insert_if_absent(
        pool: &SqlitePool,
        url: &str,
        handle: Option<i64>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO download(url, created_at, handle) VALUES($1, $2, $3)",
        )
        .bind(url)
        .bind(Utc::now())
        .bind(handle)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get(pool: &SqlitePool, url: &str) -> Result<Option<DownloadRecord>, sqlx::Error> {
        let query = format!("{SELECT_DOWNLOAD} WHERE url = $1");
        sqlx::query_as::<_, DownloadRecord>(&query)
            .bind(url)
            .fetch_optional(pool)
            .await
    }

    /// Bind or clear the external client handle for an existing record.
    pub async fn assign_handle(
        pool: &SqlitePool,
        url: &str,
        handle: Option<i64>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE download SET handle = $1 WHERE url = $2")
            .bind(handle)
            .bind(url)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_pool;

    #[tokio::test]
    async fn test_insert_if_absent_is_idempotent() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let url = "http://example.com/a.torrent";

        assert!(DownloadRepository::insert_if_absent(&pool, url, None).await.unwrap());
        assert!(!DownloadRepository::insert_if_absent(&pool, url, None).await.unwrap());

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM download")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_exists_reflects_insert() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let url = "http://example.com/a.torrent";

        assert!(!DownloadRepository::exists(&pool, url).await.unwrap());
        DownloadRepository::insert_if_absent(&pool, url, None).await.unwrap();
        assert!(DownloadRepository::exists(&pool, url).await.unwrap());
    }

    #[tokio::test]
    async fn test_assign_and_clear_handle() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let url = "http://example.com/a.torrent";
        DownloadRepository::insert_if_absent(&pool, url, None).await.unwrap();

        DownloadRepository::assign_handle(&pool, url, Some(7)).await.unwrap();
        let record = DownloadRepository::get(&pool, url).await.unwrap().unwrap();
        assert_eq!(record.handle, Some(7));

        DownloadRepository::assign_handle(&pool, url, None).await.unwrap();
        let record = DownloadRepository::get(&pool, url).await.unwrap().unwrap();
        assert_eq!(record.handle, None);
    }
}
