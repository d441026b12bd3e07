use crate::db::{CandidateStore, ChangeFeed};
use crate::error::StoreError;
use crate::models::{Candidate, CandidatePatch, CategoryId, VoteRecord};
use async_trait::async_trait;
use log::info;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, migrate::MigrateDatabase};
use tokio::sync::watch;

pub struct SqliteStore {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl SqliteStore {
    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating database at {}", db_url);
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await?;

        Self::init_schema(&pool).await?;

        Ok(Self {
            pool,
            feed: ChangeFeed::new(),
        })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS candidates (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                title TEXT,
                image TEXT NOT NULL,
                category TEXT,
                votes INTEGER NOT NULL DEFAULT 0,
                badge INTEGER,
                percentage INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS votes (
                id TEXT PRIMARY KEY,
                candidate_id TEXT NOT NULL,
                vote_count INTEGER NOT NULL,
                phone_number TEXT NOT NULL,
                payment_method TEXT,
                provider TEXT,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

fn to_db_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn candidate_from_row(row: &SqliteRow) -> Result<Candidate, sqlx::Error> {
    let category: Option<String> = row.try_get("category")?;
    let votes: i64 = row.try_get("votes")?;
    let badge: Option<i64> = row.try_get("badge")?;
    let percentage: i64 = row.try_get("percentage")?;

    Ok(Candidate {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        title: row.try_get("title")?,
        image: row.try_get("image")?,
        category: category.map(CategoryId::new).unwrap_or_else(CategoryId::unknown),
        votes: u64::try_from(votes).unwrap_or(0),
        badge: badge.and_then(|b| u32::try_from(b).ok()),
        percentage: percentage.clamp(0, 100) as u8,
        legacy_quote: None,
    })
}

// A row that cannot be decoded is reported with its id when one is readable
fn decode_row(row: &SqliteRow) -> Result<Candidate, StoreError> {
    candidate_from_row(row).map_err(|e| StoreError::Malformed {
        id: row.try_get("id").unwrap_or_default(),
        reason: e.to_string(),
    })
}

const UPSERT_CANDIDATE: &str = r#"
    INSERT INTO candidates (id, name, title, image, category, votes, badge, percentage)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id)
    DO UPDATE SET name = excluded.name, title = excluded.title, image = excluded.image,
        category = excluded.category, votes = excluded.votes, badge = excluded.badge,
        percentage = excluded.percentage
"#;

#[async_trait]
impl CandidateStore for SqliteStore {
    async fn get(&self, id: &str) -> Result<Option<Candidate>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, title, image, category, votes, badge, percentage
            FROM candidates
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_row).transpose()
    }

    async fn all(&self) -> Result<Vec<Candidate>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, title, image, category, votes, badge, percentage
            FROM candidates
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_row).collect()
    }

    async fn insert(&self, candidate: &Candidate) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO candidates (id, name, title, image, category, votes, badge, percentage)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&candidate.id)
        .bind(&candidate.name)
        .bind(&candidate.title)
        .bind(&candidate.image)
        .bind(candidate.category.as_deref())
        .bind(to_db_count(candidate.votes))
        .bind(candidate.badge.map(i64::from))
        .bind(i64::from(candidate.percentage))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                self.feed.notify();
                Ok(())
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::AlreadyExists(candidate.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, candidate: &Candidate) -> Result<(), StoreError> {
        sqlx::query(UPSERT_CANDIDATE)
            .bind(&candidate.id)
            .bind(&candidate.name)
            .bind(&candidate.title)
            .bind(&candidate.image)
            .bind(candidate.category.as_deref())
            .bind(to_db_count(candidate.votes))
            .bind(candidate.badge.map(i64::from))
            .bind(i64::from(candidate.percentage))
            .execute(&self.pool)
            .await?;

        self.feed.notify();
        Ok(())
    }

    async fn update(&self, id: &str, patch: &CandidatePatch) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE candidates
            SET name = COALESCE(?, name),
                title = COALESCE(?, title),
                image = COALESCE(?, image),
                category = COALESCE(?, category),
                votes = COALESCE(?, votes),
                badge = CASE WHEN ? THEN ? ELSE badge END
            WHERE id = ?
            "#,
        )
        .bind(&patch.name)
        .bind(&patch.title)
        .bind(&patch.image)
        .bind(&patch.category)
        .bind(patch.votes)
        .bind(patch.badge.is_some())
        .bind(patch.badge.flatten().map(i64::from))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        self.feed.notify();
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM candidates WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            self.feed.notify();
        }
        Ok(())
    }

    async fn increment(&self, id: &str, amount: u64) -> Result<(), StoreError> {
        // Single statement, so concurrent submissions cannot overwrite each other
        let result = sqlx::query("UPDATE candidates SET votes = votes + ? WHERE id = ?")
            .bind(to_db_count(amount))
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        self.feed.notify();
        Ok(())
    }

    async fn apply_merge(
        &self,
        survivor: &Candidate,
        removed_ids: &[String],
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let kept: Option<i64> = sqlx::query_scalar("SELECT votes FROM candidates WHERE id = ?")
            .bind(&survivor.id)
            .fetch_optional(&mut *tx)
            .await?;
        let mut total = kept
            .map(|v| u64::try_from(v).unwrap_or(0))
            .ok_or_else(|| StoreError::NotFound(survivor.id.clone()))?;

        for id in removed_ids {
            let votes: Option<i64> = sqlx::query_scalar("SELECT votes FROM candidates WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            if let Some(votes) = votes {
                total = total.saturating_add(u64::try_from(votes).unwrap_or(0));
            }

            sqlx::query("DELETE FROM candidates WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(UPSERT_CANDIDATE)
            .bind(&survivor.id)
            .bind(&survivor.name)
            .bind(&survivor.title)
            .bind(&survivor.image)
            .bind(survivor.category.as_deref())
            .bind(to_db_count(total))
            .bind(survivor.badge.map(i64::from))
            .bind(i64::from(survivor.percentage))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.feed.notify();
        Ok(total)
    }

    async fn record_vote(&self, record: &VoteRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO votes (id, candidate_id, vote_count, phone_number, payment_method, provider, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.candidate_id)
        .bind(to_db_count(record.vote_count))
        .bind(&record.phone_number)
        .bind(&record.payment_method)
        .bind(&record.provider)
        .bind(&record.status)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        let result = sqlx::query("DELETE FROM candidates")
            .execute(&self.pool)
            .await?;

        self.feed.notify();
        Ok(result.rows_affected() as usize)
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:", 1).await.unwrap()
    }

    #[tokio::test]
    async fn round_trips_records_in_id_order() {
        let store = store().await;
        let mut badged = Candidate::new("etienne-kampos", "Étienne kampos", "/e.jpg", "M")
            .with_votes(1847);
        badged.badge = Some(1);
        store.insert(&badged).await.unwrap();
        store
            .insert(&Candidate::new("de-flow", "De Flow", "/d.jpg", "M").with_votes(1654))
            .await
            .unwrap();

        let all = store.all().await.unwrap();
        let ids: Vec<&str> = all.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["de-flow", "etienne-kampos"]);
        assert_eq!(store.get("etienne-kampos").await.unwrap(), Some(badged));
        assert_eq!(store.get("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_insert_leaves_row_unchanged() {
        let store = store().await;
        let original = Candidate::new("a", "A", "/a.jpg", "X").with_votes(9);
        store.insert(&original).await.unwrap();

        let result = store.insert(&Candidate::new("a", "B", "/b.jpg", "Y")).await;
        assert!(matches!(result, Err(StoreError::AlreadyExists(id)) if id == "a"));
        assert_eq!(store.all().await.unwrap(), vec![original]);
    }

    #[tokio::test]
    async fn patch_updates_only_given_fields() {
        let store = store().await;
        let mut original = Candidate::new("a", "A", "/a.jpg", "X").with_votes(4);
        original.badge = Some(3);
        store.insert(&original).await.unwrap();

        let patch = CandidatePatch {
            title: Some("New title".into()),
            votes: Some(10),
            ..Default::default()
        };
        store.update("a", &patch).await.unwrap();
        let updated = store.get("a").await.unwrap().unwrap();
        assert_eq!(updated.title.as_deref(), Some("New title"));
        assert_eq!(updated.votes, 10);
        assert_eq!(updated.badge, Some(3));
        assert_eq!(updated.name, "A");

        let clear_badge = CandidatePatch {
            badge: Some(None),
            ..Default::default()
        };
        store.update("a", &clear_badge).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().unwrap().badge, None);

        assert!(matches!(
            store.update("missing", &patch).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn increment_and_merge() {
        let store = store().await;
        store
            .insert(&Candidate::new("keep", "A", "/a.jpg", "X").with_votes(100))
            .await
            .unwrap();
        store
            .insert(&Candidate::new("drop", "a ", "/a.jpg", "X").with_votes(50))
            .await
            .unwrap();

        store.increment("keep", 1).await.unwrap();
        assert!(matches!(
            store.increment("ghost", 1).await,
            Err(StoreError::NotFound(_))
        ));

        let survivor = Candidate::new("keep", "A", "/a.jpg", "X");
        let merged = store
            .apply_merge(&survivor, &["drop".to_string()])
            .await
            .unwrap();
        assert_eq!(merged, 151);
        assert_eq!(store.get("drop").await.unwrap(), None);
        assert_eq!(store.get("keep").await.unwrap().unwrap().votes, 151);

        assert_eq!(store.clear().await.unwrap(), 1);
        assert!(store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn records_votes() {
        let store = store().await;
        let record = VoteRecord::new("a".into(), 3, "690123456".into(), None, Some("mtn".into()));
        store.record_vote(&record).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE candidate_id = 'a'")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let created_at: String = sqlx::query_scalar("SELECT created_at FROM votes WHERE id = ?")
            .bind(&record.id)
            .fetch_one(&store.pool)
            .await
            .unwrap();
        let parsed = chrono::DateTime::parse_from_rfc3339(&created_at).unwrap();
        assert_eq!(parsed, record.created_at);
    }
}
