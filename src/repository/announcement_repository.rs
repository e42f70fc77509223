use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tokio::sync::broadcast;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{Announcement, AnnouncementPatch, Category, CreateAnnouncementRequest, QueryFilter},
    error::{AppError, Result},
    repository::{AnnouncementRepository, StoreChange},
};

pub const ACTIVE_CREATED_INDEX: &str = "idx_announcements_active_created";
pub const ACTIVE_CATEGORY_CREATED_INDEX: &str = "idx_announcements_active_category_created";
pub const CATEGORY_CREATED_INDEX: &str = "idx_announcements_category_created";

const DEFAULT_CHANGE_BUFFER: usize = 256;

const SELECT_ANNOUNCEMENTS: &str = r#"
    SELECT a.id, a.title, a.message, a.category, a.active, a.created_at,
           COALESCE(
               (SELECT json_group_array(r.user_id)
                FROM announcement_reads r
                WHERE r.announcement_id = a.id),
               '[]'
           ) AS read_by
    FROM announcements a
"#;

const ORDER_NEWEST_FIRST: &str = " ORDER BY a.created_at IS NULL, a.created_at DESC, a.id ASC";

#[derive(FromRow)]
struct AnnouncementRow {
    id: String,
    title: String,
    message: String,
    category: String,
    active: i32,
    created_at: Option<NaiveDateTime>,
    read_by: String,
}

pub struct SqliteAnnouncementRepository {
    pool: SqlitePool,
    changes: broadcast::Sender<StoreChange>,
}

impl SqliteAnnouncementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_change_buffer(pool, DEFAULT_CHANGE_BUFFER)
    }

    pub fn with_change_buffer(pool: SqlitePool, capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self { pool, changes }
    }

    fn row_to_announcement(row: AnnouncementRow) -> Result<Announcement> {
        let read_by: BTreeSet<String> = serde_json::from_str(&row.read_by)
            .map_err(|e| AppError::Internal(format!("Invalid read receipts for {}: {}", row.id, e)))?;

        Ok(Announcement {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Internal(e.to_string()))?,
            title: row.title,
            message: row.message,
            category: Category::from_str(&row.category).ok_or_else(|| {
                AppError::Internal(format!("Invalid announcement category: {}", row.category))
            })?,
            active: row.active != 0,
            created_at: row.created_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            read_by,
        })
    }

    /// Composite index the store needs to filter and order `filter`
    /// server-side, if any.
    pub fn required_index(filter: &QueryFilter) -> Option<&'static str> {
        match (filter.active.is_some(), filter.category.is_some()) {
            (true, false) => Some(ACTIVE_CREATED_INDEX),
            (true, true) => Some(ACTIVE_CATEGORY_CREATED_INDEX),
            (false, true) => Some(CATEGORY_CREATED_INDEX),
            (false, false) => None,
        }
    }

    async fn index_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?"
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &QueryFilter) {
        builder.push(" WHERE 1 = 1");
        if let Some(active) = filter.active {
            builder.push(" AND a.active = ").push_bind(if active { 1i32 } else { 0i32 });
        }
        if let Some(category) = filter.category {
            builder.push(" AND a.category = ").push_bind(category.as_str());
        }
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM announcements WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    fn publish(&self, change: StoreChange) {
        // No receivers just means nobody is watching right now.
        let _ = self.changes.send(change);
    }
}

#[async_trait]
impl AnnouncementRepository for SqliteAnnouncementRepository {
    async fn create(&self, request: CreateAnnouncementRequest) -> Result<Uuid> {
        let request = request.normalized();
        request.validate()?;

        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO announcements (id, title, message, category, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, 1, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(&request.title)
        .bind(&request.message)
        .bind(request.category.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.publish(StoreChange::Created(id));
        Ok(id)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Announcement>> {
        let sql = format!("{} WHERE a.id = ?", SELECT_ANNOUNCEMENTS);
        let row = sqlx::query_as::<_, AnnouncementRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_announcement).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Announcement>> {
        let sql = format!("{}{}", SELECT_ANNOUNCEMENTS, ORDER_NEWEST_FIRST);
        let rows = sqlx::query_as::<_, AnnouncementRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(Self::row_to_announcement)
            .collect()
    }

    async fn update(&self, id: Uuid, patch: AnnouncementPatch) -> Result<Announcement> {
        let patch = patch.normalized();
        patch.validate()?;

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE announcements SET updated_at = ");
        builder.push_bind(Utc::now().naive_utc());
        if let Some(title) = patch.title.as_deref() {
            builder.push(", title = ").push_bind(title.to_string());
        }
        if let Some(message) = patch.message.as_deref() {
            builder.push(", message = ").push_bind(message.to_string());
        }
        if let Some(category) = patch.category {
            builder.push(", category = ").push_bind(category.as_str());
        }
        if let Some(active) = patch.active {
            builder.push(", active = ").push_bind(if active { 1i32 } else { 0i32 });
        }
        builder.push(" WHERE id = ").push_bind(id.to_string());

        let result = builder.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Announcement not found".to_string()));
        }

        self.publish(StoreChange::Updated(id));

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::NotFound("Announcement not found".to_string())
        })
    }

    async fn toggle_active(&self, id: Uuid) -> Result<Announcement> {
        let result = sqlx::query(
            "UPDATE announcements SET active = 1 - active, updated_at = ? WHERE id = ?"
        )
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Announcement not found".to_string()));
        }

        self.publish(StoreChange::Updated(id));

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::NotFound("Announcement not found".to_string())
        })
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let id_str = id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM announcement_reads WHERE announcement_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM announcements WHERE id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if result.rows_affected() > 0 {
            self.publish(StoreChange::Deleted(id));
        }

        Ok(())
    }

    async fn mark_read(&self, id: Uuid, user_id: &str) -> Result<()> {
        // INSERT ... SELECT keeps the existence check and the set-add in one
        // statement; the primary key gives set semantics.
        let result = sqlx::query(
            r#"
            INSERT INTO announcement_reads (announcement_id, user_id, read_at)
            SELECT id, ?, ? FROM announcements WHERE id = ?
            ON CONFLICT (announcement_id, user_id) DO NOTHING
            "#
        )
        .bind(user_id)
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            if !self.exists(id).await? {
                return Err(AppError::NotFound("Announcement not found".to_string()));
            }
            return Ok(());
        }

        self.publish(StoreChange::Read {
            id,
            user_id: user_id.to_string(),
        });
        Ok(())
    }

    async fn query_ordered(&self, filter: &QueryFilter, limit: usize) -> Result<Vec<Announcement>> {
        if let Some(index) = Self::required_index(filter) {
            if !self.index_exists(index).await? {
                return Err(AppError::UnsupportedQueryShape {
                    index: index.to_string(),
                });
            }
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_ANNOUNCEMENTS);
        Self::push_filter(&mut builder, filter);
        builder.push(ORDER_NEWEST_FIRST);
        builder.push(" LIMIT ").push_bind(limit as i64);

        let rows = builder
            .build_query_as::<AnnouncementRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(Self::row_to_announcement)
            .collect()
    }

    async fn query_unordered(&self, filter: &QueryFilter) -> Result<Vec<Announcement>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_ANNOUNCEMENTS);
        Self::push_filter(&mut builder, filter);

        let rows = builder
            .build_query_as::<AnnouncementRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(Self::row_to_announcement)
            .collect()
    }

    fn changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_index_per_filter_shape() {
        let repo_index = SqliteAnnouncementRepository::required_index;
        assert_eq!(repo_index(&QueryFilter::active_only()), Some(ACTIVE_CREATED_INDEX));
        assert_eq!(
            repo_index(&QueryFilter::active_only().with_category(Category::Urgent)),
            Some(ACTIVE_CATEGORY_CREATED_INDEX)
        );
        assert_eq!(
            repo_index(&QueryFilter::default().with_category(Category::Event)),
            Some(CATEGORY_CREATED_INDEX)
        );
        assert_eq!(repo_index(&QueryFilter::default()), None);
    }

    #[test]
    fn test_change_id() {
        let id = Uuid::new_v4();
        assert_eq!(StoreChange::Read { id, user_id: "u".into() }.id(), id);
        assert_eq!(StoreChange::Deleted(id).id(), id);
    }
}
