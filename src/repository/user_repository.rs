use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use crate::{
    domain::{CreateUserRequest, User, UserRole},
    error::{AppError, Result},
    repository::UserRepository,
};

#[derive(FromRow)]
struct UserRow {
    id: String,
    display_name: String,
    email: String,
    role: String,
    created_at: NaiveDateTime,
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: UserRow) -> Result<User> {
        Ok(User {
            role: UserRole::from_str(&row.role)
                .ok_or_else(|| AppError::Internal(format!("Invalid user role: {}", row.role)))?,
            id: row.id,
            display_name: row.display_name,
            email: row.email,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, request: CreateUserRequest) -> Result<User> {
        if request.id.trim().is_empty() {
            return Err(AppError::Validation("User id must not be blank".to_string()));
        }

        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO users (id, display_name, email, role, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#
        )
        .bind(&request.id)
        .bind(&request.display_name)
        .bind(&request.email)
        .bind(request.role.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(&request.id).await?.ok_or_else(|| {
            AppError::Internal("Failed to retrieve created user".to_string())
        })
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, display_name, email, role, created_at FROM users WHERE id = ?"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_user).transpose()
    }

    async fn display_names(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, display_name FROM users WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");

        let rows: Vec<(String, String)> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().collect())
    }
}
