#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use campus_portal::{
    domain::{Category, CreateAnnouncementRequest},
    service::{Snapshot, Subscription},
};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

/// In-memory database with the real migrations applied. A single,
/// never-recycled connection keeps the in-memory database alive.
pub async fn test_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await?;

    Ok(pool)
}

pub async fn drop_index(pool: &SqlitePool, name: &str) -> anyhow::Result<()> {
    sqlx::query(&format!("DROP INDEX IF EXISTS {}", name))
        .execute(pool)
        .await?;
    Ok(())
}

pub fn request(title: &str, message: &str, category: Category) -> CreateAnnouncementRequest {
    CreateAnnouncementRequest {
        title: title.to_string(),
        message: message.to_string(),
        category,
    }
}

/// Wait until the subscription delivers a snapshot matching `pred`.
pub async fn wait_for<F>(subscription: &mut Subscription, pred: F) -> anyhow::Result<Arc<Snapshot>>
where
    F: Fn(&Snapshot) -> bool,
{
    let current = subscription.current();
    if pred(&current) {
        return Ok(current);
    }

    let found = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(snapshot) = subscription.next().await {
            if pred(&snapshot) {
                return Some(snapshot);
            }
        }
        None
    })
    .await
    .map_err(|_| anyhow!("timed out waiting for snapshot"))?;

    found.ok_or_else(|| anyhow!("subscription closed before a matching snapshot arrived"))
}

pub fn assert_newest_first(snapshot: &Snapshot) {
    for pair in snapshot.announcements.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if let (Some(x), Some(y)) = (a.created_at, b.created_at) {
            assert!(x >= y, "{} ({}) listed before newer {} ({})", a.title, x, b.title, y);
        }
    }
}
