mod common;

use campus_portal::{
    domain::{AnnouncementPatch, Category, QueryFilter},
    error::AppError,
    repository::{AnnouncementRepository, SqliteAnnouncementRepository, StoreChange},
};
use tokio::sync::broadcast::error::TryRecvError;
use uuid::Uuid;

use common::{drop_index, request, test_pool};

#[tokio::test]
async fn test_create_sets_server_defaults() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = SqliteAnnouncementRepository::new(pool);

    let id = repo
        .create(request("Exam Notice", "Exams start Monday", Category::Academic))
        .await?;

    let announcement = repo.find_by_id(id).await?.expect("announcement exists");
    assert_eq!(announcement.title, "Exam Notice");
    assert_eq!(announcement.message, "Exams start Monday");
    assert_eq!(announcement.category, Category::Academic);
    assert!(announcement.active);
    assert!(announcement.read_by.is_empty());
    assert!(announcement.created_at.is_some());

    Ok(())
}

#[tokio::test]
async fn test_create_message_length_boundary() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = SqliteAnnouncementRepository::new(pool);

    let ok = repo
        .create(request("Limits", &"m".repeat(500), Category::General))
        .await;
    assert!(ok.is_ok());

    let too_long = repo
        .create(request("Limits", &"m".repeat(501), Category::General))
        .await;
    assert!(matches!(too_long, Err(AppError::Validation(_))));

    let long_title = repo
        .create(request(&"t".repeat(101), "body", Category::General))
        .await;
    assert!(matches!(long_title, Err(AppError::Validation(_))));

    let empty_title = repo.create(request("", "body", Category::General)).await;
    assert!(matches!(empty_title, Err(AppError::Validation(_))));

    // Rejected requests never reach the table
    assert_eq!(repo.list_all().await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_limits_apply_to_trimmed_text() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = SqliteAnnouncementRepository::new(pool);

    let padded_title = format!(" {}", "x".repeat(100));
    let padded_message = format!("{} ", "m".repeat(500));
    let id = repo
        .create(request(&padded_title, &padded_message, Category::General))
        .await?;

    let stored = repo.find_by_id(id).await?.expect("announcement exists");
    assert_eq!(stored.title, "x".repeat(100));
    assert_eq!(stored.message, "m".repeat(500));

    let updated = repo
        .update(id, AnnouncementPatch {
            title: Some(format!("{}  ", "y".repeat(100))),
            ..Default::default()
        })
        .await?;
    assert_eq!(updated.title, "y".repeat(100));

    Ok(())
}

#[tokio::test]
async fn test_concurrent_toggles_both_apply() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = SqliteAnnouncementRepository::new(pool);
    let id = repo.create(request("Room change", "B12", Category::General)).await?;

    let (first, second) = tokio::join!(repo.toggle_active(id), repo.toggle_active(id));
    let mut seen = vec![first?.active, second?.active];
    seen.sort();
    assert_eq!(seen, vec![false, true]);

    let announcement = repo.find_by_id(id).await?.expect("announcement exists");
    assert!(announcement.active);

    let missing = repo.toggle_active(Uuid::new_v4()).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_mark_read_is_idempotent() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = SqliteAnnouncementRepository::new(pool);
    let id = repo.create(request("Library hours", "Open late", Category::General)).await?;

    repo.mark_read(id, "alice").await?;
    repo.mark_read(id, "alice").await?;

    let announcement = repo.find_by_id(id).await?.expect("announcement exists");
    assert_eq!(announcement.read_by.len(), 1);
    assert!(announcement.is_read_by("alice"));

    Ok(())
}

#[tokio::test]
async fn test_concurrent_mark_read() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = SqliteAnnouncementRepository::new(pool);
    let id = repo.create(request("Fire drill", "At noon", Category::Urgent)).await?;

    let (a, b, c) = tokio::join!(
        repo.mark_read(id, "alice"),
        repo.mark_read(id, "bob"),
        repo.mark_read(id, "alice"),
    );
    a?;
    b?;
    c?;

    let announcement = repo.find_by_id(id).await?.expect("announcement exists");
    let readers: Vec<&str> = announcement.read_by.iter().map(String::as_str).collect();
    assert_eq!(readers, vec!["alice", "bob"]);

    Ok(())
}

#[tokio::test]
async fn test_mark_read_unknown_announcement() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = SqliteAnnouncementRepository::new(pool);

    let result = repo.mark_read(Uuid::new_v4(), "alice").await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_partial_update() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = SqliteAnnouncementRepository::new(pool);
    let id = repo.create(request("Sports day", "Friday", Category::Event)).await?;
    let before = repo.find_by_id(id).await?.expect("announcement exists");

    let updated = repo
        .update(id, AnnouncementPatch {
            message: Some("Moved to Saturday".to_string()),
            ..Default::default()
        })
        .await?;
    assert_eq!(updated.title, "Sports day");
    assert_eq!(updated.message, "Moved to Saturday");
    assert_eq!(updated.category, Category::Event);
    assert_eq!(updated.created_at, before.created_at);

    let hidden = repo.update(id, AnnouncementPatch::active(false)).await?;
    assert!(!hidden.active);

    let missing = repo.update(Uuid::new_v4(), AnnouncementPatch::active(true)).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    let invalid = repo
        .update(id, AnnouncementPatch {
            title: Some("x".repeat(101)),
            ..Default::default()
        })
        .await;
    assert!(matches!(invalid, Err(AppError::Validation(_))));

    Ok(())
}

#[tokio::test]
async fn test_delete_is_idempotent() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = SqliteAnnouncementRepository::new(pool.clone());
    let id = repo.create(request("Old news", "Ignore", Category::General)).await?;
    repo.mark_read(id, "alice").await?;

    repo.delete(id).await?;
    repo.delete(id).await?;
    repo.delete(Uuid::new_v4()).await?;

    assert!(repo.find_by_id(id).await?.is_none());

    let receipts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM announcement_reads WHERE announcement_id = ?")
        .bind(id.to_string())
        .fetch_one(&pool)
        .await?;
    assert_eq!(receipts, 0);

    Ok(())
}

#[tokio::test]
async fn test_ordered_query_requires_index() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = SqliteAnnouncementRepository::new(pool.clone());

    let first = repo.create(request("First", "1", Category::General)).await?;
    let second = repo.create(request("Second", "2", Category::Academic)).await?;
    let third = repo.create(request("Third", "3", Category::General)).await?;
    repo.update(second, AnnouncementPatch::active(false)).await?;

    let ordered = repo.query_ordered(&QueryFilter::active_only(), 20).await?;
    let ids: Vec<Uuid> = ordered.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![third, first]);

    let capped = repo.query_ordered(&QueryFilter::active_only(), 1).await?;
    assert_eq!(capped.len(), 1);
    assert_eq!(capped[0].id, third);

    drop_index(&pool, "idx_announcements_active_created").await?;

    let degraded = repo.query_ordered(&QueryFilter::active_only(), 20).await;
    match degraded {
        Err(AppError::UnsupportedQueryShape { index }) => {
            assert_eq!(index, "idx_announcements_active_created");
        }
        other => panic!("expected unsupported query shape, got {:?}", other.map(|v| v.len())),
    }

    let unordered = repo.query_unordered(&QueryFilter::active_only()).await?;
    assert_eq!(unordered.len(), 2);
    assert!(unordered.iter().all(|a| a.active));

    // Category-only has no index; the unfiltered shape needs none
    let academic = repo
        .query_ordered(&QueryFilter::default().with_category(Category::Academic), 20)
        .await;
    assert!(matches!(academic, Err(AppError::UnsupportedQueryShape { .. })));
    let everything = repo.query_ordered(&QueryFilter::default(), 20).await?;
    assert_eq!(everything.len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_change_feed() -> anyhow::Result<()> {
    let pool = test_pool().await?;
    let repo = SqliteAnnouncementRepository::new(pool);
    let mut changes = repo.changes();

    let id = repo.create(request("Feed", "Body", Category::General)).await?;
    assert_eq!(changes.try_recv()?, StoreChange::Created(id));

    repo.mark_read(id, "alice").await?;
    repo.mark_read(id, "alice").await?;
    assert_eq!(
        changes.try_recv()?,
        StoreChange::Read { id, user_id: "alice".to_string() }
    );
    // The duplicate read changed nothing, so nothing is announced
    assert!(matches!(changes.try_recv(), Err(TryRecvError::Empty)));

    repo.delete(id).await?;
    repo.delete(id).await?;
    assert_eq!(changes.try_recv()?, StoreChange::Deleted(id));
    assert!(matches!(changes.try_recv(), Err(TryRecvError::Empty)));

    Ok(())
}
