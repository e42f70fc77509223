mod common;

use std::sync::Arc;

use campus_portal::{
    domain::Category,
    repository::{SqliteAnnouncementRepository, SqliteUserRepository},
    service::announcement_service::AnnouncementService,
};

use common::{request, test_pool};

async fn service() -> anyhow::Result<AnnouncementService> {
    let pool = test_pool().await?;
    Ok(AnnouncementService::new(
        Arc::new(SqliteAnnouncementRepository::new(pool.clone())),
        Arc::new(SqliteUserRepository::new(pool)),
    ))
}

#[tokio::test]
async fn test_simultaneous_toggles_cancel_out() -> anyhow::Result<()> {
    let service = service().await?;
    let created = service
        .create(request("Lab closed", "Maintenance", Category::Academic))
        .await?;

    let (a, b) = tokio::join!(
        service.toggle_active(created.id),
        service.toggle_active(created.id),
    );
    a?;
    b?;

    assert!(service.get(created.id).await?.active);

    let hidden = service.toggle_active(created.id).await?;
    assert!(!hidden.active);

    Ok(())
}

#[tokio::test]
async fn test_set_active_is_absolute() -> anyhow::Result<()> {
    let service = service().await?;
    let created = service
        .create(request("Concert", "Friday night", Category::Event))
        .await?;

    service.set_active(created.id, false).await?;
    let again = service.set_active(created.id, false).await?;
    assert!(!again.active);

    let restored = service.set_active(created.id, true).await?;
    assert!(restored.active);

    Ok(())
}
