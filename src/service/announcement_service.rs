use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::{Announcement, AnnouncementPatch, Category, CreateAnnouncementRequest},
    error::{AppError, Result},
    repository::{AnnouncementRepository, UserRepository},
};

/// Someone who has read an announcement, resolved through the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reader {
    pub user_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct AdminListQuery {
    /// Case-insensitive substring over title and message.
    pub search: Option<String>,
    pub category: Option<Category>,
}

/// Administrative operations on announcements.
pub struct AnnouncementService {
    repo: Arc<dyn AnnouncementRepository>,
    users: Arc<dyn UserRepository>,
}

impl AnnouncementService {
    pub fn new(repo: Arc<dyn AnnouncementRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { repo, users }
    }

    fn log_failure(operation: &str, id: Option<Uuid>, err: &AppError) {
        tracing::warn!(
            operation,
            announcement = ?id,
            kind = err.kind(),
            transient = err.is_transient(),
            "Announcement operation failed: {}",
            err
        );
    }

    /// Get an announcement by ID
    pub async fn get(&self, id: Uuid) -> Result<Announcement> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))
    }

    /// Publish a new announcement
    pub async fn create(&self, request: CreateAnnouncementRequest) -> Result<Announcement> {
        let id = self.repo.create(request).await.map_err(|e| {
            Self::log_failure("create", None, &e);
            e
        })?;

        tracing::info!(announcement = %id, "Announcement created");
        self.get(id).await
    }

    pub async fn update(&self, id: Uuid, patch: AnnouncementPatch) -> Result<Announcement> {
        if patch.is_empty() {
            return Err(AppError::BadRequest("No fields to update".to_string()));
        }

        self.repo.update(id, patch).await.map_err(|e| {
            Self::log_failure("update", Some(id), &e);
            e
        })
    }

    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<Announcement> {
        let announcement = self.repo.update(id, AnnouncementPatch::active(active)).await.map_err(|e| {
            Self::log_failure("set_active", Some(id), &e);
            e
        })?;

        tracing::info!(announcement = %id, active, "Announcement visibility changed");
        Ok(announcement)
    }

    pub async fn toggle_active(&self, id: Uuid) -> Result<Announcement> {
        let announcement = self.repo.toggle_active(id).await.map_err(|e| {
            Self::log_failure("toggle_active", Some(id), &e);
            e
        })?;

        tracing::info!(announcement = %id, active = announcement.active, "Announcement visibility changed");
        Ok(announcement)
    }

    /// Delete permanently. Unlike the store, an unknown id is reported so
    /// the admin view can refresh.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if self.repo.find_by_id(id).await?.is_none() {
            let err = AppError::NotFound("Announcement not found".to_string());
            Self::log_failure("delete", Some(id), &err);
            return Err(err);
        }

        self.repo.delete(id).await.map_err(|e| {
            Self::log_failure("delete", Some(id), &e);
            e
        })?;

        tracing::info!(announcement = %id, "Announcement deleted");
        Ok(())
    }

    /// Every announcement, active or not, narrowed by search text and category.
    pub async fn admin_list(&self, query: &AdminListQuery) -> Result<Vec<Announcement>> {
        let needle = query
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let announcements = self.repo.list_all().await?;

        Ok(announcements
            .into_iter()
            .filter(|a| {
                if let Some(ref needle) = needle {
                    let matches = a.title.to_lowercase().contains(needle)
                        || a.message.to_lowercase().contains(needle);
                    if !matches {
                        return false;
                    }
                }
                query.category.map_or(true, |c| a.category == c)
            })
            .collect())
    }

    /// Readers of one announcement with display names, resolved in a single
    /// directory call.
    pub async fn readers(&self, id: Uuid) -> Result<Vec<Reader>> {
        let announcement = self.get(id).await?;
        self.resolve_readers(&announcement.read_by).await
    }

    pub async fn resolve_readers(&self, read_by: &BTreeSet<String>) -> Result<Vec<Reader>> {
        let ids: Vec<String> = read_by.iter().cloned().collect();
        let names = self.users.display_names(&ids).await?;

        let mut readers: Vec<Reader> = ids
            .into_iter()
            .map(|user_id| Reader {
                display_name: names.get(&user_id).cloned().unwrap_or_else(|| user_id.clone()),
                user_id,
            })
            .collect();
        readers.sort_by(|a, b| a.display_name.to_lowercase().cmp(&b.display_name.to_lowercase()));
        Ok(readers)
    }
}
