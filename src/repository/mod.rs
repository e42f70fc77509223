use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod announcement_repository;
pub mod user_repository;

pub use announcement_repository::SqliteAnnouncementRepository;
pub use user_repository::SqliteUserRepository;

/// Notification emitted by the store after a write has committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Created(Uuid),
    Updated(Uuid),
    Deleted(Uuid),
    Read { id: Uuid, user_id: String },
}

impl StoreChange {
    pub fn id(&self) -> Uuid {
        match self {
            StoreChange::Created(id)
            | StoreChange::Updated(id)
            | StoreChange::Deleted(id)
            | StoreChange::Read { id, .. } => *id,
        }
    }
}

/// Durable storage for announcements and their read receipts.
///
/// The store does not check who is calling; authorization lives at the
/// API boundary.
#[async_trait]
pub trait AnnouncementRepository: Send + Sync {
    /// Validates, persists with `active = true` and an empty read set, and
    /// returns the store-assigned id.
    async fn create(&self, request: CreateAnnouncementRequest) -> Result<Uuid>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Announcement>>;
    /// Every announcement, active or not, newest first.
    async fn list_all(&self) -> Result<Vec<Announcement>>;
    async fn update(&self, id: Uuid, patch: AnnouncementPatch) -> Result<Announcement>;
    /// Flips `active` in a single statement.
    async fn toggle_active(&self, id: Uuid) -> Result<Announcement>;
    /// Deleting an unknown id is not an error.
    async fn delete(&self, id: Uuid) -> Result<()>;
    /// Atomic add-to-set on the read receipts. Repeating the call is a no-op.
    async fn mark_read(&self, id: Uuid, user_id: &str) -> Result<()>;
    /// Filtered, newest-first, capped query executed by the store. Fails with
    /// `AppError::UnsupportedQueryShape` when the store cannot order this
    /// filter server-side.
    async fn query_ordered(&self, filter: &QueryFilter, limit: usize) -> Result<Vec<Announcement>>;
    /// Filter-only query in no particular order.
    async fn query_unordered(&self, filter: &QueryFilter) -> Result<Vec<Announcement>>;
    /// Subscribe to committed writes.
    fn changes(&self) -> broadcast::Receiver<StoreChange>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, request: CreateUserRequest) -> Result<User>;
    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;
    /// Batch lookup. Unknown ids are simply absent from the result.
    async fn display_names(&self, ids: &[String]) -> Result<HashMap<String, String>>;
}
