use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    domain::{Announcement, ReadFilter},
    error::Result,
    repository::AnnouncementRepository,
    service::subscription_service::{Snapshot, Subscription},
};

/// Per-user read state over announcement snapshots.
pub struct ReadStateService {
    repo: Arc<dyn AnnouncementRepository>,
}

impl ReadStateService {
    pub fn new(repo: Arc<dyn AnnouncementRepository>) -> Self {
        Self { repo }
    }

    pub fn is_read(announcement: &Announcement, user_id: &str) -> bool {
        announcement.is_read_by(user_id)
    }

    /// Active announcements `user_id` has not read yet.
    pub fn unread_count(announcements: &[Announcement], user_id: &str) -> usize {
        announcements
            .iter()
            .filter(|a| a.active && !Self::is_read(a, user_id))
            .count()
    }

    /// Tab filtering for the notification surface. Inactive announcements
    /// never show up here.
    pub fn filter<'a>(
        announcements: &'a [Announcement],
        filter: ReadFilter,
        user_id: &str,
    ) -> Vec<&'a Announcement> {
        announcements
            .iter()
            .filter(|a| a.active)
            .filter(|a| match filter {
                ReadFilter::All => true,
                ReadFilter::Unread => !Self::is_read(a, user_id),
                ReadFilter::Category(category) => a.category == category,
            })
            .collect()
    }

    pub async fn mark_as_read(&self, id: Uuid, user_id: &str) -> Result<()> {
        match self.repo.mark_read(id, user_id).await {
            Ok(()) => {
                tracing::debug!(announcement = %id, user = user_id, "Marked announcement read");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    operation = "mark_read",
                    announcement = %id,
                    user = user_id,
                    kind = e.kind(),
                    transient = e.is_transient(),
                    "Marking announcement read failed: {}",
                    e
                );
                Err(e)
            }
        }
    }

    /// Unread badge count that follows `subscription`. The count is
    /// recomputed for every delivered snapshot; the subscription is released
    /// when the last receiver is dropped.
    pub fn watch_unread(&self, mut subscription: Subscription, user_id: String) -> watch::Receiver<usize> {
        let initial = Self::unread_count(&subscription.initial().announcements, &user_id);
        let (tx, rx) = watch::channel(initial);

        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = tx.closed() => None,
                    snapshot = subscription.next() => snapshot,
                };
                let Some(snapshot) = next else { break };

                let count = Self::unread_count(&snapshot.announcements, &user_id);
                tx.send_if_modified(|current| {
                    if *current == count {
                        false
                    } else {
                        *current = count;
                        true
                    }
                });
            }
            subscription.unsubscribe();
        });

        rx
    }
}

/// One user's local view of the notification surface.
///
/// Every delivered snapshot replaces the previous one wholesale. The only
/// local state that survives a replacement is an optimistic read that the
/// store has neither confirmed nor rejected yet.
#[derive(Debug, Clone)]
pub struct NotificationFeed {
    user_id: String,
    snapshot: Arc<Snapshot>,
    pending_reads: HashSet<Uuid>,
}

impl NotificationFeed {
    pub fn new(user_id: impl Into<String>, snapshot: Arc<Snapshot>) -> Self {
        Self {
            user_id: user_id.into(),
            snapshot,
            pending_reads: HashSet::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn apply_snapshot(&mut self, snapshot: Arc<Snapshot>) {
        let user_id = &self.user_id;
        // Keep a pending read only while the store still shows it unread.
        self.pending_reads.retain(|id| {
            snapshot
                .get(*id)
                .map(|a| !a.is_read_by(user_id))
                .unwrap_or(false)
        });
        self.snapshot = snapshot;
    }

    pub fn is_read(&self, id: Uuid) -> bool {
        self.pending_reads.contains(&id)
            || self
                .snapshot
                .get(id)
                .map(|a| a.is_read_by(&self.user_id))
                .unwrap_or(false)
    }

    pub fn has_pending(&self, id: Uuid) -> bool {
        self.pending_reads.contains(&id)
    }

    pub fn unread_count(&self) -> usize {
        self.snapshot
            .announcements
            .iter()
            .filter(|a| a.active && !self.is_read(a.id))
            .count()
    }

    pub fn items(&self, filter: ReadFilter) -> Vec<&Announcement> {
        self.snapshot
            .announcements
            .iter()
            .filter(|a| a.active)
            .filter(|a| match filter {
                ReadFilter::All => true,
                ReadFilter::Unread => !self.is_read(a.id),
                ReadFilter::Category(category) => a.category == category,
            })
            .collect()
    }

    /// Optimistically shows `id` as read, then asks the store. A failure
    /// rolls the item back to unread and is returned to the caller.
    pub async fn mark_as_read(&mut self, read_state: &ReadStateService, id: Uuid) -> Result<()> {
        if self.is_read(id) {
            return Ok(());
        }

        self.pending_reads.insert(id);
        match read_state.mark_as_read(id, &self.user_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.pending_reads.remove(&id);
                Err(e)
            }
        }
    }
}
