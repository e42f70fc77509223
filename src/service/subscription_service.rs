//! Live, ordered views over the announcement collection.
//!
//! Each subscription owns one background task. The task listens to the
//! store's change feed, re-runs the subscription's query after every
//! committed write, and publishes the result through a `watch` channel when
//! it differs from what subscribers already have.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    domain::{Announcement, QueryFilter},
    error::{AppError, Result},
    repository::{AnnouncementRepository, StoreChange},
};

/// Point-in-time ordered result of a live query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub announcements: Vec<Announcement>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.announcements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.announcements.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Announcement> {
        self.announcements.iter().find(|a| a.id == id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.announcements.iter().map(|a| a.id).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryMode {
    Ordered,
    /// Filter-only store query, sorted and capped here.
    Degraded,
}

struct LiveQuery {
    repo: Arc<dyn AnnouncementRepository>,
    filter: QueryFilter,
    max_results: usize,
    mode: QueryMode,
}

impl LiveQuery {
    fn new(repo: Arc<dyn AnnouncementRepository>, filter: QueryFilter, max_results: usize) -> Self {
        Self {
            repo,
            filter,
            max_results,
            mode: QueryMode::Ordered,
        }
    }

    async fn fetch(&mut self) -> Result<Snapshot> {
        if self.mode == QueryMode::Ordered {
            match self.repo.query_ordered(&self.filter, self.max_results).await {
                Ok(announcements) => return Ok(Snapshot { announcements }),
                Err(AppError::UnsupportedQueryShape { index }) => {
                    tracing::warn!(
                        filter = ?self.filter,
                        index = %index,
                        "Ordered announcement query unsupported, falling back to client-side ordering. \
                         Provision the index to restore server-side ordering"
                    );
                    self.mode = QueryMode::Degraded;
                }
                Err(e) => return Err(e),
            }
        }

        let mut announcements = self.repo.query_unordered(&self.filter).await?;
        announcements.retain(|a| self.filter.matches(a));
        announcements.sort_by(Announcement::newest_first);
        announcements.truncate(self.max_results);
        Ok(Snapshot { announcements })
    }
}

/// Cancels a subscription. Cloneable, and safe to call any number of times.
#[derive(Debug, Clone)]
pub struct Unsubscribe {
    token: CancellationToken,
}

impl Unsubscribe {
    pub fn unsubscribe(&self) {
        self.token.cancel();
    }

    pub fn is_unsubscribed(&self) -> bool {
        self.token.is_cancelled()
    }
}

pub struct Subscription {
    id: u64,
    initial: Arc<Snapshot>,
    updates: watch::Receiver<Arc<Snapshot>>,
    cancel: CancellationToken,
    degraded: Arc<AtomicBool>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn initial(&self) -> Arc<Snapshot> {
        self.initial.clone()
    }

    /// Latest snapshot delivered so far.
    pub fn current(&self) -> Arc<Snapshot> {
        self.updates.borrow().clone()
    }

    /// Waits for the next snapshot. Bursts of writes may be coalesced into
    /// one delivery. Returns `None` once unsubscribed.
    pub async fn next(&mut self) -> Option<Arc<Snapshot>> {
        if self.cancel.is_cancelled() {
            return None;
        }

        let changed = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            res = self.updates.changed() => res.is_ok(),
        };

        if !changed || self.cancel.is_cancelled() {
            return None;
        }
        Some(self.updates.borrow_and_update().clone())
    }

    pub fn unsubscribe(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!(subscription = self.id, "Unsubscribing");
            self.cancel.cancel();
        }
    }

    pub fn unsubscribe_handle(&self) -> Unsubscribe {
        Unsubscribe {
            token: self.cancel.clone(),
        }
    }

    /// Whether the store could not order this query and the layer is doing
    /// it instead.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct SubscriptionService {
    repo: Arc<dyn AnnouncementRepository>,
    default_max_results: usize,
    next_id: AtomicU64,
}

impl SubscriptionService {
    pub fn new(repo: Arc<dyn AnnouncementRepository>, default_max_results: usize) -> Self {
        Self {
            repo,
            default_max_results: default_max_results.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    fn resolve_max(&self, max_results: Option<usize>) -> usize {
        match max_results {
            Some(n) if n > 0 => n,
            _ => self.default_max_results,
        }
    }

    /// One-shot query with the same ordering, capping and fallback rules as
    /// a live subscription.
    pub async fn snapshot(&self, filter: QueryFilter, max_results: Option<usize>) -> Result<Snapshot> {
        let mut query = LiveQuery::new(self.repo.clone(), filter, self.resolve_max(max_results));
        query.fetch().await
    }

    /// Registers a live view. The returned subscription carries the initial
    /// snapshot; later ones arrive through [`Subscription::next`].
    pub async fn subscribe(&self, filter: QueryFilter, max_results: Option<usize>) -> Result<Subscription> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        // Listen before the first read so no write slips between the two.
        let changes = self.repo.changes();
        let mut query = LiveQuery::new(self.repo.clone(), filter, self.resolve_max(max_results));
        let initial = Arc::new(query.fetch().await?);

        let (tx, rx) = watch::channel(initial.clone());
        let cancel = CancellationToken::new();
        let degraded = Arc::new(AtomicBool::new(query.mode == QueryMode::Degraded));

        tracing::debug!(
            subscription = id,
            filter = ?filter,
            max_results = query.max_results,
            degraded = degraded.load(Ordering::Relaxed),
            "Subscription opened"
        );

        tokio::spawn(run_subscription(
            id,
            query,
            changes,
            tx,
            cancel.clone(),
            degraded.clone(),
        ));

        Ok(Subscription {
            id,
            initial,
            updates: rx,
            cancel,
            degraded,
        })
    }

    /// Callback flavour of [`subscribe`](Self::subscribe): `on_update` runs
    /// for every snapshot after the initial one until the returned handle is
    /// used.
    pub async fn subscribe_with<F>(
        &self,
        filter: QueryFilter,
        max_results: Option<usize>,
        mut on_update: F,
    ) -> Result<(Arc<Snapshot>, Unsubscribe)>
    where
        F: FnMut(Arc<Snapshot>) + Send + 'static,
    {
        let mut subscription = self.subscribe(filter, max_results).await?;
        let initial = subscription.initial();
        let handle = subscription.unsubscribe_handle();

        tokio::spawn(async move {
            while let Some(snapshot) = subscription.next().await {
                // The handle may have been used while this snapshot was in flight.
                if subscription.cancel.is_cancelled() {
                    break;
                }
                on_update(snapshot);
            }
        });

        Ok((initial, handle))
    }
}

async fn run_subscription(
    id: u64,
    mut query: LiveQuery,
    mut changes: broadcast::Receiver<StoreChange>,
    tx: watch::Sender<Arc<Snapshot>>,
    cancel: CancellationToken,
    degraded: Arc<AtomicBool>,
) {
    loop {
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            _ = tx.closed() => None,
            change = changes.recv() => Some(change),
        };

        let Some(received) = received else { break };
        match received {
            Ok(change) => {
                tracing::trace!(subscription = id, change = ?change, "Store change");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(subscription = id, skipped, "Change feed lagged, refreshing");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }

        // One refresh covers everything already queued.
        while let Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) = changes.try_recv() {}

        let snapshot = match query.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    subscription = id,
                    kind = e.kind(),
                    "Refreshing subscription failed, keeping last snapshot: {}",
                    e
                );
                continue;
            }
        };
        degraded.store(query.mode == QueryMode::Degraded, Ordering::Relaxed);

        if cancel.is_cancelled() {
            break;
        }

        tx.send_if_modified(|current| {
            if **current == snapshot {
                false
            } else {
                *current = Arc::new(snapshot);
                true
            }
        });
    }

    tracing::debug!(subscription = id, "Subscription released");
}
