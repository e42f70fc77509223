pub mod announcement_service;
pub mod read_state_service;
pub mod subscription_service;

use std::sync::Arc;
use crate::repository::*;
use crate::auth::IdentityProvider;
use announcement_service::AnnouncementService;
use read_state_service::ReadStateService;
use subscription_service::SubscriptionService;

pub use announcement_service::{AdminListQuery, Reader};
pub use read_state_service::NotificationFeed;
pub use subscription_service::{Snapshot, Subscription, Unsubscribe};

pub struct ServiceContext {
    pub announcement_repo: Arc<dyn AnnouncementRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub identity_provider: Arc<dyn IdentityProvider>,
    pub announcement_service: Arc<AnnouncementService>,
    pub read_state_service: Arc<ReadStateService>,
    pub subscription_service: Arc<SubscriptionService>,
}

impl ServiceContext {
    pub fn new(
        announcement_repo: Arc<dyn AnnouncementRepository>,
        user_repo: Arc<dyn UserRepository>,
        identity_provider: Arc<dyn IdentityProvider>,
        max_results: usize,
    ) -> Self {
        let announcement_service = Arc::new(AnnouncementService::new(
            announcement_repo.clone(),
            user_repo.clone(),
        ));
        let read_state_service = Arc::new(ReadStateService::new(announcement_repo.clone()));
        let subscription_service = Arc::new(SubscriptionService::new(
            announcement_repo.clone(),
            max_results,
        ));

        Self {
            announcement_repo,
            user_repo,
            identity_provider,
            announcement_service,
            read_state_service,
            subscription_service,
        }
    }
}
