use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Extension,
    Json,
};
use chrono::{DateTime, Utc};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{format_timestamp, Announcement, Category, QueryFilter, ReadFilter},
    error::{AppError, Result},
    service::{read_state_service::ReadStateService, NotificationFeed},
};

/// An announcement as one particular user sees it.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnnouncementView {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub category: Category,
    pub created_at: Option<DateTime<Utc>>,
    pub created_at_display: Option<String>,
    pub is_read: bool,
}

impl AnnouncementView {
    fn new(announcement: &Announcement, is_read: bool) -> Self {
        Self {
            id: announcement.id,
            title: announcement.title.clone(),
            message: announcement.message.clone(),
            category: announcement.category,
            created_at: announcement.created_at,
            created_at_display: announcement.created_at.as_ref().map(format_timestamp),
            is_read,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCount {
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct FeedPayload {
    pub unread_count: usize,
    pub announcements: Vec<AnnouncementView>,
}

#[derive(Debug, Deserialize)]
pub struct ListAnnouncementsQuery {
    /// `all`, `unread`, or a category name.
    pub filter: Option<String>,
}

fn parse_filter(raw: Option<&str>) -> Result<ReadFilter> {
    let raw = raw.unwrap_or("all");
    ReadFilter::parse(raw).ok_or_else(|| AppError::BadRequest(format!("Unknown filter: {}", raw)))
}

fn feed_payload(feed: &NotificationFeed, filter: ReadFilter) -> FeedPayload {
    FeedPayload {
        unread_count: feed.unread_count(),
        announcements: feed
            .items(filter)
            .into_iter()
            .map(|a| AnnouncementView::new(a, feed.is_read(a.id)))
            .collect(),
    }
}

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<ListAnnouncementsQuery>,
) -> Result<Json<Vec<AnnouncementView>>> {
    let filter = parse_filter(params.filter.as_deref())?;

    let snapshot = state.service_context.subscription_service
        .snapshot(QueryFilter::active_only(), None)
        .await?;

    let views = ReadStateService::filter(&snapshot.announcements, filter, user.user_id())
        .into_iter()
        .map(|a| AnnouncementView::new(a, ReadStateService::is_read(a, user.user_id())))
        .collect();

    Ok(Json(views))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<UnreadCount>> {
    let snapshot = state.service_context.subscription_service
        .snapshot(QueryFilter::active_only(), None)
        .await?;

    Ok(Json(UnreadCount {
        count: ReadStateService::unread_count(&snapshot.announcements, user.user_id()),
    }))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<AnnouncementView>> {
    let announcement = state.service_context.announcement_service.get(id).await?;

    // Inactive announcements are only visible on the admin surface
    if !announcement.active {
        return Err(AppError::NotFound("Announcement not found".to_string()));
    }

    let is_read = ReadStateService::is_read(&announcement, user.user_id());
    Ok(Json(AnnouncementView::new(&announcement, is_read)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<CurrentUser>,
) -> Result<StatusCode> {
    state.service_context.read_state_service
        .mark_as_read(id, user.user_id())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Server-sent events: one `snapshot` event up front, then one per change
/// to the caller's view. Closing the connection releases the subscription.
pub async fn stream(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<ListAnnouncementsQuery>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>>> {
    let filter = parse_filter(params.filter.as_deref())?;

    let subscription = state.service_context.subscription_service
        .subscribe(QueryFilter::active_only(), None)
        .await?;

    tracing::debug!(
        subscription = subscription.id(),
        user = user.user_id(),
        "Notification stream opened"
    );

    let feed = NotificationFeed::new(user.user_id(), subscription.initial());
    let first = Event::default().event("snapshot").json_data(feed_payload(&feed, filter));

    let events = stream::unfold(
        (subscription, feed, Some(first)),
        move |(mut subscription, mut feed, pending)| async move {
            if let Some(event) = pending {
                return Some((event, (subscription, feed, None)));
            }

            let snapshot = subscription.next().await?;
            feed.apply_snapshot(snapshot);
            let event = Event::default().event("snapshot").json_data(feed_payload(&feed, filter));
            Some((event, (subscription, feed, None)))
        },
    );

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
