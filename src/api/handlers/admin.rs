use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{Announcement, AnnouncementPatch, Category, CreateAnnouncementRequest},
    error::{AppError, Result},
    service::{AdminListQuery, Reader},
};

#[derive(Debug, Deserialize)]
pub struct AdminAnnouncementsQuery {
    pub q: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminAnnouncementView {
    #[serde(flatten)]
    pub announcement: Announcement,
    pub read_count: usize,
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<AdminAnnouncementsQuery>,
) -> Result<Json<Vec<AdminAnnouncementView>>> {
    let category = match params.category.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            Category::from_str(raw)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown category: {}", raw)))?,
        ),
    };

    let query = AdminListQuery {
        search: params.q,
        category,
    };

    let announcements = state.service_context.announcement_service
        .admin_list(&query)
        .await?;

    Ok(Json(
        announcements
            .into_iter()
            .map(|announcement| AdminAnnouncementView {
                read_count: announcement.read_by.len(),
                announcement,
            })
            .collect(),
    ))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    Json(request): Json<CreateAnnouncementRequest>,
) -> Result<(StatusCode, Json<Announcement>)> {
    let announcement = state.service_context.announcement_service
        .create(request)
        .await?;

    tracing::info!(announcement = %announcement.id, admin = admin.user_id(), "Published announcement");

    Ok((StatusCode::CREATED, Json(announcement)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<AnnouncementPatch>,
) -> Result<Json<Announcement>> {
    let announcement = state.service_context.announcement_service
        .update(id, patch)
        .await?;

    Ok(Json(announcement))
}

pub async fn toggle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Announcement>> {
    let announcement = state.service_context.announcement_service
        .toggle_active(id)
        .await?;

    Ok(Json(announcement))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(admin): Extension<CurrentUser>,
) -> Result<StatusCode> {
    state.service_context.announcement_service.delete(id).await?;

    tracing::info!(announcement = %id, admin = admin.user_id(), "Removed announcement");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn readers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Reader>>> {
    let readers = state.service_context.announcement_service
        .readers(id)
        .await?;

    Ok(Json(readers))
}
