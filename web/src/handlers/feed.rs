//! Notification feed endpoints, scoped to the caller.
//!
//! System messages:
//! - GET /notifications/messages?page=1&per_page=20 - One page, newest first
//! - POST /notifications/messages/:id/read - Mark one read
//! - POST /notifications/messages/read-all - Mark all read
//! - DELETE /notifications/messages/:id - Delete one (and its bells)
//!
//! Bells:
//! - GET /notifications/bells - Recent bells with the unread count
//! - POST /notifications/bells/:id/read - Mark one read
//! - POST /notifications/bells/read-all - Mark all read
//! - DELETE /notifications/bells/:id - Delete one
//!
//! Ids of other users' entries and bells behave as not found. Bell changes are
//! also pushed to the caller's `/ws/notifications` stream.

use crate::error::AppError;
use crate::extractors::CurrentActor;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use signup_core::notification::{BellPointer, SystemMessageEntry};
use signup_core::types::{BellId, EntryId};
use signup_notifications::{BellList, Page, SystemMessagePage};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Paging query of the system message list.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// Page number, starting at 1 (default 1)
    pub page: Option<u32>,
    /// Items per page (default 20, at most 100)
    pub per_page: Option<u32>,
}

impl From<PageQuery> for Page {
    fn from(query: PageQuery) -> Self {
        let default = Self::default();
        Self {
            page: query.page.unwrap_or(default.page),
            per_page: query.per_page.unwrap_or(default.per_page),
        }
    }
}

/// Response of the mark-all endpoints.
#[derive(Debug, Serialize)]
pub struct MarkAllResponse {
    /// Items that were unread before the call
    pub changed: u64,
}

// ============================================================================
// System messages
// ============================================================================

/// List the caller's system messages.
///
/// ```bash
/// curl "http://localhost:8080/notifications/messages?page=2&per_page=10" -H "X-User-Id: 0b6f..."
/// ```
///
/// # Errors
///
/// 400 for an out-of-range page or page size.
pub async fn list_system_messages(
    actor: CurrentActor,
    Query(query): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<Json<SystemMessagePage>, AppError> {
    let page = state.feed.list_system_messages(actor.id, query.into()).await?;
    Ok(Json(page))
}

/// Mark one system message read; returns the updated entry.
///
/// # Errors
///
/// 404 if the caller owns no such entry.
pub async fn mark_system_message_read(
    actor: CurrentActor,
    Path(entry_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<SystemMessageEntry>, AppError> {
    let entry = state
        .feed
        .mark_system_message_read(actor.id, EntryId::from_uuid(entry_id))
        .await?;
    Ok(Json(entry))
}

/// Mark every system message of the caller read.
///
/// # Errors
///
/// 500 on store failure.
pub async fn mark_all_system_messages_read(
    actor: CurrentActor,
    State(state): State<AppState>,
) -> Result<Json<MarkAllResponse>, AppError> {
    let changed = state.feed.mark_all_system_messages_read(actor.id).await?;
    Ok(Json(MarkAllResponse { changed }))
}

/// Delete one system message together with its bells.
///
/// # Errors
///
/// 404 if the caller owns no such entry.
pub async fn delete_system_message(
    actor: CurrentActor,
    Path(entry_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state
        .feed
        .delete_system_message(actor.id, EntryId::from_uuid(entry_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Bells
// ============================================================================

/// The caller's recent bells and unread count.
///
/// ```bash
/// curl http://localhost:8080/notifications/bells -H "X-User-Id: 0b6f..."
/// ```
///
/// Response:
/// ```json
/// {"items": [{"bell_id": "...", "title": "New sign-up: Food Drive", "is_read": false, ...}], "unread_count": 1}
/// ```
///
/// # Errors
///
/// 500 on store failure.
pub async fn list_bells(
    actor: CurrentActor,
    State(state): State<AppState>,
) -> Result<Json<BellList>, AppError> {
    Ok(Json(state.feed.list_bells(actor.id).await?))
}

/// Mark one bell read; returns the updated bell.
///
/// # Errors
///
/// 404 if the caller owns no such bell.
pub async fn mark_bell_read(
    actor: CurrentActor,
    Path(bell_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<BellPointer>, AppError> {
    let bell = state
        .feed
        .mark_bell_read(actor.id, BellId::from_uuid(bell_id))
        .await?;
    Ok(Json(bell))
}

/// Mark every bell of the caller read.
///
/// # Errors
///
/// 500 on store failure.
pub async fn mark_all_bells_read(
    actor: CurrentActor,
    State(state): State<AppState>,
) -> Result<Json<MarkAllResponse>, AppError> {
    let changed = state.feed.mark_all_bells_read(actor.id).await?;
    Ok(Json(MarkAllResponse { changed }))
}

/// Delete one bell. Its system message stays.
///
/// # Errors
///
/// 404 if the caller owns no such bell.
pub async fn delete_bell(
    actor: CurrentActor,
    Path(bell_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state
        .feed
        .delete_bell(actor.id, BellId::from_uuid(bell_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
