//! Registration endpoints.
//!
//! - POST /events/:event_id/registrations - Sign up (self, or another user
//!   with participant-management rights)
//! - DELETE /registrations/:id - Cancel a registration
//! - POST /registrations/:id/move - Move a registration to another role
//!
//! Every endpoint is a thin call into the [`RegistrationCoordinator`]; the
//! capability checks, the capacity ledger and the notifications all happen
//! there. Refusals come back as 409 (`EVENT_CLOSED`, `ROLE_FULL`,
//! `DUPLICATE_REGISTRATION`, `ROLE_CAP_EXCEEDED`) or 403 (`FORBIDDEN`).
//!
//! [`RegistrationCoordinator`]: signup_registration::RegistrationCoordinator

use crate::error::AppError;
use crate::extractors::CurrentActor;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use signup_core::types::{EventId, Registration, RegistrationId, RoleId, UserId};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to sign up for a role.
#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    /// Role to take
    pub role_id: Uuid,
    /// User to register; the caller when absent
    pub user_id: Option<Uuid>,
}

/// Request to move a registration.
#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    /// Target role on the same event
    pub role_id: Uuid,
}

// ============================================================================
// Handlers
// ============================================================================

/// Sign up for a role.
///
/// Without `user_id` (or with the caller's own id) this is a self sign-up
/// and requires a verified account on an open event. With another user's id
/// it adds that user, which needs participant-management rights.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/events/550e8400-e29b-41d4-a716-446655440000/registrations \
///   -H "X-User-Id: 0b6f..." -H "X-User-Tier: participant" -H "X-User-Verified: true" \
///   -H "Content-Type: application/json" \
///   -d '{"role_id": "660e8400-e29b-41d4-a716-446655440001"}'
/// ```
///
/// Response (201):
/// ```json
/// {"id": "...", "user_id": "0b6f...", "event_id": "550e...", "role_id": "660e...", ...}
/// ```
///
/// # Errors
///
/// The coordinator's refusal, mapped by [`AppError`].
pub async fn sign_up(
    actor: CurrentActor,
    Path(event_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(request): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<Registration>), AppError> {
    let event_id = EventId::from_uuid(event_id);
    let role_id = RoleId::from_uuid(request.role_id);
    let user_id = request.user_id.map_or(actor.id, UserId::from_uuid);

    let registration = if user_id == actor.id {
        state.coordinator.sign_up(&actor, event_id, role_id).await?
    } else {
        state
            .coordinator
            .add_participant(&actor, user_id, event_id, role_id)
            .await?
    };

    Ok((StatusCode::CREATED, Json(registration)))
}

/// Cancel a registration.
///
/// The registrant may cancel their own; anyone else needs
/// participant-management rights.
///
/// ```bash
/// curl -X DELETE http://localhost:8080/registrations/770e8400-e29b-41d4-a716-446655440002 \
///   -H "X-User-Id: 0b6f..." -H "X-User-Tier: participant" -H "X-User-Verified: true"
/// ```
///
/// Returns the removed registration.
///
/// # Errors
///
/// The coordinator's refusal, mapped by [`AppError`].
pub async fn cancel(
    actor: CurrentActor,
    Path(registration_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Registration>, AppError> {
    let cancelled = state
        .coordinator
        .cancel(&actor, RegistrationId::from_uuid(registration_id))
        .await?;
    Ok(Json(cancelled))
}

/// Move a registration to another role of its event.
///
/// ```bash
/// curl -X POST http://localhost:8080/registrations/770e8400-e29b-41d4-a716-446655440002/move \
///   -H "X-User-Id: 0b6f..." -H "X-User-Tier: participant" -H "X-User-Verified: true" \
///   -H "Content-Type: application/json" \
///   -d '{"role_id": "880e8400-e29b-41d4-a716-446655440003"}'
/// ```
///
/// # Errors
///
/// The coordinator's refusal, mapped by [`AppError`].
pub async fn move_registration(
    actor: CurrentActor,
    Path(registration_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<Registration>, AppError> {
    let moved = state
        .coordinator
        .move_registration(
            &actor,
            RegistrationId::from_uuid(registration_id),
            RoleId::from_uuid(request.role_id),
        )
        .await?;
    Ok(Json(moved))
}
