//! Request middleware.
//!
//! The server runs behind the authentication gateway, which validates the
//! session, strips any client-supplied identity headers and forwards the
//! resolved identity in these headers:
//!
//! - `X-User-Id`: user UUID
//! - `X-User-Tier`: `participant`, `leader`, `administrator` or `super_admin`
//! - `X-User-Verified`: `true` or `false` (defaults to `false`)
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, middleware};
//!
//! let app = Router::new()
//!     .route("/ws/notifications", get(notifications))
//!     .layer(middleware::from_fn(forwarded_identity));
//! ```

use crate::error::AppError;
use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use signup_core::types::{Actor, RoleTier, UserId};
use uuid::Uuid;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "X-User-Id";
/// Header carrying the user's global role tier.
pub const USER_TIER_HEADER: &str = "X-User-Tier";
/// Header carrying the email verification flag.
pub const USER_VERIFIED_HEADER: &str = "X-User-Verified";

/// Resolve the forwarded identity headers into an [`Actor`] request extension.
///
/// Requests without `X-User-Id` pass through anonymously; handlers that need
/// an actor reject them via [`crate::extractors::CurrentActor`]. Malformed
/// identity headers are rejected with 400.
pub async fn forwarded_identity(mut req: Request, next: Next) -> Response {
    match actor_from_headers(req.headers()) {
        Ok(Some(actor)) => {
            tracing::debug!(user_id = %actor.id, tier = %actor.tier, "Request identity resolved");
            req.extensions_mut().insert(actor);
        }
        Ok(None) => {}
        Err(err) => return err.into_response(),
    }
    next.run(req).await
}

fn actor_from_headers(headers: &HeaderMap) -> Result<Option<Actor>, AppError> {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

    let Some(raw_id) = header(USER_ID_HEADER) else {
        return Ok(None);
    };
    let id = Uuid::parse_str(raw_id.trim())
        .map(UserId::from_uuid)
        .map_err(|_| AppError::bad_request(format!("Malformed {USER_ID_HEADER} header")))?;

    let tier = header(USER_TIER_HEADER)
        .ok_or_else(|| AppError::bad_request(format!("Missing {USER_TIER_HEADER} header")))?;
    let tier: RoleTier = serde_json::from_value(serde_json::Value::String(tier.trim().to_string()))
        .map_err(|_| AppError::bad_request(format!("Unknown role tier: {tier}")))?;

    let verified = header(USER_VERIFIED_HEADER).is_some_and(|value| value.trim() == "true");

    Ok(Some(Actor { id, verified, tier }))
}
