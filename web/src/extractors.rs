//! Custom Axum extractors.

use crate::error::AppError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use signup_core::types::Actor;
use std::ops::Deref;

/// The authenticated caller.
///
/// Read from the request extensions, where [`crate::middleware::forwarded_identity`]
/// (or any other authentication layer) stores the resolved [`Actor`].
/// Requests without one are rejected with 401.
///
/// # Example
///
/// ```ignore
/// async fn handler(actor: CurrentActor) -> String {
///     format!("Hello {}", actor.id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

impl Deref for CurrentActor {
    type Target = Actor;

    fn deref(&self) -> &Actor {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Actor>()
            .cloned()
            .map(Self)
            .ok_or_else(|| AppError::unauthorized("Authentication required"))
    }
}
