//! Axum server for the event sign-up platform.
//!
//! Wires the registration coordinator, the notification pipeline and the
//! feed service into one [`AppState`], and exposes:
//!
//! - `GET /health`: liveness
//! - `/events/:event_id/registrations` and `/registrations/:id`: sign-up,
//!   cancel and move (see [`handlers::registrations`])
//! - `/notifications/messages` and `/notifications/bells`: the caller's feed
//!   (see [`handlers::feed`])
//! - `GET /ws/notifications`: the caller's real-time bell stream
//!
//! # Request Flow
//!
//! 1. **Identity**: [`middleware::forwarded_identity`] turns the gateway's
//!    identity headers into an [`signup_core::types::Actor`] extension
//! 2. **Extract**: handlers take [`CurrentActor`] (401 when absent)
//! 3. **Call** the coordinator or feed service
//! 4. **Map** domain errors through [`AppError`]
//!
//! # Example
//!
//! ```ignore
//! let state = AppState::assemble(backends, config.email.dispatch, 64);
//! let app = signup_web::router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use config::Config;
pub use directory::SeededUserDirectory;
pub use error::AppError;
pub use extractors::CurrentActor;
pub use state::{AppState, Backends};

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

/// Build the router with every endpoint.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Registrations
        .route(
            "/events/:event_id/registrations",
            post(handlers::registrations::sign_up),
        )
        .route("/registrations/:id", delete(handlers::registrations::cancel))
        .route(
            "/registrations/:id/move",
            post(handlers::registrations::move_registration),
        )
        // Feed
        .route(
            "/notifications/messages",
            get(handlers::feed::list_system_messages),
        )
        .route(
            "/notifications/messages/read-all",
            post(handlers::feed::mark_all_system_messages_read),
        )
        .route(
            "/notifications/messages/:id",
            delete(handlers::feed::delete_system_message),
        )
        .route(
            "/notifications/messages/:id/read",
            post(handlers::feed::mark_system_message_read),
        )
        .route("/notifications/bells", get(handlers::feed::list_bells))
        .route(
            "/notifications/bells/read-all",
            post(handlers::feed::mark_all_bells_read),
        )
        .route("/notifications/bells/:id", delete(handlers::feed::delete_bell))
        .route(
            "/notifications/bells/:id/read",
            post(handlers::feed::mark_bell_read),
        )
        .route("/ws/notifications", get(handlers::notifications))
        .layer(axum::middleware::from_fn(middleware::forwarded_identity))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
