//! Application state shared by all handlers.

use signup_core::environment::{Clock, EmailTransport, UserDirectory};
use signup_notifications::{
    DispatcherConfig, FanOutDispatcher, FeedService, FeedStore, NotificationPipeline, RealtimeHub,
};
use signup_registration::{RegistrationCoordinator, RegistrationStore};
use std::sync::Arc;

/// The collaborators the services are built from.
///
/// Store and transport choices are made by the caller (the server binary
/// picks them from configuration; tests use in-memory doubles).
pub struct Backends {
    /// Events, roles and registrations
    pub registrations: Arc<dyn RegistrationStore>,
    /// Messages, system message entries and bells
    pub feed: Arc<dyn FeedStore>,
    /// Audience resolution
    pub directory: Arc<dyn UserDirectory>,
    /// Outbound email
    pub email: Arc<dyn EmailTransport>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Registration coordinator; every domain event it commits flows through
    /// the notification pipeline
    pub coordinator: Arc<RegistrationCoordinator>,
    /// User-scoped feed access and the real-time hub
    pub feed: FeedService,
}

impl AppState {
    /// Wire the coordinator, notification pipeline and feed service.
    ///
    /// `connection_buffer` bounds each real-time connection's queue.
    #[must_use]
    pub fn assemble(backends: Backends, dispatch: DispatcherConfig, connection_buffer: usize) -> Self {
        let hub = Arc::new(RealtimeHub::new(connection_buffer));
        let dispatcher = FanOutDispatcher::new(
            backends.feed.clone(),
            hub.clone(),
            backends.email,
            backends.directory,
            dispatch,
        );
        let pipeline = Arc::new(NotificationPipeline::new(Arc::new(dispatcher)));
        let coordinator = Arc::new(RegistrationCoordinator::new(
            backends.registrations,
            pipeline,
            backends.clock.clone(),
        ));
        let feed = FeedService::new(backends.feed, hub, backends.clock);

        Self { coordinator, feed }
    }
}
