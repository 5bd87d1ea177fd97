//! # Signup Notifications
//!
//! Turns committed domain events into notifications and delivers them.
//!
//! ## Architecture
//!
//! ```text
//! DomainEvent ──▶ NotificationPipeline (EventBus)
//!                   │
//!                   ├─▶ compose()          pure: event → NotificationMessage
//!                   └─▶ FanOutDispatcher
//!                         ├─▶ FeedStore      system message + bell (durable, idempotent)
//!                         ├─▶ RealtimeHub    push to open connections
//!                         └─▶ EmailTransport best effort, retried, inline or detached
//!
//! FeedService ──▶ FeedStore + RealtimeHub   user-scoped list / read / delete
//! ```
//!
//! ## Example
//!
//! ```
//! use signup_core::event::{DomainEvent, DomainEventKind};
//! use signup_core::event_bus::EventBus;
//! use signup_notifications::{
//!     DispatcherConfig, EmailDelivery, FanOutDispatcher, FeedService, InMemoryFeedStore,
//!     NotificationPipeline, RealtimeHub,
//! };
//! use signup_testing::{ScriptedEmailTransport, StaticUserDirectory, test_clock};
//! use signup_core::environment::Clock;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let clock = test_clock();
//! let directory = StaticUserDirectory::new();
//! let ada = directory.add("Ada");
//!
//! let store = Arc::new(InMemoryFeedStore::new());
//! let hub = Arc::new(RealtimeHub::default());
//! let dispatcher = FanOutDispatcher::new(
//!     store.clone(),
//!     hub.clone(),
//!     Arc::new(ScriptedEmailTransport::new()),
//!     Arc::new(directory),
//!     DispatcherConfig { email_delivery: EmailDelivery::Inline, ..Default::default() },
//! );
//! let pipeline = NotificationPipeline::new(Arc::new(dispatcher));
//!
//! let event = DomainEvent::new(
//!     DomainEventKind::PasswordResetRequested { user_id: ada },
//!     Some(ada),
//!     clock.now(),
//! );
//! pipeline.publish(&event).await?;
//!
//! let feed = FeedService::new(store, hub, Arc::new(clock));
//! assert_eq!(feed.list_bells(ada).await?.unread_count, 1);
//! # Ok(())
//! # }
//! ```

pub mod composer;
pub mod dispatcher;
pub mod email;
pub mod error;
pub mod feed;
pub mod memory;
pub mod metrics;
pub mod pipeline;
pub mod realtime;
pub mod retry;
pub mod store;

pub use composer::compose;
pub use dispatcher::{ChannelOutcome, DispatchOutcome, DispatcherConfig, EmailDelivery, FanOutDispatcher};
pub use error::{DispatchError, FeedError, FeedResult};
pub use feed::{BellList, BellView, FeedService, Page, SystemMessagePage, SystemMessageView};
pub use memory::InMemoryFeedStore;
pub use pipeline::NotificationPipeline;
pub use realtime::{Push, RealtimeEvent, RealtimeHub, Subscription};
pub use retry::RetryPolicy;
pub use store::{Delivery, EntryCounts, FeedStore};
