//! HTTP request handlers.

pub mod feed;
pub mod health;
pub mod registrations;
pub mod websocket;

pub use health::health_check;
pub use websocket::notifications;
