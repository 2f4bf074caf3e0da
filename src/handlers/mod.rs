//! HTTP and WebSocket request handlers
//!
//! This module organizes all handlers into logical groups:
//! - `api` - Service banner and health check
//! - `webhooks` - Event Grid deliveries and call-automation callbacks
//! - `outbound` - Outbound call initiation
//! - `media` - Bidirectional media WebSocket

pub mod api;
pub mod media;
pub mod outbound;
pub mod webhooks;

pub use media::media_handler;
