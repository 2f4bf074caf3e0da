//! Webhook endpoints called by the telephony platform.
//!
//! Both endpoints acknowledge with `200` whatever happens to the events they
//! carry; the platform retries anything else.

pub mod callbacks;
pub mod incoming;

pub use callbacks::{callback_handler, context_callback_handler};
pub use incoming::incoming_call_handler;
