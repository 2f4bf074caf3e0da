//! Azure Communication Services Call Automation.
//!
//! REST client for answering, placing, announcing on and hanging up calls.
//! Requests are authenticated with the resource access key (HMAC-SHA256).

mod auth;
mod client;


pub use auth::{AcsCredentials, SignedHeaders};
pub use client::{AcsCallAutomationClient, DEFAULT_ACS_API_VERSION};
