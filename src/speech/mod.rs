//! Speech session management: persona templates and per-call sessions.

pub mod persona;
pub mod session;

pub use persona::{PersonaCatalog, PersonaConfig, TurnDetectionMode, TurnDetectionSettings};
pub use session::{SpeechSession, SpeechSessionManager};
