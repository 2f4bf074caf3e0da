//! Call lifecycle: state machine, registry, redelivery suppression and the
//! orchestrator that ties telephony, speech and the audio bridge together.

pub mod dedup;
mod error;
pub mod orchestrator;
pub mod registry;
pub mod session;
pub mod signal;
pub mod state;

pub use dedup::{DEFAULT_IDEMPOTENCY_CAPACITY, EventDeduplicator, IdempotencyScope};
pub use error::{CallError, CallResult};
pub use orchestrator::{
    CallOrchestrator, FALLBACK_OPERATION_CONTEXT, OrchestratorConfig, OutboundCallInfo,
};
pub use registry::{CallEntry, CallRegistry};
pub use session::{CallDirection, CallSession};
pub use signal::CallSignal;
pub use state::{CallState, CallTrigger, TransitionError};
