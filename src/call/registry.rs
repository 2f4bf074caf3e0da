//! Live call registry.
//!
//! Calls are keyed by correlation id; a secondary index maps the platform call
//! id once it is known. Each entry sits behind its own async mutex so one call's
//! setup I/O never blocks another.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Mutex;

use super::session::CallSession;
use crate::bridge::{AudioBridge, OutboundQueue, OutboundRelay, TelephonyTransport};
use crate::speech::SpeechSession;

/// Everything the gateway holds for one call.
#[derive(Debug)]
pub struct CallEntry {
    pub session: CallSession,
    /// Media transport parked until the bridge starts
    pub media: Option<TelephonyTransport>,
    pub bridge: Option<AudioBridge>,
    pub speech: Option<Arc<SpeechSession>>,
    /// Outbound queue parked until the bridge starts
    pub outbound: Option<OutboundQueue>,
    pub relay: Option<Arc<OutboundRelay>>,
    /// Speech session creation is in flight
    pub speech_pending: bool,
    /// `MediaStreamingStarted` arrived but `Streaming` is not entered yet
    pub streaming_pending: bool,
}

impl CallEntry {
    pub fn new(session: CallSession) -> Self {
        Self {
            session,
            media: None,
            bridge: None,
            speech: None,
            outbound: None,
            relay: None,
            speech_pending: false,
            streaming_pending: false,
        }
    }
}

pub type SharedCallEntry = Arc<Mutex<CallEntry>>;

#[derive(Debug, Default)]
pub struct CallRegistry {
    by_correlation: DashMap<String, SharedCallEntry>,
    call_index: DashMap<String, String>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new call, returning its shared entry.
    pub fn insert(&self, session: CallSession) -> SharedCallEntry {
        let correlation_id = session.correlation_id.clone();
        if let Some(call_id) = session.call_id.clone() {
            self.call_index.insert(call_id, correlation_id.clone());
        }
        let entry = Arc::new(Mutex::new(CallEntry::new(session)));
        self.by_correlation.insert(correlation_id, entry.clone());
        entry
    }

    pub fn get(&self, correlation_id: &str) -> Option<SharedCallEntry> {
        self.by_correlation
            .get(correlation_id)
            .map(|e| e.value().clone())
    }

    pub fn correlation_for(&self, call_id: &str) -> Option<String> {
        self.call_index.get(call_id).map(|c| c.value().clone())
    }

    pub fn find_by_call_id(&self, call_id: &str) -> Option<SharedCallEntry> {
        let correlation_id = self.correlation_for(call_id)?;
        self.get(&correlation_id)
    }

    /// Record `call_id -> correlation_id`. A call id, once bound, is never
    /// re-pointed; returns `false` if it already belongs to another call.
    pub fn bind_call_id(&self, call_id: &str, correlation_id: &str) -> bool {
        match self.call_index.entry(call_id.to_string()) {
            Entry::Occupied(existing) => existing.get() == correlation_id,
            Entry::Vacant(slot) => {
                slot.insert(correlation_id.to_string());
                true
            }
        }
    }

    /// Drop a call and its index entry.
    pub fn remove(&self, correlation_id: &str, call_id: Option<&str>) -> Option<SharedCallEntry> {
        if let Some(call_id) = call_id {
            self.call_index
                .remove_if(call_id, |_, corr| corr == correlation_id);
        }
        self.by_correlation
            .remove(correlation_id)
            .map(|(_, entry)| entry)
    }

    pub fn len(&self) -> usize {
        self.by_correlation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_correlation.is_empty()
    }
}
