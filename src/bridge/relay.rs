//! Outbound audio relay (speech to telephony).
//!
//! The speech dispatch loop pushes assistant audio into an [`OutboundRelay`];
//! the bridge writer drains the paired [`OutboundQueue`]. Audio is resampled
//! to the telephony rate on the way in.
//!
//! Barge-in bumps an epoch counter. The queue drops audio stamped with an older
//! epoch and yields a `StopAudio` frame before the first frame of the new
//! epoch, so playback stops at once and nothing queued before the interruption
//! reaches the caller.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, warn};

use crate::core::audio::resample_pcm16;
use crate::core::telephony::OutboundFrame;

/// Default number of audio chunks buffered ahead of the writer.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 512;

#[derive(Debug)]
struct QueuedAudio {
    epoch: u64,
    pcm: Bytes,
}

#[derive(Debug, Default)]
struct RelayShared {
    epoch: AtomicU64,
    barge_in: Notify,
    discarded: AtomicU64,
}

/// Result of pushing a chunk of assistant audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// The queue is full; the chunk was dropped.
    Dropped,
    /// The writer side is gone.
    Closed,
}

/// Producer side, held by the speech session.
#[derive(Debug)]
pub struct OutboundRelay {
    call_id: String,
    tx: mpsc::Sender<QueuedAudio>,
    shared: Arc<RelayShared>,
    speech_rate: u32,
    telephony_rate: u32,
    last_item_id: Mutex<Option<String>>,
}

/// Consumer side, drained by the bridge writer.
#[derive(Debug)]
pub struct OutboundQueue {
    rx: mpsc::Receiver<QueuedAudio>,
    shared: Arc<RelayShared>,
    seen_epoch: u64,
    pending: Option<OutboundFrame>,
}

/// Create a relay/queue pair for one call.
pub fn outbound_channel(
    call_id: impl Into<String>,
    speech_rate: u32,
    telephony_rate: u32,
    capacity: usize,
) -> (Arc<OutboundRelay>, OutboundQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let shared = Arc::new(RelayShared::default());

    let relay = OutboundRelay {
        call_id: call_id.into(),
        tx,
        shared: shared.clone(),
        speech_rate,
        telephony_rate,
        last_item_id: Mutex::new(None),
    };
    let queue = OutboundQueue {
        rx,
        shared,
        seen_epoch: 0,
        pending: None,
    };
    (Arc::new(relay), queue)
}

impl OutboundRelay {
    /// Queue a chunk of assistant PCM at the speech sample rate.
    pub fn push_audio(&self, pcm: &[u8], item_id: Option<&str>) -> PushOutcome {
        if let Some(item_id) = item_id {
            let mut last = self.last_item_id.lock();
            if last.as_deref() != Some(item_id) {
                *last = Some(item_id.to_string());
            }
        }

        let pcm = resample_pcm16(pcm, self.speech_rate, self.telephony_rate);
        let queued = QueuedAudio {
            epoch: self.shared.epoch.load(Ordering::SeqCst),
            pcm: Bytes::from(pcm),
        };

        match self.tx.try_send(queued) {
            Ok(()) => PushOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(call_id = %self.call_id, "Outbound audio queue full, dropping chunk");
                PushOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => PushOutcome::Closed,
        }
    }

    /// Interrupt playback: discard queued audio and stop the platform player.
    pub fn barge_in(&self) {
        let epoch = self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.barge_in.notify_one();
        debug!(call_id = %self.call_id, epoch, "Barge-in");
    }

    /// Id of the conversation item whose audio was pushed last.
    pub fn last_item_id(&self) -> Option<String> {
        self.last_item_id.lock().clone()
    }

    /// Audio chunks discarded by barge-in so far.
    pub fn discarded(&self) -> u64 {
        self.shared.discarded.load(Ordering::Relaxed)
    }
}

impl OutboundQueue {
    /// Next frame to write, or `None` once the relay is dropped and drained.
    pub async fn next(&mut self) -> Option<OutboundFrame> {
        loop {
            if let Some(frame) = self.pending.take() {
                return Some(frame);
            }

            let current = self.shared.epoch.load(Ordering::SeqCst);
            if current != self.seen_epoch {
                self.seen_epoch = current;
                return Some(OutboundFrame::StopAudio);
            }

            tokio::select! {
                biased;

                _ = self.shared.barge_in.notified() => continue,

                queued = self.rx.recv() => {
                    let queued = queued?;
                    if queued.epoch < self.shared.epoch.load(Ordering::SeqCst) {
                        self.shared.discarded.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    let frame = OutboundFrame::Audio(queued.pcm);
                    if queued.epoch != self.seen_epoch {
                        self.seen_epoch = queued.epoch;
                        self.pending = Some(frame);
                        return Some(OutboundFrame::StopAudio);
                    }
                    return Some(frame);
                }
            }
        }
    }
}
