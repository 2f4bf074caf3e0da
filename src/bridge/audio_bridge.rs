//! Per-call duplex audio bridge.
//!
//! Two tasks run while the bridge is active:
//! - inbound: telephony frames -> `input_audio_buffer.append` on the speech transport
//! - writer: [`OutboundQueue`] -> telephony sink
//!
//! The bridge owns the telephony transport. It reports transport loss and
//! write failures through the call signal channel and never tears itself
//! down; [`AudioBridge::shutdown`] is called by the orchestrator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::relay::OutboundQueue;
use super::transport::{FrameSink, FrameSource, TelephonyTransport, TransportMessage};
use crate::call::signal::{CallSignal, SignalSender};
use crate::core::audio::resample_pcm16;
use crate::core::realtime::{ClientEvent, SpeechTransport};
use crate::core::telephony::InboundFrame;

/// Static parameters of a bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub call_id: String,
    /// Sample rate of the telephony media stream
    pub telephony_rate: u32,
    /// Sample rate the speech endpoint expects for input audio
    pub speech_rate: u32,
}

/// Frame counters, shared with the bridge tasks.
#[derive(Debug, Default)]
pub struct BridgeStats {
    pub frames_in: AtomicU64,
    pub frames_forwarded: AtomicU64,
    pub frames_out: AtomicU64,
}

/// Handle to a running bridge.
pub struct AudioBridge {
    call_id: String,
    closed: Arc<AtomicBool>,
    sink: Arc<Mutex<Box<dyn FrameSink>>>,
    sink_closed: Arc<AtomicBool>,
    stats: Arc<BridgeStats>,
    inbound: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for AudioBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioBridge")
            .field("call_id", &self.call_id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl AudioBridge {
    /// Start relaying in both directions.
    pub fn start(
        config: BridgeConfig,
        transport: TelephonyTransport,
        speech: Arc<dyn SpeechTransport>,
        outbound: OutboundQueue,
        signals: SignalSender,
    ) -> Self {
        let TelephonyTransport { source, sink } = transport;
        let closed = Arc::new(AtomicBool::new(false));
        let sink = Arc::new(Mutex::new(sink));
        let stats = Arc::new(BridgeStats::default());

        let inbound = tokio::spawn(run_inbound(
            config.clone(),
            source,
            speech,
            closed.clone(),
            stats.clone(),
            signals.clone(),
        ));
        let writer = tokio::spawn(run_writer(
            config.call_id.clone(),
            outbound,
            sink.clone(),
            closed.clone(),
            stats.clone(),
            signals,
        ));

        info!(
            call_id = %config.call_id,
            telephony_rate = config.telephony_rate,
            speech_rate = config.speech_rate,
            "Audio bridge started"
        );

        Self {
            call_id: config.call_id,
            closed,
            sink,
            sink_closed: Arc::new(AtomicBool::new(false)),
            stats,
            inbound: Some(inbound),
            writer: Some(writer),
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Whether the bridge is still relaying.
    pub fn is_active(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    /// Stop both directions and close the telephony transport.
    ///
    /// Safe to call more than once; the transport is closed exactly once.
    pub async fn shutdown(&mut self) {
        self.closed.store(true, Ordering::SeqCst);

        if let Some(handle) = self.inbound.take() {
            handle.abort();
        }
        if let Some(handle) = self.writer.take() {
            handle.abort();
        }

        if !self.sink_closed.swap(true, Ordering::SeqCst) {
            let mut sink = self.sink.lock().await;
            if let Err(e) = sink.close().await {
                warn!(call_id = %self.call_id, "Failed to close telephony transport: {}", e);
            }
            info!(
                call_id = %self.call_id,
                frames_in = self.stats.frames_in.load(Ordering::Relaxed),
                frames_out = self.stats.frames_out.load(Ordering::Relaxed),
                "Audio bridge stopped"
            );
        }
    }
}

impl Drop for AudioBridge {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(handle) = self.inbound.take() {
            handle.abort();
        }
        if let Some(handle) = self.writer.take() {
            handle.abort();
        }
    }
}

async fn run_inbound(
    config: BridgeConfig,
    mut source: Box<dyn FrameSource>,
    speech: Arc<dyn SpeechTransport>,
    closed: Arc<AtomicBool>,
    stats: Arc<BridgeStats>,
    signals: SignalSender,
) {
    let call_id = config.call_id.as_str();
    let mut speech_unavailable = false;

    loop {
        let message = match source.next_message().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                warn!(call_id = %call_id, "Telephony transport error: {}", e);
                break;
            }
            None => break,
        };
        if closed.load(Ordering::SeqCst) {
            return;
        }

        let pcm = match message {
            TransportMessage::Text(text) => match InboundFrame::parse(&text) {
                Ok(InboundFrame::Audio(frame)) => {
                    stats.frames_in.fetch_add(1, Ordering::Relaxed);
                    if frame.silent {
                        continue;
                    }
                    frame.pcm
                }
                Ok(InboundFrame::Metadata(meta)) => {
                    debug!(call_id = %call_id, sample_rate = ?meta.sample_rate, "Media metadata");
                    continue;
                }
                Ok(InboundFrame::StopAudio) => {
                    debug!(call_id = %call_id, "Ignoring inbound StopAudio frame");
                    continue;
                }
                Ok(InboundFrame::Unknown(kind)) => {
                    debug!(call_id = %call_id, kind = %kind, "Ignoring frame");
                    continue;
                }
                Err(e) => {
                    warn!(call_id = %call_id, "Skipping unparseable frame: {}", e);
                    continue;
                }
            },
            TransportMessage::Binary(pcm) => {
                stats.frames_in.fetch_add(1, Ordering::Relaxed);
                pcm
            }
        };

        if pcm.is_empty() {
            continue;
        }
        let pcm = resample_pcm16(&pcm, config.telephony_rate, config.speech_rate);

        match speech.send(ClientEvent::audio_append(&pcm)).await {
            Ok(()) => {
                stats.frames_forwarded.fetch_add(1, Ordering::Relaxed);
                speech_unavailable = false;
            }
            Err(e) => {
                if !speech_unavailable {
                    warn!(call_id = %call_id, "Dropping caller audio: {}", e);
                    speech_unavailable = true;
                }
            }
        }
    }

    if !closed.load(Ordering::SeqCst) {
        info!(call_id = %call_id, "Telephony transport closed");
        let _ = signals.send(CallSignal::TransportClosed {
            call_id: call_id.to_string(),
        });
    }
}

async fn run_writer(
    call_id: String,
    mut outbound: OutboundQueue,
    sink: Arc<Mutex<Box<dyn FrameSink>>>,
    closed: Arc<AtomicBool>,
    stats: Arc<BridgeStats>,
    signals: SignalSender,
) {
    while let Some(frame) = outbound.next().await {
        let mut sink = sink.lock().await;
        // Checked under the sink lock so a concurrent shutdown is never raced.
        if closed.load(Ordering::SeqCst) {
            return;
        }
        let is_stop = frame.is_stop();
        if let Err(e) = sink.send_text(frame.to_json()).await {
            closed.store(true, Ordering::SeqCst);
            warn!(call_id = %call_id, "Telephony write failed: {}", e);
            let _ = signals.send(CallSignal::BridgeFailed {
                call_id: call_id.clone(),
                reason: e.to_string(),
            });
            return;
        }
        if is_stop {
            debug!(call_id = %call_id, "Sent StopAudio");
        }
        stats.frames_out.fetch_add(1, Ordering::Relaxed);
    }
    debug!(call_id = %call_id, "Outbound relay ended");
}
