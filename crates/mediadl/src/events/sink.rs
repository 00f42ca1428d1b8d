//! Event sinks.
//!
//! `emit` never blocks and never reports delivery failure to the caller.
//! A single pipeline emits from one task, so any sink that forwards in call
//! order preserves per-job FIFO order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::EventEnvelope;

/// Fire-and-forget destination for lifecycle events.
pub trait EventSink: Send + Sync {
    fn emit(&self, envelope: EventEnvelope);
}

/// Forwards events into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<EventEnvelope>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<EventEnvelope>) -> Self {
        Self { tx }
    }

    /// Create a sink and the receiver that drains it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EventEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, envelope: EventEnvelope) {
        if let Err(e) = self.tx.send(envelope) {
            debug!(
                "Dropping {} event for job {}: receiver closed",
                e.0.event.event_type(),
                e.0.job_id
            );
        }
    }
}

/// Writes every event to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, envelope: EventEnvelope) {
        info!(
            "[{}] {} {}",
            envelope.job_id,
            envelope.event.bus_name(),
            envelope.event.payload()
        );
    }
}

/// Forwards each event to several sinks, in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, envelope: EventEnvelope) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(envelope.clone());
            }
            last.emit(envelope);
        }
    }
}
