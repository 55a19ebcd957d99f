// Delivery side of a pipeline run
//
// The pipeline only ever sees an `EventSink`; what happens to the events
// (collected in a test, pushed over SSE) is decided by whoever owns the sink.

use axum::response::sse::Event;
use tokio::sync::mpsc::UnboundedSender;

use crate::models::StreamEvent;

/// Receives the events of one run, in emission order.
pub trait EventSink: Send {
    fn emit(&mut self, event: StreamEvent);
}

impl EventSink for Vec<StreamEvent> {
    fn emit(&mut self, event: StreamEvent) {
        self.push(event);
    }
}

/// Sink feeding the SSE response of one request.
///
/// Once the receiving side is gone (client disconnected) every further
/// write is dropped without touching the channel again.
pub struct ChannelSink {
    tx: UnboundedSender<StreamEvent>,
    closed: bool,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<StreamEvent>) -> Self {
        Self { tx, closed: false }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl EventSink for ChannelSink {
    fn emit(&mut self, event: StreamEvent) {
        if self.closed {
            return;
        }
        if self.tx.send(event).is_err() {
            tracing::info!("Stream receiver dropped, discarding further events");
            self.closed = true;
        }
    }
}

/// SSE framing: `event: <name>` plus the flat JSON payload as `data:`.
pub fn to_sse_event(event: &StreamEvent) -> Event {
    let data = serde_json::to_string(&event.payload()).unwrap_or_default();
    Event::default().event(event.name()).data(data)
}
