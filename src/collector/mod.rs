// src/collector/mod.rs

//! Event collection and live delivery.
//!
//! - [`events`] defines the four event kinds (output, call, return,
//!   exception) and the [`Event`] envelope delivered to consumers.
//! - [`store`] holds the [`Collector`]: the ordered logs, the active call
//!   stack used to link nested calls, and the live queue.
//!
//! Writers (the executor's output readers and the instrumentation adapter)
//! share an `Arc<Collector>`. Presentation code only gets an
//! [`EventStream`], which can read but never write.

pub mod events;
pub mod store;

use std::sync::Arc;

pub use events::{
    Argument, CallEvent, CallId, Event, EventKind, ExceptionEvent, ExceptionReport, Location,
    OutputLine, OutputStream, ReturnEvent,
};
pub use store::{Collector, Diagnostics, History};

/// Read-only view of a collector for consumers.
#[derive(Debug, Clone)]
pub struct EventStream {
    collector: Arc<Collector>,
}

impl EventStream {
    pub fn new(collector: Arc<Collector>) -> Self {
        Self { collector }
    }

    /// Wait for the next undelivered event.
    pub async fn next_event(&self) -> Event {
        self.collector.next_event().await
    }

    pub fn try_next_event(&self) -> Option<Event> {
        self.collector.try_next_event()
    }

    pub fn pending(&self) -> usize {
        self.collector.pending()
    }

    /// Snapshot of everything recorded this session, for an initial render.
    pub fn history(&self) -> History {
        self.collector.history()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.collector.diagnostics()
    }
}
