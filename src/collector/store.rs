// src/collector/store.rs

//! The collector: append-only event logs, the active call stack and the live
//! delivery queue, all behind one lock.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use tokio::sync::Notify;
use tracing::{debug, trace};

use super::events::{
    Argument, CallEvent, CallId, Event, EventKind, ExceptionEvent, ExceptionReport, Location,
    OutputLine, OutputStream, ReturnEvent,
};

/// Counters for conditions that are recorded rather than raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Returns that arrived with an empty call stack.
    pub orphan_returns: u64,
    /// Returns whose function did not match the call on top of the stack.
    pub mismatched_returns: u64,
    /// Trace messages that could not be decoded.
    pub malformed_messages: u64,
    /// Events the instrumented process discarded because its queue was full.
    pub dropped_in_child: u64,
}

/// Full ordered snapshot of the four logs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    pub output: Vec<OutputLine>,
    pub calls: Vec<CallEvent>,
    pub returns: Vec<ReturnEvent>,
    pub exceptions: Vec<ExceptionEvent>,
    order: Vec<(EventKind, usize)>,
}

impl History {
    /// All events across the four logs, in arrival order.
    pub fn timeline(&self) -> Vec<Event> {
        self.order
            .iter()
            .filter_map(|&(kind, idx)| match kind {
                EventKind::Output => self.output.get(idx).cloned().map(Event::Output),
                EventKind::Call => self.calls.get(idx).cloned().map(Event::Call),
                EventKind::Return => self.returns.get(idx).cloned().map(Event::Return),
                EventKind::Exception => self.exceptions.get(idx).cloned().map(Event::Exception),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Debug)]
struct CollectorState {
    history: History,
    stack: Vec<CallId>,
    next_call_id: CallId,
    next_seq: u64,
    live: VecDeque<Event>,
    diagnostics: Diagnostics,
}

impl CollectorState {
    fn new() -> Self {
        Self {
            history: History::default(),
            stack: Vec::new(),
            next_call_id: 1,
            next_seq: 1,
            live: VecDeque::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn function_of(&self, call_id: CallId) -> Option<&str> {
        // Open calls are recent; search from the back.
        self.history
            .calls
            .iter()
            .rev()
            .find(|c| c.call_id == call_id)
            .map(|c| c.function_name.as_str())
    }

    fn record(&mut self, event: Event) {
        let kind = event.kind();
        let idx = match &event {
            Event::Output(e) => {
                self.history.output.push(e.clone());
                self.history.output.len() - 1
            }
            Event::Call(e) => {
                self.history.calls.push(e.clone());
                self.history.calls.len() - 1
            }
            Event::Return(e) => {
                self.history.returns.push(e.clone());
                self.history.returns.len() - 1
            }
            Event::Exception(e) => {
                self.history.exceptions.push(e.clone());
                self.history.exceptions.len() - 1
            }
        };
        self.history.order.push((kind, idx));
        self.live.push_back(event);
    }
}

/// Thread-safe event store shared by the executor, output readers and the
/// instrumentation adapter.
///
/// Each `add_*` call completes (stack mutation, log append and enqueue)
/// before any other can interleave, so live order equals call-site order.
#[derive(Debug)]
pub struct Collector {
    state: Mutex<CollectorState>,
    notify: Notify,
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CollectorState::new()),
            notify: Notify::new(),
        }
    }

    // Every operation leaves the state consistent before it can panic, so a
    // poisoned lock still guards valid data.
    fn lock(&self) -> MutexGuard<'_, CollectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self) {
        self.notify.notify_waiters();
    }

    pub fn add_output(&self, content: impl Into<String>, stream: OutputStream) {
        {
            let mut state = self.lock();
            let seq = state.take_seq();
            state.record(Event::Output(OutputLine {
                seq,
                content: content.into(),
                stream,
                timestamp: SystemTime::now(),
            }));
        }
        self.publish();
    }

    /// Open a call: allocate the next id, link it to the current stack top
    /// and push it.
    pub fn add_call(
        &self,
        function_name: impl Into<String>,
        file: impl Into<String>,
        line: u32,
        arguments: Vec<Argument>,
    ) -> CallId {
        let call_id = {
            let mut state = self.lock();
            let call_id = state.next_call_id;
            state.next_call_id += 1;
            let parent_id = state.stack.last().copied();
            state.stack.push(call_id);
            let seq = state.take_seq();
            state.record(Event::Call(CallEvent {
                seq,
                call_id,
                function_name: function_name.into(),
                location: Location {
                    file: file.into(),
                    line,
                },
                arguments,
                parent_id,
                timestamp: SystemTime::now(),
            }));
            trace!(call_id, ?parent_id, "call recorded");
            call_id
        };
        self.publish();
        call_id
    }

    /// Close the call on top of the stack.
    ///
    /// With an empty stack the return is recorded as an orphan
    /// (`call_id = None`).
    pub fn add_return(
        &self,
        function_name: impl Into<String>,
        return_value: impl Into<String>,
    ) -> Option<CallId> {
        self.add_return_inner(function_name.into(), return_value.into(), false)
    }

    /// Like [`Collector::add_return`], but also checks that the popped call
    /// belongs to `function_name`. A mismatch still pops the top (the stack
    /// stays strictly nested) but the return is recorded as an orphan and
    /// counted in [`Diagnostics::mismatched_returns`].
    pub fn add_return_checked(
        &self,
        function_name: impl Into<String>,
        return_value: impl Into<String>,
    ) -> Option<CallId> {
        self.add_return_inner(function_name.into(), return_value.into(), true)
    }

    fn add_return_inner(
        &self,
        function_name: String,
        return_value: String,
        check_name: bool,
    ) -> Option<CallId> {
        let call_id = {
            let mut state = self.lock();
            let call_id = match state.stack.pop() {
                None => {
                    state.diagnostics.orphan_returns += 1;
                    debug!(function = %function_name, "return with empty call stack; recording orphan");
                    None
                }
                Some(top) if check_name && state.function_of(top) != Some(function_name.as_str()) => {
                    state.diagnostics.mismatched_returns += 1;
                    debug!(
                        function = %function_name,
                        popped = top,
                        "return does not match open call; recording orphan"
                    );
                    None
                }
                Some(top) => Some(top),
            };
            let seq = state.take_seq();
            state.record(Event::Return(ReturnEvent {
                seq,
                call_id,
                function_name,
                return_value,
                timestamp: SystemTime::now(),
            }));
            call_id
        };
        self.publish();
        call_id
    }

    /// Record an exception. The stack is not modified; the event is linked
    /// to the currently open call, if any.
    pub fn add_exception(&self, report: ExceptionReport) {
        {
            let mut state = self.lock();
            let related_call_id = state.stack.last().copied();
            let seq = state.take_seq();
            state.record(Event::Exception(ExceptionEvent {
                seq,
                exception_type: report.exception_type,
                message: report.message,
                trace_lines: report.trace_lines,
                related_call_id,
                timestamp: SystemTime::now(),
            }));
        }
        self.publish();
    }

    pub fn record_malformed(&self) {
        self.lock().diagnostics.malformed_messages += 1;
    }

    pub fn record_dropped(&self, count: u64) {
        self.lock().diagnostics.dropped_in_child += count;
    }

    /// Reset the session: empty logs, stack and live queue, ids restart at 1.
    pub fn clear(&self) {
        let mut state = self.lock();
        let undelivered = state.live.len();
        *state = CollectorState::new();
        debug!(undelivered, "collector cleared");
    }

    /// Pop the oldest undelivered event without waiting.
    pub fn try_next_event(&self) -> Option<Event> {
        self.lock().live.pop_front()
    }

    /// Wait for the oldest undelivered event.
    ///
    /// Each queued event is handed out exactly once. Cancel-safe: an event is
    /// only removed from the queue when this future completes.
    pub async fn next_event(&self) -> Event {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(event) = self.try_next_event() {
                return event;
            }
            notified.await;
        }
    }

    /// Number of events waiting on the live queue.
    pub fn pending(&self) -> usize {
        self.lock().live.len()
    }

    pub fn history(&self) -> History {
        self.lock().history.clone()
    }

    /// Ids of the currently open calls, outermost first.
    pub fn active_stack(&self) -> Vec<CallId> {
        self.lock().stack.clone()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.lock().diagnostics
    }
}
