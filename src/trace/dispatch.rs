// src/trace/dispatch.rs

use std::collections::HashSet;

use tracing::{debug, trace};

use super::wire::{self, WireMessage};
use super::{CallSite, Continuation, Instrumentation};

/// Feeds decoded trace messages into an [`Instrumentation`] implementation.
///
/// Owns the one piece of per-connection state the contract needs: which
/// frames the provider asked to skip, so their returns are swallowed too.
#[derive(Debug)]
pub struct TraceDispatcher<P> {
    provider: P,
    skipped: HashSet<(u64, u64)>,
}

impl<P: Instrumentation> TraceDispatcher<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            skipped: HashSet::new(),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Decode and dispatch one line. Blank lines are ignored.
    pub fn handle_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        match wire::decode_line(line) {
            Ok(message) => self.handle(message),
            Err(e) => {
                debug!(error = %e, "undecodable trace line");
                self.provider.on_malformed(line);
            }
        }
    }

    pub fn handle(&mut self, message: WireMessage) {
        match message {
            WireMessage::Hello { pid, python, .. } => {
                debug!(pid, %python, "trace hello after handshake; ignoring");
            }
            WireMessage::Call {
                thread,
                frame,
                name,
                file,
                line,
                args,
                internal,
            } => {
                let site = CallSite {
                    name: &name,
                    file: &file,
                    line,
                    internal,
                };
                let key = (thread, frame);
                match self.provider.on_call(&site, &args) {
                    Continuation::Skip => {
                        trace!(thread, frame, function = %name, "call skipped");
                        self.skipped.insert(key);
                    }
                    // A frame id is reused once its frame is gone; a mark left
                    // behind by a return the child dropped is stale.
                    Continuation::Observe => {
                        if self.skipped.remove(&key) {
                            debug!(thread, frame, "cleared stale skip mark");
                        }
                    }
                }
            }
            WireMessage::Return {
                thread,
                frame,
                name,
                value,
            } => {
                if self.skipped.remove(&(thread, frame)) {
                    return;
                }
                self.provider.on_return(&name, &value);
            }
            WireMessage::Exception {
                exception_type,
                message,
                trace,
                ..
            } => {
                self.provider.on_exception(&exception_type, &message, &trace);
            }
            WireMessage::Output { stream, content } => {
                self.provider.on_output(stream.into(), &content);
            }
            WireMessage::Dropped { count } => self.provider.on_dropped(count),
        }
    }

    /// Frames currently marked as skipped.
    pub fn skipped_frames(&self) -> usize {
        self.skipped.len()
    }
}
