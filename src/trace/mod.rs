// src/trace/mod.rs

//! Instrumentation of the traced script.
//!
//! The traced program is a separate Python process. Inside it, a small
//! bootstrap ([`bootstrap`]) hooks the interpreter's trace facility and
//! streams raw call/return/exception notifications as JSON lines ([`wire`])
//! over a loopback connection ([`listener`]). On our side, a
//! [`TraceDispatcher`](dispatch::TraceDispatcher) decodes each line and
//! drives the [`Instrumentation`] contract; [`CollectorProvider`] is the
//! production implementation, which applies the [`TraceFilter`] policy,
//! formats values and records events in the collector.
//!
//! The contract is deliberately narrow: callbacks are total (they never
//! panic or return errors) and carry no call-stack information. Nesting is
//! reconstructed by the collector.

pub mod bootstrap;
pub mod dispatch;
pub mod filter;
pub mod listener;
pub mod provider;
pub mod wire;

pub use dispatch::TraceDispatcher;
pub use filter::TraceFilter;
pub use listener::TraceListener;
pub use provider::CollectorProvider;
pub use wire::WireMessage;

use crate::collector::OutputStream;
use crate::format::RawValue;

/// Whether the provider wants to keep observing a call it was told about.
///
/// `Skip` means the call is not reported and neither is its return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Observe,
    Skip,
}

/// What is known about a call at the moment it happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite<'a> {
    pub name: &'a str,
    pub file: &'a str,
    pub line: u32,
    /// The frame belongs to the tracing bootstrap itself.
    pub internal: bool,
}

/// Callback contract between the instrumentation mechanism and whatever
/// consumes its notifications.
///
/// Implementations must be total: no panics escape, no errors are returned.
pub trait Instrumentation: Send + Sync {
    fn on_call(&self, site: &CallSite<'_>, args: &[(String, RawValue)]) -> Continuation;

    fn on_return(&self, name: &str, value: &RawValue);

    fn on_exception(&self, exception_type: &str, message: &str, trace: &[String]);

    /// One line of the script's own output, in call order.
    fn on_output(&self, stream: OutputStream, content: &str);

    /// A line from the instrumented process could not be decoded.
    fn on_malformed(&self, _line: &str) {}

    /// The instrumented process discarded `count` notifications.
    fn on_dropped(&self, _count: u64) {}
}
