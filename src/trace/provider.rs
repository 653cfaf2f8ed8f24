// src/trace/provider.rs

//! Production [`Instrumentation`]: filter, format, record.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::collector::{Argument, Collector, ExceptionReport, OutputStream};
use crate::format::{RawValue, ValueFormatter};

use super::{CallSite, Continuation, Instrumentation, TraceFilter};

/// Adapter between the instrumentation mechanism and the collector.
///
/// Every callback runs under `catch_unwind`: a panic while formatting or
/// recording drops that one notification and never reaches the caller.
#[derive(Debug, Clone)]
pub struct CollectorProvider {
    collector: Arc<Collector>,
    filter: TraceFilter,
    formatter: ValueFormatter,
}

impl CollectorProvider {
    pub fn new(collector: Arc<Collector>, filter: TraceFilter, formatter: ValueFormatter) -> Self {
        Self {
            collector,
            filter,
            formatter,
        }
    }

}

impl Instrumentation for CollectorProvider {
    fn on_call(&self, site: &CallSite<'_>, args: &[(String, RawValue)]) -> Continuation {
        if self.filter.decide(site) == Continuation::Skip {
            return Continuation::Skip;
        }

        let recorded = panic::catch_unwind(AssertUnwindSafe(|| {
            let arguments = args
                .iter()
                .map(|(name, value)| Argument::new(name, self.formatter.format_argument(value)))
                .collect();
            self.collector
                .add_call(site.name, site.file, site.line, arguments)
        }));

        match recorded {
            Ok(_) => Continuation::Observe,
            Err(_) => {
                // Nothing was pushed, so the matching return must not pop.
                warn!(function = site.name, "recording call panicked; skipping frame");
                Continuation::Skip
            }
        }
    }

    fn on_return(&self, name: &str, value: &RawValue) {
        let recorded = panic::catch_unwind(AssertUnwindSafe(|| {
            let text = self.formatter.format_compact(value);
            self.collector.add_return_checked(name, text)
        }));
        if recorded.is_err() {
            warn!(function = name, "recording return panicked; dropped");
        }
    }

    fn on_exception(&self, exception_type: &str, message: &str, trace: &[String]) {
        let recorded = panic::catch_unwind(AssertUnwindSafe(|| {
            self.collector.add_exception(ExceptionReport::new(
                exception_type,
                message,
                trace.to_vec(),
            ));
        }));
        if recorded.is_err() {
            warn!(exception_type, "recording exception panicked; dropped");
        }
    }

    fn on_output(&self, stream: OutputStream, content: &str) {
        self.collector.add_output(content, stream);
    }

    fn on_malformed(&self, line: &str) {
        debug!(len = line.len(), "malformed trace message");
        self.collector.record_malformed();
    }

    fn on_dropped(&self, count: u64) {
        if count > 0 {
            warn!(count, "instrumented process dropped trace events (queue full)");
            self.collector.record_dropped(count);
        }
    }
}
