use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use pyscope::collector::OutputStream;
use pyscope::format::RawValue;
use pyscope::trace::{CallSite, Continuation, Instrumentation};

/// One callback as seen by a [`RecordingProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Call {
        name: String,
        file: String,
        line: u32,
        internal: bool,
        args: Vec<(String, RawValue)>,
    },
    Return {
        name: String,
        value: RawValue,
    },
    Exception {
        exception_type: String,
        message: String,
        trace: Vec<String>,
    },
    Output {
        stream: OutputStream,
        content: String,
    },
    Malformed(String),
    Dropped(u64),
}

/// A fake instrumentation provider that:
/// - records every callback in order
/// - skips calls to the function names it was told to skip.
#[derive(Debug, Clone, Default)]
pub struct RecordingProvider {
    seen: Arc<Mutex<Vec<Recorded>>>,
    skip: HashSet<String>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skipping(names: &[&str]) -> Self {
        Self {
            seen: Arc::default(),
            skip: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.seen.lock().unwrap().clone()
    }

    fn push(&self, item: Recorded) {
        self.seen.lock().unwrap().push(item);
    }
}

impl Instrumentation for RecordingProvider {
    fn on_call(&self, site: &CallSite<'_>, args: &[(String, RawValue)]) -> Continuation {
        if self.skip.contains(site.name) {
            return Continuation::Skip;
        }
        self.push(Recorded::Call {
            name: site.name.to_string(),
            file: site.file.to_string(),
            line: site.line,
            internal: site.internal,
            args: args.to_vec(),
        });
        Continuation::Observe
    }

    fn on_return(&self, name: &str, value: &RawValue) {
        self.push(Recorded::Return {
            name: name.to_string(),
            value: value.clone(),
        });
    }

    fn on_exception(&self, exception_type: &str, message: &str, trace: &[String]) {
        self.push(Recorded::Exception {
            exception_type: exception_type.to_string(),
            message: message.to_string(),
            trace: trace.to_vec(),
        });
    }

    fn on_output(&self, stream: OutputStream, content: &str) {
        self.push(Recorded::Output {
            stream,
            content: content.to_string(),
        });
    }

    fn on_malformed(&self, line: &str) {
        self.push(Recorded::Malformed(line.trim_end().to_string()));
    }

    fn on_dropped(&self, count: u64) {
        self.push(Recorded::Dropped(count));
    }
}
