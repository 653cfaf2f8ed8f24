// src/collector/events.rs

//! Event types stored and delivered by the collector.

use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::Serialize;

/// Identifier of a call within one session. Starts at 1.
pub type CallId = u64;

/// Which stream a line of output came from.
///
/// `System` carries lifecycle notices produced by the executor itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
    System,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
            OutputStream::System => "system",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputStream {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stdout" => Ok(OutputStream::Stdout),
            "stderr" => Ok(OutputStream::Stderr),
            "system" => Ok(OutputStream::System),
            other => Err(format!(
                "invalid output stream: {other} (expected \"stdout\", \"stderr\" or \"system\")"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One formatted call argument, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Argument {
    pub name: String,
    pub value: String,
}

impl Argument {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputLine {
    pub seq: u64,
    pub content: String,
    pub stream: OutputStream,
    pub timestamp: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallEvent {
    pub seq: u64,
    pub call_id: CallId,
    pub function_name: String,
    pub location: Location,
    pub arguments: Vec<Argument>,
    pub parent_id: Option<CallId>,
    pub timestamp: SystemTime,
}

impl CallEvent {
    pub fn argument(&self, name: &str) -> Option<&str> {
        self.arguments
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

/// A return. `call_id` is `None` for orphan returns (no matching open call).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnEvent {
    pub seq: u64,
    pub call_id: Option<CallId>,
    pub function_name: String,
    pub return_value: String,
    pub timestamp: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExceptionEvent {
    pub seq: u64,
    pub exception_type: String,
    pub message: String,
    pub trace_lines: Vec<String>,
    pub related_call_id: Option<CallId>,
    pub timestamp: SystemTime,
}

/// Exception details handed to the collector, before it is stamped with a
/// sequence number and linked to the open call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionReport {
    pub exception_type: String,
    pub message: String,
    pub trace_lines: Vec<String>,
}

impl ExceptionReport {
    pub fn new(
        exception_type: impl Into<String>,
        message: impl Into<String>,
        trace_lines: Vec<String>,
    ) -> Self {
        Self {
            exception_type: exception_type.into(),
            message: message.into(),
            trace_lines,
        }
    }
}

/// Render the `source()` chain of an error, one line per cause.
pub fn source_chain(err: &(dyn StdError + 'static)) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = err.source();
    while let Some(cause) = current {
        lines.push(format!("caused by: {cause}"));
        current = cause.source();
    }
    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Output,
    Call,
    Return,
    Exception,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Output => "output",
            EventKind::Call => "call",
            EventKind::Return => "return",
            EventKind::Exception => "exception",
        };
        f.write_str(name)
    }
}

/// Any event, as delivered on the live stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Event {
    Output(OutputLine),
    Call(CallEvent),
    Return(ReturnEvent),
    Exception(ExceptionEvent),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Output(_) => EventKind::Output,
            Event::Call(_) => EventKind::Call,
            Event::Return(_) => EventKind::Return,
            Event::Exception(_) => EventKind::Exception,
        }
    }

    /// Global arrival position within the session.
    pub fn seq(&self) -> u64 {
        match self {
            Event::Output(e) => e.seq,
            Event::Call(e) => e.seq,
            Event::Return(e) => e.seq,
            Event::Exception(e) => e.seq,
        }
    }

    pub fn timestamp(&self) -> SystemTime {
        match self {
            Event::Output(e) => e.timestamp,
            Event::Call(e) => e.timestamp,
            Event::Return(e) => e.timestamp,
            Event::Exception(e) => e.timestamp,
        }
    }
}
