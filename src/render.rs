// src/render.rs

//! Minimal presentation of the event stream for the terminal.

use std::collections::HashMap;

use crate::collector::{CallId, Event, ExceptionEvent, OutputStream};
use crate::errors::Result;

/// Trace lines shown when reporting a failed run.
pub const MAX_ERROR_TRACE_LINES: usize = 10;

const INDENT: &str = "  ";

/// Renders events as indented text, tracking call depth from parent links.
#[derive(Debug, Default)]
pub struct TextRenderer {
    depths: HashMap<CallId, usize>,
}

impl TextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget call depths, e.g. after the collector was cleared.
    pub fn reset(&mut self) {
        self.depths.clear();
    }

    /// Render one event. The result has no trailing newline but may span
    /// several lines.
    pub fn render(&mut self, event: &Event) -> String {
        match event {
            Event::Output(line) => match line.stream {
                OutputStream::Stdout => line.content.clone(),
                OutputStream::Stderr => format!("[stderr] {}", line.content),
                OutputStream::System => format!("[pyscope] {}", line.content),
            },
            Event::Call(call) => {
                let depth = call
                    .parent_id
                    .and_then(|p| self.depths.get(&p))
                    .map_or(0, |d| d + 1);
                self.depths.insert(call.call_id, depth);

                let args = call
                    .arguments
                    .iter()
                    .map(|a| format!("{}={}", a.name, a.value))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "{}→ {}({}) [{}] #{}",
                    INDENT.repeat(depth),
                    call.function_name,
                    args,
                    call.location,
                    call.call_id
                )
            }
            Event::Return(ret) => match ret.call_id {
                Some(id) => {
                    let depth = self.depths.remove(&id).unwrap_or(0);
                    format!(
                        "{}← {} = {}",
                        INDENT.repeat(depth),
                        ret.function_name,
                        ret.return_value
                    )
                }
                None => format!("← {} = {} (orphan)", ret.function_name, ret.return_value),
            },
            Event::Exception(exc) => {
                let depth = exc
                    .related_call_id
                    .and_then(|id| self.depths.get(&id))
                    .map_or(0, |d| d + 1);
                let pad = INDENT.repeat(depth);
                let mut out = format!("{pad}!! {}: {}", exc.exception_type, exc.message);
                for line in &exc.trace_lines {
                    out.push('\n');
                    out.push_str(&pad);
                    out.push_str("   ");
                    out.push_str(line);
                }
                out
            }
        }
    }
}

/// One JSON object per event.
pub fn render_json(event: &Event) -> Result<String> {
    Ok(serde_json::to_string(event)?)
}

/// Concise report of a failed run: the error and at most `max_lines` trace
/// lines.
pub fn render_failure(exc: &ExceptionEvent, max_lines: usize) -> String {
    let mut out = format!("pyscope: {}: {}", exc.exception_type, exc.message);
    for line in exc.trace_lines.iter().take(max_lines) {
        out.push_str("\n  ");
        out.push_str(line);
    }
    let hidden = exc.trace_lines.len().saturating_sub(max_lines);
    if hidden > 0 {
        out.push_str(&format!("\n  ... {hidden} more"));
    }
    out
}
