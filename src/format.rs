// src/format.rs

//! Value formatting for display.
//!
//! Everything here is total: formatting never panics and never returns an
//! error. Values that cannot be rendered become a fixed placeholder string.
//! This matters because the instrumentation path runs inline with the traced
//! program, where a failure would abort the program being observed.

use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use crate::config::FormatSection;

/// Bound used for compact contexts (return values, summaries).
pub const COMPACT_LIMIT: usize = 100;

/// Bound used for call arguments.
pub const ARGUMENT_LIMIT: usize = 1000;

/// Appended when a representation is cut.
pub const TRUNCATION_MARKER: &str = "...";

/// Placeholder for a value whose representation raised inside the traced
/// runtime.
pub const UNREPRESENTABLE: &str = "<unrepresentable>";

/// Placeholder for a value whose representation failed on our side.
pub const REPRESENTATION_FAILED: &str = "<representation failed>";

/// A value as reported by the instrumented runtime: either its own textual
/// representation, or the reason producing one failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawValue {
    Repr(String),
    Error(String),
}

impl RawValue {
    pub fn repr(text: impl Into<String>) -> Self {
        RawValue::Repr(text.into())
    }
}

/// Cut `text` so that it is at most `limit` characters long, marking the cut.
///
/// Quoted representations (`'...'` / `"..."`) keep their closing quote so the
/// result still reads as a string literal.
pub fn truncate(text: &str, limit: usize) -> String {
    let len = text.chars().count();
    if len <= limit {
        return text.to_string();
    }

    let marker_len = TRUNCATION_MARKER.chars().count();
    if limit <= marker_len {
        return text.chars().take(limit).collect();
    }

    let quote = closing_quote(text);
    let keep = limit - marker_len - usize::from(quote.is_some() && limit > marker_len + 1);

    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARKER);
    if let Some(q) = quote {
        if out.chars().count() < limit {
            out.push(q);
        }
    }
    out
}

fn closing_quote(text: &str) -> Option<char> {
    let first = text.chars().next()?;
    let last = text.chars().last()?;
    if (first == '\'' || first == '"') && first == last && text.chars().count() > 1 {
        Some(first)
    } else {
        None
    }
}

/// Render a raw runtime value, bounded by `limit`.
pub fn format_raw(value: &RawValue, limit: usize) -> String {
    match value {
        RawValue::Repr(text) => truncate(text, limit),
        RawValue::Error(_) => UNREPRESENTABLE.to_string(),
    }
}

/// Render any `Debug` value, bounded by `limit`.
///
/// A `Debug` impl that panics (or returns `fmt::Error`, which makes
/// `format!` panic) yields [`REPRESENTATION_FAILED`].
pub fn format_debug<T: Debug + ?Sized>(value: &T, limit: usize) -> String {
    let rendered = panic::catch_unwind(AssertUnwindSafe(|| format!("{value:?}")));
    match rendered {
        Ok(text) => truncate(&text, limit),
        Err(_) => REPRESENTATION_FAILED.to_string(),
    }
}

/// Formatter carrying the configured bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueFormatter {
    compact_limit: usize,
    argument_limit: usize,
}

impl Default for ValueFormatter {
    fn default() -> Self {
        Self {
            compact_limit: COMPACT_LIMIT,
            argument_limit: ARGUMENT_LIMIT,
        }
    }
}

impl ValueFormatter {
    pub fn new(compact_limit: usize, argument_limit: usize) -> Self {
        Self {
            compact_limit,
            argument_limit,
        }
    }

    pub fn from_config(section: &FormatSection) -> Self {
        Self::new(section.compact_limit, section.argument_limit)
    }

    pub fn compact_limit(&self) -> usize {
        self.compact_limit
    }

    pub fn argument_limit(&self) -> usize {
        self.argument_limit
    }

    /// Format a call argument.
    pub fn format_argument(&self, value: &RawValue) -> String {
        format_raw(value, self.argument_limit)
    }

    /// Format a value for a compact context (return values).
    pub fn format_compact(&self, value: &RawValue) -> String {
        format_raw(value, self.compact_limit)
    }
}
