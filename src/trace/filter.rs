// src/trace/filter.rs

use std::fmt;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::TraceSection;
use crate::errors::{PyscopeError, Result};

use super::{CallSite, Continuation};

/// Which calls are reported.
///
/// Frames of the tracing bootstrap are reported exactly when internals are
/// requested. Any other call is skipped when one of these holds:
/// - its name is synthetic (`<module>`, `<listcomp>`, `<lambda>`, ...),
/// - its name is private by convention (leading `_`, which includes dunder
///   methods) and private names are not requested,
/// - its file matches one of the `exclude` globs.
///
/// Library code (stdlib, site-packages) never reaches this filter: the
/// bootstrap drops it before anything crosses the process boundary.
#[derive(Clone)]
pub struct TraceFilter {
    include_private: bool,
    trace_internals: bool,
    exclude: GlobSet,
    exclude_patterns: Vec<String>,
}

impl fmt::Debug for TraceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceFilter")
            .field("include_private", &self.include_private)
            .field("trace_internals", &self.trace_internals)
            .field("exclude", &self.exclude_patterns)
            .finish()
    }
}

impl Default for TraceFilter {
    fn default() -> Self {
        Self {
            include_private: false,
            trace_internals: false,
            exclude: GlobSet::empty(),
            exclude_patterns: Vec::new(),
        }
    }
}

impl TraceFilter {
    pub fn from_config(section: &TraceSection) -> Result<Self> {
        Ok(Self {
            include_private: section.include_private,
            trace_internals: section.trace_internals,
            exclude: build_exclude_set(&section.exclude)?,
            exclude_patterns: section.exclude.clone(),
        })
    }

    pub fn include_private(mut self, yes: bool) -> Self {
        self.include_private = yes;
        self
    }

    pub fn trace_internals(mut self, yes: bool) -> Self {
        self.trace_internals = yes;
        self
    }

    pub fn decide(&self, site: &CallSite<'_>) -> Continuation {
        if site.internal {
            // The bootstrap's functions are nearly all `_private`; when they
            // are asked for, report every one of them.
            return if self.trace_internals {
                Continuation::Observe
            } else {
                Continuation::Skip
            };
        }
        if is_synthetic(site.name) {
            return Continuation::Skip;
        }
        if site.name.starts_with('_') && !self.include_private {
            return Continuation::Skip;
        }
        if !self.exclude_patterns.is_empty() && self.exclude.is_match(site.file) {
            return Continuation::Skip;
        }
        Continuation::Observe
    }
}

fn is_synthetic(name: &str) -> bool {
    name.starts_with('<') && name.ends_with('>')
}

/// Compile `exclude` patterns into a single matcher.
pub fn build_exclude_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            PyscopeError::ConfigError(format!("invalid [trace].exclude pattern '{pattern}': {e}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| PyscopeError::ConfigError(format!("building [trace].exclude set: {e}")))
}
