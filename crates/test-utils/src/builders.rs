#![allow(dead_code)]

use pyscope::config::{Config, RawConfig};

/// Builder for `Config` to simplify test setup.
pub struct ConfigBuilder {
    config: RawConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfig::default(),
        }
    }

    pub fn interpreter(mut self, interpreter: &str) -> Self {
        self.config.exec.interpreter = interpreter.to_string();
        self
    }

    pub fn stop_grace_ms(mut self, ms: u64) -> Self {
        self.config.exec.stop_grace_ms = ms;
        self
    }

    pub fn drain_timeout_ms(mut self, ms: u64) -> Self {
        self.config.exec.drain_timeout_ms = ms;
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.config
            .exec
            .env
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn include_private(mut self, val: bool) -> Self {
        self.config.trace.include_private = val;
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.config.trace.exclude.push(pattern.to_string());
        self
    }

    pub fn trace_internals(mut self, val: bool) -> Self {
        self.config.trace.trace_internals = val;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.trace.queue_capacity = capacity;
        self
    }

    pub fn compact_limit(mut self, limit: usize) -> Self {
        self.config.format.compact_limit = limit;
        self
    }

    pub fn argument_limit(mut self, limit: usize) -> Self {
        self.config.format.argument_limit = limit;
        self
    }

    pub fn raw(self) -> RawConfig {
        self.config
    }

    pub fn build(self) -> Config {
        Config::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
