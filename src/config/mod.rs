// src/config/mod.rs

//! Configuration loading and validation for pyscope.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and apply environment overrides
//!   (`loader.rs`).
//! - Validate limits and glob patterns (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, resolve};
pub use model::{Config, ExecSection, FormatSection, RawConfig, TraceSection};
pub use validate::validate_config;
