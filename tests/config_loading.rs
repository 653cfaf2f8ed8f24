// tests/config_loading.rs

mod common;
use crate::common::builders::ConfigBuilder;

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use pyscope::config::loader::{INTERPRETER_ENV, TRACE_INTERNALS_ENV, apply_env_overrides};
use pyscope::config::{Config, RawConfig, load_and_validate, resolve, validate_config};
use pyscope::errors::PyscopeError;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn empty_file_yields_defaults() {
    let file = config_file("");
    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg, Config::default());
    assert_eq!(cfg.exec.interpreter, "python3");
    assert_eq!(cfg.exec.stop_grace(), Duration::from_millis(2000));
    assert_eq!(cfg.trace.queue_capacity, 10_000);
    assert_eq!(cfg.format.compact_limit, 100);
    assert_eq!(cfg.format.argument_limit, 1000);
}

#[test]
fn all_sections_are_read() {
    let file = config_file(
        r#"
[exec]
interpreter = "/opt/py/bin/python3.12"
stop_grace_ms = 250
drain_timeout_ms = 500
env = { APP_MODE = "debug" }

[trace]
include_private = true
exclude = ["**/vendor/**"]
queue_capacity = 64

[format]
compact_limit = 40
argument_limit = 200
"#,
    );
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.exec.interpreter, "/opt/py/bin/python3.12");
    assert_eq!(cfg.exec.stop_grace(), Duration::from_millis(250));
    assert_eq!(cfg.exec.drain_timeout(), Duration::from_millis(500));
    assert_eq!(cfg.exec.env.get("APP_MODE").map(String::as_str), Some("debug"));
    assert!(cfg.trace.include_private);
    assert!(!cfg.trace.trace_internals);
    assert_eq!(cfg.trace.exclude, ["**/vendor/**"]);
    assert_eq!(cfg.trace.queue_capacity, 64);
    assert_eq!(cfg.format.compact_limit, 40);
    assert_eq!(cfg.format.argument_limit, 200);
}

#[test]
fn syntax_errors_are_toml_errors() {
    let file = config_file("[exec\ninterpreter = ");
    match load_and_validate(file.path()) {
        Err(PyscopeError::TomlError(_)) => {}
        Err(e) => panic!("Expected TomlError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

fn expect_config_error(contents: &str, needle: &str) {
    let file = config_file(contents);
    match load_and_validate(file.path()) {
        Err(PyscopeError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "message {msg:?} should mention {needle:?}")
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn semantic_errors_are_config_errors() {
    expect_config_error("[exec]\ninterpreter = \"  \"", "interpreter");
    expect_config_error("[exec]\nenv = { \"A=B\" = \"x\" }", "env");
    expect_config_error("[trace]\nqueue_capacity = 0", "queue_capacity");
    expect_config_error("[trace]\nexclude = [\"a[\"]", "exclude");
    expect_config_error("[format]\ncompact_limit = 3", "compact_limit");
    expect_config_error(
        "[format]\ncompact_limit = 50\nargument_limit = 20",
        "argument_limit",
    );
}

#[test]
fn missing_explicit_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    match resolve(Some(missing.as_path())) {
        Err(PyscopeError::IoError(_)) => {}
        Err(e) => panic!("Expected IoError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn environment_overrides_apply_on_top_of_the_file() {
    let raw = apply_env_overrides(RawConfig::default(), |key| match key {
        k if k == TRACE_INTERNALS_ENV => Some("1".to_string()),
        k if k == INTERPRETER_ENV => Some("pypy3".to_string()),
        _ => None,
    });
    assert!(raw.trace.trace_internals);
    assert_eq!(raw.exec.interpreter, "pypy3");

    let untouched = apply_env_overrides(RawConfig::default(), |key| match key {
        k if k == TRACE_INTERNALS_ENV => Some("maybe".to_string()),
        k if k == INTERPRETER_ENV => Some("   ".to_string()),
        _ => None,
    });
    assert!(!untouched.trace.trace_internals);
    assert_eq!(untouched.exec.interpreter, "python3");
}

#[test]
fn builder_output_passes_validation() {
    let cfg = ConfigBuilder::new()
        .compact_limit(10)
        .argument_limit(10)
        .exclude("**/gen/*.py")
        .build();
    validate_config(&cfg).unwrap();

    let mut broken = cfg.clone();
    broken.format.argument_limit = 5;
    assert!(matches!(
        validate_config(&broken),
        Err(PyscopeError::ConfigError(_))
    ));
}
