// src/trace/bootstrap.rs

//! The Python side of the instrumentation.
//!
//! The bootstrap source is embedded in the binary and handed to the
//! interpreter on its command line, so nothing is written to disk and the
//! user's environment is left untouched.

use std::ffi::OsString;
use std::path::Path;

/// Bootstrap source, run by [`LOADER`].
pub const SOURCE: &str = include_str!("bootstrap.py");

/// Filename the bootstrap's code objects carry; frames from it are internal.
pub const BOOTSTRAP_FILENAME: &str = "<pyscope-bootstrap>";

/// `-c` program: takes the bootstrap source off `sys.argv` and runs it.
pub const LOADER: &str =
    "import sys;_s=sys.argv.pop(1);exec(compile(_s,'<pyscope-bootstrap>','exec'))";

pub const ADDR_ENV: &str = "PYSCOPE_TRACE_ADDR";
pub const TOKEN_ENV: &str = "PYSCOPE_TRACE_TOKEN";
pub const INTERNALS_ENV: &str = "PYSCOPE_TRACE_INTERNALS";
pub const QUEUE_CAPACITY_ENV: &str = "PYSCOPE_QUEUE_CAPACITY";
pub const REPR_LIMIT_ENV: &str = "PYSCOPE_REPR_LIMIT";

/// Interpreter arguments that run `script` under the bootstrap.
pub fn command_args(script: &Path, script_args: &[String]) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-c".into(),
        LOADER.into(),
        SOURCE.into(),
        script.as_os_str().to_owned(),
    ];
    args.extend(script_args.iter().map(OsString::from));
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_compiles_with_the_internal_filename() {
        assert!(LOADER.contains(BOOTSTRAP_FILENAME));
        assert!(SOURCE.contains(BOOTSTRAP_FILENAME));
    }

    #[test]
    fn script_and_args_follow_the_bootstrap() {
        let args = command_args(Path::new("/tmp/x.py"), &["a".into(), "--b".into()]);
        assert_eq!(args[0], "-c");
        assert_eq!(args[3], "/tmp/x.py");
        assert_eq!(&args[4..], &[OsString::from("a"), OsString::from("--b")]);
    }
}
