#![allow(dead_code, unused_imports)]

pub use pyscope_test_utils::builders;
pub use pyscope_test_utils::recording;
pub use pyscope_test_utils::{
    init_tracing, python_interpreter, with_timeout, with_timeout_secs, write_script,
};
