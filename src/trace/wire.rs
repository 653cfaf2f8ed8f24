// src/trace/wire.rs

//! JSON-lines protocol spoken by the bootstrap.
//!
//! One message per line, tagged by `event`:
//!
//! ```text
//! {"event":"hello","pid":4242,"python":"3.12.1","token":"..."}
//! {"event":"call","thread":1,"frame":140,"name":"f","file":"/x/a.py","line":10,"args":[["n",{"repr":"3"}]],"internal":false}
//! {"event":"return","thread":1,"frame":140,"name":"f","value":{"repr":"6"}}
//! {"event":"exception","thread":1,"frame":140,"type":"ValueError","message":"bad","trace":["..."]}
//! {"event":"output","stream":"stdout","content":"step 1 done"}
//! {"event":"dropped","count":12}
//! ```

use serde::{Deserialize, Serialize};

use crate::collector::OutputStream;
use crate::errors::Result;
use crate::format::RawValue;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WireMessage {
    Hello {
        pid: u32,
        python: String,
        #[serde(default)]
        token: String,
    },
    Call {
        thread: u64,
        frame: u64,
        name: String,
        file: String,
        line: u32,
        #[serde(default)]
        args: Vec<(String, RawValue)>,
        #[serde(default)]
        internal: bool,
    },
    Return {
        thread: u64,
        frame: u64,
        name: String,
        value: RawValue,
    },
    Exception {
        thread: u64,
        #[serde(default)]
        frame: Option<u64>,
        #[serde(rename = "type")]
        exception_type: String,
        message: String,
        #[serde(default)]
        trace: Vec<String>,
    },
    /// A complete line the script wrote through `sys.stdout`/`sys.stderr`.
    /// Sent on the trace channel so it stays ordered with calls.
    Output {
        stream: WireStream,
        content: String,
    },
    Dropped {
        count: u64,
    },
}

/// Streams the traced process may report output on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireStream {
    Stdout,
    Stderr,
}

impl From<WireStream> for OutputStream {
    fn from(stream: WireStream) -> Self {
        match stream {
            WireStream::Stdout => OutputStream::Stdout,
            WireStream::Stderr => OutputStream::Stderr,
        }
    }
}

pub fn decode_line(line: &str) -> Result<WireMessage> {
    Ok(serde_json::from_str(line.trim())?)
}

pub fn encode(message: &WireMessage) -> Result<String> {
    Ok(serde_json::to_string(message)?)
}
