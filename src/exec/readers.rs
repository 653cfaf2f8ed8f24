// src/exec/readers.rs

//! Output readers: one task per pipe, one `add_output` per line.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::collector::{Collector, OutputStream};

/// Spawn a task that forwards every line of `pipe` to the collector until
/// EOF.
///
/// Bytes that are not valid UTF-8 are replaced rather than dropped. A last
/// line without a trailing newline is still delivered.
pub fn spawn_reader<R>(pipe: R, stream: OutputStream, collector: Arc<Collector>) -> JoinHandle<u64>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        let mut lines = 0u64;

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    lines += 1;
                    collector.add_output(decode_line(&buf), stream);
                }
                Err(e) => {
                    warn!(%stream, error = %e, "reading child output failed");
                    break;
                }
            }
        }

        debug!(%stream, lines, "output reader reached EOF");
        lines
    })
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_endings_are_stripped() {
        assert_eq!(decode_line(b"hello\n"), "hello");
        assert_eq!(decode_line(b"hello\r\n"), "hello");
        assert_eq!(decode_line(b"tail"), "tail");
        assert_eq!(decode_line(b"\n"), "");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        assert_eq!(decode_line(b"a\xffb\n"), "a\u{fffd}b");
    }

    #[tokio::test]
    async fn every_line_reaches_the_collector_in_order() {
        let collector = Arc::new(Collector::new());
        let input: &[u8] = b"one\n\ntwo\r\nthree";
        let lines = spawn_reader(input, OutputStream::Stderr, Arc::clone(&collector))
            .await
            .unwrap();

        assert_eq!(lines, 4);
        let history = collector.history();
        let contents: Vec<_> = history.output.iter().map(|l| l.content.as_str()).collect();
        assert_eq!(contents, ["one", "", "two", "three"]);
        assert!(history.output.iter().all(|l| l.stream == OutputStream::Stderr));
    }
}
