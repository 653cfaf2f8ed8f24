// src/trace/listener.rs

//! Loopback endpoint the bootstrap connects back to.
//!
//! The listener binds an ephemeral port on 127.0.0.1 before the script is
//! spawned. The child is told the address and a per-run token through its
//! environment; the first line on a connection must be a `hello` carrying
//! that token, otherwise the connection is dropped and accepting continues.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::Result;

use super::wire::{self, WireMessage};
use super::{Instrumentation, TraceDispatcher};

/// How long a fresh connection has to identify itself.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// What happened on the trace channel during one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerSummary {
    /// An authenticated connection was established.
    pub connected: bool,
    /// Lines received after the handshake.
    pub lines: u64,
}

#[derive(Debug)]
pub struct TraceListener {
    listener: TcpListener,
    addr: SocketAddr,
    token: String,
}

impl TraceListener {
    pub async fn bind(token: impl Into<String>) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;
        debug!(%addr, "trace listener bound");
        Ok(Self {
            listener,
            addr,
            token: token.into(),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve the trace channel in a background task.
    ///
    /// Accepting stops when `stop_rx` fires (or its sender is dropped)
    /// before an authenticated connection arrives. Once connected, the task
    /// reads until the child closes its end.
    pub fn spawn<P>(self, provider: P, stop_rx: oneshot::Receiver<()>) -> JoinHandle<ListenerSummary>
    where
        P: Instrumentation + 'static,
    {
        tokio::spawn(async move { self.serve(provider, stop_rx).await })
    }

    async fn serve<P: Instrumentation>(
        self,
        provider: P,
        mut stop_rx: oneshot::Receiver<()>,
    ) -> ListenerSummary {
        let reader = loop {
            let accepted = tokio::select! {
                res = self.listener.accept() => res,
                _ = &mut stop_rx => {
                    debug!("trace listener stopped before a connection arrived");
                    return ListenerSummary::default();
                }
            };

            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "accepting trace connection failed");
                    continue;
                }
            };

            match self.handshake(stream).await {
                Some(reader) => break reader,
                None => debug!(%peer, "rejected trace connection"),
            }
        };

        let mut dispatcher = TraceDispatcher::new(provider);
        let lines = pump_lines(reader, &mut dispatcher).await;
        debug!(lines, "trace channel closed");
        ListenerSummary {
            connected: true,
            lines,
        }
    }

    async fn handshake(&self, stream: TcpStream) -> Option<BufReader<TcpStream>> {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        let read = tokio::time::timeout(HANDSHAKE_TIMEOUT, reader.read_until(b'\n', &mut buf)).await;
        match read {
            Ok(Ok(n)) if n > 0 => {}
            _ => return None,
        }

        let line = String::from_utf8_lossy(&buf);
        match wire::decode_line(&line) {
            Ok(WireMessage::Hello { pid, python, token }) if token == self.token => {
                info!(pid, %python, "instrumentation connected");
                Some(reader)
            }
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "bad trace handshake");
                None
            }
        }
    }
}

async fn pump_lines<P: Instrumentation>(
    mut reader: BufReader<TcpStream>,
    dispatcher: &mut TraceDispatcher<P>,
) -> u64 {
    let mut buf = Vec::new();
    let mut count = 0u64;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                count += 1;
                let line = String::from_utf8_lossy(&buf);
                dispatcher.handle_line(&line);
            }
            Err(e) => {
                warn!(error = %e, "reading trace channel failed");
                break;
            }
        }
    }
    count
}
