//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{BufWriter, ErrorKind, Read};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;

use crate::engine::Engine;
use crate::error::{EmberError, Result};
use crate::protocol::{decode_request, write_reply, Command, Reply};

/// How often a blocked read wakes up to check the shutdown flag
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader
    reader: TcpStream,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Bytes received but not yet decoded
    buffer: BytesMut,

    /// Reference to the storage engine
    engine: Arc<Engine>,

    /// Set by `SHUTDOWN` or the server
    shutdown: Arc<AtomicBool>,

    /// Close the connection after this long without input
    idle_timeout: Option<Duration>,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O and the shutdown poll interval
    pub fn new(stream: TcpStream, engine: Arc<Engine>, shutdown: Arc<AtomicBool>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(POLL_INTERVAL))?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: read_stream,
            writer: BufWriter::new(write_stream),
            buffer: BytesMut::with_capacity(4096),
            engine,
            shutdown,
            idle_timeout: None,
            peer_addr,
        })
    }

    /// Configure connection timeouts
    ///
    /// `read_ms` is an idle timeout: the connection closes once no input
    /// has arrived for that long. 0 disables either timeout.
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        self.idle_timeout = (read_ms > 0).then(|| Duration::from_millis(read_ms));
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads requests in a loop and sends replies. Returns when the client
    /// disconnects, goes idle, sends `SHUTDOWN`, or the server shuts down.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        let mut chunk = [0u8; 4096];
        let mut last_input = Instant::now();

        loop {
            // Answer everything already buffered (pipelined requests)
            while let Some(args) = self.next_request()? {
                let command = match Command::from_args(args) {
                    Ok(command) => command,
                    Err(e) => {
                        self.send_reply(&Reply::from_error(&e))?;
                        continue;
                    }
                };

                tracing::trace!("Received command from {}: {:?}", self.peer_addr, command);
                let stop = matches!(command, Command::Shutdown);
                let reply = self.engine.execute(command);
                self.send_reply(&reply)?;

                if stop {
                    tracing::info!("SHUTDOWN requested by {}", self.peer_addr);
                    self.shutdown.store(true, Ordering::SeqCst);
                    return Ok(());
                }
            }

            if self.shutdown.load(Ordering::SeqCst) {
                return Ok(());
            }

            match self.reader.read(&mut chunk) {
                Ok(0) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    last_input = Instant::now();
                }
                // Poll tick (Windows reports TimedOut instead of WouldBlock)
                Err(ref e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    if let Some(idle) = self.idle_timeout {
                        if last_input.elapsed() >= idle {
                            tracing::debug!("Read timeout for client {}", self.peer_addr);
                            return Ok(());
                        }
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(ref e) if is_disconnect(e.kind()) => {
                    tracing::debug!("Connection reset by client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    return Err(e.into());
                }
            }
        }
    }

    /// Decode the next buffered request; a framing error is reported to
    /// the client and ends the connection
    fn next_request(&mut self) -> Result<Option<Vec<Vec<u8>>>> {
        match decode_request(&mut self.buffer) {
            Ok(request) => Ok(request),
            Err(e) => {
                tracing::warn!("Protocol error from {}: {}", self.peer_addr, e);
                let _ = self.send_reply(&Reply::from_error(&e));
                Err(e)
            }
        }
    }

    /// Send a reply to the client
    fn send_reply(&mut self, reply: &Reply) -> Result<()> {
        let result = write_reply(&mut self.writer, reply);
        match result {
            // The client went away before the reply could be sent
            Err(EmberError::Io(ref e)) if is_disconnect(e.kind()) => {
                tracing::debug!(
                    "Client {} disconnected before reply could be sent: {}",
                    self.peer_addr,
                    e
                );
            }
            Err(ref e) => tracing::warn!("Error writing to {}: {}", self.peer_addr, e),
            Ok(()) => {}
        }
        result
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe
    )
}
