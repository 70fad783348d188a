//! TCP Server
//!
//! Accepts connections and dispatches them to worker threads.

use std::io::{ErrorKind, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver};
use tracing::{debug, info, warn};

use super::Connection;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Cloneable handle that stops a running [`Server`]
#[derive(Clone)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// TCP server for EmberKV
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    listener: Option<TcpListener>,

    /// Set by `SHUTDOWN`, [`Server::shutdown`] or a [`ShutdownHandle`]
    shutdown: Arc<AtomicBool>,

    /// Connections accepted and not yet closed
    active: Arc<AtomicUsize>,
}

impl Server {
    /// Create a new server with the given config and engine
    pub fn new(config: Config, engine: Arc<Engine>) -> Self {
        Self {
            config,
            engine,
            listener: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bind the listen address ahead of [`Server::run`]
    ///
    /// Returns the bound address (useful with port 0).
    pub fn bind(&mut self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(&self.config.listen_addr)?;
        let addr = listener.local_addr()?;
        self.listener = Some(listener);
        Ok(addr)
    }

    /// Start the server (blocking until shutdown)
    ///
    /// Workers finish their current connection before the call returns.
    pub fn run(&mut self) -> Result<()> {
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => TcpListener::bind(&self.config.listen_addr)?,
        };
        listener.set_nonblocking(true)?;
        info!("Listening on {}", listener.local_addr()?);

        let (sender, receiver) = channel::bounded::<TcpStream>(self.config.max_connections);
        let workers: Vec<JoinHandle<()>> = (0..self.config.worker_threads)
            .map(|id| self.spawn_worker(id, receiver.clone()))
            .collect::<std::io::Result<_>>()?;
        drop(receiver);

        while !self.shutdown.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if self.active.load(Ordering::SeqCst) >= self.config.max_connections {
                        warn!("Rejecting {}: max connections reached", peer);
                        reject(stream);
                        continue;
                    }
                    if let Err(e) = stream.set_nonblocking(false) {
                        warn!("Dropping {}: {}", peer, e);
                        continue;
                    }
                    self.active.fetch_add(1, Ordering::SeqCst);
                    if sender.send(stream).is_err() {
                        self.active.fetch_sub(1, Ordering::SeqCst);
                        break;
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => warn!("Accept failed: {}", e),
            }
        }

        info!("Shutting down, waiting for workers");
        drop(sender);
        for worker in workers {
            if worker.join().is_err() {
                warn!("Worker thread panicked");
            }
        }
        Ok(())
    }

    fn spawn_worker(&self, id: usize, receiver: Receiver<TcpStream>) -> std::io::Result<JoinHandle<()>> {
        let engine = Arc::clone(&self.engine);
        let shutdown = Arc::clone(&self.shutdown);
        let active = Arc::clone(&self.active);
        let read_ms = self.config.read_timeout_ms;
        let write_ms = self.config.write_timeout_ms;

        thread::Builder::new()
            .name(format!("emberkv-worker-{}", id))
            .spawn(move || {
                for stream in receiver.iter() {
                    if !shutdown.load(Ordering::SeqCst) {
                        let result = Connection::new(stream, Arc::clone(&engine), Arc::clone(&shutdown))
                            .and_then(|mut conn| {
                                conn.set_timeouts(read_ms, write_ms)?;
                                conn.handle()
                            });
                        if let Err(e) = result {
                            debug!("Connection closed with error: {}", e);
                        }
                    }
                    active.fetch_sub(1, Ordering::SeqCst);
                }
            })
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// A handle that can stop the server from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown))
    }

    /// Connections currently being served or queued
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Tell an over-limit client why it is being dropped
fn reject(mut stream: TcpStream) {
    let _ = stream.write_all(b"-ERR max number of clients reached\r\n");
}
