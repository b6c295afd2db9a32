//! Server lifecycle coordination
//!
//! The coordinator owns the single message store and both network
//! listeners. `start()` brings both up (rolling back on partial
//! failure), `close()` stops both best-effort and cancels in-flight
//! connections.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::http::HttpServer;
use crate::smtp::{Credentials, SmtpServer, load_tls_config};
use crate::store::MessageStore;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind HTTP listener: {0}")]
    HttpBind(std::io::Error),

    #[error("failed to bind SMTP listener: {0}")]
    SmtpBind(std::io::Error),

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("TLS is enabled but SMTP_CERT_PATH/SMTP_KEY_PATH are not set")]
    MissingTlsMaterial,

    #[error("server is already running")]
    AlreadyRunning,

    #[error("{0} listener thread panicked")]
    ListenerPanic(&'static str),
}

/// Tracks the raw socket of every in-flight connection so a shutdown
/// can cancel them instead of waiting for long-lived clients
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    streams: Mutex<HashMap<u64, TcpStream>>,
}

impl ConnectionRegistry {
    /// Register an accepted connection; returns its id for deregistration
    pub fn register(&self, stream: &TcpStream) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(clone) = stream.try_clone() {
            self.lock().insert(id, clone);
        }
        id
    }

    /// Drop a finished connection from the registry
    pub fn deregister(&self, id: u64) {
        self.lock().remove(&id);
    }

    /// Force-close every registered connection
    pub fn close_all(&self) {
        for (_, stream) in self.lock().drain() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, TcpStream>> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One running accept loop plus everything needed to stop it
struct ListenerHandle {
    name: &'static str,
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    connections: Arc<ConnectionRegistry>,
    thread: JoinHandle<()>,
}

impl ListenerHandle {
    /// Stop the accept loop, cancel in-flight connections, and wait for
    /// the listener thread to finish
    fn close(self) -> Result<(), ServerError> {
        self.shutdown.store(true, Ordering::SeqCst);
        // The accept call blocks until a connection arrives; wake it so
        // the loop observes the shutdown flag
        let _ = TcpStream::connect(wake_addr(self.addr));
        self.connections.close_all();
        self.thread
            .join()
            .map_err(|_| ServerError::ListenerPanic(self.name))
    }
}

/// Where to connect to wake a listener bound to an unspecified address
fn wake_addr(addr: SocketAddr) -> SocketAddr {
    if addr.ip().is_unspecified() {
        let loopback = match addr.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
        };
        SocketAddr::new(loopback, addr.port())
    } else {
        addr
    }
}

struct RunningListeners {
    http: ListenerHandle,
    smtp: ListenerHandle,
}

/// Owns one [`MessageStore`] and both listeners, and coordinates their
/// lifecycle: both are listening before `start()` returns, and `close()`
/// attempts both shutdowns regardless of individual outcomes.
pub struct MockServer {
    config: Config,
    store: Arc<MessageStore>,
    running: Mutex<Option<RunningListeners>>,
}

impl MockServer {
    /// Create a stopped server from its configuration
    pub fn new(config: Config) -> Self {
        let store = Arc::new(MessageStore::new(config.max_message_count));
        Self {
            config,
            store,
            running: Mutex::new(None),
        }
    }

    /// Handle to the shared message store
    pub fn store(&self) -> Arc<MessageStore> {
        Arc::clone(&self.store)
    }

    /// Bound address of the HTTP listener while running
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.lock_running().as_ref().map(|l| l.http.addr)
    }

    /// Bound address of the SMTP listener while running
    pub fn smtp_addr(&self) -> Option<SocketAddr> {
        self.lock_running().as_ref().map(|l| l.smtp.addr)
    }

    /// Bind and start both listeners. The HTTP listener comes up first;
    /// if the SMTP side fails to bind (or its TLS material is missing or
    /// broken) the already-bound listener is dropped before the error is
    /// returned, so no orphaned listener survives a failed start.
    pub fn start(&self) -> Result<(), ServerError> {
        let mut running = self.lock_running();
        if running.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let http_listener =
            TcpListener::bind((self.config.bind_addr.as_str(), self.config.http_port))
                .map_err(ServerError::HttpBind)?;

        let smtp_listener =
            match TcpListener::bind((self.config.bind_addr.as_str(), self.config.smtp_port)) {
                Ok(listener) => listener,
                Err(e) => return Err(ServerError::SmtpBind(e)), // http_listener dropped here
            };

        let tls = if self.config.smtp_secure {
            let (Some(cert_path), Some(key_path)) =
                (&self.config.smtp_cert_path, &self.config.smtp_key_path)
            else {
                return Err(ServerError::MissingTlsMaterial);
            };
            let config = load_tls_config(cert_path, key_path)
                .map_err(|e| ServerError::Tls(e.to_string()))?;
            Some(config)
        } else {
            None
        };

        let http_addr = http_listener.local_addr().map_err(ServerError::HttpBind)?;
        let smtp_addr = smtp_listener.local_addr().map_err(ServerError::SmtpBind)?;
        info!("HTTP port: {}", http_addr.port());
        info!("SMTP port: {}", smtp_addr.port());

        let http_server = HttpServer::new(Arc::clone(&self.store));
        let smtp_server = SmtpServer::new(
            &self.config.smtp_hostname,
            Credentials::new(&self.config.smtp_user, &self.config.smtp_password),
            tls,
            Arc::clone(&self.store),
        );

        let http = spawn_listener("HTTP", http_addr, move |shutdown, connections| {
            if let Err(e) = http_server.serve(http_listener, shutdown, connections) {
                warn!("HTTP server terminated with error: {e}");
            }
        });
        let smtp = spawn_listener("SMTP", smtp_addr, move |shutdown, connections| {
            if let Err(e) = smtp_server.serve(smtp_listener, shutdown, connections) {
                warn!("SMTP server terminated with error: {e}");
            }
        });

        *running = Some(RunningListeners { http, smtp });
        Ok(())
    }

    /// Stop both listeners. Closing is best-effort: both are attempted
    /// regardless of individual outcomes, and calling this while stopped
    /// (or twice) is a no-op.
    pub fn close(&self) -> Result<(), ServerError> {
        let Some(listeners) = self.lock_running().take() else {
            return Ok(());
        };

        info!("shutting down servers");
        let http_result = listeners.http.close();
        let smtp_result = listeners.smtp.close();
        http_result.and(smtp_result)
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<RunningListeners>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn spawn_listener(
    name: &'static str,
    addr: SocketAddr,
    serve: impl FnOnce(Arc<AtomicBool>, Arc<ConnectionRegistry>) + Send + 'static,
) -> ListenerHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let connections = Arc::new(ConnectionRegistry::default());
    let thread = {
        let shutdown = Arc::clone(&shutdown);
        let connections = Arc::clone(&connections);
        thread::spawn(move || serve(shutdown, connections))
    };
    ListenerHandle {
        name,
        addr,
        shutdown,
        connections,
        thread,
    }
}
