//! HTTP listener implementation

use std::io::{BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::{debug, error, info};

use crate::http::error::HttpError;
use crate::http::query::QueryValidator;
use crate::http::request::Request;
use crate::http::response::HttpResponse;
use crate::server::ConnectionRegistry;
use crate::store::MessageStore;

/// HTTP listener exposing the query/management API over the shared
/// message store
#[derive(Clone)]
pub struct HttpServer {
    /// Shared message store (read/clear handle)
    store: Arc<MessageStore>,
    validator: QueryValidator,
}

impl HttpServer {
    /// Create a new HTTP server over the given store handle
    pub fn new(store: Arc<MessageStore>) -> Self {
        Self {
            store,
            validator: QueryValidator::new(),
        }
    }

    /// Run the accept loop on an already-bound listener (blocking).
    /// Same shutdown contract as the SMTP listener.
    pub fn serve(
        &self,
        listener: TcpListener,
        shutdown: Arc<AtomicBool>,
        connections: Arc<ConnectionRegistry>,
    ) -> Result<(), HttpError> {
        let local_addr = listener.local_addr()?;
        info!("HTTP server listening on {local_addr}");

        for stream in listener.incoming() {
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            match stream {
                Ok(stream) => {
                    let server = self.clone();
                    let connections = Arc::clone(&connections);
                    thread::spawn(move || {
                        let connection_id = connections.register(&stream);
                        if let Err(e) = server.handle_connection(stream) {
                            debug!("HTTP connection ended with error: {e}");
                        }
                        connections.deregister(connection_id);
                    });
                }
                Err(e) => {
                    error!("error accepting HTTP connection: {e}");
                }
            }
        }

        debug!("HTTP accept loop stopped");
        Ok(())
    }

    /// Serve one request and close the connection
    fn handle_connection(&self, mut stream: TcpStream) -> Result<(), HttpError> {
        let mut reader = BufReader::new(stream.try_clone()?);
        let request = Request::read_from(&mut reader)?;
        debug!(
            method = request.method.as_str(),
            path = request.path.as_str(),
            "request received"
        );

        let response = self.route(&request);
        stream.write_all(&response.format())?;
        stream.flush()?;
        Ok(())
    }

    /// Dispatch a request to its handler
    fn route(&self, request: &Request) -> HttpResponse {
        match (request.method.as_str(), request.path.as_str()) {
            // Liveness probe: succeeds while the process is serving
            ("HEAD", "/") => HttpResponse::empty_ok(),
            ("GET", "/messages") => self.list_messages(request),
            ("DELETE", "/messages") => {
                self.store.clear();
                HttpResponse::no_content()
            }
            (_, "/" | "/messages") => HttpResponse::method_not_allowed(),
            _ => HttpResponse::not_found(),
        }
    }

    /// `GET /messages`: validate the query and delegate to the store
    fn list_messages(&self, request: &Request) -> HttpResponse {
        match self.validator.parse(&request.query_pairs()) {
            Ok(query) => {
                let messages = self
                    .store
                    .find_messages(&query.filter, query.count, query.reverse);
                HttpResponse::ok_json(&messages)
            }
            Err(e) => HttpResponse::bad_request(&e.to_string()),
        }
    }
}
