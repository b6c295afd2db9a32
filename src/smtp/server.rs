//! SMTP listener implementation

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use mail_parser::MessageParser;
use tracing::{debug, error, info};

use crate::server::ConnectionRegistry;
use crate::smtp::commands::{Credentials, SmtpCommandHandler};
use crate::smtp::error::{SmtpError, SmtpLimits};
use crate::smtp::response::SmtpResponse;
use crate::smtp::session::SmtpSession;
use crate::smtp::tls::SmtpStream;
use crate::store::MessageStore;

/// SMTP listener that authenticates clients, parses received messages
/// and appends them to the shared message store
#[derive(Clone)]
pub struct SmtpServer {
    /// Server hostname used in greeting and HELO/EHLO responses
    hostname: String,
    /// The single credential pair accepted by AUTH LOGIN
    credentials: Credentials,
    /// TLS configuration for implicit TLS, when enabled
    tls: Option<Arc<rustls::ServerConfig>>,
    /// Shared message store (write handle)
    store: Arc<MessageStore>,
}

impl SmtpServer {
    /// Create a new SMTP server
    pub fn new(
        hostname: &str,
        credentials: Credentials,
        tls: Option<Arc<rustls::ServerConfig>>,
        store: Arc<MessageStore>,
    ) -> Self {
        Self {
            hostname: hostname.to_owned(),
            credentials,
            tls,
            store,
        }
    }

    /// Run the accept loop on an already-bound listener (blocking).
    ///
    /// Each connection is handled on its own thread and registered with
    /// `connections` so a coordinated shutdown can cancel it. The loop
    /// exits once `shutdown` is set and the listener is woken by one
    /// final connection.
    pub fn serve(
        &self,
        listener: TcpListener,
        shutdown: Arc<AtomicBool>,
        connections: Arc<ConnectionRegistry>,
    ) -> Result<(), SmtpError> {
        let local_addr = listener.local_addr()?;
        info!("SMTP server listening on {local_addr}");

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
                            debug!("SMTP connection ended with error: {e}");
                        }
                        connections.deregister(connection_id);
                    });
                }
                Err(e) => {
                    error!("error accepting SMTP connection: {e}");
                }
            }
        }

        debug!("SMTP accept loop stopped");
        Ok(())
    }

    /// Wrap an accepted connection (TLS when configured) and run the session
    fn handle_connection(&self, stream: TcpStream) -> Result<(), SmtpError> {
        debug!("client connected");
        let mut stream = match &self.tls {
            Some(config) => SmtpStream::tls(Arc::clone(config), stream)?,
            None => SmtpStream::plain(stream),
        };
        self.handle_client(&mut stream)
    }

    /// Drive a single SMTP session over the connection
    fn handle_client(&self, stream: &mut SmtpStream) -> Result<(), SmtpError> {
        let mut session = SmtpSession::new();
        let command_handler = SmtpCommandHandler::new(&self.hostname, &self.credentials);

        // Send greeting
        self.send_response(stream, &SmtpResponse::greeting(&self.hostname))?;

        let mut line_buffer = Vec::new();
        loop {
            line_buffer.clear();

            match stream.read_until(b'\n', &mut line_buffer) {
                Ok(0) => break, // Connection closed
                Ok(_) => {
                    // Handle potential UTF-8 issues gracefully
                    let line = String::from_utf8_lossy(&line_buffer).into_owned();
                    let line = line.trim_end_matches(['\r', '\n']);

                    if session.in_data_mode {
                        self.handle_data_line(stream, line, &mut session)?;
                    } else if session.auth_in_progress() {
                        // Mid AUTH LOGIN exchange: the line is a base64
                        // payload, not a command
                        match command_handler.process_auth_line(line.trim(), &mut session) {
                            Ok(response) => {
                                self.send_response(stream, &response)?;
                            }
                            Err(e) => {
                                let response = SmtpResponse::error(
                                    e.to_response_code(),
                                    &e.to_response_message(),
                                );
                                self.send_response(stream, &response)?;
                            }
                        }
                    } else {
                        let command = line.trim();
                        if command.is_empty() {
                            continue;
                        }

                        // Normal command processing
                        match command_handler.process_command(command, &mut session) {
                            Ok(response) => {
                                self.send_response(stream, &response)?;
                                if response.code == "221" {
                                    break; // QUIT command
                                }
                            }
                            Err(e) => {
                                let response = SmtpResponse::error(
                                    e.to_response_code(),
                                    &e.to_response_message(),
                                );
                                self.send_response(stream, &response)?;
                            }
                        }
                    }
                }
                Err(e) => {
                    debug!("error reading from client: {e}");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a line received during DATA mode
    fn handle_data_line(
        &self,
        stream: &mut SmtpStream,
        line: &str,
        session: &mut SmtpSession,
    ) -> Result<(), SmtpError> {
        if line == "." {
            // End of data: parse and store the message
            let response = match self.finish_message(session) {
                Ok(response) => response,
                Err(e) => SmtpResponse::error(e.to_response_code(), &e.to_response_message()),
            };
            self.send_response(stream, &response)?;
            session.reset();
        } else {
            // Transparency: dot-stuffed lines lose their leading dot
            let line = line.strip_prefix('.').unwrap_or(line);
            if let Err(e) = session.add_data_line(line.to_string()) {
                let response = SmtpResponse::error(e.to_response_code(), &e.to_response_message());
                self.send_response(stream, &response)?;
                session.reset();
            }
        }
        Ok(())
    }

    /// Parse the collected data and append the message to the store.
    /// A parse failure fails this message only; the store is untouched.
    fn finish_message(&self, session: &mut SmtpSession) -> Result<SmtpResponse, SmtpError> {
        let raw = session.finish_data_collection()?;
        let parsed = MessageParser::default()
            .parse(raw.as_bytes())
            .ok_or(SmtpError::ParseFailure)?;
        let message = self.store.add_message(&parsed);
        debug!(
            message_id = message.message_id.as_deref().unwrap_or(""),
            "message added to store"
        );
        Ok(SmtpResponse::ok())
    }

    /// Send a response to the client
    fn send_response(
        &self,
        stream: &mut SmtpStream,
        response: &SmtpResponse,
    ) -> Result<(), SmtpError> {
        // Ensure response doesn't exceed maximum line length
        let formatted = response.format();
        if response.multiline.is_none() && formatted.len() > SmtpLimits::REPLY_LINE_MAX_LENGTH {
            // Truncate message if too long
            let truncated_response =
                SmtpResponse::new(&response.code, "Response too long (truncated)");
            stream.write_all(truncated_response.format().as_bytes())?;
        } else {
            stream.write_all(formatted.as_bytes())?;
        }
        stream.flush()?;
        Ok(())
    }
}
