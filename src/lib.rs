//! # mailcatch
//!
//! mailcatch is a mock mail-capture server for testing.
//!
//! It accepts SMTP connections from a real mail client, parses each
//! received message, retains a bounded recent history in memory, and
//! exposes an HTTP API for querying and clearing that history. Tests can
//! send e-mail through their normal delivery path and assert on what was
//! "delivered" without any real mail infrastructure.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use mailcatch::{Config, MockServer};
//!
//! // Configure via flags or environment variables (SMTP_PORT, HTTP_PORT, ...)
//! let config = Config::parse_from([
//!     "mailcatch",
//!     "--smtp-port", "2525",
//!     "--http-port", "8080",
//!     "--smtp-secure", "false",
//! ]);
//!
//! let server = MockServer::new(config);
//! server.start().unwrap();
//!
//! // Application authenticates (LOGIN, user/password) and sends mail
//! // to localhost:2525, then the test asserts on
//! // http://localhost:8080/messages
//!
//! server.close().unwrap();
//! ```
//!
//! ## HTTP API
//!
//! - `HEAD /` - liveness probe, 200 while serving
//! - `GET /messages` - JSON array of captured messages; optional query
//!   parameters `messageType`, `from`, `to`, `cc` (exact/any-entry
//!   matches, ANDed), `count` (1-100) and `reverse` (boolean)
//! - `DELETE /messages` - empties the store, 204
//!
//! ## Supported SMTP commands
//!
//! - `HELO` / `EHLO` - Identify the sender
//! - `AUTH LOGIN` - Authenticate with the configured credential pair
//! - `MAIL FROM` - Specify the sender's address (requires authentication)
//! - `RCPT TO` - Specify the destination (multiple destinations are supported)
//! - `DATA` - Send the message body
//! - `RSET` - Reset the current transaction
//! - `NOOP` - Do nothing
//! - `QUIT` - Close connection
//!
//! ## Notes
//!
//! - Runs in-memory only. The store keeps the most recent messages up to
//!   its configured capacity and evicts the oldest beyond that.
//! - LOGIN is the only supported authentication mechanism.
//! - Implicit TLS is optional; certificate and key are supplied as PEM
//!   files.
//! - Mail relay is not supported; nothing is ever delivered anywhere.
//!
//! ## Size Limits
//!
//! The SMTP listener enforces RFC 821 size limits:
//! - User names: 64 characters max
//! - Domain names: 64 characters max
//! - Paths: 256 characters max
//! - Command lines: 512 characters max
//! - Text lines: 1000 characters max
//! - Recipients: 100 max per message

pub mod config;
pub mod http;
pub mod message;
pub mod server;
pub mod smtp;
pub mod store;

pub use config::Config;
pub use http::{HttpError, HttpServer};
pub use message::{Address, AttachmentData, Message};
pub use server::{ConnectionRegistry, MockServer, ServerError};
pub use smtp::{Credentials, SmtpError, SmtpLimits, SmtpResponse, SmtpServer};
pub use store::{MessageFilter, MessageStore};
