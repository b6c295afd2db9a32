//! Runtime configuration
//!
//! Every setting is sourced from a CLI flag or its environment variable
//! (flag wins), with defaults suitable for local test runs.

use std::path::PathBuf;

use clap::Parser;

/// Configuration for the mock server and both of its listeners
#[derive(Parser, Debug, Clone)]
#[command(
    name = "mailcatch",
    version,
    about = "Mock SMTP server that captures mail in memory behind an HTTP query API"
)]
pub struct Config {
    /// Log level filter (error, warn, info, debug, trace)
    #[arg(long, env = "LOGLEVEL", default_value = "info")]
    pub loglevel: String,

    /// Address both listeners bind to
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind_addr: String,

    /// TCP port for the HTTP query API
    #[arg(long, env = "HTTP_PORT", default_value_t = 1080)]
    pub http_port: u16,

    /// TCP port for the SMTP listener
    #[arg(long, env = "SMTP_PORT", default_value_t = 1025)]
    pub smtp_port: u16,

    /// Hostname announced in the SMTP greeting and HELO/EHLO responses
    #[arg(long, env = "SMTP_HOSTNAME", default_value = "mailcatch.local")]
    pub smtp_hostname: String,

    /// Serve the SMTP listener over implicit TLS
    #[arg(long, env = "SMTP_SECURE", default_value_t = true, action = clap::ArgAction::Set)]
    pub smtp_secure: bool,

    /// PEM certificate chain for the SMTP listener (required when secure)
    #[arg(long, env = "SMTP_CERT_PATH")]
    pub smtp_cert_path: Option<PathBuf>,

    /// PEM private key for the SMTP listener (required when secure)
    #[arg(long, env = "SMTP_KEY_PATH")]
    pub smtp_key_path: Option<PathBuf>,

    /// Username accepted by AUTH LOGIN
    #[arg(long, env = "SMTP_USER", default_value = "user")]
    pub smtp_user: String,

    /// Password accepted by AUTH LOGIN
    #[arg(long, env = "SMTP_PASSWORD", default_value = "password")]
    pub smtp_password: String,

    /// Number of received messages retained before FIFO eviction
    #[arg(long, env = "MAX_MESSAGE_COUNT", default_value_t = 100)]
    pub max_message_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loglevel: "info".to_string(),
            bind_addr: "0.0.0.0".to_string(),
            http_port: 1080,
            smtp_port: 1025,
            smtp_hostname: "mailcatch.local".to_string(),
            smtp_secure: true,
            smtp_cert_path: None,
            smtp_key_path: None,
            smtp_user: "user".to_string(),
            smtp_password: "password".to_string(),
            max_message_count: 100,
        }
    }
}
