//! Error types for the SMTP listener

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmtpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid command")]
    InvalidCommand,

    #[error("Invalid state for command")]
    InvalidState(String),

    #[error("Invalid syntax")]
    InvalidSyntax(String),

    #[error("Line too long (max {max} characters)")]
    LineTooLong { max: usize },

    #[error("Path too long (max {max} characters)")]
    PathTooLong { max: usize },

    #[error("Too many recipients (max {max})")]
    TooManyRecipients { max: usize },

    #[error("Too much mail data (max {max} bytes)")]
    TooMuchData { max: usize },

    #[error("Domain name too long (max {max} characters)")]
    DomainTooLong { max: usize },

    #[error("User name too long (max {max} characters)")]
    UserTooLong { max: usize },

    #[error("Authentication failed")]
    AuthFailed,

    #[error("Authentication required")]
    AuthRequired,

    #[error("Authentication exchange aborted")]
    AuthAborted,

    #[error("Unsupported authentication mechanism: {0}")]
    UnsupportedMechanism(String),

    #[error("Invalid base64 payload")]
    InvalidBase64,

    #[error("Message data could not be parsed")]
    ParseFailure,

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,
}

impl From<rustls::Error> for SmtpError {
    fn from(err: rustls::Error) -> Self {
        SmtpError::Tls(err.to_string())
    }
}

/// SMTP size limits as defined in RFC 821
pub struct SmtpLimits;

impl SmtpLimits {
    /// Maximum length of a user name
    pub const USER_MAX_LENGTH: usize = 64;

    /// Maximum length of a domain name
    pub const DOMAIN_MAX_LENGTH: usize = 64;

    /// Maximum length of a path (reverse-path or forward-path)
    pub const PATH_MAX_LENGTH: usize = 256;

    /// Maximum length of a command line including CRLF
    pub const COMMAND_LINE_MAX_LENGTH: usize = 512;

    /// Maximum length of a reply line including CRLF
    pub const REPLY_LINE_MAX_LENGTH: usize = 512;

    /// Maximum length of a text line including CRLF
    pub const TEXT_LINE_MAX_LENGTH: usize = 1000;

    /// Maximum number of recipients per message
    pub const MAX_RECIPIENTS: usize = 100;

    /// Maximum total size of message data (reasonable limit for in-memory storage)
    pub const MAX_DATA_SIZE: usize = 10 * 1024 * 1024; // 10MB
}

/// Maps SMTP errors to appropriate response codes
impl SmtpError {
    pub fn to_response_code(&self) -> &'static str {
        match self {
            SmtpError::Io(_) => "421",
            SmtpError::InvalidCommand => "500",
            SmtpError::InvalidState(_) => "503",
            SmtpError::InvalidSyntax(_) => "501",
            SmtpError::LineTooLong { .. } => "500",
            SmtpError::PathTooLong { .. } => "501",
            SmtpError::TooManyRecipients { .. } => "552",
            SmtpError::TooMuchData { .. } => "552",
            SmtpError::DomainTooLong { .. } => "501",
            SmtpError::UserTooLong { .. } => "501",
            SmtpError::AuthFailed => "535",
            SmtpError::AuthRequired => "530",
            SmtpError::AuthAborted => "501",
            SmtpError::UnsupportedMechanism(_) => "504",
            SmtpError::InvalidBase64 => "501",
            SmtpError::ParseFailure => "451",
            SmtpError::Tls(_) => "421",
            SmtpError::ConnectionClosed => "421",
        }
    }

    pub fn to_response_message(&self) -> String {
        match self {
            SmtpError::Io(_) => "Service not available".to_string(),
            SmtpError::InvalidCommand => "Syntax error, command unrecognized".to_string(),
            SmtpError::InvalidState(msg) => format!("Bad sequence of commands: {msg}"),
            SmtpError::InvalidSyntax(msg) => format!("Syntax error: {msg}"),
            SmtpError::LineTooLong { max } => format!("Line too long (max {max} characters)"),
            SmtpError::PathTooLong { max } => format!("Path too long (max {max} characters)"),
            SmtpError::TooManyRecipients { max } => format!("Too many recipients (max {max})"),
            SmtpError::TooMuchData { max } => format!("Too much mail data (max {max} bytes)"),
            SmtpError::DomainTooLong { max } => {
                format!("Domain name too long (max {max} characters)")
            }
            SmtpError::UserTooLong { max } => {
                format!("User name too long (max {max} characters)")
            }
            SmtpError::AuthFailed => "Authentication credentials invalid".to_string(),
            SmtpError::AuthRequired => "Authentication required".to_string(),
            SmtpError::AuthAborted => "Authentication aborted".to_string(),
            SmtpError::UnsupportedMechanism(_) => "Unrecognized authentication type".to_string(),
            SmtpError::InvalidBase64 => "Cannot decode response".to_string(),
            SmtpError::ParseFailure => "Failed to process message data".to_string(),
            SmtpError::Tls(_) => "TLS negotiation failed".to_string(),
            SmtpError::ConnectionClosed => "Connection closed".to_string(),
        }
    }
}
