//! SMTP listener implementation

pub mod commands;
pub mod error;
pub mod response;
pub mod server;
pub mod session;
pub mod tls;

pub use commands::Credentials;
pub use error::{SmtpError, SmtpLimits};
pub use response::SmtpResponse;
pub use server::SmtpServer;
pub use session::{AuthState, SmtpSession, SmtpState};
pub use tls::load_tls_config;
