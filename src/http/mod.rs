//! HTTP query/management API implementation

pub mod error;
pub mod query;
pub mod request;
pub mod response;
pub mod server;

pub use error::HttpError;
pub use query::{MessagesQuery, QueryValidator};
pub use request::Request;
pub use response::HttpResponse;
pub use server::HttpServer;
