//! TLS setup and the plaintext/TLS connection stream

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ServerConfig, ServerConnection, StreamOwned};

use crate::smtp::error::SmtpError;

/// Build a rustls server configuration from PEM certificate and key files
pub fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<Arc<ServerConfig>, SmtpError> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(File::open(cert_path)?))
        .collect::<Result<Vec<CertificateDer<'static>>, io::Error>>()?;
    if certs.is_empty() {
        return Err(SmtpError::Tls(format!(
            "no certificates found in {}",
            cert_path.display()
        )));
    }

    let key: PrivateKeyDer<'static> =
        rustls_pemfile::private_key(&mut BufReader::new(File::open(key_path)?))?.ok_or_else(
            || SmtpError::Tls(format!("no private key found in {}", key_path.display())),
        )?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    Ok(Arc::new(config))
}

/// A buffered SMTP connection, plaintext or TLS
pub enum SmtpStream {
    Plain(BufReader<TcpStream>),
    Tls(Box<BufReader<StreamOwned<ServerConnection, TcpStream>>>),
}

impl SmtpStream {
    /// Wrap an accepted connection as plaintext
    pub fn plain(stream: TcpStream) -> Self {
        SmtpStream::Plain(BufReader::new(stream))
    }

    /// Wrap an accepted connection in server-side TLS.
    /// The handshake completes lazily on the first read or write.
    pub fn tls(config: Arc<ServerConfig>, stream: TcpStream) -> Result<Self, SmtpError> {
        let connection = ServerConnection::new(config)?;
        Ok(SmtpStream::Tls(Box::new(BufReader::new(StreamOwned::new(
            connection, stream,
        )))))
    }

    /// Read bytes up to and including the delimiter
    pub fn read_until(&mut self, byte: u8, buf: &mut Vec<u8>) -> Result<usize, io::Error> {
        match *self {
            SmtpStream::Plain(ref mut stream) => stream.read_until(byte, buf),
            SmtpStream::Tls(ref mut stream) => stream.read_until(byte, buf),
        }
    }
}

impl Write for SmtpStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize, io::Error> {
        match *self {
            SmtpStream::Plain(ref mut stream) => stream.get_mut().write(buf),
            SmtpStream::Tls(ref mut stream) => stream.get_mut().write(buf),
        }
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        match *self {
            SmtpStream::Plain(ref mut stream) => stream.get_mut().flush(),
            SmtpStream::Tls(ref mut stream) => stream.get_mut().flush(),
        }
    }
}

impl Read for SmtpStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        match *self {
            SmtpStream::Plain(ref mut stream) => stream.read(buf),
            SmtpStream::Tls(ref mut stream) => stream.read(buf),
        }
    }
}
