//! Minimal HTTP/1.1 request parsing

use std::io::BufRead;

use crate::http::error::HttpError;

/// A parsed HTTP request line plus the split query string.
/// Headers are consumed but not retained; no route needs them.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
}

impl Request {
    /// Read one request from the connection
    pub fn read_from(reader: &mut impl BufRead) -> Result<Self, HttpError> {
        let mut request_line = String::new();
        reader.read_line(&mut request_line)?;
        if request_line.is_empty() {
            return Err(HttpError::MalformedRequest(
                "connection closed before request line".to_string(),
            ));
        }

        let mut parts = request_line.split_whitespace();
        let method = parts
            .next()
            .ok_or_else(|| HttpError::MalformedRequest("missing method".to_string()))?
            .to_uppercase();
        let target = parts
            .next()
            .ok_or_else(|| HttpError::MalformedRequest("missing request target".to_string()))?;
        parts
            .next()
            .ok_or_else(|| HttpError::MalformedRequest("missing HTTP version".to_string()))?;

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        };

        // Drain headers up to the blank line
        loop {
            let mut line = String::new();
            let read = reader.read_line(&mut line)?;
            if read == 0 || line == "\r\n" || line == "\n" {
                break;
            }
        }

        Ok(Self {
            method,
            path,
            query,
        })
    }

    /// Split the query string into decoded name/value pairs
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let Some(query) = &self.query else {
            return Vec::new();
        };
        query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((name, value)) => (percent_decode(name), percent_decode(value)),
                None => (percent_decode(pair), String::new()),
            })
            .collect()
    }
}

/// Decode %XX escapes and '+' into their byte values
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                decoded.push(hi * 16 + lo);
                i += 3;
                continue;
            }
        }
        decoded.push(if bytes[i] == b'+' { b' ' } else { bytes[i] });
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
