//! HTTP response formatting

use serde::Serialize;

/// An HTTP response ready to be written to the wire
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    body: Vec<u8>,
    content_type: Option<&'static str>,
}

impl HttpResponse {
    /// 200 with a JSON body
    pub fn ok_json(value: &impl Serialize) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status: 200,
                body,
                content_type: Some("application/json"),
            },
            Err(_) => Self::internal_error(),
        }
    }

    /// 200 with no body (liveness probe)
    pub fn empty_ok() -> Self {
        Self {
            status: 200,
            body: Vec::new(),
            content_type: None,
        }
    }

    /// 204 with no body
    pub fn no_content() -> Self {
        Self {
            status: 204,
            body: Vec::new(),
            content_type: None,
        }
    }

    /// 400 with a JSON error body
    pub fn bad_request(message: &str) -> Self {
        let body = serde_json::json!({ "error": message });
        Self {
            status: 400,
            body: body.to_string().into_bytes(),
            content_type: Some("application/json"),
        }
    }

    /// 404 for unknown paths
    pub fn not_found() -> Self {
        Self {
            status: 404,
            body: Vec::new(),
            content_type: None,
        }
    }

    /// 405 for known paths with the wrong method
    pub fn method_not_allowed() -> Self {
        Self {
            status: 405,
            body: Vec::new(),
            content_type: None,
        }
    }

    /// 500 fallback
    pub fn internal_error() -> Self {
        Self {
            status: 500,
            body: Vec::new(),
            content_type: None,
        }
    }

    /// Format the response for sending over the wire
    pub fn format(&self) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\n",
            self.status,
            reason_phrase(self.status)
        );
        if let Some(content_type) = self.content_type {
            head.push_str(&format!("Content-Type: {content_type}\r\n"));
        }
        // 204 carries neither a body nor a Content-Length
        if self.status != 204 {
            head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        }
        head.push_str("Connection: close\r\n\r\n");

        let mut wire = head.into_bytes();
        wire.extend_from_slice(&self.body);
        wire
    }

    /// The response body (JSON for 200/400 responses)
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _ => "Internal Server Error",
    }
}
