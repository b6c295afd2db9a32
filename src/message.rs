//! Normalized message model built from parsed mail

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use mail_parser::{Addr, MimeHeaders};
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

/// A single mailbox entry: optional display name plus bare address
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Address {
    fn from_addr(addr: &Addr<'_>) -> Self {
        Self {
            name: addr.name().map(str::to_string),
            address: addr.address().map(str::to_string),
        }
    }

    /// Placeholder used when a message carries no usable sender
    pub fn empty_sender() -> Self {
        Self {
            name: Some("Empty sender".to_string()),
            address: None,
        }
    }
}

/// A decoded attachment
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub content_type: String,
    /// Content-Transfer-Encoding of the source MIME part
    pub encoding: String,
    /// Decoded content bytes, base64 in JSON
    #[serde(serialize_with = "serialize_bytes_base64")]
    pub content: Vec<u8>,
}

/// A normalized, immutable snapshot of one received e-mail.
///
/// Fully formed at construction time. `from` is always present, synthesized
/// if the source supplied no sender. `to`/`cc` are either absent or
/// non-empty, with address groups flattened into one ordered sequence.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    /// Header name/value pairs in the order they appeared in the message
    #[serde(serialize_with = "serialize_headers")]
    pub headers: Vec<(String, String)>,
    pub from: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Vec<Address>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc: Option<Vec<Address>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// HTML body, serialized as the JSON literal `false` when absent
    #[serde(serialize_with = "serialize_html")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<AttachmentData>>,
}

impl Message {
    /// Build a normalized message from the mail parser's output.
    ///
    /// The transport message-id arrives already de-angle-bracketed; the
    /// message type comes from the custom `x-message-type` header.
    pub fn from_parsed(parsed: &mail_parser::Message<'_>) -> Self {
        let message_id = parsed.message_id().map(str::to_string);
        let message_type = parsed
            .headers()
            .iter()
            .find(|header| header.name().eq_ignore_ascii_case("x-message-type"))
            .and_then(|header| header.value().as_text())
            .map(str::to_string);

        let from = parsed
            .from()
            .and_then(|address| address.first())
            .map(Address::from_addr)
            .unwrap_or_else(Address::empty_sender);

        let to = parsed.to().map(flatten_addresses).filter(|v| !v.is_empty());
        let cc = parsed.cc().map(flatten_addresses).filter(|v| !v.is_empty());

        let subject = parsed.subject().map(str::to_string);
        let text = if parsed.text_body.is_empty() {
            None
        } else {
            parsed.body_text(0).map(|body| body.into_owned())
        };
        let html = if parsed.html_body.is_empty() {
            None
        } else {
            parsed.body_html(0).map(|body| body.into_owned())
        };

        Self {
            message_id,
            message_type,
            headers: raw_headers(parsed),
            from,
            to,
            cc,
            subject,
            html,
            text,
            attachments: collect_attachments(parsed),
        }
    }
}

/// Flatten single-group and multi-group recipient shapes into one ordered list
fn flatten_addresses(address: &mail_parser::Address<'_>) -> Vec<Address> {
    address.iter().map(Address::from_addr).collect()
}

/// Collect header name/value pairs as they appeared on the wire
fn raw_headers(parsed: &mail_parser::Message<'_>) -> Vec<(String, String)> {
    let raw = parsed.raw_message();
    parsed
        .headers()
        .iter()
        .map(|header| {
            let name = raw
                .get(header.offset_field as usize..(header.offset_start as usize).saturating_sub(1))
                .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| header.name().to_string());
            let value = raw
                .get(header.offset_start as usize..header.offset_end as usize)
                .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
                .unwrap_or_default();
            (name, value)
        })
        .collect()
}

fn collect_attachments(parsed: &mail_parser::Message<'_>) -> Option<Vec<AttachmentData>> {
    let attachments: Vec<AttachmentData> = parsed
        .attachments
        .iter()
        .filter_map(|part_id| parsed.parts.get(*part_id as usize))
        .map(|part| AttachmentData {
            filename: part.attachment_name().map(str::to_string),
            content_type: part
                .content_type()
                .map(|ct| match ct.subtype() {
                    Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
                    None => ct.ctype().to_string(),
                })
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            encoding: part
                .content_transfer_encoding()
                .unwrap_or("7bit")
                .to_string(),
            content: part.contents().to_vec(),
        })
        .collect();

    if attachments.is_empty() {
        None
    } else {
        Some(attachments)
    }
}

fn serialize_html<S: Serializer>(html: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    match html {
        Some(body) => serializer.serialize_str(body),
        None => serializer.serialize_bool(false),
    }
}

fn serialize_headers<S: Serializer>(
    headers: &Vec<(String, String)>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(headers.len()))?;
    for (name, value) in headers {
        map.serialize_entry(name, value)?;
    }
    map.end()
}

fn serialize_bytes_base64<S: Serializer>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&BASE64.encode(bytes))
}
