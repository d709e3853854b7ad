//! Parses AVS's `multipart/form-data` responses and downchannel frames.

use bytes::Bytes;
use serde_json::Value as JsonValue;

use super::Message;
use crate::error::MultipartError;

/// Extracts the boundary token from a `Content-Type` header value, e.g.
/// `multipart/form-data; boundary=this-is-my-boundary`.
pub fn extract_boundary(content_type: &str) -> Result<String, MultipartError> {
    let start = content_type
        .find("boundary=")
        .ok_or(MultipartError::MissingBoundary)?
        + "boundary=".len();
    let rest = &content_type[start..];
    let end = rest.find(';').unwrap_or(rest.len());
    Ok(rest[..end].trim().trim_matches('"').to_string())
}

/// Splits a complete multipart body into its raw parts, dropping the
/// boundary markers and the empty fragments they leave behind.
fn split_message<'a>(data: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let marker = format!("--{boundary}");
    let marker = marker.as_bytes();

    let mut parts = Vec::new();
    let mut rest = data;
    loop {
        match find_subslice(rest, marker) {
            Some(idx) => {
                let (part, tail) = rest.split_at(idx);
                parts.push(part);
                rest = &tail[marker.len()..];
            }
            None => {
                parts.push(rest);
                break;
            }
        }
    }

    parts
        .into_iter()
        .filter(|p| !matches!(*p, b"" | b"--" | b"--\r\n" | b"\r\n" | b"\r\n--"))
        .collect()
}

/// Parses a complete multipart body (one event response, or one downchannel
/// frame) into its JSON and binary parts.
pub fn decode(data: &[u8], boundary: &str) -> Result<Message, MultipartError> {
    let mut message = Message::default();

    for part in split_message(data, boundary) {
        let blank_line = find_subslice(part, b"\r\n\r\n").ok_or_else(|| {
            MultipartError::MalformedPart("no blank line separating header and content".into())
        })?;

        let header = trim_ascii(&part[..blank_line]);
        let content = trim_ascii(&part[blank_line + 4..]);

        let content_type = extract_content_type(header)?;

        match content_type.as_str() {
            "application/json; charset=UTF-8" | "application/json" => {
                let value: JsonValue = serde_json::from_slice(content)?;
                message.content.push(value);
            }
            "application/octet-stream" => {
                message.attachment.push(Bytes::copy_from_slice(content));
            }
            other => {
                return Err(MultipartError::MalformedPart(format!(
                    "unrecognized Content-Type: {other}"
                )))
            }
        }
    }

    Ok(message)
}

fn extract_content_type(header: &[u8]) -> Result<String, MultipartError> {
    const PREFIX: &[u8] = b"Content-Type: ";
    let start = find_subslice(header, PREFIX).ok_or(MultipartError::MissingContentType)? + PREFIX.len();
    let rest = &header[start..];
    let end = find_subslice(rest, b"\r\n").unwrap_or(rest.len());
    Ok(String::from_utf8_lossy(&rest[..end]).into_owned())
}

fn trim_ascii(data: &[u8]) -> &[u8] {
    let start = data.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(data.len());
    let end = data.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &data[start..end]
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Scans a downchannel buffer for a complete frame terminated by the
/// boundary marker `--boundary`.
///
/// Buffers everything, finds the next `--boundary` occurrence, and trims
/// only the frame's trailing `\r\n` (the required blank line before the
/// boundary) — nothing more. A scheme that blindly trimmed a fixed byte
/// count off the frame end to eat trailing padding would corrupt any frame
/// whose content doesn't happen to end with exactly that much padding, so
/// this only ever trims the CRLF it can see.
///
/// Returns `(frame_end, remainder_start)`: bytes `[0, frame_end)` are one
/// complete frame ready to parse, and the caller should retain
/// `data[remainder_start..]` as the buffer for the next call. Returns `None`
/// if no complete frame is available yet.
#[must_use]
pub fn find_frame(data: &[u8], boundary: &str) -> Option<(usize, usize)> {
    let marker = format!("--{boundary}");
    let idx = find_subslice(data, marker.as_bytes())?;
    let frame_end = if idx >= 2 && &data[idx - 2..idx] == b"\r\n" {
        idx - 2
    } else {
        idx
    };
    let remainder_start = idx + marker.len();
    Some((frame_end, remainder_start))
}
