//! Builds the outbound `multipart/form-data` body for an event.

use bytes::Bytes;
use bytes::BytesMut;
use serde_json::Value as JsonValue;

/// Builds the body for `POST /events`: a `metadata` JSON part, and an
/// optional `audio` octet-stream part, terminated by the closing boundary.
#[must_use]
pub fn encode(boundary: &str, metadata: &JsonValue, audio: Option<&[u8]>) -> Bytes {
    let mut body = BytesMut::new();

    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"metadata\"\r\n\
             Content-Type: application/json; charset=UTF-8\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("--{boundary}").as_bytes());

    if let Some(audio) = audio {
        body.extend_from_slice(
            format!(
                "\r\n--{boundary}\r\nContent-Disposition: form-data; name=\"audio\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(audio);
    }

    body.extend_from_slice(format!("--{boundary}--").as_bytes());
    body.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_only_body_has_single_part() {
        let metadata = json!({"event": {"header": {"namespace": "System"}}});
        let body = encode("b1", &metadata, None);
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(text.starts_with("--b1\r\nContent-Disposition: form-data; name=\"metadata\""));
        assert!(text.ends_with("--b1--"));
        assert_eq!(text.matches("Content-Disposition").count(), 1);
    }

    #[test]
    fn metadata_with_audio_has_both_parts() {
        let metadata = json!({"event": {}});
        let body = encode("b1", &metadata, Some(&[1, 2, 3, 4]));
        let text = String::from_utf8_lossy(&body);

        assert!(text.contains("name=\"metadata\""));
        assert!(text.contains("name=\"audio\""));
        assert!(text.contains("Content-Type: application/octet-stream"));
        assert!(body.ends_with(b"--b1--"));
    }
}
