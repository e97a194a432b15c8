// Copyright (C) 2025 Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

/// JSON response framing for HEOS replies
///
/// Responses are bare JSON documents with no length prefix, and a single read
/// may return part of one document or more than one. Framing therefore works on
/// an accumulating buffer: find where the first complete document ends, decode
/// it, and leave any remaining bytes for the next exchange.
use crate::error::{HeosError, Result};
use crate::message::Reply;
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::debug;

/// Find the end of the first complete JSON document in `data`.
///
/// Returns `Ok(None)` when more bytes are needed.
fn find_document_end(data: &[u8]) -> Result<Option<usize>> {
    let mut documents = serde_json::Deserializer::from_slice(data).into_iter::<IgnoredAny>();

    match documents.next() {
        None => Ok(None),
        Some(Ok(_)) => Ok(Some(documents.byte_offset())),
        Some(Err(e)) if e.is_eof() => Ok(None),
        Some(Err(e)) => Err(HeosError::codec_with_preview(e.to_string(), data)),
    }
}

fn decode_document<T: DeserializeOwned>(document: &[u8]) -> Result<Reply<T>> {
    serde_json::from_slice(document)
        .map_err(|e| HeosError::codec_with_preview(e.to_string(), document))
}

/// Take the reply to `command_path` off the front of `buffer`.
///
/// Complete documents acknowledging some other command are consumed and
/// skipped, as are interim "command under process" acknowledgements. Returns
/// `Ok(None)` when the buffer holds no complete matching document yet.
///
/// Malformed input is consumed before the error is returned, so the buffer
/// never keeps bytes that can not be framed.
pub(crate) fn next_reply<T: DeserializeOwned>(
    buffer: &mut Vec<u8>,
    command_path: &str,
) -> Result<Option<Reply<T>>> {
    loop {
        let end = match find_document_end(buffer) {
            Ok(Some(end)) => end,
            Ok(None) => return Ok(None),
            Err(e) => {
                buffer.clear();
                return Err(e);
            }
        };

        let envelope = decode_document::<IgnoredAny>(&buffer[..end]);
        let envelope = match envelope {
            Ok(envelope) => envelope,
            Err(e) => {
                buffer.drain(..end);
                return Err(e);
            }
        };

        if !envelope.heos.command.eq_ignore_ascii_case(command_path) {
            debug!(
                command = %envelope.heos.command,
                expected = %command_path,
                "skipping response for another command"
            );
            buffer.drain(..end);
            continue;
        }
        if envelope.heos.is_under_process() {
            debug!(command = %command_path, "command under process; awaiting final response");
            buffer.drain(..end);
            continue;
        }

        let reply = decode_document(&buffer[..end]);
        buffer.drain(..end);
        return reply.map(Some);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    const HEARTBEAT: &str = r#"{"heos": {"command": "system/heart_beat", "result": "success", "message": ""}}"#;

    #[test]
    fn test_decode_complete_response() {
        let mut buffer = HEARTBEAT.as_bytes().to_vec();

        let reply = next_reply::<IgnoredAny>(&mut buffer, "system/heart_beat")
            .expect("decoding failed")
            .expect("response should be complete");

        assert_eq!(reply.heos.command, "system/heart_beat");
        assert!(reply.heos.is_success());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_incomplete_response_waits_for_more() {
        let (head, tail) = HEARTBEAT.split_at(30);
        let mut buffer = head.as_bytes().to_vec();

        let partial = next_reply::<IgnoredAny>(&mut buffer, "system/heart_beat").expect("decoding failed");
        assert!(partial.is_none());
        assert_eq!(buffer.len(), 30, "partial bytes must be retained");

        buffer.extend_from_slice(tail.as_bytes());
        let reply = next_reply::<IgnoredAny>(&mut buffer, "system/heart_beat").expect("decoding failed");
        assert!(reply.is_some());
    }

    #[test]
    fn test_whitespace_only_needs_more() {
        let mut buffer = b" \r\n".to_vec();
        let reply = next_reply::<IgnoredAny>(&mut buffer, "system/heart_beat").expect("decoding failed");
        assert!(reply.is_none());
    }

    #[test]
    fn test_trailing_bytes_stay_buffered() {
        let mut buffer = format!("{HEARTBEAT}\r\n{HEARTBEAT}").into_bytes();

        let first = next_reply::<IgnoredAny>(&mut buffer, "system/heart_beat").expect("decoding failed");
        assert!(first.is_some());
        assert!(buffer.starts_with(b"\r\n{"));

        let second = next_reply::<IgnoredAny>(&mut buffer, "system/heart_beat").expect("decoding failed");
        assert!(second.is_some());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_skips_stale_and_unsolicited_documents() {
        let stale = r#"{"heos": {"command": "player/get_volume", "result": "success", "message": "pid=1&level=10"}}"#;
        let event = r#"{"heos": {"command": "event/players_changed", "message": ""}}"#;
        let mut buffer = format!("{stale}\r\n{event}\r\n{HEARTBEAT}").into_bytes();

        let reply = next_reply::<IgnoredAny>(&mut buffer, "system/heart_beat")
            .expect("decoding failed")
            .expect("heartbeat should be found");
        assert_eq!(reply.heos.command, "system/heart_beat");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_skips_command_under_process() {
        let interim = r#"{"heos": {"command": "browse/browse", "result": "success", "message": "command under process&sid=1"}}"#;
        let done = r#"{"heos": {"command": "browse/browse", "result": "success", "message": "sid=1"}, "payload": [1, 2]}"#;
        let mut buffer = format!("{interim}{done}").into_bytes();

        let reply = next_reply::<Vec<u32>>(&mut buffer, "browse/browse")
            .expect("decoding failed")
            .expect("final response should be found");
        assert_eq!(reply.payload, Some(vec![1, 2]));
    }

    #[test]
    fn test_payload_shape_mismatch_is_codec_error() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Volume {
            level: u8,
        }

        let body = r#"{"heos": {"command": "player/get_volume", "result": "success", "message": ""}, "payload": "loud"}"#;
        let mut buffer = body.as_bytes().to_vec();

        match next_reply::<Volume>(&mut buffer, "player/get_volume") {
            Err(HeosError::Codec { buffer_preview, .. }) => assert!(buffer_preview.is_some()),
            other => panic!("Expected Codec error, got: {:?}", other),
        }
        assert!(buffer.is_empty(), "bad document must be consumed");
    }

    #[test]
    fn test_invalid_json_clears_buffer() {
        let mut buffer = b"not json at all".to_vec();

        match next_reply::<IgnoredAny>(&mut buffer, "system/heart_beat") {
            Err(HeosError::Codec { .. }) => {}
            other => panic!("Expected Codec error, got: {:?}", other),
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_missing_envelope_is_codec_error() {
        let mut buffer = br#"{"payload": []}"#.to_vec();

        match next_reply::<IgnoredAny>(&mut buffer, "system/heart_beat") {
            Err(HeosError::Codec { message, .. }) => assert!(message.contains("heos")),
            other => panic!("Expected Codec error, got: {:?}", other),
        }
    }
}
