//! Incremental reader for streamable-HTTP response bodies.
//!
//! Tool servers stream their answers as server-sent events whose `data:`
//! payloads wrap JSON-RPC messages. The reader consumes raw byte chunks and
//! yields decoded frames; comment/keepalive lines, event-type lines, and
//! payloads that are not JSON-RPC are dropped.

use tracing::debug;

use crate::jsonrpc::JsonRpcResponse;

/// Accumulates stream bytes and decodes completed events into JSON-RPC
/// frames. A blank line terminates the event being buffered.
#[derive(Default)]
pub struct FrameReader {
    pending: String,
    data_lines: Vec<String>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every frame it completes. Chunks may split
    /// an event anywhere; unfinished lines stay buffered for the next call.
    pub fn feed(&mut self, chunk: &str) -> Vec<JsonRpcResponse> {
        self.pending.push_str(chunk);
        let mut frames = Vec::new();

        while let Some(newline) = self.pending.find('\n') {
            let raw: String = self.pending.drain(..=newline).collect();
            let line = raw.strip_suffix('\n').unwrap_or(&raw);
            let line = line.strip_suffix('\r').unwrap_or(line);

            if line.is_empty() {
                if let Some(frame) = self.finish_event() {
                    frames.push(frame);
                }
            } else if let Some(data) = line.strip_prefix("data:") {
                self.data_lines.push(data.trim_start().to_string());
            }
            // `event:`, `id:`, `retry:` and `:` comment lines carry nothing
            // the protocol needs
        }

        frames
    }

    /// Decode the buffered event, if any, and reset for the next one.
    fn finish_event(&mut self) -> Option<JsonRpcResponse> {
        if self.data_lines.is_empty() {
            return None;
        }
        let payload = self.data_lines.join("\n");
        self.data_lines.clear();

        match serde_json::from_str(&payload) {
            Ok(frame) => Some(frame),
            Err(e) => {
                debug!(error = %e, "Dropping non-JSON-RPC event payload");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_frame_from_single_event() {
        let mut reader = FrameReader::new();
        let frames =
            reader.feed("event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n");
        assert_eq!(frames.len(), 1);
        assert!(frames[0].answers(1));
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut reader = FrameReader::new();
        assert!(reader.feed("data: {\"jsonrpc\":\"2.0\",\"id\":7,").is_empty());
        assert!(reader.feed("\"result\":{\"ok\":true}}\n").is_empty());
        let frames = reader.feed("\n");
        assert_eq!(frames.len(), 1);
        assert!(frames[0].answers(7));
    }

    #[test]
    fn test_multiple_frames_in_one_chunk() {
        let mut reader = FrameReader::new();
        let frames = reader.feed(
            "data: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":1}\n\n\
             data: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":2}\n\n",
        );
        assert_eq!(frames.len(), 2);
        assert!(frames[0].answers(1));
        assert!(frames[1].answers(2));
    }

    #[test]
    fn test_skips_keepalive_and_event_lines() {
        let mut reader = FrameReader::new();
        let frames = reader.feed(
            ": keepalive\n\nevent: message\nid: 4\ndata: {\"jsonrpc\":\"2.0\",\"id\":3,\"result\":{}}\n\n",
        );
        assert_eq!(frames.len(), 1);
        assert!(frames[0].answers(3));
    }

    #[test]
    fn test_non_json_payload_dropped() {
        let mut reader = FrameReader::new();
        let frames = reader.feed("data: still working on it\n\n");
        assert!(frames.is_empty());
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut reader = FrameReader::new();
        let frames =
            reader.feed("data: {\"jsonrpc\":\"2.0\",\"id\":9,\"result\":{}}\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert!(frames[0].answers(9));
    }

    #[test]
    fn test_error_frames_decode_too() {
        let mut reader = FrameReader::new();
        let frames = reader.feed(
            "data: {\"jsonrpc\":\"2.0\",\"id\":5,\"error\":{\"code\":-32000,\"message\":\"boom\"}}\n\n",
        );
        assert_eq!(frames.len(), 1);
        assert!(frames[0].answers(5));
        assert!(frames[0].error.is_some());
    }
}
