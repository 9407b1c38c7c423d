//! Raw inbound messages and outbound wire frames.

use bytes::Bytes;

/// WebSocket data frame kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// UTF-8 text frame.
    Text,
    /// Binary frame.
    Binary,
}

/// One message as received from a connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMessage {
    /// Frame kind it arrived with.
    pub kind: FrameKind,
    /// Message bytes.
    pub payload: Bytes,
}

impl RawMessage {
    /// A text message.
    pub fn text(payload: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Text,
            payload: Bytes::from(payload.into()),
        }
    }

    /// A binary message.
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self {
            kind: FrameKind::Binary,
            payload: payload.into(),
        }
    }

    /// The payload as UTF-8, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// One frame to be written verbatim to every registry member.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireFrame {
    /// Frame kind to write with.
    pub kind: FrameKind,
    /// Frame bytes.
    pub payload: Bytes,
}

impl WireFrame {
    /// A frame built by the codec: text when the bytes are UTF-8, binary
    /// otherwise.
    pub fn encoded(payload: Vec<u8>) -> Self {
        let kind = if std::str::from_utf8(&payload).is_ok() {
            FrameKind::Text
        } else {
            FrameKind::Binary
        };
        Self {
            kind,
            payload: Bytes::from(payload),
        }
    }

    /// Re-emit a raw message unchanged, keeping its frame kind.
    pub fn passthrough(raw: &RawMessage) -> Self {
        Self {
            kind: raw.kind,
            payload: raw.payload.clone(),
        }
    }

    /// The payload as UTF-8, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}
