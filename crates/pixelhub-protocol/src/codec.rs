//! Re-framing of classified inbound messages into outbound wire frames.
//!
//! The codec is a pure function of its input: no I/O, no state across calls,
//! chunk numbering restarts at zero for every message. Pacing between chunk
//! frames is the caller's job; [`Reframed::is_paced`] says when it applies.

use crate::classify::{FIELD_SEPARATOR, Inbound, classify};
use crate::frame::{RawMessage, WireFrame};

/// Default maximum number of fields in one outbound frame.
pub const DEFAULT_MAX_BATCH_FIELDS: usize = 32;

/// Prefix of a small batch frame.
pub const COMPRESSED_PREFIX: &str = "compressed;";
/// Prefix of one chunk of a large batch.
pub const CHUNK_PREFIX: &str = "chunk;";

/// What the codec recognized, with the counts the caller logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageClass {
    /// Full-state transfer, passed through.
    FullState,
    /// Batch of `fields` emitted as one `compressed` frame.
    Compressed {
        /// Number of fields in the batch.
        fields: usize,
    },
    /// Batch of `fields` split into `chunks` frames.
    Chunked {
        /// Number of fields in the batch.
        fields: usize,
        /// Number of chunk frames emitted.
        chunks: usize,
    },
    /// The clear command, passed through.
    Clear,
    /// Anything else, passed through.
    Other,
}

/// Codec output for one inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reframed {
    /// Classification of the inbound message.
    pub class: MessageClass,
    /// Frames to fan out, in order.
    pub frames: Vec<WireFrame>,
}

impl Reframed {
    /// Whether successive frames should be paced apart.
    pub fn is_paced(&self) -> bool {
        matches!(self.class, MessageClass::Chunked { .. })
    }
}

/// Prefix-dispatching codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Codec {
    max_batch_fields: usize,
}

impl Codec {
    /// Create a codec; `max_batch_fields` is clamped to at least 1.
    pub fn new(max_batch_fields: usize) -> Self {
        Self {
            max_batch_fields: max_batch_fields.max(1),
        }
    }

    /// Maximum fields per outbound frame.
    pub fn max_batch_fields(&self) -> usize {
        self.max_batch_fields
    }

    /// Classify and re-frame one inbound message.
    pub fn reframe(&self, raw: &RawMessage) -> Reframed {
        match classify(raw) {
            Inbound::FullState => Reframed {
                class: MessageClass::FullState,
                frames: vec![WireFrame::passthrough(raw)],
            },
            Inbound::Batch(fields) if fields.len() <= self.max_batch_fields => Reframed {
                class: MessageClass::Compressed {
                    fields: fields.len(),
                },
                frames: vec![encode_compressed(&fields)],
            },
            Inbound::Batch(fields) => {
                let frames = encode_chunks(&fields, self.max_batch_fields);
                Reframed {
                    class: MessageClass::Chunked {
                        fields: fields.len(),
                        chunks: frames.len(),
                    },
                    frames,
                }
            }
            Inbound::Clear => Reframed {
                class: MessageClass::Clear,
                frames: vec![WireFrame::passthrough(raw)],
            },
            Inbound::Other => Reframed {
                class: MessageClass::Other,
                frames: vec![WireFrame::passthrough(raw)],
            },
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH_FIELDS)
    }
}

/// `compressed;<N>;<f1>;...;<fN>`
pub fn encode_compressed<F: AsRef<[u8]>>(fields: &[F]) -> WireFrame {
    let mut payload = format!("{COMPRESSED_PREFIX}{};", fields.len()).into_bytes();
    payload.extend_from_slice(&join_fields(fields));
    WireFrame::encoded(payload)
}

/// `chunk;<idx>;<total>;<count>;<fields...>` for each contiguous run of at
/// most `max` fields, in order.
pub fn encode_chunks<F: AsRef<[u8]>>(fields: &[F], max: usize) -> Vec<WireFrame> {
    let max = max.max(1);
    let total = fields.len().div_ceil(max);
    fields
        .chunks(max)
        .enumerate()
        .map(|(index, chunk)| {
            let mut payload =
                format!("{CHUNK_PREFIX}{index};{total};{};", chunk.len()).into_bytes();
            payload.extend_from_slice(&join_fields(chunk));
            WireFrame::encoded(payload)
        })
        .collect()
}

fn join_fields<F: AsRef<[u8]>>(fields: &[F]) -> Vec<u8> {
    let parts: Vec<&[u8]> = fields.iter().map(AsRef::as_ref).collect();
    parts.join(FIELD_SEPARATOR.as_bytes())
}
