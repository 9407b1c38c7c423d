//! Receiver-side decoding of outbound frames.
//!
//! The hub never decodes what it sends; this module is for receivers (and
//! tests) that need to turn `compressed` and `chunk` frames back into the
//! original field list.

use thiserror::Error;

use crate::classify::FIELD_SEPARATOR;
use crate::codec::{CHUNK_PREFIX, COMPRESSED_PREFIX};

const FULL_STATE_TEXT_PREFIX: &str = "full,";

/// Malformed outbound frame header.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A header field was missing.
    #[error("missing {0} field")]
    MissingField(&'static str),
    /// A header field was not a non-negative integer.
    #[error("invalid {field}: {value:?}")]
    InvalidNumber {
        /// Header field name.
        field: &'static str,
        /// Text that failed to parse.
        value: String,
    },
}

/// One chunk of a large batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Zero-based chunk index.
    pub index: usize,
    /// Total chunks in the sequence.
    pub total: usize,
    /// Declared number of fields in this chunk.
    pub count: usize,
    /// Fields carried by this chunk, in order.
    pub fields: Vec<&'a str>,
}

/// A parsed outbound frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundFrame<'a> {
    /// `full,<payload>`; holds the payload after the prefix.
    FullState(&'a str),
    /// `compressed;<count>;<fields...>`
    Compressed {
        /// Declared field count.
        count: usize,
        /// Fields, in order.
        fields: Vec<&'a str>,
    },
    /// `chunk;<idx>;<total>;<count>;<fields...>`
    Chunk(Chunk<'a>),
    /// Anything else, forwarded verbatim by the hub.
    Other(&'a str),
}

impl<'a> OutboundFrame<'a> {
    /// Parse one outbound text frame.
    pub fn parse(text: &'a str) -> Result<Self, DecodeError> {
        if let Some(payload) = text.strip_prefix(FULL_STATE_TEXT_PREFIX) {
            return Ok(Self::FullState(payload));
        }
        if let Some(rest) = text.strip_prefix(COMPRESSED_PREFIX) {
            let mut parts = rest.splitn(2, FIELD_SEPARATOR);
            let count = parse_number(parts.next(), "count")?;
            let body = parts.next().ok_or(DecodeError::MissingField("fields"))?;
            return Ok(Self::Compressed {
                count,
                fields: body.split(FIELD_SEPARATOR).collect(),
            });
        }
        if let Some(rest) = text.strip_prefix(CHUNK_PREFIX) {
            let mut parts = rest.splitn(4, FIELD_SEPARATOR);
            let index = parse_number(parts.next(), "index")?;
            let total = parse_number(parts.next(), "total")?;
            let count = parse_number(parts.next(), "count")?;
            let body = parts.next().ok_or(DecodeError::MissingField("fields"))?;
            return Ok(Self::Chunk(Chunk {
                index,
                total,
                count,
                fields: body.split(FIELD_SEPARATOR).collect(),
            }));
        }
        Ok(Self::Other(text))
    }
}

fn parse_number(part: Option<&str>, field: &'static str) -> Result<usize, DecodeError> {
    let part = part.ok_or(DecodeError::MissingField(field))?;
    part.parse().map_err(|_| DecodeError::InvalidNumber {
        field,
        value: part.to_owned(),
    })
}

struct Sequence {
    total: usize,
    parts: Vec<Option<Vec<String>>>,
    received: usize,
}

/// Reassembles chunk sequences into the original field list.
///
/// A chunk with index 0 starts a new sequence. A chunk whose `total`
/// disagrees with the sequence in progress discards it and starts over.
/// Chunks with `index >= total` are ignored.
#[derive(Default)]
pub struct ChunkAssembler {
    current: Option<Sequence>,
}

impl ChunkAssembler {
    /// Create an empty assembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a sequence is partially received.
    pub fn in_progress(&self) -> bool {
        self.current.is_some()
    }

    /// Feed one chunk; returns the full field list once every chunk of the
    /// sequence has arrived.
    pub fn push(&mut self, chunk: &Chunk<'_>) -> Option<Vec<String>> {
        if chunk.total == 0 || chunk.index >= chunk.total {
            return None;
        }
        let restart = match &self.current {
            None => true,
            Some(seq) => chunk.index == 0 || seq.total != chunk.total,
        };
        if restart {
            self.current = Some(Sequence {
                total: chunk.total,
                parts: vec![None; chunk.total],
                received: 0,
            });
        }
        let seq = self.current.as_mut()?;
        let slot = &mut seq.parts[chunk.index];
        if slot.is_none() {
            seq.received += 1;
        }
        *slot = Some(chunk.fields.iter().map(|f| (*f).to_owned()).collect());

        if seq.received < seq.total {
            return None;
        }
        let done = self.current.take()?;
        Some(done.parts.into_iter().flatten().flatten().collect())
    }
}
