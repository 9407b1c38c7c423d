//! Prefix classification of inbound messages.
//!
//! First match wins, always on the raw bytes so binary frames classify the
//! same as text:
//! 1. `full,` (exact, case-sensitive) → [`Inbound::FullState`]
//! 2. `batch;` → [`Inbound::Batch`] with the `;`-split field list
//! 3. `clear` after trimming ASCII whitespace → [`Inbound::Clear`]
//! 4. anything else → [`Inbound::Other`]
//!
//! No field is validated. `batch;` alone yields a single empty field.

use crate::frame::RawMessage;

/// Prefix of a full-state transfer.
pub const FULL_STATE_PREFIX: &[u8] = b"full,";
/// Prefix of a batched update.
pub const BATCH_PREFIX: &[u8] = b"batch;";
/// Separator between batch fields.
pub const FIELD_SEPARATOR: &str = ";";
/// Canvas clear command (recognized for logging only).
pub const CLEAR_COMMAND: &str = "clear";

const SEPARATOR_BYTE: u8 = FIELD_SEPARATOR.as_bytes()[0];

/// Classified inbound message, borrowing from the raw payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// Full-state transfer, forwarded untouched.
    FullState,
    /// Batched pixel updates, in original order. Fields are opaque bytes.
    Batch(Vec<&'a [u8]>),
    /// The clear command.
    Clear,
    /// Unrecognized; forwarded untouched.
    Other,
}

/// Classify a raw message by its prefix.
pub fn classify(raw: &RawMessage) -> Inbound<'_> {
    let payload = &raw.payload[..];
    if payload.starts_with(FULL_STATE_PREFIX) {
        return Inbound::FullState;
    }
    if let Some(rest) = payload.strip_prefix(BATCH_PREFIX) {
        return Inbound::Batch(rest.split(|b| *b == SEPARATOR_BYTE).collect());
    }
    if payload.trim_ascii() == CLEAR_COMMAND.as_bytes() {
        return Inbound::Clear;
    }
    Inbound::Other
}
