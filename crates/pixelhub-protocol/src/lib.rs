//! # pixelhub-protocol
//!
//! The hub's lightweight text protocol for pixel updates.
//!
//! Inbound messages are classified by literal prefix and re-framed into
//! outbound frames:
//!
//! | Inbound | Outbound |
//! |---------|----------|
//! | `full,<payload>` | unchanged |
//! | `batch;<f1>;<f2>;...` (N <= max) | `compressed;<N>;<f1>;<f2>;...` |
//! | `batch;<f1>;<f2>;...` (N > max) | `chunk;<idx>;<total>;<count>;<f...>` per chunk |
//! | anything else (including `clear`) | unchanged |
//!
//! Fields are opaque: the codec only counts and re-partitions the
//! `;`-separated list, it never parses `x,y,color`.
//!
//! - [`frame`]: raw inbound messages and outbound wire frames
//! - [`classify`]: prefix classification into [`Inbound`] variants
//! - [`codec`]: the pure [`Codec`] producing wire frames
//! - [`decode`]: receiver-side parsing of outbound frames and chunk reassembly

#![deny(unsafe_code)]

pub mod classify;
pub mod codec;
pub mod decode;
pub mod frame;

pub use classify::{Inbound, classify};
pub use codec::{Codec, DEFAULT_MAX_BATCH_FIELDS, MessageClass, Reframed};
pub use decode::{Chunk, ChunkAssembler, DecodeError, OutboundFrame};
pub use frame::{FrameKind, RawMessage, WireFrame};
