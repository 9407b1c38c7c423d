//! # pixelhub-core
//!
//! Foundation types shared by every pixelhub crate:
//!
//! - **Connection IDs**: [`ConnectionId`] newtype, UUID v7 backed
//! - **Errors**: [`ConnError`] for per-connection transport failures,
//!   [`HubError`] for process-level failures
//! - **Logging**: [`logging::init_subscriber`] for the global `tracing` subscriber

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;

pub use errors::{ConnError, HubError};
pub use ids::ConnectionId;
