//! WebSocket connection handling, registry, fan-out, and liveness.

pub mod admission;
pub mod broadcast;
pub mod connection;
pub mod liveness;
pub mod registry;
pub mod session;
pub mod upgrade;
