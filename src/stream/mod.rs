//! Realtime stream modules.
//!
//! - `client`: websocket transport, envelope dispatch, and reconnect
//!   handling.
//! - `proto`: wire envelope and payload messages shared with the stream
//!   service.

/// Connection manager for the persistent stream.
pub mod client;
/// Stream wire messages.
pub mod proto;
