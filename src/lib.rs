//! Client SDK for the GridLink microgrid operations API.
//!
//! The crate is organized by transport surface:
//! - `api`: REST executor with per-attempt timeouts and bounded retries.
//! - `stream`: persistent websocket connection, envelope decoding, and
//!   reconnect handling.
//! - `bus`: typed publish/subscribe registry fanning out data and status
//!   events.
//! - `watch`: per-resource watchers reconciling polled snapshots with
//!   pushed deltas.
//! - `client`: the constructed client instance and its lifecycle.

/// REST executor and request/response types.
pub mod api;
/// Typed publish/subscribe registry.
pub mod bus;
/// Client construction and lifecycle.
pub mod client;
/// Configuration and environment loading.
pub mod config;
/// Event vocabulary shared across the client.
pub mod events;
/// Retry and backoff helpers used across the SDK.
pub mod retry;
/// Connection health bookkeeping.
pub mod status;
/// Realtime stream client and protocol types.
pub mod stream;
/// Resource watchers combining fetch, poll, and push.
pub mod watch;
