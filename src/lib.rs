//! syncboard — real-time collaborative whiteboard server.
//!
//! Live shape synchronization over WebSockets with last-write-wins merging,
//! room-scoped fan-out, and debounced whole-record persistence. Library
//! form exists so integration tests can assemble the router against mock
//! collaborators; the binary in `main.rs` wires the real ones.

pub mod db;
pub mod protocol;
pub mod routes;
pub mod services;
pub mod shape;
pub mod state;
pub mod store;
