//! WebSocket layer: upgrade handling, per-connection loop, rooms.
//!
//! The WebSocket endpoint at `/ws` authenticates each connection, then
//! pushes fanned-out events and accepts room commands.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod rooms;
pub mod transport;
