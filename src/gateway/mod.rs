//! Gateway orchestration: connection lifecycle and event fanout.

pub mod controller;
pub mod fanout;
pub mod transport;

pub use controller::{ConnectionState, Gateway, GatewaySettings, Session};
pub use fanout::{Delivery, FanoutRouter, FanoutTable, RoomTemplate, Route};
pub use transport::Transport;
