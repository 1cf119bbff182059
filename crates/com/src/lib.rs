pub mod client;
pub mod control;
pub mod error;
pub mod listener;
pub mod registry;

pub use client::WsClient;
pub use control::ControlServer;
pub use error::ComError;
pub use listener::{Incoming, WsListener, WsSink};
pub use registry::{BroadcastReport, ViewerId, ViewerRegistry};

/// Default cap on a single WebSocket message (50 MiB).
pub const MAX_MESSAGE_SIZE: usize = 50 * 1024 * 1024;
