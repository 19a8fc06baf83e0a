//! palaver-core — wire format, message model, and the chunked reliable
//! transport. All other Palaver crates depend on this one.

pub mod config;
pub mod message;
pub mod transport;
pub mod wire;

pub use message::{Message, MessageKind};
pub use transport::Inbound;
