//! palaver-server — the chat server: connection registry, router, command
//! handlers, per-connection workers, and the accept loop.

pub mod commands;
pub mod registry;
pub mod router;
pub mod server;
pub mod worker;

pub use registry::{ConnectionRegistry, Peer, PeerId, RegistryError};
pub use router::{Delivery, Router};
pub use server::ChatServer;
pub use worker::LoginError;
