//! palaver-client — headless chat client.
//!
//! Drives the protocol side of a chat session: the login handshake, typed
//! send operations, and the inbound event loop. Rendering and input editing
//! are the embedding application's problem; this crate only produces and
//! consumes [`Message`] values.

mod client;
mod compose;

pub use client::{ChatClient, ClientError};
pub use compose::{compose, ComposeError, COMMAND_MARK, WHISPER_SPLIT};

pub use palaver_core::{Message, MessageKind};
