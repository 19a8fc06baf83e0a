//! Routing — turns one inbound message into zero or more deliveries.
//!
//! The router owns no sockets and no per-connection state; it reads the
//! registry under its lock, consults the command set, and hands each decided
//! delivery to the recipient worker's outbound queue. Multiple workers call
//! it concurrently.

use std::sync::Arc;

use palaver_core::{Message, MessageKind};

use crate::commands::CommandSet;
use crate::registry::{ConnectionRegistry, Peer};

/// One decided delivery: this message goes to this peer.
#[derive(Debug)]
pub struct Delivery {
    pub to: Peer,
    pub message: Message,
}

pub struct Router {
    registry: Arc<ConnectionRegistry>,
    commands: CommandSet,
}

impl Router {
    pub fn new(registry: Arc<ConnectionRegistry>, commands: CommandSet) -> Self {
        Self { registry, commands }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Decide where `message` goes. `origin` is the connection that
    /// submitted it, or `None` for server-originated traffic.
    ///
    /// Never fails: anything wrong with the message becomes an error reply
    /// routed back to the origin, or a dropped-and-logged event when there
    /// is no origin to answer.
    pub fn route(&self, message: Message, origin: Option<&Peer>) -> Vec<Delivery> {
        match message.kind {
            MessageKind::Broadcast | MessageKind::Announce => {
                // Everyone except the origin, excluded by identity — a
                // server announcement (no origin) reaches every peer even
                // though its sender name is empty.
                if let Some(origin) = origin {
                    tracing::info!(sender = %origin.username, "user is broadcasting");
                } else {
                    tracing::info!("server is broadcasting");
                }
                self.registry
                    .snapshot()
                    .into_iter()
                    .filter(|peer| origin.map_or(true, |o| o.id != peer.id))
                    .map(|to| Delivery {
                        to,
                        message: message.clone(),
                    })
                    .collect()
            }

            MessageKind::Whisper => match self.registry.find(&message.receiver) {
                Some(to) => {
                    tracing::info!(
                        sender = %message.sender,
                        receiver = %to.username,
                        "user is whispering"
                    );
                    vec![Delivery { to, message }]
                }
                None => {
                    tracing::info!(
                        sender = %message.sender,
                        receiver = %message.receiver,
                        "whisper target not found"
                    );
                    self.reply(
                        origin,
                        Message::user_error("Could not find a user with that name."),
                    )
                }
            },

            MessageKind::Command => self.run_command(&message, origin),

            other => {
                tracing::warn!(kind = ?other, sender = %message.sender, "unroutable message type");
                self.reply(origin, Message::user_error("Invalid message type."))
            }
        }
    }

    /// Route and enqueue. Delivery failures mean the recipient's worker is
    /// already tearing down; its own teardown handles the announcement.
    pub fn dispatch(&self, message: Message, origin: Option<&Peer>) {
        for delivery in self.route(message, origin) {
            if delivery.to.deliver(delivery.message).is_err() {
                tracing::debug!(peer = %delivery.to.username, "dropping delivery to departing peer");
            }
        }
    }

    fn run_command(&self, message: &Message, origin: Option<&Peer>) -> Vec<Delivery> {
        let body = message.body_text();
        let line = body.trim();
        let (name, args) = match line.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (line, ""),
        };

        tracing::info!(sender = %message.sender, command = %name, "user is running a command");

        let reply = match self.commands.get(name) {
            Some(command) => match command.execute(args, &self.registry) {
                Ok(text) => Message::response(&text),
                Err(e) => {
                    tracing::warn!(command = %name, error = %e, "command failed");
                    Message::server_error("Something went wrong running the command.")
                }
            },
            None => Message::user_error(&format!("Could not find the command \"{name}\".")),
        };

        self.reply(origin, reply)
    }

    /// Address a server reply back to the origin, or drop it with a log
    /// line when the origin is already gone.
    fn reply(&self, origin: Option<&Peer>, reply: Message) -> Vec<Delivery> {
        match origin {
            Some(origin) => vec![Delivery {
                to: origin.clone(),
                message: reply.addressed_to(&origin.username),
            }],
            None => {
                tracing::warn!(kind = ?reply.kind, "reply has no origin to return to, dropping");
                Vec::new()
            }
        }
    }
}
