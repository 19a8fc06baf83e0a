//! Server commands — named handlers a client can invoke with a Command
//! message. Handlers are looked up by name in a [`CommandSet`] and produce
//! either a reply body or a typed failure.

use std::collections::HashMap;

use crate::registry::ConnectionRegistry;

/// One invocable server command.
///
/// Intentionally minimal: a name and an execute capability. Handlers read
/// the registry but never hold its lock across anything slow, and they never
/// touch sockets — replies travel back through the router.
pub trait Command: Send + Sync {
    /// The name clients invoke this command by.
    fn name(&self) -> &'static str;

    /// Run the command. `args` is everything after the command name.
    fn execute(&self, args: &str, registry: &ConnectionRegistry) -> Result<String, CommandError>;
}

#[derive(Debug, thiserror::Error)]
#[error("command failed: {0}")]
pub struct CommandError(pub String);

/// Registry of command handlers keyed by name.
pub struct CommandSet {
    handlers: HashMap<&'static str, Box<dyn Command>>,
}

impl CommandSet {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// The built-in command set every server starts with.
    pub fn with_builtins() -> Self {
        let mut set = Self::new();
        set.register(Box::new(Who));
        set
    }

    pub fn register(&mut self, command: Box<dyn Command>) {
        self.handlers.insert(command.name(), command);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.handlers.get(name).map(|c| c.as_ref())
    }
}

impl Default for CommandSet {
    fn default() -> Self {
        Self::with_builtins()
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Lists all users on the server.
pub struct Who;

impl Command for Who {
    fn name(&self) -> &'static str {
        "who"
    }

    fn execute(&self, _args: &str, registry: &ConnectionRegistry) -> Result<String, CommandError> {
        let mut names = registry.usernames();
        if names.is_empty() {
            // The requester is supposed to be registered; an empty table
            // means the command ran outside any live session.
            return Err(CommandError("nobody is connected".to_owned()));
        }
        names.sort();
        Ok(format!("All users: {}", names.join(", ")))
    }
}
