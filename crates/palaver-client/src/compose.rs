//! Raw input → [`Message`] composition rules.
//!
//! One line of input means one of three things:
//!
//! ```text
//! [message]              broadcast to all connected users
//! [name]::[message]      whisper to [name]
//! /[command]             ask the server to run a command
//! ```

use palaver_core::wire::USERNAME_MAX;
use palaver_core::Message;

/// Separates a whisper target from its text.
pub const WHISPER_SPLIT: &str = "::";

/// Marks a line as a server command.
pub const COMMAND_MARK: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComposeError {
    #[error("\"{0}\" is too long to be a whisper target")]
    WhisperTargetTooLong(String),
}

/// Turn one line of user input into the message it means.
///
/// The whisper split is checked before the command mark, so a line like
/// `/x::hi` whispers to the user named `/x`.
pub fn compose(raw: &str, username: &str) -> Result<Message, ComposeError> {
    if let Some((target, text)) = raw.split_once(WHISPER_SPLIT) {
        if target.len() >= USERNAME_MAX {
            return Err(ComposeError::WhisperTargetTooLong(target.to_owned()));
        }
        Ok(Message::whisper(username, target, text))
    } else if let Some(line) = raw.strip_prefix(COMMAND_MARK) {
        Ok(Message::command(username, line))
    } else {
        Ok(Message::broadcast(username, raw))
    }
}
