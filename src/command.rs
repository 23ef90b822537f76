//! Command messages sent from the control surface to one tab's page agent.
//!
//! This module owns the wire representation of the tab channel. Payloads are
//! JSON text tagged by a `type` field. Delivery is best-effort and
//! unacknowledged; commands exist for immediate visual feedback, while the
//! store change feed remains the source of truth.

#[cfg(test)]
#[path = "command_test.rs"]
mod command_test;

use serde::{Deserialize, Serialize};

use crate::settings::Settings;

/// Error converting a command to or from its wire text.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The payload is not valid JSON, carries an unknown `type` tag, or does
    /// not match the tagged variant's shape.
    #[error("bad command payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// A command for a page agent.
///
/// The variant tag is the wire `type` field: `"toggle"` or
/// `"update_settings"`. Any other tag fails decoding; agents drop such
/// payloads after logging.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Recompute display state now, using the sender's view of the flag and
    /// the receiver's last-known exceptions and settings.
    Toggle {
        /// The flag value the sender just persisted.
        enabled: bool,
    },
    /// Replace the receiver's filter parameters wholesale.
    ///
    /// The sender merges slider edits before sending, so this is always a
    /// complete object.
    UpdateSettings {
        /// The full merged parameters.
        settings: Settings,
    },
}

/// Encode a command as JSON text for the tab channel.
///
/// # Errors
///
/// Returns [`CommandError::Json`] if serialization fails; only a non-finite
/// settings value can cause that.
pub fn encode_command(command: &Command) -> Result<String, CommandError> {
    Ok(serde_json::to_string(command)?)
}

/// Decode JSON text from the tab channel into a command.
///
/// # Errors
///
/// Returns [`CommandError::Json`] for malformed JSON, unknown `type` tags,
/// and payloads whose fields do not match the tagged variant.
pub fn decode_command(text: &str) -> Result<Command, CommandError> {
    Ok(serde_json::from_str(text)?)
}
