//! Page agent: the per-page event loop.
//!
//! DESIGN
//! ======
//! One agent task runs per page load. It owns that page's [`RenderEngine`]
//! and both of its inputs: the store change feed and the tab's command
//! mailbox. Store notifications trigger a re-fetch through the engine;
//! command payloads are decoded here and folded in without a read.
//!
//! Malformed payloads are logged and dropped. Losing a command is always
//! recoverable: the write that prompted it also lands in the store, and the
//! change feed replays it through the re-fetch path.

#[cfg(test)]
#[path = "agent_test.rs"]
mod agent_test;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::command;
use crate::engine::RenderEngine;

/// Drive one page's engine until the page goes away.
///
/// The change feed is subscribed before the first fetch, so a write landing
/// during initialization is still observed. A failed initial fetch leaves
/// the page unstyled; the next change notification retries.
///
/// The loop ends when either input closes: the command mailbox when the
/// page navigates away or its tab closes, the change feed when the backing
/// store shuts down. Returns the engine so callers can inspect where it
/// ended up.
pub async fn run_page_agent(
    mut engine: RenderEngine,
    mut commands: mpsc::Receiver<String>,
) -> RenderEngine {
    let mut changes = engine.subscribe();
    info!(domain = %engine.domain(), "page agent started");

    if let Err(error) = engine.initialize().await {
        warn!(
            domain = %engine.domain(),
            error = %error,
            "initial fetch failed; page stays unstyled"
        );
    }

    loop {
        tokio::select! {
            changed = changes.recv() => match changed {
                Ok(changed) => {
                    if let Err(error) = engine.on_store_changed(&changed).await {
                        warn!(
                            domain = %engine.domain(),
                            error = %error,
                            "re-fetch after change failed"
                        );
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(domain = %engine.domain(), missed, "change feed lagged; re-fetching");
                    if let Err(error) = engine.refresh().await {
                        warn!(
                            domain = %engine.domain(),
                            error = %error,
                            "re-fetch after lag failed"
                        );
                    }
                }
                Err(RecvError::Closed) => break,
            },
            payload = commands.recv() => match payload {
                Some(payload) => match command::decode_command(&payload) {
                    Ok(command) => engine.on_command(&command),
                    Err(error) => {
                        warn!(
                            domain = %engine.domain(),
                            error = %error,
                            "dropping malformed command"
                        );
                    }
                },
                None => break,
            },
        }
    }

    info!(domain = %engine.domain(), "page agent stopped");
    engine
}
