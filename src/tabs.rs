//! Tab registry and the command channel to page agents.
//!
//! DESIGN
//! ======
//! The control surface addresses exactly one tab: the active one. Delivery
//! is fire-and-forget; a command that finds no agent (tab closed, page still
//! loading, mailbox full) is dropped, and the store change feed covers the
//! gap. Attaching an agent to a tab replaces the previous mailbox, which is
//! how navigation retires the old page's agent.

#[cfg(test)]
#[path = "tabs_test.rs"]
mod tabs_test;

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::command::{Command, encode_command};

/// Host-assigned tab identifier.
pub type TabId = u32;

/// What the control surface can see of a tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    /// The tab's identifier.
    pub id: TabId,
    /// The tab's page URL, if the host exposes it.
    pub url: Option<String>,
}

// =============================================================================
// SEAMS
// =============================================================================

/// Active-tab query.
///
/// Enables substituting in-memory fakes in tests.
#[async_trait]
pub trait Tabs: Send + Sync {
    /// The currently focused tab, if any.
    async fn active_tab(&self) -> Option<TabInfo>;
}

/// Best-effort, at-most-once command delivery to one tab's page agent.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Send `command` to the agent in `tab`.
    ///
    /// There is no acknowledgement; encoding and delivery failures are
    /// logged and dropped.
    async fn send(&self, tab: TabId, command: &Command);
}

// =============================================================================
// MEMORY TABS
// =============================================================================

const COMMAND_MAILBOX_CAPACITY: usize = 16;

#[derive(Default)]
struct TabEntry {
    url: Option<String>,
    mailbox: Option<mpsc::Sender<String>>,
}

#[derive(Default)]
struct TabsInner {
    active: Option<TabId>,
    tabs: HashMap<TabId, TabEntry>,
}

/// In-memory tab registry implementing both [`Tabs`] and [`CommandChannel`].
///
/// Mailboxes carry commands as encoded JSON text, the same shape a host
/// messaging layer would, so agents exercise the full decode path.
#[derive(Default)]
pub struct MemoryTabs {
    inner: Mutex<TabsInner>,
}

impl MemoryTabs {
    /// Create a registry with no tabs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tab` at `url`, or record a navigation if already open.
    pub fn open(&self, tab: TabId, url: &str) {
        let mut inner = self.lock_inner();
        let entry = inner.tabs.entry(tab).or_default();
        entry.url = Some(url.to_string());
    }

    /// Mark `tab` as the focused one.
    pub fn set_active(&self, tab: TabId) {
        self.lock_inner().active = Some(tab);
    }

    /// Create `tab`'s command mailbox and return the receiving end.
    ///
    /// Replaces any previous mailbox; the displaced receiver sees its channel
    /// close, which is how a navigated-away page's agent learns to stop.
    pub fn attach_agent(&self, tab: TabId) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(COMMAND_MAILBOX_CAPACITY);
        let mut inner = self.lock_inner();
        let entry = inner.tabs.entry(tab).or_default();
        entry.mailbox = Some(tx);
        rx
    }

    /// Remove `tab` entirely, closing its mailbox.
    pub fn close(&self, tab: TabId) {
        let mut inner = self.lock_inner();
        inner.tabs.remove(&tab);
        if inner.active == Some(tab) {
            inner.active = None;
        }
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, TabsInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Tabs for MemoryTabs {
    async fn active_tab(&self) -> Option<TabInfo> {
        let inner = self.lock_inner();
        let id = inner.active?;
        let entry = inner.tabs.get(&id)?;
        Some(TabInfo { id, url: entry.url.clone() })
    }
}

#[async_trait]
impl CommandChannel for MemoryTabs {
    async fn send(&self, tab: TabId, command: &Command) {
        let payload = match encode_command(command) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, tab, "command encode failed; nothing sent");
                return;
            }
        };

        let mailbox = {
            let inner = self.lock_inner();
            inner.tabs.get(&tab).and_then(|entry| entry.mailbox.clone())
        };
        let Some(mailbox) = mailbox else {
            debug!(tab, "no agent attached; command dropped");
            return;
        };

        match mailbox.try_send(payload) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(tab, "agent mailbox full; command dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(tab, "agent mailbox closed; command dropped");
            }
        }
    }
}
