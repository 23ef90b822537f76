//! Render engine: decides and applies one page's display state.
//!
//! DESIGN
//! ======
//! One engine lives in each page for exactly one page load. Its whole job is
//! to keep the document in line with a single derived value: dark mode is
//! `Applied(settings)` when the global flag is on and the page's domain is
//! not excepted, otherwise `Removed`.
//!
//! Two inputs drive recomputation, on different contracts:
//!
//! - **Store changes** (correctness): any write to `enabled`, `settings`, or
//!   `exceptions` triggers a full re-fetch of all three keys, then a
//!   re-apply. Re-fetching the full record avoids acting on a stale
//!   combination when only one key was pushed. This path needs no command
//!   delivery and converges every page eventually.
//! - **Commands** (latency): a `toggle` or `update_settings` from the
//!   control surface folds the message's value into the last-known snapshot
//!   and re-applies immediately, without a store read. A stale command can
//!   briefly win; the next store notification reconciles it.
//!
//! Apply and remove are idempotent, so overlapping recomputations converge
//! on the same document state no matter how they interleave.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::command::Command;
use crate::document::{DocumentRoot, StyleResource};
use crate::domain::Domain;
use crate::settings::Settings;
use crate::store::{ChangeSet, ConfigSnapshot, ConfigStore, StoreError, StoreKey, StoreRecord};
use crate::style;

/// The display state derived for one page.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EffectiveState {
    /// Dark mode is on; the filter uses these parameters.
    Applied(Settings),
    /// Dark mode is off for this page.
    Removed,
}

/// Decide the display state for `domain` under `snapshot`.
///
/// The flag gates everything; an excepted domain stays light regardless of
/// settings.
#[must_use]
pub fn decide(snapshot: &ConfigSnapshot, domain: &Domain) -> EffectiveState {
    if !snapshot.enabled || snapshot.exceptions.contains(domain.as_str()) {
        EffectiveState::Removed
    } else {
        EffectiveState::Applied(snapshot.settings)
    }
}

/// Keeps one page's document in line with the persisted configuration.
pub struct RenderEngine {
    domain: Domain,
    store: Arc<dyn ConfigStore>,
    root: Arc<dyn DocumentRoot>,
    style: Box<dyn StyleResource>,
    known: ConfigSnapshot,
    state: EffectiveState,
}

impl RenderEngine {
    /// Create an engine for the page at `domain`.
    ///
    /// The style handle for [`style::STYLE_RESOURCE_ID`] is obtained once
    /// here and held for the engine's lifetime.
    #[must_use]
    pub fn new(domain: Domain, store: Arc<dyn ConfigStore>, root: Arc<dyn DocumentRoot>) -> Self {
        let style = root.style_resource(style::STYLE_RESOURCE_ID);
        Self {
            domain,
            store,
            root,
            style,
            known: ConfigSnapshot::default(),
            state: EffectiveState::Removed,
        }
    }

    /// First fetch-and-apply, run once per page load.
    ///
    /// # Errors
    ///
    /// Returns the store error on a failed read; the document is left
    /// untouched and a later trigger retries.
    pub async fn initialize(&mut self) -> Result<(), StoreError> {
        self.refresh().await
    }

    /// Re-fetch the full record and re-apply the derived state.
    ///
    /// # Errors
    ///
    /// Returns the store error on a failed read. The last-known snapshot and
    /// the document keep their previous state.
    pub async fn refresh(&mut self) -> Result<(), StoreError> {
        let (flags, exceptions) = tokio::try_join!(
            self.store.get(&[StoreKey::Enabled, StoreKey::Settings]),
            self.store.get(&[StoreKey::Exceptions]),
        )?;
        self.commit(flags.merge(exceptions));
        Ok(())
    }

    /// React to a store change notification.
    ///
    /// Notifications that touch none of the config keys are ignored without
    /// a read.
    ///
    /// # Errors
    ///
    /// Returns the store error on a failed re-fetch, leaving state as it was.
    pub async fn on_store_changed(&mut self, changed: &ChangeSet) -> Result<(), StoreError> {
        if !changed.touches_config() {
            debug!(domain = %self.domain, "change feed entry without config keys; ignored");
            return Ok(());
        }
        self.refresh().await
    }

    /// React to a command from the control surface.
    ///
    /// Folds the message's value into the last-known snapshot and re-applies
    /// without a store read. The store change feed reconciles any staleness
    /// afterwards.
    pub fn on_command(&mut self, command: &Command) {
        match command {
            Command::Toggle { enabled } => self.known.enabled = *enabled,
            Command::UpdateSettings { settings } => self.known.settings = *settings,
        }
        self.sync();
    }

    /// Install the filter styles for `settings`. Idempotent.
    pub fn apply(&self, settings: &Settings) {
        // Style first, so the marker never matches without rules present.
        self.style.upsert(&style::stylesheet(settings));
        self.root.ensure_marker(style::MARKER_CLASS);
        debug!(
            domain = %self.domain,
            filter = %style::page_filter(settings),
            "dark styles installed"
        );
    }

    /// Remove the filter styles. Safe when nothing was ever applied.
    pub fn remove(&self) {
        self.root.clear_marker(style::MARKER_CLASS);
        self.style.remove();
        debug!(domain = %self.domain, "dark styles removed");
    }

    /// Open a change-feed subscription on the engine's store.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        self.store.subscribe()
    }

    /// The current display state.
    #[must_use]
    pub fn state(&self) -> EffectiveState {
        self.state
    }

    /// The last-known configuration this engine acted on.
    #[must_use]
    pub fn snapshot(&self) -> &ConfigSnapshot {
        &self.known
    }

    /// The domain this engine answers for.
    #[must_use]
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    fn commit(&mut self, record: StoreRecord) {
        self.known = ConfigSnapshot::from_record(record);
        self.sync();
    }

    fn sync(&mut self) {
        let next = decide(&self.known, &self.domain);
        // Always re-applied, never skipped on equality: the document may have
        // been touched by something other than this engine.
        match next {
            EffectiveState::Applied(settings) => self.apply(&settings),
            EffectiveState::Removed => self.remove(),
        }
        if next != self.state {
            info!(domain = %self.domain, from = ?self.state, to = ?next, "display state changed");
        }
        self.state = next;
    }
}
