//! Control surface: the panel-side half of the system.
//!
//! DESIGN
//! ======
//! The surface is short-lived; it mounts when the user opens the panel and
//! is gone moments later. Every mutation therefore writes the store first
//! (the durable truth every page converges on) and only then sends a
//! command to the active tab for immediate feedback. A command that is
//! never delivered costs nothing but latency.
//!
//! Exception edits target the active tab's domain. Pages without a usable
//! domain (internal pages, unresolvable URLs) cannot host an agent, so
//! exception edits for them are silent no-ops.
//!
//! ERROR HANDLING
//! ==============
//! Store failures surface to the caller; the host UI decides how to present
//! them. Command delivery failures never surface; the store write has
//! already landed and the page will converge from there.

#[cfg(test)]
#[path = "surface_test.rs"]
mod surface_test;

use std::sync::Arc;

use tracing::{debug, info};

use crate::command::Command;
use crate::domain::Domain;
use crate::exceptions::ExceptionSet;
use crate::settings::{Settings, SettingsPatch};
use crate::store::{ConfigSnapshot, ConfigStore, StoreError, StoreKey, StoreRecord};
use crate::tabs::{CommandChannel, Tabs};

/// Panel-side state and mutations.
///
/// Holds the last-known view of the configuration for the host UI to bind
/// to; every mutation keeps it current.
pub struct ControlSurface {
    store: Arc<dyn ConfigStore>,
    tabs: Arc<dyn Tabs>,
    channel: Arc<dyn CommandChannel>,
    enabled: bool,
    settings: Settings,
    exceptions: ExceptionSet,
}

impl ControlSurface {
    /// Create a surface over the given host seams.
    ///
    /// View state starts at defaults until [`ControlSurface::on_mount`] runs.
    #[must_use]
    pub fn new(
        store: Arc<dyn ConfigStore>,
        tabs: Arc<dyn Tabs>,
        channel: Arc<dyn CommandChannel>,
    ) -> Self {
        Self {
            store,
            tabs,
            channel,
            enabled: false,
            settings: Settings::default(),
            exceptions: ExceptionSet::new(),
        }
    }

    /// Load the configuration, writing defaults back for absent keys.
    ///
    /// The write-back happens here and only here; page agents never write.
    /// A store that already has all three keys is not written at all.
    ///
    /// # Errors
    ///
    /// Returns the store error on a failed read or default write-back.
    pub async fn on_mount(&mut self) -> Result<(), StoreError> {
        let (flags, exceptions) = tokio::try_join!(
            self.store.get(&[StoreKey::Enabled, StoreKey::Settings]),
            self.store.get(&[StoreKey::Exceptions]),
        )?;
        let record = flags.merge(exceptions);

        let missing = StoreRecord {
            enabled: record.enabled.is_none().then_some(false),
            settings: record.settings.is_none().then(Settings::default),
            exceptions: record.exceptions.is_none().then(ExceptionSet::new),
        };
        if !missing.is_empty() {
            debug!(keys = ?missing.keys(), "seeding defaults for absent keys");
            self.store.set(missing).await?;
        }

        let snapshot = ConfigSnapshot::from_record(record);
        self.enabled = snapshot.enabled;
        self.settings = snapshot.settings;
        self.exceptions = snapshot.exceptions;
        info!(
            enabled = self.enabled,
            exceptions = self.exceptions.len(),
            "control surface mounted"
        );
        Ok(())
    }

    /// Flip the global flag: persist the negation, then notify the active
    /// tab. Returns the new flag value.
    ///
    /// The flag is re-read here rather than taken from view state; another
    /// surface may have flipped it since mount. The read-negate-write is
    /// still not atomic under concurrent writers; one surface is assumed
    /// active at a time.
    ///
    /// # Errors
    ///
    /// Returns the store error on a failed read or write; no command is sent
    /// in that case.
    pub async fn toggle(&mut self) -> Result<bool, StoreError> {
        let current = self.store.get(&[StoreKey::Enabled]).await?.enabled.unwrap_or_default();
        let next = !current;
        self.store.set(StoreRecord { enabled: Some(next), ..StoreRecord::default() }).await?;
        self.enabled = next;
        info!(enabled = next, "dark mode toggled");
        self.send_to_active_tab(Command::Toggle { enabled: next }).await;
        Ok(next)
    }

    /// Apply one slider's edit: merge the patch into the last-known
    /// settings, persist the full merged object, then notify the active tab
    /// with the same object. Returns the merged settings.
    ///
    /// Receivers never merge; sending the complete object keeps interleaved
    /// edits from different fields convergent. An empty patch is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the store error on a failed write; no command is sent in that
    /// case.
    pub async fn change_setting(&mut self, patch: SettingsPatch) -> Result<Settings, StoreError> {
        if patch.is_empty() {
            return Ok(self.settings);
        }

        let merged = patch.merged(self.settings);
        self.store.set(StoreRecord { settings: Some(merged), ..StoreRecord::default() }).await?;
        self.settings = merged;
        self.send_to_active_tab(Command::UpdateSettings { settings: merged }).await;
        Ok(merged)
    }

    /// Except the active tab's domain.
    ///
    /// Reads the stored set fresh before editing; mount state may be stale.
    /// An already-excepted domain and a tab without a usable domain are both
    /// no-ops without a write.
    ///
    /// # Errors
    ///
    /// Returns the store error on a failed read or write.
    pub async fn add_exception(&mut self) -> Result<(), StoreError> {
        let Some(domain) = self.active_domain().await else {
            return Ok(());
        };

        let mut exceptions =
            self.store.get(&[StoreKey::Exceptions]).await?.exceptions.unwrap_or_default();
        if !exceptions.insert(domain.as_str()) {
            debug!(domain = %domain, "already excepted");
            return Ok(());
        }

        self.store
            .set(StoreRecord { exceptions: Some(exceptions.clone()), ..StoreRecord::default() })
            .await?;
        self.exceptions = exceptions;
        info!(domain = %domain, "domain excepted");
        Ok(())
    }

    /// Un-except the active tab's domain.
    ///
    /// Writes the filtered set back even when the domain was absent, so the
    /// stored array always ends up well-formed. A tab without a usable
    /// domain is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the store error on a failed read or write.
    pub async fn remove_exception(&mut self) -> Result<(), StoreError> {
        let Some(domain) = self.active_domain().await else {
            return Ok(());
        };

        let mut exceptions =
            self.store.get(&[StoreKey::Exceptions]).await?.exceptions.unwrap_or_default();
        exceptions.remove(domain.as_str());

        self.store
            .set(StoreRecord { exceptions: Some(exceptions.clone()), ..StoreRecord::default() })
            .await?;
        self.exceptions = exceptions;
        info!(domain = %domain, "domain un-excepted");
        Ok(())
    }

    // --- View state ---

    /// Last-known flag value.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Last-known settings.
    #[must_use]
    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// Last-known exceptions.
    #[must_use]
    pub fn exceptions(&self) -> &ExceptionSet {
        &self.exceptions
    }

    // --- Helpers ---

    async fn active_domain(&self) -> Option<Domain> {
        let Some(tab) = self.tabs.active_tab().await else {
            debug!("no active tab");
            return None;
        };
        let Some(url) = tab.url else {
            debug!(tab = tab.id, "active tab exposes no URL");
            return None;
        };
        let domain = Domain::from_page_url(&url);
        if domain.is_none() {
            debug!(tab = tab.id, url = %url, "active tab has no usable domain");
        }
        domain
    }

    async fn send_to_active_tab(&self, command: Command) {
        let Some(tab) = self.tabs.active_tab().await else {
            debug!("no active tab; command not sent");
            return;
        };
        self.channel.send(tab.id, &command).await;
    }
}
