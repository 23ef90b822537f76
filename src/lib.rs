//! Reversible per-domain dark mode: state synchronization and application.
//!
//! The crate splits the browser-extension problem into two halves connected
//! only through a shared key-value store. The control surface (the panel)
//! writes configuration; one page agent per page load watches the store and
//! keeps its document's styles in line. Direct commands from the surface to
//! the active page are a latency layer on top; every page converges through
//! the store alone, so a lost command never costs correctness.
//!
//! The store, tab, and document seams are traits with in-memory
//! implementations, so the whole system runs and tests without a browser
//! host behind it.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`agent`] | Per-page event loop wiring an engine to its inputs |
//! | [`command`] | Panel-to-page command wire format |
//! | [`document`] | Document seam: root marker and style resources |
//! | [`domain`] | Hostname extraction from page URLs |
//! | [`engine`] | Render engine deciding and applying one page's display state |
//! | [`exceptions`] | The set of domains dark mode skips |
//! | [`settings`] | Filter parameters and partial updates |
//! | [`store`] | Configuration store seam, schema, and change feed |
//! | [`style`] | Fixed style contract: marker class, resource id, filter text |
//! | [`surface`] | Panel-side state and mutations |
//! | [`tabs`] | Tab lookup and best-effort command delivery |

pub mod agent;
pub mod command;
pub mod document;
pub mod domain;
pub mod engine;
pub mod exceptions;
pub mod settings;
pub mod store;
pub mod style;
pub mod surface;
pub mod tabs;
