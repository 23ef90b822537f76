//! Page document seam: root markers and named style resources.
//!
//! DESIGN
//! ======
//! The render engine never touches a real DOM type. It sees a document root
//! that can carry marker classes, and style resources addressed by id with
//! insert-or-update semantics. A browser host backs these with the document
//! element and `<style>` nodes; [`MemoryDocument`] backs them with plain maps
//! so every engine path runs in tests and in the simulation binary.
//!
//! A [`StyleResource`] handle is obtained once and owned by its user, rather
//! than re-queried by id on every write.

#[cfg(test)]
#[path = "document_test.rs"]
mod document_test;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};

// =============================================================================
// TRAITS
// =============================================================================

/// A page's document root, as far as styling is concerned.
pub trait DocumentRoot: Send + Sync {
    /// Add `class` to the root's class list. Present classes stay single.
    fn ensure_marker(&self, class: &str);

    /// Remove `class` from the root's class list. Absent classes are fine.
    fn clear_marker(&self, class: &str);

    /// Whether `class` is currently on the root.
    fn has_marker(&self, class: &str) -> bool;

    /// Obtain the owned handle for the style resource named `id`.
    fn style_resource(&self, id: &str) -> Box<dyn StyleResource>;
}

/// One named style resource on a page.
///
/// At most one resource exists per id; `upsert` installs it or replaces its
/// text in place.
pub trait StyleResource: Send + Sync {
    /// Install the resource, or replace its text if already installed.
    fn upsert(&self, css: &str);

    /// Delete the resource. Absent resources are fine.
    fn remove(&self);

    /// Whether the resource is currently installed.
    fn is_attached(&self) -> bool;
}

// =============================================================================
// MEMORY DOCUMENT
// =============================================================================

#[derive(Default)]
struct DocumentInner {
    markers: BTreeSet<String>,
    styles: BTreeMap<String, String>,
}

/// In-memory [`DocumentRoot`] for tests and simulation.
///
/// Clones share the same underlying document, so a test can hold one handle
/// while the engine holds another.
#[derive(Clone, Default)]
pub struct MemoryDocument {
    inner: Arc<Mutex<DocumentInner>>,
}

impl MemoryDocument {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of marker classes on the root.
    #[must_use]
    pub fn marker_count(&self) -> usize {
        self.lock().markers.len()
    }

    /// Number of installed style resources.
    #[must_use]
    pub fn style_count(&self) -> usize {
        self.lock().styles.len()
    }

    /// Text of the style resource named `id`, if installed.
    #[must_use]
    pub fn style_text(&self, id: &str) -> Option<String> {
        self.lock().styles.get(id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DocumentInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentRoot for MemoryDocument {
    fn ensure_marker(&self, class: &str) {
        self.lock().markers.insert(class.to_string());
    }

    fn clear_marker(&self, class: &str) {
        self.lock().markers.remove(class);
    }

    fn has_marker(&self, class: &str) -> bool {
        self.lock().markers.contains(class)
    }

    fn style_resource(&self, id: &str) -> Box<dyn StyleResource> {
        Box::new(MemoryStyleResource { id: id.to_string(), inner: Arc::clone(&self.inner) })
    }
}

struct MemoryStyleResource {
    id: String,
    inner: Arc<Mutex<DocumentInner>>,
}

impl MemoryStyleResource {
    fn lock(&self) -> std::sync::MutexGuard<'_, DocumentInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StyleResource for MemoryStyleResource {
    fn upsert(&self, css: &str) {
        self.lock().styles.insert(self.id.clone(), css.to_string());
    }

    fn remove(&self) {
        self.lock().styles.remove(&self.id);
    }

    fn is_attached(&self) -> bool {
        self.lock().styles.contains_key(&self.id)
    }
}
