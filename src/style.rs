//! The style contract: marker class, resource id, and filter text.
//!
//! Everything here is fixed-format. The page-wide filter composes its five
//! functions in a set order, and the media counter-filter re-inverts embedded
//! `img`/`picture`/`video`/`canvas` elements so photos and video keep their
//! original colors inside an inverted page.

#[cfg(test)]
#[path = "style_test.rs"]
mod style_test;

use crate::settings::Settings;

/// Class set on the document root while dark mode is applied.
pub const MARKER_CLASS: &str = "pageshade-dark";

/// Identifier of the single style resource this crate installs per page.
pub const STYLE_RESOURCE_ID: &str = "pageshade-style";

/// Counter-filter for embedded media under a marked root.
pub const MEDIA_FILTER: &str = "invert(1) hue-rotate(180deg)";

/// Elements that receive [`MEDIA_FILTER`].
pub const MEDIA_ELEMENTS: [&str; 4] = ["img", "picture", "video", "canvas"];

/// Page-wide filter expression for the given parameters.
///
/// Function order is fixed; values render with plain `f64` formatting, so
/// `1.0` becomes `1` and `1.2` stays `1.2`.
#[must_use]
pub fn page_filter(settings: &Settings) -> String {
    format!(
        "invert(1) hue-rotate(180deg) brightness({}) contrast({}) grayscale({})",
        settings.brightness, settings.contrast, settings.grayscale
    )
}

/// Full stylesheet text installed under [`STYLE_RESOURCE_ID`].
///
/// Both rules are scoped to [`MARKER_CLASS`], so clearing the marker disables
/// them even if the resource lingers.
#[must_use]
pub fn stylesheet(settings: &Settings) -> String {
    let media_selectors = MEDIA_ELEMENTS
        .iter()
        .map(|element| format!("html.{MARKER_CLASS} {element}"))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        "html.{marker} {{\n  filter: {page};\n}}\n{media_selectors} {{\n  filter: {MEDIA_FILTER};\n}}\n",
        marker = MARKER_CLASS,
        page = page_filter(settings),
    )
}
