//! Filter parameters and their sparse-update type.
//!
//! `Settings` is the persisted value under the `settings` key and the payload
//! of `update_settings` commands. `SettingsPatch` carries one slider's edit;
//! only present fields are applied. Senders merge patches into their last
//! known `Settings` before persisting or broadcasting, so receivers always
//! see a complete object.

#[cfg(test)]
#[path = "settings_test.rs"]
mod settings_test;

use serde::{Deserialize, Serialize};

/// Filter parameters for the page-wide dark transform.
///
/// Field defaults apply per-field during deserialization, so records written
/// before a parameter existed still decode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Brightness multiplier, normally within `0.0..=3.0`.
    #[serde(default = "default_brightness")]
    pub brightness: f64,
    /// Contrast multiplier, normally within `0.0..=3.0`.
    #[serde(default = "default_contrast")]
    pub contrast: f64,
    /// Grayscale amount, normally within `0.0..=1.0`.
    #[serde(default = "default_grayscale")]
    pub grayscale: f64,
}

fn default_brightness() -> f64 {
    1.0
}

fn default_contrast() -> f64 {
    1.0
}

fn default_grayscale() -> f64 {
    0.0
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            brightness: default_brightness(),
            contrast: default_contrast(),
            grayscale: default_grayscale(),
        }
    }
}

/// Sparse update for [`Settings`]. Only present fields are applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsPatch {
    /// New brightness, if being updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f64>,
    /// New contrast, if being updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast: Option<f64>,
    /// New grayscale, if being updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grayscale: Option<f64>,
}

impl SettingsPatch {
    /// Fold this patch over `base`, keeping `base` values for absent fields.
    #[must_use]
    pub fn merged(self, base: Settings) -> Settings {
        Settings {
            brightness: self.brightness.unwrap_or(base.brightness),
            contrast: self.contrast.unwrap_or(base.contrast),
            grayscale: self.grayscale.unwrap_or(base.grayscale),
        }
    }

    /// Returns `true` if no field is present.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.brightness.is_none() && self.contrast.is_none() && self.grayscale.is_none()
    }
}
