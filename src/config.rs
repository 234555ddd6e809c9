//! Tag Configuration - the immutable physical parameter record
//!
//! Every derived length in the crate is a pure function of a `TagConfig`.
//! Loading from YAML/JSON and flag overrides are adapter concerns kept at the
//! bottom of this module; the core only ever receives a finished record.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub use crate::geometry::Insets;
use crate::geometry::{Disc, Point};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TagConfig {
    pub canvas_width: f64,
    pub canvas_height: f64,
    /// Target QR module count per side.
    pub modules: u32,
    /// Physical edge length of one module, in mm.
    pub module_size: f64,
    pub quiet_modules: u32,
    pub margin: Insets,
    pub gutter: f64,
    pub qr_padding: Insets,
    pub text_padding: Insets,
    pub fonts: FontSizes,
    pub slit: SlitConfig,
    pub material: MaterialConfig,
    pub corner_radius: f64,
    pub line_gap: f64,
    pub nfc: Option<NfcRecess>,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            canvas_width: 240.0,
            canvas_height: 94.0,
            modules: 37,
            module_size: 2.0,
            quiet_modules: 0,
            margin: Insets::uniform(3.0),
            gutter: 3.0,
            qr_padding: Insets::uniform(3.0),
            text_padding: Insets::uniform(2.0),
            fonts: FontSizes::default(),
            slit: SlitConfig::default(),
            material: MaterialConfig::default(),
            corner_radius: 4.0,
            line_gap: 1.2,
            nfc: None,
        }
    }
}

impl TagConfig {
    pub fn font_size(&self, role: FontRole) -> f64 {
        match role {
            FontRole::Title => self.fonts.title,
            FontRole::Name => self.fonts.name,
            FontRole::Contact => self.fonts.contact,
            FontRole::Prompt => self.fonts.prompt,
            FontRole::Footer => self.fonts.footer,
        }
    }

    /// Size of the QR data area (modules only, no quiet zone).
    pub fn qr_data_size(&self) -> f64 {
        self.module_size * f64::from(self.modules)
    }

    /// Size of the full QR footprint including the quiet zone.
    pub fn qr_footprint(&self) -> f64 {
        self.module_size * (f64::from(self.modules) + 2.0 * f64::from(self.quiet_modules))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontRole {
    Title,
    Name,
    Contact,
    Prompt,
    Footer,
}

impl FontRole {
    pub const ALL: [FontRole; 5] = [
        FontRole::Title,
        FontRole::Name,
        FontRole::Contact,
        FontRole::Prompt,
        FontRole::Footer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FontRole::Title => "title",
            FontRole::Name => "name",
            FontRole::Contact => "contact",
            FontRole::Prompt => "prompt",
            FontRole::Footer => "footer",
        }
    }
}

/// Cap heights in mm for the five named text roles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSizes {
    pub title: f64,
    pub name: f64,
    pub contact: f64,
    pub prompt: f64,
    pub footer: f64,
}

impl Default for FontSizes {
    fn default() -> Self {
        Self {
            title: 6.0,
            name: 5.0,
            contact: 4.0,
            prompt: 4.0,
            footer: 3.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlitOrientation {
    /// Long side runs along y.
    #[default]
    Vertical,
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlitConfig {
    /// Short side of the slot.
    pub width: f64,
    /// Long side of the slot.
    pub height: f64,
    pub margin_left: f64,
    pub margin_right: f64,
    pub orientation: SlitOrientation,
    /// Reserve a track wide enough for either orientation to the right of the
    /// text column.
    pub reserve_track: bool,
}

impl Default for SlitConfig {
    fn default() -> Self {
        Self {
            width: 4.5,
            height: 20.0,
            margin_left: 2.0,
            margin_right: 2.0,
            orientation: SlitOrientation::Vertical,
            reserve_track: true,
        }
    }
}

impl SlitConfig {
    /// (x extent, y extent) for the configured orientation.
    pub fn oriented_size(&self) -> (f64, f64) {
        match self.orientation {
            SlitOrientation::Vertical => (self.width, self.height),
            SlitOrientation::Horizontal => (self.height, self.width),
        }
    }

    pub fn track_width(&self) -> f64 {
        if self.reserve_track {
            self.margin_left + self.width.max(self.height) + self.margin_right
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaterialConfig {
    pub min_wall: f64,
    pub web_thickness: f64,
    pub total_thickness: f64,
    /// Height of raised (embossed) features above the body.
    pub island_height: f64,
    /// Depth of single-face engraved text.
    pub engrave_depth: f64,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            min_wall: 1.5,
            web_thickness: 0.4,
            total_thickness: 3.0,
            island_height: 0.5,
            engrave_depth: 0.6,
        }
    }
}

/// Circular recess on the back face for an NFC sticker.
/// Pocket for an NFC inlay, cut into the back face. The offset is measured
/// in the fabrication frame (as seen from the top, canonical face), the same
/// frame the strap slit is cut in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NfcRecess {
    pub diameter: f64,
    pub depth: f64,
    #[serde(default)]
    pub offset_x: f64,
    #[serde(default)]
    pub offset_y: f64,
}

impl NfcRecess {
    pub fn disc(&self) -> Disc {
        Disc {
            center: Point::new(self.offset_x, self.offset_y),
            radius: self.diameter / 2.0,
        }
    }
}

// --- Loading (adapter side) ---

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config extension: {0} (expected .yaml, .yml or .json)")]
    UnsupportedFormat(String),
}

impl TagConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigLoadError> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigLoadError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load from a `.yaml`/`.yml`/`.json` file. Missing keys take defaults.
    pub fn from_path(path: &Path) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "yaml" | "yml" => Self::from_yaml_str(&content),
            "json" => Self::from_json_str(&content),
            other => Err(ConfigLoadError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(v) = overrides.canvas_width {
            self.canvas_width = v;
        }
        if let Some(v) = overrides.canvas_height {
            self.canvas_height = v;
        }
        if let Some(v) = overrides.modules {
            self.modules = v;
        }
        if let Some(v) = overrides.module_size {
            self.module_size = v;
        }
        if let Some(v) = overrides.quiet_modules {
            self.quiet_modules = v;
        }
        if let Some(v) = overrides.total_thickness {
            self.material.total_thickness = v;
        }
        if let Some(v) = overrides.web_thickness {
            self.material.web_thickness = v;
        }
        if let Some(o) = overrides.slit_orientation {
            self.slit.orientation = o;
        }
        self
    }
}

/// Command-line values that win over file values.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub canvas_width: Option<f64>,
    pub canvas_height: Option<f64>,
    pub modules: Option<u32>,
    pub module_size: Option<f64>,
    pub quiet_modules: Option<u32>,
    pub total_thickness: Option<f64>,
    pub web_thickness: Option<f64>,
    pub slit_orientation: Option<SlitOrientation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_web_layout() {
        let c = TagConfig::default();
        assert_eq!(c.canvas_width, 240.0);
        assert_eq!(c.canvas_height, 94.0);
        assert_eq!(c.modules, 37);
        assert_eq!(c.module_size, 2.0);
        assert_eq!(c.quiet_modules, 0);
        assert_eq!(c.slit.width, 4.5);
        assert_eq!(c.slit.height, 20.0);
    }

    #[test]
    fn test_partial_yaml_takes_defaults() {
        let c = TagConfig::from_yaml_str("moduleSize: 2.5\nslit:\n  orientation: horizontal\n").unwrap();
        assert_eq!(c.module_size, 2.5);
        assert_eq!(c.slit.orientation, SlitOrientation::Horizontal);
        assert_eq!(c.slit.height, 20.0);
        assert_eq!(c.modules, 37);
    }

    #[test]
    fn test_track_fits_both_orientations() {
        let mut slit = SlitConfig::default();
        let vertical = slit.track_width();
        slit.orientation = SlitOrientation::Horizontal;
        assert_eq!(vertical, slit.track_width());
        assert_eq!(vertical, 2.0 + 20.0 + 2.0);
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "moduleSize: 1.5\nmodules: 29").unwrap();

        let loaded = TagConfig::from_path(file.path()).unwrap();
        assert_eq!(loaded.module_size, 1.5);

        let overrides = ConfigOverrides {
            module_size: Some(2.2),
            ..Default::default()
        };
        let c = loaded.with_overrides(&overrides);
        assert_eq!(c.module_size, 2.2);
        assert_eq!(c.modules, 29);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        let err = TagConfig::from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigLoadError::UnsupportedFormat(_)));
    }
}
