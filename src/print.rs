//! Print Authority System
//!
//! Defines where fabrication settings come from, so layer heights and colour
//! switch points are decided once instead of per call site.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// PrintAuthority determines where the print profile comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintAuthority {
    /// System defaults (fallback)
    #[default]
    System,
    /// Material preset
    Preset,
    /// User-provided overrides (with validation)
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialPreset {
    Pla,
    Petg,
    Abs,
}

impl MaterialPreset {
    pub fn layer_height(&self) -> f64 {
        match self {
            MaterialPreset::Pla => 0.20,
            MaterialPreset::Petg => 0.20,
            MaterialPreset::Abs => 0.24,
        }
    }
}

impl std::str::FromStr for MaterialPreset {
    type Err = PrintProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pla" => Ok(MaterialPreset::Pla),
            "petg" => Ok(MaterialPreset::Petg),
            "abs" => Ok(MaterialPreset::Abs),
            other => Err(PrintProfileError::UnknownPreset(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PrintProfileError {
    #[error("Layer height must be between 0.04 and 0.4 mm, got {0}")]
    LayerHeight(f64),

    #[error("Unknown material preset: {0} (expected pla, petg or abs)")]
    UnknownPreset(String),
}

pub const MIN_LAYER_HEIGHT: f64 = 0.04;
pub const MAX_LAYER_HEIGHT: f64 = 0.4;

/// Fabrication settings that travel with the solid parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintProfile {
    pub authority: PrintAuthority,
    pub material: Option<MaterialPreset>,
    pub layer_height: f64,
}

impl Default for PrintProfile {
    fn default() -> Self {
        Self {
            authority: PrintAuthority::System,
            material: None,
            layer_height: 0.20,
        }
    }
}

impl PrintProfile {
    pub fn from_preset(material: MaterialPreset) -> Self {
        Self {
            authority: PrintAuthority::Preset,
            material: Some(material),
            layer_height: material.layer_height(),
        }
    }

    /// Create from user with validation
    pub fn from_user(layer_height: f64, material: Option<MaterialPreset>) -> Result<Self, PrintProfileError> {
        if !(MIN_LAYER_HEIGHT..=MAX_LAYER_HEIGHT).contains(&layer_height) {
            return Err(PrintProfileError::LayerHeight(layer_height));
        }
        Ok(Self {
            authority: PrintAuthority::User,
            material,
            layer_height,
        })
    }

    pub fn color_switch_layer(&self, island_height: f64) -> u32 {
        color_switch_layer_index(island_height, self.layer_height)
    }
}

/// Layer (1-based, counted from the top of the body) where the filament
/// changes for raised features. Never below 1.
pub fn color_switch_layer_index(island_height: f64, layer_height: f64) -> u32 {
    let layers = (island_height / layer_height).round();
    if layers.is_finite() && layers >= 1.0 {
        layers as u32
    } else {
        1
    }
}
