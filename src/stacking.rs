//! Dual-Side Stacking Resolver
//!
//! A flat slab printed with normal artwork on both faces reads as a mirror
//! image on one of them once it is flipped about its vertical axis. One face's
//! artwork is therefore pre-mirrored before fabrication. Which face that is
//! follows from the canonical (front) reading orientation; it is never toggled
//! per design.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{Disc, Point, Rect};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Face {
    #[default]
    Front,
    Back,
}

impl Face {
    pub fn opposite(self) -> Self {
        match self {
            Face::Front => Face::Back,
            Face::Back => Face::Front,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Face::Front => "front",
            Face::Back => "back",
        }
    }
}

/// Plane a face's feature geometry is reflected through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MirrorPlane {
    /// The vertical axis through the canvas centre: x -> -x.
    #[serde(rename = "YZ")]
    Yz,
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum StackingError {
    #[error("Web thickness {web} mm must be less than total thickness {total} mm")]
    WebNotThinner { web: f64, total: f64 },

    #[error("{field} must be a positive finite length, got {value}")]
    NonPositive { field: &'static str, value: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceStack {
    pub face: Face,
    pub mirrored: bool,
    pub mirror_plane: Option<MirrorPlane>,
    pub feature_depth: f64,
    /// Bottom and top of the feature layer, z = 0 on the build plate.
    pub z_range: [f64; 2],
    pub description: String,
}

/// Maps between a face's reading frame and the fabrication frame. The
/// reflection is its own inverse, so the same call goes either way.
impl FaceStack {
    pub fn transform_x(&self, x: f64) -> f64 {
        if self.mirrored {
            -x
        } else {
            x
        }
    }

    pub fn transform_rect(&self, rect: &Rect) -> Rect {
        if self.mirrored {
            rect.mirrored_x()
        } else {
            *rect
        }
    }

    pub fn transform_disc(&self, disc: &Disc) -> Disc {
        Disc {
            center: Point::new(self.transform_x(disc.center.x), disc.center.y),
            radius: disc.radius,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackingDescriptor {
    pub total_thickness: f64,
    pub web_thickness: f64,
    pub half_depth: f64,
    pub canonical_face: Face,
    /// Bed-side layer: the mirrored face.
    pub bottom_side: FaceStack,
    /// Top layer: the canonical face.
    pub top_side: FaceStack,
    /// Layers bottom to top.
    pub stack_order: Vec<String>,
}

impl StackingDescriptor {
    pub fn face(&self, face: Face) -> &FaceStack {
        if self.top_side.face == face {
            &self.top_side
        } else {
            &self.bottom_side
        }
    }

    pub fn mirrored_face(&self) -> Face {
        self.bottom_side.face
    }
}

pub fn resolve_stacking(total: f64, web: f64) -> Result<StackingDescriptor, StackingError> {
    resolve_stacking_with(total, web, Face::Front)
}

pub fn resolve_stacking_with(
    total: f64,
    web: f64,
    canonical: Face,
) -> Result<StackingDescriptor, StackingError> {
    for (field, value) in [("totalThickness", total), ("webThickness", web)] {
        if !value.is_finite() || value <= 0.0 {
            return Err(StackingError::NonPositive { field, value });
        }
    }
    if web >= total {
        return Err(StackingError::WebNotThinner { web, total });
    }

    let half_depth = (total - web) / 2.0;
    let mirrored = canonical.opposite();

    let bottom_side = FaceStack {
        face: mirrored,
        mirrored: true,
        mirror_plane: Some(MirrorPlane::Yz),
        feature_depth: half_depth,
        z_range: [0.0, half_depth],
        description: format!(
            "{} features, mirrored about YZ, read after a 180 degree flip",
            mirrored.as_str()
        ),
    };
    let top_side = FaceStack {
        face: canonical,
        mirrored: false,
        mirror_plane: None,
        feature_depth: half_depth,
        z_range: [total - half_depth, total],
        description: format!("{} features, canonical orientation", canonical.as_str()),
    };

    let stack_order = vec![
        format!(
            "{} features z {:.2}-{:.2} mm (mirrored)",
            mirrored.as_str(),
            bottom_side.z_range[0],
            bottom_side.z_range[1]
        ),
        format!("web z {:.2}-{:.2} mm", half_depth, half_depth + web),
        format!(
            "{} features z {:.2}-{:.2} mm",
            canonical.as_str(),
            top_side.z_range[0],
            top_side.z_range[1]
        ),
    ];

    Ok(StackingDescriptor {
        total_thickness: total,
        web_thickness: web,
        half_depth,
        canonical_face: canonical,
        bottom_side,
        top_side,
        stack_order,
    })
}
