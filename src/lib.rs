//! DualTag Core - Dual-Side Tag Geometry Engine
//!
//! Turns a tag configuration and a QR module matrix into one deterministic
//! geometry record for a reversible, two-face printed tag.
//!
//! # The Rules (Non-Negotiable)
//! 1. Validation Runs First
//! 2. Layout Is Arithmetic
//! 3. Coordinates Are Centre-Relative
//! 4. Text Never Shrinks To Fit
//! 5. Same Inputs, Same Bytes
//! 6. Encoders Are Injected, Never Owned

pub mod config;
pub mod geometry;
pub mod validation;
pub mod layout;
pub mod qr;
pub mod text;
pub mod stacking;
pub mod hashing;
pub mod print;
pub mod export;
pub mod pipeline;

pub use config::{ConfigLoadError, ConfigOverrides, FontRole, TagConfig};
pub use geometry::{Axis, Point, Rect};
pub use validation::{validate, ValidationReport, ValidationRule, ValidationViolation, ViolationClass, ViolationSeverity};
pub use layout::{compute_layout, ComputedGeometry};
pub use qr::{resolve, ModuleGrid, PrecomputedMatrix, QrEncoder, QrError, ResampleReport};
pub use text::{derive_keep_outs, layout_text, KeepOut, PlacementViolation, TextPlacement, TextRequest};
pub use stacking::{resolve_stacking, resolve_stacking_with, Face, StackingDescriptor, StackingError};
pub use hashing::{canonical_json, compute_digest};
pub use print::{MaterialPreset, PrintAuthority, PrintProfile};
pub use export::{export, ExportDocument, ExportError, GenerationMeta, SolidParameters, VectorDocument};
pub use pipeline::{BuildError, BuildOptions, TagBuild, TagPipeline};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GENERATOR_NAME: &str = "dualtag-core";
