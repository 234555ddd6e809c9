//! Build Pipeline - Single Entry Point
//!
//! CRITICAL: every build validates first. No geometry is computed for a
//! configuration that failed validation.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::TagConfig;
use crate::export::{export, solid_parameters, vector_document, ExportDocument, ExportError, GenerationMeta, SolidParameters, VectorDocument};
use crate::layout::{compute_layout, ComputedGeometry};
use crate::print::PrintProfile;
use crate::qr::{resolve, ModuleGrid, QrEncoder, QrError, ResampleReport};
use crate::stacking::{resolve_stacking_with, Face, StackingDescriptor, StackingError};
use crate::text::{derive_keep_outs, layout_text, KeepOut, PlacementViolation, TextPlacement, TextRequest};
use crate::validation::{ValidationReport, ValidationViolation, Validator, ViolationClass};

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static VALIDATION_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_validation_call_count() -> u32 {
    VALIDATION_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_validation_call_count() {
    VALIDATION_CALL_COUNT.store(0, Ordering::SeqCst);
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Configuration invalid: {summary}")]
    Configuration {
        summary: String,
        violations: Vec<ValidationViolation>,
    },

    #[error("Layout infeasible: {summary}")]
    LayoutInfeasible {
        summary: String,
        violations: Vec<ValidationViolation>,
    },

    #[error("Stacking invariant violated: {summary}")]
    StackingInvariant {
        summary: String,
        violations: Vec<ValidationViolation>,
    },

    #[error(transparent)]
    Placement(#[from] PlacementViolation),

    #[error(transparent)]
    Stacking(#[from] StackingError),

    #[error("QR matrix error: {0}")]
    Qr(#[from] QrError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl BuildError {
    /// Classify a failed report. A bad value outranks the infeasibility it
    /// usually causes.
    fn from_report(report: &ValidationReport) -> Self {
        let summary = report.summary();
        let violations = report.violations.clone();
        if report.has_class(ViolationClass::Configuration) {
            BuildError::Configuration { summary, violations }
        } else if report.has_class(ViolationClass::StackingInvariant) {
            BuildError::StackingInvariant { summary, violations }
        } else {
            BuildError::LayoutInfeasible { summary, violations }
        }
    }

    pub fn violations(&self) -> &[ValidationViolation] {
        match self {
            BuildError::Configuration { violations, .. }
            | BuildError::LayoutInfeasible { violations, .. }
            | BuildError::StackingInvariant { violations, .. } => violations,
            _ => &[],
        }
    }

    /// True when the inputs were rejected, as opposed to a malformed matrix
    /// or a serialization fault.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            BuildError::Configuration { .. }
                | BuildError::LayoutInfeasible { .. }
                | BuildError::StackingInvariant { .. }
                | BuildError::Placement(_)
                | BuildError::Stacking(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    /// Pin the timestamp so repeated builds are byte-identical.
    pub deterministic: bool,
    /// Explicit timestamp; wins over both modes when set.
    pub generated_at: Option<DateTime<Utc>>,
    pub canonical_face: Face,
    pub print: PrintProfile,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            deterministic: true,
            generated_at: None,
            canonical_face: Face::Front,
            print: PrintProfile::default(),
        }
    }
}

impl BuildOptions {
    fn timestamp(&self) -> DateTime<Utc> {
        match (self.generated_at, self.deterministic) {
            (Some(at), _) => at,
            (None, true) => DateTime::<Utc>::default(),
            (None, false) => Utc::now(),
        }
    }
}

/// Everything one build produced. The document is the record; the other
/// fields are the intermediate stages it was assembled from.
#[derive(Debug, Clone)]
pub struct TagBuild {
    pub report: ValidationReport,
    pub computed: ComputedGeometry,
    pub grid: ModuleGrid,
    pub resample: ResampleReport,
    pub keep_outs: Vec<KeepOut>,
    pub placements: Vec<TextPlacement>,
    pub stacking: StackingDescriptor,
    pub print: PrintProfile,
    pub document: ExportDocument,
}

impl TagBuild {
    pub fn digest(&self) -> Result<String, BuildError> {
        Ok(self.document.digest()?)
    }

    pub fn vector(&self) -> VectorDocument {
        vector_document(&self.document, &self.grid)
    }

    pub fn solid(&self) -> SolidParameters {
        solid_parameters(&self.document, &self.vector(), &self.print)
    }
}

/// The build pipeline - single entry point for tag geometry
pub struct TagPipeline {
    config: TagConfig,
    options: BuildOptions,
    validator: Validator,
}

impl TagPipeline {
    pub fn new(config: TagConfig, options: BuildOptions) -> Self {
        Self {
            config,
            options,
            validator: Validator::new(),
        }
    }

    pub fn config(&self) -> &TagConfig {
        &self.config
    }

    /// This is the ONLY validation entry point.
    pub fn validate(&self) -> ValidationReport {
        #[cfg(feature = "test-hooks")]
        VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        let report = self.validator.validate(&self.config);
        for w in &report.warnings {
            warn!(rule = %w.rule, field = %w.field, "{}", w.message);
        }
        report
    }

    fn validated(&self) -> Result<ValidationReport, BuildError> {
        let report = self.validate();
        if report.has_errors() {
            debug!(violations = report.violations.len(), "validation rejected configuration");
            return Err(BuildError::from_report(&report));
        }
        Ok(report)
    }

    /// Validated layout only, for callers that preview without a matrix.
    pub fn layout(&self) -> Result<ComputedGeometry, BuildError> {
        self.validated()?;
        Ok(compute_layout(&self.config))
    }

    /// Stacking for the configured material and canonical face. Keep-outs
    /// depend on it, since physical features read reflected on the mirrored
    /// face.
    pub fn stacking(&self) -> Result<StackingDescriptor, BuildError> {
        let m = &self.config.material;
        Ok(resolve_stacking_with(m.total_thickness, m.web_thickness, self.options.canonical_face)?)
    }

    /// Build from an already-encoded matrix.
    ///
    /// CRITICAL: This ALWAYS validates first. No bypass possible.
    pub fn build(&self, source: &ModuleGrid, requests: &[TextRequest]) -> Result<TagBuild, BuildError> {
        info!(
            modules = self.config.modules,
            module_size = self.config.module_size,
            blocks = requests.len(),
            "building tag"
        );

        let report = self.validated()?;

        let computed = compute_layout(&self.config);
        debug!(
            left_col = computed.left_col_width,
            right_col = computed.right_col_width,
            qr_data = computed.qr_data_size,
            "layout computed"
        );

        let target = self.config.modules as usize;
        let grid = resolve(source, target)?;
        let resample = ResampleReport::new(source.size(), target);
        if resample.lossy {
            warn!(
                source = resample.source_size,
                target = resample.target_size,
                "QR matrix resampled; scan integrity is not guaranteed"
            );
        }

        let stacking = self.stacking()?;
        debug!(half_depth = stacking.half_depth, mirrored = stacking.mirrored_face().as_str(), "stacking resolved");

        let keep_outs = derive_keep_outs(&self.config, &computed, &stacking);
        let placements = layout_text(&self.config, &computed, &keep_outs, requests)?;
        debug!(lines = placements.len(), "text placed");

        let meta = GenerationMeta::new(&self.config, &grid, self.options.timestamp(), report.warnings.clone())?;
        let document = export(&self.config, &computed, &grid, &resample, &placements, &stacking, meta);
        info!(build_id = %document.meta.build_id, "tag built");

        Ok(TagBuild {
            report,
            computed,
            grid,
            resample,
            keep_outs,
            placements,
            stacking,
            print: self.options.print.clone(),
            document,
        })
    }

    /// Encode `payload` with an injected encoder, then build.
    pub fn build_with_encoder(
        &self,
        encoder: &dyn QrEncoder,
        payload: &str,
        requests: &[TextRequest],
    ) -> Result<TagBuild, BuildError> {
        let source = encoder.encode(payload)?;
        self.build(&source, requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker_grid(n: usize) -> ModuleGrid {
        let cells = (0..n * n).map(|i| (i / n + i % n) % 2 == 0).collect();
        ModuleGrid::from_cells(n, cells).unwrap()
    }

    #[test]
    fn test_deterministic_timestamp_is_epoch() {
        let opts = BuildOptions::default();
        assert_eq!(opts.timestamp().timestamp(), 0);
    }

    #[test]
    fn test_explicit_timestamp_wins() {
        let at = DateTime::<Utc>::default() + chrono::Duration::seconds(42);
        let opts = BuildOptions {
            generated_at: Some(at),
            ..BuildOptions::default()
        };
        assert_eq!(opts.timestamp(), at);
    }

    #[test]
    fn test_build_default_config_without_text() {
        let pipeline = TagPipeline::new(TagConfig::default(), BuildOptions::default());
        let build = pipeline.build(&checker_grid(37), &[]).unwrap();
        assert!(!build.resample.lossy);
        assert_eq!(build.document.qr.size, 37);
        assert_eq!(build.document.meta.generated_at.timestamp(), 0);
    }

    #[test]
    fn test_invalid_config_is_classified() {
        let config = TagConfig {
            module_size: 6.0,
            ..TagConfig::default()
        };
        let err = TagPipeline::new(config, BuildOptions::default())
            .build(&checker_grid(37), &[])
            .unwrap_err();
        assert!(err.is_rejection());
        assert!(!err.violations().is_empty());
    }

    #[test]
    fn test_encoder_failure_surfaces() {
        let pipeline = TagPipeline::new(TagConfig::default(), BuildOptions::default());
        let failing = |_: &str| -> Result<ModuleGrid, QrError> { Err(QrError::Encoder("no backend".into())) };
        let err = pipeline.build_with_encoder(&failing, "https://example.org", &[]).unwrap_err();
        assert!(matches!(err, BuildError::Qr(QrError::Encoder(_))));
        assert!(!err.is_rejection());
    }
}
