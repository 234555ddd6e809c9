//! Validation System - Rule/Policy Separation
//!
//! Rules produce structured violations against a `TagConfig`.
//! Errors block the build; warnings are advisory and reported separately.

use serde::{Deserialize, Serialize};

use crate::config::{FontRole, TagConfig};
use crate::layout::{compute_layout, ColumnBudget};

pub const MIN_CANVAS_WIDTH: f64 = 40.0;
pub const MIN_CANVAS_HEIGHT: f64 = 25.0;
pub const QR_MIN_MODULES: u32 = 21;
pub const QR_MAX_MODULES: u32 = 177;
pub const MIN_MODULE_SIZE: f64 = 0.5;
pub const MAX_MODULE_SIZE: f64 = 10.0;
/// Below this module size scanning gets unreliable on printed plastic.
pub const RECOMMENDED_MODULE_SIZE: f64 = 1.8;
/// Narrowest right column that still carries legible contact text.
pub const MIN_TEXT_COLUMN: f64 = 20.0;
pub const RECOMMENDED_FONT_SIZE: f64 = 2.5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
}

/// Which failure class a violation belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationClass {
    /// A value outside its admissible range.
    Configuration,
    /// Valid values whose combined geometry cannot work.
    LayoutInfeasible,
    /// Web thickness not below total thickness.
    StackingInvariant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationViolation {
    pub rule: String,
    pub field: String,
    pub class: ViolationClass,
    pub severity: ViolationSeverity,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub remediation: Vec<String>,
}

impl ValidationViolation {
    fn new(
        rule: &str,
        field: &str,
        class: ViolationClass,
        severity: ViolationSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.to_string(),
            field: field.to_string(),
            class,
            severity,
            message: message.into(),
            expected: None,
            actual: None,
            remediation: vec![],
        }
    }

    fn error(rule: &str, field: &str, class: ViolationClass, message: impl Into<String>) -> Self {
        Self::new(rule, field, class, ViolationSeverity::Error, message)
    }

    fn warning(rule: &str, field: &str, message: impl Into<String>) -> Self {
        Self::new(rule, field, ViolationClass::Configuration, ViolationSeverity::Warning, message)
    }

    fn classed(mut self, class: ViolationClass) -> Self {
        self.class = class;
        self
    }

    fn values(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    fn fix(mut self, hint: &str) -> Self {
        self.remediation.push(hint.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationReport {
    pub valid: bool,
    /// Hard violations; any entry means "do not proceed".
    pub violations: Vec<ValidationViolation>,
    /// Advisory findings that never block.
    pub warnings: Vec<ValidationViolation>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        !self.violations.is_empty()
    }

    pub fn has_class(&self, class: ViolationClass) -> bool {
        self.violations.iter().any(|v| v.class == class)
    }

    pub fn summary(&self) -> String {
        self.violations
            .iter()
            .map(|v| format!("{} ({}): {}", v.rule, v.field, v.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validation rule trait - produces violations
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn validate(&self, config: &TagConfig) -> Vec<ValidationViolation>;
}

// --- Concrete Rules ---

/// Every size strictly positive, every spacing non-negative, all finite.
pub struct DimensionRule;

impl DimensionRule {
    fn sizes(c: &TagConfig) -> Vec<(String, f64)> {
        let mut sizes = vec![
            ("canvasWidth".to_string(), c.canvas_width),
            ("canvasHeight".to_string(), c.canvas_height),
            ("moduleSize".to_string(), c.module_size),
            ("slit.width".to_string(), c.slit.width),
            ("slit.height".to_string(), c.slit.height),
            ("material.minWall".to_string(), c.material.min_wall),
            ("material.webThickness".to_string(), c.material.web_thickness),
            ("material.totalThickness".to_string(), c.material.total_thickness),
            ("material.islandHeight".to_string(), c.material.island_height),
            ("material.engraveDepth".to_string(), c.material.engrave_depth),
        ];
        sizes.extend(
            FontRole::ALL
                .iter()
                .map(|r| (format!("fonts.{}", r.as_str()), c.font_size(*r))),
        );
        if let Some(nfc) = &c.nfc {
            sizes.push(("nfc.diameter".to_string(), nfc.diameter));
            sizes.push(("nfc.depth".to_string(), nfc.depth));
        }
        sizes
    }

    fn spacings(c: &TagConfig) -> Vec<(String, f64)> {
        let mut spacings = vec![
            ("gutter".to_string(), c.gutter),
            ("cornerRadius".to_string(), c.corner_radius),
            ("lineGap".to_string(), c.line_gap),
            ("slit.marginLeft".to_string(), c.slit.margin_left),
            ("slit.marginRight".to_string(), c.slit.margin_right),
        ];
        for (group, insets) in [
            ("margin", &c.margin),
            ("qrPadding", &c.qr_padding),
            ("textPadding", &c.text_padding),
        ] {
            spacings.extend(insets.sides().iter().map(|(side, v)| (format!("{group}.{side}"), *v)));
        }
        spacings
    }
}

impl ValidationRule for DimensionRule {
    fn name(&self) -> &'static str { "dimension" }

    fn validate(&self, config: &TagConfig) -> Vec<ValidationViolation> {
        let mut violations = vec![];

        for (field, v) in Self::sizes(config) {
            if !v.is_finite() || v <= 0.0 {
                violations.push(
                    ValidationViolation::error(self.name(), &field, ViolationClass::Configuration, "Length must be positive")
                        .values("> 0 mm", format!("{v}")),
                );
            }
        }
        for (field, v) in Self::spacings(config) {
            if !v.is_finite() || v < 0.0 {
                violations.push(
                    ValidationViolation::error(self.name(), &field, ViolationClass::Configuration, "Spacing must not be negative")
                        .values(">= 0 mm", format!("{v}")),
                );
            }
        }
        violations
    }
}

pub struct CanvasRule;

impl ValidationRule for CanvasRule {
    fn name(&self) -> &'static str { "canvas" }

    fn validate(&self, config: &TagConfig) -> Vec<ValidationViolation> {
        let mut violations = vec![];
        if config.canvas_width < MIN_CANVAS_WIDTH {
            violations.push(
                ValidationViolation::error(self.name(), "canvasWidth", ViolationClass::Configuration, "Canvas too narrow")
                    .values(format!(">= {MIN_CANVAS_WIDTH} mm"), format!("{} mm", config.canvas_width)),
            );
        }
        if config.canvas_height < MIN_CANVAS_HEIGHT {
            violations.push(
                ValidationViolation::error(self.name(), "canvasHeight", ViolationClass::Configuration, "Canvas too short")
                    .values(format!(">= {MIN_CANVAS_HEIGHT} mm"), format!("{} mm", config.canvas_height)),
            );
        }
        violations
    }
}

pub struct ModuleCountRule;

impl ValidationRule for ModuleCountRule {
    fn name(&self) -> &'static str { "module_count" }

    fn validate(&self, config: &TagConfig) -> Vec<ValidationViolation> {
        let n = config.modules;
        if !(QR_MIN_MODULES..=QR_MAX_MODULES).contains(&n) {
            return vec![
                ValidationViolation::error(self.name(), "modules", ViolationClass::Configuration, "Module count outside the QR version range")
                    .values(format!("{QR_MIN_MODULES}..={QR_MAX_MODULES}"), n.to_string())
                    .fix("Use the module count of a QR version 1-40 symbol"),
            ];
        }
        if (n - 17) % 4 != 0 {
            return vec![
                ValidationViolation::warning(self.name(), "modules", "Module count is not a native QR symbol size; the symbol will be resampled")
                    .values("17 + 4 * version", n.to_string()),
            ];
        }
        vec![]
    }
}

/// Hard range plus an advisory floor: below the floor only warns.
pub struct ModuleSizeRule;

impl ValidationRule for ModuleSizeRule {
    fn name(&self) -> &'static str { "module_size" }

    fn validate(&self, config: &TagConfig) -> Vec<ValidationViolation> {
        let s = config.module_size;
        if !(MIN_MODULE_SIZE..=MAX_MODULE_SIZE).contains(&s) {
            return vec![
                ValidationViolation::error(self.name(), "moduleSize", ViolationClass::Configuration, "Module size outside the printable range")
                    .values(format!("{MIN_MODULE_SIZE}..={MAX_MODULE_SIZE} mm"), format!("{s} mm")),
            ];
        }
        if s < RECOMMENDED_MODULE_SIZE {
            return vec![
                ValidationViolation::warning(self.name(), "moduleSize", "Module size below the recommended minimum; scans may fail")
                    .values(format!(">= {RECOMMENDED_MODULE_SIZE} mm"), format!("{s} mm"))
                    .fix("Increase moduleSize or reduce the payload length"),
            ];
        }
        vec![]
    }
}

/// Column budget: the QR box and text column must both fit the content area.
pub struct ColumnRule;

impl ValidationRule for ColumnRule {
    fn name(&self) -> &'static str { "columns" }

    fn validate(&self, config: &TagConfig) -> Vec<ValidationViolation> {
        let b = ColumnBudget::measure(config);
        let mut violations = vec![];

        if b.left_col_width > b.content_width {
            violations.push(
                ValidationViolation::error(self.name(), "leftColWidth", ViolationClass::LayoutInfeasible, "QR footprint wider than the content area")
                    .values(format!("<= {:.3} mm", b.content_width), format!("{:.3} mm", b.left_col_width))
                    .fix("Reduce moduleSize, quietModules or qrPadding"),
            );
        }
        let qr_h = b.qr_box_height(config);
        if qr_h > b.content_height {
            violations.push(
                ValidationViolation::error(self.name(), "qrFootprint", ViolationClass::LayoutInfeasible, "QR footprint taller than the content area")
                    .values(format!("<= {:.3} mm", b.content_height), format!("{:.3} mm", qr_h))
                    .fix("Reduce moduleSize or increase canvasHeight"),
            );
        }
        if b.right_col_width < MIN_TEXT_COLUMN {
            violations.push(
                ValidationViolation::error(self.name(), "rightColWidth", ViolationClass::LayoutInfeasible, "Right column too narrow for legible text")
                    .values(format!(">= {MIN_TEXT_COLUMN} mm"), format!("{:.3} mm", b.right_col_width))
                    .fix("Increase canvasWidth or reduce the QR footprint"),
            );
        }

        let area_w = b.right_col_width - config.text_padding.horizontal();
        let area_h = b.content_height - config.text_padding.vertical();
        if area_w <= 0.0 || area_h <= 0.0 {
            violations.push(
                ValidationViolation::error(self.name(), "textPadding", ViolationClass::LayoutInfeasible, "Text padding leaves no text area")
                    .values("> 0 mm each way", format!("{area_w:.3} x {area_h:.3} mm")),
            );
        }
        violations
    }
}

pub struct SlitRule;

impl ValidationRule for SlitRule {
    fn name(&self) -> &'static str { "slit" }

    fn validate(&self, config: &TagConfig) -> Vec<ValidationViolation> {
        let b = ColumnBudget::measure(config);
        let (_, slit_h) = config.slit.oriented_size();
        let mut violations = vec![];

        if slit_h + 2.0 * config.material.min_wall > b.content_height {
            violations.push(
                ValidationViolation::error(self.name(), "slit.height", ViolationClass::LayoutInfeasible, "Slit and its wall do not fit the content height")
                    .values(
                        format!("<= {:.3} mm", b.content_height),
                        format!("{:.3} mm", slit_h + 2.0 * config.material.min_wall),
                    ),
            );
        }
        if !config.slit.reserve_track {
            let (slit_w, _) = config.slit.oriented_size();
            let needed = config.slit.margin_right + slit_w;
            if needed > b.right_col_width {
                violations.push(
                    ValidationViolation::error(self.name(), "slit.width", ViolationClass::LayoutInfeasible, "Slit does not fit inside the text column")
                        .values(format!("<= {:.3} mm", b.right_col_width), format!("{needed:.3} mm")),
                );
            }
        }
        violations
    }
}

pub struct ThicknessRule;

impl ValidationRule for ThicknessRule {
    fn name(&self) -> &'static str { "thickness" }

    fn validate(&self, config: &TagConfig) -> Vec<ValidationViolation> {
        let m = &config.material;
        let mut violations = vec![];

        if m.web_thickness >= m.total_thickness {
            violations.push(
                ValidationViolation::error(self.name(), "material.webThickness", ViolationClass::StackingInvariant, "Web must be thinner than the body")
                    .values(format!("< {} mm", m.total_thickness), format!("{} mm", m.web_thickness)),
            );
        }
        if m.min_wall > m.total_thickness {
            violations.push(
                ValidationViolation::error(self.name(), "material.minWall", ViolationClass::Configuration, "Minimum wall exceeds body thickness")
                    .values(format!("<= {} mm", m.total_thickness), format!("{} mm", m.min_wall)),
            );
        }
        if m.total_thickness - m.engrave_depth < m.min_wall {
            violations.push(
                ValidationViolation::error(self.name(), "material.engraveDepth", ViolationClass::Configuration, "Engraving would leave less than the minimum wall")
                    .values(
                        format!("<= {:.3} mm", m.total_thickness - m.min_wall),
                        format!("{} mm", m.engrave_depth),
                    ),
            );
        }
        if let Some(nfc) = &config.nfc {
            let combined = nfc.depth + m.engrave_depth;
            if combined > m.total_thickness - m.min_wall {
                violations.push(
                    ValidationViolation::error(self.name(), "nfc.depth", ViolationClass::LayoutInfeasible, "Combined pocket depths too large")
                        .values(
                            format!("<= {:.3} mm", m.total_thickness - m.min_wall),
                            format!("{combined:.3} mm"),
                        )
                        .fix("Reduce nfc.depth or material.engraveDepth"),
                );
            }
            let r = nfc.diameter / 2.0;
            let fits = nfc.offset_x.abs() + r <= config.canvas_width / 2.0
                && nfc.offset_y.abs() + r <= config.canvas_height / 2.0;
            if !fits {
                violations.push(
                    ValidationViolation::error(self.name(), "nfc.diameter", ViolationClass::LayoutInfeasible, "NFC recess extends past the canvas"),
                );
            }
        }
        violations
    }
}

/// The slit is cut once through the whole body, but the mirrored face
/// carries its QR reflected about the centre line. Flags a reflected footprint
/// that reaches into the slit's wall envelope. Advisory: the usual
/// QR-left, slit-right layout always collides on a symmetric canvas.
pub struct MirrorClearanceRule;

impl ValidationRule for MirrorClearanceRule {
    fn name(&self) -> &'static str { "mirror_clearance" }

    fn validate(&self, config: &TagConfig) -> Vec<ValidationViolation> {
        let g = compute_layout(config);
        let envelope = g.slit.grow(config.material.min_wall);
        let reflected = g.qr_footprint.mirrored_x();

        match envelope.penetration(&reflected) {
            Some((axis, overlap)) => vec![
                ValidationViolation::warning(self.name(), "qrFootprint", "Mirrored QR footprint crosses the strap slit on the opposite face")
                    .classed(ViolationClass::LayoutInfeasible)
                    .values("clear of the slit envelope", format!("{overlap:.3} mm overlap on {axis}"))
                    .fix("Widen qrPadding.left until the reflected footprint clears the slit track"),
            ],
            None => vec![],
        }
    }
}

pub struct FontRule;

impl ValidationRule for FontRule {
    fn name(&self) -> &'static str { "fonts" }

    fn validate(&self, config: &TagConfig) -> Vec<ValidationViolation> {
        let b = ColumnBudget::measure(config);
        let area_h = b.content_height - config.text_padding.vertical();
        let mut violations = vec![];

        for role in FontRole::ALL {
            let size = config.font_size(role);
            let field = format!("fonts.{}", role.as_str());
            if size > area_h {
                violations.push(
                    ValidationViolation::error(self.name(), &field, ViolationClass::LayoutInfeasible, "Font taller than the text area")
                        .values(format!("<= {area_h:.3} mm"), format!("{size} mm")),
                );
            } else if size > 0.0 && size < RECOMMENDED_FONT_SIZE {
                violations.push(
                    ValidationViolation::warning(self.name(), &field, "Font size may not resolve at common nozzle sizes")
                        .values(format!(">= {RECOMMENDED_FONT_SIZE} mm"), format!("{size} mm")),
                );
            }
        }
        violations
    }
}

/// Validator orchestrates rules and splits errors from warnings
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(DimensionRule),
                Box::new(CanvasRule),
                Box::new(ModuleCountRule),
                Box::new(ModuleSizeRule),
                Box::new(ColumnRule),
                Box::new(SlitRule),
                Box::new(ThicknessRule),
                Box::new(MirrorClearanceRule),
                Box::new(FontRule),
            ],
        }
    }

    pub fn validate(&self, config: &TagConfig) -> ValidationReport {
        let (violations, warnings): (Vec<_>, Vec<_>) = self
            .rules
            .iter()
            .flat_map(|rule| rule.validate(config))
            .partition(|v| v.severity == ViolationSeverity::Error);

        ValidationReport {
            valid: violations.is_empty(),
            violations,
            warnings,
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate(config: &TagConfig) -> ValidationReport {
    Validator::new().validate(config)
}
