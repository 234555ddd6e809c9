//! Geometry Exporter
//!
//! One build produces one `ExportDocument`; the preview renderer, the
//! fabrication exporter and the determinism check all read that same record.
//! The vector and solid variants are projections of it, never recomputations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use thiserror::Error;
use uuid::Uuid;

use crate::config::TagConfig;
use crate::geometry::{Disc, Point, Rect};
use crate::hashing::{canonical_json, compute_digest, compute_input_hash};
use crate::layout::ComputedGeometry;
use crate::print::PrintProfile;
use crate::qr::{ModuleGrid, ResampleReport};
use crate::stacking::{Face, StackingDescriptor};
use crate::text::TextPlacement;
use crate::validation::ValidationViolation;
use crate::{ENGINE_VERSION, GENERATOR_NAME};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid version string: {0}")]
    InvalidVersion(#[from] semver::Error),

    #[error("Document written by {generator} {document}, this engine is {engine}")]
    IncompatibleVersion {
        generator: String,
        document: String,
        engine: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMeta {
    pub generator: String,
    pub version: String,
    pub generated_at: DateTime<Utc>,
    /// UUID v5 of the input hash: same inputs, same id.
    pub build_id: Uuid,
    pub input_hash: String,
    #[serde(default)]
    pub warnings: Vec<ValidationViolation>,
}

impl GenerationMeta {
    pub fn new(
        config: &TagConfig,
        grid: &ModuleGrid,
        generated_at: DateTime<Utc>,
        warnings: Vec<ValidationViolation>,
    ) -> Result<Self, ExportError> {
        let input_hash = compute_input_hash(GENERATOR_NAME, ENGINE_VERSION, config, &grid.digest())?;
        Ok(Self {
            generator: GENERATOR_NAME.to_string(),
            version: ENGINE_VERSION.to_string(),
            generated_at,
            build_id: Uuid::new_v5(&Uuid::NAMESPACE_OID, input_hash.as_bytes()),
            input_hash,
            warnings,
        })
    }
}

/// Reference to the resolved grid: enough to rebuild and to verify it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrSummary {
    pub size: usize,
    pub source_size: usize,
    pub module_size: f64,
    pub dark_modules: usize,
    pub lossy: bool,
    pub scale: f64,
    pub digest: String,
    /// Row-major bits, MSB first, base64.
    pub packed: String,
}

impl QrSummary {
    pub fn new(grid: &ModuleGrid, resample: &ResampleReport, module_size: f64) -> Self {
        Self {
            size: grid.size(),
            source_size: resample.source_size,
            module_size,
            dark_modules: grid.dark_count(),
            lossy: resample.lossy,
            scale: resample.scale,
            digest: grid.digest(),
            packed: grid.packed_base64(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub input: TagConfig,
    pub computed: ComputedGeometry,
    pub qr: QrSummary,
    pub placements: Vec<TextPlacement>,
    pub stacking: StackingDescriptor,
    pub meta: GenerationMeta,
}

pub fn export(
    config: &TagConfig,
    computed: &ComputedGeometry,
    grid: &ModuleGrid,
    resample: &ResampleReport,
    placements: &[TextPlacement],
    stacking: &StackingDescriptor,
    meta: GenerationMeta,
) -> ExportDocument {
    ExportDocument {
        input: config.clone(),
        computed: computed.clone(),
        qr: QrSummary::new(grid, resample, config.module_size),
        placements: placements.to_vec(),
        stacking: stacking.clone(),
        meta,
    }
}

impl ExportDocument {
    pub fn to_canonical_json(&self) -> Result<String, ExportError> {
        Ok(canonical_json(self)?)
    }

    pub fn digest(&self) -> Result<String, ExportError> {
        Ok(compute_digest(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, ExportError> {
        Ok(serde_json::from_str(s)?)
    }

    /// A document is readable when it comes from the same major version and is
    /// not newer than this engine.
    pub fn check_compatible(&self) -> Result<(), ExportError> {
        let engine = semver::Version::parse(ENGINE_VERSION)?;
        let document = semver::Version::parse(&self.meta.version)?;

        if document.major != engine.major || document > engine {
            return Err(ExportError::IncompatibleVersion {
                generator: self.meta.generator.clone(),
                document: document.to_string(),
                engine: engine.to_string(),
            });
        }
        Ok(())
    }
}

// --- Vector variant ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRect {
    pub row: usize,
    pub col: usize,
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextBox {
    pub block: String,
    pub text: String,
    pub font_size: f64,
    pub rotation: u16,
    pub rect: Rect,
}

/// Rounded slot: the ends are semicircles of `radius`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlitCutout {
    pub rect: Rect,
    pub radius: f64,
}

impl SlitCutout {
    fn from_computed(computed: &ComputedGeometry) -> Self {
        Self {
            rect: computed.slit,
            radius: computed.slit.width().min(computed.slit.height()) / 2.0,
        }
    }
}

/// One face as fabricated. Artwork is run through the face's stacking
/// transform; the outline, slit and NFC pocket are physical and identical in
/// every group that carries them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorGroup {
    pub face: Face,
    pub mirrored: bool,
    pub outline: Rect,
    pub corner_radius: f64,
    pub modules: Vec<ModuleRect>,
    pub texts: Vec<TextBox>,
    pub slit: SlitCutout,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nfc: Option<Disc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorDocument {
    pub width: f64,
    pub height: f64,
    pub groups: Vec<VectorGroup>,
}

fn face_group(doc: &ExportDocument, grid: &ModuleGrid, face: Face) -> VectorGroup {
    let stack = doc.stacking.face(face);
    let c = &doc.computed;
    let module_size = doc.input.module_size;

    let modules = grid
        .dark_cells()
        .map(|(row, col)| ModuleRect {
            row,
            col,
            rect: stack.transform_rect(&c.module_rect(row, col, module_size)),
        })
        .collect();

    let texts = doc
        .placements
        .iter()
        .filter(|p| p.face == face)
        .map(|p| TextBox {
            block: p.block.clone(),
            text: p.text.clone(),
            font_size: p.font_size,
            rotation: p.rotation,
            rect: stack.transform_rect(&p.rect),
        })
        .collect();

    VectorGroup {
        face,
        mirrored: stack.mirrored,
        outline: c.canvas,
        corner_radius: doc.input.corner_radius,
        modules,
        texts,
        slit: SlitCutout::from_computed(c),
        nfc: doc.input.nfc.filter(|_| face == Face::Back).map(|n| n.disc()),
    }
}

/// Front and back groups in the fabrication frame.
pub fn vector_document(doc: &ExportDocument, grid: &ModuleGrid) -> VectorDocument {
    VectorDocument {
        width: doc.input.canvas_width,
        height: doc.input.canvas_height,
        groups: vec![
            face_group(doc, grid, Face::Front),
            face_group(doc, grid, Face::Back),
        ],
    }
}

/// Gap between the front and back panels in the SVG sheet.
const SHEET_GAP: f64 = 10.0;

fn mm(v: f64) -> String {
    let s = format!("{v:.3}");
    if s == "-0.000" {
        "0.000".to_string()
    } else {
        s
    }
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

impl VectorDocument {
    /// SVG sheet with both faces side by side, in millimetres, top-left origin.
    /// Each face carries `base-outline`, `qr-modules`, `text-features` and
    /// `slit-cutout` layers, plus `nfc-recess` on the face that has the pocket.
    pub fn to_svg(&self) -> String {
        let (w, h) = (self.width, self.height);
        let sheet_w = w * self.groups.len() as f64 + SHEET_GAP * (self.groups.len().saturating_sub(1)) as f64;
        let to_svg = |r: &Rect| (r.left + w / 2.0, h / 2.0 - r.top, r.width(), r.height());

        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{sw}mm" height="{h}mm" viewBox="0 0 {sw} {h}">"#,
            sw = mm(sheet_w),
            h = mm(h),
        );

        for (i, g) in self.groups.iter().enumerate() {
            let face = g.face.as_str();
            let dx = i as f64 * (w + SHEET_GAP);
            let _ = writeln!(
                svg,
                r#"  <g id="{face}" data-mirrored="{}" transform="translate({} 0)">"#,
                g.mirrored,
                mm(dx)
            );

            let (x, y, rw, rh) = to_svg(&g.outline);
            let _ = writeln!(
                svg,
                r#"    <g id="{face}-base-outline" data-layer="base-outline"><rect class="base-shape" x="{}" y="{}" width="{}" height="{}" rx="{}"/></g>"#,
                mm(x), mm(y), mm(rw), mm(rh), mm(g.corner_radius)
            );

            let _ = writeln!(svg, r#"    <g id="{face}-qr-modules" data-layer="qr-modules">"#);
            for m in &g.modules {
                let (x, y, rw, rh) = to_svg(&m.rect);
                let _ = writeln!(
                    svg,
                    r#"      <rect class="qr-module" data-row="{}" data-col="{}" x="{}" y="{}" width="{}" height="{}"/>"#,
                    m.row, m.col, mm(x), mm(y), mm(rw), mm(rh)
                );
            }
            svg.push_str("    </g>\n");

            let _ = writeln!(svg, r#"    <g id="{face}-text-features" data-layer="text-features">"#);
            for t in &g.texts {
                let (x, y, rw, rh) = to_svg(&t.rect);
                let _ = writeln!(
                    svg,
                    r#"      <rect class="text-box" data-block="{}" data-text="{}" data-font-size="{}" data-rotation="{}" x="{}" y="{}" width="{}" height="{}"/>"#,
                    xml_escape(&t.block),
                    xml_escape(&t.text),
                    mm(t.font_size),
                    t.rotation,
                    mm(x), mm(y), mm(rw), mm(rh)
                );
            }
            svg.push_str("    </g>\n");

            let (x, y, rw, rh) = to_svg(&g.slit.rect);
            let _ = writeln!(
                svg,
                r#"    <g id="{face}-slit-cutout" data-layer="slit-cutout"><rect class="slit-cutout" x="{}" y="{}" width="{}" height="{}" rx="{}"/></g>"#,
                mm(x), mm(y), mm(rw), mm(rh), mm(g.slit.radius)
            );
            if let Some(d) = &g.nfc {
                let _ = writeln!(
                    svg,
                    r#"    <g id="{face}-nfc-recess" data-layer="nfc-recess"><circle class="nfc-recess" cx="{}" cy="{}" r="{}"/></g>"#,
                    mm(d.center.x + w / 2.0), mm(h / 2.0 - d.center.y), mm(d.radius)
                );
            }
            svg.push_str("  </g>\n");
        }

        svg.push_str("</svg>\n");
        svg
    }
}

// --- Solid-modelling variant ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyParameters {
    pub width: f64,
    pub height: f64,
    pub thickness: f64,
    pub corner_radius: f64,
    pub min_wall: f64,
    pub island_height: f64,
    pub engrave_depth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolidFace {
    pub face: Face,
    pub mirrored: bool,
    pub z_range: [f64; 2],
    pub feature_depth: f64,
    pub modules: Vec<Rect>,
    pub texts: Vec<TextBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NfcParameters {
    pub center: Point,
    pub diameter: f64,
    pub depth: f64,
}

/// Everything a solid-modelling backend needs, with nothing left to derive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolidParameters {
    pub body: BodyParameters,
    pub web_thickness: f64,
    pub faces: Vec<SolidFace>,
    /// Through-cut in the fabrication frame.
    pub slit: SlitCutout,
    pub nfc: Option<NfcParameters>,
    pub print: PrintProfile,
    pub color_switch_layer: u32,
    pub build_id: Uuid,
}

pub fn solid_parameters(doc: &ExportDocument, vector: &VectorDocument, print: &PrintProfile) -> SolidParameters {
    let m = &doc.input.material;
    let faces = vector
        .groups
        .iter()
        .map(|g| {
            let stack = doc.stacking.face(g.face);
            SolidFace {
                face: g.face,
                mirrored: g.mirrored,
                z_range: stack.z_range,
                feature_depth: stack.feature_depth,
                modules: g.modules.iter().map(|mr| mr.rect).collect(),
                texts: g.texts.clone(),
            }
        })
        .collect();

    SolidParameters {
        body: BodyParameters {
            width: doc.input.canvas_width,
            height: doc.input.canvas_height,
            thickness: m.total_thickness,
            corner_radius: doc.input.corner_radius,
            min_wall: m.min_wall,
            island_height: m.island_height,
            engrave_depth: m.engrave_depth,
        },
        web_thickness: m.web_thickness,
        faces,
        slit: SlitCutout::from_computed(&doc.computed),
        nfc: doc.input.nfc.map(|n| NfcParameters {
            center: n.disc().center,
            diameter: n.diameter,
            depth: n.depth,
        }),
        print: print.clone(),
        color_switch_layer: print.color_switch_layer(m.island_height),
        build_id: doc.meta.build_id,
    }
}

impl SolidParameters {
    pub fn to_canonical_json(&self) -> Result<String, ExportError> {
        Ok(canonical_json(self)?)
    }
}
