//! Keep-Out & Text Layout Resolver
//!
//! Text is laid out strictly: every request either lands exactly where it was
//! asked to go or the whole call fails naming the block, the axis and the
//! extra space it would need. Nothing is shrunk or nudged.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{FontRole, TagConfig};
use crate::geometry::{Axis, Disc, Rect};
use crate::layout::ComputedGeometry;
use crate::stacking::{Face, StackingDescriptor};

/// Advance width per character as a fraction of the font size.
pub const ADVANCE_RATIO: f64 = 0.6;

pub fn estimate_width(text: &str, font_size: f64) -> f64 {
    text.chars().count() as f64 * font_size * ADVANCE_RATIO
}

// --- Keep-outs ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceScope {
    Both,
    Front,
    Back,
}

impl FaceScope {
    pub fn covers(&self, face: Face) -> bool {
        match self {
            FaceScope::Both => true,
            FaceScope::Front => face == Face::Front,
            FaceScope::Back => face == Face::Back,
        }
    }
}

impl From<Face> for FaceScope {
    fn from(face: Face) -> Self {
        match face {
            Face::Front => FaceScope::Front,
            Face::Back => FaceScope::Back,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum KeepOutShape {
    Rect { rect: Rect },
    Disc { disc: Disc },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeepOut {
    pub name: String,
    #[serde(flatten)]
    pub shape: KeepOutShape,
    pub scope: FaceScope,
}

impl KeepOut {
    pub fn penetration(&self, rect: &Rect) -> Option<(Axis, f64)> {
        match &self.shape {
            KeepOutShape::Rect { rect: r } => r.penetration(rect),
            KeepOutShape::Disc { disc } => disc.penetration(rect),
        }
    }
}

pub const QR_KEEP_OUT: &str = "qr-footprint";
pub const SLIT_KEEP_OUT: &str = "strap-slit";
pub const NFC_KEEP_OUT: &str = "nfc-recess";

/// Regions text must avoid, in each face's own reading frame.
///
/// The QR footprint is artwork and sits at the same place on both faces. The
/// strap slit and the NFC pocket are physical: they are fixed in the
/// fabrication frame, so on the mirrored face they appear reflected. The slit
/// envelope keeps `min_wall` of material around the cutout; the NFC pocket
/// only exists on the back face.
pub fn derive_keep_outs(
    config: &TagConfig,
    computed: &ComputedGeometry,
    stacking: &StackingDescriptor,
) -> Vec<KeepOut> {
    let envelope = computed.slit.grow(config.material.min_wall);

    let mut keep_outs = vec![KeepOut {
        name: QR_KEEP_OUT.to_string(),
        shape: KeepOutShape::Rect { rect: computed.qr_footprint },
        scope: FaceScope::Both,
    }];
    for face in [Face::Front, Face::Back] {
        keep_outs.push(KeepOut {
            name: SLIT_KEEP_OUT.to_string(),
            shape: KeepOutShape::Rect { rect: stacking.face(face).transform_rect(&envelope) },
            scope: face.into(),
        });
    }
    if let Some(nfc) = &config.nfc {
        keep_outs.push(KeepOut {
            name: NFC_KEEP_OUT.to_string(),
            shape: KeepOutShape::Disc { disc: stacking.face(Face::Back).transform_disc(&nfc.disc()) },
            scope: FaceScope::Back,
        });
    }
    keep_outs
}

// --- Requests ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Top,
    Bottom,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Start,
    Center,
    End,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextStyle {
    /// Raised by the island height.
    #[default]
    Emboss,
    /// Cut into one face by the engrave depth.
    Engrave,
}

/// A single line running along one edge of the text area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeText {
    pub id: String,
    pub text: String,
    pub edge: Edge,
    pub font: FontRole,
    #[serde(default)]
    pub font_size: Option<f64>,
    #[serde(default)]
    pub face: Face,
    #[serde(default)]
    pub style: TextStyle,
}

/// Multi-line text flowed top to bottom inside `region` (the text area when
/// unset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockText {
    pub id: String,
    pub lines: Vec<String>,
    pub font: FontRole,
    #[serde(default)]
    pub font_size: Option<f64>,
    #[serde(default = "back_face")]
    pub face: Face,
    #[serde(default)]
    pub style: TextStyle,
    #[serde(default)]
    pub align: Align,
    #[serde(default)]
    pub region: Option<Rect>,
}

fn back_face() -> Face {
    Face::Back
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TextRequest {
    Edge(EdgeText),
    Block(BlockText),
}

impl TextRequest {
    pub fn id(&self) -> &str {
        match self {
            TextRequest::Edge(e) => &e.id,
            TextRequest::Block(b) => &b.id,
        }
    }

    pub fn face(&self) -> Face {
        match self {
            TextRequest::Edge(e) => e.face,
            TextRequest::Block(b) => b.face,
        }
    }

    fn style(&self) -> TextStyle {
        match self {
            TextRequest::Edge(e) => e.style,
            TextRequest::Block(b) => b.style,
        }
    }

    fn font_size(&self, config: &TagConfig) -> f64 {
        match self {
            TextRequest::Edge(e) => e.font_size.unwrap_or_else(|| config.font_size(e.font)),
            TextRequest::Block(b) => b.font_size.unwrap_or_else(|| config.font_size(b.font)),
        }
    }
}

// --- Results ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPlacement {
    pub block: String,
    pub line: usize,
    pub text: String,
    pub font_size: f64,
    pub rect: Rect,
    pub face: Face,
    pub style: TextStyle,
    /// Counter-clockwise, degrees; 0 for horizontal runs.
    pub rotation: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge: Option<Edge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<Align>,
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "violation", rename_all = "camelCase")]
pub enum PlacementViolationKind {
    #[error("no text to place")]
    EmptyText,

    #[error("font size {size} mm is not a positive length")]
    InvalidFontSize { size: f64 },

    #[error("leaves the text area on {axis} by {shortfall:.3} mm")]
    OutsideTextArea { axis: Axis, shortfall: f64 },

    #[error("leaves its region on {axis} by {shortfall:.3} mm")]
    OutsideRegion { axis: Axis, shortfall: f64 },

    #[error("overlaps keep-out '{keep_out}' on {axis} by {overlap:.3} mm")]
    KeepOutOverlap { keep_out: String, axis: Axis, overlap: f64 },

    #[error("overlaps text block '{other}' on {axis} by {overlap:.3} mm")]
    BlockOverlap { other: String, axis: Axis, overlap: f64 },

    #[error("needs {required:.3} mm of edge span, {available:.3} mm available")]
    SpanExceeded { required: f64, available: f64 },

    #[error("engraving leaves {remaining:.3} mm of wall, minimum is {min_wall:.3} mm")]
    WallTooThin { remaining: f64, min_wall: f64 },
}

/// A rejected text request. `line` is set when a specific line failed.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("Text block '{block}'{} {kind}", .line.map(|l| format!(" line {l}")).unwrap_or_default())]
pub struct PlacementViolation {
    pub block: String,
    pub line: Option<usize>,
    pub kind: PlacementViolationKind,
}

impl PlacementViolation {
    /// Extra space (mm) the block needs to be accepted, where that is a length.
    pub fn required_space(&self) -> Option<f64> {
        match &self.kind {
            PlacementViolationKind::OutsideTextArea { shortfall, .. }
            | PlacementViolationKind::OutsideRegion { shortfall, .. } => Some(*shortfall),
            PlacementViolationKind::KeepOutOverlap { overlap, .. }
            | PlacementViolationKind::BlockOverlap { overlap, .. } => Some(*overlap),
            PlacementViolationKind::SpanExceeded { required, available } => {
                Some(required - available)
            }
            PlacementViolationKind::WallTooThin { remaining, min_wall } => Some(min_wall - remaining),
            _ => None,
        }
    }
}

// --- Layout ---

struct Checker<'a> {
    text_area: Rect,
    keep_outs: &'a [KeepOut],
    accepted: Vec<TextPlacement>,
}

impl Checker<'_> {
    fn check(&self, block: &str, line: usize, face: Face, rect: &Rect) -> Result<(), PlacementViolation> {
        let fail = |kind| PlacementViolation {
            block: block.to_string(),
            line: Some(line),
            kind,
        };

        if let Some((axis, shortfall)) = self.text_area.excess(rect) {
            return Err(fail(PlacementViolationKind::OutsideTextArea { axis, shortfall }));
        }
        for k in self.keep_outs.iter().filter(|k| k.scope.covers(face)) {
            if let Some((axis, overlap)) = k.penetration(rect) {
                return Err(fail(PlacementViolationKind::KeepOutOverlap {
                    keep_out: k.name.clone(),
                    axis,
                    overlap,
                }));
            }
        }
        for p in self.accepted.iter().filter(|p| p.face == face) {
            if let Some((axis, overlap)) = p.rect.penetration(rect) {
                return Err(fail(PlacementViolationKind::BlockOverlap {
                    other: p.block.clone(),
                    axis,
                    overlap,
                }));
            }
        }
        Ok(())
    }
}

/// Lay out `requests` in declaration order against the text area and
/// `keep_outs`. Fails on the first request that does not fit.
pub fn layout_text(
    config: &TagConfig,
    computed: &ComputedGeometry,
    keep_outs: &[KeepOut],
    requests: &[TextRequest],
) -> Result<Vec<TextPlacement>, PlacementViolation> {
    let mut checker = Checker {
        text_area: computed.text_area,
        keep_outs,
        accepted: vec![],
    };

    for request in requests {
        let block_fail = |kind| PlacementViolation {
            block: request.id().to_string(),
            line: None,
            kind,
        };

        let size = request.font_size(config);
        if !size.is_finite() || size <= 0.0 {
            return Err(block_fail(PlacementViolationKind::InvalidFontSize { size }));
        }

        if request.style() == TextStyle::Engrave {
            let remaining = config.material.total_thickness - config.material.engrave_depth;
            if remaining < config.material.min_wall {
                return Err(block_fail(PlacementViolationKind::WallTooThin {
                    remaining,
                    min_wall: config.material.min_wall,
                }));
            }
        }

        let (lines, region) = match request {
            TextRequest::Edge(e) => (
                vec![place_edge(e, size, config, &computed.text_area).map_err(block_fail)?],
                None,
            ),
            TextRequest::Block(b) => {
                if let Some(region) = &b.region {
                    if let Some((axis, shortfall)) = computed.text_area.excess(region) {
                        return Err(block_fail(PlacementViolationKind::OutsideTextArea { axis, shortfall }));
                    }
                }
                (place_block(b, size, config, &computed.text_area).map_err(block_fail)?, b.region)
            }
        };

        for p in &lines {
            if let Some((axis, shortfall)) = region.and_then(|r| r.excess(&p.rect)) {
                return Err(PlacementViolation {
                    block: p.block.clone(),
                    line: Some(p.line),
                    kind: PlacementViolationKind::OutsideRegion { axis, shortfall },
                });
            }
            checker.check(&p.block, p.line, p.face, &p.rect)?;
        }
        debug!(block = request.id(), lines = lines.len(), "text block accepted");
        checker.accepted.extend(lines);
    }

    Ok(checker.accepted)
}

fn place_edge(
    e: &EdgeText,
    size: f64,
    config: &TagConfig,
    area: &Rect,
) -> Result<TextPlacement, PlacementViolationKind> {
    if e.text.trim().is_empty() {
        return Err(PlacementViolationKind::EmptyText);
    }
    let run = estimate_width(&e.text, size);
    let corner = config.corner_radius;
    let horizontal = matches!(e.edge, Edge::Top | Edge::Bottom);
    let available = if horizontal {
        area.width() - 2.0 * corner
    } else {
        area.height() - 2.0 * corner
    };
    if run > available {
        return Err(PlacementViolationKind::SpanExceeded { required: run, available });
    }

    let c = area.center();
    let (rect, rotation) = match e.edge {
        Edge::Bottom => (
            Rect::from_edges(c.x - run / 2.0, area.bottom, c.x + run / 2.0, area.bottom + size),
            0,
        ),
        Edge::Top => (
            Rect::from_edges(c.x - run / 2.0, area.top - size, c.x + run / 2.0, area.top),
            0,
        ),
        Edge::Left => (
            Rect::from_edges(area.left, c.y - run / 2.0, area.left + size, c.y + run / 2.0),
            90,
        ),
        Edge::Right => (
            Rect::from_edges(area.right - size, c.y - run / 2.0, area.right, c.y + run / 2.0),
            270,
        ),
    };

    Ok(TextPlacement {
        block: e.id.clone(),
        line: 0,
        text: e.text.clone(),
        font_size: size,
        rect,
        face: e.face,
        style: e.style,
        rotation,
        edge: Some(e.edge),
        align: None,
    })
}

fn place_block(
    b: &BlockText,
    size: f64,
    config: &TagConfig,
    area: &Rect,
) -> Result<Vec<TextPlacement>, PlacementViolationKind> {
    if b.lines.iter().all(|l| l.trim().is_empty()) {
        return Err(PlacementViolationKind::EmptyText);
    }
    let region = b.region.unwrap_or(*area);
    let pitch = size + config.line_gap;

    Ok(b.lines
        .iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| {
            let top = region.top - i as f64 * pitch;
            let w = estimate_width(text, size);
            let left = match b.align {
                Align::Start => region.left,
                Align::Center => region.center().x - w / 2.0,
                Align::End => region.right - w,
            };
            TextPlacement {
                block: b.id.clone(),
                line: i,
                text: text.clone(),
                font_size: size,
                rect: Rect::from_edges(left, top - size, left + w, top),
                face: b.face,
                style: b.style,
                rotation: 0,
                edge: None,
                align: Some(b.align),
            }
        })
        .collect())
}
