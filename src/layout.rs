//! Layout Computer
//!
//! `compute_layout` turns a validated `TagConfig` into exact millimeter
//! geometry. It never rescales anything: a module size that overflows the QR
//! box is reported by the validator, and the layout honours it as declared.

use serde::{Deserialize, Serialize};

use crate::config::TagConfig;
use crate::geometry::{Point, Rect};

/// Column arithmetic shared by the layout and the validator, so both agree on
/// every width they talk about. Total for any finite input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnBudget {
    pub content_width: f64,
    pub content_height: f64,
    pub qr_data_size: f64,
    pub qr_footprint_size: f64,
    pub left_col_width: f64,
    pub slit_track_width: f64,
    pub right_col_width: f64,
}

impl ColumnBudget {
    pub fn measure(config: &TagConfig) -> Self {
        let content_width = config.canvas_width - config.margin.horizontal();
        let content_height = config.canvas_height - config.margin.vertical();
        let qr_footprint_size = config.qr_footprint();
        let left_col_width = qr_footprint_size + config.qr_padding.horizontal();
        let slit_track_width = config.slit.track_width();
        let right_col_width = content_width - left_col_width - config.gutter - slit_track_width;

        Self {
            content_width,
            content_height,
            qr_data_size: config.qr_data_size(),
            qr_footprint_size,
            left_col_width,
            slit_track_width,
            right_col_width,
        }
    }

    /// Height the QR box needs: footprint plus vertical padding.
    pub fn qr_box_height(&self, config: &TagConfig) -> f64 {
        self.qr_footprint_size + config.qr_padding.vertical()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedGeometry {
    pub canvas: Rect,
    pub content: Rect,
    pub content_width: f64,
    pub content_height: f64,
    pub qr_data_size: f64,
    pub qr_footprint_size: f64,
    pub left_col_width: f64,
    pub right_col_width: f64,
    pub slit_track_width: f64,
    pub qr_center: Point,
    /// Left column: footprint plus padding, full content height.
    pub qr_box: Rect,
    pub qr_footprint: Rect,
    pub qr_data: Rect,
    pub slit_center: Point,
    pub slit: Rect,
    pub text_column: Rect,
    pub text_area: Rect,
}

impl ComputedGeometry {
    /// Rectangle of module (`row`, `col`), row 0 at the top of the symbol.
    pub fn module_rect(&self, row: usize, col: usize, module_size: f64) -> Rect {
        let left = self.qr_data.left + col as f64 * module_size;
        let top = self.qr_data.top - row as f64 * module_size;
        Rect::from_edges(left, top - module_size, left + module_size, top)
    }
}

pub fn compute_layout(config: &TagConfig) -> ComputedGeometry {
    let budget = ColumnBudget::measure(config);

    let half_w = config.canvas_width / 2.0;
    let half_h = config.canvas_height / 2.0;
    let canvas = Rect::from_edges(-half_w, -half_h, half_w, half_h);
    let content = canvas.inset(&config.margin);

    let qr_box = Rect::from_edges(
        content.left,
        content.bottom,
        content.left + budget.left_col_width,
        content.top,
    );
    let qr_inner = qr_box.inset(&config.qr_padding);
    let quiet_offset = f64::from(config.quiet_modules) * config.module_size;
    let qr_center = Point::new(
        content.left + config.qr_padding.left + quiet_offset + budget.qr_data_size / 2.0,
        qr_inner.center().y,
    );
    let qr_footprint = Rect::from_center(qr_center, budget.qr_footprint_size, budget.qr_footprint_size);
    let qr_data = Rect::from_center(qr_center, budget.qr_data_size, budget.qr_data_size);

    let text_left = qr_box.right + config.gutter;
    let text_column = Rect::from_edges(
        text_left,
        content.bottom,
        text_left + budget.right_col_width,
        content.top,
    );
    let text_area = text_column.inset(&config.text_padding);

    let (slit_w, slit_h) = config.slit.oriented_size();
    let slit_x = if config.slit.reserve_track {
        text_column.right + config.slit.margin_left + config.slit.width.max(config.slit.height) / 2.0
    } else {
        content.right - config.slit.margin_right - slit_w / 2.0
    };
    let slit_center = Point::new(slit_x, content.center().y);
    let slit = Rect::from_center(slit_center, slit_w, slit_h);

    ComputedGeometry {
        canvas,
        content,
        content_width: budget.content_width,
        content_height: budget.content_height,
        qr_data_size: budget.qr_data_size,
        qr_footprint_size: budget.qr_footprint_size,
        left_col_width: budget.left_col_width,
        right_col_width: budget.right_col_width,
        slit_track_width: budget.slit_track_width,
        qr_center,
        qr_box,
        qr_footprint,
        qr_data,
        slit_center,
        slit,
        text_column,
        text_area,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SlitOrientation;
    use crate::geometry::Insets;

    fn scenario_a() -> TagConfig {
        TagConfig {
            canvas_width: 200.0,
            canvas_height: 74.0,
            modules: 29,
            module_size: 2.0,
            quiet_modules: 0,
            qr_padding: Insets::uniform(3.0),
            gutter: 3.0,
            ..TagConfig::default()
        }
    }

    #[test]
    fn test_left_column_scenario_a() {
        let g = compute_layout(&scenario_a());
        assert!((g.left_col_width - 64.0).abs() < 1e-9);
        assert!((g.qr_data_size - 58.0).abs() < 1e-9);
        assert_eq!(g.qr_footprint_size, g.qr_data_size);
    }

    #[test]
    fn test_columns_partition_content_width() {
        let c = scenario_a();
        let g = compute_layout(&c);
        let sum = g.left_col_width + c.gutter + g.right_col_width + g.slit_track_width;
        assert!((sum - g.content_width).abs() < 1e-9);
        assert!((g.text_column.right + g.slit_track_width - g.content.right).abs() < 1e-9);
    }

    #[test]
    fn test_qr_center_includes_quiet_offset() {
        let c = TagConfig { quiet_modules: 2, ..scenario_a() };
        let g = compute_layout(&c);
        let expected_x = g.content.left + 3.0 + 2.0 * 2.0 + 29.0;
        assert!((g.qr_center.x - expected_x).abs() < 1e-9);
        assert!((g.qr_footprint.left - (g.content.left + 3.0)).abs() < 1e-9);
        assert!(g.qr_center.y.abs() < 1e-9);
    }

    #[test]
    fn test_text_area_is_padded_column() {
        let c = scenario_a();
        let g = compute_layout(&c);
        assert_eq!(g.text_area, g.text_column.inset(&c.text_padding));
    }

    #[test]
    fn test_slit_orientation_does_not_move_columns() {
        let v = compute_layout(&scenario_a());
        let mut c = scenario_a();
        c.slit.orientation = SlitOrientation::Horizontal;
        let h = compute_layout(&c);
        assert_eq!(v.text_column, h.text_column);
        assert_eq!(v.slit_center, h.slit_center);
        assert!((h.slit.width() - 20.0).abs() < 1e-9);
        assert!(h.slit.right <= h.content.right + 1e-9);
    }

    #[test]
    fn test_recompute_is_bit_identical() {
        let c = TagConfig::default();
        assert_eq!(compute_layout(&c), compute_layout(&c));
    }

    #[test]
    fn test_module_rect_top_left() {
        let c = scenario_a();
        let g = compute_layout(&c);
        let r = g.module_rect(0, 0, c.module_size);
        assert!((r.left - g.qr_data.left).abs() < 1e-9);
        assert!((r.top - g.qr_data.top).abs() < 1e-9);
        let last = g.module_rect(28, 28, c.module_size);
        assert!((last.right - g.qr_data.right).abs() < 1e-9);
        assert!((last.bottom - g.qr_data.bottom).abs() < 1e-9);
    }
}
