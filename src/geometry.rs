//! Millimeter-space primitives.
//!
//! All coordinates are relative to the canvas centre with x to the right and
//! y up, so mirroring a face is a sign flip of x and nothing else.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => f.write_str("x"),
            Axis::Y => f.write_str("y"),
        }
    }
}

/// Four-sided spacing (margins, paddings).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Insets {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Insets {
    pub const fn uniform(v: f64) -> Self {
        Self { top: v, right: v, bottom: v, left: v }
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }

    pub fn sides(&self) -> [(&'static str, f64); 4] {
        [
            ("top", self.top),
            ("right", self.right),
            ("bottom", self.bottom),
            ("left", self.left),
        ]
    }
}

/// Axis-aligned rectangle stored by its edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rect {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl Rect {
    pub fn from_edges(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Self { left, bottom, right, top }
    }

    pub fn from_center(center: Point, width: f64, height: f64) -> Self {
        Self {
            left: center.x - width / 2.0,
            bottom: center.y - height / 2.0,
            right: center.x + width / 2.0,
            top: center.y + height / 2.0,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    pub fn center(&self) -> Point {
        Point::new((self.left + self.right) / 2.0, (self.bottom + self.top) / 2.0)
    }

    pub fn inset(&self, by: &Insets) -> Self {
        Self {
            left: self.left + by.left,
            bottom: self.bottom + by.bottom,
            right: self.right - by.right,
            top: self.top - by.top,
        }
    }

    pub fn grow(&self, by: f64) -> Self {
        Self {
            left: self.left - by,
            bottom: self.bottom - by,
            right: self.right + by,
            top: self.top + by,
        }
    }

    /// Reflection about the vertical axis through the canvas centre.
    pub fn mirrored_x(&self) -> Self {
        Self {
            left: -self.right,
            bottom: self.bottom,
            right: -self.left,
            top: self.top,
        }
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.left >= self.left
            && other.right <= self.right
            && other.bottom >= self.bottom
            && other.top <= self.top
    }

    /// Largest distance `other` sticks out of `self`, with the axis it does so on.
    /// `None` when fully contained.
    pub fn excess(&self, other: &Rect) -> Option<(Axis, f64)> {
        let x = (self.left - other.left).max(other.right - self.right).max(0.0);
        let y = (self.bottom - other.bottom).max(other.top - self.top).max(0.0);
        if x <= 0.0 && y <= 0.0 {
            None
        } else if x >= y {
            Some((Axis::X, x))
        } else {
            Some((Axis::Y, y))
        }
    }

    /// Overlap extents on both axes, `None` when the interiors are disjoint.
    /// Touching edges do not count as overlap.
    pub fn overlap(&self, other: &Rect) -> Option<(f64, f64)> {
        let x = self.right.min(other.right) - self.left.max(other.left);
        let y = self.top.min(other.top) - self.bottom.max(other.bottom);
        (x > 0.0 && y > 0.0).then_some((x, y))
    }

    /// Axis of least penetration and the distance needed to clear it.
    pub fn penetration(&self, other: &Rect) -> Option<(Axis, f64)> {
        self.overlap(other).map(|(x, y)| if x <= y { (Axis::X, x) } else { (Axis::Y, y) })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Disc {
    pub center: Point,
    pub radius: f64,
}

impl Disc {
    /// How far `rect` reaches into the disc, with the dominant axis.
    pub fn penetration(&self, rect: &Rect) -> Option<(Axis, f64)> {
        let c = self.center;
        let inside = c.x > rect.left && c.x < rect.right && c.y > rect.bottom && c.y < rect.top;
        if inside {
            let dx = (c.x - rect.left).min(rect.right - c.x);
            let dy = (c.y - rect.bottom).min(rect.top - c.y);
            return Some(if dx <= dy {
                (Axis::X, dx + self.radius)
            } else {
                (Axis::Y, dy + self.radius)
            });
        }

        let nx = c.x.clamp(rect.left, rect.right);
        let ny = c.y.clamp(rect.bottom, rect.top);
        let (vx, vy) = (c.x - nx, c.y - ny);
        let dist = vx.hypot(vy);
        if dist >= self.radius {
            return None;
        }
        let axis = if vx.abs() >= vy.abs() { Axis::X } else { Axis::Y };
        Some((axis, self.radius - dist))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_is_sign_flip() {
        let r = Rect::from_edges(10.0, -2.0, 30.0, 4.0);
        let m = r.mirrored_x();
        assert_eq!(m, Rect::from_edges(-30.0, -2.0, -10.0, 4.0));
        assert_eq!(m.mirrored_x(), r);
    }

    #[test]
    fn test_touching_rects_do_not_overlap() {
        let a = Rect::from_edges(0.0, 0.0, 10.0, 10.0);
        let b = Rect::from_edges(10.0, 0.0, 20.0, 10.0);
        assert!(a.overlap(&b).is_none());
    }

    #[test]
    fn test_penetration_picks_shallow_axis() {
        let a = Rect::from_edges(0.0, 0.0, 10.0, 10.0);
        let b = Rect::from_edges(8.0, 2.0, 20.0, 6.0);
        let (axis, depth) = a.penetration(&b).unwrap();
        assert_eq!(axis, Axis::X);
        assert!((depth - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_excess_reports_largest_side() {
        let area = Rect::from_edges(0.0, 0.0, 10.0, 10.0);
        assert!(area.excess(&Rect::from_edges(1.0, 1.0, 9.0, 9.0)).is_none());
        let (axis, by) = area.excess(&Rect::from_edges(1.0, 1.0, 9.0, 13.0)).unwrap();
        assert_eq!(axis, Axis::Y);
        assert!((by - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_disc_penetration() {
        let disc = Disc { center: Point::new(0.0, 0.0), radius: 5.0 };
        assert!(disc.penetration(&Rect::from_edges(6.0, -1.0, 9.0, 1.0)).is_none());
        let (axis, depth) = disc.penetration(&Rect::from_edges(4.0, -1.0, 9.0, 1.0)).unwrap();
        assert_eq!(axis, Axis::X);
        assert!((depth - 1.0).abs() < 1e-9);
    }
}
