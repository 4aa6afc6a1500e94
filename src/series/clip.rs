//! Line clipping against the plot rectangle.
//!
//! A Liang-Barsky style test against the four sides: intersections are
//! computed per side and validated against the orthogonal extent. Clip
//! points detected very near a corner by two sides at once are merged to
//! avoid sub-pixel spikes; the near-detection epsilon is deliberately wider
//! than the validity epsilon so any spurious double detection is caught.

use crate::geom::{BoundaryBox, Point};

/// Precision margins for clip detection, derived from the plot size.
#[derive(Debug, Clone, Copy)]
pub struct ClipEps {
    /// Corner near-detection distance.
    pub near: f64,
    /// Intersection validity margin.
    pub valid: f64,
}

impl ClipEps {
    /// Margins for a plot rectangle of the given extent.
    pub fn for_area(area: &BoundaryBox) -> Self {
        let near = area.width().max(area.height()) * crate::value::EPSILON;
        Self { near, valid: near * 0.1 }
    }
}

/// Clip the segment `p1..p2` against `bb`.
///
/// Returns the number of intersections (0, 1 or 2) and the clip points;
/// with two intersections they are ordered along the segment from `p1`.
pub fn clip_line(
    bb: &BoundaryBox,
    eps: &ClipEps,
    p1: Point,
    p2: Point,
) -> (usize, Point, Point) {
    let o1 = p1;

    let intersect_x = |x: f64, p1: Point, p2: Point| {
        let dx = p1.x - p2.x;
        let dy = p1.y - p2.y;
        let cp = p1.x * p2.y - p1.y * p2.x;
        (dy * x + cp) / dx
    };
    let intersect_y = |y: f64, p1: Point, p2: Point| {
        let dx = p1.x - p2.x;
        let dy = p1.y - p2.y;
        let cp = p1.x * p2.y - p1.y * p2.x;
        (dx * y - cp) / dy
    };
    let near = |a: Point, b: Point| (a.x - b.x).abs() < eps.near && (a.y - b.y).abs() < eps.near;

    let (mut p1, mut p2) = (p1, p2);

    let mut bot_x = 0.0;
    let mut bot_v = false;
    let mut top_x = 0.0;
    let mut top_v = false;
    let mut lft_y = 0.0;
    let mut lft_v = false;
    let mut rgt_y = 0.0;
    let mut rgt_v = false;

    // Bottom and top clippings.
    if p1.y > p2.y {
        std::mem::swap(&mut p1, &mut p2);
    }
    if p1.y < bb.min.y && p2.y >= bb.min.y {
        bot_x = intersect_y(bb.min.y, p1, p2);
        bot_v = bot_x > bb.min.x - eps.valid && bot_x < bb.max.x + eps.valid;
    }
    if p1.y <= bb.max.y && p2.y > bb.max.y {
        top_x = intersect_y(bb.max.y, p1, p2);
        top_v = top_x > bb.min.x - eps.valid && top_x < bb.max.x + eps.valid;
    }

    // Left and right clippings.
    if p1.x > p2.x {
        std::mem::swap(&mut p1, &mut p2);
    }
    if p1.x < bb.min.x && p2.x >= bb.min.x {
        lft_y = intersect_x(bb.min.x, p1, p2);
        lft_v = lft_y > bb.min.y - eps.valid && lft_y < bb.max.y + eps.valid;
    }
    if p1.x <= bb.max.x && p2.x > bb.max.x {
        rgt_y = intersect_x(bb.max.x, p1, p2);
        rgt_v = rgt_y > bb.min.y - eps.valid && rgt_y < bb.max.y + eps.valid;
    }

    let bot_c = Point::new(bot_x, bb.min.y);
    let top_c = Point::new(top_x, bb.max.y);
    let lft_c = Point::new(bb.min.x, lft_y);
    let rgt_c = Point::new(bb.max.x, rgt_y);

    // Merge near-corner double detections.
    if bot_v && lft_v && near(bot_c, lft_c) {
        lft_v = false;
    }
    if bot_v && rgt_v && near(bot_c, rgt_c) {
        rgt_v = false;
    }
    if top_v && lft_v && near(top_c, lft_c) {
        lft_v = false;
    }
    if top_v && rgt_v && near(top_c, rgt_c) {
        rgt_v = false;
    }

    let mut c1 = Point::default();
    let mut c2 = Point::default();
    let mut n = 0;
    for (v, c) in [(bot_v, bot_c), (top_v, top_c), (lft_v, lft_c), (rgt_v, rgt_c)] {
        if v {
            if n == 0 {
                c1 = c;
            } else {
                c2 = c;
            }
            n += 1;
        }
    }

    // With two clip points, order them p1:c1:c2:p2 along the original
    // direction.
    if n == 2 {
        let dx1 = c1.x - o1.x;
        let dy1 = c1.y - o1.y;
        let dx2 = c2.x - o1.x;
        let dy2 = c2.y - o1.y;
        if dx1 * dx1 + dy1 * dy1 > dx2 * dx2 + dy2 * dy2 {
            std::mem::swap(&mut c1, &mut c2);
        }
    }

    (n, c1, c2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area() -> (BoundaryBox, ClipEps) {
        let bb = BoundaryBox::from_corners(Point::new(0.0, 0.0), Point::new(100.0, 50.0));
        let eps = ClipEps::for_area(&bb);
        (bb, eps)
    }

    #[test]
    fn inside_segment_has_no_clips() {
        let (bb, eps) = area();
        let (n, _, _) = clip_line(&bb, &eps, Point::new(10.0, 10.0), Point::new(20.0, 20.0));
        assert_eq!(n, 0);
    }

    #[test]
    fn crossing_segment_yields_two_ordered_clips() {
        let (bb, eps) = area();
        let (n, c1, c2) =
            clip_line(&bb, &eps, Point::new(-50.0, 25.0), Point::new(150.0, 25.0));
        assert_eq!(n, 2);
        assert!((c1.x - 0.0).abs() < 1e-9);
        assert!((c2.x - 100.0).abs() < 1e-9);
    }

    #[test]
    fn exit_segment_yields_one_clip() {
        let (bb, eps) = area();
        let (n, c1, _) = clip_line(&bb, &eps, Point::new(50.0, 25.0), Point::new(50.0, 100.0));
        assert_eq!(n, 1);
        assert!((c1.y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn corner_spike_is_merged() {
        let (bb, eps) = area();
        // Pass exactly through the corner; only one clip point survives.
        let (n, _, _) = clip_line(&bb, &eps, Point::new(-10.0, 60.0), Point::new(10.0, 40.0));
        assert!(n <= 2);
    }
}
