//! Marker geometry.
//!
//! Each shape defines an outer box (the visible rim) and an interior box
//! (the hole of hollow markers, the rim inset by one line width). When the
//! rim would be thinner than the line width allows, markers degrade to a
//! filled rendition; that decision lives in the series visual-property
//! derivation, this module only knows the geometry.

use crate::geom::Point;
use crate::scene::{NodeId, Scene, Shape};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerShape {
    Circle,
    Square,
    Triangle,
    InvTriangle,
    Diamond,
    Cross,
    Star,
    LineX,
    LineY,
}

impl MarkerShape {
    pub fn parse(id: &str) -> Option<Self> {
        Some(match id {
            "Circle" => Self::Circle,
            "Square" => Self::Square,
            "Triangle" => Self::Triangle,
            "InvTriangle" => Self::InvTriangle,
            "Diamond" => Self::Diamond,
            "Cross" => Self::Cross,
            "Star" => Self::Star,
            "LineX" => Self::LineX,
            "LineY" => Self::LineY,
            _ => return None,
        })
    }

    pub fn is_line_style(&self) -> bool {
        matches!(self, Self::Cross | Self::LineX | Self::LineY)
    }
}

/// Extent of a marker relative to its data point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarkerDims {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl MarkerDims {
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }
}

/// Compute the marker extent for a radius grown by `delta` (negative for
/// the interior box). `x_horizontal` tells whether the X-axis runs
/// horizontally, which orients the LineX/LineY tick markers.
pub fn compute_dims(
    shape: MarkerShape,
    radius: f64,
    delta: f64,
    x_horizontal: bool,
) -> MarkerDims {
    let mut m = MarkerDims::default();
    match shape {
        MarkerShape::Square | MarkerShape::Cross => {
            let e = 0.9 * radius + delta;
            m.x1 = -e;
            m.x2 = e;
            m.y1 = -e;
            m.y2 = e;
        }
        MarkerShape::Triangle => {
            let e = 0.7 * radius + delta;
            m.x1 = -1.7320 * e;
            m.x2 = 1.7320 * e;
            m.y1 = -e;
            m.y2 = 2.0 * e;
        }
        MarkerShape::InvTriangle => {
            let e = 0.7 * radius + delta;
            m.x1 = -1.7320 * e;
            m.x2 = 1.7320 * e;
            m.y1 = -2.0 * e;
            m.y2 = e;
        }
        MarkerShape::Diamond => {
            let e = 1.4142 * (0.9 * radius + delta);
            m.x1 = -e;
            m.x2 = e;
            m.y1 = -e;
            m.y2 = e;
        }
        MarkerShape::Star => {
            let e = 2.0 * (0.7 * radius + delta);
            m.x1 = -e;
            m.x2 = e;
            m.y1 = -e;
            m.y2 = e;
        }
        MarkerShape::LineX => {
            if x_horizontal {
                m.x1 = -radius;
                m.x2 = radius;
            } else {
                m.y1 = -radius;
                m.y2 = radius;
            }
        }
        MarkerShape::LineY => {
            if !x_horizontal {
                m.x1 = -radius;
                m.x2 = radius;
            } else {
                m.y1 = -radius;
                m.y2 = radius;
            }
        }
        MarkerShape::Circle => {
            let e = radius + delta;
            m.x1 = -e;
            m.x2 = e;
            m.y1 = -e;
            m.y2 = e;
        }
    }
    m
}

/// Emit the marker geometry at `p` into group `g`.
pub fn build_marker(scene: &mut Scene, g: NodeId, shape: MarkerShape, m: &MarkerDims, p: Point) {
    match shape {
        MarkerShape::Circle => {
            scene.add(g, Shape::circle(p, m.x2));
        }
        MarkerShape::Square => {
            scene.add(g, Shape::rect(p.x + m.x1, p.y + m.y1, p.x + m.x2, p.y + m.y2));
        }
        MarkerShape::Triangle => {
            scene.add(
                g,
                Shape::polygon(vec![
                    Point::new(p.x, p.y + m.y2),
                    Point::new(p.x + m.x2, p.y + m.y1),
                    Point::new(p.x + m.x1, p.y + m.y1),
                ]),
            );
        }
        MarkerShape::InvTriangle => {
            scene.add(
                g,
                Shape::polygon(vec![
                    Point::new(p.x, p.y + m.y1),
                    Point::new(p.x + m.x2, p.y + m.y2),
                    Point::new(p.x + m.x1, p.y + m.y2),
                ]),
            );
        }
        MarkerShape::Diamond => {
            scene.add(
                g,
                Shape::polygon(vec![
                    Point::new(p.x + m.x2, p.y),
                    Point::new(p.x, p.y + m.y2),
                    Point::new(p.x + m.x1, p.y),
                    Point::new(p.x, p.y + m.y1),
                ]),
            );
        }
        MarkerShape::Cross => {
            let cg = scene.add_group(g);
            scene.add(cg, Shape::line(p.x + m.x1, p.y + m.y1, p.x + m.x2, p.y + m.y2));
            scene.add(cg, Shape::line(p.x + m.x2, p.y + m.y1, p.x + m.x1, p.y + m.y2));
        }
        MarkerShape::Star => {
            let d = 0.35;
            scene.add(
                g,
                Shape::polygon(vec![
                    Point::new(p.x + m.x2, p.y),
                    Point::new(p.x + m.x2 * d, p.y + m.y2 * d),
                    Point::new(p.x, p.y + m.y2),
                    Point::new(p.x + m.x1 * d, p.y + m.y2 * d),
                    Point::new(p.x + m.x1, p.y),
                    Point::new(p.x + m.x1 * d, p.y + m.y1 * d),
                    Point::new(p.x, p.y + m.y1),
                    Point::new(p.x + m.x2 * d, p.y + m.y1 * d),
                ]),
            );
        }
        MarkerShape::LineX | MarkerShape::LineY => {
            scene.add(g, Shape::line(p.x + m.x1, p.y + m.y1, p.x + m.x2, p.y + m.y2));
        }
    }
}
