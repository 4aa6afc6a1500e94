//! Geometry primitives: points, running bounding boxes, placement enums.

use crate::value::EPSILON;

/// A point in the internal y-up coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Swap the coordinates, used when the X-axis is vertical.
    pub fn swapped(self) -> Self {
        Self { x: self.y, y: self.x }
    }
}

/// A bounding box tracking running min/max over updates.
///
/// The box starts out undefined; the first `update` defines it. Consumers
/// must check `defined()` before reading `min`/`max`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryBox {
    defined: bool,
    pub min: Point,
    pub max: Point,
}

impl BoundaryBox {
    pub fn new() -> Self {
        Self::default()
    }

    /// A defined box spanning the two given corners.
    pub fn from_corners(p1: Point, p2: Point) -> Self {
        let mut bb = Self::new();
        bb.update(p1);
        bb.update(p2);
        bb
    }

    pub fn defined(&self) -> bool {
        self.defined
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn update(&mut self, p: Point) {
        if self.defined {
            self.min.x = self.min.x.min(p.x);
            self.min.y = self.min.y.min(p.y);
            self.max.x = self.max.x.max(p.x);
            self.max.y = self.max.y.max(p.y);
        } else {
            self.min = p;
            self.max = p;
            self.defined = true;
        }
    }

    pub fn update_xy(&mut self, x: f64, y: f64) {
        self.update(Point::new(x, y));
    }

    pub fn update_box(&mut self, other: &BoundaryBox) {
        if other.defined {
            self.update(other.min);
            self.update(other.max);
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        Point::new((self.min.x + self.max.x) / 2.0, (self.min.y + self.max.y) / 2.0)
    }

    /// Grow (or shrink, for negative margins) the box on all sides.
    pub fn expanded(&self, mx: f64, my: f64) -> BoundaryBox {
        let mut bb = *self;
        if bb.defined {
            bb.min.x -= mx;
            bb.min.y -= my;
            bb.max.x += mx;
            bb.max.y += my;
        }
        bb
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        if self.defined {
            self.min.x += dx;
            self.min.y += dy;
            self.max.x += dx;
            self.max.y += dy;
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        self.defined
            && p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
    }

    /// Overlap test after expanding this box by the given margins.
    ///
    /// The margins are reduced by epsilon so that exactly adjacent boxes do
    /// not count as colliding.
    pub fn collides(&self, other: &BoundaryBox, margin_x: f64, margin_y: f64) -> bool {
        if !self.defined || !other.defined {
            return false;
        }
        let mx = margin_x - EPSILON;
        let my = margin_y - EPSILON;
        self.max.x + mx > other.min.x
            && self.min.x - mx < other.max.x
            && self.max.y + my > other.min.y
            && self.min.y - my < other.max.y
    }
}

/// Horizontal anchor of a bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorX {
    Min,
    Mid,
    Max,
}

/// Vertical anchor of a bounding box (y-up, so `Min` is the bottom).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorY {
    Min,
    Mid,
    Max,
}

/// Direction of a collision-escape move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    Right,
    Left,
    Up,
    Down,
}

/// Position values accepted throughout the script grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pos {
    #[default]
    Auto,
    Center,
    Right,
    Left,
    Top,
    Bottom,
    Base,
    End,
    Beyond,
}
