//! The scene tree: grouped drawable objects with attribute inheritance.
//!
//! Objects live in an id-indexed arena so that other components (the label
//! registry, the tag placer, collision lists) can hold stable identifiers
//! instead of pointers. The tree is built in the internal y-up coordinate
//! system; the sign flip to screen coordinates happens only in the SVG
//! renderer.

pub mod attr;

use crate::geom::{AnchorX, AnchorY, BoundaryBox, Dir, Point};
use crate::value::EPSILON;
use attr::{Attr, Collected};

/// Stable identifier of a node in a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// The drawable shapes. A `Group` owns an ordered list of children which are
/// painted in order, so the last child is on top.
#[derive(Debug, Clone)]
pub enum Shape {
    Line { p1: Point, p2: Point },
    Rect { p1: Point, p2: Point, radius: f64 },
    Circle { center: Point, radius: f64 },
    Ellipse { center: Point, rx: f64, ry: f64 },
    Polyline { points: Vec<Point>, closed: bool },
    Text { anchor: Point, text: String, angle: f64 },
    Group { children: Vec<NodeId> },
}

impl Shape {
    pub fn line(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Shape::Line { p1: Point::new(x1, y1), p2: Point::new(x2, y2) }
    }

    pub fn rect(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Shape::Rect { p1: Point::new(x1, y1), p2: Point::new(x2, y2), radius: 0.0 }
    }

    pub fn rounded_rect(x1: f64, y1: f64, x2: f64, y2: f64, radius: f64) -> Self {
        Shape::Rect { p1: Point::new(x1, y1), p2: Point::new(x2, y2), radius }
    }

    pub fn circle(center: Point, radius: f64) -> Self {
        Shape::Circle { center, radius }
    }

    pub fn ellipse(center: Point, rx: f64, ry: f64) -> Self {
        Shape::Ellipse { center, rx, ry }
    }

    pub fn polyline(points: Vec<Point>) -> Self {
        Shape::Polyline { points, closed: false }
    }

    pub fn polygon(points: Vec<Point>) -> Self {
        Shape::Polyline { points, closed: true }
    }

    pub fn text(x: f64, y: f64, text: impl Into<String>) -> Self {
        Shape::Text { anchor: Point::new(x, y), text: text.into(), angle: 0.0 }
    }

    pub fn label(text: impl Into<String>) -> Self {
        Shape::text(0.0, 0.0, text)
    }
}

struct Node {
    parent: Option<NodeId>,
    shape: Shape,
    attr: Attr,
}

/// An arena of scene nodes rooted in one top group.
pub struct Scene {
    nodes: Vec<Node>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        let root = Node {
            parent: None,
            shape: Shape::Group { children: Vec::new() },
            attr: Attr::default(),
        };
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    /// Append a shape to a group; returns the id of the new node.
    pub fn add(&mut self, parent: NodeId, shape: Shape) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { parent: Some(parent), shape, attr: Attr::default() });
        match &mut self.node_mut(parent).shape {
            Shape::Group { children } => children.push(id),
            _ => panic!("parent is not a group"),
        }
        id
    }

    /// Append a new empty group to a group.
    pub fn add_group(&mut self, parent: NodeId) -> NodeId {
        self.add(parent, Shape::Group { children: Vec::new() })
    }

    pub fn attr(&self, id: NodeId) -> &Attr {
        &self.node(id).attr
    }

    pub fn attr_mut(&mut self, id: NodeId) -> &mut Attr {
        &mut self.node_mut(id).attr
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).shape {
            Shape::Group { children } => children,
            _ => &[],
        }
    }

    pub fn shape(&self, id: NodeId) -> &Shape {
        &self.node(id).shape
    }

    pub fn text_mut(&mut self, id: NodeId) -> Option<&mut String> {
        match &mut self.node_mut(id).shape {
            Shape::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    /// The most recently added child of a group.
    pub fn last_child(&self, group: NodeId) -> Option<NodeId> {
        self.children(group).last().copied()
    }

    /// Remove the most recently added child of a group.
    pub fn pop_child(&mut self, group: NodeId) -> Option<NodeId> {
        let id = match &mut self.node_mut(group).shape {
            Shape::Group { children } => children.pop(),
            _ => None,
        };
        if let Some(id) = id {
            self.node_mut(id).parent = None;
        }
        id
    }

    /// Move the most recently added child behind all its siblings, used to
    /// push a background rectangle behind already drawn content.
    pub fn front_to_back(&mut self, group: NodeId) {
        if let Shape::Group { children } = &mut self.node_mut(group).shape {
            if let Some(last) = children.pop() {
                children.insert(0, last);
            }
        }
    }

    /// Resolve the effective attributes of a node by lexical collect over
    /// its ancestors, outermost first, then its own overlay.
    pub fn collect_attr(&self, id: NodeId) -> Collected {
        let mut chain = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            chain.push(c);
            cur = self.node(c).parent;
        }
        let mut out = Collected::default();
        for c in chain.iter().rev() {
            self.node(*c).attr.collect_into(&mut out);
        }
        out
    }

    fn text_box(&self, anchor: Point, text: &str, angle: f64, attr: &Collected) -> BoundaryBox {
        let w = attr.font.text_width(text);
        let h = attr.font.height();
        let (x1, x2) = match attr.text_anchor_x {
            AnchorX::Min => (anchor.x, anchor.x + w),
            AnchorX::Mid => (anchor.x - w / 2.0, anchor.x + w / 2.0),
            AnchorX::Max => (anchor.x - w, anchor.x),
        };
        let (y1, y2) = match attr.text_anchor_y {
            AnchorY::Min => (anchor.y, anchor.y + h),
            AnchorY::Mid => (anchor.y - h / 2.0, anchor.y + h / 2.0),
            AnchorY::Max => (anchor.y - h, anchor.y),
        };
        let mut bb = BoundaryBox::new();
        if angle == 0.0 {
            bb.update_xy(x1, y1);
            bb.update_xy(x2, y2);
        } else {
            let (sin, cos) = angle.to_radians().sin_cos();
            for (x, y) in [(x1, y1), (x2, y1), (x2, y2), (x1, y2)] {
                let dx = x - anchor.x;
                let dy = y - anchor.y;
                bb.update_xy(
                    anchor.x + dx * cos - dy * sin,
                    anchor.y + dx * sin + dy * cos,
                );
            }
        }
        bb
    }

    fn bbox_with(&self, id: NodeId, inherited: &Collected, bb: &mut BoundaryBox) {
        let node = self.node(id);
        let mut attr = inherited.clone();
        node.attr.collect_into(&mut attr);
        match &node.shape {
            Shape::Line { p1, p2 } => {
                bb.update(*p1);
                bb.update(*p2);
            }
            Shape::Rect { p1, p2, .. } => {
                bb.update(*p1);
                bb.update(*p2);
            }
            Shape::Circle { center, radius } => {
                bb.update_xy(center.x - radius, center.y - radius);
                bb.update_xy(center.x + radius, center.y + radius);
            }
            Shape::Ellipse { center, rx, ry } => {
                bb.update_xy(center.x - rx, center.y - ry);
                bb.update_xy(center.x + rx, center.y + ry);
            }
            Shape::Polyline { points, .. } => {
                for p in points {
                    bb.update(*p);
                }
            }
            Shape::Text { anchor, text, angle } => {
                bb.update_box(&self.text_box(*anchor, text, *angle, &attr));
            }
            Shape::Group { children } => {
                for c in children {
                    self.bbox_with(*c, &attr, bb);
                }
            }
        }
    }

    /// The bounding box of a node, with attribute inheritance applied for
    /// text extents. Groups without drawable content yield an undefined box.
    pub fn bbox(&self, id: NodeId) -> BoundaryBox {
        let inherited = match self.node(id).parent {
            Some(p) => self.collect_attr(p),
            None => Collected::default(),
        };
        let mut bb = BoundaryBox::new();
        self.bbox_with(id, &inherited, &mut bb);
        bb
    }

    /// A node is empty when it has no drawable extent.
    pub fn is_empty(&self, id: NodeId) -> bool {
        !self.bbox(id).defined()
    }

    /// Translate a node (and all its descendants) by `(dx, dy)`.
    pub fn translate(&mut self, id: NodeId, dx: f64, dy: f64) {
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        if matches!(self.node(id).shape, Shape::Group { .. }) {
            for c in self.children(id).to_vec() {
                self.translate(c, dx, dy);
            }
            return;
        }
        match &mut self.node_mut(id).shape {
            Shape::Line { p1, p2 } | Shape::Rect { p1, p2, .. } => {
                p1.x += dx;
                p1.y += dy;
                p2.x += dx;
                p2.y += dy;
            }
            Shape::Circle { center, .. } | Shape::Ellipse { center, .. } => {
                center.x += dx;
                center.y += dy;
            }
            Shape::Polyline { points, .. } => {
                for p in points.iter_mut() {
                    p.x += dx;
                    p.y += dy;
                }
            }
            Shape::Text { anchor, .. } => {
                anchor.x += dx;
                anchor.y += dy;
            }
            Shape::Group { .. } => unreachable!("handled above"),
        }
    }

    /// The coordinate of the given anchor of a bounding box.
    pub fn anchor_point(bb: &BoundaryBox, ax: AnchorX, ay: AnchorY) -> Point {
        let x = match ax {
            AnchorX::Min => bb.min.x,
            AnchorX::Mid => (bb.min.x + bb.max.x) / 2.0,
            AnchorX::Max => bb.max.x,
        };
        let y = match ay {
            AnchorY::Min => bb.min.y,
            AnchorY::Mid => (bb.min.y + bb.max.y) / 2.0,
            AnchorY::Max => bb.max.y,
        };
        Point::new(x, y)
    }

    /// Translate a node so the chosen anchor of its bounding box lands on
    /// `(x, y)`. Does nothing for empty nodes.
    pub fn move_to(&mut self, id: NodeId, ax: AnchorX, ay: AnchorY, x: f64, y: f64) {
        let bb = self.bbox(id);
        if !bb.defined() {
            return;
        }
        let a = Self::anchor_point(&bb, ax, ay);
        self.translate(id, x - a.x, y - a.y);
    }

    /// Rotate a node about a point, counterclockwise in the y-up system.
    /// Text nodes accumulate the angle for emission.
    pub fn rotate(&mut self, id: NodeId, angle_deg: f64, center: Point) {
        if matches!(self.node(id).shape, Shape::Group { .. }) {
            for c in self.children(id).to_vec() {
                self.rotate(c, angle_deg, center);
            }
            return;
        }
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        let rot = |p: &mut Point| {
            let dx = p.x - center.x;
            let dy = p.y - center.y;
            p.x = center.x + dx * cos - dy * sin;
            p.y = center.y + dx * sin + dy * cos;
        };
        match &mut self.node_mut(id).shape {
            Shape::Line { p1, p2 } | Shape::Rect { p1, p2, .. } => {
                rot(p1);
                rot(p2);
            }
            Shape::Circle { center: c, .. } | Shape::Ellipse { center: c, .. } => rot(c),
            Shape::Polyline { points, .. } => points.iter_mut().for_each(rot),
            Shape::Text { anchor, angle, .. } => {
                rot(anchor);
                *angle += angle_deg;
            }
            Shape::Group { .. } => unreachable!("handled above"),
        }
    }

    /// Rotate a node about the given anchor of its own bounding box.
    pub fn rotate_about_anchor(&mut self, id: NodeId, angle_deg: f64, ax: AnchorX, ay: AnchorY) {
        let bb = self.bbox(id);
        if bb.defined() {
            let c = Self::anchor_point(&bb, ax, ay);
            self.rotate(id, angle_deg, c);
        }
    }
}

/// Return the first box in `avoiders` that overlaps `id`'s bounding box
/// after expanding by the margins. Empty objects never collide.
///
/// The avoid list holds plain boxes: every placed decoration is final when
/// it enters the list, and keep-out zones (like the axis DMZ rectangles)
/// have no scene node at all.
pub fn collides_any(
    scene: &Scene,
    id: NodeId,
    avoiders: &[BoundaryBox],
    margin_x: f64,
    margin_y: f64,
) -> Option<BoundaryBox> {
    let bb = scene.bbox(id);
    if !bb.defined() {
        return None;
    }
    avoiders
        .iter()
        .find(|other| bb.collides(other, margin_x, margin_y))
        .copied()
}

/// Repeatedly shift all movers together toward `dir` by the minimum
/// displacement needed to separate from any avoider, terminating when no
/// mover overlaps any avoider.
pub fn move_objs(
    scene: &mut Scene,
    dir: Dir,
    movers: &[NodeId],
    avoiders: &[BoundaryBox],
    margin_x: f64,
    margin_y: f64,
) {
    loop {
        let mut dx = 0.0;
        let mut dy = 0.0;
        for mover in movers {
            if let Some(col_bb) = collides_any(scene, *mover, avoiders, margin_x, margin_y) {
                let obj_bb = scene.bbox(*mover);
                match dir {
                    Dir::Right => dx = col_bb.max.x - obj_bb.min.x + margin_x,
                    Dir::Left => dx = col_bb.min.x - obj_bb.max.x - margin_x,
                    Dir::Up => dy = col_bb.max.y - obj_bb.min.y + margin_y,
                    Dir::Down => dy = col_bb.min.y - obj_bb.max.y - margin_y,
                }
                break;
            }
        }
        if dx.abs() < EPSILON && dy.abs() < EPSILON {
            break;
        }
        for mover in movers {
            scene.translate(*mover, dx, dy);
        }
    }
}

/// Single-object form of [`move_objs`].
pub fn move_obj(
    scene: &mut Scene,
    dir: Dir,
    obj: NodeId,
    avoiders: &[BoundaryBox],
    margin_x: f64,
    margin_y: f64,
) {
    move_objs(scene, dir, &[obj], avoiders, margin_x, margin_y);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_to_places_anchor() {
        let mut scene = Scene::new();
        let root = scene.root();
        let r = scene.add(root, Shape::rect(0.0, 0.0, 10.0, 4.0));
        scene.move_to(r, AnchorX::Max, AnchorY::Min, 100.0, 50.0);
        let bb = scene.bbox(r);
        assert!((bb.max.x - 100.0).abs() < 1e-9);
        assert!((bb.min.y - 50.0).abs() < 1e-9);
        assert!((bb.width() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn attr_collect_is_lexical() {
        let mut scene = Scene::new();
        let g1 = scene.add_group(scene.root());
        scene.attr_mut(g1).set_line_width(3.0);
        let g2 = scene.add_group(g1);
        let l = scene.add(g2, Shape::line(0.0, 0.0, 1.0, 1.0));
        assert_eq!(scene.collect_attr(l).line_width, 3.0);
        scene.attr_mut(g2).set_line_width(5.0);
        assert_eq!(scene.collect_attr(l).line_width, 5.0);
    }

    #[test]
    fn move_objs_escapes_collision() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.add(root, Shape::rect(0.0, 0.0, 10.0, 10.0));
        let b = scene.add(root, Shape::rect(5.0, 5.0, 15.0, 15.0));
        let a_bb = scene.bbox(a);
        move_objs(&mut scene, Dir::Right, &[b], &[a_bb], 2.0, 2.0);
        let bb = scene.bbox(b);
        assert!(bb.min.x >= 12.0 - 1e-6);
    }
}
