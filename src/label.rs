//! Label registry.
//!
//! Multi-line text is created as a container group holding one text object
//! per line. The registry keeps per-line records (chained through the
//! container) including the width of leading and trailing spaces, so that
//! background rectangles can later be drawn behind the visible part of every
//! registered label, wherever the labels ended up after collision moves.

use ahash::AHashMap;

use crate::geom::BoundaryBox;
use crate::scene::{NodeId, Scene, Shape};

#[derive(Debug, Clone, Copy)]
struct Entry {
    /// Previous line in the same container, if any.
    link: Option<NodeId>,
    leading_space: f64,
    trailing_space: f64,
}

#[derive(Debug, Clone, Copy)]
struct Container {
    /// Last line of the container.
    link: Option<NodeId>,
}

/// Registry of text containers eligible for background rectangles.
#[derive(Default)]
pub struct LabelRegistry {
    entries: AHashMap<NodeId, Entry>,
    containers: AHashMap<NodeId, Container>,
}

/// Create a label without registering it: a new group under `g` holding one
/// text object per line of `txt`. A `size` of zero inherits the font size.
pub fn create_label(scene: &mut Scene, g: NodeId, txt: &str, size: f64) -> NodeId {
    create(None, scene, g, txt, size, false)
}

impl LabelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registered label container under `g`.
    pub fn create_in_db(&mut self, scene: &mut Scene, g: NodeId, txt: &str, size: f64) -> NodeId {
        create(Some(self), scene, g, txt, size, false)
    }

    /// Append more lines to a previously created container.
    pub fn append_in_db(&mut self, scene: &mut Scene, container: NodeId, txt: &str, size: f64) {
        create(Some(self), scene, container, txt, size, true);
    }

    /// Remove a container and its line records.
    pub fn remove(&mut self, container: NodeId) {
        let Some(c) = self.containers.remove(&container) else {
            return;
        };
        let mut link = c.link;
        while let Some(line) = link {
            link = self.entries.remove(&line).and_then(|e| e.link);
        }
    }

    /// Add a background rectangle behind every registered line that lies
    /// fully (or, with `partial_ok`, at least partially) inside `area`.
    pub fn add_background(
        &self,
        scene: &mut Scene,
        bg_g: NodeId,
        area: &BoundaryBox,
        partial_ok: bool,
    ) {
        for c in self.containers.values() {
            let mut link = c.link;
            while let Some(line) = link {
                let e = self.entries[&line];
                let mut bb = scene.bbox(line);
                if bb.defined() {
                    let r = bb.height() / 3.0;
                    bb.min.x += e.leading_space;
                    bb.max.x -= e.trailing_space;
                    bb.min.x -= r / 2.0;
                    bb.max.x += r / 2.0;
                    bb.min.y -= r / 5.0;
                    bb.max.y += r / 5.0;
                    let inside = bb.min.x > area.min.x
                        && bb.max.x < area.max.x
                        && bb.min.y > area.min.y
                        && bb.max.y < area.max.y;
                    let outside = bb.max.x < area.min.x
                        || bb.min.x > area.max.x
                        || bb.max.y < area.min.y
                        || bb.min.y > area.max.y;
                    if inside || (partial_ok && !outside) {
                        scene.add(
                            bg_g,
                            Shape::rounded_rect(bb.min.x, bb.min.y, bb.max.x, bb.max.y, r),
                        );
                    }
                }
                link = e.link;
            }
        }
    }
}

fn create(
    mut registry: Option<&mut LabelRegistry>,
    scene: &mut Scene,
    g: NodeId,
    txt: &str,
    size: f64,
    append: bool,
) -> NodeId {
    let (group, mut prev_link, mut y) = if append {
        let link = registry
            .as_ref()
            .and_then(|r| r.containers.get(&g))
            .and_then(|c| c.link);
        let y = link.map(|l| scene.bbox(l).min.y).unwrap_or(0.0);
        (g, link, y)
    } else {
        let ng = scene.add_group(g);
        if size > 0.0 {
            scene.attr_mut(ng).text_font().set_size(size);
        }
        (ng, None, 0.0)
    };

    let mut font_attr = scene.collect_attr(group);
    if append && size > 0.0 {
        font_attr.font.size = size;
    }
    let h = font_attr.font.height();
    let w = font_attr.font.char_width();

    for line in txt.split('\n') {
        let mut leading = 0.0;
        let mut trailing = 0.0;
        let mut non_space_seen = false;
        for c in line.chars() {
            if c == ' ' {
                if non_space_seen {
                    trailing += w;
                } else {
                    leading += w;
                }
            } else {
                non_space_seen = true;
                trailing = 0.0;
            }
        }
        let t = scene.add(group, Shape::text(0.0, y, line));
        if append && size > 0.0 {
            scene.attr_mut(t).text_font().set_size(size);
        }
        y -= h;
        if let Some(r) = registry.as_deref_mut() {
            r.entries.insert(
                t,
                Entry { link: prev_link, leading_space: leading, trailing_space: trailing },
            );
        }
        prev_link = Some(t);
    }

    if let Some(r) = registry {
        r.containers.insert(group, Container { link: prev_link });
    }
    group
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point;

    #[test]
    fn multi_line_label_stacks_downward() {
        let mut scene = Scene::new();
        let root = scene.root();
        let label = create_label(&mut scene, root, "one\ntwo\nthree", 10.0);
        let bb = scene.bbox(label);
        assert!(bb.defined());
        assert!((bb.height() - 30.0).abs() < 1e-6, "three lines of height 10");
    }

    #[test]
    fn background_skips_labels_outside_area() {
        let mut scene = Scene::new();
        let root = scene.root();
        let mut db = LabelRegistry::new();
        let inside = db.create_in_db(&mut scene, root, "in", 10.0);
        scene.move_to(
            inside,
            crate::geom::AnchorX::Mid,
            crate::geom::AnchorY::Mid,
            50.0,
            50.0,
        );
        let outside = db.create_in_db(&mut scene, root, "out", 10.0);
        scene.move_to(
            outside,
            crate::geom::AnchorX::Mid,
            crate::geom::AnchorY::Mid,
            500.0,
            500.0,
        );
        let bg = scene.add_group(root);
        let area = BoundaryBox::from_corners(Point::new(0.0, 0.0), Point::new(100.0, 100.0));
        db.add_background(&mut scene, bg, &area, false);
        assert_eq!(scene.children(bg).len(), 1);
    }
}
