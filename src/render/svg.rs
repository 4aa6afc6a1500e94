//! SVG backend: walks the scene tree and appends SVG XML elements to a
//! String buffer.
//!
//! The scene is built y-up; this is the single place where the sign flip to
//! screen coordinates happens. Group attributes are emitted on `<g>`
//! elements and inherit through the document exactly as they inherit
//! through the scene tree.

use std::fmt::Write;

use crate::geom::{AnchorX, BoundaryBox, Point};
use crate::scene::attr::{Attr, Collected, LineCap, LineJoin};
use crate::scene::{NodeId, Scene, Shape};
use crate::visual::color::Color;

/// Format a coordinate with up to three decimals, trimming trailing zeros.
pub fn num(v: f64) -> String {
    let mut s = format!("{:.3}", v);
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" { "0".to_string() } else { s }
}

struct SvgRenderer<'a> {
    scene: &'a Scene,
    buffer: String,
}

/// Render the whole scene as a standalone SVG document.
///
/// Coordinates are emitted as `(x, -y)` and the viewBox is anchored at the
/// content box, so screen coordinates derived from the scene (for example
/// the interactive data payload) match the document without an extra
/// offset. `margin` adds empty space around the content; `extra` is
/// spliced into the `<svg>` start tag (used by the HTML wrapper to add ids
/// and styles).
pub fn render(scene: &Scene, margin: f64, extra: Option<&str>) -> String {
    let bb = screen_box(scene, margin);
    let w = bb.width();
    let h = bb.height();
    let mut r = SvgRenderer { scene, buffer: String::new() };
    let _ = writeln!(
        r.buffer,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="{} {} {} {}"{}{}>"#,
        num(w),
        num(h),
        num(bb.min.x),
        num(bb.min.y),
        num(w),
        num(h),
        if extra.is_some() { " " } else { "" },
        extra.unwrap_or("")
    );
    r.render_node(scene.root());
    r.buffer.push_str("</svg>\n");
    r.buffer
}

/// The document box in screen coordinates (y flipped).
pub fn screen_box(scene: &Scene, margin: f64) -> BoundaryBox {
    let mut bb = scene.bbox(scene.root());
    if !bb.defined() {
        bb.update_xy(0.0, 0.0);
    }
    BoundaryBox::from_corners(
        Point::new(bb.min.x - margin, -bb.max.y - margin),
        Point::new(bb.max.x + margin, -bb.min.y + margin),
    )
}

impl<'a> SvgRenderer<'a> {
    fn map(&self, p: Point) -> (f64, f64) {
        (p.x, -p.y)
    }

    fn color_attrs(out: &mut String, name: &str, color: &Color) {
        let _ = write!(out, r#" {}="{}""#, name, color.svg());
        if !color.is_clear() && color.transparency() > 0.0 {
            let _ = write!(out, r#" {}-opacity="{}""#, name, num(color.opacity()));
        }
    }

    /// Attributes contributed by one node's own overlay.
    fn attr_string(attr: &Attr, for_text: bool) -> String {
        let mut s = String::new();
        if attr.line_color.is_defined() {
            Self::color_attrs(&mut s, "stroke", &attr.line_color);
        }
        if attr.fill_color.is_defined() && !for_text {
            Self::color_attrs(&mut s, "fill", &attr.fill_color);
        }
        if let Some(w) = attr.line_width {
            let _ = write!(s, r#" stroke-width="{}""#, num(w));
        }
        if let Some((dash, hole)) = attr.line_dash {
            if dash > 0.0 {
                let _ = write!(s, r#" stroke-dasharray="{} {}""#, num(dash), num(hole));
            } else {
                s.push_str(r#" stroke-dasharray="none""#);
            }
        }
        if let Some(cap) = attr.line_cap {
            let cap = match cap {
                LineCap::Butt => "butt",
                LineCap::Round => "round",
                LineCap::Square => "square",
            };
            let _ = write!(s, r#" stroke-linecap="{}""#, cap);
        }
        if let Some(join) = attr.line_join {
            let join = match join {
                LineJoin::Sharp => "miter",
                LineJoin::Round => "round",
            };
            let _ = write!(s, r#" stroke-linejoin="{}""#, join);
        }
        s
    }

    fn render_node(&mut self, id: NodeId) {
        match self.scene.shape(id) {
            Shape::Group { children } => {
                let children = children.clone();
                let attrs = Self::attr_string(self.scene.attr(id), false);
                let _ = writeln!(self.buffer, "<g{}>", attrs);
                for c in children {
                    self.render_node(c);
                }
                self.buffer.push_str("</g>\n");
            }
            Shape::Line { p1, p2 } => {
                let (x1, y1) = self.map(*p1);
                let (x2, y2) = self.map(*p2);
                let attrs = Self::attr_string(self.scene.attr(id), false);
                let _ = writeln!(
                    self.buffer,
                    r#"<line x1="{}" y1="{}" x2="{}" y2="{}"{} />"#,
                    num(x1),
                    num(y1),
                    num(x2),
                    num(y2),
                    attrs
                );
            }
            Shape::Rect { p1, p2, radius } => {
                let (ax, ay) = self.map(*p1);
                let (bx, by) = self.map(*p2);
                let x = ax.min(bx);
                let y = ay.min(by);
                let w = (bx - ax).abs();
                let h = (by - ay).abs();
                let attrs = Self::attr_string(self.scene.attr(id), false);
                let mut rad = String::new();
                if *radius > 0.0 {
                    let _ = write!(rad, r#" rx="{}""#, num(*radius));
                }
                let _ = writeln!(
                    self.buffer,
                    r#"<rect x="{}" y="{}" width="{}" height="{}"{}{} />"#,
                    num(x),
                    num(y),
                    num(w),
                    num(h),
                    rad,
                    attrs
                );
            }
            Shape::Circle { center, radius } => {
                let (cx, cy) = self.map(*center);
                let attrs = Self::attr_string(self.scene.attr(id), false);
                let _ = writeln!(
                    self.buffer,
                    r#"<circle cx="{}" cy="{}" r="{}"{} />"#,
                    num(cx),
                    num(cy),
                    num(*radius),
                    attrs
                );
            }
            Shape::Ellipse { center, rx, ry } => {
                let (cx, cy) = self.map(*center);
                let attrs = Self::attr_string(self.scene.attr(id), false);
                let _ = writeln!(
                    self.buffer,
                    r#"<ellipse cx="{}" cy="{}" rx="{}" ry="{}"{} />"#,
                    num(cx),
                    num(cy),
                    num(*rx),
                    num(*ry),
                    attrs
                );
            }
            Shape::Polyline { points, closed } => {
                let pts = points
                    .iter()
                    .map(|p| {
                        let (x, y) = self.map(*p);
                        format!("{},{}", num(x), num(y))
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                let attrs = Self::attr_string(self.scene.attr(id), false);
                if *closed {
                    let _ = writeln!(self.buffer, r#"<polygon points="{}"{} />"#, pts, attrs);
                } else {
                    // An open polyline is never filled.
                    let fill = if self.scene.attr(id).fill_color.is_defined() {
                        ""
                    } else {
                        r#" fill="none""#
                    };
                    let _ =
                        writeln!(self.buffer, r#"<polyline points="{}"{}{} />"#, pts, fill, attrs);
                }
            }
            Shape::Text { anchor, text, angle } => {
                self.render_text(id, *anchor, text.clone(), *angle);
            }
        }
    }

    fn render_text(&mut self, id: NodeId, anchor: Point, text: String, angle: f64) {
        let collected: Collected = self.scene.collect_attr(id);
        let bb = self.scene.bbox(id);
        if !bb.defined() {
            return;
        }
        // Baseline position derives from the resolved metrics; the anchor
        // box was already computed by the scene.
        let baseline_y = bb.min.y + collected.font.baseline();
        let x = match collected.text_anchor_x {
            AnchorX::Min => bb.min.x,
            AnchorX::Mid => (bb.min.x + bb.max.x) / 2.0,
            AnchorX::Max => bb.max.x,
        };
        let ta = match collected.text_anchor_x {
            AnchorX::Min => "start",
            AnchorX::Mid => "middle",
            AnchorX::Max => "end",
        };
        // For rotated text the box math happened around the anchor; emit
        // the glyphs unrotated at the anchor and rotate via transform.
        let (ex, ey) = if angle == 0.0 {
            self.map(Point::new(x, baseline_y))
        } else {
            self.map(anchor)
        };
        let mut s = String::new();
        let _ = write!(
            s,
            r#"<text x="{}" y="{}" font-family="{}" font-size="{}" text-anchor="{}""#,
            num(ex),
            num(ey),
            collected.font.family,
            num(collected.font.size),
            ta
        );
        if collected.font.bold {
            s.push_str(r#" font-weight="bold""#);
        }
        if collected.text_color.is_defined() || !self.scene.attr(id).text_color.is_defined() {
            Self::color_attrs(&mut s, "fill", &collected.text_color);
        }
        s.push_str(r#" stroke="none""#);
        if angle != 0.0 {
            // Positive scene angles are counterclockwise; SVG rotates
            // clockwise in its y-down system, so the sign carries over.
            let _ = write!(s, r#" transform="rotate({} {} {})""#, num(-angle), num(ex), num(ey));
        }
        let _ = writeln!(
            self.buffer,
            "{}>{}</text>",
            s,
            html_escape::encode_text(&text)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Scene, Shape};

    #[test]
    fn y_axis_flips_at_emission() {
        let mut scene = Scene::new();
        let root = scene.root();
        scene.add(root, Shape::line(0.0, 0.0, 10.0, 20.0));
        let svg = render(&scene, 0.0, None);
        // The y-up point (10, 20) maps to screen (10, -20); the viewBox is
        // anchored at the content box.
        assert!(svg.contains(r#"x2="10" y2="-20""#), "{svg}");
        assert!(svg.contains(r#"x1="0" y1="0""#), "{svg}");
        assert!(svg.contains(r#"viewBox="0 -20 10 20""#), "{svg}");
    }

    #[test]
    fn text_is_escaped() {
        let mut scene = Scene::new();
        let root = scene.root();
        scene.add(root, Shape::text(0.0, 0.0, "a<b&c"));
        let svg = render(&scene, 0.0, None);
        assert!(svg.contains("a&lt;b&amp;c"));
    }
}
