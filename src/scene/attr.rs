//! Scene attributes with lexical inheritance.
//!
//! Every node carries a partial [`Attr`] overlay; the effective attributes
//! of a drawable are obtained by folding the overlays from the root down to
//! the node (`collect`). There is no dynamic dispatch: resolution is a pure
//! fold over the ancestor chain.

use crate::geom::{AnchorX, AnchorY};
use crate::visual::color::Color;
use crate::visual::font::{Font, FontSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Butt,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Sharp,
    Round,
}

/// Partial attribute record attached to a scene node.
///
/// Color fields distinguish "inherit" (undefined) from an explicit clear.
#[derive(Debug, Clone, Default)]
pub struct Attr {
    pub line_color: Color,
    pub fill_color: Color,
    pub text_color: Color,
    pub line_width: Option<f64>,
    pub line_dash: Option<(f64, f64)>,
    pub line_cap: Option<LineCap>,
    pub line_join: Option<LineJoin>,
    pub font: FontSpec,
    pub text_anchor_x: Option<AnchorX>,
    pub text_anchor_y: Option<AnchorY>,
}

impl Attr {
    pub fn line_color(&mut self) -> &mut Color {
        &mut self.line_color
    }

    pub fn fill_color(&mut self) -> &mut Color {
        &mut self.fill_color
    }

    pub fn text_color(&mut self) -> &mut Color {
        &mut self.text_color
    }

    pub fn text_font(&mut self) -> &mut FontSpec {
        &mut self.font
    }

    pub fn set_line_width(&mut self, width: f64) -> &mut Self {
        self.line_width = Some(width);
        self
    }

    pub fn set_line_dash(&mut self, dash: f64, hole: f64) -> &mut Self {
        self.line_dash = Some(if dash <= 0.0 || hole <= 0.0 { (0.0, 0.0) } else { (dash, hole) });
        self
    }

    pub fn set_solid(&mut self) -> &mut Self {
        self.line_dash = Some((0.0, 0.0));
        self
    }

    pub fn set_line_cap(&mut self, cap: LineCap) -> &mut Self {
        self.line_cap = Some(cap);
        self
    }

    pub fn set_line_join(&mut self, join: LineJoin) -> &mut Self {
        self.line_join = Some(join);
        self
    }

    pub fn set_text_anchor(&mut self, ax: AnchorX, ay: AnchorY) -> &mut Self {
        self.text_anchor_x = Some(ax);
        self.text_anchor_y = Some(ay);
        self
    }

    /// Fold this overlay into an already collected record.
    pub fn collect_into(&self, out: &mut Collected) {
        if self.line_color.is_defined() {
            out.line_color = self.line_color;
        }
        if self.fill_color.is_defined() {
            out.fill_color = self.fill_color;
        }
        if self.text_color.is_defined() {
            out.text_color = self.text_color;
        }
        if let Some(w) = self.line_width {
            out.line_width = w;
        }
        if let Some(d) = self.line_dash {
            out.line_dash = d;
        }
        if let Some(c) = self.line_cap {
            out.line_cap = c;
        }
        if let Some(j) = self.line_join {
            out.line_join = j;
        }
        self.font.apply_to(&mut out.font);
        if let Some(ax) = self.text_anchor_x {
            out.text_anchor_x = ax;
        }
        if let Some(ay) = self.text_anchor_y {
            out.text_anchor_y = ay;
        }
    }
}

/// Fully resolved attributes as seen by one drawable.
#[derive(Debug, Clone)]
pub struct Collected {
    pub line_color: Color,
    pub fill_color: Color,
    pub text_color: Color,
    pub line_width: f64,
    pub line_dash: (f64, f64),
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub font: Font,
    pub text_anchor_x: AnchorX,
    pub text_anchor_y: AnchorY,
}

impl Default for Collected {
    fn default() -> Self {
        Self {
            line_color: Color::black(),
            fill_color: Color::clear(),
            text_color: Color::black(),
            line_width: 1.0,
            line_dash: (0.0, 0.0),
            line_cap: LineCap::Butt,
            line_join: LineJoin::Sharp,
            font: Font::default(),
            text_anchor_x: AnchorX::Mid,
            text_anchor_y: AnchorY::Mid,
        }
    }
}
