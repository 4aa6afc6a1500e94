//! The annotation mini-language.
//!
//! `@` lines attach user-authored primitives to the current chart, `@@`
//! lines to the whole document. Keywords either mutate persistent drawing
//! state (colors, widths, anchors), snapshot it (`Context: {` / `}`), or
//! draw primitives whose coordinates are given in axis values, with
//! optional `Left/Right/Center` style keywords and `value+offset` forms.
//! Primitives land on the chart's top or bottom annotation layer.

use crate::axis::Axis;
use crate::chart::Chart;
use crate::ensemble::Ensemble;
use crate::error::Result;
use crate::geom::{AnchorX, AnchorY, Point, Pos};
use crate::scene::{NodeId, Scene, Shape};
use crate::source::{Position, Source};
use crate::visual::color::Color;

#[derive(Clone)]
struct AnnoState {
    point_coor: bool,
    axis_y_n: Vec<usize>,
    layer: Pos,
    line_width: f64,
    line_dash: f64,
    line_hole: f64,
    line_color: Color,
    fill_color: Color,
    text_color: Color,
    text_anchor_x: AnchorX,
    text_anchor_y: AnchorY,
    text_size: f64,
    text_bold: bool,
    width_adj: f64,
    height_adj: f64,
    baseline_adj: f64,
    text_arrow_dx: f64,
    text_arrow_dy: f64,
    text_arrow_head_gap: f64,
    text_arrow_tail_gap: f64,
    rect_radius: f64,
    arrow_width: f64,
}

impl AnnoState {
    fn new(chart_cnt: usize) -> Self {
        Self {
            point_coor: false,
            axis_y_n: vec![0; chart_cnt],
            layer: Pos::Top,
            line_width: 1.0,
            line_dash: 0.0,
            line_hole: 0.0,
            line_color: Color::black(),
            fill_color: Color::white(),
            text_color: Color::black(),
            text_anchor_x: AnchorX::Mid,
            text_anchor_y: AnchorY::Mid,
            text_size: 16.0,
            text_bold: false,
            width_adj: 1.0,
            height_adj: 1.0,
            baseline_adj: 1.0,
            text_arrow_dx: 0.0,
            text_arrow_dy: 0.0,
            text_arrow_head_gap: 0.0,
            text_arrow_tail_gap: 0.0,
            rect_radius: 0.0,
            arrow_width: 0.0,
        }
    }
}

struct Annotator<'a> {
    scene: &'a mut Scene,
    source: &'a mut Source,
    charts: &'a [Chart],
    global: bool,
    state: AnnoState,
    stack: Vec<AnnoState>,
    new_group: bool,
    current_g: Option<NodeId>,
    upper_g: NodeId,
    lower_g: Option<NodeId>,
}

/// Run the `@` annotations of one chart into its annotation layers.
pub fn run_chart_annotations(
    scene: &mut Scene,
    source: &mut Source,
    chart: &mut Chart,
) -> Result<()> {
    if chart.annotation_anchors.is_empty() {
        return Ok(());
    }
    let anchors = chart.annotation_anchors.clone();
    let upper_g = chart.anno_upper_g;
    let lower_g = chart.anno_lower_g;
    let mut annotator = Annotator {
        scene,
        source,
        charts: std::slice::from_ref(chart),
        global: false,
        state: AnnoState::new(1),
        stack: Vec::new(),
        new_group: true,
        current_g: None,
        upper_g,
        lower_g: Some(lower_g),
    };
    annotator.run(&anchors)
}

/// Run the `@@` annotations onto the document's top layer.
pub fn run_global_annotations(ensemble: &mut Ensemble, source: &mut Source) -> Result<()> {
    if ensemble.annotation_anchors.is_empty() {
        return Ok(());
    }
    let anchors = ensemble.annotation_anchors.clone();
    let upper_g = ensemble.scene.add_group(ensemble.top_g);
    let Ensemble { scene, charts, .. } = ensemble;
    let chart_cnt = charts.len();
    let mut annotator = Annotator {
        scene,
        source,
        charts,
        global: true,
        state: AnnoState::new(chart_cnt),
        stack: Vec::new(),
        new_group: true,
        current_g: None,
        upper_g,
        lower_g: None,
    };
    annotator.run(&anchors)
}

impl Annotator<'_> {
    fn run(&mut self, anchors: &[Position]) -> Result<()> {
        for anchor in anchors {
            self.source.goto_pos(anchor)?;
            loop {
                self.source.skip_ws(true)?;
                if self.source.at_eof() {
                    break;
                }
                if self.source.at_sol() {
                    if self.source.cur_char() != b'@' {
                        break;
                    }
                    let double = self.source.peek_char(1) == b'@';
                    if double != self.global {
                        break;
                    }
                }
                let key = self.source.get_key()?;
                let strip = if self.global { 2 } else { 1 };
                let bare = key.get(strip..).unwrap_or("");
                self.dispatch(bare, &key)?;
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, bare: &str, full: &str) -> Result<()> {
        match bare {
            "PointCoor" => {
                self.state.point_coor = self.source.get_switch()?;
                self.source.expect_eol()
            }
            "Axis" => self.do_axis(),
            "Layer" => self.do_layer(),
            "LineWidth" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("line width expected", false));
                }
                let w = self.source.get_double()?;
                if w < 0.0 {
                    return Err(self.source.parse_err("invalid line width", true));
                }
                self.state.line_width = w;
                self.source.expect_eol()?;
                self.new_group = true;
                Ok(())
            }
            "LineDash" => self.do_line_dash(),
            "LineColor" => {
                self.source.get_color(&mut self.state.line_color)?;
                self.new_group = true;
                Ok(())
            }
            "FillColor" => {
                self.source.get_color(&mut self.state.fill_color)?;
                self.new_group = true;
                Ok(())
            }
            "TextColor" => self.source.get_color(&mut self.state.text_color),
            "TextAnchor" => self.do_text_anchor(),
            "TextSize" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("text size expected", false));
                }
                let s = self.source.get_double()?;
                if s <= 0.0 {
                    return Err(self.source.parse_err("invalid text size", true));
                }
                self.state.text_size = s;
                self.source.expect_eol()
            }
            "TextBold" => {
                self.state.text_bold = self.source.get_switch()?;
                self.source.expect_eol()
            }
            "LetterSpacing" => {
                let (w, h, b) = self.source.get_letter_spacing()?;
                self.state.width_adj = w;
                self.state.height_adj = h;
                self.state.baseline_adj = b;
                Ok(())
            }
            "RectCornerRadius" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("radius size expected", false));
                }
                let r = self.source.get_double()?;
                if r < 0.0 {
                    return Err(self.source.parse_err("invalid radius", true));
                }
                self.state.rect_radius = r;
                self.source.expect_eol()
            }
            "ArrowWidth" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("arrow width expected", false));
                }
                let w = self.source.get_double()?;
                if w < 0.0 {
                    return Err(self.source.parse_err("invalid arrow width", true));
                }
                self.state.arrow_width = w;
                self.source.expect_eol()
            }
            "Line" => self.do_line(),
            "Rect" => self.do_rect(),
            "Circle" => self.do_circle(),
            "Ellipse" => self.do_ellipse(),
            "Polyline" => self.do_poly(false),
            "Polygon" => self.do_poly(true),
            "TextArrow" => self.do_text_arrow(),
            "Text" => self.build_text(false),
            "TextBox" => self.build_text(true),
            "Arrow" => self.do_arrow(),
            "Context" => self.do_context(),
            _ => Err(self
                .source
                .parse_err(&format!("unknown KEY '{full}'"), true)),
        }
    }

    //--------------------------------------------------------------------
    // State keywords.

    fn main_idx(&mut self) -> Result<usize> {
        let mut i: i64 = 0;
        if self.global {
            let Some(v) = self.source.get_int64(false) else {
                return Err(self.source.parse_err("invalid chart number", false));
            };
            i = v;
            if self.source.cur_char() != b':' {
                return Err(self.source.parse_err("':' expected", false));
            }
            self.source.get_char();
        }
        if i < 0 || i as usize >= self.charts.len() {
            return Err(self.source.parse_err("chart number out of range", true));
        }
        Ok(i as usize)
    }

    fn do_axis(&mut self) -> Result<()> {
        self.source.skip_ws(false)?;
        let main_idx = self.main_idx()?;
        let n = self.source.get_axis()?;
        self.state.axis_y_n[main_idx] = n;
        self.source.expect_eol()?;
        if !self.charts[main_idx].axis_y[n].show {
            return Err(self.source.parse_err("no Y2-axis is defined", true));
        }
        Ok(())
    }

    fn do_layer(&mut self) -> Result<()> {
        self.source.skip_ws(false)?;
        let id = self.source.get_identifier();
        let layer = match id.as_str() {
            "Top" => Pos::Top,
            "Bottom" => Pos::Bottom,
            "" => return Err(self.source.parse_err("Top or Bottom expected", false)),
            _ => {
                return Err(self.source.parse_err(&format!("unknown layer '{id}'"), true));
            }
        };
        if layer == Pos::Bottom && self.lower_g.is_none() {
            return Err(self.source.parse_err("illegal layer", true));
        }
        self.state.layer = layer;
        self.source.expect_eol()?;
        self.new_group = true;
        Ok(())
    }

    fn do_line_dash(&mut self) -> Result<()> {
        self.source.skip_ws(false)?;
        if self.source.at_eol() {
            return Err(self.source.parse_err("line dash expected", false));
        }
        let mut dash = self.source.get_double()?;
        if dash < 0.0 {
            return Err(self.source.parse_err("invalid line dash", true));
        }
        let mut hole = dash;
        if !self.source.at_eol() {
            self.source.expect_ws("")?;
            if !self.source.at_eol() {
                hole = self.source.get_double()?;
                if hole < 0.0 {
                    return Err(self.source.parse_err("invalid line hole", true));
                }
            }
        }
        if hole == 0.0 {
            dash = 0.0;
        }
        self.state.line_dash = dash;
        self.state.line_hole = hole;
        self.source.expect_eol()?;
        self.new_group = true;
        Ok(())
    }

    fn do_text_anchor(&mut self) -> Result<()> {
        self.source.skip_ws(false)?;
        self.state.text_anchor_x = AnchorX::Mid;
        self.state.text_anchor_y = AnchorY::Mid;
        if self.source.at_eol() {
            return Err(self.source.parse_err("anchor expected", false));
        }
        while !self.source.at_eol() {
            let id = self.source.get_identifier();
            match id.as_str() {
                "Left" => self.state.text_anchor_x = AnchorX::Min,
                "Right" => self.state.text_anchor_x = AnchorX::Max,
                "Bottom" => self.state.text_anchor_y = AnchorY::Min,
                "Top" => self.state.text_anchor_y = AnchorY::Max,
                "Center" => {}
                _ => {
                    return Err(
                        self.source.parse_err(&format!("unknown anchor '{id}'"), true)
                    );
                }
            }
            self.source.skip_ws(false)?;
        }
        self.source.expect_eol()
    }

    fn do_text_arrow(&mut self) -> Result<()> {
        self.state.text_arrow_head_gap = 0.0;
        self.state.text_arrow_tail_gap = 0.0;
        self.source.skip_ws(false)?;
        self.state.text_arrow_dx = self.source.get_double()?;
        self.source.skip_ws(false)?;
        self.state.text_arrow_dy = self.source.get_double()?;
        self.source.skip_ws(false)?;
        if !self.source.at_eol() {
            self.state.text_arrow_head_gap = self.source.get_double()?;
            self.source.skip_ws(false)?;
            if !self.source.at_eol() {
                self.state.text_arrow_tail_gap = self.source.get_double()?;
            }
        }
        self.source.expect_eol()
    }

    fn do_context(&mut self) -> Result<()> {
        self.source.skip_ws(false)?;
        match self.source.cur_char() {
            b'{' => self.stack.push(self.state.clone()),
            b'}' => {
                let Some(prev) = self.stack.pop() else {
                    return Err(self.source.parse_err("unmatched context brace", false));
                };
                self.state = prev;
                self.new_group = true;
            }
            _ => return Err(self.source.parse_err("brace expected", false)),
        }
        self.source.get_char();
        self.source.expect_eol()
    }

    //--------------------------------------------------------------------
    // Coordinates.

    fn get_coor(&mut self, x_coor: bool) -> Result<f64> {
        self.source.skip_ws(false)?;
        if self.source.at_eol() {
            return Err(self.source.parse_err("coordinate expected", false));
        }

        let main_idx = self.main_idx()?;
        let chart = &self.charts[main_idx];
        let mut y_axis_n: Option<usize> = None;
        if !(x_coor ^ (chart.axis_x.angle != 0)) {
            y_axis_n = Some(self.state.axis_y_n[main_idx]);
        }

        // Optional explicit Y-axis prefix.
        if y_axis_n.is_some() {
            let c0 = self.source.cur_char();
            let c1 = self.source.peek_char(1);
            let c2 = self.source.peek_char(2);
            if c0 == b'Y' && c2 == b':' && (c1 == b'1' || c1 == b'2') {
                let n = if c1 == b'1' { 0 } else { 1 };
                y_axis_n = Some(n);
                self.source.cur.loc.char_idx += 3;
                if !chart.axis_y[n].show {
                    return Err(self.source.parse_err("no Y2-axis is defined", true));
                }
            }
        }
        let axis: &Axis = match y_axis_n {
            Some(n) => &chart.axis_y[n],
            None => &chart.axis_x,
        };

        let mut d1;
        let mut d1_is_coor = false;
        let c = self.source.cur_char();
        if c.is_ascii_uppercase() {
            let start = self.source.cur.loc.char_idx;
            let mut end = start;
            while self.source.buf().get(end).is_some_and(|b| b.is_ascii_alphabetic()) {
                end += 1;
            }
            let word =
                String::from_utf8_lossy(&self.source.buf()[start..end]).to_string();
            let hit = if x_coor {
                match word.as_str() {
                    "Left" | "L" => Some(0.0),
                    "Right" | "R" => Some(axis.length),
                    "Center" | "C" => Some(axis.length / 2.0),
                    _ => None,
                }
            } else {
                match word.as_str() {
                    "Bottom" | "B" => Some(0.0),
                    "Top" | "T" => Some(axis.length),
                    "Center" | "C" => Some(axis.length / 2.0),
                    _ => None,
                }
            };
            let Some(v) = hit else {
                return Err(self.source.parse_err("invalid coordinate", true));
            };
            d1 = v;
            self.source.cur.loc.char_idx = end;
            d1_is_coor = true;
        } else {
            d1 = self.source.get_double_prefix()?;
        }

        if self.source.at_sep() && self.state.point_coor {
            d1_is_coor = true;
        }
        if !d1_is_coor {
            if !axis.valid(d1) {
                return Err(self.source.parse_err("illegal value", true));
            }
            d1 = axis.coor(d1);
        }
        let mut d2 = 0.0;
        if !self.source.at_sep() {
            let c = self.source.cur_char();
            if c != b'+' && c != b'-' {
                return Err(self.source.parse_err("invalid coordinate", true));
            }
            d2 = self.source.get_double()?;
        }

        let d3 = if x_coor { chart.g_dx } else { chart.g_dy };
        Ok(d1 + d2 + d3)
    }

    //--------------------------------------------------------------------
    // Drawing.

    fn cur_group(&mut self) -> NodeId {
        if self.new_group {
            let parent = if self.state.layer == Pos::Top {
                self.upper_g
            } else {
                self.lower_g.expect("layer was validated")
            };
            let g = self.scene.add_group(parent);
            let line_color = self.state.line_color;
            let fill_color = self.state.fill_color;
            let attr = self.scene.attr_mut(g);
            attr.set_line_width(self.state.line_width);
            attr.set_line_dash(self.state.line_dash, self.state.line_hole);
            attr.line_color().set(&line_color);
            attr.fill_color().set(&fill_color);
            self.current_g = Some(g);
            self.new_group = false;
        }
        self.current_g.expect("a group exists")
    }

    fn do_line(&mut self) -> Result<()> {
        let x1 = self.get_coor(true)?;
        let y1 = self.get_coor(false)?;
        let x2 = self.get_coor(true)?;
        let y2 = self.get_coor(false)?;
        self.source.expect_eol()?;
        let g = self.cur_group();
        self.scene.add(g, Shape::line(x1, y1, x2, y2));
        Ok(())
    }

    fn do_rect(&mut self) -> Result<()> {
        let x1 = self.get_coor(true)?;
        let y1 = self.get_coor(false)?;
        let x2 = self.get_coor(true)?;
        let y2 = self.get_coor(false)?;
        self.source.expect_eol()?;
        let g = self.cur_group();
        let radius = self.state.rect_radius;
        self.scene.add(g, Shape::rounded_rect(x1, y1, x2, y2, radius));
        Ok(())
    }

    fn do_circle(&mut self) -> Result<()> {
        let x = self.get_coor(true)?;
        let y = self.get_coor(false)?;
        self.source.skip_ws(false)?;
        let r = self.source.get_double()?;
        self.source.expect_eol()?;
        let g = self.cur_group();
        self.scene.add(g, Shape::circle(Point::new(x, y), r));
        Ok(())
    }

    fn do_ellipse(&mut self) -> Result<()> {
        let x = self.get_coor(true)?;
        let y = self.get_coor(false)?;
        self.source.skip_ws(false)?;
        let rx = self.source.get_double()?;
        self.source.skip_ws(false)?;
        let ry = self.source.get_double()?;
        self.source.expect_eol()?;
        let g = self.cur_group();
        self.scene.add(g, Shape::ellipse(Point::new(x, y), rx, ry));
        Ok(())
    }

    fn do_poly(&mut self, polygon: bool) -> Result<()> {
        let mut points = Vec::new();
        loop {
            self.source.skip_ws(false)?;
            if self.source.at_eol() {
                break;
            }
            let x = self.get_coor(true)?;
            let y = self.get_coor(false)?;
            points.push(Point::new(x, y));
        }
        let g = self.cur_group();
        let poly = self.scene.add(
            g,
            if polygon { Shape::polygon(points) } else { Shape::polyline(points) },
        );
        if !polygon {
            self.scene.attr_mut(poly).fill_color().set_clear();
        }
        Ok(())
    }

    fn do_arrow(&mut self) -> Result<()> {
        let x1 = self.get_coor(true)?;
        let y1 = self.get_coor(false)?;
        let x2 = self.get_coor(true)?;
        let y2 = self.get_coor(false)?;
        let mut head_gap = 0.0;
        let mut tail_gap = 0.0;
        self.source.skip_ws(false)?;
        if !self.source.at_eol() {
            head_gap = self.source.get_double()?;
            self.source.skip_ws(false)?;
            if !self.source.at_eol() {
                tail_gap = self.source.get_double()?;
            }
        }
        self.source.expect_eol()?;
        let g = self.cur_group();
        let arrow_width = self.state.arrow_width;
        self.build_arrow(
            g,
            Point::new(x1, y1),
            Point::new(x2, y2),
            head_gap,
            tail_gap,
            arrow_width,
        );
        Ok(())
    }

    /// Draw an arrow pointing from `p1` toward `p2`.
    fn build_arrow(
        &mut self,
        g: NodeId,
        p1: Point,
        p2: Point,
        head_gap: f64,
        tail_gap: f64,
        arrow_width: f64,
    ) {
        let base_width = if arrow_width > 0.0 { arrow_width } else { self.state.line_width };
        let mut head_length = (2.0 * base_width).max(8.0);
        let head_width = head_length * 1.2;

        let dx = p1.x - p2.x;
        let dy = p1.y - p2.y;
        let theta = dy.atan2(dx).to_degrees();
        let length = ((dx * dx + dy * dy).sqrt() - head_gap - tail_gap).max(0.0);
        head_length = head_length.min(length);

        if length == 0.0 || base_width == 0.0 {
            return;
        }

        let points = vec![
            Point::new(head_gap, 0.0),
            Point::new(head_gap + head_length, head_width / 2.0),
            Point::new(head_gap + head_length, base_width / 2.0),
            Point::new(head_gap + length, base_width / 2.0),
            Point::new(head_gap + length, -base_width / 2.0),
            Point::new(head_gap + head_length, -base_width / 2.0),
            Point::new(head_gap + head_length, -head_width / 2.0),
        ];
        let poly = self.scene.add(g, Shape::polygon(points));
        if arrow_width == 0.0 {
            let line_color = self.state.line_color;
            let attr = self.scene.attr_mut(poly);
            attr.set_line_width(0.0);
            attr.fill_color().set(&line_color);
        }
        self.scene.rotate(poly, theta, Point::new(0.0, 0.0));
        self.scene.translate(poly, p2.x, p2.y);
    }

    fn build_text(&mut self, boxed: bool) -> Result<()> {
        let px = self.get_coor(true)?;
        let py = self.get_coor(false)?;
        self.source.expect_eol()?;
        let txt = self.source.get_text(true)?;

        let mut dx = self.state.text_arrow_dx;
        let mut dy = self.state.text_arrow_dy;
        let arrow_length = (dx * dx + dy * dy).sqrt();
        let arrow = dx != 0.0 || dy != 0.0;
        let mut pa = Point::new(0.0, 0.0);

        let cur_g = self.cur_group();
        let mut all_g = cur_g;

        if arrow {
            all_g = self.scene.add_group(cur_g);
            if self.state.text_anchor_x == AnchorX::Min {
                dx = -dx.abs();
            }
            if self.state.text_anchor_x == AnchorX::Max {
                dx = dx.abs();
            }
            if self.state.text_anchor_y == AnchorY::Min {
                dy = -dy.abs();
            }
            if self.state.text_anchor_y == AnchorY::Max {
                dy = dy.abs();
            }
            if self.state.text_anchor_x == AnchorX::Mid && self.state.text_anchor_y != AnchorY::Mid
            {
                dx = 0.0;
                dy = if self.state.text_anchor_y == AnchorY::Min {
                    -arrow_length
                } else {
                    arrow_length
                };
            }
            if self.state.text_anchor_y == AnchorY::Mid && self.state.text_anchor_x != AnchorX::Mid
            {
                dy = 0.0;
                dx = if self.state.text_anchor_x == AnchorX::Min {
                    -arrow_length
                } else {
                    arrow_length
                };
            }
            pa = Point::new(-dx, -dy);
            let head_gap = self.state.text_arrow_head_gap;
            let tail_gap = self.state.text_arrow_tail_gap;
            let arrow_width = self.state.arrow_width;
            self.build_arrow(all_g, pa, Point::new(0.0, 0.0), head_gap, tail_gap, arrow_width);
        }

        let txt_g = self.scene.add_group(all_g);
        if !arrow {
            all_g = txt_g;
        }

        let lab_g = crate::label::create_label(self.scene, txt_g, &txt, self.state.text_size);
        {
            let text_color = self.state.text_color;
            let attr = self.scene.attr_mut(lab_g);
            attr.text_font()
                .set_width_factor(self.state.width_adj)
                .set_height_factor(self.state.height_adj)
                .set_baseline_factor(self.state.baseline_adj);
            if self.state.text_bold {
                attr.text_font().set_bold();
            }
            attr.text_color().set(&text_color);
        }
        let bb = self.scene.bbox(lab_g);
        let mut mx = self.state.text_size / 4.0;
        let mut my = mx;
        // Temporary dummy rectangle supplies the text margin while the
        // group is anchored.
        self.scene.add(
            txt_g,
            Shape::rect(bb.min.x - mx, bb.min.y - my, bb.max.x + mx, bb.max.y + my),
        );
        if boxed {
            mx += self.state.line_width / 2.0;
            my += self.state.line_width / 2.0;
            self.scene.add(
                txt_g,
                Shape::rounded_rect(
                    bb.min.x - mx,
                    bb.min.y - my,
                    bb.max.x + mx,
                    bb.max.y + my,
                    self.state.rect_radius,
                ),
            );
            self.scene.front_to_back(txt_g);
            if arrow {
                let r = self.state.rect_radius;
                let ddx = (dx / arrow_length) * r;
                let ddy = (dy / arrow_length) * r;
                if self.state.text_anchor_x == AnchorX::Min {
                    if self.state.text_anchor_y == AnchorY::Min {
                        pa.x -= r + ddx;
                        pa.y -= r + ddy;
                    }
                    if self.state.text_anchor_y == AnchorY::Max {
                        pa.x -= r + ddx;
                        pa.y += r - ddy;
                    }
                }
                if self.state.text_anchor_x == AnchorX::Max {
                    if self.state.text_anchor_y == AnchorY::Min {
                        pa.x += r - ddx;
                        pa.y -= r + ddy;
                    }
                    if self.state.text_anchor_y == AnchorY::Max {
                        pa.x += r - ddx;
                        pa.y += r - ddy;
                    }
                }
            }
        }
        self.scene
            .move_to(txt_g, self.state.text_anchor_x, self.state.text_anchor_y, pa.x, pa.y);
        // Delete the dummy again. The boxed rectangle was already moved to
        // the back, so the dummy is the last child.
        self.scene.pop_child(txt_g);
        self.scene.translate(all_g, px, py);
        Ok(())
    }
}
