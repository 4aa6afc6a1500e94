//! Series legends.
//!
//! Series with an identical visible legend merge into one entry. The legend
//! knows how to measure itself (`calc_dims`/`get_dims`), pick the best
//! row/column split for an available rectangle (`get_best_fit`), and render
//! itself (`build`). Candidate interior placements are described by
//! [`LegendBox`] records whose weights are accumulated while series draw.

use crate::geom::{AnchorX, AnchorY, BoundaryBox, Point, Pos};
use crate::scene::attr::LineJoin;
use crate::scene::{NodeId, Scene, Shape};
use crate::series::clip::{clip_line, ClipEps};
use crate::series::marker::{build_marker, MarkerDims, MarkerShape};
use crate::series::{Series, SeriesType};
use crate::value::{BOX_SPACING, NUM_HI};
use crate::visual::color::Color;

/// A series addressed across the ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesRef {
    pub chart: usize,
    pub series: usize,
}

/// A candidate interior legend placement.
#[derive(Debug, Clone, Copy)]
pub struct LegendBox {
    pub bb: BoundaryBox,
    /// Number of columns.
    pub nx: u32,
    /// Spare slots in the last row.
    pub sp: u32,
    /// 1st priority cost: data points inside the box.
    pub weight1: f64,
    /// 2nd priority cost: series line length crossing the box.
    pub weight2: f64,
    pub anchor_x: AnchorX,
    pub anchor_y: AnchorY,
}

/// Accumulate interior-placement costs for a data segment `p1..p2`.
pub fn update_legend_boxes(
    lb_list: &mut [LegendBox],
    eps: &ClipEps,
    p1: Point,
    p2: Point,
    p1_inc: bool,
    p2_inc: bool,
) {
    for lb in lb_list.iter_mut() {
        if (p1.x < lb.bb.min.x && p2.x < lb.bb.min.x)
            || (p1.x > lb.bb.max.x && p2.x > lb.bb.max.x)
            || (p1.y < lb.bb.min.y && p2.y < lb.bb.min.y)
            || (p1.y > lb.bb.max.y && p2.y > lb.bb.max.y)
        {
            continue;
        }
        let p1_inside = lb.bb.contains(p1);
        let p2_inside = lb.bb.contains(p2);
        if p1_inside && p1_inc {
            lb.weight1 += 1.0;
        }
        if p2_inside && p2_inc {
            lb.weight1 += 1.0;
        }
        let (c1, c2);
        if p1_inside && p2_inside {
            c1 = p1;
            c2 = p2;
        } else {
            let (n, k1, k2) = clip_line(&lb.bb, eps, p1, p2);
            if p1_inside || p2_inside {
                if n != 1 {
                    continue;
                }
                c1 = k1;
                c2 = if p1_inside { p1 } else { p2 };
            } else {
                if n != 2 {
                    continue;
                }
                c1 = k1;
                c2 = k2;
            }
        }
        let dx = c1.x - c2.x;
        let dy = c1.y - c2.y;
        lb.weight2 += (dx * dx + dy * dy).sqrt();
    }
}

/// The visible-legend snapshot of one merge group of series.
#[derive(Debug, Clone)]
pub struct LegendItem {
    pub name: String,
    pub series_type: SeriesType,
    pub line_color: Color,
    pub line_width: f64,
    pub line_dash: f64,
    pub line_hole: f64,
    pub fill_color: Color,
    pub marker_show: bool,
    pub marker_show_out: bool,
    pub marker_show_int: bool,
    pub marker_shape: MarkerShape,
    pub marker_size: f64,
    pub marker_int: MarkerDims,
    pub marker_out: MarkerDims,
    pub has_line: bool,
    pub has_fill: bool,
    pub line_color_shown: bool,
    pub fill_color_shown: bool,
    pub legend_outline: bool,
    /// All series sharing this legend entry.
    pub members: Vec<SeriesRef>,
}

impl LegendItem {
    pub fn from_series(series: &Series, at: SeriesRef) -> Self {
        Self {
            name: series.name.clone(),
            series_type: series.series_type,
            line_color: series.line_color,
            line_width: series.line_width,
            line_dash: series.line_dash,
            line_hole: series.line_hole,
            fill_color: series.fill_color,
            marker_show: series.marker_show,
            marker_show_out: series.marker_show_out,
            marker_show_int: series.marker_show_int,
            marker_shape: series.marker_shape,
            marker_size: series.marker_size,
            marker_int: series.marker_int,
            marker_out: series.marker_out,
            has_line: series.has_line,
            has_fill: series.has_fill,
            line_color_shown: series.line_color_shown,
            fill_color_shown: series.fill_color_shown,
            legend_outline: series.legend_outline,
            members: vec![at],
        }
    }

    fn family(&self) -> u32 {
        match self.series_type {
            SeriesType::Point | SeriesType::Scatter => 0,
            SeriesType::Line | SeriesType::XY => 1,
            SeriesType::Bar | SeriesType::StackedBar | SeriesType::LayeredBar => 2,
            SeriesType::Area | SeriesType::StackedArea => 3,
            SeriesType::Lollipop => 4,
        }
    }

    /// Two series produce exactly one legend entry when every visible
    /// legend attribute matches.
    pub fn same_legend(a: &LegendItem, b: &LegendItem) -> bool {
        let mut same = a.family() == b.family() || a.series_type == b.series_type;
        same = same
            && a.name == b.name
            && a.marker_show == b.marker_show
            && a.marker_show_out == b.marker_show_out
            && a.marker_show_int == b.marker_show_int
            && a.has_line == b.has_line
            && a.has_fill == b.has_fill
            && a.line_color_shown == b.line_color_shown
            && a.fill_color_shown == b.fill_color_shown;
        if same && a.line_color_shown {
            same = a.line_color == b.line_color;
        }
        if same && a.fill_color_shown {
            same = a.fill_color == b.fill_color;
        }
        if same && a.has_line {
            same = a.legend_outline == b.legend_outline
                && a.line_width == b.line_width
                && a.line_dash == b.line_dash
                && a.line_hole == b.line_hole;
        }
        if same && a.marker_show {
            same = a.marker_size == b.marker_size && a.marker_shape == b.marker_shape;
        }
        same
    }

    fn has_outline(&self) -> bool {
        self.legend_outline && self.has_line && !self.series_type.is_fillable()
    }

    fn shows_marker_symbol(&self) -> bool {
        self.marker_show
            && !self.series_type.is_area_family()
            && (!self.marker_shape.is_line_style()
                || matches!(self.series_type, SeriesType::Scatter | SeriesType::Point))
    }

    fn apply_line_style(&self, scene: &mut Scene, obj: NodeId) {
        let attr = scene.attr_mut(obj);
        attr.set_line_width(self.line_width);
        if self.line_width > 0.0 {
            if self.line_dash > 0.0 {
                attr.set_line_dash(self.line_dash, self.line_hole);
            }
            attr.line_color().set(&self.line_color);
        } else {
            attr.line_color().set_clear();
        }
        attr.fill_color().set_clear();
    }

    fn apply_fill_style(&self, scene: &mut Scene, obj: NodeId) {
        let attr = scene.attr_mut(obj);
        attr.line_color().set_clear();
        attr.fill_color().set(&self.fill_color);
    }

    fn apply_mark_style(&self, scene: &mut Scene, obj: NodeId) {
        if self.marker_shape.is_line_style() {
            self.apply_line_style(scene, obj);
            scene.attr_mut(obj).set_solid();
            return;
        }
        let attr = scene.attr_mut(obj);
        attr.line_color().set_clear();
        if self.line_width > 0.0 {
            attr.fill_color().set(&self.line_color);
        } else {
            attr.fill_color().set_clear();
        }
    }

    fn apply_hole_style(&self, scene: &mut Scene, obj: NodeId) {
        let attr = scene.attr_mut(obj);
        attr.line_color().set_clear();
        attr.fill_color().set(&self.fill_color);
    }
}

/// Metrics of one legend layout pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegendDims {
    /// Character height.
    pub ch: f64,
    /// Max outline width.
    pub ow: f64,
    /// Outline corner radius.
    pub cr: f64,
    /// Marker width/height.
    pub mw: f64,
    pub mh: f64,
    /// Symbol size "radius" (including markers).
    pub ss: f64,
    /// Extra X caused by symbol overhang, left and right.
    pub lx: f64,
    pub rx: f64,
    /// Text indentation relative to the symbol center.
    pub tx: f64,
    /// Delta between individual legends.
    pub dx: f64,
    pub dy: f64,
    /// Size of one legend entry.
    pub sx: f64,
    pub sy: f64,
    /// Heading extent.
    pub hx: f64,
    pub hy: f64,
}

/// A legend object: the merge groups plus placement preferences.
#[derive(Default)]
pub struct Legend {
    pub items: Vec<LegendItem>,
    pub heading: String,
    pub pos1: Pos,
    pub pos2: Option<Pos>,
    pub force_nx: u32,
    pub grid_coor_specified: bool,
    pub size: f64,
}

impl Legend {
    pub fn new() -> Self {
        Self { size: 1.0, ..Self::default() }
    }

    /// Add a series, merging with an existing identical entry.
    pub fn add(&mut self, series: &Series, at: SeriesRef) {
        let item = LegendItem::from_series(series, at);
        for existing in &mut self.items {
            if LegendItem::same_legend(existing, &item) {
                existing.members.push(at);
                return;
            }
        }
        self.items.push(item);
    }

    pub fn cnt(&self) -> u32 {
        self.items.len() as u32
    }

    pub fn margin_x(&self, boxed: bool) -> f64 {
        (if boxed { 1.0 } else { 2.0 }) * BOX_SPACING
    }

    pub fn margin_y(&self, _boxed: bool) -> f64 {
        BOX_SPACING
    }

    /// Measure the legend entries. Mutates per-item outline decisions that
    /// depend on the whole set (mixed symbol kinds, fat lines).
    pub fn calc_dims(&mut self, scene: &mut Scene, g: NodeId) -> LegendDims {
        let mut d = LegendDims { dx: 8.0, dy: 4.0, ..LegendDims::default() };

        let probe = scene.add(g, Shape::label("X"));
        let bb = scene.bbox(probe);
        scene.pop_child(g);
        let char_w = bb.width();
        let char_h = bb.height();

        if !self.heading.is_empty() {
            let label = crate::label::create_label(scene, g, &self.heading, char_h * 1.2);
            let bb = scene.bbox(label);
            scene.pop_child(g);
            d.hx = bb.width();
            d.hy = bb.height() + char_h / 2.0;
        }

        let ox = char_h / 3.0; // Text to outline X spacing.
        let oy = char_h / 5.0; // Text to outline Y spacing.

        let mut symbol_shown = false;
        let mut line_wo_symbol = false;
        for item in &self.items {
            if item.name.is_empty() {
                continue;
            }
            if item.shows_marker_symbol() || item.series_type.is_fillable() {
                symbol_shown = true;
            } else {
                line_wo_symbol = true;
            }
        }

        for item in &mut self.items {
            if item.name.is_empty() {
                continue;
            }
            if symbol_shown && line_wo_symbol {
                // Mixed symbol kinds would make outlines look misaligned.
                item.legend_outline = false;
            }
            if item.line_width > char_h * 0.8 {
                item.legend_outline = false;
            }
            if item.has_outline() {
                d.ow = d.ow.max(item.line_width);
            }
        }
        let how = d.ow / 2.0;

        for item in &self.items {
            if item.name.is_empty() || !item.shows_marker_symbol() {
                continue;
            }
            d.mw = d.mw.max(item.marker_out.width());
            d.mh = d.mh.max(item.marker_out.height());
        }

        d.ss = d.mw.max(d.mh) / 2.0;

        let mut line_symbol_width = -1.0f64;
        for item in &self.items {
            if item.name.is_empty() {
                continue;
            }
            if item.series_type.is_fillable() {
                if item.has_fill || item.has_line {
                    d.ss = d.ss.max((char_h + 8.0) / 2.0);
                }
                if item.has_line {
                    d.ss = d.ss.max(2.0 * item.line_width);
                    d.ss = d.ss.max((item.line_dash + item.line_hole) * 0.75);
                }
            }
            if item.has_line
                && !item.legend_outline
                && matches!(
                    item.series_type,
                    SeriesType::XY | SeriesType::Line | SeriesType::Lollipop
                )
            {
                if line_symbol_width < 0.0 {
                    line_symbol_width = 2.8 * char_w;
                }
                d.ss = d.ss.max(item.line_width / 2.0);
                line_symbol_width =
                    line_symbol_width.max(3.0 * item.line_dash + 2.0 * item.line_hole);
                line_symbol_width = line_symbol_width.max(3.0 * item.line_width);
                line_symbol_width = line_symbol_width.max(3.0 * d.mw);
            }
        }
        if line_symbol_width < 0.0 {
            line_symbol_width = 0.0;
        }

        d.ch = char_h;
        d.lx = d.lx.max(d.ss - how);
        d.lx = d.lx.max(line_symbol_width / 2.0 - how);
        d.dx += d.lx;
        d.tx = how + d.lx + ox;

        if how > 0.0 {
            d.cr = how + char_h / 4.0;
        }

        for item in &self.items {
            if item.name.is_empty() {
                continue;
            }
            let mut max_lines = 1usize;
            let mut max_chars = 1usize;
            let mut cur_chars = 0usize;
            for c in item.name.chars() {
                if c == '\n' {
                    max_lines += 1;
                    max_chars = max_chars.max(cur_chars);
                    cur_chars = 0;
                } else {
                    cur_chars += 1;
                }
            }
            max_chars = max_chars.max(cur_chars);
            let text_w = char_w * max_chars as f64;
            let text_h = char_h * max_lines as f64;

            let has_outline = item.has_outline();
            if has_outline {
                d.rx = d.lx;
            }

            d.sx = d.sx.max(
                2.0 * how
                    + d.lx
                    + ox
                    + text_w
                    + ox
                    + if has_outline { 2.0 * how } else { 0.0 },
            );
            d.sy = d.sy.max(
                text_h
                    + if has_outline { 2.0 * (oy + item.line_width / 2.0 + how) } else { 0.0 },
            );
            d.sy = d.sy.max(if has_outline {
                d.mh + 2.0 * (d.cr + how)
            } else {
                2.0 * d.ss
            });
        }

        d
    }

    /// Total extent with `nx` columns.
    pub fn get_dims(&self, d: &LegendDims, boxed: bool, nx: u32) -> (f64, f64) {
        let nx = nx.max(1);
        let ny = self.cnt().div_ceil(nx);
        let mut w = nx as f64 * d.sx + (nx - 1) as f64 * d.dx;
        let mut h = ny as f64 * d.sy + ny.saturating_sub(1) as f64 * d.dy;
        w += d.lx + d.rx;
        h += d.hy;
        w = w.max(d.hx);
        if boxed {
            w += 2.0 * BOX_SPACING;
            h += 2.0 * BOX_SPACING;
        }
        (w, h)
    }

    /// Pick the column count that best fits the available rectangle.
    /// Returns whether the legends fit at all.
    pub fn get_best_fit(
        &self,
        d: &LegendDims,
        nx_out: &mut u32,
        boxed: bool,
        avail_x: f64,
        avail_y: f64,
        soft_x: f64,
        soft_y: f64,
    ) -> bool {
        let soft_x = if soft_x <= 0.0 { avail_x } else { soft_x };
        let soft_y = if soft_y <= 0.0 { avail_y } else { soft_y };

        let mut best_nx = 0u32;
        let mut best_rem = 0u32;
        let mut best_fits = false;
        let mut best_exceed = NUM_HI;
        let mut best_aspect = NUM_HI;

        for nx in 1..=self.cnt().max(1) {
            let (need_x, need_y) = self.get_dims(d, boxed, nx);
            let mut rem = self.cnt() % nx;
            if rem > 0 {
                rem = nx - rem;
            }
            let fits = (avail_x <= 0.0 || avail_x >= need_x)
                && (avail_y <= 0.0 || avail_y >= need_y);
            let exceed = (need_x - soft_x).max(0.0).max((need_y - soft_y).max(0.0));
            let aspect = {
                let (a, b) = if avail_x > 0.0 && avail_y > 0.0 {
                    (need_x / need_y, avail_x / avail_y)
                } else if avail_x > 0.0 {
                    (need_x, avail_x)
                } else if avail_y > 0.0 {
                    (need_y, avail_y)
                } else {
                    (1.0, 1.0)
                };
                (a / b).max(b / a)
            };

            let mut better = best_nx == 0 || (fits && !best_fits);
            if fits == best_fits {
                if exceed < best_exceed {
                    better = true;
                }
                if exceed == best_exceed {
                    if fits && rem < best_rem {
                        better = true;
                    }
                    if (!fits || rem == best_rem) && aspect < best_aspect {
                        better = true;
                    }
                }
            }
            if better {
                best_nx = nx;
                best_rem = rem;
                best_fits = fits;
                best_exceed = exceed;
                best_aspect = aspect;
            }
        }

        *nx_out = best_nx.max(1);
        best_fits
    }

    /// Render the legend entries into a fresh content under `g`.
    ///
    /// Returns the per-item entry boxes (in build coordinates, y-up) so the
    /// caller can record them for the interactive document after moving the
    /// legend into place.
    pub fn build(
        &mut self,
        scene: &mut Scene,
        boxed: bool,
        box_line_color: &Color,
        box_fill_color: &Color,
        g: NodeId,
        nx: u32,
    ) -> Vec<(usize, BoundaryBox)> {
        scene.attr_mut(g).set_text_anchor(AnchorX::Min, AnchorY::Max);
        let d = self.calc_dims(scene, g);
        let nx = nx.max(1);
        let ny = self.cnt().div_ceil(nx);

        {
            let mx = if boxed { BOX_SPACING } else { 0.0 };
            let my = mx;
            let mut w = nx as f64 * d.sx + (nx - 1) as f64 * d.dx;
            let h = ny as f64 * d.sy + ny.saturating_sub(1) as f64 * d.dy;
            w += d.lx + d.rx;
            let ey = d.hy;
            let ex = (d.hx - w).max(0.0);
            let r1 = Point::new(-mx - d.lx - ex / 2.0, my + ey);
            let r2 = Point::new(r1.x + w + ex + 2.0 * mx, r1.y - h - ey - 2.0 * my);
            let frame = scene.add(
                g,
                Shape::rounded_rect(r1.x, r1.y, r2.x, r2.y, if boxed { BOX_SPACING } else { 0.0 }),
            );
            if boxed {
                let attr = scene.attr_mut(frame);
                attr.line_color().set(box_line_color);
                attr.set_line_width(1.0);
                if box_fill_color.is_defined() {
                    attr.fill_color().set(box_fill_color);
                }
            } else {
                let attr = scene.attr_mut(frame);
                attr.fill_color().set_clear();
                attr.line_color().set_clear();
                attr.set_line_width(0.0);
            }
            if !self.heading.is_empty() {
                let heading = self.heading.clone();
                let obj = crate::label::create_label(scene, g, &heading, d.ch * 1.2);
                scene.move_to(obj, AnchorX::Mid, AnchorY::Max, (r1.x + r2.x) / 2.0, r1.y - my);
            }
        }

        let mut entry_boxes = Vec::new();
        let items = self.items.clone();
        for (n, item) in items.iter().enumerate() {
            if item.name.is_empty() {
                continue;
            }
            let px = (n as u32 % nx) as f64 * (d.sx + d.dx);
            let py = -((n as u32 / nx) as f64) * (d.sy + d.dy);
            let mut marker_p = Point::new(px + d.ow / 2.0, py - d.sy / 2.0);

            let mut bb = BoundaryBox::new();
            bb.update_xy(px - d.lx, py - d.sy);
            bb.update_xy(px + d.rx + d.sx, py);
            entry_boxes.push((n, bb));

            let line_w = if item.has_line { item.line_width } else { 0.0 };
            let has_outline = item.has_outline();

            if has_outline {
                let rect = scene.add(
                    g,
                    Shape::rounded_rect(
                        px + d.ow / 2.0,
                        py - d.ow / 2.0,
                        px - d.ow / 2.0 + d.sx,
                        py + d.ow / 2.0 - d.sy,
                        d.cr,
                    ),
                );
                item.apply_line_style(scene, rect);
            }

            if item.has_line
                && !item.legend_outline
                && matches!(
                    item.series_type,
                    SeriesType::XY | SeriesType::Line | SeriesType::Lollipop
                )
            {
                let line = scene.add(
                    g,
                    Shape::line(
                        marker_p.x - d.ow / 2.0 - d.lx,
                        marker_p.y,
                        marker_p.x + d.ow / 2.0 + d.lx,
                        marker_p.y,
                    ),
                );
                item.apply_line_style(scene, line);
            }

            if item.shows_marker_symbol() {
                marker_p.y -= (item.marker_out.y1 + item.marker_out.y2) / 2.0;
                if item.marker_show_out {
                    let mg = scene.add_group(g);
                    build_marker(scene, mg, item.marker_shape, &item.marker_out, marker_p);
                    item.apply_mark_style(scene, mg);
                }
                if item.marker_show_int {
                    let hg = scene.add_group(g);
                    build_marker(scene, hg, item.marker_shape, &item.marker_int, marker_p);
                    item.apply_hole_style(scene, hg);
                }
            }

            if item.series_type.is_fillable() {
                let mut p1 = Point::new(marker_p.x - d.ss, marker_p.y - d.ss);
                let mut p2 = Point::new(marker_p.x + d.ss, marker_p.y + d.ss);
                if item.has_fill {
                    let q = if item.line_dash > 0.0 { 0.0 } else { line_w / 2.0 };
                    let rect = scene.add(
                        g,
                        Shape::rect(p1.x + q, p1.y + q, p2.x - q, p2.y - q),
                    );
                    item.apply_fill_style(scene, rect);
                }
                if line_w > 0.0 {
                    let dd = line_w / 2.0;
                    p1.x += dd;
                    p2.x -= dd;
                    p1.y += dd;
                    p2.y -= dd;
                    let rect = scene.add(g, Shape::rect(p1.x, p1.y, p2.x, p2.y));
                    item.apply_line_style(scene, rect);
                    scene.attr_mut(rect).set_line_join(LineJoin::Sharp);
                }
            }

            let lines = 1 + item.name.matches('\n').count();
            let tx = px + d.ow / 2.0 + d.tx;
            let mut ty = py - (d.sy - lines as f64 * d.ch) / 2.0;
            for line in item.name.split('\n') {
                if !line.is_empty() {
                    scene.add(g, Shape::text(tx, ty, line));
                }
                ty -= d.ch;
            }
        }

        entry_boxes
    }
}
