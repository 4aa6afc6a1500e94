//! Series draw routines: clip-aware polyline/marker rendering, bar
//! rectangles with stack offsets and cut edges, and area polygons stacked
//! over a running base.

use crate::axis::Axis;
use crate::error::Result;
use crate::geom::{BoundaryBox, Point, Pos};
use crate::html::HtmlSink;
use crate::legend::{update_legend_boxes, LegendBox};
use crate::scene::{NodeId, Scene, Shape};
use crate::series::clip::{clip_line, ClipEps};
use crate::series::marker::build_marker;
use crate::series::prune::{PruneCfg, PruneState};
use crate::series::{Series, SeriesType};
use crate::source::Source;
use crate::tag::{TagPlacer, TagSpec};
use crate::value::{MAX_POLY, NUM_INVALID};

/// Everything a series build needs from its chart.
pub struct BuildCtx<'a> {
    pub scene: &'a mut Scene,
    pub source: &'a mut Source,
    pub axis_x: &'a Axis,
    pub axis_y: &'a Axis,
    pub tag_db: &'a mut TagPlacer,
    pub lb_list: &'a mut Vec<LegendBox>,
    pub html: Option<HtmlSink<'a>>,
    pub category_num: usize,
    pub bar_one_width: f64,
    pub bar_all_width: f64,
    pub bar_layered_width: f64,
}

/// The scene groups a series draws into.
#[derive(Clone, Copy)]
pub struct BuildGroups {
    pub main_g: NodeId,
    pub line_g: NodeId,
    pub area_fill_g: NodeId,
    pub marker_g: Option<NodeId>,
    pub tag_g: NodeId,
}

fn tag_spec(series: &Series, area: BoundaryBox, axis_x: &Axis, axis_y: &Axis) -> TagSpec {
    TagSpec {
        series_type: series.series_type,
        tag_pos: series.tag_pos,
        tag_box: series.tag_box,
        tag_size: series.tag_size,
        tag_dist_x: series.tag_dist_x,
        tag_dist_y: series.tag_dist_y,
        unit_x: axis_x.number_unit.clone(),
        unit_y: axis_y.number_unit.clone(),
        chart_area: area,
        x_axis_angle: axis_x.angle,
        max_tag_y_len: series.max_tag_y_size,
    }
}

/// Emit pruned polyline points, splitting overlong runs.
fn emit_poly_chunks(scene: &mut Scene, g: NodeId, points: &[Point]) {
    if points.is_empty() {
        return;
    }
    let d = points.len().div_ceil(MAX_POLY);
    let mut n = 0usize;
    for i in 1..=d {
        let m = points.len() * i / d;
        scene.add(g, Shape::polyline(points[n..m].to_vec()));
        n = m;
    }
}

fn emit_markers(
    series: &Series,
    scene: &mut Scene,
    mark_g: Option<NodeId>,
    hole_g: Option<NodeId>,
    points: &[Point],
) {
    for p in points {
        if series.marker_show_out {
            if let Some(g) = mark_g {
                build_marker(scene, g, series.marker_shape, &series.marker_out, *p);
            }
        }
        if series.marker_show_int {
            if let Some(g) = hole_g {
                build_marker(scene, g, series.marker_shape, &series.marker_int, *p);
            }
        }
    }
}

//----------------------------------------------------------------------
// Line / point series.

struct LineBuilder<'c, 'a> {
    series: &'c Series,
    ctx: &'c mut BuildCtx<'a>,
    cfg: PruneCfg,
    eps: ClipEps,
    area: BoundaryBox,
    spec: TagSpec,
    line_g: NodeId,
    mark_g: Option<NodeId>,
    hole_g: Option<NodeId>,
    tag_g: NodeId,
    line_ps: PruneState,
    mark_ps: PruneState,
    at_staircase_corner: bool,
    adding_segments: bool,
    prv: Point,
    tag_direction: Pos,
}

impl LineBuilder<'_, '_> {
    fn add_point(&mut self, p: Point, x: f64, tag_x: &str, tag_y: &str, clipped: bool) {
        if self.series.has_line {
            self.line_ps.poly_add(&self.cfg, &mut self.ctx.html.as_mut(), p);
            if self.adding_segments {
                update_legend_boxes(self.ctx.lb_list, &self.eps, self.prv, p, true, true);
            }
        } else {
            update_legend_boxes(self.ctx.lb_list, &self.eps, p, p, true, false);
        }
        if !self.at_staircase_corner {
            if !clipped {
                if self.series.marker_show {
                    self.mark_ps.points_add(&self.cfg, &mut self.ctx.html.as_mut(), p);
                }
                if let Some(h) = self.ctx.html.as_mut() {
                    let cat_idx = if self.series.is_cat { x as usize } else { 0 };
                    h.record(p, cat_idx, tag_x, tag_y);
                }
            }
            if !self.series.has_line && !self.series.marker_show {
                if let Some(h) = self.ctx.html.as_mut() {
                    h.commit(true);
                }
            }
            if self.series.tag_enable {
                if self.series.staircase {
                    self.ctx.tag_db.bar_tag(
                        self.ctx.scene,
                        self.ctx.lb_list,
                        &self.eps,
                        &self.spec,
                        self.tag_g,
                        p,
                        p,
                        tag_y,
                        self.tag_direction,
                    );
                } else {
                    self.ctx.tag_db.line_tag(
                        self.ctx.scene,
                        self.ctx.lb_list,
                        &self.eps,
                        &self.spec,
                        self.tag_g,
                        p,
                        tag_x,
                        tag_y,
                        !clipped,
                        self.adding_segments && self.series.has_line,
                        self.tag_direction,
                    );
                }
            }
        }
        self.prv = p;
        self.adding_segments = true;
    }

    fn end_point(&mut self) {
        self.line_ps.poly_end(&mut self.ctx.html.as_mut());
        emit_poly_chunks(self.ctx.scene, self.line_g, &self.line_ps.points);
        self.line_ps.points.clear();
        self.mark_ps.points_end(&self.cfg, &mut self.ctx.html.as_mut());
        let points = std::mem::take(&mut self.mark_ps.points);
        emit_markers(self.series, self.ctx.scene, self.mark_g, self.hole_g, &points);
        self.adding_segments = false;
        self.ctx.tag_db.end_line_tag(self.ctx.scene, self.ctx.lb_list, &self.eps);
    }

    fn run(&mut self) -> Result<()> {
        let series = self.series;
        let staircase = series.staircase;
        let mut first = true;
        let mut cur = Point::default();
        let mut old;

        if series.datum_num > 0 {
            series.datum_begin(self.ctx.source)?;
        }
        for i in 0..series.datum_num {
            if i > 0 {
                series.datum_next(self.ctx.source)?;
            }
            let (svx, svy) = self.ctx.source.get_datum(series.datum_no_x, series.datum_y_idx)?;
            let mut x =
                (series.datum_cat_ofs + i) as f64 - if staircase { 0.5 } else { 0.0 };
            let y = Series::datum_to_double(self.ctx.source, &svy)?;
            if !series.is_cat {
                x = Series::datum_to_double(self.ctx.source, &svx)?;
            }

            let scs: &[i32] = if staircase { &[-1, 0, 1] } else { &[0] };
            for sc in scs {
                self.at_staircase_corner = *sc != 0;
                old = cur;
                if self.ctx.axis_x.angle == 0 {
                    cur.x = self.ctx.axis_x.coor(x);
                    cur.y = self.ctx.axis_y.coor(y);
                } else {
                    cur.y = self.ctx.axis_x.coor(x);
                    cur.x = self.ctx.axis_y.coor(y);
                }
                let valid = self.ctx.axis_x.valid(x) && self.ctx.axis_y.valid(y);
                let inside = self.area.contains(cur);
                if !valid {
                    if self.ctx.axis_x.skip(x)
                        || (self.ctx.axis_x.valid(x) && self.ctx.axis_y.skip(y))
                    {
                        cur = old;
                    } else {
                        self.end_point();
                        first = true;
                    }
                } else if first {
                    if inside {
                        self.add_point(cur, x, &svx, &svy, false);
                    }
                    first = false;
                } else if self.adding_segments && inside {
                    // Common case while we stay inside the chart area.
                    self.add_point(cur, x, &svx, &svy, false);
                } else {
                    let (n, c1, c2) = clip_line(&self.area, &self.eps, old, cur);
                    if !self.adding_segments {
                        if inside {
                            if n == 1 {
                                self.add_point(c1, x, &svx, &svy, true);
                            }
                            self.add_point(cur, x, &svx, &svy, false);
                        } else if n == 2 {
                            // Still outside, but the segment passes through.
                            self.add_point(c1, x, &svx, &svy, true);
                            self.add_point(c2, x, &svx, &svy, true);
                            self.end_point();
                        }
                    } else {
                        // We went from inside to outside.
                        if n == 1 {
                            self.add_point(c1, x, &svx, &svy, true);
                        }
                        self.end_point();
                    }
                }
                x += 0.5;
            }
        }
        self.end_point();
        Ok(())
    }
}

//----------------------------------------------------------------------
// Area series.

struct AreaBuilder<'c, 'a> {
    series: &'c Series,
    ctx: &'c mut BuildCtx<'a>,
    cfg: PruneCfg,
    eps: ClipEps,
    area: BoundaryBox,
    spec: TagSpec,
    fill_g: NodeId,
    line_g: NodeId,
    mark_g: Option<NodeId>,
    hole_g: Option<NodeId>,
    tag_g: NodeId,
    fill_ps: PruneState,
    line_ps: PruneState,
    mark_ps: PruneState,
    base_ps: PruneState,
    tag_direction: Pos,
    ap_prv_p: Point,
    ap_line_cnt: usize,
    dp_prv_p: Point,
    dp_prv_on_line: bool,
    dp_prv_inside: bool,
    dp_first: bool,
}

impl AreaBuilder<'_, '_> {
    fn commit_line(&mut self) {
        self.line_ps.poly_end(&mut self.ctx.html.as_mut());
        if self.series.has_line {
            emit_poly_chunks(self.ctx.scene, self.line_g, &self.line_ps.points);
        }
        self.line_ps.points.clear();
    }

    fn add_point(
        &mut self,
        p: Point,
        cat_idx: usize,
        tag_x: &str,
        tag_y: &str,
        is_datum: bool,
        on_line: bool,
    ) {
        if on_line {
            let from = if self.ap_line_cnt == 0 { p } else { self.ap_prv_p };
            update_legend_boxes(self.ctx.lb_list, &self.eps, from, p, false, is_datum);
        }
        if self.series.series_type == SeriesType::StackedArea {
            self.base_ps.poly_add(&self.cfg, &mut None, p);
        }
        if self.series.has_fill {
            self.fill_ps.poly_add(&self.cfg, &mut None, p);
        }
        if on_line {
            self.line_ps.poly_add(&self.cfg, &mut self.ctx.html.as_mut(), p);
        }
        if is_datum {
            if self.series.marker_show {
                self.mark_ps.points_add(&self.cfg, &mut self.ctx.html.as_mut(), p);
            }
            if let Some(h) = self.ctx.html.as_mut() {
                h.record(p, cat_idx, tag_x, tag_y);
            }
        }
        if self.series.tag_enable {
            self.ctx.tag_db.line_tag(
                self.ctx.scene,
                self.ctx.lb_list,
                &self.eps,
                &self.spec,
                self.tag_g,
                p,
                tag_x,
                tag_y,
                is_datum,
                self.series.has_line && on_line && self.ap_line_cnt > 0,
                self.tag_direction,
            );
        }
        if on_line && (is_datum || self.ap_line_cnt == 0) {
            self.ap_line_cnt += 1;
        } else {
            self.commit_line();
            self.ap_line_cnt = 0;
        }
        self.ap_prv_p = p;
    }

    fn do_point(&mut self, p: Point, cat_idx: usize, tag_x: &str, tag_y: &str, on_line: bool) {
        let p = if self.ctx.axis_x.angle != 0 { p.swapped() } else { p };
        let inside = self.area.contains(p);
        if self.dp_first {
            if inside {
                self.add_point(p, cat_idx, tag_x, tag_y, on_line, on_line);
            }
        } else if self.dp_prv_inside && inside {
            self.add_point(p, cat_idx, tag_x, tag_y, on_line, on_line);
        } else {
            let (n, c1, c2) = clip_line(&self.area, &self.eps, self.dp_prv_p, p);
            let edge_on_line = on_line && self.dp_prv_on_line;
            if self.dp_prv_inside {
                if n == 1 {
                    self.add_point(c1, cat_idx, tag_x, tag_y, false, edge_on_line);
                }
            } else if inside {
                if n == 1 {
                    self.add_point(c1, cat_idx, tag_x, tag_y, false, edge_on_line);
                }
                self.add_point(p, cat_idx, tag_x, tag_y, on_line, on_line);
            } else if n == 2 {
                self.add_point(c1, cat_idx, tag_x, tag_y, false, edge_on_line);
                self.add_point(c2, cat_idx, tag_x, tag_y, false, edge_on_line);
            }
        }
        if !inside {
            // Clamp to the area edge so the fill polygon follows it.
            let clamped = Point::new(
                p.x.clamp(self.area.min.x, self.area.max.x),
                p.y.clamp(self.area.min.y, self.area.max.y),
            );
            self.add_point(clamped, cat_idx, tag_x, tag_y, false, false);
        }
        self.dp_prv_p = p;
        self.dp_prv_on_line = on_line;
        self.dp_prv_inside = inside;
        self.dp_first = false;
    }

    fn run(
        &mut self,
        base_ofs: Option<&mut Vec<f64>>,
        base_pts: Option<&mut Vec<Point>>,
    ) -> Result<()> {
        let series = self.series;
        let stacked = series.series_type == SeriesType::StackedArea;

        let mut base_pts = base_pts;
        let mut first_in_stack = true;
        if stacked {
            if let Some(bp) = base_pts.as_deref_mut() {
                first_in_stack = bp.is_empty();
                // Seed the fill polygon with the top of the previous
                // polygon, reversed.
                if series.has_fill {
                    for p in bp.iter().rev() {
                        self.fill_ps.poly_add(&self.cfg, &mut None, *p);
                    }
                }
                bp.clear();
            }
        }

        let mut base_ofs = base_ofs;

        if self.ctx.category_num > 0 {
            let mut beg_y = series.base;
            let mut end_y = series.base;
            if stacked {
                if let Some(ofs) = &base_ofs {
                    beg_y = *ofs.first().unwrap_or(&series.base);
                    end_y = *ofs.last().unwrap_or(&series.base);
                }
            }
            let beg_p =
                Point::new(self.ctx.axis_x.coor(0.0), self.ctx.axis_y.coor(beg_y));
            let end_p = Point::new(
                self.ctx.axis_x.coor((self.ctx.category_num - 1) as f64),
                self.ctx.axis_y.coor(end_y),
            );
            if first_in_stack {
                self.do_point(beg_p, 0, "", "", false);
            }
            let mut prv_valid = false;
            let mut first = true;
            for cat_idx in 0..self.ctx.category_num {
                let mut svx = String::new();
                let mut svy = String::new();
                let mut y = NUM_INVALID;
                if cat_idx == series.datum_cat_ofs {
                    series.datum_begin(self.ctx.source)?;
                } else if cat_idx > series.datum_cat_ofs
                    && cat_idx < series.datum_cat_ofs + series.datum_num
                {
                    series.datum_next(self.ctx.source)?;
                }
                if series.idx_of_valid_defined
                    && cat_idx >= series.idx_of_fst_valid
                    && cat_idx <= series.idx_of_lst_valid
                {
                    let (x, yv) =
                        self.ctx.source.get_datum(series.datum_no_x, series.datum_y_idx)?;
                    svx = x;
                    svy = yv;
                    y = Series::datum_to_double(self.ctx.source, &svy)?;
                }
                if self.ctx.axis_y.skip(y) {
                    continue;
                }
                let valid = self.ctx.axis_y.valid(y);
                let mut y = y - series.base;
                if !first && prv_valid && !valid {
                    let p = Point::new(
                        self.ctx.axis_x.coor((cat_idx - 1) as f64),
                        self.ctx.axis_y.coor(series.base),
                    );
                    self.do_point(p, cat_idx, &svx, &svy, false);
                }
                if !valid {
                    y = 0.0;
                }
                if stacked {
                    if let Some(ofs) = &mut base_ofs {
                        y += ofs[cat_idx];
                        ofs[cat_idx] = y;
                    }
                } else {
                    y += series.base;
                }
                if !first && !prv_valid && valid {
                    let p = Point::new(
                        self.ctx.axis_x.coor(cat_idx as f64),
                        self.ctx.axis_y.coor(series.base),
                    );
                    self.do_point(p, cat_idx, &svx, &svy, false);
                }
                let p =
                    Point::new(self.ctx.axis_x.coor(cat_idx as f64), self.ctx.axis_y.coor(y));
                self.do_point(p, cat_idx, &svx, &svy, valid);
                prv_valid = valid;
                first = false;
            }
            if first_in_stack {
                self.do_point(end_p, 0, "", "", false);
            }
        }

        self.fill_ps.poly_end(&mut None);
        if !self.fill_ps.points.is_empty() {
            let pts = std::mem::take(&mut self.fill_ps.points);
            self.ctx.scene.add(self.fill_g, Shape::polygon(pts));
        }

        self.commit_line();

        self.mark_ps.points_end(&self.cfg, &mut self.ctx.html.as_mut());
        let points = std::mem::take(&mut self.mark_ps.points);
        emit_markers(series, self.ctx.scene, self.mark_g, self.hole_g, &points);

        if stacked {
            self.base_ps.points_end(&self.cfg, &mut None);
            if let Some(bp) = base_pts.as_deref_mut() {
                *bp = std::mem::take(&mut self.base_ps.points);
            }
        }

        self.ctx.tag_db.end_line_tag(self.ctx.scene, self.ctx.lb_list, &self.eps);
        Ok(())
    }
}

//----------------------------------------------------------------------
// Bar / lollipop series.

#[allow(clippy::too_many_arguments)]
fn build_bar(
    series: &Series,
    ctx: &mut BuildCtx,
    eps: &ClipEps,
    area: &BoundaryBox,
    spec: &TagSpec,
    fill_g: NodeId,
    tbar_g: NodeId,
    line_g: NodeId,
    mark_g: Option<NodeId>,
    hole_g: Option<NodeId>,
    tag_g: NodeId,
    bar_num: u32,
    bar_tot: u32,
    ofs_pos: &mut [f64],
    ofs_neg: &mut [f64],
) -> Result<()> {
    // Which way do zero-size bars point?
    let zero_direction = {
        let mut has_pos_bar = false;
        let mut has_neg_bar = false;
        if series.datum_num > 0 {
            series.datum_begin(ctx.source)?;
        }
        for i in 0..series.datum_num {
            if i > 0 {
                series.datum_next(ctx.source)?;
            }
            let (_, svy) = ctx.source.get_datum(series.datum_no_x, series.datum_y_idx)?;
            let y = Series::datum_to_double(ctx.source, &svy)?;
            if ctx.axis_y.valid(y) {
                if y - series.base > 0.0 {
                    has_pos_bar = true;
                }
                if y - series.base < 0.0 {
                    has_neg_bar = true;
                }
            }
        }
        let up = has_pos_bar || !has_neg_bar;
        if ctx.axis_x.angle == 0 {
            if ctx.axis_y.reverse == up { Pos::Bottom } else { Pos::Top }
        } else if ctx.axis_y.reverse == up {
            Pos::Left
        } else {
            Pos::Right
        }
    };

    // Relative width and center of this bar within its category bucket.
    let bar_tot_f = f64::from(bar_tot.max(1));
    let mut sa = 1.0 - ctx.bar_all_width;
    let mut so = 1.0 - ctx.bar_one_width;
    so = ctx.bar_all_width * so / (bar_tot_f - so);
    if sa < so {
        so = (1.0 - ctx.bar_one_width) / bar_tot_f;
        sa = so;
    }
    let mut wx = (1.0 - sa + so) / bar_tot_f - so;
    let cx = sa / 2.0 - 0.5 + wx / 2.0 + f64::from(bar_num) * (wx + so);
    if series.bar_layer_tot > 1 {
        wx -= f64::from(series.bar_layer_num) * wx * (1.0 - ctx.bar_layered_width)
            / f64::from(series.bar_layer_tot - 1);
    }

    if series.datum_num > 0 {
        series.datum_begin(ctx.source)?;
    }
    for i in 0..series.datum_num {
        if i > 0 {
            series.datum_next(ctx.source)?;
        }
        let cat_idx = series.datum_cat_ofs + i;
        let x = cat_idx as f64 + cx;
        let (svx, svy) = ctx.source.get_datum(series.datum_no_x, series.datum_y_idx)?;
        let y = Series::datum_to_double(ctx.source, &svy)?;
        if !ctx.axis_y.valid(y) {
            continue;
        }

        let q = ctx.axis_x.coor(x);
        let mut p1 = Point::new(q, 0.0);
        let mut p2 = Point::new(q, 0.0);
        if series.series_type == SeriesType::Lollipop {
            p1.y = ctx.axis_y.coor(series.base);
            p2.y = ctx.axis_y.coor(y);
        } else {
            let yb = y - series.base;
            if yb < 0.0 {
                p1.y = ctx.axis_y.coor(ofs_neg[cat_idx]);
                ofs_neg[cat_idx] += yb;
                p2.y = ctx.axis_y.coor(ofs_neg[cat_idx]);
            } else {
                p1.y = ctx.axis_y.coor(ofs_pos[cat_idx]);
                ofs_pos[cat_idx] += yb;
                p2.y = ctx.axis_y.coor(ofs_pos[cat_idx]);
            }
        }
        if ctx.axis_x.angle != 0 {
            p1 = p1.swapped();
            p2 = p2.swapped();
        }

        let p1_inside = area.contains(p1);
        let p2_inside = area.contains(p2);
        if !p1_inside || !p2_inside {
            let (n, c1, c2) = clip_line(area, eps, p1, p2);
            if p1_inside {
                if n != 1 {
                    continue;
                }
                p2 = c1;
            } else if p2_inside {
                if n != 1 {
                    continue;
                }
                p1 = c1;
            } else {
                if n != 2 {
                    continue;
                }
                p1 = c1;
                p2 = c2;
            }
            if ctx.axis_x.angle == 0 {
                p1.x = q;
                p2.x = q;
            } else {
                p1.y = q;
                p2.y = q;
            }
        }

        if p2_inside {
            if let Some(h) = ctx.html.as_mut() {
                h.record(p2, cat_idx, &svx, &svy);
                h.preserve(p2);
                h.commit(true);
            }
        }

        if series.tag_enable {
            let mut direction = zero_direction;
            if p2.x > p1.x {
                direction = Pos::Right;
            }
            if p2.x < p1.x {
                direction = Pos::Left;
            }
            if p2.y > p1.y {
                direction = Pos::Top;
            }
            if p2.y < p1.y {
                direction = Pos::Bottom;
            }
            ctx.tag_db.bar_tag(
                ctx.scene, ctx.lb_list, eps, spec, tag_g, p1, p2, &svy, direction,
            );
        }

        if series.series_type == SeriesType::Lollipop {
            ctx.scene.add(line_g, Shape::line(p1.x, p1.y, p2.x, p2.y));
            if p2_inside && series.marker_show {
                if series.marker_show_out {
                    if let Some(g) = mark_g {
                        build_marker(ctx.scene, g, series.marker_shape, &series.marker_out, p2);
                    }
                }
                if series.marker_show_int {
                    if let Some(g) = hole_g {
                        build_marker(ctx.scene, g, series.marker_shape, &series.marker_int, p2);
                    }
                }
            }
            update_legend_boxes(ctx.lb_list, eps, p1, p2, false, true);
        }

        if y != series.base && series.series_type.is_bar_family() {
            let w = (ctx.axis_x.coor(wx / 2.0) - ctx.axis_x.coor(0.0)).abs();
            let mut cut_bot = false;
            let mut cut_top = false;
            let mut cut_lft = false;
            let mut cut_rgt = false;
            if ctx.axis_x.angle == 0 {
                p1.x -= w;
                p2.x += w;
                if p1.y < p2.y {
                    if !p1_inside {
                        cut_bot = true;
                    }
                    if !p2_inside {
                        cut_top = true;
                    }
                    cut_bot = true;
                }
                if p1.y > p2.y {
                    if !p1_inside {
                        cut_top = true;
                    }
                    if !p2_inside {
                        cut_bot = true;
                    }
                    cut_top = true;
                }
            } else {
                p1.y -= w;
                p2.y += w;
                if p1.x < p2.x {
                    if !p1_inside {
                        cut_lft = true;
                    }
                    if !p2_inside {
                        cut_rgt = true;
                    }
                    cut_lft = true;
                }
                if p1.x > p2.x {
                    if !p1_inside {
                        cut_rgt = true;
                    }
                    if !p2_inside {
                        cut_lft = true;
                    }
                    cut_rgt = true;
                }
            }
            if p1.x > p2.x {
                std::mem::swap(&mut p1.x, &mut p2.x);
            }
            if p1.y > p2.y {
                std::mem::swap(&mut p1.y, &mut p2.y);
            }
            for (a, b) in [
                (Point::new(p1.x, p1.y), Point::new(p1.x, p2.y)),
                (Point::new(p1.x, p1.y), Point::new(p2.x, p1.y)),
                (Point::new(p2.x, p1.y), Point::new(p2.x, p2.y)),
                (Point::new(p1.x, p2.y), Point::new(p2.x, p2.y)),
            ] {
                update_legend_boxes(ctx.lb_list, eps, a, b, true, true);
            }
            let has_interior =
                p2.x - p1.x > series.line_width && p2.y - p1.y > series.line_width;
            if has_interior {
                if series.has_fill {
                    let mut c1 = p1;
                    let mut c2 = p2;
                    if series.has_line {
                        let q = if series.line_dash > 0.0 { 0.0 } else { series.line_width / 2.0 };
                        c1.x += if cut_lft { 0.0 } else { q };
                        c2.x -= if cut_rgt { 0.0 } else { q };
                        c1.y += if cut_bot { 0.0 } else { q };
                        c2.y -= if cut_top { 0.0 } else { q };
                    }
                    ctx.scene.add(fill_g, Shape::rect(c1.x, c1.y, c2.x, c2.y));
                }
                if series.has_line {
                    let d = series.line_width / 2.0;
                    let q = 0.25f64.min(d);
                    let g = line_g;
                    if cut_bot && cut_top {
                        ctx.scene.add(g, Shape::line(p1.x + d, p1.y - q, p1.x + d, p2.y + q));
                        ctx.scene.add(g, Shape::line(p2.x - d, p1.y - q, p2.x - d, p2.y + q));
                    } else if cut_lft && cut_rgt {
                        ctx.scene.add(g, Shape::line(p1.x - q, p1.y + d, p2.x + q, p1.y + d));
                        ctx.scene.add(g, Shape::line(p1.x - q, p2.y - d, p2.x + q, p2.y - d));
                    } else if cut_bot {
                        ctx.scene.add(
                            g,
                            Shape::polyline(vec![
                                Point::new(p1.x + d, p1.y - q),
                                Point::new(p1.x + d, p2.y - d),
                                Point::new(p2.x - d, p2.y - d),
                                Point::new(p2.x - d, p1.y - q),
                            ]),
                        );
                    } else if cut_top {
                        ctx.scene.add(
                            g,
                            Shape::polyline(vec![
                                Point::new(p1.x + d, p2.y + q),
                                Point::new(p1.x + d, p1.y + d),
                                Point::new(p2.x - d, p1.y + d),
                                Point::new(p2.x - d, p2.y + q),
                            ]),
                        );
                    } else if cut_lft {
                        ctx.scene.add(
                            g,
                            Shape::polyline(vec![
                                Point::new(p1.x - q, p1.y + d),
                                Point::new(p2.x - d, p1.y + d),
                                Point::new(p2.x - d, p2.y - d),
                                Point::new(p1.x - q, p2.y - d),
                            ]),
                        );
                    } else if cut_rgt {
                        ctx.scene.add(
                            g,
                            Shape::polyline(vec![
                                Point::new(p2.x + q, p1.y + d),
                                Point::new(p1.x + d, p1.y + d),
                                Point::new(p1.x + d, p2.y - d),
                                Point::new(p2.x + q, p2.y - d),
                            ]),
                        );
                    } else {
                        ctx.scene.add(
                            g,
                            Shape::rect(p1.x + d, p1.y + d, p2.x - d, p2.y - d),
                        );
                    }
                }
            } else {
                ctx.scene.add(tbar_g, Shape::rect(p1.x, p1.y, p2.x, p2.y));
            }
        }
    }

    Ok(())
}

//----------------------------------------------------------------------
// Entry point.

/// Build one series into the scene.
#[allow(clippy::too_many_arguments)]
pub fn build_series(
    series: &Series,
    ctx: &mut BuildCtx,
    groups: &BuildGroups,
    bar_num: u32,
    bar_tot: u32,
    mut ofs_pos: Option<&mut Vec<f64>>,
    mut ofs_neg: Option<&mut Vec<f64>>,
    base_pts: Option<&mut Vec<Point>>,
) -> Result<()> {
    // Enlarge the clip area slightly so boundary points survive precision
    // noise; spurious corner clips are caught by the wider near-epsilon.
    let eps = ClipEps::for_area(&series.chart_area);
    let area = series.chart_area.expanded(eps.near, eps.near);
    let spec = tag_spec(series, area, ctx.axis_x, ctx.axis_y);

    let fill_g = if series.series_type.is_area_family() {
        ctx.scene.add_group(groups.area_fill_g)
    } else {
        ctx.scene.add_group(groups.main_g)
    };
    series.apply_fill_style(ctx.scene, fill_g);

    // Bars too thin for an outlined interior.
    let tbar_g = if series.has_line {
        let g = ctx.scene.add_group(groups.line_g);
        let attr = ctx.scene.attr_mut(g);
        attr.line_color().set_clear();
        attr.fill_color().set(&series.line_color);
        g
    } else {
        let g = ctx.scene.add_group(groups.main_g);
        series.apply_fill_style(ctx.scene, g);
        g
    };

    let line_g = if series.bar_layer_tot > 1 {
        ctx.scene.add_group(groups.main_g)
    } else {
        let g = ctx.scene.add_group(groups.line_g);
        if matches!(series.series_type, SeriesType::Bar | SeriesType::StackedBar) {
            ctx.scene.front_to_back(groups.line_g);
        }
        g
    };
    series.apply_line_style(ctx.scene, line_g);

    let (mark_g, hole_g) = if let Some(marker_g) = groups.marker_g {
        let mg = ctx.scene.add_group(marker_g);
        series.apply_mark_style(ctx.scene, mg);
        let hg = ctx.scene.add_group(marker_g);
        series.apply_hole_style(ctx.scene, hg);
        (Some(mg), Some(hg))
    } else {
        (None, None)
    };

    let tag_g = ctx.scene.add_group(groups.tag_g);
    series.apply_tag_style(ctx.scene, tag_g);

    let html_enabled = ctx.html.is_some();
    let cfg = PruneCfg::new(series.prune_dist, series.series_type == SeriesType::Scatter);

    match series.series_type {
        SeriesType::Area | SeriesType::StackedArea => {
            let reverse = ctx.axis_y.reverse ^ (series.stack_dir < 0);
            let tag_direction = if ctx.axis_x.angle == 0 {
                if reverse { Pos::Bottom } else { Pos::Top }
            } else if reverse {
                Pos::Left
            } else {
                Pos::Right
            };
            let mut builder = AreaBuilder {
                series,
                ctx,
                cfg,
                eps,
                area,
                spec,
                fill_g,
                line_g,
                mark_g,
                hole_g,
                tag_g,
                fill_ps: PruneState::new(false),
                line_ps: PruneState::new(html_enabled && !series.marker_show),
                mark_ps: PruneState::new(html_enabled && series.marker_show),
                base_ps: PruneState::new(false),
                tag_direction,
                ap_prv_p: Point::default(),
                ap_line_cnt: 0,
                dp_prv_p: Point::default(),
                dp_prv_on_line: false,
                dp_prv_inside: false,
                dp_first: true,
            };
            builder.run(ofs_pos.as_deref_mut(), base_pts)?;
        }
        SeriesType::Lollipop | SeriesType::Bar | SeriesType::StackedBar
        | SeriesType::LayeredBar => {
            let mut empty_pos: Vec<f64> = Vec::new();
            let mut empty_neg: Vec<f64> = Vec::new();
            let pos: &mut [f64] = match ofs_pos.as_deref_mut() {
                Some(v) => v.as_mut_slice(),
                None => &mut empty_pos,
            };
            let neg: &mut [f64] = match ofs_neg.as_deref_mut() {
                Some(v) => v.as_mut_slice(),
                None => &mut empty_neg,
            };
            build_bar(
                series, ctx, &eps, &area, &spec, fill_g, tbar_g, line_g, mark_g, hole_g,
                tag_g, bar_num, bar_tot, pos, neg,
            )?;
        }
        SeriesType::XY | SeriesType::Scatter | SeriesType::Line | SeriesType::Point => {
            let tag_direction = if ctx.axis_x.angle == 0 {
                if ctx.axis_y.reverse { Pos::Bottom } else { Pos::Top }
            } else if ctx.axis_y.reverse {
                Pos::Left
            } else {
                Pos::Right
            };
            let tag_direction = if series.staircase {
                match (ctx.axis_x.angle, series.tag_pos) {
                    (0, Pos::Bottom | Pos::Top) => series.tag_pos,
                    (_, Pos::Left | Pos::Right) if ctx.axis_x.angle != 0 => series.tag_pos,
                    (_, Pos::Center) => Pos::Center,
                    _ => tag_direction,
                }
            } else {
                tag_direction
            };
            let mut builder = LineBuilder {
                series,
                ctx,
                cfg,
                eps,
                area,
                spec,
                line_g,
                mark_g,
                hole_g,
                tag_g,
                line_ps: PruneState::new(html_enabled && series.has_line),
                mark_ps: PruneState::new(html_enabled && !series.has_line),
                at_staircase_corner: false,
                adding_segments: false,
                prv: Point::default(),
                tag_direction,
            };
            builder.run()?;
        }
    }

    Ok(())
}
