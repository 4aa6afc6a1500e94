//! One chart: two Y-axes and one X-axis, a list of series, titles, a
//! legend, and the fixed back-to-front draw order.
//!
//! The layer order (back to front): chart-area fill, minor/major/zero
//! grid, label backgrounds, lower annotations, series below the axes
//! (stacked areas, bars, lollipop stems), axis lines, series above the
//! axes, axis numbers, axis labels, tags, upper annotations, legends,
//! title, frame.

use crate::axis::{Axis, AxisGroups, AxisStyle, GridStyle, NumberFormat};
use crate::error::Result;
use crate::geom::{AnchorX, AnchorY, BoundaryBox, Dir, Point, Pos};
use crate::html::{AxisDescriptor, AxisRef, ChartHtml, HtmlSink};
use crate::label::LabelRegistry;
use crate::legend::{Legend, LegendBox, SeriesRef};
use crate::scene::attr::LineCap;
use crate::scene::{move_obj, move_objs, NodeId, Scene, Shape};
use crate::series::build::{build_series, BuildCtx, BuildGroups};
use crate::series::{Series, SeriesType};
use crate::source::{Position, Source};
use crate::tag::TagPlacer;
use crate::value::{coor_near, BOX_SPACING, COOR_HI, EPSILON};
use crate::visual::color::Color;

/// Ensemble-level context a chart needs while building.
pub struct ChartEnv<'a> {
    pub foreground: Color,
    pub background: Color,
    pub enable_html: bool,
    pub global_legend: &'a mut Legend,
    pub chart_idx: usize,
}

#[derive(Default)]
struct ParseCatState {
    non_empty_seen: bool,
    stride_found: bool,
    idx: usize,
}

pub struct Chart {
    /// The chart's scene group, positioned by the grid solver.
    pub svg_g: NodeId,
    pub g_dx: f64,
    pub g_dy: f64,

    pub full_padding_x: f64,
    pub area_padding_x: f64,
    pub full_padding_y: f64,
    pub area_padding_y: f64,

    pub frame_width: f64,
    pub frame_padding: f64,
    pub frame_radius: f64,
    pub frame_color: Color,
    pub canvas_color: Color,

    pub chart_w: f64,
    pub chart_h: f64,
    pub chart_box: bool,

    pub chart_area_color: Color,
    pub axis_color: Color,
    pub text_color: Color,
    pub box_color: Color,

    pub title: String,
    pub sub_title: String,
    pub sub_sub_title: String,
    pub title_pos_x: Pos,
    pub title_pos_y: Pos,
    pub title_inside: bool,
    pub title_size: f64,
    pub title_box: bool,
    pub title_box_specified: bool,

    pub legend: Legend,
    pub legend_box: bool,
    pub legend_box_specified: bool,

    pub bar_one_width: f64,
    pub bar_all_width: f64,
    pub bar_layered_width: f64,
    pub bar_margin: f64,
    pub bar_tot: u32,
    pub lol_tot: u32,

    pub label_db: LabelRegistry,
    pub tag_db: TagPlacer,

    pub series_list: Vec<Series>,

    /// The materialized ordered category list.
    pub categories: Vec<String>,
    /// Minimum distance between non-empty categories.
    pub cat_empty_stride: usize,
    pub cat_normal_width: bool,
    parse_cat: ParseCatState,

    pub axis_x: Axis,
    pub axis_y: [Axis; 2],

    pub html: ChartHtml,

    /// Saved positions of `@` annotation streaks.
    pub annotation_anchors: Vec<Position>,
    /// Annotation layer groups, valid after `build_content`.
    pub anno_upper_g: NodeId,
    pub anno_lower_g: NodeId,
}

impl Chart {
    pub fn new(scene: &mut Scene, parent: NodeId) -> Self {
        let svg_g = scene.add_group(parent);
        Self {
            svg_g,
            g_dx: 0.0,
            g_dy: 0.0,
            full_padding_x: -1.0,
            area_padding_x: 0.0,
            full_padding_y: -1.0,
            area_padding_y: 0.0,
            frame_width: -1.0,
            frame_padding: 8.0,
            frame_radius: 0.0,
            frame_color: Color::undef(),
            canvas_color: Color::undef(),
            chart_w: 1000.0,
            chart_h: 600.0,
            chart_box: false,
            chart_area_color: Color::clear(),
            axis_color: Color::undef(),
            text_color: Color::undef(),
            box_color: Color::undef(),
            title: String::new(),
            sub_title: String::new(),
            sub_sub_title: String::new(),
            title_pos_x: Pos::Center,
            title_pos_y: Pos::Top,
            title_inside: false,
            title_size: 1.0,
            title_box: false,
            title_box_specified: false,
            legend: Legend::new(),
            legend_box: false,
            legend_box_specified: false,
            bar_one_width: 1.00,
            bar_all_width: 0.85,
            bar_layered_width: 0.50,
            bar_margin: 0.00,
            bar_tot: 0,
            lol_tot: 0,
            label_db: LabelRegistry::new(),
            tag_db: TagPlacer::new(),
            series_list: Vec::new(),
            categories: Vec::new(),
            cat_empty_stride: 1,
            cat_normal_width: true,
            parse_cat: ParseCatState::default(),
            axis_x: Axis::new(true),
            axis_y: [Axis::new(false), Axis::new(false)],
            html: ChartHtml::new(),
            annotation_anchors: Vec::new(),
            anno_upper_g: svg_g,
            anno_lower_g: svg_g,
        }
    }

    //--------------------------------------------------------------------
    // Configuration.

    pub fn set_padding(&mut self, full_padding: f64, area_padding: f64) {
        self.full_padding_x = full_padding;
        self.area_padding_x = area_padding;
        self.full_padding_y = full_padding;
        self.area_padding_y = area_padding;
    }

    pub fn set_frame(&mut self, width: f64, padding: f64, radius: f64) {
        self.frame_width = width;
        self.frame_padding = padding;
        self.frame_radius = radius;
    }

    pub fn set_chart_area(&mut self, width: f64, height: f64) {
        self.chart_w = width.max(10.0);
        self.chart_h = height.max(10.0);
    }

    pub fn set_title_pos(&mut self, pos1: Option<Pos>, pos2: Option<Pos>) {
        self.title_pos_x = Pos::Center;
        self.title_pos_y = Pos::Top;
        for pos in [pos1, pos2].into_iter().flatten() {
            match pos {
                Pos::Left | Pos::Right => self.title_pos_x = pos,
                Pos::Top | Pos::Bottom => self.title_pos_y = pos,
                _ => {}
            }
        }
    }

    pub fn set_bar_width(&mut self, one_width: f64, all_width: f64) {
        self.bar_one_width = one_width;
        self.bar_all_width = all_width;
    }

    /// Add a series; new series cycle through the style numbers.
    pub fn add_series(&mut self, series_type: SeriesType) -> &mut Series {
        let mut series = Series::new(series_type);
        series.set_style((self.series_list.len() % 80) as i64);
        self.series_list.push(series);
        self.series_list.last_mut().unwrap()
    }

    pub fn category_num(&self) -> usize {
        self.categories.len()
    }

    /// Called for each category as it is parsed from the source.
    pub fn parsed_cat(&mut self, cat: &str) {
        let cat_idx = self.categories.len();
        self.categories.push(cat.to_string());
        if !self.parse_cat.stride_found {
            self.cat_empty_stride = cat_idx + 1;
        }
        if cat.is_empty() {
            return;
        }
        self.cat_normal_width =
            self.cat_normal_width && crate::visual::font::normal_width_utf8(cat);
        if self.parse_cat.non_empty_seen {
            let stride = cat_idx - self.parse_cat.idx;
            if self.parse_cat.stride_found {
                self.cat_empty_stride = self.cat_empty_stride.min(stride);
            } else {
                self.cat_empty_stride = stride;
            }
            self.parse_cat.stride_found = true;
        }
        self.parse_cat.idx = cat_idx;
        self.parse_cat.non_empty_seen = true;
    }

    pub fn add_annotation_anchor(&mut self, source: &Source) {
        self.annotation_anchors.push(source.cur.clone());
    }

    /// Move the completed chart to its final position in the grid.
    pub fn move_by(&mut self, scene: &mut Scene, dx: f64, dy: f64) {
        scene.translate(self.svg_g, dx, dy);
        self.g_dx = dx;
        self.g_dy = dy;
    }

    //--------------------------------------------------------------------
    // Preparation.

    /// Per-series derived state: bar grouping, tag colors, visual
    /// properties, legend registration.
    fn series_prepare(&mut self, source: &mut Source, env: &mut ChartEnv) -> Result<()> {
        let mut tag_bg_color = if !self.chart_area_color.is_clear() {
            self.chart_area_color
        } else if self.frame_width >= 0.0 && !self.canvas_color.is_clear() {
            self.canvas_color
        } else {
            env.background
        };
        if tag_bg_color.is_clear() {
            tag_bg_color = Color::white();
        }

        let mut bar_next_can_stack = false;
        let mut bar_next_can_layer = false;
        let mut bar_prev_y_n = 0usize;

        let mut bar_tot = 0u32;
        let mut lol_tot = 0u32;

        let mut bar_layer_cur = 0u32;
        let x_horizontal = self.axis_x.angle == 0;
        let chart_w = self.chart_w;
        let chart_h = self.chart_h;
        let text_color = self.text_color;

        for (idx, series) in self.series_list.iter_mut().enumerate() {
            series.id = idx as u32;

            series.chart_area = BoundaryBox::from_corners(
                Point::new(0.0, 0.0),
                Point::new(chart_w, chart_h),
            );

            if series.series_type == SeriesType::Lollipop {
                lol_tot += 1;
            }

            series.bar_layer_num = 0;
            series.bar_layer_tot = 1;
            match series.series_type {
                SeriesType::Bar => {
                    bar_tot += 1;
                    bar_next_can_stack = true;
                    bar_next_can_layer = true;
                    bar_prev_y_n = series.axis_y_n;
                    bar_layer_cur = 0;
                }
                SeriesType::StackedBar => {
                    if !bar_next_can_stack || series.axis_y_n != bar_prev_y_n {
                        bar_tot += 1;
                    }
                    bar_next_can_stack = true;
                    bar_next_can_layer = false;
                    bar_prev_y_n = series.axis_y_n;
                }
                SeriesType::LayeredBar => {
                    if !bar_next_can_layer || series.axis_y_n != bar_prev_y_n {
                        bar_tot += 1;
                        bar_layer_cur = 0;
                    } else {
                        bar_layer_cur += 1;
                    }
                    bar_next_can_stack = false;
                    bar_next_can_layer = true;
                    bar_prev_y_n = series.axis_y_n;
                    series.bar_layer_num = bar_layer_cur;
                }
                _ => {}
            }

            if !series.tag_text_color.is_defined() {
                series.tag_text_color = text_color;
            }
            if !series.tag_fill_color.is_defined() {
                let mut c = series.line_color;
                if c.is_clear() {
                    c = series.fill_color;
                }
                if c.is_clear() {
                    series.tag_fill_color = tag_bg_color;
                } else {
                    c.set_transparency(0.0);
                    series.tag_fill_color.set_against(&tag_bg_color, &c, 0.2);
                }
            }
            if !series.tag_line_color.is_defined() {
                if series.line_color.is_clear() {
                    if series.fill_color.is_clear() {
                        series.tag_line_color = Color::clear();
                    } else {
                        series.tag_line_color = series.fill_color;
                    }
                } else {
                    series.tag_line_color = series.line_color;
                }
                series.tag_line_color.set_transparency(0.0);
            }

            series.determine_visual_properties(x_horizontal);
        }
        self.bar_tot = bar_tot;
        self.lol_tot = lol_tot;

        // Propagate layer totals from each group's bottom layer.
        {
            let mut bottom: Option<usize> = None;
            let mut totals: Vec<(usize, u32)> = Vec::new();
            for (idx, series) in self.series_list.iter().enumerate() {
                if matches!(series.series_type, SeriesType::Bar | SeriesType::LayeredBar) {
                    if series.bar_layer_num == 0 {
                        bottom = Some(idx);
                    } else if series.series_type == SeriesType::LayeredBar {
                        if let Some(bot) = bottom {
                            totals.push((bot, series.bar_layer_num + 1));
                        }
                    }
                }
            }
            for (bot, tot) in &totals {
                let cur = self.series_list[*bot].bar_layer_tot;
                self.series_list[*bot].bar_layer_tot = cur.max(*tot);
            }
            let mut bottom_tot = 1;
            for series in self.series_list.iter_mut() {
                if matches!(series.series_type, SeriesType::Bar | SeriesType::LayeredBar) {
                    if series.bar_layer_num == 0 {
                        bottom_tot = series.bar_layer_tot;
                    } else if series.series_type == SeriesType::LayeredBar {
                        series.bar_layer_tot = bottom_tot;
                    }
                }
            }
        }

        // Legend registration after the visual properties are final.
        for (idx, series) in self.series_list.iter().enumerate() {
            if series.name.is_empty() {
                continue;
            }
            let at = SeriesRef { chart: env.chart_idx, series: idx };
            if series.global_legend {
                env.global_legend.add(series, at);
            } else {
                self.legend.add(series, at);
            }
        }

        for i in 0..self.series_list.len() {
            let (axis_y_n, is_stacked_area) = {
                let s = &self.series_list[i];
                (s.axis_y_n, s.series_type == SeriesType::StackedArea)
            };
            if is_stacked_area {
                let Self { series_list, axis_y, .. } = self;
                series_list[i].compute_stack_dir(source, &axis_y[axis_y_n])?;
            }
        }

        self.html.all_inline = self.bar_tot <= 1 && self.lol_tot <= 1;

        Ok(())
    }

    /// Resolve the axes: category detection, data min/max with stack
    /// offsets, dual-Y roles, positions and cross coordinates, tick
    /// legalization.
    fn axis_prepare(&mut self, scene: &mut Scene, source: &mut Source, tag_g: NodeId) -> Result<()> {
        let category_num = self.category_num();
        let chart_w = self.chart_w;
        let chart_h = self.chart_h;
        let chart_box = self.chart_box;

        for a in std::iter::once(&mut self.axis_x).chain(self.axis_y.iter_mut()) {
            a.length = if a.angle == 0 { chart_w } else { chart_h };
            a.orth_length = if a.angle == 0 { chart_h } else { chart_w };
            a.chart_box = chart_box;
        }

        if self.axis_x.angle == 0 {
            self.axis_y[0].angle = 90;
            self.axis_y[1].angle = 90;
        } else {
            self.axis_y[0].angle = 0;
            self.axis_y[1].angle = 0;
        }

        let category_axis = self.series_list.iter().any(|s| s.series_type.is_cat());

        if category_axis {
            let no_bar_or_stair = !self.series_list.iter().any(|s| {
                s.series_type.is_bar_family()
                    || s.series_type == SeriesType::Lollipop
                    || s.staircase
            });
            let bar_margin = self.bar_margin;
            let ax = &mut self.axis_x;
            ax.category_axis = true;
            ax.log_scale = false;
            ax.min = if no_bar_or_stair && category_num > 0 { 0.0 } else { -0.5 };
            ax.max = ax.min + category_num.max(1) as f64 - if ax.min < 0.0 { 0.0 } else { 1.0 };
            ax.min -= bar_margin;
            ax.max += bar_margin;
            ax.orth_axis_cross = ax.min;
            ax.reverse ^= ax.angle != 0;
        }

        self.axis_x.data_def = false;
        self.axis_x.data_min = if self.axis_x.log_scale { 10.0 } else { 0.0 };
        self.axis_x.data_max = self.axis_x.data_min;
        for a in self.axis_y.iter_mut() {
            a.data_def = false;
            a.data_min = if a.log_scale { 10.0 } else { 0.0 };
            a.data_max = a.data_min;
        }

        // Per-axis, per-direction stack offsets for stacked areas.
        {
            let Self { series_list, axis_x, axis_y, .. } = self;
            for y_n in [1usize, 0] {
                for sd in [0i32, 1] {
                    let mut base_ofs: Vec<f64> = Vec::new();
                    let mut init_ofs = true;
                    for series in series_list.iter_mut() {
                        if series.series_type != SeriesType::StackedArea
                            || series.axis_y_n != y_n
                        {
                            continue;
                        }
                        if series.stack_dir < 0 {
                            if sd != 0 {
                                continue;
                            }
                        } else if sd != 1 {
                            continue;
                        }
                        if init_ofs {
                            base_ofs = vec![series.base; category_num];
                        }
                        init_ofs = false;
                        // One shared offset vector per (axis, direction);
                        // the unused direction gets a scratch copy.
                        let mut scratch = base_ofs.clone();
                        if series.stack_dir < 0 {
                            series.determine_min_max(
                                source,
                                axis_x,
                                &axis_y[y_n],
                                &mut scratch,
                                &mut base_ofs,
                            )?;
                        } else {
                            series.determine_min_max(
                                source,
                                axis_x,
                                &axis_y[y_n],
                                &mut base_ofs,
                                &mut scratch,
                            )?;
                        }
                    }
                }
            }

            // Bars and everything else.
            let mut ofs_pos: [Vec<f64>; 2] = [Vec::new(), Vec::new()];
            let mut ofs_neg: [Vec<f64>; 2] = [Vec::new(), Vec::new()];
            let mut init_ofs = [true, true];
            for series in series_list.iter_mut() {
                if series.series_type == SeriesType::StackedArea {
                    continue;
                }
                let axis_n = series.axis_y_n;
                if matches!(series.series_type, SeriesType::Bar | SeriesType::LayeredBar) {
                    init_ofs = [true, true];
                }
                if series.series_type.is_bar_family() {
                    if init_ofs[axis_n] {
                        ofs_pos[axis_n] = vec![series.base; category_num];
                        ofs_neg[axis_n] = vec![series.base; category_num];
                    }
                    init_ofs[axis_n] = false;
                }
                series.determine_min_max(
                    source,
                    axis_x,
                    &axis_y[axis_n],
                    &mut ofs_pos[axis_n],
                    &mut ofs_neg[axis_n],
                )?;
                if series.series_type == SeriesType::LayeredBar {
                    init_ofs = [true, true];
                }
                if matches!(series.series_type, SeriesType::Bar | SeriesType::StackedBar) {
                    init_ofs[1 - axis_n] = true;
                }
            }

            for series in series_list.iter() {
                if series.def_x {
                    let ax = &mut *axis_x;
                    if !ax.data_def || ax.data_min > series.min_x {
                        ax.data_min = series.min_x;
                    }
                    if !ax.data_def || ax.data_max < series.max_x {
                        ax.data_max = series.max_x;
                    }
                    ax.data_def = true;
                }
                if series.def_y {
                    let ay = &mut axis_y[series.axis_y_n];
                    if !ay.data_def || ay.data_min > series.min_y {
                        ay.data_min = series.min_y;
                        ay.data_min_is_base = series.min_y_is_base;
                    }
                    if !ay.data_def || ay.data_max < series.max_y {
                        ay.data_max = series.max_y;
                        ay.data_max_is_base = series.max_y_is_base;
                    }
                    ay.data_def = true;
                }
            }
        }

        // A Y-axis is shown iff it carries data or was configured.
        for a in self.axis_y.iter_mut() {
            a.show = a.show || a.data_def;
        }

        // Legalize the base axis selector.
        {
            if self.axis_x.pos_base_axis_y_n > 1 {
                self.axis_x.pos_base_axis_y_n = 1;
            }
            let mut sn = 0;
            for i in [1usize, 0] {
                if self.axis_y[i].show {
                    sn = i;
                }
            }
            if !self.axis_y[self.axis_x.pos_base_axis_y_n].show {
                self.axis_x.pos_base_axis_y_n = sn;
                self.axis_y[sn].show = true;
            }
        }

        // If only the secondary axis is in use, swap the roles.
        if !self.axis_y[0].show && self.axis_y[1].show {
            self.axis_y.swap(0, 1);
            for series in self.series_list.iter_mut() {
                series.axis_y_n = 0;
            }
            self.axis_x.pos_base_axis_y_n = 0;
        }

        self.axis_x.show = true;
        self.axis_y[0].show = true;

        let dual_y = self.axis_y[0].show && self.axis_y[1].show;

        if self.axis_x.category_axis {
            if self.axis_x.pos != Pos::Base {
                if self.axis_x.angle == 0 {
                    if !matches!(self.axis_x.pos, Pos::Top | Pos::Bottom) {
                        self.axis_x.pos = Pos::Auto;
                    }
                } else if !matches!(self.axis_x.pos, Pos::Right | Pos::Left) {
                    self.axis_x.pos = Pos::Auto;
                }
            }
            if self.axis_x.pos == Pos::Auto || self.axis_x.pos == Pos::Base {
                // Which Y-axis has a uniform base among base-anchored
                // series?
                let mut base_def = [0u8; 2];
                let mut base = [0.0f64; 2];
                for series in &self.series_list {
                    if series.series_type.has_base() {
                        let n = series.axis_y_n;
                        if base_def[n] == 2 {
                            continue;
                        }
                        if base_def[n] == 1 {
                            if series.base != base[n] {
                                base_def[n] = 2;
                            }
                            continue;
                        }
                        base_def[n] = 1;
                        base[n] = series.base;
                    }
                }
                if self.axis_x.pos == Pos::Base {
                    let i = self.axis_x.pos_base_axis_y_n;
                    if base_def[i] == 1 {
                        self.axis_y[i].orth_axis_cross = base[i];
                        self.axis_y[i].orth_axis_cross_is_base = true;
                    } else {
                        self.axis_x.pos = Pos::Auto;
                    }
                } else {
                    for i in 0..2 {
                        if base_def[i] == 1 {
                            self.axis_y[i].orth_axis_cross = base[i];
                            self.axis_y[i].orth_axis_cross_is_base = true;
                            self.axis_x.pos = Pos::Base;
                            self.axis_x.pos_base_axis_y_n = i;
                            break;
                        }
                    }
                }
            }
            if self.axis_x.angle == 0 {
                if self.axis_x.pos != Pos::Base && self.axis_x.pos != Pos::Top {
                    self.axis_x.pos = Pos::Bottom;
                }
                if self.axis_y[0].pos != Pos::Right {
                    self.axis_y[0].pos = Pos::Left;
                }
            } else {
                if self.axis_x.pos != Pos::Base
                    && !matches!(self.axis_x.pos, Pos::Right | Pos::Left)
                {
                    self.axis_x.pos =
                        if self.axis_y[0].reverse { Pos::Right } else { Pos::Left };
                }
                if self.axis_y[0].pos != Pos::Top {
                    self.axis_y[0].pos = Pos::Bottom;
                }
            }
            if self.axis_x.style == AxisStyle::Auto {
                self.axis_x.style = if self.axis_x.pos == Pos::Base {
                    AxisStyle::Line
                } else {
                    AxisStyle::None
                };
            }
            if self.axis_x.style == AxisStyle::Edge {
                self.axis_x.style = AxisStyle::Line;
            }
            if self.axis_x.style != AxisStyle::Line {
                self.axis_x.style = AxisStyle::None;
            }
            for a in self.axis_y.iter_mut() {
                if a.style == AxisStyle::Auto {
                    a.style = AxisStyle::None;
                }
            }
        } else if self.axis_x.pos == Pos::Base {
            self.axis_x.pos = Pos::Auto;
        }
        if self.axis_x.pos != Pos::Base {
            self.axis_x.pos_base_axis_y_n = 0;
        }
        for a in self.axis_y.iter_mut() {
            if a.pos == Pos::Base {
                a.pos = Pos::Auto;
            }
            a.pos_base_axis_y_n = 0;
        }

        self.axis_x.orth_dual = dual_y;
        self.axis_y[0].y_dual = dual_y;
        self.axis_y[1].y_dual = dual_y;

        for i in 0..2 {
            self.axis_x.orth_style[i] = self.axis_y[if dual_y { i } else { 0 }].style;
            self.axis_y[i].orth_style[0] = self.axis_x.style;
            self.axis_y[i].orth_style[1] = self.axis_x.style;
            self.axis_x.orth_reverse[i] = self.axis_y[if dual_y { i } else { 0 }].reverse;
            self.axis_y[i].orth_reverse[0] = self.axis_x.reverse;
            self.axis_y[i].orth_reverse[1] = self.axis_x.reverse;
        }

        {
            let Self { series_list, axis_x, axis_y, .. } = self;
            axis_x.legalize_min_max(scene, None, None, 0, 0);
            let x_angle = axis_x.angle;
            for (i, a) in axis_y.iter_mut().enumerate() {
                a.legalize_min_max(scene, Some(tag_g), Some(series_list), i, x_angle);
            }
        }

        if self.axis_x.pos == Pos::Base {
            let i = self.axis_x.pos_base_axis_y_n;
            if self.axis_y[i].orth_axis_cross < self.axis_y[i].min
                || self.axis_y[i].orth_axis_cross > self.axis_y[i].max
            {
                self.axis_x.style = AxisStyle::None;
            }
        }

        // Edge style forces the cross point to min or max.
        if self.axis_x.style == AxisStyle::Edge {
            for a in self.axis_y.iter_mut() {
                a.orth_axis_cross =
                    if a.orth_axis_cross < a.max { a.min } else { a.max };
            }
        }
        if self.axis_y[0].style == AxisStyle::Edge {
            self.axis_x.orth_axis_cross = if self.axis_x.orth_axis_cross < self.axis_x.max {
                self.axis_x.min
            } else {
                self.axis_x.max
            };
        }

        if (self.axis_x.angle == 0 && self.axis_x.pos == Pos::Bottom)
            || (self.axis_x.angle != 0 && self.axis_x.pos == Pos::Left)
        {
            self.axis_y[0].orth_axis_cross =
                if self.axis_y[0].reverse { self.axis_y[0].max } else { self.axis_y[0].min };
        }
        if (self.axis_x.angle == 0 && self.axis_x.pos == Pos::Top)
            || (self.axis_x.angle != 0 && self.axis_x.pos == Pos::Right)
        {
            self.axis_y[0].orth_axis_cross =
                if self.axis_y[0].reverse { self.axis_y[0].min } else { self.axis_y[0].max };
        }
        if (self.axis_y[0].angle == 0 && self.axis_y[0].pos == Pos::Bottom)
            || (self.axis_y[0].angle != 0 && self.axis_y[0].pos == Pos::Left)
        {
            self.axis_x.orth_axis_cross =
                if self.axis_x.reverse { self.axis_x.max } else { self.axis_x.min };
        }
        if (self.axis_y[0].angle == 0 && self.axis_y[0].pos == Pos::Top)
            || (self.axis_y[0].angle != 0 && self.axis_y[0].pos == Pos::Right)
        {
            self.axis_x.orth_axis_cross =
                if self.axis_x.reverse { self.axis_x.min } else { self.axis_x.max };
        }

        let xc = self.axis_x.coor(self.axis_x.orth_axis_cross);
        self.axis_x.orth_axis_coor = [xc, xc];
        for a in self.axis_y.iter_mut() {
            let c = a.coor(a.orth_axis_cross);
            a.orth_axis_coor = [c, c];
        }
        if dual_y {
            self.axis_x.orth_axis_coor[0] = 0.0;
            self.axis_x.orth_axis_coor[1] = self.axis_x.length;
        }

        {
            let base_n =
                if self.axis_x.pos == Pos::Base { self.axis_x.pos_base_axis_y_n } else { 0 };
            let c = self.axis_y[base_n].orth_axis_coor;
            for a in self.axis_y.iter_mut() {
                a.orth_axis_coor = c;
            }
        }

        if self.axis_x.style == AxisStyle::Auto {
            self.axis_x.style = if dual_y
                && (self.axis_y[0].orth_axis_cross == self.axis_y[0].min
                    || self.axis_y[0].orth_axis_cross == self.axis_y[0].max)
            {
                AxisStyle::Edge
            } else if self.chart_box {
                AxisStyle::Edge
            } else {
                AxisStyle::Arrow
            };
        }
        for a in self.axis_y.iter_mut() {
            if a.style == AxisStyle::Auto {
                a.style = if dual_y {
                    AxisStyle::Edge
                } else if self.chart_box {
                    AxisStyle::Edge
                } else {
                    AxisStyle::Arrow
                };
            }
        }

        for i in 0..2 {
            self.axis_y[i].orth_style[0] = self.axis_x.style;
            self.axis_y[i].orth_style[1] = self.axis_x.style;
            self.axis_x.orth_style[i] = self.axis_y[if dual_y { i } else { 0 }].style;
        }

        self.axis_x.orth_coor = self.axis_y[0].orth_axis_coor[0];
        self.axis_x.orth_coor_is_min = coor_near(self.axis_x.orth_coor, 0.0);
        self.axis_x.orth_coor_is_max =
            coor_near(self.axis_x.orth_coor, self.axis_y[0].length);
        for i in 0..2 {
            self.axis_y[i].orth_coor = self.axis_x.orth_axis_coor[i];
            self.axis_y[i].orth_coor_is_min = coor_near(self.axis_y[i].orth_coor, 0.0);
            self.axis_y[i].orth_coor_is_max =
                coor_near(self.axis_y[i].orth_coor, self.axis_x.length);
        }

        for a in std::iter::once(&mut self.axis_x).chain(self.axis_y.iter_mut()) {
            a.cat_coor = a.orth_coor;
            a.cat_coor_is_min = a.orth_coor_is_min;
            a.cat_coor_is_max = a.orth_coor_is_max;
        }

        if self.chart_box {
            for a in std::iter::once(&mut self.axis_x).chain(self.axis_y.iter_mut()) {
                if !a.orth_coor_is_min && !a.orth_coor_is_max && a.style == AxisStyle::Edge {
                    a.style = AxisStyle::Line;
                }
            }
        }

        if self.axis_x.category_axis && !self.axis_x.grid_set {
            self.axis_x.major_grid_enable = false;
            self.axis_x.minor_grid_enable = false;
        }

        if dual_y {
            let has_grid =
                |a: &Axis| a.major_grid_enable || a.minor_grid_enable;
            if has_grid(&self.axis_y[0])
                && has_grid(&self.axis_y[1])
                && !self.axis_y[1].grid_set
            {
                self.axis_y[1].set_grid(false, false);
            }
            if has_grid(&self.axis_y[1])
                && has_grid(&self.axis_y[0])
                && !self.axis_y[0].grid_set
            {
                self.axis_y[0].set_grid(false, false);
            }
            if has_grid(&self.axis_y[0]) && has_grid(&self.axis_y[1]) {
                for i in 0..2 {
                    if self.axis_y[i].grid_style == GridStyle::Auto
                        && self.axis_y[1 - i].grid_style != GridStyle::Auto
                    {
                        self.axis_y[i].grid_style =
                            if self.axis_y[1 - i].grid_style == GridStyle::Dash {
                                GridStyle::Solid
                            } else {
                                GridStyle::Dash
                            };
                    }
                }
                if self.axis_y[0].grid_style == GridStyle::Auto
                    && self.axis_y[1].grid_style == GridStyle::Auto
                {
                    self.axis_y[0].grid_style = GridStyle::Dash;
                    self.axis_y[1].grid_style = GridStyle::Solid;
                }
            }
        }

        Ok(())
    }

    //--------------------------------------------------------------------
    // Legend placement.

    /// Enumerate candidate interior legend boxes around the plot corners,
    /// edges and center that do not collide with the placed decorations.
    fn calc_legend_boxes(
        &mut self,
        scene: &mut Scene,
        legend_g: NodeId,
        lb_list: &mut Vec<LegendBox>,
        avoid: &[BoundaryBox],
    ) {
        let dims = self.legend.calc_dims(scene, legend_g);
        let lc = self.legend.cnt();
        if lc == 0 {
            return;
        }

        let boxed = if self.legend_box_specified { self.legend_box } else { true };

        let mut force_anchor_x = AnchorX::Mid;
        let mut force_x = false;
        let mut force_anchor_y = AnchorY::Mid;
        let mut force_y = false;

        if let Some(pos2) = self.legend.pos2 {
            let pos1 = self.legend.pos1;
            match pos1 {
                Pos::Center => {
                    if matches!(pos2, Pos::Left | Pos::Right) {
                        force_anchor_y = AnchorY::Mid;
                        force_y = true;
                    } else {
                        force_anchor_x = AnchorX::Mid;
                        force_x = true;
                    }
                }
                Pos::Left => {
                    force_anchor_x = AnchorX::Min;
                    force_x = true;
                }
                Pos::Right => {
                    force_anchor_x = AnchorX::Max;
                    force_x = true;
                }
                Pos::Bottom => {
                    force_anchor_y = AnchorY::Min;
                    force_y = true;
                }
                Pos::Top => {
                    force_anchor_y = AnchorY::Max;
                    force_y = true;
                }
                _ => {}
            }
            match pos2 {
                Pos::Center => {
                    if matches!(pos1, Pos::Bottom | Pos::Top) {
                        force_anchor_x = AnchorX::Mid;
                        force_x = true;
                    } else {
                        force_anchor_y = AnchorY::Mid;
                        force_y = true;
                    }
                }
                Pos::Left => {
                    force_anchor_x = AnchorX::Min;
                    force_x = true;
                }
                Pos::Right => {
                    force_anchor_x = AnchorX::Max;
                    force_x = true;
                }
                Pos::Bottom => {
                    force_anchor_y = AnchorY::Min;
                    force_y = true;
                }
                Pos::Top => {
                    force_anchor_y = AnchorY::Max;
                    force_y = true;
                }
                _ => {}
            }
        }

        if self.legend.force_nx > 0 && self.legend.force_nx > lc {
            self.legend.force_nx = lc;
        }

        let chart_w = self.chart_w;
        let chart_h = self.chart_h;
        let force_nx = self.legend.force_nx;
        let legend = &self.legend;

        let mut add_lbs = |scene: &mut Scene,
                           anchor_x: AnchorX,
                           anchor_y: AnchorY,
                           lb_list: &mut Vec<LegendBox>| {
            if (force_x && force_anchor_x != anchor_x) || (force_y && force_anchor_y != anchor_y)
            {
                return;
            }
            let mut nx = if anchor_x == AnchorX::Mid { lc } else { 1 };
            let mut ny = if anchor_x == AnchorX::Mid { 1 } else { lc };
            while nx > 0 && ny > 0 {
                let (mut w, mut h) = legend.get_dims(&dims, boxed, nx);
                w += 2.0 * BOX_SPACING;
                h += 2.0 * BOX_SPACING;
                let obj = scene.add(legend_g, Shape::rect(0.0, 0.0, w, h));
                let x = match anchor_x {
                    AnchorX::Min => 0.0,
                    AnchorX::Mid => chart_w / 2.0,
                    AnchorX::Max => chart_w,
                };
                let y = match anchor_y {
                    AnchorY::Min => 0.0,
                    AnchorY::Mid => chart_h / 2.0,
                    AnchorY::Max => chart_h,
                };
                scene.move_to(obj, anchor_x, anchor_y, x, y);

                // Nudge inward until free of the avoid list.
                let mut done = false;
                while !done {
                    done = true;
                    let obj_bb = scene.bbox(obj);
                    for ao in avoid {
                        if !obj_bb.collides(ao, 0.0, 0.0) {
                            continue;
                        }
                        let mut dx = if anchor_x == AnchorX::Min {
                            ao.max.x - obj_bb.min.x
                        } else {
                            ao.min.x - obj_bb.max.x
                        };
                        let mut dy = if anchor_y == AnchorY::Min {
                            ao.max.y - obj_bb.min.y
                        } else {
                            ao.min.y - obj_bb.max.y
                        };
                        if anchor_x == AnchorX::Mid {
                            dx = 0.0;
                        }
                        if anchor_y == AnchorY::Mid {
                            dy = 0.0;
                        }
                        if dx != 0.0 && dx.abs() < dy.abs() {
                            dy = 0.0;
                        } else {
                            dx = 0.0;
                        }
                        scene.translate(obj, dx, dy);
                        if dx.abs() > EPSILON && dy.abs() > EPSILON {
                            done = false;
                            break;
                        }
                    }
                }

                let bb = scene.bbox(obj);
                let free = !avoid.iter().any(|ao| bb.collides(ao, 0.0, 0.0));
                if free
                    && (anchor_x != AnchorX::Mid || bb.width() > bb.height())
                    && bb.min.x > -EPSILON
                    && bb.max.x < chart_w + EPSILON
                    && bb.min.y > -EPSILON
                    && bb.max.y < chart_h + EPSILON
                    && (force_nx == 0 || force_nx == nx)
                {
                    let mut lb = LegendBox {
                        bb,
                        nx,
                        sp: nx * ny - lc,
                        weight1: 0.0,
                        weight2: 0.0,
                        anchor_x,
                        anchor_y,
                    };
                    lb.bb.min.x += 1.0;
                    lb.bb.min.y += 1.0;
                    lb.bb.max.x -= 1.0;
                    lb.bb.max.y -= 1.0;
                    lb_list.push(lb);
                }
                scene.pop_child(legend_g);

                if anchor_x == AnchorX::Mid {
                    if ny == lc {
                        break;
                    }
                    let onx = nx;
                    while ny < lc && onx == nx {
                        ny += 1;
                        nx = lc.div_ceil(ny);
                    }
                } else {
                    if nx == lc {
                        break;
                    }
                    let ony = ny;
                    while nx < lc && ony == ny {
                        nx += 1;
                        ny = lc.div_ceil(nx);
                    }
                }
            }
        };

        let dual_y = self.axis_y[0].show && self.axis_y[1].show;

        let mut ax1 = AnchorX::Max;
        let mut ax2 = AnchorX::Min;
        let mut ay1 = AnchorY::Max;
        let mut ay2 = AnchorY::Min;
        if self.axis_x.angle == 0 {
            if self.axis_y[0].orth_coor_is_max {
                std::mem::swap(&mut ax1, &mut ax2);
            }
            if self.axis_x.orth_coor_is_max {
                std::mem::swap(&mut ay1, &mut ay2);
            }
        } else {
            if self.axis_x.orth_coor_is_max {
                std::mem::swap(&mut ax1, &mut ax2);
            }
            if self.axis_y[0].orth_coor_is_max {
                std::mem::swap(&mut ay1, &mut ay2);
            }
        }

        let candidates: Vec<(AnchorX, AnchorY)> = if dual_y {
            if self.axis_x.angle == 0 {
                vec![
                    (AnchorX::Mid, ay1),
                    (AnchorX::Mid, ay2),
                    (ax1, ay1),
                    (ax2, ay1),
                    (ax1, ay2),
                    (ax2, ay2),
                    (ax1, AnchorY::Mid),
                    (ax2, AnchorY::Mid),
                ]
            } else {
                vec![
                    (ax1, ay1),
                    (ax1, AnchorY::Mid),
                    (ax1, ay2),
                    (AnchorX::Mid, ay1),
                    (AnchorX::Mid, ay2),
                    (ax2, ay1),
                    (ax2, ay2),
                    (ax2, AnchorY::Mid),
                ]
            }
        } else {
            vec![
                (ax1, ay1),
                (AnchorX::Mid, ay1),
                (ax1, AnchorY::Mid),
                (ax1, ay2),
                (AnchorX::Mid, ay2),
                (ax2, ay1),
                (ax2, ay2),
                (ax2, AnchorY::Mid),
            ]
        };

        for (ax, ay) in candidates {
            add_lbs(scene, ax, ay, lb_list);
        }
    }

    /// After the series drew, pick the best scored interior box (or place
    /// the legend outside the plot) and render the legend.
    fn place_legends(
        &mut self,
        scene: &mut Scene,
        env: &mut ChartEnv,
        avoid: &mut Vec<BoundaryBox>,
        lb_list: &[LegendBox],
        legend_g: NodeId,
    ) {
        if self.legend.cnt() == 0 {
            return;
        }

        if (self.legend.pos1 == Pos::Auto && self.legend.pos2.is_none())
            || self.legend.pos2.is_some()
        {
            let title_anchor_x = match self.title_pos_x {
                Pos::Left => AnchorX::Min,
                Pos::Right => AnchorX::Max,
                _ => AnchorX::Mid,
            };

            let mut best_lb: Option<LegendBox> = None;
            for lb in lb_list {
                let better = match &best_lb {
                    None => true,
                    Some(best) => {
                        lb.weight1 < best.weight1
                            || (lb.weight1 == best.weight1
                                && (lb.weight2 < best.weight2
                                    || (lb.weight2 == best.weight2
                                        && (lb.sp < best.sp
                                            || (lb.sp == best.sp
                                                && self.title_inside
                                                && title_anchor_x != AnchorX::Mid
                                                && lb.anchor_x == title_anchor_x
                                                && best.anchor_x != title_anchor_x)))))
                    }
                };
                if better {
                    best_lb = Some(*lb);
                }
            }
            if let Some(best) = best_lb {
                let boxed = if self.legend_box_specified { self.legend_box } else { true };
                let g = scene.add_group(legend_g);
                let axis_color = self.axis_color;
                let box_color = self.box_color;
                let entries =
                    self.legend.build(scene, boxed, &axis_color, &box_color, g, best.nx);
                let build_bb = scene.bbox(g);
                scene.move_to(
                    g,
                    AnchorX::Mid,
                    AnchorY::Mid,
                    (best.bb.min.x + best.bb.max.x) / 2.0,
                    (best.bb.min.y + best.bb.max.y) / 2.0,
                );
                let moved_bb = scene.bbox(g);
                self.record_legend_bbs(
                    env,
                    &entries,
                    moved_bb.min.x - build_bb.min.x,
                    moved_bb.min.y - build_bb.min.y,
                );
                return;
            }
            self.legend.pos1 = Pos::Bottom;
        }

        let boxed = if self.legend_box_specified {
            self.legend_box
        } else {
            !self.legend.heading.is_empty()
        };

        let dims = self.legend.calc_dims(scene, legend_g);
        let axis_color = self.axis_color;
        let box_color = self.box_color;

        if matches!(self.legend.pos1, Pos::Left | Pos::Right) {
            let mx = self.legend.margin_x(boxed);
            let my = self.legend.margin_y(boxed);

            let mut nx = 1;
            self.legend.get_best_fit(&dims, &mut nx, boxed, 0.0, self.chart_h, 0.0, 0.0);
            let g = scene.add_group(legend_g);
            let entries = self.legend.build(scene, boxed, &axis_color, &box_color, g, nx);
            let build_bb = scene.bbox(g);

            let (x, dir, anchor_x) = if self.legend.pos1 == Pos::Right {
                (self.chart_w + mx, Dir::Right, AnchorX::Min)
            } else {
                (-mx, Dir::Left, AnchorX::Max)
            };
            let mut best: Option<(AnchorY, f64, f64)> = None;
            for anchor_y in [AnchorY::Max, AnchorY::Mid, AnchorY::Min] {
                let y = match anchor_y {
                    AnchorY::Max => self.chart_h,
                    AnchorY::Mid => self.chart_h / 2.0,
                    AnchorY::Min => 0.0,
                };
                scene.move_to(g, anchor_x, anchor_y, x, y);
                move_obj(scene, dir, g, avoid, mx, my);
                let bb = scene.bbox(g);
                let better = match &best {
                    None => true,
                    Some((_, best_x, _)) => {
                        if self.legend.pos1 == Pos::Right {
                            bb.min.x + EPSILON < *best_x
                        } else {
                            bb.min.x - EPSILON > *best_x
                        }
                    }
                };
                if better {
                    best = Some((anchor_y, bb.min.x, y));
                }
            }
            if let Some((anchor_y, _, y)) = best {
                scene.move_to(g, anchor_x, anchor_y, x, y);
                move_obj(scene, dir, g, avoid, mx, my);
            }
            let moved_bb = scene.bbox(g);
            self.record_legend_bbs(
                env,
                &entries,
                moved_bb.min.x - build_bb.min.x,
                moved_bb.min.y - build_bb.min.y,
            );
            avoid.push(moved_bb);
        } else {
            let mx = 40.0;
            let my = self.legend.margin_y(boxed);

            let mut nx = 1;
            self.legend.get_best_fit(&dims, &mut nx, boxed, self.chart_w, 0.0, 0.0, 0.0);
            let g = scene.add_group(legend_g);
            let entries = self.legend.build(scene, boxed, &axis_color, &box_color, g, nx);
            let build_bb = scene.bbox(g);

            let (y, dir, anchor_y) = if self.legend.pos1 == Pos::Top {
                (self.chart_h + my, Dir::Up, AnchorY::Min)
            } else {
                (-my, Dir::Down, AnchorY::Max)
            };
            let mut best: Option<(AnchorX, f64, f64)> = None;
            for anchor_x in [AnchorX::Mid, AnchorX::Min, AnchorX::Max] {
                let x = match anchor_x {
                    AnchorX::Max => self.chart_w,
                    AnchorX::Mid => self.chart_w / 2.0,
                    AnchorX::Min => 0.0,
                };
                scene.move_to(g, anchor_x, anchor_y, x, y);
                move_obj(scene, dir, g, avoid, mx, my);
                let bb = scene.bbox(g);
                let better = match &best {
                    None => true,
                    Some((_, _, best_y)) => {
                        if self.legend.pos1 == Pos::Top {
                            bb.min.y + EPSILON < *best_y
                        } else {
                            bb.min.y - EPSILON > *best_y
                        }
                    }
                };
                if better {
                    best = Some((anchor_x, x, bb.min.y));
                }
            }
            if let Some((anchor_x, x, _)) = best {
                scene.move_to(g, anchor_x, anchor_y, x, y);
                move_obj(scene, dir, g, avoid, mx, my);
            }
            let moved_bb = scene.bbox(g);
            self.record_legend_bbs(
                env,
                &entries,
                moved_bb.min.x - build_bb.min.x,
                moved_bb.min.y - build_bb.min.y,
            );
            avoid.push(moved_bb);
        }
    }

    /// Record the final legend entry boxes into the member series for the
    /// interactive document.
    fn record_legend_bbs(
        &mut self,
        env: &mut ChartEnv,
        entries: &[(usize, BoundaryBox)],
        dx: f64,
        dy: f64,
    ) {
        if !env.enable_html {
            return;
        }
        for (item_idx, bb) in entries {
            let mut bb = *bb;
            bb.translate(dx, dy);
            let members: Vec<SeriesRef> = self.legend.items[*item_idx].members.clone();
            for m in members {
                if m.chart == env.chart_idx {
                    self.series_list[m.series].html.legend_bb = Some(bb);
                }
            }
        }
    }

    //--------------------------------------------------------------------
    // Series drawing.

    /// Build one series with the chart state split into a build context.
    #[allow(clippy::too_many_arguments)]
    fn run_one_series(
        &mut self,
        scene: &mut Scene,
        source: &mut Source,
        enable_html: bool,
        lb_list: &mut Vec<LegendBox>,
        idx: usize,
        groups: BuildGroups,
        bar_num: u32,
        bar_tot: u32,
        ofs_pos: Option<&mut Vec<f64>>,
        ofs_neg: Option<&mut Vec<f64>>,
        base_pts: Option<&mut Vec<Point>>,
    ) -> Result<()> {
        let category_num = self.categories.len();
        let Self {
            series_list,
            axis_x,
            axis_y,
            tag_db,
            html,
            bar_one_width,
            bar_all_width,
            bar_layered_width,
            ..
        } = self;
        let mut series_html = std::mem::take(&mut series_list[idx].html);
        let series = &series_list[idx];
        let sink = if enable_html && series.snap_enable {
            Some(HtmlSink {
                series: &mut series_html,
                chart: html,
                is_cat: series.is_cat,
                category_num,
                x_len: axis_x.length,
            })
        } else {
            None
        };
        let mut ctx = BuildCtx {
            scene,
            source,
            axis_x,
            axis_y: &axis_y[series.axis_y_n],
            tag_db,
            lb_list,
            html: sink,
            category_num,
            bar_one_width: *bar_one_width,
            bar_all_width: *bar_all_width,
            bar_layered_width: *bar_layered_width,
        };
        let result =
            build_series(series, &mut ctx, &groups, bar_num, bar_tot, ofs_pos, ofs_neg, base_pts);
        self.series_list[idx].html = series_html;
        result
    }

    fn build_all_series(
        &mut self,
        scene: &mut Scene,
        source: &mut Source,
        env: &mut ChartEnv,
        below_axes_g: NodeId,
        above_axes_g: NodeId,
        tag_g: NodeId,
        lb_list: &mut Vec<LegendBox>,
    ) -> Result<()> {
        let stacked_area_fill_g = scene.add_group(below_axes_g);
        let stacked_area_line_g = scene.add_group(below_axes_g);
        let bar_area_g = scene.add_group(below_axes_g);
        let bar_line_g = scene.add_group(below_axes_g);
        let lollipop_stem_g = scene.add_group(below_axes_g);

        let category_num = self.category_num();
        let enable_html = env.enable_html;
        let bar_tot = self.bar_tot;
        let lol_tot = self.lol_tot;

        // Stacked areas, per Y-axis and stack direction.
        for y_n in [1usize, 0] {
            for sd in [0i32, 1] {
                let mut base_ofs: Vec<f64> = Vec::new();
                let mut base_pts: Vec<Point> = Vec::new();
                let mut first = true;
                for idx in 0..self.series_list.len() {
                    {
                        let s = &self.series_list[idx];
                        if s.series_type != SeriesType::StackedArea || s.axis_y_n != y_n {
                            continue;
                        }
                        if s.stack_dir < 0 {
                            if sd != 0 {
                                continue;
                            }
                        } else if sd != 1 {
                            continue;
                        }
                        if first {
                            base_ofs = vec![s.base; category_num];
                        }
                        first = false;
                    }
                    let groups = BuildGroups {
                        main_g: stacked_area_line_g,
                        line_g: stacked_area_line_g,
                        area_fill_g: stacked_area_fill_g,
                        marker_g: Some(above_axes_g),
                        tag_g,
                    };
                    self.run_one_series(
                        scene,
                        source,
                        enable_html,
                        lb_list,
                        idx,
                        groups,
                        0,
                        1,
                        Some(&mut base_ofs),
                        None,
                        Some(&mut base_pts),
                    )?;
                }
            }
        }

        // Plain areas.
        for idx in 0..self.series_list.len() {
            if self.series_list[idx].series_type != SeriesType::Area {
                continue;
            }
            let groups = BuildGroups {
                main_g: bar_area_g,
                line_g: bar_area_g,
                area_fill_g: bar_area_g,
                marker_g: Some(above_axes_g),
                tag_g,
            };
            self.run_one_series(
                scene,
                source,
                enable_html,
                lb_list,
                idx,
                groups,
                0,
                1,
                None,
                None,
                None,
            )?;
        }

        // Bars.
        {
            let mut bar_next_can_stack = false;
            let mut bar_next_can_layer = false;
            let mut bar_prev_y_n = 0usize;
            let mut bar_ofs_pos: Vec<f64> = Vec::new();
            let mut bar_ofs_neg: Vec<f64> = Vec::new();
            let mut bar_cur = 0u32;
            let mut bar_first = true;
            let mut bar_init = true;

            for idx in 0..self.series_list.len() {
                {
                    let s = &self.series_list[idx];
                    if !s.series_type.is_bar_family() {
                        continue;
                    }
                    match s.series_type {
                        SeriesType::Bar => {
                            if !bar_first {
                                bar_cur += 1;
                            }
                            bar_next_can_stack = true;
                            bar_next_can_layer = true;
                            bar_init = true;
                        }
                        SeriesType::StackedBar => {
                            if !bar_next_can_stack || s.axis_y_n != bar_prev_y_n {
                                if !bar_first {
                                    bar_cur += 1;
                                }
                                bar_init = true;
                            }
                            bar_next_can_stack = true;
                            bar_next_can_layer = false;
                        }
                        SeriesType::LayeredBar => {
                            if !bar_next_can_layer || s.axis_y_n != bar_prev_y_n {
                                if !bar_first {
                                    bar_cur += 1;
                                }
                            }
                            bar_next_can_stack = false;
                            bar_next_can_layer = true;
                            bar_init = true;
                        }
                        _ => {}
                    }
                    if bar_init {
                        bar_ofs_pos = vec![s.base; category_num];
                        bar_ofs_neg = vec![s.base; category_num];
                        bar_init = false;
                    }
                    bar_prev_y_n = s.axis_y_n;
                    bar_first = false;
                }
                let groups = BuildGroups {
                    main_g: bar_area_g,
                    line_g: bar_line_g,
                    area_fill_g: bar_area_g,
                    marker_g: None,
                    tag_g,
                };
                self.run_one_series(
                    scene,
                    source,
                    enable_html,
                    lb_list,
                    idx,
                    groups,
                    bar_cur,
                    bar_tot,
                    Some(&mut bar_ofs_pos),
                    Some(&mut bar_ofs_neg),
                    None,
                )?;
            }
        }

        // Lollipops.
        {
            let mut lol_num = 0u32;
            for idx in 0..self.series_list.len() {
                if self.series_list[idx].series_type != SeriesType::Lollipop {
                    continue;
                }
                let groups = BuildGroups {
                    main_g: lollipop_stem_g,
                    line_g: lollipop_stem_g,
                    area_fill_g: lollipop_stem_g,
                    marker_g: Some(above_axes_g),
                    tag_g,
                };
                self.run_one_series(
                    scene,
                    source,
                    enable_html,
                    lb_list,
                    idx,
                    groups,
                    lol_num,
                    lol_tot,
                    None,
                    None,
                    None,
                )?;
                lol_num += 1;
            }
        }

        // Lines and points.
        for idx in 0..self.series_list.len() {
            if !matches!(
                self.series_list[idx].series_type,
                SeriesType::XY | SeriesType::Scatter | SeriesType::Line | SeriesType::Point
            ) {
                continue;
            }
            let groups = BuildGroups {
                main_g: above_axes_g,
                line_g: above_axes_g,
                area_fill_g: above_axes_g,
                marker_g: Some(above_axes_g),
                tag_g,
            };
            self.run_one_series(
                scene,
                source,
                enable_html,
                lb_list,
                idx,
                groups,
                0,
                1,
                None,
                None,
                None,
            )?;
        }

        Ok(())
    }

    //--------------------------------------------------------------------
    // Title, frame, overhang.

    fn build_title(&mut self, scene: &mut Scene, avoid: &mut Vec<BoundaryBox>) {
        if self.title.is_empty() && self.sub_title.is_empty() && self.sub_sub_title.is_empty() {
            return;
        }

        let spacing = 4.0 * self.title_size;
        let boxed = if self.title_box_specified { self.title_box } else { self.title_inside };

        let space_x = 5.0 * BOX_SPACING;
        let space_y = BOX_SPACING;
        let mut title_objs: Vec<NodeId> = Vec::new();

        let text_g = scene.add_group(self.svg_g);

        let (x, a) = match self.title_pos_x {
            Pos::Left => (0.0, AnchorX::Min),
            Pos::Right => (self.chart_w, AnchorX::Max),
            _ => (self.chart_w / 2.0, AnchorX::Mid),
        };
        let mut y = self.chart_h + space_y;
        if !self.sub_sub_title.is_empty() {
            let txt = self.sub_sub_title.clone();
            let obj = crate::label::create_label(scene, text_g, &txt, 14.0 * self.title_size);
            scene.move_to(obj, a, AnchorY::Min, x, y);
            title_objs.push(obj);
            y += scene.bbox(obj).height() + spacing;
        }
        if !self.sub_title.is_empty() {
            let txt = self.sub_title.clone();
            let obj = crate::label::create_label(scene, text_g, &txt, 20.0 * self.title_size);
            scene.move_to(obj, a, AnchorY::Min, x, y);
            title_objs.push(obj);
            y += scene.bbox(obj).height() + spacing;
        }
        if !self.title.is_empty() {
            let txt = self.title.clone();
            let obj = crate::label::create_label(scene, text_g, &txt, 36.0 * self.title_size);
            scene.move_to(obj, a, AnchorY::Min, x, y);
            title_objs.push(obj);
        }
        move_objs(scene, Dir::Up, &title_objs, avoid, space_x, space_y);

        if boxed {
            let bb = scene.bbox(text_g);
            let frame = scene.add(
                text_g,
                Shape::rounded_rect(
                    bb.min.x - BOX_SPACING,
                    bb.min.y - BOX_SPACING,
                    bb.max.x + BOX_SPACING,
                    bb.max.y + BOX_SPACING,
                    BOX_SPACING,
                ),
            );
            let axis_color = self.axis_color;
            let box_color = self.box_color;
            let attr = scene.attr_mut(frame);
            attr.line_color().set(&axis_color);
            attr.set_line_width(1.0);
            if box_color.is_defined() {
                attr.fill_color().set(&box_color);
            }
            scene.front_to_back(text_g);
            let y = self.chart_h + space_y;
            match self.title_pos_x {
                Pos::Left => scene.move_to(text_g, a, AnchorY::Min, 0.0, y),
                Pos::Right => scene.move_to(text_g, a, AnchorY::Min, self.chart_w, y),
                _ => scene.move_to(text_g, a, AnchorY::Min, self.chart_w / 2.0, y),
            }
            move_obj(scene, Dir::Up, text_g, avoid, BOX_SPACING, BOX_SPACING);
        }

        // Settle just above the highest decoration.
        let mut top = 0.0f64;
        for bb in avoid.iter() {
            if bb.defined() {
                top = top.max(bb.max.y);
            }
        }
        let delta = top - scene.bbox(text_g).max.y;
        if delta > 0.0 {
            scene.translate(text_g, 0.0, delta);
        }

        if self.title_inside {
            let mx = BOX_SPACING;
            let my = BOX_SPACING;
            let (px, ax) = match self.title_pos_x {
                Pos::Left => (mx, AnchorX::Min),
                Pos::Right => (self.chart_w - mx, AnchorX::Max),
                _ => (self.chart_w / 2.0, AnchorX::Mid),
            };
            let (py, ay) = if self.title_pos_y == Pos::Bottom {
                (my, AnchorY::Min)
            } else {
                (self.chart_h - my, AnchorY::Max)
            };
            scene.move_to(text_g, ax, ay, px, py);

            for _pass in 0..2 {
                if ax != AnchorX::Mid {
                    let mut old_x = COOR_HI;
                    loop {
                        let bb = scene.bbox(text_g);
                        if bb.min.x == old_x {
                            break;
                        }
                        old_x = bb.min.x;
                        let mut dx = 0.0;
                        for ao in avoid.iter() {
                            if !scene.bbox(text_g).collides(ao, mx, 0.0) {
                                continue;
                            }
                            if ax == AnchorX::Min && ao.max.x < self.chart_w / 4.0 {
                                dx = ao.max.x - bb.min.x + mx;
                                break;
                            }
                            if ax == AnchorX::Max && ao.min.x > self.chart_w * 3.0 / 4.0 {
                                dx = ao.min.x - bb.max.x - mx;
                                break;
                            }
                        }
                        if dx == 0.0 {
                            break;
                        }
                        scene.translate(text_g, dx, 0.0);
                    }
                }
                let bb = scene.bbox(text_g);
                if bb.min.x < mx || bb.max.x > self.chart_w - mx {
                    scene.move_to(text_g, AnchorX::Mid, ay, self.chart_w / 2.0, py);
                }
                let mut old_y = COOR_HI;
                loop {
                    let bb = scene.bbox(text_g);
                    if bb.min.y == old_y {
                        break;
                    }
                    old_y = bb.min.y;
                    let mut dy = 0.0;
                    for ao in avoid.iter() {
                        if !scene.bbox(text_g).collides(ao, 0.0, my) {
                            continue;
                        }
                        if ay == AnchorY::Min && ao.max.y < self.chart_h / 4.0 {
                            dy = ao.max.y - bb.min.y + my;
                            break;
                        }
                        if ay == AnchorY::Max && ao.min.y > self.chart_h * 3.0 / 4.0 {
                            dy = ao.min.y - bb.max.y - my;
                            break;
                        }
                    }
                    if dy == 0.0 {
                        break;
                    }
                    scene.translate(text_g, 0.0, dy);
                }
            }

            avoid.push(scene.bbox(text_g));
        }
    }

    /// Extra space around the plot needed by markers and line widths that
    /// spill over the plot edge.
    pub fn get_area_overhang(&self) -> f64 {
        let mut delta = 0.0f64;
        for series in &self.series_list {
            if series.has_line && !series.series_type.is_bar_family() {
                delta = delta.max(series.line_width / 2.0);
            }
            if series.marker_show {
                delta = delta.max(-series.marker_out.x1);
                delta = delta.max(-series.marker_out.y1);
                delta = delta.max(series.marker_out.x2);
                delta = delta.max(series.marker_out.y2);
            }
        }
        delta
    }

    /// Draw the chart frame (canvas rectangle) behind everything.
    pub fn build_frame(&mut self, scene: &mut Scene) {
        if self.frame_width < 0.0 {
            return;
        }

        let mut bb = scene.bbox(self.svg_g);
        let d = self.frame_padding + self.frame_width / 2.0;
        bb = bb.expanded(d, d);
        let frame = scene.add(
            self.svg_g,
            Shape::rounded_rect(bb.min.x, bb.min.y, bb.max.x, bb.max.y, self.frame_radius),
        );
        let canvas_color = self.canvas_color;
        let frame_color = self.frame_color;
        let attr = scene.attr_mut(frame);
        attr.fill_color().set(&canvas_color);
        attr.line_color().set(&frame_color);
        attr.set_line_width(self.frame_width);
        scene.front_to_back(self.svg_g);

        if self.frame_width > 0.0 {
            let bb = bb.expanded(self.frame_width / 2.0, self.frame_width / 2.0);
            let pad = scene.add(self.svg_g, Shape::rect(bb.min.x, bb.min.y, bb.max.x, bb.max.y));
            let attr = scene.attr_mut(pad);
            attr.fill_color().set_clear();
            attr.line_color().set_clear();
            attr.set_line_width(0.0);
            scene.front_to_back(self.svg_g);
        }
    }

    /// Transfer the axis descriptors to the interactive-document state.
    pub fn prepare_html(&mut self) {
        let descr = |source: AxisRef, a: &Axis, val1: f64, val2: f64, as_cat: bool| {
            AxisDescriptor {
                source,
                is_cat: as_cat,
                number_format: if as_cat { NumberFormat::Fixed } else { a.number_format },
                number_sign: !as_cat && a.number_sign,
                logarithmic: !as_cat && a.log_scale,
                val1,
                val2,
            }
        };

        if self.axis_x.angle == 0 {
            let a = &self.axis_x;
            if a.category_axis {
                let n = if a.cat_coor_is_max { 0 } else { 1 };
                let (v1, v2) = if a.reverse { (a.max, a.min) } else { (a.min, a.max) };
                self.html.x_axis[n] = Some(descr(AxisRef::X, a, v1, v2, true));
            } else {
                let n = if a.orth_coor_is_max { 0 } else { 1 };
                let (v1, v2) = if a.reverse { (a.max, a.min) } else { (a.min, a.max) };
                self.html.x_axis[n] = Some(descr(AxisRef::X, a, v1, v2, false));
            }
            for (i, a) in self.axis_y.iter().enumerate() {
                if a.show {
                    let n = if a.orth_coor_is_max { 1 } else { 0 };
                    let (v1, v2) = if a.reverse { (a.min, a.max) } else { (a.max, a.min) };
                    self.html.y_axis[n] = Some(descr(AxisRef::Y(i), a, v1, v2, false));
                }
            }
        } else {
            let a = &self.axis_x;
            if a.category_axis {
                let n = if a.cat_coor_is_max { 1 } else { 0 };
                let (v1, v2) = if a.reverse { (a.min, a.max) } else { (a.max, a.min) };
                self.html.y_axis[n] = Some(descr(AxisRef::X, a, v1, v2, true));
            } else {
                let n = if a.orth_coor_is_max { 1 } else { 0 };
                let (v1, v2) = if a.reverse { (a.min, a.max) } else { (a.max, a.min) };
                self.html.y_axis[n] = Some(descr(AxisRef::X, a, v1, v2, false));
            }
            for (i, a) in self.axis_y.iter().enumerate() {
                if a.show {
                    let n = if a.orth_coor_is_max { 0 } else { 1 };
                    let (v1, v2) = if a.reverse { (a.max, a.min) } else { (a.min, a.max) };
                    self.html.x_axis[n] = Some(descr(AxisRef::Y(i), a, v1, v2, false));
                }
            }
            self.html.axis_swap = true;
        }
    }

    //--------------------------------------------------------------------
    // The build itself.

    /// Build the chart content (everything except annotations, the frame
    /// and the interactive-document transfer, which the ensemble runs).
    pub fn build_content(
        &mut self,
        scene: &mut Scene,
        source: &mut Source,
        env: &mut ChartEnv,
    ) -> Result<()> {
        if !self.frame_color.is_defined() {
            self.frame_color = env.foreground;
        }
        if !self.canvas_color.is_defined() {
            self.canvas_color = env.background;
        }
        if !self.axis_color.is_defined() {
            self.axis_color = env.foreground;
        }
        if !self.text_color.is_defined() {
            self.text_color = env.foreground;
        }
        for a in std::iter::once(&mut self.axis_x).chain(self.axis_y.iter_mut()) {
            if !a.grid_color.is_defined() {
                a.grid_color = env.foreground;
            }
        }

        let text_color = self.text_color;
        let chart_area_color = self.chart_area_color;
        {
            let attr = scene.attr_mut(self.svg_g);
            attr.text_color().set(&text_color);
            attr.line_color().set_clear();
        }
        let area_rect =
            scene.add(self.svg_g, Shape::rect(0.0, 0.0, self.chart_w, self.chart_h));
        scene.attr_mut(area_rect).fill_color().set(&chart_area_color);

        // The fixed layer order, back to front.
        let grid_minor_g = scene.add_group(self.svg_g);
        let grid_major_g = scene.add_group(self.svg_g);
        let grid_zero_g = scene.add_group(self.svg_g);
        let label_bg_g = scene.add_group(self.svg_g);
        let anno_lower_g = scene.add_group(self.svg_g);
        let below_axes_g = scene.add_group(self.svg_g);
        let axes_line_g = scene.add_group(self.svg_g);
        let above_axes_g = scene.add_group(self.svg_g);
        let axes_num_g = scene.add_group(self.svg_g);
        let axes_label_g = scene.add_group(self.svg_g);
        let tag_g = scene.add_group(self.svg_g);
        let anno_upper_g = scene.add_group(self.svg_g);
        let legend_g = scene.add_group(self.svg_g);
        self.anno_lower_g = anno_lower_g;
        self.anno_upper_g = anno_upper_g;

        let axis_color = self.axis_color;
        {
            let attr = scene.attr_mut(axes_line_g);
            attr.set_line_width(2.0);
            attr.set_line_cap(LineCap::Square);
            attr.line_color().set(&axis_color);
            attr.fill_color().set(&axis_color);
        }
        scene.attr_mut(below_axes_g).fill_color().set_clear();
        scene.attr_mut(above_axes_g).fill_color().set_clear();
        scene.attr_mut(axes_num_g).line_color().set_clear();

        // The tag group only holds numbers; optimize the baseline so they
        // center vertically.
        scene
            .attr_mut(tag_g)
            .text_font()
            .set_width_factor(1.0)
            .set_height_factor(0.80)
            .set_baseline_factor(0.30);

        let legend_size = self.legend.size;
        scene.attr_mut(legend_g).text_font().set_size(14.0 * legend_size);

        let mut lb_list: Vec<LegendBox> = Vec::new();

        self.series_prepare(source, env)?;
        self.axis_prepare(scene, source, tag_g)?;

        let mut avoid: Vec<BoundaryBox> = Vec::new();

        for phase in [0u32, 1] {
            let groups = AxisGroups {
                minor_g: grid_minor_g,
                major_g: grid_major_g,
                zero_g: grid_zero_g,
                line_g: axes_line_g,
                num_g: axes_num_g,
                unit_g: axes_label_g,
            };
            {
                let Self { axis_x, label_db, categories, cat_empty_stride, .. } = self;
                axis_x.build(
                    scene,
                    label_db,
                    categories,
                    *cat_empty_stride,
                    phase,
                    &mut avoid,
                    &groups,
                );
            }
            for i in [1usize, 0] {
                let Self { axis_y, label_db, categories, cat_empty_stride, .. } = self;
                axis_y[i].build(
                    scene,
                    label_db,
                    categories,
                    *cat_empty_stride,
                    phase,
                    &mut avoid,
                    &groups,
                );
            }
        }

        if self.chart_box {
            let frame =
                scene.add(axes_line_g, Shape::rect(0.0, 0.0, self.chart_w, self.chart_h));
            scene.attr_mut(frame).fill_color().set_clear();
        }

        {
            let Self { axis_x, axis_y, .. } = self;
            axis_x.build_label(scene, &mut avoid, axes_label_g);
            for a in axis_y.iter_mut() {
                a.build_label(scene, &mut avoid, axes_label_g);
            }
        }

        if self.title_inside {
            self.build_title(scene, &mut avoid);
        }

        self.calc_legend_boxes(scene, legend_g, &mut lb_list, &avoid);

        self.build_all_series(
            scene,
            source,
            env,
            below_axes_g,
            above_axes_g,
            tag_g,
            &mut lb_list,
        )?;

        self.place_legends(scene, env, &mut avoid, &lb_list, legend_g);

        if !self.title_inside {
            self.build_title(scene, &mut avoid);
        }

        // Background rectangles for the registered text labels.
        {
            let mut partial_ok = true;
            let bg = if self.chart_area_color.is_clear() {
                if self.frame_width >= 0.0 && !self.canvas_color.is_clear() {
                    self.canvas_color
                } else {
                    env.background
                }
            } else {
                partial_ok = false;
                self.chart_area_color
            };
            scene.attr_mut(label_bg_g).fill_color().set(&bg);
            let area = BoundaryBox::from_corners(
                Point::new(0.0, 0.0),
                Point::new(self.chart_w, self.chart_h),
            );
            self.label_db.add_background(scene, label_bg_g, &area, partial_ok);
        }

        Ok(())
    }
}
