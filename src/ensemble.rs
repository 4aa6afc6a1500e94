//! The top-level container: the scene, the chart grid, global titles,
//! footnotes, the global legend, and final document assembly.

use crate::chart::{Chart, ChartEnv};
use crate::error::{ChartwrightError, Result};
use crate::geom::{AnchorX, AnchorY, BoundaryBox, Pos};
use crate::grid::{Grid, GridElement};
use crate::legend::Legend;
use crate::scene::{NodeId, Scene, Shape};
use crate::source::{Position, Source};
use crate::value::NUM_HI;
use crate::visual::color::Color;

#[derive(Debug, Clone)]
pub struct Footnote {
    pub txt: String,
    pub pos: Pos,
}

/// What kind of document `build` produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Svg,
    Html,
}

pub struct Ensemble {
    pub scene: Scene,
    pub top_g: NodeId,

    pub enable_html: bool,
    pub title_html: String,

    pub width_adj: f64,
    pub height_adj: f64,
    pub baseline_adj: f64,

    pub foreground_color: Color,
    pub background_color: Color,
    pub border_color: Color,
    pub margin: f64,
    pub border_width: f64,
    pub border_radius: f64,
    pub padding: f64,
    pub grid_padding: f64,
    pub area_padding: f64,

    pub max_area_pad: f64,

    pub grid: Grid,
    pub charts: Vec<Chart>,

    pub title: String,
    pub sub_title: String,
    pub sub_sub_title: String,
    pub title_pos: Pos,
    pub title_line: bool,
    pub title_size: f64,

    pub legend: Legend,
    pub legend_box: bool,
    pub legend_box_specified: bool,
    pub legend_color: Color,

    pub footnotes: Vec<Footnote>,
    pub footnote_line: bool,
    pub footnote_size: f64,

    /// Saved positions of `@@` annotation streaks.
    pub annotation_anchors: Vec<Position>,
}

impl Default for Ensemble {
    fn default() -> Self {
        Self::new()
    }
}

impl Ensemble {
    pub fn new() -> Self {
        let mut scene = Scene::new();
        let top_g = scene.add_group(scene.root());
        Self {
            scene,
            top_g,
            enable_html: false,
            title_html: "Chart".to_string(),
            width_adj: 1.0,
            height_adj: 1.0,
            baseline_adj: 1.0,
            foreground_color: Color::black(),
            background_color: Color::white(),
            border_color: Color::black(),
            margin: 0.0,
            border_width: -1.0,
            border_radius: 0.0,
            padding: -1.0,
            grid_padding: 12.0,
            area_padding: 0.0,
            max_area_pad: 0.0,
            grid: Grid::new(),
            charts: Vec::new(),
            title: String::new(),
            sub_title: String::new(),
            sub_sub_title: String::new(),
            title_pos: Pos::Center,
            title_line: false,
            title_size: 1.0,
            legend: Legend::new(),
            legend_box: false,
            legend_box_specified: false,
            legend_color: Color::undef(),
            footnotes: Vec::new(),
            footnote_line: false,
            footnote_size: 1.0,
            annotation_anchors: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }

    pub fn last_chart(&mut self) -> &mut Chart {
        self.charts.last_mut().expect("a chart exists")
    }

    pub fn set_letter_spacing(&mut self, width_adj: f64, height_adj: f64, baseline_adj: f64) {
        self.width_adj = width_adj;
        self.height_adj = height_adj;
        self.baseline_adj = baseline_adj;
    }

    /// Open a new chart spanning the given grid rows/columns. Fails on a
    /// grid collision unless `collision_allowed` (chart-in-chart).
    #[allow(clippy::too_many_arguments)]
    pub fn new_chart(
        &mut self,
        grid_row1: u32,
        grid_col1: u32,
        grid_row2: u32,
        grid_col2: u32,
        pos1: Option<Pos>,
        pos2: Option<Pos>,
        collision_allowed: bool,
    ) -> bool {
        if !collision_allowed {
            for elem in &self.grid.element_list {
                if !(grid_col1 < elem.grid_x1 && grid_col2 < elem.grid_x1)
                    && !(grid_col1 > elem.grid_x2 && grid_col2 > elem.grid_x2)
                    && !(grid_row1 < elem.grid_y1 && grid_row2 < elem.grid_y1)
                    && !(grid_row1 > elem.grid_y2 && grid_row2 > elem.grid_y2)
                {
                    return false;
                }
            }
        }

        let chart = Chart::new(&mut self.scene, self.top_g);
        let mut elem = GridElement {
            chart: Some(self.charts.len()),
            // Y grid coordinates are reoriented to math direction by
            // init_grid; rows count top to bottom here.
            grid_x1: grid_col1,
            grid_y1: grid_row1,
            grid_x2: grid_col2,
            grid_y2: grid_row2,
            ..GridElement::default()
        };
        self.charts.push(chart);

        if pos1 == Some(Pos::Center) {
            match pos2 {
                Some(Pos::Bottom) | Some(Pos::Top) | Some(Pos::Auto) => {
                    elem.anchor_x_defined = true;
                }
                Some(Pos::Left) | Some(Pos::Right) => {
                    elem.anchor_y_defined = true;
                }
                None | Some(Pos::Center) => {
                    elem.anchor_x_defined = true;
                    elem.anchor_y_defined = true;
                }
                _ => {}
            }
        }
        if pos2 == Some(Pos::Center) {
            match pos1 {
                Some(Pos::Bottom) | Some(Pos::Top) => {
                    elem.anchor_x_defined = true;
                }
                Some(Pos::Left) | Some(Pos::Right) | Some(Pos::Auto) => {
                    elem.anchor_y_defined = true;
                }
                None | Some(Pos::Center) => {
                    elem.anchor_x_defined = true;
                    elem.anchor_y_defined = true;
                }
                _ => {}
            }
        }

        for pos in [pos1, pos2].into_iter().flatten() {
            match pos {
                Pos::Left => {
                    elem.anchor_x = AnchorX::Min;
                    elem.anchor_x_defined = true;
                }
                Pos::Right => {
                    elem.anchor_x = AnchorX::Max;
                    elem.anchor_x_defined = true;
                }
                Pos::Bottom => {
                    elem.anchor_y = AnchorY::Min;
                    elem.anchor_y_defined = true;
                }
                Pos::Top => {
                    elem.anchor_y = AnchorY::Max;
                    elem.anchor_y_defined = true;
                }
                _ => {}
            }
        }

        self.grid.element_list.push(elem);
        true
    }

    /// Place the shared legend outside the grid (Left/Right/Top/Bottom) or
    /// automatically.
    pub fn set_legend_pos(&mut self, pos: Pos) {
        // Shared-legend grid elements are identified by a missing chart.
        self.grid.element_list.retain(|e| e.chart.is_some());
        self.legend.pos1 = pos;
        self.legend.grid_coor_specified = false;
    }

    /// Reserve a grid cell span for the shared legend.
    #[allow(clippy::too_many_arguments)]
    pub fn set_legend_grid_pos(
        &mut self,
        grid_row1: u32,
        grid_col1: u32,
        grid_row2: u32,
        grid_col2: u32,
        pos1: Option<Pos>,
        pos2: Option<Pos>,
    ) -> bool {
        self.set_legend_pos(Pos::Auto);

        for elem in &self.grid.element_list {
            if !(grid_col1 < elem.grid_x1 && grid_col2 < elem.grid_x1)
                && !(grid_col1 > elem.grid_x2 && grid_col2 > elem.grid_x2)
                && !(grid_row1 < elem.grid_y1 && grid_row2 < elem.grid_y1)
                && !(grid_row1 > elem.grid_y2 && grid_row2 > elem.grid_y2)
            {
                return false;
            }
        }

        let mut elem = GridElement {
            chart: None,
            grid_x1: grid_col1,
            grid_y1: grid_row1,
            grid_x2: grid_col2,
            grid_y2: grid_row2,
            anchor_x_defined: true,
            anchor_y_defined: true,
            anchor_x: AnchorX::Mid,
            anchor_y: AnchorY::Mid,
            ..GridElement::default()
        };
        elem.full_bb.update_xy(0.0, 0.0);
        elem.area_bb.update_xy(0.0, 0.0);

        for pos in [pos1, pos2].into_iter().flatten() {
            match pos {
                Pos::Left => elem.anchor_x = AnchorX::Min,
                Pos::Right => elem.anchor_x = AnchorX::Max,
                Pos::Bottom => elem.anchor_y = AnchorY::Min,
                Pos::Top => elem.anchor_y = AnchorY::Max,
                _ => {}
            }
        }

        self.grid.element_list.push(elem);
        self.legend.grid_coor_specified = true;
        true
    }

    pub fn add_footnote(&mut self, txt: &str) {
        self.footnotes.push(Footnote { txt: txt.to_string(), pos: Pos::Left });
    }

    /// Applies to the most recently added footnote.
    pub fn set_footnote_pos(&mut self, pos: Pos) {
        if let Some(f) = self.footnotes.last_mut() {
            f.pos = pos;
        }
    }

    pub fn add_annotation_anchor(&mut self, source: &Source) {
        self.annotation_anchors.push(source.cur.clone());
    }

    //--------------------------------------------------------------------
    // Grid handling.

    fn init_grid(&mut self) {
        self.grid.init(self.grid_padding.max(0.0), self.area_padding);

        let max_y = self.grid.max_y;
        for elem in &mut self.grid.element_list {
            // Convert row locations (top-down) to math Y coordinates.
            std::mem::swap(&mut elem.grid_y1, &mut elem.grid_y2);
            elem.grid_y1 = max_y - elem.grid_y1;
            elem.grid_y2 = max_y - elem.grid_y2;

            if !elem.anchor_x_defined {
                if elem.grid_x1 == 0 && elem.grid_x2 < self.grid.max_x {
                    elem.anchor_x = AnchorX::Min;
                }
                if elem.grid_x1 > 0 && elem.grid_x2 == self.grid.max_x {
                    elem.anchor_x = AnchorX::Max;
                }
            }
            if !elem.anchor_y_defined {
                if elem.grid_y1 == 0 && elem.grid_y2 < max_y {
                    elem.anchor_y = AnchorY::Min;
                }
                if elem.grid_y1 > 0 && elem.grid_y2 == max_y {
                    elem.anchor_y = AnchorY::Max;
                }
                elem.anchor_y_defined = true;
            }

            if let Some(chart_idx) = elem.chart {
                let chart = &self.charts[chart_idx];
                elem.area_bb.reset();
                elem.area_bb.update_xy(0.0, 0.0);
                elem.area_bb.update_xy(chart.chart_w, chart.chart_h);
                let full_bb = self.scene.bbox(chart.svg_g);
                elem.full_bb =
                    if self.grid_padding < 0.0 { elem.area_bb } else { full_bb };
                if chart.area_padding_x > 0.0 || chart.area_padding_y > 0.0 {
                    elem.area_bb.min.x -= chart.area_padding_x;
                    elem.area_bb.max.x += chart.area_padding_x;
                    elem.area_bb.min.y -= chart.area_padding_y;
                    elem.area_bb.max.y += chart.area_padding_y;
                }
                if chart.full_padding_x >= 0.0 {
                    elem.area_bb.min.x =
                        elem.area_bb.min.x.min(full_bb.min.x - chart.full_padding_x);
                    elem.area_bb.max.x =
                        elem.area_bb.max.x.max(full_bb.max.x + chart.full_padding_x);
                }
                if chart.full_padding_y >= 0.0 {
                    elem.area_bb.min.y =
                        elem.area_bb.min.y.min(full_bb.min.y - chart.full_padding_y);
                    elem.area_bb.max.y =
                        elem.area_bb.max.y.max(full_bb.max.y + chart.full_padding_y);
                }
                elem.full_bb.update_box(&elem.area_bb);
            }
        }
    }

    fn move_charts(&mut self) {
        for elem in &self.grid.element_list {
            let Some(chart_idx) = elem.chart else { continue };
            let gx1 = self.grid.cell_list_x[elem.grid_x1 as usize].e1.coor;
            let gx2 = self.grid.cell_list_x[elem.grid_x2 as usize].e2.coor;
            let gy1 = self.grid.cell_list_y[elem.grid_y1 as usize].e1.coor;
            let gy2 = self.grid.cell_list_y[elem.grid_y2 as usize].e2.coor;

            let mut mx =
                (gx1 + gx2) / 2.0 - (elem.area_bb.min.x + elem.area_bb.max.x) / 2.0;
            let mut my =
                (gy1 + gy2) / 2.0 - (elem.area_bb.min.y + elem.area_bb.max.y) / 2.0;
            if elem.anchor_x == AnchorX::Min {
                mx = gx1 - elem.area_bb.min.x;
            }
            if elem.anchor_x == AnchorX::Max {
                mx = gx2 - elem.area_bb.max.x;
            }
            if elem.anchor_y == AnchorY::Min {
                my = gy1 - elem.area_bb.min.y;
            }
            if elem.anchor_y == AnchorY::Max {
                my = gy2 - elem.area_bb.max.y;
            }

            self.charts[chart_idx].move_by(&mut self.scene, mx, my);
        }
    }

    /// Bounding box of everything, extended to the chart areas plus the
    /// overhang pad.
    fn top_bb(&self) -> BoundaryBox {
        let mut bb = self.scene.bbox(self.top_g);
        for elem in &self.grid.element_list {
            let Some(chart_idx) = elem.chart else { continue };
            let chart = &self.charts[chart_idx];
            bb.update_xy(
                elem.area_bb.min.x + chart.g_dx - self.max_area_pad,
                elem.area_bb.min.y + chart.g_dy - self.max_area_pad,
            );
            bb.update_xy(
                elem.area_bb.max.x + chart.g_dx + self.max_area_pad,
                elem.area_bb.max.y + chart.g_dy + self.max_area_pad,
            );
        }
        bb
    }

    //--------------------------------------------------------------------
    // Global decorations.

    fn build_legends(&mut self) {
        if self.legend.cnt() == 0 {
            return;
        }

        let legend_g = self.scene.add_group(self.top_g);
        let legend_size = self.legend.size;
        self.scene.attr_mut(legend_g).text_font().set_size(14.0 * legend_size);

        let boxed = if self.legend_box_specified {
            self.legend_box
        } else {
            !self.legend.heading.is_empty()
        };

        let dims = self.legend.calc_dims(&mut self.scene, legend_g);

        let padding = 2.0 * self.grid_padding.max(self.area_padding);
        let in_grid_mx = (self.legend.margin_x(boxed) - padding).max(0.0);
        let in_grid_my = (self.legend.margin_y(boxed) - padding).max(0.0);

        let fg = self.foreground_color;
        let legend_fill = self.legend_color;

        let mut build_delta: Option<(Vec<(usize, BoundaryBox)>, f64, f64)> = None;

        if self.legend.grid_coor_specified {
            let elem_idx = self
                .grid
                .element_list
                .iter()
                .position(|e| e.chart.is_none())
                .expect("shared legend element exists");

            let avail = |grid: &Grid| {
                let e = &grid.element_list[elem_idx];
                let mut bb = BoundaryBox::new();
                bb.update_xy(
                    grid.cell_list_x[e.grid_x1 as usize].e1.coor,
                    grid.cell_list_y[e.grid_y1 as usize].e1.coor,
                );
                bb.update_xy(
                    grid.cell_list_x[e.grid_x2 as usize].e2.coor,
                    grid.cell_list_y[e.grid_y2 as usize].e2.coor,
                );
                bb
            };

            let mut avail_bb = avail(&self.grid);
            let (min_w, _) = self.legend.get_dims(&dims, boxed, 1);
            let (_, min_h) = self.legend.get_dims(&dims, boxed, self.legend.cnt());

            let no_space_x = avail_bb.width() < 1.0;
            let no_space_y = avail_bb.height() < 1.0;

            let mut nx = 1u32;
            if no_space_x && no_space_y {
                self.legend.get_best_fit(&dims, &mut nx, boxed, 1.0, 1.0, NUM_HI, NUM_HI);
            } else if no_space_x {
                self.legend.get_best_fit(
                    &dims,
                    &mut nx,
                    boxed,
                    0.0,
                    avail_bb.height() * 1.5,
                    min_w,
                    avail_bb.height(),
                );
            } else if no_space_y {
                self.legend.get_best_fit(
                    &dims,
                    &mut nx,
                    boxed,
                    avail_bb.width() * 1.5,
                    0.0,
                    avail_bb.width(),
                    min_h,
                );
            } else {
                self.legend.get_best_fit(
                    &dims,
                    &mut nx,
                    boxed,
                    avail_bb.width(),
                    avail_bb.height(),
                    0.0,
                    0.0,
                );
            }

            // Re-solve the grid with the legend extent as the element.
            {
                let (w, h) = self.legend.get_dims(&dims, boxed, nx);
                let e = &mut self.grid.element_list[elem_idx];
                e.full_bb.reset();
                e.full_bb.update_xy(0.0, 0.0);
                e.full_bb.update_xy(w + 2.0 * in_grid_mx, h + 2.0 * in_grid_my);
                e.area_bb = e.full_bb;
                self.grid.solve();
                avail_bb = avail(&self.grid);
            }

            let g = self.scene.add_group(legend_g);
            let entries =
                self.legend.build(&mut self.scene, boxed, &fg, &legend_fill, g, nx);
            let build_bb = self.scene.bbox(g);
            let e = &self.grid.element_list[elem_idx];
            let mut x = (avail_bb.min.x + avail_bb.max.x) / 2.0;
            let mut y = (avail_bb.min.y + avail_bb.max.y) / 2.0;
            if e.anchor_x == AnchorX::Min {
                x = avail_bb.min.x;
            }
            if e.anchor_x == AnchorX::Max {
                x = avail_bb.max.x;
            }
            if e.anchor_y == AnchorY::Min {
                y = avail_bb.min.y;
            }
            if e.anchor_y == AnchorY::Max {
                y = avail_bb.max.y;
            }
            let (ax, ay) = (e.anchor_x, e.anchor_y);
            self.scene.move_to(g, ax, ay, x, y);
            let moved_bb = self.scene.bbox(g);
            build_delta = Some((
                entries,
                moved_bb.min.x - build_bb.min.x,
                moved_bb.min.y - build_bb.min.y,
            ));
        }

        if build_delta.is_none() && self.legend.pos1 == Pos::Auto {
            let mut holes = self.grid.get_holes();
            let max_x = self.grid.max_x;
            let max_y = self.grid.max_y;
            holes.sort_by(|a, b| {
                let rank = |h: &crate::grid::Hole| {
                    let top = h.y2 == max_y;
                    let bot = h.y1 == 0;
                    let side = h.x1 == 0 || h.x2 == max_x;
                    let corner = side && (top || bot);
                    let rim = side || top || bot;
                    (rim, corner, bot, top)
                };
                let (a_rim, a_corner, a_bot, a_top) = rank(a);
                let (b_rim, b_corner, b_bot, b_top) = rank(b);
                b_rim
                    .cmp(&a_rim)
                    .then(b_corner.cmp(&a_corner))
                    .then(b_bot.cmp(&a_bot))
                    .then(b_top.cmp(&a_top))
                    .then(
                        (b.bb.width() * b.bb.height())
                            .partial_cmp(&(a.bb.width() * a.bb.height()))
                            .unwrap_or(std::cmp::Ordering::Equal),
                    )
            });

            for hole in &holes {
                let avail_w = hole.bb.width() - 2.0 * in_grid_mx;
                let avail_h = hole.bb.height() - 2.0 * in_grid_my;
                let mut nx = 1u32;
                let fits = avail_w > 0.0
                    && avail_h > 0.0
                    && self.legend.get_best_fit(&dims, &mut nx, boxed, avail_w, avail_h, 0.0, 0.0);
                if fits {
                    let g = self.scene.add_group(legend_g);
                    let entries =
                        self.legend.build(&mut self.scene, boxed, &fg, &legend_fill, g, nx);
                    let build_bb = self.scene.bbox(g);
                    self.scene.move_to(
                        g,
                        AnchorX::Mid,
                        AnchorY::Mid,
                        (hole.bb.min.x + hole.bb.max.x) / 2.0,
                        (hole.bb.min.y + hole.bb.max.y) / 2.0,
                    );
                    let moved_bb = self.scene.bbox(g);
                    build_delta = Some((
                        entries,
                        moved_bb.min.x - build_bb.min.x,
                        moved_bb.min.y - build_bb.min.y,
                    ));
                    break;
                }
            }
        }

        if build_delta.is_none() {
            let all_bb = self.scene.bbox(self.top_g);

            if matches!(self.legend.pos1, Pos::Left | Pos::Right) {
                let mx = self.legend.margin_x(boxed);
                let (x, anchor_x) = if self.legend.pos1 == Pos::Right {
                    (all_bb.max.x + mx, AnchorX::Min)
                } else {
                    (all_bb.min.x - mx, AnchorX::Max)
                };
                let mut nx = 1u32;
                self.legend.get_best_fit(&dims, &mut nx, boxed, 0.0, all_bb.height(), 0.0, 0.0);
                let g = self.scene.add_group(legend_g);
                let entries =
                    self.legend.build(&mut self.scene, boxed, &fg, &legend_fill, g, nx);
                let build_bb = self.scene.bbox(g);
                self.scene.move_to(g, anchor_x, AnchorY::Max, x, all_bb.max.y);
                let moved_bb = self.scene.bbox(g);
                build_delta = Some((
                    entries,
                    moved_bb.min.x - build_bb.min.x,
                    moved_bb.min.y - build_bb.min.y,
                ));
            } else {
                let my = self.legend.margin_y(boxed);
                let (y, anchor_y) = if self.legend.pos1 == Pos::Top {
                    (all_bb.max.y + my, AnchorY::Min)
                } else {
                    (all_bb.min.y - my, AnchorY::Max)
                };
                let mut nx = 1u32;
                self.legend.get_best_fit(&dims, &mut nx, boxed, all_bb.width(), 0.0, 0.0, 0.0);
                let g = self.scene.add_group(legend_g);
                let entries =
                    self.legend.build(&mut self.scene, boxed, &fg, &legend_fill, g, nx);
                let build_bb = self.scene.bbox(g);
                self.scene.move_to(
                    g,
                    AnchorX::Mid,
                    anchor_y,
                    (all_bb.min.x + all_bb.max.x) / 2.0,
                    y,
                );
                let moved_bb = self.scene.bbox(g);
                build_delta = Some((
                    entries,
                    moved_bb.min.x - build_bb.min.x,
                    moved_bb.min.y - build_bb.min.y,
                ));
            }
        }

        // Record the entry boxes for the interactive document.
        if self.enable_html {
            if let Some((entries, dx, dy)) = build_delta {
                for (item_idx, bb) in entries {
                    let mut bb = bb;
                    bb.translate(dx, dy);
                    for m in self.legend.items[item_idx].members.clone() {
                        self.charts[m.chart].series_list[m.series].html.legend_bb = Some(bb);
                    }
                }
            }
        }
    }

    fn build_title(&mut self) {
        let dx = 0.0;
        let dy = 16.0;
        let spacing = 4.0 * self.title_size;

        let bb = self.top_bb();
        let line_y = bb.max.y + dy / 2.0;

        let (x, a) = match self.title_pos {
            Pos::Left => (bb.min.x + dx, AnchorX::Min),
            Pos::Right => (bb.max.x - dx, AnchorX::Max),
            _ => ((bb.min.x + bb.max.x) / 2.0, AnchorX::Mid),
        };

        let mut y = bb.max.y + dy;
        if !self.sub_sub_title.is_empty() {
            let txt = self.sub_sub_title.clone();
            let obj =
                crate::label::create_label(&mut self.scene, self.top_g, &txt, 14.0 * self.title_size);
            self.scene.move_to(obj, a, AnchorY::Min, x, y);
            y += self.scene.bbox(obj).height() + spacing;
        }
        if !self.sub_title.is_empty() {
            let txt = self.sub_title.clone();
            let obj =
                crate::label::create_label(&mut self.scene, self.top_g, &txt, 20.0 * self.title_size);
            self.scene.move_to(obj, a, AnchorY::Min, x, y);
            y += self.scene.bbox(obj).height() + spacing;
        }
        if !self.title.is_empty() {
            let txt = self.title.clone();
            let obj =
                crate::label::create_label(&mut self.scene, self.top_g, &txt, 36.0 * self.title_size);
            self.scene.move_to(obj, a, AnchorY::Min, x, y);
        }

        if self.title_line {
            let bb = self.top_bb();
            let line = self
                .scene
                .add(self.top_g, Shape::line(bb.min.x + dx, line_y, bb.max.x - dx, line_y));
            let fg = self.foreground_color;
            let attr = self.scene.attr_mut(line);
            attr.line_color().set(&fg);
            attr.set_line_width(1.0);
        }
    }

    fn build_footnotes(&mut self) {
        let dx = 0.0;
        let mut dy = 16.0;
        let spacing = 2.0 * self.footnote_size;

        let bb = self.top_bb();

        if self.footnote_line {
            dy /= 2.0;
            let line = self.scene.add(
                self.top_g,
                Shape::line(bb.min.x + dx, bb.min.y - dy, bb.max.x - dx, bb.min.y - dy),
            );
            let fg = self.foreground_color;
            let attr = self.scene.attr_mut(line);
            attr.line_color().set(&fg);
            attr.set_line_width(1.0);
        }

        let footnotes = self.footnotes.clone();
        for footnote in &footnotes {
            if footnote.txt.is_empty() {
                continue;
            }
            let bb = self.scene.bbox(self.top_g);
            let (x, a) = match footnote.pos {
                Pos::Center => ((bb.min.x + bb.max.x) / 2.0, AnchorX::Mid),
                Pos::Right => (bb.max.x - dx, AnchorX::Max),
                _ => (bb.min.x + dx, AnchorX::Min),
            };
            let y = bb.min.y - dy;
            let obj = crate::label::create_label(
                &mut self.scene,
                self.top_g,
                &footnote.txt,
                14.0 * self.footnote_size,
            );
            let fg = self.foreground_color;
            self.scene.attr_mut(obj).text_color().set(&fg);
            self.scene.move_to(obj, a, AnchorY::Max, x, y);
            dy = spacing;
        }
    }

    fn build_background(&mut self) {
        let top_bb = self.top_bb();

        let mut draw_bg = true;
        for elem in &self.grid.element_list {
            if let Some(chart_idx) = elem.chart {
                let chart = &self.charts[chart_idx];
                if chart.frame_width >= 0.0 {
                    let bb = self.scene.bbox(chart.svg_g);
                    if bb.min == top_bb.min && bb.max == top_bb.max {
                        draw_bg = false;
                        break;
                    }
                }
            }
        }

        if self.padding >= 0.0 || self.border_width >= 0.0 {
            draw_bg = true;
        }
        if self.border_width < 0.0 {
            self.border_width = 0.0;
        }
        if self.padding < 0.0 {
            self.padding = 8.0;
        }
        if !draw_bg {
            self.border_width = 0.0;
            self.padding = 0.0;
        }

        {
            let mut bb = top_bb;
            let delta = self.padding + self.border_width + self.margin;
            bb = bb.expanded(delta, delta);

            if self.enable_html {
                for elem in &self.grid.element_list {
                    if let Some(chart_idx) = elem.chart {
                        let chart = &self.charts[chart_idx];
                        bb.update_xy(
                            elem.area_bb.min.x + chart.g_dx,
                            elem.area_bb.min.y + chart.g_dy,
                        );
                        bb.update_xy(
                            elem.area_bb.max.x + chart.g_dx,
                            elem.area_bb.max.y + chart.g_dy,
                        );
                    }
                }
            }

            let spacer =
                self.scene.add(self.top_g, Shape::rect(bb.min.x, bb.min.y, bb.max.x, bb.max.y));
            let attr = self.scene.attr_mut(spacer);
            attr.fill_color().set_clear();
            attr.line_color().set_clear();
            attr.set_line_width(0.0);
            self.scene.front_to_back(self.top_g);
        }

        if draw_bg {
            let d = self.padding + self.border_width / 2.0;
            let bb = top_bb.expanded(d, d);
            let rect = self.scene.add(
                self.top_g,
                Shape::rounded_rect(bb.min.x, bb.min.y, bb.max.x, bb.max.y, self.border_radius),
            );
            let border_color = self.border_color;
            let attr = self.scene.attr_mut(rect);
            attr.set_line_width(self.border_width);
            if self.border_width > 0.0 {
                attr.line_color().set(&border_color);
            } else {
                attr.line_color().set_clear();
            }
            self.scene.front_to_back(self.top_g);
        }
    }

    //--------------------------------------------------------------------
    // Document assembly.

    /// Build every chart, solve the grid, place the global decorations and
    /// produce the final document.
    pub fn build(&mut self, source: &mut Source) -> Result<String> {
        if self.is_empty() && !self.new_chart(0, 0, 0, 0, None, None, false) {
            return Err(ChartwrightError::Internal("empty ensemble rejected".into()));
        }

        {
            let fg = self.foreground_color;
            let bg = self.background_color;
            let attr = self.scene.attr_mut(self.top_g);
            attr.text_font()
                .set_family("monospace")
                .set_width_factor(self.width_adj)
                .set_height_factor(self.height_adj)
                .set_baseline_factor(self.baseline_adj);
            attr.text_color().set(&fg);
            attr.line_color().set(&fg);
            attr.fill_color().set(&bg);
        }

        let fg = self.foreground_color;
        let bg = self.background_color;
        let enable_html = self.enable_html;
        let mut max_area_pad = 0.0f64;
        {
            let Self { charts, scene, legend, .. } = self;
            for chart_idx in 0..charts.len() {
                let mut env = ChartEnv {
                    foreground: fg,
                    background: bg,
                    enable_html,
                    global_legend: legend,
                    chart_idx,
                };
                charts[chart_idx].build_content(scene, source, &mut env)?;
                crate::annotate::run_chart_annotations(scene, source, &mut charts[chart_idx])?;
                charts[chart_idx].build_frame(scene);
                if enable_html {
                    charts[chart_idx].prepare_html();
                }
                max_area_pad = max_area_pad.max(charts[chart_idx].get_area_overhang());
            }
        }
        self.max_area_pad = max_area_pad;

        if self.legend.cnt() == 0 {
            self.set_legend_pos(Pos::Auto);
        }

        self.init_grid();
        self.grid.solve();

        if self.legend.grid_coor_specified {
            self.build_legends();
            self.move_charts();
        } else {
            self.move_charts();
            self.build_legends();
        }

        self.build_title();
        self.build_footnotes();

        crate::annotate::run_global_annotations(self, source)?;

        self.build_background();

        if self.enable_html {
            Ok(crate::html::gen_html(self))
        } else {
            Ok(crate::render::svg::render(&self.scene, 0.0, None))
        }
    }
}
