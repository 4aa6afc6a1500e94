//! The series model: type, style, marker derivation, data anchors, and
//! per-series min/max with stack arithmetic. The draw routines live in
//! [`build`]; pruning, clipping and marker geometry in their own modules.

pub mod build;
pub mod clip;
pub mod marker;
pub mod prune;

use crate::axis::Axis;
use crate::error::Result;
use crate::geom::{BoundaryBox, Pos};
use crate::html::SeriesHtml;
use crate::scene::attr::LineJoin;
use crate::scene::{NodeId, Scene};
use crate::source::{Position, Source};
use crate::value::{NUM_HI, NUM_INVALID, NUM_SKIP};
use crate::visual::color::Color;
use marker::{compute_dims, MarkerDims, MarkerShape};

/// The ten series types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesType {
    XY,
    Scatter,
    Line,
    Point,
    Lollipop,
    Bar,
    StackedBar,
    LayeredBar,
    Area,
    StackedArea,
}

impl SeriesType {
    pub fn parse(id: &str) -> Option<Self> {
        Some(match id {
            "XY" => Self::XY,
            "Scatter" => Self::Scatter,
            "Line" => Self::Line,
            "Point" => Self::Point,
            "Lollipop" => Self::Lollipop,
            "Bar" => Self::Bar,
            "StackedBar" => Self::StackedBar,
            "LayeredBar" => Self::LayeredBar,
            "Area" => Self::Area,
            "StackedArea" => Self::StackedArea,
            _ => return None,
        })
    }

    /// All types except XY and Scatter index a category X-axis.
    pub fn is_cat(&self) -> bool {
        !matches!(self, Self::XY | Self::Scatter)
    }

    pub fn is_bar_family(&self) -> bool {
        matches!(self, Self::Bar | Self::StackedBar | Self::LayeredBar)
    }

    pub fn is_area_family(&self) -> bool {
        matches!(self, Self::Area | Self::StackedArea)
    }

    /// Bar and area families draw filled geometry from a base value.
    pub fn is_fillable(&self) -> bool {
        self.is_bar_family() || self.is_area_family()
    }

    /// Types whose Y-extent always includes the base value.
    pub fn has_base(&self) -> bool {
        self.is_fillable() || matches!(self, Self::Lollipop)
    }

    /// Types whose running stack offsets feed the min/max computation.
    pub fn is_stackable(&self) -> bool {
        matches!(self, Self::Bar | Self::StackedBar | Self::StackedArea)
    }
}

/// The default palette; the style number selects from it modulo 10.
const PALETTE: [&str; 10] = [
    "royalblue",
    "tomato",
    "darkseagreen",
    "darkturquoise",
    "darkmagenta",
    "deepskyblue",
    "orange",
    "brown",
    "chartreuse",
    "slategrey",
];

pub fn palette_color(style: usize) -> Color {
    Color::parse(PALETTE[style % PALETTE.len()]).expect("palette names are valid")
}

/// One data series of a chart.
pub struct Series {
    pub id: u32,
    pub series_type: SeriesType,
    pub is_cat: bool,
    pub name: String,
    pub staircase: bool,
    pub snap_enable: bool,
    pub global_legend: bool,
    pub legend_outline: bool,
    pub axis_y_n: usize,
    pub base: f64,

    pub line_color: Color,
    pub line_width: f64,
    pub line_dash: f64,
    pub line_hole: f64,
    pub fill_color: Color,

    pub marker_size: f64,
    pub marker_shape: MarkerShape,

    pub tag_enable: bool,
    pub tag_pos: Pos,
    pub tag_size: f64,
    pub tag_box: bool,
    pub tag_text_color: Color,
    pub tag_fill_color: Color,
    pub tag_line_color: Color,
    pub tag_dist_x: f64,
    pub tag_dist_y: f64,

    pub prune_dist: f64,

    // Data anchor into the source.
    pub datum_defined: bool,
    pub datum_pos: Position,
    pub datum_num: usize,
    pub datum_cat_ofs: usize,
    pub datum_no_x: bool,
    pub datum_y_idx: u32,

    // Derived visual properties.
    pub marker_show: bool,
    pub marker_show_out: bool,
    pub marker_show_int: bool,
    pub marker_int: MarkerDims,
    pub marker_out: MarkerDims,
    pub has_line: bool,
    pub has_fill: bool,
    pub line_color_shown: bool,
    pub fill_color_shown: bool,

    /// +1 stacks above base, -1 below, 0 undecided (StackedArea only).
    pub stack_dir: i32,
    pub bar_layer_num: u32,
    pub bar_layer_tot: u32,

    /// The plot rectangle, set during chart preparation.
    pub chart_area: BoundaryBox,

    // Data min/max in value space.
    pub def_x: bool,
    pub min_x: f64,
    pub max_x: f64,
    pub def_y: bool,
    pub min_y: f64,
    pub max_y: f64,
    pub min_y_is_base: bool,
    pub max_y_is_base: bool,

    /// First/last category index with a valid Y-value.
    pub idx_of_fst_valid: usize,
    pub idx_of_lst_valid: usize,
    pub idx_of_valid_defined: bool,

    pub max_tag_x_size: usize,
    pub max_tag_y_size: usize,

    pub html: SeriesHtml,
}

impl Series {
    pub fn new(series_type: SeriesType) -> Self {
        let mut series = Self {
            id: 0,
            series_type,
            is_cat: series_type.is_cat(),
            name: String::new(),
            staircase: false,
            snap_enable: true,
            global_legend: false,
            legend_outline: false,
            axis_y_n: 0,
            base: 0.0,
            line_color: Color::black(),
            line_width: 0.0,
            line_dash: 0.0,
            line_hole: 0.0,
            fill_color: Color::clear(),
            marker_size: 0.0,
            marker_shape: MarkerShape::Circle,
            tag_enable: false,
            tag_pos: Pos::Auto,
            tag_size: 1.0,
            tag_box: false,
            tag_text_color: Color::undef(),
            tag_fill_color: Color::undef(),
            tag_line_color: Color::undef(),
            tag_dist_x: 0.0,
            tag_dist_y: 0.0,
            prune_dist: 0.0,
            datum_defined: false,
            datum_pos: Position::default(),
            datum_num: 0,
            datum_cat_ofs: 0,
            datum_no_x: false,
            datum_y_idx: 0,
            marker_show: false,
            marker_show_out: false,
            marker_show_int: false,
            marker_int: MarkerDims::default(),
            marker_out: MarkerDims::default(),
            has_line: false,
            has_fill: false,
            line_color_shown: false,
            fill_color_shown: false,
            stack_dir: 0,
            bar_layer_num: 0,
            bar_layer_tot: 1,
            chart_area: BoundaryBox::new(),
            def_x: false,
            min_x: 0.0,
            max_x: 0.0,
            def_y: false,
            min_y: 0.0,
            max_y: 0.0,
            min_y_is_base: false,
            max_y_is_base: false,
            idx_of_fst_valid: 0,
            idx_of_lst_valid: 0,
            idx_of_valid_defined: false,
            max_tag_x_size: 0,
            max_tag_y_size: 0,
            html: SeriesHtml::default(),
        };
        series.set_line_width(if series_type.is_area_family() { 0.0 } else { 1.0 });
        series
    }

    pub fn set_line_width(&mut self, width: f64) {
        self.line_width = width.max(0.0);
    }

    pub fn set_line_dash(&mut self, dash: f64, hole: f64) {
        self.line_dash = dash;
        self.line_hole = hole;
        if self.line_hole == 0.0 {
            self.line_dash = 0.0;
        }
        if self.line_dash == 0.0 {
            self.line_hole = 0.0;
        }
    }

    pub fn set_marker_size(&mut self, size: f64) {
        self.marker_size = size.max(0.0);
    }

    pub fn set_prune_dist(&mut self, dist: f64) {
        self.prune_dist = dist;
    }

    /// Derive the fill color from the line color the way auto styling does.
    pub fn set_default_fill_color(&mut self) {
        self.fill_color = self.line_color;
        if self.series_type.is_fillable() {
            if self.series_type.is_area_family() {
                self.fill_color.lighten(0.2).set_transparency(0.5);
            } else {
                self.fill_color.lighten(0.5).set_transparency(0.2);
            }
        } else {
            self.fill_color.lighten(0.5);
        }
    }

    /// Apply a style number 0..79: palette color modulo 10, line
    /// width/dash preset by the tens digit.
    pub fn set_style(&mut self, style: i64) {
        let style = style.rem_euclid(80) as usize;
        self.line_color = palette_color(style % PALETTE.len());
        self.set_default_fill_color();
        let preset = (style / PALETTE.len()) % 8;
        if self.series_type.is_fillable() {
            self.set_line_width(1.0);
            self.set_line_dash(0.0, 0.0);
        } else {
            let (width, dash, hole) = match preset {
                0 => (4.0, 0.0, 0.0),
                1 => (4.0, 4.0, 2.0),
                2 => (4.0, 8.0, 2.0),
                3 => (4.0, 16.0, 2.0),
                4 => (2.0, 0.0, 0.0),
                5 => (2.0, 4.0, 2.0),
                6 => (2.0, 8.0, 2.0),
                _ => (2.0, 16.0, 2.0),
            };
            self.set_line_width(width);
            self.set_line_dash(dash, hole);
        }
        self.set_marker_size(
            if matches!(
                self.series_type,
                SeriesType::Scatter | SeriesType::Point | SeriesType::Lollipop
            ) {
                12.0
            } else {
                0.0
            },
        );
    }

    /// Anchor the series data at the current source position. `no_x` marks
    /// rows without an X-value; `y_idx` selects the Y-column.
    pub fn set_datum_anchor(
        &mut self,
        source: &Source,
        num: usize,
        cat_ofs: usize,
        no_x: bool,
        y_idx: u32,
    ) {
        self.datum_defined = true;
        self.datum_pos = source.cur.clone();
        self.datum_num = num;
        self.datum_cat_ofs = cat_ofs;
        self.datum_no_x = no_x;
        self.datum_y_idx = y_idx;
    }

    /// Position the source at the first data row.
    pub fn datum_begin(&self, source: &mut Source) -> Result<()> {
        source.goto_pos(&self.datum_pos)
    }

    /// Advance the source to the next data row.
    pub fn datum_next(&self, source: &mut Source) -> Result<()> {
        source.next_line()?;
        source.skip_ws(true)
    }

    /// Convert a datum token to its value, honoring the `!`/`-` sentinels.
    pub fn datum_to_double(source: &Source, sv: &str) -> Result<f64> {
        if sv.is_empty() || sv == "-" {
            return Ok(NUM_SKIP);
        }
        if sv == "!" {
            return Ok(NUM_INVALID);
        }
        match sv.parse::<f64>() {
            Ok(d) if d.is_finite() && d.abs() <= NUM_HI => Ok(d),
            Ok(_) => Err(source.parse_err("number too big", true)),
            Err(_) => Err(source.parse_err("invalid number", true)),
        }
    }

    //--------------------------------------------------------------------
    // Style application to scene groups.

    pub fn apply_fill_style(&self, scene: &mut Scene, obj: NodeId) {
        let attr = scene.attr_mut(obj);
        attr.line_color().set_clear();
        attr.fill_color().set(&self.fill_color);
    }

    pub fn apply_line_style(&self, scene: &mut Scene, obj: NodeId) {
        let attr = scene.attr_mut(obj);
        attr.set_line_width(self.line_width);
        if self.line_width > 0.0 {
            if self.line_dash > 0.0 {
                attr.set_line_dash(self.line_dash, self.line_hole);
            }
            if self.marker_show {
                attr.set_line_join(LineJoin::Round);
            }
            attr.line_color().set(&self.line_color);
        } else {
            attr.line_color().set_clear();
        }
        attr.fill_color().set_clear();
    }

    pub fn apply_mark_style(&self, scene: &mut Scene, obj: NodeId) {
        if self.marker_shape.is_line_style() {
            self.apply_line_style(scene, obj);
            scene.attr_mut(obj).set_solid();
            return;
        }
        let solid = !matches!(self.series_type, SeriesType::Scatter | SeriesType::Point);
        let attr = scene.attr_mut(obj);
        attr.line_color().set_clear();
        if self.line_width > 0.0 {
            attr.fill_color().set(&self.line_color);
            if solid {
                attr.fill_color().set_opacity(1.0);
            }
        } else {
            attr.fill_color().set_clear();
        }
    }

    pub fn apply_hole_style(&self, scene: &mut Scene, obj: NodeId) {
        let solid = !matches!(self.series_type, SeriesType::Scatter | SeriesType::Point);
        let attr = scene.attr_mut(obj);
        attr.line_color().set_clear();
        attr.fill_color().set(&self.fill_color);
        if solid {
            attr.fill_color().set_opacity(1.0);
        }
    }

    pub fn apply_tag_style(&self, scene: &mut Scene, obj: NodeId) {
        let attr = scene.attr_mut(obj);
        attr.line_color().set(&self.tag_line_color);
        attr.fill_color().set(&self.tag_fill_color);
        attr.text_color().set(&self.tag_text_color);
        attr.set_line_width(1.0);
        attr.text_font().set_size(12.0 * self.tag_size).set_bold();
    }

    //--------------------------------------------------------------------
    // Derived visual properties.

    /// Compute the derived marker and line/fill visibility state.
    pub fn determine_visual_properties(&mut self, x_horizontal: bool) {
        self.marker_show = false;
        self.marker_show_out = false;
        self.marker_show_int = false;
        self.has_line = false;
        self.has_fill = false;
        self.line_color_shown = false;
        self.fill_color_shown = false;

        if !matches!(self.series_type, SeriesType::Scatter | SeriesType::Point) {
            self.has_line = self.line_width > 0.0 && !self.line_color.is_clear();
            self.line_color_shown = self.has_line;
        }

        if self.series_type.is_fillable() {
            self.has_fill = !self.fill_color.is_clear();
            self.fill_color_shown = self.has_fill;
        }

        // Minimal tag distance from the center of a data point.
        self.tag_dist_x = if self.has_line { self.line_width / 2.0 } else { 0.0 };
        self.tag_dist_y = self.tag_dist_x;

        if self.series_type.is_bar_family() {
            return;
        }

        let mut radius = self.marker_size / 2.0;
        let mut lw = self.line_width;

        if radius > 0.0 {
            self.marker_show_out = !self.line_color.is_clear() && self.line_width > 0.0;
            self.marker_show_int = !self.fill_color.is_clear();
            if self.marker_shape.is_line_style() {
                self.marker_show_int = false;
            } else if 2.0 * radius < 3.0 * self.line_width {
                if self.has_line && 2.0 * radius < self.line_width {
                    lw = self.line_width / 2.0 - radius;
                    radius = self.line_width / 2.0;
                    self.marker_show_out = self.marker_show_out && lw > 0.0;
                } else {
                    self.marker_show_int = self.marker_show_int && !self.marker_show_out;
                }
            }
        }
        self.marker_show = self.marker_show_out || self.marker_show_int;
        if !self.marker_show_out || !self.marker_show_int {
            lw = 0.0;
        }

        if self.marker_show_int {
            self.fill_color_shown = true;
        }
        if self.marker_show_out {
            self.line_color_shown = true;
        }

        self.marker_int = compute_dims(self.marker_shape, radius, -lw, x_horizontal);
        self.marker_out = compute_dims(self.marker_shape, radius, 0.0, x_horizontal);

        if self.marker_show {
            self.tag_dist_x = self.tag_dist_x.max(self.marker_out.width() / 2.0);
            self.tag_dist_y = self.tag_dist_y.max(self.marker_out.height() / 2.0);
        }
    }

    //--------------------------------------------------------------------
    // Data scans.

    /// Determine whether a StackedArea series stacks above or below the
    /// base: the sign of its first non-zero valid sample.
    pub fn compute_stack_dir(&mut self, source: &mut Source, axis_y: &Axis) -> Result<()> {
        self.stack_dir = 0;
        if self.series_type != SeriesType::StackedArea || !self.datum_defined {
            return Ok(());
        }
        self.datum_begin(source)?;
        for i in 0..self.datum_num {
            if i > 0 {
                self.datum_next(source)?;
            }
            let (_, svy) = source.get_datum(self.datum_no_x, self.datum_y_idx)?;
            let y = Self::datum_to_double(source, &svy)?;
            if !axis_y.valid(y) {
                continue;
            }
            let y = y - self.base;
            if y < 0.0 {
                self.stack_dir = -1;
                return Ok(());
            }
            if y > 0.0 {
                self.stack_dir = 1;
                return Ok(());
            }
        }
        Ok(())
    }

    /// Determine the series min/max, accumulating the per-category stack
    /// offsets for stackable types.
    pub fn determine_min_max(
        &mut self,
        source: &mut Source,
        axis_x: &Axis,
        axis_y: &Axis,
        ofs_pos: &mut [f64],
        ofs_neg: &mut [f64],
    ) -> Result<()> {
        let stackable = self.series_type.is_stackable();
        let has_base = self.series_type.has_base();

        self.def_x = false;
        self.min_x = if axis_x.log_scale { 10.0 } else { 0.0 };
        self.max_x = self.min_x;

        self.def_y = false;
        self.min_y = if axis_y.log_scale { 10.0 } else { 0.0 };
        self.max_y = self.min_y;
        self.min_y_is_base = false;
        self.max_y_is_base = false;

        self.idx_of_valid_defined = false;
        self.max_tag_x_size = 0;
        self.max_tag_y_size = 0;

        if self.datum_defined && self.datum_num > 0 {
            self.datum_begin(source)?;
            for i in 0..self.datum_num {
                if i > 0 {
                    self.datum_next(source)?;
                }
                let (svx, svy) = source.get_datum(self.datum_no_x, self.datum_y_idx)?;
                let mut y = Self::datum_to_double(source, &svy)?;
                if !axis_y.valid(y) {
                    continue;
                }
                let x;
                if self.is_cat {
                    x = (self.datum_cat_ofs + i) as f64;
                    if !self.idx_of_valid_defined {
                        self.idx_of_fst_valid = self.datum_cat_ofs + i;
                    }
                    self.idx_of_lst_valid = self.datum_cat_ofs + i;
                    self.idx_of_valid_defined = true;
                } else {
                    x = Self::datum_to_double(source, &svx)?;
                    if !axis_x.valid(x) {
                        continue;
                    }
                }
                if stackable {
                    let cat_idx = x as usize;
                    y -= self.base;
                    if self.stack_dir < 0 || (self.stack_dir == 0 && y < 0.0) {
                        y += ofs_neg[cat_idx];
                        ofs_neg[cat_idx] = y;
                    } else {
                        y += ofs_pos[cat_idx];
                        ofs_pos[cat_idx] = y;
                    }
                    if !axis_y.valid(y) {
                        continue;
                    }
                }
                self.max_tag_x_size = self.max_tag_x_size.max(svx.chars().count());
                self.max_tag_y_size = self.max_tag_y_size.max(svy.chars().count());
                if !self.def_x || self.min_x > x {
                    self.min_x = x;
                }
                if !self.def_x || self.max_x < x {
                    self.max_x = x;
                }
                if !self.def_y || self.min_y > y {
                    self.min_y = y;
                }
                if !self.def_y || self.max_y < y {
                    self.max_y = y;
                }
                self.def_x = true;
                self.def_y = true;
            }
        }

        if has_base {
            let y = self.base;
            if axis_y.valid(y) {
                if !self.def_y || self.min_y > y {
                    self.min_y = y;
                    self.min_y_is_base = true;
                }
                if !self.def_y || self.max_y < y {
                    self.max_y = y;
                    self.max_y_is_base = true;
                }
                self.def_y = true;
            }
        }

        Ok(())
    }
}
