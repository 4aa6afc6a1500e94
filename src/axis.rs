//! Axes: scaling, auto-ranging, tick legalization, number formatting, and
//! the collision-aware emission of ticks, grid lines, numbers, labels and
//! units.
//!
//! An axis maps values to coordinates along its length. Ranges may come
//! from the user or from the data; legalization widens them to tick
//! multiples, borrows positive minima for log scales, and optionally makes
//! room for bar tags. Number labels are placed at ticks and dropped (never
//! shifted) when they would collide with the orthogonal axis keep-out zone
//! or with each other; tick emission walks coarsest-first so the survivors
//! of a crowded axis are the round numbers.

use crate::geom::{AnchorX, AnchorY, BoundaryBox, Dir, Point, Pos};
use crate::label::LabelRegistry;
use crate::scene::{move_objs, NodeId, Scene, Shape};
use crate::series::Series;
use crate::tag::{get_beyond, TagSpec};
use crate::value::{coor_near, COOR_HI, EPSILON, NUM_HI, NUM_LO, NUM_SKIP};
use crate::visual::color::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberFormat {
    #[default]
    Auto,
    None,
    Fixed,
    Scientific,
    Magnitude,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisStyle {
    #[default]
    Auto,
    None,
    Line,
    Arrow,
    Edge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridStyle {
    #[default]
    Auto,
    Dash,
    Solid,
}

/// Maximum number of decimals to show.
const PRECISION: i32 = 10;

/// NumberFormat::Fixed lower limit.
fn lim() -> f64 {
    10f64.powi(-PRECISION) * 0.65
}

pub const ARROW_LENGTH: f64 = 10.0;
pub const ARROW_WIDTH: f64 = 10.0;
pub const OVERHANG: f64 = 3.0 * ARROW_LENGTH;
pub const TICK_MAJOR_LEN: f64 = 8.0;
pub const TICK_MINOR_LEN: f64 = 4.0;
const NUM_SPACE_X: f64 = 4.0;
const NUM_SPACE_Y: f64 = 4.0;

/// The scene groups one axis draws into.
pub struct AxisGroups {
    pub minor_g: NodeId,
    pub major_g: NodeId,
    pub zero_g: NodeId,
    pub line_g: NodeId,
    pub num_g: NodeId,
    pub unit_g: NodeId,
}

pub struct Axis {
    pub is_x_axis: bool,
    /// 0 for horizontal, 90 for vertical.
    pub angle: i32,
    pub show: bool,
    pub category_axis: bool,
    pub reverse: bool,
    /// This axis is one of a dual Y-axis pair.
    pub y_dual: bool,
    /// The orthogonal axis is dual (implies this is the X-axis).
    pub orth_dual: bool,
    pub length: f64,
    pub chart_box: bool,
    pub style: AxisStyle,
    pub pos: Pos,
    pub pos_base_axis_y_n: usize,
    pub grid_color: Color,
    pub grid_style: GridStyle,

    pub log_scale: bool,
    pub number_format: NumberFormat,
    pub number_sign: bool,
    pub number_unit: String,
    pub show_minor_numbers: bool,
    pub show_minor_numbers_auto: bool,
    pub number_size: f64,

    // Min/max of the associated series data.
    pub data_def: bool,
    pub data_min: f64,
    pub data_max: f64,
    pub data_min_is_base: bool,
    pub data_max_is_base: bool,

    pub min: f64,
    pub max: f64,
    pub orth_axis_cross: f64,
    pub orth_axis_cross_is_base: bool,
    pub major: f64,
    pub sub_divs: i32,
    pub number_pos: Pos,
    pub major_grid_enable: bool,
    pub minor_grid_enable: bool,
    pub grid_set: bool,

    pub unit: String,
    pub unit_pos: Pos,

    pub label: String,
    pub sub_label: String,
    pub label_size: f64,

    pub orth_length: f64,
    pub orth_style: [AxisStyle; 2],
    /// Coordinates where the orthogonal axes cross this axis.
    pub orth_axis_coor: [f64; 2],
    pub orth_reverse: [bool; 2],

    /// Coordinate where this axis crosses the orthogonal axis.
    pub orth_coor: f64,
    pub orth_coor_is_min: bool,
    pub orth_coor_is_max: bool,

    /// The category "number" line coordinate, always at one of the sides.
    pub cat_coor: f64,
    pub cat_coor_is_min: bool,
    pub cat_coor_is_max: bool,

    pub cat_start: usize,
    pub cat_stride: usize,

    // Number formatting state collected by compute_num_format.
    digits: i32,
    decimals: i32,
    num_max_len: i32,
    exp_max_len: i32,

    // Measured character cell of the number font.
    num_char_w: f64,
    num_char_h: f64,
}

impl Axis {
    pub fn new(is_x_axis: bool) -> Self {
        Self {
            is_x_axis,
            angle: if is_x_axis { 0 } else { 90 },
            show: false,
            category_axis: false,
            reverse: false,
            y_dual: false,
            orth_dual: false,
            length: 0.0,
            chart_box: false,
            style: AxisStyle::Auto,
            pos: Pos::Auto,
            pos_base_axis_y_n: 0,
            grid_color: Color::undef(),
            grid_style: GridStyle::Auto,
            log_scale: false,
            number_format: NumberFormat::Auto,
            number_sign: false,
            number_unit: String::new(),
            show_minor_numbers: false,
            show_minor_numbers_auto: true,
            number_size: 1.0,
            data_def: false,
            data_min: 0.0,
            data_max: 0.0,
            data_min_is_base: false,
            data_max_is_base: false,
            min: 0.0,
            max: 0.0,
            orth_axis_cross: 0.0,
            orth_axis_cross_is_base: false,
            major: 0.0,
            sub_divs: 0,
            number_pos: Pos::Auto,
            major_grid_enable: true,
            minor_grid_enable: true,
            grid_set: false,
            unit: String::new(),
            unit_pos: Pos::Auto,
            label: String::new(),
            sub_label: String::new(),
            label_size: 1.0,
            orth_length: 0.0,
            orth_style: [AxisStyle::Auto; 2],
            orth_axis_coor: [0.0; 2],
            orth_reverse: [false; 2],
            orth_coor: 0.0,
            orth_coor_is_min: false,
            orth_coor_is_max: false,
            cat_coor: 0.0,
            cat_coor_is_min: false,
            cat_coor_is_max: false,
            cat_start: 0,
            cat_stride: 1,
            digits: 0,
            decimals: 0,
            num_max_len: 0,
            exp_max_len: 0,
            num_char_w: 0.0,
            num_char_h: 0.0,
        }
    }

    //--------------------------------------------------------------------
    // Configuration.

    pub fn set_angle(&mut self, angle: i32) {
        self.angle = angle;
    }

    pub fn set_reverse(&mut self, reverse: bool) {
        self.reverse = reverse;
    }

    pub fn set_style(&mut self, style: AxisStyle) {
        self.style = style;
        self.show = true;
    }

    /// Position override; with `Pos::Base`, `axis_y_n` selects which
    /// Y-axis base the X-axis follows.
    pub fn set_pos(&mut self, pos: Pos, axis_y_n: usize) {
        self.pos = pos;
        self.pos_base_axis_y_n = axis_y_n;
    }

    pub fn set_log_scale(&mut self, log_scale: bool) {
        self.log_scale = log_scale;
        self.show = true;
    }

    pub fn set_number_format(&mut self, number_format: NumberFormat) {
        self.number_format = number_format;
        self.show = true;
    }

    pub fn set_number_sign(&mut self, number_sign: bool) {
        self.number_sign = number_sign;
        self.show = true;
    }

    pub fn set_number_unit(&mut self, txt: &str) {
        self.number_unit = txt.to_string();
        self.show = true;
    }

    pub fn set_show_minor_numbers(&mut self, show: bool) {
        self.show_minor_numbers = show;
        self.show_minor_numbers_auto = false;
        self.show = true;
    }

    pub fn set_number_size(&mut self, size: f64) {
        self.number_size = size;
    }

    pub fn set_range(&mut self, min: f64, max: f64, orth_axis_cross: f64) {
        self.min = min;
        self.max = max;
        self.orth_axis_cross = orth_axis_cross.clamp(min, max);
        self.show = true;
    }

    /// For logarithmic scale, `major` refers to the power, usually 10.
    pub fn set_tick(&mut self, major: f64, sub_divs: i32) {
        self.major = major;
        self.sub_divs = sub_divs;
        self.show = true;
    }

    /// Category axes only: starting category and stride of shown labels.
    pub fn set_tick_spacing(&mut self, start: i64, stride: i64) {
        self.cat_start = start.max(0) as usize;
        self.cat_stride = stride.max(1) as usize;
    }

    pub fn set_grid_style(&mut self, gs: GridStyle) {
        self.grid_style = gs;
    }

    pub fn set_grid(&mut self, major_enable: bool, minor_enable: bool) {
        self.major_grid_enable = major_enable;
        self.minor_grid_enable = minor_enable;
        self.grid_set = true;
        self.show = true;
    }

    pub fn set_number_pos(&mut self, pos: Pos) {
        self.number_pos = pos;
    }

    pub fn set_unit(&mut self, txt: &str) {
        self.unit = txt.to_string();
        self.show = true;
    }

    pub fn set_unit_pos(&mut self, pos: Pos) {
        self.unit_pos = pos;
    }

    pub fn set_label(&mut self, txt: &str) {
        self.label = txt.to_string();
        self.show = true;
    }

    pub fn set_sub_label(&mut self, txt: &str) {
        self.sub_label = txt.to_string();
        self.show = true;
    }

    pub fn set_label_size(&mut self, size: f64) {
        self.label_size = size;
    }

    //--------------------------------------------------------------------
    // Value mapping.

    /// Convert a value to a coordinate along the axis.
    pub fn coor(&self, v: f64) -> f64 {
        let mut c = -COOR_HI;
        if self.log_scale {
            if v > 0.0 {
                let a = self.min.log10();
                let b = self.max.log10();
                c = (v.log10() - a) * self.length / (b - a);
            }
        } else {
            c = (v - self.min) * self.length / (self.max - self.min);
        }
        if self.reverse {
            c = self.length - c;
        }
        c.clamp(-COOR_HI, COOR_HI)
    }

    /// Is the value representable on this axis?
    pub fn valid(&self, v: f64) -> bool {
        v.abs() <= NUM_HI && (!self.log_scale || v >= NUM_LO)
    }

    /// Is the value the skip sentinel?
    pub fn skip(&self, v: f64) -> bool {
        v == NUM_SKIP
    }

    //--------------------------------------------------------------------
    // Legalization.

    /// Shrink the minor sub-division count until minor ticks have room.
    pub fn legalize_minor(&mut self) {
        if self.category_axis || self.major <= 0.0 {
            self.sub_divs = 0;
            return;
        }

        let max_coor = self.coor(self.max);

        if self.log_scale {
            if self.major > 10.0 {
                self.sub_divs = 1;
            }
            if self.sub_divs < 1 {
                self.sub_divs = 10;
                loop {
                    let c = self.coor(self.max - self.max / self.sub_divs as f64);
                    if (max_coor - c).abs() <= 32.0 || self.sub_divs == 100 {
                        break;
                    }
                    loop {
                        self.sub_divs += 1;
                        if 100 % self.sub_divs == 0 {
                            break;
                        }
                    }
                }
                loop {
                    let c = self.coor(self.max - self.max / self.sub_divs as f64);
                    if (max_coor - c).abs() >= 8.0 || self.sub_divs == 1 {
                        break;
                    }
                    loop {
                        self.sub_divs -= 1;
                        if 100 % self.sub_divs == 0 {
                            break;
                        }
                    }
                }
            }
            if self.sub_divs > 100 {
                self.sub_divs = 100;
            }
            while self.sub_divs > 1 {
                let c = self.coor(self.max - self.max / self.sub_divs as f64);
                if (max_coor - c).abs() >= 4.0 {
                    break;
                }
                loop {
                    self.sub_divs -= 1;
                    if 100 % self.sub_divs == 0 {
                        break;
                    }
                }
            }
        } else {
            if self.sub_divs < 1 {
                self.sub_divs = 1;
            }
            while self.sub_divs > 1 {
                let c = self.coor(self.max - self.major / self.sub_divs as f64);
                if (max_coor - c).abs() >= 10.0 {
                    break;
                }
                loop {
                    self.sub_divs -= 1;
                    if 1000 % self.sub_divs == 0 {
                        break;
                    }
                }
            }
        }
    }

    /// Legalize the major tick interval and resolve the number format.
    pub fn legalize_major(&mut self) {
        let mag = self.min.abs().max(self.max.abs());

        'done: {
            if self.category_axis {
                self.number_format = NumberFormat::None;
                if self.major < 1.0 {
                    self.major = 1.0;
                }
                self.sub_divs = 0;
                break 'done;
            }

            if mag < NUM_LO
                || mag > NUM_HI
                || (self.max - self.min) < NUM_LO
                || mag > (self.max - self.min) * 1e9
            {
                self.major = 0.0;
                break 'done;
            }

            if self.log_scale {
                if self.min < NUM_LO || self.max > NUM_HI {
                    self.major = 0.0;
                    break 'done;
                }
                if self.show_minor_numbers_auto {
                    self.show_minor_numbers = true;
                }
                if self.number_format == NumberFormat::Auto {
                    self.number_format = if self.min < 10e-30 || self.max > 0.1e30 {
                        NumberFormat::Scientific
                    } else {
                        NumberFormat::Magnitude
                    };
                }
            } else {
                if self.show_minor_numbers_auto {
                    self.show_minor_numbers = false;
                }
                if self.number_format == NumberFormat::Auto {
                    self.number_format = NumberFormat::Fixed;
                }
            }
            if self.number_format == NumberFormat::Fixed && (mag < lim() || mag > 1e15) {
                self.number_format = NumberFormat::Scientific;
            }

            let max_coor = self.coor(self.max);

            if self.log_scale {
                if self.major < 10.0 {
                    self.major = 10.0;
                }
                self.major = 10f64.powf(self.major.log10().round()).round();
                loop {
                    let c = self.coor(self.max / self.major);
                    if (max_coor - c).abs() >= 20.0 {
                        break;
                    }
                    self.major *= if self.number_format == NumberFormat::Magnitude {
                        if self.major > 10.0 { 1000.0 } else { 100.0 }
                    } else {
                        10.0
                    };
                }
            } else {
                if self.major > 0.0 {
                    // Minimum allowed major spacing.
                    let min_space = 12.0;
                    if self.length * self.major < min_space * (self.max - self.min) {
                        self.major = 0.0;
                    }
                }
                if self.major <= 0.0 {
                    // Minimum major spacing to aim for.
                    let min_space = 100f64.min(self.length / 4.0);
                    let mut p: i32 = 0;
                    let mut m: i32 = 1;
                    let mut d: i32 = 1;
                    loop {
                        self.major = 10f64.powi(p) * f64::from(m) / f64::from(d);
                        let major_ticks = ((self.max - self.min) / self.major).ceil();
                        if min_space * major_ticks * 2.0 > self.length {
                            break;
                        }
                        match d {
                            1 => d = 2,
                            2 => d = 4,
                            4 => d = 5,
                            _ => {
                                d = 1;
                                p -= 1;
                            }
                        }
                    }
                    while p >= 0 && d == 1 {
                        self.major = 10f64.powi(p) * f64::from(m) / f64::from(d);
                        let major_ticks = ((self.max - self.min) / self.major).ceil();
                        if min_space * major_ticks <= self.length {
                            break;
                        }
                        match m {
                            1 => m = 2,
                            2 => m = 5,
                            _ => {
                                m = 1;
                                p += 1;
                            }
                        }
                    }
                    self.sub_divs = 2;
                }
            }
        }

        if self.major == 0.0 {
            self.log_scale = false;
            if self.number_format != NumberFormat::None {
                self.number_format = NumberFormat::Scientific;
            }
        }
    }

    /// Legalize the [min, max] range: adopt the data range, widen single
    /// points, include zero for mostly-positive/negative linear Y-ranges,
    /// snap to tick multiples, and make room for bar tags.
    pub fn legalize_min_max(
        &mut self,
        scene: &mut Scene,
        tag_g: Option<NodeId>,
        series_list: Option<&[Series]>,
        my_y_n: usize,
        unit_x_angle: i32,
    ) {
        let mut min_is_base = false;
        let mut max_is_base = false;

        if self.data_min == self.data_max {
            if self.log_scale {
                self.data_min /= 10.0;
                self.data_max *= 10.0;
            } else {
                self.data_min -= 1.0;
                self.data_max += 1.0;
            }
            self.data_min_is_base = false;
            self.data_max_is_base = false;
        }

        let mut automatic = false;

        if self.min >= self.max {
            automatic = true;
            self.min = self.data_min;
            self.max = self.data_max;
            min_is_base = self.data_min_is_base;
            max_is_base = self.data_max_is_base;
        }
        if self.log_scale && self.min <= 0.0 {
            self.min = self.data_min;
            min_is_base = self.data_min_is_base;
            if self.max <= self.min {
                self.max = 1000.0 * self.min;
                max_is_base = false;
            }
        }

        if automatic && !self.log_scale && !self.is_x_axis {
            if self.min > 0.0 && (self.max - self.min) / self.max > 0.5 && !min_is_base {
                self.min = 0.0;
            }
            if self.max < 0.0 && (self.min - self.max) / self.min > 0.5 && !max_is_base {
                self.max = 0.0;
            }
        }

        self.legalize_major();

        if automatic {
            if self.major > 0.0 {
                if self.log_scale {
                    let u = self.major.log10().round() as i32;
                    if !min_is_base {
                        let p = self.min.log10() / f64::from(u) + EPSILON;
                        self.min = 10f64.powi(u).powf(p.floor());
                    }
                    if !max_is_base {
                        let p = self.max.log10() / f64::from(u) - EPSILON;
                        self.max = 10f64.powi(u).powf(p.ceil());
                        if self.max < 10.0 * self.min {
                            self.max = 10.0 * self.min;
                        }
                    }
                } else {
                    let e = (self.max - self.min) * EPSILON;
                    if !min_is_base {
                        self.min = ((self.min + e) / self.major).floor() * self.major;
                    }
                    if !max_is_base {
                        self.max = ((self.max - e) / self.major).ceil() * self.major;
                    }
                }

                // Possibly expand min/max to make room for series tags.
                if !self.is_x_axis && self.show {
                    if let (Some(tag_g), Some(series_list)) = (tag_g, series_list) {
                        let saved_min = self.min;
                        let saved_max = self.max;
                        let mut trial = 0;
                        loop {
                            trial += 1;
                            let mut ok = true;
                            for series in series_list {
                                if series.axis_y_n != my_y_n
                                    || !series.tag_enable
                                    || !(series.series_type.is_bar_family()
                                        || series.series_type
                                            == crate::series::SeriesType::Lollipop)
                                {
                                    continue;
                                }
                                let spec = TagSpec {
                                    series_type: series.series_type,
                                    tag_pos: series.tag_pos,
                                    tag_box: series.tag_box,
                                    tag_size: series.tag_size,
                                    tag_dist_x: series.tag_dist_x,
                                    tag_dist_y: series.tag_dist_y,
                                    unit_x: String::new(),
                                    unit_y: self.number_unit.clone(),
                                    chart_area: BoundaryBox::new(),
                                    x_axis_angle: unit_x_angle,
                                    max_tag_y_len: series.max_tag_y_size,
                                };
                                let tag_beyond = get_beyond(scene, &spec, tag_g);
                                if !series.def_y || tag_beyond == 0.0 {
                                    continue;
                                }
                                if self.valid(series.min_y) && !series.min_y_is_base {
                                    let c = self.coor(series.min_y)
                                        + if self.reverse { tag_beyond } else { -tag_beyond };
                                    if c < 0.0 || c > self.length {
                                        if self.log_scale {
                                            self.min /= self.major;
                                        } else {
                                            self.min -= self.major;
                                        }
                                        ok = false;
                                    }
                                }
                                if self.valid(series.max_y) && !series.max_y_is_base {
                                    let c = self.coor(series.max_y)
                                        + if self.reverse { -tag_beyond } else { tag_beyond };
                                    if c < 0.0 || c > self.length {
                                        if self.log_scale {
                                            self.max *= self.major;
                                        } else {
                                            self.max += self.major;
                                        }
                                        ok = false;
                                    }
                                }
                            }
                            if ok {
                                break;
                            }
                            if trial == 3 {
                                self.min = saved_min;
                                self.max = saved_max;
                                break;
                            }
                        }
                    }
                }
            }

            if !self.orth_axis_cross_is_base {
                if self.is_x_axis && self.orth_style[0] == AxisStyle::None {
                    self.orth_axis_cross = self.min;
                } else {
                    self.orth_axis_cross = if self.max <= 0.0 { self.max } else { self.min };
                    if self.min < 0.0 && self.max > 0.0 && !self.chart_box {
                        self.orth_axis_cross = 0.0;
                    }
                    if self.log_scale {
                        self.orth_axis_cross = self.min;
                    }
                }
            }
        }

        self.legalize_minor();

        self.orth_axis_cross = self.orth_axis_cross.clamp(self.min, self.max);
    }

    //--------------------------------------------------------------------
    // Number formatting.

    /// Number of decimals needed for `v`; with `update` the running
    /// digits/decimals maxima are advanced.
    fn compute_decimals(&mut self, v: f64, update: bool) -> i32 {
        let v = if v > -lim() && v < lim() { 0.0 } else { v };
        let s = format!("{:.*}", PRECISION as usize, v);
        let mut dp: i32 = -1;
        let mut nz: i32 = -1;
        for (i, c) in s.chars().enumerate() {
            if c != '0' && dp >= 0 {
                nz = i as i32;
            }
            if c == '.' && dp < 0 {
                dp = i as i32;
            }
        }
        let dig = dp.max(0);
        let dec = if nz < 0 { 0 } else { nz - dp };
        if update {
            self.digits = self.digits.max(dig);
            self.decimals = self.decimals.max(dec);
        }
        dec
    }

    /// Normalize `num` into [1, 10) returning the exponent; for Magnitude
    /// format the exponent is a multiple of three.
    fn normalize_exponent(&self, num: &mut f64) -> i32 {
        let mut exp = 0;
        if *num != 0.0
            && matches!(
                self.number_format,
                NumberFormat::Scientific | NumberFormat::Magnitude
            )
        {
            let sign = if *num < 0.0 { -1.0 } else { 1.0 };
            let mut n = *num * sign;
            while n < 1.0 {
                n *= 10.0;
                exp -= 1;
            }
            while n > 10.0 - lim() {
                n /= 10.0;
                exp += 1;
            }
            if n > 1.0 - lim() && n < 1.0 + lim() {
                n = 1.0;
            }
            if self.number_format == NumberFormat::Magnitude {
                while exp % 3 != 0 {
                    n *= 10.0;
                    exp -= 1;
                }
                if exp == -3 && n >= 100.0 {
                    n /= 1000.0;
                    exp = 0;
                }
            }
            *num = n * sign;
        }
        exp
    }

    /// Collect the decimals and padding lengths over all visible numbers.
    fn compute_num_format(&mut self) {
        self.digits = 0;
        self.decimals = 0;
        self.num_max_len = 0;
        self.exp_max_len = 0;

        if matches!(self.number_format, NumberFormat::None | NumberFormat::Magnitude)
            || self.major <= 0.0
        {
            return;
        }

        let min_coor = 0.0;
        let max_coor = self.length;
        let eps_coor = (max_coor - min_coor) * EPSILON;

        let mut v_list: Vec<f64> = Vec::new();
        if self.log_scale {
            let pow_inc = self.major.log10().round() as i32;
            let mut pow_min = self.min.log10().floor() as i32 - pow_inc;
            let mut pow_max = self.max.log10().ceil() as i32 + pow_inc;
            while pow_min % pow_inc != 0 {
                pow_min -= 1;
            }
            while pow_max % pow_inc != 0 {
                pow_max += 1;
            }
            let mut pow_cur = pow_min;
            while pow_cur <= pow_max {
                for sn in 0..self.sub_divs.max(1) {
                    if sn > 0 && !self.show_minor_numbers {
                        break;
                    }
                    let m0 = 10f64.powi(pow_cur);
                    let m1 = 10f64.powi(pow_cur + pow_inc);
                    let v = if sn == 0 { m0 } else { m1 * f64::from(sn) / f64::from(self.sub_divs) };
                    let v_coor = self.coor(v);
                    if v_coor < min_coor - eps_coor || v_coor > max_coor + eps_coor {
                        continue;
                    }
                    v_list.push(v);
                }
                pow_cur += pow_inc;
            }
        } else {
            let mn_min = ((self.min - self.major) / self.major).floor() as i64;
            let mn_max = ((self.max + self.major) / self.major).ceil() as i64;
            for mn in mn_min..=mn_max {
                for sn in 0..self.sub_divs.max(1) {
                    if sn > 0 && !self.show_minor_numbers {
                        break;
                    }
                    let v = mn as f64 * self.major
                        + f64::from(sn) * self.major / f64::from(self.sub_divs.max(1));
                    let v_coor = self.coor(v);
                    if v_coor < min_coor - eps_coor || v_coor > max_coor + eps_coor {
                        continue;
                    }
                    v_list.push(v);
                }
            }
        }

        if self.number_format == NumberFormat::Fixed {
            for v in &v_list {
                self.compute_decimals(*v, true);
            }
        }

        if self.number_format == NumberFormat::Scientific {
            for v in &v_list {
                let mut num = *v;
                let exp = self.normalize_exponent(&mut num);
                self.compute_decimals(num, true);
                self.exp_max_len = self.exp_max_len.max(exp.to_string().len() as i32);
            }
        }

        self.num_max_len = self.digits + self.decimals;
        if self.decimals > 0 {
            self.num_max_len += 1;
        }

        if self.angle == 0 {
            if self.number_format != NumberFormat::Fixed {
                self.decimals = 0;
            }
            self.num_max_len = 0;
            self.exp_max_len = 0;
        } else {
            if self.number_pos == Pos::Left {
                self.num_max_len = 0;
            }
            if self.number_pos == Pos::Right {
                self.exp_max_len = 0;
            }
        }
    }

    /// Fixed-point rendering of `v` with the collected decimals.
    pub fn num_to_str(&mut self, v: f64, showpos: bool) -> String {
        let dec = self.compute_decimals(v, false).max(self.decimals);
        let mut s = String::new();
        if showpos && v > 0.0 {
            s.push('+');
        }
        s.push_str(&format!("{:.*}", dec as usize, v));
        s
    }

    /// Build one axis number as a label container; Scientific exponents
    /// render raised and smaller, Magnitude numbers get their suffix.
    fn build_num(
        &mut self,
        scene: &mut Scene,
        label_db: &mut LabelRegistry,
        g: NodeId,
        v: f64,
        bold: bool,
    ) -> NodeId {
        const MAGNITUDE_SYM: [&str; 21] = [
            "q", "r", "y", "z", "a", "f", "p", "n", "µ", "m", "", "k", "M", "G", "T", "P",
            "E", "Z", "Y", "R", "Q",
        ];

        let v = if v.abs() < NUM_LO { 0.0 } else { v };
        let mut num = v;
        let exp = self.normalize_exponent(&mut num);

        let mut number_format = self.number_format;
        if number_format == NumberFormat::Magnitude && !(-30..=30).contains(&exp) {
            number_format = NumberFormat::Scientific;
        }

        let mut s = self.num_to_str(num, self.number_sign);

        if number_format == NumberFormat::Magnitude {
            let i = exp / 3;
            if i != 0 {
                s.push_str(MAGNITUDE_SYM[(i + 10) as usize]);
            }
            s.push_str(&self.number_unit);
            let container = label_db.create_in_db(scene, g, &s, 0.0);
            if bold {
                scene.attr_mut(container).text_font().set_bold();
            }
            return container;
        }

        let leading_ws = self.num_max_len - s.chars().count() as i32;
        if self.angle == 90 && leading_ws > 0 {
            s.insert_str(0, &" ".repeat(leading_ws as usize));
        }

        if number_format == NumberFormat::Fixed {
            s.push_str(&self.number_unit);
            let container = label_db.create_in_db(scene, g, &s, 0.0);
            if bold {
                scene.attr_mut(container).text_font().set_bold();
            }
            return container;
        }

        // Scientific: mantissa part, then the exponent raised and smaller.
        if num == 0.0 {
            if let Some(pos) = s.find('.') {
                s.truncate(pos);
            }
        } else if num.abs() == 1.0 && (self.angle == 0 || self.number_pos == Pos::Left) {
            s = if num < 0.0 {
                "-10".to_string()
            } else if self.number_sign {
                "+10".to_string()
            } else {
                "10".to_string()
            };
        } else {
            s.push_str("×10");
        }
        let container = label_db.create_in_db(scene, g, &s, 0.0);

        let mut es = if num == 0.0 { String::new() } else { exp.to_string() };
        if self.angle != 0 || num != 0.0 {
            let trailing_ws = self.exp_max_len - es.chars().count() as i32;
            if trailing_ws > 0 {
                es.push_str(&" ".repeat(trailing_ws as usize));
            }
        }
        let bb = scene.bbox(container);
        let h = bb.height();
        label_db.append_in_db(scene, container, &es, h * 0.8);
        let exp_obj = scene.last_child(container).expect("appended exponent");
        let center = num == 0.0 && self.angle == 0;
        scene.move_to(
            exp_obj,
            if center { AnchorX::Mid } else { AnchorX::Min },
            AnchorY::Max,
            if center { (bb.min.x + bb.max.x) / 2.0 } else { bb.max.x + h * 0.1 },
            bb.max.y + h * 0.3,
        );

        if !self.number_unit.is_empty() {
            let bb = scene.bbox(container);
            let unit = self.number_unit.clone();
            label_db.append_in_db(scene, container, &unit, 0.0);
            let unit_obj = scene.last_child(container).expect("appended unit");
            scene.move_to(unit_obj, AnchorX::Min, AnchorY::Min, bb.max.x, bb.min.y);
        }

        if bold {
            scene.attr_mut(container).text_font().set_bold();
        }
        container
    }

    //--------------------------------------------------------------------
    // Tick, grid and number emission.

    #[allow(clippy::too_many_arguments)]
    fn build_ticks_helper(
        &mut self,
        scene: &mut Scene,
        label_db: &mut LabelRegistry,
        v: f64,
        v_coor: f64,
        sn: i32,
        at_zero: bool,
        min_coor: f64,
        max_coor: f64,
        eps_coor: f64,
        avoid: &[BoundaryBox],
        num_objects: &mut Vec<BoundaryBox>,
        groups: &AxisGroups,
    ) {
        if v_coor < min_coor - eps_coor || v_coor > max_coor + eps_coor {
            return;
        }

        let mut near_crossing_axis = [false; 2];
        for i in 0..2 {
            near_crossing_axis[i] = self.orth_style[i] != AxisStyle::None
                && coor_near(v_coor, self.orth_axis_coor[i]);
        }
        let not_near_crossing_axis = !near_crossing_axis[0] && !near_crossing_axis[1];

        let near_chart_box_min = self.chart_box && coor_near(v_coor, 0.0);
        let near_chart_box_max = self.chart_box && coor_near(v_coor, self.length);
        let not_near_chart_box = !near_chart_box_min && !near_chart_box_max;

        let centered_tick = matches!(self.style, AxisStyle::Arrow | AxisStyle::Line);

        // The tick is suppressed when it would sit on top of an orthogonal
        // axis or the chart box, except on the side where the numbers are.
        let number_side_ok = |this: &Axis| {
            if this.angle == 0 {
                (this.orth_coor_is_min && (this.number_pos == Pos::Bottom || centered_tick))
                    || (this.orth_coor_is_max
                        && (this.number_pos == Pos::Top || centered_tick))
            } else {
                (this.orth_coor_is_min && (this.number_pos == Pos::Left || centered_tick))
                    || (this.orth_coor_is_max
                        && (this.number_pos == Pos::Right || centered_tick))
            }
        };

        let mut collision = false;
        for i in 0..2 {
            if !near_crossing_axis[i] {
                continue;
            }
            let at_orth_arrow = self.orth_style[i] == AxisStyle::Arrow
                && if self.orth_reverse[i] { self.orth_coor_is_min } else { self.orth_coor_is_max };
            if !at_orth_arrow && number_side_ok(self) {
                continue;
            }
            collision = true;
        }
        if !not_near_chart_box && !number_side_ok(self) {
            collision = true;
        }

        let x = if self.angle == 0 { v_coor } else { self.orth_coor };
        let y = if self.angle == 0 { self.orth_coor } else { v_coor };

        let d = if sn == 0 { TICK_MAJOR_LEN } else { TICK_MINOR_LEN };
        let mut gx1 = 0.0;
        let mut gy1 = 0.0;
        let mut gx2 = self.orth_length;
        let mut gy2 = self.orth_length;
        if self.angle == 0 {
            gx1 = x;
            gx2 = x;
            let mut y1 = y - d;
            let mut y2 = y + d;
            if (!not_near_crossing_axis || !not_near_chart_box) && centered_tick {
                if self.orth_coor_is_max {
                    y1 = y;
                }
                if self.orth_coor_is_min {
                    y2 = y;
                }
            }
            if self.style == AxisStyle::Edge {
                if self.number_pos == Pos::Top {
                    y1 = y;
                }
                if self.number_pos == Pos::Bottom {
                    y2 = y;
                }
            }
            if self.style != AxisStyle::None && !collision {
                scene.add(groups.line_g, Shape::line(x, y1, x, y2));
            }
        } else {
            gy1 = y;
            gy2 = y;
            let mut x1 = x - d;
            let mut x2 = x + d;
            if (!not_near_crossing_axis || !not_near_chart_box) && centered_tick {
                if self.orth_coor_is_max {
                    x1 = x;
                }
                if self.orth_coor_is_min {
                    x2 = x;
                }
            }
            if self.style == AxisStyle::Edge {
                if self.number_pos == Pos::Right {
                    x1 = x;
                }
                if self.number_pos == Pos::Left {
                    x2 = x;
                }
            }
            if self.style != AxisStyle::None && !collision {
                scene.add(groups.line_g, Shape::line(x1, y, x2, y));
            }
        }

        if not_near_crossing_axis && not_near_chart_box {
            let mg = sn == 0 && self.major_grid_enable;
            if mg {
                let target = if at_zero { groups.zero_g } else { groups.major_g };
                scene.add(target, Shape::line(gx2, gy2, gx1, gy1));
            } else if self.minor_grid_enable {
                scene.add(groups.minor_g, Shape::line(gx2, gy2, gx1, gy1));
            }
        }

        if self.number_format != NumberFormat::None && (sn == 0 || self.show_minor_numbers) {
            let d = TICK_MAJOR_LEN;
            let obj = self.build_num(scene, label_db, groups.num_g, v, sn == 0);
            if self.angle == 0 {
                if self.number_pos == Pos::Top {
                    scene.move_to(obj, AnchorX::Mid, AnchorY::Min, x, y + d + NUM_SPACE_Y);
                } else {
                    scene.move_to(obj, AnchorX::Mid, AnchorY::Max, x, y - d - NUM_SPACE_Y);
                }
            } else if self.number_pos == Pos::Right {
                scene.move_to(
                    obj,
                    AnchorX::Min,
                    AnchorY::Mid,
                    x + d + NUM_SPACE_X * self.number_size,
                    y,
                );
            } else {
                scene.move_to(
                    obj,
                    AnchorX::Max,
                    AnchorY::Mid,
                    x - d - NUM_SPACE_X * self.number_size,
                    y,
                );
            }
            let mx = self.num_char_w;
            let bb = scene.bbox(obj);
            let hit = avoid.iter().any(|a| bb.collides(a, mx, 0.0))
                || num_objects.iter().any(|a| bb.collides(a, mx, 0.0));
            if hit {
                label_db.remove(obj);
                scene.pop_child(groups.num_g);
            } else {
                num_objects.push(bb);
            }
        }
    }

    fn build_ticks_nums_linear(
        &mut self,
        scene: &mut Scene,
        label_db: &mut LabelRegistry,
        avoid: &mut Vec<BoundaryBox>,
        groups: &AxisGroups,
    ) {
        // Walk tick indices coarsest-first so that colliding labels drop
        // the densest ticks.
        let mut mn_list: Vec<i64> = Vec::new();
        if self.major == 0.0 {
            mn_list.push(0);
            mn_list.push(1);
        } else {
            let mn_min = ((self.min - self.major) / self.major).floor() as i64;
            let mn_max = ((self.max + self.major) / self.major).ceil() as i64;
            let mut seen = std::collections::BTreeSet::new();
            let mut add = |mn: i64, list: &mut Vec<i64>| {
                if mn >= mn_min && mn <= mn_max && seen.insert(mn) {
                    list.push(mn);
                }
            };
            add(0, &mut mn_list);
            let mut step = mn_max - mn_min;
            while step & (step - 1) != 0 {
                step += 1;
            }
            while step > 0 {
                let mut mn = (mn_min / step) * step;
                while mn <= mn_max {
                    add(mn, &mut mn_list);
                    mn += step;
                }
                step /= 2;
            }
        }

        let mut sn_list: Vec<i32> = Vec::new();
        if self.major == 0.0 {
            sn_list.push(0);
        } else {
            let mut seen = std::collections::BTreeSet::new();
            let sub_divs = self.sub_divs;
            let mut add = |sn: i32, list: &mut Vec<i32>| {
                if sn < sub_divs && seen.insert(sn) {
                    list.push(sn);
                }
            };
            let mut step = self.sub_divs;
            while step > 0 {
                let mut sn = 0;
                while sn < self.sub_divs {
                    add(sn, &mut sn_list);
                    sn += step;
                }
                loop {
                    step -= 1;
                    if step <= 0 || self.sub_divs % step == 0 {
                        break;
                    }
                }
            }
        }

        let mut num_objects: Vec<BoundaryBox> = Vec::new();

        let min_coor = 0.0;
        let max_coor = self.length;
        let eps_coor = (max_coor - min_coor) * EPSILON;
        let mut zro_coor = 1e9;
        if self.min < EPSILON && self.max > -EPSILON {
            zro_coor = self.coor(0.0);
        }

        for sn in &sn_list {
            for mn in &mn_list {
                let v = if self.major > 0.0 {
                    *mn as f64 * self.major
                        + f64::from(*sn) * self.major / f64::from(self.sub_divs.max(1))
                } else if *mn == 0 {
                    self.min
                } else {
                    self.max
                };
                let v_coor = self.coor(v);
                let at_zero = coor_near(v_coor, zro_coor);
                self.build_ticks_helper(
                    scene,
                    label_db,
                    v,
                    v_coor,
                    *sn,
                    at_zero,
                    min_coor,
                    max_coor,
                    eps_coor,
                    avoid,
                    &mut num_objects,
                    groups,
                );
            }
        }
    }

    fn build_ticks_nums_logarithmic(
        &mut self,
        scene: &mut Scene,
        label_db: &mut LabelRegistry,
        avoid: &mut Vec<BoundaryBox>,
        groups: &AxisGroups,
    ) {
        if self.major <= 0.0 {
            return;
        }

        let pow_inc = (self.major.log10().round() as i32).max(1);

        let mut pow_list: Vec<i32> = Vec::new();
        {
            let mut pow_min = self.min.log10().floor() as i32 - pow_inc;
            let mut pow_max = self.max.log10().ceil() as i32 + pow_inc;
            while pow_min % pow_inc != 0 {
                pow_min -= 1;
            }
            while pow_max % pow_inc != 0 {
                pow_max += 1;
            }
            let mut seen = std::collections::BTreeSet::new();
            let mut add = |pow: i32, list: &mut Vec<i32>| {
                if pow >= pow_min && pow <= pow_max && seen.insert(pow) {
                    list.push(pow);
                }
            };
            add(0, &mut pow_list);
            let mut step = (pow_max - pow_min) / pow_inc;
            while step & (step - 1) != 0 {
                step += 1;
            }
            while step > 0 {
                let mut p = pow_min / pow_inc;
                while p % step != 0 {
                    p -= 1;
                }
                while p <= pow_max / pow_inc {
                    add(p * pow_inc, &mut pow_list);
                    p += step;
                }
                step /= 2;
            }
        }

        let mut sn_list: Vec<i32> = Vec::new();
        {
            let mut seen = std::collections::BTreeSet::new();
            let sub_divs = self.sub_divs;
            let mut add = |sn: i32, list: &mut Vec<i32>| {
                if sn < sub_divs && seen.insert(sn) {
                    list.push(sn);
                }
            };
            add(0, &mut sn_list);
            add(if self.sub_divs % 10 == 0 { self.sub_divs / 10 } else { 1 }, &mut sn_list);
            if self.sub_divs % 10 == 0 {
                add(2 * self.sub_divs / 10, &mut sn_list);
                add(5 * self.sub_divs / 10, &mut sn_list);
                add(3 * self.sub_divs / 10, &mut sn_list);
                add(7 * self.sub_divs / 10, &mut sn_list);
            }
            for i in 2..=self.sub_divs.max(0) {
                if self.sub_divs % i == 0 {
                    let j = self.sub_divs / i;
                    let mut sn = j;
                    while sn < self.sub_divs {
                        add(sn, &mut sn_list);
                        sn += j;
                    }
                }
            }
        }

        let mut num_objects: Vec<BoundaryBox> = Vec::new();

        let min_coor = 0.0;
        let max_coor = self.length;
        let eps_coor = (max_coor - min_coor) * EPSILON;
        let mut one_coor = 1e9;
        if self.min < 1.0 + EPSILON && self.max > 1.0 - EPSILON {
            one_coor = self.coor(1.0);
        }

        for sn in &sn_list {
            if *sn >= self.sub_divs {
                continue;
            }
            for pow_cur in &pow_list {
                let m0 = 10f64.powi(*pow_cur);
                let m1 = 10f64.powi(*pow_cur + pow_inc);
                let v = if *sn == 0 {
                    m0
                } else {
                    m1 * f64::from(*sn) / f64::from(self.sub_divs)
                };
                let v_coor = self.coor(v);
                let m0_coor = self.coor(m0);
                if self.reverse {
                    if *sn > 0 && v_coor >= m0_coor {
                        continue;
                    }
                } else if *sn > 0 && v_coor <= m0_coor {
                    continue;
                }
                let at_zero = coor_near(v_coor, one_coor);
                self.build_ticks_helper(
                    scene,
                    label_db,
                    v,
                    v_coor,
                    *sn,
                    at_zero,
                    min_coor,
                    max_coor,
                    eps_coor,
                    avoid,
                    &mut num_objects,
                    groups,
                );
            }
        }
    }

    /// Place category labels under the integer positions: straight first,
    /// staggered over two rows if they collide, then rotated 45° or 90°.
    fn build_categories(
        &mut self,
        scene: &mut Scene,
        categories: &[String],
        empty_stride: usize,
        avoid: &mut Vec<BoundaryBox>,
        groups: &AxisGroups,
    ) {
        let cat_g = groups.num_g;
        let normal_width = categories.iter().all(|c| crate::visual::font::normal_width_utf8(c));
        if normal_width {
            scene
                .attr_mut(cat_g)
                .text_font()
                .set_width_factor(1.0)
                .set_height_factor(1.0)
                .set_baseline_factor(1.0);
        }

        let probe = scene.add(cat_g, Shape::label("X"));
        let bb = scene.bbox(probe);
        scene.pop_child(cat_g);
        let cat_char_w = bb.width();
        let cat_char_h = bb.height();

        let dist_x = TICK_MAJOR_LEN;
        let mut dist_y = TICK_MAJOR_LEN;

        let mut text_angle = 0.0;
        let mut ax = AnchorX::Mid;
        let mut ay = AnchorY::Mid;
        let mut dx = 0.0;
        let mut dy = 0.0;
        if self.angle == 0 {
            if self.number_pos == Pos::Top {
                ay = AnchorY::Min;
                dy = dist_y + NUM_SPACE_Y;
            } else {
                ay = AnchorY::Max;
                dy = -dist_y - NUM_SPACE_Y;
            }
            let x1 = self.coor(0.0);
            let x2 = self.coor(categories.len() as f64);
            let stride = self.cat_stride.max(empty_stride).max(1);
            if (x2 - x1).abs() < categories.len() as f64 * cat_char_h * 1.5 / stride as f64 {
                text_angle = 90.0;
                dist_y = 0.0;
            } else {
                text_angle = 45.0;
                dist_y = cat_char_h * if dy > 0.0 { 0.36 } else { -0.36 };
            }
        } else if self.number_pos == Pos::Right {
            ax = AnchorX::Min;
            dx = dist_x + NUM_SPACE_X * self.number_size;
        } else {
            ax = AnchorX::Max;
            dx = -dist_x - NUM_SPACE_X * self.number_size;
        }

        let mut cat_objects: Vec<BoundaryBox> = Vec::new();
        let mut mn_list: Vec<usize> = Vec::new();

        let unit = (self.coor(0.0) - self.coor(1.0)).abs();
        let min_stride = if unit > 0.0 { (cat_char_h / unit).ceil() as usize } else { 1 };

        let mut trial = 0u32;
        for commit in [false, true] {
            loop {
                let mut collision = false;
                let mut plc_vld = false;
                let mut plc_idx = 0usize;
                let mut cat_idx = self.cat_start;
                while cat_idx < categories.len() {
                    let cat = &categories[cat_idx];
                    if cat.is_empty() {
                        cat_idx += 1;
                        continue;
                    }
                    if (cat_idx - self.cat_start) % self.cat_stride != 0 {
                        cat_idx +=
                            self.cat_stride - (cat_idx - self.cat_start) % self.cat_stride;
                        continue;
                    }
                    if plc_vld && cat_idx < plc_idx + min_stride {
                        cat_idx = plc_idx + min_stride;
                        continue;
                    }
                    let obj = scene.add(cat_g, Shape::label(cat.clone()));
                    let x = if self.angle == 0 { self.coor(cat_idx as f64) } else { self.cat_coor };
                    let y = if self.angle != 0 { self.coor(cat_idx as f64) } else { self.cat_coor };
                    match trial {
                        0 => scene.move_to(obj, ax, ay, x + dx, y + dy),
                        1 => {
                            let mut sy = if cat_idx % 2 == 1 {
                                cat_char_h + NUM_SPACE_Y
                            } else {
                                0.0
                            };
                            if dy < 0.0 {
                                sy = -sy;
                            }
                            scene.move_to(obj, ax, ay, x + dx, y + dy + sy);
                        }
                        _ => {
                            ax = if self.number_pos == Pos::Top {
                                AnchorX::Min
                            } else {
                                AnchorX::Max
                            };
                            ay = AnchorY::Mid;
                            scene.move_to(obj, ax, ay, x + dx, y + dy + dist_y);
                            let angle = if self.number_pos == Pos::Top {
                                text_angle
                            } else {
                                -text_angle
                            };
                            scene.rotate_about_anchor(obj, angle, ax, ay);
                        }
                    }
                    let bb = scene.bbox(obj);
                    let margin = if trial < 2 { 1.5 * cat_char_w } else { 0.0 };
                    let hits_prev = (trial < 2 || text_angle == 90.0)
                        && cat_objects.iter().any(|a| bb.collides(a, margin, 0.0));
                    if hits_prev {
                        collision = true;
                        scene.pop_child(cat_g);
                        if !commit {
                            break;
                        }
                    } else {
                        plc_vld = true;
                        plc_idx = cat_idx;
                        let mx = if self.angle == 0 { 4.0 } else { 0.0 };
                        if commit && avoid.iter().any(|a| bb.collides(a, mx, 0.0)) {
                            scene.pop_child(cat_g);
                        } else {
                            cat_objects.push(bb);
                        }
                        if commit {
                            mn_list.push(cat_idx);
                        }
                    }
                    cat_idx += 1;
                }
                if commit {
                    break;
                }
                while !cat_objects.is_empty() {
                    scene.pop_child(cat_g);
                    cat_objects.pop();
                }
                if !collision || self.angle != 0 || trial == 2 {
                    break;
                }
                trial += 1;
            }
        }

        if (self.minor_grid_enable || self.major_grid_enable) && self.major > 0.0 {
            let mm = (self.major.round() as usize).max(1);
            for mn in mn_list {
                if mn % mm != 0 {
                    continue;
                }
                let v = mn as f64;
                if v > self.max {
                    break;
                }
                let v_coor = self.coor(v);
                let (gx1, gy1, gx2, gy2) = if self.angle == 0 {
                    (v_coor, 0.0, v_coor, self.orth_length)
                } else {
                    (0.0, v_coor, self.orth_length, v_coor)
                };
                let mut near_crossing_axis = false;
                for i in 0..2 {
                    if self.orth_style[i] != AxisStyle::None
                        && coor_near(v_coor, self.orth_axis_coor[i])
                    {
                        near_crossing_axis = true;
                    }
                }
                let near_chart_box = self.chart_box
                    && (coor_near(v_coor, 0.0) || coor_near(v_coor, self.length));
                if !near_crossing_axis && !near_chart_box {
                    let target =
                        if self.major_grid_enable { groups.major_g } else { groups.minor_g };
                    scene.add(target, Shape::line(gx2, gy2, gx1, gy1));
                }
            }
        }
    }

    //--------------------------------------------------------------------
    // Unit, axis line, label.

    fn build_unit(
        &mut self,
        scene: &mut Scene,
        label_db: &mut LabelRegistry,
        unit_g: NodeId,
        avoid: &mut Vec<BoundaryBox>,
    ) {
        if self.unit.is_empty() {
            return;
        }

        let at_orth_min =
            if self.category_axis { self.cat_coor_is_min } else { self.orth_coor_is_min };
        let at_orth_max =
            if self.category_axis { self.cat_coor_is_max } else { self.orth_coor_is_max };

        let coor = if self.category_axis { self.cat_coor } else { self.orth_coor };

        let mut outer_max = self.length;
        let mut outer_min = 0.0;
        let mut inner_max;
        let mut inner_min;

        outer_max += if self.angle == 0 { NUM_SPACE_X * self.number_size } else { NUM_SPACE_Y };
        outer_min -= if self.angle == 0 { NUM_SPACE_X * self.number_size } else { NUM_SPACE_Y };
        if self.style == AxisStyle::Arrow {
            if self.reverse {
                outer_max += TICK_MAJOR_LEN;
                outer_min -= OVERHANG;
            } else {
                outer_max += OVERHANG;
                outer_min -= TICK_MAJOR_LEN;
            }
        } else {
            outer_max += TICK_MAJOR_LEN;
            outer_min -= TICK_MAJOR_LEN;
        }
        if self.chart_box {
            inner_max = self.length - TICK_MAJOR_LEN;
            inner_min = TICK_MAJOR_LEN;
        } else {
            inner_max = outer_max;
            inner_min = outer_min;
        }

        let unit = self.unit.clone();
        let obj = label_db.create_in_db(scene, unit_g, &unit, 16.0 * self.number_size);
        scene.attr_mut(obj).text_font().set_bold();

        // Returns whether the placement collides with a crossing axis or
        // the chart box frame.
        let place = |scene: &mut Scene, this: &Axis, px: Pos, py: Pos| -> bool {
            let mut ax = AnchorX::Mid;
            let mut ay = AnchorY::Mid;
            let mut cx = this.length / 2.0;
            let mut cy = this.length / 2.0;

            let mut dist_x = TICK_MAJOR_LEN;
            let mut dist_y = TICK_MAJOR_LEN;

            if this.category_axis || this.style == AxisStyle::None {
                dist_x = TICK_MINOR_LEN;
                dist_y = 0.0;
            }

            if px == Pos::Left {
                if this.angle == 0 {
                    cx = if py == Pos::Center { outer_min } else { inner_min };
                    ax = if py == Pos::Center { AnchorX::Max } else { AnchorX::Min };
                } else {
                    if this.style == AxisStyle::Edge && this.number_pos != Pos::Left {
                        dist_x = TICK_MINOR_LEN;
                    }
                    cx = coor - dist_x - NUM_SPACE_X * this.number_size;
                    ax = AnchorX::Max;
                }
            }
            if px == Pos::Right {
                if this.angle == 0 {
                    cx = if py == Pos::Center { outer_max } else { inner_max };
                    ax = if py == Pos::Center { AnchorX::Min } else { AnchorX::Max };
                } else {
                    if this.style == AxisStyle::Edge && this.number_pos != Pos::Right {
                        dist_x = TICK_MINOR_LEN;
                    }
                    cx = coor + dist_x + NUM_SPACE_X * this.number_size;
                    ax = AnchorX::Min;
                }
            }
            if px == Pos::Center {
                cx = if this.angle == 0 { this.length / 2.0 } else { coor };
                ax = AnchorX::Mid;
            }

            if py == Pos::Bottom {
                if this.angle == 0 {
                    if this.style == AxisStyle::Edge && this.number_pos != Pos::Bottom {
                        dist_y = 0.0;
                    }
                    cy = coor - dist_y - NUM_SPACE_Y;
                    ay = AnchorY::Max;
                } else {
                    cy = if px == Pos::Center { outer_min } else { inner_min };
                    ay = if px == Pos::Center { AnchorY::Max } else { AnchorY::Min };
                }
            }
            if py == Pos::Top {
                if this.angle == 0 {
                    if this.style == AxisStyle::Edge && this.number_pos != Pos::Top {
                        dist_y = 0.0;
                    }
                    cy = coor + dist_y + NUM_SPACE_Y;
                    ay = AnchorY::Min;
                } else {
                    cy = if px == Pos::Center { outer_max } else { inner_max };
                    ay = if px == Pos::Center { AnchorY::Min } else { AnchorY::Max };
                }
            }
            if py == Pos::Center {
                cy = if this.angle == 0 { coor } else { this.length / 2.0 };
                ay = AnchorY::Mid;
            }

            let mut cx = cx;
            let mut cy = cy;
            if this.chart_box {
                if this.angle == 0 {
                    if cy < 0.0 || cy > this.orth_length {
                        if cx == inner_max {
                            cx = outer_max;
                        }
                        if cx == inner_min {
                            cx = outer_min;
                        }
                    }
                } else if cx < 0.0 || cx > this.orth_length {
                    if cy == inner_max {
                        cy = outer_max;
                    }
                    if cy == inner_min {
                        cy = outer_min;
                    }
                }
            }

            scene.move_to(obj, ax, ay, cx, cy);
            let bb = scene.bbox(obj);
            let mut collision = false;
            for i in 0..2 {
                let mx = 48.0;
                let my = 32.0;
                if this.angle == 0 {
                    if this.orth_axis_coor[i] <= bb.min.x - mx
                        || this.orth_axis_coor[i] >= bb.max.x + mx
                    {
                        continue;
                    }
                    let arrow_end = if this.orth_reverse[i] {
                        at_orth_max && py == Pos::Top
                    } else {
                        at_orth_min && py == Pos::Bottom
                    };
                    if arrow_end
                        && px == (if this.reverse { Pos::Left } else { Pos::Right })
                        && this.style == AxisStyle::Arrow
                    {
                        continue;
                    }
                } else {
                    if this.orth_axis_coor[i] <= bb.min.y - my
                        || this.orth_axis_coor[i] >= bb.max.y + my
                    {
                        continue;
                    }
                    let arrow_end = if this.orth_reverse[i] {
                        at_orth_max && px == Pos::Right
                    } else {
                        at_orth_min && px == Pos::Left
                    };
                    if arrow_end
                        && py == (if this.reverse { Pos::Bottom } else { Pos::Top })
                        && this.style == AxisStyle::Arrow
                    {
                        continue;
                    }
                }
                collision = true;
            }
            if this.chart_box {
                let mx = dist_x.abs() - EPSILON;
                let my = dist_y.abs() - EPSILON;
                let bb = bb.expanded(mx, my);
                let cb_w = if this.angle == 0 { this.length } else { this.orth_length };
                let cb_h = if this.angle != 0 { this.length } else { this.orth_length };
                if ((bb.min.x < 0.0 && bb.max.x > 0.0)
                    || (bb.min.x < cb_w && bb.max.x > cb_w))
                    && bb.min.y < cb_h
                    && bb.max.y > 0.0
                {
                    collision = true;
                }
                if ((bb.min.y < 0.0 && bb.max.y > 0.0)
                    || (bb.min.y < cb_h && bb.max.y > cb_h))
                    && bb.min.x < cb_w
                    && bb.max.x > 0.0
                {
                    collision = true;
                }
            }
            collision
        };

        let automatic =
            !matches!(self.unit_pos, Pos::Bottom | Pos::Top | Pos::Left | Pos::Right);
        let mut collision = false;

        if self.angle == 0 {
            if automatic {
                if self.category_axis {
                    self.unit_pos = if self.reverse { Pos::Left } else { Pos::Right };
                } else {
                    self.unit_pos =
                        if self.number_pos == Pos::Bottom { Pos::Top } else { Pos::Bottom };
                    if self.chart_box {
                        if at_orth_min && self.number_pos == Pos::Top {
                            self.unit_pos = Pos::Top;
                        }
                        if at_orth_max && self.number_pos == Pos::Bottom {
                            self.unit_pos = Pos::Bottom;
                        }
                        if !at_orth_min && !at_orth_max {
                            self.unit_pos =
                                if self.number_pos == Pos::Top { Pos::Top } else { Pos::Bottom };
                        }
                    } else if self.orth_dual && self.style == AxisStyle::Arrow {
                        self.unit_pos = if self.reverse { Pos::Left } else { Pos::Right };
                    }
                }
            }
            if self.unit_pos == Pos::Bottom || self.unit_pos == Pos::Top {
                if self.orth_dual || self.category_axis {
                    collision = place(scene, self, Pos::Center, self.unit_pos);
                } else if self.style == AxisStyle::Arrow {
                    let side = if self.reverse { Pos::Left } else { Pos::Right };
                    collision =
                        place(scene, self, side, self.unit_pos) && place(scene, self, side, Pos::Center);
                } else {
                    let fst = if self.reverse { Pos::Left } else { Pos::Right };
                    let snd = if self.reverse { Pos::Right } else { Pos::Left };
                    collision = place(scene, self, fst, self.unit_pos)
                        && place(scene, self, snd, self.unit_pos)
                        && place(scene, self, Pos::Center, self.unit_pos);
                }
            }
            if self.unit_pos == Pos::Left || self.unit_pos == Pos::Right {
                place(scene, self, self.unit_pos, Pos::Center);
                collision = false;
            }
            if collision {
                place(
                    scene,
                    self,
                    if self.reverse { Pos::Left } else { Pos::Right },
                    Pos::Center,
                );
            }
        } else {
            if automatic {
                if self.category_axis {
                    self.unit_pos = Pos::Top;
                } else {
                    self.unit_pos =
                        if self.number_pos == Pos::Left { Pos::Right } else { Pos::Left };
                    if self.chart_box {
                        if at_orth_min && self.number_pos == Pos::Right {
                            self.unit_pos = Pos::Right;
                        }
                        if at_orth_max && self.number_pos == Pos::Left {
                            self.unit_pos = Pos::Left;
                        }
                        if !at_orth_min && !at_orth_max {
                            self.unit_pos =
                                if self.number_pos == Pos::Left { Pos::Left } else { Pos::Right };
                        }
                    } else if (self.orth_dual && self.style == AxisStyle::Arrow)
                        || self.style == AxisStyle::None
                    {
                        self.unit_pos = if self.reverse { Pos::Bottom } else { Pos::Top };
                    }
                }
            }
            if self.unit_pos == Pos::Left || self.unit_pos == Pos::Right {
                if self.orth_dual {
                    collision = place(scene, self, self.unit_pos, Pos::Center);
                } else if self.style == AxisStyle::Arrow {
                    let end = if self.reverse { Pos::Bottom } else { Pos::Top };
                    collision = place(scene, self, self.unit_pos, end)
                        && place(scene, self, Pos::Center, end);
                } else {
                    let fst = if self.reverse { Pos::Bottom } else { Pos::Top };
                    let snd = if self.reverse { Pos::Top } else { Pos::Bottom };
                    collision = place(scene, self, self.unit_pos, fst)
                        && place(scene, self, self.unit_pos, snd)
                        && place(scene, self, self.unit_pos, Pos::Center);
                }
            }
            if self.unit_pos == Pos::Bottom || self.unit_pos == Pos::Top {
                place(scene, self, Pos::Center, self.unit_pos);
                collision = false;
            }
            if collision {
                place(
                    scene,
                    self,
                    Pos::Center,
                    if self.reverse { Pos::Bottom } else { Pos::Top },
                );
            }
        }

        avoid.push(scene.bbox(obj));
    }

    /// Build the axis: phase 0 places the unit (so the grid solver sees
    /// it), phase 1 emits the axis line, ticks, grid and numbers.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &mut self,
        scene: &mut Scene,
        label_db: &mut LabelRegistry,
        categories: &[String],
        empty_stride: usize,
        phase: u32,
        avoid: &mut Vec<BoundaryBox>,
        groups: &AxisGroups,
    ) {
        if !self.show {
            return;
        }

        // Limit for when axes are near min or max.
        let near = 0.3;

        if self.category_axis {
            if self.angle == 0 {
                if self.number_pos != Pos::Top && self.number_pos != Pos::Bottom {
                    self.number_pos = Pos::Auto;
                }
                if self.pos == Pos::Base && self.orth_coor_is_max {
                    self.pos = Pos::Top;
                }
                if self.pos != Pos::Top && self.pos != Pos::Bottom {
                    self.pos =
                        if self.number_pos != Pos::Auto { self.number_pos } else { Pos::Bottom };
                }
                if self.number_pos == Pos::Auto {
                    self.number_pos = self.pos;
                }
                self.cat_coor = if self.pos == Pos::Top { self.orth_length } else { 0.0 };
                self.cat_coor_is_min = self.pos != Pos::Top;
                self.cat_coor_is_max = self.pos == Pos::Top;
            } else {
                if self.number_pos != Pos::Right && self.number_pos != Pos::Left {
                    self.number_pos = Pos::Auto;
                }
                if self.pos == Pos::Base && self.orth_coor_is_max {
                    self.pos = Pos::Right;
                }
                if self.pos != Pos::Right && self.pos != Pos::Left {
                    self.pos =
                        if self.number_pos != Pos::Auto { self.number_pos } else { Pos::Left };
                }
                if self.number_pos == Pos::Auto {
                    self.number_pos = self.pos;
                }
                self.cat_coor = if self.pos == Pos::Right { self.orth_length } else { 0.0 };
                self.cat_coor_is_min = self.pos != Pos::Right;
                self.cat_coor_is_max = self.pos == Pos::Right;
            }
        } else if self.angle == 0 {
            if self.number_pos != Pos::Bottom && self.number_pos != Pos::Top {
                self.number_pos = if self.orth_coor > self.orth_length * (1.0 - near) {
                    Pos::Top
                } else {
                    Pos::Bottom
                };
            }
        } else if self.number_pos != Pos::Left && self.number_pos != Pos::Right {
            self.number_pos = if self.orth_coor > self.orth_length * (1.0 - near) {
                Pos::Right
            } else {
                Pos::Left
            };
        }

        if phase == 0 {
            self.build_unit(scene, label_db, groups.unit_g, avoid);
            return;
        }

        let line_g = scene.add_group(groups.line_g);
        let num_g = scene.add_group(groups.num_g);
        scene.attr_mut(num_g).text_font().set_size(14.0 * self.number_size);
        if !self.category_axis {
            // Numbers have no glyph below the baseline; pull the baseline
            // up so they appear vertically centered in their box.
            scene
                .attr_mut(num_g)
                .text_font()
                .set_width_factor(1.0)
                .set_height_factor(1.0)
                .set_baseline_factor(0.6);
        }
        {
            let probe = scene.add(num_g, Shape::label("X"));
            let bb = scene.bbox(probe);
            scene.pop_child(num_g);
            self.num_char_w = bb.width();
            self.num_char_h = bb.height();
        }

        let mut a_s = 0.0;
        let mut a_e = self.length;
        if self.reverse {
            std::mem::swap(&mut a_s, &mut a_e);
            if self.style == AxisStyle::Arrow {
                a_e -= OVERHANG;
            }
        } else if self.style == AxisStyle::Arrow {
            a_e += OVERHANG;
        }
        let mut sx = if self.angle == 0 { a_s } else { self.orth_coor };
        let mut sy = if self.angle == 0 { self.orth_coor } else { a_s };
        let ex = if self.angle == 0 { a_e } else { self.orth_coor };
        let ey = if self.angle == 0 { self.orth_coor } else { a_e };

        let axis_at_chart_box =
            self.chart_box && (self.orth_coor_is_min || self.orth_coor_is_max);

        if self.style != AxisStyle::None {
            if self.style == AxisStyle::Arrow {
                let sv = if self.reverse { -1.0 } else { 1.0 };
                let dx = if self.angle == 0 { sv * ARROW_LENGTH / 2.0 } else { 0.0 };
                let dy = if self.angle != 0 { sv * ARROW_LENGTH / 2.0 } else { 0.0 };
                if axis_at_chart_box {
                    if self.angle == 0 {
                        sx = if self.reverse { 0.0 } else { self.length };
                    } else {
                        sy = if self.reverse { 0.0 } else { self.length };
                    }
                }
                scene.add(line_g, Shape::line(sx, sy, ex - dx, ey - dy));
                let poly = scene.add(
                    line_g,
                    Shape::polygon(vec![
                        Point::new(ex, ey),
                        Point::new(ex - sv * ARROW_LENGTH, ey + sv * ARROW_WIDTH / 2.0),
                        Point::new(ex - sv * ARROW_LENGTH, ey - sv * ARROW_WIDTH / 2.0),
                    ]),
                );
                scene.rotate(poly, f64::from(self.angle), Point::new(ex, ey));
            } else if !axis_at_chart_box {
                scene.add(line_g, Shape::line(sx, sy, ex, ey));
            }
        }

        // DMZ rectangles around the orthogonal axes and the chart box edges
        // temporarily trigger collisions for numbers that come too close.
        let mut dmz_cnt = 0;
        for i in 0..2 {
            if self.orth_style[i] == AxisStyle::None {
                continue;
            }
            let oc = self.orth_axis_coor[i];
            let zc = 2.0 * TICK_MAJOR_LEN;
            let mut os = 0.0;
            let mut oe = self.orth_length;
            if self.orth_style[i] == AxisStyle::Arrow {
                if self.orth_reverse[i] {
                    os -= OVERHANG;
                } else {
                    oe += OVERHANG;
                }
            }
            let dmz = if self.angle == 0 {
                BoundaryBox::from_corners(Point::new(oc - zc, os), Point::new(oc + zc, oe))
            } else {
                BoundaryBox::from_corners(Point::new(os, oc - zc), Point::new(oe, oc + zc))
            };
            avoid.push(dmz);
            dmz_cnt += 1;
        }
        if self.chart_box {
            for i in 0..2 {
                let oc = if i == 0 { 0.0 } else { self.length };
                let zc = TICK_MAJOR_LEN;
                let dmz = if self.angle == 0 {
                    BoundaryBox::from_corners(
                        Point::new(oc - zc, 0.0),
                        Point::new(oc + zc, self.orth_length),
                    )
                } else {
                    BoundaryBox::from_corners(
                        Point::new(0.0, oc - zc),
                        Point::new(self.orth_length, oc + zc),
                    )
                };
                avoid.push(dmz);
                dmz_cnt += 1;
            }
        }

        let minor_g = scene.add_group(groups.minor_g);
        let major_g = scene.add_group(groups.major_g);
        let zero_g = scene.add_group(groups.zero_g);
        let grid_color = self.grid_color;
        if self.grid_style == GridStyle::Solid {
            scene.attr_mut(minor_g).set_line_width(0.25).line_color().set(&grid_color);
            scene.attr_mut(major_g).set_line_width(0.50).line_color().set(&grid_color);
            scene.attr_mut(zero_g).set_line_width(0.50).line_color().set(&grid_color);
        } else {
            let a = scene.attr_mut(minor_g);
            a.set_line_width(0.25).set_line_dash(2.0, 3.0);
            a.line_color().set(&grid_color);
            let a = scene.attr_mut(major_g);
            a.set_line_width(0.50).set_line_dash(5.0, 3.0);
            a.line_color().set(&grid_color);
            let a = scene.attr_mut(zero_g);
            a.set_line_width(1.00).set_line_dash(5.0, 3.0);
            a.line_color().set(&grid_color);
        }

        let sub_groups = AxisGroups {
            minor_g,
            major_g,
            zero_g,
            line_g,
            num_g,
            unit_g: groups.unit_g,
        };

        if self.category_axis {
            self.build_categories(scene, categories, empty_stride, avoid, &sub_groups);
        } else {
            self.compute_num_format();
            if self.log_scale {
                self.build_ticks_nums_logarithmic(scene, label_db, avoid, &sub_groups);
            } else {
                self.build_ticks_nums_linear(scene, label_db, avoid, &sub_groups);
            }
        }

        // Remove the DMZ rectangles.
        avoid.truncate(avoid.len() - dmz_cnt);

        avoid.push(scene.bbox(line_g));
        avoid.push(scene.bbox(num_g));
    }

    /// Place the axis label and sub-label outside the plot.
    pub fn build_label(
        &mut self,
        scene: &mut Scene,
        avoid: &mut Vec<BoundaryBox>,
        label_g: NodeId,
    ) {
        let mut space_x = 25.0;
        let mut space_y = 10.0;
        if self.angle != 0 {
            std::mem::swap(&mut space_x, &mut space_y);
        }

        let mut label_objs: Vec<NodeId> = Vec::new();

        let lab0 = if self.label.is_empty() {
            None
        } else {
            let txt = self.label.clone();
            let obj = crate::label::create_label(scene, label_g, &txt, 24.0 * self.label_size);
            label_objs.push(obj);
            Some(obj)
        };
        let lab1 = if self.sub_label.is_empty() {
            None
        } else {
            let txt = self.sub_label.clone();
            let obj = crate::label::create_label(scene, label_g, &txt, 16.0 * self.label_size);
            label_objs.push(obj);
            Some(obj)
        };

        if lab0.is_none() && lab1.is_none() {
            return;
        }

        let at_orth_min =
            if self.category_axis { self.cat_coor_is_min } else { self.orth_coor_is_min };
        let at_orth_max =
            if self.category_axis { self.cat_coor_is_max } else { self.orth_coor_is_max };

        let mut dir = Dir::Down;
        if self.angle == 0 {
            if self.y_dual && at_orth_max {
                dir = Dir::Up;
            }
        } else if at_orth_max || (self.number_pos == Pos::Right && !at_orth_min) {
            dir = Dir::Right;
            for obj in [lab0, lab1].into_iter().flatten() {
                scene.rotate_about_anchor(obj, -90.0, AnchorX::Mid, AnchorY::Mid);
            }
        } else {
            dir = Dir::Left;
            for obj in [lab0, lab1].into_iter().flatten() {
                scene.rotate_about_anchor(obj, 90.0, AnchorX::Mid, AnchorY::Mid);
            }
        }

        match dir {
            Dir::Down => {
                let mut y = -space_y;
                if let Some(lab0) = lab0 {
                    scene.move_to(lab0, AnchorX::Mid, AnchorY::Max, self.length / 2.0, y);
                    let bb = scene.bbox(lab0);
                    y -= bb.height() + 3.0;
                }
                if let Some(lab1) = lab1 {
                    scene.move_to(lab1, AnchorX::Mid, AnchorY::Max, self.length / 2.0, y);
                }
            }
            Dir::Up => {
                let mut y = self.orth_length + space_y;
                if let Some(lab1) = lab1 {
                    scene.move_to(lab1, AnchorX::Mid, AnchorY::Min, self.length / 2.0, y);
                    let bb = scene.bbox(lab1);
                    y += bb.height() + 3.0;
                }
                if let Some(lab0) = lab0 {
                    scene.move_to(lab0, AnchorX::Mid, AnchorY::Min, self.length / 2.0, y);
                }
            }
            _ => {
                let mut x = if dir == Dir::Left {
                    -space_x
                } else {
                    self.orth_length + space_x
                };
                let ax = if dir == Dir::Left { AnchorX::Max } else { AnchorX::Min };
                let vx = if dir == Dir::Left { -1.0 } else { 1.0 };
                if let Some(lab1) = lab1 {
                    scene.move_to(lab1, ax, AnchorY::Mid, x, self.length / 2.0);
                    let bb = scene.bbox(lab1);
                    x += (bb.width() + 3.0) * vx;
                }
                if let Some(lab0) = lab0 {
                    scene.move_to(lab0, ax, AnchorY::Mid, x, self.length / 2.0);
                }
            }
        }

        move_objs(scene, dir, &label_objs, avoid, space_x, space_y);

        for obj in [lab0, lab1].into_iter().flatten() {
            avoid.push(scene.bbox(obj));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_axis(length: f64) -> Axis {
        let mut a = Axis::new(false);
        a.length = length;
        a.orth_length = length;
        a.show = true;
        a
    }

    #[test]
    fn auto_major_is_nice_and_ticks_fit() {
        let mut a = linear_axis(600.0);
        a.data_def = true;
        a.data_min = 0.0;
        a.data_max = 10.0;
        a.min = 0.0;
        a.max = 0.0;
        a.legalize_min_max(&mut Scene::new(), None, None, 0, 0);
        assert!(a.major > 0.0);
        // Major must be of the form 10^p * {1,2,4,5} / d.
        let mantissa = a.major / 10f64.powf(a.major.log10().floor());
        let ok = [1.0, 2.0, 2.5, 4.0, 5.0]
            .iter()
            .any(|m| (mantissa - m).abs() < 1e-9);
        assert!(ok, "major {} has mantissa {}", a.major, mantissa);
        // Each major tick must span at least min(100, length/4) points.
        let spacing = a.length * a.major / (a.max - a.min);
        assert!(spacing + 1e-9 >= 100f64.min(a.length / 4.0));
    }

    #[test]
    fn range_extends_to_zero_when_mostly_positive() {
        let mut a = linear_axis(600.0);
        a.data_def = true;
        a.data_min = 2.0;
        a.data_max = 10.0;
        a.legalize_min_max(&mut Scene::new(), None, None, 0, 0);
        assert_eq!(a.min, 0.0);
        assert!(a.max >= 10.0);
    }

    #[test]
    fn single_point_widens_range() {
        let mut a = linear_axis(600.0);
        a.data_def = true;
        a.data_min = 5.0;
        a.data_max = 5.0;
        a.legalize_min_max(&mut Scene::new(), None, None, 0, 0);
        assert!(a.min <= 4.0 && a.max >= 6.0);

        let mut a = linear_axis(600.0);
        a.log_scale = true;
        a.data_def = true;
        a.data_min = 5.0;
        a.data_max = 5.0;
        a.legalize_min_max(&mut Scene::new(), None, None, 0, 0);
        assert!(a.min <= 0.5 + 1e-9 && a.max >= 50.0 - 1e-9);
    }

    #[test]
    fn log_range_legalizes_to_decades() {
        let mut a = linear_axis(600.0);
        a.log_scale = true;
        a.data_def = true;
        a.data_min = 0.1;
        a.data_max = 100.0;
        a.legalize_min_max(&mut Scene::new(), None, None, 0, 0);
        assert_eq!(a.major, 10.0);
        assert!((a.min - 0.1).abs() < 1e-12);
        assert!((a.max - 100.0).abs() < 1e-9);
        assert!(a.show_minor_numbers);
    }

    #[test]
    fn coor_is_linear_and_reversible() {
        let mut a = linear_axis(500.0);
        a.min = 0.0;
        a.max = 10.0;
        assert!((a.coor(0.0) - 0.0).abs() < 1e-9);
        assert!((a.coor(10.0) - 500.0).abs() < 1e-9);
        assert!((a.coor(5.0) - 250.0).abs() < 1e-9);
        a.reverse = true;
        assert!((a.coor(0.0) - 500.0).abs() < 1e-9);
    }

    #[test]
    fn major_ticks_lie_on_multiples() {
        let mut a = linear_axis(1000.0);
        a.data_def = true;
        a.data_min = -3.0;
        a.data_max = 17.0;
        a.legalize_min_max(&mut Scene::new(), None, None, 0, 0);
        let m = a.major;
        assert!(m > 0.0);
        let eps = 1e-6 * (a.max - a.min);
        assert!((a.min / m).fract().abs() < eps || ((a.min / m).fract().abs() - 1.0).abs() < eps);
        assert!((a.max / m).fract().abs() < eps || ((a.max / m).fract().abs() - 1.0).abs() < eps);
    }

    #[test]
    fn fixed_numbers_use_min_decimals() {
        let mut a = linear_axis(600.0);
        a.number_format = NumberFormat::Fixed;
        assert_eq!(a.num_to_str(2.5, false), "2.5");
        assert_eq!(a.num_to_str(2.0, false), "2");
        assert_eq!(a.num_to_str(2.0, true), "+2");
    }

    #[test]
    fn magnitude_suffix_steps_by_thousands() {
        let mut a = linear_axis(600.0);
        a.number_format = NumberFormat::Magnitude;
        let mut v = 1.2e6;
        let exp = a.normalize_exponent(&mut v);
        assert_eq!(exp, 6);
        assert!((v - 1.2).abs() < 1e-9);
        let mut v = 2.5e-5;
        let exp = a.normalize_exponent(&mut v);
        assert_eq!(exp, -6);
        assert!((v - 25.0).abs() < 1e-9);
    }
}
