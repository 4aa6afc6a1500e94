//! The top-level script parser.
//!
//! A specifier is a `KEY:` at column 0 with its value on the same line or
//! in an indented block. The key space is closed and case-sensitive;
//! unknown keys, out-of-range numbers and trailing garbage are fatal.
//! Series-style keys keep a persistent state that applies to the current
//! and all subsequent series (one-time color keys excepted), `Series.Data`
//! anchors data blocks into the source for later streaming, and `@`/`@@`
//! lines are collected as annotation anchors.

use crate::chart::Chart;
use crate::ensemble::Ensemble;
use crate::error::Result;
use crate::geom::Pos;
use crate::axis::{AxisStyle, GridStyle, NumberFormat};
use crate::series::marker::MarkerShape;
use crate::series::SeriesType;
use crate::source::Source;
use crate::visual::color::Color;

/// Persistent series-style state; reset by `NewChartInGrid`.
struct SeriesState {
    series_idx_list: Vec<usize>,
    type_list: Vec<SeriesType>,
    defining_series: bool,
    series_type_defined: bool,
    series_type: SeriesType,
    snap: bool,
    prune_dist: f64,
    category_idx: usize,
    global_legend: bool,
    legend_outline: bool,
    staircase: bool,
    axis_y_n: usize,
    series_base: f64,
    style: i64,
    marker_shape: MarkerShape,
    marker_size: f64,
    line_width: f64,
    line_dash: f64,
    line_hole: f64,
    lighten: f64,
    fill_transparency: f64,
    tag_enable: bool,
    tag_pos: Pos,
    tag_size: f64,
    tag_box: bool,
    tag_text_color: Color,
    tag_fill_color: Color,
    tag_line_color: Color,
}

impl Default for SeriesState {
    fn default() -> Self {
        Self {
            series_idx_list: Vec::new(),
            type_list: Vec::new(),
            defining_series: false,
            series_type_defined: false,
            series_type: SeriesType::Line,
            snap: true,
            prune_dist: 0.3,
            category_idx: 0,
            global_legend: false,
            legend_outline: true,
            staircase: false,
            axis_y_n: 0,
            series_base: 0.0,
            style: 0,
            marker_shape: MarkerShape::Circle,
            marker_size: -1.0,
            line_width: -1.0,
            line_dash: -1.0,
            line_hole: -1.0,
            lighten: 0.0,
            fill_transparency: -1.0,
            tag_enable: false,
            tag_pos: Pos::Auto,
            tag_size: 1.0,
            tag_box: false,
            tag_text_color: Color::undef(),
            tag_fill_color: Color::undef(),
            tag_line_color: Color::undef(),
        }
    }
}

pub struct Parser<'a> {
    source: &'a mut Source,
    ensemble: &'a mut Ensemble,
    state: SeriesState,
    grid_max_defined: bool,
    grid_max_row: u32,
    grid_max_col: u32,
    footnote_pos: Pos,
    /// A chart was started without a preceding NewChartInGrid.
    non_newed_chart: bool,
}

/// Parse the whole script into the ensemble.
pub fn parse(source: &mut Source, ensemble: &mut Ensemble) -> Result<()> {
    let mut parser = Parser {
        source,
        ensemble,
        state: SeriesState::default(),
        grid_max_defined: false,
        grid_max_row: 0,
        grid_max_col: 0,
        footnote_pos: Pos::Auto,
        non_newed_chart: false,
    };
    parser.run()
}

fn parse_pos(source: &mut Source) -> Result<(Pos, usize)> {
    let id = source.get_identifier();
    let r = match id.as_str() {
        "Auto" => (Pos::Auto, 0),
        "Center" => (Pos::Center, 0),
        "Left" => (Pos::Left, 0),
        "Right" => (Pos::Right, 0),
        "Top" | "Above" => (Pos::Top, 0),
        "Bottom" | "Below" => (Pos::Bottom, 0),
        "Base" | "BaseY1" | "BasePri" => (Pos::Base, 0),
        "BaseY2" | "BaseSec" => (Pos::Base, 1),
        "End" => (Pos::End, 0),
        "Beyond" => (Pos::Beyond, 0),
        "" => return Err(source.parse_err("position expected", false)),
        _ => {
            return Err(source.parse_err(&format!("unknown position '{id}'"), true));
        }
    };
    Ok(r)
}

fn parse_grid_pos(source: &mut Source) -> Result<Option<(u32, u32, u32, u32)>> {
    source.skip_ws(false)?;
    let Some(row1) = source.get_int64(true) else {
        return Ok(None);
    };
    if !(0..=99).contains(&row1) {
        return Err(source.parse_err("grid row out of range [0;99]", true));
    }
    source.expect_ws("column expected")?;
    let Some(col1) = source.get_int64(true) else {
        return Err(source.parse_err("malformed column", false));
    };
    if !(0..=99).contains(&col1) {
        return Err(source.parse_err("grid column out of range [0;99]", true));
    }

    let mut row2 = row1;
    let mut col2 = col1;
    source.skip_ws(false)?;
    if let Some(r2) = source.get_int64(true) {
        if !(0..=99).contains(&r2) {
            return Err(source.parse_err("grid row out of range [0;99]", true));
        }
        row2 = r2;
        source.expect_ws("column expected")?;
        let Some(c2) = source.get_int64(true) else {
            return Err(source.parse_err("malformed column", false));
        };
        if !(0..=99).contains(&c2) {
            return Err(source.parse_err("grid column out of range [0;99]", true));
        }
        col2 = c2;
    }

    Ok(Some((row1 as u32, col1 as u32, row2 as u32, col2 as u32)))
}

impl Parser<'_> {
    fn run(&mut self) -> Result<()> {
        self.source.load_line()?;

        // Support delivering nothing but data (implicit Series.Data).
        self.parse_series_data()?;

        while self.parse_spec()? {}
        Ok(())
    }

    /// The current chart, creating a single implicit one if needed.
    fn chart(&mut self) -> &mut Chart {
        if self.ensemble.is_empty() {
            self.non_newed_chart = true;
            self.source.save_pos(1);
            self.ensemble.new_chart(0, 0, 0, 0, None, None, false);
        }
        self.ensemble.last_chart()
    }

    fn cur_series(&mut self) -> &mut crate::series::Series {
        let idx = *self.state.series_idx_list.last().expect("a series is being defined");
        &mut self.chart().series_list[idx]
    }

    fn parse_spec(&mut self) -> Result<bool> {
        let mut normal_anno = false;
        let mut global_anno = false;
        loop {
            self.source.skip_ws(true)?;
            if self.source.at_eof() {
                return Ok(false);
            }
            if self.source.at_sol() {
                if self.source.cur_char() == b'@' {
                    if self.source.peek_char(1) == b'@' {
                        if !global_anno {
                            self.ensemble.add_annotation_anchor(self.source);
                        }
                        global_anno = true;
                        normal_anno = false;
                    } else {
                        if !normal_anno {
                            self.chart();
                            let pos = self.source.cur.clone();
                            self.ensemble.last_chart().annotation_anchors.push(pos);
                        }
                        normal_anno = true;
                        global_anno = false;
                    }
                } else {
                    normal_anno = false;
                    global_anno = false;
                }
            }
            if normal_anno || global_anno {
                self.source.next_line()?;
                continue;
            }
            break;
        }

        let key = self.source.get_key()?;

        if let Some(rest) = key.strip_prefix("Axis.") {
            if let Some(dot) = rest.find('.') {
                let axis_id = &rest[..dot];
                let sub = rest[dot + 1..].to_string();
                let which = match axis_id {
                    "X" => AxisSel::X,
                    "Y" | "Y1" | "PriY" => AxisSel::Y(0),
                    "Y2" | "SecY" => AxisSel::Y(1),
                    _ => {
                        return Err(self
                            .source
                            .parse_err(&format!("unknown KEY '{key}'"), true));
                    }
                };
                self.do_axis_key(which, &sub, &key)?;
                return Ok(true);
            }
            return Err(self.source.parse_err(&format!("unknown KEY '{key}'"), true));
        }

        self.do_chart_key(&key)?;
        Ok(true)
    }

    //--------------------------------------------------------------------
    // Chart-level keys.

    fn do_chart_key(&mut self, key: &str) -> Result<()> {
        match key {
            "Margin" => {
                let m = self.ranged_double("margin expected", 0.0, 1000.0, "margin out of range [0;1000]")?;
                self.ensemble.margin = m;
            }
            "BorderColor" => {
                let mut c = self.ensemble.border_color;
                self.source.get_color(&mut c)?;
                self.ensemble.border_color = c;
            }
            "BorderWidth" => {
                let m = self.ranged_double(
                    "border width expected",
                    0.0,
                    1000.0,
                    "border width out of range [0;1000]",
                )?;
                self.ensemble.border_width = m;
            }
            "Padding" => {
                let m = self.ranged_double(
                    "padding expected",
                    0.0,
                    1000.0,
                    "padding out of range [0;1000]",
                )?;
                self.ensemble.padding = m;
            }
            "GridPadding" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("grid padding expected", false));
                }
                let grid_padding = self.source.get_double()?;
                if grid_padding > 1000.0 {
                    return Err(self
                        .source
                        .parse_err("grid padding out of range [-inf;1000]", true));
                }
                let mut area_padding = 0.0;
                self.source.skip_ws(false)?;
                if !self.source.at_eol() {
                    area_padding = self.source.get_double()?;
                    if !(0.0..=1000.0).contains(&area_padding) {
                        return Err(self
                            .source
                            .parse_err("chart area padding out of range [0;1000]", true));
                    }
                }
                self.source.expect_eol()?;
                self.ensemble.grid_padding = grid_padding;
                self.ensemble.area_padding = area_padding;
            }
            "GlobalLegendHeading" => {
                self.ensemble.legend.heading = self.source.get_text(true)?;
            }
            "GlobalLegendFrame" => {
                let frame = self.source.get_switch()?;
                self.source.expect_eol()?;
                self.ensemble.legend_box = frame;
                self.ensemble.legend_box_specified = true;
            }
            "GlobalLegendPos" => self.do_global_legend_pos()?,
            "GlobalLegendSize" => {
                let size = self.ranged_double(
                    "legend size value expected",
                    0.01,
                    100.0,
                    "legend size value out of range",
                )?;
                self.ensemble.legend.size = size;
            }
            "GlobalLegendColor" => {
                let mut c = self.ensemble.legend_color;
                self.source.get_color(&mut c)?;
                self.ensemble.legend_color = c;
            }
            "LetterSpacing" => {
                let (w, h, b) = self.source.get_letter_spacing()?;
                self.ensemble.set_letter_spacing(w, h, b);
            }
            "NewChartInGrid" => self.do_new_chart(false)?,
            "NewChartInChart" => {
                self.do_new_chart(true)?;
                self.ensemble.last_chart().set_padding(12.0, 0.0);
            }
            "ChartPadding" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("padding value expected", false));
                }
                let full_padding = self.source.get_double()?;
                let mut area_padding = 0.0;
                self.source.skip_ws(false)?;
                if !self.source.at_eol() {
                    area_padding = self.source.get_double()?;
                    if area_padding < 0.0 {
                        return Err(self
                            .source
                            .parse_err("negative area padding not allowed", true));
                    }
                }
                self.source.expect_eol()?;
                self.chart().set_padding(full_padding, area_padding);
            }
            "ChartArea" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("width expected", false));
                }
                let Some(w) = self.source.get_int64(true) else {
                    return Err(self.source.parse_err("malformed width", false));
                };
                if !(10..=100_000).contains(&w) {
                    return Err(self.source.parse_err("width out of range [10;100000]", true));
                }
                self.source.expect_ws("height expected")?;
                let Some(h) = self.source.get_int64(true) else {
                    return Err(self.source.parse_err("malformed height", false));
                };
                if !(10..=100_000).contains(&h) {
                    return Err(self.source.parse_err("height out of range [10;100000]", true));
                }
                self.source.expect_eol()?;
                self.chart().set_chart_area(w as f64, h as f64);
            }
            "ChartBox" => {
                let chart_box = self.source.get_switch()?;
                self.source.expect_eol()?;
                self.chart().chart_box = chart_box;
            }
            "ForegroundColor" => {
                let mut c = self.ensemble.foreground_color;
                self.source.get_color(&mut c)?;
                self.ensemble.foreground_color = c;
            }
            "BackgroundColor" => {
                let mut c = self.ensemble.background_color;
                self.source.get_color(&mut c)?;
                self.ensemble.background_color = c;
            }
            "ChartAreaColor" => self.chart_color(|c| &mut c.chart_area_color)?,
            "AxisColor" => self.chart_color(|c| &mut c.axis_color)?,
            "GridColor" => {
                let mut c = Color::undef();
                self.source.get_color(&mut c)?;
                let chart = self.chart();
                chart.axis_x.grid_color = c;
                chart.axis_y[0].grid_color = c;
                chart.axis_y[1].grid_color = c;
            }
            "TextColor" => self.chart_color(|c| &mut c.text_color)?,
            "FrameColor" => self.chart_color(|c| &mut c.frame_color)?,
            "TitleHTML" => {
                self.ensemble.title_html = self.source.get_text(false)?;
            }
            "GlobalTitle" => self.ensemble.title = self.source.get_text(true)?,
            "GlobalSubTitle" => self.ensemble.sub_title = self.source.get_text(true)?,
            "GlobalSubSubTitle" => self.ensemble.sub_sub_title = self.source.get_text(true)?,
            "GlobalTitlePos" => {
                self.source.skip_ws(false)?;
                let (pos, _) = parse_pos(self.source)?;
                self.source.expect_eol()?;
                self.ensemble.title_pos = pos;
            }
            "GlobalTitleSize" => {
                self.ensemble.title_size = self.ranged_double(
                    "title size value expected",
                    0.01,
                    100.0,
                    "title size value out of range",
                )?;
            }
            "GlobalTitleLine" => {
                let line = self.source.get_switch()?;
                self.source.expect_eol()?;
                self.ensemble.title_line = line;
            }
            "Title" => {
                let txt = self.source.get_text(true)?;
                self.chart().title = txt;
            }
            "SubTitle" => {
                let txt = self.source.get_text(true)?;
                self.chart().sub_title = txt;
            }
            "SubSubTitle" => {
                let txt = self.source.get_text(true)?;
                self.chart().sub_sub_title = txt;
            }
            "TitleFrame" => {
                let frame = self.source.get_switch()?;
                self.source.expect_eol()?;
                let chart = self.chart();
                chart.title_box = frame;
                chart.title_box_specified = true;
            }
            "TitlePos" => {
                self.source.skip_ws(false)?;
                let (pos_x, _) = parse_pos(self.source)?;
                let mut pos_y = Pos::Top;
                if !self.source.at_eol() {
                    self.source.expect_ws("")?;
                    if !self.source.at_eol() {
                        pos_y = parse_pos(self.source)?.0;
                    }
                }
                self.source.expect_eol()?;
                self.chart().set_title_pos(Some(pos_x), Some(pos_y));
            }
            "TitleInside" => {
                let inside = self.source.get_switch()?;
                self.source.expect_eol()?;
                self.chart().title_inside = inside;
            }
            "TitleSize" => {
                let size = self.ranged_double(
                    "title size value expected",
                    0.01,
                    100.0,
                    "title size value out of range",
                )?;
                self.chart().title_size = size;
            }
            "Footnote" => {
                let txt = self.source.get_text(true)?;
                self.ensemble.add_footnote(&txt);
                let pos = self.footnote_pos;
                self.ensemble.set_footnote_pos(pos);
            }
            "FootnotePos" => {
                self.source.skip_ws(false)?;
                let (pos, _) = parse_pos(self.source)?;
                self.source.expect_eol()?;
                self.footnote_pos = pos;
                self.ensemble.set_footnote_pos(pos);
            }
            "FootnoteLine" => {
                let line = self.source.get_switch()?;
                self.source.expect_eol()?;
                self.ensemble.footnote_line = line;
            }
            "FootnoteSize" => {
                self.ensemble.footnote_size = self.ranged_double(
                    "footnote size value expected",
                    0.01,
                    100.0,
                    "footnote size value out of range",
                )?;
            }
            "LegendHeading" => {
                let txt = self.source.get_text(true)?;
                self.chart().legend.heading = txt;
            }
            "LegendFrame" => {
                let frame = self.source.get_switch()?;
                self.source.expect_eol()?;
                let chart = self.chart();
                chart.legend_box = frame;
                chart.legend_box_specified = true;
            }
            "LegendPos" => {
                self.source.skip_ws(false)?;
                let (pos1, _) = parse_pos(self.source)?;
                let mut pos2 = None;
                self.source.skip_ws(false)?;
                if !self.source.at_eol() {
                    pos2 = Some(parse_pos(self.source)?.0);
                }
                let mut force_nx = 0u32;
                self.source.skip_ws(false)?;
                if !self.source.at_eol() {
                    if let Some(nx) = self.source.get_int64(true) {
                        if nx < 1 {
                            return Err(self.source.parse_err("invalid legend column count", true));
                        }
                        force_nx = nx as u32;
                    }
                }
                self.source.expect_eol()?;
                let chart = self.chart();
                chart.legend.pos1 = pos1;
                chart.legend.pos2 = pos2;
                chart.legend.force_nx = force_nx;
            }
            "LegendSize" => {
                let size = self.ranged_double(
                    "legend size value expected",
                    0.01,
                    100.0,
                    "legend size value out of range",
                )?;
                self.chart().legend.size = size;
            }
            "BarWidth" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("width expected", false));
                }
                let one_width = self.source.get_double()?;
                if !(0.0..=1.0).contains(&one_width) {
                    return Err(self
                        .source
                        .parse_err("relative width out of range [0.0;1.0]", true));
                }
                let mut all_width = 1.0;
                if !self.source.at_eol() {
                    self.source.expect_ws("")?;
                    if !self.source.at_eol() {
                        all_width = self.source.get_double()?;
                        if !(0.0..=1.0).contains(&all_width) {
                            return Err(self
                                .source
                                .parse_err("relative width out of range [0.0;1.0]", true));
                        }
                    }
                }
                self.source.expect_eol()?;
                self.chart().set_bar_width(one_width, all_width);
            }
            "LayeredBarWidth" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("width expected", false));
                }
                let width = self.source.get_double()?;
                if width <= 0.0 || width > 1.0 {
                    return Err(self.source.parse_err("invalid width", true));
                }
                self.source.expect_eol()?;
                self.chart().bar_layered_width = width;
            }
            "BarMargin" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("margin expected", false));
                }
                let margin = self.source.get_double()?;
                if margin < 0.0 {
                    return Err(self.source.parse_err("invalid margin", true));
                }
                self.source.expect_eol()?;
                self.chart().bar_margin = margin;
            }
            _ if key.starts_with("Series.") => self.do_series_key(key)?,
            _ => {
                return Err(self.source.parse_err(&format!("unknown KEY '{key}'"), true));
            }
        }
        Ok(())
    }

    fn chart_color(&mut self, field: impl Fn(&mut Chart) -> &mut Color) -> Result<()> {
        let mut c = Color::undef();
        self.source.get_color(&mut c)?;
        *field(self.chart()) = c;
        Ok(())
    }

    fn ranged_double(&mut self, missing: &str, lo: f64, hi: f64, range_msg: &str) -> Result<f64> {
        self.source.skip_ws(false)?;
        if self.source.at_eol() {
            return Err(self.source.parse_err(missing, false));
        }
        let v = self.source.get_double()?;
        if !(lo..=hi).contains(&v) {
            return Err(self.source.parse_err(range_msg, true));
        }
        self.source.expect_eol()?;
        Ok(v)
    }

    fn do_new_chart(&mut self, chart_in_chart: bool) -> Result<()> {
        let grid = parse_grid_pos(self.source)?;
        let mut pos1 = None;
        let mut pos2 = None;
        self.source.skip_ws(false)?;
        if !self.source.at_eol() {
            pos1 = Some(parse_pos(self.source)?.0);
            self.source.skip_ws(false)?;
            if !self.source.at_eol() {
                pos2 = Some(parse_pos(self.source)?.0);
            }
        }
        self.source.expect_eol()?;

        let (row1, col1, row2, col2) = match grid {
            Some(g) => g,
            None => {
                if self.grid_max_defined {
                    (self.grid_max_row + 1, 0, self.grid_max_row + 1, self.grid_max_col)
                } else {
                    (0, 0, 0, 0)
                }
            }
        };

        if row1 > row2 || col1 > col2 {
            return Err(self.source.parse_err("malformed grid location", false));
        }

        if self.non_newed_chart {
            self.source.restore_pos(1)?;
            self.source.to_sol();
            return Err(self.source.parse_err(
                "chart specifiers must be preceded by NewChartInGrid for multi chart plots",
                false,
            ));
        }

        let ok =
            self.ensemble.new_chart(row1, col1, row2, col2, pos1, pos2, chart_in_chart);
        if !ok {
            self.source.to_sol();
            return Err(self.source.parse_err("grid collision", false));
        }

        self.grid_max_row = self.grid_max_row.max(row2);
        self.grid_max_col = self.grid_max_col.max(col2);
        self.grid_max_defined = true;

        self.state = SeriesState::default();
        Ok(())
    }

    fn do_global_legend_pos(&mut self) -> Result<()> {
        if let Some((row1, col1, row2, col2)) = parse_grid_pos(self.source)? {
            let mut pos1 = Some(Pos::Auto);
            let mut pos2 = Some(Pos::Auto);
            self.source.skip_ws(false)?;
            if !self.source.at_eol() {
                pos1 = Some(parse_pos(self.source)?.0);
                self.source.skip_ws(false)?;
                if !self.source.at_eol() {
                    pos2 = Some(parse_pos(self.source)?.0);
                }
            }
            self.source.expect_eol()?;
            if !self.ensemble.set_legend_grid_pos(row1, col1, row2, col2, pos1, pos2) {
                return Err(self.source.parse_err("grid collision", false));
            }
        } else {
            let (pos, _) = parse_pos(self.source)?;
            self.source.expect_eol()?;
            self.ensemble.set_legend_pos(pos);
        }
        Ok(())
    }

    //--------------------------------------------------------------------
    // Series keys.

    fn next_series_style(&mut self) {
        self.state.style = (self.state.style + 1) % 80;
    }

    fn apply_marker_size(&mut self) {
        if self.state.marker_size >= 0.0 {
            let size = if self.state.marker_size == 0.0
                && matches!(self.state.series_type, SeriesType::Scatter | SeriesType::Point)
            {
                12.0
            } else {
                self.state.marker_size
            };
            self.cur_series().set_marker_size(size);
        }
    }

    fn add_series(&mut self, name: &str) {
        if !self.state.series_type_defined {
            self.state.series_type = SeriesType::Line;
            self.state.series_type_defined = true;
        }
        let series_type = self.state.series_type;
        self.state.type_list.push(series_type);
        let idx = {
            let chart = self.chart();
            chart.add_series(series_type);
            chart.series_list.len() - 1
        };
        self.state.series_idx_list.push(idx);
        self.state.defining_series = true;

        let style = self.state.style;
        let snap = self.state.snap;
        let prune_dist = self.state.prune_dist;
        let global_legend = self.state.global_legend;
        let legend_outline = self.state.legend_outline;
        let staircase = self.state.staircase;
        let axis_y_n = self.state.axis_y_n;
        let series_base = self.state.series_base;
        {
            let series = self.cur_series();
            series.name = name.to_string();
            series.snap_enable = snap;
            series.set_prune_dist(prune_dist);
            series.global_legend = global_legend;
            series.legend_outline = legend_outline;
            series.staircase = staircase;
            series.axis_y_n = axis_y_n;
            series.base = series_base;
            series.set_style(style);
        }
        self.next_series_style();
        let marker_shape = self.state.marker_shape;
        self.cur_series().marker_shape = marker_shape;
        self.apply_marker_size();
        if self.state.line_width >= 0.0 {
            let w = self.state.line_width;
            self.cur_series().set_line_width(w);
        }
        if self.state.line_dash >= 0.0 {
            let (d, h) = (self.state.line_dash, self.state.line_hole);
            self.cur_series().set_line_dash(d, h);
        }
        if self.state.fill_transparency >= 0.0 {
            let t = self.state.fill_transparency;
            self.cur_series().fill_color.set_transparency(t);
        }
        let lighten = self.state.lighten;
        let tag_enable = self.state.tag_enable;
        let tag_pos = self.state.tag_pos;
        let tag_size = self.state.tag_size;
        let tag_box = self.state.tag_box;
        let (tc, fc, lc) =
            (self.state.tag_text_color, self.state.tag_fill_color, self.state.tag_line_color);
        let series = self.cur_series();
        series.line_color.lighten(lighten);
        series.fill_color.lighten(lighten);
        series.tag_enable = tag_enable;
        series.tag_pos = tag_pos;
        series.tag_size = tag_size;
        series.tag_box = tag_box;
        series.tag_text_color = tc;
        series.tag_fill_color = fc;
        series.tag_line_color = lc;
    }

    fn do_series_key(&mut self, key: &str) -> Result<()> {
        match key {
            "Series.Type" => {
                self.source.skip_ws(false)?;
                let id = self.source.get_identifier();
                match SeriesType::parse(&id) {
                    Some(t) => self.state.series_type = t,
                    None => {
                        if id.is_empty() {
                            return Err(self.source.parse_err("series type expected", false));
                        }
                        return Err(self
                            .source
                            .parse_err(&format!("unknown series type '{id}'"), true));
                    }
                }
                self.source.expect_eol()?;
                self.state.series_type_defined = true;
            }
            "Series.New" => {
                let txt = self.source.get_text(true)?;
                self.add_series(&txt);
            }
            "Series.Snap" => {
                self.state.snap = self.source.get_switch()?;
                self.source.expect_eol()?;
                if self.state.defining_series {
                    let snap = self.state.snap;
                    self.cur_series().snap_enable = snap;
                }
            }
            "Series.Prune" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("prune distance expected", false));
                }
                let d = self.source.get_double()?;
                if !(0.0..=100.0).contains(&d) {
                    return Err(self
                        .source
                        .parse_err("prune distance out of range [0;100]", true));
                }
                self.source.expect_eol()?;
                self.state.prune_dist = d;
                if self.state.defining_series {
                    self.cur_series().set_prune_dist(d);
                }
            }
            "Series.GlobalLegend" => {
                self.state.global_legend = self.source.get_switch()?;
                self.source.expect_eol()?;
                if self.state.defining_series {
                    let v = self.state.global_legend;
                    self.cur_series().global_legend = v;
                }
            }
            "Series.LegendOutline" => {
                self.state.legend_outline = self.source.get_switch()?;
                self.source.expect_eol()?;
                if self.state.defining_series {
                    let v = self.state.legend_outline;
                    self.cur_series().legend_outline = v;
                }
            }
            "Series.Staircase" => {
                self.state.staircase = self.source.get_switch()?;
                self.source.expect_eol()?;
                if self.state.defining_series {
                    let v = self.state.staircase;
                    self.cur_series().staircase = v;
                }
            }
            "Series.Axis" => {
                self.source.skip_ws(false)?;
                let n = self.source.get_axis()?;
                self.source.expect_eol()?;
                self.state.axis_y_n = n;
                if self.state.defining_series {
                    self.cur_series().axis_y_n = n;
                }
            }
            "Series.Base" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("base expected", false));
                }
                let base = self.source.get_double()?;
                self.source.expect_eol()?;
                self.state.series_base = base;
                if self.state.defining_series {
                    self.cur_series().base = base;
                }
            }
            "Series.Style" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("style expected", false));
                }
                let Some(style) = self.source.get_int64(true) else {
                    return Err(self.source.parse_err("malformed style", false));
                };
                if !(0..=79).contains(&style) {
                    return Err(self.source.parse_err("style out of range [0;79]", true));
                }
                self.source.expect_eol()?;
                self.state.style = style;
                if self.state.defining_series {
                    let lighten = self.state.lighten;
                    let series = self.cur_series();
                    series.set_style(style);
                    series.line_color.lighten(lighten);
                    series.fill_color.lighten(lighten);
                    series.tag_text_color.set_undef();
                    series.tag_fill_color.set_undef();
                    series.tag_line_color.set_undef();
                    self.next_series_style();
                }
                self.state.marker_size = -1.0;
                self.state.line_width = -1.0;
                self.state.line_dash = -1.0;
                self.state.line_hole = -1.0;
                self.state.fill_transparency = -1.0;
                self.state.tag_text_color.set_undef();
                self.state.tag_fill_color.set_undef();
                self.state.tag_line_color.set_undef();
            }
            "Series.MarkerShape" => {
                self.source.skip_ws(false)?;
                let id = self.source.get_identifier();
                match MarkerShape::parse(&id) {
                    Some(shape) => self.state.marker_shape = shape,
                    None => {
                        if id.is_empty() {
                            return Err(self.source.parse_err("marker shape expected", false));
                        }
                        return Err(self
                            .source
                            .parse_err(&format!("unknown marker shape '{id}'"), true));
                    }
                }
                self.source.expect_eol()?;
                if self.state.defining_series {
                    let shape = self.state.marker_shape;
                    self.cur_series().marker_shape = shape;
                }
            }
            "Series.MarkerSize" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("marker size expected", false));
                }
                let size = self.source.get_double()?;
                if !(0.0..=100.0).contains(&size) {
                    return Err(self.source.parse_err("marker size out of range [0;100]", true));
                }
                self.source.expect_eol()?;
                self.state.marker_size = size;
                if self.state.defining_series {
                    self.apply_marker_size();
                }
            }
            "Series.LineWidth" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("line width expected", false));
                }
                let w = self.source.get_double()?;
                if !(0.0..=100.0).contains(&w) {
                    return Err(self.source.parse_err("line width out of range [0;100]", true));
                }
                self.source.expect_eol()?;
                self.state.line_width = w;
                if self.state.defining_series {
                    self.cur_series().set_line_width(w);
                }
            }
            "Series.LineDash" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("line dash expected", false));
                }
                let dash = self.source.get_double()?;
                if !(0.0..=100.0).contains(&dash) {
                    return Err(self.source.parse_err("line dash out of range [0;100]", true));
                }
                let mut hole = dash;
                if !self.source.at_eol() {
                    self.source.expect_ws("")?;
                    if !self.source.at_eol() {
                        hole = self.source.get_double()?;
                        if !(0.0..=100.0).contains(&hole) {
                            return Err(self
                                .source
                                .parse_err("line hole out of range [0;100]", true));
                        }
                    }
                }
                self.source.expect_eol()?;
                self.state.line_dash = dash;
                self.state.line_hole = hole;
                if self.state.defining_series {
                    self.cur_series().set_line_dash(dash, hole);
                }
            }
            "Series.Lighten" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("lighten value expected", false));
                }
                let lighten = self.source.get_double()?;
                if !(-1.0..=1.0).contains(&lighten) {
                    return Err(self
                        .source
                        .parse_err("lighten value out of range [-1.0;1.0]", true));
                }
                self.source.expect_eol()?;
                self.state.lighten = lighten;
                if self.state.defining_series {
                    let series = self.cur_series();
                    series.line_color.lighten(lighten);
                    series.fill_color.lighten(lighten);
                }
            }
            "Series.FillTransparency" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("transparency value expected", false));
                }
                let t = self.source.get_double()?;
                if !(0.0..=1.0).contains(&t) {
                    return Err(self
                        .source
                        .parse_err("transparency value out of range [0.0;1.0]", true));
                }
                self.source.expect_eol()?;
                self.state.fill_transparency = t;
                if self.state.defining_series {
                    self.cur_series().fill_color.set_transparency(t);
                }
            }
            "Series.Color" => {
                if !self.state.defining_series {
                    return Err(self.source.parse_err("Color outside defining series", false));
                }
                let mut c = Color::undef();
                let transparency = self.source.get_color_full(&mut c)?;
                let lighten = self.state.lighten;
                let fill_transparency = self.state.fill_transparency;
                let series = self.cur_series();
                series.line_color = c;
                series.line_color.lighten(lighten).set_transparency(0.0);
                series.set_default_fill_color();
                if let Some(t) = transparency {
                    series.fill_color.set_transparency(t);
                } else if fill_transparency >= 0.0 {
                    series.fill_color.set_transparency(fill_transparency);
                }
            }
            "Series.LineColor" => {
                if !self.state.defining_series {
                    return Err(self
                        .source
                        .parse_err("LineColor outside defining series", false));
                }
                let mut c = Color::undef();
                self.source.get_color(&mut c)?;
                let lighten = self.state.lighten;
                let series = self.cur_series();
                series.line_color = c;
                series.line_color.lighten(lighten);
            }
            "Series.FillColor" => {
                if !self.state.defining_series {
                    return Err(self
                        .source
                        .parse_err("FillColor outside defining series", false));
                }
                let mut c = Color::undef();
                self.source.get_color(&mut c)?;
                let lighten = self.state.lighten;
                let fill_transparency = self.state.fill_transparency;
                let series = self.cur_series();
                series.fill_color = c;
                series.fill_color.lighten(lighten);
                if fill_transparency >= 0.0 {
                    series.fill_color.set_transparency(fill_transparency);
                }
            }
            "Series.Tag" => {
                self.state.tag_enable = self.source.get_switch()?;
                self.source.expect_eol()?;
                if self.state.defining_series {
                    let v = self.state.tag_enable;
                    self.cur_series().tag_enable = v;
                }
            }
            "Series.TagPos" => {
                self.source.skip_ws(false)?;
                let (pos, _) = parse_pos(self.source)?;
                self.source.expect_eol()?;
                self.state.tag_pos = pos;
                if self.state.defining_series {
                    self.cur_series().tag_pos = pos;
                }
            }
            "Series.TagSize" => {
                let size = self.ranged_double(
                    "tag size value expected",
                    0.01,
                    100.0,
                    "tag size value out of range",
                )?;
                self.state.tag_size = size;
                if self.state.defining_series {
                    self.cur_series().tag_size = size;
                }
            }
            "Series.TagBox" => {
                self.state.tag_box = self.source.get_switch()?;
                self.source.expect_eol()?;
                if self.state.defining_series {
                    let v = self.state.tag_box;
                    self.cur_series().tag_box = v;
                }
            }
            "Series.TagTextColor" => {
                let mut c = self.state.tag_text_color;
                self.source.get_color(&mut c)?;
                self.state.tag_text_color = c;
                if self.state.defining_series {
                    self.cur_series().tag_text_color = c;
                }
            }
            "Series.TagFillColor" => {
                let mut c = self.state.tag_fill_color;
                self.source.get_color(&mut c)?;
                self.state.tag_fill_color = c;
                if self.state.defining_series {
                    self.cur_series().tag_fill_color = c;
                }
            }
            "Series.TagLineColor" => {
                let mut c = self.state.tag_line_color;
                self.source.get_color(&mut c)?;
                self.state.tag_line_color = c;
                if self.state.defining_series {
                    self.cur_series().tag_line_color = c;
                }
            }
            "Series.Data" => {
                self.source.expect_eol()?;
                self.source.next_line()?;
                self.parse_series_data()?;
            }
            _ => {
                return Err(self.source.parse_err(&format!("unknown KEY '{key}'"), true));
            }
        }
        Ok(())
    }

    //--------------------------------------------------------------------
    // Series data blocks.

    fn parse_series_data(&mut self) -> Result<()> {
        self.state.defining_series = false;

        let mut y_values: u32 = 0;
        let mut rows: usize = 0;
        let mut no_x_value = false;

        // Pre-scan the data block: detect text X-values, count rows and
        // Y-columns, stop at the next specifier.
        {
            self.source.save_pos(0);
            let mut x_is_text = false;
            while !self.source.at_eof() {
                self.source.skip_ws(true)?;
                if self.source.at_eof() {
                    break;
                }
                let at_sol = self.source.at_sol();
                let mut got_number = false;
                if !x_is_text {
                    got_number = self.source.try_get_double_or_none()?.is_some();
                }
                if !got_number {
                    let (t, quoted) = self.source.get_category_quoted()?;
                    if !quoted && !t.is_empty() && at_sol {
                        if t.contains(':') {
                            break;
                        }
                        let idx = self.source.cur.loc.char_idx;
                        self.source.skip_ws(false)?;
                        if self.source.cur_char() == b':' {
                            break;
                        }
                        self.source.cur.loc.char_idx = idx;
                    }
                    x_is_text = true;
                }
                rows += 1;
                let mut n: u32 = 0;
                while self.source.at_ws() {
                    self.source.skip_ws(false)?;
                    if self.source.at_eol() {
                        break;
                    }
                    while !self.source.at_sep() {
                        self.source.get_char();
                    }
                    n += 1;
                }
                y_values = y_values.max(n);
                self.source.expect_eol()?;
            }
            if rows == 0 {
                if !self.source.at_eof() {
                    self.source.to_sol();
                }
                return Ok(());
            }
            if self.state.series_type_defined {
                if !x_is_text
                    && y_values == 0
                    && self.state.series_type.is_cat()
                {
                    no_x_value = true;
                }
            } else {
                if !x_is_text {
                    no_x_value = true;
                    y_values += 1;
                }
                self.state.series_type = SeriesType::Line;
                self.state.series_type_defined = true;
            }
            if y_values == 0 {
                y_values = 1;
            }
            self.source.restore_pos(0)?;
        }

        // Auto-add new series as needed.
        for i in 0..y_values as usize {
            let need = self.state.series_idx_list.len() == i || {
                let pos = self.state.series_idx_list.len() - i - 1;
                let idx = self.state.series_idx_list[pos];
                self.chart().series_list[idx].datum_num > 0
            };
            if need {
                self.add_series("");
            }
        }

        // All referenced series must agree on the X kind.
        let mut x_is_num = false;
        let mut x_is_txt = false;
        for i in 0..y_values as usize {
            let t = self.state.type_list[self.state.type_list.len() - i - 1];
            if t.is_cat() {
                x_is_txt = true;
            } else {
                x_is_num = true;
            }
        }
        if x_is_num && x_is_txt {
            return Err(self.source.parse_err(
                "cannot mix XY/Scatter series types with other series types",
                false,
            ));
        }

        self.source.skip_ws(true)?;
        self.source.to_sol();

        let cat_ofs = self.state.category_idx;
        for i in 0..y_values as usize {
            let pos = self.state.series_idx_list.len() + i - y_values as usize;
            let idx = self.state.series_idx_list[pos];
            let Parser { source, ensemble, .. } = self;
            ensemble.last_chart().series_list[idx].set_datum_anchor(
                source,
                rows,
                cat_ofs,
                no_x_value,
                i as u32,
            );
        }

        let mut remaining = rows;
        while remaining > 0 {
            remaining -= 1;
            self.source.skip_ws(true)?;
            if x_is_txt {
                if !no_x_value {
                    let cat = self.source.get_category()?;
                    self.chart().parsed_cat(&cat);
                } else {
                    self.chart().parsed_cat("");
                }
                self.state.category_idx += 1;
            } else {
                self.source.get_double_or_none()?;
            }
            for _ in 0..y_values {
                self.source.skip_ws(false)?;
                if !self.source.at_eol() {
                    self.source.get_double_or_none()?;
                }
            }
            self.source.expect_eol()?;
        }

        self.state.defining_series = false;
        Ok(())
    }

    //--------------------------------------------------------------------
    // Axis keys.

    fn axis_mut(&mut self, which: AxisSel) -> &mut crate::axis::Axis {
        let chart = self.ensemble.last_chart();
        match which {
            AxisSel::X => &mut chart.axis_x,
            AxisSel::Y(n) => &mut chart.axis_y[n],
        }
    }

    fn do_axis_key(&mut self, which: AxisSel, sub: &str, full: &str) -> Result<()> {
        // Materialize the implicit chart before touching an axis.
        self.chart();

        match sub {
            "Orientation" => {
                self.source.skip_ws(false)?;
                let id = self.source.get_identifier();
                let mut vertical = match id.as_str() {
                    "Horizontal" => false,
                    "Vertical" => true,
                    "" => return Err(self.source.parse_err("axis orientation expected", false)),
                    _ => {
                        return Err(self
                            .source
                            .parse_err(&format!("unknown axis orientation '{id}'"), true));
                    }
                };
                self.source.expect_eol()?;
                if !matches!(which, AxisSel::X) {
                    vertical = !vertical;
                }
                let chart = self.ensemble.last_chart();
                chart.axis_x.set_angle(if vertical { 90 } else { 0 });
                chart.axis_y[0].set_angle(if vertical { 0 } else { 90 });
                chart.axis_y[1].set_angle(if vertical { 0 } else { 90 });
            }
            "Reverse" => {
                let reverse = self.source.get_switch()?;
                self.source.expect_eol()?;
                self.axis_mut(which).set_reverse(reverse);
            }
            "Style" => {
                self.source.skip_ws(false)?;
                let id = self.source.get_identifier();
                let style = match id.as_str() {
                    "Auto" => AxisStyle::Auto,
                    "None" => AxisStyle::None,
                    "Line" => AxisStyle::Line,
                    "Arrow" => AxisStyle::Arrow,
                    "Edge" => AxisStyle::Edge,
                    "" => return Err(self.source.parse_err("axis style expected", false)),
                    _ => {
                        return Err(self
                            .source
                            .parse_err(&format!("unknown axis style '{id}'"), true));
                    }
                };
                self.source.expect_eol()?;
                self.axis_mut(which).set_style(style);
            }
            "Label" => {
                let txt = self.source.get_text(true)?;
                self.axis_mut(which).set_label(&txt);
            }
            "SubLabel" => {
                let txt = self.source.get_text(true)?;
                self.axis_mut(which).set_sub_label(&txt);
            }
            "LabelSize" => {
                let size = self.ranged_double(
                    "label size value expected",
                    0.01,
                    100.0,
                    "label size value out of range",
                )?;
                self.axis_mut(which).set_label_size(size);
            }
            "Unit" => {
                let txt = self.source.get_text(true)?;
                self.axis_mut(which).set_unit(&txt);
            }
            "UnitPos" => {
                self.source.skip_ws(false)?;
                let (pos, _) = parse_pos(self.source)?;
                self.source.expect_eol()?;
                self.axis_mut(which).set_unit_pos(pos);
            }
            "LogScale" => {
                let log_scale = self.source.get_switch()?;
                self.source.expect_eol()?;
                self.axis_mut(which).set_log_scale(log_scale);
            }
            "Range" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("min expected", false));
                }
                let min = self.source.get_double()?;
                self.source.expect_ws("max expected")?;
                let max = self.source.get_double()?;
                if max <= min {
                    return Err(self.source.parse_err("max must be greater than min", true));
                }
                let mut cross = 0.0;
                if !self.source.at_eol() {
                    self.source.expect_ws("")?;
                    if !self.source.at_eol() {
                        cross = self.source.get_double()?;
                    }
                }
                self.source.expect_eol()?;
                self.axis_mut(which).set_range(min, max, cross);
            }
            "Pos" => {
                self.source.skip_ws(false)?;
                let (pos, axis_y_n) = parse_pos(self.source)?;
                self.source.expect_eol()?;
                self.axis_mut(which).set_pos(pos, axis_y_n);
            }
            "Tick" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("major tick expected", false));
                }
                let major = self.source.get_double()?;
                if major <= 0.0 {
                    return Err(self.source.parse_err("major tick must be positive", true));
                }
                self.source.expect_ws("minor tick expected")?;
                let Some(minor) = self.source.get_int64(true) else {
                    return Err(self.source.parse_err("malformed minor tick", false));
                };
                if !(0..=100).contains(&minor) {
                    return Err(self.source.parse_err("minor tick out of range [0;100]", true));
                }
                self.source.expect_eol()?;
                self.axis_mut(which).set_tick(major, minor as i32);
            }
            "TickSpacing" => {
                self.source.skip_ws(false)?;
                if self.source.at_eol() {
                    return Err(self.source.parse_err("start expected", false));
                }
                let Some(start) = self.source.get_int64(true) else {
                    return Err(self.source.parse_err("malformed start", false));
                };
                if start < 0 {
                    return Err(self.source.parse_err("invalid start position", true));
                }
                let mut stride = 1i64;
                self.source.skip_ws(false)?;
                if let Some(s) = self.source.get_int64(true) {
                    if s < 1 {
                        return Err(self
                            .source
                            .parse_err("stride must be greater than zero", true));
                    }
                    stride = s;
                }
                self.source.expect_eol()?;
                self.axis_mut(which).set_tick_spacing(start, stride);
            }
            "Grid" => {
                let major = self.source.get_switch()?;
                let mut minor = major;
                if !self.source.at_eol() {
                    self.source.expect_ws("")?;
                    if !self.source.at_eol() {
                        minor = self.source.get_switch()?;
                    }
                }
                self.source.expect_eol()?;
                self.axis_mut(which).set_grid(major, minor);
            }
            "GridStyle" => {
                self.source.skip_ws(false)?;
                let id = self.source.get_identifier();
                let style = match id.as_str() {
                    "Auto" => GridStyle::Auto,
                    "Dash" => GridStyle::Dash,
                    "Solid" => GridStyle::Solid,
                    "" => return Err(self.source.parse_err("grid style expected", false)),
                    _ => {
                        return Err(self
                            .source
                            .parse_err(&format!("unknown grid style '{id}'"), true));
                    }
                };
                self.source.expect_eol()?;
                self.axis_mut(which).set_grid_style(style);
            }
            "GridColor" => {
                let mut c = Color::undef();
                self.source.get_color(&mut c)?;
                self.axis_mut(which).grid_color = c;
            }
            "NumberFormat" => {
                self.source.skip_ws(false)?;
                let id = self.source.get_identifier();
                let format = match id.as_str() {
                    "Auto" => NumberFormat::Auto,
                    "None" => NumberFormat::None,
                    "Fixed" => NumberFormat::Fixed,
                    "Scientific" => NumberFormat::Scientific,
                    "Magnitude" => NumberFormat::Magnitude,
                    "" => return Err(self.source.parse_err("number format expected", false)),
                    _ => {
                        return Err(self
                            .source
                            .parse_err(&format!("unknown number format '{id}'"), true));
                    }
                };
                self.source.expect_eol()?;
                self.axis_mut(which).set_number_format(format);
            }
            "NumberSign" => {
                let sign = self.source.get_switch()?;
                self.source.expect_eol()?;
                self.axis_mut(which).set_number_sign(sign);
            }
            "NumberUnit" => {
                let mut txt = self.source.get_text(false)?;
                // Leading underscores encode leading spaces.
                let lead = txt.chars().take_while(|c| *c == '_').count();
                txt.replace_range(..lead, &" ".repeat(lead));
                self.axis_mut(which).set_number_unit(&txt);
            }
            "MinorNumber" => {
                let minor = self.source.get_switch()?;
                self.source.expect_eol()?;
                self.axis_mut(which).set_show_minor_numbers(minor);
            }
            "NumberPos" => {
                self.source.skip_ws(false)?;
                let (pos, _) = parse_pos(self.source)?;
                self.source.expect_eol()?;
                self.axis_mut(which).set_number_pos(pos);
            }
            "NumberSize" => {
                let size = self.ranged_double(
                    "number size value expected",
                    0.01,
                    100.0,
                    "number size value out of range",
                )?;
                self.axis_mut(which).set_number_size(size);
            }
            _ => {
                return Err(self.source.parse_err(&format!("unknown KEY '{full}'"), true));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum AxisSel {
    X,
    Y(usize),
}
