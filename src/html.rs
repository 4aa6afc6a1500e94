//! Interactive-document support: snap point bookkeeping during series
//! rendering, and the JSON data payload plus HTML wrapping emitted for the
//! viewer script.

use ahash::AHashSet;
use serde_json::{json, Value};

use crate::axis::NumberFormat;
use crate::geom::{BoundaryBox, Point};

/// Spatial-hash density for snap points: buckets are `1/SNAP_FACTOR` units,
/// bounding the number of retained snap points per screen area.
pub const SNAP_FACTOR: f64 = 0.25;

/// Hashable identity of a point (bit pattern of the coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointKey(u64, u64);

impl PointKey {
    pub fn of(p: Point) -> Self {
        Self(p.x.to_bits(), p.y.to_bits())
    }
}

/// A data point recorded for the interactive document.
#[derive(Debug, Clone)]
pub struct SnapPoint {
    pub p: Point,
    pub cat_idx: usize,
    pub tag_x: String,
    pub tag_y: String,
}

/// Per-series interactive-document state.
#[derive(Debug, Default)]
pub struct SeriesHtml {
    pub has_snap: bool,
    pub snap_points: Vec<SnapPoint>,
    pub uncommitted: Vec<SnapPoint>,
    pub preserve_set: AHashSet<PointKey>,
    pub line_color_same_cnt: u32,
    pub fill_color_same_cnt: u32,
    pub legend_bb: Option<BoundaryBox>,
}

/// Which chart axis backs a payload axis slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisRef {
    X,
    Y(usize),
}

/// One of the four axis descriptors of the payload.
#[derive(Debug, Clone)]
pub struct AxisDescriptor {
    pub source: AxisRef,
    pub is_cat: bool,
    pub number_format: NumberFormat,
    pub number_sign: bool,
    pub logarithmic: bool,
    pub val1: f64,
    pub val2: f64,
}

/// Per-chart interactive-document state.
#[derive(Debug, Default)]
pub struct ChartHtml {
    pub snap_set: AHashSet<u64>,
    pub cat_set: AHashSet<usize>,
    /// All snap points are in one line per category; false when multiple
    /// bars share a category.
    pub all_inline: bool,
    /// The chart X-axis is vertical.
    pub axis_swap: bool,
    pub x_axis: [Option<AxisDescriptor>; 2],
    pub y_axis: [Option<AxisDescriptor>; 2],
}

impl ChartHtml {
    pub fn new() -> Self {
        Self { all_inline: true, ..Self::default() }
    }
}

/// The sink series rendering feeds snap points into.
pub struct HtmlSink<'a> {
    pub series: &'a mut SeriesHtml,
    pub chart: &'a mut ChartHtml,
    pub is_cat: bool,
    pub category_num: usize,
    pub x_len: f64,
}

impl HtmlSink<'_> {
    /// Is the category at `cat_idx` dense enough to snap? Thins an
    /// oversized category count evenly over the axis length.
    pub fn snap_cat(&self, cat_idx: usize) -> bool {
        snap_cat(self.category_num, self.x_len, cat_idx)
    }

    fn snap_key(p: Point) -> u64 {
        let x = (p.x * SNAP_FACTOR).floor() as i64 as u64;
        let y = (p.y * SNAP_FACTOR).floor() as i64 as u64;
        (y << 32) | (x & 0xffff_ffff)
    }

    /// Claim the spatial-hash bucket of `p`; true if it was free.
    pub fn allocate_snap(&mut self, p: Point) -> bool {
        self.chart.snap_set.insert(Self::snap_key(p))
    }

    /// Record a (not yet committed) snap point.
    pub fn record(&mut self, p: Point, cat_idx: usize, tag_x: &str, tag_y: &str) {
        self.series.uncommitted.push(SnapPoint {
            p,
            cat_idx,
            tag_x: if self.is_cat { String::new() } else { tag_x.to_string() },
            tag_y: tag_y.to_string(),
        });
        self.series.has_snap = true;
    }

    /// Instruct that the given point survived pruning and must be kept.
    pub fn preserve(&mut self, p: Point) {
        self.series.preserve_set.insert(PointKey::of(p));
    }

    /// Commit recorded points: preserved points (and snappable categories)
    /// always make it; the remainder only if their spatial-hash bucket is
    /// still free.
    pub fn commit(&mut self, force: bool) {
        // Do not commit small batches eagerly, as this increases the chance
        // of dropping non-preservable points that would fit.
        if !force && self.series.uncommitted.len() < 100_000 {
            return;
        }
        let uncommitted = std::mem::take(&mut self.series.uncommitted);
        for sp in &uncommitted {
            let add = self.series.preserve_set.contains(&PointKey::of(sp.p))
                || (self.is_cat && self.snap_cat(sp.cat_idx));
            if add {
                if self.is_cat {
                    self.chart.cat_set.insert(sp.cat_idx);
                }
                self.allocate_snap(sp.p);
                self.series.snap_points.push(sp.clone());
            }
        }
        for sp in uncommitted {
            if self.allocate_snap(sp.p) {
                if self.is_cat {
                    self.chart.cat_set.insert(sp.cat_idx);
                }
                self.series.snap_points.push(sp);
            }
        }
    }
}

/// Control characters are not representable in the payload; replace them.
pub fn js_quote(s: &str) -> Value {
    Value::String(s.chars().map(|c| if (c as u32) < 32 { ' ' } else { c }).collect())
}

pub fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Payload rendering of a number format.
pub fn format_name(f: NumberFormat) -> &'static str {
    match f {
        NumberFormat::Magnitude => "Engineering",
        NumberFormat::Scientific => "Scientific",
        _ => "Fixed",
    }
}

/// Is the category at `cat_idx` dense enough to snap, outside a sink?
pub fn snap_cat(category_num: usize, x_len: f64, cat_idx: usize) -> bool {
    if category_num as f64 <= x_len {
        return true;
    }
    let mut x = cat_idx;
    let a = category_num - 1;
    let b = (SNAP_FACTOR * x_len) as usize;
    if a == 0 || b == 0 {
        return false;
    }
    if x >= a / 2 {
        x = a - x;
    }
    let i = (x * b + a / 2) / a;
    let p = (i * a + b / 2) / b;
    x == p
}

/// Lookup table from axis backing to payload slot index.
pub fn axis_slot(slots: &[Option<AxisDescriptor>; 2], source: AxisRef) -> Option<usize> {
    slots
        .iter()
        .position(|d| d.as_ref().map(|d| d.source) == Some(source))
}

fn axis_array(slots: &[Option<AxisDescriptor>; 2]) -> Value {
    let entries: Vec<Value> = slots
        .iter()
        .map(|slot| match slot {
            None => json!({ "show": false }),
            Some(d) => json!({
                "show": true,
                "areaVal1": d.val1,
                "areaVal2": d.val2,
                "isX": d.source == AxisRef::X,
                "isCategory": d.is_cat,
                "logarithmic": d.logarithmic,
                "showSign": d.number_sign,
                "format": format_name(d.number_format),
            }),
        })
        .collect();
    Value::Array(entries)
}

/// The data payload of one chart, consumed by the viewer script.
fn gen_chart_data(ensemble: &crate::ensemble::Ensemble, chart_idx: usize) -> Value {
    use crate::visual::color::{make_color_visible, Color};

    let chart = &ensemble.charts[chart_idx];
    let chart_bb = ensemble.scene.bbox(chart.svg_g);

    // Screen coordinates: y negated.
    let area = json!({
        "x1": round3(chart.g_dx),
        "y1": round3(-(chart.g_dy + chart.chart_h)),
        "x2": round3(chart.g_dx + chart.chart_w),
        "y2": round3(-chart.g_dy),
    });
    let chart_rect = json!({
        "x1": round3(chart_bb.min.x),
        "y1": round3(-chart_bb.max.y),
        "x2": round3(chart_bb.max.x),
        "y2": round3(-chart_bb.min.y),
    });

    let mut bg_color = if !chart.chart_area_color.is_clear() {
        chart.chart_area_color
    } else {
        ensemble.background_color
    };
    if bg_color.is_clear() {
        bg_color = Color::white();
    }

    let mut crosshair_line = chart.axis_color;
    make_color_visible(&mut crosshair_line, &bg_color, 0.3);
    let crosshair_fill = bg_color;
    let axis_box_line = crosshair_line;
    let mut axis_box_fill = Color::undef();
    axis_box_fill.set_against(&crosshair_fill, &crosshair_line, 0.2);
    let highlight = Color::parse("gold").expect("named color");

    // Count near-identical legend colors between snap-enabled series so
    // the most distinctive color is picked per series.
    let mut same_cnt = vec![(0u32, 0u32); chart.series_list.len()];
    for (i, s1) in chart.series_list.iter().enumerate() {
        if !s1.html.has_snap {
            continue;
        }
        for (k, s2) in chart.series_list.iter().enumerate() {
            if i == k || !s2.html.has_snap {
                continue;
            }
            if s1.line_color_shown
                && s2.line_color_shown
                && Color::diff(&s1.line_color, &s2.line_color) < 0.1
            {
                same_cnt[i].0 += 1;
            }
            if s1.fill_color_shown
                && s2.fill_color_shown
                && Color::diff(&s1.fill_color, &s2.fill_color) < 0.1
            {
                same_cnt[i].1 += 1;
            }
        }
    }

    let mut series_list: Vec<Value> = Vec::new();
    for (idx, series) in chart.series_list.iter().enumerate() {
        let mut entry = serde_json::Map::new();
        if let Some(bb) = &series.html.legend_bb {
            let mut bb = *bb;
            if !series.global_legend {
                bb.translate(chart.g_dx, chart.g_dy);
            }
            entry.insert(
                "legendBB".to_string(),
                json!({
                    "x1": round3(bb.min.x),
                    "y1": round3(-bb.max.y),
                    "x2": round3(bb.max.x),
                    "y2": round3(-bb.min.y),
                }),
            );
        }
        if let Some(i) = axis_slot(&chart.html.x_axis, AxisRef::X)
            .or_else(|| axis_slot(&chart.html.x_axis, AxisRef::Y(series.axis_y_n)))
        {
            entry.insert("axisX".to_string(), json!(i));
        }
        if let Some(i) = axis_slot(&chart.html.y_axis, AxisRef::X)
            .or_else(|| axis_slot(&chart.html.y_axis, AxisRef::Y(series.axis_y_n)))
        {
            entry.insert("axisY".to_string(), json!(i));
        }
        {
            let mut c1 = series.line_color;
            let mut c2 = series.fill_color;
            if !series.line_color_shown {
                c1 = bg_color;
            }
            if !series.fill_color_shown {
                c2 = bg_color;
            }
            c1.set_transparency(0.0);
            c2.set_transparency(0.0);
            let d1 = Color::diff(&c1, &bg_color);
            let d2 = Color::diff(&c2, &bg_color);
            let mut fg = c1;
            if series.fill_color_shown
                && (!series.line_color_shown
                    || (d1 < 0.1 && d2 > d1)
                    || (d1 > 0.1 && d2 > 0.1 && same_cnt[idx].1 < same_cnt[idx].0))
            {
                fg = c2;
            }
            let mut bg = bg_color;
            if !fg.is_clear() {
                bg.set_against(&bg_color, &fg, 0.2);
            }
            let mut tx = chart.axis_color;
            make_color_visible(&mut tx, &bg_color, 0.3);
            entry.insert("fgColor".to_string(), json!(fg.svg()));
            entry.insert("bgColor".to_string(), json!(bg.svg()));
            entry.insert("txColor".to_string(), json!(tx.svg()));
        }
        series_list.push(Value::Object(entry));
    }

    let mut snap_points: Vec<Value> = Vec::new();
    for series in &chart.series_list {
        for sp in &series.html.snap_points {
            let x_val = if series.is_cat {
                json!(sp.cat_idx)
            } else {
                js_quote(&sp.tag_x)
            };
            snap_points.push(json!({
                "s": series.id,
                "x": x_val,
                "y": js_quote(&sp.tag_y),
                "X": round3(sp.p.x + chart.g_dx),
                "Y": round3(-(sp.p.y + chart.g_dy)),
            }));
        }
    }

    let mut data = serde_json::Map::new();
    data.insert("backgroundColor".to_string(), json!(bg_color.svg()));
    data.insert("crosshairLineColor".to_string(), json!(crosshair_line.svg()));
    data.insert("crosshairFillColor".to_string(), json!(crosshair_fill.svg()));
    data.insert("axisBoxLineColor".to_string(), json!(axis_box_line.svg()));
    data.insert("axisBoxFillColor".to_string(), json!(axis_box_fill.svg()));
    data.insert("highlightColor".to_string(), json!(highlight.svg()));
    data.insert("axisFontSize".to_string(), json!(14));
    data.insert("infoFontSize".to_string(), json!(14));
    data.insert("area".to_string(), area);
    data.insert("chart".to_string(), chart_rect);
    data.insert("axisX".to_string(), axis_array(&chart.html.x_axis));
    data.insert("axisY".to_string(), axis_array(&chart.html.y_axis));
    data.insert("axisSwap".to_string(), json!(chart.html.axis_swap));
    data.insert("hideMouseCursor".to_string(), json!(false));
    data.insert("inLine".to_string(), json!(chart.html.all_inline));
    data.insert("seriesList".to_string(), Value::Array(series_list));
    data.insert("snapPoints".to_string(), Value::Array(snap_points));

    if chart.category_num() > 0 {
        data.insert("catCnt".to_string(), json!(chart.category_num()));
        let category_num = chart.category_num();
        let x_len = chart.axis_x.length;
        let mut cats: Vec<Value> = Vec::new();
        let mut j = 0usize;
        for (i, cat) in chart.categories.iter().enumerate() {
            let snappable = snap_cat(category_num, x_len, i);
            if (snappable || chart.html.cat_set.contains(&i)) && !cat.is_empty() {
                if j < i {
                    cats.push(json!(i));
                    j = i;
                }
                if snappable {
                    // Marker distinguishing evenly snappable entries.
                    cats.push(Value::Null);
                }
                cats.push(js_quote(cat));
                j += 1;
            }
        }
        data.insert("categories".to_string(), Value::Array(cats));
    }

    Value::Object(data)
}

/// Assemble the interactive HTML document: the chart SVG, cursor/snap
/// overlay scaffolds, and the `chart_list` data payload.
pub fn gen_html(ensemble: &crate::ensemble::Ensemble) -> String {
    use std::fmt::Write;

    let svg = crate::render::svg::render(
        &ensemble.scene,
        0.0,
        Some(r#"style="pointer-events: none;" id="svgChart""#),
    );
    let bb = crate::render::svg::screen_box(&ensemble.scene, 0.0);
    let w = crate::render::svg::num(bb.width());
    let h = crate::render::svg::num(bb.height());
    let view_box = format!(
        "{} {} {} {}",
        crate::render::svg::num(bb.min.x),
        crate::render::svg::num(bb.min.y),
        crate::render::svg::num(bb.width()),
        crate::render::svg::num(bb.height())
    );

    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(
        out,
        "<title>{}</title>",
        html_escape::encode_text(&ensemble.title_html)
    );
    out.push_str("<style>\nbody { margin: 0; }\ndiv > svg { position: absolute; }\n</style>\n");
    out.push_str("</head>\n<body>\n");
    let _ = writeln!(
        out,
        r#"<div style="width:{w}px;height:{h}px;position:relative;margin:0 auto;">"#
    );
    out.push_str(&svg);
    for id in ["svgCursor", "svgSnap"] {
        let pointer = if id == "svgCursor" { r#" style="pointer-events: none;""# } else { "" };
        let _ = writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="{view_box}"{pointer} id="{id}"></svg>"#
        );
    }
    out.push_str("</div>\n\n<script>\n\n");

    out.push_str("const chart_list = [\n");
    for chart_idx in 0..ensemble.charts.len() {
        let data = gen_chart_data(ensemble, chart_idx);
        out.push_str(&serde_json::to_string(&data).expect("payload serializes"));
        out.push_str(",\n");
    }
    out.push_str("];\n");

    out.push_str("\n// The interactive viewer runtime (crosshair, snap and\n");
    out.push_str("// axis-value labels) binds to svgChart/svgCursor/svgSnap\n");
    out.push_str("// using chart_list.\n");
    out.push_str("</script>\n</body>\n</html>\n");
    out
}
