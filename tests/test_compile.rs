use chartwright::parse;
use chartwright::prelude::*;
use chartwright::Source;

fn build(script: &str) -> (Ensemble, String) {
    let mut source = Source::from_script(script).unwrap();
    let mut ensemble = Ensemble::new();
    parse::parse(&mut source, &mut ensemble).unwrap();
    let svg = ensemble.build(&mut source).unwrap();
    (ensemble, svg)
}

#[test]
fn xy_diagonal_fills_the_plot() {
    let script = "\
ChartArea: 1000 600
Series.Type: XY
Series.Data:
 0 0
 10 10
";
    let (ensemble, svg) = build(script);
    let chart = &ensemble.charts[0];
    assert_eq!(chart.axis_x.min, 0.0);
    assert_eq!(chart.axis_x.max, 10.0);
    assert_eq!(chart.axis_y[0].min, 0.0);
    assert_eq!(chart.axis_y[0].max, 10.0);

    // Exactly one polyline whose two points are the diagonal corners of
    // the plot rectangle.
    let polylines: Vec<&str> = svg.matches("<polyline").collect();
    assert_eq!(polylines.len(), 1, "{svg}");
    let start = svg.find("<polyline").unwrap();
    let points = &svg[start..];
    let points = &points[points.find("points=\"").unwrap() + 8..];
    let points = &points[..points.find('"').unwrap()];
    let coords: Vec<f64> = points
        .split([' ', ','])
        .map(|v| v.parse().unwrap())
        .collect();
    assert_eq!(coords.len(), 4);
    assert!(((coords[2] - coords[0]).abs() - 1000.0).abs() < 0.01, "{points}");
    assert!(((coords[3] - coords[1]).abs() - 600.0).abs() < 0.01, "{points}");
}

#[test]
fn bar_with_negative_value_crosses_base() {
    let script = "\
ChartArea: 800 600
Series.Type: Bar
Series.Base: 0
Series.Data:
 A 1
 B 2
 C -1
";
    let (ensemble, _svg) = build(script);
    let chart = &ensemble.charts[0];
    assert!(chart.axis_x.category_axis);
    assert_eq!(chart.axis_y[0].min, -1.0);
    assert_eq!(chart.axis_y[0].max, 2.0);
    // The X-axis crosses at the base value, not at the bottom.
    assert_eq!(chart.axis_x.pos, Pos::Base);
    assert_eq!(chart.axis_y[0].orth_axis_cross, 0.0);
    assert_eq!(chart.axis_x.style, AxisStyle::Line);
    // Category X-range for bar charts: [-0.5, N - 0.5].
    assert_eq!(chart.axis_x.min, -0.5);
    assert_eq!(chart.axis_x.max, 2.5);
}

#[test]
fn stacked_bars_accumulate_per_category() {
    let script = "\
ChartArea: 800 600
Series.Type: StackedBar
Series.Base: 0
Series.New: s1
Series.New: s2
Series.Data:
 A 1 2
 B 2 1
 C 3 0
";
    let (ensemble, _svg) = build(script);
    let chart = &ensemble.charts[0];
    // Stack tops: A = 1+2 = 3, B = 2+1 = 3, C = 3+0 = 3.
    assert_eq!(chart.axis_y[0].min, 0.0);
    assert!(chart.axis_y[0].max >= 3.0);
    assert_eq!(chart.series_list.len(), 2);
    assert_eq!(chart.series_list[1].max_y, 3.0);
}

#[test]
fn log_axis_selects_decade_ticks() {
    let script = "\
ChartArea: 1000 600
Axis.Y.LogScale: On
Series.Type: Line
Series.Data:
 A 0.1
 B 1
 C 10
 D 100
";
    let (ensemble, _svg) = build(script);
    let a = &ensemble.charts[0].axis_y[0];
    assert!(a.log_scale);
    assert_eq!(a.major, 10.0);
    assert!((a.min - 0.1).abs() < 1e-12);
    assert!((a.max - 100.0).abs() < 1e-9);
    assert!(a.show_minor_numbers);
}

#[test]
fn circular_macro_is_a_parse_error() {
    let script = "\
MacroDef: A
Macro: A
MacroEnd: A
Macro: A
";
    let err = compile_str(script, OutputFormat::Svg).unwrap_err();
    assert!(format!("{err}").contains("circular macro call"));
}

#[test]
fn unknown_keys_and_bad_numbers_are_fatal() {
    let err = compile_str("NoSuchKey: 1\n", OutputFormat::Svg).unwrap_err();
    assert!(format!("{err}").contains("unknown KEY"));

    let err = compile_str(
        "Series.Type: XY\nSeries.Data:\n 0 inf\n",
        OutputFormat::Svg,
    )
    .unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("invalid number") || msg.contains("number too big"), "{msg}");

    let err = compile_str(
        "Series.Type: XY\nSeries.Data:\n 0 1e301\n",
        OutputFormat::Svg,
    )
    .unwrap_err();
    assert!(format!("{err}").contains("number too big"));
}

#[test]
fn mixing_category_and_numeric_series_is_rejected() {
    let script = "\
Series.Type: XY
Series.New: numeric
Series.Type: Bar
Series.New: bars
Series.Data:
 1 2 3
";
    let err = compile_str(script, OutputFormat::Svg).unwrap_err();
    assert!(format!("{err}").contains("cannot mix"));
}

#[test]
fn sentinels_skip_and_break() {
    // A skip keeps the polyline connected; an invalid breaks it in two.
    let skip_script = "\
ChartArea: 1000 600
Series.Type: XY
Series.Data:
 0 0
 5 -
 10 10
";
    let (_, svg) = build(skip_script);
    assert_eq!(svg.matches("<polyline").count(), 1, "{svg}");

    let break_script = "\
ChartArea: 1000 600
Series.Type: XY
Series.Data:
 0 0
 4 4
 5 !
 6 6
 10 10
";
    let (_, svg) = build(break_script);
    assert_eq!(svg.matches("<polyline").count(), 2, "{svg}");
}

#[test]
fn single_point_widens_the_autorange() {
    let script = "\
Series.Type: XY
Series.Data:
 5 7
";
    let (ensemble, _svg) = build(script);
    let chart = &ensemble.charts[0];
    assert!(chart.axis_x.min <= 4.0 && chart.axis_x.max >= 6.0);
    assert!(chart.axis_y[0].min <= 6.0 && chart.axis_y[0].max >= 8.0);
}

#[test]
fn annotations_draw_into_the_chart() {
    let script = "\
ChartArea: 400 300
Series.Type: XY
Series.Data:
 0 0
 10 10
@Line: Left Bottom Right Top
@Rect: 2 2 8 8
";
    let (_, svg) = build(script);
    // The annotation line spans the full plot diagonal.
    assert!(svg.matches("<line").count() >= 1);
    assert!(compile_str(script, OutputFormat::Svg).is_ok());
}

#[test]
fn annotation_layer_errors_are_fatal() {
    // A global annotation cannot target the bottom layer.
    let script = "\
Series.Type: XY
Series.Data:
 0 0
 1 1
@@Layer: Bottom
@@Line: Left Bottom Right Top
";
    let err = compile_str(script, OutputFormat::Svg).unwrap_err();
    assert!(format!("{err}").contains("illegal layer"));
}
