use chartwright::parse;
use chartwright::prelude::*;
use chartwright::Source;

#[test]
fn grid_row_aligns_plot_rectangles() {
    let script = "\
NewChartInGrid: 0 0
ChartArea: 400 200
Series.Type: XY
Series.Data:
 0 0
 1 1
NewChartInGrid: 0 1
ChartArea: 600 200
Series.Type: XY
Series.Data:
 0 0
 1 1
";
    let mut source = Source::from_script(script).unwrap();
    let mut ensemble = Ensemble::new();
    parse::parse(&mut source, &mut ensemble).unwrap();
    ensemble.build(&mut source).unwrap();

    assert_eq!(ensemble.charts.len(), 2);

    // Plot rectangles keep their specified sizes.
    let cx = &ensemble.grid.cell_list_x;
    assert!((cx[0].e2.coor - cx[0].e1.coor - 400.0).abs() < 0.05);
    assert!((cx[1].e2.coor - cx[1].e1.coor - 600.0).abs() < 0.05);
    // The second chart starts to the right of the first, with room for the
    // decorations and the inter-chart padding.
    assert!(cx[1].e1.coor > cx[0].e2.coor);

    // Shared row: the plot rectangles' tops and bottoms are collinear.
    let c0 = &ensemble.charts[0];
    let c1 = &ensemble.charts[1];
    assert!((c0.g_dy - c1.g_dy).abs() < 0.05, "{} vs {}", c0.g_dy, c1.g_dy);
    assert_eq!(c0.chart_h, 200.0);
    assert_eq!(c1.chart_h, 200.0);
}

#[test]
fn grid_collision_is_fatal() {
    let script = "\
NewChartInGrid: 0 0
ChartArea: 100 100
NewChartInGrid: 0 0
ChartArea: 100 100
";
    let err = compile_str(script, OutputFormat::Svg).unwrap_err();
    assert!(format!("{err}").contains("grid collision"));
}

#[test]
fn specifiers_before_new_chart_are_rejected() {
    let script = "\
Title: too early
NewChartInGrid: 0 1
";
    let err = compile_str(script, OutputFormat::Svg).unwrap_err();
    assert!(format!("{err}").contains("preceded by NewChartInGrid"));
}

#[test]
fn vertical_stack_aligns_columns() {
    let script = "\
NewChartInGrid: 0 0
ChartArea: 400 200
Series.Type: XY
Series.Data:
 0 0
 1 1
NewChartInGrid: 1 0
ChartArea: 400 300
Series.Type: XY
Series.Data:
 0 0
 1 1
";
    let mut source = Source::from_script(script).unwrap();
    let mut ensemble = Ensemble::new();
    parse::parse(&mut source, &mut ensemble).unwrap();
    ensemble.build(&mut source).unwrap();

    let c0 = &ensemble.charts[0];
    let c1 = &ensemble.charts[1];
    // Same column: left plot edges align; row 0 sits above row 1.
    assert!((c0.g_dx - c1.g_dx).abs() < 0.05);
    assert!(c0.g_dy > c1.g_dy);
}
