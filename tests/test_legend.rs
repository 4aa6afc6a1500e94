use chartwright::parse;
use chartwright::prelude::*;
use chartwright::Source;

fn build(script: &str) -> Ensemble {
    let mut source = Source::from_script(script).unwrap();
    let mut ensemble = Ensemble::new();
    parse::parse(&mut source, &mut ensemble).unwrap();
    ensemble.build(&mut source).unwrap();
    ensemble
}

#[test]
fn identical_legends_merge_into_one_entry() {
    let script = "\
ChartArea: 600 400
Series.Type: Line
Series.Style: 3
Series.New: sensor
Series.Style: 3
Series.New: sensor
Series.Data:
 A 1 2
 B 2 3
";
    let ensemble = build(script);
    let chart = &ensemble.charts[0];
    assert_eq!(chart.legend.items.len(), 1);
    assert_eq!(chart.legend.items[0].members.len(), 2);
}

#[test]
fn different_styles_keep_separate_entries() {
    let script = "\
ChartArea: 600 400
Series.Type: Line
Series.Style: 0
Series.New: alpha
Series.Style: 11
Series.New: beta
Series.Data:
 A 1 2
 B 2 3
";
    let ensemble = build(script);
    assert_eq!(ensemble.charts[0].legend.items.len(), 2);
}

#[test]
fn global_legend_collects_series_across_charts() {
    let script = "\
NewChartInGrid: 0 0
ChartArea: 300 200
Series.GlobalLegend: On
Series.Type: Line
Series.Style: 5
Series.New: shared
Series.Data:
 A 1
NewChartInGrid: 0 1
ChartArea: 300 200
Series.GlobalLegend: On
Series.Type: Line
Series.Style: 5
Series.New: shared
Series.Data:
 A 2
";
    let ensemble = build(script);
    assert!(ensemble.charts.iter().all(|c| c.legend.items.is_empty()));
    assert_eq!(ensemble.legend.items.len(), 1);
    assert_eq!(ensemble.legend.items[0].members.len(), 2);
}

#[test]
fn unnamed_series_get_no_legend() {
    let script = "\
ChartArea: 600 400
Series.Type: Line
Series.Data:
 A 1
 B 2
";
    let ensemble = build(script);
    assert!(ensemble.charts[0].legend.items.is_empty());
}
