use chartwright::prelude::*;
use serde_json::Value;

fn payload(script: &str) -> Value {
    let html = compile_str(script, OutputFormat::Html).unwrap();
    assert!(html.contains("id=\"svgChart\""));
    assert!(html.contains("id=\"svgCursor\""));
    assert!(html.contains("id=\"svgSnap\""));
    let start = html.find("const chart_list = [").unwrap();
    let line = html[start..].lines().nth(1).unwrap();
    let json = line.trim_end().trim_end_matches(',');
    serde_json::from_str(json).unwrap()
}

#[test]
fn payload_carries_axes_area_and_snap_points() {
    let data = payload(
        "\
ChartArea: 500 300
Series.Type: XY
Series.Data:
 0 0
 5 5
 10 10
",
    );

    let area = &data["area"];
    assert!((area["x2"].as_f64().unwrap() - area["x1"].as_f64().unwrap() - 500.0).abs() < 0.01);
    assert!((area["y2"].as_f64().unwrap() - area["y1"].as_f64().unwrap() - 300.0).abs() < 0.01);

    let axis_x = data["axisX"].as_array().unwrap();
    assert_eq!(axis_x.len(), 2);
    let shown: Vec<&Value> = axis_x.iter().filter(|a| a["show"] == Value::Bool(true)).collect();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0]["isCategory"], Value::Bool(false));
    assert_eq!(shown[0]["logarithmic"], Value::Bool(false));
    assert_eq!(shown[0]["format"], Value::String("Fixed".into()));
    assert!((shown[0]["areaVal1"].as_f64().unwrap() - 0.0).abs() < 1e-9);
    assert!((shown[0]["areaVal2"].as_f64().unwrap() - 10.0).abs() < 1e-9);

    assert_eq!(data["axisSwap"], Value::Bool(false));

    // All three data points are snappable; screen coordinates lie inside
    // the plot area.
    let snaps = data["snapPoints"].as_array().unwrap();
    assert_eq!(snaps.len(), 3);
    for sp in snaps {
        let x = sp["X"].as_f64().unwrap();
        let y = sp["Y"].as_f64().unwrap();
        assert!(x >= area["x1"].as_f64().unwrap() - 0.01);
        assert!(x <= area["x2"].as_f64().unwrap() + 0.01);
        assert!(y >= area["y1"].as_f64().unwrap() - 0.01);
        assert!(y <= area["y2"].as_f64().unwrap() + 0.01);
        assert!(sp["x"].is_string());
        assert!(sp["y"].is_string());
    }
}

#[test]
fn payload_category_chart_lists_categories() {
    let data = payload(
        "\
ChartArea: 500 300
Series.Type: Bar
Series.Data:
 Jan 1
 Feb 2
 Mar 3
",
    );
    assert_eq!(data["catCnt"], serde_json::json!(3));
    let cats = data["categories"].as_array().unwrap();
    let names: Vec<&str> = cats.iter().filter_map(|v| v.as_str()).collect();
    assert_eq!(names, vec!["Jan", "Feb", "Mar"]);

    // Category snap points carry the category index as X.
    let snaps = data["snapPoints"].as_array().unwrap();
    assert!(!snaps.is_empty());
    assert!(snaps.iter().all(|sp| sp["x"].is_u64()));
}

#[test]
fn payload_series_colors_stay_visible() {
    let data = payload(
        "\
ChartArea: 500 300
Series.Type: Line
Series.New: s
Series.Data:
 A 1
 B 2
",
    );
    let series = data["seriesList"].as_array().unwrap();
    assert_eq!(series.len(), 1);
    for key in ["fgColor", "bgColor", "txColor"] {
        let c = series[0][key].as_str().unwrap();
        assert!(c == "none" || c.starts_with('#'), "{key} = {c}");
    }
    // The named series has a recorded legend box.
    assert!(series[0]["legendBB"].is_object());
}
