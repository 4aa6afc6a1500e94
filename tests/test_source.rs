use std::io::Write;

use chartwright::prelude::*;
use chartwright::source::SEGMENT_SIZE;
use chartwright::Source;

#[test]
fn file_backed_scripts_compile() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "ChartArea: 400 300\nSeries.Type: XY\nSeries.Data:\n 0 0\n 10 10\n"
    )
    .unwrap();
    file.flush().unwrap();
    let path = file.path().to_str().unwrap().to_string();
    let svg = compile_files(&[path], OutputFormat::Svg).unwrap();
    assert!(svg.starts_with("<svg"));
}

#[test]
fn multiple_files_concatenate() {
    let mut f1 = tempfile::NamedTempFile::new().unwrap();
    write!(f1, "ChartArea: 400 300\nSeries.Type: XY\n").unwrap();
    f1.flush().unwrap();
    let mut f2 = tempfile::NamedTempFile::new().unwrap();
    write!(f2, "Series.Data:\n 0 0\n 10 10\n").unwrap();
    f2.flush().unwrap();
    let files = [
        f1.path().to_str().unwrap().to_string(),
        f2.path().to_str().unwrap().to_string(),
    ];
    let svg = compile_files(&files, OutputFormat::Svg).unwrap();
    assert!(svg.starts_with("<svg"));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = compile_files(&["/no/such/chart/script"], OutputFormat::Svg).unwrap_err();
    assert!(format!("{err}").contains("failed to open file"));
}

/// Force multiple segments and a tiny pool, so the background loader must
/// re-load evicted segments when rendering re-enters the stream at the
/// data anchors.
#[test]
fn segmented_file_reloads_through_the_pool() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "ChartArea: 400 300\nSeries.Type: XY\nSeries.Data:\n 0 0\n 5 5\n").unwrap();
    // Pad with comment lines until the script spans several segments.
    let filler = "# filler comment line to inflate the script size\n";
    let needed = 2 * SEGMENT_SIZE + SEGMENT_SIZE / 2;
    let mut written = 0;
    while written < needed {
        file.write_all(filler.as_bytes()).unwrap();
        written += filler.len();
    }
    write!(file, "Series.Data:\n 10 10\n 20 20\n").unwrap();
    file.flush().unwrap();

    let mut source = Source::new();
    source.set_max_buffers(2);
    source.add_file(file.path().to_str().unwrap());
    source.read_files().unwrap();
    assert!(source.infos().len() >= 3, "expected multiple segments");

    let svg = chartwright::compile(&mut source, OutputFormat::Svg).unwrap();
    assert!(svg.contains("<polyline"));
}

#[test]
fn save_and_restore_positions() {
    let mut source = Source::from_script("One: 1\nTwo: 2\nThree: 3\n").unwrap();
    source.load_line().unwrap();
    source.save_pos(0);
    source.next_line().unwrap();
    source.next_line().unwrap();
    assert_eq!(source.cur_char(), b'T');
    source.restore_pos(0).unwrap();
    assert_eq!(source.cur_char(), b'O');
}
