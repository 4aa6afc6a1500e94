//! Chartwright is a declarative chart compiler: it consumes a line-oriented
//! textual chart description and emits a self-contained SVG document, or an
//! interactive HTML document that supports hover/snap inspection of data
//! points. The heart of the crate is the chart composition engine: the data
//! model for ensembles, charts, axes and series; axis auto-ranging and tick
//! placement; a grid solver that aligns the interior plot rectangles of
//! charts sharing rows and columns; collision-aware placement of legends,
//! titles, numbers and tags; and series rendering with clipping, polyline
//! pruning, and stacked/layered bar and area arithmetic.
//!
//! The usual entry point is [`compile_str`] (or [`compile_files`] for
//! file-backed scripts, which stream through a segmented, prefetching
//! loader):
//!
//! ```
//! use chartwright::{compile_str, OutputFormat};
//!
//! let script = "\
//! ChartArea: 400 300
//! Series.Type: XY
//! Series.Data:
//!  0 0
//!  10 10
//! ";
//! let svg = compile_str(script, OutputFormat::Svg).unwrap();
//! assert!(svg.starts_with("<svg"));
//! ```

pub mod annotate;
pub mod axis;
pub mod chart;
pub mod ensemble;
pub mod error;
pub mod geom;
pub mod grid;
pub mod html;
pub mod label;
pub mod legend;
pub mod parse;
pub mod render;
pub mod scene;
pub mod series;
pub mod source;
pub mod tag;
pub mod value;
pub mod visual;

pub use crate::ensemble::{Ensemble, OutputFormat};
pub use crate::error::{ChartwrightError, Result};
pub use crate::source::Source;

pub mod prelude {
    pub use crate::axis::{Axis, AxisStyle, GridStyle, NumberFormat};
    pub use crate::chart::Chart;
    pub use crate::ensemble::{Ensemble, OutputFormat};
    pub use crate::error::ChartwrightError;
    pub use crate::geom::{BoundaryBox, Point, Pos};
    pub use crate::series::{Series, SeriesType};
    pub use crate::visual::color::Color;
    pub use crate::{compile_files, compile_str};
}

/// Compile an in-memory chart script.
pub fn compile_str(script: &str, format: OutputFormat) -> Result<String> {
    let mut source = Source::from_script(script)?;
    compile(&mut source, format)
}

/// Compile one or more script files (`-` reads standard input), streamed
/// through the segmented source loader.
pub fn compile_files<S: AsRef<str>>(files: &[S], format: OutputFormat) -> Result<String> {
    let mut source = Source::new();
    for f in files {
        source.add_file(f.as_ref());
    }
    source.read_files()?;
    compile(&mut source, format)
}

/// Compile an already loaded source.
pub fn compile(source: &mut Source, format: OutputFormat) -> Result<String> {
    let mut ensemble = Ensemble::new();
    ensemble.enable_html = format == OutputFormat::Html;
    parse::parse(source, &mut ensemble)?;
    ensemble.build(source)
}
