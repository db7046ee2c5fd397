mod chart;
mod error;
mod fonts;
mod geometry;
mod grid;
mod images;
mod input;
mod model;
mod numerals;
mod pdf;
mod template;

pub use chart::{ChartRenderer, RasterChartRenderer};
pub use error::{ElementError, Error, Result, Warning, WarningKind};
pub use fonts::{FontBook, FontId, Typesetter};
pub use geometry::{Frame, PageGeometry};
pub use grid::{CellPlacement, RenderPlan, resolve as resolve_grid};
pub use input::{DataSources, parse_description, table_from_json};
pub use model::*;
pub use numerals::{format_page_number, from_chinese, from_roman, to_chinese, to_roman};
pub use pdf::{
    Compositor, DrawOp, ForwardReferenceEntry, ForwardReferences, Layout, OutlineNode, Output,
    OverlayRenderer, PageRecord, PageRecorder, ResolverState, TocLine, finalize,
};
pub use template::{TemplateContext, substitute};

use std::path::Path;
use std::time::Instant;

/// Compose a JSON description into PDF bytes. Relative paths resolve against
/// the working directory.
pub fn generate(json: &str) -> Result<Output> {
    let doc = parse_description(json)?;
    Compositor::new(doc).render()
}

/// Read `input`, compose it, and write the PDF to `output`. Relative paths in
/// the description resolve against the input's directory.
pub fn convert_json_to_pdf(input: &Path, output: &Path) -> Result<Vec<Warning>> {
    let t0 = Instant::now();

    let json = std::fs::read_to_string(input)?;
    let doc = parse_description(&json)?;
    let t_parse = t0.elapsed();

    let base_dir = input.parent().unwrap_or_else(|| Path::new("."));
    let out = Compositor::new(doc).with_base_dir(base_dir).render()?;
    let t_render = t0.elapsed();

    std::fs::write(output, &out.bytes)?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: parse={:.1}ms, render={:.1}ms, write={:.1}ms, total={:.1}ms (output {} bytes, {} pages)",
        t_parse.as_secs_f64() * 1000.0,
        (t_render - t_parse).as_secs_f64() * 1000.0,
        (t_total - t_render).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        out.bytes.len(),
        out.page_count,
    );

    Ok(out.warnings)
}
