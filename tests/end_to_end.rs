mod common;

use folio_pdf::{
    ChartBlock, ChartRenderer, DataTable, Error, WarningKind, convert_json_to_pdf, generate,
    parse_description,
};
use rayon::prelude::*;
use serde_json::{Value, json};

fn full_report() -> Value {
    let mut elements = vec![
        json!({"type": "heading", "text": "Summary", "level": 1}),
        json!({"type": "text", "content": "Prepared for {{metadata.author}} on {{date}}."}),
        json!({"type": "list", "items": ["Revenue up", "Costs flat"]}),
        json!({"type": "list", "items": ["Hire", "Expand"], "bulletType": "number"}),
        json!({"type": "spacer", "height": 0.25}),
        json!({"type": "heading", "text": "Figures", "level": 2}),
        json!({
            "type": "table",
            "data": [["Region", "Q1", "Q2"], ["East", 10, 12], ["West", 8, 9.5]],
            "mergedCells": [[0, 1, 0, 2]]
        }),
        json!({
            "type": "chart",
            "chartType": "bar",
            "dataSource": "sales",
            "xAxis": "month",
            "yAxis": "total",
            "title": "Monthly sales",
            "width": 5,
            "height": 3
        }),
        json!({"type": "pagebreak"}),
        json!({"type": "heading", "text": "Appendix", "level": 1}),
    ];
    elements.extend(common::filler(10));
    json!({
        "metadata": {"title": "Quarterly", "author": "Finance", "pageSize": "A4"},
        "dataSources": [{
            "name": "sales",
            "type": "inline",
            "data": [
                {"month": "Jan", "total": 120},
                {"month": "Feb", "total": 95},
                {"month": "Mar", "total": 143}
            ]
        }],
        "coverPage": {
            "enabled": true,
            "elements": [{"type": "text", "content": "{{metadata.title}}", "position": {"x": "center", "y": "center"}}]
        },
        "toc": {"enabled": true},
        "pageTemplate": {
            "header": {"enabled": true, "showLine": true, "left": {"content": "{{metadata.title}}"}},
            "footer": {"enabled": true, "center": {"type": "pageNumber", "format": "{page} / {total}"}}
        },
        "elements": elements
    })
}

#[test]
fn full_report_renders_a_pdf() {
    let out = common::compositor(full_report()).render().expect("render");
    assert!(out.bytes.starts_with(b"%PDF"));
    assert!(out.page_count >= 4);
    assert!(out.warnings.is_empty(), "{:?}", out.warnings);

    let layout = common::compositor(full_report()).layout().expect("layout");
    assert_eq!(layout.pages.len(), out.page_count);
    assert_eq!(common::page_of(&layout, "Quarterly"), Some(1));
    let summary = common::page_of(&layout, "Prepared for Finance on 2024-03-01.").expect("paragraph placed");
    assert!(common::texts(&layout.pages[summary - 1]).contains(&"\u{2022}"));
    assert!(common::texts(&layout.pages[summary - 1]).contains(&"2."));
    assert!(common::page_of(&layout, "Appendix") > common::page_of(&layout, "Region"));
}

#[test]
fn render_to_writes_the_same_bytes() {
    let out = common::compositor(full_report()).render().expect("render");
    let mut sink = Vec::new();
    let (pages, warnings) = common::compositor(full_report())
        .render_to(&mut sink)
        .expect("render_to");
    assert_eq!(pages, out.page_count);
    assert!(warnings.is_empty());
    assert_eq!(sink, out.bytes);
}

#[test]
fn independent_compositors_run_in_parallel() {
    let sequential = common::compositor(full_report()).render().expect("render").bytes;
    let parallel: Vec<Vec<u8>> = (0..4)
        .into_par_iter()
        .map(|_| common::compositor(full_report()).render().expect("render").bytes)
        .collect();
    for bytes in parallel {
        assert_eq!(bytes, sequential);
    }
}

#[test]
fn convert_resolves_paths_against_the_input() {
    let dir = tempfile::tempdir().expect("tempdir");
    common::write_png(&dir.path().join("logo.png"), 40, 20);
    let description = json!({
        "metadata": {"title": "Files"},
        "elements": [
            {"type": "image", "path": "logo.png", "width": 80},
            {"type": "text", "content": "done"}
        ]
    });
    let input = dir.path().join("report.json");
    std::fs::write(&input, description.to_string()).expect("write input");
    let output = dir.path().join("report.pdf");

    let warnings = convert_json_to_pdf(&input, &output).expect("convert");
    assert!(warnings.iter().all(|w| w.kind != WarningKind::Image), "{warnings:?}");
    let bytes = std::fs::read(&output).expect("read output");
    assert!(bytes.starts_with(b"%PDF"));
    assert!(String::from_utf8_lossy(&bytes).contains("/Subtype /Image"));
}

#[test]
fn failed_element_is_replaced_by_a_marker() {
    let layout = common::layout(json!({
        "elements": [
            {"type": "text", "content": "before"},
            {"type": "table", "dataSource": "missing"},
            {"type": "text", "content": "after"}
        ]
    }));
    let page = common::texts(&layout.pages[0]);
    let marker = page
        .iter()
        .position(|t| t.starts_with("Error creating element:"))
        .expect("marker drawn");
    assert!(page[marker].contains("missing"));
    assert!(page.iter().position(|t| *t == "before") < Some(marker));
    assert!(page.iter().position(|t| *t == "after") > Some(marker));
    assert_eq!(layout.warnings.len(), 1);
    assert_eq!(layout.warnings[0].kind, WarningKind::DataSource);
}

#[test]
fn chart_with_an_unknown_column_warns() {
    let layout = common::layout(json!({
        "dataSources": [{"name": "sales", "type": "inline", "data": [{"month": "Jan", "total": 1}]}],
        "elements": [
            {"type": "chart", "chartType": "line", "dataSource": "sales", "xAxis": "month", "yAxis": "profit"},
            {"type": "text", "content": "after"}
        ]
    }));
    assert_eq!(layout.warnings.len(), 1);
    assert_eq!(layout.warnings[0].kind, WarningKind::Chart);
    assert!(layout.warnings[0].message.contains("profit"));
    assert_eq!(common::page_of(&layout, "after"), Some(1));
}

#[test]
fn unsupported_source_kind_is_a_warning() {
    let layout = common::layout(json!({
        "dataSources": [{"name": "db", "type": "database"}],
        "elements": [{"type": "text", "content": "body"}]
    }));
    assert_eq!(layout.pages.len(), 1);
    assert!(layout.warnings.iter().any(|w| w.kind == WarningKind::DataSource));
}

#[test]
fn invalid_geometry_is_a_configuration_error() {
    for metadata in [
        json!({"pageSize": "B5"}),
        json!({"pageSize": "LETTER", "margin": 5}),
        json!({"orientation": "diagonal"}),
    ] {
        let err = parse_description(&json!({"metadata": metadata, "elements": []}).to_string())
            .expect_err("rejected");
        assert!(matches!(err, Error::Configuration(_)), "{err}");
    }
}

#[test]
fn malformed_json_is_rejected_before_composition() {
    assert!(matches!(parse_description("{\"elements\": ["), Err(Error::Json(_))));
}

#[test]
fn generate_composes_straight_from_json() {
    let json = json!({"metadata": {"title": "Plain"}, "elements": [{"type": "text", "content": "hello"}]});
    let out = generate(&json.to_string()).expect("generate");
    assert!(out.bytes.starts_with(b"%PDF"));
    assert_eq!(out.page_count, 1);
}

/// Renders every chart as a flat swatch and records the rows it saw.
struct Swatch;

impl ChartRenderer for Swatch {
    fn render(&self, chart: &ChartBlock, data: &DataTable) -> Result<image::RgbaImage, String> {
        if data.rows.is_empty() {
            return Err(format!("{:?} chart has no rows", chart.chart_type));
        }
        Ok(image::RgbaImage::from_pixel(30, 10 * data.rows.len() as u32, image::Rgba([0, 0, 0, 255])))
    }
}

#[test]
fn injected_sources_and_chart_renderer() {
    let table = DataTable {
        columns: vec!["label".into(), "value".into()],
        rows: vec![vec!["a".into(), "1".into()], vec!["b".into(), "2".into()]],
    };
    let layout = common::compositor(json!({
        "elements": [
            {"type": "chart", "chartType": "pie", "dataSource": "injected", "labels": "label", "values": "value"},
            {"type": "table", "dataSource": "injected"}
        ]
    }))
    .with_chart_renderer(Swatch)
    .add_data_source("injected", table)
    .layout()
    .expect("layout");
    assert!(layout.warnings.is_empty(), "{:?}", layout.warnings);
    let images: Vec<(f32, f32)> = layout.pages[0]
        .body()
        .iter()
        .filter_map(|op| match op {
            folio_pdf::DrawOp::Image { width, height, .. } => Some((*width, *height)),
            _ => None,
        })
        .collect();
    assert_eq!(images.len(), 1);
    assert_eq!(common::page_of(&layout, "label"), Some(1));
    assert_eq!(common::page_of(&layout, "b"), Some(1));
}
