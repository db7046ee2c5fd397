#![allow(dead_code)]

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use folio_pdf::{Compositor, DrawOp, Layout, PageRecord, parse_description};

/// 2024-03-01 09:30:00, the clock every test composes against.
pub fn clock() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_opt(9, 30, 0))
        .expect("valid date")
}

/// A compositor with a fixed clock that only uses builtin fonts, so layout is
/// identical on every machine.
pub fn compositor(description: Value) -> Compositor {
    let doc = parse_description(&description.to_string()).expect("valid description");
    Compositor::new(doc)
        .with_clock(clock())
        .without_system_fonts()
}

pub fn layout(description: Value) -> Layout {
    compositor(description).layout().expect("layout")
}

pub fn texts(page: &PageRecord) -> Vec<&str> {
    page.texts().collect()
}

/// 1-based index of the first page that draws `needle`.
pub fn page_of(layout: &Layout, needle: &str) -> Option<usize> {
    layout
        .pages
        .iter()
        .find(|p| p.texts().any(|t| t == needle))
        .map(|p| p.index)
}

/// Every text op in the page's body (before overlay) as (text, x, y).
pub fn body_texts(page: &PageRecord) -> Vec<(&str, f32, f32)> {
    page.body()
        .iter()
        .filter_map(|op| match op {
            DrawOp::Text { text, x, y, .. } => Some((text.as_str(), *x, *y)),
            _ => None,
        })
        .collect()
}

/// Page index of every body text, so two layouts can be compared boundary by boundary.
pub fn page_boundaries(layout: &Layout) -> Vec<(usize, String)> {
    layout
        .pages
        .iter()
        .flat_map(|p| p.body().iter().map(move |op| (p.index, op)))
        .filter_map(|(i, op)| match op {
            DrawOp::Text { text, .. } => Some((i, text.clone())),
            _ => None,
        })
        .collect()
}

/// Write a solid `w`×`h` PNG.
pub fn write_png(path: &Path, w: u32, h: u32) {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba([30, 90, 160, 255]));
    img.save(path).expect("write png");
}

/// Enough paragraphs of filler to run `pages` pages past the first.
pub fn filler(paragraphs: usize) -> Vec<Value> {
    (0..paragraphs)
        .map(|i| {
            serde_json::json!({
                "type": "text",
                "content": format!(
                    "Paragraph {i}. Revenue grew steadily across every region while operating costs stayed \
                     flat, which left the margin comfortably above the plan for the quarter."
                )
            })
        })
        .collect()
}
