mod common;

use folio_pdf::{DrawOp, WarningKind};
use serde_json::json;

#[test]
fn header_band_widens_the_top_margin() {
    let layout = common::layout(json!({
        "metadata": {"pageSize": "LETTER", "margin": 0.5},
        "pageTemplate": {"header": {"enabled": true, "height": 0.8, "center": {"content": "Report"}}},
        "elements": [{"type": "text", "content": "body"}]
    }));
    let g = layout.geometry;
    assert!(g.margin_top >= 0.5 * 72.0);
    assert!(g.margin_top >= 0.8 * 72.0 + 20.0 - 1e-3);
    // untouched sides keep the configured margin
    assert_eq!(g.margin_bottom, 36.0);
    assert_eq!(g.margin_left, 36.0);
}

#[test]
fn configured_margin_wins_when_already_larger() {
    let layout = common::layout(json!({
        "metadata": {"margin": 2.0},
        "pageTemplate": {"header": {"enabled": true}},
        "elements": [{"type": "text", "content": "body"}]
    }));
    assert_eq!(layout.geometry.margin_top, 144.0);
}

#[test]
fn page_numbers_use_the_final_total() {
    let mut elements = common::filler(60);
    elements.insert(0, json!({"type": "heading", "text": "Results"}));
    let layout = common::layout(json!({
        "metadata": {"title": "Quarterly"},
        "pageTemplate": {
            "header": {"enabled": true, "showLine": true, "left": {"content": "{{metadata.title}}"}},
            "footer": {
                "enabled": true,
                "right": {"type": "pageNumber", "format": "Page {page} of {total}"},
                "center": {"type": "pageNumber", "format": "{page:roman_lower}"}
            }
        },
        "elements": elements
    }));
    let total = layout.pages.len();
    assert!(total >= 3);
    for page in &layout.pages {
        let overlay: Vec<&str> = page
            .overlay()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        let expected = format!("Page {} of {total}", page.index);
        assert!(overlay.contains(&"Quarterly"), "{overlay:?}");
        assert!(overlay.contains(&expected.as_str()), "{overlay:?}");
        assert!(overlay.contains(&folio_pdf::to_roman(page.index as u32).to_lowercase().as_str()));
        assert!(page.overlay().iter().any(|op| matches!(op, DrawOp::Line { .. })));
    }
}

#[test]
fn overlay_is_drawn_after_the_body() {
    let layout = common::layout(json!({
        "pageTemplate": {"footer": {"enabled": true, "center": {"type": "pageNumber"}}},
        "elements": [{"type": "text", "content": "body"}]
    }));
    let page = &layout.pages[0];
    let position = |needle: &str| {
        page.ops
            .iter()
            .position(|op| matches!(op, DrawOp::Text { text, .. } if text == needle))
    };
    assert!(position("body").unwrap() < position("1").unwrap());
    assert_eq!(page.body().len(), 1);
}

#[test]
fn missing_zone_image_is_omitted_on_every_page_and_reported_once() {
    let mut elements = common::filler(40);
    elements.push(json!({"type": "text", "content": "end"}));
    let layout = common::layout(json!({
        "pageTemplate": {
            "header": {
                "enabled": true,
                "left": {"type": "image", "path": "does/not/exist.png"},
                "right": {"content": "Confidential"}
            }
        },
        "elements": elements
    }));
    assert!(layout.pages.len() > 1);
    for page in &layout.pages {
        assert!(page.overlay().iter().all(|op| !matches!(op, DrawOp::Image { .. })));
        assert!(page.texts().any(|t| t == "Confidential"));
    }
    let overlay_warnings: Vec<_> = layout
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::Overlay)
        .collect();
    assert_eq!(overlay_warnings.len(), 1);
}
