mod common;

use folio_pdf::WarningKind;
use serde_json::json;

fn quarterly_table() -> serde_json::Value {
    json!({
        "type": "table",
        "data": [
            ["Region", "Q1", "Q2"],
            ["North", "120", "135"],
            ["South", "98", "101"],
            ["East", "143", "150"],
            ["West", "87", "92"]
        ],
        "rowHeights": [0.5, 0.5, 0.5, 0.5, 0.5],
        "repeatRows": 1
    })
}

#[test]
fn split_table_repeats_header_on_continuation_page() {
    // 648pt frame; 522pt spacer leaves room for the header and two body rows
    let layout = common::layout(json!({
        "metadata": {"pageSize": "LETTER"},
        "elements": [
            {"type": "spacer", "height": 7.25},
            quarterly_table()
        ]
    }));
    assert_eq!(layout.pages.len(), 2);
    let first = common::texts(&layout.pages[0]);
    let second = common::texts(&layout.pages[1]);
    assert_eq!(&first[..3], &["Region", "Q1", "Q2"]);
    assert_eq!(&second[..3], &["Region", "Q1", "Q2"]);
    assert!(first.contains(&"South") && !first.contains(&"East"));
    assert_eq!(second[3], "East");
    assert!(second.contains(&"West"));
    assert!(layout.warnings.is_empty(), "{:?}", layout.warnings);
}

#[test]
fn layout_is_idempotent() {
    let mut elements = vec![json!({"type": "heading", "text": "Overview"})];
    elements.extend(common::filler(40));
    elements.push(quarterly_table());
    elements.extend(common::filler(20));
    let description = json!({"elements": elements});

    let a = common::layout(description.clone());
    let b = common::layout(description);
    assert!(a.pages.len() > 2);
    assert_eq!(common::page_boundaries(&a), common::page_boundaries(&b));
    assert_eq!(a.headings, b.headings);
}

#[test]
fn every_explicit_break_starts_a_page() {
    let layout = common::layout(json!({
        "elements": [
            {"type": "text", "content": "first"},
            {"type": "pagebreak"},
            {"type": "pagebreak"},
            {"type": "text", "content": "second"},
            {"type": "pagebreak"}
        ]
    }));
    // back-to-back breaks leave a blank page; the trailing break opens nothing
    assert_eq!(layout.pages.len(), 3);
    assert_eq!(common::page_of(&layout, "first"), Some(1));
    assert!(common::texts(&layout.pages[1]).is_empty());
    assert_eq!(common::page_of(&layout, "second"), Some(3));
}

#[test]
fn oversized_keep_together_block_is_placed_with_a_warning() {
    let long = "A sentence that keeps going so the block outgrows a whole page. ".repeat(120);
    let layout = common::layout(json!({
        "elements": [
            {"type": "text", "content": "before"},
            {"type": "text", "content": long, "keepTogether": true},
            {"type": "text", "content": "after"}
        ]
    }));
    assert!(layout.warnings.iter().any(|w| w.kind == WarningKind::OffFrame));
    // the block starts on a fresh page and the flow carries on after it
    assert_eq!(common::page_of(&layout, "before"), Some(1));
    assert_eq!(common::page_of(&layout, "after"), Some(3));
}

#[test]
fn paragraphs_split_across_pages_by_line() {
    let long = "Words flow from one page to the next without losing any of them. ".repeat(150);
    let layout = common::layout(json!({"elements": [{"type": "text", "content": long}]}));
    assert!(layout.pages.len() >= 2);
    assert!(layout.warnings.is_empty());
    let (_, _, y_last_on_first) = *common::body_texts(&layout.pages[0]).last().unwrap();
    let (_, _, y_first_on_second) = common::body_texts(&layout.pages[1])[0];
    // the continuation starts at the top of the frame again
    assert!(y_first_on_second > y_last_on_first);
}
