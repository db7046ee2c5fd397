mod common;

use folio_pdf::{AlignmentRegion, HAlign, MergeRegion, VAlign, WarningKind, resolve_grid};
use serde_json::json;

fn region(top: usize, left: usize, bottom: usize, right: usize) -> MergeRegion {
    MergeRegion::from([top, left, bottom, right])
}

fn align(range: MergeRegion, h: Option<HAlign>, v: Option<VAlign>) -> AlignmentRegion {
    AlignmentRegion {
        range,
        align: h,
        valign: v,
    }
}

#[test]
fn rendered_cell_count_accounts_for_every_merge() {
    let cases: &[(usize, usize, Vec<MergeRegion>)] = &[
        (4, 4, vec![]),
        (4, 4, vec![region(0, 0, 0, 3)]),
        (5, 3, vec![region(0, 0, 1, 1), region(2, 2, 4, 2)]),
        (6, 6, vec![region(1, 1, 3, 3), region(4, 0, 5, 5), region(0, 4, 0, 5)]),
    ];
    for (rows, cols, merges) in cases {
        let (plan, warnings) = resolve_grid(*rows, *cols, merges, &[], HAlign::Left, VAlign::Top);
        let suppressed: usize = merges
            .iter()
            .map(|m| (m.bottom_row - m.top_row + 1) * (m.right_col - m.left_col + 1) - 1)
            .sum();
        assert!(warnings.is_empty());
        assert_eq!(plan.cells.len(), rows * cols - suppressed);
        for m in merges {
            for r in m.top_row..=m.bottom_row {
                for c in m.left_col..=m.right_col {
                    let anchored = plan.cells.iter().any(|p| p.row == r && p.col == c);
                    assert_eq!(anchored, (r, c) == (m.top_row, m.left_col));
                }
            }
        }
    }
}

#[test]
fn faulty_merges_are_skipped_with_warnings() {
    let merges = [region(0, 0, 1, 1), region(1, 1, 2, 2), region(3, 0, 9, 0)];
    let (plan, warnings) = resolve_grid(4, 4, &merges, &[], HAlign::Left, VAlign::Top);
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().all(|w| w.kind == WarningKind::MergeRegion));
    assert_eq!(plan.cells.len(), 16 - 3);
    assert_eq!(plan.covering(1, 1).map(|p| (p.row, p.col)), Some((0, 0)));
}

#[test]
fn alignment_is_last_write_wins_per_axis() {
    let alignments = [
        align(region(0, 0, 2, 2), Some(HAlign::Right), Some(VAlign::Bottom)),
        align(region(1, 1, 1, 1), Some(HAlign::Left), None),
        align(region(0, 0, 0, 2), None, Some(VAlign::Top)),
    ];
    let (plan, _) = resolve_grid(3, 3, &[], &alignments, HAlign::Center, VAlign::Middle);
    let cell = |r, c| plan.anchored_at(r, c).copied().unwrap();
    assert_eq!((cell(1, 1).align, cell(1, 1).valign), (HAlign::Left, VAlign::Bottom));
    assert_eq!((cell(0, 1).align, cell(0, 1).valign), (HAlign::Right, VAlign::Top));
    assert_eq!((cell(2, 2).align, cell(2, 2).valign), (HAlign::Right, VAlign::Bottom));
}

#[test]
fn merges_center_unless_a_later_region_fits_inside() {
    let merges = [region(0, 0, 1, 1), region(2, 0, 2, 2)];
    let alignments = [
        align(region(0, 0, 2, 2), Some(HAlign::Left), None),
        align(region(2, 0, 2, 2), Some(HAlign::Right), Some(VAlign::Bottom)),
    ];
    let (plan, _) = resolve_grid(3, 3, &merges, &alignments, HAlign::Left, VAlign::Top);
    let wide = plan.anchored_at(0, 0).unwrap();
    assert_eq!((wide.align, wide.valign), (HAlign::Center, VAlign::Middle));
    let exact = plan.anchored_at(2, 0).unwrap();
    assert_eq!((exact.align, exact.valign), (HAlign::Right, VAlign::Bottom));
}

#[test]
fn merged_cell_text_is_drawn_once() {
    let layout = common::layout(json!({
        "elements": [{
            "type": "table",
            "data": [
                ["Summary", "", ""],
                ["a", "b", "c"],
                ["d", "e", "f"]
            ],
            "mergedCells": [[0, 0, 0, 2], [1, 1, 2, 1], [2, 2, 9, 2]]
        }]
    }));
    let texts = common::texts(&layout.pages[0]);
    assert_eq!(texts.iter().filter(|t| **t == "Summary").count(), 1);
    assert!(!texts.contains(&"e"));
    assert!(texts.contains(&"f"));
    let merge_warnings = layout
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::MergeRegion)
        .count();
    assert_eq!(merge_warnings, 1);
}

#[test]
fn wide_long_table_repeats_lead_columns_and_header_on_every_piece() {
    let cols = 10;
    let mut data = vec![(0..cols).map(|c| json!(format!("h{c}"))).collect::<Vec<_>>()];
    for r in 1..40 {
        data.push((0..cols).map(|c| json!(format!("r{r}c{c}"))).collect());
    }
    let layout = common::layout(json!({
        "metadata": {"pageSize": "LETTER", "margin": 1},
        "elements": [{
            "type": "table",
            "data": data,
            "columnWidths": vec![1.5; cols],
            "rowHeights": vec![0.5; 40],
            "repeatRows": 1,
            "repeatCols": 1,
            "hAlign": "left"
        }]
    }));
    // three column fragments, each taller than a page
    assert!(layout.pages.len() >= 6, "{} pages", layout.pages.len());
    assert!(layout.warnings.is_empty(), "{:?}", layout.warnings);

    let mut header_copies = 0;
    for page in &layout.pages {
        let drawn = common::body_texts(page);
        let find = |needle: &str| drawn.iter().find(|(t, _, _)| *t == needle).map(|&(_, x, y)| (x, y));
        if find("h0").is_some() {
            header_copies += 1;
        }
        for &(text, x, y) in &drawn {
            let Some((row, col)) = text
                .strip_prefix('r')
                .and_then(|rest| rest.split_once('c'))
            else {
                continue;
            };
            // the lead column sits at the frame's left edge on every piece
            let (lead_x, lead_y) = find(format!("r{row}c0").as_str()).expect("lead column repeated");
            assert!((lead_x - (72.0 + 6.0)).abs() < 1e-3);
            assert!((lead_y - y).abs() < 1e-3);
            assert!(x >= lead_x);
            // and the header row above the body rows of this piece
            assert!(find(format!("h{col}").as_str()).is_some(), "header for {text} missing");
        }
    }
    assert!(header_copies >= 6);
    assert!(common::page_of(&layout, "r39c9").is_some());
    assert_eq!(common::page_of(&layout, "r1c1"), Some(1));
}
