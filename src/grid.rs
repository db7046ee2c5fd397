//! Resolution of merge regions and alignment regions into a per-cell render plan.
//!
//! Merges are planned first; alignment regions are then folded over the plan in
//! declaration order, each axis keeping the last value written to it.

use crate::error::{Warning, WarningKind};
use crate::model::{AlignmentRegion, HAlign, MergeRegion, VAlign};

/// One visible cell. Interior cells of a merge never get a placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellPlacement {
    pub row: usize,
    pub col: usize,
    pub row_span: usize,
    pub col_span: usize,
    pub align: HAlign,
    pub valign: VAlign,
}

impl CellPlacement {
    pub fn footprint(&self) -> MergeRegion {
        MergeRegion {
            top_row: self.row,
            left_col: self.col,
            bottom_row: self.row + self.row_span - 1,
            right_col: self.col + self.col_span - 1,
        }
    }

    pub fn is_merged(&self) -> bool {
        self.row_span > 1 || self.col_span > 1
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderPlan {
    pub rows: usize,
    pub cols: usize,
    /// Row-major by anchor position.
    pub cells: Vec<CellPlacement>,
    /// For every grid position, the index into `cells` of the placement covering it.
    owner: Vec<usize>,
}

impl RenderPlan {
    /// The placement covering `(row, col)`, whether anchor or interior.
    pub fn covering(&self, row: usize, col: usize) -> Option<&CellPlacement> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.owner.get(row * self.cols + col).map(|&i| &self.cells[i])
    }

    /// The placement anchored exactly at `(row, col)`.
    pub fn anchored_at(&self, row: usize, col: usize) -> Option<&CellPlacement> {
        self.covering(row, col)
            .filter(|c| c.row == row && c.col == col)
    }

    /// True when a row-spanning merge crosses the boundary between `row - 1` and `row`.
    pub fn splits_merge(&self, row: usize) -> bool {
        row > 0
            && row < self.rows
            && self
                .cells
                .iter()
                .any(|c| c.row < row && c.row + c.row_span > row)
    }

    /// True when a column-spanning merge crosses the boundary between `col - 1` and `col`.
    pub fn splits_merge_cols(&self, col: usize) -> bool {
        col > 0
            && col < self.cols
            && self
                .cells
                .iter()
                .any(|c| c.col < col && c.col + c.col_span > col)
    }
}

fn in_bounds(region: &MergeRegion, rows: usize, cols: usize) -> bool {
    region.bottom_row < rows && region.right_col < cols
}

fn is_ordered(region: &MergeRegion) -> bool {
    region.top_row <= region.bottom_row && region.left_col <= region.right_col
}

/// Build the render plan for a `rows`×`cols` grid.
pub fn resolve(
    rows: usize,
    cols: usize,
    merges: &[MergeRegion],
    alignments: &[AlignmentRegion],
    default_align: HAlign,
    default_valign: VAlign,
) -> (RenderPlan, Vec<Warning>) {
    let mut warnings = Vec::new();

    let mut accepted: Vec<MergeRegion> = Vec::new();
    for m in merges {
        let fault = if !is_ordered(m) {
            Some("corners are reversed")
        } else if !in_bounds(m, rows, cols) {
            Some("lies outside the table")
        } else if accepted.iter().any(|a| a.intersects(m)) {
            Some("overlaps an earlier merge")
        } else {
            None
        };
        match fault {
            Some(why) => {
                log::warn!("Skipping merge region {m:?}: {why}");
                warnings.push(Warning::new(
                    WarningKind::MergeRegion,
                    format!(
                        "merge [{}, {}, {}, {}] skipped: {why}",
                        m.top_row, m.left_col, m.bottom_row, m.right_col
                    ),
                ));
            }
            None => accepted.push(*m),
        }
    }

    let mut region_at: Vec<Option<usize>> = vec![None; rows * cols];
    for (i, m) in accepted.iter().enumerate() {
        for r in m.top_row..=m.bottom_row {
            for c in m.left_col..=m.right_col {
                region_at[r * cols + c] = Some(i);
            }
        }
    }

    let mut cells = Vec::with_capacity(rows * cols);
    let mut owner = vec![0usize; rows * cols];
    let mut anchor_index: Vec<Option<usize>> = vec![None; accepted.len()];
    for r in 0..rows {
        for c in 0..cols {
            let slot = r * cols + c;
            match region_at[slot] {
                Some(ri) => match anchor_index[ri] {
                    Some(idx) => owner[slot] = idx,
                    None => {
                        let m = &accepted[ri];
                        anchor_index[ri] = Some(cells.len());
                        owner[slot] = cells.len();
                        cells.push(CellPlacement {
                            row: r,
                            col: c,
                            row_span: m.bottom_row - m.top_row + 1,
                            col_span: m.right_col - m.left_col + 1,
                            align: HAlign::Center,
                            valign: VAlign::Middle,
                        });
                    }
                },
                None => {
                    owner[slot] = cells.len();
                    cells.push(CellPlacement {
                        row: r,
                        col: c,
                        row_span: 1,
                        col_span: 1,
                        align: default_align,
                        valign: default_valign,
                    });
                }
            }
        }
    }

    for region in alignments {
        let range = &region.range;
        if !is_ordered(range) || !in_bounds(range, rows, cols) {
            warnings.push(Warning::new(
                WarningKind::AlignmentRegion,
                format!(
                    "alignment [{}, {}, {}, {}] skipped: outside the table",
                    range.top_row, range.left_col, range.bottom_row, range.right_col
                ),
            ));
            continue;
        }
        for cell in cells.iter_mut() {
            if !range.contains(cell.row, cell.col) {
                continue;
            }
            // A region wider than a merge does not override the merge's centering.
            if cell.is_merged() && !cell.footprint().encloses(range) {
                continue;
            }
            if let Some(a) = region.align {
                cell.align = a;
            }
            if let Some(v) = region.valign {
                cell.valign = v;
            }
        }
    }

    (
        RenderPlan {
            rows,
            cols,
            cells,
            owner,
        },
        warnings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(t: usize, l: usize, b: usize, r: usize) -> MergeRegion {
        MergeRegion::from([t, l, b, r])
    }

    fn align(range: MergeRegion, align: Option<HAlign>, valign: Option<VAlign>) -> AlignmentRegion {
        AlignmentRegion { range, align, valign }
    }

    #[test]
    fn rendered_cell_count_accounts_for_merges() {
        let merges = [region(0, 0, 0, 2), region(1, 0, 3, 0), region(2, 2, 3, 3)];
        let (plan, warnings) = resolve(5, 4, &merges, &[], HAlign::Left, VAlign::Middle);
        assert!(warnings.is_empty());
        // 20 - (3-1) - (3-1) - (4-1)
        assert_eq!(plan.cells.len(), 13);
        assert!(plan.anchored_at(0, 1).is_none());
        assert_eq!(plan.covering(3, 3).map(|c| (c.row, c.col)), Some((2, 2)));
        let anchor = plan.anchored_at(1, 0).unwrap();
        assert_eq!((anchor.row_span, anchor.align), (3, HAlign::Center));
    }

    #[test]
    fn faulty_merges_are_skipped() {
        let merges = [region(0, 0, 1, 1), region(1, 1, 2, 2), region(2, 0, 1, 0), region(0, 0, 9, 0)];
        let (plan, warnings) = resolve(3, 3, &merges, &[], HAlign::Left, VAlign::Middle);
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().all(|w| w.kind == WarningKind::MergeRegion));
        assert_eq!(plan.cells.len(), 6);
    }

    #[test]
    fn alignment_fold_is_last_write_wins_per_axis() {
        let alignments = [
            align(region(0, 0, 2, 2), Some(HAlign::Right), Some(VAlign::Top)),
            align(region(1, 1, 1, 1), Some(HAlign::Center), None),
            align(region(0, 0, 1, 1), None, Some(VAlign::Bottom)),
        ];
        let (plan, _) = resolve(3, 3, &[], &alignments, HAlign::Left, VAlign::Middle);
        let c = plan.anchored_at(1, 1).unwrap();
        assert_eq!((c.align, c.valign), (HAlign::Center, VAlign::Bottom));
        let c = plan.anchored_at(2, 2).unwrap();
        assert_eq!((c.align, c.valign), (HAlign::Right, VAlign::Top));
    }

    #[test]
    fn only_enclosed_regions_override_merge_anchors() {
        let merges = [region(0, 0, 1, 1)];
        let alignments = [
            align(region(0, 0, 2, 2), Some(HAlign::Right), None),
            align(region(0, 0, 0, 0), None, Some(VAlign::Top)),
        ];
        let (plan, _) = resolve(3, 3, &merges, &alignments, HAlign::Left, VAlign::Middle);
        let anchor = plan.anchored_at(0, 0).unwrap();
        assert_eq!((anchor.align, anchor.valign), (HAlign::Center, VAlign::Top));
        assert_eq!(plan.anchored_at(2, 2).unwrap().align, HAlign::Right);
    }

    #[test]
    fn split_points_respect_row_spans() {
        let (plan, _) = resolve(4, 2, &[region(1, 0, 2, 0)], &[], HAlign::Left, VAlign::Middle);
        assert!(plan.splits_merge(2));
        assert!(!plan.splits_merge(1));
        assert!(!plan.splits_merge(3));
    }
}
