//! Table layout on top of a resolved [`RenderPlan`]: cell wrapping, column widths,
//! row heights, and drawing of any row/column subset so the flow can split a
//! table across pages and across column fragments.

use std::ops::Range;

use crate::error::Warning;
use crate::fonts::{FontBook, FontId, Typesetter};
use crate::geometry::INCH;
use crate::grid::{self, RenderPlan};
use crate::input::TableStyle;
use crate::model::{CellValue, Color, HAlign, TableBlock, TextAlign, VAlign};

use super::layout::{LineStyle, TextLine, line_ops, wrap_text};
use super::record::DrawOp;

/// Rows styled as the header: background, font and text color.
const STYLED_HEADER_ROWS: usize = 1;

#[derive(Clone)]
struct CellLayout {
    text: String,
    lines: Vec<TextLine>,
    font: FontId,
    ascender: f32,
    color: Color,
    fill: Option<Color>,
    prewrapped: bool,
}

#[derive(Clone)]
pub(crate) struct TableFlowable {
    plan: RenderPlan,
    /// Parallel to `plan.cells`.
    cells: Vec<CellLayout>,
    col_widths: Vec<f32>,
    row_heights: Vec<f32>,
    header_rows: usize,
    repeat_cols: usize,
    pub(crate) keep_together: bool,
    align: HAlign,
    font_size: f32,
    leading: f32,
    padding: f32,
    grid_color: Color,
    grid_width: f32,
}

/// Auto-fit column widths so that the longest non-breakable word in each column
/// fits within the cell (including padding). Columns that need more space grow;
/// other columns shrink proportionally. Total width is preserved.
fn auto_fit_columns(widths: &[f32], min_widths: &[f32]) -> Vec<f32> {
    let total: f32 = widths.iter().sum();
    let mut widths = widths.to_vec();

    let mut extra_needed: f32 = 0.0;
    let mut shrinkable: f32 = 0.0;
    for (w, &min) in widths.iter_mut().zip(min_widths) {
        if min > *w {
            extra_needed += min - *w;
            *w = min;
        } else {
            shrinkable += *w - min;
        }
    }

    if extra_needed > 0.0 && shrinkable > 0.0 {
        let factor = extra_needed.min(shrinkable) / shrinkable;
        for (w, &min) in widths.iter_mut().zip(min_widths) {
            if *w > min {
                *w -= (*w - min) * factor;
            }
        }
        let new_total: f32 = widths.iter().sum();
        if (new_total - total).abs() > 0.01 {
            let scale = total / new_total;
            for w in &mut widths {
                *w *= scale;
            }
        }
    }

    widths
}

fn text_align(a: HAlign) -> TextAlign {
    match a {
        HAlign::Left => TextAlign::Left,
        HAlign::Center => TextAlign::Center,
        HAlign::Right => TextAlign::Right,
    }
}

/// Pad ragged rows to a rectangle.
fn rectangular(grid: Vec<Vec<CellValue>>) -> (Vec<Vec<CellValue>>, usize) {
    let cols = grid.iter().map(Vec::len).max().unwrap_or(0);
    let grid = grid
        .into_iter()
        .map(|mut row| {
            row.resize(cols, CellValue::Text(String::new()));
            row
        })
        .collect();
    (grid, cols)
}

impl TableFlowable {
    pub(crate) fn build(
        grid: Vec<Vec<CellValue>>,
        block: &TableBlock,
        style: &TableStyle,
        fonts: &mut FontBook,
        frame_width: f32,
        warnings: &mut Vec<Warning>,
    ) -> TableFlowable {
        let (grid, cols) = rectangular(grid);
        let rows = grid.len();
        let (plan, plan_warnings) = grid::resolve(
            rows,
            cols,
            &block.merged_cells,
            &block.cell_alignments,
            style.align,
            style.valign,
        );
        warnings.extend(plan_warnings);

        let header_font = fonts.resolve(Some(&style.header_font), true);
        let body_font = fonts.resolve(Some(&style.body_font), false);
        let size = style.font_size;
        let padding = style.padding;

        let mut cells: Vec<CellLayout> = plan
            .cells
            .iter()
            .map(|p| {
                let is_header = p.row < STYLED_HEADER_ROWS;
                let font = if is_header { header_font } else { body_font };
                let (text, prewrapped) = match &grid[p.row][p.col] {
                    CellValue::Text(s) => (s.clone(), false),
                    CellValue::Lines(lines) => (lines.join("\n"), true),
                };
                CellLayout {
                    lines: Vec::new(),
                    text,
                    font,
                    ascender: fonts.ascender_ratio(font),
                    color: if is_header {
                        style.header_text_color
                    } else {
                        style.text_color
                    },
                    fill: style.row_fill(p.row, STYLED_HEADER_ROWS),
                    prewrapped,
                }
            })
            .collect();

        // natural width = widest unwrapped line; min width = longest word
        let mut natural = vec![2.0 * padding; cols];
        let mut min_widths = vec![2.0 * padding; cols];
        for (p, cell) in plan.cells.iter().zip(&cells) {
            if p.col_span > 1 {
                continue;
            }
            for line in cell.text.split('\n') {
                let w = fonts.text_width(cell.font, size, line) + 2.0 * padding;
                natural[p.col] = natural[p.col].max(w);
                let longest_word = if cell.prewrapped {
                    w
                } else {
                    line.split_whitespace()
                        .map(|word| fonts.text_width(cell.font, size, word) + 2.0 * padding)
                        .fold(0.0, f32::max)
                };
                min_widths[p.col] = min_widths[p.col].max(longest_word);
            }
        }

        let col_widths: Vec<f32> = match &block.column_widths {
            Some(explicit) => (0..cols)
                .map(|c| explicit.get(c).map(|w| w * INCH).unwrap_or(natural[c]))
                .collect(),
            None if natural.iter().sum::<f32>() <= frame_width => natural,
            None if cols > 0 => {
                auto_fit_columns(&vec![frame_width / cols as f32; cols], &min_widths)
            }
            None => Vec::new(),
        };

        let leading = size * 1.2;
        for (p, cell) in plan.cells.iter().zip(cells.iter_mut()) {
            let span_w: f32 = col_widths[p.col..p.col + p.col_span].iter().sum();
            let max_w = if cell.prewrapped {
                f32::INFINITY
            } else {
                (span_w - 2.0 * padding).max(1.0)
            };
            cell.lines = wrap_text(&*fonts, cell.font, size, &cell.text, max_w);
        }

        let explicit_rows = block.row_heights.as_deref().unwrap_or_default();
        let mut row_heights: Vec<f32> = (0..rows)
            .map(|r| explicit_rows.get(r).map(|h| h * INCH).unwrap_or(leading + 2.0 * padding))
            .collect();
        let needed = |cell: &CellLayout| cell.lines.len() as f32 * leading + 2.0 * padding;
        for (p, cell) in plan.cells.iter().zip(&cells) {
            if p.row_span == 1 && explicit_rows.get(p.row).is_none() {
                row_heights[p.row] = row_heights[p.row].max(needed(cell));
            }
        }
        for (p, cell) in plan.cells.iter().zip(&cells) {
            let last = p.row + p.row_span - 1;
            if p.row_span > 1 && explicit_rows.get(last).is_none() {
                let have: f32 = row_heights[p.row..=last].iter().sum();
                let deficit = needed(cell) - have;
                if deficit > 0.0 {
                    row_heights[last] += deficit;
                }
            }
        }

        let mut header_rows = block.repeat_rows.min(rows);
        while plan.splits_merge(header_rows) {
            header_rows += 1;
        }
        let mut repeat_cols = block.repeat_cols.min(cols);
        while plan.splits_merge_cols(repeat_cols) {
            repeat_cols += 1;
        }

        log::debug!(
            "table {rows}x{cols}: {} rendered cells, header_rows={header_rows} repeat_cols={repeat_cols}",
            plan.cells.len()
        );

        TableFlowable {
            plan,
            cells,
            col_widths,
            row_heights,
            header_rows,
            repeat_cols,
            keep_together: block.keep_together,
            align: block.h_align,
            font_size: size,
            leading,
            padding,
            grid_color: style.grid_color,
            grid_width: style.grid_width,
        }
    }

    pub(crate) fn rows(&self) -> usize {
        self.plan.rows
    }

    pub(crate) fn header_rows(&self) -> Range<usize> {
        0..self.header_rows
    }

    pub(crate) fn row_heights(&self) -> &[f32] {
        &self.row_heights
    }

    pub(crate) fn height_of(&self, rows: &[usize]) -> f32 {
        rows.iter().map(|&r| self.row_heights[r]).sum()
    }

    pub(crate) fn width_of(&self, cols: &[usize]) -> f32 {
        cols.iter().map(|&c| self.col_widths[c]).sum()
    }

    pub(crate) fn total_height(&self) -> f32 {
        self.row_heights.iter().sum()
    }

    /// Body rows in unsplittable groups: a group extends past every row boundary
    /// that a row-spanning merge crosses.
    pub(crate) fn row_groups(&self) -> Vec<Range<usize>> {
        let mut groups = Vec::new();
        let mut start = self.header_rows;
        while start < self.plan.rows {
            let mut end = start + 1;
            while self.plan.splits_merge(end) {
                end += 1;
            }
            groups.push(start..end);
            start = end;
        }
        groups
    }

    /// Smallest height that can start the table on a page.
    pub(crate) fn min_height(&self) -> f32 {
        let header: f32 = self.row_heights[..self.header_rows].iter().sum();
        let first = self
            .row_groups()
            .first()
            .map(|g| self.row_heights[g.clone()].iter().sum::<f32>())
            .unwrap_or(0.0);
        header + first
    }

    /// Column subsets that each fit `frame_width`, every one led by the repeated
    /// columns. A table that fits is a single fragment.
    pub(crate) fn col_fragments(&self, frame_width: f32) -> Vec<Vec<usize>> {
        let cols = self.plan.cols;
        let all: Vec<usize> = (0..cols).collect();
        if self.width_of(&all) <= frame_width + 0.01 || cols <= self.repeat_cols {
            return vec![all];
        }
        let lead: Vec<usize> = (0..self.repeat_cols).collect();
        let room = frame_width - self.width_of(&lead);
        let mut fragments = Vec::new();
        let mut c = self.repeat_cols;
        while c < cols {
            let mut run: Vec<usize> = Vec::new();
            let mut used = 0.0;
            while c < cols {
                let mut end = c + 1;
                while self.plan.splits_merge_cols(end) {
                    end += 1;
                }
                let unit_w: f32 = self.col_widths[c..end].iter().sum();
                if !run.is_empty() && used + unit_w > room {
                    break;
                }
                run.extend(c..end);
                used += unit_w;
                c = end;
            }
            fragments.push(lead.iter().copied().chain(run).collect());
        }
        fragments
    }

    /// Left edge for a fragment of `width` placed inside the frame.
    pub(crate) fn x_in_frame(&self, frame_x: f32, frame_width: f32, width: f32) -> f32 {
        let slack = (frame_width - width).max(0.0);
        match self.align {
            HAlign::Left => frame_x,
            HAlign::Center => frame_x + slack / 2.0,
            HAlign::Right => frame_x + slack,
        }
    }

    /// Draw the cells anchored in `rows` × `cols`, stacked in the given order with
    /// the top-left corner at (`x`, `top`).
    pub(crate) fn draw(&self, rows: &[usize], cols: &[usize], x: f32, top: f32, out: &mut Vec<DrawOp>) {
        let mut row_top = vec![None; self.plan.rows];
        let mut y = top;
        for &r in rows {
            row_top[r] = Some(y);
            y -= self.row_heights[r];
        }
        let mut col_x = vec![None; self.plan.cols];
        let mut cx = x;
        for &c in cols {
            col_x[c] = Some(cx);
            cx += self.col_widths[c];
        }

        let mut grid_lines = Vec::new();
        for (p, cell) in self.plan.cells.iter().zip(&self.cells) {
            let (Some(cell_top), Some(cell_x)) = (row_top[p.row], col_x[p.col]) else {
                continue;
            };
            let h: f32 = self.row_heights[p.row..p.row + p.row_span].iter().sum();
            let w: f32 = self.col_widths[p.col..p.col + p.col_span].iter().sum();
            let bottom = cell_top - h;

            if let Some(fill) = cell.fill {
                out.push(DrawOp::FillRect {
                    x: cell_x,
                    y: bottom,
                    width: w,
                    height: h,
                    color: fill,
                    opacity: 1.0,
                });
            }

            let content_h = cell.lines.len() as f32 * self.leading;
            let avail = h - 2.0 * self.padding;
            let offset = match p.valign {
                VAlign::Top => 0.0,
                VAlign::Middle => ((avail - content_h) / 2.0).max(0.0),
                VAlign::Bottom => (avail - content_h).max(0.0),
            };
            let style = LineStyle {
                font: cell.font,
                size: self.font_size,
                leading: self.leading,
                color: cell.color,
                align: text_align(p.align),
                ascender: cell.ascender,
            };
            line_ops(
                &cell.lines,
                0,
                cell.lines.len().saturating_sub(1),
                &style,
                cell_x + self.padding,
                (w - 2.0 * self.padding).max(0.0),
                cell_top - self.padding - offset,
                out,
            );

            if self.grid_width > 0.0 {
                let line = |x1, y1, x2, y2| DrawOp::Line {
                    x1,
                    y1,
                    x2,
                    y2,
                    width: self.grid_width,
                    color: self.grid_color,
                };
                grid_lines.push(line(cell_x, cell_top, cell_x + w, cell_top));
                grid_lines.push(line(cell_x, bottom, cell_x + w, bottom));
                grid_lines.push(line(cell_x, cell_top, cell_x, bottom));
                grid_lines.push(line(cell_x + w, cell_top, cell_x + w, bottom));
            }
        }
        out.extend(grid_lines);
    }
}
