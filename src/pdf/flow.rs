//! The flow compositor: places flowables top to bottom into the content frame,
//! breaking pages and splitting text and tables where allowed.

use crate::error::{Warning, WarningKind};
use crate::fonts::{FontBook, Typesetter};
use crate::geometry::Frame;
use crate::images::ImageId;
use crate::input::ParagraphStyle;
use crate::model::{Color, HAlign};

use super::layout::{LineStyle, TextLine, line_ops, wrap_text};
use super::record::{DrawOp, PageRecord, PageRecorder};
use super::table::TableFlowable;
use super::toc::{ForwardReferenceEntry, ForwardReferences};

/// Space between two column fragments of a wide table.
const FRAGMENT_GAP: f32 = 12.0;

/// Heading identity carried into the forward-reference log when placed.
#[derive(Clone, Debug)]
pub(crate) struct HeadingMark {
    pub(crate) level: u8,
    pub(crate) title: String,
    pub(crate) key: String,
}

/// Dot leader and page number on the last line of a TOC entry.
#[derive(Clone, Debug)]
pub(crate) struct Leader {
    pub(crate) dots: String,
    /// From the text's left edge.
    pub(crate) dots_offset: f32,
    pub(crate) page_text: String,
    pub(crate) page_width: f32,
    pub(crate) color: Color,
    pub(crate) target: Option<String>,
}

#[derive(Clone)]
pub(crate) struct TextFlowable {
    pub(crate) lines: Vec<TextLine>,
    pub(crate) style: LineStyle,
    pub(crate) indent_left: f32,
    pub(crate) indent_right: f32,
    pub(crate) space_before: f32,
    pub(crate) space_after: f32,
    pub(crate) keep_together: bool,
    pub(crate) heading: Option<HeadingMark>,
    /// List markers as (line index, text), drawn `marker_indent` left of the text.
    pub(crate) markers: Vec<(usize, String)>,
    pub(crate) marker_indent: f32,
    pub(crate) leader: Option<Leader>,
}

impl TextFlowable {
    pub(crate) fn from_style(style: &ParagraphStyle, text: &str, fonts: &mut FontBook, frame_width: f32) -> Self {
        let font = fonts.resolve(Some(&style.font_name), false);
        let width = (frame_width - style.left_indent - style.right_indent).max(style.font_size);
        TextFlowable {
            lines: wrap_text(&*fonts, font, style.font_size, text, width),
            style: LineStyle {
                font,
                size: style.font_size,
                leading: style.leading,
                color: style.color,
                align: style.alignment,
                ascender: fonts.ascender_ratio(font),
            },
            indent_left: style.left_indent,
            indent_right: style.right_indent,
            space_before: style.space_before,
            space_after: style.space_after,
            keep_together: false,
            heading: None,
            markers: Vec::new(),
            marker_indent: 0.0,
            leader: None,
        }
    }

    fn height(&self) -> f32 {
        self.lines.len() as f32 * self.style.leading
    }
}

/// Zero-footprint content positioned page-absolute (cover pages).
#[derive(Clone, Default)]
pub(crate) struct AbsoluteLayer {
    /// Drawn beneath everything else on the page.
    pub(crate) beneath: Vec<DrawOp>,
    pub(crate) items: Vec<DrawOp>,
}

#[derive(Clone)]
pub(crate) enum Flowable {
    Text(TextFlowable),
    Table(TableFlowable),
    Image {
        id: ImageId,
        width: f32,
        height: f32,
        align: HAlign,
    },
    Spacer(f32),
    PageBreak,
    Absolute(AbsoluteLayer),
}

impl Flowable {
    /// Height that must fit for the flowable to start on the current page.
    fn min_height(&self) -> f32 {
        match self {
            Flowable::Text(t) if t.keep_together || t.heading.is_some() => t.height(),
            Flowable::Text(t) => t.lines.first().map(|_| t.style.leading).unwrap_or(0.0),
            Flowable::Table(t) if t.keep_together => t.total_height(),
            Flowable::Table(t) => t.min_height(),
            Flowable::Image { height, .. } => *height,
            Flowable::Spacer(_) | Flowable::PageBreak | Flowable::Absolute(_) => 0.0,
        }
    }

    fn space_before(&self) -> f32 {
        match self {
            Flowable::Text(t) => t.space_before,
            _ => 0.0,
        }
    }
}

/// Lay out `flowables` into pages of `frame`, appending a forward-reference
/// entry for every heading placed.
pub(crate) fn layout(
    flowables: Vec<Flowable>,
    frame: Frame,
    refs: &mut ForwardReferences,
    warnings: &mut Vec<Warning>,
) -> Vec<PageRecord> {
    let mut flow = Flow::new(frame, refs, warnings);
    let mut iter = flowables.into_iter().peekable();
    while let Some(f) = iter.next() {
        let next = iter.peek().map(|n| n.space_before() + n.min_height());
        flow.place(f, next);
    }
    flow.recorder.finish()
}

struct Flow<'a> {
    frame: Frame,
    recorder: PageRecorder,
    /// Top of the space still free on the current page.
    y: f32,
    prev_space_after: f32,
    /// Nothing has flowed onto this page yet.
    fresh: bool,
    refs: &'a mut ForwardReferences,
    warnings: &'a mut Vec<Warning>,
}

impl<'a> Flow<'a> {
    fn new(frame: Frame, refs: &'a mut ForwardReferences, warnings: &'a mut Vec<Warning>) -> Self {
        Flow {
            frame,
            recorder: PageRecorder::new(),
            y: frame.top(),
            prev_space_after: 0.0,
            fresh: true,
            refs,
            warnings,
        }
    }

    fn remaining(&self) -> f32 {
        self.y - self.frame.y
    }

    fn gap(&self, space_before: f32) -> f32 {
        if self.fresh {
            0.0
        } else {
            self.prev_space_after.max(space_before)
        }
    }

    fn new_page(&mut self) {
        self.recorder.show_page();
        self.y = self.frame.top();
        self.prev_space_after = 0.0;
        self.fresh = true;
    }

    fn off_frame(&mut self, what: &str, height: f32) {
        log::warn!(
            "{what} ({height:.1}pt) exceeds the {:.1}pt frame on page {}; placed off-frame",
            self.frame.height,
            self.recorder.page_index()
        );
        self.warnings.push(Warning::new(
            WarningKind::OffFrame,
            format!(
                "{what} of {height:.1}pt does not fit the {:.1}pt frame on page {}",
                self.frame.height,
                self.recorder.page_index()
            ),
        ));
    }

    fn place(&mut self, f: Flowable, next_min: Option<f32>) {
        match f {
            Flowable::Text(t) => self.place_text(t, next_min),
            Flowable::Table(t) => self.place_table(t),
            Flowable::Image {
                id,
                width,
                height,
                align,
            } => self.place_image(id, width, height, align),
            Flowable::Spacer(h) => {
                if h > self.remaining() {
                    self.new_page();
                } else {
                    self.y -= h;
                    self.prev_space_after = 0.0;
                    self.fresh = false;
                }
            }
            Flowable::PageBreak => self.new_page(),
            Flowable::Absolute(layer) => self.place_absolute(layer),
        }
    }

    fn place_text(&mut self, t: TextFlowable, next_min: Option<f32>) {
        let gap = self.gap(t.space_before);
        let mut need = gap + t.height();
        if t.heading.is_some() {
            need += next_min.unwrap_or(0.0);
        }
        if need > self.remaining() && !self.fresh {
            self.new_page();
        }

        let total = t.lines.len();
        let unsplittable = t.keep_together || t.heading.is_some() || total <= 1;
        if unsplittable {
            if t.height() > self.remaining() + 0.01 {
                self.off_frame("text block", t.height());
            }
            let gap = self.gap(t.space_before);
            self.draw_text(&t, 0..total, gap);
            return;
        }

        let mut start = 0;
        while start < total {
            let gap = if start == 0 { self.gap(t.space_before) } else { 0.0 };
            let room = self.remaining() - gap;
            let fit = ((room + 0.01) / t.style.leading).floor().max(0.0) as usize;
            let take = if fit == 0 && self.fresh { 1 } else { fit.min(total - start) };
            if take == 0 {
                self.new_page();
                continue;
            }
            self.draw_text(&t, start..start + take, gap);
            start += take;
            if start < total {
                self.new_page();
            }
        }
    }

    fn draw_text(&mut self, t: &TextFlowable, range: std::ops::Range<usize>, gap: f32) {
        let top = self.y - gap;
        let x = self.frame.x + t.indent_left;
        let width = self.frame.width - t.indent_left - t.indent_right;
        let mut ops = Vec::new();
        let first = range.start;
        let count = range.len();
        line_ops(
            &t.lines[range.clone()],
            first,
            t.lines.len().saturating_sub(1),
            &t.style,
            x,
            width,
            top,
            &mut ops,
        );
        let baseline = |n: usize| top - n as f32 * t.style.leading - t.style.size * t.style.ascender;

        for (line, marker) in t.markers.iter().filter(|(line, _)| range.contains(line)) {
            ops.push(DrawOp::Text {
                x: x - t.marker_indent,
                y: baseline(line - first),
                font: t.style.font,
                size: t.style.size,
                color: t.style.color,
                text: marker.clone(),
            });
        }
        if first == 0 {
            if let Some(h) = &t.heading {
                let entry = ForwardReferenceEntry {
                    level: h.level,
                    title: h.title.clone(),
                    page: self.recorder.page_index(),
                    key: h.key.clone(),
                    y: top,
                };
                if let Some(idx) = self.refs.record(entry) {
                    self.recorder.mark_heading(idx);
                }
            }
        }

        if let Some(leader) = t.leader.as_ref().filter(|_| range.end == t.lines.len()) {
            let y = baseline(count - 1);
            ops.push(DrawOp::Text {
                x: x + leader.dots_offset,
                y,
                font: t.style.font,
                size: t.style.size,
                color: leader.color,
                text: leader.dots.clone(),
            });
            ops.push(DrawOp::Text {
                x: x + width - leader.page_width,
                y,
                font: t.style.font,
                size: t.style.size,
                color: t.style.color,
                text: leader.page_text.clone(),
            });
            if let Some(target) = &leader.target {
                ops.push(DrawOp::Link {
                    x,
                    y: top - count as f32 * t.style.leading,
                    width,
                    height: count as f32 * t.style.leading,
                    target: target.clone(),
                });
            }
        }

        for op in ops {
            self.recorder.draw(op);
        }
        self.y = top - count as f32 * t.style.leading;
        self.prev_space_after = t.space_after;
        self.fresh = false;
    }

    fn place_image(&mut self, id: ImageId, width: f32, height: f32, align: HAlign) {
        // Oversized images shrink to the frame, keeping their proportions.
        let scale = (self.frame.width / width)
            .min(self.frame.height / height)
            .min(1.0);
        let (w, h) = (width * scale, height * scale);
        if scale < 1.0 {
            log::debug!("image scaled by {scale:.3} to fit the frame");
        }
        let mut gap = self.gap(0.0);
        if gap + h > self.remaining() && !self.fresh {
            self.new_page();
            gap = 0.0;
        }
        let top = self.y - gap;
        let x = match align {
            HAlign::Left => self.frame.x,
            HAlign::Center => self.frame.x + (self.frame.width - w) / 2.0,
            HAlign::Right => self.frame.x + self.frame.width - w,
        };
        self.recorder.draw(DrawOp::Image {
            id,
            x,
            y: top - h,
            width: w,
            height: h,
        });
        self.y = top - h;
        self.prev_space_after = 0.0;
        self.fresh = false;
    }

    fn place_table(&mut self, t: TableFlowable) {
        let fragments = t.col_fragments(self.frame.width);
        for (n, cols) in fragments.iter().enumerate() {
            if n > 0 {
                self.prev_space_after = self.prev_space_after.max(FRAGMENT_GAP);
            }
            self.place_table_fragment(&t, cols);
        }
    }

    fn place_table_fragment(&mut self, t: &TableFlowable, cols: &[usize]) {
        let all_rows: Vec<usize> = (0..t.rows()).collect();
        let total = t.height_of(&all_rows);
        let width = t.width_of(cols);
        let x = t.x_in_frame(self.frame.x, self.frame.width, width);

        let gap = self.gap(0.0);
        if gap + total <= self.remaining() {
            self.draw_table_rows(t, &all_rows, cols, x, gap);
            return;
        }
        if t.keep_together {
            if !self.fresh {
                self.new_page();
            }
            if total > self.remaining() + 0.01 {
                self.off_frame("table", total);
            }
            self.draw_table_rows(t, &all_rows, cols, x, 0.0);
            return;
        }

        let header: Vec<usize> = t.header_rows().collect();
        let header_h = t.height_of(&header);
        let groups = t.row_groups();
        let mut next = 0;
        loop {
            let gap = self.gap(0.0);
            let room = self.remaining() - gap;
            let mut rows = header.clone();
            let mut used = header_h;
            let mut taken = 0;
            while next + taken < groups.len() {
                let group = groups[next + taken].clone();
                let h: f32 = t.row_heights()[group.clone()].iter().sum();
                if used + h > room + 0.01 {
                    break;
                }
                rows.extend(group);
                used += h;
                taken += 1;
            }
            if taken == 0 && next < groups.len() {
                if !self.fresh {
                    self.new_page();
                    continue;
                }
                let group = groups[next].clone();
                rows.extend(group);
                taken = 1;
                used = t.height_of(&rows);
                self.off_frame("table rows", used);
            }
            self.draw_table_rows(t, &rows, cols, x, gap);
            next += taken;
            if next >= groups.len() {
                break;
            }
            self.new_page();
        }
    }

    fn draw_table_rows(&mut self, t: &TableFlowable, rows: &[usize], cols: &[usize], x: f32, gap: f32) {
        let top = self.y - gap;
        let mut ops = Vec::new();
        t.draw(rows, cols, x, top, &mut ops);
        for op in ops {
            self.recorder.draw(op);
        }
        self.y = top - t.height_of(rows);
        self.prev_space_after = 0.0;
        self.fresh = false;
    }

    /// Absolute items carry page coordinates already; they take no room in the
    /// flow and are recorded wherever the cursor happens to be.
    fn place_absolute(&mut self, layer: AbsoluteLayer) {
        for op in layer.beneath {
            self.recorder.draw_beneath(op);
        }
        for op in layer.items {
            self.recorder.draw(op);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::layout::WordChunk;
    use super::*;
    use crate::fonts::FontId;
    use crate::model::TextAlign;

    fn frame() -> Frame {
        Frame {
            x: 72.0,
            y: 72.0,
            width: 468.0,
            height: 120.0,
        }
    }

    fn text(lines: usize, keep_together: bool) -> TextFlowable {
        TextFlowable {
            lines: (0..lines)
                .map(|i| TextLine {
                    chunks: vec![WordChunk {
                        text: format!("line {i}"),
                        x_offset: 0.0,
                        width: 30.0,
                    }],
                    total_width: 30.0,
                })
                .collect(),
            style: LineStyle {
                font: FontId(0),
                size: 10.0,
                leading: 12.0,
                color: Color::BLACK,
                align: TextAlign::Left,
                ascender: 0.75,
            },
            indent_left: 0.0,
            indent_right: 0.0,
            space_before: 0.0,
            space_after: 0.0,
            keep_together,
            heading: None,
            markers: Vec::new(),
            marker_indent: 0.0,
            leader: None,
        }
    }

    fn run(flowables: Vec<Flowable>) -> (Vec<PageRecord>, Vec<Warning>, ForwardReferences) {
        let mut refs = ForwardReferences::new();
        let mut warnings = Vec::new();
        let pages = layout(flowables, frame(), &mut refs, &mut warnings);
        (pages, warnings, refs)
    }

    #[test]
    fn long_text_splits_by_lines() {
        // 120pt frame holds ten 12pt lines
        let (pages, warnings, _) = run(vec![Flowable::Text(text(25, false))]);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].texts().count(), 10);
        assert_eq!(pages[2].texts().next(), Some("line 20"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn keep_together_moves_whole_block_and_warns_only_when_too_tall() {
        let (pages, warnings, _) = run(vec![
            Flowable::Text(text(5, false)),
            Flowable::Text(text(8, true)),
        ]);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].texts().count(), 8);
        assert!(warnings.is_empty());

        let (pages, warnings, _) = run(vec![Flowable::Text(text(15, true))]);
        assert_eq!(pages.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::OffFrame);
    }

    #[test]
    fn explicit_breaks_and_headings() {
        let mut heading = text(1, false);
        heading.heading = Some(HeadingMark {
            level: 2,
            title: "Scope".into(),
            key: "heading_1".into(),
        });
        let (pages, _, refs) = run(vec![
            Flowable::Text(text(1, false)),
            Flowable::PageBreak,
            Flowable::PageBreak,
            Flowable::Text(heading),
        ]);
        // the second break leaves page 2 blank
        assert_eq!(pages.len(), 3);
        assert!(pages[1].ops.is_empty());
        assert_eq!(refs.entries()[0].page, 3);
        assert_eq!(pages[2].headings, vec![0]);
    }

    #[test]
    fn heading_is_kept_with_the_following_block() {
        let mut heading = text(1, false);
        heading.heading = Some(HeadingMark {
            level: 1,
            title: "Results".into(),
            key: "heading_1".into(),
        });
        let (pages, _, refs) = run(vec![
            Flowable::Text(text(8, false)),
            Flowable::Text(heading),
            Flowable::Text(text(3, true)),
        ]);
        assert_eq!(pages.len(), 2);
        assert_eq!(refs.entries()[0].page, 2);
    }

    #[test]
    fn absolute_layers_do_not_move_the_flow() {
        let layer = AbsoluteLayer {
            beneath: vec![DrawOp::FillRect {
                x: 0.0,
                y: 0.0,
                width: 612.0,
                height: 792.0,
                color: Color::WHITE,
                opacity: 1.0,
            }],
            items: vec![DrawOp::Text {
                x: 306.0,
                y: 500.0,
                font: FontId(0),
                size: 12.0,
                color: Color::BLACK,
                text: "Cover".into(),
            }],
        };
        let (pages, _, _) = run(vec![
            Flowable::Text(text(2, false)),
            Flowable::Absolute(layer),
            Flowable::Text(text(1, false)),
        ]);
        let page = &pages[0];
        assert!(matches!(page.ops[0], DrawOp::FillRect { .. }));
        let cover = page.ops.iter().find_map(|op| match op {
            DrawOp::Text { x, y, text, .. } if text == "Cover" => Some((*x, *y)),
            _ => None,
        });
        assert_eq!(cover, Some((306.0, 500.0)));
        // the third block continues right below the first
        let third = page.ops.iter().rev().find_map(|op| match op {
            DrawOp::Text { y, .. } => Some(*y),
            _ => None,
        });
        assert_eq!(third, Some(192.0 - 24.0 - 7.5));
    }
}
