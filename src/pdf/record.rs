//! Per-page draw logs. Pages are recorded during flow and replayed once the
//! total page count is known, with overlay operations appended after the body.

use crate::error::{ElementError, Warning, WarningKind};
use crate::fonts::FontId;
use crate::images::ImageId;
use crate::model::Color;

/// One drawing primitive in page coordinates (points, origin bottom-left).
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    /// `y` is the baseline.
    Text {
        x: f32,
        y: f32,
        font: FontId,
        size: f32,
        color: Color,
        text: String,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        width: f32,
        color: Color,
    },
    FillRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Color,
        opacity: f32,
    },
    Image {
        id: ImageId,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    /// Clickable area jumping to a heading's navigation key.
    Link {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        target: String,
    },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageRecord {
    /// 1-based.
    pub index: usize,
    pub ops: Vec<DrawOp>,
    /// Number of leading ops that belong to the body; anything after is overlay.
    pub body_len: usize,
    /// Forward-reference entries for headings placed on this page.
    pub headings: Vec<usize>,
}

impl PageRecord {
    pub fn body(&self) -> &[DrawOp] {
        &self.ops[..self.body_len.min(self.ops.len())]
    }

    pub fn overlay(&self) -> &[DrawOp] {
        &self.ops[self.body_len.min(self.ops.len())..]
    }

    /// Every text string drawn on the page, in draw order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Append-only recorder for the page currently being filled.
#[derive(Debug)]
pub struct PageRecorder {
    pages: Vec<PageRecord>,
    current: PageRecord,
    /// Ops inserted beneath the body so far on the current page.
    beneath: usize,
}

impl Default for PageRecorder {
    fn default() -> Self {
        PageRecorder::new()
    }
}

impl PageRecorder {
    pub fn new() -> Self {
        PageRecorder {
            pages: Vec::new(),
            current: PageRecord {
                index: 1,
                ..PageRecord::default()
            },
            beneath: 0,
        }
    }

    /// 1-based index of the page being recorded.
    pub fn page_index(&self) -> usize {
        self.current.index
    }

    pub fn is_blank(&self) -> bool {
        self.current.ops.is_empty()
    }

    pub fn draw(&mut self, op: DrawOp) {
        self.current.ops.push(op);
    }

    /// Draw beneath everything recorded on this page so far, keeping earlier
    /// beneath-ops below later ones.
    pub fn draw_beneath(&mut self, op: DrawOp) {
        self.current.ops.insert(self.beneath, op);
        self.beneath += 1;
    }

    pub fn mark_heading(&mut self, entry: usize) {
        self.current.headings.push(entry);
    }

    /// Close the current page and start the next.
    pub fn show_page(&mut self) {
        let next = PageRecord {
            index: self.current.index + 1,
            ..PageRecord::default()
        };
        let mut done = std::mem::replace(&mut self.current, next);
        done.body_len = done.ops.len();
        self.pages.push(done);
        self.beneath = 0;
    }

    /// Close recording. A trailing blank page is dropped unless it is the only page.
    pub fn finish(mut self) -> Vec<PageRecord> {
        if !self.is_blank() || self.pages.is_empty() {
            self.show_page();
        }
        self.pages
    }
}

/// Replay every page with its overlay. `overlay` gets the page, its 1-based
/// index and the total page count; a failure leaves that page without overlay.
pub fn finalize<F>(pages: Vec<PageRecord>, mut overlay: F, warnings: &mut Vec<Warning>) -> Vec<PageRecord>
where
    F: FnMut(&PageRecord, usize, usize) -> Result<Vec<DrawOp>, ElementError>,
{
    let total = pages.len();
    pages
        .into_iter()
        .map(|mut page| {
            page.ops.truncate(page.body_len);
            match overlay(&page, page.index, total) {
                Ok(ops) => page.ops.extend(ops),
                Err(e) => {
                    log::warn!("Overlay failed on page {}: {e}", page.index);
                    warnings.push(Warning::new(
                        WarningKind::Overlay,
                        format!("page {}: {e}", page.index),
                    ));
                }
            }
            page
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f32) -> DrawOp {
        DrawOp::FillRect {
            x,
            y: 0.0,
            width: 1.0,
            height: 1.0,
            color: Color::BLACK,
            opacity: 1.0,
        }
    }

    #[test]
    fn beneath_ops_stay_below_body_in_order() {
        let mut rec = PageRecorder::new();
        rec.draw(rect(3.0));
        rec.draw_beneath(rect(1.0));
        rec.draw_beneath(rect(2.0));
        let pages = rec.finish();
        assert_eq!(pages[0].ops, vec![rect(1.0), rect(2.0), rect(3.0)]);
    }

    #[test]
    fn trailing_blank_page_is_dropped() {
        let mut rec = PageRecorder::new();
        rec.draw(rect(0.0));
        rec.show_page();
        let pages = rec.finish();
        assert_eq!(pages.len(), 1);
        assert_eq!(PageRecorder::new().finish().len(), 1);
    }

    #[test]
    fn overlay_appends_after_body_and_replays_idempotently() {
        let mut rec = PageRecorder::new();
        rec.draw(rect(0.0));
        rec.show_page();
        rec.draw(rect(1.0));
        let pages = rec.finish();
        let mut warnings = Vec::new();
        let once = finalize(pages, |_, i, total| Ok(vec![rect((i * 10 + total) as f32)]), &mut warnings);
        let twice = finalize(once.clone(), |_, i, total| Ok(vec![rect((i * 10 + total) as f32)]), &mut warnings);
        assert_eq!(once, twice);
        assert_eq!(twice[1].overlay(), &[rect(22.0)]);
        assert_eq!(twice[1].body(), &[rect(1.0)]);
    }

    #[test]
    fn failing_overlay_is_isolated_to_its_page() {
        let mut rec = PageRecorder::new();
        for i in 0..3 {
            rec.draw(rect(i as f32));
            rec.show_page();
        }
        let mut warnings = Vec::new();
        let pages = finalize(
            rec.finish(),
            |_, i, _| {
                if i == 2 {
                    Err(ElementError::new(WarningKind::Overlay, "logo missing"))
                } else {
                    Ok(vec![rect(9.0)])
                }
            },
            &mut warnings,
        );
        assert_eq!(pages.len(), 3);
        assert!(pages[1].overlay().is_empty());
        assert_eq!(pages[2].overlay().len(), 1);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::Overlay);
    }
}
