//! Forward references from headings to the pages they land on, and the table
//! of contents and outline built from them.

use std::collections::HashMap;

use crate::fonts::{FontBook, Typesetter};
use crate::geometry::INCH;
use crate::input::StyleSheet;
use crate::model::{Color, TextAlign, TocSpec};

use super::flow::{Flowable, Leader, TextFlowable};
use super::layout::{LineStyle, wrap_text};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolverState {
    Collecting,
    Resolved,
}

/// A heading as placed by the flow. Immutable once recorded.
#[derive(Clone, Debug, PartialEq)]
pub struct ForwardReferenceEntry {
    pub level: u8,
    pub title: String,
    /// 1-based page index.
    pub page: usize,
    pub key: String,
    /// Top of the heading's line box, used as the jump destination.
    pub y: f32,
}

#[derive(Debug)]
pub struct ForwardReferences {
    state: ResolverState,
    entries: Vec<ForwardReferenceEntry>,
}

impl Default for ForwardReferences {
    fn default() -> Self {
        ForwardReferences::new()
    }
}

impl ForwardReferences {
    pub fn new() -> Self {
        ForwardReferences {
            state: ResolverState::Collecting,
            entries: Vec::new(),
        }
    }

    pub fn state(&self) -> ResolverState {
        self.state
    }

    /// Append an entry; returns its index. Refused once resolved.
    pub fn record(&mut self, entry: ForwardReferenceEntry) -> Option<usize> {
        if self.state == ResolverState::Resolved {
            log::warn!("Heading '{}' recorded after resolution; ignored", entry.title);
            return None;
        }
        self.entries.push(entry);
        Some(self.entries.len() - 1)
    }

    pub fn resolve(&mut self) {
        self.state = ResolverState::Resolved;
    }

    pub fn entries(&self) -> &[ForwardReferenceEntry] {
        &self.entries
    }

    /// Navigation key -> (page, y).
    pub fn destinations(&self) -> HashMap<&str, (usize, f32)> {
        self.entries
            .iter()
            .map(|e| (e.key.as_str(), (e.page, e.y)))
            .collect()
    }

    /// Outline tree nested by heading level. A level deeper than its parent
    /// by more than one still nests directly under it.
    pub fn outline(&self) -> Vec<OutlineNode> {
        let mut roots: Vec<OutlineNode> = Vec::new();
        for e in &self.entries {
            let node = OutlineNode {
                title: e.title.clone(),
                page: e.page,
                y: e.y,
                level: e.level,
                children: Vec::new(),
            };
            insert_node(&mut roots, node);
        }
        roots
    }
}

fn insert_node(siblings: &mut Vec<OutlineNode>, node: OutlineNode) {
    match siblings.last_mut() {
        Some(last) if last.level < node.level => insert_node(&mut last.children, node),
        _ => siblings.push(node),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutlineNode {
    pub title: String,
    pub page: usize,
    pub y: f32,
    pub level: u8,
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    /// Number of descendants.
    pub fn count(&self) -> usize {
        self.children.iter().map(|c| 1 + c.count()).sum()
    }
}

/// One line of the table of contents before layout.
#[derive(Clone, Debug, PartialEq)]
pub struct TocLine {
    pub level: u8,
    pub title: String,
    pub page_text: String,
    pub target: Option<String>,
}

/// Lines for automatic generation: one per heading up to `max_level`.
/// `pages` is `None` for the placeholder pass.
pub(crate) fn auto_lines(headings: &[(u8, String, String)], pages: Option<&[ForwardReferenceEntry]>, max_level: u8) -> Vec<TocLine> {
    headings
        .iter()
        .enumerate()
        .filter(|(_, (level, _, _))| *level <= max_level)
        .map(|(i, (level, title, key))| TocLine {
            level: *level,
            title: title.clone(),
            page_text: pages
                .and_then(|p| p.get(i))
                .map(|e| e.page.to_string())
                .unwrap_or_else(|| "0".to_string()),
            target: Some(key.clone()),
        })
        .collect()
}

pub(crate) fn manual_lines(spec: &TocSpec) -> Vec<TocLine> {
    spec.entries
        .iter()
        .map(|e| TocLine {
            level: e.level.max(1),
            title: e.title.clone(),
            page_text: e.page_num.to_string(),
            target: None,
        })
        .collect()
}

const LEADER_GRAY: Color = Color([0x80, 0x80, 0x80]);

/// Title, a 0.2in spacer, the lines, and a page break.
pub(crate) fn toc_flowables(
    spec: &TocSpec,
    lines: &[TocLine],
    styles: &StyleSheet,
    fonts: &mut FontBook,
    frame_width: f32,
) -> Vec<Flowable> {
    let mut out = Vec::with_capacity(lines.len() + 3);
    let title_style = styles.paragraph(Some("Heading1"), "Heading1");
    let title = spec.title.as_deref().unwrap_or("Table of Contents");
    out.push(Flowable::Text(TextFlowable::from_style(
        title_style,
        title,
        fonts,
        frame_width,
    )));
    out.push(Flowable::Spacer(0.2 * INCH));

    // Automatic lines use 12-(level-1)pt, manual ones 11-level, as separate TOC styles.
    let manual = !spec.auto_generate;
    let font = fonts.resolve(Some(&styles.paragraph(None, "Normal").font_name), false);
    let fonts: &FontBook = fonts;
    let ascender = fonts.ascender_ratio(font);
    let dot_w = |size: f32| fonts.text_width(font, size, ".").max(0.1);
    for line in lines {
        let depth = line.level.saturating_sub(1) as f32;
        let (size, leading, spacing) = if manual {
            let size = (11.0 - line.level as f32).max(6.0);
            (size, size * 1.2, 2.0)
        } else {
            let size = (12.0 - depth).max(6.0);
            (size, (14.0 - depth).max(size), 3.0)
        };
        let indent = 20.0 * depth;
        let page_w = fonts.text_width(font, size, &line.page_text);
        let text_width = (frame_width - indent - page_w - 24.0).max(size);
        let wrapped = wrap_text(fonts, font, size, &line.title, text_width);
        let last_w = wrapped.last().map(|l| l.total_width).unwrap_or(0.0);
        let leader_room = frame_width - indent - last_w - page_w - 12.0;
        let dots = ".".repeat((leader_room / dot_w(size)).floor().max(0.0) as usize);
        out.push(Flowable::Text(TextFlowable {
            lines: wrapped,
            style: LineStyle {
                font,
                size,
                leading,
                color: Color::BLACK,
                align: TextAlign::Left,
                ascender,
            },
            indent_left: indent,
            indent_right: 0.0,
            space_before: spacing,
            space_after: spacing,
            keep_together: true,
            heading: None,
            markers: Vec::new(),
            marker_indent: 0.0,
            leader: Some(Leader {
                dots,
                dots_offset: last_w + 6.0,
                page_text: line.page_text.clone(),
                page_width: page_w,
                color: LEADER_GRAY,
                target: line.target.clone(),
            }),
        }));
    }
    out.push(Flowable::PageBreak);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(level: u8, title: &str, page: usize) -> ForwardReferenceEntry {
        ForwardReferenceEntry {
            level,
            title: title.to_string(),
            page,
            key: format!("k-{title}"),
            y: 700.0,
        }
    }

    #[test]
    fn recording_is_refused_after_resolution() {
        let mut refs = ForwardReferences::new();
        assert_eq!(refs.record(entry(1, "A", 1)), Some(0));
        refs.resolve();
        assert_eq!(refs.record(entry(1, "B", 2)), None);
        assert_eq!(refs.entries().len(), 1);
        assert_eq!(refs.state(), ResolverState::Resolved);
    }

    #[test]
    fn outline_nests_by_level() {
        let mut refs = ForwardReferences::new();
        for e in [entry(1, "A", 1), entry(2, "A.1", 1), entry(3, "A.1.a", 2), entry(1, "B", 3), entry(3, "B.x", 3)] {
            refs.record(e);
        }
        let outline = refs.outline();
        assert_eq!(outline.len(), 2);
        assert_eq!(outline[0].count(), 2);
        assert_eq!(outline[0].children[0].children[0].title, "A.1.a");
        assert_eq!(outline[1].children[0].title, "B.x");
    }

    #[test]
    fn auto_lines_filter_by_level_and_use_recorded_pages() {
        let headings = vec![
            (1, "Intro".to_string(), "heading_1".to_string()),
            (4, "Deep".to_string(), "heading_2".to_string()),
            (2, "Scope".to_string(), "heading_3".to_string()),
        ];
        let entries = vec![entry(1, "Intro", 3), entry(4, "Deep", 4), entry(2, "Scope", 5)];
        let lines = auto_lines(&headings, Some(&entries), 3);
        let pages: Vec<_> = lines.iter().map(|l| l.page_text.as_str()).collect();
        assert_eq!(pages, vec!["3", "5"]);
        assert_eq!(auto_lines(&headings, None, 3)[1].page_text, "0");
    }
}
