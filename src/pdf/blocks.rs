//! Content blocks to flowables. A block that cannot be built is replaced by a
//! visible red marker and reported as a warning; the rest of the document continues.

use std::collections::HashSet;

use crate::chart::ChartRenderer;
use crate::error::{ElementError, Warning, WarningKind};
use crate::fonts::FontBook;
use crate::geometry::INCH;
use crate::images::ImageStore;
use crate::input::{DataSources, ParagraphStyle, StyleSheet};
use crate::model::{
    BulletKind, CellValue, ChartBlock, Color, ContentBlock, Document, ImageBlock,
    ListBlock, TableBlock, TextAlign,
};
use crate::template::{TemplateContext, substitute};

use super::flow::{Flowable, HeadingMark, TextFlowable};
use super::table::TableFlowable;

/// Horizontal room reserved for list bullets and numbers.
const LIST_INDENT: f32 = 18.0;

/// Native-size images are capped at this width.
const MAX_NATIVE_IMAGE_WIDTH: f32 = 400.0;

/// (level, title, navigation key) for every heading, in document order.
/// A key that repeats an earlier one gets a numeric suffix so every heading
/// keeps its own link target.
pub(crate) fn heading_index(
    doc: &Document,
    ctx: &TemplateContext,
    warnings: &mut Vec<Warning>,
) -> Vec<(u8, String, String)> {
    let mut seen = HashSet::new();
    doc.elements
        .iter()
        .filter_map(|b| match b {
            ContentBlock::Heading(h) => Some(h),
            _ => None,
        })
        .enumerate()
        .map(|(i, h)| {
            let wanted = h.key.clone().unwrap_or_else(|| format!("heading_{}", i + 1));
            let mut key = wanted.clone();
            let mut n = 2;
            while seen.contains(&key) {
                key = format!("{wanted}_{n}");
                n += 1;
            }
            if key != wanted {
                log::warn!("Heading key '{wanted}' is already taken; using '{key}'");
                warnings.push(Warning::new(
                    WarningKind::HeadingKey,
                    format!("duplicate heading key '{wanted}' renamed to '{key}'"),
                ));
            }
            seen.insert(key.clone());
            (h.level, substitute(&h.text, ctx), key)
        })
        .collect()
}

pub(crate) struct BlockBuilder<'a> {
    pub(crate) styles: &'a StyleSheet,
    pub(crate) fonts: &'a mut FontBook,
    pub(crate) images: &'a mut ImageStore,
    pub(crate) sources: &'a DataSources,
    pub(crate) charts: &'a dyn ChartRenderer,
    pub(crate) ctx: &'a TemplateContext,
    pub(crate) frame_width: f32,
    pub(crate) warnings: &'a mut Vec<Warning>,
}

impl BlockBuilder<'_> {
    pub(crate) fn build_all(&mut self, doc: &Document, headings: &[(u8, String, String)]) -> Vec<Flowable> {
        let mut next_heading = headings.iter().cloned();
        let mut out = Vec::with_capacity(doc.elements.len());
        for (i, block) in doc.elements.iter().enumerate() {
            let result = match block {
                ContentBlock::Heading(h) => {
                    let Some((level, title, key)) = next_heading.next() else {
                        continue;
                    };
                    let fallback = format!("Heading{}", level.clamp(1, 4));
                    let style = self.styles.paragraph(h.style.as_deref(), &fallback);
                    let mut t = TextFlowable::from_style(style, &title, self.fonts, self.frame_width);
                    t.keep_together = true;
                    t.heading = Some(HeadingMark { level, title, key });
                    Ok(vec![Flowable::Text(t)])
                }
                other => self.block(other),
            };
            match result {
                Ok(flowables) => out.extend(flowables),
                Err(e) => {
                    log::warn!("Element {i} replaced by error marker: {e}");
                    out.push(self.error_marker(&e));
                    self.warnings.push(e.into_warning());
                }
            }
        }
        out
    }

    fn block(&mut self, block: &ContentBlock) -> Result<Vec<Flowable>, ElementError> {
        match block {
            ContentBlock::Text(t) => {
                let style = self.styles.paragraph(t.style.as_deref(), "Normal");
                let text = substitute(&t.content, self.ctx);
                let mut f = TextFlowable::from_style(style, &text, self.fonts, self.frame_width);
                f.keep_together = t.keep_together;
                Ok(vec![Flowable::Text(f)])
            }
            ContentBlock::Heading(_) => Ok(Vec::new()),
            ContentBlock::Table(t) => self.table(t).map(|f| vec![f]),
            ContentBlock::Image(img) => self.image(img).map(|f| vec![f]),
            ContentBlock::ChartImage(chart) => self.chart(chart),
            ContentBlock::Spacer(s) => Ok(vec![Flowable::Spacer(s.height * INCH)]),
            ContentBlock::Break => Ok(vec![Flowable::PageBreak]),
            ContentBlock::List(list) => Ok(vec![self.list(list)]),
        }
    }

    fn error_marker(&mut self, e: &ElementError) -> Flowable {
        let mut style = self.styles.paragraph(None, "Normal").clone();
        style.color = Color::RED;
        Flowable::Text(TextFlowable::from_style(
            &style,
            &format!("Error creating element: {e}"),
            self.fonts,
            self.frame_width,
        ))
    }

    fn table(&mut self, block: &TableBlock) -> Result<Flowable, ElementError> {
        let grid = match (&block.data, &block.data_source) {
            (Some(data), _) => data.clone(),
            (None, Some(name)) => {
                let table = self.sources.get(name).ok_or_else(|| {
                    ElementError::new(WarningKind::DataSource, format!("Data source not found: {name}"))
                })?;
                let columns: Vec<usize> = match &block.columns {
                    Some(names) => names
                        .iter()
                        .map(|n| {
                            table.column_index(n).ok_or_else(|| {
                                ElementError::new(
                                    WarningKind::DataSource,
                                    format!("Column '{n}' not found in data source '{name}'"),
                                )
                            })
                        })
                        .collect::<Result<_, _>>()?,
                    None => (0..table.columns.len()).collect(),
                };
                let header: Vec<CellValue> = match &block.headers {
                    Some(h) => h.iter().map(|s| CellValue::from(s.as_str())).collect(),
                    None => columns
                        .iter()
                        .map(|&c| CellValue::from(table.columns[c].as_str()))
                        .collect(),
                };
                std::iter::once(header)
                    .chain(table.rows.iter().map(|row| {
                        columns
                            .iter()
                            .map(|&c| CellValue::from(row.get(c).map(String::as_str).unwrap_or("")))
                            .collect()
                    }))
                    .collect()
            }
            (None, None) => {
                return Err(ElementError::new(
                    WarningKind::DataSource,
                    "table requires 'data' or 'dataSource'",
                ));
            }
        };
        let style = self.styles.table(block.style.as_deref());
        Ok(Flowable::Table(TableFlowable::build(
            grid,
            block,
            style,
            self.fonts,
            self.frame_width,
            self.warnings,
        )))
    }

    fn image(&mut self, block: &ImageBlock) -> Result<Flowable, ElementError> {
        let id = self.images.load(&block.path, 1.0)?;
        let (px_w, px_h) = self.images.size(id);
        let (w, h) = image_size(
            (px_w as f32, px_h as f32),
            block.width,
            block.height,
            block.keep_aspect_ratio,
        );
        Ok(Flowable::Image {
            id,
            width: w,
            height: h,
            align: block.alignment,
        })
    }

    fn chart(&mut self, chart: &ChartBlock) -> Result<Vec<Flowable>, ElementError> {
        let data = self.sources.get(&chart.data_source).ok_or_else(|| {
            ElementError::new(
                WarningKind::DataSource,
                format!("Data source not found: {}", chart.data_source),
            )
        })?;
        let t0 = std::time::Instant::now();
        let raster = self.charts.render(chart, data).map_err(|e| {
            ElementError::new(WarningKind::Chart, format!("Chart generation failed: {e}"))
        })?;
        log::debug!(
            "chart {:?} rendered {}x{} in {:.1}ms",
            chart.chart_type,
            raster.width(),
            raster.height(),
            t0.elapsed().as_secs_f64() * 1000.0,
        );
        let id = self.images.insert_rgba(raster);
        let mut out = Vec::with_capacity(2);
        if let Some(title) = &chart.title {
            let mut style: ParagraphStyle = self.styles.paragraph(None, "Normal").clone();
            style.font_name = "Helvetica-Bold".to_string();
            style.font_size = 12.0;
            style.leading = 14.4;
            style.alignment = TextAlign::Center;
            style.space_after = 6.0;
            let text = substitute(title, self.ctx);
            let mut t = TextFlowable::from_style(&style, &text, self.fonts, self.frame_width);
            t.keep_together = true;
            out.push(Flowable::Text(t));
        }
        out.push(Flowable::Image {
            id,
            width: chart.width * INCH,
            height: chart.height * INCH,
            align: chart.alignment,
        });
        Ok(out)
    }

    fn list(&mut self, list: &ListBlock) -> Flowable {
        let mut style = self.styles.paragraph(list.style.as_deref(), "Normal").clone();
        style.left_indent += LIST_INDENT;
        let mut lines = Vec::new();
        let mut markers = Vec::new();
        for (i, item) in list.items.iter().enumerate() {
            let marker = match list.bullet_type {
                BulletKind::Bullet => "\u{2022}".to_string(),
                BulletKind::Number => format!("{}.", i + 1),
            };
            let text = substitute(item, self.ctx);
            let item = TextFlowable::from_style(&style, &text, self.fonts, self.frame_width);
            markers.push((lines.len(), marker));
            lines.extend(item.lines);
        }
        let mut f = TextFlowable::from_style(&style, "", self.fonts, self.frame_width);
        if !lines.is_empty() {
            f.lines = lines;
        }
        f.markers = markers;
        f.marker_indent = LIST_INDENT;
        f.keep_together = list.keep_together;
        Flowable::Text(f)
    }
}

/// Drawn size in points from pixel size and the optional requested size.
fn image_size(native: (f32, f32), width: Option<f32>, height: Option<f32>, keep_aspect: bool) -> (f32, f32) {
    let (nw, nh) = (native.0.max(1.0), native.1.max(1.0));
    match (width, height) {
        (Some(w), Some(h)) if keep_aspect => {
            let scale = (w / nw).min(h / nh);
            (nw * scale, nh * scale)
        }
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, w * nh / nw),
        (None, Some(h)) => (h * nw / nh, h),
        (None, None) if nw > MAX_NATIVE_IMAGE_WIDTH => {
            (MAX_NATIVE_IMAGE_WIDTH, MAX_NATIVE_IMAGE_WIDTH * nh / nw)
        }
        (None, None) => (nw, nh),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_sizes_follow_the_requested_dimensions() {
        assert_eq!(image_size((800.0, 400.0), None, None, true), (400.0, 200.0));
        assert_eq!(image_size((200.0, 100.0), None, None, true), (200.0, 100.0));
        assert_eq!(image_size((200.0, 100.0), Some(100.0), None, true), (100.0, 50.0));
        assert_eq!(image_size((200.0, 100.0), None, Some(25.0), true), (50.0, 25.0));
        assert_eq!(image_size((200.0, 100.0), Some(60.0), Some(60.0), false), (60.0, 60.0));
        assert_eq!(image_size((200.0, 100.0), Some(60.0), Some(60.0), true), (60.0, 30.0));
    }
}
