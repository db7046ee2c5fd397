//! Serialization of finalized page records: fonts, images, content streams,
//! heading links, the outline and the document info dictionary.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Datelike, NaiveDateTime, Timelike};
use pdf_writer::types::{ActionType, AnnotationType, PageMode};
use pdf_writer::{Content, Date, Filter, Name, Pdf, Rect, Ref, Str, TextStr};

use crate::error::{Error, Result};
use crate::fonts::{EmbeddedFont, FontBook, FontId};
use crate::images::{ImageId, ImageStore};

use super::record::{DrawOp, PageRecord};
use super::toc::{ForwardReferences, OutlineNode};

pub(crate) struct DocumentInfo<'a> {
    pub(crate) title: Option<&'a str>,
    pub(crate) author: Option<&'a str>,
    pub(crate) subject: Option<&'a str>,
    pub(crate) created: NaiveDateTime,
    pub(crate) bookmarks: bool,
}

/// Opacity quantized to thousandths, so equal alphas share one graphics state.
fn alpha_key(opacity: f32) -> u16 {
    (opacity.clamp(0.0, 1.0) * 1000.0).round() as u16
}

pub(crate) fn write_pdf(
    pages: &[PageRecord],
    page_size: (f32, f32),
    fonts: &mut FontBook,
    images: &ImageStore,
    refs: &ForwardReferences,
    info: &DocumentInfo<'_>,
) -> Result<Vec<u8>> {
    if pages.is_empty() {
        return Err(Error::Finalization("no pages to write".into()));
    }
    let t0 = std::time::Instant::now();
    let mut pdf = Pdf::new();
    let mut next_id = 1i32;
    let mut alloc = || {
        let r = Ref::new(next_id);
        next_id += 1;
        r
    };

    let catalog_id = alloc();
    let pages_id = alloc();
    let info_id = alloc();

    // Phase 1: what the pages actually use
    let mut used_chars: BTreeMap<FontId, BTreeSet<char>> = BTreeMap::new();
    let mut used_images: BTreeSet<ImageId> = BTreeSet::new();
    let mut alphas: BTreeSet<u16> = BTreeSet::new();
    for op in pages.iter().flat_map(|p| p.ops.iter()) {
        match op {
            DrawOp::Text { font, text, .. } => {
                used_chars.entry(*font).or_default().extend(text.chars());
            }
            DrawOp::Image { id, .. } => {
                used_images.insert(*id);
            }
            DrawOp::FillRect { opacity, .. } if alpha_key(*opacity) < 1000 => {
                alphas.insert(alpha_key(*opacity));
            }
            _ => {}
        }
    }

    let embedded = fonts.embed(&mut pdf, &mut alloc, &used_chars);
    let t_fonts = t0.elapsed();
    let xobjects = images.embed(&mut pdf, &mut alloc, &used_images);
    let t_images = t0.elapsed();

    let gstates: BTreeMap<u16, (String, Ref)> = alphas
        .iter()
        .enumerate()
        .map(|(n, &key)| {
            let gs_ref = alloc();
            pdf.ext_graphics(gs_ref)
                .non_stroking_alpha(key as f32 / 1000.0);
            (key, (format!("GS{}", n + 1), gs_ref))
        })
        .collect();

    // Phase 2: page and content ids, then the content streams
    let n = pages.len();
    let page_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();
    let content_ids: Vec<Ref> = (0..n).map(|_| alloc()).collect();
    let destinations = refs.destinations();

    let mut page_annot_refs: Vec<Vec<Ref>> = Vec::with_capacity(n);
    for (i, page) in pages.iter().enumerate() {
        let mut content = Content::new();
        let mut annots = Vec::new();
        for op in &page.ops {
            match op {
                DrawOp::Link {
                    x,
                    y,
                    width,
                    height,
                    target,
                } => {
                    let Some(&(dest_page, dest_y)) = destinations.get(target.as_str()) else {
                        log::debug!("link to unknown heading '{target}' dropped");
                        continue;
                    };
                    let Some(&dest_ref) = dest_page.checked_sub(1).and_then(|p| page_ids.get(p)) else {
                        continue;
                    };
                    let annot_ref = alloc();
                    let mut annot = pdf.annotation(annot_ref);
                    annot
                        .subtype(AnnotationType::Link)
                        .rect(Rect::new(*x, *y, x + width, y + height))
                        .border(0.0, 0.0, 0.0, None);
                    annot
                        .action()
                        .action_type(ActionType::GoTo)
                        .destination()
                        .page(dest_ref)
                        .xyz(0.0, dest_y, None);
                    annots.push(annot_ref);
                }
                other => draw_op(&mut content, other, &embedded, &xobjects, &gstates),
            }
        }
        let raw = content.finish();
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), 6);
        pdf.stream(content_ids[i], &compressed).filter(Filter::FlateDecode);
        page_annot_refs.push(annots);
    }

    // Phase 3: outline
    let outline = if info.bookmarks { refs.outline() } else { Vec::new() };
    let outline_id = if outline.is_empty() {
        None
    } else {
        let outline_id = alloc();
        let (first, last) = write_outline(&mut pdf, &mut alloc, &outline, outline_id, &page_ids);
        let total: usize = outline.iter().map(|node| 1 + node.count()).sum();
        pdf.outline(outline_id)
            .first(first)
            .last(last)
            .count(total as i32);
        Some(outline_id)
    };

    // Phase 4: document structure
    {
        let mut catalog = pdf.catalog(catalog_id);
        catalog.pages(pages_id);
        if let Some(id) = outline_id {
            catalog.outlines(id);
            catalog.page_mode(PageMode::UseOutlines);
        }
    }
    pdf.pages(pages_id)
        .kids(page_ids.iter().copied())
        .count(n as i32);

    // resource dictionaries in name order so identical input gives identical bytes
    let mut font_pairs: Vec<(&str, Ref)> = embedded
        .values()
        .map(|f| (f.pdf_name.as_str(), f.font_ref))
        .collect();
    font_pairs.sort_by(|a, b| a.0.cmp(b.0));
    let mut image_pairs: Vec<(&str, Ref)> = xobjects
        .values()
        .map(|(name, r)| (name.as_str(), *r))
        .collect();
    image_pairs.sort_by(|a, b| a.0.cmp(b.0));

    let (width, height) = page_size;
    for i in 0..n {
        let mut page = pdf.page(page_ids[i]);
        page.media_box(Rect::new(0.0, 0.0, width, height))
            .parent(pages_id)
            .contents(content_ids[i]);
        if !page_annot_refs[i].is_empty() {
            page.annotations(page_annot_refs[i].iter().copied());
        }
        let mut resources = page.resources();
        if !font_pairs.is_empty() {
            let mut fonts = resources.fonts();
            for (name, font_ref) in &font_pairs {
                fonts.pair(Name(name.as_bytes()), *font_ref);
            }
        }
        if !image_pairs.is_empty() {
            let mut x = resources.x_objects();
            for (name, xobj_ref) in &image_pairs {
                x.pair(Name(name.as_bytes()), *xobj_ref);
            }
        }
        if !gstates.is_empty() {
            let mut states = resources.ext_g_states();
            for (name, gs_ref) in gstates.values() {
                states.pair(Name(name.as_bytes()), *gs_ref);
            }
        }
    }

    write_info(&mut pdf, info_id, info);
    let t_assembly = t0.elapsed();

    log::info!(
        "Write phases: fonts={:.1}ms, images={:.1}ms, pages+outline={:.1}ms ({} pages)",
        t_fonts.as_secs_f64() * 1000.0,
        (t_images - t_fonts).as_secs_f64() * 1000.0,
        (t_assembly - t_images).as_secs_f64() * 1000.0,
        n,
    );

    Ok(pdf.finish())
}

fn draw_op(
    content: &mut Content,
    op: &DrawOp,
    fonts: &HashMap<FontId, EmbeddedFont>,
    xobjects: &HashMap<ImageId, (String, Ref)>,
    gstates: &BTreeMap<u16, (String, Ref)>,
) {
    match op {
        DrawOp::Text {
            x,
            y,
            font,
            size,
            color,
            text,
        } => {
            let Some(font) = fonts.get(font) else { return };
            let encoded = font.encode(text);
            if encoded.is_empty() {
                return;
            }
            let [r, g, b] = color.to_f32();
            content.set_fill_rgb(r, g, b);
            content
                .begin_text()
                .set_font(Name(font.pdf_name.as_bytes()), *size)
                .next_line(*x, *y)
                .show(Str(&encoded))
                .end_text();
        }
        DrawOp::Line {
            x1,
            y1,
            x2,
            y2,
            width,
            color,
        } => {
            let [r, g, b] = color.to_f32();
            content.save_state();
            content.set_line_width(*width);
            content.set_stroke_rgb(r, g, b);
            content.move_to(*x1, *y1);
            content.line_to(*x2, *y2);
            content.stroke();
            content.restore_state();
        }
        DrawOp::FillRect {
            x,
            y,
            width,
            height,
            color,
            opacity,
        } => {
            let [r, g, b] = color.to_f32();
            content.save_state();
            if let Some((name, _)) = gstates.get(&alpha_key(*opacity)) {
                content.set_parameters(Name(name.as_bytes()));
            }
            content.set_fill_rgb(r, g, b);
            content.rect(*x, *y, *width, *height);
            content.fill_nonzero();
            content.restore_state();
        }
        DrawOp::Image {
            id,
            x,
            y,
            width,
            height,
        } => {
            let Some((name, _)) = xobjects.get(id) else { return };
            content.save_state();
            content.transform([*width, 0.0, 0.0, *height, *x, *y]);
            content.x_object(Name(name.as_bytes()));
            content.restore_state();
        }
        DrawOp::Link { .. } => {}
    }
}

/// Write one level of the outline; returns its first and last item.
fn write_outline(
    pdf: &mut Pdf,
    alloc: &mut impl FnMut() -> Ref,
    nodes: &[OutlineNode],
    parent: Ref,
    page_ids: &[Ref],
) -> (Ref, Ref) {
    let ids: Vec<Ref> = nodes.iter().map(|_| alloc()).collect();
    for (i, node) in nodes.iter().enumerate() {
        let children = if node.children.is_empty() {
            None
        } else {
            Some(write_outline(pdf, alloc, &node.children, ids[i], page_ids))
        };
        let mut item = pdf.outline_item(ids[i]);
        item.title(TextStr(&node.title)).parent(parent);
        if i > 0 {
            item.prev(ids[i - 1]);
        }
        if i + 1 < ids.len() {
            item.next(ids[i + 1]);
        }
        if let Some((first, last)) = children {
            item.first(first).last(last).count(node.count() as i32);
        }
        if let Some(&page_ref) = node.page.checked_sub(1).and_then(|p| page_ids.get(p)) {
            item.dest().page(page_ref).xyz(0.0, node.y, None);
        }
    }
    (ids[0], ids[ids.len() - 1])
}

fn write_info(pdf: &mut Pdf, id: Ref, info: &DocumentInfo<'_>) {
    let created = info.created;
    let date = Date::new(created.year().clamp(0, 9999) as u16)
        .month(created.month() as u8)
        .day(created.day() as u8)
        .hour(created.hour() as u8)
        .minute(created.minute() as u8)
        .second(created.second() as u8);
    let mut doc_info = pdf.document_info(id);
    doc_info
        .title(TextStr(info.title.unwrap_or("Report")))
        .author(TextStr(info.author.unwrap_or("PDF Generator")))
        .creator(TextStr("folio-pdf"))
        .producer(TextStr(concat!("folio-pdf ", env!("CARGO_PKG_VERSION"))))
        .creation_date(date);
    if let Some(subject) = info.subject {
        doc_info.subject(TextStr(subject));
    }
}
