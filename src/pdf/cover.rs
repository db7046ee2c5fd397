//! Cover page: a full-page background plus page-absolute text and images, all
//! with zero footprint in the flow, closed by a forced page break.

use crate::error::Warning;
use crate::fonts::{FontBook, Typesetter};
use crate::geometry::{INCH, ZONE_INSET};
use crate::images::ImageStore;
use crate::input::StyleSheet;
use crate::model::{Background, Color, Coord, CoverContent, CoverSpec, XAnchor, YAnchor};
use crate::template::{TemplateContext, substitute};

use super::flow::{AbsoluteLayer, Flowable};
use super::record::DrawOp;

const GRADIENT_STRIPS: usize = 100;

fn mix(a: Color, b: Color, t: f32) -> Color {
    let channel = |i: usize| (a.0[i] as f32 + (b.0[i] as f32 - a.0[i] as f32) * t).round() as u8;
    Color([channel(0), channel(1), channel(2)])
}

fn anchor_y(y: Coord<YAnchor>, page_h: f32) -> f32 {
    match y {
        Coord::Anchor(YAnchor::Top) => page_h - INCH,
        Coord::Anchor(YAnchor::Center) => page_h / 2.0,
        Coord::Anchor(YAnchor::Bottom) => INCH,
        Coord::Absolute(v) => v,
    }
}

fn background_ops(
    bg: &Background,
    page: (f32, f32),
    images: &mut ImageStore,
    warnings: &mut Vec<Warning>,
) -> Vec<DrawOp> {
    let (w, h) = page;
    match bg {
        Background::Color { color, opacity } => vec![DrawOp::FillRect {
            x: 0.0,
            y: 0.0,
            width: w,
            height: h,
            color: *color,
            opacity: *opacity,
        }],
        Background::Gradient { start, end } => {
            let strip = h / GRADIENT_STRIPS as f32;
            (0..GRADIENT_STRIPS)
                .map(|i| DrawOp::FillRect {
                    x: 0.0,
                    y: i as f32 * strip,
                    width: w,
                    // slight overlap hides seams between strips
                    height: strip + 0.5,
                    color: mix(*start, *end, i as f32 / (GRADIENT_STRIPS - 1) as f32),
                    opacity: 1.0,
                })
                .collect()
        }
        Background::Image { path, opacity } => match images.load(path, *opacity) {
            Ok(id) => vec![DrawOp::Image {
                id,
                x: 0.0,
                y: 0.0,
                width: w,
                height: h,
            }],
            Err(e) => {
                log::warn!("Cover background skipped: {e}");
                warnings.push(e.into_warning());
                Vec::new()
            }
        },
    }
}

pub(crate) fn cover_flowables(
    spec: &CoverSpec,
    page: (f32, f32),
    styles: &StyleSheet,
    fonts: &mut FontBook,
    images: &mut ImageStore,
    ctx: &TemplateContext,
    warnings: &mut Vec<Warning>,
) -> Vec<Flowable> {
    let (page_w, page_h) = page;
    let mut layer = AbsoluteLayer::default();
    if let Some(bg) = &spec.background {
        layer.beneath = background_ops(bg, page, images, warnings);
    }

    for element in &spec.elements {
        let y = anchor_y(element.position.y, page_h);
        match &element.content {
            CoverContent::Text { content, style } => {
                let style = styles.paragraph(style.as_deref(), "Title");
                let font = fonts.resolve(Some(&style.font_name), false);
                let text = substitute(content, ctx);
                for (n, line) in text.lines().enumerate() {
                    let tw = fonts.text_width(font, style.font_size, line);
                    let x = match element.position.x {
                        Coord::Anchor(XAnchor::Center) => (page_w - tw) / 2.0,
                        Coord::Anchor(XAnchor::Right) => page_w - ZONE_INSET - tw,
                        Coord::Anchor(XAnchor::Left) => ZONE_INSET,
                        Coord::Absolute(v) => v,
                    };
                    layer.items.push(DrawOp::Text {
                        x,
                        y: y - n as f32 * style.leading,
                        font,
                        size: style.font_size,
                        color: style.color,
                        text: line.to_string(),
                    });
                }
            }
            CoverContent::Image {
                path,
                width,
                height,
            } => {
                let id = match images.load(path, 1.0) {
                    Ok(id) => id,
                    Err(e) => {
                        log::warn!("Cover image skipped: {e}");
                        warnings.push(e.into_warning());
                        continue;
                    }
                };
                let (px_w, px_h) = images.size(id);
                let h = height.unwrap_or(width * px_h as f32 / px_w.max(1) as f32);
                let x = match element.position.x {
                    Coord::Anchor(XAnchor::Center) => page_w / 2.0 - width / 2.0,
                    Coord::Anchor(XAnchor::Left) => ZONE_INSET,
                    Coord::Anchor(XAnchor::Right) => page_w - ZONE_INSET - width,
                    Coord::Absolute(v) => v - width / 2.0,
                };
                layer.items.push(DrawOp::Image {
                    id,
                    x,
                    y: y - h / 2.0,
                    width: *width,
                    height: h,
                });
            }
        }
    }

    log::debug!(
        "cover: {} background ops, {} items",
        layer.beneath.len(),
        layer.items.len()
    );
    vec![Flowable::Absolute(layer), Flowable::PageBreak]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_runs_bottom_to_top_from_start_to_end() {
        let bg = Background::Gradient {
            start: Color::WHITE,
            end: Color::BLACK,
        };
        let mut images = ImageStore::new();
        let ops = background_ops(&bg, (612.0, 792.0), &mut images, &mut Vec::new());
        assert_eq!(ops.len(), GRADIENT_STRIPS);
        match (&ops[0], &ops[GRADIENT_STRIPS - 1]) {
            (DrawOp::FillRect { y: y0, color: c0, .. }, DrawOp::FillRect { y: y1, color: c1, .. }) => {
                assert_eq!(*y0, 0.0);
                assert!(*y1 > 780.0);
                assert_eq!((*c0, *c1), (Color::WHITE, Color::BLACK));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn named_vertical_anchors() {
        assert_eq!(anchor_y(Coord::Anchor(YAnchor::Top), 792.0), 720.0);
        assert_eq!(anchor_y(Coord::Anchor(YAnchor::Center), 792.0), 396.0);
        assert_eq!(anchor_y(Coord::Absolute(500.0), 792.0), 500.0);
    }
}
