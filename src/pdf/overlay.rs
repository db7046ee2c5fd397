//! Running headers and footers, drawn per page once the page count is final.

use std::collections::HashSet;

use crate::error::{ElementError, Warning, WarningKind};
use crate::fonts::{FontBook, FontId, Typesetter};
use crate::geometry::{INCH, ZONE_INSET};
use crate::images::{ImageId, ImageStore};
use crate::model::{BandSpec, Color, PageTemplate, ZoneAnchor, ZoneContent};
use crate::numerals::format_page_number;
use crate::template::{TemplateContext, substitute};

use super::record::DrawOp;

const HEADER_HEIGHT: f32 = 0.8 * INCH;
const FOOTER_HEIGHT: f32 = 0.6 * INCH;

/// Heights in points of the enabled header and footer bands.
pub(crate) fn band_heights(template: Option<&PageTemplate>) -> (Option<f32>, Option<f32>) {
    let Some(t) = template else {
        return (None, None);
    };
    let height = |band: &BandSpec, default: f32| {
        band.enabled
            .then(|| band.height.map(|h| h * INCH).unwrap_or(default))
    };
    (height(&t.header, HEADER_HEIGHT), height(&t.footer, FOOTER_HEIGHT))
}

enum Zone {
    Text {
        template: String,
        font: FontId,
        size: f32,
        color: Color,
    },
    PageNumber {
        format: String,
        font: FontId,
        size: f32,
        color: Color,
    },
    Image {
        image: Result<ImageId, ElementError>,
        width: f32,
        height: f32,
    },
}

struct Band {
    is_header: bool,
    height: f32,
    show_line: bool,
    zones: Vec<(ZoneAnchor, Zone)>,
}

impl Band {
    fn name(&self) -> &'static str {
        if self.is_header { "header" } else { "footer" }
    }
}

/// Header/footer renderer for one document. Fonts and images are resolved up
/// front so that per-page rendering only measures and positions.
pub struct OverlayRenderer {
    page_width: f32,
    page_height: f32,
    bands: Vec<Band>,
    ctx: TemplateContext,
    /// (header?, anchor) of zones that already reported a failure.
    reported: HashSet<(bool, ZoneAnchor)>,
}

impl OverlayRenderer {
    pub(crate) fn new(
        template: Option<&PageTemplate>,
        page: (f32, f32),
        fonts: &mut FontBook,
        images: &mut ImageStore,
        ctx: TemplateContext,
    ) -> Self {
        let (header_h, footer_h) = band_heights(template);
        let mut bands = Vec::new();
        if let Some(t) = template {
            for (spec, height, is_header) in [(&t.header, header_h, true), (&t.footer, footer_h, false)] {
                let Some(height) = height else { continue };
                let zones = [
                    (ZoneAnchor::Left, &spec.left),
                    (ZoneAnchor::Center, &spec.center),
                    (ZoneAnchor::Right, &spec.right),
                ]
                .into_iter()
                .filter_map(|(anchor, z)| z.as_ref().map(|z| (anchor, prepare(z, fonts, images))))
                .collect();
                bands.push(Band {
                    is_header,
                    height,
                    show_line: spec.show_line,
                    zones,
                });
            }
        }
        OverlayRenderer {
            page_width: page.0,
            page_height: page.1,
            bands,
            ctx,
            reported: HashSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Header and footer ops for `page` of `total`. A zone that fails is left
    /// out of the page; its first failure is reported in `warnings`.
    pub fn render_page(
        &mut self,
        fonts: &dyn Typesetter,
        page: usize,
        total: usize,
        warnings: &mut Vec<Warning>,
    ) -> Result<Vec<DrawOp>, ElementError> {
        let ctx = self.ctx.for_page(page, total);
        let mut ops = Vec::new();
        for band in &self.bands {
            let center_y = if band.is_header {
                self.page_height - band.height / 2.0
            } else {
                band.height / 2.0
            };
            for (anchor, zone) in &band.zones {
                match self.render_zone(fonts, zone, *anchor, center_y, &ctx, page, total) {
                    Ok(zone_ops) => ops.extend(zone_ops),
                    Err(e) => {
                        if self.reported.insert((band.is_header, *anchor)) {
                            log::warn!("{} {anchor:?} zone omitted: {e}", band.name());
                            warnings.push(Warning::new(
                                WarningKind::Overlay,
                                format!("{} {anchor:?} zone omitted from page {page}: {e}", band.name()),
                            ));
                        } else {
                            log::debug!("{} {anchor:?} zone omitted from page {page}", band.name());
                        }
                    }
                }
            }
            if band.show_line {
                let y = if band.is_header {
                    self.page_height - band.height
                } else {
                    band.height
                };
                ops.push(DrawOp::Line {
                    x1: ZONE_INSET,
                    y1: y,
                    x2: self.page_width - ZONE_INSET,
                    y2: y,
                    width: 0.5,
                    color: Color::gray(0.7),
                });
            }
        }
        Ok(ops)
    }

    #[allow(clippy::too_many_arguments)]
    fn render_zone(
        &self,
        fonts: &dyn Typesetter,
        zone: &Zone,
        anchor: ZoneAnchor,
        center_y: f32,
        ctx: &TemplateContext,
        page: usize,
        total: usize,
    ) -> Result<Vec<DrawOp>, ElementError> {
        let x_for = |w: f32| match anchor {
            ZoneAnchor::Left => ZONE_INSET,
            ZoneAnchor::Center => self.page_width / 2.0 - w / 2.0,
            ZoneAnchor::Right => self.page_width - ZONE_INSET - w,
        };
        let text_op = |text: String, font: FontId, size: f32, color: Color| {
            let w = fonts.text_width(font, size, &text);
            DrawOp::Text {
                x: x_for(w),
                y: center_y,
                font,
                size,
                color,
                text,
            }
        };
        match zone {
            Zone::Text {
                template,
                font,
                size,
                color,
            } => Ok(vec![text_op(substitute(template, ctx), *font, *size, *color)]),
            Zone::PageNumber {
                format,
                font,
                size,
                color,
            } => {
                let text = substitute(&format_page_number(page, total, format), ctx);
                Ok(vec![text_op(text, *font, *size, *color)])
            }
            Zone::Image {
                image,
                width,
                height,
            } => {
                let id = image.clone()?;
                Ok(vec![DrawOp::Image {
                    id,
                    x: x_for(*width),
                    y: center_y - height / 2.0,
                    width: *width,
                    height: *height,
                }])
            }
        }
    }
}

fn prepare(zone: &ZoneContent, fonts: &mut FontBook, images: &mut ImageStore) -> Zone {
    match zone {
        ZoneContent::Text { template, look } => Zone::Text {
            template: template.clone(),
            font: fonts.resolve(look.font_name.as_deref(), false),
            size: look.font_size,
            color: look.color,
        },
        ZoneContent::PageNumber { format, look } => Zone::PageNumber {
            format: format.clone(),
            font: fonts.resolve(look.font_name.as_deref(), false),
            size: look.font_size,
            color: look.color,
        },
        ZoneContent::Image {
            path,
            width,
            height,
        } => {
            let image = images.load(path, 1.0);
            // keep the image's proportions inside the zone box
            let (width, height) = match &image {
                Ok(id) => {
                    let (px_w, px_h) = images.size(*id);
                    let scale = (width / px_w.max(1) as f32).min(height / px_h.max(1) as f32);
                    (px_w as f32 * scale, px_h as f32 * scale)
                }
                Err(_) => (*width, *height),
            };
            Zone::Image {
                image,
                width,
                height,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TextLook;
    use chrono::NaiveDate;

    fn ctx() -> TemplateContext {
        let now = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .unwrap();
        TemplateContext::new(serde_json::Map::new(), now)
    }

    fn look() -> TextLook {
        TextLook {
            font_name: None,
            font_size: 9.0,
            color: Color::BLACK,
        }
    }

    #[test]
    fn band_heights_default_per_band() {
        let mut t = PageTemplate::default();
        assert_eq!(band_heights(Some(&t)), (None, None));
        t.header.enabled = true;
        t.footer.enabled = true;
        t.footer.height = Some(1.0);
        assert_eq!(band_heights(Some(&t)), (Some(HEADER_HEIGHT), Some(72.0)));
    }

    #[test]
    fn footer_page_number_is_right_aligned() {
        let mut t = PageTemplate::default();
        t.footer.enabled = true;
        t.footer.show_line = true;
        t.footer.right = Some(ZoneContent::PageNumber {
            format: "{page}/{total}".into(),
            look: look(),
        });
        let mut fonts = FontBook::new(&Default::default(), &[]).without_system_fonts();
        let mut images = ImageStore::new();
        let mut overlay = OverlayRenderer::new(Some(&t), (612.0, 792.0), &mut fonts, &mut images, ctx());
        let ops = overlay.render_page(&fonts, 3, 12, &mut Vec::new()).unwrap();
        let width = fonts.text_width(FontId(0), 9.0, "3/12");
        match &ops[0] {
            DrawOp::Text { x, y, text, .. } => {
                assert_eq!(text, "3/12");
                assert!((x + width - (612.0 - ZONE_INSET)).abs() < 1e-3);
                assert!((y - FOOTER_HEIGHT / 2.0).abs() < 1e-3);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(ops[1], DrawOp::Line { y1, .. } if (y1 - FOOTER_HEIGHT).abs() < 1e-3));
    }

    #[test]
    fn failing_zone_is_omitted_and_reported_once() {
        let mut t = PageTemplate::default();
        t.header.enabled = true;
        t.header.left = Some(ZoneContent::Image {
            path: "/nonexistent/logo.png".into(),
            width: 50.0,
            height: 30.0,
        });
        t.header.right = Some(ZoneContent::Text {
            template: "Quarterly".into(),
            look: look(),
        });
        let mut fonts = FontBook::new(&Default::default(), &[]).without_system_fonts();
        let mut images = ImageStore::new();
        let mut overlay = OverlayRenderer::new(Some(&t), (612.0, 792.0), &mut fonts, &mut images, ctx());
        let mut warnings = Vec::new();
        for page in 1..=3 {
            let ops = overlay.render_page(&fonts, page, 3, &mut warnings).unwrap();
            assert_eq!(ops.len(), 1);
        }
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::Overlay);
    }
}
