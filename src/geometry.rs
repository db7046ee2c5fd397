//! Page size, margins and the content frame.

use crate::error::{Error, Result};
use crate::model::Metadata;

pub const INCH: f32 = 72.0;

/// Clearance kept between a header/footer band and the content frame.
pub const BAND_CLEARANCE: f32 = 20.0;

/// Horizontal inset of left/right header zones and separator lines.
pub const ZONE_INSET: f32 = 0.75 * INCH;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageSize {
    A3,
    A4,
    A5,
    Letter,
    Legal,
}

impl PageSize {
    pub fn from_name(name: &str) -> Option<PageSize> {
        match name.to_ascii_uppercase().as_str() {
            "A3" => Some(PageSize::A3),
            "A4" => Some(PageSize::A4),
            "A5" => Some(PageSize::A5),
            "LETTER" => Some(PageSize::Letter),
            "LEGAL" => Some(PageSize::Legal),
            _ => None,
        }
    }

    /// Portrait (width, height) in points.
    pub fn dimensions(self) -> (f32, f32) {
        match self {
            PageSize::A3 => (841.8898, 1190.5512),
            PageSize::A4 => (595.2756, 841.8898),
            PageSize::A5 => (419.5276, 595.2756),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frame {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Frame {
    pub fn top(&self) -> f32 {
        self.y + self.height
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
}

impl PageGeometry {
    pub fn new(width: f32, height: f32, top: f32, bottom: f32, left: f32, right: f32) -> Result<Self> {
        let geometry = PageGeometry {
            width,
            height,
            margin_top: top,
            margin_bottom: bottom,
            margin_left: left,
            margin_right: right,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn from_metadata(meta: &Metadata) -> Result<Self> {
        let size = PageSize::from_name(&meta.page_size).ok_or_else(|| {
            Error::config(format!(
                "invalid pageSize '{}', expected one of A4, A3, A5, LETTER, LEGAL",
                meta.page_size
            ))
        })?;
        let (w, h) = size.dimensions();
        let (width, height) = match meta.orientation.as_str() {
            "portrait" => (w, h),
            "landscape" => (h, w),
            other => {
                return Err(Error::config(format!(
                    "invalid orientation '{other}', expected 'portrait' or 'landscape'"
                )));
            }
        };
        let margin = meta.margin * INCH;
        let side = |v: Option<f32>| v.map(|m| m * INCH).unwrap_or(margin);
        PageGeometry::new(
            width,
            height,
            side(meta.top_margin),
            side(meta.bottom_margin),
            side(meta.left_margin),
            side(meta.right_margin),
        )
    }

    fn validate(&self) -> Result<()> {
        let margins = [
            self.margin_top,
            self.margin_bottom,
            self.margin_left,
            self.margin_right,
        ];
        if margins.iter().any(|m| !m.is_finite() || *m < 0.0) {
            return Err(Error::config("margins must be non-negative"));
        }
        let frame = self.frame();
        if !(frame.width > 0.0) || !(frame.height > 0.0) {
            return Err(Error::config(format!(
                "content frame is {:.1}x{:.1}pt on a {:.1}x{:.1}pt page; margins leave no room",
                frame.width, frame.height, self.width, self.height
            )));
        }
        Ok(())
    }

    /// Widen the top/bottom margins so enabled bands (heights in points) clear the frame.
    pub fn reserve_bands(&mut self, header: Option<f32>, footer: Option<f32>) -> Result<()> {
        if let Some(h) = header {
            self.margin_top = self.margin_top.max(h + BAND_CLEARANCE);
        }
        if let Some(f) = footer {
            self.margin_bottom = self.margin_bottom.max(f + BAND_CLEARANCE);
        }
        self.validate()
    }

    pub fn frame(&self) -> Frame {
        Frame {
            x: self.margin_left,
            y: self.margin_bottom,
            width: self.width - self.margin_left - self.margin_right,
            height: self.height - self.margin_top - self.margin_bottom,
        }
    }
}
