//! Raster images for one request: decoding, opacity, and XObject embedding.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use image::RgbaImage;
use pdf_writer::{Filter, Pdf, Ref};

use crate::error::{ElementError, WarningKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub(crate) usize);

enum Pixels {
    /// Baseline RGB JPEG passed through as DCTDecode.
    Jpeg(Vec<u8>),
    Rgba(RgbaImage),
}

struct StoredImage {
    width: u32,
    height: u32,
    pixels: Pixels,
}

#[derive(Default)]
pub struct ImageStore {
    images: Vec<StoredImage>,
    by_source: HashMap<(PathBuf, u16), ImageId>,
    base_dir: Option<PathBuf>,
}

impl ImageStore {
    pub fn new() -> Self {
        ImageStore::default()
    }

    /// Relative paths passed to [`ImageStore::load`] resolve against `dir`.
    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        ImageStore {
            base_dir: Some(dir.into()),
            ..ImageStore::default()
        }
    }

    /// Load an image file, scaling its alpha channel by `opacity`. Repeated
    /// loads of the same file at the same opacity share one image.
    pub fn load(&mut self, path: &Path, opacity: f32) -> Result<ImageId, ElementError> {
        let opacity = opacity.clamp(0.0, 1.0);
        let path = match &self.base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        };
        let path = path.as_path();
        let key = (path.to_path_buf(), (opacity * 1000.0).round() as u16);
        if let Some(&id) = self.by_source.get(&key) {
            return Ok(id);
        }
        let bytes = std::fs::read(path).map_err(|e| {
            ElementError::new(
                WarningKind::Image,
                format!("Image not found: {} ({e})", path.display()),
            )
        })?;
        let decoded = image::load_from_memory(&bytes).map_err(|e| {
            ElementError::new(
                WarningKind::Image,
                format!("Cannot decode image {}: {e}", path.display()),
            )
        })?;
        let (width, height) = (decoded.width(), decoded.height());
        let is_rgb_jpeg = image::guess_format(&bytes).ok() == Some(image::ImageFormat::Jpeg)
            && decoded.color() == image::ColorType::Rgb8;
        let pixels = if is_rgb_jpeg && opacity >= 1.0 {
            Pixels::Jpeg(bytes)
        } else {
            let mut rgba = decoded.to_rgba8();
            if opacity < 1.0 {
                for p in rgba.pixels_mut() {
                    p.0[3] = (p.0[3] as f32 * opacity).round() as u8;
                }
            }
            Pixels::Rgba(rgba)
        };
        let id = self.push(StoredImage {
            width,
            height,
            pixels,
        });
        self.by_source.insert(key, id);
        log::debug!("Loaded image {} ({width}x{height})", path.display());
        Ok(id)
    }

    pub fn insert_rgba(&mut self, rgba: RgbaImage) -> ImageId {
        self.push(StoredImage {
            width: rgba.width(),
            height: rgba.height(),
            pixels: Pixels::Rgba(rgba),
        })
    }

    fn push(&mut self, image: StoredImage) -> ImageId {
        let id = ImageId(self.images.len());
        self.images.push(image);
        id
    }

    /// Pixel dimensions.
    pub fn size(&self, id: ImageId) -> (u32, u32) {
        let img = &self.images[id.0];
        (img.width, img.height)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Write the images that are actually drawn; returns their resource names.
    pub(crate) fn embed(
        &self,
        pdf: &mut Pdf,
        alloc: &mut impl FnMut() -> Ref,
        used: &BTreeSet<ImageId>,
    ) -> HashMap<ImageId, (String, Ref)> {
        let mut out = HashMap::new();
        for (n, &id) in used.iter().enumerate() {
            let img = &self.images[id.0];
            let xobj_ref = alloc();
            let (w, h) = (img.width as i32, img.height as i32);
            match &img.pixels {
                Pixels::Jpeg(data) => {
                    let mut xobj = pdf.image_xobject(xobj_ref, data);
                    xobj.filter(Filter::DctDecode);
                    xobj.width(w);
                    xobj.height(h);
                    xobj.color_space().device_rgb();
                    xobj.bits_per_component(8);
                }
                Pixels::Rgba(rgba) => {
                    let rgb_data: Vec<u8> = rgba
                        .pixels()
                        .flat_map(|p| [p.0[0], p.0[1], p.0[2]])
                        .collect();
                    let compressed_rgb = miniz_oxide::deflate::compress_to_vec_zlib(&rgb_data, 6);

                    let smask_ref = if rgba.pixels().any(|p| p.0[3] < 255) {
                        let alpha_data: Vec<u8> = rgba.pixels().map(|p| p.0[3]).collect();
                        let compressed_alpha =
                            miniz_oxide::deflate::compress_to_vec_zlib(&alpha_data, 6);
                        let mask_ref = alloc();
                        let mut mask = pdf.image_xobject(mask_ref, &compressed_alpha);
                        mask.filter(Filter::FlateDecode);
                        mask.width(w);
                        mask.height(h);
                        mask.color_space().device_gray();
                        mask.bits_per_component(8);
                        Some(mask_ref)
                    } else {
                        None
                    };

                    let mut xobj = pdf.image_xobject(xobj_ref, &compressed_rgb);
                    xobj.filter(Filter::FlateDecode);
                    xobj.width(w);
                    xobj.height(h);
                    xobj.color_space().device_rgb();
                    xobj.bits_per_component(8);
                    if let Some(mask_ref) = smask_ref {
                        xobj.s_mask(mask_ref);
                    }
                }
            }
            out.insert(id, (format!("Im{}", n + 1), xobj_ref));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_element_error() {
        let mut store = ImageStore::new();
        let err = store.load(Path::new("/nonexistent/logo.png"), 1.0).unwrap_err();
        assert_eq!(err.kind, WarningKind::Image);
        assert!(err.message.starts_with("Image not found"));
    }

    #[test]
    fn opacity_scales_alpha_and_dedupes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.png");
        RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();
        let mut store = ImageStore::new();
        let a = store.load(&path, 0.5).unwrap();
        let b = store.load(&path, 0.5).unwrap();
        assert_eq!(a, b);
        match &store.images[a.0].pixels {
            Pixels::Rgba(rgba) => assert_eq!(rgba.get_pixel(0, 0).0[3], 128),
            Pixels::Jpeg(_) => panic!("expected decoded pixels"),
        }
    }
}
