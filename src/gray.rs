//! Grayscale buffers and the geometric operations the extractor runs on them.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::CropRect;

/// Trait for reading grayscale intensities from an image.
pub trait ImageAccess {
    /// Intensity at (x, y). Callers stay inside `width() x height()`.
    fn get_pixel(&self, x: u32, y: u32) -> u8;

    /// Image dimensions.
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

/// Channel weights for RGB to luma conversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LumaWeights {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl LumaWeights {
    /// ITU-R BT.601, the weighting used by the usual BGR to GRAY conversion.
    pub const BT601: Self = Self {
        r: 0.299,
        g: 0.587,
        b: 0.114,
    };

    /// ITU-R BT.709.
    pub const BT709: Self = Self {
        r: 0.2126,
        g: 0.7152,
        b: 0.0722,
    };

    pub fn validate(&self) -> Result<()> {
        for (name, w) in [("r", self.r), ("g", self.g), ("b", self.b)] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "Luma weight {} must be finite and non-negative, got {}",
                    name, w
                )));
            }
        }
        Ok(())
    }

    #[inline]
    fn apply(&self, r: u8, g: u8, b: u8) -> u8 {
        let y = self.r * r as f32 + self.g * g as f32 + self.b * b as f32;
        y.round().clamp(0.0, 255.0) as u8
    }
}

impl Default for LumaWeights {
    fn default() -> Self {
        Self::BT601
    }
}

/// A row-major 8-bit grayscale buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrayImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl GrayImage {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(data.len(), (width * height) as usize);
        Self {
            data,
            width,
            height,
        }
    }

    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> u8,
    {
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { data, width, height }
    }

    /// Convert a decoded RGB image to luma with the given weights.
    pub fn from_rgb(image: &image::RgbImage, weights: &LumaWeights) -> Self {
        let data = image
            .pixels()
            .map(|p| weights.apply(p.0[0], p.0[1], p.0[2]))
            .collect();
        Self {
            data,
            width: image.width(),
            height: image.height(),
        }
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Row-major pixel vector.
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }
}

impl ImageAccess for GrayImage {
    fn get_pixel(&self, x: u32, y: u32) -> u8 {
        self.data[(y * self.width + x) as usize]
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

impl ImageAccess for image::GrayImage {
    fn get_pixel(&self, x: u32, y: u32) -> u8 {
        image::GenericImageView::get_pixel(self, x, y).0[0]
    }

    fn width(&self) -> u32 {
        image::GrayImage::width(self)
    }

    fn height(&self) -> u32 {
        image::GrayImage::height(self)
    }
}

/// Copy out `rect`, with bounds clamped to the image like slice ranges.
///
/// Negative coordinates clamp to 0. They do not count back from the far edge
/// the way numpy slicing does, so a box that starts left of or above the image
/// keeps its visible part instead of coming out empty.
///
/// Returns `None` when nothing is left after clamping.
pub fn crop<I: ImageAccess>(image: &I, rect: &CropRect) -> Option<GrayImage> {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let left = rect.left.clamp(0, w) as u32;
    let right = rect.right.clamp(0, w) as u32;
    let top = rect.top.clamp(0, h) as u32;
    let bottom = rect.bottom.clamp(0, h) as u32;

    if right <= left || bottom <= top {
        return None;
    }

    Some(GrayImage::from_fn(right - left, bottom - top, |x, y| {
        image.get_pixel(left + x, top + y)
    }))
}

/// Source coordinate and weight for one destination column or row.
///
/// Pixel centers are aligned (`src = (dst + 0.5) * scale - 0.5`) and samples
/// past either edge are clamped to it.
#[inline]
fn source_taps(dst: u32, scale: f32, len: u32) -> (u32, u32, f32) {
    let pos = (dst as f32 + 0.5) * scale - 0.5;
    if pos <= 0.0 {
        return (0, 0, 0.0);
    }
    let i0 = pos.floor() as u32;
    if i0 + 1 >= len {
        return (len - 1, len - 1, 0.0);
    }
    (i0, i0 + 1, pos - i0 as f32)
}

/// Resize with bilinear interpolation.
pub fn resize_bilinear<I: ImageAccess>(image: &I, width: u32, height: u32) -> GrayImage {
    let (src_w, src_h) = (image.width(), image.height());
    if src_w == 0 || src_h == 0 {
        return GrayImage::from_fn(width, height, |_, _| 0);
    }

    let scale_x = src_w as f32 / width as f32;
    let scale_y = src_h as f32 / height as f32;
    let columns: Vec<_> = (0..width)
        .map(|dx| source_taps(dx, scale_x, src_w))
        .collect();

    let mut data = Vec::with_capacity((width * height) as usize);
    for dy in 0..height {
        let (y0, y1, fy) = source_taps(dy, scale_y, src_h);
        for &(x0, x1, fx) in &columns {
            let p00 = image.get_pixel(x0, y0) as f32;
            let p10 = image.get_pixel(x1, y0) as f32;
            let p01 = image.get_pixel(x0, y1) as f32;
            let p11 = image.get_pixel(x1, y1) as f32;

            let top = p00 * (1.0 - fx) + p10 * fx;
            let bottom = p01 * (1.0 - fx) + p11 * fx;
            let value = top * (1.0 - fy) + bottom * fy;
            data.push(value.round().clamp(0.0, 255.0) as u8);
        }
    }

    GrayImage::new(data, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_conversion_bt601() {
        let rgb = image::RgbImage::from_fn(4, 1, |x, _| match x {
            0 => image::Rgb([255, 0, 0]),
            1 => image::Rgb([0, 255, 0]),
            2 => image::Rgb([0, 0, 255]),
            _ => image::Rgb([255, 255, 255]),
        });
        let gray = GrayImage::from_rgb(&rgb, &LumaWeights::BT601);
        assert_eq!(gray.as_raw(), &[76, 150, 29, 255]);
    }

    #[test]
    fn luma_weights_validation() {
        assert!(LumaWeights::default().validate().is_ok());
        let bad = LumaWeights {
            r: f32::NAN,
            ..LumaWeights::BT601
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn gray_image_access() {
        let img = GrayImage::new(vec![0, 255, 0, 255, 0, 255], 3, 2);
        assert_eq!(img.get_pixel(0, 0), 0);
        assert_eq!(img.get_pixel(1, 0), 255);
        assert_eq!(img.get_pixel(2, 1), 255);
        assert_eq!(img.width(), 3);
        assert_eq!(img.height(), 2);
    }

    #[test]
    fn crop_takes_half_open_rectangle() {
        let img = GrayImage::from_fn(5, 4, |x, y| (y * 10 + x) as u8);
        let face = crop(&img, &CropRect::new(1, 1, 4, 3)).unwrap();
        assert_eq!(face.width(), 3);
        assert_eq!(face.height(), 2);
        assert_eq!(face.as_raw(), &[11, 12, 13, 21, 22, 23]);
    }

    #[test]
    fn crop_clamps_to_bounds() {
        let img = GrayImage::from_fn(5, 4, |x, y| (y * 10 + x) as u8);
        let face = crop(&img, &CropRect::new(-3, 2, 99, 99)).unwrap();
        assert_eq!((face.width(), face.height()), (5, 2));
        assert_eq!(face.get_pixel(0, 0), 20);

        assert!(crop(&img, &CropRect::new(3, 0, 3, 4)).is_none());
        assert!(crop(&img, &CropRect::new(4, 0, 2, 4)).is_none());
        assert!(crop(&img, &CropRect::new(0, 10, 5, 20)).is_none());
    }

    #[test]
    fn resize_same_size_is_identity() {
        let img = GrayImage::from_fn(7, 3, |x, y| (x * 30 + y) as u8);
        assert_eq!(resize_bilinear(&img, 7, 3), img);
    }

    #[test]
    fn resize_interpolates_between_centers() {
        let img = GrayImage::new(vec![0, 100], 2, 1);
        let up = resize_bilinear(&img, 4, 1);
        assert_eq!(up.as_raw(), &[0, 25, 75, 100]);

        let img = GrayImage::new(vec![0, 0, 100, 100], 4, 1);
        let down = resize_bilinear(&img, 2, 1);
        assert_eq!(down.as_raw(), &[0, 100]);
    }

    #[test]
    fn resize_constant_image_stays_constant() {
        let img = GrayImage::from_fn(13, 17, |_, _| 42);
        let out = resize_bilinear(&img, 47, 62);
        assert_eq!((out.width(), out.height()), (47, 62));
        assert!(out.as_raw().iter().all(|&p| p == 42));
    }

    #[test]
    fn image_crate_buffers_are_accessible() {
        let buf = image::GrayImage::from_fn(4, 4, |x, y| image::Luma([(x + y * 4) as u8]));
        let face = crop(&buf, &CropRect::new(2, 2, 4, 4)).unwrap();
        assert_eq!(face.as_raw(), &[10, 11, 14, 15]);
    }
}
