//! Geometry transforms applied to a decoded page before re-encoding.

use image::{DynamicImage, GenericImageView};

use crate::error::Result;
use crate::types::ResizeKernel;

/// A step of the image pipeline operating on a decoded page.
pub trait Transformer: Send + Sync {
    fn name(&self) -> &'static str;

    fn transform(&self, img: DynamicImage) -> Result<DynamicImage>;
}

/// Crops to the bounding box of the pixels whose luminance lies in `lower..=upper`.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdCrop {
    pub lower: u8,
    pub upper: u8,
}

impl ThresholdCrop {
    pub fn new(lower: u8, upper: u8) -> Self {
        Self { lower, upper }
    }

    /// Inclusive `(x0, y0, x1, y1)` of the in-threshold pixels, if any.
    pub fn bounding_box(&self, img: &DynamicImage) -> Option<(u32, u32, u32, u32)> {
        let luma = img.to_luma8();
        let (width, height) = luma.dimensions();
        let mut rows = vec![false; height as usize];
        let mut cols = vec![false; width as usize];
        for (x, y, pixel) in luma.enumerate_pixels() {
            if (self.lower..=self.upper).contains(&pixel.0[0]) {
                rows[y as usize] = true;
                cols[x as usize] = true;
            }
        }

        let y0 = rows.iter().position(|&r| r)?;
        let y1 = rows.iter().rposition(|&r| r)?;
        let x0 = cols.iter().position(|&c| c)?;
        let x1 = cols.iter().rposition(|&c| c)?;
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}

impl Transformer for ThresholdCrop {
    fn name(&self) -> &'static str {
        "crop"
    }

    fn transform(&self, img: DynamicImage) -> Result<DynamicImage> {
        match self.bounding_box(&img) {
            // Inclusive bounds: the smallest box is a single pixel.
            Some((x0, y0, x1, y1)) => Ok(img.crop_imm(x0, y0, x1 - x0 + 1, y1 - y0 + 1)),
            None => Ok(img),
        }
    }
}

/// Shrinks pages larger than the screen, keeping the aspect ratio. Never upscales.
#[derive(Debug, Clone, Copy)]
pub struct DownSample {
    pub width: u32,
    pub height: u32,
    pub kernel: ResizeKernel,
}

impl DownSample {
    pub fn new(width: u32, height: u32, kernel: ResizeKernel) -> Self {
        Self {
            width,
            height,
            kernel,
        }
    }

    /// Output dimensions for an image of `width` x `height`.
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        if width <= self.width && height <= self.height {
            return (width, height);
        }
        let (w, h) = (u64::from(width.max(1)), u64::from(height.max(1)));
        let (max_w, max_h) = (u64::from(self.width), u64::from(self.height));
        let scaled_height = h * max_w / w;
        let scaled_width = w * max_h / h;
        let (out_w, out_h) = if scaled_height > max_h {
            (scaled_width, max_h)
        } else {
            (max_w, scaled_height)
        };
        (out_w.max(1) as u32, out_h.max(1) as u32)
    }
}

impl Transformer for DownSample {
    fn name(&self) -> &'static str {
        "downsample"
    }

    fn transform(&self, img: DynamicImage) -> Result<DynamicImage> {
        let (width, height) = img.dimensions();
        let (out_w, out_h) = self.target_size(width, height);
        if (out_w, out_h) == (width, height) {
            return Ok(img);
        }
        Ok(img.resize_exact(out_w, out_h, self.kernel.filter_type()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, RgbImage};

    #[test]
    fn test_crop_to_in_threshold_box() {
        let gray = GrayImage::from_fn(40, 30, |x, y| {
            if (5..=15).contains(&x) && (10..=20).contains(&y) {
                Luma([40])
            } else {
                Luma([255])
            }
        });
        let crop = ThresholdCrop::new(0, 200);
        let img = DynamicImage::ImageLuma8(gray);
        assert_eq!(crop.bounding_box(&img), Some((5, 10, 15, 20)));

        let cropped = crop.transform(img).unwrap();
        assert_eq!(cropped.dimensions(), (11, 11));
        assert!(cropped.to_luma8().pixels().all(|p| p.0[0] == 40));
    }

    #[test]
    fn test_crop_without_match_is_identity() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 9, image::Rgb([255, 255, 255])));
        let before = img.as_bytes().to_vec();
        let out = ThresholdCrop::new(0, 200).transform(img).unwrap();
        assert_eq!(out.dimensions(), (12, 9));
        assert_eq!(out.as_bytes(), before.as_slice());
    }

    #[test]
    fn test_crop_single_column_box() {
        let gray = GrayImage::from_fn(20, 20, |x, y| {
            if x == 7 && (3..=12).contains(&y) { Luma([0]) } else { Luma([255]) }
        });
        let out = ThresholdCrop::new(0, 100)
            .transform(DynamicImage::ImageLuma8(gray))
            .unwrap();
        assert_eq!(out.dimensions(), (1, 10));
        assert!(out.to_luma8().pixels().all(|p| p.0[0] == 0));

        let dot = GrayImage::from_fn(9, 9, |x, y| if (x, y) == (4, 4) { Luma([0]) } else { Luma([255]) });
        let out = ThresholdCrop::new(0, 100)
            .transform(DynamicImage::ImageLuma8(dot))
            .unwrap();
        assert_eq!(out.dimensions(), (1, 1));
    }

    #[test]
    fn test_downsample_binds_on_tighter_dimension() {
        let down = DownSample::new(1000, 1000, ResizeKernel::Cubic);
        assert_eq!(down.target_size(2000, 1000), (1000, 500));
        assert_eq!(down.target_size(1000, 4000), (250, 1000));
        assert_eq!(down.target_size(500, 500), (500, 500));

        let img = DynamicImage::ImageRgb8(RgbImage::new(2000, 1000));
        assert_eq!(down.transform(img).unwrap().dimensions(), (1000, 500));
    }

    #[test]
    fn test_downsample_never_upscales() {
        let down = DownSample::new(1264, 1680, ResizeKernel::Lanczos);
        let img = DynamicImage::ImageRgb8(RgbImage::new(500, 500));
        assert_eq!(down.transform(img).unwrap().dimensions(), (500, 500));
    }
}
