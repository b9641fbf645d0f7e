//! Per-page image pipeline: decode, transform, and re-encode.
//!
//! JPEG sources keep their effective quality and chroma subsampling unless a
//! fixed output format is requested. Everything else is re-encoded with the
//! configured codec parameters.

pub mod encode;
pub mod jpeg;
pub mod transform;

use image::DynamicImage;
use log::debug;

use crate::error::{Error, Result};
use crate::types::{ImageKind, normalize_extension};

pub use encode::EncodeOptions;
pub use jpeg::{JpegHeader, Subsampling};
pub use transform::{DownSample, ThresholdCrop, Transformer};

/// Stateless apart from its configuration; safe to share across page jobs.
#[derive(Default)]
pub struct ImagePipeline {
    transforms: Vec<Box<dyn Transformer>>,
    fixed_ext: Option<ImageKind>,
    options: EncodeOptions,
}

impl ImagePipeline {
    pub fn new(fixed_ext: Option<ImageKind>, options: EncodeOptions) -> Self {
        Self {
            transforms: Vec::new(),
            fixed_ext,
            options,
        }
    }

    pub fn push(&mut self, transform: impl Transformer + 'static) -> &mut Self {
        self.transforms.push(Box::new(transform));
        self
    }

    pub fn with(mut self, transform: impl Transformer + 'static) -> Self {
        self.push(transform);
        self
    }

    fn transform(&self, mut img: DynamicImage) -> Result<DynamicImage> {
        for transform in &self.transforms {
            img = transform.transform(img)?;
        }
        Ok(img)
    }

    /// Re-encodes one page. Returns the new bytes and their extension (without dot).
    ///
    /// Decode failures are reported as [`Error::CorruptImage`]; a source
    /// format with no encoder and no fixed output format is [`Error::Unsupported`].
    pub fn process(&self, data: &[u8], ext: &str) -> Result<(Vec<u8>, String)> {
        let img = image::load_from_memory(data).map_err(|e| Error::CorruptImage(e.to_string()))?;
        let source = ImageKind::from_extension(ext);

        if source == Some(ImageKind::Jpeg) && matches!(self.fixed_ext, None | Some(ImageKind::Jpeg)) {
            let header = JpegHeader::parse(data);
            let detected = header.as_ref().and_then(JpegHeader::estimate_quality);
            let subsampling = header.as_ref().and_then(JpegHeader::subsampling);
            let quality = encode::jpeg_quality_for(detected, self.options.jpeg_quality);
            debug!(
                "JPEG quality detected {:?}, subsampling {:?}, encoding at {}",
                detected, subsampling, quality
            );

            let img = encode::normalize_color(self.transform(img)?)?;
            let data = encode::encode_jpeg(&img, quality, subsampling)?;
            return Ok((data, ImageKind::Jpeg.extension().to_string()));
        }

        let target = self.fixed_ext.or(source).ok_or_else(|| {
            Error::Unsupported(format!("Unsupported format .{}", normalize_extension(ext)))
        })?;
        let img = self.transform(img)?;
        let options = &self.options;
        let data = match target {
            ImageKind::Jpeg => {
                let img = encode::normalize_color(img)?;
                let quality = options.jpeg_quality.unwrap_or(100);
                encode::encode_jpeg(&img, quality, Some(Subsampling::None))?
            }
            ImageKind::Png => encode::encode_png(&img, options.png_compression)?,
            ImageKind::Webp => encode::encode_webp(
                &img,
                options.webp_quality,
                options.webp_method,
                options.webp_lossless,
            )?,
            ImageKind::Avif => encode::encode_avif(&img, options.avif_quality, options.avif_speed)?,
        };
        Ok((data, target.extension().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResizeKernel;
    use image::{GenericImageView, Rgb, RgbImage};

    fn jpeg_bytes(width: u32, height: u32, quality: u8) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 90])
        }));
        encode::encode_jpeg(&img, quality, Some(Subsampling::Both)).unwrap()
    }

    #[test]
    fn test_jpeg_quality_is_never_raised() {
        let pipeline = ImagePipeline::new(None, EncodeOptions::default());
        let (out, ext) = pipeline.process(&jpeg_bytes(64, 64, 70), ".jpg").unwrap();
        assert_eq!(ext, "jpg");
        let header = JpegHeader::parse(&out).unwrap();
        let quality = header.estimate_quality().unwrap();
        assert!(quality.abs_diff(70) <= 2, "re-encoded at {}", quality);
        assert_eq!(header.subsampling(), Some(Subsampling::Both));
    }

    #[test]
    fn test_jpeg_quality_cap_applies() {
        let options = EncodeOptions {
            jpeg_quality: Some(60),
            ..EncodeOptions::default()
        };
        let pipeline = ImagePipeline::new(None, options);
        let (out, _) = pipeline.process(&jpeg_bytes(64, 64, 95), "jpeg").unwrap();
        let quality = JpegHeader::parse(&out).unwrap().estimate_quality().unwrap();
        assert!(quality.abs_diff(60) <= 2, "re-encoded at {}", quality);
    }

    #[test]
    fn test_fixed_ext_converts_and_transforms() {
        let pipeline = ImagePipeline::new(Some(ImageKind::Png), EncodeOptions::default())
            .with(DownSample::new(32, 32, ResizeKernel::Linear));
        let (out, ext) = pipeline.process(&jpeg_bytes(128, 64, 90), ".JPG").unwrap();
        assert_eq!(ext, "png");
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.dimensions(), (32, 16));
    }

    #[test]
    fn test_corrupt_and_unsupported_inputs() {
        let pipeline = ImagePipeline::new(None, EncodeOptions::default());
        let err = pipeline.process(b"definitely not an image", ".png").unwrap_err();
        assert!(matches!(err, Error::CorruptImage(_)));
        assert!(err.is_page_recoverable());

        let mut bmp = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(8, 8))
            .write_to(&mut std::io::Cursor::new(&mut bmp), image::ImageFormat::Bmp)
            .unwrap();
        let err = pipeline.process(&bmp, ".bmp").unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
