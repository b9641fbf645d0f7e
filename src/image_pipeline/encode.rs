//! Per-codec encoders and color-mode normalization.

use image::codecs::avif::AvifEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::{DynamicImage, GenericImageView};
use jpeg_encoder::{ColorType, Encoder, SamplingFactor};

use super::jpeg::Subsampling;
use crate::error::{Error, Result};

/// Codec parameters used when re-encoding pages.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeOptions {
    /// Upper bound for JPEG quality. Unset keeps the detected quality, or 100.
    pub jpeg_quality: Option<u8>,
    pub avif_quality: u8,
    pub avif_speed: u8,
    pub webp_quality: f32,
    pub webp_method: u8,
    pub webp_lossless: bool,
    /// zlib-style level, 0..=9.
    pub png_compression: u8,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: None,
            avif_quality: 85,
            avif_speed: 6,
            webp_quality: 95.0,
            webp_method: 4,
            webp_lossless: false,
            png_compression: 1,
        }
    }
}

/// Reduces an image to 8-bit RGB or luminance for codecs without alpha or
/// high-depth support.
///
/// Alpha is dropped, 16-bit channels are narrowed. Floating-point images have
/// no faithful 8-bit mapping and are rejected.
pub fn normalize_color(img: DynamicImage) -> Result<DynamicImage> {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => Ok(img),
        DynamicImage::ImageRgba8(_) | DynamicImage::ImageRgb16(_) | DynamicImage::ImageRgba16(_) => {
            Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
        }
        DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA16(_) => {
            Ok(DynamicImage::ImageLuma8(img.to_luma8()))
        }
        other => Err(Error::UnsupportedColor(format!("{:?}", other.color()))),
    }
}

/// Quality used when re-encoding a JPEG source.
///
/// A detected quality is kept unless it exceeds the cap; with nothing detected
/// the cap applies, or 100 if there is none.
pub fn jpeg_quality_for(detected: Option<u8>, cap: Option<u8>) -> u8 {
    match (detected, cap) {
        (None, Some(cap)) => cap,
        (None, None) => 100,
        (Some(detected), Some(cap)) if detected > cap => cap,
        (Some(detected), _) => detected,
    }
}

fn dimensions_u16(img: &DynamicImage) -> Result<(u16, u16)> {
    let (width, height) = img.dimensions();
    match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(Error::Unsupported(format!(
            "JPEG dimensions {}x{} exceed 65535",
            width, height
        ))),
    }
}

/// Encodes an 8-bit RGB or luminance image as baseline JPEG.
pub fn encode_jpeg(img: &DynamicImage, quality: u8, subsampling: Option<Subsampling>) -> Result<Vec<u8>> {
    let (width, height) = dimensions_u16(img)?;
    let mut out = Vec::new();
    let mut encoder = Encoder::new(&mut out, quality.clamp(1, 100));
    encoder.set_optimized_huffman_tables(true);
    if let Some(subsampling) = subsampling {
        encoder.set_sampling_factor(match subsampling {
            Subsampling::None => SamplingFactor::F_1_1,
            Subsampling::Horizontal => SamplingFactor::F_2_1,
            Subsampling::Both => SamplingFactor::F_2_2,
        });
    }

    match img {
        DynamicImage::ImageRgb8(buf) => encoder.encode(buf.as_raw(), width, height, ColorType::Rgb)?,
        DynamicImage::ImageLuma8(buf) => encoder.encode(buf.as_raw(), width, height, ColorType::Luma)?,
        other => return Err(Error::UnsupportedColor(format!("{:?}", other.color()))),
    }
    Ok(out)
}

pub fn encode_png(img: &DynamicImage, compression: u8) -> Result<Vec<u8>> {
    let compression = match compression {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    };
    let mut out = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut out, compression, PngFilter::Adaptive);
    img.write_with_encoder(encoder)?;
    Ok(out)
}

pub fn encode_webp(img: &DynamicImage, quality: f32, method: u8, lossless: bool) -> Result<Vec<u8>> {
    // libwebp only accepts 8-bit RGB(A).
    let img = match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => img.clone(),
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    };
    let encoder = webp::Encoder::from_image(&img).map_err(|e| Error::UnsupportedColor(e.to_string()))?;

    let mut config = webp::WebPConfig::new()
        .map_err(|_| Error::Other("Failed to initialize WebP encoder config".to_string()))?;
    config.quality = quality.clamp(0.0, 100.0);
    config.method = i32::from(method.min(6));
    config.lossless = i32::from(lossless);

    let memory = encoder
        .encode_advanced(&config)
        .map_err(|e| Error::Other(format!("WebP encoding failed: {:?}", e)))?;
    Ok(memory.to_vec())
}

pub fn encode_avif(img: &DynamicImage, quality: u8, speed: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let encoder = AvifEncoder::new_with_speed_quality(&mut out, speed.clamp(1, 10), quality.clamp(1, 100));
    img.write_with_encoder(encoder)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayAlphaImage, LumaA, Rgb32FImage, RgbaImage};

    #[test]
    fn test_quality_selection() {
        assert_eq!(jpeg_quality_for(None, Some(80)), 80);
        assert_eq!(jpeg_quality_for(None, None), 100);
        assert_eq!(jpeg_quality_for(Some(92), Some(80)), 80);
        assert_eq!(jpeg_quality_for(Some(70), Some(80)), 70);
        assert_eq!(jpeg_quality_for(Some(70), None), 70);
    }

    #[test]
    fn test_normalize_color_modes() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::new(4, 4));
        assert!(matches!(normalize_color(rgba).unwrap(), DynamicImage::ImageRgb8(_)));

        let la = DynamicImage::ImageLumaA8(GrayAlphaImage::from_pixel(4, 4, LumaA([9, 200])));
        assert!(matches!(normalize_color(la).unwrap(), DynamicImage::ImageLuma8(_)));

        let float = DynamicImage::ImageRgb32F(Rgb32FImage::new(4, 4));
        assert!(matches!(normalize_color(float), Err(Error::UnsupportedColor(_))));
    }

    #[test]
    fn test_encoders_produce_decodable_output() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_fn(24, 16, |x, y| {
            image::Rgb([(x * 10) as u8, (y * 15) as u8, 128])
        }));

        let jpeg = encode_jpeg(&img, 85, Some(Subsampling::None)).unwrap();
        assert_eq!(image::guess_format(&jpeg).unwrap(), image::ImageFormat::Jpeg);

        let png = encode_png(&img, 9).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.to_rgb8(), img.to_rgb8());

        let webp = encode_webp(&img, 90.0, 4, false).unwrap();
        assert_eq!(image::guess_format(&webp).unwrap(), image::ImageFormat::WebP);
    }
}
