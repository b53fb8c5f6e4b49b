//! Lossless image optimization.
//!
//! PNGs are re-encoded with maximum compression and adaptive filtering; JPEGs
//! are re-encoded at the configured quality. The smaller of the original and
//! the re-encoded bytes wins, so optimization never grows a file. Other
//! formats (SVG, GIF, WebP, ...) are copied as-is.
//!
//! Both encoders are deterministic, so rebuilding from unchanged sources
//! produces identical bytes.

use super::{Transform, TransformError};
use crate::files::SourceFile;
use ::image::codecs::jpeg::JpegEncoder;
use ::image::codecs::png::{CompressionType, FilterType, PngEncoder};
use ::image::{DynamicImage, ImageFormat};

pub struct ImageTransform {
    jpeg_quality: u8,
}

impl ImageTransform {
    pub fn new(jpeg_quality: u8) -> Self {
        Self { jpeg_quality }
    }

    fn reencode(&self, format: ImageFormat, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        let img = ::image::load_from_memory_with_format(input, format)?;
        let mut out = Vec::new();
        match format {
            ImageFormat::Png => {
                let encoder =
                    PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive);
                img.write_with_encoder(encoder)?;
            }
            _ => {
                // JPEG has no alpha channel.
                let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
                let encoder = JpegEncoder::new_with_quality(&mut out, self.jpeg_quality);
                rgb.write_with_encoder(encoder)?;
            }
        }
        Ok(out)
    }
}

fn optimizable_format(file: &SourceFile) -> Option<ImageFormat> {
    let ext = file.relative.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some(ImageFormat::Png),
        "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
        _ => None,
    }
}

impl Transform for ImageTransform {
    fn transform(&self, file: &SourceFile, input: Vec<u8>) -> Result<Vec<u8>, TransformError> {
        let Some(format) = optimizable_format(file) else {
            return Ok(input);
        };
        let optimized = self.reencode(format, &input)?;
        if optimized.len() < input.len() {
            Ok(optimized)
        } else {
            Ok(input)
        }
    }
}
