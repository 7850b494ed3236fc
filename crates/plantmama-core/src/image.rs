//! Plant photo processing.
//!
//! Photos are normalized before they are sent to the vision model: only
//! JPEG, PNG and WEBP are accepted, large images are downscaled to fit a
//! 1024x1024 box and everything is re-encoded as RGB JPEG.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Minimum share of green pixels for a photo to count as a plant.
pub const MIN_GREEN_RATIO: f64 = 0.05;

/// Brightness bounds (0-255 scale) for a usable photo.
pub const MIN_BRIGHTNESS: f64 = 30.0;
pub const MAX_BRIGHTNESS: f64 = 250.0;

/// Errors from decoding, checking or storing photos.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to process image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Image doesn't appear to contain a plant")]
    NotAPlant,

    #[error("Image is too dark")]
    TooDark,

    #[error("Image is too bright/overexposed")]
    TooBright,

    #[error("Failed to store image at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ImageError>;

/// What happened to an image during processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub original_format: String,
    pub original_size: (u32, u32),
    pub color_type: String,
    pub resized: bool,
    pub new_size: Option<(u32, u32)>,
    pub processed_size: usize,
}

/// A normalized JPEG ready for the model.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub metadata: ImageMetadata,
}

impl ProcessedImage {
    /// Always JPEG after processing.
    pub fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }

    /// Hex sha256 of the processed bytes.
    pub fn content_hash(&self) -> String {
        content_hash(&self.bytes)
    }
}

/// Simple visual statistics of a photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFeatures {
    /// Mean over all RGB channel values.
    pub brightness: f64,
    /// Standard deviation over all RGB channel values.
    pub contrast: f64,
    /// Share of pixels that are clearly green.
    pub green_ratio: f64,
    /// Most frequent exact colours, most common first.
    pub dominant_colors: Vec<[u8; 3]>,
}

/// Normalizes and inspects plant photos.
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    max_dimension: u32,
    jpeg_quality: u8,
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self {
            max_dimension: 1024,
            jpeg_quality: 90,
        }
    }
}

impl ImageProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the bounding box size.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension.max(1);
        self
    }

    /// Decode, check the format, downscale if needed and re-encode as JPEG.
    pub fn process(&self, data: &[u8]) -> Result<ProcessedImage> {
        let (format, image) = decode(data)?;
        self.normalize(format, image)
    }

    fn normalize(&self, format: ImageFormat, image: DynamicImage) -> Result<ProcessedImage> {
        let original_size = (image.width(), image.height());
        let color_type = format!("{:?}", image.color());

        let (image, resized) =
            if image.width() > self.max_dimension || image.height() > self.max_dimension {
                let scaled = image.resize(self.max_dimension, self.max_dimension, FilterType::Lanczos3);
                (scaled, true)
            } else {
                (image, false)
            };
        let new_size = resized.then(|| (image.width(), image.height()));

        let mut bytes = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut bytes, self.jpeg_quality);
        DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;

        let metadata = ImageMetadata {
            original_format: format_name(format).to_string(),
            original_size,
            color_type,
            resized,
            new_size,
            processed_size: bytes.len(),
        };
        tracing::info!(
            format = %metadata.original_format,
            width = original_size.0,
            height = original_size.1,
            resized,
            processed_size = metadata.processed_size,
            "Processed image"
        );

        Ok(ProcessedImage { bytes, metadata })
    }

    /// Compute brightness, contrast, green ratio and dominant colours.
    pub fn extract_features(&self, data: &[u8]) -> Result<ImageFeatures> {
        let (_, image) = decode(data)?;
        Ok(features_of(&image))
    }

    /// Reject photos that are unlikely to show a plant or are badly exposed.
    ///
    /// Decodes once and returns the normalized image with its features.
    pub fn validate_plant_image(&self, data: &[u8]) -> Result<(ProcessedImage, ImageFeatures)> {
        let (format, image) = decode(data)?;
        let features = features_of(&image);

        if features.green_ratio < MIN_GREEN_RATIO {
            return Err(ImageError::NotAPlant);
        }
        if features.brightness < MIN_BRIGHTNESS {
            return Err(ImageError::TooDark);
        }
        if features.brightness > MAX_BRIGHTNESS {
            return Err(ImageError::TooBright);
        }
        Ok((self.normalize(format, image)?, features))
    }
}

fn decode(data: &[u8]) -> Result<(ImageFormat, DynamicImage)> {
    let format = image::guess_format(data)?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP) {
        return Err(ImageError::UnsupportedFormat(format_name(format).to_string()));
    }
    let image = image::load_from_memory_with_format(data, format)?;
    Ok((format, image))
}

fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::Png => "PNG",
        ImageFormat::WebP => "WEBP",
        ImageFormat::Gif => "GIF",
        ImageFormat::Bmp => "BMP",
        ImageFormat::Tiff => "TIFF",
        _ => "UNKNOWN",
    }
}

fn features_of(image: &DynamicImage) -> ImageFeatures {
    let rgb = image.to_rgb8();
    let pixel_count = (rgb.width() as u64 * rgb.height() as u64).max(1);

    let mut sum = 0f64;
    let mut sum_sq = 0f64;
    let mut green = 0u64;
    let mut counts: HashMap<[u8; 3], u64> = HashMap::new();

    for pixel in rgb.pixels() {
        let [r, g, b] = pixel.0;
        for v in [r, g, b] {
            let v = v as f64;
            sum += v;
            sum_sq += v * v;
        }
        let (rf, gf, bf) = (r as f64, g as f64, b as f64);
        if gf > rf * 1.1 && gf > bf * 1.1 && g > 50 {
            green += 1;
        }
        *counts.entry(pixel.0).or_insert(0) += 1;
    }

    let n = (pixel_count * 3) as f64;
    let brightness = sum / n;
    let variance = (sum_sq / n - brightness * brightness).max(0.0);

    let mut ranked: Vec<([u8; 3], u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    ImageFeatures {
        brightness,
        contrast: variance.sqrt(),
        green_ratio: green as f64 / pixel_count as f64,
        dominant_colors: ranked.into_iter().take(3).map(|(c, _)| c).collect(),
    }
}

/// Hex sha256 digest.
pub fn content_hash(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Store processed image bytes under `dir`, named by content hash.
///
/// Returns the written path; identical photos share one file.
pub fn save_upload(dir: &Path, data: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|source| ImageError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(format!("{}.jpg", content_hash(data)));
    if !path.exists() {
        std::fs::write(&path, data).map_err(|source| ImageError::Io {
            path: path.clone(),
            source,
        })?;
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn encode(img: ImageBuffer<Rgb<u8>, Vec<u8>>, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), format)
            .unwrap();
        buf
    }

    fn solid(w: u32, h: u32, color: [u8; 3]) -> Vec<u8> {
        encode(ImageBuffer::from_pixel(w, h, Rgb(color)), ImageFormat::Png)
    }

    #[test]
    fn test_process_small_png() {
        let processed = ImageProcessor::new().process(&solid(64, 32, [30, 160, 40])).unwrap();

        assert_eq!(processed.metadata.original_format, "PNG");
        assert_eq!(processed.metadata.original_size, (64, 32));
        assert!(!processed.metadata.resized);
        assert_eq!(processed.metadata.processed_size, processed.bytes.len());
        assert_eq!(image::guess_format(&processed.bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_process_downscales_keeping_aspect() {
        let processor = ImageProcessor::new().with_max_dimension(100);
        let processed = processor.process(&solid(400, 200, [10, 200, 10])).unwrap();

        assert!(processed.metadata.resized);
        assert_eq!(processed.metadata.new_size, Some((100, 50)));
    }

    #[test]
    fn test_rejects_unsupported_and_garbage() {
        let gif = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;";
        assert!(matches!(
            ImageProcessor::new().process(gif),
            Err(ImageError::UnsupportedFormat(f)) if f == "GIF"
        ));
        assert!(ImageProcessor::new().process(b"not an image").is_err());
    }

    #[test]
    fn test_features() {
        let features = ImageProcessor::new()
            .extract_features(&solid(10, 10, [30, 160, 40]))
            .unwrap();

        assert!((features.brightness - 230.0 / 3.0).abs() < 1e-9);
        assert!((features.green_ratio - 1.0).abs() < 1e-9);
        assert!(features.contrast > 0.0);
        assert_eq!(features.dominant_colors, vec![[30, 160, 40]]);
    }

    #[test]
    fn test_dominant_colors_by_frequency() {
        let img = ImageBuffer::from_fn(10, 10, |x, _| match x {
            0..=5 => Rgb([0, 100, 0]),
            6..=8 => Rgb([200, 0, 0]),
            _ => Rgb([0, 0, 200]),
        });
        let features = ImageProcessor::new()
            .extract_features(&encode(img, ImageFormat::Png))
            .unwrap();
        assert_eq!(
            features.dominant_colors,
            vec![[0, 100, 0], [200, 0, 0], [0, 0, 200]]
        );
    }

    #[test]
    fn test_validate_plant_image() {
        let processor = ImageProcessor::new();

        let (processed, features) = processor
            .clone()
            .with_max_dimension(16)
            .validate_plant_image(&solid(40, 20, [40, 150, 50]))
            .unwrap();
        assert_eq!(image::guess_format(&processed.bytes).unwrap(), ImageFormat::Jpeg);
        assert_eq!(processed.metadata.new_size, Some((16, 8)));
        assert!(features.green_ratio > 0.9);
        assert!(matches!(
            processor.validate_plant_image(&solid(20, 20, [120, 120, 120])),
            Err(ImageError::NotAPlant)
        ));
        assert!(matches!(
            processor.validate_plant_image(&solid(20, 20, [0, 55, 0])),
            Err(ImageError::TooDark)
        ));

        let bright = ImageBuffer::from_fn(100, 100, |_, y| {
            if y < 6 {
                Rgb([220, 255, 220])
            } else {
                Rgb([255, 255, 255])
            }
        });
        assert!(matches!(
            processor.validate_plant_image(&encode(bright, ImageFormat::Png)),
            Err(ImageError::TooBright)
        ));
    }

    #[test]
    fn test_save_upload_is_content_addressed() {
        let dir = tempdir().unwrap();
        let a = save_upload(dir.path(), b"leaf").unwrap();
        let b = save_upload(dir.path(), b"leaf").unwrap();

        assert_eq!(a, b);
        assert_eq!(a.file_name().unwrap().to_str().unwrap(), format!("{}.jpg", content_hash(b"leaf")));
        assert_eq!(content_hash(b"leaf").len(), 64);
    }
}
