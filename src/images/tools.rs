use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::images::ThumbnailError;

pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Bounding box a thumbnail must fit inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxDimensions {
    pub width: u32,
    pub height: u32,
}

impl MaxDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }
}

/// Target size for a `width`x`height` source scaled down to fit `bounds`.
/// Keeps the aspect ratio and never upscales.
pub fn fit_within(width: u32, height: u32, bounds: MaxDimensions) -> (u32, u32) {
    if width <= bounds.width && height <= bounds.height {
        return (width, height);
    }

    let scale_x = bounds.width as f64 / width as f64;
    let scale_y = bounds.height as f64 / height as f64;
    let scale = scale_x.min(scale_y);

    let target_width = ((width as f64 * scale).round() as u32).clamp(1, bounds.width);
    let target_height = ((height as f64 * scale).round() as u32).clamp(1, bounds.height);
    (target_width, target_height)
}

pub fn downscale(img: DynamicImage, bounds: MaxDimensions) -> DynamicImage {
    let (width, height) = img.dimensions();
    let (target_width, target_height) = fit_within(width, height, bounds);

    if (target_width, target_height) == (width, height) {
        return img;
    }

    img.resize_exact(target_width, target_height, FilterType::Lanczos3)
}

/// Decodes `image_data`, shrinks it into `bounds` and re-encodes it as JPEG.
pub fn make_thumbnail(
    image_data: &[u8],
    bounds: MaxDimensions,
    quality: u8,
) -> Result<Vec<u8>, ThumbnailError> {
    let img = image::load_from_memory(image_data).map_err(ThumbnailError::Decode)?;
    let thumbnail = downscale(img, bounds);
    encode_jpeg(&thumbnail, quality)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ThumbnailError> {
    // JPEG has no alpha channel
    let rgb = img.to_rgb8();

    let mut output = Vec::new();
    JpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(ThumbnailError::Encode)?;

    Ok(output)
}
