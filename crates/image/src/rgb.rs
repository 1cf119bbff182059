use {
    crate::*,
    base::Vec2,
    crates_image::{RgbImage, imageops},
};

pub fn rgba_to_rgb(data: &[u8]) -> Vec<u8> {
    data.chunks_exact(4)
        .flat_map(|c| [c[0], c[1], c[2]])
        .collect()
}

/// Decode a JPEG into an RGB image, rescaled to `size` when the encoded
/// dimensions differ.
pub fn jpeg_to_rgb(data: &[u8], size: Vec2<usize>) -> Result<Image, ImageError> {
    let decoded = crates_image::load_from_memory_with_format(data, crates_image::ImageFormat::Jpeg)
        .map_err(|e| ImageError::Decode(format!("Failed to decode JPEG: {}", e)))?;

    let mut rgb: RgbImage = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width as usize != size.x || height as usize != size.y {
        log::debug!(
            "rescaling {}x{} JPEG to {}",
            width,
            height,
            size
        );
        rgb = imageops::resize(
            &rgb,
            size.x as u32,
            size.y as u32,
            imageops::FilterType::Triangle,
        );
    }

    Ok(Image::new(size, rgb.into_raw(), PixelFormat::Rgb8))
}

/// Convert any supported image into the canonical RGB layout.
pub fn to_rgb(image: &Image) -> Result<Image, ImageError> {
    image.validate()?;
    match image.format {
        PixelFormat::Rgb8 => Ok(image.clone()),
        PixelFormat::Rgba8 => Ok(Image::new(
            image.size,
            rgba_to_rgb(&image.data),
            PixelFormat::Rgb8,
        )),
        PixelFormat::Jpeg => jpeg_to_rgb(&image.data, image.size),
    }
}
