use {crate::*, base::Vec2, crates_image::ImageEncoder};

pub fn rgb_to_jpeg(size: Vec2<usize>, data: &[u8], quality: u8) -> Result<Vec<u8>, ImageError> {
    let expected = size.area() * 3;
    if data.len() != expected {
        return Err(ImageError::Size {
            expected,
            actual: data.len(),
        });
    }
    let mut buffer = Vec::new();
    let encoder = crates_image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .write_image(
            data,
            size.x as u32,
            size.y as u32,
            crates_image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| ImageError::Encode(e.to_string()))?;
    Ok(buffer)
}

/// Encode a frame for transmission at a fixed `quality` (1..=100).
///
/// JPEG input is passed through untouched, RGBA has its alpha stripped.
pub fn encode_jpeg(image: &Image, quality: u8) -> Result<Vec<u8>, ImageError> {
    match image.format {
        PixelFormat::Jpeg => Ok(image.data.clone()),
        PixelFormat::Rgb8 => rgb_to_jpeg(image.size, &image.data, quality),
        PixelFormat::Rgba8 => rgb_to_jpeg(image.size, &rgba_to_rgb(&image.data), quality),
    }
}
