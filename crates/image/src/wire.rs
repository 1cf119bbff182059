use {crate::*, base::Vec2};

/// Leading bytes of every JPEG stream (SOI + first marker prefix).
pub const JPEG_MARKER: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Layout of a camera payload, decided from its prefix and length alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Jpeg,
    Rgba8,
    Rgb8,
}

impl WireFormat {
    /// Classify a payload for a camera of the given `size`.
    ///
    /// The JPEG marker wins over any length match. Anything that is neither
    /// JPEG nor an exact packed RGBA/RGB buffer yields `None`.
    pub fn classify(payload: &[u8], size: Vec2<usize>) -> Option<WireFormat> {
        let pixels = size.area();
        if payload.len() >= JPEG_MARKER.len() && payload[..3] == JPEG_MARKER {
            Some(WireFormat::Jpeg)
        } else if payload.len() == pixels * 4 {
            Some(WireFormat::Rgba8)
        } else if payload.len() == pixels * 3 {
            Some(WireFormat::Rgb8)
        } else {
            None
        }
    }
}

/// Decode one camera payload into a canonical RGB frame.
///
/// Returns `None` for payloads that do not match any accepted layout and for
/// JPEG data that fails to decode; neither is an error for the relay.
pub fn decode_frame(payload: &[u8], size: Vec2<usize>) -> Option<Image> {
    match WireFormat::classify(payload, size)? {
        WireFormat::Jpeg => match jpeg_to_rgb(payload, size) {
            Ok(image) => Some(image),
            Err(e) => {
                log::debug!("dropping undecodable JPEG payload: {}", e);
                None
            }
        },
        WireFormat::Rgba8 => Some(Image::new(size, rgba_to_rgb(payload), PixelFormat::Rgb8)),
        WireFormat::Rgb8 => Some(Image::new(size, payload.to_vec(), PixelFormat::Rgb8)),
    }
}
