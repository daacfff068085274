use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;

pub const JPEG_QUALITY: u8 = 80;

/// Decode a JPEG (or any supported format) body into an RGB frame.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, image::ImageError> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// Encode an RGB frame as JPEG.
pub fn encode_jpeg(frame: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY).encode_image(frame)?;
    Ok(buffer)
}
