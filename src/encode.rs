use crate::buffer::PixelBuffer;
use std::io::Cursor;

pub const CONTENT_TYPE: &str = "image/png";

/// Encodes `buffer` as an RGBA8 PNG.
pub fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>, image::ImageError> {
    let mut writer = Cursor::new(Vec::new());
    buffer
        .as_image()
        .write_to(&mut writer, image::ImageFormat::Png)?;
    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    #[test]
    fn writes_png_signature_and_size() {
        let buffer = PixelBuffer::new(7, 3).unwrap();
        let bytes = encode_png(&buffer).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (7, 3));
    }

    #[test]
    fn is_lossless_and_deterministic() {
        let mut image = RgbaImage::new(5, 5);
        image.put_pixel(2, 3, Rgba([10, 20, 30, 40]));
        image.put_pixel(4, 0, Rgba([255, 0, 128, 255]));
        let buffer = PixelBuffer::from_image(image.clone()).unwrap();

        let bytes = encode_png(&buffer).unwrap();
        assert_eq!(encode_png(&buffer).unwrap(), bytes);

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded, image);
    }
}
