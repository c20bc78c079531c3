use crate::document::Color;
use image::{Rgba, RgbaImage};

/// A non-empty RGBA8 raster, row-major, straight alpha.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl PixelBuffer {
    /// A fully transparent buffer. `None` if either side is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            image: RgbaImage::new(width, height),
        })
    }

    pub fn from_image(image: RgbaImage) -> Option<Self> {
        if image.width() == 0 || image.height() == 0 {
            return None;
        }
        Some(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        let Rgba([r, g, b, a]) = *self.image.get_pixel(x, y);
        Color::rgba(r, g, b, a)
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub(crate) fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.image
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sizes_are_rejected() {
        assert!(PixelBuffer::new(0, 4).is_none());
        assert!(PixelBuffer::new(4, 0).is_none());
        assert!(PixelBuffer::from_image(RgbaImage::new(0, 0)).is_none());
    }

    #[test]
    fn starts_transparent() {
        let buffer = PixelBuffer::new(3, 2).unwrap();
        assert_eq!((buffer.width(), buffer.height()), (3, 2));
        assert_eq!(buffer.as_raw().len(), 3 * 2 * 4);
        assert_eq!(buffer.pixel(2, 1), Color::TRANSPARENT);
    }
}
