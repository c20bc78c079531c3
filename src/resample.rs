//! Separable Lanczos-3 resizing.
//!
//! Channels are filtered independently, alpha included, so semi-transparent
//! edges can pick up color from fully transparent neighbours.

use crate::buffer::PixelBuffer;
use image::RgbaImage;
use std::f64::consts::PI;

/// Kernel support radius in source pixels at unit scale.
const SUPPORT: f64 = 3.0;

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

fn lanczos3(x: f64) -> f64 {
    if x.abs() < SUPPORT {
        sinc(x) * sinc(x / SUPPORT)
    } else {
        0.0
    }
}

/// Normalized filter taps for one output sample.
struct Taps {
    first: usize,
    weights: Vec<f32>,
}

/// Computes the taps mapping a `src`-long axis onto `dst` samples.
///
/// When shrinking, the kernel is widened by the ratio so every source pixel
/// contributes. Out-of-range taps are clamped onto the edge pixel.
fn taps(src: u32, dst: u32) -> Vec<Taps> {
    let ratio = f64::from(src) / f64::from(dst);
    let scale = ratio.max(1.0);
    let support = SUPPORT * scale;
    let last = i64::from(src) - 1;

    (0..dst)
        .map(|i| {
            let center = (f64::from(i) + 0.5) * ratio;
            let start = (center - support).floor() as i64;
            let end = (center + support).ceil() as i64;

            let lo = start.clamp(0, last);
            let hi = end.clamp(0, last);
            let mut weights = vec![0.0f64; (hi - lo + 1) as usize];
            let mut total = 0.0;
            for j in start..=end {
                let w = lanczos3(((j as f64 + 0.5) - center) / scale);
                weights[(j.clamp(0, last) - lo) as usize] += w;
                total += w;
            }

            if total == 0.0 {
                // Unreachable for sane inputs; fall back to nearest.
                let k = (center.floor() as i64).clamp(0, last) as usize;
                return Taps {
                    first: k,
                    weights: vec![1.0],
                };
            }

            Taps {
                first: lo as usize,
                weights: weights.iter().map(|w| (w / total) as f32).collect(),
            }
        })
        .collect()
}

/// Resizes `buffer` to `width` x `height`. `None` if either is zero.
pub fn resample(buffer: &PixelBuffer, width: u32, height: u32) -> Option<PixelBuffer> {
    if width == 0 || height == 0 {
        return None;
    }
    if buffer.width() == width && buffer.height() == height {
        return Some(buffer.clone());
    }

    let src_w = buffer.width() as usize;
    let src_h = buffer.height() as usize;
    let src = buffer.as_raw();

    // Horizontal pass: src_h rows of `width` pixels.
    let columns = taps(buffer.width(), width);
    let mut horizontal = vec![0.0f32; width as usize * src_h * 4];
    for y in 0..src_h {
        let row = &src[y * src_w * 4..(y + 1) * src_w * 4];
        for (x, tap) in columns.iter().enumerate() {
            let mut acc = [0.0f32; 4];
            for (k, w) in tap.weights.iter().enumerate() {
                let px = &row[(tap.first + k) * 4..(tap.first + k) * 4 + 4];
                for c in 0..4 {
                    acc[c] += f32::from(px[c]) * w;
                }
            }
            let out = (y * width as usize + x) * 4;
            horizontal[out..out + 4].copy_from_slice(&acc);
        }
    }

    // Vertical pass straight into the output.
    let rows = taps(buffer.height(), height);
    let stride = width as usize * 4;
    let mut out = vec![0u8; stride * height as usize];
    for (y, tap) in rows.iter().enumerate() {
        let dst = &mut out[y * stride..(y + 1) * stride];
        for x in 0..stride {
            let mut acc = 0.0f32;
            for (k, w) in tap.weights.iter().enumerate() {
                acc += horizontal[(tap.first + k) * stride + x] * w;
            }
            dst[x] = acc.round().clamp(0.0, 255.0) as u8;
        }
    }

    RgbaImage::from_raw(width, height, out).and_then(PixelBuffer::from_image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Color;
    use image::Rgba;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> PixelBuffer {
        PixelBuffer::from_image(RgbaImage::from_pixel(width, height, Rgba(color))).unwrap()
    }

    #[test]
    fn kernel_shape() {
        assert_eq!(lanczos3(0.0), 1.0);
        assert!(lanczos3(1.0).abs() < 1e-12);
        assert!(lanczos3(0.5) > 0.0);
        assert!(lanczos3(1.5) < 0.0);
        assert_eq!(lanczos3(3.0), 0.0);
    }

    #[test]
    fn weights_are_normalized() {
        for (src, dst) in [(200, 50), (10, 37), (7, 7), (1, 5)] {
            for tap in taps(src, dst) {
                let total: f32 = tap.weights.iter().sum();
                assert!((total - 1.0).abs() < 1e-5, "{src}->{dst}: {total}");
                assert!(tap.first + tap.weights.len() <= src as usize);
            }
        }
    }

    #[test]
    fn downscale_preserves_solid_color() {
        let out = resample(&solid(200, 200, [40, 90, 200, 255]), 50, 50).unwrap();
        assert_eq!((out.width(), out.height()), (50, 50));
        for y in 0..50 {
            for x in 0..50 {
                assert_eq!(out.pixel(x, y), Color::rgba(40, 90, 200, 255));
            }
        }
    }

    #[test]
    fn upscale_preserves_solid_color() {
        let out = resample(&solid(3, 2, [1, 2, 3, 4]), 17, 9).unwrap();
        assert!(out.as_raw().chunks_exact(4).all(|px| px == [1, 2, 3, 4]));
    }

    #[test]
    fn same_size_is_a_copy() {
        let mut image = RgbaImage::new(4, 4);
        image.put_pixel(1, 2, Rgba([9, 8, 7, 6]));
        let buffer = PixelBuffer::from_image(image).unwrap();
        assert_eq!(resample(&buffer, 4, 4), Some(buffer));
    }

    #[test]
    fn zero_target_is_rejected() {
        let buffer = solid(4, 4, [0; 4]);
        assert!(resample(&buffer, 0, 4).is_none());
        assert!(resample(&buffer, 4, 0).is_none());
    }

    #[test]
    fn overshoot_is_clamped() {
        // Hard edge makes the negative lobes ring; values must stay in range.
        let mut image = RgbaImage::from_pixel(8, 1, Rgba([0, 0, 0, 255]));
        for x in 4..8 {
            image.put_pixel(x, 0, Rgba([255, 255, 255, 255]));
        }
        let out = resample(&PixelBuffer::from_image(image).unwrap(), 21, 1).unwrap();
        assert_eq!(out.pixel(0, 0), Color::rgba(0, 0, 0, 255));
        assert_eq!(out.pixel(20, 0), Color::rgba(255, 255, 255, 255));
    }
}
