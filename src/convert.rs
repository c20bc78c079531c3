//! The conversion pipeline: validate, parse, transform, rasterize, resample
//! and encode.

use crate::{
    encode::encode_png,
    error::{ConversionError, RasterError, Stage},
    parser,
    raster::rasterize,
    resample::resample,
    transform::Transform,
};
use log::{debug, error};
use serde::Deserialize;
use std::time::Instant;

pub const DEFAULT_WIDTH: u32 = 512;
pub const DEFAULT_HEIGHT: u32 = 512;
pub const DEFAULT_DPI: u32 = 72;

/// Upper bounds checked before anything is allocated.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct Limits {
    pub max_width: u32,
    pub max_height: u32,
    pub max_pixels: u64,
    pub max_dpi: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_width: 8192,
            max_height: 8192,
            max_pixels: 16_777_216,
            max_dpi: 2400,
        }
    }
}

fn default_supersample() -> u32 {
    1
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    #[serde(default)]
    pub limits: Limits,
    /// Render at this multiple of the target size and resample down.
    #[serde(default = "default_supersample")]
    pub supersample: u32,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            supersample: default_supersample(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionRequest {
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
}

impl Default for ConversionRequest {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            dpi: DEFAULT_DPI,
        }
    }
}

impl ConversionRequest {
    pub fn new(width: u32, height: u32, dpi: u32) -> Self {
        Self { width, height, dpi }
    }
}

/// Runs conversions with a fixed set of options.
///
/// Holds no per-request state, so one instance can be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    options: ConvertOptions,
}

impl Converter {
    pub fn new(options: ConvertOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Checks a request against the configured limits.
    pub fn validate(&self, request: &ConversionRequest) -> Result<(), ConversionError> {
        let limits = &self.options.limits;
        let ConversionRequest { width, height, dpi } = *request;
        let invalid =
            |reason: String| Err(ConversionError::invalid_dimensions(Stage::Validate, reason));

        if width == 0 || height == 0 {
            return invalid(format!("{width}x{height} has an empty side"));
        }
        if width > limits.max_width || height > limits.max_height {
            return invalid(format!(
                "{width}x{height} exceeds the maximum of {}x{}",
                limits.max_width, limits.max_height
            ));
        }
        if u64::from(width) * u64::from(height) > limits.max_pixels {
            return invalid(format!(
                "{width}x{height} exceeds the maximum of {} pixels",
                limits.max_pixels
            ));
        }
        if dpi == 0 || dpi > limits.max_dpi {
            return invalid(format!("dpi {dpi} is outside 1..={}", limits.max_dpi));
        }
        Ok(())
    }

    /// The size to rasterize at: the supersampled size when it fits the
    /// limits, otherwise the target size.
    fn render_size(&self, request: &ConversionRequest) -> (u32, u32) {
        let factor = self.options.supersample.max(1);
        if factor == 1 {
            return (request.width, request.height);
        }

        let limits = &self.options.limits;
        let scaled = request
            .width
            .checked_mul(factor)
            .zip(request.height.checked_mul(factor))
            .filter(|&(w, h)| {
                w <= limits.max_width
                    && h <= limits.max_height
                    && u64::from(w) * u64::from(h) <= limits.max_pixels
            });

        match scaled {
            Some(size) => size,
            None => {
                debug!(
                    "Supersampling x{factor} would exceed limits for {}x{}, rendering at target size",
                    request.width, request.height
                );
                (request.width, request.height)
            }
        }
    }

    /// Converts SVG `source` to PNG bytes at the requested size.
    pub fn convert(
        &self,
        source: &[u8],
        request: &ConversionRequest,
    ) -> Result<Vec<u8>, ConversionError> {
        self.validate(request)?;

        let digest = blake3::hash(source);
        debug!(
            "Converting {} bytes ({}) to {}x{} @ {} dpi",
            source.len(),
            digest.to_hex(),
            request.width,
            request.height,
            request.dpi
        );

        let start = Instant::now();
        let document = parser::parse(source)?;
        debug!(
            "Parsed {} shapes in {:?}",
            document.shapes.len(),
            start.elapsed()
        );

        let (render_width, render_height) = self.render_size(request);
        let transform = Transform::fit(
            &document.viewport,
            render_width,
            render_height,
            request.dpi,
            document.physical_units,
        )?;

        let start = Instant::now();
        let rendered =
            rasterize(&document, &transform, render_width, render_height).map_err(|err| {
                error!("Rasterizing {} failed: {err}", digest.to_hex());
                ConversionError::from(err)
            })?;
        debug!(
            "Rasterized at {render_width}x{render_height} in {:?}",
            start.elapsed()
        );

        let buffer = if (render_width, render_height) == (request.width, request.height) {
            rendered
        } else {
            let start = Instant::now();
            let resampled = resample(&rendered, request.width, request.height).ok_or_else(|| {
                let err = RasterError::Resample {
                    width: request.width,
                    height: request.height,
                };
                error!("Resampling {} failed: {err}", digest.to_hex());
                ConversionError::from(err)
            })?;
            debug!(
                "Resampled to {}x{} in {:?}",
                request.width,
                request.height,
                start.elapsed()
            );
            resampled
        };

        let png = encode_png(&buffer).map_err(|err| {
            error!("Encoding {} failed: {err}", digest.to_hex());
            ConversionError::EncodingFailure(err)
        })?;
        debug!("Encoded {} PNG bytes", png.len());

        Ok(png)
    }
}

/// Converts with default options.
pub fn convert(
    source: &[u8],
    width: u32,
    height: u32,
    dpi: u32,
) -> Result<Vec<u8>, ConversionError> {
    Converter::default().convert(source, &ConversionRequest::new(width, height, dpi))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &[u8] =
        br##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 10"><rect width="10" height="10" fill="#336699"/></svg>"##;

    fn decode(png: &[u8]) -> image::RgbaImage {
        image::load_from_memory(png).unwrap().to_rgba8()
    }

    #[test]
    fn renders_at_requested_size() {
        let png = convert(SQUARE, 40, 30, 72).unwrap();
        let image = decode(&png);
        assert_eq!(image.dimensions(), (40, 30));
        assert!(image.pixels().all(|p| p.0 == [0x33, 0x66, 0x99, 0xff]));
    }

    #[test]
    fn limits_are_checked_before_parsing() {
        let converter = Converter::default();
        for request in [
            ConversionRequest::new(0, 10, 72),
            ConversionRequest::new(10, 0, 72),
            ConversionRequest::new(8193, 10, 72),
            ConversionRequest::new(8192, 8192, 72),
            ConversionRequest::new(10, 10, 0),
            ConversionRequest::new(10, 10, 2401),
        ] {
            let err = converter.convert(b"not even xml", &request).unwrap_err();
            assert_eq!(err.stage(), Stage::Validate, "{request:?}");
            assert_eq!(err.status_code(), 400);
        }
    }

    #[test]
    fn max_pixels_is_inclusive() {
        let converter = Converter::new(ConvertOptions {
            limits: Limits {
                max_pixels: 100,
                ..Limits::default()
            },
            ..ConvertOptions::default()
        });
        assert!(converter.validate(&ConversionRequest::new(10, 10, 72)).is_ok());
        assert!(converter.validate(&ConversionRequest::new(10, 11, 72)).is_err());
    }

    #[test]
    fn supersampling_resamples_to_target() {
        let converter = Converter::new(ConvertOptions {
            supersample: 4,
            ..ConvertOptions::default()
        });
        assert_eq!(
            converter.render_size(&ConversionRequest::new(20, 10, 72)),
            (80, 40)
        );

        let png = converter
            .convert(SQUARE, &ConversionRequest::new(20, 10, 72))
            .unwrap();
        let image = decode(&png);
        assert_eq!(image.dimensions(), (20, 10));
        assert!(image.pixels().all(|p| p.0 == [0x33, 0x66, 0x99, 0xff]));
    }

    #[test]
    fn supersampling_falls_back_within_limits() {
        let converter = Converter::new(ConvertOptions {
            supersample: 4,
            ..ConvertOptions::default()
        });
        let request = ConversionRequest::new(4096, 4096, 72);
        assert_eq!(converter.render_size(&request), (4096, 4096));
    }

    #[test]
    fn parse_failures_are_input_errors() {
        let err = convert(b"<svg><path d=\"M0 0 X\"/></svg>", 10, 10, 72).unwrap_err();
        assert!(matches!(err, ConversionError::MalformedDocument(_)));
        assert_eq!(err.stage(), Stage::Parse);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: ConvertOptions = toml::from_str("[limits]\nmax_dpi = 600\n").unwrap();
        assert_eq!(options.supersample, 1);
        assert_eq!(options.limits.max_dpi, 600);
        assert_eq!(options.limits.max_width, 8192);
    }
}
