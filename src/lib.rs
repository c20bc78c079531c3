//! Renders SVG documents to PNG at a fixed pixel size and DPI.
//!
//! The pipeline is split into stages that can be used on their own:
//! [`parser::parse`] builds a [`VectorDocument`], [`Transform::fit`] maps it
//! onto the pixel grid, [`raster::rasterize`] scan-converts it,
//! [`resample::resample`] resizes the result and [`encode::encode_png`]
//! writes it out. [`convert`] and [`Converter`] run all of them.

pub mod buffer;
pub mod convert;
pub mod document;
pub mod encode;
pub mod error;
pub mod parser;
pub mod raster;
pub mod resample;
pub mod transform;

pub use buffer::PixelBuffer;
pub use convert::{convert, ConversionRequest, ConvertOptions, Converter, Limits};
pub use document::VectorDocument;
pub use error::{ConversionError, Stage};
pub use transform::Transform;
