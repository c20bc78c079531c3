use std::fmt;
use thiserror::Error;

/// Pipeline stage a [`ConversionError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Fetch,
    Parse,
    Transform,
    Rasterize,
    Encode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::Fetch => "fetch",
            Stage::Parse => "parse",
            Stage::Transform => "transform",
            Stage::Rasterize => "rasterize",
            Stage::Encode => "encode",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("invalid dimensions: {reason}")]
    InvalidDimensions { stage: Stage, reason: String },

    #[error("malformed document: {0}")]
    MalformedDocument(#[from] ParseError),

    #[error("failed to fetch source {location}")]
    SourceFetchFailure {
        location: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("rasterization failed: {0}")]
    RasterizationFailure(#[from] RasterError),

    #[error("failed to encode PNG")]
    EncodingFailure(#[source] image::ImageError),
}

impl ConversionError {
    pub fn invalid_dimensions(stage: Stage, reason: impl Into<String>) -> Self {
        ConversionError::InvalidDimensions {
            stage,
            reason: reason.into(),
        }
    }

    pub fn source_fetch(location: impl Into<String>, source: anyhow::Error) -> Self {
        ConversionError::SourceFetchFailure {
            location: location.into(),
            source: source.into(),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            ConversionError::InvalidDimensions { stage, .. } => *stage,
            ConversionError::MalformedDocument(_) => Stage::Parse,
            ConversionError::SourceFetchFailure { .. } => Stage::Fetch,
            ConversionError::RasterizationFailure(_) => Stage::Rasterize,
            ConversionError::EncodingFailure(_) => Stage::Encode,
        }
    }

    /// Input errors are the caller's fault; everything else is ours.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ConversionError::InvalidDimensions { .. } | ConversionError::MalformedDocument(_)
        )
    }

    /// HTTP status a service layer should answer with.
    pub fn status_code(&self) -> u16 {
        if self.is_input_error() {
            400
        } else {
            500
        }
    }

    /// Message safe to show to a caller. Internal failures don't leak details.
    pub fn public_message(&self) -> String {
        match self {
            ConversionError::RasterizationFailure(_) | ConversionError::EncodingFailure(_) => {
                "internal error while rendering image".to_string()
            }
            _ => self.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("source is not valid UTF-8 (at byte {offset})")]
    Utf8 { offset: usize },

    #[error("invalid XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("elements are nested deeper than {limit} levels (at byte {offset})")]
    TooDeep { limit: usize, offset: usize },

    #[error("entity declared at byte {offset} expands to markup")]
    EntityMarkup { offset: usize },

    #[error("root element is <{0}>, expected <svg>")]
    NotSvg(String),

    #[error("invalid path data in <{element}> at byte {element_offset}: {error}")]
    PathData {
        element: String,
        element_offset: usize,
        error: PathError,
    },
}

/// A syntax error inside a `d` attribute. `offset` is relative to the attribute value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathError {
    #[error("unknown command '{command}' at offset {offset}")]
    UnknownCommand { command: char, offset: usize },

    #[error("path data must begin with a moveto, found '{command}' at offset {offset}")]
    MissingMoveTo { command: char, offset: usize },

    #[error("command '{command}' expects {expected} arguments, got {got} (offset {offset})")]
    ArgumentCount {
        command: char,
        expected: usize,
        got: usize,
        offset: usize,
    },

    #[error("invalid number at offset {offset}")]
    InvalidNumber { offset: usize },

    #[error("invalid arc flag at offset {offset}")]
    InvalidFlag { offset: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RasterError {
    #[error("non-finite coordinate in shape {shape}")]
    NonFiniteCoordinate { shape: usize },

    #[error("shape {shape} extends too far outside the canvas")]
    OutOfRange { shape: usize },

    #[error("cannot resample to {width}x{height}")]
    Resample { width: u32, height: u32 },

    #[error("buffer of {width}x{height} does not match the requested size")]
    BufferSize { width: u32, height: u32 },
}
