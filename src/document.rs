use kurbo::{BezPath, Cap, Join};

/// The visible coordinate extent of a document, in document units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    /// Used when a document declares neither a `viewBox` nor a usable size.
    pub const FALLBACK: Viewport = Viewport {
        x: 0.0,
        y: 0.0,
        width: 512.0,
        height: 512.0,
    };

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }
}

/// An 8-bit straight-alpha color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// A solid paint: a color and an extra opacity multiplier in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    pub color: Color,
    pub opacity: f32,
}

impl Paint {
    pub fn new(color: Color, opacity: f32) -> Self {
        Self {
            color,
            opacity: opacity.clamp(0.0, 1.0),
        }
    }

    /// Effective alpha in `[0, 1]`.
    pub fn alpha(&self) -> f32 {
        f32::from(self.color.a) / 255.0 * self.opacity
    }

    pub fn is_visible(&self) -> bool {
        self.alpha() > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

impl FillRule {
    pub fn is_inside(self, winding: i32) -> bool {
        match self {
            FillRule::NonZero => winding != 0,
            FillRule::EvenOdd => winding % 2 != 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    pub paint: Paint,
    pub width: f64,
    pub join: Join,
    pub cap: Cap,
    pub miter_limit: f64,
}

/// A drawable unit: geometry in document units plus its paint.
///
/// Element and group transforms are already applied to `path`.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub path: BezPath,
    pub fill: Option<Paint>,
    pub fill_rule: FillRule,
    pub stroke: Option<StrokeStyle>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorDocument {
    pub viewport: Viewport,
    pub shapes: Vec<Shape>,
    /// Whether any length was given in `in`, `cm`, `mm`, `pt` or `pc`.
    pub physical_units: bool,
}

impl VectorDocument {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            shapes: Vec::new(),
            physical_units: false,
        }
    }
}
