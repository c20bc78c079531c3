use crate::{
    document::Viewport,
    error::{ConversionError, Stage},
};
use kurbo::{Affine, Point};

/// Pixels per inch that physical units resolve against.
pub const REFERENCE_DPI: f64 = 96.0;

/// Scale-and-translate mapping from document units to pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub sx: f64,
    pub sy: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Transform {
    /// Maps `viewport` onto a `width` x `height` pixel grid.
    ///
    /// Documents measured in physical units are additionally scaled by
    /// `dpi / 96`, anchored at the viewport origin.
    pub fn fit(
        viewport: &Viewport,
        width: u32,
        height: u32,
        dpi: u32,
        physical_units: bool,
    ) -> Result<Self, ConversionError> {
        if width == 0 || height == 0 {
            return Err(ConversionError::invalid_dimensions(
                Stage::Transform,
                format!("target size {width}x{height} is empty"),
            ));
        }
        if !viewport.is_valid() {
            return Err(ConversionError::invalid_dimensions(
                Stage::Transform,
                format!(
                    "viewport {}x{} is degenerate",
                    viewport.width, viewport.height
                ),
            ));
        }

        let k = if physical_units {
            f64::from(dpi) / REFERENCE_DPI
        } else {
            1.0
        };
        let sx = f64::from(width) / viewport.width * k;
        let sy = f64::from(height) / viewport.height * k;

        if !(sx.is_finite() && sy.is_finite()) || sx <= 0.0 || sy <= 0.0 {
            return Err(ConversionError::invalid_dimensions(
                Stage::Transform,
                format!("scale {sx}x{sy} is not usable"),
            ));
        }

        Ok(Self {
            sx,
            sy,
            tx: -viewport.x * sx,
            ty: -viewport.y * sy,
        })
    }

    pub fn to_affine(&self) -> Affine {
        Affine::new([self.sx, 0.0, 0.0, self.sy, self.tx, self.ty])
    }

    pub fn apply(&self, point: Point) -> Point {
        Point::new(point.x * self.sx + self.tx, point.y * self.sy + self.ty)
    }

    /// Largest axis scale; document-space tolerances are divided by this.
    pub fn max_scale(&self) -> f64 {
        self.sx.abs().max(self.sy.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_viewport_corners_to_pixel_corners() {
        let viewport = Viewport::new(10.0, 20.0, 50.0, 25.0);
        let t = Transform::fit(&viewport, 100, 100, 72, false).unwrap();
        assert_eq!(t.apply(Point::new(10.0, 20.0)), Point::new(0.0, 0.0));
        assert_eq!(t.apply(Point::new(60.0, 45.0)), Point::new(100.0, 100.0));
        assert_eq!(t.to_affine() * Point::new(60.0, 45.0), Point::new(100.0, 100.0));
        assert_eq!(t.max_scale(), 4.0);
    }

    #[test]
    fn dpi_only_applies_to_physical_units() {
        let viewport = Viewport::new(0.0, 0.0, 100.0, 100.0);
        let plain = Transform::fit(&viewport, 100, 100, 192, false).unwrap();
        assert_eq!(plain.sx, 1.0);

        let physical = Transform::fit(&viewport, 100, 100, 192, true).unwrap();
        assert_eq!(physical.sx, 2.0);
        assert_eq!(physical.apply(Point::ORIGIN), Point::ORIGIN);
    }

    #[test]
    fn rejects_empty_targets_and_viewports() {
        let viewport = Viewport::new(0.0, 0.0, 100.0, 100.0);
        let err = Transform::fit(&viewport, 0, 10, 72, false).unwrap_err();
        assert_eq!(err.stage(), Stage::Transform);
        assert!(err.is_input_error());

        let flat = Viewport::new(0.0, 0.0, 100.0, 0.0);
        assert!(Transform::fit(&flat, 10, 10, 72, false).is_err());

        // 0 dpi collapses a physical document to nothing
        assert!(Transform::fit(&viewport, 10, 10, 0, true).is_err());
    }
}
