//! Scan conversion of a [`VectorDocument`] into a [`PixelBuffer`].
//!
//! Paths are flattened to line segments and filled with an active-edge list
//! sampled at [`SUBSAMPLES`] sub-scanlines per pixel row. Each inside span
//! contributes its exact horizontal overlap to the pixels it crosses, so
//! anti-aliasing is analytic horizontally and sampled vertically.

use crate::{
    buffer::PixelBuffer,
    document::{FillRule, Paint, VectorDocument},
    error::RasterError,
    transform::Transform,
};
use kurbo::{BezPath, PathEl, Point, Rect, Shape as _, Stroke, StrokeOpts};
use log::{debug, trace};

/// Maximum distance in pixels between a curve and its flattened polyline.
pub const TOLERANCE: f64 = 0.25;

/// Sub-scanlines per pixel row.
pub const SUBSAMPLES: usize = 16;

const SUBSAMPLE_WEIGHT: f32 = 1.0 / SUBSAMPLES as f32;

/// Geometry (and stroke widths) beyond this many pixels from the origin is
/// refused; flattening it would take an unbounded number of segments.
const MAX_COORDINATE: f64 = (1 << 24) as f64;

/// Renders `document` into a fresh `width` x `height` buffer.
///
/// Shapes are painted in order, each shape's fill before its stroke.
pub fn rasterize(
    document: &VectorDocument,
    transform: &Transform,
    width: u32,
    height: u32,
) -> Result<PixelBuffer, RasterError> {
    let buffer =
        PixelBuffer::new(width, height).ok_or(RasterError::BufferSize { width, height })?;
    let mut canvas = Canvas::new(buffer);
    let mut scanner = Scanner::new(width as usize);

    let affine = transform.to_affine();
    let stroke_tolerance = TOLERANCE / transform.max_scale();
    let mut skipped = 0;

    for (index, shape) in document.shapes.iter().enumerate() {
        if !is_finite(&shape.path) {
            return Err(RasterError::NonFiniteCoordinate { shape: index });
        }

        let path = affine * &shape.path;
        if !in_range(path.bounding_box()) {
            return Err(RasterError::OutOfRange { shape: index });
        }

        if let Some(paint) = &shape.fill {
            if !scanner.fill(&mut canvas, &path, shape.fill_rule, paint, index)? {
                skipped += 1;
            }
        }

        if let Some(stroke) = &shape.stroke {
            if stroke.width * transform.max_scale() > MAX_COORDINATE {
                return Err(RasterError::OutOfRange { shape: index });
            }
            let style = Stroke::new(stroke.width)
                .with_join(stroke.join)
                .with_caps(stroke.cap)
                .with_miter_limit(stroke.miter_limit);
            let outline = kurbo::stroke(
                shape.path.iter(),
                &style,
                &StrokeOpts::default(),
                stroke_tolerance,
            );
            let path = affine * &outline;
            if !scanner.fill(&mut canvas, &path, FillRule::NonZero, &stroke.paint, index)? {
                skipped += 1;
            }
        }
    }

    debug!(
        "Rasterized {} shapes into {width}x{height} ({skipped} paints outside the target)",
        document.shapes.len()
    );

    Ok(canvas.finish())
}

fn is_finite(path: &BezPath) -> bool {
    path.elements().iter().all(|el| match *el {
        PathEl::MoveTo(p) | PathEl::LineTo(p) => p.is_finite(),
        PathEl::QuadTo(a, b) => a.is_finite() && b.is_finite(),
        PathEl::CurveTo(a, b, c) => a.is_finite() && b.is_finite() && c.is_finite(),
        PathEl::ClosePath => true,
    })
}

fn in_range(bounds: Rect) -> bool {
    [bounds.x0, bounds.y0, bounds.x1, bounds.y1]
        .iter()
        .all(|v| v.abs() <= MAX_COORDINATE)
}

/// A line segment oriented top to bottom.
#[derive(Debug, Clone, Copy)]
struct Edge {
    x0: f64,
    y0: f64,
    y1: f64,
    /// dx/dy
    slope: f64,
    /// +1 if the segment originally pointed down, -1 if up.
    winding: i32,
}

impl Edge {
    fn new(from: Point, to: Point) -> Option<Self> {
        if from.y == to.y {
            return None;
        }
        let (top, bottom, winding) = if from.y < to.y {
            (from, to, 1)
        } else {
            (to, from, -1)
        };
        Some(Self {
            x0: top.x,
            y0: top.y,
            y1: bottom.y,
            slope: (bottom.x - top.x) / (bottom.y - top.y),
            winding,
        })
    }

    fn x_at(&self, y: f64) -> f64 {
        self.x0 + (y - self.y0) * self.slope
    }
}

/// Flattens `path` into edges, closing every subpath.
fn build_edges(path: &BezPath, edges: &mut Vec<Edge>) -> bool {
    let mut start = Point::ORIGIN;
    let mut current = Point::ORIGIN;
    let mut finite = true;

    let mut segment = |edges: &mut Vec<Edge>, from: Point, to: Point| {
        finite &= to.is_finite();
        edges.extend(Edge::new(from, to));
    };

    kurbo::flatten(path.iter(), TOLERANCE, |el| match el {
        PathEl::MoveTo(p) => {
            segment(edges, current, start);
            start = p;
            current = p;
        }
        PathEl::LineTo(p) => {
            segment(edges, current, p);
            current = p;
        }
        PathEl::ClosePath => {
            segment(edges, current, start);
            current = start;
        }
        // flatten only emits lines
        PathEl::QuadTo(..) | PathEl::CurveTo(..) => {}
    });
    segment(edges, current, start);

    finite
}

/// Scratch state reused across shapes.
struct Scanner {
    width: usize,
    edges: Vec<Edge>,
    active: Vec<usize>,
    crossings: Vec<(f64, i32)>,
    /// Partial coverage of pixels that spans start or end in.
    area: Vec<f32>,
    /// Difference array for fully covered pixel runs; one longer than a row.
    cover: Vec<f32>,
}

impl Scanner {
    fn new(width: usize) -> Self {
        Self {
            width,
            edges: Vec::new(),
            active: Vec::new(),
            crossings: Vec::new(),
            area: vec![0.0; width],
            cover: vec![0.0; width + 1],
        }
    }

    /// Fills `path` (already in pixel space). Returns `false` when nothing
    /// could be drawn because the path misses the canvas or has no area.
    fn fill(
        &mut self,
        canvas: &mut Canvas,
        path: &BezPath,
        rule: FillRule,
        paint: &Paint,
        shape: usize,
    ) -> Result<bool, RasterError> {
        let bounds = path.bounding_box();
        if !(bounds.origin().is_finite() && bounds.size().is_finite()) {
            return Err(RasterError::NonFiniteCoordinate { shape });
        }

        let target = Rect::new(0.0, 0.0, canvas.width as f64, canvas.height as f64);
        if bounds.x1 <= target.x0
            || bounds.x0 >= target.x1
            || bounds.y1 <= target.y0
            || bounds.y0 >= target.y1
            || bounds.area() == 0.0
        {
            trace!("Shape {shape} has no visible area");
            return Ok(false);
        }

        self.edges.clear();
        if !build_edges(path, &mut self.edges) {
            return Err(RasterError::NonFiniteCoordinate { shape });
        }
        if self.edges.is_empty() {
            return Ok(false);
        }
        self.edges.sort_by(|a, b| a.y0.total_cmp(&b.y0));
        self.active.clear();

        let alpha = paint.alpha();
        let first_row = bounds.y0.max(0.0).floor() as usize;
        let last_row = (bounds.y1.ceil().min(target.y1) as usize).max(first_row);
        let mut next = 0;

        for row in first_row..last_row {
            let mut touched: Option<(usize, usize)> = None;

            for sub in 0..SUBSAMPLES {
                let y = row as f64 + (sub as f64 + 0.5) / SUBSAMPLES as f64;

                while next < self.edges.len() && self.edges[next].y0 <= y {
                    self.active.push(next);
                    next += 1;
                }
                let edges = &self.edges;
                self.active.retain(|&i| edges[i].y1 > y);

                self.crossings.clear();
                self.crossings
                    .extend(self.active.iter().map(|&i| (edges[i].x_at(y), edges[i].winding)));
                self.crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut winding = 0;
                let mut span_start = 0.0;
                for i in 0..self.crossings.len() {
                    let (x, dir) = self.crossings[i];
                    let was_inside = rule.is_inside(winding);
                    winding += dir;
                    let inside = rule.is_inside(winding);
                    if !was_inside && inside {
                        span_start = x;
                    } else if was_inside && !inside {
                        if let Some((lo, hi)) = self.add_span(span_start, x) {
                            touched = Some(match touched {
                                Some((a, b)) => (a.min(lo), b.max(hi)),
                                None => (lo, hi),
                            });
                        }
                    }
                }
            }

            if let Some((lo, hi)) = touched {
                self.flush_row(canvas, row, lo, hi, paint, alpha);
            }
        }

        Ok(true)
    }

    /// Adds one sub-scanline span. Returns the range of pixels it touched.
    fn add_span(&mut self, a: f64, b: f64) -> Option<(usize, usize)> {
        let width = self.width as f64;
        let a = a.clamp(0.0, width);
        let b = b.clamp(0.0, width);
        if b <= a {
            return None;
        }

        let first = a.floor() as usize;
        let last = b.floor() as usize;

        if first == last {
            self.area[first] += (b - a) as f32 * SUBSAMPLE_WEIGHT;
            return Some((first, first));
        }

        self.area[first] += (first as f64 + 1.0 - a) as f32 * SUBSAMPLE_WEIGHT;
        self.cover[first + 1] += SUBSAMPLE_WEIGHT;
        self.cover[last] -= SUBSAMPLE_WEIGHT;
        if last < self.width {
            self.area[last] += (b - last as f64) as f32 * SUBSAMPLE_WEIGHT;
            Some((first, last))
        } else {
            Some((first, last - 1))
        }
    }

    /// Composites the accumulated coverage for `row` and resets it.
    fn flush_row(
        &mut self,
        canvas: &mut Canvas,
        row: usize,
        lo: usize,
        hi: usize,
        paint: &Paint,
        alpha: f32,
    ) {
        let mut run = 0.0;
        for x in lo..=hi {
            run += self.cover[x];
            let coverage = (run + self.area[x]).clamp(0.0, 1.0);
            if coverage > 0.0 {
                canvas.blend(x, row, paint, coverage * alpha);
            }
            self.area[x] = 0.0;
            self.cover[x] = 0.0;
        }
        self.cover[hi + 1] = 0.0;
    }
}

/// Premultiplied f32 working surface.
struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<[f32; 4]>,
    buffer: PixelBuffer,
}

impl Canvas {
    fn new(buffer: PixelBuffer) -> Self {
        let width = buffer.width() as usize;
        let height = buffer.height() as usize;
        Self {
            width,
            height,
            pixels: vec![[0.0; 4]; width * height],
            buffer,
        }
    }

    /// Source-over with effective source alpha `a`.
    fn blend(&mut self, x: usize, y: usize, paint: &Paint, a: f32) {
        let color = paint.color;
        let src = [
            f32::from(color.r) / 255.0 * a,
            f32::from(color.g) / 255.0 * a,
            f32::from(color.b) / 255.0 * a,
            a,
        ];
        let dst = &mut self.pixels[y * self.width + x];
        for (d, s) in dst.iter_mut().zip(src) {
            *d = s + *d * (1.0 - a);
        }
    }

    fn finish(mut self) -> PixelBuffer {
        let raw = self.buffer.as_raw_mut();
        for (px, out) in self.pixels.iter().zip(raw.chunks_exact_mut(4)) {
            let [r, g, b, a] = *px;
            if a <= 0.0 {
                out.copy_from_slice(&[0, 0, 0, 0]);
                continue;
            }
            let a = a.min(1.0);
            let unpremultiply = |c: f32| ((c / a).clamp(0.0, 1.0) * 255.0).round() as u8;
            out.copy_from_slice(&[
                unpremultiply(r),
                unpremultiply(g),
                unpremultiply(b),
                (a * 255.0).round() as u8,
            ]);
        }
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Color, Shape, StrokeStyle, Viewport};
    use kurbo::{Cap, Join, Shape as _};

    fn document(size: f64, shapes: Vec<Shape>) -> VectorDocument {
        VectorDocument {
            shapes,
            ..VectorDocument::new(Viewport::new(0.0, 0.0, size, size))
        }
    }

    fn filled(path: BezPath, color: Color) -> Shape {
        Shape {
            path,
            fill: Some(Paint::new(color, 1.0)),
            fill_rule: FillRule::NonZero,
            stroke: None,
        }
    }

    fn render(doc: &VectorDocument, size: u32) -> PixelBuffer {
        let t = Transform::fit(&doc.viewport, size, size, 72, false).unwrap();
        rasterize(doc, &t, size, size).unwrap()
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> BezPath {
        Rect::new(x0, y0, x1, y1).to_path(0.1)
    }

    #[test]
    fn opaque_rect_covers_exactly() {
        let color = Color::rgb(12, 200, 77);
        let doc = document(10.0, vec![filled(rect(2.0, 2.0, 6.0, 5.0), color)]);
        let out = render(&doc, 10);

        for y in 0..10 {
            for x in 0..10 {
                let inside = (2..6).contains(&x) && (2..5).contains(&y);
                let expected = if inside { color } else { Color::TRANSPARENT };
                assert_eq!(out.pixel(x, y), expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn half_pixel_edge_is_half_covered() {
        let doc = document(4.0, vec![filled(rect(0.0, 0.0, 1.5, 4.0), Color::BLACK)]);
        let out = render(&doc, 4);
        assert_eq!(out.pixel(0, 1).a, 255);
        assert_eq!(out.pixel(1, 1).a, 128);
        assert_eq!(out.pixel(2, 1).a, 0);
    }

    #[test]
    fn diagonal_edge_is_antialiased() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((20.0, 0.0));
        path.line_to((20.0, 20.0));
        let doc = document(20.0, vec![filled(path, Color::BLACK)]);
        let out = render(&doc, 20);

        let a = out.pixel(10, 10).a;
        assert!(a > 0 && a < 255, "alpha {a}");
        assert_eq!(out.pixel(15, 5).a, 255);
        assert_eq!(out.pixel(5, 15).a, 0);
    }

    #[test]
    fn fill_rules_differ_on_overlap() {
        let mut path = rect(0.0, 0.0, 10.0, 10.0);
        path.extend(rect(2.0, 2.0, 8.0, 8.0).iter());

        let mut shape = filled(path, Color::BLACK);
        let doc = document(10.0, vec![shape.clone()]);
        assert_eq!(render(&doc, 10).pixel(5, 5).a, 255);

        shape.fill_rule = FillRule::EvenOdd;
        let doc = document(10.0, vec![shape]);
        let out = render(&doc, 10);
        assert_eq!(out.pixel(5, 5).a, 0);
        assert_eq!(out.pixel(1, 5).a, 255);
    }

    #[test]
    fn later_shapes_composite_over_earlier() {
        let red = filled(rect(0.0, 0.0, 4.0, 4.0), Color::rgb(255, 0, 0));
        let mut blue = filled(rect(0.0, 0.0, 4.0, 4.0), Color::rgb(0, 0, 255));
        blue.fill = Some(Paint::new(Color::rgb(0, 0, 255), 0.5));
        let out = render(&document(4.0, vec![red, blue]), 4);
        assert_eq!(out.pixel(1, 1), Color::rgba(128, 0, 128, 255));
    }

    #[test]
    fn translucent_paint_keeps_straight_color() {
        let mut shape = filled(rect(0.0, 0.0, 4.0, 4.0), Color::rgb(10, 20, 30));
        shape.fill = Some(Paint::new(Color::rgb(10, 20, 30), 0.5));
        let out = render(&document(4.0, vec![shape]), 4);
        assert_eq!(out.pixel(2, 2), Color::rgba(10, 20, 30, 128));
    }

    #[test]
    fn stroke_is_painted_over_fill() {
        let mut path = BezPath::new();
        path.move_to((0.0, 5.0));
        path.line_to((10.0, 5.0));
        let shape = Shape {
            path,
            fill: None,
            fill_rule: FillRule::NonZero,
            stroke: Some(StrokeStyle {
                paint: Paint::new(Color::rgb(0, 255, 0), 1.0),
                width: 2.0,
                join: Join::Miter,
                cap: Cap::Butt,
                miter_limit: 4.0,
            }),
        };
        let out = render(&document(10.0, vec![shape]), 10);
        assert_eq!(out.pixel(5, 4), Color::rgb(0, 255, 0));
        assert_eq!(out.pixel(5, 5), Color::rgb(0, 255, 0));
        assert_eq!(out.pixel(5, 6), Color::TRANSPARENT);
        assert_eq!(out.pixel(5, 3), Color::TRANSPARENT);
    }

    #[test]
    fn shapes_outside_and_degenerate_draw_nothing() {
        let far = filled(rect(50.0, 50.0, 60.0, 60.0), Color::BLACK);
        let mut line = BezPath::new();
        line.move_to((0.0, 0.0));
        line.line_to((10.0, 10.0));
        let flat = filled(line, Color::BLACK);
        let out = render(&document(10.0, vec![far, flat]), 10);
        assert!(out.as_raw().iter().all(|&v| v == 0));
    }

    #[test]
    fn partially_visible_shape_is_clipped() {
        let doc = document(10.0, vec![filled(rect(-5.0, -5.0, 5.0, 5.0), Color::BLACK)]);
        let out = render(&doc, 10);
        assert_eq!(out.pixel(0, 0).a, 255);
        assert_eq!(out.pixel(4, 4).a, 255);
        assert_eq!(out.pixel(5, 5).a, 0);
    }

    #[test]
    fn non_finite_coordinates_fail() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((f64::NAN, 3.0));
        path.line_to((3.0, 3.0));
        let doc = document(
            10.0,
            vec![
                filled(rect(0.0, 0.0, 1.0, 1.0), Color::BLACK),
                filled(path, Color::BLACK),
            ],
        );
        let t = Transform::fit(&doc.viewport, 10, 10, 72, false).unwrap();
        assert_eq!(
            rasterize(&doc, &t, 10, 10),
            Err(RasterError::NonFiniteCoordinate { shape: 1 })
        );
    }

    #[test]
    fn huge_geometry_is_refused() {
        let doc = document(10.0, vec![filled(rect(0.0, 0.0, 1e300, 5.0), Color::BLACK)]);
        let t = Transform::fit(&doc.viewport, 10, 10, 72, false).unwrap();
        assert_eq!(
            rasterize(&doc, &t, 10, 10),
            Err(RasterError::OutOfRange { shape: 0 })
        );
    }
}
