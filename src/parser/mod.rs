//! Builds a [`VectorDocument`] from SVG source.
//!
//! Only static geometry is understood: groups, paths and the basic shapes.
//! Unknown elements are skipped with their subtree, and unknown or
//! unsupported attribute values fall back to the inherited value. Path data
//! is the one place where bad syntax is an error.

use crate::{
    document::{Color, FillRule, Paint, Shape, StrokeStyle, VectorDocument, Viewport},
    error::ParseError,
};
use attrs::PaintValue;
use kurbo::{Affine, BezPath, Cap, Circle, Ellipse, Join, Point, Shape as _, Vec2};
use log::debug;
use roxmltree::{Node, ParsingOptions};
use std::f64::consts::{FRAC_PI_2, PI};
use xmlparser::{ElementEnd, EntityDefinition, Token, Tokenizer};

pub mod attrs;
pub mod path;

pub use path::parse_path_data;

/// Elements whose subtrees are walked.
const CONTAINERS: &[&str] = &["svg", "g", "a"];

/// Deepest element nesting accepted, root included.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy)]
enum Axis {
    X,
    Y,
    Diagonal,
}

/// Presentation state inherited from ancestors.
#[derive(Debug, Clone)]
struct Style {
    fill: PaintValue,
    stroke: PaintValue,
    color: Color,
    fill_opacity: f32,
    stroke_opacity: f32,
    /// Product of `opacity` along the ancestor chain.
    opacity: f32,
    stroke_width: f64,
    fill_rule: FillRule,
    join: Join,
    cap: Cap,
    miter_limit: f64,
    visible: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: PaintValue::Color(Color::BLACK),
            stroke: PaintValue::None,
            color: Color::BLACK,
            fill_opacity: 1.0,
            stroke_opacity: 1.0,
            opacity: 1.0,
            stroke_width: 1.0,
            fill_rule: FillRule::NonZero,
            join: Join::Miter,
            cap: Cap::Butt,
            miter_limit: 4.0,
            visible: true,
        }
    }
}

impl Style {
    fn resolve(&self, value: PaintValue, opacity: f32) -> Option<Paint> {
        let color = match value {
            PaintValue::None => return None,
            PaintValue::CurrentColor => self.color,
            PaintValue::Color(color) => color,
        };
        Some(Paint::new(color, opacity * self.opacity)).filter(Paint::is_visible)
    }
}

struct Parser {
    viewport: Viewport,
    physical_units: bool,
    shapes: Vec<Shape>,
}

/// Parses SVG source bytes into a [`VectorDocument`].
pub fn parse(source: &[u8]) -> Result<VectorDocument, ParseError> {
    let text = std::str::from_utf8(source).map_err(|err| ParseError::Utf8 {
        offset: err.valid_up_to(),
    })?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    check_nesting(text)?;

    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let xml = roxmltree::Document::parse_with_options(text, options)?;

    let root = xml.root_element();
    let name = root.tag_name().name();
    if name != "svg" {
        return Err(ParseError::NotSvg(name.to_string()));
    }

    let mut parser = Parser {
        viewport: Viewport::FALLBACK,
        physical_units: false,
        shapes: Vec::new(),
    };
    parser.viewport = parser.root_viewport(root);

    let style = parser.inherit(root, &Style::default());
    if style.visible {
        parser.walk(root, &style, Affine::IDENTITY, 1)?;
    }

    debug!(
        "Parsed {} shapes, viewport {:?}, physical units: {}",
        parser.shapes.len(),
        parser.viewport,
        parser.physical_units
    );

    Ok(VectorDocument {
        viewport: parser.viewport,
        shapes: parser.shapes,
        physical_units: parser.physical_units,
    })
}

/// Rejects documents nested deeper than [`MAX_DEPTH`] before a tree is built.
///
/// Entities that expand to markup are refused outright, since their nesting
/// only shows after expansion. Syntax errors stop the scan and are left for
/// the tree builder to report.
fn check_nesting(text: &str) -> Result<(), ParseError> {
    let mut depth = 0usize;
    for token in Tokenizer::from(text) {
        match token {
            Ok(Token::ElementStart { span, .. }) => {
                depth += 1;
                if depth > MAX_DEPTH {
                    return Err(ParseError::TooDeep {
                        limit: MAX_DEPTH,
                        offset: span.start(),
                    });
                }
            }
            Ok(Token::ElementEnd {
                end: ElementEnd::Close(..) | ElementEnd::Empty,
                ..
            }) => depth = depth.saturating_sub(1),
            Ok(Token::EntityDeclaration {
                definition: EntityDefinition::EntityValue(value),
                span,
                ..
            }) if value.as_str().contains('<') => {
                return Err(ParseError::EntityMarkup {
                    offset: span.start(),
                });
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    Ok(())
}

impl Parser {
    fn root_viewport(&mut self, root: Node<'_, '_>) -> Viewport {
        if let Some(view_box) = root
            .attribute("viewBox")
            .and_then(attrs::parse_number_list)
        {
            if let &[x, y, width, height] = view_box.as_slice() {
                let viewport = Viewport::new(x, y, width, height);
                if viewport.is_valid() {
                    // Still record physical units declared on the root size.
                    self.root_size(root);
                    return viewport;
                }
            }
            debug!("Ignoring invalid viewBox {view_box:?}");
        }

        match self.root_size(root) {
            (Some(width), Some(height)) if width > 0.0 && height > 0.0 => {
                Viewport::new(0.0, 0.0, width, height)
            }
            _ => Viewport::FALLBACK,
        }
    }

    fn root_size(&mut self, root: Node<'_, '_>) -> (Option<f64>, Option<f64>) {
        let size = |attr: &str, parser: &mut Parser| {
            let length = root.attribute(attr).and_then(attrs::parse_length)?;
            if length.unit == attrs::Unit::Percent {
                return None;
            }
            parser.physical_units |= length.unit.is_physical();
            Some(length.to_user(0.0))
        };
        (size("width", self), size("height", self))
    }

    fn reference(&self, axis: Axis) -> f64 {
        let Viewport { width, height, .. } = self.viewport;
        match axis {
            Axis::X => width,
            Axis::Y => height,
            Axis::Diagonal => (width * width + height * height).sqrt() / std::f64::consts::SQRT_2,
        }
    }

    fn length(&mut self, node: Node<'_, '_>, attr: &str, axis: Axis) -> Option<f64> {
        let value = node.attribute(attr)?;
        let Some(length) = attrs::parse_length(value) else {
            debug!("Invalid length {attr}=\"{value}\" on <{}>", node.tag_name().name());
            return None;
        };
        Some(length.to_user(self.reference(axis)))
    }

    fn length_or_zero(&mut self, node: Node<'_, '_>, attr: &str, axis: Axis) -> Option<f64> {
        match node.attribute(attr) {
            Some(_) => self.length(node, attr, axis),
            None => Some(0.0),
        }
    }

    fn inherit(&mut self, node: Node<'_, '_>, parent: &Style) -> Style {
        let mut style = parent.clone();

        if let Some(color) = node.attribute("color").and_then(attrs::parse_color) {
            style.color = color;
        }
        if let Some(fill) = node.attribute("fill").and_then(attrs::parse_paint) {
            style.fill = fill;
        }
        if let Some(stroke) = node.attribute("stroke").and_then(attrs::parse_paint) {
            style.stroke = stroke;
        }
        if let Some(v) = node.attribute("fill-opacity").and_then(attrs::parse_opacity) {
            style.fill_opacity = v;
        }
        if let Some(v) = node.attribute("stroke-opacity").and_then(attrs::parse_opacity) {
            style.stroke_opacity = v;
        }
        if let Some(v) = node.attribute("opacity").and_then(attrs::parse_opacity) {
            style.opacity *= v;
        }
        if let Some(width) = self.length(node, "stroke-width", Axis::Diagonal) {
            if width >= 0.0 {
                style.stroke_width = width;
            }
        }
        if let Some(rule) = node.attribute("fill-rule").and_then(attrs::parse_fill_rule) {
            style.fill_rule = rule;
        }
        if let Some(join) = node.attribute("stroke-linejoin").and_then(attrs::parse_line_join) {
            style.join = join;
        }
        if let Some(cap) = node.attribute("stroke-linecap").and_then(attrs::parse_line_cap) {
            style.cap = cap;
        }
        if let Some(limit) = node
            .attribute("stroke-miterlimit")
            .and_then(attrs::parse_number)
        {
            if limit >= 1.0 {
                style.miter_limit = limit;
            }
        }
        match node.attribute("visibility").map(str::trim) {
            Some("hidden" | "collapse") => style.visible = false,
            Some("visible") => style.visible = true,
            _ => {}
        }

        style
    }

    fn walk(
        &mut self,
        node: Node<'_, '_>,
        style: &Style,
        ctm: Affine,
        depth: usize,
    ) -> Result<(), ParseError> {
        for child in node.children().filter(Node::is_element) {
            let name = child.tag_name().name();
            if depth >= MAX_DEPTH {
                return Err(ParseError::TooDeep {
                    limit: MAX_DEPTH,
                    offset: child.range().start,
                });
            }
            if child.attribute("display").map(str::trim) == Some("none") {
                continue;
            }

            let ctm = match child.attribute("transform") {
                Some(value) => match attrs::parse_transform(value) {
                    Some(transform) => ctm * transform,
                    None => {
                        debug!("Ignoring invalid transform \"{value}\" on <{name}>");
                        ctm
                    }
                },
                None => ctm,
            };

            if CONTAINERS.contains(&name) {
                let style = self.inherit(child, style);
                let ctm = if name == "svg" {
                    let x = self.length_or_zero(child, "x", Axis::X).unwrap_or(0.0);
                    let y = self.length_or_zero(child, "y", Axis::Y).unwrap_or(0.0);
                    ctm * Affine::translate((x, y))
                } else {
                    ctm
                };
                self.walk(child, &style, ctm, depth + 1)?;
                continue;
            }

            let geometry = match name {
                "path" => self.path(child)?,
                "rect" => self.rect(child),
                "circle" => self.circle(child),
                "ellipse" => self.ellipse(child),
                "line" => self.line(child),
                "polyline" => self.poly(child, false),
                "polygon" => self.poly(child, true),
                _ => {
                    debug!("Skipping unsupported element <{name}>");
                    continue;
                }
            };

            let style = self.inherit(child, style);
            let Some(mut path) = geometry else {
                continue;
            };
            if !style.visible || path.elements().is_empty() {
                continue;
            }

            path.apply_affine(ctm);
            self.push_shape(path, &style, ctm);
        }

        Ok(())
    }

    fn push_shape(&mut self, path: BezPath, style: &Style, ctm: Affine) {
        let fill = style.resolve(style.fill, style.fill_opacity);

        // Stroke width scales with the mean linear scale of the element's transform.
        let width = style.stroke_width * ctm.determinant().abs().sqrt();
        let stroke = style
            .resolve(style.stroke, style.stroke_opacity)
            .filter(|_| width > 0.0)
            .map(|paint| StrokeStyle {
                paint,
                width,
                join: style.join,
                cap: style.cap,
                miter_limit: style.miter_limit,
            });

        if fill.is_none() && stroke.is_none() {
            return;
        }

        self.shapes.push(Shape {
            path,
            fill,
            fill_rule: style.fill_rule,
            stroke,
        });
    }

    fn path(&mut self, node: Node<'_, '_>) -> Result<Option<BezPath>, ParseError> {
        let Some(data) = node.attribute("d") else {
            return Ok(None);
        };
        path::parse_path_data(data)
            .map(Some)
            .map_err(|error| ParseError::PathData {
                element: node.tag_name().name().to_string(),
                element_offset: node.range().start,
                error,
            })
    }

    fn rect(&mut self, node: Node<'_, '_>) -> Option<BezPath> {
        let x = self.length_or_zero(node, "x", Axis::X)?;
        let y = self.length_or_zero(node, "y", Axis::Y)?;
        let width = self.length(node, "width", Axis::X)?;
        let height = self.length(node, "height", Axis::Y)?;
        if width <= 0.0 || height <= 0.0 {
            return None;
        }

        let rx = self.length(node, "rx", Axis::X).filter(|v| *v >= 0.0);
        let ry = self.length(node, "ry", Axis::Y).filter(|v| *v >= 0.0);
        let (rx, ry) = match (rx, ry) {
            (Some(rx), Some(ry)) => (rx, ry),
            (Some(r), None) | (None, Some(r)) => (r, r),
            (None, None) => (0.0, 0.0),
        };
        let rx = rx.min(width / 2.0);
        let ry = ry.min(height / 2.0);

        let mut path = BezPath::new();
        if rx == 0.0 || ry == 0.0 {
            path.move_to((x, y));
            path.line_to((x + width, y));
            path.line_to((x + width, y + height));
            path.line_to((x, y + height));
            path.close_path();
            return Some(path);
        }

        let radii = Vec2::new(rx, ry);
        let tolerance = curve_tolerance(rx.max(ry));
        let corner = |path: &mut BezPath, center: Point, start_angle: f64| {
            let arc = kurbo::Arc {
                center,
                radii,
                start_angle,
                sweep_angle: FRAC_PI_2,
                x_rotation: 0.0,
            };
            for el in arc.append_iter(tolerance) {
                path.push(el);
            }
        };

        path.move_to((x + rx, y));
        path.line_to((x + width - rx, y));
        corner(&mut path, Point::new(x + width - rx, y + ry), -FRAC_PI_2);
        path.line_to((x + width, y + height - ry));
        corner(&mut path, Point::new(x + width - rx, y + height - ry), 0.0);
        path.line_to((x + rx, y + height));
        corner(&mut path, Point::new(x + rx, y + height - ry), FRAC_PI_2);
        path.line_to((x, y + ry));
        corner(&mut path, Point::new(x + rx, y + ry), PI);
        path.close_path();
        Some(path)
    }

    fn circle(&mut self, node: Node<'_, '_>) -> Option<BezPath> {
        let cx = self.length_or_zero(node, "cx", Axis::X)?;
        let cy = self.length_or_zero(node, "cy", Axis::Y)?;
        let r = self.length(node, "r", Axis::Diagonal)?;
        if r <= 0.0 {
            return None;
        }
        Some(Circle::new((cx, cy), r).to_path(curve_tolerance(r)))
    }

    fn ellipse(&mut self, node: Node<'_, '_>) -> Option<BezPath> {
        let cx = self.length_or_zero(node, "cx", Axis::X)?;
        let cy = self.length_or_zero(node, "cy", Axis::Y)?;
        let rx = self.length(node, "rx", Axis::X)?;
        let ry = self.length(node, "ry", Axis::Y)?;
        if rx <= 0.0 || ry <= 0.0 {
            return None;
        }
        Some(Ellipse::new((cx, cy), (rx, ry), 0.0).to_path(curve_tolerance(rx.max(ry))))
    }

    fn line(&mut self, node: Node<'_, '_>) -> Option<BezPath> {
        let x1 = self.length_or_zero(node, "x1", Axis::X)?;
        let y1 = self.length_or_zero(node, "y1", Axis::Y)?;
        let x2 = self.length_or_zero(node, "x2", Axis::X)?;
        let y2 = self.length_or_zero(node, "y2", Axis::Y)?;

        let mut path = BezPath::new();
        path.move_to((x1, y1));
        path.line_to((x2, y2));
        Some(path)
    }

    fn poly(&mut self, node: Node<'_, '_>, close: bool) -> Option<BezPath> {
        let points = attrs::parse_number_list(node.attribute("points")?)?;
        if points.len() % 2 != 0 {
            debug!("Odd number of coordinates in <{}>, dropping the last one", node.tag_name().name());
        }

        let mut pairs = points.chunks_exact(2).map(|p| Point::new(p[0], p[1]));
        let first = pairs.next()?;

        let mut path = BezPath::new();
        path.move_to(first);
        for p in pairs {
            path.line_to(p);
        }
        if close {
            path.close_path();
        }
        Some(path)
    }
}

/// Bézier approximation tolerance for a curve of the given radius.
fn curve_tolerance(radius: f64) -> f64 {
    (radius * 1e-4).max(1e-9)
}
