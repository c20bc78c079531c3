//! Parser for the SVG path data grammar (the `d` attribute).

use crate::error::PathError;
use kurbo::{Arc, BezPath, Point, SvgArc, Vec2};

const COMMANDS: &[u8] = b"MmLlHhVvCcSsQqTtAaZz";

struct Lexer<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(data: &'a str) -> Self {
        Self {
            bytes: data.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r' | b'\x0C')) {
            self.pos += 1;
        }
    }

    /// Skips whitespace and at most one comma.
    fn skip_separator(&mut self) {
        self.skip_whitespace();
        if self.peek() == Some(b',') {
            self.pos += 1;
            self.skip_whitespace();
        }
    }

    fn at_number(&mut self) -> bool {
        self.skip_separator();
        matches!(self.peek(), Some(b'0'..=b'9' | b'.' | b'-' | b'+'))
    }

    fn eat_digits(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn number(&mut self) -> Result<f64, PathError> {
        self.skip_separator();
        let start = self.pos;

        if matches!(self.peek(), Some(b'-' | b'+')) {
            self.pos += 1;
        }
        let mut digits = self.eat_digits();
        if self.peek() == Some(b'.') {
            self.pos += 1;
            digits += self.eat_digits();
        }
        if digits == 0 {
            self.pos = start;
            return Err(PathError::InvalidNumber { offset: start });
        }

        // Only consume an exponent if digits follow, so "1em" style input stops at "1".
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let mark = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some(b'-' | b'+')) {
                self.pos += 1;
            }
            if self.eat_digits() == 0 {
                self.pos = mark;
            }
        }

        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .ok_or(PathError::InvalidNumber { offset: start })
    }

    fn flag(&mut self) -> Result<bool, PathError> {
        self.skip_separator();
        let offset = self.pos;
        let flag = match self.peek() {
            Some(b'0') => false,
            Some(b'1') => true,
            _ => return Err(PathError::InvalidFlag { offset }),
        };
        self.pos += 1;
        Ok(flag)
    }
}

struct Builder {
    path: BezPath,
    pen: Point,
    start: Point,
    /// Second control point of the previous cubic, for `S`.
    cubic_ctrl: Option<Point>,
    /// Control point of the previous quadratic, for `T`.
    quad_ctrl: Option<Point>,
    /// Set after `Z`: the next drawing command starts a subpath at `start`.
    needs_move: bool,
}

impl Builder {
    fn ensure_subpath(&mut self) {
        if self.needs_move {
            self.path.move_to(self.start);
            self.needs_move = false;
        }
    }

    fn move_to(&mut self, p: Point) {
        self.path.move_to(p);
        self.pen = p;
        self.start = p;
        self.needs_move = false;
    }

    fn line_to(&mut self, p: Point) {
        self.ensure_subpath();
        self.path.line_to(p);
        self.pen = p;
    }

    fn curve_to(&mut self, c1: Point, c2: Point, p: Point) {
        self.ensure_subpath();
        self.path.curve_to(c1, c2, p);
        self.pen = p;
        self.cubic_ctrl = Some(c2);
    }

    fn quad_to(&mut self, c: Point, p: Point) {
        self.ensure_subpath();
        self.path.quad_to(c, p);
        self.pen = p;
        self.quad_ctrl = Some(c);
    }

    fn arc_to(&mut self, radii: Vec2, x_rotation: f64, large_arc: bool, sweep: bool, p: Point) {
        self.ensure_subpath();
        let arc = SvgArc {
            from: self.pen,
            to: p,
            radii,
            x_rotation: x_rotation.to_radians(),
            large_arc,
            sweep,
        };
        match Arc::from_svg_arc(&arc) {
            Some(arc) => {
                let tolerance = (arc.radii.x.max(arc.radii.y) * 1e-4).max(1e-9);
                for el in arc.append_iter(tolerance) {
                    self.path.push(el);
                }
            }
            None => self.path.line_to(p),
        }
        self.pen = p;
    }

    fn close(&mut self) {
        if !self.needs_move {
            self.path.close_path();
        }
        self.pen = self.start;
        self.needs_move = true;
    }

    fn reflect(ctrl: Option<Point>, pen: Point) -> Point {
        match ctrl {
            Some(c) => pen + (pen - c),
            None => pen,
        }
    }
}

fn arg_count(command: u8) -> usize {
    match command.to_ascii_uppercase() {
        b'M' | b'L' | b'T' => 2,
        b'H' | b'V' => 1,
        b'C' => 6,
        b'S' | b'Q' => 4,
        b'A' => 7,
        _ => 0,
    }
}

/// Parses path data into a [`BezPath`] in the element's user space.
///
/// Arcs are converted to cubic Béziers.
pub fn parse_path_data(data: &str) -> Result<BezPath, PathError> {
    let mut lexer = Lexer::new(data);
    let mut builder = Builder {
        path: BezPath::new(),
        pen: Point::ZERO,
        start: Point::ZERO,
        cubic_ctrl: None,
        quad_ctrl: None,
        needs_move: false,
    };
    let mut previous: Option<u8> = None;

    loop {
        lexer.skip_separator();
        let Some(next) = lexer.peek() else {
            break;
        };
        let offset = lexer.pos;

        let command = if next.is_ascii_alphabetic() {
            if !COMMANDS.contains(&next) {
                return Err(PathError::UnknownCommand {
                    command: next as char,
                    offset,
                });
            }
            lexer.pos += 1;
            next
        } else {
            // Numbers without a letter repeat the previous command; a repeated moveto is a lineto.
            match previous {
                Some(b'M') => b'L',
                Some(b'm') => b'l',
                Some(c) if !matches!(c, b'Z' | b'z') => c,
                Some(c) => {
                    return Err(PathError::ArgumentCount {
                        command: c as char,
                        expected: 0,
                        got: 1,
                        offset,
                    })
                }
                None => {
                    return Err(PathError::MissingMoveTo {
                        command: next as char,
                        offset,
                    })
                }
            }
        };

        if previous.is_none() && !matches!(command, b'M' | b'm') {
            return Err(PathError::MissingMoveTo {
                command: command as char,
                offset,
            });
        }

        let expected = arg_count(command);
        let mut args = [0.0_f64; 7];
        let mut flags = [false; 2];
        for (i, arg) in args.iter_mut().enumerate().take(expected) {
            let result = if command.eq_ignore_ascii_case(&b'A') && (i == 3 || i == 4) {
                lexer.flag().map(|f| {
                    flags[i - 3] = f;
                    0.0
                })
            } else if lexer.at_number() {
                lexer.number()
            } else {
                Err(PathError::ArgumentCount {
                    command: command as char,
                    expected,
                    got: i,
                    offset,
                })
            };
            *arg = result?;
        }

        let relative = command.is_ascii_lowercase();
        let origin = if relative {
            builder.pen.to_vec2()
        } else {
            Vec2::ZERO
        };
        let pt = |x: f64, y: f64| Point::new(x, y) + origin;
        let pen = builder.pen;

        let previous_upper = previous.map(|c| c.to_ascii_uppercase());
        if !matches!(previous_upper, Some(b'C' | b'S')) {
            builder.cubic_ctrl = None;
        }
        if !matches!(previous_upper, Some(b'Q' | b'T')) {
            builder.quad_ctrl = None;
        }

        match command.to_ascii_uppercase() {
            b'M' => builder.move_to(pt(args[0], args[1])),
            b'L' => builder.line_to(pt(args[0], args[1])),
            b'H' => {
                let x = if relative { pen.x + args[0] } else { args[0] };
                builder.line_to(Point::new(x, pen.y));
            }
            b'V' => {
                let y = if relative { pen.y + args[0] } else { args[0] };
                builder.line_to(Point::new(pen.x, y));
            }
            b'C' => builder.curve_to(
                pt(args[0], args[1]),
                pt(args[2], args[3]),
                pt(args[4], args[5]),
            ),
            b'S' => {
                let c1 = Builder::reflect(builder.cubic_ctrl, pen);
                builder.curve_to(c1, pt(args[0], args[1]), pt(args[2], args[3]));
            }
            b'Q' => builder.quad_to(pt(args[0], args[1]), pt(args[2], args[3])),
            b'T' => {
                let c = Builder::reflect(builder.quad_ctrl, pen);
                builder.quad_to(c, pt(args[0], args[1]));
            }
            b'A' => builder.arc_to(
                Vec2::new(args[0], args[1]),
                args[2],
                flags[0],
                flags[1],
                pt(args[5], args[6]),
            ),
            _ => builder.close(),
        }

        previous = Some(command);
    }

    Ok(builder.path)
}
