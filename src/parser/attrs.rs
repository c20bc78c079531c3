use crate::{
    document::{Color, FillRule},
    transform::REFERENCE_DPI,
};
use kurbo::{Affine, Cap, Join, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    None,
    Px,
    In,
    Cm,
    Mm,
    Pt,
    Pc,
    Em,
    Ex,
    Percent,
}

impl Unit {
    pub fn is_physical(self) -> bool {
        matches!(self, Unit::In | Unit::Cm | Unit::Mm | Unit::Pt | Unit::Pc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length {
    pub value: f64,
    pub unit: Unit,
}

const FONT_SIZE: f64 = 16.0;

impl Length {
    /// Resolves to user units. Physical units use the 96 dpi reference;
    /// percentages are taken of `reference`.
    pub fn to_user(self, reference: f64) -> f64 {
        let factor = match self.unit {
            Unit::None | Unit::Px => 1.0,
            Unit::In => REFERENCE_DPI,
            Unit::Cm => REFERENCE_DPI / 2.54,
            Unit::Mm => REFERENCE_DPI / 25.4,
            Unit::Pt => REFERENCE_DPI / 72.0,
            Unit::Pc => REFERENCE_DPI / 6.0,
            Unit::Em => FONT_SIZE,
            Unit::Ex => FONT_SIZE / 2.0,
            Unit::Percent => reference / 100.0,
        };
        self.value * factor
    }
}

pub fn parse_number(input: &str) -> Option<f64> {
    input.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

const UNITS: [(&str, Unit); 9] = [
    ("px", Unit::Px),
    ("in", Unit::In),
    ("cm", Unit::Cm),
    ("mm", Unit::Mm),
    ("pt", Unit::Pt),
    ("pc", Unit::Pc),
    ("em", Unit::Em),
    ("ex", Unit::Ex),
    ("%", Unit::Percent),
];

pub fn parse_length(input: &str) -> Option<Length> {
    let s = input.trim();
    let (number, unit) = UNITS
        .iter()
        .find_map(|(suffix, unit)| s.strip_suffix(suffix).map(|n| (n, *unit)))
        .unwrap_or((s, Unit::None));

    Some(Length {
        value: parse_number(number)?,
        unit,
    })
}

pub fn parse_number_list(input: &str) -> Option<Vec<f64>> {
    input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(parse_number)
        .collect()
}

/// Opacity as a number or a percentage, clamped to `[0, 1]`.
pub fn parse_opacity(input: &str) -> Option<f32> {
    let s = input.trim();
    let value = match s.strip_suffix('%') {
        Some(percent) => parse_number(percent)? / 100.0,
        None => parse_number(s)?,
    };
    Some(value.clamp(0.0, 1.0) as f32)
}

pub fn parse_fill_rule(input: &str) -> Option<FillRule> {
    match input.trim() {
        "nonzero" => Some(FillRule::NonZero),
        "evenodd" => Some(FillRule::EvenOdd),
        _ => None,
    }
}

pub fn parse_line_join(input: &str) -> Option<Join> {
    match input.trim() {
        "miter" | "miter-clip" | "arcs" => Some(Join::Miter),
        "round" => Some(Join::Round),
        "bevel" => Some(Join::Bevel),
        _ => None,
    }
}

pub fn parse_line_cap(input: &str) -> Option<Cap> {
    match input.trim() {
        "butt" => Some(Cap::Butt),
        "round" => Some(Cap::Round),
        "square" => Some(Cap::Square),
        _ => None,
    }
}

/// The value of a `fill` or `stroke` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintValue {
    None,
    CurrentColor,
    Color(Color),
}

pub fn parse_paint(input: &str) -> Option<PaintValue> {
    let s = input.trim();
    if s == "none" {
        return Some(PaintValue::None);
    }
    if s.eq_ignore_ascii_case("currentcolor") {
        return Some(PaintValue::CurrentColor);
    }
    parse_color(s).map(PaintValue::Color)
}

pub fn parse_color(input: &str) -> Option<Color> {
    let s = input.trim();

    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }

    let lower = s.to_ascii_lowercase();
    if let Some(args) = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))
    {
        return parse_rgb_function(args.strip_suffix(')')?);
    }

    named_color(&lower)
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 => Some(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
        4 => Some(Color::rgba(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
        6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

fn parse_rgb_function(args: &str) -> Option<Color> {
    let parts = args
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }

    let channel = |s: &str| -> Option<u8> {
        let v = match s.strip_suffix('%') {
            Some(p) => parse_number(p)? * 2.55,
            None => parse_number(s)?,
        };
        Some(v.round().clamp(0.0, 255.0) as u8)
    };

    let alpha = match parts.get(3) {
        Some(a) => (parse_opacity(a)? * 255.0).round() as u8,
        None => 255,
    };

    Some(Color::rgba(
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        alpha,
    ))
}

fn named_color(name: &str) -> Option<Color> {
    let (r, g, b) = match name {
        "black" => (0, 0, 0),
        "silver" => (192, 192, 192),
        "gray" | "grey" => (128, 128, 128),
        "white" => (255, 255, 255),
        "maroon" => (128, 0, 0),
        "red" => (255, 0, 0),
        "purple" => (128, 0, 128),
        "fuchsia" | "magenta" => (255, 0, 255),
        "green" => (0, 128, 0),
        "lime" => (0, 255, 0),
        "olive" => (128, 128, 0),
        "yellow" => (255, 255, 0),
        "navy" => (0, 0, 128),
        "blue" => (0, 0, 255),
        "teal" => (0, 128, 128),
        "aqua" | "cyan" => (0, 255, 255),
        "orange" => (255, 165, 0),
        "darkgray" | "darkgrey" => (169, 169, 169),
        "lightgray" | "lightgrey" => (211, 211, 211),
        "dimgray" | "dimgrey" => (105, 105, 105),
        "gold" => (255, 215, 0),
        "pink" => (255, 192, 203),
        "brown" => (165, 42, 42),
        "crimson" => (220, 20, 60),
        "coral" => (255, 127, 80),
        "tomato" => (255, 99, 71),
        "salmon" => (250, 128, 114),
        "orangered" => (255, 69, 0),
        "darkorange" => (255, 140, 0),
        "khaki" => (240, 230, 140),
        "indigo" => (75, 0, 130),
        "violet" => (238, 130, 238),
        "orchid" => (218, 112, 214),
        "plum" => (221, 160, 221),
        "darkred" => (139, 0, 0),
        "darkgreen" => (0, 100, 0),
        "darkblue" => (0, 0, 139),
        "forestgreen" => (34, 139, 34),
        "seagreen" => (46, 139, 87),
        "limegreen" => (50, 205, 50),
        "skyblue" => (135, 206, 235),
        "steelblue" => (70, 130, 180),
        "royalblue" => (65, 105, 225),
        "dodgerblue" => (30, 144, 255),
        "slategray" | "slategrey" => (112, 128, 144),
        "turquoise" => (64, 224, 208),
        "beige" => (245, 245, 220),
        "ivory" => (255, 255, 240),
        "chocolate" => (210, 105, 30),
        "tan" => (210, 180, 140),
        "transparent" => return Some(Color::TRANSPARENT),
        _ => return None,
    };
    Some(Color::rgb(r, g, b))
}

/// Parses a `transform` attribute, composing the listed functions left to right.
pub fn parse_transform(input: &str) -> Option<Affine> {
    let mut out = Affine::IDENTITY;
    let mut s = input.trim();

    while !s.is_empty() {
        let open = s.find('(')?;
        let name = s[..open].trim_matches(|c: char| c.is_whitespace() || c == ',');
        let close = open + s[open..].find(')')?;
        let args = parse_number_list(&s[open + 1..close])?;

        let m = match (name, args.as_slice()) {
            ("matrix", &[a, b, c, d, e, f]) => Affine::new([a, b, c, d, e, f]),
            ("translate", &[tx]) => Affine::translate((tx, 0.0)),
            ("translate", &[tx, ty]) => Affine::translate((tx, ty)),
            ("scale", &[k]) => Affine::scale(k),
            ("scale", &[sx, sy]) => Affine::scale_non_uniform(sx, sy),
            ("rotate", &[a]) => Affine::rotate(a.to_radians()),
            ("rotate", &[a, cx, cy]) => Affine::rotate_about(a.to_radians(), Point::new(cx, cy)),
            ("skewX", &[a]) => Affine::skew(a.to_radians().tan(), 0.0),
            ("skewY", &[a]) => Affine::skew(0.0, a.to_radians().tan()),
            _ => return None,
        };

        out *= m;
        s = s[close + 1..].trim_start_matches(|c: char| c.is_whitespace() || c == ',');
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths_and_units() {
        let len = parse_length("2in").unwrap();
        assert_eq!(len.unit, Unit::In);
        assert!(len.unit.is_physical());
        assert_eq!(len.to_user(0.0), 192.0);

        assert_eq!(parse_length("72pt").unwrap().to_user(0.0), 96.0);
        assert_eq!(parse_length("50%").unwrap().to_user(300.0), 150.0);
        assert_eq!(parse_length(" 1e2 ").unwrap().to_user(0.0), 100.0);
        assert_eq!(parse_length("2em").unwrap().to_user(0.0), 32.0);
        assert!(!parse_length("10px").unwrap().unit.is_physical());
        assert_eq!(parse_length("10furlongs"), None);
        assert_eq!(parse_length("abc"), None);
    }

    #[test]
    fn colors() {
        assert_eq!(parse_color("#f00"), Some(Color::rgb(255, 0, 0)));
        assert_eq!(parse_color("#00ff0080"), Some(Color::rgba(0, 255, 0, 128)));
        assert_eq!(parse_color("rgb(10, 20, 30)"), Some(Color::rgb(10, 20, 30)));
        assert_eq!(parse_color("rgb(100%,0%,0%)"), Some(Color::rgb(255, 0, 0)));
        assert_eq!(
            parse_color("rgba(0,0,255,0.5)"),
            Some(Color::rgba(0, 0, 255, 128))
        );
        assert_eq!(parse_color("Navy"), Some(Color::rgb(0, 0, 128)));
        assert_eq!(parse_color("#ggg"), None);
        assert_eq!(parse_color("url(#grad)"), None);
    }

    #[test]
    fn paint_keywords() {
        assert_eq!(parse_paint("none"), Some(PaintValue::None));
        assert_eq!(parse_paint("currentColor"), Some(PaintValue::CurrentColor));
        assert_eq!(
            parse_paint("black"),
            Some(PaintValue::Color(Color::BLACK))
        );
    }

    #[test]
    fn opacity_clamps() {
        assert_eq!(parse_opacity("1.5"), Some(1.0));
        assert_eq!(parse_opacity("50%"), Some(0.5));
        assert_eq!(parse_opacity("-1"), Some(0.0));
    }

    #[test]
    fn transform_lists_compose_left_to_right() {
        let t = parse_transform("translate(10, 20) scale(2)").unwrap();
        assert_eq!(t * Point::new(1.0, 1.0), Point::new(12.0, 22.0));

        let t = parse_transform("rotate(90 5 5)").unwrap();
        let p = t * Point::new(10.0, 5.0);
        assert!((p.x - 5.0).abs() < 1e-9 && (p.y - 10.0).abs() < 1e-9);

        assert_eq!(parse_transform("scale(1 2 3)"), None);
        assert_eq!(parse_transform("wobble(3)"), None);
    }
}
