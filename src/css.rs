//! Just enough CSS to style a rendered document.
//!
//! A stylesheet is a list of rules in source order. Resolving a selector walks
//! every rule whose selector list contains it and applies the declarations in
//! order, so later declarations win and shorthands can be refined by their
//! longhand forms. Selectors are matched textually; there is no specificity.

use std::ops::Add;

use tracing::debug;

/// Conversion factor from CSS pixels to points.
const PX_TO_PT: f64 = 0.75;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stylesheet {
    rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq)]
struct Rule {
    selectors: Vec<String>,
    declarations: Vec<(String, String)>,
}

impl Stylesheet {
    pub fn parse(css: &str) -> Self {
        let css = strip_comments(css);
        let mut rules = Vec::new();
        let mut rest = css.as_str();

        while let Some(open) = rest.find('{') {
            let prelude = rest[..open].trim();
            let Some(close) = matching_brace(&rest[open..]) else {
                break;
            };
            let body = &rest[open + 1..open + close];
            rest = &rest[open + close + 1..];

            // Nested blocks such as @media are not supported
            if body.contains('{') {
                debug!(rule = prelude, "skipping nested CSS block");
                continue;
            }

            let selectors = prelude
                .split(',')
                .map(normalize_selector)
                .filter(|s| !s.is_empty())
                .collect();
            let declarations = body
                .split(';')
                .filter_map(|declaration| {
                    let (property, value) = declaration.split_once(':')?;
                    let value = value.trim().trim_end_matches("!important").trim();
                    Some((property.trim().to_ascii_lowercase(), value.to_string()))
                })
                .filter(|(property, value)| !property.is_empty() && !value.is_empty())
                .collect();

            rules.push(Rule {
                selectors,
                declarations,
            });
        }

        Self { rules }
    }

    /// Resolve the declarations that apply to `selector`.
    pub fn style_for(&self, selector: &str) -> ElementStyle {
        let selector = normalize_selector(selector);
        let mut style = ElementStyle::default();
        for rule in &self.rules {
            if rule.selectors.iter().any(|s| *s == selector) {
                for (property, value) in &rule.declarations {
                    style.apply(property, value);
                }
            }
        }
        style
    }
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Offset of the brace closing the one at the start of `s`.
fn matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, ch) in s.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn normalize_selector(selector: &str) -> String {
    selector
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

/// A length in points plus a font-relative part.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Length {
    pub pt: f64,
    pub em: f64,
}

impl Length {
    pub fn pt(pt: f64) -> Self {
        Self { pt, em: 0.0 }
    }

    pub fn em(em: f64) -> Self {
        Self { pt: 0.0, em }
    }

    pub fn is_zero(&self) -> bool {
        self.pt == 0.0 && self.em == 0.0
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        let split = value
            .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+')))
            .unwrap_or(value.len());
        let (number, unit) = value.split_at(split);
        let n: f64 = number.parse().ok()?;
        let length = match unit {
            "px" => Self::pt(n * PX_TO_PT),
            "pt" => Self::pt(n),
            "pc" => Self::pt(n * 12.0),
            "in" => Self::pt(n * 72.0),
            "cm" => Self::pt(n * 72.0 / 2.54),
            "mm" => Self::pt(n * 72.0 / 25.4),
            "em" | "rem" => Self::em(n),
            "" if n == 0.0 => Self::default(),
            _ => return None,
        };
        Some(length)
    }
}

impl Add for Length {
    type Output = Length;

    fn add(self, other: Length) -> Length {
        Length {
            pt: self.pt + other.pt,
            em: self.em + other.em,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        if let Some(hex) = value.strip_prefix('#') {
            return Self::from_hex(hex);
        }
        if let Some(args) = value
            .strip_prefix("rgb(")
            .or_else(|| value.strip_prefix("rgba("))
            .and_then(|v| v.strip_suffix(')'))
        {
            let mut channels = args
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|c| !c.is_empty())
                .map(|c| c.parse::<u8>().ok());
            return Some(Self {
                r: channels.next()??,
                g: channels.next()??,
                b: channels.next()??,
            });
        }
        let hex = match value.as_str() {
            "black" => "000000",
            "white" => "ffffff",
            "gray" | "grey" => "808080",
            "silver" => "c0c0c0",
            "red" => "ff0000",
            "maroon" => "800000",
            "green" => "008000",
            "blue" => "0000ff",
            "navy" => "000080",
            "teal" => "008080",
            "purple" => "800080",
            "orange" => "ffa500",
            _ => return None,
        };
        Self::from_hex(hex)
    }

    fn from_hex(hex: &str) -> Option<Self> {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let double = |i: usize| channel(&hex[i..i + 1].repeat(2));
                Some(Self {
                    r: double(0)?,
                    g: double(1)?,
                    b: double(2)?,
                })
            }
            6 => Some(Self {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
            }),
            _ => None,
        }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// One side of a border.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stroke {
    None,
    Line { width: Length, color: Option<Color> },
}

impl Stroke {
    pub fn parse(value: &str) -> Option<Self> {
        let mut width = None;
        let mut color = None;
        let mut visible = true;
        for token in value.split_whitespace() {
            match token.to_ascii_lowercase().as_str() {
                "none" | "hidden" => visible = false,
                "solid" | "dashed" | "dotted" | "double" | "groove" | "ridge" | "inset"
                | "outset" => {}
                "thin" => width = Some(Length::pt(PX_TO_PT)),
                "medium" => width = Some(Length::pt(3.0 * PX_TO_PT)),
                "thick" => width = Some(Length::pt(5.0 * PX_TO_PT)),
                other => {
                    if let Some(length) = Length::parse(other) {
                        width = Some(length);
                    } else {
                        color = Some(Color::parse(other)?);
                    }
                }
            }
        }
        let width = width.unwrap_or(Length::pt(3.0 * PX_TO_PT));
        if !visible || width.is_zero() {
            return Some(Stroke::None);
        }
        Some(Stroke::Line { width, color })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sides<T> {
    pub top: T,
    pub right: T,
    pub bottom: T,
    pub left: T,
}

impl<T: Copy> Sides<Option<T>> {
    /// Set all four sides from a 1-4 value shorthand.
    fn set_shorthand(&mut self, value: &str, parse: impl Fn(&str) -> Option<T>) -> Option<()> {
        let values = value
            .split_whitespace()
            .map(parse)
            .collect::<Option<Vec<T>>>()?;
        let (top, right, bottom, left) = match values.as_slice() {
            [all] => (*all, *all, *all, *all),
            [vertical, horizontal] => (*vertical, *horizontal, *vertical, *horizontal),
            [top, horizontal, bottom] => (*top, *horizontal, *bottom, *horizontal),
            [top, right, bottom, left] => (*top, *right, *bottom, *left),
            _ => return None,
        };
        *self = Sides {
            top: Some(top),
            right: Some(right),
            bottom: Some(bottom),
            left: Some(left),
        };
        Some(())
    }

    fn side_mut(&mut self, side: &str) -> Option<&mut Option<T>> {
        match side {
            "top" => Some(&mut self.top),
            "right" => Some(&mut self.right),
            "bottom" => Some(&mut self.bottom),
            "left" => Some(&mut self.left),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineHeight {
    Factor(f64),
    Length(Length),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalAlign {
    Top,
    Middle,
    Bottom,
}

/// The resolved declarations for one selector. `None` means "not set".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementStyle {
    pub font_family: Option<Vec<String>>,
    pub font_size: Option<Length>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub line_height: Option<LineHeight>,
    pub color: Option<Color>,
    pub background: Option<Color>,
    pub margin: Sides<Option<Length>>,
    pub padding: Sides<Option<Length>>,
    pub border: Sides<Option<Stroke>>,
    pub text_align: Option<TextAlign>,
    pub vertical_align: Option<VerticalAlign>,
    pub underline: Option<bool>,
    pub full_width: Option<bool>,
    /// Raw `size` of an `@page` rule
    pub page_size: Option<String>,
}

impl ElementStyle {
    fn apply(&mut self, property: &str, value: &str) {
        let applied = match property {
            "font-family" => {
                self.font_family = Some(parse_font_families(value));
                Some(())
            }
            "font-size" => Length::parse(value).map(|l| self.font_size = Some(l)),
            "font-weight" => parse_font_weight(value).map(|b| self.bold = Some(b)),
            "font-style" => match value.to_ascii_lowercase().as_str() {
                "italic" | "oblique" => Some(self.italic = Some(true)),
                "normal" => Some(self.italic = Some(false)),
                _ => None,
            },
            "line-height" => parse_line_height(value).map(|l| self.line_height = Some(l)),
            "color" => Color::parse(value).map(|c| self.color = Some(c)),
            "background-color" | "background" => {
                Color::parse(value).map(|c| self.background = Some(c))
            }
            "margin" => self.margin.set_shorthand(value, parse_box_length),
            "padding" => self.padding.set_shorthand(value, parse_box_length),
            "border" | "border-top" | "border-right" | "border-bottom" | "border-left" => {
                Stroke::parse(value).and_then(|stroke| match property.strip_prefix("border-") {
                    Some(side) => self.border.side_mut(side).map(|slot| *slot = Some(stroke)),
                    None => {
                        self.border = Sides {
                            top: Some(stroke),
                            right: Some(stroke),
                            bottom: Some(stroke),
                            left: Some(stroke),
                        };
                        Some(())
                    }
                })
            }
            "text-align" => parse_text_align(value).map(|a| self.text_align = Some(a)),
            "vertical-align" => match value.to_ascii_lowercase().as_str() {
                "top" | "text-top" => Some(self.vertical_align = Some(VerticalAlign::Top)),
                "middle" => Some(self.vertical_align = Some(VerticalAlign::Middle)),
                "bottom" | "text-bottom" => {
                    Some(self.vertical_align = Some(VerticalAlign::Bottom))
                }
                _ => None,
            },
            "text-decoration" | "text-decoration-line" => {
                let value = value.to_ascii_lowercase();
                self.underline = Some(value.contains("underline"));
                Some(())
            }
            "width" => {
                self.full_width = Some(value.trim() == "100%");
                Some(())
            }
            "size" => {
                self.page_size = Some(value.to_string());
                Some(())
            }
            // Collapsed borders are the only model the typesetter has
            "border-collapse" => Some(()),
            _ => {
                if let Some(side) = property.strip_prefix("margin-") {
                    parse_box_length(value)
                        .and_then(|l| self.margin.side_mut(side).map(|slot| *slot = Some(l)))
                } else if let Some(side) = property.strip_prefix("padding-") {
                    parse_box_length(value)
                        .and_then(|l| self.padding.side_mut(side).map(|slot| *slot = Some(l)))
                } else {
                    None
                }
            }
        };

        if applied.is_none() {
            debug!(property, value, "ignoring unsupported CSS declaration");
        }
    }
}

fn parse_box_length(value: &str) -> Option<Length> {
    if value.eq_ignore_ascii_case("auto") {
        return Some(Length::default());
    }
    Length::parse(value)
}

fn parse_font_families(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|family| family.trim().trim_matches(|c| c == '"' || c == '\'').trim())
        .filter(|family| !family.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_font_weight(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "bold" | "bolder" => Some(true),
        "normal" | "lighter" => Some(false),
        other => other.parse::<u16>().ok().map(|weight| weight >= 600),
    }
}

fn parse_line_height(value: &str) -> Option<LineHeight> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("normal") {
        return Some(LineHeight::Factor(1.2));
    }
    if let Some(percent) = value.strip_suffix('%') {
        return percent.trim().parse().ok().map(|p: f64| LineHeight::Factor(p / 100.0));
    }
    if let Ok(factor) = value.parse() {
        return Some(LineHeight::Factor(factor));
    }
    Length::parse(value).map(LineHeight::Length)
}

fn parse_text_align(value: &str) -> Option<TextAlign> {
    match value.trim().to_ascii_lowercase().as_str() {
        "left" | "start" => Some(TextAlign::Left),
        "center" => Some(TextAlign::Center),
        "right" | "end" => Some(TextAlign::Right),
        "justify" => Some(TextAlign::Justify),
        _ => None,
    }
}
