use std::collections::HashMap;
use std::fmt::Write as _;

use crate::block::{Alignment, Block, LinkTarget, List, Span, Table};
use crate::config::FontConfig;
use crate::css::{
    Color, ElementStyle, Length, LineHeight, Sides, Stroke, Stylesheet, TextAlign, VerticalAlign,
};

/// Page margin used when the stylesheet has no `@page` margin (75px).
const DEFAULT_PAGE_MARGIN: Length = Length { pt: 56.25, em: 0.0 };

/// Body margin used when the stylesheet sets none (8px).
const DEFAULT_BODY_MARGIN: Length = Length { pt: 6.0, em: 0.0 };

/// Typst places the first baseline this far below the line top.
const LINE_TOP_EM: f64 = 0.7;

/// A heading that fragment links can point at.
struct Anchor {
    label: String,
    /// Plain heading text, the body of links that have none
    text: String,
}

/// Styles consulted while emitting blocks
struct Context {
    anchors: HashMap<String, Anchor>,
    table: ElementStyle,
    cell: ElementStyle,
    header_cell: ElementStyle,
    even_row: Option<Color>,
    odd_row: Option<Color>,
    rule: ElementStyle,
    unordered: ElementStyle,
    ordered: ElementStyle,
}

impl Context {
    fn new(blocks: &[Block], stylesheet: &Stylesheet) -> Self {
        let mut headings = Vec::new();
        collect_headings(blocks, &mut headings);

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (id, _) in &headings {
            *counts.entry(*id).or_default() += 1;
        }
        // A label that occurs twice cannot be linked to
        let anchors = headings
            .iter()
            .filter(|(id, _)| !id.is_empty() && counts.get(id) == Some(&1))
            .map(|(id, content)| {
                let anchor = Anchor {
                    label: label(id),
                    text: plain_text(content),
                };
                (id.to_string(), anchor)
            })
            .collect();

        Self {
            anchors,
            table: stylesheet.style_for("table"),
            cell: stylesheet.style_for("td"),
            header_cell: stylesheet.style_for("th"),
            even_row: stylesheet.style_for("tr:nth-child(even)").background,
            odd_row: stylesheet.style_for("tr:nth-child(odd)").background,
            rule: stylesheet.style_for("hr"),
            unordered: stylesheet.style_for("ul"),
            ordered: stylesheet.style_for("ol"),
        }
    }
}

fn collect_headings<'b>(blocks: &'b [Block], out: &mut Vec<(&'b str, &'b [Span])>) {
    for block in blocks {
        match block {
            Block::Heading {
                id: Some(id),
                content,
                ..
            } => out.push((id.as_str(), content.as_slice())),
            Block::Quote(inner) => collect_headings(inner, out),
            Block::List(list) => {
                for item in &list.items {
                    collect_headings(&item.blocks, out);
                }
            }
            _ => {}
        }
    }
}

/// Typst label for an element id.
///
/// Typst labels only take identifier characters, so anything outside
/// `[A-Za-z0-9_:-]` is written as `.hex.`. The dot never appears otherwise,
/// which keeps distinct ids distinct.
fn label(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for ch in id.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | ':') {
            out.push(ch);
        } else {
            let _ = write!(out, ".{:x}.", u32::from(ch));
        }
    }
    out
}

fn plain_text(spans: &[Span]) -> String {
    let mut out = String::new();
    for span in spans {
        match span {
            Span::Text(text) | Span::Code(text) => out.push_str(text),
            Span::Bold(inner) | Span::Italic(inner) | Span::Link { content: inner, .. } => {
                out.push_str(&plain_text(inner))
            }
            Span::LineBreak => out.push(' '),
        }
    }
    out
}

/// Convert blocks to Typst markup styled by the stylesheet
pub fn blocks_to_typst(blocks: &[Block], stylesheet: &Stylesheet, fonts: &FontConfig) -> String {
    let mut out = String::new();
    preamble(stylesheet, fonts, &mut out);

    let ctx = Context::new(blocks, stylesheet);
    emit_blocks(blocks, &ctx, &mut out);
    out
}

fn preamble(stylesheet: &Stylesheet, fonts: &FontConfig, out: &mut String) {
    let body = stylesheet.style_for("body");
    page_rule(&stylesheet.style_for("@page"), &body, out);

    let text = text_args(&body, fonts);
    if !text.is_empty() {
        let _ = writeln!(out, "#set text({})", text.join(", "));
    }
    if let Some(line_height) = body.line_height {
        let _ = writeln!(out, "#set par(leading: {})", length(leading(line_height)));
    }

    for level in 1..=6 {
        let style = stylesheet.style_for(&format!("h{level}"));
        heading_rule(level, &style, fonts, out);
    }

    for (element, selector) in [("emph", "em"), ("strong", "strong"), ("raw", "code")] {
        let args = text_args(&stylesheet.style_for(selector), fonts);
        if !args.is_empty() {
            let _ = writeln!(out, "#show {element}: set text({})", args.join(", "));
        }
    }

    let link = stylesheet.style_for("a");
    let args = text_args(&link, fonts);
    if !args.is_empty() {
        let _ = writeln!(out, "#show link: set text({})", args.join(", "));
    }
    if link.underline == Some(true) {
        out.push_str("#show link: underline\n");
    }

    list_rule("list", &stylesheet.style_for("ul"), out);
    list_rule("enum", &stylesheet.style_for("ol"), out);
    table_rules(stylesheet, fonts, out);

    out.push('\n');
}

/// Page size from `@page`, margins from `@page` plus the body margin.
fn page_rule(page: &ElementStyle, body: &ElementStyle, out: &mut String) {
    let mut args = Vec::new();
    if let Some(size) = &page.page_size {
        args.extend(page_size_args(size));
    }

    let side = |page: Option<Length>, body: Option<Length>| {
        length(page.unwrap_or(DEFAULT_PAGE_MARGIN) + body.unwrap_or(DEFAULT_BODY_MARGIN))
    };
    args.push(format!(
        "margin: (top: {}, right: {}, bottom: {}, left: {})",
        side(page.margin.top, body.margin.top),
        side(page.margin.right, body.margin.right),
        side(page.margin.bottom, body.margin.bottom),
        side(page.margin.left, body.margin.left),
    ));

    let _ = writeln!(out, "#set page({})", args.join(", "));
}

fn page_size_args(size: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut dimensions = Vec::new();
    for token in size.split_whitespace() {
        let paper = match token.to_ascii_lowercase().as_str() {
            "a3" => "a3",
            "a4" => "a4",
            "a5" => "a5",
            "b4" => "iso-b4",
            "b5" => "iso-b5",
            "letter" => "us-letter",
            "legal" => "us-legal",
            "ledger" => "us-tabloid",
            "landscape" => {
                args.push("flipped: true".to_string());
                continue;
            }
            other => {
                if let Some(length) = Length::parse(other) {
                    dimensions.push(length);
                }
                continue;
            }
        };
        args.push(format!("paper: \"{paper}\""));
    }

    match dimensions.as_slice() {
        [square] => {
            args.push(format!("width: {}", length(*square)));
            args.push(format!("height: {}", length(*square)));
        }
        [width, height] => {
            args.push(format!("width: {}", length(*width)));
            args.push(format!("height: {}", length(*height)));
        }
        _ => {}
    }
    args
}

/// CSS line-height is baseline to baseline; Typst leading is the gap between lines.
fn leading(line_height: LineHeight) -> Length {
    match line_height {
        LineHeight::Factor(factor) => Length::em((factor - LINE_TOP_EM).max(0.0)),
        LineHeight::Length(height) => height + Length::em(-LINE_TOP_EM),
    }
}

fn heading_rule(level: u8, style: &ElementStyle, fonts: &FontConfig, out: &mut String) {
    if *style == ElementStyle::default() {
        return;
    }

    let mut block = vec!["width: 100%".to_string(), "sticky: true".to_string()];
    if let Some(top) = style.margin.top {
        block.push(format!("above: {}", length(top)));
    }
    if let Some(bottom) = style.margin.bottom {
        block.push(format!("below: {}", length(bottom)));
    }
    if let Some(inset) = sides_dict(&style.padding, length) {
        block.push(format!("inset: {inset}"));
    }
    if let Some(stroke) = sides_dict(&style.border, stroke) {
        block.push(format!("stroke: {stroke}"));
    }
    if let Some(background) = style.background {
        block.push(format!("fill: {}", color(background)));
    }

    let mut text = text_args(style, fonts);
    if style.bold.is_none() {
        text.push("weight: \"bold\"".to_string());
    }
    text.push("it.body".to_string());

    let _ = writeln!(
        out,
        "#show heading.where(level: {level}): it => block({}, text({}))",
        block.join(", "),
        text.join(", ")
    );
}

fn list_rule(function: &str, style: &ElementStyle, out: &mut String) {
    // The marker sits in the left padding, the body starts after it
    if let Some(padding) = style.padding.left {
        let half = Length {
            pt: padding.pt / 2.0,
            em: padding.em / 2.0,
        };
        let _ = writeln!(
            out,
            "#set {function}(indent: {}, body-indent: {})",
            length(half),
            length(half)
        );
    }
}

fn table_rules(stylesheet: &Stylesheet, fonts: &FontConfig, out: &mut String) {
    let cell = stylesheet.style_for("td");

    let mut args = vec![format!(
        "stroke: {}",
        first_stroke(&cell.border).map_or_else(|| "none".to_string(), stroke)
    )];
    if let Some(inset) = sides_dict(&cell.padding, length) {
        args.push(format!("inset: {inset}"));
    }
    let _ = writeln!(out, "#set table({})", args.join(", "));

    let text = text_args(&stylesheet.style_for("table"), fonts);
    if !text.is_empty() {
        let _ = writeln!(out, "#show table: set text({})", text.join(", "));
    }
}

fn text_args(style: &ElementStyle, fonts: &FontConfig) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(families) = &style.font_family {
        let resolved = fonts.resolve_families(families);
        if !resolved.is_empty() {
            let names: Vec<String> = resolved.iter().map(|f| string_literal(f)).collect();
            args.push(format!("font: {}", array(&names)));
        }
    }
    if let Some(size) = style.font_size {
        args.push(format!("size: {}", length(size)));
    }
    if let Some(fill) = style.color {
        args.push(format!("fill: {}", color(fill)));
    }
    if let Some(bold) = style.bold {
        args.push(format!("weight: \"{}\"", if bold { "bold" } else { "regular" }));
    }
    if let Some(italic) = style.italic {
        args.push(format!("style: \"{}\"", if italic { "italic" } else { "normal" }));
    }
    args
}

fn emit_blocks(blocks: &[Block], ctx: &Context, out: &mut String) {
    for block in blocks {
        emit_block(block, ctx, out);
    }
}

fn emit_block(block: &Block, ctx: &Context, out: &mut String) {
    match block {
        Block::Heading { level, id, content } => {
            let _ = write!(out, "#heading(level: {level})[");
            spans_to_typst(content, ctx, out);
            out.push(']');
            if let Some(anchor) = id.as_ref().and_then(|id| ctx.anchors.get(id)) {
                let _ = write!(out, " <{}>", anchor.label);
            }
            out.push_str("\n\n");
        }
        Block::Paragraph { content } => {
            spans_to_typst(content, ctx, out);
            out.push_str("\n\n");
        }
        Block::CodeBlock { language, content } => {
            out.push_str("#raw(block: true, ");
            if let Some(lang) = language {
                let _ = write!(out, "lang: {}, ", string_literal(lang));
            }
            out.push_str(&string_literal(content));
            out.push_str(")\n\n");
        }
        Block::Quote(inner) => {
            out.push_str("#quote(block: true)[\n");
            emit_blocks(inner, ctx, out);
            out.push_str("]\n\n");
        }
        Block::List(list) => list_to_typst(list, ctx, out),
        Block::Table(table) => table_to_typst(table, ctx, out),
        Block::Rule => {
            let style = &ctx.rule;
            let mut line = "length: 100%".to_string();
            if let Some(s) = first_stroke(&style.border) {
                let _ = write!(line, ", stroke: {}", stroke(s));
            }
            let _ = writeln!(
                out,
                "#block({})[#line({line})]\n",
                spacing_args(style, true).join(", ")
            );
        }
    }
}

/// Block arguments for an element's width and vertical margins.
fn spacing_args(style: &ElementStyle, full_width: bool) -> Vec<String> {
    let mut args = Vec::new();
    if full_width {
        args.push("width: 100%".to_string());
    }
    if let Some(top) = style.margin.top {
        args.push(format!("above: {}", length(top)));
    }
    if let Some(bottom) = style.margin.bottom {
        args.push(format!("below: {}", length(bottom)));
    }
    args
}

fn list_to_typst(list: &List, ctx: &Context, out: &mut String) {
    let (function, style) = if list.ordered {
        ("enum", &ctx.ordered)
    } else {
        ("list", &ctx.unordered)
    };

    let _ = write!(
        out,
        "#block({})[#{function}(tight: {}",
        spacing_args(style, false).join(", "),
        list.tight
    );
    if let Some(start) = list.start.filter(|_| list.ordered) {
        let _ = write!(out, ", start: {start}");
    }
    out.push_str(",\n");

    for item in &list.items {
        let mut content = String::new();
        emit_blocks(&item.blocks, ctx, &mut content);
        let _ = writeln!(out, "  [{}],", content.trim_end());
    }
    out.push_str(")]\n\n");
}

fn table_to_typst(table: &Table, ctx: &Context, out: &mut String) {
    let col_count = table.column_count();
    if col_count == 0 {
        return;
    }

    let full_width = ctx.table.full_width == Some(true);
    let _ = writeln!(
        out,
        "#block({})[#table(",
        spacing_args(&ctx.table, full_width).join(", ")
    );

    // Equal shares of the line when the table spans it
    let columns = if full_width {
        array(&vec!["1fr".to_string(); col_count])
    } else {
        col_count.to_string()
    };
    let _ = writeln!(out, "  columns: {columns},");

    let aligns: Vec<String> = (0..col_count)
        .map(|i| {
            let column = table.alignments.get(i).copied().flatten();
            cell_align(column, &ctx.cell)
        })
        .collect();
    let _ = writeln!(out, "  align: {},", array(&aligns));

    let has_header = !table.headers.is_empty();
    if let Some(fill) = table_fill(ctx, has_header) {
        let _ = writeln!(out, "  fill: {fill},");
    }

    if has_header {
        out.push_str("  table.header(\n");
        for i in 0..col_count {
            out.push_str("    [");
            let cell = table.headers.get(i).map(Vec::as_slice).unwrap_or_default();
            header_cell_to_typst(cell, ctx, out);
            out.push_str("],\n");
        }
        out.push_str("  ),\n");
    }

    for row in &table.rows {
        out.push_str(" ");
        for i in 0..col_count {
            out.push_str(" [");
            if let Some(cell) = row.get(i) {
                spans_to_typst(cell, ctx, out);
            }
            out.push_str("],");
        }
        out.push('\n');
    }

    out.push_str(")]\n\n");
}

fn header_cell_to_typst(spans: &[Span], ctx: &Context, out: &mut String) {
    let style = &ctx.header_cell;
    let mut wrappers = 0;
    if let Some(fill) = style.color {
        let _ = write!(out, "#text(fill: {})[", color(fill));
        wrappers += 1;
    }
    if style.bold == Some(true) {
        out.push_str("#strong[");
        wrappers += 1;
    }
    spans_to_typst(spans, ctx, out);
    for _ in 0..wrappers {
        out.push(']');
    }
}

fn cell_align(column: Option<Alignment>, cell: &ElementStyle) -> String {
    let horizontal = match column {
        Some(Alignment::Left) => Some("left"),
        Some(Alignment::Center) => Some("center"),
        Some(Alignment::Right) => Some("right"),
        None => cell.text_align.map(|align| match align {
            TextAlign::Left | TextAlign::Justify => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
        }),
    };
    let vertical = cell.vertical_align.map(|align| match align {
        VerticalAlign::Top => "top",
        VerticalAlign::Middle => "horizon",
        VerticalAlign::Bottom => "bottom",
    });

    match (horizontal, vertical) {
        (Some(h), Some(v)) => format!("{h} + {v}"),
        (Some(a), None) | (None, Some(a)) => a.to_string(),
        (None, None) => "auto".to_string(),
    }
}

/// Header background, then `nth-child` stripes counted from the first body row.
fn table_fill(ctx: &Context, has_header: bool) -> Option<String> {
    let first_body_row = usize::from(has_header);
    let row_number = if has_header { "y" } else { "y + 1" };

    let mut branches = Vec::new();
    if has_header {
        if let Some(fill) = ctx.header_cell.background {
            branches.push(format!("if y == 0 {{ {} }}", color(fill)));
        }
    }
    if let Some(fill) = ctx.even_row {
        branches.push(format!(
            "if y >= {first_body_row} and calc.even({row_number}) {{ {} }}",
            color(fill)
        ));
    }
    if let Some(fill) = ctx.odd_row {
        branches.push(format!(
            "if y >= {first_body_row} and calc.odd({row_number}) {{ {} }}",
            color(fill)
        ));
    }

    let mut expr = branches.join(" else ");
    match ctx.cell.background {
        Some(fill) if expr.is_empty() => expr = color(fill),
        Some(fill) => {
            let _ = write!(expr, " else {{ {} }}", color(fill));
        }
        None if expr.is_empty() => return None,
        None => {}
    }
    Some(format!("(_, y) => {expr}"))
}

fn spans_to_typst(spans: &[Span], ctx: &Context, out: &mut String) {
    for span in spans {
        span_to_typst(span, ctx, out);
    }
}

fn span_to_typst(span: &Span, ctx: &Context, out: &mut String) {
    match span {
        Span::Text(text) => escape_text(text, out),
        Span::Bold(inner) => {
            out.push_str("#strong[");
            spans_to_typst(inner, ctx, out);
            out.push(']');
        }
        Span::Italic(inner) => {
            out.push_str("#emph[");
            spans_to_typst(inner, ctx, out);
            out.push(']');
        }
        Span::Code(text) => {
            let _ = write!(out, "#raw({})", string_literal(text));
        }
        Span::Link {
            target: LinkTarget::Url(url),
            content,
        } => {
            let _ = write!(out, "#link({})", string_literal(url));
            if !content.is_empty() {
                out.push('[');
                spans_to_typst(content, ctx, out);
                out.push(']');
            }
        }
        Span::Link {
            target: LinkTarget::Anchor(id),
            content,
        } => match ctx.anchors.get(id) {
            // Label links need a body, an empty one takes the heading text
            Some(anchor) => {
                let _ = write!(out, "#link(<{}>)[", anchor.label);
                if content.is_empty() {
                    escape_text(&anchor.text, out);
                } else {
                    spans_to_typst(content, ctx, out);
                }
                out.push(']');
            }
            // Dangling fragment links keep their text only
            None => spans_to_typst(content, ctx, out),
        },
        Span::LineBreak => out.push_str("#linebreak()"),
    }
}

/// Escape every ASCII punctuation character so text is never read as markup.
fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '\n' | '\r' | '\t' => out.push(' '),
            c if c.is_ascii_punctuation() => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
}

fn string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn array(items: &[String]) -> String {
    match items {
        [single] => format!("({single},)"),
        _ => format!("({})", items.join(", ")),
    }
}

fn number(value: f64) -> String {
    let formatted = format!("{value:.3}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn length(value: Length) -> String {
    if value.em == 0.0 {
        format!("{}pt", number(value.pt))
    } else if value.pt == 0.0 {
        format!("{}em", number(value.em))
    } else if value.em < 0.0 {
        format!("{}pt - {}em", number(value.pt), number(-value.em))
    } else {
        format!("{}pt + {}em", number(value.pt), number(value.em))
    }
}

fn color(value: Color) -> String {
    format!("rgb(\"{}\")", value.to_hex())
}

fn stroke(value: Stroke) -> String {
    match value {
        Stroke::None => "none".to_string(),
        Stroke::Line {
            width,
            color: Some(c),
        } => format!("{} + {}", length(width), color(c)),
        Stroke::Line { width, color: None } => length(width),
    }
}

fn first_stroke(border: &Sides<Option<Stroke>>) -> Option<Stroke> {
    let sides = [border.top, border.right, border.bottom, border.left];
    sides
        .iter()
        .flatten()
        .copied()
        .find(|s| matches!(s, Stroke::Line { .. }))
        .or_else(|| sides.iter().flatten().copied().next())
}

/// A Typst sides dictionary with only the sides that are set.
fn sides_dict<T: Copy>(sides: &Sides<Option<T>>, format: impl Fn(T) -> String) -> Option<String> {
    let entries: Vec<String> = [
        ("top", sides.top),
        ("right", sides.right),
        ("bottom", sides.bottom),
        ("left", sides.left),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|v| format!("{name}: {}", format(v))))
    .collect();

    if entries.is_empty() {
        None
    } else {
        Some(format!("({})", entries.join(", ")))
    }
}
