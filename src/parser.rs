use crate::block::{Alignment, Block, LinkTarget, List, ListItem, Span, Table};
use crate::dom::{Element, Node};

/// Elements that start a new block; everything else is inline.
const BLOCK_ELEMENTS: &[&str] = &[
    "#document", "address", "article", "aside", "blockquote", "body", "dd", "div", "dl", "dt",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "head", "header", "hr", "html", "li",
    "main", "nav", "ol", "p", "pre", "script", "section", "style", "table", "tbody", "td", "tfoot",
    "th", "thead", "title", "tr", "ul",
];

/// Parse the children of an HTML body into a list of blocks
pub fn parse(body: &Element) -> Vec<Block> {
    let mut blocks = Vec::new();
    blocks_from_nodes(&body.children, &mut blocks);
    blocks
}

fn is_block(name: &str) -> bool {
    BLOCK_ELEMENTS.contains(&name)
}

fn blocks_from_nodes(nodes: &[Node], blocks: &mut Vec<Block>) {
    // Loose inline content between blocks becomes an anonymous paragraph
    let mut pending: Vec<Span> = Vec::new();

    for node in nodes {
        match node {
            Node::Text(text) => push_text(text, &mut pending),
            Node::Element(element) if is_block(&element.name) => {
                flush_paragraph(&mut pending, blocks);
                block_from_element(element, blocks);
            }
            Node::Element(element) => span_from_element(element, &mut pending),
        }
    }

    flush_paragraph(&mut pending, blocks);
}

fn flush_paragraph(pending: &mut Vec<Span>, blocks: &mut Vec<Block>) {
    let mut content = std::mem::take(pending);
    trim_spans(&mut content);
    if !content.is_empty() {
        blocks.push(Block::Paragraph { content });
    }
}

fn block_from_element(element: &Element, blocks: &mut Vec<Block>) {
    match element.name.as_str() {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = element.name.as_bytes()[1] - b'0';
            let mut content = spans_from_nodes(&element.children);
            trim_spans(&mut content);
            blocks.push(Block::Heading {
                level,
                id: element.attr("id").map(str::to_string),
                content,
            });
        }
        "p" | "dt" | "dd" | "address" => {
            let mut content = spans_from_nodes(&element.children);
            trim_spans(&mut content);
            if !content.is_empty() {
                blocks.push(Block::Paragraph { content });
            }
        }
        "pre" => blocks.push(code_block(element)),
        "blockquote" => {
            let mut inner = Vec::new();
            blocks_from_nodes(&element.children, &mut inner);
            blocks.push(Block::Quote(inner));
        }
        "ul" | "ol" => blocks.push(Block::List(list(element))),
        "table" => blocks.push(Block::Table(table(element))),
        "hr" => blocks.push(Block::Rule),
        "head" | "style" | "script" | "title" => {}
        // Containers: div, section, a stray li or table part, ...
        _ => blocks_from_nodes(&element.children, blocks),
    }
}

fn code_block(pre: &Element) -> Block {
    let language = pre
        .find("code")
        .and_then(|code| code.attr("class"))
        .and_then(|class| {
            class
                .split_whitespace()
                .find_map(|c| c.strip_prefix("language-"))
                .map(str::to_string)
        });

    let mut content = pre.text();
    if content.ends_with('\n') {
        content.pop();
    }

    Block::CodeBlock { language, content }
}

fn list(element: &Element) -> List {
    let ordered = element.name == "ol";
    let start = if ordered {
        element.attr("start").and_then(|s| s.trim().parse().ok())
    } else {
        None
    };

    let mut tight = true;
    let mut items = Vec::new();
    for li in element.elements().filter(|e| e.name == "li") {
        if li.elements().any(|e| e.name == "p") {
            tight = false;
        }
        let mut blocks = Vec::new();
        blocks_from_nodes(&li.children, &mut blocks);
        items.push(ListItem { blocks });
    }

    List {
        ordered,
        start,
        tight,
        items,
    }
}

fn table(element: &Element) -> Table {
    let mut headers: Vec<Vec<Span>> = Vec::new();
    let mut alignments = Vec::new();
    let mut rows = Vec::new();

    let mut sections: Vec<(&Element, bool)> = Vec::new();
    for child in element.elements() {
        match child.name.as_str() {
            "thead" => sections.extend(child.elements().map(|tr| (tr, true))),
            "tbody" | "tfoot" => sections.extend(child.elements().map(|tr| (tr, false))),
            "tr" => sections.push((child, false)),
            _ => {}
        }
    }

    for (tr, in_head) in sections {
        if tr.name != "tr" {
            continue;
        }
        let cells: Vec<&Element> = tr
            .elements()
            .filter(|c| c.name == "th" || c.name == "td")
            .collect();
        let all_th = !cells.is_empty() && cells.iter().all(|c| c.name == "th");

        // The first row of th cells is the header even without a thead
        if headers.is_empty() && rows.is_empty() && (in_head || all_th) {
            alignments = cells.iter().map(|c| cell_alignment(c)).collect();
            headers = cells.iter().map(|c| cell_spans(c)).collect();
        } else {
            rows.push(cells.iter().map(|c| cell_spans(c)).collect());
        }
    }

    Table {
        alignments,
        headers,
        rows,
    }
}

fn cell_spans(cell: &Element) -> Vec<Span> {
    let mut content = spans_from_nodes(&cell.children);
    trim_spans(&mut content);
    content
}

/// Read `text-align` from a cell's inline style.
fn cell_alignment(cell: &Element) -> Option<Alignment> {
    let style = cell.attr("style")?;
    style.split(';').find_map(|declaration| {
        let (property, value) = declaration.split_once(':')?;
        if !property.trim().eq_ignore_ascii_case("text-align") {
            return None;
        }
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" => Some(Alignment::Right),
            _ => None,
        }
    })
}

fn spans_from_nodes(nodes: &[Node]) -> Vec<Span> {
    let mut spans = Vec::new();
    for node in nodes {
        match node {
            Node::Text(text) => push_text(text, &mut spans),
            Node::Element(element) => span_from_element(element, &mut spans),
        }
    }
    spans
}

fn span_from_element(element: &Element, spans: &mut Vec<Span>) {
    match element.name.as_str() {
        "strong" | "b" => spans.push(Span::Bold(spans_from_nodes(&element.children))),
        "em" | "i" => spans.push(Span::Italic(spans_from_nodes(&element.children))),
        "code" | "kbd" | "samp" | "tt" => spans.push(Span::Code(element.text())),
        "br" => spans.push(Span::LineBreak),
        "img" => {
            if let Some(alt) = element.attr("alt") {
                push_text(alt, spans);
            }
        }
        "a" => {
            let content = spans_from_nodes(&element.children);
            match link_target(element.attr("href")) {
                Some(target) => spans.push(Span::Link { target, content }),
                None => spans.extend(content),
            }
        }
        "script" | "style" => {}
        _ => spans.extend(spans_from_nodes(&element.children)),
    }
}

fn link_target(href: Option<&str>) -> Option<LinkTarget> {
    let href = href?.trim();
    if let Some(anchor) = href.strip_prefix('#') {
        if anchor.is_empty() {
            return None;
        }
        return Some(LinkTarget::Anchor(percent_decode(anchor)));
    }
    if href.is_empty() {
        return None;
    }
    Some(LinkTarget::Url(href.to_string()))
}

/// Undo the `%XX` escaping HTML writers apply to non-ASCII hrefs.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = bytes
            .get(i + 1..i + 3)
            .filter(|hex| bytes[i] == b'%' && hex.iter().all(u8::is_ascii_hexdigit))
            .and_then(|hex| std::str::from_utf8(hex).ok())
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        match escaped {
            Some(byte) => {
                out.push(byte);
                i += 3;
            }
            None => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Append text, collapsing whitespace runs into single spaces.
fn push_text(text: &str, spans: &mut Vec<Span>) {
    let mut collapsed = String::with_capacity(text.len());
    let mut in_space = matches!(spans.last(), Some(Span::Text(prev)) if prev.ends_with(' '));
    for ch in text.chars() {
        // U+00A0 is not collapsible
        if ch.is_whitespace() && ch != '\u{a0}' {
            if !in_space {
                collapsed.push(' ');
            }
            in_space = true;
        } else {
            collapsed.push(ch);
            in_space = false;
        }
    }
    if collapsed.is_empty() {
        return;
    }

    if let Some(Span::Text(prev)) = spans.last_mut() {
        prev.push_str(&collapsed);
    } else {
        spans.push(Span::Text(collapsed));
    }
}

/// Drop whitespace at the edges of a block's inline content.
fn trim_spans(spans: &mut Vec<Span>) {
    if let Some(Span::Text(text)) = spans.first_mut() {
        *text = text.trim_start().to_string();
    }
    if let Some(Span::Text(text)) = spans.last_mut() {
        *text = text.trim_end().to_string();
    }
    spans.retain(|span| !matches!(span, Span::Text(text) if text.is_empty()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom;

    fn blocks(html: &str) -> Vec<Block> {
        parse(&dom::parse(html).unwrap())
    }

    fn text(s: &str) -> Span {
        Span::Text(s.to_string())
    }

    #[test]
    fn heading_with_id() {
        assert_eq!(
            blocks("<h2 id=\"intro\">Intro</h2>"),
            vec![Block::Heading {
                level: 2,
                id: Some("intro".to_string()),
                content: vec![text("Intro")],
            }]
        );
    }

    #[test]
    fn whitespace_collapses() {
        assert_eq!(
            blocks("<p>  one\n   two <strong> three </strong> four\n</p>\n"),
            vec![Block::Paragraph {
                content: vec![
                    text("one two "),
                    Span::Bold(vec![text(" three ")]),
                    text(" four"),
                ],
            }]
        );
    }

    #[test]
    fn whitespace_between_blocks_is_dropped() {
        let result = blocks("<p>a</p>\n\n<hr />\n<p>b</p>\n");
        assert_eq!(result.len(), 3);
        assert_eq!(result[1], Block::Rule);
    }

    #[test]
    fn inline_formatting() {
        let result = blocks(
            "<p><em>i</em><code>c &lt; d</code><a href=\"https://x.org\">x</a><a href=\"#top\">t</a><br />end</p>",
        );
        assert_eq!(
            result,
            vec![Block::Paragraph {
                content: vec![
                    Span::Italic(vec![text("i")]),
                    Span::Code("c < d".to_string()),
                    Span::Link {
                        target: LinkTarget::Url("https://x.org".to_string()),
                        content: vec![text("x")],
                    },
                    Span::Link {
                        target: LinkTarget::Anchor("top".to_string()),
                        content: vec![text("t")],
                    },
                    Span::LineBreak,
                    text("end"),
                ],
            }]
        );
    }

    #[test]
    fn fragment_links_are_percent_decoded() {
        let result = blocks("<p><a href=\"#area-in-m%C2%B2\">m</a><a href=\"#100%\">p</a></p>");
        let Block::Paragraph { content } = &result[0] else {
            panic!("expected paragraph");
        };
        assert!(matches!(
            &content[0],
            Span::Link { target: LinkTarget::Anchor(id), .. } if id == "area-in-m\u{b2}"
        ));
        assert!(matches!(
            &content[1],
            Span::Link { target: LinkTarget::Anchor(id), .. } if id == "100%"
        ));
    }

    #[test]
    fn image_renders_alt_text() {
        assert_eq!(
            blocks("<p><img src=\"a.png\" alt=\"A chart\" /></p>"),
            vec![Block::Paragraph {
                content: vec![text("A chart")]
            }]
        );
    }

    #[test]
    fn code_block_language() {
        assert_eq!(
            blocks("<pre><code class=\"language-rust\">let x = 1;\n</code></pre>"),
            vec![Block::CodeBlock {
                language: Some("rust".to_string()),
                content: "let x = 1;".to_string(),
            }]
        );
    }

    #[test]
    fn tight_nested_list() {
        let result = blocks("<ol start=\"3\">\n<li>one\n<ul>\n<li>inner</li>\n</ul>\n</li>\n<li>two</li>\n</ol>\n");
        let Block::List(list) = &result[0] else {
            panic!("expected list, got {result:?}");
        };
        assert!(list.ordered);
        assert!(list.tight);
        assert_eq!(list.start, Some(3));
        assert_eq!(list.items.len(), 2);
        assert_eq!(
            list.items[0].blocks[0],
            Block::Paragraph {
                content: vec![text("one")]
            }
        );
        assert!(matches!(&list.items[0].blocks[1], Block::List(inner) if !inner.ordered));
    }

    #[test]
    fn loose_list() {
        let result = blocks("<ul>\n<li>\n<p>a</p>\n</li>\n<li>\n<p>b</p>\n</li>\n</ul>\n");
        let Block::List(list) = &result[0] else {
            panic!("expected list");
        };
        assert!(!list.tight);
        assert_eq!(list.start, None);
    }

    #[test]
    fn table_with_alignment() {
        let html = "<table>\n<thead>\n<tr>\n<th>A</th>\n<th style=\"text-align: right\">B</th>\n</tr>\n</thead>\n<tbody>\n<tr>\n<td>1</td>\n<td style=\"text-align: right\">2</td>\n</tr>\n</tbody>\n</table>\n";
        let Block::Table(table) = &blocks(html)[0] else {
            panic!("expected table");
        };
        assert_eq!(table.headers, vec![vec![text("A")], vec![text("B")]]);
        assert_eq!(table.alignments, vec![None, Some(Alignment::Right)]);
        assert_eq!(table.rows, vec![vec![vec![text("1")], vec![text("2")]]]);
        assert_eq!(table.column_count(), 2);
    }

    #[test]
    fn table_without_header() {
        let Block::Table(table) = &blocks("<table><tr><td>x</td></tr></table>")[0] else {
            panic!("expected table");
        };
        assert!(table.headers.is_empty());
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn containers_are_flattened() {
        let result = blocks("<div class=\"toc\">\n<ul>\n<li><a href=\"#a\">A</a></li>\n</ul>\n</div>\n<h1 id=\"a\">A</h1>");
        assert!(matches!(result[0], Block::List(_)));
        assert!(matches!(result[1], Block::Heading { level: 1, .. }));
    }

    #[test]
    fn loose_text_becomes_paragraph() {
        assert_eq!(
            blocks("just text"),
            vec![Block::Paragraph {
                content: vec![text("just text")]
            }]
        );
        assert!(blocks("  \n ").is_empty());
    }

    #[test]
    fn blockquote() {
        assert_eq!(
            blocks("<blockquote>\n<p>q</p>\n</blockquote>"),
            vec![Block::Quote(vec![Block::Paragraph {
                content: vec![text("q")]
            }])]
        );
    }
}
