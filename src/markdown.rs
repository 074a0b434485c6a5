use std::collections::HashSet;

use pulldown_cmark::{CowStr, Event, HeadingLevel, LinkType, Options, Parser, Tag, TagEnd, html};

/// A paragraph holding only this text is replaced by the table of contents.
const TOC_MARKER: &str = "[TOC]";

/// A heading as it appears in the table of contents.
#[derive(Debug, Clone, PartialEq)]
struct Heading {
    level: u8,
    id: String,
    title: String,
}

struct TocEntry<'h> {
    heading: &'h Heading,
    children: Vec<TocEntry<'h>>,
}

/// Convert markdown text into an HTML fragment
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);

    let mut events = escape_raw_html(Parser::new_ext(markdown, options));
    let headings = anchor_headings(&mut events);
    let events = insert_toc(events, &headings);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    out
}

/// Raw HTML is shown as literal text so the fragment stays well-formed.
/// Comments are dropped; an HTML block left empty disappears.
fn escape_raw_html<'a>(events: impl Iterator<Item = Event<'a>>) -> Vec<Event<'a>> {
    let mut out = Vec::new();
    let mut block: Option<String> = None;

    for event in events {
        match event {
            Event::Start(Tag::HtmlBlock) => block = Some(String::new()),
            Event::End(TagEnd::HtmlBlock) => {
                let raw = block.take().unwrap_or_default();
                let text = strip_comments(&raw);
                let text = text.trim_end();
                if !text.trim_start().is_empty() {
                    out.push(Event::Start(Tag::Paragraph));
                    out.push(Event::Text(CowStr::from(text.to_string())));
                    out.push(Event::End(TagEnd::Paragraph));
                }
            }
            Event::Html(raw) if block.is_some() => {
                if let Some(text) = block.as_mut() {
                    text.push_str(&raw);
                }
            }
            Event::Html(raw) | Event::InlineHtml(raw) => {
                let text = strip_comments(&raw);
                if !text.is_empty() {
                    out.push(Event::Text(CowStr::from(text)));
                }
            }
            other => out.push(other),
        }
    }

    out
}

/// Remove `<!-- ... -->` comments; an unterminated one runs to the end.
fn strip_comments(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("<!--") {
        out.push_str(&rest[..start]);
        match rest[start + 4..].find("-->") {
            Some(end) => rest = &rest[start + 4 + end + 3..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Give every heading a unique id and collect them in document order.
fn anchor_headings(events: &mut [Event]) -> Vec<Heading> {
    let mut used = HashSet::new();
    let mut headings = Vec::new();

    for i in 0..events.len() {
        let level = match &events[i] {
            Event::Start(Tag::Heading { level, .. }) => *level,
            _ => continue,
        };
        let title = heading_text(&events[i + 1..]);
        let id = unique_slug(slugify(&title), &mut used);

        if let Event::Start(Tag::Heading { id: anchor, .. }) = &mut events[i] {
            *anchor = Some(CowStr::from(id.clone()));
        }
        headings.push(Heading {
            level: heading_level_to_u8(level),
            id,
            title,
        });
    }

    headings
}

fn heading_text(events: &[Event]) -> String {
    let mut title = String::new();
    for event in events {
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(text) | Event::Code(text) => title.push_str(text),
            Event::SoftBreak | Event::HardBreak => title.push(' '),
            _ => {}
        }
    }
    title.trim().to_string()
}

/// Lowercase the title, keep word characters, join words with `-`.
fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut separator = false;
    for ch in title.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() || ch == '_' {
            if separator && !slug.is_empty() {
                slug.push('-');
            }
            separator = false;
            slug.push(ch);
        } else if ch == '-' || ch.is_whitespace() {
            separator = true;
        }
    }
    slug
}

fn unique_slug(slug: String, used: &mut HashSet<String>) -> String {
    let mut candidate = slug.clone();
    let mut n = 1;
    while candidate.is_empty() || used.contains(&candidate) {
        candidate = format!("{slug}_{n}");
        n += 1;
    }
    used.insert(candidate.clone());
    candidate
}

fn insert_toc<'a>(events: Vec<Event<'a>>, headings: &[Heading]) -> Vec<Event<'a>> {
    let mut out = Vec::with_capacity(events.len());
    let mut events = events.into_iter().peekable();
    let mut pending: Vec<Event<'a>> = Vec::new();

    while let Some(event) = events.next() {
        if !matches!(event, Event::Start(Tag::Paragraph)) {
            out.push(event);
            continue;
        }

        // Buffer the paragraph while it could still be the marker
        pending.push(event);
        let mut text = String::new();
        let mut only_text = true;
        while let Some(next) = events.next_if(|e| !matches!(e, Event::End(TagEnd::Paragraph))) {
            match &next {
                Event::Text(t) => text.push_str(t),
                _ => only_text = false,
            }
            pending.push(next);
        }
        if let Some(end) = events.next() {
            pending.push(end);
        }

        if only_text && text.trim() == TOC_MARKER {
            pending.clear();
            toc_events(headings, &mut out);
        } else {
            out.append(&mut pending);
        }
    }

    out
}

fn toc_events<'a>(headings: &[Heading], out: &mut Vec<Event<'a>>) {
    let mut position = 0;
    let entries = nest(headings, &mut position, 0);

    out.push(Event::Html(CowStr::Borrowed("<div class=\"toc\">\n")));
    list_events(&entries, out);
    out.push(Event::Html(CowStr::Borrowed("</div>\n")));
}

/// Nest headings under the closest preceding heading of a lower level.
fn nest<'h>(headings: &'h [Heading], position: &mut usize, parent_level: u8) -> Vec<TocEntry<'h>> {
    let mut entries = Vec::new();
    while let Some(heading) = headings.get(*position) {
        if heading.level <= parent_level {
            break;
        }
        *position += 1;
        let children = nest(headings, position, heading.level);
        entries.push(TocEntry { heading, children });
    }
    entries
}

fn list_events<'a>(entries: &[TocEntry], out: &mut Vec<Event<'a>>) {
    if entries.is_empty() {
        return;
    }

    out.push(Event::Start(Tag::List(None)));
    for entry in entries {
        out.push(Event::Start(Tag::Item));
        out.push(Event::Start(Tag::Link {
            link_type: LinkType::Inline,
            dest_url: CowStr::from(format!("#{}", entry.heading.id)),
            title: CowStr::Borrowed(""),
            id: CowStr::Borrowed(""),
        }));
        out.push(Event::Text(CowStr::from(entry.heading.title.clone())));
        out.push(Event::End(TagEnd::Link));
        list_events(&entry.children, out);
        out.push(Event::End(TagEnd::Item));
    }
    out.push(Event::End(TagEnd::List(false)));
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_gets_id() {
        assert_eq!(
            markdown_to_html("# Hello World"),
            "<h1 id=\"hello-world\">Hello World</h1>\n"
        );
    }

    #[test]
    fn paragraph_and_emphasis() {
        assert_eq!(
            markdown_to_html("Some *italic* and **bold** text."),
            "<p>Some <em>italic</em> and <strong>bold</strong> text.</p>\n"
        );
    }

    #[test]
    fn no_markdown_markers_left() {
        let md = "# One\n\n## Two\n\n```rust\nlet x = 1;\n```\n\n- a\n- b\n\n1. c\n2. d\n\n---\n\n[link](https://example.com)\n";
        let html = markdown_to_html(md);
        assert!(!html.contains("```"));
        assert!(!html.lines().any(|line| line.starts_with('#')));
        assert!(html.contains("<h2 id=\"two\">Two</h2>"));
        assert!(html.contains("<code class=\"language-rust\">"));
        assert!(html.contains("<ul>"));
        assert!(html.contains("<ol>"));
        assert!(html.contains("<hr />"));
        assert!(html.contains("<a href=\"https://example.com\">link</a>"));
    }

    #[test]
    fn table_cells_and_rows() {
        let md = "| A | B | C |\n|---|:-:|---|\n| 1 | 2 | 3 |\n| 4 | 5 | 6 |\n";
        let html = markdown_to_html(md);
        assert_eq!(html.matches("</th>").count(), 3);
        // header row plus one row per data row
        assert_eq!(html.matches("<tr>").count(), 3);
        assert!(html.contains("<th style=\"text-align: center\">B</th>"));
    }

    #[test]
    fn duplicate_headings_get_suffixes() {
        let html = markdown_to_html("# Intro\n\n# Intro\n\n# Intro");
        assert!(html.contains("id=\"intro\""));
        assert!(html.contains("id=\"intro_1\""));
        assert!(html.contains("id=\"intro_2\""));
    }

    #[test]
    fn slug_rules() {
        assert_eq!(slugify("Hello,  World!"), "hello-world");
        assert_eq!(slugify("a - b"), "a-b");
        assert_eq!(slugify("  snake_case  "), "snake_case");
        assert_eq!(slugify("???"), "");

        let mut used = HashSet::new();
        assert_eq!(unique_slug(String::new(), &mut used), "_1");
        assert_eq!(unique_slug(String::new(), &mut used), "_2");
    }

    #[test]
    fn toc_marker_is_replaced() {
        let md = "[TOC]\n\n# A\n\n## B\n\n## C\n\n# D\n";
        let html = markdown_to_html(md);
        assert!(!html.contains("[TOC]"));
        assert!(html.starts_with(
            "<div class=\"toc\">\n<ul>\n<li><a href=\"#a\">A</a>\n<ul>\n<li><a href=\"#b\">B</a></li>\n<li><a href=\"#c\">C</a></li>\n</ul>\n</li>\n<li><a href=\"#d\">D</a></li>\n</ul>\n</div>\n"
        ));
    }

    #[test]
    fn toc_marker_inside_text_is_kept() {
        let html = markdown_to_html("See [TOC] here");
        assert!(html.contains("See [TOC] here"));
        assert!(!html.contains("class=\"toc\""));
    }

    #[test]
    fn raw_html_is_escaped() {
        let html = markdown_to_html("<div>hi</div>\n\nA <b>bold</b> tag");
        assert!(html.contains("&lt;div&gt;hi&lt;/div&gt;"));
        assert!(html.contains("A &lt;b&gt;bold&lt;/b&gt; tag"));
        assert!(!html.contains("<div>"));
    }

    #[test]
    fn html_comments_are_dropped() {
        let md = "<!-- note -->\n\nText <!-- aside --> here\n\n<!--\nmulti\nline\n-->\n\n<div>kept <!-- x --></div>\n";
        let html = markdown_to_html(md);
        assert!(!html.contains("note"));
        assert!(!html.contains("aside"));
        assert!(!html.contains("multi"));
        assert!(!html.contains("&lt;!--"));
        assert!(!html.contains("<p></p>"));
        assert!(html.contains("<p>Text  here</p>"));
        assert!(html.contains("<p>&lt;div&gt;kept &lt;/div&gt;</p>"));
    }

    #[test]
    fn malformed_markdown_passes_through() {
        let html = markdown_to_html("**unclosed and [broken](link");
        assert!(html.starts_with("<p>"));
        assert!(html.contains("**unclosed"));
    }

    #[test]
    fn empty_input() {
        assert_eq!(markdown_to_html(""), "");
    }
}
