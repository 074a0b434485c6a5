/// Inline text spans with formatting
#[derive(Debug, Clone, PartialEq)]
pub enum Span {
    Text(String),
    Bold(Vec<Span>),
    Italic(Vec<Span>),
    Code(String),
    Link { target: LinkTarget, content: Vec<Span> },
    LineBreak,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    Url(String),
    /// Fragment link to an element id in the same document
    Anchor(String),
}

/// A single list item, holding its own blocks (paragraphs, nested lists)
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub blocks: Vec<Block>,
}

/// A list (ordered or unordered)
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub ordered: bool,
    pub start: Option<u64>,
    pub tight: bool,
    pub items: Vec<ListItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Per-column alignment taken from the header cells
    pub alignments: Vec<Option<Alignment>>,
    pub headers: Vec<Vec<Span>>,
    pub rows: Vec<Vec<Vec<Span>>>,
}

impl Table {
    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }
}

/// Block-level elements of the document body
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading {
        level: u8,
        id: Option<String>,
        content: Vec<Span>,
    },
    Paragraph {
        content: Vec<Span>,
    },
    CodeBlock {
        language: Option<String>,
        content: String,
    },
    Quote(Vec<Block>),
    List(List),
    Table(Table),
    Rule,
}
