use scraper::{ElementRef, Html, Node};

use sift_core::{BoundaryKind, ChunkStrategy};

use super::{char_len, pack, Piece, SplitConfig, Splitter, Unit};

/// Elements whose children are walked when the element is over the target.
const CONTAINERS: &[&str] = &[
    "html", "body", "main", "article", "section", "div", "header", "footer", "nav", "aside",
];

/// Elements that open a new section.
const SECTIONING: &[&str] = &["section", "article", "main", "nav", "aside", "header", "footer"];

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

/// Groups nodes into heading- and sectioning-delimited sections.
///
/// Chunk text is the parser's serialization of the document, so a chunk never
/// ends inside a tag unless a single element exceeds the hard-cut threshold.
pub struct HtmlSplitter;

impl Splitter for HtmlSplitter {
    fn strategy(&self) -> ChunkStrategy {
        ChunkStrategy::Html
    }

    fn split_oversized(&self, body: &str, config: &SplitConfig) -> Vec<Piece> {
        pack(html_units(body, config), config)
    }
}

fn html_units(body: &str, config: &SplitConfig) -> Vec<Unit> {
    let doc = Html::parse_document(body);
    let mut sections = SectionBuilder::new(config);

    for node in doc.tree.root().children() {
        match node.value() {
            Node::Doctype(doctype) => sections.glue(&format!("<!DOCTYPE {}>", doctype.name())),
            Node::Comment(comment) => sections.glue(&format!("<!--{}-->", &**comment)),
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(node) {
                    sections.visit(el);
                }
            }
            _ => {}
        }
    }
    sections.finish()
}

struct SectionBuilder {
    target: usize,
    hard: usize,
    units: Vec<Unit>,
    /// Serialized nodes of the open section.
    parts: Vec<String>,
    /// Markup seen before the open section's first content node.
    prefix: String,
    kind: BoundaryKind,
}

impl SectionBuilder {
    fn new(config: &SplitConfig) -> Self {
        Self {
            target: config.target_chunk_size.max(1),
            hard: config.hard_cut_threshold(),
            units: Vec::new(),
            parts: Vec::new(),
            prefix: String::new(),
            kind: BoundaryKind::Element,
        }
    }

    fn visit(&mut self, el: ElementRef<'_>) {
        let name = el.value().name();
        let outer = el.html();
        let descend =
            name == "html" || (CONTAINERS.contains(&name) && char_len(&outer) > self.target);

        if !descend {
            if name == "head" && el.children().next().is_none() {
                self.glue(&outer);
                return;
            }
            if HEADINGS.contains(&name) || SECTIONING.contains(&name) {
                self.start_section();
            }
            self.content(outer);
            return;
        }

        if SECTIONING.contains(&name) {
            self.start_section();
        }
        self.glue(&start_tag(el));
        for child in el.children() {
            match child.value() {
                Node::Text(text) => {
                    let escaped = escape_text(text);
                    if text.trim().is_empty() {
                        self.glue(&escaped);
                    } else {
                        self.content(escaped);
                    }
                }
                Node::Comment(comment) => self.glue(&format!("<!--{}-->", &**comment)),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        self.visit(child);
                    }
                }
                _ => {}
            }
        }
        self.close(&format!("</{name}>"));
    }

    fn glue(&mut self, markup: &str) {
        match self.parts.last_mut() {
            Some(last) => last.push_str(markup),
            None => self.prefix.push_str(markup),
        }
    }

    fn content(&mut self, markup: String) {
        let mut text = std::mem::take(&mut self.prefix);
        text.push_str(&markup);
        self.parts.push(text);
    }

    /// End tags stay with the section they close.
    fn close(&mut self, markup: &str) {
        if self.parts.is_empty() && self.prefix.is_empty() {
            if let Some(last) = self.units.last_mut() {
                last.text.push_str(markup);
                return;
            }
        }
        self.glue(markup);
    }

    fn start_section(&mut self) {
        if !self.parts.is_empty() {
            self.flush();
        }
        self.kind = BoundaryKind::Section;
    }

    /// Emit the open section. A section over the target is packed into
    /// sub-units; small leading parts (a heading) ride with the large part
    /// that follows them as long as the pair stays under the hard threshold.
    fn flush(&mut self) {
        let mut kind = self.kind;
        let mut acc = String::new();
        let mut acc_len = 0;

        for part in std::mem::take(&mut self.parts) {
            let len = char_len(&part);
            let fits = acc_len + len <= self.target
                || (len > self.target && acc_len + len <= self.hard);
            if !fits && !acc.is_empty() {
                self.units.push(Unit::new(std::mem::take(&mut acc), kind));
                kind = BoundaryKind::Element;
                acc_len = 0;
            }
            acc.push_str(&part);
            acc_len += len;
        }
        if !acc.is_empty() {
            self.units.push(Unit::new(acc, kind));
        }
        self.kind = BoundaryKind::Element;
    }

    fn finish(mut self) -> Vec<Unit> {
        if !self.parts.is_empty() {
            self.flush();
        }
        if !self.prefix.is_empty() {
            let rest = std::mem::take(&mut self.prefix);
            match self.units.last_mut() {
                Some(last) => last.text.push_str(&rest),
                None => self.units.push(Unit::new(rest, BoundaryKind::Element)),
            }
        }
        self.units
    }
}

fn start_tag(el: ElementRef<'_>) -> String {
    let mut tag = format!("<{}", el.value().name());
    for (name, value) in el.value().attrs() {
        tag.push(' ');
        tag.push_str(name);
        tag.push_str("=\"");
        tag.push_str(&escape_attr(value));
        tag.push('"');
    }
    tag.push('>');
    tag
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}
