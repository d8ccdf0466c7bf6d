use super::schema::{
    Extraction, ExtractionError, ExtractionResult, Form, FormInput, Image, Link, MetaTag,
    StructureStats,
};
use super::tree::{MarkupTree, NodeKind, TreeBuilder};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Elements whose text is left out of `raw_text`.
const HIDDEN_TEXT: &[&str] = &["script", "style"];

const FORM_CONTROLS: &[&str] = &["input", "select", "textarea"];

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("document is binary, not markup (NUL byte at offset {0})")]
    Binary(usize),
    #[error("{0}")]
    Other(String),
}

/// Turns raw document bytes into a [`MarkupTree`].
pub trait DocumentParser: Send + Sync {
    fn parse(&self, content: &[u8]) -> Result<MarkupTree, ParseError>;
}

/// HTML5 parser backed by `scraper` (html5ever). Tag soup is repaired, not
/// rejected. Bytes that are not UTF-8 decode to U+FFFD so legacy-encoded pages
/// still summarize; only binary content (a NUL byte) fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlParser;

impl DocumentParser for HtmlParser {
    fn parse(&self, content: &[u8]) -> Result<MarkupTree, ParseError> {
        if let Some(offset) = content.iter().position(|&b| b == 0) {
            return Err(ParseError::Binary(offset));
        }
        let source = String::from_utf8_lossy(content);
        let html = scraper::Html::parse_document(&source);

        let mut builder = TreeBuilder::new();
        // (node, closing) pairs; children are pushed in reverse so they pop in order.
        let mut stack = vec![(html.tree.root(), false)];
        while let Some((node, closing)) = stack.pop() {
            if closing {
                builder.close();
                continue;
            }
            match node.value() {
                scraper::Node::Element(element) => {
                    builder.open(element.name(), element.attrs());
                    stack.push((node, true));
                }
                scraper::Node::Text(text) => {
                    builder.text(&**text);
                    continue;
                }
                scraper::Node::Document | scraper::Node::Fragment => {}
                _ => continue,
            }
            let children: Vec<_> = node.children().collect();
            stack.extend(children.into_iter().rev().map(|child| (child, false)));
        }
        Ok(builder.finish())
    }
}

/// Derives an [`ExtractionResult`] from document bytes.
#[derive(Clone)]
pub struct ExtractionEngine {
    parser: Arc<dyn DocumentParser>,
}

impl Default for ExtractionEngine {
    fn default() -> Self {
        Self::new(Arc::new(HtmlParser))
    }
}

impl std::fmt::Debug for ExtractionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionEngine").finish_non_exhaustive()
    }
}

impl ExtractionEngine {
    pub fn new(parser: Arc<dyn DocumentParser>) -> Self {
        Self { parser }
    }

    /// Parse and summarize `content`. Parse failures come back as
    /// [`Extraction::Failed`]; this never errors.
    pub fn extract(&self, content: &[u8]) -> Extraction {
        match self.parser.parse(content) {
            Ok(tree) => Extraction::Extracted(summarize(&tree)),
            Err(err) => Extraction::Failed(ExtractionError {
                message: non_empty_message(err.to_string()),
            }),
        }
    }
}

fn non_empty_message(message: String) -> String {
    if message.trim().is_empty() {
        "document could not be parsed".to_string()
    } else {
        message
    }
}

/// Build the full summary from one parsed tree.
pub fn summarize(tree: &MarkupTree) -> ExtractionResult {
    ExtractionResult {
        title: tree
            .select(&["title"])
            .next()
            .map(|(index, _)| tree.text_of(index).trim().to_string()),
        headings_by_level: headings(tree),
        paragraphs: tree
            .select(&["p"])
            .map(|(index, _)| tree.text_of(index).trim().to_string())
            .filter(|text| !text.is_empty())
            .collect(),
        links: links(tree),
        images: images(tree),
        forms: forms(tree),
        meta_tags: meta_tags(tree),
        raw_text: tree.visible_text(HIDDEN_TEXT).trim().to_string(),
        structure_stats: structure_stats(tree),
    }
}

fn headings(tree: &MarkupTree) -> BTreeMap<u8, Vec<String>> {
    let mut by_level: BTreeMap<u8, Vec<String>> = BTreeMap::new();
    for (index, node) in tree.elements() {
        if let Some(level) = node.tag().and_then(heading_level) {
            by_level
                .entry(level)
                .or_default()
                .push(tree.text_of(index).trim().to_string());
        }
    }
    by_level
}

fn heading_level(tag: &str) -> Option<u8> {
    match tag.as_bytes() {
        [b'h', digit @ b'1'..=b'6'] => Some(digit - b'0'),
        _ => None,
    }
}

fn links(tree: &MarkupTree) -> Vec<Link> {
    tree.select(&["a"])
        .filter_map(|(index, node)| {
            let href = node.attr("href")?;
            Some(Link {
                text: tree.text_of(index).trim().to_string(),
                href: href.to_string(),
                title: owned(node.attr("title")),
            })
        })
        .collect()
}

fn images(tree: &MarkupTree) -> Vec<Image> {
    tree.select(&["img"])
        .filter_map(|(_, node)| {
            let src = node.attr("src")?;
            Some(Image {
                src: src.to_string(),
                alt: owned(node.attr("alt")),
                title: owned(node.attr("title")),
                width: owned(node.attr("width")),
                height: owned(node.attr("height")),
            })
        })
        .collect()
}

fn forms(tree: &MarkupTree) -> Vec<Form> {
    tree.select(&["form"])
        .map(|(index, form)| Form {
            action: owned(form.attr("action")),
            method: form.attr("method").unwrap_or("GET").to_string(),
            inputs: tree
                .descendants(index)
                .filter_map(|(_, node)| match &node.kind {
                    NodeKind::Element { name, .. } if FORM_CONTROLS.contains(&name.as_str()) => {
                        Some(FormInput {
                            kind: node.attr("type").unwrap_or(name).to_string(),
                            name: owned(node.attr("name")),
                            id: owned(node.attr("id")),
                            value: owned(node.attr("value")),
                        })
                    }
                    _ => None,
                })
                .collect(),
        })
        .collect()
}

fn meta_tags(tree: &MarkupTree) -> Vec<MetaTag> {
    tree.select(&["meta"])
        .map(|(_, node)| MetaTag {
            name: owned(node.attr("name")),
            property: owned(node.attr("property")),
            content: owned(node.attr("content")),
            charset: owned(node.attr("charset")),
        })
        .filter(|meta| !meta.is_empty())
        .collect()
}

fn structure_stats(tree: &MarkupTree) -> StructureStats {
    let mut stats = StructureStats::default();
    for (_, node) in tree.elements() {
        stats.total_elements += 1;
        match node.tag() {
            Some("div") => stats.div_count += 1,
            Some("span") => stats.span_count += 1,
            Some("table") => stats.table_count += 1,
            Some("ul" | "ol") => stats.list_count += 1,
            Some("script") => stats.script_count += 1,
            Some("style") => stats.style_count += 1,
            _ => {}
        }
    }
    stats
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

/// Whether `filename` ends in one of `extensions` (case-insensitive, without the dot).
pub fn is_markup_name(filename: &str, extensions: &[String]) -> bool {
    let lower = filename.to_ascii_lowercase();
    extensions.iter().any(|ext| {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        !ext.is_empty()
            && lower
                .strip_suffix(ext.as_str())
                .is_some_and(|stem| stem.ends_with('.'))
    })
}
