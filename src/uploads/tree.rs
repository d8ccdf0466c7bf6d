//! Owned markup tree used by the extraction engine.
//!
//! Nodes live in one arena in document (pre-order) order, so a node's
//! descendants always occupy the contiguous index range
//! `index + 1 .. subtree_end`. Traversals are plain slice walks; no recursion.

/// What a node holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element {
        /// Lowercase tag name.
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupNode {
    pub kind: NodeKind,
    parent: Option<usize>,
    subtree_end: usize,
}

impl MarkupNode {
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { name, .. } => Some(name),
            NodeKind::Text(_) => None,
        }
    }

    /// Attribute value by (case-insensitive) name. `None` on text nodes.
    pub fn attr(&self, key: &str) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(key))
                .map(|(_, value)| value.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }
}

/// A parsed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkupTree {
    nodes: Vec<MarkupNode>,
}

impl MarkupTree {
    pub fn node(&self, index: usize) -> &MarkupNode {
        &self.nodes[index]
    }

    /// Element nodes in document order, with their arena index.
    pub fn elements(&self) -> impl Iterator<Item = (usize, &MarkupNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| matches!(node.kind, NodeKind::Element { .. }))
    }

    /// Elements whose tag is one of `tags`, in document order.
    pub fn select<'a>(&'a self, tags: &'a [&'a str]) -> impl Iterator<Item = (usize, &'a MarkupNode)> + 'a {
        self.elements()
            .filter(move |(_, node)| node.tag().is_some_and(|tag| tags.contains(&tag)))
    }

    /// Descendants of `index` in document order (excluding `index` itself).
    pub fn descendants(&self, index: usize) -> impl Iterator<Item = (usize, &MarkupNode)> + '_ {
        let end = self.nodes[index].subtree_end;
        (index + 1..end).map(move |i| (i, &self.nodes[i]))
    }

    /// Concatenated text of every text node below `index`.
    pub fn text_of(&self, index: usize) -> String {
        let mut out = String::new();
        for (_, node) in self.descendants(index) {
            if let NodeKind::Text(text) = &node.kind {
                out.push_str(text);
            }
        }
        out
    }

    /// Concatenated text of the whole document, skipping anything inside an
    /// element listed in `hidden`.
    pub fn visible_text(&self, hidden: &[&str]) -> String {
        let mut out = String::new();
        let mut skip_until = 0;
        for (index, node) in self.nodes.iter().enumerate() {
            if index < skip_until {
                continue;
            }
            match &node.kind {
                NodeKind::Element { name, .. } if hidden.contains(&name.as_str()) => {
                    skip_until = node.subtree_end;
                }
                NodeKind::Element { .. } => {}
                NodeKind::Text(text) => out.push_str(text),
            }
        }
        out
    }
}

/// Incremental tree construction: `open`/`close` element pairs with `text`
/// in between, in document order.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    nodes: Vec<MarkupNode>,
    open: Vec<usize>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open<N, K, V>(&mut self, name: N, attrs: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        N: Into<String>,
        K: Into<String>,
        V: Into<String>,
    {
        let index = self.push(NodeKind::Element {
            name: name.into().to_ascii_lowercase(),
            attrs: attrs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        });
        self.open.push(index);
        self
    }

    pub fn text(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(NodeKind::Text(text.into()));
        self
    }

    /// Close the innermost open element. Extra closes are ignored.
    pub fn close(&mut self) -> &mut Self {
        if let Some(index) = self.open.pop() {
            self.nodes[index].subtree_end = self.nodes.len();
        }
        self
    }

    /// Shorthand for an element with only text content.
    pub fn leaf<N, K, V>(
        &mut self,
        name: N,
        attrs: impl IntoIterator<Item = (K, V)>,
        text: &str,
    ) -> &mut Self
    where
        N: Into<String>,
        K: Into<String>,
        V: Into<String>,
    {
        self.open(name, attrs);
        if !text.is_empty() {
            self.text(text);
        }
        self.close()
    }

    /// Finish the tree, closing any elements still open.
    pub fn finish(mut self) -> MarkupTree {
        while !self.open.is_empty() {
            self.close();
        }
        MarkupTree { nodes: self.nodes }
    }

    fn push(&mut self, kind: NodeKind) -> usize {
        let index = self.nodes.len();
        self.nodes.push(MarkupNode {
            kind,
            parent: self.open.last().copied(),
            subtree_end: index + 1,
        });
        index
    }
}
