//! Mutable HTML fragment tree used by the rewriting passes.
//!
//! Fragments are parsed with html5ever and copied into an arena so passes
//! can split text nodes and insert siblings while walking, using stable
//! [`NodeId`] handles instead of reference-counted pointers.

use html5ever::tendril::TendrilSink;
use html5ever::{ParseOpts, QualName, local_name, namespace_url, ns, parse_fragment};
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

/// Elements that never have closing tags.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose text content is serialized without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "style", "script", "xmp", "iframe", "noembed", "noframes", "plaintext",
];

/// Handle to a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Element attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Node payload.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Root of a parsed fragment
    Fragment,
    Element {
        name: String,
        attrs: Vec<Attribute>,
    },
    Text(String),
    Comment(String),
    /// Pre-rendered HTML emitted verbatim and never walked
    Raw(String),
}

#[derive(Debug)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

/// Arena-backed HTML fragment.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    /// Creates an empty fragment.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Fragment,
                parent: None,
                first_child: None,
                last_child: None,
                prev_sibling: None,
                next_sibling: None,
            }],
        }
    }

    /// Parses an HTML fragment in `<body>` context.
    pub fn parse_fragment(html: &str) -> Self {
        let dom = parse_fragment(
            RcDom::default(),
            ParseOpts::default(),
            QualName::new(None, ns!(html), local_name!("body")),
            Vec::new(),
        )
        .one(html);

        let mut doc = Self::new();
        let root = doc.root();

        // The fragment parser wraps the content in a synthetic <html> element
        let children = dom.document.children.borrow();
        if let Some(html_element) = children.first() {
            for child in html_element.children.borrow().iter() {
                doc.import(root, child);
            }
        }
        doc
    }

    fn import(&mut self, parent: NodeId, handle: &Handle) {
        let data = match &handle.data {
            RcNodeData::Element { name, attrs, .. } => NodeData::Element {
                name: name.local.to_string(),
                attrs: attrs
                    .borrow()
                    .iter()
                    .map(|attr| Attribute::new(qualified_attr_name(&attr.name), attr.value.to_string()))
                    .collect(),
            },
            RcNodeData::Text { contents } => NodeData::Text(contents.borrow().to_string()),
            RcNodeData::Comment { contents } => NodeData::Comment(contents.to_string()),
            _ => return,
        };

        let id = self.push(data);
        self.append_child(parent, id);
        for child in handle.children.borrow().iter() {
            self.import(id, child);
        }
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node {
            data,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Fragment root.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0].data
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].first_child
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].next_sibling
    }

    /// Direct children of `id`, in order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut children = Vec::new();
        let mut child = self.first_child(id);
        while let Some(c) = child {
            children.push(c);
            child = self.next_sibling(c);
        }
        children
    }

    /// All descendants of `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).into_iter().rev());
        }
        out
    }

    /// Creates a detached element.
    pub fn create_element(&mut self, name: &str, attrs: Vec<Attribute>) -> NodeId {
        self.push(NodeData::Element {
            name: name.to_string(),
            attrs,
        })
    }

    /// Creates a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Text(text.into()))
    }

    /// Creates a detached raw HTML node.
    pub fn create_raw(&mut self, html: impl Into<String>) -> NodeId {
        self.push(NodeData::Raw(html.into()))
    }

    /// Unlinks `id` from its parent and siblings.
    pub fn detach(&mut self, id: NodeId) {
        let (parent, prev, next) = {
            let node = &self.nodes[id.0];
            (node.parent, node.prev_sibling, node.next_sibling)
        };

        match prev {
            Some(p) => self.nodes[p.0].next_sibling = next,
            None => {
                if let Some(parent) = parent {
                    self.nodes[parent.0].first_child = next;
                }
            }
        }
        match next {
            Some(n) => self.nodes[n.0].prev_sibling = prev,
            None => {
                if let Some(parent) = parent {
                    self.nodes[parent.0].last_child = prev;
                }
            }
        }

        let node = &mut self.nodes[id.0];
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
    }

    /// Appends `child` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        let last = self.nodes[parent.0].last_child;
        {
            let node = &mut self.nodes[child.0];
            node.parent = Some(parent);
            node.prev_sibling = last;
        }
        match last {
            Some(l) => self.nodes[l.0].next_sibling = Some(child),
            None => self.nodes[parent.0].first_child = Some(child),
        }
        self.nodes[parent.0].last_child = Some(child);
    }

    /// Inserts `new` immediately before `sibling`.
    pub fn insert_before(&mut self, sibling: NodeId, new: NodeId) {
        self.detach(new);
        let (parent, prev) = {
            let node = &self.nodes[sibling.0];
            (node.parent, node.prev_sibling)
        };
        {
            let node = &mut self.nodes[new.0];
            node.parent = parent;
            node.prev_sibling = prev;
            node.next_sibling = Some(sibling);
        }
        self.nodes[sibling.0].prev_sibling = Some(new);
        match prev {
            Some(p) => self.nodes[p.0].next_sibling = Some(new),
            None => {
                if let Some(parent) = parent {
                    self.nodes[parent.0].first_child = Some(new);
                }
            }
        }
    }

    /// Inserts `new` immediately after `sibling`.
    pub fn insert_after(&mut self, sibling: NodeId, new: NodeId) {
        match self.next_sibling(sibling) {
            Some(next) => self.insert_before(next, new),
            None => {
                if let Some(parent) = self.parent(sibling) {
                    self.append_child(parent, new);
                }
            }
        }
    }

    /// Replaces the byte range `start..end` of text node `id` with `new`.
    ///
    /// The text before the range stays in `id`; the text after it moves to
    /// a new text node following `new`.
    pub fn split_text(&mut self, id: NodeId, start: usize, end: usize, new: NodeId) {
        let NodeData::Text(text) = &mut self.nodes[id.0].data else {
            return;
        };
        let after = text[end..].to_string();
        text.truncate(start);

        self.insert_after(id, new);
        if !after.is_empty() {
            let after = self.create_text(after);
            self.insert_after(new, after);
        }
    }

    /// Text of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Local name of an element node.
    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Attribute value of an element node.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|a| a.name == name)
                .map(|a| a.value.as_str()),
            _ => None,
        }
    }

    /// Sets an attribute, replacing an existing one in place.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[id.0].data {
            let value = value.into();
            match attrs.iter_mut().find(|a| a.name == name) {
                Some(attr) => attr.value = value,
                None => attrs.push(Attribute::new(name, value)),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[id.0].data {
            attrs.retain(|a| a.name != name);
        }
    }

    /// Whether the element's class list contains `class`.
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
    }

    /// Appends `class` to the element's class list.
    pub fn add_class(&mut self, id: NodeId, class: &str) {
        let classes = match self.attr(id, "class") {
            Some(existing) if !existing.is_empty() => format!("{} {}", existing, class),
            _ => class.to_string(),
        };
        self.set_attr(id, "class", classes);
    }

    /// Concatenated text of `id` and its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(text) = self.text(id) {
            out.push_str(text);
        }
        for node in self.descendants(id) {
            if let Some(text) = self.text(node) {
                out.push_str(text);
            }
        }
        out
    }

    /// Serializes the whole fragment.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for child in self.children(self.root()) {
            self.write_node(child, &mut out, false);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String, raw_text: bool) {
        match &self.nodes[id.0].data {
            NodeData::Fragment => {
                for child in self.children(id) {
                    self.write_node(child, out, false);
                }
            }
            NodeData::Element { name, attrs } => {
                out.push('<');
                out.push_str(name);
                for attr in attrs {
                    out.push(' ');
                    out.push_str(&attr.name);
                    out.push_str("=\"");
                    escape_into(out, &attr.value, true);
                    out.push('"');
                }
                out.push('>');

                if VOID_ELEMENTS.contains(&name.as_str()) {
                    return;
                }

                let raw = RAW_TEXT_ELEMENTS.contains(&name.as_str());
                for child in self.children(id) {
                    self.write_node(child, out, raw);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            NodeData::Text(text) if raw_text => out.push_str(text),
            NodeData::Text(text) => escape_into(out, text, false),
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Raw(html) => out.push_str(html),
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn qualified_attr_name(name: &QualName) -> String {
    match &name.prefix {
        Some(prefix) => format!("{}:{}", prefix, name.local),
        None => name.local.to_string(),
    }
}

/// Escapes text or attribute content the way HTML serializers do.
pub fn escape_into(out: &mut String, text: &str, attr_mode: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attr_mode => out.push_str("&quot;"),
            '<' if !attr_mode => out.push_str("&lt;"),
            '>' if !attr_mode => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

/// Escapes text for inclusion in HTML element content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_into(&mut out, text, false);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_serialize_round_trip() {
        // Arrange
        let html = r#"<p>Hello <a href="/x?a=1&amp;b=2">world</a><br>end</p>"#;

        // Act
        let doc = Document::parse_fragment(html);

        // Assert
        assert_eq!(doc.to_html(), html);
    }

    #[test]
    fn test_text_is_escaped() {
        // Arrange
        let doc = Document::parse_fragment("<p>1 &lt; 2 &amp;&amp; 3 &gt; 2</p>");

        // Act
        let html = doc.to_html();

        // Assert
        assert_eq!(html, "<p>1 &lt; 2 &amp;&amp; 3 &gt; 2</p>");
    }

    #[test]
    fn test_split_text_inserts_between() {
        // Arrange
        let mut doc = Document::parse_fragment("<p>say hi there</p>");
        let p = doc.first_child(doc.root()).expect("Should have paragraph");
        let text = doc.first_child(p).expect("Should have text");
        let strong = doc.create_element("strong", Vec::new());
        let inner = doc.create_text("hi");
        doc.append_child(strong, inner);

        // Act
        doc.split_text(text, 4, 6, strong);

        // Assert
        assert_eq!(doc.to_html(), "<p>say <strong>hi</strong> there</p>");
        assert_eq!(doc.children(p).len(), 3);
    }

    #[test]
    fn test_split_text_at_end_adds_no_trailing_node() {
        // Arrange
        let mut doc = Document::parse_fragment("ab");
        let text = doc.first_child(doc.root()).expect("Should have text");
        let raw = doc.create_raw("<b>B</b>");

        // Act
        doc.split_text(text, 1, 2, raw);

        // Assert
        assert_eq!(doc.to_html(), "a<b>B</b>");
        assert_eq!(doc.next_sibling(raw), None);
    }

    #[test]
    fn test_detach_and_insert_before() {
        // Arrange
        let mut doc = Document::parse_fragment("<i>a</i><b>b</b>");
        let i = doc.first_child(doc.root()).expect("Should have <i>");
        let b = doc.next_sibling(i).expect("Should have <b>");

        // Act
        doc.detach(b);
        doc.insert_before(i, b);

        // Assert
        assert_eq!(doc.to_html(), "<b>b</b><i>a</i>");
    }

    #[test]
    fn test_attributes() {
        // Arrange
        let mut doc = Document::parse_fragment(r#"<span class="a">x</span>"#);
        let span = doc.first_child(doc.root()).expect("Should have span");

        // Act
        doc.add_class(span, "b");
        doc.set_attr(span, "title", "say \"hi\"");

        // Assert
        assert!(doc.has_class(span, "b"));
        assert_eq!(
            doc.to_html(),
            r#"<span class="a b" title="say &quot;hi&quot;">x</span>"#
        );
    }

    #[test]
    fn test_raw_text_elements_not_escaped() {
        // Arrange
        let doc = Document::parse_fragment("<style>a > b { color: red }</style>");

        // Act & Assert
        assert_eq!(doc.to_html(), "<style>a > b { color: red }</style>");
    }

    #[test]
    fn test_text_content_and_descendants() {
        // Arrange
        let doc = Document::parse_fragment("<h1>Hello <em>big</em> world</h1>");
        let h1 = doc.first_child(doc.root()).expect("Should have heading");

        // Act & Assert
        assert_eq!(doc.text_content(h1), "Hello big world");
        assert_eq!(doc.descendants(h1).len(), 4);
    }
}
