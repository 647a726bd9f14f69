use super::*;

const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH: usize = 2 * 1024 * 1024;

/// Arena index of a node inside one parsed document.
///
/// Indices are assigned in parse order, so comparing two ids of the same
/// document compares their document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub(crate) enum NodeType {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) node_type: NodeType,
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) tag_name: String,
    pub(crate) attrs: Vec<(String, String)>,
    pub(crate) line: usize,
}

impl Element {
    pub(crate) fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub(crate) fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(key, _)| key == name)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Dom {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    id_index: HashMap<String, NodeId>,
}

impl Dom {
    pub(crate) fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            node_type: NodeType::Document,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            id_index: HashMap::new(),
        }
    }

    fn create_node(&mut self, parent: NodeId, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            node_type,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub(crate) fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: String,
        attrs: Vec<(String, String)>,
        line: usize,
    ) -> NodeId {
        let id_attr = attrs
            .iter()
            .find(|(key, _)| key == "id")
            .map(|(_, value)| value.clone());
        let id = self.create_node(
            parent,
            NodeType::Element(Element {
                tag_name,
                attrs,
                line,
            }),
        );
        // getElementById semantics: the first element carrying an id wins.
        if let Some(id_attr) = id_attr {
            self.id_index.entry(id_attr).or_insert(id);
        }
        id
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        if let Some(last) = self.nodes[parent.0].children.last().copied() {
            if let NodeType::Text(existing) = &mut self.nodes[last.0].node_type {
                existing.push_str(&text);
                return last;
            }
        }
        self.create_node(parent, NodeType::Text(text))
    }

    pub(crate) fn contains(&self, node_id: NodeId) -> bool {
        node_id.0 < self.nodes.len()
    }

    pub(crate) fn element(&self, node_id: NodeId) -> Option<&Element> {
        match &self.nodes.get(node_id.0)?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn text(&self, node_id: NodeId) -> Option<&str> {
        match &self.nodes.get(node_id.0)?.node_type {
            NodeType::Text(text) => Some(text),
            _ => None,
        }
    }

    pub(crate) fn is_element(&self, node_id: NodeId) -> bool {
        self.element(node_id).is_some()
    }

    pub(crate) fn tag_name(&self, node_id: NodeId) -> Option<&str> {
        self.element(node_id).map(|element| element.tag_name.as_str())
    }

    pub(crate) fn has_tag(&self, node_id: NodeId, tag: &str) -> bool {
        self.tag_name(node_id)
            .is_some_and(|name| name.eq_ignore_ascii_case(tag))
    }

    pub(crate) fn attr(&self, node_id: NodeId, name: &str) -> Option<&str> {
        self.element(node_id)?.attr(name)
    }

    pub(crate) fn has_attr(&self, node_id: NodeId, name: &str) -> bool {
        self.element(node_id)
            .is_some_and(|element| element.has_attr(name))
    }

    pub(crate) fn line(&self, node_id: NodeId) -> usize {
        self.element(node_id).map(|element| element.line).unwrap_or(0)
    }

    pub(crate) fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes.get(node_id.0)?.parent
    }

    pub(crate) fn children(&self, node_id: NodeId) -> &[NodeId] {
        self.nodes
            .get(node_id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index.get(id).copied()
    }

    pub(crate) fn is_descendant_of(&self, node_id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = self.parent(node_id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub(crate) fn find_ancestor_by_tag(&self, node_id: NodeId, tag: &str) -> Option<NodeId> {
        let mut cursor = self.parent(node_id);
        while let Some(current) = cursor {
            if self.has_tag(current, tag) {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    /// Every node below `node_id` in document order, `node_id` excluded.
    pub(crate) fn descendants(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node_id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    pub(crate) fn all_element_nodes(&self) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|node| self.is_element(*node))
            .collect()
    }

    pub(crate) fn text_content(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node_id, &mut out);
        out
    }

    fn collect_text(&self, node_id: NodeId, out: &mut String) {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            match &self.nodes[node_id.0].node_type {
                NodeType::Text(text) => out.push_str(text),
                NodeType::Document | NodeType::Element(_) => {
                    for child in &self.nodes[node_id.0].children {
                        self.collect_text(*child, out);
                    }
                }
            }
        })
    }

    /// Location path in the libxml `getNodePath` format, e.g.
    /// `/html/body/form[2]/input[3]`.
    pub(crate) fn node_path(&self, node_id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut cursor = node_id;
        while let Some(parent) = self.parent(cursor) {
            segments.push(self.path_segment(parent, cursor));
            cursor = parent;
        }
        if segments.is_empty() {
            return "/".to_string();
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    fn path_segment(&self, parent: NodeId, node_id: NodeId) -> String {
        let (label, siblings): (String, Vec<NodeId>) = match &self.nodes[node_id.0].node_type {
            NodeType::Element(element) => (
                element.tag_name.clone(),
                self.children(parent)
                    .iter()
                    .copied()
                    .filter(|sibling| self.tag_name(*sibling) == Some(element.tag_name.as_str()))
                    .collect(),
            ),
            NodeType::Text(_) => (
                "text()".to_string(),
                self.children(parent)
                    .iter()
                    .copied()
                    .filter(|sibling| self.text(*sibling).is_some())
                    .collect(),
            ),
            NodeType::Document => return String::new(),
        };

        if siblings.len() < 2 {
            return label;
        }
        let position = siblings
            .iter()
            .position(|sibling| *sibling == node_id)
            .unwrap_or(0);
        format!("{label}[{}]", position + 1)
    }

    pub(crate) fn inner_html(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        let raw = self
            .tag_name(node_id)
            .is_some_and(is_raw_text_tag);
        for child in self.children(node_id) {
            self.serialize(*child, raw, &mut out);
        }
        out
    }

    pub(crate) fn outer_html(&self, node_id: NodeId) -> String {
        let mut out = String::new();
        self.serialize(node_id, false, &mut out);
        out
    }

    fn serialize(&self, node_id: NodeId, raw_text: bool, out: &mut String) {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            match &self.nodes[node_id.0].node_type {
                NodeType::Document => {
                    for child in &self.nodes[node_id.0].children {
                        self.serialize(*child, false, out);
                    }
                }
                NodeType::Text(text) if raw_text => out.push_str(text),
                NodeType::Text(text) => escape_into(text, false, out),
                NodeType::Element(element) => {
                    out.push('<');
                    out.push_str(&element.tag_name);
                    for (key, value) in &element.attrs {
                        out.push(' ');
                        out.push_str(key);
                        out.push_str("=\"");
                        escape_into(value, true, out);
                        out.push('"');
                    }
                    out.push('>');
                    if html::is_void_tag(&element.tag_name) {
                        return;
                    }
                    let raw = is_raw_text_tag(&element.tag_name);
                    for child in &self.nodes[node_id.0].children {
                        self.serialize(*child, raw, out);
                    }
                    out.push_str("</");
                    out.push_str(&element.tag_name);
                    out.push('>');
                }
            }
        })
    }
}

fn is_raw_text_tag(tag: &str) -> bool {
    tag.eq_ignore_ascii_case("script") || tag.eq_ignore_ascii_case("style")
}

fn escape_into(src: &str, attribute: bool, out: &mut String) {
    for ch in src.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{00A0}' => out.push_str("&nbsp;"),
            other => out.push(other),
        }
    }
}
