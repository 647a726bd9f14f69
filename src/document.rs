use super::dom::Dom;
use super::*;

/// A parsed response body together with the URI it was served from.
///
/// Documents are immutable once parsed; every navigation produces a new one.
#[derive(Debug, Clone)]
pub struct Document {
    dom: Dom,
    uri: String,
}

impl Document {
    pub fn parse(uri: impl Into<String>, html: &str) -> Result<Self> {
        Ok(Self {
            dom: html::parse_html(html)?,
            uri: uri.into(),
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Element and text nodes matched by `query`, in document order.
    pub fn filter_xpath(&self, query: &str) -> Result<Vec<NodeId>> {
        xpath::evaluate(&self.dom, query)
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.dom.tag_name(node)
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.dom.attr(node, &name.to_ascii_lowercase())
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.dom.has_attr(node, &name.to_ascii_lowercase())
    }

    pub fn text(&self, node: NodeId) -> String {
        self.dom.text_content(node)
    }

    pub fn html(&self, node: NodeId) -> String {
        self.dom.inner_html(node)
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        self.dom.outer_html(node)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.dom.parent(node).filter(|parent| *parent != self.dom.root)
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.dom.by_id(id)
    }

    pub fn node_path(&self, node: NodeId) -> String {
        self.dom.node_path(node)
    }

    /// 1-based source line of the element's start tag.
    pub fn line(&self, node: NodeId) -> usize {
        self.dom.line(node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.dom.contains(node)
    }

    pub(crate) fn dom(&self) -> &Dom {
        &self.dom
    }
}
