use super::*;

/// Read-only XPath access to the current page.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DomLocator<'a> {
    document: Option<&'a Document>,
}

impl<'a> DomLocator<'a> {
    pub(crate) fn new(document: Option<&'a Document>) -> Self {
        Self { document }
    }

    pub(crate) fn document(&self) -> Result<&'a Document> {
        self.document.ok_or_else(|| {
            Error::driver("Unable to access the response content before visiting a page")
        })
    }

    /// Matched elements in document order; zero matches is not an error.
    pub(crate) fn locate(&self, query: &str) -> Result<Vec<NodeId>> {
        let document = self.document()?;
        let nodes: Vec<NodeId> = document
            .filter_xpath(query)?
            .into_iter()
            .filter(|node| document.tag_name(*node).is_some())
            .collect();
        tracing::trace!(query, matches = nodes.len(), "located elements");
        Ok(nodes)
    }

    pub(crate) fn locate_one(&self, query: &str) -> Result<NodeId> {
        self.locate(query)?.first().copied().ok_or_else(|| {
            Error::driver(format!("There is no element matching XPath \"{query}\""))
        })
    }
}
