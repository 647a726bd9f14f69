use super::form_controls::is_submit_control;
use super::*;
use sha2::{Digest, Sha256};
use std::collections::hash_map::Entry;

/// Cache key for one physical `<form>` of the current document.
///
/// The digest covers the start-tag line, the location path and the text
/// content; the arena id keeps two identical forms apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormIdentity {
    node: NodeId,
    digest: String,
}

impl FormIdentity {
    pub fn compute(document: &Document, form: NodeId) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(document.line(form).to_string().as_bytes());
        hasher.update(document.node_path(form).as_bytes());
        hasher.update(document.text(form).as_bytes());
        let digest = hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect();
        Self { node: form, digest }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}

/// Form models of the current page, built lazily on first field access.
#[derive(Debug, Clone, Default)]
pub struct FormCache {
    forms: HashMap<FormIdentity, FormModel>,
}

impl FormCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: &FormIdentity) -> Option<&FormModel> {
        self.forms.get(identity)
    }

    pub fn contains(&self, identity: &FormIdentity) -> bool {
        self.forms.contains_key(identity)
    }

    /// Returns the cached model for `identity`, building it from the first
    /// submit-capable control of `form` when absent. `query` only feeds the
    /// not-found error.
    pub fn get_or_build(
        &mut self,
        document: &Document,
        identity: FormIdentity,
        form: NodeId,
        query: &str,
    ) -> Result<&mut FormModel> {
        match self.forms.entry(identity) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let button = find_submit_control(document, form).ok_or_else(|| {
                    Error::ElementNotFound {
                        kind: "form submit button for field".into(),
                        query: query.to_string(),
                    }
                })?;
                let model = FormModel::from_control(document, button)?;
                tracing::debug!(
                    form = %document.node_path(form),
                    digest = %entry.key().digest(),
                    fields = model.fields().count(),
                    "built form model"
                );
                Ok(entry.insert(model))
            }
        }
    }

    pub fn invalidate(&mut self, identity: &FormIdentity) -> Option<FormModel> {
        let removed = self.forms.remove(identity);
        if removed.is_some() {
            tracing::debug!(digest = %identity.digest(), "invalidated form model");
        }
        removed
    }

    pub fn clear(&mut self) {
        if !self.forms.is_empty() {
            tracing::debug!(count = self.forms.len(), "cleared form cache");
        }
        self.forms.clear();
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}

/// First submit-capable control of `form` in document order: descendants
/// not re-owned by a `form` attribute, and elements anywhere that name this
/// form's id.
pub(crate) fn find_submit_control(document: &Document, form: NodeId) -> Option<NodeId> {
    let dom = document.dom();
    let form_id = dom.attr(form, "id");
    dom.all_element_nodes().into_iter().find(|node| {
        let owned = match dom.attr(*node, "form") {
            Some(owner) => form_id == Some(owner),
            None => dom.is_descendant_of(*node, form),
        };
        owned && is_submit_control(dom, *node)
    })
}
