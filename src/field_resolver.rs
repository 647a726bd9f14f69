use super::*;

/// Field name with the `[]` sequence marker stripped.
pub(crate) fn resolve_name(document: &Document, field: NodeId) -> String {
    form::field_key(document.attribute(field, "name").unwrap_or_default())
}

/// Zero-based index of `field` among every element of the document that
/// carries exactly the same `name` attribute.
///
/// Nodes are compared by location path, so a handle obtained through a
/// different query still resolves to the same index.
pub(crate) fn resolve_position(document: &Document, field: NodeId) -> Result<usize> {
    let name = document.attribute(field, "name").unwrap_or_default();
    let query = format!("//*[@name={}]", xpath::xpath_literal(name));
    let matches = document.filter_xpath(&query)?;
    if matches.len() < 2 {
        return Ok(0);
    }

    let path = document.node_path(field);
    Ok(matches
        .iter()
        .position(|candidate| document.node_path(*candidate) == path)
        .unwrap_or(0))
}

/// The `<form>` owning `field`: the element named by its `form` attribute
/// when present, the nearest `form` ancestor otherwise.
pub(crate) fn resolve_owner(document: &Document, field: NodeId) -> Result<NodeId> {
    let dom = document.dom();
    if let Some(form_id) = dom.attr(field, "form") {
        return document
            .element_by_id(form_id)
            .filter(|owner| dom.has_tag(*owner, "form"))
            .ok_or_else(|| {
                Error::driver(format!(
                    "The selected node has an invalid form attribute ({form_id})."
                ))
            });
    }

    dom.find_ancestor_by_tag(field, "form")
        .ok_or_else(|| Error::driver("The selected node does not have a form ancestor."))
}
