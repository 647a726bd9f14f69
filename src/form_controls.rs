use super::dom::Dom;
use super::*;

fn input_type(dom: &Dom, node_id: NodeId) -> Option<&str> {
    dom.attr(node_id, "type")
}

fn type_is(dom: &Dom, node_id: NodeId, kinds: &[&str]) -> bool {
    input_type(dom, node_id)
        .map(|kind| kinds.iter().any(|candidate| kind.eq_ignore_ascii_case(candidate)))
        .unwrap_or(false)
}

pub(crate) fn is_form_control(dom: &Dom, node_id: NodeId) -> bool {
    ["input", "select", "textarea", "button"]
        .iter()
        .any(|tag| dom.has_tag(node_id, tag))
}

pub(crate) fn is_form_element(dom: &Dom, node_id: NodeId) -> bool {
    dom.has_tag(node_id, "form")
}

/// `input[type=submit|image]`, or a `button` without a type or with
/// `type=submit`.
pub(crate) fn is_submit_control(dom: &Dom, node_id: NodeId) -> bool {
    if dom.has_tag(node_id, "button") {
        return input_type(dom, node_id)
            .map(|kind| kind.eq_ignore_ascii_case("submit"))
            .unwrap_or(true);
    }
    dom.has_tag(node_id, "input") && type_is(dom, node_id, &["submit", "image"])
}

pub(crate) fn is_reset_control(dom: &Dom, node_id: NodeId) -> bool {
    (dom.has_tag(node_id, "input") || dom.has_tag(node_id, "button"))
        && type_is(dom, node_id, &["reset"])
}

/// Inputs whose value is their label rather than user data.
pub(crate) fn is_button_class_input(dom: &Dom, node_id: NodeId) -> bool {
    dom.has_tag(node_id, "input") && type_is(dom, node_id, &["submit", "button", "image"])
}

pub(crate) fn is_image_input(dom: &Dom, node_id: NodeId) -> bool {
    dom.has_tag(node_id, "input") && type_is(dom, node_id, &["image"])
}

pub(crate) fn is_checkbox_input(dom: &Dom, node_id: NodeId) -> bool {
    dom.has_tag(node_id, "input") && type_is(dom, node_id, &["checkbox"])
}

pub(crate) fn is_radio_input(dom: &Dom, node_id: NodeId) -> bool {
    dom.has_tag(node_id, "input") && type_is(dom, node_id, &["radio"])
}

pub(crate) fn is_file_input(dom: &Dom, node_id: NodeId) -> bool {
    dom.has_tag(node_id, "input") && type_is(dom, node_id, &["file"])
}

/// Controls that never carry user data inside a form model: every `button`
/// element plus submit, button, image and reset inputs.
pub(crate) fn is_non_field_control(dom: &Dom, node_id: NodeId) -> bool {
    dom.has_tag(node_id, "button")
        || (dom.has_tag(node_id, "input")
            && type_is(dom, node_id, &["submit", "button", "image", "reset"]))
}
