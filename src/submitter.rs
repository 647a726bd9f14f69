use super::client::BrowserClient;
use super::form::{FieldKind, FormModel};
use super::*;

/// Sends `form` through `client`.
///
/// A model cached for the same physical form may hold edits made before the
/// submitting control was known; those are copied over first. Empty file
/// parts are dropped, then the whole cache is cleared since the submit may
/// navigate away.
pub(crate) fn submit_form<C: BrowserClient>(
    client: &mut C,
    cache: &mut FormCache,
    mut form: FormModel,
    server: &ServerParameters,
) -> Result<()> {
    let identity = {
        let document = client.crawler().ok_or_else(|| {
            Error::driver("Unable to access the response content before visiting a page")
        })?;
        FormIdentity::compute(document, form.form_node())
    };

    if let Some(stale) = cache.get(&identity) {
        merge_forms(&mut form, stale);
    }
    strip_empty_file_fields(&mut form);

    tracing::debug!(
        method = form.method(),
        action = form.action(),
        "submitting form"
    );
    let result = client.submit(&form, &[], server);
    cache.clear();
    result
}

/// Copies every non-button value of `from` onto the matching cell of `to`.
pub(crate) fn merge_forms(to: &mut FormModel, from: &FormModel) {
    for (name, entry) in from.fields() {
        for (position, cell) in entry.cells().iter().enumerate() {
            if cell.kind() == FieldKind::Button
                || matches!(cell.input_type(), "submit" | "button" | "image")
            {
                continue;
            }
            match to.cell_mut(name, position) {
                Ok(target) => target.copy_value_from(cell),
                Err(err) => tracing::debug!(field = name, %err, "merge target missing"),
            }
        }
    }
}

/// Drops file cells carrying neither a file name nor a temporary path.
pub(crate) fn strip_empty_file_fields(form: &mut FormModel) {
    form.retain_cells(|cell| match cell.value() {
        CellValue::File(upload) => !upload.is_empty(),
        _ => true,
    });
}
