use super::dom::Dom;
use super::form_controls::{
    is_checkbox_input, is_file_input, is_form_control, is_form_element, is_image_input,
    is_non_field_control, is_radio_input, is_submit_control,
};
use super::*;
use std::path::Path;

/// A value handed to a field by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    List(Vec<String>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(str::to_string).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceKind {
    Radio,
    Checkbox,
    Select,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Choice(ChoiceKind),
    File,
    /// The triggering control of a submission.
    Button,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UploadStatus {
    Ok,
    #[default]
    NoFile,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileUpload {
    pub name: String,
    pub mime_type: String,
    pub tmp_name: String,
    pub status: UploadStatus,
    pub size: u64,
}

impl FileUpload {
    /// Neither a file name nor a temporary path was recorded.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.tmp_name.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Empty,
    Text(String),
    List(Vec<String>),
    File(FileUpload),
}

/// One form control's kind and current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueCell {
    name: String,
    kind: FieldKind,
    node: NodeId,
    input_type: String,
    options: Vec<String>,
    multiple: bool,
    disabled: bool,
    value: CellValue,
}

impl ValueCell {
    fn new(name: &str, kind: FieldKind, node: NodeId, input_type: &str, value: CellValue) -> Self {
        Self {
            name: name.to_string(),
            kind,
            node,
            input_type: input_type.to_string(),
            options: Vec::new(),
            multiple: false,
            disabled: false,
            value,
        }
    }

    /// The raw `name` attribute, `[]` marker included.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// The element this cell was built from. Radio groups keep the first radio.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Lower-cased `type` attribute, or the tag name for `select`/`textarea`.
    pub fn input_type(&self) -> &str {
        &self.input_type
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn value(&self) -> &CellValue {
        &self.value
    }

    pub fn has_value(&self) -> bool {
        !matches!(self.value, CellValue::Empty)
    }

    pub fn is_choice(&self) -> bool {
        matches!(self.kind, FieldKind::Choice(_))
    }

    pub fn is_file(&self) -> bool {
        self.kind == FieldKind::File
    }

    pub fn set_value(&mut self, value: impl Into<FieldValue>) -> Result<()> {
        let value = value.into();
        match self.kind {
            FieldKind::Choice(ChoiceKind::Checkbox) => match value {
                FieldValue::Bool(true) => self.tick(),
                FieldValue::Bool(false) => self.untick(),
                other => self.select_options(other),
            },
            FieldKind::Choice(_) => self.select_options(value),
            FieldKind::File => match value {
                FieldValue::Text(path) => {
                    self.upload(path);
                    Ok(())
                }
                _ => Err(Error::invalid_argument(format!(
                    "File field \"{}\" only accepts a path.",
                    self.name
                ))),
            },
            FieldKind::Text | FieldKind::Button => match value {
                FieldValue::Text(text) => {
                    self.value = CellValue::Text(text);
                    Ok(())
                }
                _ => Err(Error::invalid_argument(format!(
                    "Field \"{}\" only accepts a string value.",
                    self.name
                ))),
            },
        }
    }

    pub fn tick(&mut self) -> Result<()> {
        self.ensure_checkbox("tick")?;
        self.value = self
            .options
            .first()
            .cloned()
            .map_or(CellValue::Empty, CellValue::Text);
        Ok(())
    }

    pub fn untick(&mut self) -> Result<()> {
        self.ensure_checkbox("untick")?;
        self.value = CellValue::Empty;
        Ok(())
    }

    pub fn select(&mut self, value: impl Into<FieldValue>) -> Result<()> {
        if !self.is_choice() {
            return Err(Error::invalid_argument(format!(
                "You cannot select a value on \"{}\" as it is not a choice field.",
                self.name
            )));
        }
        self.set_value(value)
    }

    /// Records `path` as the uploaded file. A missing or unreadable path
    /// leaves an empty upload, the way browsers send an empty file part.
    pub fn upload(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let upload = match std::fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => FileUpload {
                name: path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                mime_type: guess_mime_type(path).to_string(),
                tmp_name: path.to_string_lossy().into_owned(),
                status: UploadStatus::Ok,
                size: metadata.len(),
            },
            _ => FileUpload::default(),
        };
        self.value = CellValue::File(upload);
    }

    pub(crate) fn copy_value_from(&mut self, other: &ValueCell) {
        self.value = other.value.clone();
    }

    fn ensure_checkbox(&self, action: &str) -> Result<()> {
        if self.kind == FieldKind::Choice(ChoiceKind::Checkbox) {
            return Ok(());
        }
        Err(Error::invalid_argument(format!(
            "You cannot {action} \"{}\" as it is not a checkbox ({}).",
            self.name, self.input_type
        )))
    }

    fn select_options(&mut self, value: FieldValue) -> Result<()> {
        let values = match value {
            FieldValue::Text(text) => vec![text],
            FieldValue::List(values) => {
                if !self.multiple {
                    return Err(Error::invalid_argument(format!(
                        "You cannot select more than one value for \"{}\".",
                        self.name
                    )));
                }
                values
            }
            FieldValue::Bool(flag) => {
                return Err(Error::invalid_argument(format!(
                    "Input \"{}\" cannot take \"{flag}\" as a value.",
                    self.name
                )));
            }
        };

        if let Some(unknown) = values.iter().find(|value| !self.options.contains(value)) {
            return Err(Error::invalid_argument(format!(
                "Input \"{}\" cannot take \"{unknown}\" as a value (possible values: \"{}\").",
                self.name,
                self.options.join("\", \"")
            )));
        }

        self.value = if self.multiple {
            CellValue::List(values)
        } else {
            values
                .into_iter()
                .next()
                .map_or(CellValue::Empty, CellValue::Text)
        };
        Ok(())
    }
}

/// A field name maps to one cell, or to an ordered run of cells for
/// `name[]` fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEntry {
    Single(ValueCell),
    Multiple(Vec<ValueCell>),
}

impl FieldEntry {
    pub fn cells(&self) -> &[ValueCell] {
        match self {
            Self::Single(cell) => std::slice::from_ref(cell),
            Self::Multiple(cells) => cells,
        }
    }

    fn cells_mut(&mut self) -> &mut [ValueCell] {
        match self {
            Self::Single(cell) => std::slice::from_mut(cell),
            Self::Multiple(cells) => cells,
        }
    }
}

/// Mutable model of one `<form>` as it would be submitted by a given control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormModel {
    form: NodeId,
    button: NodeId,
    method: String,
    action: String,
    fields: Vec<(String, FieldEntry)>,
}

impl FormModel {
    /// Builds the model for `control`, which is either a `<form>` or a
    /// submit-class control owned by one.
    pub fn from_control(document: &Document, control: NodeId) -> Result<Self> {
        let dom = document.dom();
        let form = if is_form_element(dom, control) {
            control
        } else if is_submit_control(dom, control)
            || form_controls::is_button_class_input(dom, control)
        {
            field_resolver::resolve_owner(document, control)?
        } else {
            return Err(Error::driver(format!(
                "Unable to submit on a \"{}\" tag.",
                dom.tag_name(control).unwrap_or_default()
            )));
        };

        let button_attr = |name: &str| {
            if control == form {
                None
            } else {
                dom.attr(control, name).filter(|value| !value.is_empty())
            }
        };

        let method = button_attr("formmethod")
            .or_else(|| dom.attr(form, "method").filter(|value| !value.is_empty()))
            .unwrap_or("GET")
            .to_ascii_uppercase();

        let action = button_attr("formaction")
            .or_else(|| dom.attr(form, "action"))
            .unwrap_or_default();
        let mut action = url::Url::parse(document.uri())?.join(action)?;
        action.set_fragment(None);

        let mut model = Self {
            form,
            button: control,
            method,
            action: action.to_string(),
            fields: Vec::new(),
        };
        model.collect_fields(dom);
        Ok(model)
    }

    fn collect_fields(&mut self, dom: &Dom) {
        let form = self.form;
        let button = self.button;

        if button != form {
            if let Some(name) = dom.attr(button, "name").filter(|name| !name.is_empty()) {
                if is_image_input(dom, button) {
                    for axis in ["x", "y"] {
                        let key = format!("{name}.{axis}");
                        let cell = ValueCell::new(
                            &key,
                            FieldKind::Button,
                            button,
                            "image",
                            CellValue::Text("0".into()),
                        );
                        self.insert(key, cell);
                    }
                } else {
                    let value = dom.attr(button, "value").unwrap_or_default();
                    let input_type = control_type(dom, button);
                    let cell = ValueCell::new(
                        name,
                        FieldKind::Button,
                        button,
                        &input_type,
                        CellValue::Text(value.to_string()),
                    );
                    self.insert(name.to_string(), cell);
                }
            }
        }

        for node in owned_controls(dom, form) {
            let Some(name) = dom.attr(node, "name").filter(|name| !name.is_empty()) else {
                continue;
            };
            if is_non_field_control(dom, node) {
                continue;
            }
            let disabled = dom.has_attr(node, "disabled");

            if is_radio_input(dom, node) {
                self.add_radio(dom, name, node, disabled);
                continue;
            }

            let mut cell = build_cell(dom, name, node);
            cell.disabled = disabled;
            self.insert(name.to_string(), cell);
        }
    }

    fn add_radio(&mut self, dom: &Dom, name: &str, node: NodeId, disabled: bool) {
        let option = dom.attr(node, "value").unwrap_or("on").to_string();
        let checked = dom.has_attr(node, "checked");
        let key = field_key(name);

        let existing = self.fields.iter_mut().find_map(|(existing, entry)| match entry {
            FieldEntry::Single(cell)
                if *existing == key && cell.kind == FieldKind::Choice(ChoiceKind::Radio) =>
            {
                Some(cell)
            }
            _ => None,
        });
        if let Some(cell) = existing {
            if checked {
                cell.value = CellValue::Text(option.clone());
            }
            cell.options.push(option);
            return;
        }

        let value = if checked {
            CellValue::Text(option.clone())
        } else {
            CellValue::Empty
        };
        let mut cell = ValueCell::new(
            name,
            FieldKind::Choice(ChoiceKind::Radio),
            node,
            "radio",
            value,
        );
        cell.options.push(option);
        cell.disabled = disabled;
        self.insert(name.to_string(), cell);
    }

    fn insert(&mut self, name: String, cell: ValueCell) {
        let key = field_key(&name);
        let sequence = name.contains("[]");
        let Some(index) = self.fields.iter().position(|(existing, _)| *existing == key) else {
            let entry = if sequence {
                FieldEntry::Multiple(vec![cell])
            } else {
                FieldEntry::Single(cell)
            };
            self.fields.push((key, entry));
            return;
        };

        let entry = &mut self.fields[index].1;
        match entry {
            FieldEntry::Multiple(cells) if sequence => cells.push(cell),
            _ if sequence => *entry = FieldEntry::Multiple(vec![cell]),
            _ => *entry = FieldEntry::Single(cell),
        }
    }

    pub fn form_node(&self) -> NodeId {
        self.form
    }

    pub fn button_node(&self) -> NodeId {
        self.button
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// The resolved action URI, without the encoded field values.
    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.iter().any(|(key, _)| key == name)
    }

    pub fn field(&self, name: &str) -> Result<&FieldEntry> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, entry)| entry)
            .ok_or_else(|| Error::invalid_argument(format!("Unreachable field \"{name}\".")))
    }

    fn field_mut(&mut self, name: &str) -> Result<&mut FieldEntry> {
        self.fields
            .iter_mut()
            .find(|(key, _)| key == name)
            .map(|(_, entry)| entry)
            .ok_or_else(|| Error::invalid_argument(format!("Unreachable field \"{name}\".")))
    }

    /// The cell at `position` for a sequence field; the only cell otherwise.
    pub fn cell(&self, name: &str, position: usize) -> Result<&ValueCell> {
        match self.field(name)? {
            FieldEntry::Single(cell) => Ok(cell),
            FieldEntry::Multiple(cells) => cells.get(position).ok_or_else(|| {
                Error::invalid_argument(format!(
                    "Unreachable field \"{name}\" at position {position}."
                ))
            }),
        }
    }

    pub fn cell_mut(&mut self, name: &str, position: usize) -> Result<&mut ValueCell> {
        match self.field_mut(name)? {
            FieldEntry::Single(cell) => Ok(cell),
            FieldEntry::Multiple(cells) => cells.get_mut(position).ok_or_else(|| {
                Error::invalid_argument(format!(
                    "Unreachable field \"{name}\" at position {position}."
                ))
            }),
        }
    }

    /// `(field key, entry)` pairs in document order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldEntry)> {
        self.fields.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    pub fn cells(&self) -> impl Iterator<Item = &ValueCell> {
        self.fields.iter().flat_map(|(_, entry)| entry.cells())
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut ValueCell> {
        self.fields
            .iter_mut()
            .flat_map(|(_, entry)| entry.cells_mut().iter_mut())
    }

    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|(key, _)| key != name);
    }

    /// Keeps the cells for which `keep` holds, dropping emptied sequences.
    pub fn retain_cells(&mut self, mut keep: impl FnMut(&ValueCell) -> bool) {
        self.fields.retain_mut(|(_, entry)| match entry {
            FieldEntry::Single(cell) => keep(&*cell),
            FieldEntry::Multiple(cells) => {
                cells.retain(|cell| keep(cell));
                !cells.is_empty()
            }
        });
    }

    pub fn set_values<I, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, V)>,
        V: Into<FieldValue>,
    {
        for (name, value) in values {
            self.cell_mut(&field_key(&name), 0)?.set_value(value)?;
        }
        Ok(())
    }

    /// Submittable name/value pairs: enabled, non-file cells that carry a
    /// value, in field order.
    pub fn values(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for cell in self.cells().filter(|cell| !cell.disabled && !cell.is_file()) {
            match &cell.value {
                CellValue::Text(text) => out.push((cell.name.clone(), text.clone())),
                CellValue::List(items) => {
                    out.extend(items.iter().map(|item| (cell.name.clone(), item.clone())));
                }
                CellValue::Empty | CellValue::File(_) => {}
            }
        }
        out
    }

    pub fn files(&self) -> Vec<(String, FileUpload)> {
        self.cells()
            .filter(|cell| !cell.disabled)
            .filter_map(|cell| match &cell.value {
                CellValue::File(upload) => Some((cell.name.clone(), upload.clone())),
                _ => None,
            })
            .collect()
    }

    /// The request URI. `GET` submissions carry the values in the query
    /// string, replacing same-named parameters of the action.
    pub fn uri(&self) -> Result<String> {
        if self.method != "GET" {
            return Ok(self.action.clone());
        }
        let mut uri = url::Url::parse(&self.action)?;
        let values = self.values();
        let kept: Vec<(String, String)> = uri
            .query_pairs()
            .filter(|(key, _)| !values.iter().any(|(name, _)| name == key))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        if kept.is_empty() && values.is_empty() {
            uri.set_query(None);
        } else {
            uri.query_pairs_mut()
                .clear()
                .extend_pairs(kept.iter().chain(values.iter()));
        }
        Ok(uri.to_string())
    }

    /// Body parameters; empty for `GET`.
    pub fn parameters(&self) -> Vec<(String, String)> {
        if self.method == "GET" {
            Vec::new()
        } else {
            self.values()
        }
    }

    /// Uploaded files; never sent with `GET`.
    pub fn request_files(&self) -> Vec<(String, FileUpload)> {
        if self.method == "GET" {
            Vec::new()
        } else {
            self.files()
        }
    }
}

/// Field key: the `name` attribute without its `[]` markers.
pub(crate) fn field_key(name: &str) -> String {
    name.replace("[]", "")
}

/// `value` attribute, else the option text, else `1`.
pub(crate) fn option_value(dom: &Dom, option: NodeId) -> String {
    if let Some(value) = dom.attr(option, "value") {
        return value.to_string();
    }
    let text = dom.text_content(option);
    if text.is_empty() {
        "1".to_string()
    } else {
        text
    }
}

/// Controls belonging to `form` in document order: descendants without a
/// `form` attribute, plus any element naming the form by id.
fn owned_controls(dom: &Dom, form: NodeId) -> Vec<NodeId> {
    let form_id = dom.attr(form, "id");
    dom.all_element_nodes()
        .into_iter()
        .filter(|node| is_form_control(dom, *node))
        .filter(|node| match dom.attr(*node, "form") {
            Some(owner) => form_id == Some(owner),
            None => dom.is_descendant_of(*node, form),
        })
        .collect()
}

fn control_type(dom: &Dom, node: NodeId) -> String {
    match dom.tag_name(node) {
        Some(tag @ ("select" | "textarea")) => tag.to_string(),
        Some("button") => dom
            .attr(node, "type")
            .unwrap_or("submit")
            .to_ascii_lowercase(),
        _ => dom
            .attr(node, "type")
            .unwrap_or("text")
            .to_ascii_lowercase(),
    }
}

fn build_cell(dom: &Dom, name: &str, node: NodeId) -> ValueCell {
    let input_type = control_type(dom, node);

    if is_checkbox_input(dom, node) {
        let option = dom.attr(node, "value").unwrap_or("on").to_string();
        let value = if dom.has_attr(node, "checked") {
            CellValue::Text(option.clone())
        } else {
            CellValue::Empty
        };
        let mut cell = ValueCell::new(
            name,
            FieldKind::Choice(ChoiceKind::Checkbox),
            node,
            &input_type,
            value,
        );
        cell.options.push(option);
        return cell;
    }

    if is_file_input(dom, node) {
        return ValueCell::new(
            name,
            FieldKind::File,
            node,
            &input_type,
            CellValue::File(FileUpload::default()),
        );
    }

    if dom.has_tag(node, "select") {
        return build_select(dom, name, node);
    }

    let value = if dom.has_tag(node, "textarea") {
        dom.text_content(node)
    } else {
        dom.attr(node, "value").unwrap_or_default().to_string()
    };
    ValueCell::new(name, FieldKind::Text, node, &input_type, CellValue::Text(value))
}

fn build_select(dom: &Dom, name: &str, node: NodeId) -> ValueCell {
    let multiple = dom.has_attr(node, "multiple");
    let mut options = Vec::new();
    let mut selected = Vec::new();

    for option in dom
        .descendants(node)
        .into_iter()
        .filter(|child| dom.has_tag(*child, "option"))
    {
        let value = option_value(dom, option);
        if dom.has_attr(option, "selected") {
            selected.push(value.clone());
        }
        options.push(value);
    }

    let value = if multiple {
        CellValue::List(selected)
    } else if let Some(last) = selected.pop() {
        CellValue::Text(last)
    } else if let Some(first) = options.first() {
        CellValue::Text(first.clone())
    } else {
        CellValue::Empty
    };

    let mut cell = ValueCell::new(
        name,
        FieldKind::Choice(ChoiceKind::Select),
        node,
        "select",
        value,
    );
    cell.options = options;
    cell.multiple = multiple;
    cell
}

fn guess_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
