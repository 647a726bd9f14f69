use super::client::BrowserClient;
use super::form::{ChoiceKind, FieldKind, option_value};
use super::form_controls::{is_reset_control, is_submit_control};
use super::locator::DomLocator;
use super::*;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use fancy_regex::Regex;

const CONTENT_HEADERS: [&str; 3] = ["CONTENT_LENGTH", "CONTENT_MD5", "CONTENT_TYPE"];

/// Mink-style driver over a [`BrowserClient`].
///
/// Form models are cached per physical form between field accesses and
/// dropped on every navigation. The driver owns its client, so cloning a
/// driver never shares cookies or history with the original.
#[derive(Debug, Clone)]
pub struct BrowserKitDriver<C> {
    client: C,
    forms: FormCache,
    server_parameters: ServerParameters,
    started: bool,
    remove_script_from_url: bool,
    remove_host_from_url: bool,
}

enum ClickTarget {
    Link(String),
    Submit(FormModel),
    Reset(FormIdentity),
}

impl<C: BrowserClient> BrowserKitDriver<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            forms: FormCache::new(),
            server_parameters: ServerParameters::new(),
            started: false,
            remove_script_from_url: false,
            remove_host_from_url: false,
        }
    }

    pub fn with_config(client: C, config: &DriverConfig) -> Self {
        Self {
            remove_script_from_url: config.remove_script_from_url,
            remove_host_from_url: config.remove_host_from_url,
            ..Self::new(client)
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    pub fn forms(&self) -> &FormCache {
        &self.forms
    }

    pub fn server_parameters(&self) -> &ServerParameters {
        &self.server_parameters
    }

    pub fn start(&mut self) {
        self.started = true;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn stop(&mut self) {
        self.reset();
        self.started = false;
    }

    /// Restarts the client, forgetting cookies and history, and drops cached
    /// forms and accumulated server parameters.
    pub fn reset(&mut self) {
        self.client.restart();
        self.forms.clear();
        self.server_parameters.clear();
    }

    pub fn visit(&mut self, url: &str) -> Result<()> {
        let url = self.prepare_url(url)?;
        tracing::debug!(%url, "visit");
        self.client
            .request("GET", &url, &[], &[], &self.server_parameters)?;
        self.forms.clear();
        Ok(())
    }

    pub fn get_current_url(&self) -> Result<String> {
        self.client
            .internal_request()
            .map(|request| request.uri().to_string())
            .ok_or_else(|| Error::driver("Unable to access the request before visiting a page"))
    }

    pub fn reload(&mut self) -> Result<()> {
        self.client.reload()?;
        self.forms.clear();
        Ok(())
    }

    pub fn forward(&mut self) -> Result<()> {
        self.client.forward()?;
        self.forms.clear();
        Ok(())
    }

    pub fn back(&mut self) -> Result<()> {
        self.client.back()?;
        self.forms.clear();
        Ok(())
    }

    /// `None` removes the credentials.
    pub fn set_basic_auth(&mut self, credentials: Option<(&str, &str)>) {
        let Some((user, password)) = credentials else {
            for key in ["PHP_AUTH_USER", "PHP_AUTH_PW", "HTTP_AUTHORIZATION"] {
                self.server_parameters.remove(key);
            }
            return;
        };

        self.server_parameters
            .insert("PHP_AUTH_USER".into(), user.to_string());
        self.server_parameters
            .insert("PHP_AUTH_PW".into(), password.to_string());
        self.server_parameters.insert(
            "HTTP_AUTHORIZATION".into(),
            format!("Basic {}", BASE64.encode(format!("{user}:{password}"))),
        );
    }

    pub fn set_request_header(&mut self, name: &str, value: &str) {
        let mut name = name.to_ascii_uppercase().replace('-', "_");
        // CONTENT_* headers are not HTTP_-prefixed in server parameters.
        if !CONTENT_HEADERS.contains(&name.as_str()) {
            name = format!("HTTP_{name}");
        }
        self.server_parameters.insert(name, value.to_string());
    }

    pub fn get_response_headers(&self) -> Result<BTreeMap<String, Vec<String>>> {
        Ok(self.response()?.headers())
    }

    pub fn get_status_code(&self) -> Result<u16> {
        Ok(self.response()?.status())
    }

    pub fn get_content(&self) -> Result<String> {
        Ok(self.response()?.content().to_string())
    }

    /// `None` deletes the cookie for every prefix of the current path.
    pub fn set_cookie(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => {
                self.client.cookie_jar_mut().set(Cookie::new(name, value));
                Ok(())
            }
            None => self.delete_cookie(name),
        }
    }

    pub fn get_cookie(&self, name: &str) -> Result<Option<String>> {
        let url = self.get_current_url()?;
        Ok(self.client.cookie_jar().all_values(&url).remove(name))
    }

    pub fn find_element_xpaths(&self, xpath: &str) -> Result<Vec<String>> {
        let count = self.locator().locate(xpath)?.len();
        Ok((1..=count).map(|index| format!("({xpath})[{index}]")).collect())
    }

    pub fn get_tag_name(&self, xpath: &str) -> Result<String> {
        let (document, node) = self.filtered(xpath)?;
        Ok(document.tag_name(node).unwrap_or_default().to_string())
    }

    /// Text content with whitespace runs collapsed and trimmed.
    pub fn get_text(&self, xpath: &str) -> Result<String> {
        let (document, node) = self.filtered(xpath)?;
        Ok(document
            .text(node)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" "))
    }

    pub fn get_html(&self, xpath: &str) -> Result<String> {
        let (document, node) = self.filtered(xpath)?;
        Ok(document.html(node))
    }

    pub fn get_outer_html(&self, xpath: &str) -> Result<String> {
        let (document, node) = self.filtered(xpath)?;
        Ok(document.outer_html(node))
    }

    pub fn get_attribute(&self, xpath: &str, name: &str) -> Result<Option<String>> {
        let (document, node) = self.filtered(xpath)?;
        Ok(document.attribute(node, name).map(str::to_string))
    }

    pub fn get_value(&mut self, xpath: &str) -> Result<Option<FieldValue>> {
        let is_select = {
            let (document, node) = self.filtered(xpath)?;
            if matches!(
                document.attribute(node, "type"),
                Some("submit" | "image" | "button")
            ) {
                return Ok(text_value(document.attribute(node, "value")));
            }
            if document.tag_name(node) == Some("option") {
                return Ok(Some(FieldValue::Text(option_value(document.dom(), node))));
            }
            document.tag_name(node) == Some("select")
        };

        let cell = match self.form_field(xpath) {
            Ok(cell) => cell,
            Err(Error::InvalidArgument(_)) => {
                return Ok(self.get_attribute(xpath, "value")?.map(FieldValue::Text));
            }
            Err(err) => return Err(err),
        };

        Ok(match cell.value() {
            // A single select without options reads as an empty string.
            CellValue::Empty if is_select && !cell.is_multiple() => {
                Some(FieldValue::Text(String::new()))
            }
            CellValue::Empty => None,
            CellValue::Text(value) => Some(FieldValue::Text(value.clone())),
            CellValue::List(values) => Some(FieldValue::List(values.clone())),
            CellValue::File(upload) => Some(FieldValue::Text(upload.name.clone())),
        })
    }

    pub fn set_value(&mut self, xpath: &str, value: impl Into<FieldValue>) -> Result<()> {
        let value = value.into();
        let cell = self.form_field(xpath)?;
        match cell.kind() {
            FieldKind::Choice(ChoiceKind::Radio) if !matches!(value, FieldValue::Text(_)) => Err(
                Error::driver("Only string values can be used for a radio input."),
            ),
            FieldKind::Choice(ChoiceKind::Select) if matches!(value, FieldValue::Bool(_)) => Err(
                Error::driver("Boolean values cannot be used for a select element."),
            ),
            FieldKind::Choice(_) => cell.set_value(value),
            _ if !matches!(value, FieldValue::Text(_)) => Err(Error::driver(
                "Textual and file form fields don't support array or boolean values.",
            )),
            _ => cell.set_value(value),
        }
    }

    /// Ticks a checkbox, or selects a radio button's own value.
    pub fn check(&mut self, xpath: &str) -> Result<()> {
        let own_value = self.element_value(xpath)?;
        let cell = self.form_field(xpath)?;
        match cell.kind() {
            FieldKind::Choice(ChoiceKind::Checkbox) => cell.tick(),
            FieldKind::Choice(ChoiceKind::Radio) => cell.select(own_value),
            _ => Err(not_a_checkbox(xpath)),
        }
    }

    pub fn uncheck(&mut self, xpath: &str) -> Result<()> {
        let cell = self.form_field(xpath)?;
        match cell.kind() {
            FieldKind::Choice(ChoiceKind::Checkbox) => cell.untick(),
            _ => Err(not_a_checkbox(xpath)),
        }
    }

    /// With `multiple`, `value` is added to the current selection.
    pub fn select_option(&mut self, xpath: &str, value: &str, multiple: bool) -> Result<()> {
        let cell = self.form_field(xpath)?;
        if !cell.is_choice() {
            return Err(Error::driver(format!(
                "Impossible to select an option on the element with XPath \"{xpath}\" as it is not a select or radio input"
            )));
        }

        if !multiple {
            return cell.select(value);
        }
        let mut selected = match cell.value() {
            CellValue::Text(current) => vec![current.clone()],
            CellValue::List(current) => current.clone(),
            CellValue::Empty | CellValue::File(_) => Vec::new(),
        };
        selected.push(value.to_string());
        cell.select(selected)
    }

    pub fn is_selected(&mut self, xpath: &str) -> Result<bool> {
        let option = {
            let (document, node) = self.filtered(xpath)?;
            option_value(document.dom(), node)
        };
        let select = format!("({xpath})/ancestor-or-self::*[local-name()=\"select\"]");
        let cell = self.form_field(&select)?;
        Ok(match cell.value() {
            CellValue::List(values) => values.contains(&option),
            CellValue::Text(value) => *value == option,
            CellValue::Empty | CellValue::File(_) => false,
        })
    }

    pub fn is_checked(&mut self, xpath: &str) -> Result<bool> {
        let own_value = self.element_value(xpath)?;
        let cell = self.form_field(xpath)?;
        match cell.kind() {
            FieldKind::Choice(ChoiceKind::Checkbox) => Ok(cell.has_value()),
            FieldKind::Choice(ChoiceKind::Radio) => {
                Ok(matches!(cell.value(), CellValue::Text(value) if *value == own_value))
            }
            _ => Err(Error::driver(format!(
                "Impossible to get the checked state of the element with XPath \"{xpath}\" as it is not a checkbox or radio input"
            ))),
        }
    }

    pub fn attach_file(&mut self, xpath: &str, path: impl AsRef<std::path::Path>) -> Result<()> {
        let cell = self.form_field(xpath)?;
        if !cell.is_file() {
            return Err(Error::driver(format!(
                "Impossible to attach a file on the element with XPath \"{xpath}\" as it is not a file input"
            )));
        }
        cell.upload(path);
        Ok(())
    }

    /// Follows links, submits through submit controls and discards the cached
    /// model on reset controls.
    pub fn click(&mut self, xpath: &str) -> Result<()> {
        let target = {
            let (document, node) = self.filtered(xpath)?;
            let tag = document.tag_name(node).unwrap_or_default();
            if tag == "a" {
                let href = document.attribute(node, "href").unwrap_or_default();
                let uri = url::Url::parse(document.uri())?.join(href)?;
                ClickTarget::Link(uri.to_string())
            } else if is_submit_control(document.dom(), node) {
                ClickTarget::Submit(FormModel::from_control(document, node)?)
            } else if is_reset_control(document.dom(), node) {
                let form = field_resolver::resolve_owner(document, node)?;
                ClickTarget::Reset(FormIdentity::compute(document, form))
            } else {
                return Err(Error::UnsupportedAction {
                    tag: tag.to_string(),
                });
            }
        };

        match target {
            ClickTarget::Link(uri) => {
                tracing::debug!(%uri, "following link");
                self.client
                    .request("GET", &uri, &[], &[], &self.server_parameters)?;
                self.forms.clear();
            }
            ClickTarget::Submit(form) => self.submit(form)?,
            ClickTarget::Reset(identity) => {
                self.forms.invalidate(&identity);
            }
        }
        Ok(())
    }

    pub fn submit_form(&mut self, xpath: &str) -> Result<()> {
        let form = {
            let (document, node) = self.filtered(xpath)?;
            FormModel::from_control(document, node)?
        };
        self.submit(form)
    }

    fn submit(&mut self, form: FormModel) -> Result<()> {
        submitter::submit_form(
            &mut self.client,
            &mut self.forms,
            form,
            &self.server_parameters,
        )
    }

    fn locator(&self) -> DomLocator<'_> {
        DomLocator::new(self.client.crawler())
    }

    fn response(&self) -> Result<&Response> {
        self.client
            .internal_response()
            .ok_or_else(|| Error::driver("Unable to access the response before visiting a page"))
    }

    fn filtered(&self, xpath: &str) -> Result<(&Document, NodeId)> {
        let locator = self.locator();
        let node = locator.locate_one(xpath)?;
        Ok((locator.document()?, node))
    }

    fn element_value(&self, xpath: &str) -> Result<String> {
        let (document, node) = self.filtered(xpath)?;
        Ok(document.attribute(node, "value").unwrap_or("on").to_string())
    }

    /// The cached cell behind the element at `xpath`, building the owning
    /// form's model on first access.
    fn form_field(&mut self, xpath: &str) -> Result<&mut ValueCell> {
        let locator = DomLocator::new(self.client.crawler());
        let node = locator.locate_one(xpath)?;
        let document = locator.document()?;
        form_field_in(document, &mut self.forms, xpath, node)
    }

    fn delete_cookie(&mut self, name: &str) -> Result<()> {
        let url = self.get_current_url()?;
        let mut path = url::Url::parse(&url)?.path().to_string();
        if path.is_empty() {
            path.push('/');
        }

        let jar = self.client.cookie_jar_mut();
        while !path.is_empty() {
            if jar.get(name, &path, None).is_some() {
                jar.expire(name, &path, None);
            }
            path.pop();
        }
        Ok(())
    }

    fn prepare_url(&self, url: &str) -> Result<String> {
        if !self.remove_host_from_url && !self.remove_script_from_url {
            return Ok(url.to_string());
        }

        let pattern = Regex::new(r"^(https?://[^/]+)(/[^/.]+\.php)?")
            .map_err(|err| Error::driver(err.to_string()))?;
        let Some(captures) = pattern
            .captures(url)
            .map_err(|err| Error::driver(err.to_string()))?
        else {
            return Ok(url.to_string());
        };

        let matched_end = captures.get(0).map_or(0, |m| m.end());
        let mut prepared = String::new();
        if !self.remove_host_from_url {
            prepared.push_str(captures.get(1).map_or("", |m| m.as_str()));
        }
        if !self.remove_script_from_url {
            prepared.push_str(captures.get(2).map_or("", |m| m.as_str()));
        }
        prepared.push_str(&url[matched_end..]);
        if prepared.is_empty() {
            prepared.push('/');
        }
        Ok(prepared)
    }
}

fn form_field_in<'f>(
    document: &Document,
    forms: &'f mut FormCache,
    xpath: &str,
    node: NodeId,
) -> Result<&'f mut ValueCell> {
    if let Some(kind @ ("button" | "submit" | "image")) = document.attribute(node, "type") {
        return Err(Error::driver(format!(
            "Cannot access a form field of type \"{kind}\"."
        )));
    }

    let name = field_resolver::resolve_name(document, node);
    let form = field_resolver::resolve_owner(document, node)?;
    let identity = FormIdentity::compute(document, form);
    let position = field_resolver::resolve_position(document, node)?;
    forms
        .get_or_build(document, identity, form, xpath)?
        .cell_mut(&name, position)
}

fn text_value(value: Option<&str>) -> Option<FieldValue> {
    value.map(|value| FieldValue::Text(value.to_string()))
}

fn not_a_checkbox(xpath: &str) -> Error {
    Error::driver(format!(
        "Impossible to check the element with XPath \"{xpath}\" as it is not a checkbox"
    ))
}
