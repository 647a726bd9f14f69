use super::*;

mod form_model_and_submission;
mod locator_and_document;
mod resolver_and_cache;

const PAGE: &str = "http://localhost/form";

type TestDriver = BrowserKitDriver<Browser<MockHandler>>;

fn driver_with_page(html: &str) -> Result<TestDriver> {
    let handler = MockHandler::new().with_page(PAGE, html);
    let mut driver = BrowserKitDriver::new(Browser::new(handler));
    driver.visit("/form")?;
    Ok(driver)
}

fn last_request(driver: &TestDriver) -> Result<&Request> {
    driver
        .client()
        .handler()
        .last_request()
        .ok_or_else(|| Error::driver("no request was recorded"))
}

fn first_node(document: &Document, query: &str) -> Result<NodeId> {
    document
        .filter_xpath(query)?
        .first()
        .copied()
        .ok_or_else(|| Error::driver(format!("nothing matches {query}")))
}

fn text(value: &str) -> Option<FieldValue> {
    Some(FieldValue::Text(value.to_string()))
}

fn temp_file(contents: &str) -> Result<tempfile::NamedTempFile> {
    use std::io::Write as _;

    let mut file = tempfile::NamedTempFile::new().map_err(|err| Error::driver(err.to_string()))?;
    file.write_all(contents.as_bytes())
        .map_err(|err| Error::driver(err.to_string()))?;
    Ok(file)
}
