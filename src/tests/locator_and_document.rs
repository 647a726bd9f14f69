use super::*;

#[test]
fn element_reads_follow_first_match() -> Result<()> {
    let html = r#"
        <div id="main" class="box">
          <p>  Hello
             <b>world</b> </p>
          <p>second</p>
        </div>
        "#;
    let mut driver = driver_with_page(html)?;

    assert_eq!(driver.get_tag_name("//div")?, "div");
    assert_eq!(driver.get_text("//p")?, "Hello world");
    assert_eq!(driver.get_html("//p[2]")?, "second");
    assert_eq!(driver.get_outer_html("//p[2]")?, "<p>second</p>");
    assert_eq!(driver.get_attribute("//div", "class")?, Some("box".to_string()));
    assert_eq!(driver.get_attribute("//div", "title")?, None);
    assert_eq!(
        driver.find_element_xpaths("//p")?,
        vec!["(//p)[1]".to_string(), "(//p)[2]".to_string()]
    );
    assert!(driver.find_element_xpaths("//table")?.is_empty());
    assert!(driver.click("//p/text()").is_err());
    Ok(())
}

#[test]
fn outer_html_escapes_text_and_attributes() -> Result<()> {
    let html = r#"<p title="a &quot;q&quot;">1 &lt; 2</p>"#;
    let driver = driver_with_page(html)?;
    assert_eq!(
        driver.get_outer_html("//p")?,
        r#"<p title="a &quot;q&quot;">1 &lt; 2</p>"#
    );
    Ok(())
}

#[test]
fn locator_skips_text_nodes() -> Result<()> {
    let document = Document::parse(PAGE, "<p>one</p><p>two</p>")?;
    let locator = locator::DomLocator::new(Some(&document));

    assert_eq!(locator.locate("//p/text()")?, Vec::<NodeId>::new());
    assert_eq!(locator.locate("//p")?.len(), 2);
    assert_eq!(
        locator.locate_one("//span"),
        Err(Error::Driver(
            "There is no element matching XPath \"//span\"".into()
        ))
    );
    assert!(matches!(locator.locate("//p["), Err(Error::XPath(_))));
    Ok(())
}

#[test]
fn locator_without_document_is_not_ready() {
    let locator = locator::DomLocator::new(None);
    assert_eq!(
        locator.locate("//p"),
        Err(Error::Driver(
            "Unable to access the response content before visiting a page".into()
        ))
    );
}

#[test]
fn node_paths_use_sibling_indexes() -> Result<()> {
    let html = r#"<html><body>
<form id="first"></form>
<form id="second">
  <input name="a">
  <select name="s"></select>
  <input name="b">
  <input name="c">
</form>
</body></html>"#;
    let document = Document::parse(PAGE, html)?;

    let c = first_node(&document, "//input[@name='c']")?;
    assert_eq!(document.node_path(c), "/html/body/form[2]/input[3]");
    let select = first_node(&document, "//select")?;
    assert_eq!(document.node_path(select), "/html/body/form[2]/select");
    let form = first_node(&document, "//form[@id='second']")?;
    assert_eq!(document.line(form), 3);
    Ok(())
}

#[test]
fn document_lookups() -> Result<()> {
    let document = Document::parse(PAGE, "<div id='a'><span ID='b' Data-X='1'>t</span></div>")?;
    let span = document
        .element_by_id("b")
        .ok_or_else(|| Error::driver("span not indexed"))?;

    assert_eq!(document.tag_name(span), Some("span"));
    assert_eq!(document.attribute(span, "DATA-X"), Some("1"));
    assert!(document.has_attribute(span, "data-x"));
    let parent = document
        .parent(span)
        .ok_or_else(|| Error::driver("span has no parent"))?;
    assert_eq!(document.attribute(parent, "id"), Some("a"));
    assert!(document.contains(span));
    assert_eq!(document.uri(), PAGE);
    Ok(())
}

#[test]
fn named_field_queries_resolve() -> Result<()> {
    let html = r#"<form>
  <label for="mail">Mail</label><input id="mail" name="email">
  <input name="second">
  <textarea name="notes">n</textarea>
</form>"#;
    let document = Document::parse(PAGE, html)?;
    let locator = locator::DomLocator::new(Some(&document));

    let union = locator.locate(
        "//form//*[self::input | self::textarea][not(@type = 'hidden')][@name = 'notes']",
    )?;
    assert_eq!(union, vec![first_node(&document, "//textarea")?]);

    let second = locator.locate_one("(//input)[2]")?;
    assert_eq!(document.attribute(second, "name"), Some("second"));

    let after_label = locator.locate_one("//label[@for = 'mail']/following-sibling::input")?;
    assert_eq!(document.attribute(after_label, "id"), Some("mail"));

    let folded = locator.locate("//textarea[translate(@name, 'NOTES', 'notes') = 'notes']")?;
    assert_eq!(folded.len(), 1);
    Ok(())
}
