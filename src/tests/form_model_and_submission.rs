use super::*;

#[test]
fn edited_value_is_submitted() -> Result<()> {
    let html = r#"
        <form id="f">
          <input name="a" value="1">
          <input type="submit">
        </form>
        "#;

    let mut driver = driver_with_page(html)?;
    assert_eq!(driver.get_value("//input[@name='a']")?, text("1"));
    driver.set_value("//input[@name='a']", "2")?;
    driver.click("//input[@type='submit']")?;

    let request = last_request(&driver)?;
    assert_eq!(request.method(), "GET");
    assert_eq!(request.query_parameter("a").as_deref(), Some("2"));
    Ok(())
}

#[test]
fn edits_survive_when_another_button_submits() -> Result<()> {
    let html = r#"
        <form method="post">
          <input name="x" value="v0">
          <input type="submit" name="first" value="One">
          <input type="submit" name="second" value="Two">
        </form>
        "#;

    let mut driver = driver_with_page(html)?;
    driver.set_value("//input[@name='x']", "v1")?;
    driver.click("//input[@name='second']")?;

    let request = last_request(&driver)?;
    assert_eq!(request.method(), "POST");
    assert_eq!(request.parameter("x"), Some("v1"));
    assert_eq!(request.parameter("second"), Some("Two"));
    assert_eq!(request.parameter("first"), None);
    Ok(())
}

#[test]
fn empty_file_fields_are_not_submitted() -> Result<()> {
    let html = r#"
        <form method="post" enctype="multipart/form-data">
          <input type="file" name="missing">
          <input type="file" name="untouched">
          <input type="file" name="avatar">
          <input type="submit">
        </form>
        "#;

    let file = temp_file("portrait")?;
    let mut driver = driver_with_page(html)?;
    driver.attach_file("//input[@name='avatar']", file.path())?;
    driver.attach_file("//input[@name='missing']", "/nonexistent/upload.txt")?;
    driver.click("//input[@type='submit']")?;

    let request = last_request(&driver)?;
    let names: Vec<&str> = request.files.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["avatar"]);

    let upload = request
        .file("avatar")
        .ok_or_else(|| Error::driver("avatar upload missing"))?;
    assert_eq!(upload.size, 8);
    assert_eq!(upload.status, UploadStatus::Ok);
    assert!(!upload.tmp_name.is_empty());
    Ok(())
}

#[test]
fn strip_drops_only_blank_uploads() -> Result<()> {
    let html = r#"
        <form method="post">
          <input type="file" name="attached">
          <input type="file" name="blank">
          <input type="file" name="docs[]">
          <input type="file" name="docs[]">
          <input type="submit">
        </form>
        "#;
    let file = temp_file("x")?;
    let document = Document::parse(PAGE, html)?;
    let button = first_node(&document, "//input[@type='submit']")?;
    let mut form = FormModel::from_control(&document, button)?;

    form.cell_mut("attached", 0)?.upload(file.path());
    form.cell_mut("docs", 1)?.upload(file.path());
    submitter::strip_empty_file_fields(&mut form);

    assert!(form.has("attached"));
    assert!(!form.has("blank"));
    assert_eq!(form.field("docs")?.cells().len(), 1);
    assert_eq!(form.files().len(), 2);
    Ok(())
}

#[test]
fn upload_is_empty_only_without_name_and_path() {
    let named = FileUpload {
        name: "a.txt".into(),
        ..FileUpload::default()
    };
    let pathed = FileUpload {
        tmp_name: "/tmp/a".into(),
        ..FileUpload::default()
    };
    assert!(!named.is_empty());
    assert!(!pathed.is_empty());
    assert!(FileUpload::default().is_empty());
}

#[test]
fn merge_skips_button_cells_and_copies_fields() -> Result<()> {
    let html = r#"
        <form method="post">
          <input name="q" value="orig">
          <input name="tags[]" value="a">
          <input name="tags[]" value="b">
          <button name="go" value="1">Go</button>
          <button name="stop" value="2">Stop</button>
        </form>
        "#;
    let document = Document::parse(PAGE, html)?;
    let go = first_node(&document, "//button[@name='go']")?;
    let stop = first_node(&document, "//button[@name='stop']")?;

    let mut stale = FormModel::from_control(&document, go)?;
    stale.cell_mut("q", 0)?.set_value("edited")?;
    stale.cell_mut("tags", 1)?.set_value("z")?;

    let mut fresh = FormModel::from_control(&document, stop)?;
    submitter::merge_forms(&mut fresh, &stale);

    assert_eq!(
        fresh.values(),
        vec![
            ("stop".to_string(), "2".to_string()),
            ("q".to_string(), "edited".to_string()),
            ("tags[]".to_string(), "a".to_string()),
            ("tags[]".to_string(), "z".to_string()),
        ]
    );
    assert!(!fresh.has("go"));
    Ok(())
}

#[test]
fn get_submission_replaces_query_string() -> Result<()> {
    let html = r#"
        <form action="/search?q=old&amp;page=2#top">
          <input name="q" value="rust">
          <input type="submit" name="go" value="Search">
        </form>
        "#;
    let document = Document::parse(PAGE, html)?;
    let button = first_node(&document, "//input[@name='go']")?;
    let form = FormModel::from_control(&document, button)?;

    assert_eq!(form.method(), "GET");
    assert_eq!(form.action(), "http://localhost/search?q=old&page=2");
    assert_eq!(
        form.uri()?,
        "http://localhost/search?page=2&go=Search&q=rust"
    );
    assert!(form.parameters().is_empty());
    Ok(())
}

#[test]
fn button_overrides_method_and_action() -> Result<()> {
    let html = r#"
        <form action="/save" method="get">
          <input name="title" value="t">
          <button formaction="/publish" formmethod="post">Publish</button>
        </form>
        "#;
    let document = Document::parse(PAGE, html)?;
    let button = first_node(&document, "//button")?;
    let form = FormModel::from_control(&document, button)?;

    assert_eq!(form.method(), "POST");
    assert_eq!(form.uri()?, "http://localhost/publish");
    assert_eq!(
        form.parameters(),
        vec![("title".to_string(), "t".to_string())]
    );
    Ok(())
}

#[test]
fn image_button_contributes_coordinates() -> Result<()> {
    let html = r#"
        <form method="post">
          <input type="image" name="map" src="map.png">
        </form>
        "#;
    let document = Document::parse(PAGE, html)?;
    let button = first_node(&document, "//input[@type='image']")?;
    let form = FormModel::from_control(&document, button)?;

    assert_eq!(
        form.values(),
        vec![
            ("map.x".to_string(), "0".to_string()),
            ("map.y".to_string(), "0".to_string()),
        ]
    );
    Ok(())
}

#[test]
fn field_defaults_follow_control_kind() -> Result<()> {
    let html = r#"
        <form method="post">
          <input name="plain" value="p">
          <input type="checkbox" name="on_by_default" checked>
          <input type="checkbox" name="unchecked" value="yes">
          <textarea name="body">hello &amp; bye</textarea>
          <select name="single"><option>first</option><option value="2">second</option></select>
          <select name="chosen"><option selected>a</option><option selected>b</option></select>
          <select name="many[]" multiple><option selected>x</option><option>y</option><option selected>z</option></select>
          <select name="empty"></select>
          <input name="off" value="d" disabled>
          <input type="reset" name="reset">
          <input type="submit">
        </form>
        "#;
    let document = Document::parse(PAGE, html)?;
    let button = first_node(&document, "//input[@type='submit']")?;
    let form = FormModel::from_control(&document, button)?;

    assert_eq!(
        form.values(),
        vec![
            ("plain".to_string(), "p".to_string()),
            ("on_by_default".to_string(), "on".to_string()),
            ("body".to_string(), "hello & bye".to_string()),
            ("single".to_string(), "first".to_string()),
            ("chosen".to_string(), "b".to_string()),
            ("many[]".to_string(), "x".to_string()),
            ("many[]".to_string(), "z".to_string()),
        ]
    );
    assert_eq!(form.cell("empty", 0)?.value(), &CellValue::Empty);
    assert!(form.cell("off", 0)?.is_disabled());
    assert!(!form.has("reset"));
    Ok(())
}

#[test]
fn choice_cells_reject_unknown_values() -> Result<()> {
    let html = r#"
        <form>
          <select name="s"><option>a</option><option>b</option></select>
          <input type="checkbox" name="c" value="yes">
          <input type="submit">
        </form>
        "#;
    let document = Document::parse(PAGE, html)?;
    let button = first_node(&document, "//input[@type='submit']")?;
    let mut form = FormModel::from_control(&document, button)?;

    let select = form.cell_mut("s", 0)?;
    assert_eq!(
        select.set_value("c"),
        Err(Error::InvalidArgument(
            "Input \"s\" cannot take \"c\" as a value (possible values: \"a\", \"b\").".into()
        ))
    );
    assert!(matches!(
        select.set_value(vec!["a", "b"]),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(select.tick(), Err(Error::InvalidArgument(_))));

    let checkbox = form.cell_mut("c", 0)?;
    checkbox.set_value(true)?;
    assert_eq!(checkbox.value(), &CellValue::Text("yes".into()));
    checkbox.set_value("yes")?;
    checkbox.set_value(false)?;
    assert!(!checkbox.has_value());
    assert!(matches!(checkbox.set_value("no"), Err(Error::InvalidArgument(_))));

    assert!(matches!(form.cell("nope", 0), Err(Error::InvalidArgument(_))));
    assert!(matches!(form.cell_mut("s", 3), Ok(_)));
    Ok(())
}

#[test]
fn sequence_position_past_the_end_is_rejected() -> Result<()> {
    let html = r#"
        <form>
          <input name="item[]" value="1">
          <input type="submit">
        </form>
        "#;
    let document = Document::parse(PAGE, html)?;
    let button = first_node(&document, "//input[@type='submit']")?;
    let mut form = FormModel::from_control(&document, button)?;

    assert!(form.cell_mut("item", 0).is_ok());
    assert_eq!(
        form.cell_mut("item", 1).map(|_| ()),
        Err(Error::InvalidArgument(
            "Unreachable field \"item\" at position 1.".into()
        ))
    );
    Ok(())
}

#[test]
fn non_submit_control_cannot_build_a_form() -> Result<()> {
    let document = Document::parse(PAGE, "<form><p id='x'>text</p></form>")?;
    let paragraph = first_node(&document, "//p")?;
    assert_eq!(
        FormModel::from_control(&document, paragraph).map(|_| ()),
        Err(Error::Driver("Unable to submit on a \"p\" tag.".into()))
    );
    Ok(())
}

#[test]
fn cells_remember_their_source_elements() -> Result<()> {
    let html = r#"
        <form>
          <input type="radio" name="color" value="red">
          <input type="radio" name="color" value="blue" checked>
          <select name="size"><option value="s">Small</option><option>M</option></select>
          <button name="go" value="1">Go</button>
        </form>
        "#;
    let document = Document::parse(PAGE, html)?;
    let red = first_node(&document, "//input[@value='red']")?;
    let select = first_node(&document, "//select")?;
    let button = first_node(&document, "//button")?;
    let form = FormModel::from_control(&document, button)?;

    assert_eq!(form.button_node(), button);
    assert_eq!(form.form_node(), first_node(&document, "//form")?);

    let color = form.cell("color", 0)?;
    assert_eq!(color.node(), red);
    assert_eq!(color.options(), ["red".to_string(), "blue".to_string()]);
    assert_eq!(color.value(), &CellValue::Text("blue".into()));

    let size = form.cell("size", 0)?;
    assert_eq!(size.node(), select);
    assert_eq!(size.options(), ["s".to_string(), "M".to_string()]);
    Ok(())
}

#[test]
fn submitting_from_a_plain_field_is_refused() -> Result<()> {
    let html = r#"
        <form method="post">
          <input name="a" value="1">
          <input type="submit">
        </form>
        "#;
    let mut driver = driver_with_page(html)?;
    let requests_before = driver.client().handler().requests().len();

    assert_eq!(
        driver.submit_form("//input[@name='a']"),
        Err(Error::Driver("Unable to submit on a \"input\" tag.".into()))
    );
    assert_eq!(driver.client().handler().requests().len(), requests_before);

    driver.submit_form("//form")?;
    assert_eq!(last_request(&driver)?.parameter("a"), Some("1"));
    Ok(())
}
