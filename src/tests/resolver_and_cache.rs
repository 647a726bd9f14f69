use super::*;
use proptest::prelude::*;

#[test]
fn owner_is_nearest_form_ancestor() -> Result<()> {
    let html = r#"
        <form id="outer"><div><input name="inner"></div></form>
        <form id="second"><input name="other"></form>
        "#;
    let document = Document::parse(PAGE, html)?;
    let inner = first_node(&document, "//input[@name='inner']")?;
    let other = first_node(&document, "//input[@name='other']")?;

    let owner = field_resolver::resolve_owner(&document, inner)?;
    assert_eq!(document.attribute(owner, "id"), Some("outer"));
    let owner = field_resolver::resolve_owner(&document, other)?;
    assert_eq!(document.attribute(owner, "id"), Some("second"));
    Ok(())
}

#[test]
fn form_attribute_overrides_ancestor() -> Result<()> {
    let html = r#"
        <form id="a"><input name="moved" form="b"></form>
        <form id="b"></form>
        "#;
    let document = Document::parse(PAGE, html)?;
    let moved = first_node(&document, "//input[@name='moved']")?;

    let owner = field_resolver::resolve_owner(&document, moved)?;
    assert_eq!(document.attribute(owner, "id"), Some("b"));
    Ok(())
}

#[test]
fn owner_resolution_errors() -> Result<()> {
    let html = r#"
        <input name="missing" form="missing">
        <div id="notform"></div>
        <input name="wrong" form="notform">
        <input name="orphan">
        "#;
    let document = Document::parse(PAGE, html)?;

    let missing = first_node(&document, "//input[@name='missing']")?;
    assert_eq!(
        field_resolver::resolve_owner(&document, missing),
        Err(Error::Driver(
            "The selected node has an invalid form attribute (missing).".into()
        ))
    );

    let wrong = first_node(&document, "//input[@name='wrong']")?;
    assert_eq!(
        field_resolver::resolve_owner(&document, wrong),
        Err(Error::Driver(
            "The selected node has an invalid form attribute (notform).".into()
        ))
    );

    let orphan = first_node(&document, "//input[@name='orphan']")?;
    assert_eq!(
        field_resolver::resolve_owner(&document, orphan),
        Err(Error::Driver(
            "The selected node does not have a form ancestor.".into()
        ))
    );
    Ok(())
}

#[test]
fn driver_reports_invalid_form_attribute() -> Result<()> {
    let html = r#"
        <input form="missing" name="q">
        <form id="f"><input type="submit"></form>
        "#;
    let mut driver = driver_with_page(html)?;
    let err = driver.set_value("//input[@name='q']", "x").err();
    assert!(matches!(&err, Some(Error::Driver(message)) if message.contains("missing")));
    Ok(())
}

#[test]
fn name_drops_sequence_marker() -> Result<()> {
    let document = Document::parse(PAGE, "<input name='tags[]'><input name='plain'><input>")?;
    let nodes = document.filter_xpath("//input")?;
    let names: Vec<String> = nodes
        .iter()
        .map(|node| field_resolver::resolve_name(&document, *node))
        .collect();
    assert_eq!(names, vec!["tags", "plain", ""]);
    Ok(())
}

#[test]
fn position_counts_same_named_elements_across_forms() -> Result<()> {
    let html = r#"
        <form><input name="x[]"><input name="y"></form>
        <form><input name="x[]"><input name="x[]"></form>
        "#;
    let document = Document::parse(PAGE, html)?;
    let xs = document.filter_xpath("//input[@name='x[]']")?;
    let positions = xs
        .iter()
        .map(|node| field_resolver::resolve_position(&document, *node))
        .collect::<Result<Vec<_>>>()?;
    assert_eq!(positions, vec![0, 1, 2]);

    let y = first_node(&document, "//input[@name='y']")?;
    assert_eq!(field_resolver::resolve_position(&document, y)?, 0);

    // The same element reached through a different query.
    let last = first_node(&document, "//form[2]/input[2]")?;
    assert_eq!(field_resolver::resolve_position(&document, last)?, 2);
    Ok(())
}

#[test]
fn cache_returns_the_same_model() -> Result<()> {
    let html = r#"
        <form><input name="a"><input type="submit"></form>
        "#;
    let document = Document::parse(PAGE, html)?;
    let form = first_node(&document, "//form")?;
    let identity = FormIdentity::compute(&document, form);
    let mut cache = FormCache::new();

    let first: *const FormModel = cache.get_or_build(&document, identity.clone(), form, "//form")?;
    let second: *const FormModel = cache.get_or_build(&document, identity.clone(), form, "//form")?;
    assert!(std::ptr::eq(first, second));
    assert_eq!(cache.len(), 1);
    assert!(cache.contains(&identity));

    assert!(cache.invalidate(&identity).is_some());
    assert!(cache.invalidate(&identity).is_none());
    assert!(cache.is_empty());
    Ok(())
}

#[test]
fn identical_forms_get_distinct_identities() -> Result<()> {
    let html = "<form><input type='submit'></form><form><input type='submit'></form>";
    let document = Document::parse(PAGE, html)?;
    let forms = document.filter_xpath("//form")?;
    let first = FormIdentity::compute(&document, forms[0]);
    let second = FormIdentity::compute(&document, forms[1]);

    assert_ne!(first, second);
    assert_ne!(first.digest(), second.digest());
    assert_eq!(first.digest().len(), 64);
    assert_eq!(first, FormIdentity::compute(&document, forms[0]));
    Ok(())
}

#[test]
fn identity_tracks_content_and_line() -> Result<()> {
    let one = Document::parse(PAGE, "<form>a<input type='submit'></form>")?;
    let two = Document::parse(PAGE, "<form>b<input type='submit'></form>")?;
    let three = Document::parse(PAGE, "\n<form>a<input type='submit'></form>")?;
    let digest = |document: &Document| -> Result<String> {
        let form = first_node(document, "//form")?;
        Ok(FormIdentity::compute(document, form).digest().to_string())
    };

    assert_ne!(digest(&one)?, digest(&two)?);
    assert_ne!(digest(&one)?, digest(&three)?);
    Ok(())
}

#[test]
fn submitting_clears_every_cached_form() -> Result<()> {
    let html = r#"
        <form id="one"><input name="a"><input type="submit" id="go"></form>
        <form id="two"><input name="b"><input type="submit"></form>
        "#;
    let mut driver = driver_with_page(html)?;
    driver.set_value("//input[@name='a']", "1")?;
    driver.set_value("//input[@name='b']", "2")?;
    assert_eq!(driver.forms().len(), 2);

    driver.click("//input[@id='go']")?;
    assert!(driver.forms().is_empty());
    Ok(())
}

#[test]
fn navigation_clears_cached_forms() -> Result<()> {
    let html = r#"
        <form><input name="a"><input type="submit"></form>
        "#;
    let mut driver = driver_with_page(html)?;
    driver.set_value("//input[@name='a']", "1")?;
    driver.visit("/form")?;
    assert!(driver.forms().is_empty());
    assert_eq!(driver.get_value("//input[@name='a']")?, text(""));
    Ok(())
}

#[derive(Debug, Clone)]
enum Placement {
    Inside(usize),
    Attribute(usize),
}

fn placement_strategy(forms: usize) -> BoxedStrategy<Placement> {
    prop_oneof![
        (0..forms).prop_map(Placement::Inside),
        (0..forms).prop_map(Placement::Attribute),
    ]
    .boxed()
}

fn layout_html(forms: usize, placements: &[Placement]) -> String {
    let mut bodies = vec![String::new(); forms];
    let mut outside = String::new();
    for placement in placements {
        match placement {
            Placement::Inside(form) => bodies[*form].push_str("<input name='f[]'>"),
            Placement::Attribute(form) => {
                outside.push_str(&format!("<input name='f[]' form='form{form}'>"));
            }
        }
    }
    let forms: String = bodies
        .iter()
        .enumerate()
        .map(|(index, body)| format!("<form id='form{index}'>{body}</form>"))
        .collect();
    format!("{forms}{outside}")
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn owners_are_forms_and_positions_follow_document_order(
        (forms, placements) in (1usize..4).prop_flat_map(|forms| {
            (Just(forms), proptest::collection::vec(placement_strategy(forms), 1..8))
        })
    ) {
        let html = layout_html(forms, &placements);
        let document = Document::parse(PAGE, &html)
            .map_err(|err| TestCaseError::fail(err.to_string()))?;
        let fields = document
            .filter_xpath("//input")
            .map_err(|err| TestCaseError::fail(err.to_string()))?;
        prop_assert_eq!(fields.len(), placements.len());

        for (expected, field) in fields.iter().enumerate() {
            let owner = field_resolver::resolve_owner(&document, *field)
                .map_err(|err| TestCaseError::fail(err.to_string()))?;
            prop_assert_eq!(document.tag_name(owner), Some("form"));

            let position = field_resolver::resolve_position(&document, *field)
                .map_err(|err| TestCaseError::fail(err.to_string()))?;
            prop_assert_eq!(position, expected);
        }
    }
}
