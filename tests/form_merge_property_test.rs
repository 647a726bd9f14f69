use browserkit_driver::{Browser, BrowserKitDriver, MockHandler};
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::test_runner::TestCaseResult;

#[derive(Debug, Clone)]
enum Slot {
    /// `<input name="item[]">` inside the form.
    Nested,
    /// `<input name="item[]" form="target">` after the form.
    Detached,
}

fn slot_strategy() -> BoxedStrategy<Slot> {
    prop_oneof![Just(Slot::Nested), Just(Slot::Detached)].boxed()
}

fn value_strategy() -> BoxedStrategy<String> {
    prop_oneof![
        Just("plain".to_string()),
        Just("with space".to_string()),
        Just("a&b=c".to_string()),
        Just("日本語".to_string()),
        "[a-z]{1,6}",
    ]
    .boxed()
}

fn page_html(slots: &[Slot]) -> String {
    let nested: String = slots
        .iter()
        .filter(|slot| matches!(slot, Slot::Nested))
        .map(|_| "<input name=\"item[]\" value=\"seed\">")
        .collect();
    let detached: String = slots
        .iter()
        .filter(|slot| matches!(slot, Slot::Detached))
        .map(|_| "<input name=\"item[]\" form=\"target\" value=\"seed\">")
        .collect();
    format!(
        r#"<form id="target" method="post">{nested}<input type="submit" name="first" value="1"><input type="submit" name="second" value="2"></form>{detached}"#
    )
}

fn assert_edits_reach_the_request(slots: &[Slot], values: &[String]) -> TestCaseResult {
    let handler = MockHandler::new().with_page("http://localhost/", page_html(slots));
    let mut driver = BrowserKitDriver::new(Browser::new(handler));
    let fail = |err: browserkit_driver::Error| TestCaseError::fail(err.to_string());

    driver.visit("/").map_err(fail)?;
    for (index, value) in values.iter().enumerate() {
        let xpath = format!("(//input[@name='item[]'])[{}]", index + 1);
        driver.set_value(&xpath, value.as_str()).map_err(fail)?;
    }
    driver.click("//input[@name='second']").map_err(fail)?;

    let request = driver
        .client()
        .handler()
        .last_request()
        .cloned()
        .ok_or_else(|| TestCaseError::fail("no request recorded"))?;
    let submitted = request.parameter_values("item[]");
    let expected: Vec<&str> = values.iter().map(String::as_str).collect();
    prop_assert_eq!(submitted, expected);
    prop_assert_eq!(request.parameter("second"), Some("2"));
    prop_assert_eq!(request.parameter("first"), None);
    prop_assert!(driver.forms().is_empty());
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 96,
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn edits_made_before_submit_survive_the_merge(
        (slots, values) in vec(slot_strategy(), 1..7).prop_flat_map(|slots| {
            let len = slots.len();
            (Just(slots), vec(value_strategy(), len))
        })
    ) {
        assert_edits_reach_the_request(&slots, &values)?;
    }
}
