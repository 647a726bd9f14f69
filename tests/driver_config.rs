use browserkit_driver::{Browser, BrowserKitDriver, DriverConfig, MockHandler};
use std::io::Write as _;

#[test]
fn partial_config_keeps_defaults() -> Result<(), serde_json::Error> {
    let config: DriverConfig =
        serde_json::from_str(r#"{ "base_url": "http://app.test/", "max_redirects": 2 }"#)?;

    assert_eq!(config.base_url, "http://app.test/");
    assert_eq!(config.max_redirects, 2);
    assert!(config.follow_redirects);
    assert!(!config.remove_host_from_url);
    assert!(!config.remove_script_from_url);
    Ok(())
}

#[test]
fn empty_config_equals_default() -> Result<(), serde_json::Error> {
    let config: DriverConfig = serde_json::from_str("{}")?;
    assert_eq!(config, DriverConfig::default());
    Ok(())
}

#[test]
fn config_file_drives_browser_and_driver() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(
        file,
        r#"{{ "base_url": "http://app.test/", "remove_script_from_url": true }}"#
    )?;
    let config: DriverConfig = serde_json::from_str(&std::fs::read_to_string(file.path())?)?;

    let handler = MockHandler::new().with_page("http://app.test/dashboard", "<h1>Dash</h1>");
    let mut driver =
        BrowserKitDriver::with_config(Browser::with_config(handler, config.clone()), &config);
    driver.visit("http://app.test/index.php/dashboard")?;

    assert_eq!(driver.get_current_url()?, "http://app.test/dashboard");
    assert_eq!(driver.get_text("//h1")?, "Dash");

    driver.visit("/dashboard")?;
    assert_eq!(driver.client().history_len(), 2);
    Ok(())
}
