//! Environment overrides of the layered configuration

use std::time::Duration;

use notebook_buddy::load_config;

#[test]
fn test_environment_overrides_defaults() {
    std::env::set_var("NBUDDY_API__BASE_URL", "http://backend.internal:8000/api");
    std::env::set_var("NBUDDY_AUTOSAVE__DEBOUNCE_MS", "750");
    std::env::set_var("NBUDDY_LOGGING__JSON", "true");

    let config = load_config().unwrap();

    assert_eq!(config.api.base_url, "http://backend.internal:8000/api");
    assert_eq!(config.autosave.debounce(), Duration::from_millis(750));
    assert!(config.logging.json);
    assert_eq!(config.generation.timeout_secs, 120);
}
