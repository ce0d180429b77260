use super::*;

// =============================================================================
// env_parse_u64: uses unique env var names to avoid races with parallel tests.
// =============================================================================

#[test]
fn env_parse_u64_reads_value() {
    let key = "__TEST_TD_PARSE_OK_301__";
    unsafe { std::env::set_var(key, " 42 ") };
    assert_eq!(env_parse_u64(key, 7), 42);
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_parse_u64_falls_back_on_garbage() {
    let key = "__TEST_TD_PARSE_BAD_302__";
    unsafe { std::env::set_var(key, "soon") };
    assert_eq!(env_parse_u64(key, 7), 7);
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_parse_u64_rejects_zero() {
    let key = "__TEST_TD_PARSE_ZERO_303__";
    unsafe { std::env::set_var(key, "0") };
    assert_eq!(env_parse_u64(key, 7), 7);
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_parse_u64_unset_uses_default() {
    assert_eq!(env_parse_u64("__TEST_TD_SURELY_UNSET_304__", 9), 9);
}

// =============================================================================
// ClientConfig
// =============================================================================

#[test]
fn default_config_values() {
    let cfg = ClientConfig::default();
    assert_eq!(cfg.api_url, DEFAULT_API_URL);
    assert_eq!(cfg.timeouts.refresh(), std::time::Duration::from_secs(DEFAULT_REFRESH_TIMEOUT_SECS));
}

#[test]
fn with_api_url_trims_trailing_slashes() {
    let cfg = ClientConfig::default().with_api_url(" https://tasks.example.com/api// ");
    assert_eq!(cfg.api_url, "https://tasks.example.com/api");
}

#[test]
fn with_api_url_empty_keeps_default() {
    let cfg = ClientConfig::default().with_api_url("   ");
    assert_eq!(cfg.api_url, DEFAULT_API_URL);
}
