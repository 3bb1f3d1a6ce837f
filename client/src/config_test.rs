use super::*;
use std::sync::Mutex;

static ENV_LOCK: Mutex<()> = Mutex::new(());

const VARS: [&str; 8] = [
    "REPORT_API_BASE_URL",
    "REPORT_API_TIMEOUT_MS",
    "REPORT_API_CONNECT_TIMEOUT_MS",
    "REPORT_REFRESH_MAX_RETRIES",
    "REPORT_REFRESH_QUEUE_TIMEOUT_MS",
    "REPORT_GENERATE_PATH",
    "REPORT_TEMPLATES_PATH",
    "REPORT_STATE_PATH",
];

/// # Safety
/// Callers hold `ENV_LOCK` so no other test touches the environment concurrently.
unsafe fn clear_report_env() {
    for var in VARS {
        unsafe { std::env::remove_var(var) };
    }
}

#[test]
fn from_env_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_report_env() };

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg, ClientConfig::default());
    assert_eq!(cfg.base_url, DEFAULT_API_BASE_URL);
    assert_eq!(cfg.timeouts.request, Duration::from_millis(30_000));
    assert_eq!(cfg.refresh_max_retries, 2);
    assert_eq!(cfg.refresh_queue_timeout, Duration::from_secs(5));
}

#[test]
fn from_env_parses_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_report_env();
        std::env::set_var("REPORT_API_BASE_URL", "https://reports.example.test/");
        std::env::set_var("REPORT_API_TIMEOUT_MS", "1500");
        std::env::set_var("REPORT_REFRESH_MAX_RETRIES", "3");
        std::env::set_var("REPORT_GENERATE_PATH", "/api/reports/reports/generate");
        std::env::set_var("REPORT_TEMPLATES_PATH", "/api/reports/templates/");
        std::env::set_var("REPORT_STATE_PATH", "/tmp/report-state.json");
    }

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.base_url, "https://reports.example.test");
    assert_eq!(cfg.timeouts.request, Duration::from_millis(1500));
    assert_eq!(cfg.refresh_max_retries, 3);
    assert_eq!(cfg.generate_path, "/api/reports/reports/generate");
    assert_eq!(cfg.templates_path, "/api/reports/templates");
    assert_eq!(cfg.state_path, PathBuf::from("/tmp/report-state.json"));

    unsafe { clear_report_env() };
}

#[test]
fn from_env_invalid_number_falls_back() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_report_env();
        std::env::set_var("REPORT_API_TIMEOUT_MS", "soon");
    }

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.timeouts.request, Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS));

    unsafe { clear_report_env() };
}

#[test]
fn from_env_zero_retry_ceiling_errors() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_report_env();
        std::env::set_var("REPORT_REFRESH_MAX_RETRIES", "0");
    }

    let err = ClientConfig::from_env().unwrap_err().to_string();
    assert!(err.contains("REPORT_REFRESH_MAX_RETRIES"));

    unsafe { clear_report_env() };
}

#[test]
fn validated_rejects_relative_paths() {
    let cfg = ClientConfig { generate_path: "reports/generate".into(), ..ClientConfig::default() };
    assert!(cfg.validated().is_err());
}
