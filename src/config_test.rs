use std::sync::Mutex;

use super::*;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// # Safety
/// Callers hold `ENV_LOCK`.
unsafe fn clear_server_env() {
    unsafe {
        std::env::remove_var("PORT");
        std::env::remove_var("LOADGRAPH_ROTATE_INTERVAL_SECS");
        std::env::remove_var("LOADGRAPH_USER_HEADER");
        std::env::remove_var("LOADGRAPH_MAX_TRACE_BYTES");
        std::env::remove_var("LOADGRAPH_FETCH_LIMIT");
    }
}

#[test]
fn from_env_uses_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_server_env() };

    let cfg = AppConfig::from_env().unwrap();
    assert_eq!(cfg.port, 3000);
    assert_eq!(cfg.rotate_interval, Duration::from_secs(86_400));
    assert_eq!(cfg.user_header, "x-authenticated-user");
}

#[test]
fn from_env_parses_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_server_env();
        std::env::set_var("PORT", "8080");
        std::env::set_var("LOADGRAPH_ROTATE_INTERVAL_SECS", "600");
        std::env::set_var("LOADGRAPH_USER_HEADER", " X-Remote-User ");
    }

    let cfg = AppConfig::from_env().unwrap();
    unsafe { clear_server_env() };
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.rotate_interval, Duration::from_secs(600));
    assert_eq!(cfg.user_header, "x-remote-user");
}

#[test]
fn from_env_rejects_zero_interval() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_server_env();
        std::env::set_var("LOADGRAPH_ROTATE_INTERVAL_SECS", "0");
    }

    let err = AppConfig::from_env().unwrap_err();
    unsafe { clear_server_env() };
    assert!(matches!(err, ConfigError::ZeroValue { var: "LOADGRAPH_ROTATE_INTERVAL_SECS" }));
}
