use std::sync::Mutex;

use super::*;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// # Safety
/// Callers hold `ENV_LOCK` so no other test in this module touches the env.
unsafe fn clear_store_env() {
    unsafe {
        std::env::remove_var("LOADGRAPH_DATA_DIR");
        std::env::remove_var("LOADGRAPH_SECRET");
        std::env::remove_var("LOADGRAPH_SECRET_FILE");
        std::env::remove_var("LOADGRAPH_MAX_TRACE_BYTES");
        std::env::remove_var("LOADGRAPH_FETCH_LIMIT");
    }
}

#[test]
fn from_env_uses_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_store_env() };

    let cfg = StoreConfig::from_env().unwrap();
    assert_eq!(cfg.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
    assert_eq!(cfg.secret, SecretSource::File(PathBuf::from(DEFAULT_SECRET_FILE)));
    assert_eq!(cfg.max_trace_bytes, 209_715_200);
    assert_eq!(cfg.fetch_limit, 5000);
}

#[test]
fn from_env_parses_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_store_env();
        std::env::set_var("LOADGRAPH_DATA_DIR", "/var/lib/loadgraph");
        std::env::set_var("LOADGRAPH_SECRET", "s3cret");
        std::env::set_var("LOADGRAPH_MAX_TRACE_BYTES", "1048576");
        std::env::set_var("LOADGRAPH_FETCH_LIMIT", " 250 ");
    }

    let cfg = StoreConfig::from_env().unwrap();
    assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/loadgraph"));
    assert_eq!(cfg.secret, SecretSource::Inline("s3cret".to_owned()));
    assert_eq!(cfg.max_trace_bytes, 1_048_576);
    assert_eq!(cfg.fetch_limit, 250);

    unsafe { clear_store_env() };
}

#[test]
fn from_env_blank_secret_falls_back_to_file() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_store_env();
        std::env::set_var("LOADGRAPH_SECRET", "   ");
        std::env::set_var("LOADGRAPH_SECRET_FILE", "/etc/loadgraph/secret");
    }

    let cfg = StoreConfig::from_env().unwrap();
    assert_eq!(cfg.secret, SecretSource::File(PathBuf::from("/etc/loadgraph/secret")));

    unsafe { clear_store_env() };
}

#[test]
fn from_env_invalid_number_uses_default() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_store_env();
        std::env::set_var("LOADGRAPH_MAX_TRACE_BYTES", "lots");
    }

    let cfg = StoreConfig::from_env().unwrap();
    assert_eq!(cfg.max_trace_bytes, DEFAULT_MAX_TRACE_BYTES);

    unsafe { clear_store_env() };
}

#[test]
fn from_env_zero_fetch_limit_errors() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_store_env();
        std::env::set_var("LOADGRAPH_FETCH_LIMIT", "0");
    }

    let err = StoreConfig::from_env().unwrap_err().to_string();
    assert!(err.contains("LOADGRAPH_FETCH_LIMIT"));

    unsafe { clear_store_env() };
}

#[test]
fn validate_rejects_zero_max_size() {
    let mut cfg = StoreConfig::new("/tmp/x", SecretSource::Inline("k".into()));
    assert!(cfg.validate().is_ok());
    cfg.max_trace_bytes = 0;
    assert!(matches!(cfg.validate(), Err(ConfigError::ZeroValue { var: "LOADGRAPH_MAX_TRACE_BYTES" })));
}

#[test]
fn env_parse_missing_returns_default() {
    let val: usize = env_parse("__LOADGRAPH_TEST_NONEXISTENT__", 42);
    assert_eq!(val, 42);
}
