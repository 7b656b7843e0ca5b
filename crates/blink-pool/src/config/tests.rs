//! Tests for configuration validation and normalisation

use super::*;

fn valid_config() -> BlinkConfig {
    BlinkConfig::new("jdbc:postgresql://localhost:5432/app")
}

#[test]
fn test_defaults() {
    let mut config = valid_config();
    config.validate_and_init().expect("validate");

    assert_eq!(config.pool_name, DEFAULT_POOL_NAME);
    assert_eq!(config.min_idle, DEFAULT_MIN_IDLE);
    assert_eq!(config.max_pool_size, DEFAULT_MAX_POOL_SIZE);
    assert_eq!(config.idle_timeout(), Duration::from_secs(60));
    assert_eq!(config.max_lifetime(), Duration::from_millis(1_800_000));
    assert_eq!(config.check_interval_ms, 2_000);
    assert_eq!(config.check_timeout(), Duration::from_secs(5));
    assert_eq!(config.borrow_timeout(), Duration::from_millis(30_000));
    assert!(config.check_sql.is_none());
    assert!(!config.async_init_idle);
}

#[test]
fn test_zero_numeric_fields_use_defaults() {
    let mut config = valid_config()
        .with_min_idle(0)
        .with_max_pool_size(0)
        .with_idle_timeout_secs(0)
        .with_max_lifetime_ms(0)
        .with_check_timeout_secs(0)
        .with_borrow_timeout_ms(0);
    config.validate_and_init().expect("validate");

    assert_eq!(config.min_idle, DEFAULT_MIN_IDLE);
    assert_eq!(config.max_pool_size, DEFAULT_MAX_POOL_SIZE);
    assert_eq!(config.idle_timeout_secs, DEFAULT_IDLE_TIMEOUT_SECS);
    assert_eq!(config.max_lifetime_ms, DEFAULT_MAX_LIFETIME_MS);
    assert_eq!(config.check_timeout_secs, DEFAULT_CHECK_TIMEOUT_SECS);
    assert_eq!(config.borrow_timeout_ms, DEFAULT_BORROW_TIMEOUT_MS);
}

#[test]
fn test_below_minimum_values_clamp_up() {
    let mut config = valid_config()
        .with_idle_timeout_secs(3)
        .with_max_lifetime_ms(10_000)
        .with_check_interval_ms(100)
        .with_check_timeout_secs(1);
    config.validate_and_init().expect("validate");

    assert_eq!(config.idle_timeout_secs, MIN_IDLE_TIMEOUT_SECS);
    assert_eq!(config.max_lifetime_ms, MIN_MAX_LIFETIME_MS);
    assert_eq!(config.check_interval_ms, MIN_CHECK_INTERVAL_MS);
    assert_eq!(config.check_timeout_secs, MIN_CHECK_TIMEOUT_SECS);
}

#[test]
fn test_check_interval_sentinels_pass_through() {
    let mut disabled = valid_config().with_check_interval_ms(-1);
    disabled.validate_and_init().expect("validate");
    assert_eq!(disabled.check_interval_ms, -1);

    let mut always = valid_config().with_check_interval_ms(0);
    always.validate_and_init().expect("validate");
    assert_eq!(always.check_interval_ms, 0);
}

#[test]
fn test_swapped_min_and_max_pool_size() {
    let mut config = valid_config().with_min_idle(30).with_max_pool_size(10);
    config.validate_and_init().expect("validate");

    assert_eq!(config.min_idle, 10);
    assert_eq!(config.max_pool_size, 30);
}

#[test]
fn test_negative_fields_are_rejected() {
    for config in [
        valid_config().with_min_idle(-1),
        valid_config().with_max_pool_size(-1),
        valid_config().with_idle_timeout_secs(-1),
        valid_config().with_max_lifetime_ms(-1),
        valid_config().with_check_timeout_secs(-1),
        valid_config().with_borrow_timeout_ms(-1),
    ] {
        let mut config = config;
        let err = config.validate_and_init().expect_err("negative field");
        assert!(matches!(err, BlinkError::Config(_)), "got {err:?}");
    }
}

#[test]
fn test_blank_url_is_rejected() {
    let mut config = BlinkConfig::new("   ");
    let err = config.validate_and_init().expect_err("blank url");
    assert!(matches!(err, BlinkError::Config(_)));
}

#[test]
fn test_url_without_jdbc_prefix_is_rejected() {
    let mut config = BlinkConfig::new("postgresql://localhost/app");
    let err = config.validate_and_init().expect_err("bad prefix");
    assert!(matches!(err, BlinkError::Config(_)));
}

#[test]
fn test_driver_inference_from_url_scheme() {
    for (url, expected) in [
        ("jdbc:postgresql://localhost/app", "postgresql"),
        ("jdbc:mysql://localhost/app", "mysql"),
        ("jdbc:hsqldb:mem:test", "hsqldb"),
        ("jdbc:h2:mem:test", "h2"),
        ("jdbc:oracle:thin:@localhost:1521:orcl", "oracle"),
        ("jdbc:sqlserver://localhost;databaseName=app", "sqlserver"),
        ("jdbc:db2://localhost/app", "db2"),
        ("jdbc:informix-sqli://localhost/app", "informix-sqli"),
    ] {
        let mut config = BlinkConfig::new(url);
        config.validate_and_init().expect("validate");
        assert_eq!(config.driver_id(), expected, "url {url}");
    }
}

#[test]
fn test_unknown_scheme_without_explicit_driver_is_rejected() {
    let mut config = BlinkConfig::new("jdbc:voltdb://localhost/app");
    let err = config.validate_and_init().expect_err("unknown scheme");
    assert!(matches!(err, BlinkError::Config(_)));
}

#[test]
fn test_explicit_driver_wins_over_inference() {
    let mut config = BlinkConfig::new("jdbc:voltdb://localhost/app").with_driver("voltdb");
    config.validate_and_init().expect("validate");
    assert_eq!(config.driver_id(), "voltdb");
}

#[test]
fn test_blank_pool_name_falls_back_to_default() {
    let mut config = valid_config().with_pool_name("  ");
    config.validate_and_init().expect("validate");
    assert_eq!(config.pool_name, DEFAULT_POOL_NAME);
}

#[test]
fn test_config_serialization_round_trip() {
    let mut config = valid_config()
        .with_pool_name("orders")
        .with_username("app")
        .with_check_sql(SIMPLE_CHECK_SQL)
        .with_borrow_timeout_ms(5_000);
    config.validate_and_init().expect("validate");

    let json = serde_json::to_string(&config).expect("serialize");
    let restored: BlinkConfig = serde_json::from_str(&json).expect("deserialize");

    assert_eq!(restored.pool_name, "orders");
    assert_eq!(restored.username.as_deref(), Some("app"));
    assert_eq!(restored.check_sql.as_deref(), Some(SIMPLE_CHECK_SQL));
    assert_eq!(restored.borrow_timeout_ms, 5_000);
    assert_eq!(restored.driver_id(), "postgresql");
}
