use std::collections::HashMap;
use std::sync::Arc;

use connpool_core::{AcquireError, PoolError};
use pretty_assertions::assert_eq;

use super::{PoolRegistry, RegistryState};
use crate::testing::MockDriver;

fn mock_source(pool_size: &str) -> Box<HashMap<String, String>> {
    Box::new(HashMap::from([
        ("db.driver".to_string(), "mock".to_string()),
        ("db.url".to_string(), "mock://admission".to_string()),
        ("db.user".to_string(), "admin".to_string()),
        ("db.password".to_string(), "secret".to_string()),
        ("db.poolsize".to_string(), pool_size.to_string()),
    ]))
}

fn mock_registry(pool_size: &str) -> (Arc<MockDriver>, PoolRegistry) {
    let driver = MockDriver::new();
    let registry = PoolRegistry::new(driver.registry(), mock_source(pool_size));
    (driver, registry)
}

#[test]
fn test_registry_lifecycle() {
    let (driver, registry) = mock_registry("3");
    assert_eq!(registry.state(), RegistryState::Uninitialized);

    registry.init_connection_pool().expect("init");
    assert_eq!(registry.state(), RegistryState::Active);
    assert_eq!(driver.opened_count(), 3);

    let conn = registry.acquire().expect("acquire");
    assert_eq!(registry.pool().expect("pool").stats().in_use(), 1);
    conn.release().expect("release");

    registry.destroy_connection_pool().expect("destroy");
    assert_eq!(registry.state(), RegistryState::Destroyed);
    assert!(driver.opened().iter().all(|probe| probe.is_closed()));
}

#[test]
fn test_pool_before_init_is_lifecycle_error() {
    let (_driver, registry) = mock_registry("3");
    assert!(matches!(registry.pool(), Err(PoolError::Lifecycle(_))));
    assert!(matches!(registry.acquire(), Err(PoolError::Lifecycle(_))));
}

#[test]
fn test_init_twice_fails() {
    let (driver, registry) = mock_registry("2");
    registry.init_connection_pool().expect("init");

    let err = registry.init_connection_pool().expect_err("second init");
    assert!(matches!(err, PoolError::Initialization(_)));
    assert_eq!(driver.opened_count(), 2);
    assert_eq!(registry.state(), RegistryState::Active);
}

#[test]
fn test_init_after_destroy_fails() {
    let (_driver, registry) = mock_registry("2");
    registry.init_connection_pool().expect("init");
    registry.destroy_connection_pool().expect("destroy");

    let err = registry.init_connection_pool().expect_err("init after destroy");
    assert!(matches!(err, PoolError::Initialization(_)));
}

#[test]
fn test_destroy_without_pool_fails() {
    let (_driver, registry) = mock_registry("2");

    let err = registry.destroy_connection_pool().expect_err("nothing to destroy");
    assert!(matches!(err, PoolError::Lifecycle(_)));
    assert_eq!(registry.state(), RegistryState::Uninitialized);

    registry.init_connection_pool().expect("init");
    registry.destroy_connection_pool().expect("destroy");
    let err = registry.destroy_connection_pool().expect_err("already destroyed");
    assert!(matches!(err, PoolError::Lifecycle(_)));
}

#[test]
fn test_invalid_pool_size_uses_default() {
    let (driver, registry) = mock_registry("many");
    registry.init_connection_pool().expect("init");
    assert_eq!(driver.opened_count(), 5);
}

#[test]
fn test_missing_key_fails_init() {
    let driver = MockDriver::new();
    let mut source = mock_source("2");
    source.remove("db.password");
    let registry = PoolRegistry::new(driver.registry(), source);

    let err = registry.init_connection_pool().expect_err("password missing");
    match err {
        PoolError::Initialization(msg) => assert!(msg.contains("db.password"), "{msg}"),
        other => panic!("expected initialization error, got {other:?}"),
    }
    assert_eq!(registry.state(), RegistryState::Uninitialized);
    assert_eq!(driver.opened_count(), 0);
}

#[test]
fn test_pool_clone_outlives_destroy() {
    let (_driver, registry) = mock_registry("1");
    registry.init_connection_pool().expect("init");
    let pool = registry.pool().expect("pool");

    registry.destroy_connection_pool().expect("destroy");
    assert!(pool.is_closed());
    assert!(matches!(
        pool.acquire(),
        Err(PoolError::Acquisition(AcquireError::Closed))
    ));
}
