//! End-to-end scenarios against the data source facade

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use blink_pool::{
    BlinkConfig, BlinkDataSource, BlinkError, ConnectOptions, Connection, Driver, DriverRegistry,
    Result,
};
use parking_lot::Mutex;
use tokio::time::{Duration, Instant};

/// Mock raw session with switchable liveness
struct MockConnection {
    closed: AtomicBool,
    valid: AtomicBool,
}

impl MockConnection {
    fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
            valid: AtomicBool::new(true),
        }
    }

    fn mark_invalid(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, _sql: &str) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BlinkError::Driver("session is closed".into()));
        }
        Ok(())
    }

    async fn is_valid(&self, _timeout: Duration) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.valid.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Mock driver that remembers every session it opened
struct MockDriver {
    id: &'static str,
    created: Mutex<Vec<Arc<MockConnection>>>,
    fail_opens: AtomicUsize,
}

impl MockDriver {
    fn new() -> Arc<Self> {
        Self::with_id("mock")
    }

    fn with_id(id: &'static str) -> Arc<Self> {
        Arc::new(Self {
            id,
            created: Mutex::new(Vec::new()),
            fail_opens: AtomicUsize::new(0),
        })
    }

    fn count(&self) -> usize {
        self.created.lock().len()
    }

    fn connection(&self, index: usize) -> Arc<MockConnection> {
        self.created.lock()[index].clone()
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn id(&self) -> &'static str {
        self.id
    }

    async fn open(&self, _opts: &ConnectOptions) -> Result<Arc<dyn Connection>> {
        if self.fail_opens.load(Ordering::SeqCst) > 0 {
            self.fail_opens.fetch_sub(1, Ordering::SeqCst);
            return Err(BlinkError::Connect("connection refused".into()));
        }
        let mut created = self.created.lock();
        let conn = Arc::new(MockConnection::new());
        created.push(conn.clone());
        Ok(conn)
    }
}

fn config(min_idle: i32, max_pool_size: i32) -> BlinkConfig {
    BlinkConfig::new("jdbc:h2:mem:orders")
        .with_driver("mock")
        .with_min_idle(min_idle)
        .with_max_pool_size(max_pool_size)
}

#[tokio::test]
async fn test_basic_borrow_and_return() {
    let driver = MockDriver::new();
    let ds = BlinkDataSource::with_driver(config(5, 20), driver.clone())
        .await
        .expect("data source");

    assert_eq!(ds.current_pool_size(), 5);
    assert_eq!(ds.total_creations(), 5);
    assert_eq!(ds.total_borrows(), 0);

    let conn = ds.get_connection().await.expect("borrow");
    assert_eq!(ds.current_pool_size(), 4);
    assert_eq!(ds.current_borrowings(), 1);
    assert_eq!(ds.total_borrows(), 1);

    conn.close().await;
    assert_eq!(ds.current_pool_size(), 5);
    assert_eq!(ds.current_borrowings(), 0);
    assert_eq!(ds.total_returns(), 1);
}

#[tokio::test]
async fn test_registry_resolves_driver_from_url_scheme() {
    let registry = DriverRegistry::new();
    registry.register(MockDriver::with_id("h2"));

    let config = BlinkConfig::new("jdbc:h2:mem:orders")
        .with_min_idle(1)
        .with_max_pool_size(5);
    let ds = BlinkDataSource::new(config, &registry).await.expect("data source");
    assert_eq!(ds.config().driver_id(), "h2");

    let conn = ds.get_connection().await.expect("borrow");
    assert_eq!(conn.driver_name(), "mock");
    conn.close().await;
}

#[tokio::test]
async fn test_missing_driver_is_a_config_error() {
    let registry = DriverRegistry::new();
    let config = BlinkConfig::new("jdbc:h2:mem:orders");
    let err = BlinkDataSource::new(config, &registry)
        .await
        .expect_err("unregistered driver");
    assert!(matches!(err, BlinkError::Config(_)));
}

#[tokio::test(start_paused = true)]
async fn test_saturated_pool_times_out_the_extra_borrower() {
    let driver = MockDriver::new();
    let ds = BlinkDataSource::with_driver(
        config(1, 2).with_borrow_timeout_ms(200),
        driver,
    )
    .await
    .expect("data source");

    let first = ds.get_connection().await.expect("borrow 1");
    let second = ds.get_connection().await.expect("borrow 2");
    assert_eq!(ds.current_borrowings(), 2);

    let before = Instant::now();
    let result = ds.get_connection().await;
    assert!(matches!(result.err(), Some(BlinkError::BorrowTimeout(_))));
    assert_eq!(before.elapsed(), Duration::from_millis(200));
    assert_eq!(ds.current_borrowings(), 2);

    first.close().await;
    second.close().await;
}

#[tokio::test]
async fn test_dead_idle_connection_is_replaced_on_borrow() {
    let driver = MockDriver::new();
    let ds = BlinkDataSource::with_driver(config(1, 5), driver.clone())
        .await
        .expect("data source");
    driver.connection(0).mark_invalid();

    let conn = ds.get_connection().await.expect("borrow");
    assert_eq!(ds.total_invalids(), 1);
    assert_eq!(ds.total_creations(), 2);
    assert_eq!(ds.total_real_closeds(), 1);
    assert!(driver.connection(0).is_closed());
    assert_eq!(driver.count(), 2);

    conn.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_expired_idle_connection_is_replaced_on_borrow() {
    let driver = MockDriver::new();
    let ds = BlinkDataSource::with_driver(
        config(1, 5).with_max_lifetime_ms(60_000),
        driver.clone(),
    )
    .await
    .expect("data source");

    // Jump past the randomised deadline, which falls within
    // [48s, 60s) of creation.
    tokio::time::advance(Duration::from_millis(60_000)).await;

    let conn = ds.get_connection().await.expect("borrow");
    assert_eq!(ds.total_invalids(), 1);
    assert_eq!(ds.total_creations(), 2);
    assert_eq!(ds.total_real_closeds(), 1);
    assert!(driver.connection(0).is_closed());

    conn.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_maintenance_trims_the_idle_queue_after_a_quiet_period() {
    let driver = MockDriver::new();
    let ds = BlinkDataSource::with_driver(
        config(2, 20).with_idle_timeout_secs(10),
        driver,
    )
    .await
    .expect("data source");

    // Hold ten connections at once, then return them all, leaving the
    // queue well above min_idle.
    let mut held = Vec::new();
    for _ in 0..10 {
        held.push(ds.get_connection().await.expect("borrow"));
    }
    for conn in held {
        conn.close().await;
    }

    let before = ds.current_pool_size();
    assert!(before >= 10, "expected a surplus, got {before}");
    let closed_before = ds.total_real_closeds();

    // No activity past the idle timeout: the next maintenance cycle trims
    // the queue back down to min_idle.
    tokio::time::advance(Duration::from_secs(11)).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(ds.current_pool_size(), 2);
    assert_eq!(ds.total_real_closeds() - closed_before, (before - 2) as i64);
}

#[tokio::test]
async fn test_shutdown_with_an_outstanding_borrow() {
    let driver = MockDriver::new();
    let ds = BlinkDataSource::with_driver(config(1, 5), driver.clone())
        .await
        .expect("data source");

    let conn = ds.get_connection().await.expect("borrow");
    ds.close().await;
    assert!(ds.is_closed());
    assert_eq!(ds.current_pool_size(), 0);

    // The late return is really closed instead of re-enqueued.
    conn.close().await;
    assert!(driver.connection(0).is_closed());
    assert_eq!(ds.total_real_closeds(), 1);
    assert_eq!(ds.total_returns(), 0);

    let result = ds.get_connection().await;
    assert!(matches!(result.err(), Some(BlinkError::PoolClosed)));

    // Closing again is a no-op.
    ds.close().await;
    assert!(ds.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_used_time_accumulates_across_a_borrow() {
    let driver = MockDriver::new();
    let ds = BlinkDataSource::with_driver(config(1, 5), driver)
        .await
        .expect("data source");

    let conn = ds.get_connection().await.expect("borrow");
    tokio::time::advance(Duration::from_millis(250)).await;
    conn.close().await;

    assert!((ds.used_sum_millis() - 250.0).abs() < 1.0);
}

#[tokio::test]
async fn test_population_stays_bounded_under_concurrent_load() {
    let driver = MockDriver::new();
    let ds = Arc::new(
        BlinkDataSource::with_driver(
            config(2, 4).with_borrow_timeout_ms(1_000),
            driver,
        )
        .await
        .expect("data source"),
    );

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let ds = Arc::clone(&ds);
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                match ds.get_connection().await {
                    Ok(conn) => {
                        tokio::time::sleep(Duration::from_millis(1)).await;
                        conn.close().await;
                    }
                    Err(BlinkError::BorrowTimeout(_)) => {}
                    Err(e) => panic!("unexpected borrow error: {e}"),
                }
            }
        }));
    }
    for task in tasks {
        task.await.expect("join");
    }

    // Let any in-flight background fills settle before observing.
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(ds.current_borrowings(), 0);
    let population = ds.current_pool_size() as i64 + ds.current_borrowings();
    assert!(population <= 4, "population {population} exceeds max_pool_size");
    assert_eq!(
        ds.total_creations() - ds.total_real_closeds(),
        ds.current_pool_size() as i64
    );
}
