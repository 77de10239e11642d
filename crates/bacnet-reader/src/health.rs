//! Health checks and the periodic health monitor task

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::connection::ConnectionManager;
use crate::executor::RequestExecutor;
use crate::registry::ObjectRegistry;
use crate::state::{HealthStatus, SharedState};

/// Checks the connection by reading the first registered object
pub struct HealthChecker {
    connection: Arc<ConnectionManager>,
    registry: Arc<RwLock<ObjectRegistry>>,
    executor: Arc<RequestExecutor>,
    state: Arc<SharedState>,
}

impl HealthChecker {
    pub fn new(
        connection: Arc<ConnectionManager>,
        registry: Arc<RwLock<ObjectRegistry>>,
        executor: Arc<RequestExecutor>,
        state: Arc<SharedState>,
    ) -> Self {
        Self {
            connection,
            registry,
            executor,
            state,
        }
    }

    /// Run one check and publish the outcome. Returns true when healthy.
    ///
    /// A panic inside the check is caught and reported as
    /// [`HealthStatus::Error`].
    pub async fn check(&self) -> bool {
        match AssertUnwindSafe(self.evaluate()).catch_unwind().await {
            Ok(status) => {
                self.state.set_health(status);
                status == HealthStatus::Healthy
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                self.state.set_health(HealthStatus::Error);
                self.state.record_error(&message);
                error!(error = %message, "Health check failed unexpectedly");
                false
            }
        }
    }

    async fn evaluate(&self) -> HealthStatus {
        if !self.connection.is_connected() {
            warn!("Health check: not connected");
            return HealthStatus::Unhealthy;
        }

        let first = self.registry.read().first().cloned();
        let Some(object) = first else {
            debug!("Health check: no objects registered");
            return HealthStatus::Healthy;
        };

        match self.executor.read_object(&object).await {
            Ok(_) => {
                debug!(object = %object.key(), "Health check passed");
                HealthStatus::Healthy
            }
            Err(e) => {
                warn!(object = %object.key(), error = %e, "Health check failed");
                HealthStatus::Unhealthy
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in health check".to_string()
    }
}

/// Background task running [`HealthChecker::check`] every interval
///
/// The first check runs one interval after start. Dropping the monitor
/// aborts the task.
pub struct HealthMonitor {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl HealthMonitor {
    /// Spawn the monitor task. Must be called within a tokio runtime.
    pub fn start(checker: Arc<HealthChecker>, interval: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        let healthy = checker.check().await;
                        debug!(healthy, "Health monitor tick");
                    }
                }
            }

            debug!("Health monitor stopped");
        });

        info!(interval_secs = interval.as_secs(), "Health monitor started");
        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the task and wait for the current iteration to finish
    ///
    /// Aborts the task if it does not stop within `timeout`.
    pub async fn stop(mut self, timeout: Duration) {
        let _ = self.shutdown.send(true);
        let Some(mut handle) = self.handle.take() else {
            return;
        };

        if tokio::time::timeout(timeout, &mut handle).await.is_err() {
            warn!(
                timeout_secs = timeout.as_secs(),
                "Health monitor did not stop in time, aborting"
            );
            handle.abort();
        }
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MockConfig, MockPointConfig, ReaderConfig};
    use crate::executor::RequestPolicy;
    use crate::object::{BacnetObject, ObjectType, PresentValue};
    use crate::transport::mock::MockTransport;

    struct Fixture {
        mock: Arc<MockTransport>,
        connection: Arc<ConnectionManager>,
        registry: Arc<RwLock<ObjectRegistry>>,
        state: Arc<SharedState>,
        checker: Arc<HealthChecker>,
    }

    fn fixture() -> Fixture {
        let config = ReaderConfig::new("test", "127.0.0.1");
        let temp = BacnetObject::new(ObjectType::AnalogInput, 1, "Zone Temp", "");
        let mock = Arc::new(MockTransport::new(&MockConfig {
            points: vec![MockPointConfig {
                identity: temp.identity,
                value: PresentValue::Number(20.0),
            }],
            ..Default::default()
        }));
        let state = Arc::new(SharedState::new());
        let connection = Arc::new(ConnectionManager::new(
            mock.clone(),
            config.local_device(),
            "127.0.0.1",
            config.port,
            state.clone(),
        ));
        let registry = Arc::new(RwLock::new(ObjectRegistry::new()));
        let executor = Arc::new(RequestExecutor::new(
            connection.clone(),
            registry.clone(),
            state.clone(),
            RequestPolicy {
                retry_count: 1,
                ..RequestPolicy::from(&config)
            },
        ));
        let checker = Arc::new(HealthChecker::new(
            connection.clone(),
            registry.clone(),
            executor,
            state.clone(),
        ));
        Fixture {
            mock,
            connection,
            registry,
            state,
            checker,
        }
    }

    #[tokio::test]
    async fn test_not_connected_is_unhealthy() {
        let f = fixture();
        assert!(!f.checker.check().await);
        assert_eq!(f.state.health_status(), HealthStatus::Unhealthy);
        assert!(f.state.session().last_health_check.is_some());
        assert_eq!(f.mock.open_count(), 0);
    }

    #[tokio::test]
    async fn test_connected_without_objects_is_healthy() {
        let f = fixture();
        assert!(f.connection.connect().await);
        assert!(f.checker.check().await);
        assert_eq!(f.state.health_status(), HealthStatus::Healthy);
        assert!(f.mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_reads_first_registered_object() {
        let f = fixture();
        f.registry
            .write()
            .register(BacnetObject::new(ObjectType::AnalogInput, 1, "Zone Temp", ""));
        f.registry
            .write()
            .register(BacnetObject::new(ObjectType::AnalogValue, 9, "Missing", ""));
        assert!(f.connection.connect().await);

        assert!(f.checker.check().await);
        assert_eq!(f.mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_panic_becomes_error_status() {
        let f = fixture();
        f.registry
            .write()
            .register(BacnetObject::new(ObjectType::AnalogInput, 1, "Zone Temp", ""));
        assert!(f.connection.connect().await);
        f.mock.panic_on_next_requests(1);

        assert!(!f.checker.check().await);
        assert_eq!(f.state.health_status(), HealthStatus::Error);
        assert!(f.state.stats().last_error.unwrap().contains("injected fault"));

        assert!(f.checker.check().await);
        assert_eq!(f.state.health_status(), HealthStatus::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_first_check_after_one_interval() {
        let f = fixture();
        let monitor = HealthMonitor::start(f.checker.clone(), Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(f.state.health_status(), HealthStatus::Unknown);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(f.state.health_status(), HealthStatus::Unhealthy);
        assert!(monitor.is_running());

        monitor.stop(Duration::from_secs(5)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_task() {
        let f = fixture();
        let monitor = HealthMonitor::start(f.checker.clone(), Duration::from_secs(30));
        monitor.stop(Duration::from_secs(5)).await;

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(f.state.health_status(), HealthStatus::Unknown);
    }
}
