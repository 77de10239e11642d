//! BACnet reader facade

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info};

use crate::batch::BatchReader;
use crate::config::ReaderConfig;
use crate::connection::ConnectionManager;
use crate::discovery::{DiscoveredDevice, DiscoveryEngine};
use crate::error::ReaderError;
use crate::executor::{RequestExecutor, RequestPolicy};
use crate::health::{HealthChecker, HealthMonitor};
use crate::object::{BacnetObject, PresentValue, ReadResult};
use crate::registry::ObjectRegistry;
use crate::state::{HealthStatus, SharedState, Statistics};
use crate::transport::{create_transport, TransportAdapter};

/// Device type reported in status snapshots
pub const DEVICE_TYPE: &str = "bacnet_device";

/// Point-in-time view of a reader
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReaderStatus {
    pub device_id: String,
    pub device_type: &'static str,
    pub device_address: String,
    pub port: u16,
    pub timeout_secs: f64,
    pub retry_count: u32,
    pub retry_delay_secs: f64,
    pub is_connected: bool,
    pub health_status: HealthStatus,
    pub last_read_time: Option<DateTime<Utc>>,
    pub last_health_check: Option<DateTime<Utc>>,
    pub object_count: usize,
    pub discovered_devices_count: usize,
    pub stats: Statistics,
}

/// Client-side BACnet data acquisition
///
/// Reads and writes object present values on one device address, discovers
/// devices on the network and keeps connection health current from a
/// background task. Construction needs a tokio runtime.
pub struct BacnetReader {
    config: ReaderConfig,
    state: Arc<SharedState>,
    registry: Arc<RwLock<ObjectRegistry>>,
    connection: Arc<ConnectionManager>,
    executor: Arc<RequestExecutor>,
    batch: BatchReader,
    discovery: DiscoveryEngine,
    checker: Arc<HealthChecker>,
    monitor: Mutex<Option<HealthMonitor>>,
}

impl BacnetReader {
    /// Create a reader using the transport named in the configuration
    pub fn new(config: ReaderConfig) -> Result<Self, ReaderError> {
        config.validate()?;
        let transport = create_transport(&config.transport)?;
        Self::with_transport(config, transport)
    }

    /// Create a reader on an existing transport adapter
    pub fn with_transport(
        config: ReaderConfig,
        transport: Arc<dyn TransportAdapter>,
    ) -> Result<Self, ReaderError> {
        config.validate()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(ReaderError::Config(
                "BacnetReader must be created inside a tokio runtime".into(),
            ));
        }

        let state = Arc::new(SharedState::new());

        let mut registry = ObjectRegistry::new();
        registry.register_many(config.objects.iter().cloned());
        let registry = Arc::new(RwLock::new(registry));

        let connection = Arc::new(ConnectionManager::new(
            transport,
            config.local_device(),
            config.device_address.clone(),
            config.port,
            state.clone(),
        ));
        let executor = Arc::new(RequestExecutor::new(
            connection.clone(),
            registry.clone(),
            state.clone(),
            RequestPolicy::from(&config),
        ));
        let batch = BatchReader::new(executor.clone(), registry.clone(), state.clone());
        let discovery =
            DiscoveryEngine::new(connection.clone(), state.clone(), config.discovery.window());
        let checker = Arc::new(HealthChecker::new(
            connection.clone(),
            registry.clone(),
            executor.clone(),
            state.clone(),
        ));

        let monitor = if config.health.enabled {
            Some(HealthMonitor::start(checker.clone(), config.health.interval()))
        } else {
            debug!("Health monitor disabled");
            None
        };

        info!(
            device_id = %config.device_id,
            address = %config.device_address,
            port = config.port,
            "BACnet reader initialized"
        );

        Ok(Self {
            config,
            state,
            registry,
            connection,
            executor,
            batch,
            discovery,
            checker,
            monitor: Mutex::new(monitor),
        })
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    // =========================================================================
    // Registry
    // =========================================================================

    pub fn register_object(&self, object: BacnetObject) {
        self.registry.write().register(object);
    }

    pub fn register_objects(&self, objects: impl IntoIterator<Item = BacnetObject>) {
        self.registry.write().register_many(objects);
    }

    /// Registered objects in registration order
    pub fn objects(&self) -> Vec<BacnetObject> {
        self.registry.read().all().to_vec()
    }

    // =========================================================================
    // Connection
    // =========================================================================

    pub async fn connect(&self) -> bool {
        self.connection.connect().await
    }

    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    // =========================================================================
    // Data access
    // =========================================================================

    pub async fn read_object(&self, object: &BacnetObject) -> Result<PresentValue, ReaderError> {
        self.executor.read_object(object).await
    }

    /// Read the named objects, or every registered object for `None`
    pub async fn read_objects(
        &self,
        names: Option<&[String]>,
    ) -> BTreeMap<String, Option<ReadResult>> {
        self.batch.read_objects(names).await
    }

    /// Write by registry key or object name
    pub async fn write_object(
        &self,
        name: &str,
        value: impl Into<PresentValue>,
    ) -> Result<(), ReaderError> {
        self.executor.write_object(name, value.into()).await
    }

    // =========================================================================
    // Discovery
    // =========================================================================

    pub async fn discover_devices(&self) -> Vec<DiscoveredDevice> {
        self.discovery.discover(None, None).await
    }

    /// Discover devices whose instance lies within `low..=high`
    pub async fn discover_devices_in_range(&self, low: u32, high: u32) -> Vec<DiscoveredDevice> {
        self.discovery.discover(Some(low), Some(high)).await
    }

    pub fn discovered_devices(&self) -> Vec<DiscoveredDevice> {
        self.discovery.discovered()
    }

    // =========================================================================
    // Health and status
    // =========================================================================

    pub async fn check_health(&self) -> bool {
        self.checker.check().await
    }

    pub fn health_status(&self) -> HealthStatus {
        self.state.health_status()
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.lock().as_ref().is_some_and(HealthMonitor::is_running)
    }

    pub fn stats(&self) -> Statistics {
        self.state.stats()
    }

    pub fn status(&self) -> ReaderStatus {
        let session = self.state.session();
        ReaderStatus {
            device_id: self.config.device_id.clone(),
            device_type: DEVICE_TYPE,
            device_address: self.config.device_address.clone(),
            port: self.config.port,
            timeout_secs: self.config.timeout_secs,
            retry_count: self.config.retry_count,
            retry_delay_secs: self.config.retry_delay_secs,
            is_connected: session.connected,
            health_status: session.health_status,
            last_read_time: session.last_read_time,
            last_health_check: session.last_health_check,
            object_count: self.registry.read().len(),
            discovered_devices_count: self.discovery.discovered_count(),
            stats: self.state.stats(),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Stop the health monitor and release the session
    ///
    /// Safe to call more than once and before any connect.
    pub async fn close(&self) {
        let monitor = self.monitor.lock().take();
        if let Some(monitor) = monitor {
            monitor.stop(self.config.health.shutdown_timeout()).await;
        }
        self.connection.disconnect().await;
        info!(device_id = %self.config.device_id, "BACnet reader closed");
    }

    /// Connect, run `f`, then close
    ///
    /// The reader is closed on every exit path; a panic inside `f` resumes
    /// after closing.
    pub async fn scope<'a, F, Fut, T>(&'a self, f: F) -> T
    where
        F: FnOnce(&'a Self) -> Fut,
        Fut: Future<Output = T> + 'a,
    {
        self.connect().await;
        let result = AssertUnwindSafe(f(self)).catch_unwind().await;
        self.close().await;
        match result {
            Ok(value) => value,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

// The monitor aborts itself when dropped; only the session needs help here
impl Drop for BacnetReader {
    fn drop(&mut self) {
        if self.connection.is_connected() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let connection = self.connection.clone();
                handle.spawn(async move { connection.disconnect().await });
            }
        }
    }
}

/// Read every object in `objects` with a short-lived reader
pub async fn read_bacnet_data(
    config: ReaderConfig,
    objects: Vec<BacnetObject>,
) -> Result<BTreeMap<String, Option<ReadResult>>, ReaderError> {
    let reader = BacnetReader::new(config)?;
    reader.register_objects(objects);
    Ok(reader.scope(|r| r.read_objects(None)).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MockConfig, MockPointConfig, TransportConfig};
    use crate::object::ObjectType;
    use pretty_assertions::assert_eq;

    fn config() -> ReaderConfig {
        let mut config = ReaderConfig::new("plant-reader", "192.168.1.10");
        config.transport = TransportConfig::Mock(MockConfig {
            points: vec![MockPointConfig {
                identity: crate::object::ObjectIdentity::new(ObjectType::AnalogInput, 1),
                value: PresentValue::Number(21.0),
            }],
            ..Default::default()
        });
        config
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let mut config = config();
        config
            .objects
            .push(BacnetObject::new(ObjectType::AnalogInput, 1, "Zone Temp", ""));
        let reader = BacnetReader::new(config).unwrap();

        let status = reader.status();
        assert_eq!(status.device_id, "plant-reader");
        assert_eq!(status.device_type, "bacnet_device");
        assert_eq!(status.port, 47808);
        assert_eq!(status.retry_count, 3);
        assert!(!status.is_connected);
        assert_eq!(status.health_status, HealthStatus::Unknown);
        assert_eq!(status.object_count, 1);
        assert_eq!(status.discovered_devices_count, 0);
        assert_eq!(status.stats, Statistics::default());

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["health_status"], "unknown");
        assert_eq!(json["stats"]["total_reads"], 0);

        reader.close().await;
    }

    #[tokio::test]
    async fn test_health_disabled_skips_monitor() {
        let mut config = config();
        config.health.enabled = false;
        let reader = BacnetReader::new(config).unwrap();
        assert!(!reader.is_monitoring());
        reader.close().await;
    }

    #[tokio::test]
    async fn test_invalid_config_fails_construction() {
        let mut config = config();
        config.retry_count = 0;
        assert!(matches!(
            BacnetReader::new(config),
            Err(ReaderError::Config(_))
        ));
    }

    #[test]
    fn test_construction_requires_runtime() {
        assert!(matches!(
            BacnetReader::new(config()),
            Err(ReaderError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_read_bacnet_data() {
        let results = read_bacnet_data(
            config(),
            vec![BacnetObject::new(ObjectType::AnalogInput, 1, "Zone Temp", "").with_unit("degC")],
        )
        .await
        .unwrap();

        let result = results["analogInput_1"].as_ref().unwrap();
        assert_eq!(result.value, PresentValue::Number(21.0));
        assert_eq!(result.unit, "degC");
    }
}
