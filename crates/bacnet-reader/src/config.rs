//! Reader configuration
//!
//! This module contains configuration types for the reader, including
//! request policy, local device identity, discovery, health monitoring
//! and transport settings.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ReaderError;
use crate::object::{BacnetObject, ObjectIdentity, PresentValue};
use crate::transport::LocalDevice;

/// Standard BACnet/IP UDP port (0xBAC0)
pub const DEFAULT_PORT: u16 = 47808;

/// Configuration for a BACnet reader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Reader identifier, also used as the local device object name
    pub device_id: String,
    /// Network address of the session-local device
    pub device_address: String,
    /// UDP port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
    /// Read attempts per object (1 = no retry)
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// Delay between read attempts in seconds
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: f64,
    /// Command priority for writes (1..=16)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_priority: Option<u8>,
    /// Local device identity
    #[serde(default)]
    pub local_device: LocalDeviceConfig,
    /// Discovery configuration
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Health monitor configuration
    #[serde(default)]
    pub health: HealthConfig,
    /// Transport configuration
    #[serde(default)]
    pub transport: TransportConfig,
    /// Objects registered at construction
    #[serde(default)]
    pub objects: Vec<BacnetObject>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout_secs() -> f64 {
    5.0
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay_secs() -> f64 {
    1.0
}

impl ReaderConfig {
    /// Create a configuration with defaults for everything but the identity
    pub fn new(device_id: impl Into<String>, device_address: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            device_address: device_address.into(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            retry_delay_secs: default_retry_delay_secs(),
            write_priority: None,
            local_device: LocalDeviceConfig::default(),
            discovery: DiscoveryConfig::default(),
            health: HealthConfig::default(),
            transport: TransportConfig::default(),
            objects: Vec::new(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReaderError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReaderError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ReaderError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ReaderError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), ReaderError> {
        if self.device_id.trim().is_empty() {
            return Err(ReaderError::Config("device_id must not be empty".into()));
        }
        if self.retry_count == 0 {
            return Err(ReaderError::Config("retry_count must be at least 1".into()));
        }
        if duration_field("timeout_secs", self.timeout_secs)?.is_zero() {
            return Err(ReaderError::Config("timeout_secs must be positive, got 0".into()));
        }
        duration_field("retry_delay_secs", self.retry_delay_secs)?;
        if let Some(priority) = self.write_priority {
            if !(1..=16).contains(&priority) {
                return Err(ReaderError::Config(format!(
                    "write_priority must be within 1..=16, got {}",
                    priority
                )));
            }
        }
        if self.discovery.window_ms == 0 {
            return Err(ReaderError::Config("discovery.window_ms must be positive".into()));
        }
        if self.health.interval_secs == 0 {
            return Err(ReaderError::Config("health.interval_secs must be positive".into()));
        }
        Ok(())
    }

    /// Per-attempt timeout; out-of-range values saturate, `validate` rejects them
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or(Duration::MAX)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.retry_delay_secs).unwrap_or(Duration::ZERO)
    }

    /// Local device identity used to open sessions
    pub fn local_device(&self) -> LocalDevice {
        LocalDevice {
            object_name: self.device_id.clone(),
            instance: self.local_device.instance,
            max_apdu: self.local_device.max_apdu,
            segmentation: self.local_device.segmentation.clone(),
            vendor_id: self.local_device.vendor_id,
        }
    }
}

// =============================================================================
// Local Device
// =============================================================================

/// Identity advertised by the reader's own device object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalDeviceConfig {
    #[serde(default = "default_local_instance")]
    pub instance: u32,
    #[serde(default = "default_max_apdu")]
    pub max_apdu: u16,
    #[serde(default = "default_segmentation")]
    pub segmentation: String,
    #[serde(default = "default_vendor_id")]
    pub vendor_id: u16,
}

fn default_local_instance() -> u32 {
    999
}

fn default_max_apdu() -> u16 {
    1024
}

fn default_segmentation() -> String {
    "segmentedBoth".to_string()
}

fn default_vendor_id() -> u16 {
    842
}

impl Default for LocalDeviceConfig {
    fn default() -> Self {
        Self {
            instance: default_local_instance(),
            max_apdu: default_max_apdu(),
            segmentation: default_segmentation(),
            vendor_id: default_vendor_id(),
        }
    }
}

// =============================================================================
// Discovery / Health
// =============================================================================

/// Discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// How long to collect I-Am responses after a Who-Is
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

fn default_window_ms() -> u64 {
    2000
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
        }
    }
}

impl DiscoveryConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Health monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_health_interval")]
    pub interval_secs: u64,
    /// How long close() waits for an in-flight check
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_health_interval() -> u64 {
    30
}

/// Seconds as a `Duration`, rejecting negative, NaN and overflowing values
fn duration_field(name: &str, secs: f64) -> Result<Duration, ReaderError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ReaderError::Config(format!("{} is out of range ({}): {}", name, secs, e)))
}

fn default_shutdown_timeout() -> u64 {
    5
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_health_interval(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

// =============================================================================
// Transport Configuration
// =============================================================================

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Simulated network for testing and demos
    Mock(MockConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Mock(MockConfig::default())
    }
}

/// Mock transport configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockConfig {
    /// Simulated latency in milliseconds
    #[serde(default)]
    pub latency_ms: u64,
    /// Simulated point values
    #[serde(default)]
    pub points: Vec<MockPointConfig>,
    /// Simulated devices answering Who-Is
    #[serde(default)]
    pub devices: Vec<MockDeviceConfig>,
}

/// A simulated point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockPointConfig {
    #[serde(flatten)]
    pub identity: ObjectIdentity,
    pub value: PresentValue,
}

/// A simulated device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockDeviceConfig {
    pub device_id: u32,
    pub address: String,
    #[serde(default)]
    pub vendor_name: String,
    #[serde(default)]
    pub object_count: u32,
    /// Delay before the I-Am is delivered
    #[serde(default)]
    pub delay_ms: u64,
}
