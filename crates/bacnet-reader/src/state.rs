//! Shared session state and statistics
//!
//! Both are mutated from foreground calls and from the health monitor task.
//! All access goes through [`SharedState`]; each block sits behind its own
//! lock and no guard is ever held across an `.await`.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

/// Health of the connection as last observed by a health check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// No check has run yet
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
    /// The check itself failed unexpectedly
    Error,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Connection and health bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub connected: bool,
    pub last_read_time: Option<DateTime<Utc>>,
    pub health_status: HealthStatus,
    pub last_health_check: Option<DateTime<Utc>>,
}

/// Reader statistics
///
/// `failed_reads` counts failed *attempts*: a read that exhausts three
/// retries adds three. `failed_requests` counts reads whose attempts all
/// failed. `devices_discovered` and `objects_discovered` describe the latest
/// discovery call only; `devices_discovered_total` accumulates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub total_reads: u64,
    pub successful_reads: u64,
    pub failed_reads: u64,
    pub failed_requests: u64,
    pub successful_writes: u64,
    pub failed_writes: u64,
    pub objects_discovered: u64,
    pub devices_discovered: u64,
    pub devices_discovered_total: u64,
    pub connection_errors: u64,
    pub last_error: Option<String>,
}

/// Lock-guarded state shared by every component of a reader
#[derive(Debug, Default)]
pub struct SharedState {
    session: RwLock<SessionState>,
    stats: Mutex<Statistics>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> SessionState {
        self.session.read().clone()
    }

    pub fn stats(&self) -> Statistics {
        self.stats.lock().clone()
    }

    // --- session fields -----------------------------------------------------

    pub fn is_connected(&self) -> bool {
        self.session.read().connected
    }

    pub fn set_connected(&self, connected: bool) {
        self.session.write().connected = connected;
    }

    pub fn health_status(&self) -> HealthStatus {
        self.session.read().health_status
    }

    /// Publish a health check outcome, stamping the check time
    pub fn set_health(&self, status: HealthStatus) {
        let mut session = self.session.write();
        session.health_status = status;
        session.last_health_check = Some(Utc::now());
    }

    // --- statistics -----------------------------------------------------------

    pub fn record_batch(&self) {
        self.stats.lock().total_reads += 1;
    }

    pub fn record_read_success(&self) {
        self.stats.lock().successful_reads += 1;
        self.session.write().last_read_time = Some(Utc::now());
    }

    pub fn record_read_attempt_failure(&self, error: &impl ToString) {
        let mut stats = self.stats.lock();
        stats.failed_reads += 1;
        stats.last_error = Some(error.to_string());
    }

    pub fn record_read_request_failure(&self) {
        self.stats.lock().failed_requests += 1;
    }

    pub fn record_write_success(&self) {
        self.stats.lock().successful_writes += 1;
    }

    pub fn record_write_failure(&self, error: &impl ToString) {
        let mut stats = self.stats.lock();
        stats.failed_writes += 1;
        stats.last_error = Some(error.to_string());
    }

    pub fn record_connection_error(&self, error: &impl ToString) {
        let mut stats = self.stats.lock();
        stats.connection_errors += 1;
        stats.last_error = Some(error.to_string());
    }

    pub fn record_error(&self, error: &impl ToString) {
        self.stats.lock().last_error = Some(error.to_string());
    }

    pub fn record_discovery(&self, devices: usize, objects: u64) {
        let mut stats = self.stats.lock();
        stats.devices_discovered = devices as u64;
        stats.devices_discovered_total += devices as u64;
        stats.objects_discovered = objects;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_initial_state() {
        let state = SharedState::new();
        let session = state.session();
        assert!(!session.connected);
        assert_eq!(session.health_status, HealthStatus::Unknown);
        assert!(session.last_read_time.is_none());
        assert!(session.last_health_check.is_none());
        assert_eq!(state.stats(), Statistics::default());
    }

    #[test]
    fn test_read_accounting() {
        let state = SharedState::new();
        state.record_read_attempt_failure(&"timeout");
        state.record_read_attempt_failure(&"timeout");
        state.record_read_request_failure();
        state.record_read_success();

        let stats = state.stats();
        assert_eq!(stats.failed_reads, 2);
        assert_eq!(stats.failed_requests, 1);
        assert_eq!(stats.successful_reads, 1);
        assert_eq!(stats.last_error.as_deref(), Some("timeout"));
        assert!(state.session().last_read_time.is_some());
    }

    #[test]
    fn test_discovery_gauges_and_total() {
        let state = SharedState::new();
        state.record_discovery(3, 50);
        state.record_discovery(2, 10);

        let stats = state.stats();
        assert_eq!(stats.devices_discovered, 2);
        assert_eq!(stats.devices_discovered_total, 5);
        assert_eq!(stats.objects_discovered, 10);
    }

    #[test]
    fn test_set_health_stamps_check_time() {
        let state = SharedState::new();
        state.set_health(HealthStatus::Unhealthy);
        let session = state.session();
        assert_eq!(session.health_status, HealthStatus::Unhealthy);
        assert!(session.last_health_check.is_some());
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let state = Arc::new(SharedState::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        state.record_read_success();
                        state.record_batch();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = state.stats();
        assert_eq!(stats.successful_reads, 8000);
        assert_eq!(stats.total_reads, 8000);
    }
}
