//! Device discovery (Who-Is / I-Am)

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::connection::ConnectionManager;
use crate::error::ReaderError;
use crate::state::SharedState;
use crate::transport::{DeviceAnnouncement, IncomingPdu, UnconfirmedRequest};

/// A device that answered Who-Is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    pub device_id: u32,
    pub address: String,
    pub vendor_name: String,
    pub object_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services_supported: Option<BTreeMap<String, bool>>,
}

impl From<(DeviceAnnouncement, String)> for DiscoveredDevice {
    fn from((announcement, address): (DeviceAnnouncement, String)) -> Self {
        Self {
            device_id: announcement.device_id,
            address,
            vendor_name: announcement.vendor_name,
            object_count: announcement.object_count,
            services_supported: announcement.services_supported,
        }
    }
}

pub struct DiscoveryEngine {
    connection: Arc<ConnectionManager>,
    state: Arc<SharedState>,
    window: Duration,
    /// Every device seen so far, by device id
    cache: RwLock<BTreeMap<u32, DiscoveredDevice>>,
}

impl DiscoveryEngine {
    pub fn new(connection: Arc<ConnectionManager>, state: Arc<SharedState>, window: Duration) -> Self {
        Self {
            connection,
            state,
            window,
            cache: RwLock::new(BTreeMap::new()),
        }
    }

    /// Broadcast Who-Is and collect I-Am answers for one window
    ///
    /// Returns the devices seen in this call, in first-answer order. Any
    /// failure yields an empty list.
    pub async fn discover(&self, low: Option<u32>, high: Option<u32>) -> Vec<DiscoveredDevice> {
        match self.collect(low, high).await {
            Ok(devices) => devices,
            Err(e) => {
                self.state.record_error(&e);
                error!(error = %e, "Device discovery failed");
                Vec::new()
            }
        }
    }

    async fn collect(
        &self,
        low: Option<u32>,
        high: Option<u32>,
    ) -> Result<Vec<DiscoveredDevice>, ReaderError> {
        let session = self.connection.session().await?;

        // Subscribe before broadcasting so no early I-Am is missed
        let mut rx = session.subscribe();
        let who_is = UnconfirmedRequest::WhoIs {
            low_limit: low,
            high_limit: high,
        };
        if let Err(e) = session.send_broadcast(&who_is).await {
            let e = ReaderError::from(e);
            if e.is_connection_lost() {
                self.connection.mark_lost(&session, &e).await;
            }
            return Err(e);
        }

        info!(?low, ?high, window_ms = self.window.as_millis() as u64, "Sent Who-Is broadcast");

        let mut devices: Vec<DiscoveredDevice> = Vec::new();
        let mut positions: HashMap<u32, usize> = HashMap::new();
        let deadline = tokio::time::Instant::now() + self.window;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }

            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Ok(msg)) => match msg.pdu {
                    IncomingPdu::IAm(announcement) => {
                        debug!(device_id = announcement.device_id, source = %msg.source, "Received I-Am");
                        let device = DiscoveredDevice::from((announcement, msg.source));
                        match positions.get(&device.device_id) {
                            Some(&slot) => devices[slot] = device,
                            None => {
                                positions.insert(device.device_id, devices.len());
                                devices.push(device);
                            }
                        }
                    }
                    IncomingPdu::Other { service } => {
                        debug!(%service, source = %msg.source, "Ignoring unsolicited message");
                    }
                },
                Ok(Err(RecvError::Lagged(skipped))) => {
                    warn!(skipped, "Discovery fell behind incoming messages");
                }
                Ok(Err(RecvError::Closed)) => {
                    debug!("Incoming stream closed, ending discovery early");
                    break;
                }
                Err(_) => break,
            }
        }

        {
            let mut cache = self.cache.write();
            for device in &devices {
                cache.insert(device.device_id, device.clone());
            }
        }

        let objects: u64 = devices.iter().map(|d| u64::from(d.object_count)).sum();
        self.state.record_discovery(devices.len(), objects);
        info!(count = devices.len(), "Discovered BACnet devices");

        Ok(devices)
    }

    /// All devices seen by any discovery call, ordered by device id
    pub fn discovered(&self) -> Vec<DiscoveredDevice> {
        self.cache.read().values().cloned().collect()
    }

    pub fn discovered_count(&self) -> usize {
        self.cache.read().len()
    }
}
