//! Mock transport adapter for testing and simulation

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::{
    BacnetSession, ConfirmedRequest, ConfirmedResponse, DeviceAnnouncement, IncomingMessage,
    IncomingPdu, LocalDevice, PropertyValue, TransportAdapter, TransportError, UnconfirmedRequest,
};
use crate::config::MockConfig;
use crate::object::ObjectIdentity;

/// How the simulated network treats requests for one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointFault {
    /// Never answers (request times out)
    Silent,
    /// Answers without a value
    Empty,
    /// Answers with an Error PDU
    Reject,
}

/// A device that answers Who-Is
#[derive(Debug, Clone)]
struct SimulatedDevice {
    address: String,
    announcement: DeviceAnnouncement,
    delay: Duration,
}

/// State shared between the adapter and every session it opened
struct MockState {
    latency: Duration,
    points: RwLock<HashMap<ObjectIdentity, PropertyValue>>,
    faults: RwLock<HashMap<ObjectIdentity, PointFault>>,
    devices: RwLock<Vec<SimulatedDevice>>,
    /// Every confirmed request that reached the network
    requests: RwLock<Vec<ConfirmedRequest>>,
    broadcasts: RwLock<Vec<UnconfirmedRequest>>,
    silent: AtomicBool,
    fail_open: AtomicBool,
    fail_broadcast: AtomicBool,
    /// Number of upcoming confirmed requests that panic
    panic_budget: AtomicUsize,
    open_count: AtomicUsize,
    close_count: AtomicUsize,
    incoming_tx: broadcast::Sender<IncomingMessage>,
}

/// Mock transport adapter
///
/// Keeps a simulated point table and device list. The control methods also
/// affect sessions that are already open.
pub struct MockTransport {
    state: Arc<MockState>,
    current: RwLock<Option<Arc<MockSession>>>,
}

impl MockTransport {
    pub fn new(config: &MockConfig) -> Self {
        let (incoming_tx, _) = broadcast::channel(256);

        let points = config
            .points
            .iter()
            .map(|p| (p.identity, PropertyValue::from(&p.value)))
            .collect();

        let devices = config
            .devices
            .iter()
            .map(|d| SimulatedDevice {
                address: d.address.clone(),
                announcement: DeviceAnnouncement {
                    device_id: d.device_id,
                    vendor_name: d.vendor_name.clone(),
                    object_count: d.object_count,
                    services_supported: None,
                },
                delay: Duration::from_millis(d.delay_ms),
            })
            .collect();

        Self {
            state: Arc::new(MockState {
                latency: Duration::from_millis(config.latency_ms),
                points: RwLock::new(points),
                faults: RwLock::new(HashMap::new()),
                devices: RwLock::new(devices),
                requests: RwLock::new(Vec::new()),
                broadcasts: RwLock::new(Vec::new()),
                silent: AtomicBool::new(false),
                fail_open: AtomicBool::new(false),
                fail_broadcast: AtomicBool::new(false),
                panic_budget: AtomicUsize::new(0),
                open_count: AtomicUsize::new(0),
                close_count: AtomicUsize::new(0),
                incoming_tx,
            }),
            current: RwLock::new(None),
        }
    }

    /// Set the value a point reports
    pub fn set_point(&self, object: ObjectIdentity, value: PropertyValue) {
        self.state.points.write().insert(object, value);
    }

    /// Current value of a point (reflects writes)
    pub fn point(&self, object: ObjectIdentity) -> Option<PropertyValue> {
        self.state.points.read().get(&object).cloned()
    }

    /// Make requests for one object misbehave
    pub fn set_fault(&self, object: ObjectIdentity, fault: PointFault) {
        self.state.faults.write().insert(object, fault);
    }

    pub fn clear_fault(&self, object: ObjectIdentity) {
        self.state.faults.write().remove(&object);
    }

    /// Stop answering every confirmed request
    pub fn set_silent(&self, silent: bool) {
        self.state.silent.store(silent, Ordering::SeqCst);
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.state.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_broadcast(&self, fail: bool) {
        self.state.fail_broadcast.store(fail, Ordering::SeqCst);
    }

    /// Panic inside the next `count` confirmed requests
    pub fn panic_on_next_requests(&self, count: usize) {
        self.state.panic_budget.store(count, Ordering::SeqCst);
    }

    /// Add a device that answers Who-Is after `delay`
    pub fn add_device(
        &self,
        address: impl Into<String>,
        announcement: DeviceAnnouncement,
        delay: Duration,
    ) {
        self.state.devices.write().push(SimulatedDevice {
            address: address.into(),
            announcement,
            delay,
        });
    }

    /// Inject an unsolicited message into open sessions
    pub fn inject_incoming(&self, source: impl Into<String>, pdu: IncomingPdu) {
        let msg = IncomingMessage {
            timestamp: Instant::now(),
            source: source.into(),
            pdu,
        };
        let _ = self.state.incoming_tx.send(msg);
    }

    /// Simulate the network dropping the open session
    pub fn drop_session(&self) {
        if let Some(session) = self.current.read().as_ref() {
            session.open.store(false, Ordering::SeqCst);
        }
    }

    pub fn open_count(&self) -> usize {
        self.state.open_count.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.state.close_count.load(Ordering::SeqCst)
    }

    /// Confirmed requests sent so far
    pub fn requests(&self) -> Vec<ConfirmedRequest> {
        self.state.requests.read().clone()
    }

    /// Number of confirmed requests addressed to `object`
    pub fn request_count(&self, object: ObjectIdentity) -> usize {
        self.state
            .requests
            .read()
            .iter()
            .filter(|r| r.object() == object)
            .count()
    }

    pub fn broadcasts(&self) -> Vec<UnconfirmedRequest> {
        self.state.broadcasts.read().clone()
    }
}

#[async_trait]
impl TransportAdapter for MockTransport {
    async fn open(
        &self,
        local: &LocalDevice,
        address: &str,
        port: u16,
    ) -> Result<Arc<dyn BacnetSession>, TransportError> {
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionFailed(format!(
                "Mock transport refused to bind {}:{}",
                address, port
            )));
        }

        self.state.open_count.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            device = %local.object_name,
            instance = local.instance,
            %address,
            port,
            "Mock transport: session opened"
        );

        let session = Arc::new(MockSession {
            state: self.state.clone(),
            open: AtomicBool::new(true),
        });
        *self.current.write() = Some(session.clone());
        Ok(session)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Session handed out by [`MockTransport`]
pub struct MockSession {
    state: Arc<MockState>,
    open: AtomicBool,
}

impl MockSession {
    fn respond(&self, request: &ConfirmedRequest) -> Result<ConfirmedResponse, TransportError> {
        match request {
            ConfirmedRequest::ReadProperty { object, property } => {
                let value = self
                    .state
                    .points
                    .read()
                    .get(object)
                    .cloned()
                    .ok_or_else(|| {
                        TransportError::Rejected(format!("unknown-object {}", object))
                    })?;
                Ok(ConfirmedResponse::ReadPropertyAck {
                    object: *object,
                    property: *property,
                    value,
                })
            }
            ConfirmedRequest::WriteProperty { object, value, .. } => {
                let mut points = self.state.points.write();
                match points.get_mut(object) {
                    Some(slot) => {
                        *slot = value.clone();
                        Ok(ConfirmedResponse::SimpleAck)
                    }
                    None => Err(TransportError::Rejected(format!("unknown-object {}", object))),
                }
            }
        }
    }
}

#[async_trait]
impl BacnetSession for MockSession {
    async fn send_receive(
        &self,
        request: &ConfirmedRequest,
        _timeout: Duration,
    ) -> Result<Option<ConfirmedResponse>, TransportError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }

        self.state.requests.write().push(request.clone());

        let budget = self.state.panic_budget.load(Ordering::SeqCst);
        if budget > 0 {
            self.state.panic_budget.store(budget - 1, Ordering::SeqCst);
            panic!("mock transport: injected fault for {}", request.object());
        }

        // Simulate latency; the session may be dropped while a request is in flight
        if !self.state.latency.is_zero() {
            tokio::time::sleep(self.state.latency).await;
            if !self.open.load(Ordering::SeqCst) {
                return Err(TransportError::ConnectionClosed);
            }
        }

        let fault = self.state.faults.read().get(&request.object()).copied();
        if self.state.silent.load(Ordering::SeqCst) || fault == Some(PointFault::Silent) {
            // The caller's timeout is the only way out
            std::future::pending::<()>().await;
        }

        match fault {
            Some(PointFault::Empty) => Ok(None),
            Some(PointFault::Reject) => Err(TransportError::Rejected(format!(
                "property-access-denied {}",
                request.object()
            ))),
            _ => self.respond(request).map(Some),
        }
    }

    async fn send_broadcast(&self, request: &UnconfirmedRequest) -> Result<(), TransportError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }
        if self.state.fail_broadcast.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("Mock broadcast failure".into()));
        }

        self.state.broadcasts.write().push(request.clone());
        tracing::debug!(?request, "Mock transport: broadcast sent");

        let UnconfirmedRequest::WhoIs {
            low_limit,
            high_limit,
        } = request;
        let low = low_limit.unwrap_or(0);
        let high = high_limit.unwrap_or(u32::MAX);

        let devices: Vec<SimulatedDevice> = self
            .state
            .devices
            .read()
            .iter()
            .filter(|d| (low..=high).contains(&d.announcement.device_id))
            .cloned()
            .collect();

        for device in devices {
            let tx = self.state.incoming_tx.clone();
            tokio::spawn(async move {
                if !device.delay.is_zero() {
                    tokio::time::sleep(device.delay).await;
                }
                let _ = tx.send(IncomingMessage {
                    timestamp: Instant::now(),
                    source: device.address,
                    pdu: IncomingPdu::IAm(device.announcement),
                });
            });
        }

        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<IncomingMessage> {
        self.state.incoming_tx.subscribe()
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.open.store(false, Ordering::SeqCst);
        self.state.close_count.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Mock transport: session closed");
        Ok(())
    }
}
