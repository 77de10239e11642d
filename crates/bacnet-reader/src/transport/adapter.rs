//! Transport collaborator traits and request/response types

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::TransportError;
use crate::object::{ObjectIdentity, PresentValue};

/// Identity of the local (client-side) BACnet device used to open a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDevice {
    pub object_name: String,
    pub instance: u32,
    pub max_apdu: u16,
    pub segmentation: String,
    pub vendor_id: u16,
}

/// Property identifiers the reader asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyId {
    PresentValue,
}

/// Application-layer primitive values
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Boolean(bool),
    Unsigned(u32),
    Real(f32),
    Double(f64),
    Enumerated(u32),
    CharacterString(String),
}

impl PropertyValue {
    /// Convert to the caller-facing value. `Null` carries no usable value.
    pub fn into_present_value(self) -> Option<PresentValue> {
        match self {
            PropertyValue::Null => None,
            PropertyValue::Boolean(b) => Some(PresentValue::Boolean(b)),
            PropertyValue::Unsigned(u) | PropertyValue::Enumerated(u) => {
                Some(PresentValue::Number(f64::from(u)))
            }
            PropertyValue::Real(r) => Some(PresentValue::Number(f64::from(r))),
            PropertyValue::Double(d) => Some(PresentValue::Number(d)),
            PropertyValue::CharacterString(s) => Some(PresentValue::Text(s)),
        }
    }
}

/// Write coercion: Number -> Real, Boolean -> Boolean, Text -> CharacterString
impl From<&PresentValue> for PropertyValue {
    fn from(value: &PresentValue) -> Self {
        match value {
            PresentValue::Number(n) => PropertyValue::Real(*n as f32),
            PresentValue::Boolean(b) => PropertyValue::Boolean(*b),
            PresentValue::Text(s) => PropertyValue::CharacterString(s.clone()),
        }
    }
}

/// Confirmed service requests (expect a reply correlated by invoke id)
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmedRequest {
    ReadProperty {
        object: ObjectIdentity,
        property: PropertyId,
    },
    WriteProperty {
        object: ObjectIdentity,
        property: PropertyId,
        value: PropertyValue,
        /// Command priority 1..=16, `None` for the default
        priority: Option<u8>,
    },
}

impl ConfirmedRequest {
    pub fn object(&self) -> ObjectIdentity {
        match self {
            ConfirmedRequest::ReadProperty { object, .. }
            | ConfirmedRequest::WriteProperty { object, .. } => *object,
        }
    }
}

/// Replies to confirmed requests
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmedResponse {
    ReadPropertyAck {
        object: ObjectIdentity,
        property: PropertyId,
        value: PropertyValue,
    },
    SimpleAck,
}

/// Unconfirmed service requests (broadcast, no reply)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnconfirmedRequest {
    WhoIs {
        low_limit: Option<u32>,
        high_limit: Option<u32>,
    },
}

/// Device identity carried by an I-Am, enriched by the protocol stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAnnouncement {
    pub device_id: u32,
    pub vendor_name: String,
    pub object_count: u32,
    pub services_supported: Option<BTreeMap<String, bool>>,
}

/// Unsolicited PDU payloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingPdu {
    IAm(DeviceAnnouncement),
    /// Any other unconfirmed service (COV notification, time sync, ...)
    Other { service: String },
}

/// Incoming unsolicited message from the session
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Timestamp when the message was received
    pub timestamp: Instant,
    /// Network address of the sender
    pub source: String,
    pub pdu: IncomingPdu,
}

/// Factory for BACnet sessions
#[async_trait]
pub trait TransportAdapter: Send + Sync {
    /// Open a session for `local` bound to `address:port`
    async fn open(
        &self,
        local: &LocalDevice,
        address: &str,
        port: u16,
    ) -> Result<Arc<dyn BacnetSession>, TransportError>;

    /// Short transport name for logs
    fn name(&self) -> &'static str;
}

/// A live BACnet session
///
/// The session owns invoke-id allocation and response correlation; callers
/// only see request in, response (or error) out.
#[async_trait]
pub trait BacnetSession: Send + Sync {
    /// Send a confirmed request and wait for its reply
    ///
    /// Returns `Ok(None)` when the device answered without a usable payload.
    async fn send_receive(
        &self,
        request: &ConfirmedRequest,
        timeout: Duration,
    ) -> Result<Option<ConfirmedResponse>, TransportError>;

    /// Broadcast an unconfirmed request to the local network
    async fn send_broadcast(&self, request: &UnconfirmedRequest) -> Result<(), TransportError>;

    /// Subscribe to unsolicited incoming messages
    ///
    /// Only messages received after the call are delivered.
    fn subscribe(&self) -> broadcast::Receiver<IncomingMessage>;

    /// Close the session
    async fn close(&self) -> Result<(), TransportError>;
}
