//! Transport collaborator for BACnet communication
//!
//! The reader never encodes PDUs itself. It talks to a [`TransportAdapter`]
//! that opens [`BacnetSession`]s, which own the socket, invoke-id correlation
//! and wire encoding.
//!
//! # Example
//!
//! ```ignore
//! use bacnet_reader::transport::{create_transport, TransportAdapter};
//! use bacnet_reader::config::TransportConfig;
//!
//! let transport = create_transport(&TransportConfig::default())?;
//! let session = transport.open(&local_device, "192.168.1.10", 47808).await?;
//! let response = session.send_receive(&request, Duration::from_secs(5)).await?;
//! ```

mod adapter;
pub mod error;
pub mod mock;

pub use adapter::{
    BacnetSession, ConfirmedRequest, ConfirmedResponse, DeviceAnnouncement, IncomingMessage,
    IncomingPdu, LocalDevice, PropertyId, PropertyValue, TransportAdapter, UnconfirmedRequest,
};
pub use error::TransportError;

use std::sync::Arc;

use crate::config::TransportConfig;

/// Create a transport adapter based on configuration
pub fn create_transport(
    config: &TransportConfig,
) -> Result<Arc<dyn TransportAdapter>, TransportError> {
    match config {
        TransportConfig::Mock(cfg) => {
            let adapter = mock::MockTransport::new(cfg);
            Ok(Arc::new(adapter))
        }
    }
}
