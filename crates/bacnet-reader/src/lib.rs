//! bacnet-reader - client-side BACnet data acquisition
//!
//! This crate reads and writes present values of BACnet objects on a device,
//! discovers devices with Who-Is/I-Am and monitors connection health in the
//! background. PDU encoding and sockets live behind the transport adapter.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      BacnetReader                           │
//! │                                                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │ObjectRegistry│ │ BatchReader │  │  HealthMonitor      │  │
//! │  │ (points)    │  │ (read many) │  │  (background task)  │  │
//! │  └─────────────┘  └──────┬──────┘  └──────────┬──────────┘  │
//! │                          │                    │             │
//! │  ┌─────────────┐  ┌──────┴────────────────────┴──┐          │
//! │  │ Discovery   │  │       RequestExecutor        │          │
//! │  │ (Who-Is)    │  │ (timeout, retry, write)      │          │
//! │  └──────┬──────┘  └──────────────┬───────────────┘          │
//! │         │                        │                          │
//! │         └─────────┬──────────────┘                          │
//! │            ┌──────┴────────────┐     ┌──────────────┐       │
//! │            │ConnectionManager  │     │ SharedState  │       │
//! │            │ (session)         │     │ (stats)      │       │
//! │            └──────┬────────────┘     └──────────────┘       │
//! │            ┌──────┴────────────┐                            │
//! │            │TransportAdapter   │                            │
//! │            │(BACnet/IP, mock)  │                            │
//! │            └───────────────────┘                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use bacnet_reader::{BacnetObject, BacnetReader, ObjectType, ReaderConfig};
//!
//! let reader = BacnetReader::new(ReaderConfig::new("plant-reader", "192.168.1.10"))?;
//! reader.register_object(
//!     BacnetObject::new(ObjectType::AnalogInput, 1, "Supply Air Temp", "AHU-1 supply")
//!         .with_unit("degC"),
//! );
//! let values = reader.scope(|r| r.read_objects(None)).await;
//! ```

pub mod batch;
pub mod config;
pub mod connection;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod health;
pub mod object;
pub mod reader;
pub mod registry;
pub mod state;
pub mod transport;

pub use config::{ReaderConfig, TransportConfig, DEFAULT_PORT};
pub use discovery::DiscoveredDevice;
pub use error::ReaderError;
pub use object::{BacnetObject, ObjectIdentity, ObjectType, PresentValue, Quality, ReadResult};
pub use reader::{read_bacnet_data, BacnetReader, ReaderStatus, DEVICE_TYPE};
pub use registry::ObjectRegistry;
pub use state::{HealthStatus, SessionState, Statistics};
pub use transport::{create_transport, TransportAdapter, TransportError};
