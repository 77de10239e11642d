//! Connection manager
//!
//! Owns the transport session and the "connected" flag that gates every
//! other operation.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::ReaderError;
use crate::state::SharedState;
use crate::transport::{BacnetSession, LocalDevice, TransportAdapter};

pub struct ConnectionManager {
    transport: Arc<dyn TransportAdapter>,
    local: LocalDevice,
    address: String,
    port: u16,
    state: Arc<SharedState>,
    /// Serializes open/close; never held while a request is in flight
    session: Mutex<Option<Arc<dyn BacnetSession>>>,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn TransportAdapter>,
        local: LocalDevice,
        address: impl Into<String>,
        port: u16,
        state: Arc<SharedState>,
    ) -> Self {
        Self {
            transport,
            local,
            address: address.into(),
            port,
            state,
            session: Mutex::new(None),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Open the session if it is not open yet
    ///
    /// Returns true when connected. Failures are counted and logged, never
    /// propagated.
    pub async fn connect(&self) -> bool {
        if self.state.is_connected() {
            return true;
        }

        let mut slot = self.session.lock().await;
        // Another caller may have connected while we waited for the lock
        if self.state.is_connected() && slot.is_some() {
            return true;
        }

        match self
            .transport
            .open(&self.local, &self.address, self.port)
            .await
        {
            Ok(session) => {
                *slot = Some(session);
                self.state.set_connected(true);
                info!(
                    transport = self.transport.name(),
                    address = %self.address,
                    port = self.port,
                    "Connected to BACnet network"
                );
                true
            }
            Err(e) => {
                self.state.set_connected(false);
                self.state.record_connection_error(&e);
                error!(
                    address = %self.address,
                    port = self.port,
                    error = %e,
                    "Failed to connect to BACnet network"
                );
                false
            }
        }
    }

    /// Close the session if one is open. Close failures are only logged.
    pub async fn disconnect(&self) {
        let mut slot = self.session.lock().await;
        let Some(session) = slot.take() else {
            self.state.set_connected(false);
            return;
        };
        self.state.set_connected(false);

        match session.close().await {
            Ok(()) => info!(address = %self.address, "Disconnected from BACnet network"),
            Err(e) => error!(error = %e, "Error during disconnect"),
        }
    }

    /// Live session for a request, connecting first when needed
    pub async fn session(&self) -> Result<Arc<dyn BacnetSession>, ReaderError> {
        if !self.state.is_connected() && !self.connect().await {
            let reason = self
                .state
                .stats()
                .last_error
                .unwrap_or_else(|| "connect failed".to_string());
            return Err(ReaderError::ConnectionFailed(reason));
        }

        self.session
            .lock()
            .await
            .clone()
            .ok_or_else(|| ReaderError::ConnectionFailed("Session not available".to_string()))
    }

    /// Forget `failed` after the transport reported it closed
    ///
    /// The next request reconnects. Does nothing when `failed` has already
    /// been replaced by another caller.
    pub async fn mark_lost(&self, failed: &Arc<dyn BacnetSession>, error: &ReaderError) {
        let lost = {
            let mut slot = self.session.lock().await;
            match slot.as_ref() {
                Some(current) if Arc::ptr_eq(current, failed) => {
                    self.state.set_connected(false);
                    slot.take()
                }
                _ => None,
            }
        };
        let Some(session) = lost else {
            debug!(error = %error, "Ignoring error from a replaced session");
            return;
        };

        self.state.record_connection_error(error);
        warn!(error = %error, "BACnet session lost");

        if let Err(e) = session.close().await {
            debug!(error = %e, "Closing lost session failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MockConfig;
    use crate::transport::mock::MockTransport;

    fn manager(mock: Arc<MockTransport>) -> (ConnectionManager, Arc<SharedState>) {
        let state = Arc::new(SharedState::new());
        let local = crate::config::ReaderConfig::new("test", "127.0.0.1").local_device();
        (
            ConnectionManager::new(mock, local, "127.0.0.1", 47808, state.clone()),
            state,
        )
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let mock = Arc::new(MockTransport::new(&MockConfig::default()));
        let (manager, _) = manager(mock.clone());

        assert!(manager.connect().await);
        assert!(manager.connect().await);
        assert_eq!(mock.open_count(), 1);
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_connect_failure_is_recorded() {
        let mock = Arc::new(MockTransport::new(&MockConfig::default()));
        mock.set_fail_open(true);
        let (manager, state) = manager(mock.clone());

        assert!(!manager.connect().await);
        assert!(!manager.is_connected());

        let stats = state.stats();
        assert_eq!(stats.connection_errors, 1);
        assert!(stats.last_error.unwrap().contains("refused"));

        let err = manager.session().await.err().unwrap();
        assert!(matches!(err, ReaderError::ConnectionFailed(_)));
        assert_eq!(state.stats().connection_errors, 2);
    }

    #[tokio::test]
    async fn test_disconnect_without_connect_is_noop() {
        let mock = Arc::new(MockTransport::new(&MockConfig::default()));
        let (manager, _) = manager(mock.clone());

        manager.disconnect().await;
        assert_eq!(mock.close_count(), 0);
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_closes_once() {
        let mock = Arc::new(MockTransport::new(&MockConfig::default()));
        let (manager, _) = manager(mock.clone());

        assert!(manager.connect().await);
        manager.disconnect().await;
        manager.disconnect().await;
        assert_eq!(mock.close_count(), 1);
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_mark_lost_reconnects_on_next_request() {
        let mock = Arc::new(MockTransport::new(&MockConfig::default()));
        let (manager, state) = manager(mock.clone());

        let first = manager.session().await.unwrap();
        manager.mark_lost(&first, &closed()).await;
        assert!(!manager.is_connected());
        assert_eq!(state.stats().connection_errors, 1);
        assert_eq!(mock.close_count(), 1);

        manager.session().await.unwrap();
        assert_eq!(mock.open_count(), 2);
    }

    #[tokio::test]
    async fn test_stale_loss_keeps_replacement_session() {
        let mock = Arc::new(MockTransport::new(&MockConfig::default()));
        let (manager, state) = manager(mock.clone());

        let first = manager.session().await.unwrap();
        manager.mark_lost(&first, &closed()).await;
        let second = manager.session().await.unwrap();

        // A second request that was still in flight on the first session
        manager.mark_lost(&first, &closed()).await;

        assert!(manager.is_connected());
        assert!(Arc::ptr_eq(&manager.session().await.unwrap(), &second));
        assert_eq!(mock.open_count(), 2);
        assert_eq!(mock.close_count(), 1);
        assert_eq!(state.stats().connection_errors, 1);
    }

    fn closed() -> ReaderError {
        ReaderError::Transport(crate::transport::TransportError::ConnectionClosed)
    }
}
