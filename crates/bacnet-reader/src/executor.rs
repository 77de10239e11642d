//! Request executor
//!
//! Runs single-object reads (with retry) and writes against the session held
//! by the [`ConnectionManager`], and keeps the read/write statistics.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::ReaderConfig;
use crate::connection::ConnectionManager;
use crate::error::ReaderError;
use crate::object::{BacnetObject, PresentValue};
use crate::registry::ObjectRegistry;
use crate::state::SharedState;
use crate::transport::{
    BacnetSession, ConfirmedRequest, ConfirmedResponse, PropertyId, PropertyValue, TransportError,
};

/// Timing and retry policy applied to every request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestPolicy {
    pub timeout: Duration,
    /// Read attempts per object, at least 1
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub write_priority: Option<u8>,
}

impl From<&ReaderConfig> for RequestPolicy {
    fn from(config: &ReaderConfig) -> Self {
        Self {
            timeout: config.timeout(),
            retry_count: config.retry_count.max(1),
            retry_delay: config.retry_delay(),
            write_priority: config.write_priority,
        }
    }
}

pub struct RequestExecutor {
    connection: Arc<ConnectionManager>,
    registry: Arc<RwLock<ObjectRegistry>>,
    state: Arc<SharedState>,
    policy: RequestPolicy,
}

impl RequestExecutor {
    pub fn new(
        connection: Arc<ConnectionManager>,
        registry: Arc<RwLock<ObjectRegistry>>,
        state: Arc<SharedState>,
        policy: RequestPolicy,
    ) -> Self {
        Self {
            connection,
            registry,
            state,
            policy,
        }
    }

    /// Read the present value of `object`, retrying per the policy
    pub async fn read_object(&self, object: &BacnetObject) -> Result<PresentValue, ReaderError> {
        let key = object.key();
        // Fail fast when no session can be opened at all
        self.connection.session().await?;

        let attempts = self.policy.retry_count;
        let mut last_error = None;

        for attempt in 1..=attempts {
            let result = match self.connection.session().await {
                Ok(session) => {
                    let result = self.read_once(session.as_ref(), object).await;
                    if let Err(e) = &result {
                        if e.is_connection_lost() {
                            self.connection.mark_lost(&session, e).await;
                        }
                    }
                    result
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(value) => {
                    self.state.record_read_success();
                    debug!(object = %key, attempt, %value, "Read present value");
                    return Ok(value);
                }
                Err(e) => {
                    self.state.record_read_attempt_failure(&e);
                    warn!(
                        object = %key,
                        attempt,
                        attempts,
                        error = %e,
                        "Read attempt failed"
                    );
                    last_error = Some(e);
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.policy.retry_delay).await;
            }
        }

        self.state.record_read_request_failure();
        let error = last_error.unwrap_or_else(|| ReaderError::EmptyResponse(key.clone()));
        error!(object = %key, attempts, error = %error, "Failed to read object");
        Err(error)
    }

    async fn read_once(
        &self,
        session: &dyn BacnetSession,
        object: &BacnetObject,
    ) -> Result<PresentValue, ReaderError> {
        let request = ConfirmedRequest::ReadProperty {
            object: object.identity,
            property: PropertyId::PresentValue,
        };

        match self.round_trip(session, &request).await? {
            Some(ConfirmedResponse::ReadPropertyAck { value, .. }) => value
                .into_present_value()
                .ok_or_else(|| ReaderError::EmptyResponse(object.key())),
            Some(ConfirmedResponse::SimpleAck) => Err(ReaderError::Transport(
                TransportError::ReceiveFailed("SimpleAck in reply to ReadProperty".into()),
            )),
            None => Err(ReaderError::EmptyResponse(object.key())),
        }
    }

    /// Write `value` to the present value of the object registered as `name`
    ///
    /// Sent once, without retry.
    pub async fn write_object(&self, name: &str, value: PresentValue) -> Result<(), ReaderError> {
        let object = self.registry.read().lookup(name).cloned();
        let Some(object) = object else {
            let err = ReaderError::UnknownObject(name.to_string());
            self.state.record_error(&err);
            error!(name, "Cannot write unknown object");
            return Err(err);
        };
        let key = object.key();

        let result = match self.connection.session().await {
            Ok(session) => {
                let result = self.write_once(session.as_ref(), &object, &value).await;
                if let Err(e) = &result {
                    if e.is_connection_lost() {
                        self.connection.mark_lost(&session, e).await;
                    }
                }
                result
            }
            Err(e) => Err(e),
        };
        match &result {
            Ok(()) => {
                self.state.record_write_success();
                info!(object = %key, %value, "Wrote present value");
            }
            Err(e) => {
                self.state.record_write_failure(e);
                error!(object = %key, error = %e, "Failed to write object");
            }
        }
        result
    }

    async fn write_once(
        &self,
        session: &dyn BacnetSession,
        object: &BacnetObject,
        value: &PresentValue,
    ) -> Result<(), ReaderError> {
        let request = ConfirmedRequest::WriteProperty {
            object: object.identity,
            property: PropertyId::PresentValue,
            value: PropertyValue::from(value),
            priority: self.policy.write_priority,
        };

        match self.round_trip(session, &request).await? {
            Some(ConfirmedResponse::SimpleAck) => Ok(()),
            Some(other) => Err(ReaderError::Transport(TransportError::ReceiveFailed(
                format!("Unexpected reply to WriteProperty: {:?}", other),
            ))),
            None => Err(ReaderError::EmptyResponse(object.key())),
        }
    }

    /// One request/response exchange bounded by the policy timeout
    async fn round_trip(
        &self,
        session: &dyn BacnetSession,
        request: &ConfirmedRequest,
    ) -> Result<Option<ConfirmedResponse>, ReaderError> {
        let timeout = self.policy.timeout;
        match tokio::time::timeout(timeout, session.send_receive(request, timeout)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(TransportError::Timeout(_))) | Err(_) => {
                Err(ReaderError::Timeout(timeout.as_secs_f64()))
            }
            Ok(Err(e)) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MockConfig, MockPointConfig};
    use crate::object::{ObjectIdentity, ObjectType};
    use crate::transport::mock::{MockTransport, PointFault};

    struct Fixture {
        mock: Arc<MockTransport>,
        state: Arc<SharedState>,
        executor: RequestExecutor,
    }

    fn zone_temp() -> BacnetObject {
        BacnetObject::new(ObjectType::AnalogInput, 1, "Zone Temp", "Zone temperature")
            .with_unit("degC")
    }

    fn fixture(policy: RequestPolicy) -> Fixture {
        let mock = Arc::new(MockTransport::new(&MockConfig {
            points: vec![MockPointConfig {
                identity: zone_temp().identity,
                value: PresentValue::Number(21.5),
            }],
            ..Default::default()
        }));
        let state = Arc::new(SharedState::new());
        let config = ReaderConfig::new("test", "127.0.0.1");
        let connection = Arc::new(ConnectionManager::new(
            mock.clone(),
            config.local_device(),
            "127.0.0.1",
            config.port,
            state.clone(),
        ));
        let mut registry = ObjectRegistry::new();
        registry.register(zone_temp());
        let executor = RequestExecutor::new(
            connection,
            Arc::new(RwLock::new(registry)),
            state.clone(),
            policy,
        );
        Fixture {
            mock,
            state,
            executor,
        }
    }

    fn policy() -> RequestPolicy {
        RequestPolicy::from(&ReaderConfig::new("test", "127.0.0.1"))
    }

    #[tokio::test]
    async fn test_read_success() {
        let f = fixture(policy());
        let value = f.executor.read_object(&zone_temp()).await.unwrap();
        assert_eq!(value, PresentValue::Number(21.5));

        let stats = f.state.stats();
        assert_eq!(stats.successful_reads, 1);
        assert_eq!(stats.failed_reads, 0);
        assert!(f.state.session().last_read_time.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_response_is_retried() {
        let f = fixture(RequestPolicy {
            retry_count: 2,
            ..policy()
        });
        f.mock.set_fault(zone_temp().identity, PointFault::Empty);

        let err = f.executor.read_object(&zone_temp()).await.unwrap_err();
        assert!(matches!(err, ReaderError::EmptyResponse(_)));
        assert_eq!(f.mock.request_count(zone_temp().identity), 2);

        let stats = f.state.stats();
        assert_eq!(stats.failed_reads, 2);
        assert_eq!(stats.failed_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_null_value_is_empty_response() {
        let f = fixture(RequestPolicy {
            retry_count: 1,
            ..policy()
        });
        f.mock.set_point(zone_temp().identity, PropertyValue::Null);

        let err = f.executor.read_object(&zone_temp()).await.unwrap_err();
        assert_eq!(err, ReaderError::EmptyResponse("analogInput_1".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_fault() {
        let f = fixture(policy());
        let object = zone_temp().identity;
        f.mock.set_fault(object, PointFault::Reject);

        let mock = f.mock.clone();
        let clear = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            mock.clear_fault(object);
        });

        let value = f.executor.read_object(&zone_temp()).await.unwrap();
        clear.await.unwrap();
        assert_eq!(value, PresentValue::Number(21.5));
        assert_eq!(f.mock.request_count(object), 2);

        let stats = f.state.stats();
        assert_eq!(stats.failed_reads, 1);
        assert_eq!(stats.successful_reads, 1);
        assert_eq!(stats.failed_requests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_session_reconnects_between_attempts() {
        let f = fixture(policy());
        assert!(f.executor.connection.connect().await);
        f.mock.drop_session();

        let value = f.executor.read_object(&zone_temp()).await.unwrap();
        assert_eq!(value, PresentValue::Number(21.5));
        assert_eq!(f.mock.open_count(), 2);
        assert_eq!(f.state.stats().connection_errors, 1);
    }

    #[tokio::test]
    async fn test_read_fails_fast_without_connection() {
        let f = fixture(policy());
        f.mock.set_fail_open(true);

        let err = f.executor.read_object(&zone_temp()).await.unwrap_err();
        assert!(matches!(err, ReaderError::ConnectionFailed(_)));
        assert!(f.mock.requests().is_empty());
        assert_eq!(f.state.stats().failed_reads, 0);
    }

    #[tokio::test]
    async fn test_write_by_name_and_key() {
        let f = fixture(RequestPolicy {
            write_priority: Some(8),
            ..policy()
        });

        f.executor
            .write_object("Zone Temp", PresentValue::Number(19.0))
            .await
            .unwrap();
        f.executor
            .write_object("analogInput_1", PresentValue::from(20))
            .await
            .unwrap();

        assert_eq!(
            f.mock.point(zone_temp().identity),
            Some(PropertyValue::Real(20.0))
        );
        let requests = f.mock.requests();
        assert!(matches!(
            requests[0],
            ConfirmedRequest::WriteProperty {
                priority: Some(8),
                ..
            }
        ));
        assert_eq!(f.state.stats().successful_writes, 2);
    }

    #[tokio::test]
    async fn test_write_unknown_object_sends_nothing() {
        let f = fixture(policy());

        let err = f
            .executor
            .write_object("nonexistent", PresentValue::Number(1.0))
            .await
            .unwrap_err();
        assert_eq!(err, ReaderError::UnknownObject("nonexistent".into()));
        assert_eq!(f.mock.open_count(), 0);
        assert!(f.mock.requests().is_empty());

        let stats = f.state.stats();
        assert_eq!(stats.last_error.as_deref(), Some("Unknown object: nonexistent"));
        assert_eq!(stats.failed_writes, 0);
    }

    #[tokio::test]
    async fn test_write_rejected_is_not_retried() {
        let f = fixture(policy());
        let object = ObjectIdentity::new(ObjectType::AnalogInput, 1);
        f.mock.set_fault(object, PointFault::Reject);

        let err = f
            .executor
            .write_object("Zone Temp", PresentValue::Boolean(true))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReaderError::Transport(TransportError::Rejected(_))
        ));
        assert_eq!(f.mock.request_count(object), 1);
        assert_eq!(f.state.stats().failed_writes, 1);
    }
}
