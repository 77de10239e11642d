//! Batch reads over the registry

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::executor::RequestExecutor;
use crate::object::ReadResult;
use crate::registry::ObjectRegistry;
use crate::state::SharedState;

pub struct BatchReader {
    executor: Arc<RequestExecutor>,
    registry: Arc<RwLock<ObjectRegistry>>,
    state: Arc<SharedState>,
}

impl BatchReader {
    pub fn new(
        executor: Arc<RequestExecutor>,
        registry: Arc<RwLock<ObjectRegistry>>,
        state: Arc<SharedState>,
    ) -> Self {
        Self {
            executor,
            registry,
            state,
        }
    }

    /// Read several objects sequentially
    ///
    /// `None` reads every registered object. Entries are keyed by the name as
    /// given; names that resolve to nothing are skipped. A failed read yields
    /// a `None` entry and never stops the batch.
    pub async fn read_objects(
        &self,
        names: Option<&[String]>,
    ) -> BTreeMap<String, Option<ReadResult>> {
        self.state.record_batch();

        let names = match names {
            Some(names) => names.to_vec(),
            None => self.registry.read().keys(),
        };

        let mut results = BTreeMap::new();
        for name in names {
            let object = self.registry.read().lookup(&name).cloned();
            let Some(object) = object else {
                warn!(name = %name, "Skipping unknown object");
                continue;
            };

            let result = self
                .executor
                .read_object(&object)
                .await
                .ok()
                .map(|value| ReadResult::good(&object, value));
            results.insert(name, result);
        }

        debug!(count = results.len(), "Batch read complete");
        results
    }
}
