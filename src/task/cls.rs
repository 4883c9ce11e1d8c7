// Licensed under the MIT License.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Mutex;

/// Coroutine-local storage: a string-keyed map scoped to a single task's
/// lifetime. Values are dropped when the owning task is dropped, but a
/// value's own drop glue is responsible for anything it points to -
/// `Cls` does not manage external ownership beyond that.
#[derive(Default)]
pub struct Cls {
    values: Mutex<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl Cls {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<V: Any + Send + Sync>(&self, key: impl Into<String>, value: V) {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), Box::new(value));
    }

    #[must_use]
    pub fn get<V: Any + Clone + Send + Sync>(&self, key: &str) -> Option<V> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .and_then(|v| v.downcast_ref::<V>())
            .cloned()
    }

    pub fn remove(&self, key: &str) {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }
}

impl std::fmt::Debug for Cls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.values.lock().map(|m| m.len()).unwrap_or(0);
        f.debug_struct("Cls").field("entries", &len).finish()
    }
}
