//! A read-mostly cache over a snapshot store.

use {
    super::SnapshotStore,
    crate::LensError,
    serde_json::Value,
    std::{collections::HashMap, sync::RwLock},
};

/// Wraps a store with an in-memory cache keyed by request-derived strings.
///
/// Concurrent readers of the same key are safe; racing fetches are allowed
/// and the winning write is retained.
pub struct CachedStore<S> {
    inner: S,
    cache: RwLock<HashMap<String, Option<Value>>>,
}

impl<S: SnapshotStore> CachedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn cached<F>(&self, key: String, fetch: F) -> Result<Option<Value>, LensError>
    where
        F: FnOnce() -> Result<Option<Value>, LensError>,
    {
        {
            let cache = self.cache.read().map_err(|_| LensError::Store("cache lock poisoned".to_string()))?;
            if let Some(hit) = cache.get(&key) {
                return Ok(hit.clone());
            }
        }

        let value = fetch()?;
        let mut cache = self.cache.write().map_err(|_| LensError::Store("cache lock poisoned".to_string()))?;
        cache.entry(key).or_insert_with(|| value.clone());
        Ok(value)
    }
}

impl<S: SnapshotStore> SnapshotStore for CachedStore<S> {
    fn resource_metadata(&self, account_id: &str, arn: &str, key: &str) -> Result<Option<Value>, LensError> {
        self.cached(format!("resource\u{1f}{}\u{1f}{}\u{1f}{}", account_id, arn, key), || {
            self.inner.resource_metadata(account_id, arn, key)
        })
    }

    fn org_metadata(&self, org_id: &str, key: &str) -> Result<Option<Value>, LensError> {
        self.cached(format!("org\u{1f}{}\u{1f}{}", org_id, key), || self.inner.org_metadata(org_id, key))
    }

    fn index(&self, name: &str) -> Result<Option<Value>, LensError> {
        self.cached(format!("index\u{1f}{}", name), || self.inner.index(name))
    }

    fn list_resources(
        &self,
        account_id: &str,
        service: &str,
        resource_type: &str,
    ) -> Result<Vec<String>, LensError> {
        let value = self.cached(
            format!("list\u{1f}{}\u{1f}{}\u{1f}{}", account_id, service, resource_type),
            || {
                let arns = self.inner.list_resources(account_id, service, resource_type)?;
                Ok(Some(Value::from(arns)))
            },
        )?;
        match value {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    fn accounts(&self) -> Result<Vec<String>, LensError> {
        let value = self.cached("accounts".to_string(), || {
            let accounts = self.inner.accounts()?;
            Ok(Some(Value::from(accounts)))
        })?;
        match value {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }
}
