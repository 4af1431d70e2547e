//! The read-only snapshot store consumed by the queries.
//!
//! The store is a collaborator: an opaque key-value metadata view of a
//! collected IAM snapshot. [MemoryStore] backs tests; [FileStore] reads a
//! snapshot directory; [CachedStore] wraps either with a read-mostly cache.

mod cache;
mod file;

pub use {cache::CachedStore, file::FileStore};

use {
    crate::LensError,
    serde_json::Value,
    std::collections::HashMap,
};

/// Well-known index names.
pub const ACCOUNTS_TO_ORGS_INDEX: &str = "accounts-to-orgs";
pub const BUCKETS_TO_ACCOUNTS_INDEX: &str = "buckets-to-accounts";

/// Read-only lookup over the collected snapshot. Absent entries are
/// `Ok(None)`; errors are actual read or decode failures.
pub trait SnapshotStore: Sync + Send {
    /// Metadata of one resource, keyed by (account, ARN, metadata key).
    fn resource_metadata(&self, account_id: &str, arn: &str, key: &str) -> Result<Option<Value>, LensError>;

    /// Organization-level metadata, keyed by (organization id, key).
    fn org_metadata(&self, org_id: &str, key: &str) -> Result<Option<Value>, LensError>;

    /// A named cross-account index.
    fn index(&self, name: &str) -> Result<Option<Value>, LensError>;

    /// The ARNs of one resource type collected in an account.
    fn list_resources(&self, account_id: &str, service: &str, resource_type: &str)
        -> Result<Vec<String>, LensError>;

    /// All account ids in the snapshot.
    fn accounts(&self) -> Result<Vec<String>, LensError>;
}

impl<S: SnapshotStore + ?Sized> SnapshotStore for Box<S> {
    fn resource_metadata(&self, account_id: &str, arn: &str, key: &str) -> Result<Option<Value>, LensError> {
        (**self).resource_metadata(account_id, arn, key)
    }

    fn org_metadata(&self, org_id: &str, key: &str) -> Result<Option<Value>, LensError> {
        (**self).org_metadata(org_id, key)
    }

    fn index(&self, name: &str) -> Result<Option<Value>, LensError> {
        (**self).index(name)
    }

    fn list_resources(
        &self,
        account_id: &str,
        service: &str,
        resource_type: &str,
    ) -> Result<Vec<String>, LensError> {
        (**self).list_resources(account_id, service, resource_type)
    }

    fn accounts(&self) -> Result<Vec<String>, LensError> {
        (**self).accounts()
    }
}

/// An in-memory store, populated programmatically.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    resources: HashMap<(String, String), HashMap<String, Value>>,
    listings: HashMap<(String, String, String), Vec<String>>,
    orgs: HashMap<(String, String), Value>,
    indexes: HashMap<String, Value>,
    accounts: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&mut self, account_id: &str) {
        let account_id = account_id.to_string();
        if !self.accounts.contains(&account_id) {
            self.accounts.push(account_id);
        }
    }

    /// Register a resource and one of its metadata entries. The account and
    /// the type listing are registered as a side effect.
    pub fn put_resource(
        &mut self,
        account_id: &str,
        service: &str,
        resource_type: &str,
        arn: &str,
        key: &str,
        value: Value,
    ) {
        self.add_account(account_id);

        let listing = self
            .listings
            .entry((account_id.to_string(), service.to_string(), resource_type.to_string()))
            .or_default();
        if !listing.contains(&arn.to_string()) {
            listing.push(arn.to_string());
        }

        self.resources
            .entry((account_id.to_string(), arn.to_string()))
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn put_org(&mut self, org_id: &str, key: &str, value: Value) {
        self.orgs.insert((org_id.to_string(), key.to_string()), value);
    }

    pub fn put_index(&mut self, name: &str, value: Value) {
        self.indexes.insert(name.to_string(), value);
    }
}

impl SnapshotStore for MemoryStore {
    fn resource_metadata(&self, account_id: &str, arn: &str, key: &str) -> Result<Option<Value>, LensError> {
        Ok(self
            .resources
            .get(&(account_id.to_string(), arn.to_string()))
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    fn org_metadata(&self, org_id: &str, key: &str) -> Result<Option<Value>, LensError> {
        Ok(self.orgs.get(&(org_id.to_string(), key.to_string())).cloned())
    }

    fn index(&self, name: &str) -> Result<Option<Value>, LensError> {
        Ok(self.indexes.get(name).cloned())
    }

    fn list_resources(
        &self,
        account_id: &str,
        service: &str,
        resource_type: &str,
    ) -> Result<Vec<String>, LensError> {
        Ok(self
            .listings
            .get(&(account_id.to_string(), service.to_string(), resource_type.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn accounts(&self) -> Result<Vec<String>, LensError> {
        Ok(self.accounts.clone())
    }
}

/// A store layered over several snapshots: the first entry wins on metadata
/// reads, listings and accounts are unioned.
pub struct LayeredStore {
    layers: Vec<Box<dyn SnapshotStore>>,
}

impl LayeredStore {
    pub fn new(layers: Vec<Box<dyn SnapshotStore>>) -> Self {
        Self {
            layers,
        }
    }
}

impl SnapshotStore for LayeredStore {
    fn resource_metadata(&self, account_id: &str, arn: &str, key: &str) -> Result<Option<Value>, LensError> {
        for layer in &self.layers {
            if let Some(value) = layer.resource_metadata(account_id, arn, key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn org_metadata(&self, org_id: &str, key: &str) -> Result<Option<Value>, LensError> {
        for layer in &self.layers {
            if let Some(value) = layer.org_metadata(org_id, key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn index(&self, name: &str) -> Result<Option<Value>, LensError> {
        for layer in &self.layers {
            if let Some(value) = layer.index(name)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn list_resources(
        &self,
        account_id: &str,
        service: &str,
        resource_type: &str,
    ) -> Result<Vec<String>, LensError> {
        let mut out = Vec::new();
        for layer in &self.layers {
            for arn in layer.list_resources(account_id, service, resource_type)? {
                if !out.contains(&arn) {
                    out.push(arn);
                }
            }
        }
        Ok(out)
    }

    fn accounts(&self) -> Result<Vec<String>, LensError> {
        let mut out = Vec::new();
        for layer in &self.layers {
            for account in layer.accounts()? {
                if !out.contains(&account) {
                    out.push(account);
                }
            }
        }
        Ok(out)
    }
}
