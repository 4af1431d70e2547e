//! A snapshot store backed by a collected directory tree.
//!
//! Layout:
//!
//! ```text
//! <root>/accounts/<account-id>/<service>/<resource-type>.json
//!     { "<arn>": { "<metadata-key>": <value>, ... }, ... }
//! <root>/organizations/<org-id>/<key>.json
//! <root>/indexes/<name>.json
//! ```

use {
    super::SnapshotStore,
    crate::LensError,
    serde_json::Value,
    std::{
        collections::BTreeMap,
        fs,
        path::{Path, PathBuf},
    },
};

#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
        }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_json(&self, path: &Path) -> Result<Option<Value>, LensError> {
        if !path.is_file() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)
            .map_err(|e| LensError::Store(format!("{}: {}", path.display(), e)))?;
        let value = serde_json::from_str(&raw)
            .map_err(|e| LensError::Store(format!("{}: {}", path.display(), e)))?;
        Ok(Some(value))
    }

    fn read_type_file(&self, path: &Path) -> Result<BTreeMap<String, BTreeMap<String, Value>>, LensError> {
        match self.read_json(path)? {
            None => Ok(BTreeMap::new()),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| LensError::Store(format!("{}: {}", path.display(), e))),
        }
    }

    fn account_dir(&self, account_id: &str) -> PathBuf {
        self.root.join("accounts").join(account_id)
    }
}

fn service_of_arn(arn: &str) -> Option<&str> {
    arn.splitn(4, ':').nth(2).filter(|s| !s.is_empty())
}

impl SnapshotStore for FileStore {
    fn resource_metadata(&self, account_id: &str, arn: &str, key: &str) -> Result<Option<Value>, LensError> {
        let service = match service_of_arn(arn) {
            Some(service) => service,
            None => return Ok(None),
        };

        let service_dir = self.account_dir(account_id).join(service);
        if !service_dir.is_dir() {
            return Ok(None);
        }

        for entry in fs::read_dir(&service_dir)? {
            let path = entry?.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            let resources = self.read_type_file(&path)?;
            if let Some(entries) = resources.get(arn) {
                return Ok(entries.get(key).cloned());
            }
        }

        Ok(None)
    }

    fn org_metadata(&self, org_id: &str, key: &str) -> Result<Option<Value>, LensError> {
        self.read_json(&self.root.join("organizations").join(org_id).join(format!("{}.json", key)))
    }

    fn index(&self, name: &str) -> Result<Option<Value>, LensError> {
        self.read_json(&self.root.join("indexes").join(format!("{}.json", name)))
    }

    fn list_resources(
        &self,
        account_id: &str,
        service: &str,
        resource_type: &str,
    ) -> Result<Vec<String>, LensError> {
        let path = self.account_dir(account_id).join(service).join(format!("{}.json", resource_type));
        Ok(self.read_type_file(&path)?.into_keys().collect())
    }

    fn accounts(&self) -> Result<Vec<String>, LensError> {
        let accounts_dir = self.root.join("accounts");
        if !accounts_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for entry in fs::read_dir(&accounts_dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                out.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        out.sort();
        Ok(out)
    }
}
