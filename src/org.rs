//! Organization structure: the SCP/RCP hierarchy attached to an account.

use {
    crate::{
        policy::PolicyDocument,
        store::{SnapshotStore, ACCOUNTS_TO_ORGS_INDEX},
        LensError,
    },
    serde_json::Value,
    std::collections::BTreeMap,
};

/// Organization metadata key holding account → node-path (root first).
pub const ACCOUNT_PATHS_KEY: &str = "account-paths";

/// The two kinds of organization policies.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OrgPolicyKind {
    ServiceControl,
    ResourceControl,
}

impl OrgPolicyKind {
    fn metadata_key(self) -> &'static str {
        match self {
            Self::ServiceControl => "scps",
            Self::ResourceControl => "rcps",
        }
    }
}

/// The policies attached at one tier of the organization tree.
#[derive(Clone, Debug)]
pub struct OrgPolicyLevel {
    pub target_id: String,
    pub policies: Vec<PolicyDocument>,
}

/// The organization an account belongs to, if any.
pub fn org_of_account(store: &dyn SnapshotStore, account_id: &str) -> Result<Option<String>, LensError> {
    let index = match store.index(ACCOUNTS_TO_ORGS_INDEX)? {
        Some(index) => index,
        None => return Ok(None),
    };
    Ok(index.get(account_id).and_then(Value::as_str).map(str::to_string))
}

/// The organization policy levels applying to an account, root first and the
/// account itself last. Levels with no attached policies are skipped: an
/// unattached tier imposes no restriction. An account outside any
/// organization has an empty hierarchy.
pub fn policy_hierarchy(
    store: &dyn SnapshotStore,
    account_id: &str,
    kind: OrgPolicyKind,
) -> Result<Vec<OrgPolicyLevel>, LensError> {
    let org_id = match org_of_account(store, account_id)? {
        Some(org_id) => org_id,
        None => return Ok(Vec::new()),
    };

    let mut targets: Vec<String> = match store.org_metadata(&org_id, ACCOUNT_PATHS_KEY)? {
        Some(paths) => {
            let paths: BTreeMap<String, Vec<String>> = serde_json::from_value(paths)?;
            paths.get(account_id).cloned().unwrap_or_default()
        }
        None => Vec::new(),
    };
    targets.push(account_id.to_string());

    let attachments: BTreeMap<String, Vec<Value>> = match store.org_metadata(&org_id, kind.metadata_key())? {
        Some(value) => serde_json::from_value(value)?,
        None => BTreeMap::new(),
    };

    let mut levels = Vec::with_capacity(targets.len());
    for target_id in targets {
        let mut policies = Vec::new();
        for raw in attachments.get(&target_id).into_iter().flatten() {
            match PolicyDocument::from_value(raw.clone()) {
                Ok(document) => policies.push(document),
                Err(e) => log::warn!("skipping unparseable {} policy on {}: {}", kind.metadata_key(), target_id, e),
            }
        }
        if !policies.is_empty() {
            levels.push(OrgPolicyLevel {
                target_id,
                policies,
            });
        }
    }

    Ok(levels)
}

#[cfg(test)]
mod tests {
    use {
        super::{org_of_account, policy_hierarchy, OrgPolicyKind},
        crate::store::{MemoryStore, ACCOUNTS_TO_ORGS_INDEX},
        pretty_assertions::assert_eq,
        serde_json::json,
    };

    fn org_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.put_index(ACCOUNTS_TO_ORGS_INDEX, json!({"123456789012": "o-abc123"}));
        store.put_org(
            "o-abc123",
            "account-paths",
            json!({"123456789012": ["r-root1", "ou-payments"]}),
        );
        store.put_org(
            "o-abc123",
            "scps",
            json!({
                "r-root1": [{"Statement": {"Effect": "Allow", "Action": "*", "Resource": "*"}}],
                "ou-payments": [{"Statement": {"Effect": "Deny", "Action": "kms:ScheduleKeyDeletion", "Resource": "*"}}]
            }),
        );
        store
    }

    #[test_log::test]
    fn test_org_of_account() {
        let store = org_store();
        assert_eq!(org_of_account(&store, "123456789012").unwrap(), Some("o-abc123".to_string()));
        assert_eq!(org_of_account(&store, "999999999999").unwrap(), None);
    }

    #[test_log::test]
    fn test_hierarchy_root_first() {
        let store = org_store();
        let levels = policy_hierarchy(&store, "123456789012", OrgPolicyKind::ServiceControl).unwrap();

        // The account tier has no attachments and is skipped.
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].target_id, "r-root1");
        assert_eq!(levels[1].target_id, "ou-payments");
        assert_eq!(levels[0].policies.len(), 1);
    }

    #[test_log::test]
    fn test_hierarchy_outside_org() {
        let store = org_store();
        assert!(policy_hierarchy(&store, "999999999999", OrgPolicyKind::ServiceControl).unwrap().is_empty());
        assert!(policy_hierarchy(&store, "123456789012", OrgPolicyKind::ResourceControl).unwrap().is_empty());
    }
}
