//! Collection of a principal's identity policies from the snapshot.

use {
    crate::{
        loader::PolicySource, policy::PolicyDocument, principal::PrincipalRef, store::SnapshotStore, LensError,
    },
    serde::Deserialize,
};

pub const INLINE_POLICIES_KEY: &str = "inline-policies";
pub const MANAGED_POLICIES_KEY: &str = "managed-policies";
pub const GROUPS_KEY: &str = "groups";
pub const PERMISSIONS_BOUNDARY_KEY: &str = "permissions-boundary";
pub const POLICY_DOCUMENT_KEY: &str = "document";

#[derive(Debug, Deserialize)]
struct InlinePolicy {
    #[serde(rename = "PolicyName")]
    policy_name: String,

    #[serde(rename = "PolicyDocument")]
    policy_document: PolicyDocument,
}

/// Whether the snapshot knows this principal at all.
pub fn principal_exists(store: &dyn SnapshotStore, principal: &PrincipalRef) -> Result<bool, LensError> {
    for key in [INLINE_POLICIES_KEY, MANAGED_POLICIES_KEY, GROUPS_KEY, PERMISSIONS_BOUNDARY_KEY] {
        if store.resource_metadata(principal.account_id(), principal.canonical_arn(), key)?.is_some() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// All identity policies in effect for a principal: its own inline and
/// managed policies plus those of its groups.
pub fn collect_identity_policies(
    store: &dyn SnapshotStore,
    principal: &PrincipalRef,
) -> Result<Vec<(PolicySource, PolicyDocument)>, LensError> {
    let account_id = principal.account_id();
    let arn = principal.canonical_arn();
    let mut out = Vec::new();

    for inline in inline_policies(store, account_id, arn)? {
        out.push((
            PolicySource::Inline {
                entity_arn: arn.to_string(),
                policy_name: inline.policy_name,
            },
            inline.policy_document,
        ));
    }

    for policy_arn in attached_policy_arns(store, account_id, arn)? {
        if let Some(document) = managed_policy_document(store, &policy_arn)? {
            out.push((
                PolicySource::Managed {
                    policy_arn,
                },
                document,
            ));
        }
    }

    let groups: Vec<String> = match store.resource_metadata(account_id, arn, GROUPS_KEY)? {
        Some(value) => serde_json::from_value(value)?,
        None => Vec::new(),
    };
    for group_arn in groups {
        for inline in inline_policies(store, account_id, &group_arn)? {
            out.push((
                PolicySource::GroupInline {
                    group_arn: group_arn.clone(),
                    policy_name: inline.policy_name,
                },
                inline.policy_document,
            ));
        }
        for policy_arn in attached_policy_arns(store, account_id, &group_arn)? {
            if let Some(document) = managed_policy_document(store, &policy_arn)? {
                out.push((
                    PolicySource::GroupManaged {
                        group_arn: group_arn.clone(),
                        policy_arn,
                    },
                    document,
                ));
            }
        }
    }

    Ok(out)
}

/// The permissions boundary of a principal, if one is attached.
pub fn permission_boundary(
    store: &dyn SnapshotStore,
    principal: &PrincipalRef,
) -> Result<Option<(PolicySource, PolicyDocument)>, LensError> {
    let policy_arn: String =
        match store.resource_metadata(principal.account_id(), principal.canonical_arn(), PERMISSIONS_BOUNDARY_KEY)? {
            Some(value) => serde_json::from_value(value)?,
            None => return Ok(None),
        };

    Ok(managed_policy_document(store, &policy_arn)?.map(|document| {
        (
            PolicySource::PermissionBoundary {
                policy_arn,
            },
            document,
        )
    }))
}

/// The IAM users and roles collected in an account.
pub fn list_principals(store: &dyn SnapshotStore, account_id: &str) -> Result<Vec<String>, LensError> {
    let mut out = store.list_resources(account_id, "iam", "user")?;
    out.extend(store.list_resources(account_id, "iam", "role")?);
    out.sort();
    out.dedup();
    Ok(out)
}

fn inline_policies(
    store: &dyn SnapshotStore,
    account_id: &str,
    arn: &str,
) -> Result<Vec<InlinePolicy>, LensError> {
    match store.resource_metadata(account_id, arn, INLINE_POLICIES_KEY)? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(Vec::new()),
    }
}

fn attached_policy_arns(
    store: &dyn SnapshotStore,
    account_id: &str,
    arn: &str,
) -> Result<Vec<String>, LensError> {
    match store.resource_metadata(account_id, arn, MANAGED_POLICIES_KEY)? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(Vec::new()),
    }
}

/// Resolve a managed policy to its document. An ARN referenced by metadata
/// but absent from the store is logged and treated as an empty policy.
fn managed_policy_document(
    store: &dyn SnapshotStore,
    policy_arn: &str,
) -> Result<Option<PolicyDocument>, LensError> {
    let account_id = policy_account(policy_arn);
    match store.resource_metadata(&account_id, policy_arn, POLICY_DOCUMENT_KEY)? {
        Some(value) => Ok(Some(PolicyDocument::from_value(value)?)),
        None => {
            log::warn!(
                "{}",
                LensError::MissingPolicyDocument {
                    account_id,
                    arn: policy_arn.to_string(),
                    key: POLICY_DOCUMENT_KEY.to_string(),
                }
            );
            Ok(None)
        }
    }
}

/// AWS-managed policies live under the `aws` pseudo-account.
fn policy_account(policy_arn: &str) -> String {
    match policy_arn.splitn(6, ':').nth(4) {
        Some(account) if !account.is_empty() => account.to_string(),
        _ => "aws".to_string(),
    }
}
