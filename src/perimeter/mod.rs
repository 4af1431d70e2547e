//! Resource-type perimeters: the universe of permissions a resource type can
//! grant, and the grants and denies its resource policies extend to a
//! principal.

pub mod iam;
pub mod kms;
pub mod s3;

pub use {iam::IamRoles, kms::KmsKeys, s3::S3Buckets};

use {
    crate::{
        catalog::ActionCatalog,
        loader::expand_statement_actions,
        pattern,
        permission::{Permission, ResourceSpec},
        policy::PolicyDocument,
        principal::{statement_applicability, PrincipalMatchKind, PrincipalRef},
        store::SnapshotStore,
        AllowSet, DenySet, Effect, LensError,
    },
};

/// The per-resource permission sets a same-account perimeter produces.
#[derive(Debug, Default)]
pub struct PerimeterSets {
    /// Allows granted at account granularity; effective only where the
    /// identity also allows.
    pub account_allows: Vec<AllowSet>,

    /// Allows granted directly to the principal.
    pub principal_allows: Vec<AllowSet>,

    /// Denies from applicable resource-policy statements.
    pub denies: Vec<DenySet>,
}

/// One supported resource type.
pub trait ResourcePerimeter: Sync {
    fn resource_kind(&self) -> &'static str;

    /// The universe of permissions for this resource type: one `*`-scoped
    /// Allow per applicable action, with the parallel Deny set used to carve
    /// the type's share out of an identity allowance.
    fn universe(&self, catalog: &dyn ActionCatalog) -> Result<(AllowSet, DenySet), LensError>;

    /// The grants and denies the resource policies of this type extend to
    /// the principal within its own account.
    fn same_account(
        &self,
        store: &dyn SnapshotStore,
        catalog: &dyn ActionCatalog,
        principal: &PrincipalRef,
    ) -> Result<PerimeterSets, LensError>;
}

/// The resource types the composition pipeline walks.
pub fn all_perimeters() -> Vec<Box<dyn ResourcePerimeter>> {
    vec![Box::new(KmsKeys), Box::new(IamRoles), Box::new(S3Buckets)]
}

/// Build the paired universe sets from (service, actions) entries.
pub(crate) fn universe_sets(entries: &[(&str, Vec<String>)]) -> Result<(AllowSet, DenySet), LensError> {
    let mut allows = AllowSet::new();
    let mut denies = DenySet::new();
    for (service, actions) in entries {
        for action in actions {
            allows.add_permission(Permission::allow(*service, action.clone(), vec!["*".to_string()])?)?;
            denies.add_permission(Permission::deny(*service, action.clone(), vec!["*".to_string()])?)?;
        }
    }
    Ok((allows, denies))
}

/// Walk a resource policy's statements, classifying each by applicability
/// and scoping its resources to the resource instance through
/// `scope_pattern`. Returns (account-granted allows, principal-granted
/// allows, denies).
pub(crate) fn resource_policy_sets(
    catalog: &dyn ActionCatalog,
    policy: &PolicyDocument,
    principal: &PrincipalRef,
    scope_pattern: &dyn Fn(&str) -> Vec<String>,
) -> Result<(AllowSet, AllowSet, DenySet), LensError> {
    let mut account_allows = AllowSet::new();
    let mut principal_allows = AllowSet::new();
    let mut denies = DenySet::new();

    for statement in policy.statements() {
        statement.validate()?;
        let kind = statement_applicability(statement, principal);
        if !kind.matches() {
            continue;
        }

        let resources = if let Some(not_resource) = statement.not_resource() {
            ResourceSpec::NotResource(not_resource.iter().cloned().collect())
        } else {
            let raw: Vec<String> = match statement.resource() {
                Some(resource) => resource.iter().cloned().collect(),
                // An omitted Resource is implied by the attached resource.
                None => vec!["*".to_string()],
            };
            let mut scoped = Vec::new();
            for p in &raw {
                for s in scope_pattern(p) {
                    if !scoped.contains(&s) {
                        scoped.push(s);
                    }
                }
            }
            if scoped.is_empty() {
                continue;
            }
            ResourceSpec::Resource(scoped)
        };

        let conditions = statement.condition().cloned();
        for (service, action) in expand_statement_actions(catalog, statement) {
            match statement.effect() {
                Effect::Deny => {
                    denies.add_permission(Permission::new(
                        Effect::Deny,
                        service,
                        action,
                        resources.clone(),
                        conditions.clone(),
                    )?)?;
                }
                Effect::Allow => {
                    let target = if kind == PrincipalMatchKind::PrincipalMatch {
                        &mut principal_allows
                    } else {
                        &mut account_allows
                    };
                    target.add_permission(Permission::new(
                        Effect::Allow,
                        service,
                        action,
                        resources.clone(),
                        conditions.clone(),
                    )?)?;
                }
            }
        }
    }

    Ok((account_allows, principal_allows, denies))
}

/// Scope statement patterns to a single concrete resource ARN: a pattern
/// covering the ARN narrows to it, anything else does not apply.
pub(crate) fn scope_to_arn<'a>(arn: &'a str) -> impl Fn(&str) -> Vec<String> + 'a {
    move |p| {
        if pattern::covers(p, arn) {
            vec![arn.to_string()]
        } else {
            Vec::new()
        }
    }
}

/// Fetch and parse a resource policy document; absent entries return None.
pub(crate) fn resource_policy(
    store: &dyn SnapshotStore,
    account_id: &str,
    arn: &str,
    key: &str,
) -> Result<Option<PolicyDocument>, LensError> {
    match store.resource_metadata(account_id, arn, key)? {
        Some(value) => Ok(Some(PolicyDocument::from_value(value)?)),
        None => {
            log::debug!("no {} for {} in {}", key, arn, account_id);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{resource_policy_sets, scope_to_arn, universe_sets},
        crate::{catalog::StaticCatalog, policy::PolicyDocument, principal::PrincipalRef},
        indoc::indoc,
        pretty_assertions::assert_eq,
        std::str::FromStr,
    };

    #[test_log::test]
    fn test_universe_sets() {
        let (allows, denies) =
            universe_sets(&[("kms", vec!["Decrypt".to_string(), "Encrypt".to_string()])]).unwrap();
        assert_eq!(allows.get_permissions("kms", "Decrypt").len(), 1);
        assert_eq!(allows.get_permissions("kms", "Decrypt")[0].resources().patterns(), &["*".to_string()]);
        assert!(denies.has_action("kms", "Encrypt"));
    }

    #[test_log::test]
    fn test_scope_to_arn() {
        let arn = "arn:aws:kms:us-east-1:123456789012:key/abc";
        let scope = scope_to_arn(arn);
        assert_eq!(scope("*"), vec![arn.to_string()]);
        assert_eq!(scope(arn), vec![arn.to_string()]);
        assert_eq!(scope("arn:aws:kms:us-east-1:123456789012:key/*"), vec![arn.to_string()]);
        assert_eq!(scope("arn:aws:kms:us-east-1:123456789012:key/other"), Vec::<String>::new());
    }

    #[test_log::test]
    fn test_resource_policy_sets_split_by_match_kind() {
        let policy = PolicyDocument::from_str(indoc! {r#"
        {
            "Statement": [
                {
                    "Effect": "Allow",
                    "Action": "kms:Decrypt",
                    "Resource": "*",
                    "Principal": {"AWS": "arn:aws:iam::123456789012:user/alice"}
                },
                {
                    "Effect": "Allow",
                    "Action": "kms:Encrypt",
                    "Resource": "*",
                    "Principal": {"AWS": "123456789012"}
                },
                {
                    "Effect": "Deny",
                    "Action": "kms:ScheduleKeyDeletion",
                    "Resource": "*",
                    "Principal": "*"
                },
                {
                    "Effect": "Allow",
                    "Action": "kms:CreateGrant",
                    "Resource": "*",
                    "Principal": {"AWS": "arn:aws:iam::999999999999:user/eve"}
                }
            ]
        }"#})
        .unwrap();

        let principal = PrincipalRef::parse("arn:aws:iam::123456789012:user/alice").unwrap();
        let arn = "arn:aws:kms:us-east-1:123456789012:key/abc";
        let (account_allows, principal_allows, denies) =
            resource_policy_sets(&StaticCatalog, &policy, &principal, &scope_to_arn(arn)).unwrap();

        assert!(principal_allows.has_action("kms", "Decrypt"));
        assert_eq!(principal_allows.get_permissions("kms", "Decrypt")[0].resources().patterns(), &[arn.to_string()]);
        assert!(account_allows.has_action("kms", "Encrypt"));
        assert!(denies.has_action("kms", "ScheduleKeyDeletion"));
        // The grant to another principal contributes nothing.
        assert!(!principal_allows.has_action("kms", "CreateGrant"));
        assert!(!account_allows.has_action("kms", "CreateGrant"));
    }
}
