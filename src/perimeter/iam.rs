//! The IAM role perimeter. Role trust policies grant `sts:AssumeRole` and
//! friends; the universe also spans the role-management actions.

use {
    super::{resource_policy, resource_policy_sets, scope_to_arn, universe_sets, PerimeterSets, ResourcePerimeter},
    crate::{
        catalog::{actions_for_resource_type, ActionCatalog},
        principal::PrincipalRef,
        store::SnapshotStore,
        AllowSet, DenySet, LensError,
    },
};

pub(crate) const TRUST_POLICY_KEY: &str = "trust-policy";

#[derive(Clone, Copy, Debug, Default)]
pub struct IamRoles;

impl ResourcePerimeter for IamRoles {
    fn resource_kind(&self) -> &'static str {
        "iam-roles"
    }

    fn universe(&self, catalog: &dyn ActionCatalog) -> Result<(AllowSet, DenySet), LensError> {
        universe_sets(&[
            ("iam", actions_for_resource_type(catalog, "iam", "role")),
            ("sts", actions_for_resource_type(catalog, "sts", "role")),
        ])
    }

    fn same_account(
        &self,
        store: &dyn SnapshotStore,
        catalog: &dyn ActionCatalog,
        principal: &PrincipalRef,
    ) -> Result<PerimeterSets, LensError> {
        let mut out = PerimeterSets::default();

        for arn in store.list_resources(principal.account_id(), "iam", "role")? {
            let policy = match resource_policy(store, principal.account_id(), &arn, TRUST_POLICY_KEY)? {
                Some(policy) => policy,
                None => continue,
            };
            let (account_allows, principal_allows, denies) =
                resource_policy_sets(catalog, &policy, principal, &scope_to_arn(&arn))?;
            if !account_allows.is_empty() {
                out.account_allows.push(account_allows);
            }
            if !principal_allows.is_empty() {
                out.principal_allows.push(principal_allows);
            }
            if !denies.is_empty() {
                out.denies.push(denies);
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{IamRoles, TRUST_POLICY_KEY},
        crate::{
            catalog::StaticCatalog,
            perimeter::ResourcePerimeter,
            principal::PrincipalRef,
            store::MemoryStore,
        },
        pretty_assertions::assert_eq,
        serde_json::json,
    };

    #[test_log::test]
    fn test_universe_spans_iam_and_sts() {
        let (allows, _) = IamRoles.universe(&StaticCatalog).unwrap();
        assert!(allows.has_action("iam", "PassRole"));
        assert!(allows.has_action("sts", "AssumeRole"));
        assert!(!allows.has_action("iam", "ListRoles"));
    }

    #[test_log::test]
    fn test_trust_policy_grants_assume() {
        let role_arn = "arn:aws:iam::123456789012:role/deploy";
        let mut store = MemoryStore::new();
        store.put_resource(
            "123456789012",
            "iam",
            "role",
            role_arn,
            TRUST_POLICY_KEY,
            json!({
                "Statement": [{
                    "Effect": "Allow",
                    "Action": "sts:AssumeRole",
                    "Principal": {"AWS": "arn:aws:iam::123456789012:user/alice"}
                }]
            }),
        );

        let principal = PrincipalRef::parse("arn:aws:iam::123456789012:user/alice").unwrap();
        let sets = IamRoles.same_account(&store, &StaticCatalog, &principal).unwrap();

        assert_eq!(sets.principal_allows.len(), 1);
        let grants = sets.principal_allows[0].get_permissions("sts", "AssumeRole");
        assert_eq!(grants.len(), 1);
        // The omitted Resource is implied by the role itself.
        assert_eq!(grants[0].resources().patterns(), &[role_arn.to_string()]);
    }
}
