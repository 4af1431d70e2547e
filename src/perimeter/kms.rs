//! The KMS key perimeter.

use {
    super::{resource_policy, resource_policy_sets, scope_to_arn, universe_sets, PerimeterSets, ResourcePerimeter},
    crate::{
        catalog::{actions_for_resource_type, ActionCatalog},
        principal::PrincipalRef,
        store::SnapshotStore,
        AllowSet, DenySet, LensError,
    },
};

pub(crate) const KEY_POLICY_KEY: &str = "key-policy";

#[derive(Clone, Copy, Debug, Default)]
pub struct KmsKeys;

impl ResourcePerimeter for KmsKeys {
    fn resource_kind(&self) -> &'static str {
        "kms-keys"
    }

    fn universe(&self, catalog: &dyn ActionCatalog) -> Result<(AllowSet, DenySet), LensError> {
        universe_sets(&[("kms", actions_for_resource_type(catalog, "kms", "key"))])
    }

    fn same_account(
        &self,
        store: &dyn SnapshotStore,
        catalog: &dyn ActionCatalog,
        principal: &PrincipalRef,
    ) -> Result<PerimeterSets, LensError> {
        let mut out = PerimeterSets::default();

        for arn in store.list_resources(principal.account_id(), "kms", "key")? {
            let policy = match resource_policy(store, principal.account_id(), &arn, KEY_POLICY_KEY)? {
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
