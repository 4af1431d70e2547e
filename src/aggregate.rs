//! The Principal-Can aggregator: composes identity policies, resource-type
//! perimeters, permission boundaries, organization policies and
//! cross-account grants into one effective-permissions document.

use {
    crate::{
        catalog::ActionCatalog,
        identity::{collect_identity_policies, permission_boundary},
        loader::{add_applicable_denies, policies_to_permission_set, policy_to_permission_set},
        org::{policy_hierarchy, OrgPolicyKind},
        perimeter::{all_perimeters, s3::cross_account_grants},
        policy::{PolicyDocument, Statement},
        principal::PrincipalRef,
        shrink::PolicyShrinker,
        store::SnapshotStore,
        AllowSet, DenySet, LensError,
    },
    serde_json::json,
};

/// Drives the effective-permissions composition for single principals.
pub struct PrincipalCan<'a> {
    store: &'a dyn SnapshotStore,
    catalog: &'a dyn ActionCatalog,
}

impl<'a> PrincipalCan<'a> {
    pub fn new(store: &'a dyn SnapshotStore, catalog: &'a dyn ActionCatalog) -> Self {
        Self {
            store,
            catalog,
        }
    }

    /// Compose the consolidated policy document for a principal ARN.
    pub fn effective_policy(
        &self,
        principal_arn: &str,
        shrinker: Option<&dyn PolicyShrinker>,
    ) -> Result<PolicyDocument, LensError> {
        let principal = PrincipalRef::parse(principal_arn)?;
        log::debug!("composing effective permissions for {}", principal.arn());

        // Identity allowance and identity-level denies.
        let identity: Vec<PolicyDocument> =
            collect_identity_policies(self.store, &principal)?.into_iter().map(|(_, doc)| doc).collect();
        let allowed: AllowSet = policies_to_permission_set(self.catalog, &identity)?;
        let mut identity_denies: DenySet = policies_to_permission_set(self.catalog, &identity)?;

        let mut final_set = allowed.clone();
        // Cross-account grants are checked against the raw identity reach:
        // the perimeter pass below strips same-account resource types out of
        // final_set, which must not erase the identity's say over foreign
        // resources.
        let mut identity_reach = allowed.clone();
        let mut resource_denies = DenySet::new();

        // Per resource type: replace the identity's reach inside the type's
        // universe with the resource-policy-confirmed grants.
        for perimeter in all_perimeters() {
            let (universe_allow, universe_deny) = perimeter.universe(self.catalog)?;
            let identity_in_type = universe_allow.intersection(&allowed)?;

            final_set = final_set.subtract(&universe_deny)?.allow;

            let sets = perimeter.same_account(self.store, self.catalog, &principal)?;
            for grant in &sets.principal_allows {
                final_set.add_all(grant)?;
            }
            for grant in &sets.account_allows {
                final_set.add_all(&grant.intersection(&identity_in_type)?)?;
            }
            for deny in &sets.denies {
                resource_denies.add_all(deny)?;
            }
        }

        // Permission boundary caps the allowance; its denies join the
        // identity denies.
        if let Some((_, boundary)) = permission_boundary(self.store, &principal)? {
            let boundary_allow: AllowSet = policy_to_permission_set(self.catalog, &boundary)?;
            let boundary_deny: DenySet = policy_to_permission_set(self.catalog, &boundary)?;
            identity_denies.add_all(&boundary_deny)?;
            final_set = final_set.intersection(&boundary_allow)?;
            identity_reach = identity_reach.intersection(&boundary_allow)?;
        }

        // Cross-account bucket grants, each filtered through the granting
        // account's RCP denies.
        let mut other_allows = AllowSet::new();
        let mut other_denies = DenySet::new();
        for account_id in self.store.accounts()? {
            if account_id == principal.account_id() {
                continue;
            }
            let mut rcp_denies = DenySet::new();
            for level in policy_hierarchy(self.store, &account_id, OrgPolicyKind::ResourceControl)? {
                add_applicable_denies(self.catalog, &level.policies, &principal, &mut rcp_denies)?;
            }
            let (x_allows, x_denies) =
                cross_account_grants(self.store, self.catalog, &account_id, &rcp_denies, &principal)?;
            other_allows.add_all_sets(&x_allows)?;
            other_denies.add_all_sets(&x_denies)?;
        }

        // Cross-account grants are only as wide as the identity reach (and
        // boundary) permit.
        let mut cross_effective = other_allows.intersection(&identity_reach)?;

        // Service control policies: allow-list every level, collect denies.
        for level in policy_hierarchy(self.store, principal.account_id(), OrgPolicyKind::ServiceControl)? {
            let scp_allow: AllowSet = policies_to_permission_set(self.catalog, &level.policies)?;
            add_applicable_denies(self.catalog, &level.policies, &principal, &mut identity_denies)?;
            final_set = final_set.intersection(&scp_allow)?;
            cross_effective = cross_effective.intersection(&scp_allow)?;
        }

        // Resource control policies of the principal's own account.
        let mut principal_account_denies = identity_denies.clone();
        for level in policy_hierarchy(self.store, principal.account_id(), OrgPolicyKind::ResourceControl)? {
            let rcp_allow: AllowSet = policies_to_permission_set(self.catalog, &level.policies)?;
            add_applicable_denies(self.catalog, &level.policies, &principal, &mut principal_account_denies)?;
            final_set = final_set.intersection(&rcp_allow)?;
        }

        principal_account_denies.add_all(&resource_denies)?;

        let same_account = final_set.subtract(&principal_account_denies)?;

        let mut all_cross_denies = principal_account_denies.clone();
        all_cross_denies.add_all(&other_denies)?;
        let cross_account = cross_effective.subtract(&all_cross_denies)?;

        let mut statements: Vec<Statement> = same_account.allow.to_policy_statements()?;
        statements.extend(same_account.deny.to_policy_statements()?);
        statements.extend(cross_account.allow.to_policy_statements()?);
        statements.extend(cross_account.deny.to_policy_statements()?);

        let document = PolicyDocument::from_value(json!({
            "Version": PolicyDocument::CURRENT_VERSION,
            "Statement": serde_json::to_value(&statements)?,
        }))?;

        match shrinker {
            Some(shrinker) => shrinker.shrink(document),
            None => Ok(document),
        }
    }
}
