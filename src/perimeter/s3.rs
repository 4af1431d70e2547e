//! The S3 bucket perimeter, including the cross-account grant scan.

use {
    super::{resource_policy, resource_policy_sets, universe_sets, PerimeterSets, ResourcePerimeter},
    crate::{
        catalog::{actions_for_resource_type, ActionCatalog},
        pattern,
        principal::PrincipalRef,
        store::SnapshotStore,
        AllowSet, DenySet, LensError,
    },
};

pub(crate) const BUCKET_POLICY_KEY: &str = "bucket-policy";

#[derive(Clone, Copy, Debug, Default)]
pub struct S3Buckets;

impl ResourcePerimeter for S3Buckets {
    fn resource_kind(&self) -> &'static str {
        "s3-buckets"
    }

    fn universe(&self, catalog: &dyn ActionCatalog) -> Result<(AllowSet, DenySet), LensError> {
        let mut actions = actions_for_resource_type(catalog, "s3", "bucket");
        actions.extend(actions_for_resource_type(catalog, "s3", "object"));
        universe_sets(&[("s3", actions)])
    }

    fn same_account(
        &self,
        store: &dyn SnapshotStore,
        catalog: &dyn ActionCatalog,
        principal: &PrincipalRef,
    ) -> Result<PerimeterSets, LensError> {
        let mut out = PerimeterSets::default();

        for arn in store.list_resources(principal.account_id(), "s3", "bucket")? {
            let policy = match resource_policy(store, principal.account_id(), &arn, BUCKET_POLICY_KEY)? {
                Some(policy) => policy,
                None => continue,
            };
            let (account_allows, principal_allows, denies) =
                resource_policy_sets(catalog, &policy, principal, &scope_to_bucket(&arn))?;
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

/// Grants the buckets of a foreign account extend directly to the principal,
/// with the account's RCP denies folded into the returned deny sets.
pub fn cross_account_grants(
    store: &dyn SnapshotStore,
    catalog: &dyn ActionCatalog,
    account_id: &str,
    rcp_denies: &DenySet,
    principal: &PrincipalRef,
) -> Result<(Vec<AllowSet>, Vec<DenySet>), LensError> {
    let mut allows = Vec::new();
    let mut denies = Vec::new();

    for arn in store.list_resources(account_id, "s3", "bucket")? {
        let policy = match resource_policy(store, account_id, &arn, BUCKET_POLICY_KEY)? {
            Some(policy) => policy,
            None => continue,
        };
        let (_, principal_allows, bucket_denies) =
            resource_policy_sets(catalog, &policy, principal, &scope_to_bucket(&arn))?;
        // Account-granularity grants do not cross accounts.
        if !principal_allows.is_empty() {
            allows.push(principal_allows);
        }
        if !bucket_denies.is_empty() {
            denies.push(bucket_denies);
        }
    }

    if !rcp_denies.is_empty() && !allows.is_empty() {
        denies.push(rcp_denies.clone());
    }

    Ok((allows, denies))
}

/// Scope a statement pattern to one bucket: the bucket ARN itself and its
/// object scope `<bucket>/*`, narrowing `*` and bucket-wide patterns and
/// keeping narrower object patterns as written.
fn scope_to_bucket<'a>(bucket_arn: &'a str) -> impl Fn(&str) -> Vec<String> + 'a {
    move |p| {
        let objects = format!("{}/*", bucket_arn);
        if p == "*" {
            return vec![bucket_arn.to_string(), objects];
        }

        let mut out = Vec::new();
        if pattern::covers(p, bucket_arn) {
            out.push(bucket_arn.to_string());
        }
        if pattern::covers(p, &objects) {
            out.push(objects);
        } else if pattern::covers(&objects, p) {
            out.push(p.to_string());
        }
        out
    }
}
