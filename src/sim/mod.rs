//! The simulation kernel contract, and a reference kernel that evaluates a
//! resolved request against the snapshot.

use {
    crate::{
        condition::eval::{conditions_satisfied, ContextMap},
        identity::{collect_identity_policies, permission_boundary},
        org::{policy_hierarchy, OrgPolicyKind},
        pattern,
        perimeter::{iam::TRUST_POLICY_KEY, kms::KEY_POLICY_KEY, s3::BUCKET_POLICY_KEY},
        policy::{PolicyDocument, Statement},
        principal::{statement_applicability, PrincipalMatchKind, PrincipalRef},
        store::{SnapshotStore, BUCKETS_TO_ACCOUNTS_INDEX},
        Effect, LensError,
    },
    derive_builder::Builder,
    serde_json::Value,
    std::fmt::{Display, Formatter, Result as FmtResult},
};

/// The outcome of one simulated request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SimulationOutcome {
    Allowed,
    ImplicitlyDenied,
    ExplicitlyDenied,
}

impl SimulationOutcome {
    #[inline]
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

impl Display for SimulationOutcome {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.write_str(match self {
            Self::Allowed => "Allowed",
            Self::ImplicitlyDenied => "ImplicitlyDenied",
            Self::ExplicitlyDenied => "ExplicitlyDenied",
        })
    }
}

/// A fully resolved request: who, what, on which resource, with what
/// context.
#[derive(Builder, Clone, Debug, Eq, PartialEq)]
pub struct SimulationRequest {
    #[builder(setter(into))]
    principal: String,

    /// `service:Action` form.
    #[builder(setter(into))]
    action: String,

    #[builder(setter(into))]
    resource: String,

    #[builder(setter(into, strip_option), default)]
    resource_account: Option<String>,

    #[builder(default)]
    context: ContextMap,
}

impl SimulationRequest {
    pub fn builder() -> SimulationRequestBuilder {
        SimulationRequestBuilder::default()
    }

    #[inline]
    pub fn principal(&self) -> &str {
        &self.principal
    }

    #[inline]
    pub fn action(&self) -> &str {
        &self.action
    }

    #[inline]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    #[inline]
    pub fn resource_account(&self) -> Option<&str> {
        self.resource_account.as_deref()
    }

    #[inline]
    pub fn context(&self) -> &ContextMap {
        &self.context
    }
}

/// The simulation kernel contract consumed by the Who-Can driver.
pub trait Simulator: Sync {
    fn simulate(&self, request: &SimulationRequest) -> Result<SimulationOutcome, LensError>;
}

/// A reference kernel over the snapshot: gathers the identity policies,
/// resource policy, permissions boundary and organization policies bearing on
/// the request and composes their statement decisions. A matching Deny
/// anywhere is explicit; a missing boundary or organization allow is
/// implicit.
pub struct SnapshotSimulator<'a> {
    store: &'a dyn SnapshotStore,
}

impl<'a> SnapshotSimulator<'a> {
    pub fn new(store: &'a dyn SnapshotStore) -> Self {
        Self {
            store,
        }
    }

    /// The account owning the resource: explicit, from the ARN, from the
    /// bucket index, or the principal's own account as a last resort.
    pub fn resolve_resource_account(
        &self,
        request: &SimulationRequest,
        principal: &PrincipalRef,
    ) -> Result<String, LensError> {
        if let Some(account) = request.resource_account() {
            return Ok(account.to_string());
        }
        if let Some(account) = arn_account(request.resource()) {
            return Ok(account);
        }
        if let Some(Value::Object(index)) = self.store.index(BUCKETS_TO_ACCOUNTS_INDEX)? {
            let bucket = bucket_arn(request.resource());
            if let Some(account) = index.get(&bucket).and_then(Value::as_str) {
                return Ok(account.to_string());
            }
        }
        Ok(principal.account_id().to_string())
    }

    fn resource_policy(&self, account_id: &str, resource: &str) -> Result<Option<PolicyDocument>, LensError> {
        let (arn, key) = match resource.splitn(6, ':').nth(2) {
            Some("s3") => (bucket_arn(resource), BUCKET_POLICY_KEY),
            Some("kms") => (resource.to_string(), KEY_POLICY_KEY),
            Some("iam") if resource.contains(":role/") => (resource.to_string(), TRUST_POLICY_KEY),
            _ => return Ok(None),
        };
        match self.store.resource_metadata(account_id, &arn, key)? {
            Some(value) => Ok(Some(PolicyDocument::from_value(value)?)),
            None => Ok(None),
        }
    }
}

impl Simulator for SnapshotSimulator<'_> {
    fn simulate(&self, request: &SimulationRequest) -> Result<SimulationOutcome, LensError> {
        let principal = PrincipalRef::parse(request.principal())?;
        let resource_account = self.resolve_resource_account(request, &principal)?;
        let same_account = resource_account == principal.account_id();

        let mut context = request.context().clone();
        let mut principal_arns = vec![principal.arn().to_string()];
        if principal.canonical_arn() != principal.arn() {
            principal_arns.push(principal.canonical_arn().to_string());
        }
        context.entry("aws:principalarn".to_string()).or_insert(principal_arns);
        context
            .entry("aws:principalaccount".to_string())
            .or_insert_with(|| vec![principal.account_id().to_string()]);

        let identity: Vec<PolicyDocument> =
            collect_identity_policies(self.store, &principal)?.into_iter().map(|(_, doc)| doc).collect();
        let resource_policy = self.resource_policy(&resource_account, request.resource())?;

        // Explicit denies come first, from any policy bearing on the request.
        let mut deny_documents: Vec<&PolicyDocument> = identity.iter().collect();
        if let Some(policy) = &resource_policy {
            deny_documents.push(policy);
        }
        let boundary = permission_boundary(self.store, &principal)?;
        if let Some((_, policy)) = &boundary {
            deny_documents.push(policy);
        }
        let scp_levels = policy_hierarchy(self.store, principal.account_id(), OrgPolicyKind::ServiceControl)?;
        let rcp_levels = policy_hierarchy(self.store, &resource_account, OrgPolicyKind::ResourceControl)?;
        for level in scp_levels.iter().chain(rcp_levels.iter()) {
            deny_documents.extend(level.policies.iter());
        }

        for document in deny_documents {
            if scan(document, request, &context, &principal, Effect::Deny).matched() {
                return Ok(SimulationOutcome::ExplicitlyDenied);
            }
        }

        // Every organization tier must allow the request.
        for level in &scp_levels {
            let allowed = level
                .policies
                .iter()
                .any(|policy| scan(policy, request, &context, &principal, Effect::Allow).matched());
            if !allowed {
                log::debug!("request not allowed by SCPs on {}", level.target_id);
                return Ok(SimulationOutcome::ImplicitlyDenied);
            }
        }
        for level in &rcp_levels {
            let allowed = level
                .policies
                .iter()
                .any(|policy| scan(policy, request, &context, &principal, Effect::Allow).matched());
            if !allowed {
                log::debug!("request not allowed by RCPs on {}", level.target_id);
                return Ok(SimulationOutcome::ImplicitlyDenied);
            }
        }

        // A permissions boundary that does not allow is an implicit deny.
        if let Some((_, policy)) = &boundary {
            if !scan(policy, request, &context, &principal, Effect::Allow).matched() {
                return Ok(SimulationOutcome::ImplicitlyDenied);
            }
        }

        let identity_allow =
            identity.iter().any(|policy| scan(policy, request, &context, &principal, Effect::Allow).matched());
        let resource_allow = resource_policy
            .as_ref()
            .map(|policy| scan(policy, request, &context, &principal, Effect::Allow))
            .unwrap_or(ScanResult::NoMatch);

        let allowed = if same_account {
            identity_allow || resource_allow == ScanResult::PrincipalMatch
        } else {
            identity_allow && resource_allow.matched()
        };

        if allowed {
            Ok(SimulationOutcome::Allowed)
        } else {
            Ok(SimulationOutcome::ImplicitlyDenied)
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ScanResult {
    NoMatch,
    AccountMatch,
    PrincipalMatch,
}

impl ScanResult {
    fn matched(self) -> bool {
        !matches!(self, Self::NoMatch)
    }
}

/// Scan a document for a statement of the wanted effect matching the
/// request, returning the strongest principal-match kind found.
fn scan(
    document: &PolicyDocument,
    request: &SimulationRequest,
    context: &ContextMap,
    principal: &PrincipalRef,
    effect: Effect,
) -> ScanResult {
    let mut result = ScanResult::NoMatch;
    for statement in document.statements() {
        if statement.effect() != effect {
            continue;
        }
        let kind = statement_applicability(statement, principal);
        if !kind.matches() || !statement_matches(statement, request, context) {
            continue;
        }
        match kind {
            PrincipalMatchKind::PrincipalMatch => return ScanResult::PrincipalMatch,
            PrincipalMatchKind::AccountMatch => result = ScanResult::AccountMatch,
            PrincipalMatchKind::NoMatch => (),
        }
    }
    result
}

/// Whether the statement's action, resource and condition elements all match
/// the request.
fn statement_matches(statement: &Statement, request: &SimulationRequest, context: &ContextMap) -> bool {
    let action_ok = if let Some(actions) = statement.action() {
        actions.iter().any(|a| action_matches(a, request.action()))
    } else if let Some(not_actions) = statement.not_action() {
        !not_actions.iter().any(|a| action_matches(a, request.action()))
    } else {
        false
    };
    if !action_ok {
        return false;
    }

    let resource_ok = if let Some(resources) = statement.resource() {
        resources.iter().any(|p| pattern::matches(p, request.resource()))
    } else if let Some(not_resources) = statement.not_resource() {
        !not_resources.iter().any(|p| pattern::matches(p, request.resource()))
    } else {
        // Resource policies may leave the resource implied.
        true
    };
    if !resource_ok {
        return false;
    }

    statement.condition().map_or(true, |conditions| conditions_satisfied(conditions, context))
}

fn action_matches(action_pattern: &str, action: &str) -> bool {
    pattern::matches(&action_pattern.to_lowercase(), &action.to_lowercase())
}

fn arn_account(arn: &str) -> Option<String> {
    arn.splitn(6, ':').nth(4).filter(|account| !account.is_empty()).map(str::to_string)
}

/// For an S3 object ARN, the owning bucket's ARN; other ARNs pass through.
fn bucket_arn(arn: &str) -> String {
    match arn.find(":::") {
        Some(base) => match arn[base + 3..].find('/') {
            Some(slash) => arn[..base + 3 + slash].to_string(),
            None => arn.to_string(),
        },
        None => arn.to_string(),
    }
}
