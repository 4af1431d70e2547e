//! The IAM action catalog consumed by statement expansion and the
//! resource-type perimeters.
//!
//! The catalog is a collaborator: deployments with a full service/action
//! database plug it in through [ActionCatalog]. [StaticCatalog] is a compact
//! curated table covering the services the perimeters and tests exercise.

use crate::pattern;

/// One action of a service, with the resource types it applies to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ActionSpec {
    pub name: String,
    pub resource_types: Vec<String>,
}

/// Lookup interface over the service/action table.
pub trait ActionCatalog: Sync + Send {
    /// All service prefixes, lowercase.
    fn services(&self) -> Vec<String>;

    /// The actions of a service; empty for an unknown service.
    fn service_actions(&self, service: &str) -> Vec<ActionSpec>;
}

/// Expand wildcarded `service:action` patterns to concrete pairs. A bare `*`
/// expands to every action of every service. Service prefixes and action
/// names match case-insensitively.
pub fn expand_action_patterns(catalog: &dyn ActionCatalog, patterns: &[&str]) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();

    for raw in patterns {
        let (service_pattern, action_pattern) = match raw.split_once(':') {
            Some((service, action)) => (service.to_lowercase(), action.to_string()),
            None if *raw == "*" => ("*".to_string(), "*".to_string()),
            None => {
                log::debug!("skipping malformed action pattern {:?}", raw);
                continue;
            }
        };

        for service in catalog.services() {
            if !pattern::matches(&service_pattern, &service) {
                continue;
            }
            for spec in catalog.service_actions(&service) {
                if action_matches(&action_pattern, &spec.name) {
                    let pair = (service.clone(), spec.name.clone());
                    if !out.contains(&pair) {
                        out.push(pair);
                    }
                }
            }
        }
    }

    out
}

/// Expand a NotAction list to its complement: within each named service, the
/// actions not matched by any pattern. A bare `*` complements to nothing.
pub fn complement_action_patterns(catalog: &dyn ActionCatalog, patterns: &[&str]) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();

    let services: Vec<String> = if patterns.iter().any(|p| *p == "*") {
        // NotAction: "*" excludes everything.
        return out;
    } else {
        let mut services = Vec::new();
        for raw in patterns {
            if let Some((service_pattern, _)) = raw.split_once(':') {
                let service_pattern = service_pattern.to_lowercase();
                for service in catalog.services() {
                    if pattern::matches(&service_pattern, &service) && !services.contains(&service) {
                        services.push(service);
                    }
                }
            }
        }
        services
    };

    for service in services {
        for spec in catalog.service_actions(&service) {
            let excluded = patterns.iter().any(|raw| match raw.split_once(':') {
                Some((service_pattern, action_pattern)) => {
                    pattern::matches(&service_pattern.to_lowercase(), &service)
                        && action_matches(action_pattern, &spec.name)
                }
                None => false,
            });
            if !excluded {
                out.push((service.clone(), spec.name.clone()));
            }
        }
    }

    out
}

/// The actions of a service that apply to the given resource type.
pub fn actions_for_resource_type(catalog: &dyn ActionCatalog, service: &str, resource_type: &str) -> Vec<String> {
    catalog
        .service_actions(service)
        .into_iter()
        .filter(|spec| spec.resource_types.iter().any(|rt| rt == resource_type))
        .map(|spec| spec.name)
        .collect()
}

fn action_matches(action_pattern: &str, action: &str) -> bool {
    pattern::matches(&action_pattern.to_lowercase(), &action.to_lowercase())
}

type ServiceTable = &'static [(&'static str, &'static [&'static str])];

static S3_ACTIONS: ServiceTable = &[
    ("AbortMultipartUpload", &["object"]),
    ("CreateBucket", &["bucket"]),
    ("DeleteBucket", &["bucket"]),
    ("DeleteBucketPolicy", &["bucket"]),
    ("DeleteObject", &["object"]),
    ("GetBucketAcl", &["bucket"]),
    ("GetBucketLocation", &["bucket"]),
    ("GetBucketPolicy", &["bucket"]),
    ("GetBucketTagging", &["bucket"]),
    ("GetObject", &["object"]),
    ("GetObjectAcl", &["object"]),
    ("GetObjectTagging", &["object"]),
    ("ListAllMyBuckets", &[]),
    ("ListBucket", &["bucket"]),
    ("ListBucketVersions", &["bucket"]),
    ("PutBucketPolicy", &["bucket"]),
    ("PutBucketTagging", &["bucket"]),
    ("PutObject", &["object"]),
    ("PutObjectAcl", &["object"]),
    ("PutObjectTagging", &["object"]),
];

static KMS_ACTIONS: ServiceTable = &[
    ("CancelKeyDeletion", &["key"]),
    ("CreateAlias", &["key"]),
    ("CreateGrant", &["key"]),
    ("CreateKey", &[]),
    ("Decrypt", &["key"]),
    ("DescribeKey", &["key"]),
    ("DisableKey", &["key"]),
    ("EnableKey", &["key"]),
    ("Encrypt", &["key"]),
    ("GenerateDataKey", &["key"]),
    ("GenerateDataKeyWithoutPlaintext", &["key"]),
    ("GetKeyPolicy", &["key"]),
    ("ListAliases", &[]),
    ("ListGrants", &["key"]),
    ("ListKeys", &[]),
    ("PutKeyPolicy", &["key"]),
    ("ReEncryptFrom", &["key"]),
    ("ReEncryptTo", &["key"]),
    ("RetireGrant", &["key"]),
    ("RevokeGrant", &["key"]),
    ("ScheduleKeyDeletion", &["key"]),
];

static IAM_ACTIONS: ServiceTable = &[
    ("AttachRolePolicy", &["role"]),
    ("AttachUserPolicy", &["user"]),
    ("CreateRole", &["role"]),
    ("CreateUser", &["user"]),
    ("DeleteRole", &["role"]),
    ("DeleteRolePolicy", &["role"]),
    ("DeleteUser", &["user"]),
    ("DetachRolePolicy", &["role"]),
    ("GetRole", &["role"]),
    ("GetRolePolicy", &["role"]),
    ("GetUser", &["user"]),
    ("ListAttachedRolePolicies", &["role"]),
    ("ListGroupsForUser", &["user"]),
    ("ListRolePolicies", &["role"]),
    ("ListRoles", &[]),
    ("ListUsers", &[]),
    ("PassRole", &["role"]),
    ("PutRolePolicy", &["role"]),
    ("PutUserPolicy", &["user"]),
    ("TagRole", &["role"]),
    ("UpdateAssumeRolePolicy", &["role"]),
    ("UpdateRole", &["role"]),
];

static STS_ACTIONS: ServiceTable = &[
    ("AssumeRole", &["role"]),
    ("AssumeRoleWithSAML", &["role"]),
    ("AssumeRoleWithWebIdentity", &["role"]),
    ("GetCallerIdentity", &[]),
    ("SetSourceIdentity", &["role"]),
    ("TagSession", &["role"]),
];

static EC2_ACTIONS: ServiceTable = &[
    ("CreateTags", &["instance"]),
    ("DescribeInstances", &[]),
    ("DescribeSecurityGroups", &[]),
    ("RunInstances", &["instance"]),
    ("StartInstances", &["instance"]),
    ("StopInstances", &["instance"]),
    ("TerminateInstances", &["instance"]),
];

static LAMBDA_ACTIONS: ServiceTable = &[
    ("CreateFunction", &["function"]),
    ("DeleteFunction", &["function"]),
    ("GetFunction", &["function"]),
    ("InvokeFunction", &["function"]),
    ("ListFunctions", &[]),
    ("UpdateFunctionCode", &["function"]),
    ("UpdateFunctionConfiguration", &["function"]),
];

static SERVICES: &[(&str, ServiceTable)] = &[
    ("ec2", EC2_ACTIONS),
    ("iam", IAM_ACTIONS),
    ("kms", KMS_ACTIONS),
    ("lambda", LAMBDA_ACTIONS),
    ("s3", S3_ACTIONS),
    ("sts", STS_ACTIONS),
];

/// The embedded catalog.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticCatalog;

impl ActionCatalog for StaticCatalog {
    fn services(&self) -> Vec<String> {
        SERVICES.iter().map(|(name, _)| name.to_string()).collect()
    }

    fn service_actions(&self, service: &str) -> Vec<ActionSpec> {
        SERVICES
            .iter()
            .find(|(name, _)| *name == service)
            .map(|(_, table)| {
                table
                    .iter()
                    .map(|(name, types)| ActionSpec {
                        name: name.to_string(),
                        resource_types: types.iter().map(|t| t.to_string()).collect(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
