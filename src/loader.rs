//! Materialization of policy documents into permission sets.

use {
    crate::{
        catalog::{complement_action_patterns, expand_action_patterns, ActionCatalog},
        effect::EffectKind,
        permission::{Permission, PermissionSet, ResourceSpec},
        policy::{PolicyDocument, Statement},
        principal::{statement_applicability, PrincipalRef},
        DenySet, Effect, LensError,
    },
    std::fmt::{Display, Formatter, Result as FmtResult},
};

/// Where a collected policy document came from.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum PolicySource {
    /// An inline policy directly attached to an IAM entity (user, role).
    Inline {
        entity_arn: String,
        policy_name: String,
    },

    /// A managed policy attached to an IAM entity.
    Managed {
        policy_arn: String,
    },

    /// An inline policy of an IAM group the user is a member of.
    GroupInline {
        group_arn: String,
        policy_name: String,
    },

    /// A managed policy attached to an IAM group the user is a member of.
    GroupManaged {
        group_arn: String,
        policy_arn: String,
    },

    /// The managed policy capping the entity's permissions.
    PermissionBoundary {
        policy_arn: String,
    },

    /// A policy attached to the resource being accessed.
    Resource {
        resource_arn: String,
    },

    /// A service control policy attached to an organization node.
    ServiceControl {
        target_id: String,
    },

    /// A resource control policy attached to an organization node.
    ResourceControl {
        target_id: String,
    },
}

impl PolicySource {
    /// Whether the policy caps permissions rather than granting them.
    #[inline]
    pub fn is_boundary(&self) -> bool {
        matches!(
            self,
            Self::PermissionBoundary { .. } | Self::ServiceControl { .. } | Self::ResourceControl { .. }
        )
    }
}

impl Display for PolicySource {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Inline {
                entity_arn,
                policy_name,
            } => write!(f, "inline policy {} on {}", policy_name, entity_arn),
            Self::Managed {
                policy_arn,
            } => write!(f, "managed policy {}", policy_arn),
            Self::GroupInline {
                group_arn,
                policy_name,
            } => write!(f, "inline policy {} on group {}", policy_name, group_arn),
            Self::GroupManaged {
                group_arn,
                policy_arn,
            } => write!(f, "managed policy {} on group {}", policy_arn, group_arn),
            Self::PermissionBoundary {
                policy_arn,
            } => write!(f, "permissions boundary {}", policy_arn),
            Self::Resource {
                resource_arn,
            } => write!(f, "resource policy on {}", resource_arn),
            Self::ServiceControl {
                target_id,
            } => write!(f, "service control policy on {}", target_id),
            Self::ResourceControl {
                target_id,
            } => write!(f, "resource control policy on {}", target_id),
        }
    }
}

/// Expand a statement's Action (or NotAction complement) against the
/// catalog, yielding concrete (service, action) pairs.
pub(crate) fn expand_statement_actions(
    catalog: &dyn ActionCatalog,
    statement: &Statement,
) -> Vec<(String, String)> {
    if let Some(actions) = statement.action() {
        let patterns: Vec<&str> = actions.iter().map(String::as_str).collect();
        expand_action_patterns(catalog, &patterns)
    } else if let Some(not_actions) = statement.not_action() {
        let patterns: Vec<&str> = not_actions.iter().map(String::as_str).collect();
        complement_action_patterns(catalog, &patterns)
    } else {
        Vec::new()
    }
}

/// Materialize one statement into a permission set: one [Permission] per
/// expanded (service, action) pair carrying the statement's resource scope
/// and conditions. Statements of the other effect are skipped.
pub fn add_statement_to_permission_set<E: EffectKind>(
    catalog: &dyn ActionCatalog,
    statement: &Statement,
    set: &mut PermissionSet<E>,
) -> Result<(), LensError> {
    statement.validate()?;
    if statement.effect() != E::EFFECT {
        return Ok(());
    }

    let pairs = expand_statement_actions(catalog, statement);

    let resources = if let Some(resource) = statement.resource() {
        ResourceSpec::Resource(resource.iter().cloned().collect())
    } else if let Some(not_resource) = statement.not_resource() {
        ResourceSpec::NotResource(not_resource.iter().cloned().collect())
    } else {
        // Resource policies may leave the resource implied.
        ResourceSpec::any()
    };
    let conditions = statement.condition().cloned();

    for (service, action) in pairs {
        let permission = Permission::new(E::EFFECT, service, action, resources.clone(), conditions.clone())?;
        set.add_permission(permission)?;
    }

    Ok(())
}

/// Materialize every statement of a document with the target effect.
pub fn policy_to_permission_set<E: EffectKind>(
    catalog: &dyn ActionCatalog,
    document: &PolicyDocument,
) -> Result<PermissionSet<E>, LensError> {
    let mut set = PermissionSet::new();
    for statement in document.statements() {
        add_statement_to_permission_set(catalog, statement, &mut set)?;
    }
    Ok(set)
}

/// Materialize a sequence of documents into one set.
pub fn policies_to_permission_set<'a, E, I>(catalog: &dyn ActionCatalog, documents: I) -> Result<PermissionSet<E>, LensError>
where
    E: EffectKind,
    I: IntoIterator<Item = &'a PolicyDocument>,
{
    let mut set = PermissionSet::new();
    for document in documents {
        for statement in document.statements() {
            add_statement_to_permission_set(catalog, statement, &mut set)?;
        }
    }
    Ok(set)
}

/// Fold the Deny statements of organization policies into a deny set,
/// keeping only statements whose applicability to the principal is
/// PrincipalMatch or AccountMatch.
pub fn add_applicable_denies(
    catalog: &dyn ActionCatalog,
    documents: &[PolicyDocument],
    principal: &PrincipalRef,
    denies: &mut DenySet,
) -> Result<(), LensError> {
    for document in documents {
        for statement in document.statements() {
            if statement.effect() != Effect::Deny {
                continue;
            }
            if !statement_applicability(statement, principal).matches() {
                log::debug!("skipping deny statement not applicable to {}", principal.arn());
                continue;
            }
            add_statement_to_permission_set(catalog, statement, denies)?;
        }
    }
    Ok(())
}
