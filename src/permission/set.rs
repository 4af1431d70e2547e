//! Grouped bags of same-effect permissions in canonical greedy-merged form.

use {
    super::{Permission, ResourceSpec},
    crate::{
        effect::{Allowed, Denied, EffectKind},
        policy::Statement,
        serutil::JsonList,
        Conditions, Effect, LensError,
    },
    std::{collections::BTreeMap, marker::PhantomData},
};

/// A set of Allow permissions.
pub type AllowSet = PermissionSet<Allowed>;

/// A set of Deny permissions.
pub type DenySet = PermissionSet<Denied>;

/// Same-effect permissions grouped by (service, action), maintained so that
/// no bucket member includes another.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PermissionSet<E: EffectKind> {
    services: BTreeMap<String, BTreeMap<String, Vec<Permission>>>,
    _effect: PhantomData<E>,
}

impl<E: EffectKind> Default for PermissionSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EffectKind> PermissionSet<E> {
    pub fn new() -> Self {
        Self {
            services: BTreeMap::new(),
            _effect: PhantomData,
        }
    }

    #[inline]
    pub fn effect(&self) -> Effect {
        E::EFFECT
    }

    pub fn is_empty(&self) -> bool {
        self.services.values().all(|actions| actions.values().all(Vec::is_empty))
    }

    pub fn has_service(&self, service: &str) -> bool {
        self.services.get(&service.to_lowercase()).map_or(false, |actions| !actions.is_empty())
    }

    pub fn has_action(&self, service: &str, action: &str) -> bool {
        !self.get_permissions(service, action).is_empty()
    }

    pub fn get_permissions(&self, service: &str, action: &str) -> Vec<&Permission> {
        self.services
            .get(&service.to_lowercase())
            .and_then(|actions| actions.get(&action.to_lowercase()))
            .map(|bucket| bucket.iter().collect())
            .unwrap_or_default()
    }

    /// All permissions, in (service, action) order.
    pub fn permissions(&self) -> Vec<&Permission> {
        let mut out = Vec::new();
        for actions in self.services.values() {
            for bucket in actions.values() {
                out.extend(bucket.iter());
            }
        }
        out
    }

    /// Add a permission, folding it into the bucket's canonical form: it is
    /// discarded when an existing member includes it, merged via union where
    /// possible, appended otherwise.
    pub fn add_permission(&mut self, permission: Permission) -> Result<(), LensError> {
        if permission.effect() != E::EFFECT {
            return Err(LensError::EffectMismatch {
                expected: E::EFFECT,
                actual: permission.effect(),
            });
        }

        let bucket = self
            .services
            .entry(permission.service().to_string())
            .or_default()
            .entry(permission.action().to_lowercase())
            .or_default();

        if bucket.iter().any(|existing| existing.includes(&permission)) {
            return Ok(());
        }

        let mut merged = permission;
        loop {
            let mut folded = false;
            for i in 0..bucket.len() {
                let mut union = merged.union(&bucket[i]);
                if union.len() == 1 {
                    bucket.remove(i);
                    merged = union.remove(0);
                    folded = true;
                    break;
                }
            }
            if !folded {
                break;
            }
        }
        bucket.push(merged);

        Ok(())
    }

    /// Add every permission of another same-effect set.
    pub fn add_all(&mut self, other: &PermissionSet<E>) -> Result<(), LensError> {
        for permission in other.permissions() {
            self.add_permission(permission.clone())?;
        }
        Ok(())
    }

    /// Add every permission of a sequence of same-effect sets.
    pub fn add_all_sets<'a, I>(&mut self, sets: I) -> Result<(), LensError>
    where
        I: IntoIterator<Item = &'a PermissionSet<E>>,
        E: 'a,
    {
        for set in sets {
            self.add_all(set)?;
        }
        Ok(())
    }

    /// The pairwise intersection of the two sets, per (service, action)
    /// bucket.
    pub fn intersection(&self, other: &PermissionSet<E>) -> Result<PermissionSet<E>, LensError> {
        let mut out = PermissionSet::new();
        for (service, actions) in &self.services {
            for (action, bucket) in actions {
                for theirs in other.get_permissions(service, action) {
                    for ours in bucket {
                        if let Some(met) = ours.intersection(theirs) {
                            out.add_permission(met)?;
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// Emit the canonical-form permissions as policy statements, grouping
    /// permissions that share conditions and resource scope into one
    /// statement with a sorted action list.
    pub fn to_policy_statements(&self) -> Result<Vec<Statement>, LensError> {
        struct Group {
            conditions: Option<Conditions>,
            resources: ResourceSpec,
            actions: Vec<String>,
        }

        let mut groups: Vec<Group> = Vec::new();
        for permission in self.permissions() {
            let action = format!("{}:{}", permission.service(), permission.action());
            let existing = groups.iter_mut().find(|g| {
                g.conditions.as_ref() == permission.conditions() && &g.resources == permission.resources()
            });
            match existing {
                Some(group) => group.actions.push(action),
                None => groups.push(Group {
                    conditions: permission.conditions().cloned(),
                    resources: permission.resources().clone(),
                    actions: vec![action],
                }),
            }
        }

        let mut statements = Vec::with_capacity(groups.len());
        for group in groups {
            let mut actions = group.actions;
            actions.sort();
            actions.dedup();

            let mut builder = Statement::builder();
            builder.effect(E::EFFECT).action(JsonList::from_compact(actions));
            match group.resources {
                ResourceSpec::Resource(patterns) => {
                    builder.resource(JsonList::from_compact(patterns));
                }
                ResourceSpec::NotResource(patterns) => {
                    builder.not_resource(JsonList::from_compact(patterns));
                }
            }
            if let Some(conditions) = group.conditions {
                builder.condition(conditions);
            }
            statements.push(builder.build().map_err(|e| LensError::InvalidStatement(e.to_string()))?);
        }

        Ok(statements)
    }
}

/// The residual allows and accumulated trailing denies of a set subtraction.
#[derive(Clone, Debug, Default)]
pub struct SubtractOutcome {
    pub allow: AllowSet,
    pub deny: DenySet,
}

impl AllowSet {
    /// Subtract every matching deny from every allow, re-canonicalizing the
    /// survivors. Denies that could not be absorbed are returned alongside.
    pub fn subtract(&self, denies: &DenySet) -> Result<SubtractOutcome, LensError> {
        let mut outcome = SubtractOutcome::default();

        for permission in self.permissions() {
            let mut current = vec![permission.clone()];
            for deny in denies.get_permissions(permission.service(), permission.action()) {
                let mut next = Vec::new();
                for p in current {
                    for part in p.subtract(deny) {
                        if part.effect() == Effect::Deny {
                            outcome.deny.add_permission(part)?;
                        } else {
                            next.push(part);
                        }
                    }
                }
                current = next;
            }
            for survivor in current {
                outcome.allow.add_permission(survivor)?;
            }
        }

        Ok(outcome)
    }
}
