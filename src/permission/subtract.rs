//! Subtraction of a Deny permission from an Allow permission.
//!
//! Four scenarios arise from the resource/notResource pairing of the two
//! sides. Each emits a sequence of Allows covering the surviving region,
//! sometimes with a trailing Deny the caller must carry when the denied
//! region cannot be absorbed into the Allows.

use {
    super::{Permission, ResourceSpec},
    crate::{
        condition::algebra::{intersect_conditions, invert_conditions},
        pattern, Conditions, Effect,
    },
};

impl Permission {
    /// Subtract the region covered by `deny` from this Allow.
    ///
    /// Applies only when `self` is an Allow and `deny` is a Deny on the same
    /// service and action; otherwise `self` is returned unchanged.
    pub fn subtract(&self, deny: &Permission) -> Vec<Permission> {
        if self.effect() != Effect::Allow
            || deny.effect() != Effect::Deny
            || self.service() != deny.service()
            || !self.action().eq_ignore_ascii_case(deny.action())
        {
            return vec![self.clone()];
        }

        use ResourceSpec::{NotResource, Resource};
        match (self.resources(), deny.resources()) {
            (Resource(allow), Resource(denied)) => self.subtract_res_res(deny, allow, denied),
            (Resource(allow), NotResource(kept)) => self.subtract_res_notres(deny, allow, kept),
            (NotResource(excluded), Resource(denied)) => self.subtract_notres_res(deny, excluded, denied),
            (NotResource(excluded), NotResource(kept)) => self.subtract_notres_notres(deny, excluded, kept),
        }
    }

    /// Scenario A: positive allow list vs. positive deny list.
    fn subtract_res_res(&self, deny: &Permission, allow: &[String], denied: &[String]) -> Vec<Permission> {
        let conditions_match = self.conditions_match(deny);

        let mut no_overlap = Vec::new();
        let mut supersets = Vec::new();
        let mut matched = Vec::new();
        for p in allow {
            if denied.contains(p) || pattern::any_covers(denied, p) {
                matched.push(p.clone());
            } else if denied.iter().any(|d| pattern::covers(p, d)) {
                supersets.push(p.clone());
            } else {
                no_overlap.push(p.clone());
            }
        }

        let mut out = Vec::new();
        if !no_overlap.is_empty() {
            out.push(self.with_resources(ResourceSpec::Resource(no_overlap)));
        }
        if !supersets.is_empty() {
            out.push(self.with_resources(ResourceSpec::Resource(supersets.clone())));
        }
        // An unconditional deny erases its matches outright; a conditional
        // one leaves the inverted-condition remainder.
        if !matched.is_empty() && !conditions_match && deny.conditions().is_some() {
            let shrunk = self.with_resources(ResourceSpec::Resource(matched));
            out.extend(apply_deny_conditions_to_allow(&shrunk, deny));
        }

        let denied_subsets: Vec<String> =
            denied.iter().filter(|d| supersets.iter().any(|p| pattern::covers(p, d))).cloned().collect();
        if !denied_subsets.is_empty() {
            out.push(deny.with_resources(ResourceSpec::Resource(denied_subsets)));
        }

        out
    }

    /// Scenario B: positive allow list vs. everything-except deny.
    fn subtract_res_notres(&self, deny: &Permission, allow: &[String], kept: &[String]) -> Vec<Permission> {
        let conditions_match = self.conditions_match(deny);

        let mut excluded_from_deny = Vec::new();
        let mut supersets = Vec::new();
        let mut affected = Vec::new();
        for p in allow {
            if pattern::any_covers(kept, p) {
                excluded_from_deny.push(p.clone());
            } else if kept.iter().any(|k| pattern::covers(p, k)) {
                supersets.push(p.clone());
            } else {
                affected.push(p.clone());
            }
        }

        if supersets.is_empty() && affected.is_empty() {
            return vec![self.clone()];
        }

        let mut out = Vec::new();
        if !excluded_from_deny.is_empty() {
            out.push(self.with_resources(ResourceSpec::Resource(excluded_from_deny)));
        }
        if !supersets.is_empty() {
            let covered_kept: Vec<String> =
                kept.iter().filter(|k| supersets.iter().any(|p| pattern::covers(p, k))).cloned().collect();
            if !covered_kept.is_empty() {
                out.push(self.with_resources(ResourceSpec::Resource(covered_kept)));
            }
            if deny.conditions().is_some() && !conditions_match {
                let shrunk = self.with_resources(ResourceSpec::Resource(supersets));
                out.extend(apply_deny_conditions_to_allow(&shrunk, deny));
            }
        }
        if !affected.is_empty() && deny.conditions().is_some() && !conditions_match {
            let shrunk = self.with_resources(ResourceSpec::Resource(affected));
            out.extend(apply_deny_conditions_to_allow(&shrunk, deny));
        }

        out
    }

    /// Scenario C: everything-except allow vs. positive deny list.
    fn subtract_notres_res(&self, deny: &Permission, excluded: &[String], denied: &[String]) -> Vec<Permission> {
        let conditions_match = self.conditions_match(deny);

        let mut subset_denies = Vec::new();
        let mut new_denies = Vec::new();
        let mut replaced = Vec::new();
        for d in denied {
            if pattern::any_covers(excluded, d) {
                // Already excluded from the allow; the deny adds nothing.
                continue;
            }
            let widened: Vec<String> =
                excluded.iter().filter(|ex| pattern::covers(d, ex)).cloned().collect();
            if widened.is_empty() {
                new_denies.push(d.clone());
            } else {
                subset_denies.push(d.clone());
                for ex in widened {
                    if !replaced.contains(&ex) {
                        replaced.push(ex);
                    }
                }
            }
        }

        if subset_denies.is_empty() && new_denies.is_empty() {
            return vec![self.clone()];
        }

        let base: Vec<String> = excluded.iter().filter(|ex| !replaced.contains(ex)).cloned().collect();

        if deny.conditions().is_none() || conditions_match {
            let mut expanded = base;
            for d in subset_denies.iter().chain(new_denies.iter()) {
                if !expanded.contains(d) {
                    expanded.push(d.clone());
                }
            }
            return vec![self.with_resources(ResourceSpec::NotResource(expanded))];
        }

        let mut out = apply_deny_conditions_to_allow(self, deny);

        if !subset_denies.is_empty() {
            let mut patterns = base;
            for d in &subset_denies {
                if !patterns.contains(d) {
                    patterns.push(d.clone());
                }
            }
            let conditions = combine_with_deny_conditions(self.conditions(), deny.conditions());
            out.push(self.with_resources(ResourceSpec::NotResource(patterns)).with_conditions(conditions));
        }

        if !new_denies.is_empty() {
            let mut patterns = excluded.to_vec();
            for d in &new_denies {
                if !patterns.contains(d) {
                    patterns.push(d.clone());
                }
            }
            out.push(self.with_resources(ResourceSpec::NotResource(patterns)));
        }

        out
    }

    /// Scenario D: everything-except allow vs. everything-except deny.
    fn subtract_notres_notres(&self, deny: &Permission, excluded: &[String], kept: &[String]) -> Vec<Permission> {
        let surviving: Vec<String> = kept.iter().filter(|k| !pattern::any_covers(excluded, k)).cloned().collect();
        if surviving.is_empty() {
            return vec![];
        }

        if deny.conditions().is_none() || self.conditions_match(deny) {
            return vec![self.with_resources(ResourceSpec::Resource(surviving))];
        }

        let mut out = apply_deny_conditions_to_allow(self, deny);

        let deny_conditions = deny.conditions().cloned();
        let conditions = match &deny_conditions {
            Some(conditions) if conditions.clause_count() == 1 => deny_conditions.clone(),
            _ => None,
        };
        out.push(self.with_resources(ResourceSpec::Resource(surviving)).with_conditions(conditions));

        out
    }
}

/// Split the deny's condition block into its (operator, key) clauses, invert
/// each clause independently and AND it with the allow's own conditions. Each
/// satisfiable combination yields one Allow over the allow's resources. A
/// deny without conditions leaves the allow unchanged.
pub(crate) fn apply_deny_conditions_to_allow(allow: &Permission, deny: &Permission) -> Vec<Permission> {
    let deny_conditions = match deny.conditions() {
        None => return vec![allow.clone()],
        Some(conditions) => conditions,
    };

    let mut out = Vec::new();
    for (op, key, values) in deny_conditions.clauses() {
        let inverted = invert_conditions(&Conditions::singleton(op, key, values.clone()));
        let combined = match allow.conditions() {
            None => Some(inverted),
            Some(own) => intersect_conditions(own, &inverted),
        };
        if let Some(conditions) = combined {
            out.push(allow.with_conditions(conditions.into_option()));
        }
    }

    out
}

/// Scenario C's subset-replacement part carries the deny's conditions
/// intersected with the allow's; when the intersection is empty the deny's
/// conditions are used alone.
fn combine_with_deny_conditions(
    allow: Option<&Conditions>,
    deny: Option<&Conditions>,
) -> Option<Conditions> {
    let deny = deny?;
    match allow {
        None => Some(deny.clone()),
        Some(own) => match intersect_conditions(own, deny) {
            Some(combined) => combined.into_option(),
            None => Some(deny.clone()),
        },
    }
}
