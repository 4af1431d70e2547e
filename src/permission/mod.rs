//! The permission algebra: immutable [Permission] values with inclusion,
//! union, intersection and subtraction, and the canonical [PermissionSet]
//! container.

pub mod set;
mod subtract;

pub use set::{AllowSet, DenySet, PermissionSet, SubtractOutcome};

use crate::{
    condition::algebra::{conditions_include, intersect_conditions, union_conditions},
    pattern, Conditions, Effect, LensError,
};

/// The resource scope of a permission: either a positive pattern list or an
/// everything-except list. The two are mutually exclusive by construction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResourceSpec {
    Resource(Vec<String>),
    NotResource(Vec<String>),
}

impl ResourceSpec {
    #[inline]
    pub fn patterns(&self) -> &[String] {
        match self {
            Self::Resource(patterns) | Self::NotResource(patterns) => patterns,
        }
    }

    #[inline]
    pub fn is_not_resource(&self) -> bool {
        matches!(self, Self::NotResource(_))
    }

    /// A single-pattern positive scope.
    pub fn any() -> Self {
        Self::Resource(vec!["*".to_string()])
    }
}

/// An immutable (effect, service, action, resources, conditions) tuple.
///
/// The service is stored lowercase; the action keeps its casing and compares
/// case-insensitively. All algebraic methods return new values.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Permission {
    effect: Effect,
    service: String,
    action: String,
    resources: ResourceSpec,
    conditions: Option<Conditions>,
}

impl Permission {
    pub fn new<S, A>(
        effect: Effect,
        service: S,
        action: A,
        resources: ResourceSpec,
        conditions: Option<Conditions>,
    ) -> Result<Self, LensError>
    where
        S: Into<String>,
        A: Into<String>,
    {
        if resources.patterns().is_empty() {
            return Err(LensError::MalformedPermission("resource pattern list is empty".to_string()));
        }

        Ok(Self {
            effect,
            service: service.into().to_lowercase(),
            action: action.into(),
            resources,
            conditions: conditions.and_then(Conditions::into_option),
        })
    }

    /// An unconditional Allow over the given resource patterns.
    pub fn allow<S, A>(service: S, action: A, resources: Vec<String>) -> Result<Self, LensError>
    where
        S: Into<String>,
        A: Into<String>,
    {
        Self::new(Effect::Allow, service, action, ResourceSpec::Resource(resources), None)
    }

    /// An unconditional Deny over the given resource patterns.
    pub fn deny<S, A>(service: S, action: A, resources: Vec<String>) -> Result<Self, LensError>
    where
        S: Into<String>,
        A: Into<String>,
    {
        Self::new(Effect::Deny, service, action, ResourceSpec::Resource(resources), None)
    }

    #[inline]
    pub fn effect(&self) -> Effect {
        self.effect
    }

    #[inline]
    pub fn service(&self) -> &str {
        &self.service
    }

    #[inline]
    pub fn action(&self) -> &str {
        &self.action
    }

    #[inline]
    pub fn resources(&self) -> &ResourceSpec {
        &self.resources
    }

    #[inline]
    pub fn conditions(&self) -> Option<&Conditions> {
        self.conditions.as_ref()
    }

    /// Same effect, service and (case-insensitive) action.
    pub(crate) fn matches_key(&self, other: &Self) -> bool {
        self.effect == other.effect
            && self.service == other.service
            && self.action.eq_ignore_ascii_case(&other.action)
    }

    pub(crate) fn with_resources(&self, resources: ResourceSpec) -> Self {
        Self {
            resources,
            ..self.clone()
        }
    }

    pub(crate) fn with_conditions(&self, conditions: Option<Conditions>) -> Self {
        Self {
            conditions: conditions.and_then(Conditions::into_option),
            ..self.clone()
        }
    }

    pub(crate) fn conditions_match(&self, other: &Self) -> bool {
        self.conditions == other.conditions
    }

    /// Whether every request this permission's counterpart would authorize is
    /// also authorized by this permission.
    pub fn includes(&self, other: &Self) -> bool {
        if !self.matches_key(other) {
            return false;
        }
        if !conditions_include(self.conditions.as_ref(), other.conditions.as_ref()) {
            return false;
        }

        use ResourceSpec::{NotResource, Resource};
        match (&self.resources, &other.resources) {
            (Resource(outer), Resource(inner)) => inner.iter().all(|p| pattern::any_covers(outer, p)),
            // A positive list covers an everything-except scope only when it
            // covers everything outright.
            (Resource(outer), NotResource(_)) => outer.iter().any(|p| p == "*"),
            // An everything-except scope covers a positive list when no
            // pattern on either side reaches into the other.
            (NotResource(excluded), Resource(inner)) => inner.iter().all(|p| {
                !excluded.iter().any(|ex| pattern::covers(ex, p) || pattern::covers(p, ex))
            }),
            (NotResource(outer), NotResource(inner)) => outer.iter().all(|p| pattern::any_covers(inner, p)),
        }
    }

    /// Combine two permissions into a sequence whose joint acceptance equals
    /// the union of the two. Returns one permission when they merge, both
    /// otherwise.
    pub fn union(&self, other: &Self) -> Vec<Self> {
        if !self.matches_key(other) {
            return vec![self.clone(), other.clone()];
        }
        if self.includes(other) {
            return vec![self.clone()];
        }
        if other.includes(self) {
            return vec![other.clone()];
        }

        let conditions = match (&self.conditions, &other.conditions) {
            (None, None) => None,
            (Some(a), Some(b)) => match union_conditions(a, b) {
                Some(merged) => merged.into_option(),
                None => return vec![self.clone(), other.clone()],
            },
            _ => return vec![self.clone(), other.clone()],
        };

        use ResourceSpec::{NotResource, Resource};
        match (&self.resources, &other.resources) {
            (Resource(a), Resource(b)) => {
                let mut patterns = a.clone();
                for p in b {
                    if !patterns.contains(p) {
                        patterns.push(p.clone());
                    }
                }
                vec![self.with_resources(Resource(patterns)).with_conditions(conditions)]
            }
            (NotResource(a), NotResource(b)) => {
                // The union of two everything-except scopes excludes only
                // what both exclude.
                let shared: Vec<String> = a.iter().filter(|p| b.contains(p)).cloned().collect();
                if shared.is_empty() {
                    vec![self.clone(), other.clone()]
                } else {
                    vec![self.with_resources(NotResource(shared)).with_conditions(conditions)]
                }
            }
            // A single statement cannot express a mixed union.
            _ => vec![self.clone(), other.clone()],
        }
    }

    /// The permission authorizing exactly the requests both sides authorize,
    /// or None when the overlap is empty.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.matches_key(other) {
            return None;
        }
        if self.includes(other) {
            return Some(other.clone());
        }
        if other.includes(self) {
            return Some(self.clone());
        }

        let conditions = match (&self.conditions, &other.conditions) {
            (None, None) => None,
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (Some(a), Some(b)) => intersect_conditions(a, b)?.into_option(),
        };

        use ResourceSpec::{NotResource, Resource};
        let resources = match (&self.resources, &other.resources) {
            (Resource(a), Resource(b)) => {
                let mut kept: Vec<String> = a.iter().filter(|p| pattern::any_covers(b, p)).cloned().collect();
                for p in b {
                    if pattern::any_covers(a, p) && !kept.contains(p) {
                        kept.push(p.clone());
                    }
                }
                if kept.is_empty() {
                    return None;
                }
                Resource(kept)
            }
            (NotResource(a), NotResource(b)) => {
                let mut merged = a.clone();
                for p in b {
                    if !merged.contains(p) {
                        merged.push(p.clone());
                    }
                }
                // Drop exclusions strictly subsumed by a broader one.
                let kept: Vec<String> = merged
                    .iter()
                    .filter(|p| {
                        !merged.iter().any(|q| q != *p && pattern::covers(q, p) && !pattern::covers(p, q))
                    })
                    .cloned()
                    .collect();
                NotResource(kept)
            }
            (Resource(included), NotResource(excluded)) | (NotResource(excluded), Resource(included)) => {
                let kept: Vec<String> =
                    included.iter().filter(|p| !pattern::any_covers(excluded, p)).cloned().collect();
                if kept.is_empty() {
                    return None;
                }
                Resource(kept)
            }
        };

        Permission::new(self.effect, &self.service, &self.action, resources, conditions).ok()
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{Permission, ResourceSpec},
        crate::{Conditions, Effect},
        pretty_assertions::assert_eq,
        std::str::FromStr,
    };

    fn conditions(s: &str) -> Conditions {
        Conditions::from_str(s).unwrap()
    }

    #[test_log::test]
    fn test_new_rejects_empty_resources() {
        let e = Permission::allow("s3", "GetObject", vec![]).unwrap_err();
        assert!(e.to_string().starts_with("Malformed permission"));
    }

    #[test_log::test]
    fn test_new_normalizes() {
        let p = Permission::new(
            Effect::Allow,
            "S3",
            "GetObject",
            ResourceSpec::any(),
            Some(Conditions::new()),
        )
        .unwrap();
        assert_eq!(p.service(), "s3");
        assert_eq!(p.action(), "GetObject");
        assert_eq!(p.conditions(), None);
    }

    #[test_log::test]
    fn test_includes_reflexive() {
        let p = Permission::allow("s3", "GetObject", vec!["arn:aws:s3:::b/*".to_string()]).unwrap();
        assert!(p.includes(&p));
    }

    #[test_log::test]
    fn test_includes_star_covers_concrete() {
        // Scenario S1.
        let broad = Permission::allow("s3", "GetObject", vec!["*".to_string()]).unwrap();
        let narrow =
            Permission::allow("s3", "GetObject", vec!["arn:aws:s3:::mybucket/file".to_string()]).unwrap();
        assert!(broad.includes(&narrow));
        assert!(!narrow.includes(&broad));
    }

    #[test_log::test]
    fn test_includes_respects_key() {
        let a = Permission::allow("s3", "GetObject", vec!["*".to_string()]).unwrap();
        let b = Permission::allow("s3", "PutObject", vec!["*".to_string()]).unwrap();
        let c = Permission::deny("s3", "GetObject", vec!["*".to_string()]).unwrap();
        assert!(!a.includes(&b));
        assert!(!a.includes(&c));

        // Actions compare case-insensitively.
        let d = Permission::allow("s3", "getobject", vec!["*".to_string()]).unwrap();
        assert!(a.includes(&d));
    }

    #[test_log::test]
    fn test_includes_conditions() {
        let unconditional = Permission::allow("s3", "GetObject", vec!["*".to_string()]).unwrap();
        let conditional = unconditional
            .with_conditions(Some(conditions(r#"{"StringEquals": {"aws:PrincipalOrgId": ["o-1"]}}"#)));

        assert!(unconditional.includes(&conditional));
        assert!(!conditional.includes(&unconditional));

        let wider = unconditional
            .with_conditions(Some(conditions(r#"{"StringEquals": {"aws:PrincipalOrgId": ["o-1", "o-2"]}}"#)));
        assert!(wider.includes(&conditional));
        assert!(!conditional.includes(&wider));
    }

    #[test_log::test]
    fn test_includes_not_resource() {
        let except = Permission::new(
            Effect::Allow,
            "s3",
            "GetObject",
            ResourceSpec::NotResource(vec!["arn:aws:s3:::audit/*".to_string()]),
            None,
        )
        .unwrap();
        let inside = Permission::allow("s3", "GetObject", vec!["arn:aws:s3:::data/file".to_string()]).unwrap();
        let overlapping = Permission::allow("s3", "GetObject", vec!["arn:aws:s3:::audit/file".to_string()]).unwrap();
        let everything = Permission::allow("s3", "GetObject", vec!["*".to_string()]).unwrap();

        assert!(except.includes(&inside));
        assert!(!except.includes(&overlapping));
        assert!(!except.includes(&everything));
        assert!(everything.includes(&except));

        let wider_except = Permission::new(
            Effect::Allow,
            "s3",
            "GetObject",
            ResourceSpec::NotResource(vec!["arn:aws:s3:::audit/secret".to_string()]),
            None,
        )
        .unwrap();
        // Excluding less covers excluding more.
        assert!(wider_except.includes(&except));
        assert!(!except.includes(&wider_except));
    }

    #[test_log::test]
    fn test_union_merges_resource_lists() {
        // Scenario S2.
        let p1 = Permission::allow(
            "s3",
            "GetObject",
            vec!["arn:aws:s3:::b/f1".to_string(), "arn:aws:s3:::b/f2".to_string()],
        )
        .unwrap();
        let p2 = Permission::allow(
            "s3",
            "GetObject",
            vec!["arn:aws:s3:::b/f2".to_string(), "arn:aws:s3:::b/f3".to_string()],
        )
        .unwrap();

        let merged = p1.union(&p2);
        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged[0].resources().patterns(),
            &[
                "arn:aws:s3:::b/f1".to_string(),
                "arn:aws:s3:::b/f2".to_string(),
                "arn:aws:s3:::b/f3".to_string()
            ]
        );
    }

    #[test_log::test]
    fn test_union_idempotent() {
        let p = Permission::allow("s3", "GetObject", vec!["arn:aws:s3:::b/*".to_string()]).unwrap();
        assert_eq!(p.union(&p), vec![p.clone()]);
    }

    #[test_log::test]
    fn test_union_different_keys() {
        let a = Permission::allow("s3", "GetObject", vec!["*".to_string()]).unwrap();
        let b = Permission::allow("s3", "PutObject", vec!["*".to_string()]).unwrap();
        assert_eq!(a.union(&b).len(), 2);
    }

    #[test_log::test]
    fn test_union_unmergeable_conditions() {
        let a = Permission::allow("s3", "GetObject", vec!["arn:aws:s3:::a".to_string()])
            .unwrap()
            .with_conditions(Some(conditions(r#"{"Bool": {"aws:SecureTransport": ["true"]}}"#)));
        let b = Permission::allow("s3", "GetObject", vec!["arn:aws:s3:::b".to_string()])
            .unwrap()
            .with_conditions(Some(conditions(r#"{"StringEquals": {"k": ["v"]}}"#)));
        assert_eq!(a.union(&b).len(), 2);

        // One side conditional, the other not: no single statement.
        let c = Permission::allow("s3", "GetObject", vec!["arn:aws:s3:::b".to_string()]).unwrap();
        assert_eq!(a.union(&c).len(), 2);
    }

    #[test_log::test]
    fn test_union_mergeable_conditions() {
        let a = Permission::allow("ec2", "StartInstances", vec!["*".to_string()])
            .unwrap()
            .with_conditions(Some(conditions(r#"{"StringEquals": {"aws:PrincipalOrgId": ["o-1"]}}"#)));
        let b = a.with_conditions(Some(conditions(r#"{"StringEquals": {"aws:PrincipalOrgId": ["o-2"]}}"#)));

        let merged = a.union(&b);
        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged[0].conditions().unwrap().get_values("stringequals", "aws:principalorgid"),
            Some(&vec!["o-1".to_string(), "o-2".to_string()])
        );
    }

    #[test_log::test]
    fn test_union_not_resource_narrows_exclusions() {
        let a = Permission::new(
            Effect::Allow,
            "s3",
            "GetObject",
            ResourceSpec::NotResource(vec!["arn:aws:s3:::x".to_string(), "arn:aws:s3:::y".to_string()]),
            None,
        )
        .unwrap();
        let b = Permission::new(
            Effect::Allow,
            "s3",
            "GetObject",
            ResourceSpec::NotResource(vec!["arn:aws:s3:::y".to_string(), "arn:aws:s3:::z".to_string()]),
            None,
        )
        .unwrap();

        let merged = a.union(&b);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].resources(), &ResourceSpec::NotResource(vec!["arn:aws:s3:::y".to_string()]));
    }

    #[test_log::test]
    fn test_intersection_identity_when_included() {
        let broad = Permission::allow("s3", "GetObject", vec!["*".to_string()]).unwrap();
        let narrow = Permission::allow("s3", "GetObject", vec!["arn:aws:s3:::b/f".to_string()]).unwrap();
        assert_eq!(broad.intersection(&narrow), Some(narrow.clone()));
        assert_eq!(narrow.intersection(&broad), Some(narrow));
    }

    #[test_log::test]
    fn test_intersection_overlapping_lists() {
        let a = Permission::allow(
            "s3",
            "GetObject",
            vec!["arn:aws:s3:::b/f1".to_string(), "arn:aws:s3:::b/f2".to_string()],
        )
        .unwrap();
        let b = Permission::allow(
            "s3",
            "GetObject",
            vec!["arn:aws:s3:::b/f2".to_string(), "arn:aws:s3:::b/f3".to_string()],
        )
        .unwrap();

        let met = a.intersection(&b).unwrap();
        assert_eq!(met.resources().patterns(), &["arn:aws:s3:::b/f2".to_string()]);

        let disjoint = Permission::allow("s3", "GetObject", vec!["arn:aws:s3:::other".to_string()]).unwrap();
        assert_eq!(a.intersection(&disjoint), None);
    }

    #[test_log::test]
    fn test_intersection_mixed_resources() {
        let positive = Permission::allow(
            "s3",
            "GetObject",
            vec!["arn:aws:s3:::data/file".to_string(), "arn:aws:s3:::audit/file".to_string()],
        )
        .unwrap();
        let except = Permission::new(
            Effect::Allow,
            "s3",
            "GetObject",
            ResourceSpec::NotResource(vec!["arn:aws:s3:::audit/*".to_string()]),
            None,
        )
        .unwrap();

        let met = positive.intersection(&except).unwrap();
        assert_eq!(met.resources().patterns(), &["arn:aws:s3:::data/file".to_string()]);
    }

    #[test_log::test]
    fn test_intersection_not_resource_unions_exclusions() {
        let a = Permission::new(
            Effect::Allow,
            "s3",
            "GetObject",
            ResourceSpec::NotResource(vec!["arn:aws:s3:::audit/*".to_string()]),
            None,
        )
        .unwrap();
        let b = Permission::new(
            Effect::Allow,
            "s3",
            "GetObject",
            ResourceSpec::NotResource(vec!["arn:aws:s3:::audit/secret".to_string(), "arn:aws:s3:::x".to_string()]),
            None,
        )
        .unwrap();

        let met = a.intersection(&b).unwrap();
        // audit/secret is subsumed by audit/*.
        assert_eq!(
            met.resources(),
            &ResourceSpec::NotResource(vec!["arn:aws:s3:::audit/*".to_string(), "arn:aws:s3:::x".to_string()])
        );
    }

    #[test_log::test]
    fn test_intersection_contradictory_conditions() {
        let a = Permission::allow("s3", "GetObject", vec!["arn:aws:s3:::a".to_string(), "arn:aws:s3:::b".to_string()])
            .unwrap()
            .with_conditions(Some(conditions(r#"{"StringEquals": {"k": ["x"]}}"#)));
        let b = Permission::allow("s3", "GetObject", vec!["arn:aws:s3:::b".to_string(), "arn:aws:s3:::c".to_string()])
            .unwrap()
            .with_conditions(Some(conditions(r#"{"StringEquals": {"k": ["y"]}}"#)));
        assert_eq!(a.intersection(&b), None);
    }
}
