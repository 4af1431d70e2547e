//! Union, intersection and inversion of condition blocks.

use {
    super::{
        op::{Family, OpName, OrderKind},
        Conditions, ValueList,
    },
    chrono::{DateTime, Utc},
    std::cmp::Ordering,
};

/// Merge two condition blocks into one block whose acceptance set is the
/// union of the two, when a single block can express it.
///
/// The blocks must have identical operator sets and, per operator, identical
/// context-key sets; otherwise they are not mergeable and `None` is returned.
pub fn union_conditions(a: &Conditions, b: &Conditions) -> Option<Conditions> {
    let a_ops: Vec<&String> = a.iter().map(|(op, _)| op).collect();
    let b_ops: Vec<&String> = b.iter().map(|(op, _)| op).collect();
    if a_ops != b_ops {
        return None;
    }

    let mut out = Conditions::new();
    for (op, a_keys) in a.iter() {
        let b_keys = b.get(op)?;
        if a_keys.len() != b_keys.len() || a_keys.keys().ne(b_keys.keys()) {
            return None;
        }

        let parsed = OpName::parse(op);
        for (key, a_values) in a_keys {
            let b_values = b_keys.get(key)?;
            let merged = union_values(&parsed, a_values, b_values)?;
            out.insert(op, key, merged);
        }
    }

    Some(out)
}

/// Intersect two condition blocks. Keys present on only one side are carried
/// through; keys present on both combine per their operator family. `None`
/// means the intersection is empty (unsatisfiable).
pub fn intersect_conditions(a: &Conditions, b: &Conditions) -> Option<Conditions> {
    let mut out = Conditions::new();

    let mut ops: Vec<&String> = a.iter().map(|(op, _)| op).collect();
    for (op, _) in b.iter() {
        if !ops.contains(&op) {
            ops.push(op);
        }
    }

    for op in ops {
        let parsed = OpName::parse(op);
        let a_keys = a.get(op);
        let b_keys = b.get(op);

        let mut keys: Vec<&String> = a_keys.map(|m| m.keys().collect()).unwrap_or_default();
        if let Some(b_keys) = b_keys {
            for key in b_keys.keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }

        for key in keys {
            let a_values = a_keys.and_then(|m| m.get(key));
            let b_values = b_keys.and_then(|m| m.get(key));
            match (a_values, b_values) {
                (Some(a_values), Some(b_values)) => match intersect_values(&parsed, a_values, b_values) {
                    Intersected::Keep(values) => out.insert(op, key, values),
                    Intersected::Drop => (),
                    Intersected::Empty => return None,
                },
                (Some(values), None) | (None, Some(values)) => out.insert(op, key, values.clone()),
                (None, None) => (),
            }
        }
    }

    if reduce_complement_pairs(&mut out) {
        Some(out)
    } else {
        None
    }
}

/// Produce the Boolean inverse of a condition block: each operator maps to
/// its complement, set quantifiers swap, IfExists is preserved. Bool and Null
/// keep their operator and flip their values. Unknown operators are carried
/// unchanged.
pub fn invert_conditions(conditions: &Conditions) -> Conditions {
    let mut out = Conditions::new();
    for (op, keys) in conditions.iter() {
        let parsed = OpName::parse(op);
        if parsed.base.flips_values() {
            let flipped = match parsed.inverted() {
                Some(inverted) => inverted.to_string(),
                None => op.clone(),
            };
            for (key, values) in keys {
                out.insert(&flipped, key, values.iter().map(|v| flip_bool(v)).collect());
            }
        } else if let Some(inverted) = parsed.inverted() {
            let inverted = inverted.to_string();
            for (key, values) in keys {
                out.insert(&inverted, key, values.clone());
            }
        } else {
            for (key, values) in keys {
                out.insert(op, key, values.clone());
            }
        }
    }
    out
}

/// Whether `outer` is at most as restrictive as `inner` on every clause it
/// carries: every request satisfying `inner` also satisfies `outer`.
pub(crate) fn conditions_include(outer: Option<&Conditions>, inner: Option<&Conditions>) -> bool {
    let outer = match outer {
        None => return true,
        Some(outer) if outer.is_empty() => return true,
        Some(outer) => outer,
    };
    let inner = match inner {
        None => return false,
        Some(inner) => inner,
    };

    for (op, key, outer_values) in outer.clauses() {
        let inner_values = match inner.get_values(op, key) {
            Some(values) => values,
            None => return false,
        };

        let ok = match OpName::parse(op).base.family() {
            Family::Positive => is_subset(inner_values, outer_values),
            Family::Negative => is_subset(outer_values, inner_values),
            Family::UpperBound(kind) => {
                bound_cmp(kind, inner_values, outer_values).map_or(false, |o| o != Ordering::Greater)
            }
            Family::LowerBound(kind) => {
                bound_cmp(kind, inner_values, outer_values).map_or(false, |o| o != Ordering::Less)
            }
            Family::BoolEq => bools_equal(outer_values, inner_values),
            Family::Unknown => outer_values == inner_values,
        };
        if !ok {
            return false;
        }
    }

    true
}

fn union_values(op: &OpName, a: &ValueList, b: &ValueList) -> Option<ValueList> {
    match op.base.family() {
        Family::Positive => Some(list_union(a, b)),
        Family::Negative => {
            let shared = list_intersection(a, b);
            if shared.is_empty() {
                None
            } else {
                Some(shared)
            }
        }
        Family::UpperBound(kind) => pick_bound(kind, a, b, Ordering::Greater),
        Family::LowerBound(kind) => pick_bound(kind, a, b, Ordering::Less),
        Family::BoolEq => {
            if bools_equal(a, b) {
                Some(a.clone())
            } else {
                None
            }
        }
        Family::Unknown => None,
    }
}

enum Intersected {
    Keep(ValueList),
    Drop,
    Empty,
}

fn intersect_values(op: &OpName, a: &ValueList, b: &ValueList) -> Intersected {
    match op.base.family() {
        Family::Positive => {
            let shared = list_intersection(a, b);
            if shared.is_empty() {
                Intersected::Empty
            } else {
                Intersected::Keep(shared)
            }
        }
        Family::Negative => Intersected::Keep(list_union(a, b)),
        Family::UpperBound(kind) => match pick_bound(kind, a, b, Ordering::Less) {
            Some(values) => Intersected::Keep(values),
            None => Intersected::Drop,
        },
        Family::LowerBound(kind) => match pick_bound(kind, a, b, Ordering::Greater) {
            Some(values) => Intersected::Keep(values),
            None => Intersected::Drop,
        },
        Family::BoolEq => {
            if bools_equal(a, b) {
                Intersected::Keep(a.clone())
            } else {
                Intersected::Empty
            }
        }
        Family::Unknown => Intersected::Drop,
    }
}

/// For each operator paired with its logical complement on the same key,
/// remove values named on the negative side from the positive side. A clause
/// that empties makes the whole block unsatisfiable (returns false). For the
/// list-valued equality families the absorbed negative clause is dropped;
/// boundary pairs keep both clauses since each is a live constraint.
fn reduce_complement_pairs(conditions: &mut Conditions) -> bool {
    let op_names: Vec<String> = conditions.iter().map(|(op, _)| op.clone()).collect();

    for pos_name in op_names {
        let pos = OpName::parse(&pos_name);
        if pos.base.is_negative() || pos.base.flips_values() {
            continue;
        }
        let neg_base = match pos.base.complement() {
            Some(base) => base,
            None => continue,
        };
        let neg_name = OpName {
            quantifier: pos.quantifier,
            base: neg_base,
            if_exists: pos.if_exists,
        }
        .to_string();

        let shared_keys: Vec<String> = match (conditions.get(&pos_name), conditions.get(&neg_name)) {
            (Some(pos_keys), Some(neg_keys)) => {
                pos_keys.keys().filter(|k| neg_keys.contains_key(*k)).cloned().collect()
            }
            _ => continue,
        };

        let drop_negative = pos.base.family() == Family::Positive;
        for key in shared_keys {
            let neg_values = match conditions.get_values(&neg_name, &key) {
                Some(values) => values.clone(),
                None => continue,
            };
            let pos_values = match conditions.get_values(&pos_name, &key) {
                Some(values) => values.clone(),
                None => continue,
            };

            let remaining: ValueList = pos_values.iter().filter(|v| !neg_values.contains(v)).cloned().collect();
            if remaining.is_empty() {
                return false;
            }
            if remaining.len() != pos_values.len() || drop_negative {
                conditions.insert(&pos_name, &key, remaining);
                if drop_negative {
                    conditions.remove_clause(&neg_name, &key);
                }
            }
        }
    }

    true
}

fn list_union(a: &ValueList, b: &ValueList) -> ValueList {
    let mut out = a.clone();
    for v in b {
        if !out.contains(v) {
            out.push(v.clone());
        }
    }
    out
}

fn list_intersection(a: &ValueList, b: &ValueList) -> ValueList {
    a.iter().filter(|v| b.contains(v)).cloned().collect()
}

fn is_subset(inner: &ValueList, outer: &ValueList) -> bool {
    inner.iter().all(|v| outer.contains(v))
}

fn bools_equal(a: &ValueList, b: &ValueList) -> bool {
    match (single(a), single(b)) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

fn flip_bool(value: &str) -> String {
    if value.eq_ignore_ascii_case("true") {
        "false".to_string()
    } else if value.eq_ignore_ascii_case("false") {
        "true".to_string()
    } else {
        value.to_string()
    }
}

fn single(values: &ValueList) -> Option<&str> {
    if values.len() == 1 {
        Some(values[0].as_str())
    } else {
        None
    }
}

/// Pick the boundary ordered `wanted` relative to the other (Greater = max,
/// Less = min). `None` when either side is not a single comparable value.
fn pick_bound(kind: OrderKind, a: &ValueList, b: &ValueList, wanted: Ordering) -> Option<ValueList> {
    let a_value = single(a)?;
    let b_value = single(b)?;
    let ordering = compare_scalar(kind, a_value, b_value)?;
    if ordering == wanted {
        Some(a.clone())
    } else {
        Some(b.clone())
    }
}

/// Compare single-valued bound lists; `None` when either side is malformed.
fn bound_cmp(kind: OrderKind, a: &ValueList, b: &ValueList) -> Option<Ordering> {
    compare_scalar(kind, single(a)?, single(b)?)
}

pub(crate) fn compare_scalar(kind: OrderKind, a: &str, b: &str) -> Option<Ordering> {
    match kind {
        OrderKind::Numeric => {
            let a = a.trim().parse::<f64>().ok()?;
            let b = b.trim().parse::<f64>().ok()?;
            a.partial_cmp(&b)
        }
        OrderKind::Date => Some(compare_dates(a, b)),
    }
}

/// Dates compare chronologically when both sides parse as RFC 3339 or epoch
/// seconds, lexically otherwise.
fn compare_dates(a: &str, b: &str) -> Ordering {
    match (parse_date(a), parse_date(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    s.parse::<i64>().ok().and_then(|secs| DateTime::from_timestamp(secs, 0))
}

#[cfg(test)]
mod tests {
    use {
        super::{conditions_include, intersect_conditions, invert_conditions, union_conditions},
        crate::Conditions,
        pretty_assertions::assert_eq,
        std::str::FromStr,
    };

    fn conditions(s: &str) -> Conditions {
        Conditions::from_str(s).unwrap()
    }

    #[test_log::test]
    fn test_union_string_positive() {
        let a = conditions(r#"{"StringEquals": {"aws:PrincipalOrgId": ["o-1", "o-2"]}}"#);
        let b = conditions(r#"{"StringEquals": {"aws:PrincipalOrgId": ["o-2", "o-3"]}}"#);
        let merged = union_conditions(&a, &b).unwrap();
        assert_eq!(
            merged.get_values("stringequals", "aws:principalorgid"),
            Some(&vec!["o-1".to_string(), "o-2".to_string(), "o-3".to_string()])
        );
    }

    #[test_log::test]
    fn test_union_string_negative() {
        let a = conditions(r#"{"StringNotEquals": {"k": ["x", "y"]}}"#);
        let b = conditions(r#"{"StringNotEquals": {"k": ["y", "z"]}}"#);
        let merged = union_conditions(&a, &b).unwrap();
        assert_eq!(merged.get_values("stringnotequals", "k"), Some(&vec!["y".to_string()]));

        let c = conditions(r#"{"StringNotEquals": {"k": ["q"]}}"#);
        assert_eq!(union_conditions(&a, &c), None);
    }

    #[test_log::test]
    fn test_union_bounds() {
        let a = conditions(r#"{"NumericLessThan": {"s3:max-keys": ["10"]}}"#);
        let b = conditions(r#"{"NumericLessThan": {"s3:max-keys": ["200"]}}"#);
        let merged = union_conditions(&a, &b).unwrap();
        assert_eq!(merged.get_values("numericlessthan", "s3:max-keys"), Some(&vec!["200".to_string()]));

        let a = conditions(r#"{"NumericGreaterThan": {"k": ["10"]}}"#);
        let b = conditions(r#"{"NumericGreaterThan": {"k": ["200"]}}"#);
        let merged = union_conditions(&a, &b).unwrap();
        assert_eq!(merged.get_values("numericgreaterthan", "k"), Some(&vec!["10".to_string()]));
    }

    #[test_log::test]
    fn test_union_mismatched_shapes() {
        let a = conditions(r#"{"StringEquals": {"k": ["x"]}}"#);
        let b = conditions(r#"{"StringLike": {"k": ["x"]}}"#);
        assert_eq!(union_conditions(&a, &b), None);

        let b = conditions(r#"{"StringEquals": {"other": ["x"]}}"#);
        assert_eq!(union_conditions(&a, &b), None);

        let b = conditions(r#"{"Bool": {"k": ["true"]}}"#);
        assert_eq!(union_conditions(&a, &b), None);
    }

    #[test_log::test]
    fn test_union_bool() {
        let a = conditions(r#"{"Bool": {"aws:SecureTransport": ["true"]}}"#);
        assert_eq!(union_conditions(&a, &a.clone()).unwrap(), a);

        let b = conditions(r#"{"Bool": {"aws:SecureTransport": ["false"]}}"#);
        assert_eq!(union_conditions(&a, &b), None);
    }

    #[test_log::test]
    fn test_union_unknown_operator() {
        let a = conditions(r#"{"BinaryEquals": {"k": ["Zm9v"]}}"#);
        assert_eq!(union_conditions(&a, &a.clone()), None);
    }

    #[test_log::test]
    fn test_intersect_carries_one_sided_keys() {
        let a = conditions(r#"{"StringEquals": {"a": ["1"]}}"#);
        let b = conditions(r#"{"Bool": {"b": ["true"]}}"#);
        let merged = intersect_conditions(&a, &b).unwrap();
        assert_eq!(merged.get_values("stringequals", "a"), Some(&vec!["1".to_string()]));
        assert_eq!(merged.get_values("bool", "b"), Some(&vec!["true".to_string()]));
    }

    #[test_log::test]
    fn test_intersect_positive_empty() {
        let a = conditions(r#"{"StringEquals": {"k": ["x"]}}"#);
        let b = conditions(r#"{"StringEquals": {"k": ["y"]}}"#);
        assert_eq!(intersect_conditions(&a, &b), None);
    }

    #[test_log::test]
    fn test_intersect_bounds() {
        let a = conditions(r#"{"NumericLessThan": {"k": ["10"]}, "NumericGreaterThan": {"k": ["2"]}}"#);
        let b = conditions(r#"{"NumericLessThan": {"k": ["7"]}, "NumericGreaterThan": {"k": ["5"]}}"#);
        let merged = intersect_conditions(&a, &b).unwrap();
        assert_eq!(merged.get_values("numericlessthan", "k"), Some(&vec!["7".to_string()]));
        assert_eq!(merged.get_values("numericgreaterthan", "k"), Some(&vec!["5".to_string()]));
    }

    #[test_log::test]
    fn test_intersect_complement_reduction() {
        // Scenario S4 from the composition pipeline.
        let a = conditions(r#"{"StringEquals": {"aws:PrincipalOrgId": ["o-123", "o-456"]}}"#);
        let b = conditions(r#"{"StringNotEquals": {"aws:PrincipalOrgId": ["o-123"]}}"#);
        let merged = intersect_conditions(&a, &b).unwrap();
        assert_eq!(
            serde_json::to_string(&merged).unwrap(),
            r#"{"stringequals":{"aws:principalorgid":["o-456"]}}"#
        );
    }

    #[test_log::test]
    fn test_intersect_complement_reduction_empty() {
        let a = conditions(r#"{"StringEquals": {"k": ["x"]}}"#);
        let b = conditions(r#"{"StringNotEquals": {"k": ["x"]}}"#);
        assert_eq!(intersect_conditions(&a, &b), None);
    }

    #[test_log::test]
    fn test_intersect_bound_pair_keeps_both() {
        let a = conditions(r#"{"NumericLessThan": {"k": ["10"]}}"#);
        let b = conditions(r#"{"NumericGreaterThanEquals": {"k": ["5"]}}"#);
        let merged = intersect_conditions(&a, &b).unwrap();
        assert_eq!(merged.get_values("numericlessthan", "k"), Some(&vec!["10".to_string()]));
        assert_eq!(merged.get_values("numericgreaterthanequals", "k"), Some(&vec!["5".to_string()]));

        let b = conditions(r#"{"NumericGreaterThanEquals": {"k": ["10"]}}"#);
        assert_eq!(intersect_conditions(&a, &b), None);
    }

    #[test_log::test]
    fn test_intersect_unknown_operator_dropped() {
        let a = conditions(r#"{"BinaryEquals": {"k": ["Zm9v"]}, "StringEquals": {"s": ["1"]}}"#);
        let b = conditions(r#"{"BinaryEquals": {"k": ["YmFy"]}, "StringEquals": {"s": ["1"]}}"#);
        let merged = intersect_conditions(&a, &b).unwrap();
        assert_eq!(merged.get_values("binaryequals", "k"), None);
        assert_eq!(merged.get_values("stringequals", "s"), Some(&vec!["1".to_string()]));
    }

    #[test_log::test]
    fn test_invert_set_quantifier() {
        // Scenario S6.
        let c = conditions(r#"{"ForAllValues:StringEquals": {"aws:TagKeys": ["a", "b"]}}"#);
        let inverted = invert_conditions(&c);
        assert_eq!(
            serde_json::to_string(&inverted).unwrap(),
            r#"{"foranyvalue:stringnotequals":{"aws:tagkeys":["a","b"]}}"#
        );
    }

    #[test_log::test]
    fn test_invert_bool_flips_values() {
        let c = conditions(r#"{"Bool": {"aws:SecureTransport": ["true"]}, "Null": {"aws:TokenIssueTime": ["false"]}}"#);
        let inverted = invert_conditions(&c);
        assert_eq!(inverted.get_values("bool", "aws:securetransport"), Some(&vec!["false".to_string()]));
        assert_eq!(inverted.get_values("null", "aws:tokenissuetime"), Some(&vec!["true".to_string()]));
    }

    #[test_log::test]
    fn test_invert_involution() {
        let c = conditions(
            r#"{
                "ForAllValues:StringEquals": {"aws:TagKeys": ["a"]},
                "NumericLessThan": {"s3:max-keys": ["10"]},
                "DateGreaterThanEquals": {"aws:CurrentTime": ["2024-01-01T00:00:00Z"]},
                "Bool": {"aws:SecureTransport": ["true"]},
                "IpAddress": {"aws:SourceIp": ["203.0.113.0/24"]}
            }"#,
        );
        assert_eq!(invert_conditions(&invert_conditions(&c)), c);
    }

    #[test_log::test]
    fn test_invert_unknown_carried() {
        let c = conditions(r#"{"BinaryEquals": {"k": ["Zm9v"]}}"#);
        assert_eq!(invert_conditions(&c), c);
    }

    #[test_log::test]
    fn test_include_positive() {
        let outer = conditions(r#"{"StringEquals": {"k": ["x", "y"]}}"#);
        let inner = conditions(r#"{"StringEquals": {"k": ["x"]}}"#);
        assert!(conditions_include(Some(&outer), Some(&inner)));
        assert!(!conditions_include(Some(&inner), Some(&outer)));
        assert!(conditions_include(None, Some(&inner)));
        assert!(!conditions_include(Some(&outer), None));
    }

    #[test_log::test]
    fn test_include_negative_and_bounds() {
        let outer = conditions(r#"{"StringNotEquals": {"k": ["x"]}}"#);
        let inner = conditions(r#"{"StringNotEquals": {"k": ["x", "y"]}}"#);
        assert!(conditions_include(Some(&outer), Some(&inner)));
        assert!(!conditions_include(Some(&inner), Some(&outer)));

        let outer = conditions(r#"{"NumericLessThan": {"k": ["10"]}}"#);
        let inner = conditions(r#"{"NumericLessThan": {"k": ["5"]}}"#);
        assert!(conditions_include(Some(&outer), Some(&inner)));
        assert!(!conditions_include(Some(&inner), Some(&outer)));

        let outer = conditions(r#"{"DateGreaterThan": {"k": ["2024-01-01T00:00:00Z"]}}"#);
        let inner = conditions(r#"{"DateGreaterThan": {"k": ["2025-06-01T00:00:00Z"]}}"#);
        assert!(conditions_include(Some(&outer), Some(&inner)));
        assert!(!conditions_include(Some(&inner), Some(&outer)));
    }

    #[test_log::test]
    fn test_include_epoch_dates() {
        let outer = conditions(r#"{"DateLessThan": {"k": ["2000000000"]}}"#);
        let inner = conditions(r#"{"DateLessThan": {"k": ["2024-01-01T00:00:00Z"]}}"#);
        assert!(conditions_include(Some(&outer), Some(&inner)));
    }
}
