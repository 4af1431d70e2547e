//! Evaluation of condition blocks against a resolved request context.

use {
    super::{
        algebra::compare_scalar,
        op::{BaseOp, OpName, OrderKind, SetQuantifier},
        Conditions,
    },
    crate::pattern,
    std::{cmp::Ordering, collections::BTreeMap},
};

/// Context keys (lowercased) to the values supplied with a request.
pub type ContextMap = BTreeMap<String, Vec<String>>;

/// Build a context map from raw key/value pairs, lowercasing keys.
pub fn context_from_pairs<I, K, V>(pairs: I) -> ContextMap
where
    I: IntoIterator<Item = (K, Vec<V>)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut map = ContextMap::new();
    for (key, values) in pairs {
        map.insert(key.as_ref().to_lowercase(), values.into_iter().map(Into::into).collect());
    }
    map
}

/// Whether every clause of the condition block is satisfied by the context.
pub fn conditions_satisfied(conditions: &Conditions, context: &ContextMap) -> bool {
    for (op, key, allowed) in conditions.clauses() {
        let parsed = OpName::parse(op);
        let present = context.get(key).filter(|values| !values.is_empty());

        if parsed.base == BaseOp::Null {
            let want_absent = allowed.iter().any(|v| v.eq_ignore_ascii_case("true"));
            if want_absent != present.is_none() {
                return false;
            }
            continue;
        }

        let values = match present {
            Some(values) => values,
            None => {
                if parsed.if_exists {
                    continue;
                }
                return false;
            }
        };

        let ok = match parsed.quantifier {
            Some(SetQuantifier::ForAllValues) => values.iter().all(|v| value_matches(&parsed.base, allowed, v)),
            // ForAnyValue, and the common single-valued-key case.
            _ => values.iter().any(|v| value_matches(&parsed.base, allowed, v)),
        };
        if !ok {
            log::trace!("condition {}/{} not satisfied by {:?}", op, key, values);
            return false;
        }
    }

    true
}

fn value_matches(base: &BaseOp, allowed: &[String], value: &str) -> bool {
    match base {
        // IP conditions compare as opaque strings; CIDR containment is not
        // modeled.
        BaseOp::StringEquals | BaseOp::IpAddress => allowed.iter().any(|a| a == value),
        BaseOp::StringNotEquals | BaseOp::NotIpAddress => !allowed.iter().any(|a| a == value),
        BaseOp::StringLike | BaseOp::ArnEquals | BaseOp::ArnLike => {
            allowed.iter().any(|a| pattern::matches(a, value))
        }
        BaseOp::StringNotLike | BaseOp::ArnNotEquals | BaseOp::ArnNotLike => {
            !allowed.iter().any(|a| pattern::matches(a, value))
        }
        BaseOp::NumericEquals => scalar_any(OrderKind::Numeric, allowed, value, |o| o == Ordering::Equal),
        BaseOp::NumericNotEquals => !scalar_any(OrderKind::Numeric, allowed, value, |o| o == Ordering::Equal),
        BaseOp::NumericLessThan => scalar_any(OrderKind::Numeric, allowed, value, |o| o == Ordering::Less),
        BaseOp::NumericLessThanEquals => {
            scalar_any(OrderKind::Numeric, allowed, value, |o| o != Ordering::Greater)
        }
        BaseOp::NumericGreaterThan => scalar_any(OrderKind::Numeric, allowed, value, |o| o == Ordering::Greater),
        BaseOp::NumericGreaterThanEquals => {
            scalar_any(OrderKind::Numeric, allowed, value, |o| o != Ordering::Less)
        }
        BaseOp::DateEquals => scalar_any(OrderKind::Date, allowed, value, |o| o == Ordering::Equal),
        BaseOp::DateNotEquals => !scalar_any(OrderKind::Date, allowed, value, |o| o == Ordering::Equal),
        BaseOp::DateLessThan => scalar_any(OrderKind::Date, allowed, value, |o| o == Ordering::Less),
        BaseOp::DateLessThanEquals => scalar_any(OrderKind::Date, allowed, value, |o| o != Ordering::Greater),
        BaseOp::DateGreaterThan => scalar_any(OrderKind::Date, allowed, value, |o| o == Ordering::Greater),
        BaseOp::DateGreaterThanEquals => scalar_any(OrderKind::Date, allowed, value, |o| o != Ordering::Less),
        BaseOp::Bool => allowed.len() == 1 && allowed[0].eq_ignore_ascii_case(value),
        BaseOp::Null => false,
        BaseOp::Unknown(name) => {
            log::debug!("unknown condition operator {} treated as unsatisfied", name);
            false
        }
    }
}

fn scalar_any<F: Fn(Ordering) -> bool>(kind: OrderKind, allowed: &[String], value: &str, accept: F) -> bool {
    allowed.iter().any(|a| compare_scalar(kind, value, a).map_or(false, &accept))
}

#[cfg(test)]
mod tests {
    use {
        super::{conditions_satisfied, context_from_pairs, ContextMap},
        crate::Conditions,
        pretty_assertions::assert_eq,
        std::str::FromStr,
    };

    fn conditions(s: &str) -> Conditions {
        Conditions::from_str(s).unwrap()
    }

    fn context(pairs: &[(&str, &[&str])]) -> ContextMap {
        context_from_pairs(pairs.iter().map(|(k, vs)| (*k, vs.iter().map(|v| v.to_string()).collect())))
    }

    #[test_log::test]
    fn test_string_equals() {
        let c = conditions(r#"{"StringEquals": {"aws:PrincipalAccount": ["123456789012"]}}"#);
        assert!(conditions_satisfied(&c, &context(&[("aws:PrincipalAccount", &["123456789012"])])));
        assert!(!conditions_satisfied(&c, &context(&[("aws:PrincipalAccount", &["999999999999"])])));
        assert!(!conditions_satisfied(&c, &context(&[])));
    }

    #[test_log::test]
    fn test_if_exists() {
        let c = conditions(r#"{"StringEqualsIfExists": {"aws:RequestTag/team": ["blue"]}}"#);
        assert!(conditions_satisfied(&c, &context(&[])));
        assert!(conditions_satisfied(&c, &context(&[("aws:RequestTag/team", &["blue"])])));
        assert!(!conditions_satisfied(&c, &context(&[("aws:RequestTag/team", &["red"])])));
    }

    #[test_log::test]
    fn test_arn_like() {
        let c = conditions(r#"{"ArnLike": {"aws:PrincipalArn": ["arn:aws:iam::123456789012:role/app-*"]}}"#);
        assert!(conditions_satisfied(
            &c,
            &context(&[("aws:PrincipalArn", &["arn:aws:iam::123456789012:role/app-web"])])
        ));
        assert!(!conditions_satisfied(
            &c,
            &context(&[("aws:PrincipalArn", &["arn:aws:iam::123456789012:role/admin"])])
        ));
    }

    #[test_log::test]
    fn test_numeric_and_date() {
        let c = conditions(r#"{"NumericLessThanEquals": {"s3:max-keys": ["100"]}}"#);
        assert!(conditions_satisfied(&c, &context(&[("s3:max-keys", &["42"])])));
        assert!(!conditions_satisfied(&c, &context(&[("s3:max-keys", &["101"])])));

        let c = conditions(r#"{"DateGreaterThan": {"aws:CurrentTime": ["2024-01-01T00:00:00Z"]}}"#);
        assert!(conditions_satisfied(&c, &context(&[("aws:CurrentTime", &["2024-06-01T00:00:00Z"])])));
        assert!(!conditions_satisfied(&c, &context(&[("aws:CurrentTime", &["2023-06-01T00:00:00Z"])])));
    }

    #[test_log::test]
    fn test_bool_and_null() {
        let c = conditions(r#"{"Bool": {"aws:SecureTransport": ["true"]}}"#);
        assert!(conditions_satisfied(&c, &context(&[("aws:SecureTransport", &["true"])])));
        assert!(!conditions_satisfied(&c, &context(&[("aws:SecureTransport", &["false"])])));

        let c = conditions(r#"{"Null": {"aws:TokenIssueTime": ["true"]}}"#);
        assert!(conditions_satisfied(&c, &context(&[])));
        assert!(!conditions_satisfied(&c, &context(&[("aws:TokenIssueTime", &["2024-01-01T00:00:00Z"])])));
    }

    #[test_log::test]
    fn test_for_all_values() {
        let c = conditions(r#"{"ForAllValues:StringEquals": {"aws:TagKeys": ["env", "team"]}}"#);
        assert!(conditions_satisfied(&c, &context(&[("aws:TagKeys", &["env"])])));
        assert!(conditions_satisfied(&c, &context(&[("aws:TagKeys", &["env", "team"])])));
        assert!(!conditions_satisfied(&c, &context(&[("aws:TagKeys", &["env", "owner"])])));
    }

    #[test_log::test]
    fn test_unknown_operator_unsatisfied() {
        let c = conditions(r#"{"BinaryEquals": {"k": ["Zm9v"]}}"#);
        assert_eq!(conditions_satisfied(&c, &context(&[("k", &["Zm9v"])])), false);
    }
}
