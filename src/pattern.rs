//! AWS wildcard pattern matching.
//!
//! Patterns are case-sensitive strings in which `*` matches any run of
//! characters and `?` matches exactly one. Everything else matches literally.

use regex::{Regex, RegexBuilder};

/// Build an anchored regex for an AWS wildcard pattern. Regex metacharacters
/// in the pattern are escaped before the wildcards are substituted.
pub(crate) fn regex_from_pattern(pattern: &str) -> Regex {
    let mut expr = String::with_capacity(2 + pattern.len());
    expr.push('^');

    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            _ => expr.push_str(&regex::escape(&String::from(c))),
        }
    }
    expr.push('$');

    // The expression is fully escaped above; compilation cannot fail.
    RegexBuilder::new(&expr).build().expect("escaped wildcard regex")
}

/// Test whether a concrete string is matched by a wildcard pattern.
pub fn matches(pattern: &str, value: &str) -> bool {
    if !pattern.contains('*') && !pattern.contains('?') {
        return pattern == value;
    }

    let is_match = regex_from_pattern(pattern).is_match(value);
    log::trace!("pattern={:?} value={:?} is_match={}", pattern, value, is_match);
    is_match
}

/// Test whether pattern `outer` covers pattern `inner`: every string matched
/// by `inner` is also matched by `outer`.
///
/// This is approximated by matching `outer` against the literal text of
/// `inner`. The approximation is exact when `inner` has no wildcards and a
/// sound over-approximation otherwise; callers rely only on the
/// literal-covers-wildcard direction.
pub fn covers(outer: &str, inner: &str) -> bool {
    outer == inner || matches(outer, inner)
}

/// Test whether any pattern in `outers` covers `inner`.
pub fn any_covers(outers: &[String], inner: &str) -> bool {
    outers.iter().any(|outer| covers(outer, inner))
}
