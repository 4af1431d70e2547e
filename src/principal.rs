//! Principal references and the applicability of statements to a principal.

use {
    crate::{
        condition::eval::{conditions_satisfied, ContextMap},
        pattern,
        policy::{PrincipalSpec, Statement},
        Conditions, LensError,
    },
    lazy_static::lazy_static,
    regex::Regex,
    scratchstack_arn::Arn,
    std::str::FromStr,
};

lazy_static! {
    /// AWS 12-digit account id regular expression.
    static ref ACCOUNT_ID_REGEX: Regex = Regex::new("^[0-9]{12}$").unwrap();
}

/// Context keys that identify the requesting principal and can be evaluated
/// against the snapshot without a live request.
const IDENTIFYING_KEYS: &[&str] = &["aws:principalarn", "aws:principalaccount"];

/// A parsed principal ARN.
///
/// Assumed-role session ARNs are canonicalized to their IAM role ARN so that
/// resource policies naming the role match sessions of it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PrincipalRef {
    arn: String,
    canonical_arn: String,
    partition: String,
    account_id: String,
}

impl PrincipalRef {
    pub fn parse(arn: &str) -> Result<Self, LensError> {
        let parsed = Arn::from_str(arn).map_err(|_| LensError::InvalidPrincipal(arn.to_string()))?;
        let account_id = parsed.account_id().to_string();
        if account_id.is_empty() {
            return Err(LensError::InvalidPrincipal(arn.to_string()));
        }

        let canonical_arn = if parsed.service() == "sts" && parsed.resource().starts_with("assumed-role/") {
            let mut parts = parsed.resource().splitn(3, '/');
            parts.next();
            match parts.next() {
                Some(role_name) => {
                    format!("arn:{}:iam::{}:role/{}", parsed.partition(), account_id, role_name)
                }
                None => arn.to_string(),
            }
        } else {
            arn.to_string()
        };

        Ok(Self {
            arn: arn.to_string(),
            canonical_arn,
            partition: parsed.partition().to_string(),
            account_id,
        })
    }

    #[inline]
    pub fn arn(&self) -> &str {
        &self.arn
    }

    /// The role ARN for an assumed-role session, otherwise the ARN itself.
    #[inline]
    pub fn canonical_arn(&self) -> &str {
        &self.canonical_arn
    }

    #[inline]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    #[inline]
    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn root_arn(&self) -> String {
        format!("arn:{}:iam::{}:root", self.partition, self.account_id)
    }

    pub fn is_root(&self) -> bool {
        self.arn == self.root_arn()
    }
}

/// How a statement reaches a principal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PrincipalMatchKind {
    /// The statement names the principal (or `"*"` with identifying
    /// conditions it satisfies).
    PrincipalMatch,
    /// The statement grants at account granularity; identity confirmation is
    /// still required.
    AccountMatch,
    NoMatch,
}

impl PrincipalMatchKind {
    pub fn matches(self) -> bool {
        !matches!(self, Self::NoMatch)
    }

    fn best(self, other: Self) -> Self {
        match (self, other) {
            (Self::PrincipalMatch, _) | (_, Self::PrincipalMatch) => Self::PrincipalMatch,
            (Self::AccountMatch, _) | (_, Self::AccountMatch) => Self::AccountMatch,
            _ => Self::NoMatch,
        }
    }
}

/// Classify how a Principal element reaches the given principal.
pub fn classify_principal(spec: &PrincipalSpec, principal: &PrincipalRef) -> PrincipalMatchKind {
    let map = match spec {
        PrincipalSpec::Any => return PrincipalMatchKind::PrincipalMatch,
        PrincipalSpec::Specified(map) => map,
    };

    let mut kind = PrincipalMatchKind::NoMatch;
    if let Some(aws) = &map.aws {
        for entry in aws.iter() {
            kind = kind.best(classify_aws_entry(entry, principal));
            if kind == PrincipalMatchKind::PrincipalMatch {
                break;
            }
        }
    }
    // Service, Federated and CanonicalUser principals never match an IAM
    // principal ARN.
    kind
}

fn classify_aws_entry(entry: &str, principal: &PrincipalRef) -> PrincipalMatchKind {
    if entry == "*" {
        return PrincipalMatchKind::PrincipalMatch;
    }

    let account_grant = if ACCOUNT_ID_REGEX.is_match(entry) {
        entry == principal.account_id()
    } else {
        entry == principal.root_arn()
    };
    if account_grant {
        return if principal.is_root() {
            PrincipalMatchKind::PrincipalMatch
        } else {
            PrincipalMatchKind::AccountMatch
        };
    }

    if entry == principal.arn() || entry == principal.canonical_arn() {
        return PrincipalMatchKind::PrincipalMatch;
    }
    if pattern::matches(entry, principal.arn()) || pattern::matches(entry, principal.canonical_arn()) {
        return PrincipalMatchKind::PrincipalMatch;
    }

    PrincipalMatchKind::NoMatch
}

/// Classify how a whole statement reaches a principal, combining the
/// Principal/NotPrincipal element with principal-identifying conditions.
///
/// Statements without a Principal element (identity and organization
/// policies) start as a PrincipalMatch and may be ruled out by identifying
/// conditions.
pub fn statement_applicability(statement: &Statement, principal: &PrincipalRef) -> PrincipalMatchKind {
    let kind = if let Some(not_principal) = statement.not_principal() {
        if classify_principal(not_principal, principal).matches() {
            PrincipalMatchKind::NoMatch
        } else {
            PrincipalMatchKind::PrincipalMatch
        }
    } else if let Some(spec) = statement.principal() {
        classify_principal(spec, principal)
    } else {
        PrincipalMatchKind::PrincipalMatch
    };

    if kind.matches() && !identifying_conditions_satisfied(statement.condition(), principal) {
        return PrincipalMatchKind::NoMatch;
    }
    kind
}

/// Evaluate the principal-identifying clauses of a condition block against
/// the principal. Clauses on other context keys are ignored: they cannot be
/// decided from the snapshot.
fn identifying_conditions_satisfied(conditions: Option<&Conditions>, principal: &PrincipalRef) -> bool {
    let conditions = match conditions {
        Some(conditions) => conditions,
        None => return true,
    };

    let mut identifying = Conditions::new();
    for (op, key, values) in conditions.clauses() {
        if IDENTIFYING_KEYS.contains(&key) {
            identifying.insert(op, key, values.clone());
        }
    }
    if identifying.is_empty() {
        return true;
    }

    let mut context = ContextMap::new();
    let mut arns = vec![principal.arn().to_string()];
    if principal.canonical_arn() != principal.arn() {
        arns.push(principal.canonical_arn().to_string());
    }
    context.insert("aws:principalarn".to_string(), arns);
    context.insert("aws:principalaccount".to_string(), vec![principal.account_id().to_string()]);

    conditions_satisfied(&identifying, &context)
}

#[cfg(test)]
mod tests {
    use {
        super::{statement_applicability, PrincipalMatchKind, PrincipalRef},
        crate::policy::Statement,
        pretty_assertions::assert_eq,
        std::str::FromStr,
    };

    fn principal(arn: &str) -> PrincipalRef {
        PrincipalRef::parse(arn).unwrap()
    }

    fn statement(s: &str) -> Statement {
        Statement::from_str(s).unwrap()
    }

    #[test_log::test]
    fn test_parse_user() {
        let p = principal("arn:aws:iam::123456789012:user/alice");
        assert_eq!(p.account_id(), "123456789012");
        assert_eq!(p.canonical_arn(), p.arn());
        assert_eq!(p.root_arn(), "arn:aws:iam::123456789012:root");
        assert!(!p.is_root());
        assert!(principal("arn:aws:iam::123456789012:root").is_root());
    }

    #[test_log::test]
    fn test_parse_assumed_role_session() {
        let p = principal("arn:aws:sts::123456789012:assumed-role/deploy/ci-run");
        assert_eq!(p.canonical_arn(), "arn:aws:iam::123456789012:role/deploy");
    }

    #[test_log::test]
    fn test_parse_invalid() {
        assert!(PrincipalRef::parse("not-an-arn").is_err());
    }

    #[test_log::test]
    fn test_direct_principal_match() {
        let p = principal("arn:aws:iam::123456789012:user/alice");
        let s = statement(
            r#"{"Effect": "Allow", "Action": "s3:GetObject",
               "Principal": {"AWS": "arn:aws:iam::123456789012:user/alice"}}"#,
        );
        assert_eq!(statement_applicability(&s, &p), PrincipalMatchKind::PrincipalMatch);

        let s = statement(
            r#"{"Effect": "Allow", "Action": "s3:GetObject",
               "Principal": {"AWS": "arn:aws:iam::123456789012:user/bob"}}"#,
        );
        assert_eq!(statement_applicability(&s, &p), PrincipalMatchKind::NoMatch);
    }

    #[test_log::test]
    fn test_account_match() {
        let p = principal("arn:aws:iam::123456789012:user/alice");
        let s = statement(
            r#"{"Effect": "Allow", "Action": "s3:GetObject", "Principal": {"AWS": "123456789012"}}"#,
        );
        assert_eq!(statement_applicability(&s, &p), PrincipalMatchKind::AccountMatch);

        let s = statement(
            r#"{"Effect": "Allow", "Action": "s3:GetObject",
               "Principal": {"AWS": "arn:aws:iam::123456789012:root"}}"#,
        );
        assert_eq!(statement_applicability(&s, &p), PrincipalMatchKind::AccountMatch);

        // The root principal itself matches directly.
        let root = principal("arn:aws:iam::123456789012:root");
        assert_eq!(statement_applicability(&s, &root), PrincipalMatchKind::PrincipalMatch);

        let s = statement(
            r#"{"Effect": "Allow", "Action": "s3:GetObject", "Principal": {"AWS": "999999999999"}}"#,
        );
        assert_eq!(statement_applicability(&s, &p), PrincipalMatchKind::NoMatch);
    }

    #[test_log::test]
    fn test_role_session_matches_role_grant() {
        let p = principal("arn:aws:sts::123456789012:assumed-role/deploy/ci-run");
        let s = statement(
            r#"{"Effect": "Allow", "Action": "s3:GetObject",
               "Principal": {"AWS": "arn:aws:iam::123456789012:role/deploy"}}"#,
        );
        assert_eq!(statement_applicability(&s, &p), PrincipalMatchKind::PrincipalMatch);
    }

    #[test_log::test]
    fn test_wildcard_with_identifying_conditions() {
        let p = principal("arn:aws:iam::123456789012:role/app-web");
        let s = statement(
            r#"{"Effect": "Deny", "Action": "*", "Principal": "*",
               "Condition": {"ArnLike": {"aws:PrincipalArn": "arn:aws:iam::123456789012:role/app-*"}}}"#,
        );
        assert_eq!(statement_applicability(&s, &p), PrincipalMatchKind::PrincipalMatch);

        let other = principal("arn:aws:iam::123456789012:role/admin");
        assert_eq!(statement_applicability(&s, &other), PrincipalMatchKind::NoMatch);
    }

    #[test_log::test]
    fn test_identifying_account_condition() {
        let p = principal("arn:aws:iam::123456789012:user/alice");
        let s = statement(
            r#"{"Effect": "Deny", "Action": "*",
               "Condition": {"StringNotEquals": {"aws:PrincipalAccount": "123456789012"}}}"#,
        );
        // The deny carves out the principal's own account.
        assert_eq!(statement_applicability(&s, &p), PrincipalMatchKind::NoMatch);

        let foreign = principal("arn:aws:iam::999999999999:user/eve");
        assert_eq!(statement_applicability(&s, &foreign), PrincipalMatchKind::PrincipalMatch);
    }

    #[test_log::test]
    fn test_not_principal() {
        let p = principal("arn:aws:iam::123456789012:user/alice");
        let s = statement(
            r#"{"Effect": "Deny", "Action": "*",
               "NotPrincipal": {"AWS": "arn:aws:iam::123456789012:user/alice"}}"#,
        );
        assert_eq!(statement_applicability(&s, &p), PrincipalMatchKind::NoMatch);

        let bob = principal("arn:aws:iam::123456789012:user/bob");
        assert_eq!(statement_applicability(&s, &bob), PrincipalMatchKind::PrincipalMatch);
    }

    #[test_log::test]
    fn test_statement_without_principal_applies() {
        let p = principal("arn:aws:iam::123456789012:user/alice");
        let s = statement(r#"{"Effect": "Deny", "Action": "s3:*", "Resource": "*"}"#);
        assert_eq!(statement_applicability(&s, &p), PrincipalMatchKind::PrincipalMatch);
    }
}
