//! The parsed form of IAM policy documents held in the snapshot.

use {
    crate::{display_json, from_str_json, serutil::JsonList, Conditions, Effect, LensError},
    derive_builder::Builder,
    serde::{
        de::{self, value::MapAccessDeserializer, Deserializer, MapAccess, Unexpected, Visitor},
        Deserialize, Serialize, Serializer,
    },
    std::fmt::{Formatter, Result as FmtResult},
};

/// A single policy statement.
///
/// Mutually exclusive pairs (Action/NotAction, Resource/NotResource,
/// Principal/NotPrincipal) are checked by [Statement::validate], which the
/// loader runs on every document read from the store.
#[derive(Builder, Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[builder(build_fn(validate = "Self::check"))]
#[serde(deny_unknown_fields)]
pub struct Statement {
    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "Sid", skip_serializing_if = "Option::is_none")]
    sid: Option<String>,

    #[serde(rename = "Effect")]
    effect: Effect,

    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "Action", skip_serializing_if = "Option::is_none")]
    action: Option<JsonList<String>>,

    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "NotAction", skip_serializing_if = "Option::is_none")]
    not_action: Option<JsonList<String>>,

    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "Resource", skip_serializing_if = "Option::is_none")]
    resource: Option<JsonList<String>>,

    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "NotResource", skip_serializing_if = "Option::is_none")]
    not_resource: Option<JsonList<String>>,

    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "Principal", skip_serializing_if = "Option::is_none")]
    principal: Option<PrincipalSpec>,

    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "NotPrincipal", skip_serializing_if = "Option::is_none")]
    not_principal: Option<PrincipalSpec>,

    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "Condition", skip_serializing_if = "Option::is_none")]
    condition: Option<Conditions>,
}

display_json!(Statement);
from_str_json!(Statement);

impl Statement {
    /// A builder for constructing statements in code. Mutual-exclusivity
    /// rules are enforced at `build` time.
    ///
    /// # Examples
    ///
    /// Basic usage:
    ///
    /// ```
    /// # use iam_lens::{policy::Statement, Effect};
    ///
    /// let statement = Statement::builder()
    ///     .effect(Effect::Allow)
    ///     .action("s3:GetObject".to_string())
    ///     .resource(vec!["arn:aws:s3:::my-bucket/*".to_string()])
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(statement.effect(), Effect::Allow);
    /// assert_eq!(statement.action().unwrap().to_vec(), vec!["s3:GetObject"]);
    /// ```
    ///
    /// Conflicting elements fail the build:
    ///
    /// ```
    /// # use iam_lens::{policy::Statement, Effect};
    ///
    /// let e = Statement::builder()
    ///     .effect(Effect::Deny)
    ///     .action("s3:GetObject".to_string())
    ///     .not_action("s3:PutObject".to_string())
    ///     .build()
    ///     .unwrap_err();
    ///
    /// assert_eq!(e.to_string(), "Action and NotAction cannot both be set");
    /// ```
    pub fn builder() -> StatementBuilder {
        StatementBuilder::default()
    }

    #[inline]
    pub fn sid(&self) -> Option<&str> {
        self.sid.as_deref()
    }

    #[inline]
    pub fn effect(&self) -> Effect {
        self.effect
    }

    #[inline]
    pub fn action(&self) -> Option<&JsonList<String>> {
        self.action.as_ref()
    }

    #[inline]
    pub fn not_action(&self) -> Option<&JsonList<String>> {
        self.not_action.as_ref()
    }

    #[inline]
    pub fn resource(&self) -> Option<&JsonList<String>> {
        self.resource.as_ref()
    }

    #[inline]
    pub fn not_resource(&self) -> Option<&JsonList<String>> {
        self.not_resource.as_ref()
    }

    #[inline]
    pub fn principal(&self) -> Option<&PrincipalSpec> {
        self.principal.as_ref()
    }

    #[inline]
    pub fn not_principal(&self) -> Option<&PrincipalSpec> {
        self.not_principal.as_ref()
    }

    #[inline]
    pub fn condition(&self) -> Option<&Conditions> {
        self.condition.as_ref()
    }

    pub fn validate(&self) -> Result<(), LensError> {
        if self.action.is_some() && self.not_action.is_some() {
            return Err(LensError::InvalidStatement("Action and NotAction cannot both be set".to_string()));
        }
        if self.action.is_none() && self.not_action.is_none() {
            return Err(LensError::InvalidStatement("Either Action or NotAction must be set".to_string()));
        }
        if self.resource.is_some() && self.not_resource.is_some() {
            return Err(LensError::InvalidStatement("Resource and NotResource cannot both be set".to_string()));
        }
        if self.principal.is_some() && self.not_principal.is_some() {
            return Err(LensError::InvalidStatement("Principal and NotPrincipal cannot both be set".to_string()));
        }
        Ok(())
    }
}

impl StatementBuilder {
    fn check(&self) -> Result<(), String> {
        let mut errors = Vec::with_capacity(4);

        if self.effect.is_none() {
            errors.push("Effect must be set");
        }
        if let (Some(Some(_)), Some(Some(_))) = (&self.action, &self.not_action) {
            errors.push("Action and NotAction cannot both be set");
        }
        if let (Some(Some(_)), Some(Some(_))) = (&self.resource, &self.not_resource) {
            errors.push("Resource and NotResource cannot both be set");
        }
        if let (Some(Some(_)), Some(Some(_))) = (&self.principal, &self.not_principal) {
            errors.push("Principal and NotPrincipal cannot both be set");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }
}

/// A parsed IAM policy document.
#[derive(Builder, Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDocument {
    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "Version", skip_serializing_if = "Option::is_none")]
    version: Option<String>,

    #[builder(setter(into, strip_option), default)]
    #[serde(rename = "Id", skip_serializing_if = "Option::is_none")]
    id: Option<String>,

    #[builder(setter(into))]
    #[serde(rename = "Statement")]
    statement: JsonList<Statement>,
}

display_json!(PolicyDocument);
from_str_json!(PolicyDocument);

impl PolicyDocument {
    /// A builder for constructing documents in code.
    ///
    /// # Examples
    ///
    /// Basic usage:
    ///
    /// ```
    /// # use iam_lens::{policy::Statement, Effect, PolicyDocument};
    ///
    /// let statement = Statement::builder()
    ///     .effect(Effect::Allow)
    ///     .action("kms:Decrypt".to_string())
    ///     .resource("*".to_string())
    ///     .build()
    ///     .unwrap();
    /// let policy = PolicyDocument::builder()
    ///     .version(PolicyDocument::CURRENT_VERSION)
    ///     .statement(statement)
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(policy.version(), Some("2012-10-17"));
    /// assert_eq!(policy.statements().len(), 1);
    /// ```
    pub fn builder() -> PolicyDocumentBuilder {
        PolicyDocumentBuilder::default()
    }

    /// The policy language version emitted for composed documents.
    pub const CURRENT_VERSION: &'static str = "2012-10-17";

    #[inline]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    #[inline]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn statements(&self) -> Vec<&Statement> {
        self.statement.to_vec()
    }

    /// Decode a document from a raw store value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, LensError> {
        let doc: Self = serde_json::from_value(value)?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn validate(&self) -> Result<(), LensError> {
        for statement in self.statement.iter() {
            statement.validate()?;
        }
        Ok(())
    }
}

/// The Principal or NotPrincipal element of a statement.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PrincipalSpec {
    /// The `"*"` form: any principal.
    Any,
    Specified(PrincipalMap),
}

impl PrincipalSpec {
    #[inline]
    pub fn specified(&self) -> Option<&PrincipalMap> {
        match self {
            Self::Any => None,
            Self::Specified(map) => Some(map),
        }
    }
}

struct PrincipalSpecVisitor;

impl<'de> Visitor<'de> for PrincipalSpecVisitor {
    type Value = PrincipalSpec;

    fn expecting(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "map of principal types to values or \"*\"")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        if v == "*" {
            Ok(PrincipalSpec::Any)
        } else {
            Err(E::invalid_value(Unexpected::Str(v), &self))
        }
    }

    fn visit_map<A: MapAccess<'de>>(self, access: A) -> Result<Self::Value, A::Error> {
        let map = PrincipalMap::deserialize(MapAccessDeserializer::new(access))?;
        Ok(PrincipalSpec::Specified(map))
    }
}

impl<'de> Deserialize<'de> for PrincipalSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PrincipalSpecVisitor)
    }
}

impl Serialize for PrincipalSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Any => serializer.serialize_str("*"),
            Self::Specified(map) => map.serialize(serializer),
        }
    }
}

/// The specified-principal form: principal types to identifiers.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrincipalMap {
    #[serde(rename = "AWS", skip_serializing_if = "Option::is_none")]
    pub aws: Option<JsonList<String>>,

    #[serde(rename = "Service", skip_serializing_if = "Option::is_none")]
    pub service: Option<JsonList<String>>,

    #[serde(rename = "Federated", skip_serializing_if = "Option::is_none")]
    pub federated: Option<JsonList<String>>,

    #[serde(rename = "CanonicalUser", skip_serializing_if = "Option::is_none")]
    pub canonical_user: Option<JsonList<String>>,
}

#[cfg(test)]
mod tests {
    use {
        super::{PolicyDocument, PrincipalSpec, Statement},
        crate::Effect,
        indoc::indoc,
        pretty_assertions::assert_eq,
        std::str::FromStr,
    };

    #[test_log::test]
    fn test_typical_policy_import() {
        let policy_str = indoc! {r#"
        {
            "Version": "2012-10-17",
            "Statement": [
                {
                    "Sid": "ReadObjects",
                    "Effect": "Allow",
                    "Action": [
                        "s3:GetObject",
                        "s3:ListBucket"
                    ],
                    "Resource": "arn:aws:s3:::my-bucket/*",
                    "Condition": {
                        "StringEquals": {
                            "aws:PrincipalOrgId": "o-123"
                        }
                    }
                },
                {
                    "Effect": "Deny",
                    "Action": "*",
                    "Resource": [
                        "arn:aws:s3:::audit",
                        "arn:aws:s3:::audit/*"
                    ],
                    "Principal": "*"
                }
            ]
        }"#};
        let policy = PolicyDocument::from_str(policy_str).unwrap();
        policy.validate().unwrap();

        assert_eq!(policy.version(), Some("2012-10-17"));
        let statements = policy.statements();
        assert_eq!(statements.len(), 2);

        assert_eq!(statements[0].sid(), Some("ReadObjects"));
        assert_eq!(statements[0].effect(), Effect::Allow);
        assert_eq!(statements[0].action().unwrap().to_vec(), vec!["s3:GetObject", "s3:ListBucket"]);
        assert_eq!(
            statements[0].condition().unwrap().get_values("stringequals", "aws:principalorgid"),
            Some(&vec!["o-123".to_string()])
        );

        assert_eq!(statements[1].effect(), Effect::Deny);
        assert_eq!(statements[1].principal(), Some(&PrincipalSpec::Any));
    }

    #[test_log::test]
    fn test_single_statement_map() {
        let policy = PolicyDocument::from_str(
            r#"{"Statement": {"Effect": "Allow", "Action": "kms:Decrypt", "Resource": "*"}}"#,
        )
        .unwrap();
        assert_eq!(policy.statements().len(), 1);
        assert_eq!(policy.version(), None);
    }

    #[test_log::test]
    fn test_conflicting_blocks() {
        let statement = Statement::from_str(
            r#"{"Effect": "Allow", "Action": "s3:GetObject", "NotAction": "s3:PutObject", "Resource": "*"}"#,
        )
        .unwrap();
        assert_eq!(
            statement.validate().unwrap_err().to_string(),
            "Invalid statement: Action and NotAction cannot both be set"
        );

        let statement = Statement::from_str(
            r#"{"Effect": "Allow", "Action": "s3:GetObject", "Resource": "*", "NotResource": "*"}"#,
        )
        .unwrap();
        assert_eq!(
            statement.validate().unwrap_err().to_string(),
            "Invalid statement: Resource and NotResource cannot both be set"
        );

        let statement = Statement::from_str(r#"{"Effect": "Allow", "Resource": "*"}"#).unwrap();
        assert_eq!(
            statement.validate().unwrap_err().to_string(),
            "Invalid statement: Either Action or NotAction must be set"
        );
    }

    #[test_log::test]
    fn test_builder() {
        let statement = Statement::builder()
            .effect(Effect::Allow)
            .action("s3:GetObject".to_string())
            .resource(vec!["arn:aws:s3:::my-bucket/*".to_string()])
            .build()
            .unwrap();
        assert_eq!(statement.effect(), Effect::Allow);

        let e = Statement::builder()
            .effect(Effect::Allow)
            .action("s3:GetObject".to_string())
            .not_action("s3:PutObject".to_string())
            .build()
            .unwrap_err();
        assert_eq!(e.to_string(), "Action and NotAction cannot both be set");

        let policy = PolicyDocument::builder()
            .version(PolicyDocument::CURRENT_VERSION)
            .statement(statement)
            .build()
            .unwrap();
        assert_eq!(policy.statements().len(), 1);
    }

    #[test_log::test]
    fn test_principal_forms() {
        let statement = Statement::from_str(indoc! {r#"
        {
            "Effect": "Allow",
            "Action": "sts:AssumeRole",
            "Principal": {
                "AWS": ["arn:aws:iam::123456789012:root", "123456789012"],
                "Service": "lambda.amazonaws.com"
            }
        }"#})
        .unwrap();
        let map = statement.principal().unwrap().specified().unwrap();
        assert_eq!(map.aws.as_ref().unwrap().len(), 2);
        assert_eq!(map.service.as_ref().unwrap().to_vec(), vec!["lambda.amazonaws.com"]);

        let e = Statement::from_str(
            r#"{"Effect": "Allow", "Action": "*", "Principal": "123456789012"}"#,
        )
        .unwrap_err();
        assert!(e.to_string().contains("expected map of principal types to values or \"*\""));
    }

    #[test_log::test]
    fn test_round_trip() {
        let policy_str = indoc! {r#"
        {
            "Version": "2012-10-17",
            "Statement": {
                "Effect": "Allow",
                "Action": "kms:Decrypt",
                "Resource": "*",
                "Principal": {
                    "AWS": "arn:aws:iam::123456789012:root"
                }
            }
        }"#};
        let policy = PolicyDocument::from_str(policy_str).unwrap();
        assert_eq!(policy.to_string(), policy_str);
    }
}
