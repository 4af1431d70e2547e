//! IAM condition blocks and their algebra.
//!
//! A condition block is a two-level map: operator name → context key →
//! allowed values. Operator names and context keys are matched
//! case-insensitively and stored lowercased; values keep their original
//! casing.

pub(crate) mod algebra;
pub mod eval;
pub mod op;

pub use {
    algebra::{intersect_conditions, invert_conditions, union_conditions},
    op::{BaseOp, OpName, SetQuantifier},
};

use {
    crate::{display_json, from_str_json, serutil::JsonList},
    serde::{de::Deserializer, ser::Serializer, Deserialize, Serialize},
    std::collections::{btree_map::Iter, BTreeMap},
};

/// The values allowed for one (operator, context key) clause.
pub type ValueList = Vec<String>;

/// A normalized condition block.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Conditions {
    map: BTreeMap<String, BTreeMap<String, ValueList>>,
}

display_json!(Conditions);
from_str_json!(Conditions);

impl Conditions {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// A block holding a single (operator, key) clause.
    ///
    /// # Examples
    ///
    /// Basic usage:
    ///
    /// ```
    /// # use iam_lens::Conditions;
    ///
    /// let conditions = Conditions::singleton("StringEquals", "aws:PrincipalOrgId", vec!["o-123".to_string()]);
    ///
    /// assert_eq!(conditions.clause_count(), 1);
    /// assert_eq!(
    ///     conditions.get_values("stringequals", "aws:principalorgid"),
    ///     Some(&vec!["o-123".to_string()])
    /// );
    /// ```
    pub fn singleton<O, K>(op: O, key: K, values: ValueList) -> Self
    where
        O: AsRef<str>,
        K: AsRef<str>,
    {
        let mut conditions = Self::new();
        conditions.insert(op, key, values);
        conditions
    }

    /// Insert a clause, lowercasing the operator and key. An existing clause
    /// for the same pair is replaced.
    ///
    /// # Examples
    ///
    /// Basic usage:
    ///
    /// ```
    /// # use iam_lens::Conditions;
    ///
    /// let mut conditions = Conditions::new();
    /// conditions.insert("StringEquals", "aws:username", vec!["alice".to_string()]);
    /// conditions.insert("STRINGEQUALS", "AWS:USERNAME", vec!["bob".to_string()]);
    ///
    /// assert_eq!(conditions.clause_count(), 1);
    /// assert_eq!(
    ///     conditions.get_values("stringequals", "aws:username"),
    ///     Some(&vec!["bob".to_string()])
    /// );
    /// ```
    pub fn insert<O, K>(&mut self, op: O, key: K, values: ValueList)
    where
        O: AsRef<str>,
        K: AsRef<str>,
    {
        self.map
            .entry(op.as_ref().to_lowercase())
            .or_default()
            .insert(key.as_ref().to_lowercase(), values);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The number of operators in the block.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// The number of (operator, key) clauses in the block.
    pub fn clause_count(&self) -> usize {
        self.map.values().map(BTreeMap::len).sum()
    }

    /// Returns the key → values map of one operator, matched
    /// case-insensitively.
    ///
    /// # Examples
    ///
    /// Basic usage:
    ///
    /// ```
    /// # use iam_lens::Conditions;
    ///
    /// let conditions = Conditions::singleton("Bool", "aws:SecureTransport", vec!["true".to_string()]);
    ///
    /// assert!(conditions.get("BOOL").is_some());
    /// assert!(conditions.get("stringequals").is_none());
    /// ```
    pub fn get(&self, op: &str) -> Option<&BTreeMap<String, ValueList>> {
        self.map.get(&op.to_lowercase())
    }

    /// Returns the values of one (operator, key) clause, matched
    /// case-insensitively.
    ///
    /// # Examples
    ///
    /// Basic usage:
    ///
    /// ```
    /// # use iam_lens::Conditions;
    ///
    /// let conditions = Conditions::singleton("Bool", "aws:SecureTransport", vec!["true".to_string()]);
    ///
    /// assert_eq!(
    ///     conditions.get_values("bool", "AWS:SecureTransport"),
    ///     Some(&vec!["true".to_string()])
    /// );
    /// assert_eq!(conditions.get_values("bool", "aws:sourceip"), None);
    /// ```
    pub fn get_values(&self, op: &str, key: &str) -> Option<&ValueList> {
        self.get(op).and_then(|keys| keys.get(&key.to_lowercase()))
    }

    pub fn iter(&self) -> Iter<'_, String, BTreeMap<String, ValueList>> {
        self.map.iter()
    }

    /// Flatten the block into (operator name, key, values) clauses.
    pub fn clauses(&self) -> Vec<(&str, &str, &ValueList)> {
        let mut out = Vec::with_capacity(self.clause_count());
        for (op, keys) in &self.map {
            for (key, values) in keys {
                out.push((op.as_str(), key.as_str(), values));
            }
        }
        out
    }

    pub(crate) fn remove_clause(&mut self, op: &str, key: &str) {
        if let Some(keys) = self.map.get_mut(op) {
            keys.remove(key);
            if keys.is_empty() {
                self.map.remove(op);
            }
        }
    }

    /// Wrap a possibly-empty block as the `Option` used on [Permission]
    /// (crate::Permission): an empty block means "no constraint".
    pub fn into_option(self) -> Option<Self> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl<'de> Deserialize<'de> for Conditions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, BTreeMap<String, JsonList<String>>>::deserialize(deserializer)?;
        let mut conditions = Self::new();
        for (op, keys) in raw {
            for (key, values) in keys {
                conditions.insert(&op, &key, values.iter().cloned().collect());
            }
        }
        Ok(conditions)
    }
}

impl Serialize for Conditions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.map.serialize(serializer)
    }
}
