//! Condition operator names, parsed once into structured form.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Set quantifier prefix on a condition operator.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SetQuantifier {
    ForAllValues,
    ForAnyValue,
}

impl SetQuantifier {
    pub fn swapped(self) -> Self {
        match self {
            Self::ForAllValues => Self::ForAnyValue,
            Self::ForAnyValue => Self::ForAllValues,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::ForAllValues => "forallvalues",
            Self::ForAnyValue => "foranyvalue",
        }
    }
}

/// Base condition operators, without quantifier or IfExists decoration.
///
/// Operators outside the known set are carried as [BaseOp::Unknown] so the
/// algebra can treat them as unmergeable without failing.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum BaseOp {
    StringEquals,
    StringNotEquals,
    StringLike,
    StringNotLike,
    ArnEquals,
    ArnNotEquals,
    ArnLike,
    ArnNotLike,
    NumericEquals,
    NumericNotEquals,
    NumericLessThan,
    NumericLessThanEquals,
    NumericGreaterThan,
    NumericGreaterThanEquals,
    DateEquals,
    DateNotEquals,
    DateLessThan,
    DateLessThanEquals,
    DateGreaterThan,
    DateGreaterThanEquals,
    Bool,
    Null,
    IpAddress,
    NotIpAddress,
    Unknown(String),
}

/// How an operator's value lists combine under union and intersection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Family {
    /// List-valued; intersection = list intersection, union = list union.
    Positive,
    /// List of exclusions; intersection = union of exclusions, union =
    /// intersection of exclusions.
    Negative,
    /// Single boundary; intersection = min, union = max.
    UpperBound(OrderKind),
    /// Single boundary; intersection = max, union = min.
    LowerBound(OrderKind),
    /// Single `"true"`/`"false"`; combining requires equality.
    BoolEq,
    Unknown,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum OrderKind {
    Numeric,
    Date,
}

impl BaseOp {
    /// Parse a lowercased base operator name.
    pub(crate) fn parse(s: &str) -> Self {
        match s {
            "stringequals" => Self::StringEquals,
            "stringnotequals" => Self::StringNotEquals,
            "stringlike" => Self::StringLike,
            "stringnotlike" => Self::StringNotLike,
            "arnequals" => Self::ArnEquals,
            "arnnotequals" => Self::ArnNotEquals,
            "arnlike" => Self::ArnLike,
            "arnnotlike" => Self::ArnNotLike,
            "numericequals" => Self::NumericEquals,
            "numericnotequals" => Self::NumericNotEquals,
            "numericlessthan" => Self::NumericLessThan,
            "numericlessthanequals" => Self::NumericLessThanEquals,
            "numericgreaterthan" => Self::NumericGreaterThan,
            "numericgreaterthanequals" => Self::NumericGreaterThanEquals,
            "dateequals" => Self::DateEquals,
            "datenotequals" => Self::DateNotEquals,
            "datelessthan" => Self::DateLessThan,
            "datelessthanequals" => Self::DateLessThanEquals,
            "dategreaterthan" => Self::DateGreaterThan,
            "dategreaterthanequals" => Self::DateGreaterThanEquals,
            "bool" => Self::Bool,
            "null" => Self::Null,
            "ipaddress" => Self::IpAddress,
            "notipaddress" => Self::NotIpAddress,
            _ => Self::Unknown(s.to_string()),
        }
    }

    pub(crate) fn name(&self) -> &str {
        match self {
            Self::StringEquals => "stringequals",
            Self::StringNotEquals => "stringnotequals",
            Self::StringLike => "stringlike",
            Self::StringNotLike => "stringnotlike",
            Self::ArnEquals => "arnequals",
            Self::ArnNotEquals => "arnnotequals",
            Self::ArnLike => "arnlike",
            Self::ArnNotLike => "arnnotlike",
            Self::NumericEquals => "numericequals",
            Self::NumericNotEquals => "numericnotequals",
            Self::NumericLessThan => "numericlessthan",
            Self::NumericLessThanEquals => "numericlessthanequals",
            Self::NumericGreaterThan => "numericgreaterthan",
            Self::NumericGreaterThanEquals => "numericgreaterthanequals",
            Self::DateEquals => "dateequals",
            Self::DateNotEquals => "datenotequals",
            Self::DateLessThan => "datelessthan",
            Self::DateLessThanEquals => "datelessthanequals",
            Self::DateGreaterThan => "dategreaterthan",
            Self::DateGreaterThanEquals => "dategreaterthanequals",
            Self::Bool => "bool",
            Self::Null => "null",
            Self::IpAddress => "ipaddress",
            Self::NotIpAddress => "notipaddress",
            Self::Unknown(name) => name,
        }
    }

    pub(crate) fn family(&self) -> Family {
        match self {
            Self::StringEquals
            | Self::StringLike
            | Self::ArnEquals
            | Self::ArnLike
            | Self::NumericEquals
            | Self::DateEquals
            | Self::IpAddress => Family::Positive,
            Self::StringNotEquals
            | Self::StringNotLike
            | Self::ArnNotEquals
            | Self::ArnNotLike
            | Self::NumericNotEquals
            | Self::DateNotEquals
            | Self::NotIpAddress => Family::Negative,
            Self::NumericLessThan | Self::NumericLessThanEquals => Family::UpperBound(OrderKind::Numeric),
            Self::NumericGreaterThan | Self::NumericGreaterThanEquals => Family::LowerBound(OrderKind::Numeric),
            Self::DateLessThan | Self::DateLessThanEquals => Family::UpperBound(OrderKind::Date),
            Self::DateGreaterThan | Self::DateGreaterThanEquals => Family::LowerBound(OrderKind::Date),
            Self::Bool | Self::Null => Family::BoolEq,
            Self::Unknown(_) => Family::Unknown,
        }
    }

    /// The logical complement of this operator. Bool and Null are their own
    /// complements (the caller flips the values); unknown operators have none.
    pub(crate) fn complement(&self) -> Option<Self> {
        match self {
            Self::StringEquals => Some(Self::StringNotEquals),
            Self::StringNotEquals => Some(Self::StringEquals),
            Self::StringLike => Some(Self::StringNotLike),
            Self::StringNotLike => Some(Self::StringLike),
            Self::ArnEquals => Some(Self::ArnNotEquals),
            Self::ArnNotEquals => Some(Self::ArnEquals),
            Self::ArnLike => Some(Self::ArnNotLike),
            Self::ArnNotLike => Some(Self::ArnLike),
            Self::NumericEquals => Some(Self::NumericNotEquals),
            Self::NumericNotEquals => Some(Self::NumericEquals),
            Self::NumericLessThan => Some(Self::NumericGreaterThanEquals),
            Self::NumericGreaterThanEquals => Some(Self::NumericLessThan),
            Self::NumericLessThanEquals => Some(Self::NumericGreaterThan),
            Self::NumericGreaterThan => Some(Self::NumericLessThanEquals),
            Self::DateEquals => Some(Self::DateNotEquals),
            Self::DateNotEquals => Some(Self::DateEquals),
            Self::DateLessThan => Some(Self::DateGreaterThanEquals),
            Self::DateGreaterThanEquals => Some(Self::DateLessThan),
            Self::DateLessThanEquals => Some(Self::DateGreaterThan),
            Self::DateGreaterThan => Some(Self::DateLessThanEquals),
            Self::Bool => Some(Self::Bool),
            Self::Null => Some(Self::Null),
            Self::IpAddress => Some(Self::NotIpAddress),
            Self::NotIpAddress => Some(Self::IpAddress),
            Self::Unknown(_) => None,
        }
    }

    /// Whether this operator is the negative member of its complement pair.
    /// Used to orient the complementary-pair reduction.
    pub(crate) fn is_negative(&self) -> bool {
        matches!(
            self,
            Self::StringNotEquals
                | Self::StringNotLike
                | Self::ArnNotEquals
                | Self::ArnNotLike
                | Self::NumericNotEquals
                | Self::DateNotEquals
                | Self::NotIpAddress
                | Self::NumericGreaterThan
                | Self::NumericGreaterThanEquals
                | Self::DateGreaterThan
                | Self::DateGreaterThanEquals
        )
    }

    /// Whether Bool/Null semantics apply (inversion flips values, not the
    /// operator).
    pub(crate) fn flips_values(&self) -> bool {
        matches!(self, Self::Bool | Self::Null)
    }
}

/// A fully parsed condition operator name: optional set quantifier, base
/// operator, optional IfExists suffix.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct OpName {
    pub quantifier: Option<SetQuantifier>,
    pub base: BaseOp,
    pub if_exists: bool,
}

impl OpName {
    /// Parse an operator name, case-insensitively.
    pub fn parse(name: &str) -> Self {
        let lower = name.to_lowercase();
        let mut rest = lower.as_str();

        let quantifier = if let Some(stripped) = rest.strip_prefix("forallvalues:") {
            rest = stripped;
            Some(SetQuantifier::ForAllValues)
        } else if let Some(stripped) = rest.strip_prefix("foranyvalue:") {
            rest = stripped;
            Some(SetQuantifier::ForAnyValue)
        } else {
            None
        };

        let if_exists = if let Some(stripped) = rest.strip_suffix("ifexists") {
            rest = stripped;
            true
        } else {
            false
        };

        Self {
            quantifier,
            base: BaseOp::parse(rest),
            if_exists,
        }
    }

    /// The inverted operator name: complemented base, swapped quantifier,
    /// IfExists preserved. None when the base has no complement.
    pub(crate) fn inverted(&self) -> Option<Self> {
        let base = self.base.complement()?;
        Some(Self {
            quantifier: self.quantifier.map(SetQuantifier::swapped),
            base,
            if_exists: self.if_exists,
        })
    }
}

impl Display for OpName {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        if let Some(quantifier) = self.quantifier {
            write!(f, "{}:", quantifier.name())?;
        }
        f.write_str(self.base.name())?;
        if self.if_exists {
            f.write_str("ifexists")?;
        }
        Ok(())
    }
}
