use {
    serde::{Deserialize, Serialize},
    std::fmt::{Debug, Display, Formatter, Result as FmtResult},
};

/// The effect of a statement or permission.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

impl Display for Effect {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Allow => f.write_str("Allow"),
            Self::Deny => f.write_str("Deny"),
        }
    }
}

/// Compile-time effect marker for [PermissionSet](crate::PermissionSet).
///
/// Parameterizing sets by a marker makes cross-effect `add_all` and
/// `intersection` unrepresentable; adding a single runtime [Permission]
/// (crate::Permission) of the wrong effect is still a checked error.
pub trait EffectKind: Clone + Copy + Debug + Eq {
    const EFFECT: Effect;
}

/// Marker for sets of Allow permissions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Allowed;

/// Marker for sets of Deny permissions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Denied;

impl EffectKind for Allowed {
    const EFFECT: Effect = Effect::Allow;
}

impl EffectKind for Denied {
    const EFFECT: Effect = Effect::Deny;
}
