//! Allow/deny decision carried through guard and broker checks.

/// Outcome of a permission or containment check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the check passed.
    pub allowed: bool,
    /// Reason string, present for both outcomes.
    pub reason: String,
}

impl Decision {
    /// Positive decision with a reason.
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    /// Negative decision with a reason.
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}
