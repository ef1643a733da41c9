//! Plain-text policy rules: parsing and evaluation.
//!
//! Two rule kinds share one line grammar: effect rules
//! (`allow(action)` / `deny(action)`) and limit overrides
//! (`key = integer`), each with an optional condition tail
//! (`always`, `unless confirm`, `[only] in profile=X`, `[only] in
//! workspace=X`).

use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(allow|deny)\(([^)]+)\)\s*(.*)$").expect("action rule pattern")
});
static LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_.]+)\s*=\s*([0-9]+)\s*(.*)$").expect("limit rule pattern")
});

/// Effect of a matching rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Allow the action.
    Allow,
    /// Deny the action. Deny always wins.
    Deny,
}

/// Condition guarding a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyCondition {
    /// Required active profile name, case-insensitive.
    pub profile: Option<String>,
    /// Required active workspace name, case-insensitive.
    pub workspace: Option<String>,
    /// Whether the caller must have explicitly confirmed.
    pub require_confirm: bool,
}

impl PolicyCondition {
    /// Whether the condition holds under the given identity.
    pub fn matches(&self, profile: Option<&str>, workspace: Option<&str>, confirmed: bool) -> bool {
        if self.require_confirm && !confirmed {
            return false;
        }
        if let Some(required) = &self.profile
            && !profile.unwrap_or("").eq_ignore_ascii_case(required)
        {
            return false;
        }
        if let Some(required) = &self.workspace
            && !workspace.unwrap_or("").eq_ignore_ascii_case(required)
        {
            return false;
        }
        true
    }
}

/// An allow/deny rule for one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectRule {
    /// Rule effect.
    pub effect: Effect,
    /// Action name, matched case-insensitively.
    pub action: String,
    /// Guarding condition.
    pub condition: PolicyCondition,
}

/// A numeric override for one limit key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitRule {
    /// Limit key, must exist in the base limits map to apply.
    pub key: String,
    /// Override value.
    pub value: u64,
    /// Guarding condition.
    pub condition: PolicyCondition,
}

/// A parse failure with its source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyParseError {
    /// 1-based source line number.
    pub line: usize,
    /// Failure description including the offending text.
    pub message: String,
}

impl fmt::Display for PolicyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Result of parsing a policy text.
#[derive(Debug, Clone, Default)]
pub struct PolicyDocument {
    /// Parsed effect rules.
    pub effects: Vec<EffectRule>,
    /// Parsed limit overrides.
    pub limits: Vec<LimitRule>,
    /// Parse errors. A non-empty list makes the document unusable.
    pub errors: Vec<PolicyParseError>,
}

/// Parse a policy text line by line. `#` starts a comment; blank lines are
/// ignored. Errors never partially apply: callers must treat a document
/// with errors as present but unusable.
pub fn parse_policy(text: &str) -> PolicyDocument {
    let mut document = PolicyDocument::default();
    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(captures) = ACTION_RE.captures(line) {
            let tail = captures[3].trim();
            let Some(condition) = parse_condition(tail) else {
                document.errors.push(PolicyParseError {
                    line: line_no,
                    message: format!("invalid condition '{tail}'"),
                });
                continue;
            };
            let effect = if captures[1].eq_ignore_ascii_case("deny") {
                Effect::Deny
            } else {
                Effect::Allow
            };
            document.effects.push(EffectRule {
                effect,
                action: captures[2].trim().to_string(),
                condition,
            });
            continue;
        }

        if let Some(captures) = LIMIT_RE.captures(line) {
            let tail = captures[3].trim();
            let Some(condition) = parse_condition(tail) else {
                document.errors.push(PolicyParseError {
                    line: line_no,
                    message: format!("invalid condition '{tail}'"),
                });
                continue;
            };
            let Ok(value) = captures[2].parse::<u64>() else {
                document.errors.push(PolicyParseError {
                    line: line_no,
                    message: format!("invalid limit value '{}'", &captures[2]),
                });
                continue;
            };
            document.limits.push(LimitRule {
                key: captures[1].trim().to_string(),
                value,
                condition,
            });
            continue;
        }

        document.errors.push(PolicyParseError {
            line: line_no,
            message: format!("unsupported rule syntax '{line}'"),
        });
    }
    document
}

fn parse_condition(tail: &str) -> Option<PolicyCondition> {
    let tail = tail.trim();
    if tail.is_empty() || tail.eq_ignore_ascii_case("always") {
        return Some(PolicyCondition::default());
    }
    if tail.eq_ignore_ascii_case("unless confirm") {
        return Some(PolicyCondition {
            require_confirm: true,
            ..PolicyCondition::default()
        });
    }

    let lowered = tail.to_ascii_lowercase();
    let rest = if let Some(stripped) = lowered.strip_prefix("only in ") {
        &tail[tail.len() - stripped.len()..]
    } else if let Some(stripped) = lowered.strip_prefix("in ") {
        &tail[tail.len() - stripped.len()..]
    } else {
        tail
    };

    let (key, value) = rest.split_once('=')?;
    let value = value.trim().to_string();
    match key.trim().to_ascii_lowercase().as_str() {
        "profile" => Some(PolicyCondition {
            profile: Some(value),
            ..PolicyCondition::default()
        }),
        "workspace" => Some(PolicyCondition {
            workspace: Some(value),
            ..PolicyCondition::default()
        }),
        _ => None,
    }
}

/// Evaluate effect rules for an action under the current identity.
/// Deny-wins; no matching rule yields `None` so the caller's default
/// applies.
pub fn evaluate_effect(
    rules: &[EffectRule],
    action: &str,
    profile: Option<&str>,
    workspace: Option<&str>,
    confirmed: bool,
) -> Option<Effect> {
    let mut decision = None;
    for rule in rules {
        if !rule.action.eq_ignore_ascii_case(action) {
            continue;
        }
        if !rule.condition.matches(profile, workspace, confirmed) {
            continue;
        }
        if rule.effect == Effect::Deny {
            return Some(Effect::Deny);
        }
        decision = Some(Effect::Allow);
    }
    decision
}

/// Replace base limit values with matching overrides. Keys absent from the
/// base map are ignored.
pub fn apply_limit_overrides(
    base: &mut BTreeMap<String, u64>,
    rules: &[LimitRule],
    profile: Option<&str>,
    workspace: Option<&str>,
    confirmed: bool,
) {
    for rule in rules {
        if !base.contains_key(&rule.key) {
            continue;
        }
        if rule.condition.matches(profile, workspace, confirmed) {
            base.insert(rule.key.clone(), rule.value);
        }
    }
}
