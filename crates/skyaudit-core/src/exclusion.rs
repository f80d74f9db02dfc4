//! Tag and ARN based resource exclusion
//!
//! Exclusion is a pure pre-filter: check functions consult it for every
//! candidate resource before making any per-resource API call, so excluded
//! resources cost nothing beyond the initial listing.

use crate::error::{AuditError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource tags, key to value
pub type Tags = BTreeMap<String, String>;

/// A single tag rule
///
/// Matches when the tag key is present and, if a value is given, the tag
/// value equals it exactly (case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExclusionRule {
    /// Tag key that must be present
    pub key: String,

    /// Exact value required, any value when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ExclusionRule {
    /// Rule matching any value of `key`
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    /// Rule matching `key` with exactly `value`
    pub fn key_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// Whether this rule matches the given tags
    pub fn matches(&self, tags: &Tags) -> bool {
        match (tags.get(&self.key), &self.value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
        }
    }

    /// Reject rules that can never be meaningful
    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(AuditError::Config(
                "exclusion tag rule has an empty key".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for ExclusionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.key, value),
            None => write!(f, "{}=*", self.key),
        }
    }
}

/// Returns true when any rule matches the tags
pub fn should_exclude(tags: &Tags, rules: &[ExclusionRule]) -> bool {
    rules.iter().any(|rule| rule.matches(tags))
}

/// Everything a check needs to decide whether to skip a resource
#[derive(Debug, Clone, Default)]
pub struct ExclusionContext {
    rules: Vec<ExclusionRule>,
    arn_patterns: Vec<glob::Pattern>,
}

impl ExclusionContext {
    /// Context that excludes nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a context from tag rules
    pub fn new(rules: Vec<ExclusionRule>) -> Self {
        Self {
            rules,
            arn_patterns: Vec::new(),
        }
    }

    /// Add ARN glob patterns
    pub fn with_arn_patterns(mut self, patterns: &[String]) -> Result<Self> {
        for pattern in patterns {
            let pat = glob::Pattern::new(pattern).map_err(|e| {
                AuditError::Config(format!("Invalid ARN pattern '{}': {}", pattern, e))
            })?;
            self.arn_patterns.push(pat);
        }
        Ok(self)
    }

    /// Active tag rules
    pub fn rules(&self) -> &[ExclusionRule] {
        &self.rules
    }

    /// Whether no rule of any kind is configured
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.arn_patterns.is_empty()
    }

    /// Tag-only decision
    pub fn should_exclude(&self, tags: &Tags) -> bool {
        should_exclude(tags, &self.rules)
    }

    /// Whether an ARN matches any configured pattern
    pub fn excludes_arn(&self, arn: &str) -> bool {
        self.arn_patterns.iter().any(|p| p.matches(arn))
    }

    /// Full per-resource decision
    pub fn is_excluded(&self, tags: &Tags, arn: &str) -> bool {
        self.should_exclude(tags) || self.excludes_arn(arn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_key_only_rule_matches_any_value() {
        let rule = ExclusionRule::key("DoNotAudit");
        assert!(rule.matches(&tags(&[("DoNotAudit", "")])));
        assert!(rule.matches(&tags(&[("DoNotAudit", "yes")])));
        assert!(!rule.matches(&tags(&[("Other", "yes")])));
    }

    #[test]
    fn test_key_value_rule_is_exact_and_case_sensitive() {
        let rule = ExclusionRule::key_value("Environment", "production");
        assert!(rule.matches(&tags(&[("Environment", "production")])));
        assert!(!rule.matches(&tags(&[("Environment", "Production")])));
        assert!(!rule.matches(&tags(&[("environment", "production")])));
        assert!(!rule.matches(&tags(&[("Environment", "production-eu")])));
    }

    #[test]
    fn test_no_rules_keeps_everything() {
        assert!(!should_exclude(&tags(&[("Environment", "production")]), &[]));
        assert!(!should_exclude(&Tags::new(), &[]));
    }

    #[test]
    fn test_any_matching_rule_excludes() {
        let rules = vec![
            ExclusionRule::key_value("Environment", "production"),
            ExclusionRule::key_value("Customer", "customer01-protected"),
        ];
        assert!(should_exclude(&tags(&[("Environment", "production")]), &rules));
        assert!(should_exclude(
            &tags(&[("Customer", "customer01-protected")]),
            &rules
        ));
        assert!(!should_exclude(&tags(&[("Customer", "customer02")]), &rules));
    }

    #[test]
    fn test_decision_is_deterministic() {
        let rules = vec![ExclusionRule::key("Team")];
        let t = tags(&[("Team", "data")]);
        let first = should_exclude(&t, &rules);
        for _ in 0..10 {
            assert_eq!(should_exclude(&t, &rules), first);
        }
    }

    #[test]
    fn test_arn_patterns() {
        let ctx = ExclusionContext::empty()
            .with_arn_patterns(&["arn:aws:ec2:*:*:instance/i-keep*".to_string()])
            .unwrap();
        assert!(ctx.excludes_arn("arn:aws:ec2:us-east-1:111111111111:instance/i-keep01"));
        assert!(!ctx.excludes_arn("arn:aws:ec2:us-east-1:111111111111:instance/i-0abc"));
        assert!(ctx.is_excluded(
            &Tags::new(),
            "arn:aws:ec2:eu-west-1:222222222222:instance/i-keepme"
        ));
    }

    #[test]
    fn test_invalid_arn_pattern_rejected() {
        let result = ExclusionContext::empty().with_arn_patterns(&["arn:aws:[".to_string()]);
        assert!(matches!(result, Err(AuditError::Config(_))));
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(ExclusionRule::key("  ").validate().is_err());
        assert!(ExclusionRule::key("Env").validate().is_ok());
    }

    #[test]
    fn test_rule_deserializes_with_optional_value() {
        let rules: Vec<ExclusionRule> =
            serde_yaml::from_str("- key: Environment\n  value: production\n- key: DoNotAudit\n")
                .unwrap();
        assert_eq!(rules[0], ExclusionRule::key_value("Environment", "production"));
        assert_eq!(rules[1], ExclusionRule::key("DoNotAudit"));

        let missing: std::result::Result<Vec<ExclusionRule>, _> =
            serde_yaml::from_str("- value: production\n");
        assert!(missing.is_err());
    }
}
