use crate::finding::{Finding, UNCATEGORIZED_RULE};
use crate::types::RiskTier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// TierRule
// ---------------------------------------------------------------------------

/// Maps a rule identifier pattern to a risk tier. A trailing `*` makes the
/// pattern a prefix match; anything else is an exact match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierRule {
    pub pattern: String,
    pub tier: RiskTier,
}

impl TierRule {
    pub fn new(pattern: impl Into<String>, tier: RiskTier) -> Self {
        Self {
            pattern: pattern.into(),
            tier,
        }
    }

    pub fn matches(&self, rule: &str) -> bool {
        match self.pattern.strip_suffix('*') {
            Some(prefix) => rule.starts_with(prefix),
            None => rule == self.pattern,
        }
    }
}

/// The compiled-in tier table. Projects override it in `.remedy/config.yaml`;
/// these defaults cover the common lint taxonomy.
pub fn default_tier_rules() -> Vec<TierRule> {
    vec![
        TierRule::new("unused-*", RiskTier::Structural),
        TierRule::new("dead-*", RiskTier::Structural),
        TierRule::new("debug-*", RiskTier::Stylistic),
        TierRule::new("style-*", RiskTier::Stylistic),
        TierRule::new("format-*", RiskTier::Stylistic),
        TierRule::new("missing-*", RiskTier::IncompleteLogic),
        TierRule::new("unresolved-*", RiskTier::IncompleteLogic),
        TierRule::new("unhandled-*", RiskTier::IncompleteLogic),
    ]
}

/// Resolve the tier for a rule identifier. When several patterns match, the
/// highest (riskiest) tier wins. Unknown rules are treated as highest-risk.
pub fn tier_for(rules: &[TierRule], rule: &str) -> RiskTier {
    rules
        .iter()
        .filter(|r| r.matches(rule))
        .map(|r| r.tier)
        .max()
        .unwrap_or(RiskTier::IncompleteLogic)
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// A risk-tiered bucket of findings sharing a rule identifier. Member ids are
/// ordered by file path then line so the same finding set always produces
/// the same category, byte for byte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub tier: RiskTier,
    pub finding_ids: Vec<String>,
}

// ---------------------------------------------------------------------------
// Categorizer
// ---------------------------------------------------------------------------

pub struct Categorizer<'a> {
    tiers: &'a [TierRule],
}

impl<'a> Categorizer<'a> {
    pub fn new(tiers: &'a [TierRule]) -> Self {
        Self { tiers }
    }

    /// Group findings into categories ordered for remediation: ascending
    /// tier, then ascending (file, line) of each category's first member,
    /// then name.
    pub fn categorize(&self, findings: &[Finding]) -> Vec<Category> {
        let mut buckets: BTreeMap<&str, Vec<&Finding>> = BTreeMap::new();
        for finding in findings {
            buckets.entry(finding.rule_name()).or_default().push(finding);
        }

        // Tie-break key within a tier: the (file, line) of the category's
        // first member, compared numerically on line.
        let mut keyed: Vec<(Category, String, u32)> = buckets
            .into_iter()
            .map(|(name, mut members)| {
                members.sort_by(|a, b| {
                    (a.file.as_str(), a.line, a.id.as_str())
                        .cmp(&(b.file.as_str(), b.line, b.id.as_str()))
                });
                let tier = if name == UNCATEGORIZED_RULE {
                    RiskTier::IncompleteLogic
                } else {
                    tier_for(self.tiers, name)
                };
                let first_file = members[0].file.clone();
                let first_line = members[0].line;
                let category = Category {
                    name: name.to_string(),
                    tier,
                    finding_ids: members.iter().map(|f| f.id.clone()).collect(),
                };
                (category, first_file, first_line)
            })
            .collect();

        keyed.sort_by(|(a, a_file, a_line), (b, b_file, b_line)| {
            (a.tier, a_file.as_str(), *a_line, a.name.as_str())
                .cmp(&(b.tier, b_file.as_str(), *b_line, b.name.as_str()))
        });
        keyed.into_iter().map(|(c, _, _)| c).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
