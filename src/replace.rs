//! Ordered literal replacement stages applied before and after translation.

use serde::{Deserialize, Serialize};

/// One literal substitution. No regex semantics: `src` matches by exact
/// substring containment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplacementRule {
    pub src: String,
    pub dst: String,
}

/// A toggleable, ordered rule list. Rules apply cumulatively: a later rule
/// sees the output of earlier rules.
#[derive(Debug, Clone, Default)]
pub struct ReplacementStage {
    enabled: bool,
    rules: Vec<ReplacementRule>,
}

impl ReplacementStage {
    pub fn new(enabled: bool, rules: Vec<ReplacementRule>) -> Self {
        Self { enabled, rules }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn apply(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        let mut out = text.to_string();
        for rule in &self.rules {
            if rule.src.is_empty() {
                continue;
            }
            if out.contains(&rule.src) {
                out = out.replace(&rule.src, &rule.dst);
            }
        }
        out
    }
}
