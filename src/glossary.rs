//! Glossary prompt-text provider.
//!
//! Filters the configured term list down to the terms that actually occur in
//! the batch being translated and renders them as supplementary prompt text.
//! Returns an empty string when nothing applies, which callers treat as
//! "no glossary this round".

use crate::config::TranslatorConfig;
use serde::{Deserialize, Serialize};

/// One steering term: source spelling, required translation, optional note.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GlossaryRule {
    pub src: String,
    pub dst: String,
    #[serde(default)]
    pub info: String,
}

fn applicable_rules<'a>(
    config: &'a TranslatorConfig,
    source_lines: &[&str],
) -> Vec<&'a GlossaryRule> {
    config
        .glossary_data
        .iter()
        .filter(|rule| !rule.src.is_empty())
        .filter(|rule| source_lines.iter().any(|line| line.contains(&rule.src)))
        .collect()
}

/// Glossary block for the generic chat dialect.
pub fn build(config: &TranslatorConfig, source_lines: &[&str]) -> String {
    let rules = applicable_rules(config, source_lines);
    if rules.is_empty() {
        return String::new();
    }

    let mut out = String::from("Glossary (translate these terms exactly as given):");
    for rule in rules {
        out.push('\n');
        if rule.info.is_empty() {
            out.push_str(&format!("{} -> {}", rule.src, rule.dst));
        } else {
            out.push_str(&format!("{} -> {} ({})", rule.src, rule.dst, rule.info));
        }
    }
    out
}

/// Glossary block for the single-turn dialect, rendered in the bare
/// `src->dst` form that model family was tuned on.
pub fn build_single_turn(config: &TranslatorConfig, source_lines: &[&str]) -> String {
    let rules = applicable_rules(config, source_lines);
    rules
        .iter()
        .map(|rule| {
            if rule.info.is_empty() {
                format!("{}->{}", rule.src, rule.dst)
            } else {
                format!("{}->{} #{}", rule.src, rule.dst, rule.info)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
