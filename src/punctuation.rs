//! Punctuation repair applied per sub-line after validation passes.
//!
//! Models routinely drop CJK quote/bracket pairs or invent ones the source
//! never had. The repair is deliberately narrow: it only acts when the source
//! is fully wrapped in a known pair and the translation lost it, or when the
//! translation is wrapped in a pair the source does not contain at all.

const PAIRS: &[(&str, &str)] = &[
    ("「", "」"),
    ("『", "』"),
    ("【", "】"),
    ("（", "）"),
    ("〈", "〉"),
    ("《", "》"),
    ("“", "”"),
    ("(", ")"),
    ("[", "]"),
];

/// Repair one (source, translation) pair; returns the fixed translation.
pub fn fix(source: &str, translated: &str) -> String {
    let mut out = translated.to_string();

    for (open, close) in PAIRS {
        let src_wrapped = is_wrapped(source, open, close);
        let dst_wrapped = is_wrapped(&out, open, close);

        if src_wrapped && !dst_wrapped && !out.trim().is_empty() {
            out = add_wrap(&out, open, close);
        } else if dst_wrapped && !source.contains(open) && !source.contains(close) {
            out = strip_wrap(&out, open, close);
        }
    }

    out
}

fn is_wrapped(text: &str, open: &str, close: &str) -> bool {
    let trimmed = text.trim_end_matches('\n');
    trimmed.starts_with(open) && trimmed.ends_with(close) && trimmed.len() > open.len()
}

fn add_wrap(text: &str, open: &str, close: &str) -> String {
    let trimmed = text.trim_end_matches('\n');
    let suffix = &text[trimmed.len()..];
    format!("{open}{trimmed}{close}{suffix}")
}

fn strip_wrap(text: &str, open: &str, close: &str) -> String {
    let trimmed = text.trim_end_matches('\n');
    let suffix = &text[trimmed.len()..];
    let inner = &trimmed[open.len()..trimmed.len() - close.len()];
    format!("{inner}{suffix}")
}
