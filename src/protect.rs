//! Code-protection stage: shields non-translatable embedded markup from the
//! model and restores it afterwards.
//!
//! `preprocess` swaps protected spans for opaque markers before the prompt is
//! built; `postprocess` undoes the substitution key-for-key on the decoded
//! reply. The two calls are symmetric and stateful, so a guard instance
//! belongs to exactly one task invocation.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

// Spans the model must not touch. Control codes are masked before bare
// escapes so `\N[1]` never gets split by the shorter `\n`-style match.
static ESCAPE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[ntr]").expect("valid escape regex"));
static PRINTF_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%\d*\$?[sdif]").expect("valid printf regex"));
static BRACE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{[A-Za-z0-9_]+(?::[^{}]+)?\}").expect("valid brace regex")
});
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^<>]+>").expect("valid tag regex"));
static RUBY_REGEX: Lazy<Regex> = Lazy::new(|| {
    // RPG Maker control codes: \V[1], \N[2], \C[3], \. \! etc.
    Regex::new(r"\\[A-Za-z]+\[[^\]]*\]|\\[.!{}^$|<>]").expect("valid control code regex")
});

/// Pre/post hooks around the model round trip. `postprocess` must undo
/// `preprocess` marker-for-marker.
pub trait CodeGuard: Send {
    fn preprocess(&mut self, source: &mut Vec<(String, String)>);
    fn postprocess(&mut self, destination: &mut HashMap<String, String>);
}

/// Guard that replaces nothing. Used when protection is turned off and by
/// tests that want the raw text on the wire.
#[derive(Debug, Default)]
pub struct NoopGuard;

impl CodeGuard for NoopGuard {
    fn preprocess(&mut self, _source: &mut Vec<(String, String)>) {}
    fn postprocess(&mut self, _destination: &mut HashMap<String, String>) {}
}

/// Default guard: masks placeholder and markup spans with `⟦n⟧` markers,
/// numbered per line so restoration stays key-local.
#[derive(Debug, Default)]
pub struct PlaceholderGuard {
    // Sub-line key -> ordered (marker, original span) substitutions.
    saved: HashMap<String, Vec<(String, String)>>,
}

impl PlaceholderGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn mask_line(text: &str, saved: &mut Vec<(String, String)>) -> String {
        let mut out = text.to_string();
        for regex in [&*RUBY_REGEX, &*ESCAPE_REGEX, &*PRINTF_REGEX, &*BRACE_REGEX, &*TAG_REGEX] {
            loop {
                let Some(found) = regex.find(&out) else {
                    break;
                };
                // Skip spans that are already markers.
                let span = found.as_str().to_string();
                if span.starts_with('⟦') {
                    break;
                }
                let marker = format!("⟦{}⟧", saved.len());
                out.replace_range(found.range(), &marker);
                saved.push((marker, span));
            }
        }
        out
    }
}

impl CodeGuard for PlaceholderGuard {
    fn preprocess(&mut self, source: &mut Vec<(String, String)>) {
        for (key, text) in source.iter_mut() {
            let mut saved = Vec::new();
            let masked = Self::mask_line(text, &mut saved);
            if !saved.is_empty() {
                *text = masked;
                self.saved.insert(key.clone(), saved);
            }
        }
    }

    fn postprocess(&mut self, destination: &mut HashMap<String, String>) {
        for (key, saved) in self.saved.drain() {
            let Some(text) = destination.get_mut(&key) else {
                continue;
            };
            for (marker, original) in saved {
                if text.contains(&marker) {
                    *text = text.replace(&marker, &original);
                }
                // A dropped marker is a validation concern, not ours: the
                // line simply keeps the reply as-is.
            }
        }
    }
}
