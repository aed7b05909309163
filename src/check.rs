//! Response validation: verdicts on whether a decoded reply can be committed.
//!
//! A non-`None` verdict means the whole batch is rejected and re-queued by
//! the external scheduler; the task never commits a partially valid reply.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Named rejection reasons. `Unknown` covers transport/provider failures
/// where no reply was available to inspect.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckFlag {
    Unknown,
    LineCountMismatch,
    LineKeyMismatch,
    EmptyLine,
}

impl fmt::Display for CheckFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CheckFlag::Unknown => "request failed before a reply was received",
            CheckFlag::LineCountMismatch => "reply line count does not match the source",
            CheckFlag::LineKeyMismatch => "reply is missing one or more source line keys",
            CheckFlag::EmptyLine => "reply contains an empty translation for a non-empty line",
        };
        write!(f, "{text}")
    }
}

/// Validator contract: compare the sub-line source pairs against the decoded
/// destination map and return `None` to accept.
pub trait ResponseChecker: Send {
    fn check(
        &self,
        source: &[(String, String)],
        destination: &HashMap<String, String>,
    ) -> Option<CheckFlag>;
}

/// Default validator: shape checks only, no content scoring.
#[derive(Debug, Default)]
pub struct StandardChecker;

impl ResponseChecker for StandardChecker {
    fn check(
        &self,
        source: &[(String, String)],
        destination: &HashMap<String, String>,
    ) -> Option<CheckFlag> {
        if destination.len() != source.len() {
            return Some(CheckFlag::LineCountMismatch);
        }
        for (key, _) in source {
            if !destination.contains_key(key) {
                return Some(CheckFlag::LineKeyMismatch);
            }
        }
        for (key, text) in source {
            let translated = &destination[key];
            if translated.trim().is_empty() && !text.trim().is_empty() {
                return Some(CheckFlag::EmptyLine);
            }
        }
        None
    }
}
