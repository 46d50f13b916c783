//! Signal type patterns for routes and subscriptions.
//!
//! Patterns are dot-separated like signal types. `*` matches exactly one
//! segment, `**` matches any number of segments (including none).
//! `order.*` matches `order.placed` but not `order.item.added`;
//! `order.**` matches both, and `order` itself.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A compiled signal type pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalPattern(String);

impl SignalPattern {
    /// Create a pattern from its dotted text.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// The dotted text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the pattern contains no wildcards.
    pub fn is_exact(&self) -> bool {
        !self.0.split('.').any(|s| s == "*" || s == "**")
    }

    /// Whether `signal_type` matches.
    pub fn matches(&self, signal_type: &str) -> bool {
        let pattern: Vec<&str> = self.0.split('.').collect();
        let subject: Vec<&str> = signal_type.split('.').collect();
        match_segments(&pattern, &subject)
    }
}

fn match_segments(pattern: &[&str], subject: &[&str]) -> bool {
    match pattern.split_first() {
        None => subject.is_empty(),
        Some((&"**", rest)) => {
            (0..=subject.len()).any(|skip| match_segments(rest, &subject[skip..]))
        }
        Some((&head, rest)) => match subject.split_first() {
            Some((&first, tail)) if head == "*" || head == first => match_segments(rest, tail),
            _ => false,
        },
    }
}

impl fmt::Display for SignalPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SignalPattern {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for SignalPattern {
    fn from(s: String) -> Self {
        Self(s)
    }
}
