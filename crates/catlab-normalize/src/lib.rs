//! Text normalization for SLU input.
//!
//! Recognizer output is lower-cased and then rewritten by an ordered list of
//! [`Rule`]s, each replacing an exact token subsequence with another one (an
//! empty target deletes the source). The default rules drop hesitation
//! fillers and silence markers and expand `i'm` to `i am`.
//!
//! Normalization works on any [`Abstractable`] representation and never
//! touches the caller's value.
//!
//! # Example
//! ```
//! use catlab_normalize::Normalizer;
//! use catlab_types::Utterance;
//!
//! let norm = Normalizer::default();
//! let out = norm.normalize(&Utterance::new("UM I'm going to Praha"));
//! assert_eq!(out.to_string(), "i am going to praha");
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use catlab_types::Abstractable;
use tracing::debug;

/// Replace `source` tokens with `target` tokens.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Rule {
    pub source: Vec<String>,
    pub target: Vec<String>,
}

impl Rule {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: tokens(source),
            target: tokens(target),
        }
    }
}

const DEFAULT_RULES: &[(&str, &str)] = &[
    ("erm", ""),
    ("uhm", ""),
    ("um", ""),
    ("i'm", "i am"),
    ("(sil)", ""),
    ("(%hesitation)", ""),
    ("(hesitation)", ""),
];

/// Ordered rewrite rules applied after lower-casing.
#[derive(Clone, Debug)]
pub struct Normalizer {
    rules: Vec<Rule>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(
            DEFAULT_RULES
                .iter()
                .map(|(source, target)| Rule::new(source, target))
                .collect(),
        )
    }
}

impl Normalizer {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Load rules from a text file, one per line: `source<TAB>target`.
    ///
    /// A line without a tab, or with an empty target, deletes the source
    /// phrase. Blank lines and lines starting with `#` are ignored.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("open normalization rules {}", path.display()))?;
        let rules = parse_rules(&raw);
        debug!("loaded {} normalization rules from {}", rules.len(), path.display());
        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Lower-case a copy of `input` and apply every rule in order.
    pub fn normalize<T: Abstractable>(&self, input: &T) -> T {
        let mut out = input.clone();
        out.lower();
        for rule in &self.rules {
            out.replace(&rule.source, &rule.target);
        }
        out
    }
}

fn parse_rules(raw: &str) -> Vec<Rule> {
    raw.lines()
        .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .filter_map(|line| {
            let (source, target) = line.split_once('\t').unwrap_or((line, ""));
            let rule = Rule::new(source, target);
            (!rule.source.is_empty()).then_some(rule)
        })
        .collect()
}

fn tokens(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}
