//! Shared representations of recognizer and SLU output.
//!
//! Utterances, n-best lists and confusion networks all carry sequences of
//! [`Token`]s, while dialogue acts carry `(slot, value)` items. Everything the
//! category-label engine needs from a token-bearing representation is captured
//! by [`Abstractable`], so callers never have to match on a concrete type.
//!
//! A token is either a plain [`Token::Word`] or a [`Token::Label`] inserted by
//! relabeling. Labels remember the phrase they abstract and are never matched
//! as words, so a later restoration targets exactly the inserted token. The
//! same holds for [`Token::Canonical`], the value a surface form was rewritten
//! to while it waits to be relabeled.
//!
//! ```rust
//! use catlab_types::{Abstractable, Utterance};
//!
//! let mut utt = Utterance::new("i go to praha");
//! let phrase = vec!["praha".to_string()];
//! assert!(utt.contains_phrase(&phrase));
//! utt.phrase_to_category_label(&phrase, "CITY");
//! assert_eq!(utt.to_string(), "i go to CITY");
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// One token of an utterance or confusion-network arc.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Token {
    Word(String),
    Label {
        label: String,
        abstracts: Vec<String>,
    },
    /// A canonical value between canonicalization and relabeling. Never
    /// serialized.
    #[serde(skip)]
    Canonical(String),
}

impl Token {
    pub fn word(text: impl Into<String>) -> Self {
        Token::Word(text.into())
    }

    /// Text of a plain word; `None` for labels.
    pub fn as_word(&self) -> Option<&str> {
        match self {
            Token::Word(w) => Some(w.as_str()),
            Token::Label { .. } | Token::Canonical(_) => None,
        }
    }

    pub fn is_label(&self, label: &str) -> bool {
        matches!(self, Token::Label { label: l, .. } if l == label)
    }

    /// Printed form: the word itself or the category label.
    pub fn text(&self) -> &str {
        match self {
            Token::Word(w) | Token::Canonical(w) => w,
            Token::Label { label, .. } => label,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Capabilities the category-label engine and the normalizer rely on.
///
/// Phrases are matched against plain words only. Every mutating method works
/// on all hypotheses a representation holds and returns how many occurrences
/// it rewrote; deep copies come from `Clone`.
pub trait Abstractable: Clone {
    /// Number of plain word tokens, summed over all hypotheses.
    fn token_count(&self) -> usize;

    fn contains_phrase(&self, phrase: &[String]) -> bool;

    /// Replace every non-overlapping occurrence of `phrase` (left to right)
    /// with the words of `replacement`.
    fn replace(&mut self, phrase: &[String], replacement: &[String]) -> usize;

    /// Replace `phrase` with a single label token marked as its abstraction.
    fn phrase_to_category_label(&mut self, phrase: &[String], label: &str) -> usize;

    /// Replace `phrase` with a single [`Token::Canonical`] holding `value`.
    fn phrase_to_canonical(&mut self, phrase: &[String], value: &str) -> usize;

    /// Turn every [`Token::Canonical`] into a label token named `label` that
    /// abstracts the canonical value. Tokens of any other kind are untouched.
    fn canonical_to_category_label(&mut self, label: &str) -> usize;

    /// Replace every label token named `label` with the words of `phrase`.
    fn category_label_to_phrase(&mut self, label: &str, phrase: &[String]) -> usize;

    /// Lower-case all plain words. Labels are left as they are.
    fn lower(&mut self);
}

fn words(phrase: &[String]) -> Vec<Token> {
    phrase.iter().map(|w| Token::Word(w.clone())).collect()
}

fn label_token(phrase: &[String], label: &str) -> Token {
    Token::Label {
        label: label.to_string(),
        abstracts: phrase.to_vec(),
    }
}

fn matches_at(tokens: &[Token], phrase: &[String], at: usize) -> bool {
    !phrase.is_empty()
        && tokens.len() >= at + phrase.len()
        && tokens[at..at + phrase.len()]
            .iter()
            .zip(phrase)
            .all(|(tok, word)| tok.as_word() == Some(word.as_str()))
}

fn contains(tokens: &[Token], phrase: &[String]) -> bool {
    (0..tokens.len()).any(|at| matches_at(tokens, phrase, at))
}

fn substitute<F>(tokens: &mut Vec<Token>, phrase: &[String], mut make: F) -> usize
where
    F: FnMut() -> Vec<Token>,
{
    if !contains(tokens, phrase) {
        return 0;
    }
    let mut out = Vec::with_capacity(tokens.len());
    let mut count = 0;
    let mut idx = 0;
    while idx < tokens.len() {
        if matches_at(tokens, phrase, idx) {
            out.extend(make());
            idx += phrase.len();
            count += 1;
        } else {
            out.push(tokens[idx].clone());
            idx += 1;
        }
    }
    *tokens = out;
    count
}

fn canonical_token(value: &str) -> Token {
    Token::Canonical(value.to_string())
}

fn relabel_canonical(tokens: &mut [Token], label: &str) -> usize {
    let mut count = 0;
    for tok in tokens {
        if let Token::Canonical(value) = tok {
            *tok = Token::Label {
                label: label.to_string(),
                abstracts: vec![std::mem::take(value)],
            };
            count += 1;
        }
    }
    count
}

fn restore_label(tokens: &mut Vec<Token>, label: &str, phrase: &[String]) -> usize {
    if !tokens.iter().any(|t| t.is_label(label)) {
        return 0;
    }
    let mut count = 0;
    for tok in std::mem::take(tokens) {
        if tok.is_label(label) {
            tokens.extend(words(phrase));
            count += 1;
        } else {
            tokens.push(tok);
        }
    }
    count
}

fn lower_words(tokens: &mut [Token]) {
    for tok in tokens {
        if let Token::Word(w) = tok {
            *w = w.to_lowercase();
        }
    }
}

fn word_count(tokens: &[Token]) -> usize {
    tokens.iter().filter(|t| t.as_word().is_some()).count()
}

/// A single recognized word sequence.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub tokens: Vec<Token>,
}

impl Utterance {
    /// Split `text` on whitespace into plain words.
    pub fn new(text: &str) -> Self {
        Self {
            tokens: text.split_whitespace().map(Token::word).collect(),
        }
    }

    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Printed form of every token, labels included.
    pub fn texts(&self) -> Vec<&str> {
        self.tokens.iter().map(Token::text).collect()
    }
}

impl fmt::Display for Utterance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.texts().join(" "))
    }
}

impl Abstractable for Utterance {
    fn token_count(&self) -> usize {
        word_count(&self.tokens)
    }

    fn contains_phrase(&self, phrase: &[String]) -> bool {
        contains(&self.tokens, phrase)
    }

    fn replace(&mut self, phrase: &[String], replacement: &[String]) -> usize {
        substitute(&mut self.tokens, phrase, || words(replacement))
    }

    fn phrase_to_category_label(&mut self, phrase: &[String], label: &str) -> usize {
        substitute(&mut self.tokens, phrase, || vec![label_token(phrase, label)])
    }

    fn phrase_to_canonical(&mut self, phrase: &[String], value: &str) -> usize {
        substitute(&mut self.tokens, phrase, || vec![canonical_token(value)])
    }

    fn canonical_to_category_label(&mut self, label: &str) -> usize {
        relabel_canonical(&mut self.tokens, label)
    }

    fn category_label_to_phrase(&mut self, label: &str, phrase: &[String]) -> usize {
        restore_label(&mut self.tokens, label, phrase)
    }

    fn lower(&mut self) {
        lower_words(&mut self.tokens);
    }
}

/// An utterance paired with its recognizer probability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UtteranceHyp {
    pub prob: f64,
    pub utterance: Utterance,
}

impl UtteranceHyp {
    pub fn new(prob: f64, utterance: Utterance) -> Self {
        Self { prob, utterance }
    }
}

impl Abstractable for UtteranceHyp {
    fn token_count(&self) -> usize {
        self.utterance.token_count()
    }

    fn contains_phrase(&self, phrase: &[String]) -> bool {
        self.utterance.contains_phrase(phrase)
    }

    fn replace(&mut self, phrase: &[String], replacement: &[String]) -> usize {
        self.utterance.replace(phrase, replacement)
    }

    fn phrase_to_category_label(&mut self, phrase: &[String], label: &str) -> usize {
        self.utterance.phrase_to_category_label(phrase, label)
    }

    fn phrase_to_canonical(&mut self, phrase: &[String], value: &str) -> usize {
        self.utterance.phrase_to_canonical(phrase, value)
    }

    fn canonical_to_category_label(&mut self, label: &str) -> usize {
        self.utterance.canonical_to_category_label(label)
    }

    fn category_label_to_phrase(&mut self, label: &str, phrase: &[String]) -> usize {
        self.utterance.category_label_to_phrase(label, phrase)
    }

    fn lower(&mut self) {
        self.utterance.lower();
    }
}

/// Competing recognition hypotheses, best first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UtteranceNBList {
    pub hyps: Vec<UtteranceHyp>,
}

impl UtteranceNBList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, prob: f64, utterance: Utterance) {
        self.hyps.push(UtteranceHyp::new(prob, utterance));
    }

    pub fn len(&self) -> usize {
        self.hyps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hyps.is_empty()
    }
}

impl Abstractable for UtteranceNBList {
    fn token_count(&self) -> usize {
        self.hyps.iter().map(Abstractable::token_count).sum()
    }

    fn contains_phrase(&self, phrase: &[String]) -> bool {
        self.hyps.iter().any(|h| h.contains_phrase(phrase))
    }

    fn replace(&mut self, phrase: &[String], replacement: &[String]) -> usize {
        self.hyps
            .iter_mut()
            .map(|h| h.replace(phrase, replacement))
            .sum()
    }

    fn phrase_to_category_label(&mut self, phrase: &[String], label: &str) -> usize {
        self.hyps
            .iter_mut()
            .map(|h| h.phrase_to_category_label(phrase, label))
            .sum()
    }

    fn phrase_to_canonical(&mut self, phrase: &[String], value: &str) -> usize {
        self.hyps
            .iter_mut()
            .map(|h| h.phrase_to_canonical(phrase, value))
            .sum()
    }

    fn canonical_to_category_label(&mut self, label: &str) -> usize {
        self.hyps
            .iter_mut()
            .map(|h| h.canonical_to_category_label(label))
            .sum()
    }

    fn category_label_to_phrase(&mut self, label: &str, phrase: &[String]) -> usize {
        self.hyps
            .iter_mut()
            .map(|h| h.category_label_to_phrase(label, phrase))
            .sum()
    }

    fn lower(&mut self) {
        for hyp in &mut self.hyps {
            hyp.lower();
        }
    }
}

/// One arc of a confusion network. An arc with no tokens is an epsilon arc.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WordArc {
    pub prob: f64,
    pub tokens: Vec<Token>,
}

impl WordArc {
    pub fn new(prob: f64, word: &str) -> Self {
        Self {
            prob,
            tokens: vec![Token::word(word)],
        }
    }

    pub fn is_epsilon(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// A sequence of positions, each holding competing arcs.
///
/// A phrase occurs when consecutive positions each offer an arc whose words
/// continue it. An occurrence may start and end anywhere inside an arc, so a
/// multi-word arc (`i am` after normalization) matches like the words of an
/// utterance would.
///
/// Rewriting an occurrence puts the replacement on the first matched arc,
/// after any words that precede the match there. Fully consumed arcs after
/// the first become epsilon arcs carrying the joint probability; words that
/// follow the match in the last arc stay on it with the arc's own
/// probability. Positions left with epsilon arcs only are dropped.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UtteranceConfusionNetwork {
    pub positions: Vec<Vec<WordArc>>,
}

/// One occurrence of a phrase in a confusion network.
struct Span {
    /// `(position, arc)` pairs the occurrence crosses.
    steps: Vec<(usize, usize)>,
    /// Token offset of the first matched word in the first arc.
    start: usize,
    /// Token offset just past the last matched word in the last arc.
    end: usize,
}

fn words_match(tokens: &[Token], words: &[String]) -> bool {
    tokens.len() == words.len()
        && tokens
            .iter()
            .zip(words)
            .all(|(tok, word)| tok.as_word() == Some(word.as_str()))
}

impl UtteranceConfusionNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_position(&mut self, arcs: Vec<WordArc>) {
        self.positions.push(arcs);
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn arcs(&self) -> impl Iterator<Item = &WordArc> + '_ {
        self.positions.iter().flatten()
    }

    /// Match `rest` from the first token of an arc at `pos`; returns the end
    /// offset in the last arc.
    fn extend_path(
        &self,
        pos: usize,
        rest: &[String],
        steps: &mut Vec<(usize, usize)>,
    ) -> Option<usize> {
        let arcs = self.positions.get(pos)?;
        for (arc_idx, arc) in arcs.iter().enumerate() {
            let n = arc.tokens.len().min(rest.len());
            if n == 0 || !words_match(&arc.tokens[..n], &rest[..n]) {
                continue;
            }
            steps.push((pos, arc_idx));
            if n == rest.len() {
                return Some(n);
            }
            if let Some(end) = self.extend_path(pos + 1, &rest[n..], steps) {
                return Some(end);
            }
            steps.pop();
        }
        None
    }

    fn span_at(
        &self,
        pos: usize,
        arc_idx: usize,
        start: usize,
        phrase: &[String],
    ) -> Option<Span> {
        let tail = &self.positions[pos][arc_idx].tokens[start..];
        let n = tail.len().min(phrase.len());
        if n == 0 || !words_match(&tail[..n], &phrase[..n]) {
            return None;
        }
        let mut steps = vec![(pos, arc_idx)];
        let end = if n == phrase.len() {
            start + n
        } else {
            self.extend_path(pos + 1, &phrase[n..], &mut steps)?
        };
        Some(Span { steps, start, end })
    }

    /// Leftmost occurrence starting at or after position `from`. In arc `i`
    /// of `from`, the search starts at token offset `resume[i]` (0 if absent).
    fn find_span(&self, phrase: &[String], from: usize, resume: &[usize]) -> Option<Span> {
        if phrase.is_empty() {
            return None;
        }
        (from..self.positions.len()).find_map(|pos| {
            self.positions[pos]
                .iter()
                .enumerate()
                .find_map(|(arc_idx, arc)| {
                    let first = if pos == from {
                        resume.get(arc_idx).copied().unwrap_or(0)
                    } else {
                        0
                    };
                    (first..arc.tokens.len())
                        .find_map(|start| self.span_at(pos, arc_idx, start, phrase))
                })
        })
    }

    fn substitute<F>(&mut self, phrase: &[String], mut make: F) -> usize
    where
        F: FnMut() -> Vec<Token>,
    {
        let mut count = 0;
        let mut from = 0;
        // Replaced words are never scanned again.
        let mut resume: Vec<usize> = Vec::new();
        while let Some(span) = self.find_span(phrase, from, &resume) {
            let (first, first_arc) = span.steps[0];
            if first != from {
                from = first;
                resume.clear();
            }
            let prob: f64 = span
                .steps
                .iter()
                .map(|&(pos, arc_idx)| self.positions[pos][arc_idx].prob)
                .product();
            let replacement = make();
            let resume_at = span.start + replacement.len();
            let mut replacement = Some(replacement);
            let last_step = span.steps.len() - 1;
            for (step, &(pos, arc_idx)) in span.steps.iter().enumerate() {
                let arc = &mut self.positions[pos][arc_idx];
                let tail = if step == last_step {
                    arc.tokens.split_off(span.end)
                } else {
                    Vec::new()
                };
                if step == 0 {
                    arc.tokens.truncate(span.start);
                    arc.tokens.extend(replacement.take().into_iter().flatten());
                    arc.prob = prob;
                } else {
                    arc.tokens.clear();
                    if tail.is_empty() {
                        arc.prob = prob;
                    }
                }
                arc.tokens.extend(tail);
            }
            count += 1;

            let last = span.steps[last_step].0;
            if self.prune(first, last) {
                resume.clear();
            } else {
                if resume.len() <= first_arc {
                    resume.resize(first_arc + 1, 0);
                }
                resume[first_arc] = resume_at;
            }
        }
        count
    }

    /// Drop epsilon-only positions in `first..=last`; true when `first` went.
    fn prune(&mut self, first: usize, last: usize) -> bool {
        let mut removed_first = false;
        for pos in (first..=last).rev() {
            if self.positions[pos].iter().all(WordArc::is_epsilon) {
                self.positions.remove(pos);
                removed_first |= pos == first;
            }
        }
        removed_first
    }
}

impl Abstractable for UtteranceConfusionNetwork {
    fn token_count(&self) -> usize {
        self.arcs().map(|arc| word_count(&arc.tokens)).sum()
    }

    fn contains_phrase(&self, phrase: &[String]) -> bool {
        self.find_span(phrase, 0, &[]).is_some()
    }

    fn replace(&mut self, phrase: &[String], replacement: &[String]) -> usize {
        self.substitute(phrase, || words(replacement))
    }

    fn phrase_to_category_label(&mut self, phrase: &[String], label: &str) -> usize {
        self.substitute(phrase, || vec![label_token(phrase, label)])
    }

    fn phrase_to_canonical(&mut self, phrase: &[String], value: &str) -> usize {
        self.substitute(phrase, || vec![canonical_token(value)])
    }

    fn canonical_to_category_label(&mut self, label: &str) -> usize {
        self.positions
            .iter_mut()
            .flatten()
            .map(|arc| relabel_canonical(&mut arc.tokens, label))
            .sum()
    }

    fn category_label_to_phrase(&mut self, label: &str, phrase: &[String]) -> usize {
        self.positions
            .iter_mut()
            .flatten()
            .map(|arc| restore_label(&mut arc.tokens, label, phrase))
            .sum()
    }

    fn lower(&mut self) {
        for arc in self.positions.iter_mut().flatten() {
            lower_words(&mut arc.tokens);
        }
    }
}

/// The value and surface wording a category label stands for.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ValueForm {
    pub value: String,
    pub surface: Vec<String>,
}

/// Category label → (value, surface form) mapping produced by one forward
/// substitution and consumed by the matching restoration.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryLabels(BTreeMap<String, ValueForm>);

impl CategoryLabels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        label: impl Into<String>,
        value: impl Into<String>,
        surface: Vec<String>,
    ) {
        self.0.insert(
            label.into(),
            ValueForm {
                value: value.into(),
                surface,
            },
        );
    }

    pub fn get(&self, label: &str) -> Option<&ValueForm> {
        self.0.get(label)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValueForm)> + '_ {
        self.0.iter().map(|(label, vf)| (label.as_str(), vf))
    }

    /// Invert to value → label. When several labels share a value the
    /// lexicographically first label wins (`CITY` before `CITY-1`).
    pub fn label_for_value(&self) -> HashMap<&str, &str> {
        let mut out = HashMap::new();
        for (label, vf) in self.iter() {
            out.entry(vf.value.as_str()).or_insert(label);
        }
        out
    }
}

/// One semantic item: a dialogue-act type with an optional slot and value.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct DialogueActItem {
    pub dat: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// The literal value replaced by a category label, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orig_value: Option<String>,
}

impl DialogueActItem {
    pub fn new(dat: impl Into<String>, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            dat: dat.into(),
            name: Some(name.into()),
            value: Some(value.into()),
            orig_value: None,
        }
    }

    pub fn bare(dat: impl Into<String>) -> Self {
        Self {
            dat: dat.into(),
            ..Self::default()
        }
    }

    /// Swap the value for `label`, remembering the literal value.
    pub fn value_to_category_label(&mut self, label: &str) {
        if let Some(value) = self.value.replace(label.to_string()) {
            self.orig_value = Some(value);
        }
    }

    /// Swap a recorded label back to its surface wording. Values that are not
    /// labels in `labels` are left untouched.
    pub fn category_label_to_value(&mut self, labels: &CategoryLabels) -> bool {
        let Some(vf) = self.value.as_deref().and_then(|v| labels.get(v)) else {
            return false;
        };
        self.value = Some(vf.surface.join(" "));
        self.orig_value = None;
        true
    }
}

impl fmt::Display for DialogueActItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, &self.value) {
            (Some(name), Some(value)) => write!(f, "{}({}=\"{}\")", self.dat, name, value),
            (Some(name), None) => write!(f, "{}({})", self.dat, name),
            _ => write!(f, "{}()", self.dat),
        }
    }
}

/// A semantic annotation: a conjunction of dialogue-act items.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct DialogueAct {
    pub items: Vec<DialogueActItem>,
}

impl DialogueAct {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: DialogueActItem) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<DialogueActItem> for DialogueAct {
    fn from_iter<I: IntoIterator<Item = DialogueActItem>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for DialogueAct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.items.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join("&"))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DialogueActHyp {
    pub prob: f64,
    pub da: DialogueAct,
}

/// Competing dialogue acts, best first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogueActNBList {
    pub hyps: Vec<DialogueActHyp>,
}

impl DialogueActNBList {
    pub fn push(&mut self, prob: f64, da: DialogueAct) {
        self.hyps.push(DialogueActHyp { prob, da });
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DaiHyp {
    pub prob: f64,
    pub dai: DialogueActItem,
}

/// Independent dialogue-act items, each with its own probability.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogueActConfusionNetwork {
    pub items: Vec<DaiHyp>,
}

impl DialogueActConfusionNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item, summing probabilities (capped at 1) with an equal one.
    pub fn add_merge(&mut self, prob: f64, dai: DialogueActItem) {
        match self.items.iter_mut().find(|h| h.dai == dai) {
            Some(existing) => existing.prob = (existing.prob + prob).min(1.0),
            None => self.items.push(DaiHyp { prob, dai }),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phrase(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn replaces_every_occurrence_in_utterance() {
        let mut utt = Utterance::new("to praha and back to praha");
        let n = utt.replace(&phrase("praha"), &phrase("Prague"));
        assert_eq!(n, 2);
        assert_eq!(utt.to_string(), "to Prague and back to Prague");
    }

    #[test]
    fn labels_are_not_matched_as_words() {
        let mut utt = Utterance::new("from CITY to praha");
        utt.phrase_to_category_label(&phrase("praha"), "CITY");
        assert!(utt.contains_phrase(&phrase("CITY")));
        assert_eq!(utt.token_count(), 3);
        assert!(!utt.contains_phrase(&phrase("to CITY")));
    }

    #[test]
    fn restores_label_to_phrase() {
        let mut utt = Utterance::new("go to karlovy vary");
        utt.phrase_to_category_label(&phrase("karlovy vary"), "CITY");
        assert_eq!(utt.texts(), vec!["go", "to", "CITY"]);
        let n = utt.category_label_to_phrase("CITY", &phrase("karlovy vary"));
        assert_eq!(n, 1);
        assert_eq!(utt, Utterance::new("go to karlovy vary"));
    }

    #[test]
    fn deletion_with_empty_replacement() {
        let mut utt = Utterance::new("um i um want");
        assert_eq!(utt.replace(&phrase("um"), &[]), 2);
        assert_eq!(utt.to_string(), "i want");
    }

    #[test]
    fn nblist_sums_counts_over_hypotheses() {
        let mut nblist = UtteranceNBList::new();
        nblist.push(0.7, Utterance::new("to praha"));
        nblist.push(0.2, Utterance::new("to prada"));
        nblist.push(0.1, Utterance::new("praha praha"));
        assert_eq!(nblist.token_count(), 6);
        assert_eq!(nblist.replace(&phrase("praha"), &phrase("x")), 3);
    }

    fn confnet(layout: &[&[(f64, &str)]]) -> UtteranceConfusionNetwork {
        let mut cn = UtteranceConfusionNetwork::new();
        for arcs in layout {
            cn.push_position(arcs.iter().map(|(p, w)| WordArc::new(*p, w)).collect());
        }
        cn
    }

    #[test]
    fn confnet_matches_across_positions() {
        let cn = confnet(&[
            &[(1.0, "to")],
            &[(0.6, "karlovy"), (0.4, "carlo")],
            &[(0.9, "vary"), (0.1, "very")],
        ]);
        assert!(cn.contains_phrase(&phrase("karlovy vary")));
        assert!(cn.contains_phrase(&phrase("carlo very")));
        assert!(!cn.contains_phrase(&phrase("vary to")));
        assert_eq!(cn.token_count(), 5);
    }

    #[test]
    fn confnet_replace_merges_span() {
        let mut cn = confnet(&[
            &[(1.0, "to")],
            &[(1.0, "karlovy")],
            &[(0.5, "vary"), (0.5, "very")],
        ]);
        let n = cn.phrase_to_category_label(&phrase("karlovy vary"), "CITY");
        assert_eq!(n, 1);
        assert_eq!(cn.len(), 3);
        assert!(cn.positions[2][0].is_epsilon());
        assert_eq!(cn.positions[2][0].prob, 0.5);

        let mut cn = confnet(&[&[(1.0, "to")], &[(1.0, "karlovy")], &[(1.0, "vary")]]);
        cn.phrase_to_category_label(&phrase("karlovy vary"), "CITY");
        assert_eq!(cn.len(), 2);
        assert!(cn.positions[1][0].tokens[0].is_label("CITY"));
    }

    fn arc(prob: f64, text: &str) -> WordArc {
        WordArc {
            prob,
            tokens: text.split_whitespace().map(Token::word).collect(),
        }
    }

    #[test]
    fn relabels_only_canonicalized_tokens() {
        let mut utt = Utterance::new("seven or 7:00");
        assert_eq!(utt.phrase_to_canonical(&phrase("seven"), "7:00"), 1);
        assert!(utt.contains_phrase(&phrase("7:00")));
        assert!(!utt.contains_phrase(&phrase("7:00 or")));
        assert_eq!(utt.token_count(), 2);

        assert_eq!(utt.canonical_to_category_label("TIME"), 1);
        assert_eq!(utt.texts(), vec!["TIME", "or", "7:00"]);
        assert_eq!(
            utt.tokens[0],
            Token::Label {
                label: "TIME".to_string(),
                abstracts: phrase("7:00"),
            }
        );
        assert_eq!(utt.canonical_to_category_label("TIME"), 0);
    }

    #[test]
    fn confnet_matches_inside_multi_word_arcs() {
        let mut cn = UtteranceConfusionNetwork::new();
        cn.push_position(vec![arc(0.9, "i am")]);
        cn.push_position(vec![arc(0.8, "praha"), arc(0.2, "prada")]);
        assert!(Utterance::new("i am praha").contains_phrase(&phrase("am praha")));
        assert!(cn.contains_phrase(&phrase("am praha")));
        assert!(cn.contains_phrase(&phrase("i am")));
        assert!(!cn.contains_phrase(&phrase("i praha")));

        assert_eq!(cn.phrase_to_category_label(&phrase("am praha"), "X"), 1);
        assert_eq!(cn.len(), 2);
        let first = &cn.positions[0][0];
        assert_eq!(first.tokens[0].text(), "i");
        assert!(first.tokens[1].is_label("X"));
        assert!((first.prob - 0.72).abs() < 1e-9);
        assert!(cn.positions[1][0].is_epsilon());
        assert_eq!(cn.positions[1][1].tokens[0].text(), "prada");
    }

    #[test]
    fn confnet_match_may_end_inside_an_arc() {
        let mut cn = UtteranceConfusionNetwork::new();
        cn.push_position(vec![arc(0.5, "go to")]);
        cn.push_position(vec![arc(0.4, "praha now"), arc(0.6, "prada")]);
        assert_eq!(cn.replace(&phrase("to praha"), &phrase("X")), 1);
        let first = &cn.positions[0][0];
        assert_eq!(first.tokens, vec![Token::word("go"), Token::word("X")]);
        assert!((first.prob - 0.2).abs() < 1e-9);
        let last = &cn.positions[1][0];
        assert_eq!(last.tokens, vec![Token::word("now")]);
        assert_eq!(last.prob, 0.4);
    }

    #[test]
    fn confnet_replaces_every_occurrence_in_one_arc() {
        let mut cn = UtteranceConfusionNetwork::new();
        cn.push_position(vec![arc(1.0, "um a um")]);
        assert_eq!(cn.replace(&phrase("um"), &[]), 2);
        assert_eq!(cn.positions[0][0].tokens, vec![Token::word("a")]);

        let mut cn = UtteranceConfusionNetwork::new();
        cn.push_position(vec![arc(1.0, "a b a")]);
        assert_eq!(cn.replace(&phrase("a"), &phrase("a a")), 2);
        let texts: Vec<&str> = cn.positions[0][0].tokens.iter().map(Token::text).collect();
        assert_eq!(texts, vec!["a", "a", "b", "a", "a"]);
    }

    #[test]
    fn confnet_deletion_drops_empty_positions() {
        let mut cn = confnet(&[&[(1.0, "um")], &[(1.0, "um")], &[(0.7, "um"), (0.3, "a")]]);
        assert_eq!(cn.replace(&phrase("um"), &[]), 3);
        assert_eq!(cn.len(), 1);
        assert_eq!(cn.positions[0].len(), 2);
        assert!(cn.positions[0][0].is_epsilon());
    }

    #[test]
    fn dialogue_act_item_label_round_trip() {
        let mut dai = DialogueActItem::new("inform", "city", "Prague");
        dai.value_to_category_label("CITY");
        assert_eq!(dai.value.as_deref(), Some("CITY"));
        assert_eq!(dai.orig_value.as_deref(), Some("Prague"));

        let mut labels = CategoryLabels::new();
        labels.insert("CITY", "Prague", phrase("praha"));
        assert!(dai.category_label_to_value(&labels));
        assert_eq!(dai.to_string(), "inform(city=\"praha\")");
    }

    #[test]
    fn inversion_prefers_first_label() {
        let mut labels = CategoryLabels::new();
        labels.insert("CITY-1", "Prague", phrase("prague"));
        labels.insert("CITY", "Prague", phrase("praha"));
        assert_eq!(labels.label_for_value().get("Prague"), Some(&"CITY"));
    }

    #[test]
    fn dai_confnet_merges_equal_items() {
        let mut cn = DialogueActConfusionNetwork::new();
        cn.add_merge(0.6, DialogueActItem::new("inform", "city", "CITY"));
        cn.add_merge(0.7, DialogueActItem::new("inform", "city", "CITY"));
        assert_eq!(cn.len(), 1);
        assert_eq!(cn.items[0].prob, 1.0);
    }
}
