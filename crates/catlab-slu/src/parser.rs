use std::collections::HashSet;

use catlab_types::{
    Abstractable, DialogueActConfusionNetwork, DialogueActItem, Token, Utterance,
    UtteranceConfusionNetwork, UtteranceHyp, UtteranceNBList,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SluError {
    #[error("unsupported input in the SLU component: {0}")]
    UnsupportedInput(String),
    #[error("malformed {kind} input: {source}")]
    Malformed {
        kind: String,
        source: serde_json::Error,
    },
    #[error("{0} is not implemented by this parser")]
    NotImplemented(&'static str),
}

/// Recognizer output in any of the supported shapes.
///
/// On the wire an input is a JSON object tagged by `"kind"`:
/// `{"kind": "utterance", "tokens": ["to", "praha"]}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Input {
    Utterance(Utterance),
    UtteranceHyp(UtteranceHyp),
    #[serde(rename = "nblist")]
    NBList(UtteranceNBList),
    #[serde(rename = "confnet")]
    ConfNet(UtteranceConfusionNetwork),
}

impl Input {
    /// Decode a tagged JSON input. A missing or unknown `kind` is
    /// [`SluError::UnsupportedInput`].
    pub fn from_value(value: Value) -> Result<Self, SluError> {
        let kind = match value.get("kind") {
            Some(Value::String(kind)) => kind.clone(),
            Some(other) => return Err(SluError::UnsupportedInput(other.to_string())),
            None => return Err(SluError::UnsupportedInput("input without a kind".into())),
        };
        let malformed = |source| SluError::Malformed {
            kind: kind.clone(),
            source,
        };
        let input = match kind.as_str() {
            "utterance" => Input::Utterance(serde_json::from_value(value).map_err(malformed)?),
            "utterance_hyp" => {
                Input::UtteranceHyp(serde_json::from_value(value).map_err(malformed)?)
            }
            "nblist" => Input::NBList(serde_json::from_value(value).map_err(malformed)?),
            "confnet" => Input::ConfNet(serde_json::from_value(value).map_err(malformed)?),
            _ => return Err(SluError::UnsupportedInput(kind)),
        };
        Ok(input)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Input::Utterance(_) => "utterance",
            Input::UtteranceHyp(_) => "utterance_hyp",
            Input::NBList(_) => "nblist",
            Input::ConfNet(_) => "confnet",
        }
    }
}

impl Abstractable for Input {
    fn token_count(&self) -> usize {
        match self {
            Input::Utterance(x) => x.token_count(),
            Input::UtteranceHyp(x) => x.token_count(),
            Input::NBList(x) => x.token_count(),
            Input::ConfNet(x) => x.token_count(),
        }
    }

    fn contains_phrase(&self, phrase: &[String]) -> bool {
        match self {
            Input::Utterance(x) => x.contains_phrase(phrase),
            Input::UtteranceHyp(x) => x.contains_phrase(phrase),
            Input::NBList(x) => x.contains_phrase(phrase),
            Input::ConfNet(x) => x.contains_phrase(phrase),
        }
    }

    fn replace(&mut self, phrase: &[String], replacement: &[String]) -> usize {
        match self {
            Input::Utterance(x) => x.replace(phrase, replacement),
            Input::UtteranceHyp(x) => x.replace(phrase, replacement),
            Input::NBList(x) => x.replace(phrase, replacement),
            Input::ConfNet(x) => x.replace(phrase, replacement),
        }
    }

    fn phrase_to_category_label(&mut self, phrase: &[String], label: &str) -> usize {
        match self {
            Input::Utterance(x) => x.phrase_to_category_label(phrase, label),
            Input::UtteranceHyp(x) => x.phrase_to_category_label(phrase, label),
            Input::NBList(x) => x.phrase_to_category_label(phrase, label),
            Input::ConfNet(x) => x.phrase_to_category_label(phrase, label),
        }
    }

    fn phrase_to_canonical(&mut self, phrase: &[String], value: &str) -> usize {
        match self {
            Input::Utterance(x) => x.phrase_to_canonical(phrase, value),
            Input::UtteranceHyp(x) => x.phrase_to_canonical(phrase, value),
            Input::NBList(x) => x.phrase_to_canonical(phrase, value),
            Input::ConfNet(x) => x.phrase_to_canonical(phrase, value),
        }
    }

    fn canonical_to_category_label(&mut self, label: &str) -> usize {
        match self {
            Input::Utterance(x) => x.canonical_to_category_label(label),
            Input::UtteranceHyp(x) => x.canonical_to_category_label(label),
            Input::NBList(x) => x.canonical_to_category_label(label),
            Input::ConfNet(x) => x.canonical_to_category_label(label),
        }
    }

    fn category_label_to_phrase(&mut self, label: &str, phrase: &[String]) -> usize {
        match self {
            Input::Utterance(x) => x.category_label_to_phrase(label, phrase),
            Input::UtteranceHyp(x) => x.category_label_to_phrase(label, phrase),
            Input::NBList(x) => x.category_label_to_phrase(label, phrase),
            Input::ConfNet(x) => x.category_label_to_phrase(label, phrase),
        }
    }

    fn lower(&mut self) {
        match self {
            Input::Utterance(x) => x.lower(),
            Input::UtteranceHyp(x) => x.lower(),
            Input::NBList(x) => x.lower(),
            Input::ConfNet(x) => x.lower(),
        }
    }
}

/// A semantic parser over abstracted recognizer output.
///
/// Implementors override the entry points they support; the rest report
/// [`SluError::NotImplemented`]. [`SluParser::parse`] picks the entry point
/// from the shape of the input.
pub trait SluParser {
    fn parse_1_best(&self, _hyp: &UtteranceHyp) -> Result<DialogueActConfusionNetwork, SluError> {
        Err(SluError::NotImplemented("1-best parsing"))
    }

    fn parse_nblist(
        &self,
        _nblist: &UtteranceNBList,
    ) -> Result<DialogueActConfusionNetwork, SluError> {
        Err(SluError::NotImplemented("n-best list parsing"))
    }

    fn parse_confnet(
        &self,
        _confnet: &UtteranceConfusionNetwork,
    ) -> Result<DialogueActConfusionNetwork, SluError> {
        Err(SluError::NotImplemented("confusion network parsing"))
    }

    fn parse(&self, input: &Input) -> Result<DialogueActConfusionNetwork, SluError> {
        match input {
            Input::Utterance(utt) => self.parse_1_best(&UtteranceHyp::new(1.0, utt.clone())),
            Input::UtteranceHyp(hyp) => self.parse_1_best(hyp),
            Input::NBList(nblist) => self.parse_nblist(nblist),
            Input::ConfNet(confnet) => self.parse_confnet(confnet),
        }
    }
}

/// Reads slot values straight off the category labels in the input.
///
/// Every label token becomes `inform(slot="LABEL")`, where the slot is the
/// lower-cased label without its index suffix. Restoring the resulting
/// network with the forward pass's labels yields the literal values.
#[derive(Clone, Copy, Debug, Default)]
pub struct CategoryLabelParser;

impl CategoryLabelParser {
    fn items<'a>(tokens: impl Iterator<Item = &'a Token>) -> Vec<DialogueActItem> {
        tokens
            .filter_map(|tok| match tok {
                Token::Label { label, .. } => Some(inform(label)),
                Token::Word(_) | Token::Canonical(_) => None,
            })
            .collect()
    }
}

fn inform(label: &str) -> DialogueActItem {
    let slot = match label.rsplit_once('-') {
        Some((slot, idx)) if !idx.is_empty() && idx.bytes().all(|b| b.is_ascii_digit()) => slot,
        _ => label,
    };
    DialogueActItem::new("inform", slot.to_lowercase(), label)
}

impl SluParser for CategoryLabelParser {
    fn parse_1_best(&self, hyp: &UtteranceHyp) -> Result<DialogueActConfusionNetwork, SluError> {
        let mut out = DialogueActConfusionNetwork::new();
        let mut seen = HashSet::new();
        for dai in Self::items(hyp.utterance.tokens.iter()) {
            if seen.insert(dai.clone()) {
                out.add_merge(hyp.prob, dai);
            }
        }
        Ok(out)
    }

    fn parse_nblist(
        &self,
        nblist: &UtteranceNBList,
    ) -> Result<DialogueActConfusionNetwork, SluError> {
        let mut out = DialogueActConfusionNetwork::new();
        for hyp in &nblist.hyps {
            for item in self.parse_1_best(hyp)?.items {
                out.add_merge(item.prob, item.dai);
            }
        }
        Ok(out)
    }

    fn parse_confnet(
        &self,
        confnet: &UtteranceConfusionNetwork,
    ) -> Result<DialogueActConfusionNetwork, SluError> {
        let mut out = DialogueActConfusionNetwork::new();
        for arc in confnet.arcs() {
            for dai in Self::items(arc.tokens.iter()) {
                out.add_merge(arc.prob, dai);
            }
        }
        Ok(out)
    }
}
