//! Forward (value → category label) and backward (label → surface wording)
//! substitution over any [`Abstractable`] representation.

use std::collections::HashMap;
use std::sync::Arc;

use catlab_db::CategoryLabelDatabase;
use catlab_normalize::Normalizer;
use catlab_types::{
    Abstractable, CategoryLabels, DialogueAct, DialogueActConfusionNetwork, DialogueActNBList,
};
use tracing::debug;

/// Replaces database values by their category labels and restores them.
///
/// The database is shared and read-only here; to pick up a reloaded
/// database build a new `SluPreprocessing` around it.
#[derive(Clone, Debug)]
pub struct SluPreprocessing {
    cldb: Arc<CategoryLabelDatabase>,
    normalizer: Normalizer,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
struct Coverage {
    total: usize,
    covered: usize,
    forms_scanned: usize,
}

impl SluPreprocessing {
    pub fn new(cldb: Arc<CategoryLabelDatabase>, normalizer: Normalizer) -> Self {
        Self { cldb, normalizer }
    }

    pub fn cldb(&self) -> &CategoryLabelDatabase {
        &self.cldb
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Lower-case and apply the normalization rules to a copy of `input`.
    pub fn normalize<T: Abstractable>(&self, input: &T) -> T {
        self.normalizer.normalize(input)
    }

    /// Replace every surface form found in `input` by a category label.
    ///
    /// Surface forms are tried longest first, so a longer form always wins
    /// over any shorter form inside it. A form bound to several slot values
    /// is resolved by [`catlab_db::GroupedForm::preferred`]. The first form
    /// matched for a slot gets the bare slot name as label (`CITY`); further
    /// forms of the same slot get `CITY-1`, `CITY-2`, ... The same form gets
    /// the same label in every hypothesis.
    ///
    /// Returns the rewritten copy together with the label → (value, surface)
    /// record needed to undo it.
    pub fn values_to_category_labels<T: Abstractable>(&self, input: &T) -> (T, CategoryLabels) {
        let (out, labels, _) = self.abstract_values(input);
        (out, labels)
    }

    fn abstract_values<T: Abstractable>(&self, input: &T) -> (T, CategoryLabels, Coverage) {
        let mut out = input.clone();
        let mut labels = CategoryLabels::new();
        let mut counters: HashMap<&str, usize> = HashMap::new();
        let mut coverage = Coverage {
            total: out.token_count(),
            ..Coverage::default()
        };
        if coverage.total == 0 {
            return (out, labels, coverage);
        }

        for group in self.cldb.grouped() {
            coverage.forms_scanned += 1;
            if !out.contains_phrase(&group.form) {
                continue;
            }

            let Some((slot_upper, value)) = group.preferred() else {
                continue;
            };
            let label = next_label(&mut counters, slot_upper);

            // Canonicalize first, then relabel the canonical tokens only.
            let occurrences = out.phrase_to_canonical(&group.form, value);
            let relabelled = out.canonical_to_category_label(&label);
            debug_assert_eq!(occurrences, relabelled);
            coverage.covered += occurrences * group.form.len();
            debug!(
                "'{}' -> {} ({} occurrences)",
                group.form.join(" "),
                label,
                occurrences
            );
            labels.insert(label, value, group.form.clone());

            if coverage.covered >= coverage.total {
                debug_assert_eq!(
                    coverage.covered, coverage.total,
                    "substituted more tokens than the input holds"
                );
                break;
            }
        }

        (out, labels, coverage)
    }

    /// Abstract `input` and align the paired dialogue act with the result.
    ///
    /// DA items whose value was matched in the input take that label. Items
    /// whose value was not matched still take their slot's label when the
    /// database binds the value to a slot named like the item's slot; all
    /// other items keep their literal value.
    pub fn values_to_category_labels_in_da<T: Abstractable>(
        &self,
        input: &T,
        da: &DialogueAct,
    ) -> (T, DialogueAct, CategoryLabels) {
        let (abstracted, labels) = self.values_to_category_labels(input);
        let label_for_value = labels.label_for_value();

        let mut da = da.clone();
        for dai in &mut da.items {
            let Some(value) = dai.value.clone() else {
                continue;
            };
            if let Some(label) = label_for_value.get(value.as_str()) {
                dai.value_to_category_label(label);
                continue;
            }
            let slot_upper = dai.name.as_deref().map(str::to_uppercase);
            if let Some(hit) = slot_upper.and_then(|slot| self.cldb.lookup_value(&slot, &value)) {
                debug!("{} labelled {} from the database", dai, hit.slot_upper);
                dai.value_to_category_label(&hit.slot_upper);
            }
        }

        (abstracted, da, labels)
    }

    /// Put the recorded surface wording back in place of each label.
    ///
    /// Labels with no entry in `labels` are left as they are.
    pub fn category_labels_to_values<T: Abstractable>(
        &self,
        input: &T,
        labels: &CategoryLabels,
    ) -> T {
        let mut out = input.clone();
        for (label, vf) in labels.iter() {
            out.category_label_to_phrase(label, &vf.surface);
        }
        out
    }

    pub fn category_labels_to_values_in_da(
        &self,
        da: &DialogueAct,
        labels: &CategoryLabels,
    ) -> DialogueAct {
        let mut da = da.clone();
        for dai in &mut da.items {
            dai.category_label_to_value(labels);
        }
        da
    }

    pub fn category_labels_to_values_in_da_nblist(
        &self,
        nblist: &DialogueActNBList,
        labels: &CategoryLabels,
    ) -> DialogueActNBList {
        let mut nblist = nblist.clone();
        for dai in nblist.hyps.iter_mut().flat_map(|h| h.da.items.iter_mut()) {
            dai.category_label_to_value(labels);
        }
        nblist
    }

    pub fn category_labels_to_values_in_da_confnet(
        &self,
        confnet: &DialogueActConfusionNetwork,
        labels: &CategoryLabels,
    ) -> DialogueActConfusionNetwork {
        let mut confnet = confnet.clone();
        for hyp in &mut confnet.items {
            hyp.dai.category_label_to_value(labels);
        }
        confnet
    }
}

fn next_label<'a>(counters: &mut HashMap<&'a str, usize>, slot_upper: &'a str) -> String {
    let idx = counters.entry(slot_upper).or_insert(0);
    let label = if *idx == 0 {
        slot_upper.to_string()
    } else {
        format!("{slot_upper}-{idx}")
    };
    *idx += 1;
    label
}
