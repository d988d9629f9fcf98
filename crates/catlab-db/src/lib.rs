//! Category-label database for SLU preprocessing.
//!
//! The source is a two-level JSON mapping `{slot: {value: [phrase, ...]}}`.
//! Each phrase is split on whitespace into a surface form, giving one
//! [`SynonymRecord`] per `(surface form, value, slot)` triple. Surface forms
//! shared by several slots or values (homonyms) are expected.
//!
//! Two derived indices are rebuilt synchronously at the end of every
//! [`CategoryLabelDatabase::load`], so they can never be read stale:
//! - [`CategoryLabelDatabase::by_form`]: one `(form, value, SLOT)` entry per
//!   record;
//! - [`CategoryLabelDatabase::grouped`]: one [`GroupedForm`] per distinct
//!   surface form, longest form first. Substitution scans this list in order,
//!   which is what makes longer matches win over shorter ones.
//!
//! Record order is load order (slot, value, phrase as they appear in the
//! source document) stably sorted by descending surface length.
//!
//! # Example
//! ```
//! use catlab_db::CategoryLabelDatabase;
//! use serde_json::json;
//!
//! let db = CategoryLabelDatabase::from_source(&json!({
//!     "city": {"Prague": ["prague", "praha"], "Karlovy Vary": ["karlovy vary"]},
//! }))
//! .unwrap();
//! assert_eq!(db.grouped()[0].form, vec!["karlovy", "vary"]);
//! assert_eq!(db.grouped()[0].preferred(), Some(("CITY", "Karlovy Vary")));
//! ```

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A surface form bound to a value of a slot, as loaded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SynonymRecord {
    pub form: Vec<String>,
    pub value: String,
    pub slot: String,
}

/// `(form, value, SLOT)` entry of the per-record index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FormValueSlot {
    pub form: Vec<String>,
    pub value: String,
    pub slot_upper: String,
}

/// All `(SLOT, [values])` bindings of one surface form.
///
/// Slots and their values are kept in database load order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GroupedForm {
    pub form: Vec<String>,
    pub slots: Vec<(String, Vec<String>)>,
}

impl GroupedForm {
    /// The binding a substitution commits to: the first slot in load order
    /// that has a value, and that slot's first value. `None` only for a group
    /// with no bindings, which the database never builds.
    pub fn preferred(&self) -> Option<(&str, &str)> {
        self.slots
            .iter()
            .find_map(|(slot, values)| Some((slot.as_str(), values.first()?.as_str())))
    }

    pub fn values_for(&self, slot_upper: &str) -> Option<&[String]> {
        self.slots
            .iter()
            .find(|(slot, _)| slot == slot_upper)
            .map(|(_, values)| values.as_slice())
    }

    /// True when the form is bound to more than one `(slot, value)` pair.
    pub fn is_homonym(&self) -> bool {
        self.slots.len() > 1 || self.slots.iter().any(|(_, values)| values.len() > 1)
    }
}

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("configuration error: database source must be an object of slots, got {0}")]
    NotAMapping(&'static str),
    #[error("configuration error: slot `{slot}` must map values to phrase lists, got {found}")]
    SlotNotAMapping { slot: String, found: &'static str },
    #[error("configuration error: `{slot}`/`{value}` must be a list of phrases, got {found}")]
    ValueNotAList {
        slot: String,
        value: String,
        found: &'static str,
    },
    #[error("configuration error: `{slot}`/`{value}` contains a non-string phrase")]
    PhraseNotAString { slot: String, value: String },
}

/// Slot/value/surface-form relation with its derived indices.
#[derive(Clone, Debug, Default)]
pub struct CategoryLabelDatabase {
    records: Vec<SynonymRecord>,
    by_form: Vec<FormValueSlot>,
    grouped: Vec<GroupedForm>,
}

impl CategoryLabelDatabase {
    /// An empty database; nothing will ever match against it.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_source(source: &Value) -> Result<Self, DatabaseError> {
        let mut db = Self::new();
        db.load(source)?;
        Ok(db)
    }

    /// Read and load a JSON database source file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut db = Self::new();
        db.load_file(path)?;
        Ok(db)
    }

    /// Replace the contents with `source` and rebuild both indices.
    ///
    /// The whole source is validated before anything is replaced, so a
    /// malformed source leaves the previous contents intact.
    pub fn load(&mut self, source: &Value) -> Result<(), DatabaseError> {
        let mut records = parse_source(source)?;
        records.sort_by_key(|r| Reverse(r.form.len()));

        self.by_form = build_by_form(&records);
        self.grouped = build_grouped(&records);
        self.records = records;
        info!(
            "category label database loaded: {} records, {} surface forms",
            self.records.len(),
            self.grouped.len()
        );
        Ok(())
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let source: Value =
            serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
        self.load(&source)
            .with_context(|| format!("load {}", path.display()))?;
        Ok(())
    }

    /// Synonym records, longest surface form first.
    pub fn iter(&self) -> impl Iterator<Item = &SynonymRecord> + '_ {
        self.records.iter()
    }

    pub fn by_form(&self) -> &[FormValueSlot] {
        &self.by_form
    }

    pub fn grouped(&self) -> &[GroupedForm] {
        &self.grouped
    }

    /// First record binding `value` to `slot_upper`, in index order.
    pub fn lookup_value(&self, slot_upper: &str, value: &str) -> Option<&FormValueSlot> {
        self.by_form
            .iter()
            .find(|e| e.value == value && e.slot_upper == slot_upper)
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn form_count(&self) -> usize {
        self.grouped.len()
    }

    pub fn homonyms(&self) -> impl Iterator<Item = &GroupedForm> + '_ {
        self.grouped.iter().filter(|g| g.is_homonym())
    }
}

fn parse_source(source: &Value) -> Result<Vec<SynonymRecord>, DatabaseError> {
    let slots = source
        .as_object()
        .ok_or(DatabaseError::NotAMapping(json_kind(source)))?;

    let mut records = Vec::new();
    for (slot, values) in slots {
        let values = values
            .as_object()
            .ok_or_else(|| DatabaseError::SlotNotAMapping {
                slot: slot.clone(),
                found: json_kind(values),
            })?;
        for (value, phrases) in values {
            let phrases = phrases
                .as_array()
                .ok_or_else(|| DatabaseError::ValueNotAList {
                    slot: slot.clone(),
                    value: value.clone(),
                    found: json_kind(phrases),
                })?;
            for phrase in phrases {
                let phrase = phrase
                    .as_str()
                    .ok_or_else(|| DatabaseError::PhraseNotAString {
                        slot: slot.clone(),
                        value: value.clone(),
                    })?;
                let form: Vec<String> = phrase.split_whitespace().map(str::to_string).collect();
                if form.is_empty() {
                    warn!("skipping empty phrase for {}/{}", slot, value);
                    continue;
                }
                records.push(SynonymRecord {
                    form,
                    value: value.clone(),
                    slot: slot.clone(),
                });
            }
        }
    }
    Ok(records)
}

fn build_by_form(records: &[SynonymRecord]) -> Vec<FormValueSlot> {
    records
        .iter()
        .map(|r| FormValueSlot {
            form: r.form.clone(),
            value: r.value.clone(),
            slot_upper: r.slot.to_uppercase(),
        })
        .collect()
}

fn build_grouped(records: &[SynonymRecord]) -> Vec<GroupedForm> {
    let mut grouped: Vec<GroupedForm> = Vec::new();
    let mut position: HashMap<&[String], usize> = HashMap::new();

    for record in records {
        let idx = *position.entry(record.form.as_slice()).or_insert_with(|| {
            grouped.push(GroupedForm {
                form: record.form.clone(),
                slots: Vec::new(),
            });
            grouped.len() - 1
        });
        let group = &mut grouped[idx];
        let slot_upper = record.slot.to_uppercase();
        match group.slots.iter_mut().find(|(slot, _)| *slot == slot_upper) {
            Some((_, values)) => {
                if !values.contains(&record.value) {
                    values.push(record.value.clone());
                }
            }
            None => group.slots.push((slot_upper, vec![record.value.clone()])),
        }
    }

    grouped.sort_by_key(|g| Reverse(g.form.len()));
    let homonyms = grouped.iter().filter(|g| g.is_homonym()).count();
    if homonyms > 0 {
        debug!("{} surface forms are shared by several slot values", homonyms);
    }
    grouped
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn words(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn groups_are_longest_first() {
        let db = CategoryLabelDatabase::from_source(&json!({
            "city": {"Vary": ["vary"], "Karlovy Vary": ["karlovy vary"]},
            "stop": {"Hlavni Nadrazi": ["hlavni nadrazi v karlovych varech"]},
        }))
        .unwrap();
        let lens: Vec<usize> = db.grouped().iter().map(|g| g.form.len()).collect();
        assert_eq!(lens, vec![5, 2, 1]);
        assert_eq!(db.record_count(), 3);
    }

    #[test]
    fn homonyms_keep_load_order() {
        let db = CategoryLabelDatabase::from_source(&json!({
            "stop": {"Brno": ["brno"]},
            "city": {"Brno": ["brno"], "Brno-venkov": ["brno"]},
        }))
        .unwrap();
        assert_eq!(db.form_count(), 1);
        let group = &db.grouped()[0];
        assert!(group.is_homonym());
        assert_eq!(group.preferred(), Some(("STOP", "Brno")));
        assert_eq!(
            group.values_for("CITY"),
            Some(&["Brno".to_string(), "Brno-venkov".to_string()][..])
        );
        assert_eq!(db.homonyms().count(), 1);
    }

    #[test]
    fn group_without_values_has_no_preferred_binding() {
        let empty = GroupedForm {
            form: words("praha"),
            slots: Vec::new(),
        };
        assert_eq!(empty.preferred(), None);

        let partial = GroupedForm {
            form: words("praha"),
            slots: vec![
                ("STOP".to_string(), Vec::new()),
                ("CITY".to_string(), vec!["Prague".to_string()]),
            ],
        };
        assert_eq!(partial.preferred(), Some(("CITY", "Prague")));
    }

    #[test]
    fn by_form_uppercases_slots() {
        let db = CategoryLabelDatabase::from_source(&json!({
            "city": {"Prague": ["prague", "praha"]},
        }))
        .unwrap();
        assert_eq!(db.by_form().len(), 2);
        assert!(db.by_form().iter().all(|e| e.slot_upper == "CITY"));
        let hit = db.lookup_value("CITY", "Prague").unwrap();
        assert_eq!(hit.form, words("prague"));
        assert!(db.lookup_value("STOP", "Prague").is_none());
    }

    #[test]
    fn reload_replaces_indices() {
        let mut db = CategoryLabelDatabase::from_source(&json!({
            "city": {"Prague": ["praha"]},
        }))
        .unwrap();
        db.load(&json!({"time": {"7:00": ["seven"]}})).unwrap();
        assert_eq!(db.form_count(), 1);
        assert_eq!(db.grouped()[0].form, words("seven"));
        assert_eq!(db.by_form()[0].slot_upper, "TIME");
        assert!(db.lookup_value("CITY", "Prague").is_none());
    }

    #[test]
    fn malformed_source_is_rejected_without_partial_load() {
        let mut db = CategoryLabelDatabase::from_source(&json!({
            "city": {"Prague": ["praha"]},
        }))
        .unwrap();

        let err = db.load(&json!(["praha"])).unwrap_err();
        assert!(matches!(err, DatabaseError::NotAMapping(_)));
        let err = db.load(&json!({"city": ["praha"]})).unwrap_err();
        assert!(matches!(err, DatabaseError::SlotNotAMapping { .. }));
        let err = db
            .load(&json!({"time": {"7:00": ["seven"]}, "city": {"Prague": "praha"}}))
            .unwrap_err();
        assert!(matches!(err, DatabaseError::ValueNotAList { .. }));
        let err = db.load(&json!({"city": {"Prague": [1]}})).unwrap_err();
        assert!(err.to_string().starts_with("configuration error"));

        assert_eq!(db.record_count(), 1);
        assert_eq!(db.grouped()[0].form, words("praha"));
    }

    #[test]
    fn blank_phrases_are_skipped() {
        let db = CategoryLabelDatabase::from_source(&json!({
            "city": {"Prague": ["  ", "praha"]},
        }))
        .unwrap();
        assert_eq!(db.record_count(), 1);
    }
}
