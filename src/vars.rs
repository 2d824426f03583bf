//! Minimal per-target variable sets.
//!
//! The full variable machinery lives outside this core; the database
//! only needs enough of it to carry target-specific values such as
//! `.EXTRA_PREREQS` and to merge two sets when records are merged.
//! Insertion order is preserved so diagnostic output stays stable.

use indexmap::IndexMap;

/// An ordered set of variable definitions attached to a target.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VariableSet {
    entries: IndexMap<String, String>,
}

impl VariableSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or overwrite a variable.
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Look up a variable's value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Whether the set holds no definitions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold `other` into `self`; existing definitions win.
    pub fn merge(&mut self, other: Self) {
        for (name, value) in other.entries {
            self.entries.entry(name).or_insert(value);
        }
    }
}

/// Merge an optional set into an optional destination.
///
/// Used when two file records are merged: the destination's definitions
/// take priority, and a destination with no set of its own simply
/// adopts the source's.
pub fn merge_optional(into: &mut Option<VariableSet>, from: Option<VariableSet>) {
    match (into.as_mut(), from) {
        (Some(dst), Some(src)) => dst.merge(src),
        (None, Some(src)) => *into = Some(src),
        _ => {}
    }
}
