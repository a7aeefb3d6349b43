//! Named filter fragments multiplexed onto a single layer filter.
//!
//! A style layer has exactly one filter slot. Several independent callers
//! (a search box, a date slider, a category toggle) each want their own
//! condition on the same layer, so each owns a named fragment and the layer's
//! applied filter is always the `"all"` of every fragment it currently has.
//!
//! ```text
//! "default" ─► ["==", "kind", "park"]  ─┐
//! "extra"   ─► [">", "area", 1000]     ─┼─► ["all", [...], [...]]  ─► set_filter
//! ```
//!
//! Fragment order is the order in which fragment names were first inserted.

use std::collections::HashMap;

use serde_json::Value;

/// Fragment name used when the caller does not pick one.
pub const DEFAULT_FILTER_NAME: &str = "default";

/// The named fragments of one layer, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterFragments {
    fragments: Vec<(String, Value)>,
}

impl FilterFragments {
    /// Insert or replace a fragment. A replaced fragment keeps its position.
    pub fn upsert(&mut self, name: &str, expression: Value) {
        match self.fragments.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = expression,
            None => self.fragments.push((name.to_string(), expression)),
        }
    }

    /// Remove a fragment, returning its expression if it existed.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let position = self.fragments.iter().position(|(n, _)| n == name)?;
        Some(self.fragments.remove(position).1)
    }

    /// Look up a fragment by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fragments
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, expression)| expression)
    }

    /// Iterate `(name, expression)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fragments.iter().map(|(n, e)| (n.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// The combined filter: `["all", f1, f2, ...]`.
    ///
    /// Returns `None` when there are no fragments; the layer's filter is then
    /// cleared rather than set to a zero-term `"all"`.
    pub fn conjunction(&self) -> Option<Value> {
        if self.fragments.is_empty() {
            return None;
        }
        let mut terms = Vec::with_capacity(self.fragments.len() + 1);
        terms.push(Value::String("all".to_string()));
        terms.extend(self.fragments.iter().map(|(_, e)| e.clone()));
        Some(Value::Array(terms))
    }
}

/// Fragments for every layer the component has filtered.
#[derive(Debug, Clone, Default)]
pub struct FilterTable {
    layers: HashMap<String, FilterFragments>,
}

impl FilterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a fragment, creating the layer's entry on first use.
    ///
    /// Returns the layer's new combined filter.
    pub fn upsert(&mut self, layer_id: &str, name: &str, expression: Value) -> Option<Value> {
        let fragments = self.layers.entry(layer_id.to_string()).or_default();
        fragments.upsert(name, expression);
        fragments.conjunction()
    }

    /// Remove a fragment from a layer that already has an entry.
    ///
    /// Returns `None` if the layer has no entry at all, otherwise
    /// `Some(combined)` where `combined` is the recomputed filter. Dropping
    /// the last fragment also drops the layer's entry.
    pub fn remove(&mut self, layer_id: &str, name: &str) -> Option<Option<Value>> {
        let fragments = self.layers.get_mut(layer_id)?;
        fragments.remove(name);
        let combined = fragments.conjunction();
        if fragments.is_empty() {
            self.layers.remove(layer_id);
        }
        Some(combined)
    }

    /// Drop every fragment of a layer, returning what was stored.
    pub fn clear_layer(&mut self, layer_id: &str) -> Option<FilterFragments> {
        self.layers.remove(layer_id)
    }

    /// Fragments for one layer.
    pub fn get(&self, layer_id: &str) -> Option<&FilterFragments> {
        self.layers.get(layer_id)
    }

    /// Whether the layer has an entry.
    pub fn contains(&self, layer_id: &str) -> bool {
        self.layers.contains_key(layer_id)
    }

    /// Combined filter for one layer, if it has any fragments.
    pub fn conjunction(&self, layer_id: &str) -> Option<Value> {
        self.layers.get(layer_id).and_then(FilterFragments::conjunction)
    }

    /// Iterate `(layer_id, fragments)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterFragments)> {
        self.layers.iter().map(|(id, f)| (id.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_conjunction_in_insertion_order() {
        let mut table = FilterTable::new();
        table.upsert("L", DEFAULT_FILTER_NAME, json!(["==", "a", 1]));
        let combined = table.upsert("L", "extra", json!(["==", "b", 2]));

        assert_eq!(
            combined,
            Some(json!(["all", ["==", "a", 1], ["==", "b", 2]]))
        );
    }

    #[test]
    fn test_upsert_keeps_position() {
        let mut fragments = FilterFragments::default();
        fragments.upsert("first", json!(1));
        fragments.upsert("second", json!(2));
        fragments.upsert("first", json!(3));

        let names: Vec<&str> = fragments.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(fragments.conjunction(), Some(json!(["all", 3, 2])));
    }

    #[test]
    fn test_remove_recomputes() {
        let mut table = FilterTable::new();
        table.upsert("L", "default", json!("A"));
        table.upsert("L", "extra", json!("B"));

        assert_eq!(table.remove("L", "extra"), Some(Some(json!(["all", "A"]))));
        assert!(table.contains("L"));
    }

    #[test]
    fn test_remove_last_fragment_clears_entry() {
        let mut table = FilterTable::new();
        table.upsert("L", "default", json!("A"));

        assert_eq!(table.remove("L", "default"), Some(None));
        assert!(!table.contains("L"));
        assert!(table.conjunction("L").is_none());
    }

    #[test]
    fn test_remove_without_entry() {
        let mut table = FilterTable::new();
        assert_eq!(table.remove("L", "default"), None);
    }

    #[test]
    fn test_clear_layer() {
        let mut table = FilterTable::new();
        table.upsert("L", "default", json!("A"));
        table.upsert("L", "extra", json!("B"));
        table.upsert("M", "default", json!("C"));

        let cleared = table.clear_layer("L").map(|f| f.len());
        assert_eq!(cleared, Some(2));
        assert!(!table.contains("L"));
        assert_eq!(table.conjunction("M"), Some(json!(["all", "C"])));
        assert!(table.clear_layer("L").is_none());
    }

    #[test]
    fn test_remove_unknown_name_keeps_filter() {
        let mut table = FilterTable::new();
        table.upsert("L", "default", json!("A"));

        assert_eq!(table.remove("L", "nope"), Some(Some(json!(["all", "A"]))));
    }
}
