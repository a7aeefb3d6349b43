//! The layer manager: bookkeeping between an application and its map.
//!
//! A [`LayerManager`] owns a pool of source and layer declarations and
//! tracks which of them it has materialized in the bound map ("active
//! custom" ids). Layers and sources that belong to the map's own style are
//! never touched unless the caller declared them.
//!
//! # Operations
//!
//! - Registry: [`add_sources`](LayerManager::add_sources),
//!   [`remove_sources`](LayerManager::remove_sources),
//!   [`add_layers`](LayerManager::add_layers),
//!   [`remove_layers`](LayerManager::remove_layers)
//! - Filters: [`update_layer_filter`](LayerManager::update_layer_filter),
//!   [`remove_layer_filter`](LayerManager::remove_layer_filter)
//! - Reconciliation: [`render_ordered_layers`](LayerManager::render_ordered_layers)
//! - Passthroughs: layout, paint and feature state setters
//!
//! Only `render_ordered_layers` reports failures. Every other operation is a
//! no-op when no map is bound, and logs rather than returns map rejections.
//!
//! # Example
//!
//! ```
//! use map_layer_manager::{HeadlessMap, LayerDeclaration, LayerManager, SourceDeclaration};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> map_layer_manager::Result<()> {
//! let mut manager = LayerManager::new(
//!     Some(HeadlessMap::new()),
//!     vec![SourceDeclaration::new("parks", json!({ "type": "geojson", "data": "parks.json" }))],
//!     vec![LayerDeclaration::new("parks-fill", "fill").with_source("parks")],
//! );
//!
//! let completion = manager.reconcile(&["parks-fill"], None, None)?;
//! manager.map_instance_mut().unwrap().render_frame();
//! completion.await?;
//!
//! assert_eq!(manager.active_custom_source_ids(), vec!["parks".to_string()]);
//! # Ok(())
//! # }
//! ```

mod completion;
mod reconcile;

pub use completion::{BoxFuture, ReconcileSummary, RenderCompletion};
pub use reconcile::LayerConfigs;

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::LayerManagerConfig;
use crate::declaration::{FeatureId, LayerDeclaration, SetterOptions, SourceDeclaration};
use crate::filter::{FilterTable, DEFAULT_FILTER_NAME};
use crate::map::MapHandle;
use crate::registry::{ActiveCustom, DeclarationTable};

/// Tracks and reconciles the sources and layers an application owns in a map.
///
/// All state is unsynchronized and owned by this instance. Mutating methods
/// take `&mut self`, so one instance serves one caller at a time.
#[derive(Debug)]
pub struct LayerManager<M> {
    map: Option<M>,
    sources: DeclarationTable<SourceDeclaration>,
    layers: DeclarationTable<LayerDeclaration>,
    active: ActiveCustom,
    filters: FilterTable,
    render_timeout: Option<Duration>,
}

impl<M: MapHandle> LayerManager<M> {
    /// Create a manager over an optional map with initial declarations.
    ///
    /// Passing `None` is allowed; the manager then ignores every mutation
    /// until a map is bound with [`bind_map`](Self::bind_map).
    pub fn new(
        map: Option<M>,
        sources: Vec<SourceDeclaration>,
        layers: Vec<LayerDeclaration>,
    ) -> Self {
        Self::with_config(map, LayerManagerConfig::new(sources, layers))
    }

    /// Create a manager from a [`LayerManagerConfig`].
    pub fn with_config(map: Option<M>, config: LayerManagerConfig) -> Self {
        Self {
            map,
            sources: config.sources.into_iter().collect(),
            layers: config.layers.into_iter().collect(),
            active: ActiveCustom::default(),
            filters: FilterTable::new(),
            render_timeout: config.render_timeout,
        }
    }

    /// Bind a map, returning the previously bound one.
    ///
    /// Active-custom ids and filter fragments describe the previous map, so
    /// they are reset. Declarations are kept.
    pub fn bind_map(&mut self, map: M) -> Option<M> {
        self.active = ActiveCustom::default();
        self.filters = FilterTable::new();
        self.map.replace(map)
    }

    /// The bound map, if any.
    pub fn map_instance(&self) -> Option<&M> {
        self.map.as_ref()
    }

    /// The bound map for direct manipulation, if any.
    pub fn map_instance_mut(&mut self) -> Option<&mut M> {
        self.map.as_mut()
    }

    /// Ids of layers currently materialized by this manager.
    pub fn active_custom_layer_ids(&self) -> Vec<String> {
        self.active.layer_ids()
    }

    /// Ids of sources currently materialized by this manager.
    pub fn active_custom_source_ids(&self) -> Vec<String> {
        self.active.source_ids()
    }

    /// Named filter fragments per layer.
    pub fn layers_filters(&self) -> &FilterTable {
        &self.filters
    }

    /// Registered source declarations.
    pub fn source_declarations(&self) -> &DeclarationTable<SourceDeclaration> {
        &self.sources
    }

    /// Registered layer declarations, including applied overrides.
    pub fn layer_declarations(&self) -> &DeclarationTable<LayerDeclaration> {
        &self.layers
    }

    /// Add sources to the map and register their declarations.
    ///
    /// Sources already present in the map are skipped entirely; their ids
    /// stay owned by whoever created them.
    pub fn add_sources(&mut self, new_sources: impl IntoIterator<Item = SourceDeclaration>) {
        let Some(map) = self.map.as_mut() else {
            return;
        };

        for source in new_sources {
            if map.has_source(&source.id) {
                debug!(source_id = %source.id, "Source already in map, skipping");
                continue;
            }
            match map.add_source(&source.id, &source.source) {
                Ok(()) => {
                    debug!(source_id = %source.id, "Added source");
                    self.active.mark_source(&source.id);
                    self.sources.upsert(source);
                }
                Err(e) => warn!(source_id = %source.id, error = %e, "Failed to add source"),
            }
        }
    }

    /// Remove sources from the map and forget their declarations.
    ///
    /// Ids not present in the map are skipped.
    pub fn remove_sources<I, S>(&mut self, source_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(map) = self.map.as_mut() else {
            return;
        };

        for source_id in source_ids {
            let source_id = source_id.as_ref();
            if !map.has_source(source_id) {
                continue;
            }
            match map.remove_source(source_id) {
                Ok(()) => {
                    debug!(source_id, "Removed source");
                    self.active.unmark_source(source_id);
                    self.sources.remove(source_id);
                }
                Err(e) => warn!(source_id, error = %e, "Failed to remove source"),
            }
        }
    }

    /// Add layers to the map and register their declarations.
    ///
    /// Each layer is inserted immediately below `before_layer_id` when given,
    /// otherwise on top. A layer the map rejects is not registered.
    pub fn add_layers(
        &mut self,
        new_layers: impl IntoIterator<Item = LayerDeclaration>,
        before_layer_id: Option<&str>,
    ) {
        let Some(map) = self.map.as_mut() else {
            return;
        };

        for layer in new_layers {
            match map.add_layer(&layer, before_layer_id) {
                Ok(()) => {
                    debug!(layer_id = %layer.id, before = ?before_layer_id, "Added layer");
                    self.active.mark_layer(&layer.id);
                    self.layers.upsert(layer);
                }
                Err(e) => warn!(layer_id = %layer.id, error = %e, "Failed to add layer"),
            }
        }
    }

    /// Remove layers from the map and forget their declarations and filter
    /// fragments.
    ///
    /// Ids not present in the map are skipped.
    pub fn remove_layers<I, S>(&mut self, layer_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Some(map) = self.map.as_mut() else {
            return;
        };

        for layer_id in layer_ids {
            let layer_id = layer_id.as_ref();
            if !map.has_layer(layer_id) {
                continue;
            }
            match map.remove_layer(layer_id) {
                Ok(()) => {
                    debug!(layer_id, "Removed layer");
                    self.active.unmark_layer(layer_id);
                    self.layers.remove(layer_id);
                    self.filters.clear_layer(layer_id);
                }
                Err(e) => warn!(layer_id, error = %e, "Failed to remove layer"),
            }
        }
    }

    /// Set the layer's `"default"` filter fragment.
    pub fn update_layer_filter(&mut self, layer_id: &str, filter: Value) {
        self.update_layer_filter_named(layer_id, DEFAULT_FILTER_NAME, filter);
    }

    /// Set a named filter fragment and apply the combined filter.
    ///
    /// Does nothing unless the layer exists in the map.
    pub fn update_layer_filter_named(&mut self, layer_id: &str, filter_name: &str, filter: Value) {
        let Some(map) = self.map.as_mut() else {
            return;
        };
        if !map.has_layer(layer_id) {
            return;
        }

        let combined = self.filters.upsert(layer_id, filter_name, filter);
        if let Err(e) = map.set_filter(layer_id, combined.as_ref()) {
            warn!(layer_id, filter_name, error = %e, "Failed to apply filter");
        }
    }

    /// Drop a named filter fragment and apply the remaining combination.
    ///
    /// Does nothing unless the layer exists in the map and has fragments.
    /// Dropping the last fragment clears the layer's filter.
    pub fn remove_layer_filter(&mut self, layer_id: &str, filter_name: &str) {
        let Some(map) = self.map.as_mut() else {
            return;
        };
        if !map.has_layer(layer_id) {
            return;
        }

        if let Some(combined) = self.filters.remove(layer_id, filter_name) {
            if let Err(e) = map.set_filter(layer_id, combined.as_ref()) {
                warn!(layer_id, filter_name, error = %e, "Failed to apply filter");
            }
        }
    }

    /// Set one layout property on a layer present in the map.
    pub fn update_layer_layout(
        &mut self,
        layer_id: &str,
        name: &str,
        value: Value,
        options: Option<SetterOptions>,
    ) {
        let Some(map) = self.map.as_mut() else {
            return;
        };
        if !map.has_layer(layer_id) {
            return;
        }
        if let Err(e) = map.set_layout_property(layer_id, name, &value, options.as_ref()) {
            warn!(layer_id, property = name, error = %e, "Failed to set layout property");
        }
    }

    /// Set one paint property on a layer present in the map.
    pub fn update_layer_paint(
        &mut self,
        layer_id: &str,
        name: &str,
        value: Value,
        options: Option<SetterOptions>,
    ) {
        let Some(map) = self.map.as_mut() else {
            return;
        };
        if !map.has_layer(layer_id) {
            return;
        }
        if let Err(e) = map.set_paint_property(layer_id, name, &value, options.as_ref()) {
            warn!(layer_id, property = name, error = %e, "Failed to set paint property");
        }
    }

    /// Forward a feature state update to the map.
    pub fn update_feature_state(
        &mut self,
        source_id: &str,
        feature_id: impl Into<FeatureId>,
        state: Value,
    ) {
        let Some(map) = self.map.as_mut() else {
            return;
        };
        let feature_id = feature_id.into();
        if let Err(e) = map.set_feature_state(source_id, &feature_id, &state) {
            warn!(source_id, feature_id = %feature_id, error = %e, "Failed to set feature state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{HeadlessMap, MapOperation};
    use serde_json::json;

    fn sorted(mut ids: Vec<String>) -> Vec<String> {
        ids.sort();
        ids
    }

    fn bound() -> LayerManager<HeadlessMap> {
        LayerManager::new(Some(HeadlessMap::new()), vec![], vec![])
    }

    fn unbound() -> LayerManager<HeadlessMap> {
        LayerManager::new(None, vec![], vec![])
    }

    #[test]
    fn test_add_and_remove_sources() {
        let mut manager = bound();
        manager.add_sources(vec![
            SourceDeclaration::new("a", json!({ "type": "geojson" })),
            SourceDeclaration::new("b", json!({ "type": "vector" })),
        ]);

        assert_eq!(
            sorted(manager.active_custom_source_ids()),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(manager.source_declarations().len(), 2);

        manager.remove_sources(["a"]);

        assert_eq!(manager.active_custom_source_ids(), vec!["b".to_string()]);
        assert!(!manager.map_instance().unwrap().has_source("a"));
        assert!(!manager.source_declarations().contains("a"));
    }

    #[test]
    fn test_add_sources_skips_existing_map_source() {
        let map = HeadlessMap::new().with_source("base", json!({ "type": "vector" }));
        let mut manager = LayerManager::new(Some(map), vec![], vec![]);

        manager.add_sources(vec![SourceDeclaration::new("base", json!({}))]);

        let map = manager.map_instance().unwrap();
        assert_eq!(map.call_count(MapOperation::AddSource, "base"), 0);
        assert!(manager.active_custom_source_ids().is_empty());
        assert!(!manager.source_declarations().contains("base"));
    }

    #[test]
    fn test_rejected_layer_is_not_registered() {
        let map = HeadlessMap::new().with_layer(LayerDeclaration::new("labels", "symbol"));
        let mut manager = LayerManager::new(Some(map), vec![], vec![]);

        manager.add_layers(vec![LayerDeclaration::new("labels", "fill")], None);

        assert!(manager.active_custom_layer_ids().is_empty());
        assert!(manager.layer_declarations().is_empty());
        assert_eq!(
            manager
                .map_instance()
                .unwrap()
                .layer("labels")
                .and_then(|l| l.layer_type.as_deref()),
            Some("symbol")
        );
    }

    #[test]
    fn test_add_layers_before_anchor() {
        let map = HeadlessMap::new().with_layer(LayerDeclaration::new("labels", "symbol"));
        let mut manager = LayerManager::new(Some(map), vec![], vec![]);

        manager.add_layers(
            vec![
                LayerDeclaration::new("a", "fill"),
                LayerDeclaration::new("b", "line"),
            ],
            Some("labels"),
        );

        assert_eq!(
            manager.map_instance().unwrap().layer_order(),
            vec!["a", "b", "labels"]
        );
        assert_eq!(manager.layer_declarations().len(), 2);
    }

    #[test]
    fn test_remove_layers_is_idempotent() {
        let mut manager = bound();
        manager.add_layers(vec![LayerDeclaration::new("x", "fill")], None);

        manager.remove_layers(["x"]);
        let calls_after_first = manager.map_instance().unwrap().calls().len();
        manager.remove_layers(["x"]);

        let map = manager.map_instance().unwrap();
        assert_eq!(map.calls().len(), calls_after_first);
        assert_eq!(map.call_count(MapOperation::RemoveLayer, "x"), 1);
        assert!(manager.active_custom_layer_ids().is_empty());
    }

    #[test]
    fn test_remove_source_rejected_keeps_state() {
        let mut manager = bound();
        manager.add_sources(vec![SourceDeclaration::new("s", json!({}))]);
        manager.add_layers(vec![LayerDeclaration::new("l", "fill").with_source("s")], None);

        manager.remove_sources(["s"]);

        assert_eq!(manager.active_custom_source_ids(), vec!["s".to_string()]);
        assert!(manager.source_declarations().contains("s"));
    }

    #[test]
    fn test_filter_conjunction() {
        let mut manager = bound();
        manager.add_layers(vec![LayerDeclaration::new("L", "fill")], None);

        manager.update_layer_filter("L", json!(["==", "a", 1]));
        manager.update_layer_filter_named("L", "extra", json!(["==", "b", 2]));
        assert_eq!(
            manager.map_instance().unwrap().filter("L"),
            Some(&json!(["all", ["==", "a", 1], ["==", "b", 2]]))
        );

        manager.remove_layer_filter("L", "extra");
        assert_eq!(
            manager.map_instance().unwrap().filter("L"),
            Some(&json!(["all", ["==", "a", 1]]))
        );
    }

    #[test]
    fn test_removing_last_filter_clears() {
        let mut manager = bound();
        manager.add_layers(vec![LayerDeclaration::new("L", "fill")], None);

        manager.update_layer_filter("L", json!(["has", "name"]));
        manager.remove_layer_filter("L", DEFAULT_FILTER_NAME);

        assert!(manager.map_instance().unwrap().filter("L").is_none());
        assert!(manager.layers_filters().is_empty());
    }

    #[test]
    fn test_remove_layers_drops_filter_fragments() {
        let mut manager = bound();
        manager.add_layers(vec![LayerDeclaration::new("L", "fill")], None);
        manager.update_layer_filter("L", json!(["==", "a", 1]));

        manager.remove_layers(["L"]);
        assert!(!manager.layers_filters().contains("L"));

        manager.add_layers(vec![LayerDeclaration::new("L", "fill")], None);
        assert!(manager.map_instance().unwrap().filter("L").is_none());

        manager.update_layer_filter_named("L", "extra", json!(["==", "b", 2]));
        assert_eq!(
            manager.map_instance().unwrap().filter("L"),
            Some(&json!(["all", ["==", "b", 2]]))
        );
    }

    #[test]
    fn test_filter_on_missing_layer_is_ignored() {
        let mut manager = bound();
        manager.update_layer_filter("ghost", json!(true));
        manager.remove_layer_filter("ghost", DEFAULT_FILTER_NAME);

        assert!(manager.layers_filters().is_empty());
        assert!(manager.map_instance().unwrap().calls().is_empty());
    }

    #[test]
    fn test_remove_filter_without_fragments_does_not_touch_map() {
        let mut manager = bound();
        manager.add_layers(vec![LayerDeclaration::new("L", "fill")], None);
        manager.map_instance_mut().unwrap().clear_calls();

        manager.remove_layer_filter("L", DEFAULT_FILTER_NAME);

        assert!(manager.map_instance().unwrap().calls().is_empty());
    }

    #[test]
    fn test_layout_and_paint_passthrough() {
        let mut manager = bound();
        manager.add_layers(vec![LayerDeclaration::new("L", "fill")], None);

        manager.update_layer_layout("L", "visibility", json!("none"), None);
        manager.update_layer_paint(
            "L",
            "fill-color",
            json!("#0f0"),
            Some(SetterOptions { validate: false }),
        );
        manager.update_layer_paint("ghost", "fill-color", json!("#0f0"), None);

        let map = manager.map_instance().unwrap();
        let layer = map.layer("L").unwrap();
        assert_eq!(layer.layout.as_ref().unwrap()["visibility"], json!("none"));
        assert_eq!(layer.paint.as_ref().unwrap()["fill-color"], json!("#0f0"));
        assert_eq!(map.call_count(MapOperation::SetPaintProperty, "ghost"), 0);
    }

    #[test]
    fn test_feature_state_is_forwarded_unconditionally() {
        let mut manager = bound();
        manager.update_feature_state("missing", FeatureId::Numeric(3), json!({ "hover": true }));

        let map = manager.map_instance().unwrap();
        assert_eq!(map.call_count(MapOperation::SetFeatureState, "missing"), 1);
    }

    #[test]
    fn test_unbound_manager_ignores_everything() {
        let mut manager = unbound();

        manager.add_sources(vec![SourceDeclaration::new("s", json!({}))]);
        manager.add_layers(vec![LayerDeclaration::new("l", "fill")], None);
        manager.remove_sources(["s"]);
        manager.remove_layers(["l"]);
        manager.update_layer_filter("l", json!(true));
        manager.remove_layer_filter("l", DEFAULT_FILTER_NAME);
        manager.update_layer_layout("l", "visibility", json!("none"), None);
        manager.update_layer_paint("l", "fill-color", json!("red"), None);
        manager.update_feature_state("s", "f", json!({}));

        assert!(manager.map_instance().is_none());
        assert!(manager.active_custom_layer_ids().is_empty());
        assert!(manager.active_custom_source_ids().is_empty());
        assert!(manager.layers_filters().is_empty());
        assert!(manager.source_declarations().is_empty());
        assert!(manager.layer_declarations().is_empty());
    }

    #[test]
    fn test_bind_map_resets_tracking() {
        let mut manager = bound();
        manager.add_layers(vec![LayerDeclaration::new("L", "fill")], None);
        manager.update_layer_filter("L", json!(true));

        let previous = manager.bind_map(HeadlessMap::new());

        assert!(previous.unwrap().has_layer("L"));
        assert!(manager.active_custom_layer_ids().is_empty());
        assert!(manager.layers_filters().is_empty());
        assert!(manager.layer_declarations().contains("L"));
    }
}
