//! Reconciliation of the map against a requested layer order.
//!
//! A render request names the layers that should be drawn, bottom to top.
//! One pass runs these steps against the bound map, in order:
//!
//! 1. Collect the sources the requested layers declare.
//! 2. Add the collected sources the map does not have yet.
//! 3. Remove declared layers that were not requested.
//! 4. Remove declared sources that were not collected.
//! 5. Remove requested declared layers that are already in the map.
//! 6. Add the requested layers, applying per-layer overrides.
//! 7. Move the requested layers into the requested order.
//!
//! Layers and sources the manager was never told about are left alone.
//! Every requested layer is removed and re-added on every pass; there is no
//! update in place. A map failure aborts the pass and earlier steps stay
//! applied.

use std::collections::{HashMap, HashSet};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::{LayerManager, ReconcileSummary, RenderCompletion};
use crate::declaration::{LayerConfig, LayerDeclaration, SourceDeclaration};
use crate::error::{LayerManagerError, RenderStep, Result};
use crate::filter::{FilterTable, DEFAULT_FILTER_NAME};
use crate::map::{MapHandle, RenderNotifier};
use crate::registry::{ActiveCustom, DeclarationTable};

/// Per-layer overrides for a render request, keyed by layer id.
pub type LayerConfigs = HashMap<String, LayerConfig>;

impl<M: MapHandle> LayerManager<M> {
    /// Reconcile the map to `layer_ids` and wait for the next render.
    ///
    /// `layer_ids` is the requested draw order, bottom first. Entries of
    /// `layer_configs` override the matching layer's filter, layout and paint
    /// before it is added. New layers are inserted below `before_layer_id`
    /// when given.
    ///
    /// # Errors
    ///
    /// - [`LayerManagerError::MapNotInitialized`] if no map is bound
    /// - [`LayerManagerError::DuplicateLayerId`] if an id repeats
    /// - [`LayerManagerError::RenderFailed`] if the map rejects a mutation
    /// - [`LayerManagerError::RenderSignalDropped`] /
    ///   [`LayerManagerError::RenderTimeout`] while waiting for the render
    pub async fn render_ordered_layers<S: AsRef<str>>(
        &mut self,
        layer_ids: &[S],
        layer_configs: Option<&LayerConfigs>,
        before_layer_id: Option<&str>,
    ) -> Result<()> {
        self.reconcile(layer_ids, layer_configs, before_layer_id)?
            .await
    }

    /// Run the reconciliation pass without waiting for the render.
    ///
    /// The returned [`RenderCompletion`] resolves once the map fires the
    /// notifier registered at the end of the pass.
    pub fn reconcile<S: AsRef<str>>(
        &mut self,
        layer_ids: &[S],
        layer_configs: Option<&LayerConfigs>,
        before_layer_id: Option<&str>,
    ) -> Result<RenderCompletion> {
        let map = self
            .map
            .as_mut()
            .ok_or(LayerManagerError::MapNotInitialized)?;

        let requested: Vec<&str> = layer_ids.iter().map(AsRef::as_ref).collect();
        let mut seen = HashSet::with_capacity(requested.len());
        if let Some(duplicate) = requested.iter().find(|id| !seen.insert(**id)) {
            return Err(LayerManagerError::DuplicateLayerId(duplicate.to_string()));
        }

        let mut pass = Pass {
            map,
            sources: &self.sources,
            layers: &mut self.layers,
            active: &mut self.active,
            filters: &mut self.filters,
            summary: ReconcileSummary::default(),
        };

        let required = pass.required_sources(&requested);
        pass.add_missing_sources(&required)
            .map_err(LayerManagerError::at(RenderStep::AddSources))?;
        pass.remove_unused_layers(&seen)
            .map_err(LayerManagerError::at(RenderStep::RemoveLayers))?;
        pass.remove_unused_sources(&required)
            .map_err(LayerManagerError::at(RenderStep::RemoveSources))?;
        pass.clear_requested(&requested)
            .map_err(LayerManagerError::at(RenderStep::ClearRequested))?;
        pass.add_requested(&requested, layer_configs, before_layer_id)
            .map_err(LayerManagerError::at(RenderStep::AddLayers))?;
        pass.reorder(&requested)
            .map_err(LayerManagerError::at(RenderStep::Reorder))?;

        let summary = pass.summary;
        let (sender, receiver) = oneshot::channel();
        pass.map.on_next_render(RenderNotifier::new(sender));

        info!(layers = requested.len(), %summary, "Reconciled map layers");
        Ok(RenderCompletion::new(receiver, self.render_timeout, summary))
    }
}

/// Borrowed state for one reconciliation pass.
struct Pass<'a, M> {
    map: &'a mut M,
    sources: &'a DeclarationTable<SourceDeclaration>,
    layers: &'a mut DeclarationTable<LayerDeclaration>,
    active: &'a mut ActiveCustom,
    filters: &'a mut FilterTable,
    summary: ReconcileSummary,
}

type StepResult = std::result::Result<(), crate::map::MapError>;

impl<M: MapHandle> Pass<'_, M> {
    /// Source ids declared by the requested layers, first occurrence first.
    fn required_sources(&self, requested: &[&str]) -> Vec<String> {
        let mut required: Vec<String> = Vec::new();
        for layer_id in requested {
            let Some(source_id) = self.layers.get(layer_id).and_then(|l| l.source.as_deref())
            else {
                continue;
            };
            if !required.iter().any(|s| s == source_id) {
                required.push(source_id.to_string());
            }
        }
        required
    }

    fn add_missing_sources(&mut self, required: &[String]) -> StepResult {
        for source_id in required {
            if self.map.has_source(source_id) {
                continue;
            }
            let Some(declaration) = self.sources.get(source_id) else {
                warn!(source_id = %source_id, "Required source has no declaration, skipping");
                continue;
            };
            self.map.add_source(source_id, &declaration.source)?;
            self.active.mark_source(source_id);
            self.summary.sources_added += 1;
            debug!(source_id = %source_id, "Added required source");
        }
        Ok(())
    }

    fn remove_unused_layers(&mut self, requested: &HashSet<&str>) -> StepResult {
        for layer_id in self.map.style().layers {
            if requested.contains(layer_id.as_str()) || !self.layers.contains(&layer_id) {
                continue;
            }
            self.map.remove_layer(&layer_id)?;
            self.active.unmark_layer(&layer_id);
            self.summary.layers_removed += 1;
            debug!(layer_id = %layer_id, "Removed unused layer");
        }
        Ok(())
    }

    fn remove_unused_sources(&mut self, required: &[String]) -> StepResult {
        for source_id in self.map.style().sources {
            if required.contains(&source_id) || !self.sources.contains(&source_id) {
                continue;
            }
            self.map.remove_source(&source_id)?;
            self.active.unmark_source(&source_id);
            self.summary.sources_removed += 1;
            debug!(source_id = %source_id, "Removed unused source");
        }
        Ok(())
    }

    fn clear_requested(&mut self, requested: &[&str]) -> StepResult {
        for &layer_id in requested {
            if !self.layers.contains(layer_id) || !self.map.has_layer(layer_id) {
                continue;
            }
            self.map.remove_layer(layer_id)?;
            self.active.unmark_layer(layer_id);
            self.summary.layers_removed += 1;
        }
        Ok(())
    }

    fn add_requested(
        &mut self,
        requested: &[&str],
        layer_configs: Option<&LayerConfigs>,
        before_layer_id: Option<&str>,
    ) -> StepResult {
        for &layer_id in requested {
            let Some(layer) = self.layers.get_mut(layer_id) else {
                debug!(layer_id, "Requested layer has no declaration, skipping");
                continue;
            };

            if let Some(config) = layer_configs.and_then(|c| c.get(layer_id)) {
                if let Some(filter) = &config.filter {
                    self.filters
                        .upsert(layer_id, DEFAULT_FILTER_NAME, filter.clone());
                }
                layer.apply_overrides(config);
            }
            if let Some(combined) = self.filters.conjunction(layer_id) {
                layer.filter = Some(combined);
            }

            self.map.add_layer(layer, before_layer_id)?;
            self.active.mark_layer(layer_id);
            self.summary.layers_added += 1;
        }
        Ok(())
    }

    /// Stack the requested layers so each one sits directly below the next.
    ///
    /// The topmost requested layer stays where it was added; ids missing
    /// from the map are skipped.
    fn reorder(&mut self, requested: &[&str]) -> StepResult {
        let present: Vec<&str> = requested
            .iter()
            .copied()
            .filter(|id| self.map.has_layer(id))
            .collect();

        for pair in present.windows(2).rev() {
            let (below, above) = (pair[0], pair[1]);
            self.map.move_layer(below, Some(above))?;
            self.summary.layers_moved += 1;
        }
        Ok(())
    }
}
