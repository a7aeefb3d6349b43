//! In-memory map with no renderer behind it.
//!
//! `HeadlessMap` keeps the parts of a style the layer manager can observe:
//! an ordered layer list, a source table, per-layer filter and properties,
//! and feature state. It enforces the rendering library's structural rules
//! (no duplicate ids, no removing or moving missing layers, no removing a
//! source a layer still draws from) and records every mutation so tests can
//! count them. It does not check that a layer's source exists.
//!
//! Render notifications are queued until [`HeadlessMap::render_frame`] is
//! called, which plays the role of the renderer finishing a frame. A map
//! built with [`HeadlessMap::with_auto_render`] instead behaves like a map
//! that renders continuously and fires each notifier as soon as it is
//! registered.

use std::collections::HashMap;

use serde_json::Value;

use super::{MapError, MapHandle, RenderNotifier, StyleSnapshot};
use crate::declaration::{FeatureId, LayerDeclaration, SetterOptions};

/// Kind of mutation issued against the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapOperation {
    AddSource,
    RemoveSource,
    AddLayer,
    RemoveLayer,
    MoveLayer,
    SetFilter,
    SetLayoutProperty,
    SetPaintProperty,
    SetFeatureState,
}

/// One recorded mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapCall {
    pub operation: MapOperation,
    /// Layer or source id the mutation targeted.
    pub target: String,
}

/// Style-only map implementation.
#[derive(Debug, Default)]
pub struct HeadlessMap {
    /// Layers bottom to top.
    layers: Vec<LayerDeclaration>,
    /// Sources in insertion order.
    sources: Vec<(String, Value)>,
    feature_states: HashMap<(String, FeatureId), Value>,
    calls: Vec<MapCall>,
    pending_renders: Vec<RenderNotifier>,
    failures: HashMap<(MapOperation, String), String>,
    auto_render: bool,
}

impl HeadlessMap {
    /// Create a map with an empty style.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a source that belongs to the base style.
    ///
    /// Seeding is not recorded as a call.
    pub fn with_source(mut self, source_id: impl Into<String>, source: Value) -> Self {
        self.sources.push((source_id.into(), source));
        self
    }

    /// Seed a layer on top of the base style.
    ///
    /// Seeding is not recorded as a call.
    pub fn with_layer(mut self, layer: LayerDeclaration) -> Self {
        self.layers.push(layer);
        self
    }

    /// Fire render notifiers immediately instead of queueing them.
    pub fn with_auto_render(mut self) -> Self {
        self.auto_render = true;
        self
    }

    /// Make every `operation` against `target` fail with `MapError::Rejected`.
    pub fn fail_on(&mut self, operation: MapOperation, target: impl Into<String>, reason: &str) {
        self.failures
            .insert((operation, target.into()), reason.to_string());
    }

    /// Stop injecting failures.
    pub fn clear_failures(&mut self) {
        self.failures.clear();
    }

    /// The layer as currently styled.
    pub fn layer(&self, layer_id: &str) -> Option<&LayerDeclaration> {
        self.layers.iter().find(|l| l.id == layer_id)
    }

    /// The source definition.
    pub fn source(&self, source_id: &str) -> Option<&Value> {
        self.sources
            .iter()
            .find(|(id, _)| id == source_id)
            .map(|(_, source)| source)
    }

    /// Layer ids bottom to top.
    pub fn layer_order(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.id.as_str()).collect()
    }

    /// The filter currently applied to a layer.
    pub fn filter(&self, layer_id: &str) -> Option<&Value> {
        self.layer(layer_id).and_then(|l| l.filter.as_ref())
    }

    /// Accumulated state of a feature.
    pub fn feature_state(&self, source_id: &str, feature_id: &FeatureId) -> Option<&Value> {
        self.feature_states
            .get(&(source_id.to_string(), feature_id.clone()))
    }

    /// Every mutation issued so far, oldest first.
    pub fn calls(&self) -> &[MapCall] {
        &self.calls
    }

    /// Number of `operation` calls that targeted `target`.
    pub fn call_count(&self, operation: MapOperation, target: &str) -> usize {
        self.calls
            .iter()
            .filter(|c| c.operation == operation && c.target == target)
            .count()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of notifiers waiting for the next frame.
    pub fn pending_render_count(&self) -> usize {
        self.pending_renders.len()
    }

    /// Finish a frame: fire and drop every pending render notifier.
    ///
    /// Returns how many notifiers were fired.
    pub fn render_frame(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending_renders);
        let fired = pending.len();
        for notifier in pending {
            notifier.notify();
        }
        fired
    }

    fn record(&mut self, operation: MapOperation, target: &str) -> Result<(), MapError> {
        self.calls.push(MapCall {
            operation,
            target: target.to_string(),
        });
        match self.failures.get(&(operation, target.to_string())) {
            Some(reason) => Err(MapError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }

    fn layer_position(&self, layer_id: &str) -> Result<usize, MapError> {
        self.layers
            .iter()
            .position(|l| l.id == layer_id)
            .ok_or_else(|| MapError::LayerNotFound(layer_id.to_string()))
    }

    fn insertion_index(&self, before_id: Option<&str>) -> Result<usize, MapError> {
        match before_id {
            Some(before) => self.layer_position(before),
            None => Ok(self.layers.len()),
        }
    }

    fn layer_mut(&mut self, layer_id: &str) -> Result<&mut LayerDeclaration, MapError> {
        let position = self.layer_position(layer_id)?;
        Ok(&mut self.layers[position])
    }
}

/// Merge `update` into `target` the way feature state accumulates.
fn merge_state(target: &mut Value, update: &Value) {
    match (target, update) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                existing.insert(key.clone(), value.clone());
            }
        }
        (target, update) => *target = update.clone(),
    }
}

impl MapHandle for HeadlessMap {
    fn has_source(&self, source_id: &str) -> bool {
        self.sources.iter().any(|(id, _)| id == source_id)
    }

    fn has_layer(&self, layer_id: &str) -> bool {
        self.layers.iter().any(|l| l.id == layer_id)
    }

    fn style(&self) -> StyleSnapshot {
        StyleSnapshot {
            layers: self.layers.iter().map(|l| l.id.clone()).collect(),
            sources: self.sources.iter().map(|(id, _)| id.clone()).collect(),
        }
    }

    fn add_source(&mut self, source_id: &str, source: &Value) -> Result<(), MapError> {
        self.record(MapOperation::AddSource, source_id)?;
        if self.has_source(source_id) {
            return Err(MapError::DuplicateSource(source_id.to_string()));
        }
        self.sources.push((source_id.to_string(), source.clone()));
        Ok(())
    }

    fn remove_source(&mut self, source_id: &str) -> Result<(), MapError> {
        self.record(MapOperation::RemoveSource, source_id)?;
        let position = self
            .sources
            .iter()
            .position(|(id, _)| id == source_id)
            .ok_or_else(|| MapError::SourceNotFound(source_id.to_string()))?;
        if let Some(user) = self
            .layers
            .iter()
            .find(|l| l.source.as_deref() == Some(source_id))
        {
            return Err(MapError::SourceInUse {
                source_id: source_id.to_string(),
                layer_id: user.id.clone(),
            });
        }
        self.sources.remove(position);
        self.feature_states.retain(|(source, _), _| source != source_id);
        Ok(())
    }

    fn add_layer(
        &mut self,
        layer: &LayerDeclaration,
        before_id: Option<&str>,
    ) -> Result<(), MapError> {
        self.record(MapOperation::AddLayer, &layer.id)?;
        if self.has_layer(&layer.id) {
            return Err(MapError::DuplicateLayer(layer.id.clone()));
        }
        let index = self.insertion_index(before_id)?;
        self.layers.insert(index, layer.clone());
        Ok(())
    }

    fn remove_layer(&mut self, layer_id: &str) -> Result<(), MapError> {
        self.record(MapOperation::RemoveLayer, layer_id)?;
        let position = self.layer_position(layer_id)?;
        self.layers.remove(position);
        Ok(())
    }

    fn move_layer(&mut self, layer_id: &str, before_id: Option<&str>) -> Result<(), MapError> {
        self.record(MapOperation::MoveLayer, layer_id)?;
        let position = self.layer_position(layer_id)?;
        if before_id == Some(layer_id) {
            return Ok(());
        }
        // Validate the anchor before detaching the layer.
        self.insertion_index(before_id)?;
        let layer = self.layers.remove(position);
        let index = self.insertion_index(before_id)?;
        self.layers.insert(index, layer);
        Ok(())
    }

    fn set_filter(&mut self, layer_id: &str, filter: Option<&Value>) -> Result<(), MapError> {
        self.record(MapOperation::SetFilter, layer_id)?;
        self.layer_mut(layer_id)?.filter = filter.cloned();
        Ok(())
    }

    fn set_layout_property(
        &mut self,
        layer_id: &str,
        name: &str,
        value: &Value,
        _options: Option<&SetterOptions>,
    ) -> Result<(), MapError> {
        self.record(MapOperation::SetLayoutProperty, layer_id)?;
        let layer = self.layer_mut(layer_id)?;
        layer
            .layout
            .get_or_insert_with(Default::default)
            .insert(name.to_string(), value.clone());
        Ok(())
    }

    fn set_paint_property(
        &mut self,
        layer_id: &str,
        name: &str,
        value: &Value,
        _options: Option<&SetterOptions>,
    ) -> Result<(), MapError> {
        self.record(MapOperation::SetPaintProperty, layer_id)?;
        let layer = self.layer_mut(layer_id)?;
        layer
            .paint
            .get_or_insert_with(Default::default)
            .insert(name.to_string(), value.clone());
        Ok(())
    }

    fn set_feature_state(
        &mut self,
        source_id: &str,
        feature_id: &FeatureId,
        state: &Value,
    ) -> Result<(), MapError> {
        self.record(MapOperation::SetFeatureState, source_id)?;
        if !self.has_source(source_id) {
            return Err(MapError::SourceNotFound(source_id.to_string()));
        }
        let entry = self
            .feature_states
            .entry((source_id.to_string(), feature_id.clone()))
            .or_insert_with(|| Value::Object(Default::default()));
        merge_state(entry, state);
        Ok(())
    }

    fn on_next_render(&mut self, notifier: RenderNotifier) {
        if self.auto_render {
            notifier.notify();
        } else {
            self.pending_renders.push(notifier);
        }
    }
}
