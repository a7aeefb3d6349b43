//! Declarative source and layer definitions.
//!
//! Declarations are what the caller registers with a
//! [`LayerManager`](crate::LayerManager). Their style payloads are opaque to
//! the manager: only the identifiers, the layer's `source` reference and the
//! `filter`/`layout`/`paint` slots that overrides replace are interpreted.
//! Everything else is carried through to the map untouched.
//!
//! Field names follow the Mapbox/MapLibre style specification so that
//! declarations can be deserialized straight from style JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A property bag such as a layer's `layout` or `paint` object.
pub type PropertyMap = Map<String, Value>;

/// A data source the manager may add to the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDeclaration {
    /// Source identifier, unique among declared sources.
    pub id: String,

    /// Source definition forwarded verbatim to the map.
    pub source: Value,
}

impl SourceDeclaration {
    /// Create a new source declaration.
    pub fn new(id: impl Into<String>, source: Value) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }
}

/// A style layer the manager may add to the map.
///
/// `source` is a soft reference: it names a [`SourceDeclaration`] by id and
/// is resolved on every render pass. A reference to an undeclared source is
/// treated as "no required source".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDeclaration {
    /// Layer identifier, unique among declared layers.
    pub id: String,

    /// Style layer type (`fill`, `line`, `symbol`, ...).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub layer_type: Option<String>,

    /// Id of the source this layer draws from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Filter expression applied when the layer is added.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,

    /// Layout properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<PropertyMap>,

    /// Paint properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paint: Option<PropertyMap>,

    /// Remaining style properties (`source-layer`, `minzoom`, `metadata`, ...).
    #[serde(flatten)]
    pub extra: PropertyMap,
}

impl LayerDeclaration {
    /// Create a layer declaration with only an id and a type.
    pub fn new(id: impl Into<String>, layer_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            layer_type: Some(layer_type.into()),
            source: None,
            filter: None,
            layout: None,
            paint: None,
            extra: PropertyMap::new(),
        }
    }

    /// Set the source this layer draws from.
    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source = Some(source_id.into());
        self
    }

    /// Set the filter expression.
    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the layout properties.
    pub fn with_layout(mut self, layout: PropertyMap) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Set the paint properties.
    pub fn with_paint(mut self, paint: PropertyMap) -> Self {
        self.paint = Some(paint);
        self
    }

    /// Replace the slots an override carries.
    ///
    /// Each present slot replaces the declaration's property wholesale; bags
    /// are not merged key by key. The filter slot is handled by the caller,
    /// which owns the named-fragment table.
    pub(crate) fn apply_overrides(&mut self, config: &LayerConfig) {
        if let Some(layout) = &config.layout {
            self.layout = Some(layout.clone());
        }
        if let Some(paint) = &config.paint {
            self.paint = Some(paint.clone());
        }
    }
}

/// Per-layer override supplied to a render pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Filter stored as the layer's `"default"` fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,

    /// Replacement layout properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<PropertyMap>,

    /// Replacement paint properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paint: Option<PropertyMap>,
}

impl LayerConfig {
    /// An override that only sets the filter.
    pub fn filter(filter: Value) -> Self {
        Self {
            filter: Some(filter),
            ..Self::default()
        }
    }

    /// Set the layout replacement.
    pub fn with_layout(mut self, layout: PropertyMap) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Set the paint replacement.
    pub fn with_paint(mut self, paint: PropertyMap) -> Self {
        self.paint = Some(paint);
        self
    }
}

/// Identifier of a feature inside a source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    Numeric(i64),
    Named(String),
}

impl From<i64> for FeatureId {
    fn from(id: i64) -> Self {
        FeatureId::Numeric(id)
    }
}

impl From<&str> for FeatureId {
    fn from(id: &str) -> Self {
        FeatureId::Named(id.to_string())
    }
}

impl From<String> for FeatureId {
    fn from(id: String) -> Self {
        FeatureId::Named(id)
    }
}

impl std::fmt::Display for FeatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureId::Numeric(id) => write!(f, "{}", id),
            FeatureId::Named(id) => write!(f, "{}", id),
        }
    }
}

/// Options forwarded to the layout/paint property setters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetterOptions {
    /// Whether the map should validate the value against the style schema.
    pub validate: bool,
}

impl Default for SetterOptions {
    fn default() -> Self {
        Self { validate: true }
    }
}
