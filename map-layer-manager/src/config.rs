//! Construction-time configuration for a [`LayerManager`](crate::LayerManager).
//!
//! The configuration is the initial declaration pool plus an optional render
//! timeout. It can be built in code or parsed from a JSON document shaped like
//! the relevant part of a style:
//!
//! ```
//! use map_layer_manager::LayerManagerConfig;
//!
//! let config = LayerManagerConfig::from_json(r#"{
//!     "sources": [{ "id": "parks", "source": { "type": "geojson", "data": "parks.json" } }],
//!     "layers": [{ "id": "parks-fill", "type": "fill", "source": "parks" }]
//! }"#).unwrap();
//!
//! assert_eq!(config.sources.len(), 1);
//! assert_eq!(config.layers[0].source.as_deref(), Some("parks"));
//! ```

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::declaration::{LayerDeclaration, SourceDeclaration};

/// Errors raised while reading a configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid JSON or does not match the expected shape.
    #[error("Invalid declaration document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration for a layer manager.
#[derive(Clone, Debug, Default)]
pub struct LayerManagerConfig {
    /// Sources available to render passes.
    pub sources: Vec<SourceDeclaration>,

    /// Layers available to render passes.
    pub layers: Vec<LayerDeclaration>,

    /// How long a render request waits for the map's next render.
    ///
    /// `None` waits indefinitely; a map that never renders again leaves the
    /// request pending.
    pub render_timeout: Option<Duration>,
}

#[derive(Deserialize)]
struct DeclarationDocument {
    #[serde(default)]
    sources: Vec<SourceDeclaration>,
    #[serde(default)]
    layers: Vec<LayerDeclaration>,
}

impl LayerManagerConfig {
    /// Create a configuration with the given declarations and no timeout.
    pub fn new(sources: Vec<SourceDeclaration>, layers: Vec<LayerDeclaration>) -> Self {
        Self {
            sources,
            layers,
            render_timeout: None,
        }
    }

    /// Parse declarations from a `{ "sources": [...], "layers": [...] }` document.
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        let parsed: DeclarationDocument = serde_json::from_str(document)?;
        Ok(Self::new(parsed.sources, parsed.layers))
    }

    /// Add a source declaration.
    pub fn with_source(mut self, source: SourceDeclaration) -> Self {
        self.sources.push(source);
        self
    }

    /// Add a layer declaration.
    pub fn with_layer(mut self, layer: LayerDeclaration) -> Self {
        self.layers.push(layer);
        self
    }

    /// Bound the wait for the render-complete notification.
    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = Some(timeout);
        self
    }
}
