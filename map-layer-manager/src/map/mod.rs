//! The map collaborator seen by the layer manager.
//!
//! The manager never renders anything itself. It drives a style-based map
//! (Mapbox GL, MapLibre, a headless stand-in) through the [`MapHandle`]
//! capability set:
//!
//! ```text
//! ┌──────────────────────────┐        ┌─────────────────────────────┐
//! │      LayerManager<M>     │ ─────► │       M: MapHandle          │
//! │  registry, filters,      │ query  │  sources, layers (ordered), │
//! │  reconcile, order        │ mutate │  filters, properties,       │
//! │                          │ ◄───── │  render notifications       │
//! └──────────────────────────┘ notify └─────────────────────────────┘
//! ```
//!
//! [`HeadlessMap`] is an in-memory implementation used by the tests and by
//! callers that want to run reconciliation without a renderer.

mod headless;

pub use headless::{HeadlessMap, MapCall, MapOperation};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::declaration::{FeatureId, LayerDeclaration, SetterOptions};

/// Errors reported by the map collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    /// The referenced layer does not exist.
    #[error("layer '{0}' does not exist in the map style")]
    LayerNotFound(String),

    /// The referenced source does not exist.
    #[error("source '{0}' does not exist in the map style")]
    SourceNotFound(String),

    /// A layer with this id already exists.
    #[error("layer '{0}' already exists in the map style")]
    DuplicateLayer(String),

    /// A source with this id already exists.
    #[error("source '{0}' already exists in the map style")]
    DuplicateSource(String),

    /// The source is still used by a layer.
    #[error("source '{source_id}' is still used by layer '{layer_id}'")]
    SourceInUse { source_id: String, layer_id: String },

    /// Any other rejection raised by the rendering library.
    #[error("map rejected the operation: {0}")]
    Rejected(String),
}

/// Point-in-time view of the map's style.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleSnapshot {
    /// Layer ids in draw order, bottom first.
    pub layers: Vec<String>,

    /// Source ids, in no particular order.
    pub sources: Vec<String>,
}

/// One-shot handle the map fires after its next completed render.
#[derive(Debug)]
pub struct RenderNotifier {
    sender: oneshot::Sender<()>,
}

impl RenderNotifier {
    pub(crate) fn new(sender: oneshot::Sender<()>) -> Self {
        Self { sender }
    }

    /// Signal that a render pass completed.
    ///
    /// Firing a notifier whose waiter has gone away is not an error.
    pub fn notify(self) {
        let _ = self.sender.send(());
    }

    /// Whether the waiting side has been dropped.
    pub fn is_abandoned(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Capability set of a style-based map.
///
/// Query methods report absence with `false`; mutations that the rendering
/// library rejects return a [`MapError`].
pub trait MapHandle {
    /// Whether a source with this id exists in the style.
    fn has_source(&self, source_id: &str) -> bool;

    /// Whether a layer with this id exists in the style.
    fn has_layer(&self, layer_id: &str) -> bool;

    /// Current layers (bottom to top) and sources.
    fn style(&self) -> StyleSnapshot;

    fn add_source(&mut self, source_id: &str, source: &Value) -> Result<(), MapError>;

    fn remove_source(&mut self, source_id: &str) -> Result<(), MapError>;

    /// Add a layer, immediately below `before_id` if given, otherwise on top.
    fn add_layer(
        &mut self,
        layer: &LayerDeclaration,
        before_id: Option<&str>,
    ) -> Result<(), MapError>;

    fn remove_layer(&mut self, layer_id: &str) -> Result<(), MapError>;

    /// Move a layer immediately below `before_id`, or to the top if `None`.
    fn move_layer(&mut self, layer_id: &str, before_id: Option<&str>) -> Result<(), MapError>;

    /// Set a layer's filter; `None` clears it.
    fn set_filter(&mut self, layer_id: &str, filter: Option<&Value>) -> Result<(), MapError>;

    fn set_layout_property(
        &mut self,
        layer_id: &str,
        name: &str,
        value: &Value,
        options: Option<&SetterOptions>,
    ) -> Result<(), MapError>;

    fn set_paint_property(
        &mut self,
        layer_id: &str,
        name: &str,
        value: &Value,
        options: Option<&SetterOptions>,
    ) -> Result<(), MapError>;

    fn set_feature_state(
        &mut self,
        source_id: &str,
        feature_id: &FeatureId,
        state: &Value,
    ) -> Result<(), MapError>;

    /// Register a one-shot notifier fired after the next completed render.
    fn on_next_render(&mut self, notifier: RenderNotifier);
}
