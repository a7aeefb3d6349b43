//! Error types for the layer manager.

use std::time::Duration;

use thiserror::Error;

use crate::map::MapError;

/// Result type for render requests.
pub type Result<T> = std::result::Result<T, LayerManagerError>;

/// Reconciliation step that was running when the map failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStep {
    AddSources,
    RemoveLayers,
    RemoveSources,
    ClearRequested,
    AddLayers,
    Reorder,
}

impl std::fmt::Display for RenderStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderStep::AddSources => write!(f, "adding required sources"),
            RenderStep::RemoveLayers => write!(f, "removing unused layers"),
            RenderStep::RemoveSources => write!(f, "removing unused sources"),
            RenderStep::ClearRequested => write!(f, "clearing requested layers"),
            RenderStep::AddLayers => write!(f, "adding requested layers"),
            RenderStep::Reorder => write!(f, "reordering layers"),
        }
    }
}

/// Failures of a render request.
///
/// Every other operation of the manager degrades to a no-op instead of
/// failing.
#[derive(Debug, Error)]
pub enum LayerManagerError {
    /// No map is bound to the manager.
    #[error("Map is not initialized")]
    MapNotInitialized,

    /// The requested order names the same layer twice.
    #[error("Layer '{0}' appears more than once in the requested order")]
    DuplicateLayerId(String),

    /// The map rejected a mutation. Earlier mutations stay applied.
    #[error("Render request failed while {step}: {source}")]
    RenderFailed {
        step: RenderStep,
        #[source]
        source: MapError,
    },

    /// The map dropped the render notifier without firing it.
    #[error("Map dropped the render notification before rendering")]
    RenderSignalDropped,

    /// No render completed within the configured timeout.
    #[error("No render completed within {0:?}")]
    RenderTimeout(Duration),
}

impl LayerManagerError {
    pub(crate) fn at(step: RenderStep) -> impl FnOnce(MapError) -> Self {
        move |source| LayerManagerError::RenderFailed { step, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_not_initialized_display() {
        assert_eq!(
            LayerManagerError::MapNotInitialized.to_string(),
            "Map is not initialized"
        );
    }

    #[test]
    fn test_render_failed_keeps_source() {
        let err = LayerManagerError::at(RenderStep::Reorder)(MapError::LayerNotFound(
            "roads".to_string(),
        ));

        assert!(err.to_string().contains("reordering layers"));
        assert!(err.to_string().contains("roads"));
        assert!(err.source().is_some());
    }
}
