//! map-layer-manager - source and layer bookkeeping for style-based maps
//!
//! This library sits between an application and a style-based map renderer
//! (Mapbox GL, MapLibre, or the bundled [`HeadlessMap`]). It tracks which
//! sources and layers the application owns, reconciles the map against a
//! requested layer order, and multiplexes named filter fragments onto each
//! layer's single filter slot.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────── LayerManager<M> ──────────────────────────────┐
//! │                                                                              │
//! │  registry (declarations, active ids)     filter (named fragments per layer)  │
//! │              │                                        │                      │
//! │              └──────────────► reconcile ◄─────────────┘                      │
//! │                     diff ─► add/remove ─► re-add ─► reorder                  │
//! └──────────────────────────────────┬───────────────────────────────────────────┘
//!                                    ▼
//!                             M: MapHandle  ──► RenderCompletion (next render)
//! ```
//!
//! # Modules
//!
//! - [`declaration`] - source/layer declarations and per-layer overrides
//! - [`registry`] - id-indexed declaration tables and active-custom ids
//! - [`filter`] - named filter fragments and their `"all"` combination
//! - [`map`] - the [`MapHandle`] collaborator trait and [`HeadlessMap`]
//! - [`manager`] - [`LayerManager`] and the reconciliation pass
//! - [`config`] - construction-time configuration
//! - [`logging`] - optional `tracing` subscriber setup

pub mod config;
pub mod declaration;
pub mod error;
pub mod filter;
pub mod logging;
pub mod manager;
pub mod map;
pub mod registry;

pub use config::{ConfigError, LayerManagerConfig};
pub use declaration::{
    FeatureId, LayerConfig, LayerDeclaration, PropertyMap, SetterOptions, SourceDeclaration,
};
pub use error::{LayerManagerError, RenderStep, Result};
pub use filter::{FilterFragments, FilterTable, DEFAULT_FILTER_NAME};
pub use manager::{LayerConfigs, LayerManager, ReconcileSummary, RenderCompletion};
pub use map::{
    HeadlessMap, MapCall, MapError, MapHandle, MapOperation, RenderNotifier, StyleSnapshot,
};
