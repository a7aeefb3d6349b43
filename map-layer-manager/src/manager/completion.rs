//! Completion of a render request.
//!
//! Reconciliation itself is synchronous. What the caller waits for is the
//! map finishing its next render pass after the changes were submitted; that
//! wait is a single-shot channel fired by the map's render notification.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::{LayerManagerError, Result};

/// Boxed future type returned by [`RenderCompletion::into_future`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What one reconciliation pass changed in the map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Sources added because a requested layer needs them.
    pub sources_added: usize,
    /// Declared sources removed because no requested layer needs them.
    pub sources_removed: usize,
    /// Declared layers removed, including requested layers cleared for re-adding.
    pub layers_removed: usize,
    /// Requested layers added.
    pub layers_added: usize,
    /// Layers moved into the requested order.
    pub layers_moved: usize,
}

impl fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sources +{} -{}, layers +{} -{}, {} moved",
            self.sources_added,
            self.sources_removed,
            self.layers_added,
            self.layers_removed,
            self.layers_moved
        )
    }
}

/// Pending completion of a render request.
///
/// Resolves once the map reports its next completed render. Awaiting it
/// directly is the same as calling [`wait`](Self::wait).
#[derive(Debug)]
pub struct RenderCompletion {
    receiver: oneshot::Receiver<()>,
    timeout: Option<Duration>,
    summary: ReconcileSummary,
}

impl RenderCompletion {
    pub(crate) fn new(
        receiver: oneshot::Receiver<()>,
        timeout: Option<Duration>,
        summary: ReconcileSummary,
    ) -> Self {
        Self {
            receiver,
            timeout,
            summary,
        }
    }

    /// What the reconciliation pass changed.
    pub fn summary(&self) -> ReconcileSummary {
        self.summary
    }

    /// Wait for the map's next completed render.
    ///
    /// Without a configured timeout this waits for as long as the map takes.
    pub async fn wait(self) -> Result<()> {
        match self.timeout {
            None => self
                .receiver
                .await
                .map_err(|_| LayerManagerError::RenderSignalDropped),
            Some(limit) => match tokio::time::timeout(limit, self.receiver).await {
                Ok(signal) => signal.map_err(|_| LayerManagerError::RenderSignalDropped),
                Err(_) => Err(LayerManagerError::RenderTimeout(limit)),
            },
        }
    }
}

impl IntoFuture for RenderCompletion {
    type Output = Result<()>;
    type IntoFuture = BoxFuture<'static, Result<()>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}
