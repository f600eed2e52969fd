//! The negotiated provider configuration and the promise that delivers it.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;

/// The capabilities a provider reported when it was configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PluginConfig {
    /// False if the provider's configuration contained unknowns and it was never configured.
    pub known: bool,
    /// The provider accepts secret-tagged values.
    pub accept_secrets: bool,
    /// The provider accepts resource references.
    pub accept_resources: bool,
    /// The provider accepts output values.
    pub accept_outputs: bool,
    /// The provider can compute previews of creates and updates.
    pub supports_preview: bool,
}

impl PluginConfig {
    /// The configuration of a provider whose inputs were not yet known.
    pub fn unknown() -> Self {
        Self::default()
    }
}

type Outcome = Option<Result<PluginConfig, Arc<ProviderError>>>;

/// A single-assignment slot for a [`PluginConfig`].
///
/// The first [`fulfill`](Self::fulfill) wins; later ones are ignored. Every
/// waiter, however many, observes the same outcome.
#[derive(Debug)]
pub struct ConfigPromise {
    tx: watch::Sender<Outcome>,
}

impl Default for ConfigPromise {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigPromise {
    /// Create an unfulfilled promise.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Fulfill the promise. Returns false if it was already fulfilled.
    pub fn fulfill(&self, result: Result<PluginConfig, ProviderError>) -> bool {
        self.fulfill_shared(result.map_err(Arc::new))
    }

    /// Fulfill the promise with an error the caller keeps a handle to.
    pub fn fulfill_shared(&self, result: Result<PluginConfig, Arc<ProviderError>>) -> bool {
        let mut result = Some(result);
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = result.take();
            true
        })
    }

    /// Returns true once the promise has been fulfilled.
    pub fn is_fulfilled(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Wait for the promise, or for `cancel` to fire.
    ///
    /// Cancellation only abandons this wait; the promise is unaffected.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<PluginConfig, ProviderError> {
        let mut rx = self.tx.subscribe();
        let outcome = async move {
            rx.wait_for(Option::is_some)
                .await
                .map(|outcome| outcome.clone())
        };
        let outcome = tokio::select! {
            outcome = outcome => outcome,
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
        };
        match outcome {
            Ok(Some(Ok(config))) => Ok(config),
            Ok(Some(Err(err))) => Err(ProviderError::ConfigureFailed(err)),
            // The sender lives in `self`, so the channel cannot close while we wait.
            Ok(None) | Err(_) => Err(ProviderError::Cancelled),
        }
    }
}
