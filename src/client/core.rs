use arc_swap::ArcSwapOption;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;
use url::Url;

use crate::auth::Credential;
use crate::client::cancel::CancelHandle;
use crate::client::policy::RetryPolicy;
use crate::client::signals::InflightSnapshot;
use crate::config::ClientConfig;
use crate::transport::Transport;
use crate::{Error, Result};

use super::builder::ClientBuilder;

pub(crate) type SharedTransport = Arc<dyn Transport>;

/// Async TTKIA client.
///
/// Cheap to clone; clones share one connection pool and one configuration.
/// Configuration and credential are fixed at construction, so a `Client` can
/// be used from any number of tasks at once.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) base_url: Url,
    pub(crate) credential: Credential,
    pub(crate) retry: RetryPolicy,
    pub(crate) health_timeout: Duration,
    transport: ArcSwapOption<SharedTransport>,
    pub(crate) inflight: Option<Arc<Semaphore>>,
    pub(crate) max_inflight: Option<usize>,
}

impl ClientInner {
    pub(crate) fn new(
        base_url: Url,
        credential: Credential,
        retry: RetryPolicy,
        health_timeout: Duration,
        transport: SharedTransport,
        max_inflight: Option<usize>,
    ) -> Self {
        Self {
            base_url,
            credential,
            retry,
            health_timeout,
            transport: ArcSwapOption::from_pointee(transport),
            inflight: max_inflight.map(|n| Arc::new(Semaphore::new(n))),
            max_inflight,
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url.as_str())
            .field("credential", &self.inner.credential)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Client {
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    pub fn from_config(config: ClientConfig) -> Result<Self> {
        ClientBuilder::from_config(config).build()
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Which credential type requests carry (`"api_key"` or `"bearer"`).
    pub fn auth_kind(&self) -> &'static str {
        self.inner.credential.kind()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.retry
    }

    /// Release the transport. Returns `true` the first time only.
    ///
    /// Every later call on this client (or any clone) fails with
    /// [`Error::ClientClosed`] before touching the network. Calls already
    /// holding the transport run to completion.
    pub fn close(&self) -> bool {
        let released = self.inner.transport.swap(None).is_some();
        if released {
            debug!(base_url = self.inner.base_url.as_str(), "ttkia client closed");
        }
        released
    }

    pub fn is_closed(&self) -> bool {
        self.inner.transport.load().is_none()
    }

    /// Snapshot of the in-flight gate, when `max_inflight` was configured.
    pub fn inflight(&self) -> Option<InflightSnapshot> {
        let sem = self.inner.inflight.as_ref()?;
        let max = self.inner.max_inflight?;
        let available = sem.available_permits();
        Some(InflightSnapshot {
            max,
            available,
            in_use: max.saturating_sub(available),
        })
    }

    /// Run `operation` until it finishes or `handle` is cancelled.
    ///
    /// Cancellation drops the operation: its retry sleep or in-flight request
    /// is abandoned and its permit released. Resolves to [`Error::Cancelled`].
    pub async fn cancellable<T, F>(&self, handle: &CancelHandle, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = handle.cancelled() => Err(Error::Cancelled),
            result = operation => result,
        }
    }

    /// The live transport, or `ClientClosed`. Loaded once per operation.
    pub(crate) fn transport(&self) -> Result<Arc<SharedTransport>> {
        self.inner.transport.load_full().ok_or(Error::ClientClosed)
    }

    pub(crate) async fn acquire_permit(&self) -> Result<Option<OwnedSemaphorePermit>> {
        match &self.inner.inflight {
            Some(sem) => sem
                .clone()
                .acquire_owned()
                .await
                .map(Some)
                .map_err(|_| Error::ClientClosed),
            None => Ok(None),
        }
    }
}
