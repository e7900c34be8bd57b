use tokio_util::sync::CancellationToken;

/// Cancels the operations it was attached to through [`Client::cancellable`].
///
/// Cancelling aborts only those operations (their retry loops and in-flight
/// transport calls); other calls on the same client are unaffected. Clones
/// share state.
///
/// [`Client::cancellable`]: crate::Client::cancellable
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
