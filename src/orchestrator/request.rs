use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Per-request deadline and cancellation.
///
/// When either fires while a provider is in flight, the walk is dropped:
/// the provider's budget hold is released and nothing is recorded.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub deadline: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}
