//! Cancellation of collaborator calls

use crate::error::{ProviderError, Result};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Race `fut` against `cancel`, returning `Cancelled` as soon as the token fires.
///
/// The collaborator future is dropped on cancellation, so a call that ignores
/// its token still cannot hold the query open.
pub(crate) async fn run_cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(ProviderError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::Cancelled),
        result = fut => result,
    }
}
