//! Bridge from the synchronous workflow into async I/O.

use std::future::Future;

/// Run `future` to completion on a fresh current-thread runtime.
///
/// Must not be called from inside another tokio runtime.
pub(crate) fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create tokio runtime: {}", e))?;
    Ok(runtime.block_on(future))
}
