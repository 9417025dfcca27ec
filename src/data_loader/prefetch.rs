//! Prefetch helper for the data loader.
//!
//! Drives a batch stream on a spawned task and hands results over a bounded
//! channel, so at most `depth` batches are prepared ahead of consumption.

use futures_core::stream::Stream;
use futures_util::StreamExt;
use tokio::sync::mpsc::channel;
use tokio_stream::wrappers::ReceiverStream;

/// Spawn an async prefetcher over `source`.
///
/// Must be called from within a tokio runtime.  The producer task stops when
/// `source` ends or the returned stream is dropped.
pub fn spawn_prefetch<S, T>(depth: usize, source: S) -> ReceiverStream<T>
where
    S: Stream<Item = T> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = channel(depth.max(1));
    tokio::spawn(async move {
        let mut source = Box::pin(source);
        while let Some(item) = source.next().await {
            if tx.send(item).await.is_err() {
                break; // consumer dropped
            }
        }
    });
    ReceiverStream::new(rx)
}
