//! Bounded, order-preserving fan-out.

use std::future::Future;

use futures::stream::{self, StreamExt, TryStreamExt};

/// Drive `futures` with at most `limit` in flight, returning results in input
/// order regardless of completion order.
///
/// Stops at the first error; futures still in flight are dropped and no
/// further futures are started.
pub async fn try_join_ordered<I, Fut, T, E>(futures: I, limit: usize) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<T, E>>,
{
    stream::iter(futures)
        .buffered(limit.max(1))
        .try_collect()
        .await
}
