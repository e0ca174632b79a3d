//! Bounded-concurrency batch processing.

use futures::stream::{self, StreamExt};

/// Run `f` over `items` with at most `concurrency` futures in flight.
///
/// Results come back in input order regardless of completion order. A
/// concurrency of zero is treated as one.
pub async fn run_bounded<T, R, F, Fut>(items: Vec<T>, concurrency: usize, f: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: std::future::Future<Output = R>,
{
    stream::iter(items.into_iter().map(f)).buffered(concurrency.max(1)).collect().await
}
