//! Bounded fan-out over a [`JoinSet`] with results restored to input order.

use std::future::Future;

use tokio::task::JoinSet;

use crate::error::EngineError;

/// Run `f` over `items` with at most `limit` tasks in flight.
///
/// Results come back in the order of `items`, whatever order the tasks
/// finish in.
pub(crate) async fn map_bounded<T, R, F, Fut>(
    items: Vec<T>,
    limit: usize,
    f: F,
) -> Result<Vec<R>, EngineError>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
{
    let limit = limit.max(1);
    let mut results: Vec<Option<R>> = Vec::with_capacity(items.len());
    results.resize_with(items.len(), || None);

    let mut set: JoinSet<(usize, R)> = JoinSet::new();
    for (idx, item) in items.into_iter().enumerate() {
        if set.len() >= limit
            && let Some(joined) = set.join_next().await
        {
            let (done, value) = joined?;
            results[done] = Some(value);
        }
        let future = f(item);
        set.spawn(async move { (idx, future.await) });
    }

    while let Some(joined) = set.join_next().await {
        let (done, value) = joined?;
        results[done] = Some(value);
    }

    Ok(results.into_iter().flatten().collect())
}
