//! A bounded worker pool for the pipeline's fan-out/fan-in stages (extraction
//! over chunks, consolidation over subjects — §4.4).
//!
//! Unlike the persistent, durable job queue this replaces (apalis backed by
//! Postgres, suited to long-lived background work queued across process
//! restarts), the pipeline's batches are ephemeral: a fixed list of items is
//! known up front, every item must be attempted exactly once, and the whole
//! batch fits in one process lifetime. A plain bounded channel plus a fixed
//! set of worker tasks models that directly without a storage backend.

use std::future::Future;
use std::sync::Arc;

use recollect_shared::AppError;
use tokio::sync::{mpsc, Mutex};

/// Run `worker` over every item in `items`, with at most `concurrency` calls
/// in flight at once.
///
/// Results are collected in **arrival order**, not input order — the
/// producer enqueues every item and closes the input channel, a fixed pool
/// of workers drains it independently, and a single collector appends each
/// result as its worker finishes (§4.4: "no ordering guarantee on result
/// arrival; the collector aggregates surviving outputs in arrival order").
/// One item failing does not cancel the others — every item gets exactly one
/// `Result` (§4.4 partial-failure tolerance).
///
/// The collector logs progress every `progress_every` completions, plus once
/// more at completion (§4.4: "the collector records progress every ten
/// completions (for extraction) or five (for consolidation), and at
/// completion"). `progress_every == 0` disables the periodic log, keeping
/// only the completion log. `label` names the stage in the log line (e.g.
/// `"fact extraction"`, `"consolidation"`).
pub async fn run_bounded<T, R, F, Fut>(
  items: Vec<T>,
  concurrency: usize,
  progress_every: usize,
  label: &str,
  worker: F,
) -> Vec<Result<R, AppError>>
where
  T: Send + 'static,
  R: Send + 'static,
  F: Fn(T) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<R, AppError>> + Send,
{
  let total = items.len();
  if total == 0 {
    return Vec::new();
  }
  let concurrency = concurrency.max(1).min(total);

  let (work_tx, work_rx) = mpsc::unbounded_channel::<T>();
  for item in items {
    // Never fails: the receiver half outlives this loop.
    let _ = work_tx.send(item);
  }
  drop(work_tx);
  let work_rx = Arc::new(Mutex::new(work_rx));

  let (result_tx, mut result_rx) = mpsc::unbounded_channel::<Result<R, AppError>>();
  let worker = Arc::new(worker);

  let mut handles = Vec::with_capacity(concurrency);
  for _ in 0..concurrency {
    let work_rx = Arc::clone(&work_rx);
    let result_tx = result_tx.clone();
    let worker = Arc::clone(&worker);

    handles.push(tokio::spawn(async move {
      loop {
        let next = work_rx.lock().await.recv().await;
        let Some(item) = next else { break };
        let result = worker(item).await;
        if result_tx.send(result).is_err() {
          break;
        }
      }
    }));
  }
  drop(result_tx);

  // Single collector: appends results in whatever order workers finish,
  // logging progress every `progress_every` completions.
  let mut results = Vec::with_capacity(total);
  while let Some(result) = result_rx.recv().await {
    results.push(result);
    if progress_every > 0 && results.len() % progress_every == 0 {
      tracing::info!(label, completed = results.len(), total, "pool progress");
    }
  }
  tracing::info!(label, completed = results.len(), total, "pool complete");

  for handle in handles {
    let _ = handle.await;
  }

  results
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  #[tokio::test]
  async fn every_item_gets_exactly_one_result_regardless_of_completion_order() {
    let items: Vec<u32> = (0..20).collect();
    let results = run_bounded(items, 4, 0, "test", |n| async move {
      // Reverse-ish delay so completion order differs from input order.
      tokio::time::sleep(std::time::Duration::from_micros(u64::from(20 - n))).await;
      Ok::<_, AppError>(n * 2)
    })
    .await;

    let mut values: Vec<u32> = results.into_iter().map(Result::unwrap).collect();
    values.sort_unstable();
    assert_eq!(values, (0..20).map(|n| n * 2).collect::<Vec<_>>());
  }

  #[tokio::test]
  async fn fastest_item_can_arrive_before_a_slower_earlier_one() {
    // Item 0 is submitted first but sleeps longest; with several workers in
    // flight it should not be forced to the front of the result list.
    let items: Vec<u32> = vec![0, 1, 2, 3];
    let results = run_bounded(items, 4, 0, "test", |n| async move {
      let delay = if n == 0 { 20 } else { 1 };
      tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
      Ok::<_, AppError>(n)
    })
    .await;

    let values: Vec<u32> = results.into_iter().map(Result::unwrap).collect();
    assert_eq!(values.last().copied(), Some(0));
  }

  #[tokio::test]
  async fn one_failure_does_not_cancel_the_rest() {
    let items: Vec<u32> = (0..10).collect();
    let results = run_bounded(items, 3, 0, "test", |n| async move {
      if n == 5 {
        Err(AppError::new(anyhow::anyhow!("boom")))
      } else {
        Ok::<_, AppError>(n)
      }
    })
    .await;

    assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 9);
  }

  #[tokio::test]
  async fn never_exceeds_requested_concurrency() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let items: Vec<u32> = (0..30).collect();
    let in_flight_clone = Arc::clone(&in_flight);
    let max_seen_clone = Arc::clone(&max_seen);

    let results = run_bounded(items, 5, 0, "test", move |n| {
      let in_flight = Arc::clone(&in_flight_clone);
      let max_seen = Arc::clone(&max_seen_clone);
      async move {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        max_seen.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok::<_, AppError>(n)
      }
    })
    .await;

    assert_eq!(results.len(), 30);
    assert!(max_seen.load(Ordering::SeqCst) <= 5);
  }
}
