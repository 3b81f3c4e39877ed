//! Bounded-concurrency batch executor.
//!
//! Units are split into consecutive batches of at most `limit`. A batch runs
//! concurrently and is fully joined before the next one starts, so a
//! systemic failure (expired credentials, dead endpoint) shows up after one
//! batch instead of after every unit. Each unit is attempted exactly once
//! and a failure never cancels its siblings.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Settled status of one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Succeeded,
    Failed,
}

/// Per-unit result, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitResult<T> {
    Succeeded(T),
    Failed(String),
}

impl<T> UnitResult<T> {
    pub fn status(&self) -> UnitStatus {
        match self {
            Self::Succeeded(_) => UnitStatus::Succeeded,
            Self::Failed(_) => UnitStatus::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// Progress notification emitted as soon as a unit settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnitProgress {
    pub index: usize,
    pub status: UnitStatus,
}

/// Running counters, readable while a run is in flight or after it was
/// abandoned.
#[derive(Debug, Default)]
pub struct BatchTally {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl BatchTally {
    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::Acquire)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Acquire)
    }

    pub fn settled(&self) -> usize {
        self.succeeded() + self.failed()
    }

    fn record(&self, status: UnitStatus) {
        let counter = match status {
            UnitStatus::Succeeded => &self.succeeded,
            UnitStatus::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::AcqRel);
    }
}

/// Executes independent units with at most `limit` in flight.
pub struct UploadBatcher {
    limit: usize,
    tally: Arc<BatchTally>,
}

impl UploadBatcher {
    /// A limit of zero is treated as one.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            tally: Arc::new(BatchTally::default()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Shared counters for this batcher. Grab them before `run` to keep
    /// them after dropping the run future.
    pub fn tally(&self) -> Arc<BatchTally> {
        Arc::clone(&self.tally)
    }

    /// Run `work` over every unit and return one result per unit, in input
    /// order. `on_progress` fires after each individual unit settles.
    pub async fn run<U, T, E, F, Fut, P>(
        &self,
        units: Vec<U>,
        work: F,
        on_progress: P,
    ) -> Vec<UnitResult<T>>
    where
        F: Fn(U) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(UnitProgress),
    {
        let total = units.len();
        let mut results = Vec::with_capacity(total);
        let mut pending = units.into_iter().enumerate().peekable();
        let mut batch_number = 0usize;

        let work = &work;
        let on_progress = &on_progress;
        let tally = &*self.tally;

        while pending.peek().is_some() {
            let batch: Vec<(usize, U)> = pending.by_ref().take(self.limit).collect();
            batch_number += 1;
            debug!(batch = batch_number, size = batch.len(), total, "Starting batch");

            let futures = batch.into_iter().map(|(index, unit)| async move {
                let result = match work(unit).await {
                    Ok(value) => UnitResult::Succeeded(value),
                    Err(e) => UnitResult::Failed(e.to_string()),
                };
                tally.record(result.status());
                on_progress(UnitProgress {
                    index,
                    status: result.status(),
                });
                result
            });

            results.extend(join_all(futures).await);
        }

        debug!(
            batches = batch_number,
            succeeded = tally.succeeded(),
            failed = tally.failed(),
            "All batches settled"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Start(usize),
        End(usize),
    }

    #[tokio::test]
    async fn never_exceeds_limit_and_joins_each_batch() {
        let batcher = UploadBatcher::new(3);
        let in_flight = AtomicUsize::new(0);
        let max_in_flight = AtomicUsize::new(0);
        let events = Mutex::new(Vec::new());
        let progress = Mutex::new(Vec::new());

        let results = batcher
            .run(
                (0..7).collect(),
                |unit: usize| {
                    let in_flight = &in_flight;
                    let max_in_flight = &max_in_flight;
                    let events = &events;
                    async move {
                        events.lock().unwrap().push(Event::Start(unit));
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_in_flight.fetch_max(now, Ordering::SeqCst);
                        // Uneven durations so units inside a batch settle out of order.
                        tokio::time::sleep(Duration::from_millis(5 + (unit as u64 % 3) * 7)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        events.lock().unwrap().push(Event::End(unit));
                        Ok::<_, String>(unit * 10)
                    }
                },
                |p| progress.lock().unwrap().push(p),
            )
            .await;

        assert!(max_in_flight.load(Ordering::SeqCst) <= 3);
        assert_eq!(results.len(), 7);
        assert!(results.iter().all(UnitResult::is_success));
        assert_eq!(results[4], UnitResult::Succeeded(40));
        assert_eq!(progress.lock().unwrap().len(), 7);

        let events = events.lock().unwrap();
        let position = |e: Event| events.iter().position(|x| *x == e).unwrap();
        for first_batch in 0..3 {
            assert!(position(Event::End(first_batch)) < position(Event::Start(3)));
        }
        for second_batch in 3..6 {
            assert!(position(Event::End(second_batch)) < position(Event::Start(6)));
        }
    }

    #[tokio::test]
    async fn failures_do_not_stop_siblings_or_later_batches() {
        let batcher = UploadBatcher::new(2);
        let tally = batcher.tally();
        let attempts = AtomicUsize::new(0);

        let results = batcher
            .run(
                vec!["a", "bad", "c", "bad", "e"],
                |unit: &'static str| {
                    let attempts = &attempts;
                    async move {
                        attempts.fetch_add(1, Ordering::SeqCst);
                        if unit == "bad" {
                            Err(format!("cannot upload {unit}"))
                        } else {
                            Ok(unit.to_uppercase())
                        }
                    }
                },
                |_| {},
            )
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 5);
        assert_eq!(results[1], UnitResult::Failed("cannot upload bad".to_string()));
        assert_eq!(results[4], UnitResult::Succeeded("E".to_string()));
        assert_eq!(tally.succeeded(), 3);
        assert_eq!(tally.failed(), 2);
        assert_eq!(tally.settled(), 5);
    }

    #[tokio::test]
    async fn progress_reports_index_and_status() {
        let batcher = UploadBatcher::new(3);
        let progress = Mutex::new(Vec::new());

        batcher
            .run(
                vec![true, false, true],
                |ok: bool| async move { if ok { Ok(()) } else { Err("boom") } },
                |p| progress.lock().unwrap().push(p),
            )
            .await;

        let mut seen = progress.lock().unwrap().clone();
        seen.sort_by_key(|p| p.index);
        assert_eq!(
            seen,
            vec![
                UnitProgress { index: 0, status: UnitStatus::Succeeded },
                UnitProgress { index: 1, status: UnitStatus::Failed },
                UnitProgress { index: 2, status: UnitStatus::Succeeded },
            ]
        );
    }

    #[tokio::test]
    async fn zero_limit_is_clamped_and_empty_input_is_fine() {
        let batcher = UploadBatcher::new(0);
        assert_eq!(batcher.limit(), 1);
        let results = batcher
            .run(Vec::<u8>::new(), |_u| async { Ok::<_, String>(()) }, |_| {})
            .await;
        assert!(results.is_empty());
        assert_eq!(batcher.tally().settled(), 0);
    }

    #[tokio::test]
    async fn tally_survives_abandoned_run() {
        let batcher = UploadBatcher::new(1);
        let tally = batcher.tally();

        let run = batcher.run(
            vec![1u64, 2, 50],
            |ms: u64| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok::<_, String>(())
            },
            |_| {},
        );
        // Give up before the slow third unit finishes.
        let abandoned = tokio::time::timeout(Duration::from_millis(30), run).await;
        assert!(abandoned.is_err());
        assert_eq!(tally.succeeded(), 2);
        assert_eq!(tally.failed(), 0);
    }
}
