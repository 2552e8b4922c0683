//! Timer-driven loop shared by the signal and log producers.

use crate::{BufferedDataset, Row, StreamQuery, worker::WorkerCore};
use core::time::Duration;
use std::sync::Arc;
use tokio::time::sleep;

/// A producer that emits one row per tick.
pub trait TickProducer: Send + 'static {
    /// Returns an empty dataset carrying this producer's schema.
    fn schema(&self, query: &StreamQuery, ref_id: &str) -> BufferedDataset;

    /// Computes the row for `time` (ms since the Unix epoch).
    fn next_row(&mut self, query: &StreamQuery, time: i64) -> Row;

    /// Delay before the next tick, given the floored configured interval.
    fn next_interval(&mut self, interval: Duration) -> Duration {
        interval
    }
}

/// Builds the schema and backfills `capacity` rows spaced `interval` apart,
/// the newest one `interval` before `now`.
pub(crate) fn backfill<P: TickProducer>(
    producer: &mut P,
    query: &StreamQuery,
    ref_id: &str,
    capacity: usize,
    now: i64,
    interval: Duration,
) -> BufferedDataset {
    let step = i64::try_from(interval.as_millis()).unwrap_or(i64::MAX);
    let span = i64::try_from(capacity)
        .unwrap_or(i64::MAX)
        .saturating_mul(step);
    let mut series = producer.schema(query, ref_id);

    let mut time = now.saturating_sub(span);
    for _ in 0..capacity {
        series.rows.push(producer.next_row(query, time));
        time = time.saturating_add(step);
    }
    series
}

/// Runs a periodic producer until its worker is cancelled or orphaned.
///
/// - Waits the startup delay, then backfills the buffer.
/// - Each tick re-reads the worker's query, so updates apply on the next
///   tick.
/// - Stops without rescheduling once the worker has no observer and its
///   request started longer ago than the orphan timeout.
pub(crate) async fn run<P: TickProducer>(core: Arc<WorkerCore>, mut producer: P) {
    let token = core.cancel_token().clone();

    tokio::select! {
        biased;
        () = token.cancelled() => return,
        () = sleep(core.config().startup_delay()) => {}
    }

    let query = core.query();
    let interval = core.config().tick_interval(query.speed);
    let series = backfill(
        &mut producer,
        &query,
        &core.key().ref_id,
        core.capacity(),
        core.now(),
        interval,
    );
    core.set_series(series);

    loop {
        if core.is_orphaned() {
            #[cfg(feature = "tracing")]
            tracing::debug!(key = %core.key(), "Stop looping");
            return;
        }

        let query = core.query();
        let interval = core.config().tick_interval(query.speed);
        let row = producer.next_row(&query, core.now());
        core.append_rows(vec![row]);

        let delay = producer.next_interval(interval);
        tokio::select! {
            biased;
            () = token.cancelled() => return,
            () = sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Field, FieldType, StreamDefaults, Value};

    struct Counter(f64);

    impl TickProducer for Counter {
        fn schema(&self, _query: &StreamQuery, ref_id: &str) -> BufferedDataset {
            BufferedDataset::new(
                "Counter",
                ref_id,
                vec![
                    Field::new("Time", FieldType::Time),
                    Field::new("Value", FieldType::Number),
                ],
            )
        }

        fn next_row(&mut self, _query: &StreamQuery, time: i64) -> Row {
            self.0 += 1.0;
            vec![Value::Time(time), Value::Number(self.0)]
        }
    }

    #[test]
    fn backfill_spaces_rows_by_interval_and_ends_before_now() {
        let query = StreamQuery::resolve(None, &StreamDefaults::default());
        let series = backfill(
            &mut Counter(0.0),
            &query,
            "A",
            4,
            1_000,
            Duration::from_millis(100),
        );

        let times: Vec<i64> = series.rows.iter().map(|r| r[0].as_time().unwrap()).collect();
        assert_eq!(times, vec![600, 700, 800, 900]);
        assert_eq!(series.ref_id.as_deref(), Some("A"));
        assert_eq!(series.rows[3][1], Value::Number(4.0));
    }

    #[test]
    fn backfill_saturates_instead_of_overflowing() {
        let query = StreamQuery::resolve(None, &StreamDefaults::default());
        let series = backfill(
            &mut Counter(0.0),
            &query,
            "A",
            3,
            0,
            Duration::from_millis(u64::MAX),
        );

        let times: Vec<i64> = series.rows.iter().map(|r| r[0].as_time().unwrap()).collect();
        assert_eq!(times, vec![-i64::MAX, 0, i64::MAX]);
    }

    #[test]
    fn backfill_with_zero_capacity_only_sets_schema() {
        let query = StreamQuery::resolve(None, &StreamDefaults::default());
        let series = backfill(
            &mut Counter(0.0),
            &query,
            "A",
            0,
            1_000,
            Duration::from_millis(100),
        );
        assert!(series.rows.is_empty());
        assert_eq!(series.fields.len(), 2);
    }
}
