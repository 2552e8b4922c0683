use super::TickProducer;
use crate::{BufferedDataset, Field, FieldType, RandSource, Row, StreamQuery, ThreadRandom, Value};

/// Synthetic numeric signal: a bounded random walk with optional min/max
/// confidence bands.
///
/// Each row is `[Time, Value, Min, Max, ...]` with one `(Min, Max)` pair per
/// band. The walk's step is scaled by `spread`; each band's distance from the
/// value is a uniform draw scaled by `noise`.
#[derive(Debug)]
pub struct SignalProducer<R: RandSource = ThreadRandom> {
    value: f64,
    rand: R,
}

impl Default for SignalProducer {
    fn default() -> Self {
        Self::with_rand(ThreadRandom)
    }
}

impl<R: RandSource> SignalProducer<R> {
    /// Creates a producer whose walk starts at a random point in `[0, 100)`.
    pub fn with_rand(mut rand: R) -> Self {
        let value = rand.uniform() * 100.0;
        Self { value, rand }
    }

    /// Current position of the walk.
    pub const fn value(&self) -> f64 {
        self.value
    }
}

impl<R: RandSource> TickProducer for SignalProducer<R> {
    fn schema(&self, query: &StreamQuery, ref_id: &str) -> BufferedDataset {
        let mut fields = Vec::with_capacity(2 + 2 * query.bands);
        fields.push(Field::new("Time", FieldType::Time));
        fields.push(Field::new("Value", FieldType::Number));
        for i in 0..query.bands {
            let suffix = if query.bands > 1 {
                format!(" {}", i + 1)
            } else {
                String::new()
            };
            fields.push(Field::new(format!("Min{suffix}"), FieldType::Number));
            fields.push(Field::new(format!("Max{suffix}"), FieldType::Number));
        }
        BufferedDataset::new(format!("Signal {ref_id}"), ref_id, fields)
    }

    fn next_row(&mut self, query: &StreamQuery, time: i64) -> Row {
        let noise = query.noise.max(0.0);
        self.value += (self.rand.uniform() - 0.5) * query.spread;

        let mut row = Vec::with_capacity(2 + 2 * query.bands);
        row.push(Value::Time(time));
        row.push(Value::Number(self.value));
        for _ in 0..query.bands {
            row.push(Value::Number(self.value - self.rand.uniform() * noise));
            row.push(Value::Number(self.value + self.rand.uniform() * noise));
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StreamDefaults;

    struct CycleRand {
        values: Vec<f64>,
        index: usize,
    }

    impl RandSource for CycleRand {
        fn uniform(&mut self) -> f64 {
            let v = self.values[self.index % self.values.len()];
            self.index += 1;
            v
        }
    }

    fn query(bands: usize) -> StreamQuery {
        let mut q = StreamQuery::resolve(None, &StreamDefaults::default());
        q.bands = bands;
        q
    }

    #[test]
    fn schema_names_bands() {
        let p = SignalProducer::default();
        let names = |q| {
            p.schema(&q, "A")
                .fields
                .into_iter()
                .map(|f| f.name)
                .collect::<Vec<_>>()
        };
        assert_eq!(names(query(0)), ["Time", "Value"]);
        assert_eq!(names(query(1)), ["Time", "Value", "Min", "Max"]);
        assert_eq!(
            names(query(2)),
            ["Time", "Value", "Min 1", "Max 1", "Min 2", "Max 2"]
        );
        assert_eq!(p.schema(&query(1), "A").name.as_deref(), Some("Signal A"));
    }

    #[test]
    fn walk_steps_by_spread() {
        // Start at 50, then step by (0.75 - 0.5) * 4 = +1.
        let rand = CycleRand {
            values: vec![0.5, 0.75],
            index: 0,
        };
        let mut p = SignalProducer::with_rand(rand);
        assert_eq!(p.value(), 50.0);

        let mut q = query(0);
        q.spread = 4.0;
        let row = p.next_row(&q, 7);
        assert_eq!(row, vec![Value::Time(7), Value::Number(51.0)]);
    }

    #[test]
    fn bands_bracket_the_value() {
        let mut p = SignalProducer::default();
        let mut q = query(3);
        q.noise = 5.0;
        for t in 0..5_000 {
            let row = p.next_row(&q, t);
            assert_eq!(row.len(), 2 + 2 * 3);
            let value = row[1].as_number().unwrap();
            for band in row[2..].chunks(2) {
                let min = band[0].as_number().unwrap();
                let max = band[1].as_number().unwrap();
                assert!(min <= value && value <= max, "{min} <= {value} <= {max}");
            }
        }
    }

    #[test]
    fn negative_noise_collapses_bands_onto_the_value() {
        let mut p = SignalProducer::default();
        let mut q = query(1);
        q.noise = -3.0;
        let row = p.next_row(&q, 0);
        assert_eq!(row[1], row[2]);
        assert_eq!(row[1], row[3]);
    }
}
