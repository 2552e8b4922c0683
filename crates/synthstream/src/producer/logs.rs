use super::TickProducer;
use crate::{BufferedDataset, Field, FieldType, RandSource, Row, StreamQuery, ThreadRandom, Value};
use core::{fmt, time::Duration};

/// Severity attached to every generated log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
    Trace,
    Unknown,
}

impl LogLevel {
    pub const ALL: [Self; 7] = [
        Self::Critical,
        Self::Error,
        Self::Warning,
        Self::Info,
        Self::Debug,
        Self::Trace,
        Self::Unknown,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
            Self::Unknown => "unknown",
        }
    }

    /// Maps a uniform draw onto the weighted severity buckets.
    pub fn from_draw(v: f64) -> Self {
        match v {
            v if v > 0.9 => Self::Critical,
            v if v > 0.8 => Self::Error,
            v if v > 0.7 => Self::Warning,
            v if v > 0.4 => Self::Info,
            v if v > 0.3 => Self::Debug,
            v if v > 0.1 => Self::Trace,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synthetic log lines formatted as `"[<level>] <text>"`.
///
/// Text is assembled by walking [`WORDS`] with a random stride of 0-4 until the
/// line reaches the query's `line_length`. Tick intervals carry ±10% jitter.
#[derive(Debug)]
pub struct LogProducer<R: RandSource = ThreadRandom> {
    index: usize,
    rand: R,
}

impl Default for LogProducer {
    fn default() -> Self {
        Self::with_rand(ThreadRandom)
    }
}

impl<R: RandSource> LogProducer<R> {
    pub const fn with_rand(rand: R) -> Self {
        Self { index: 0, rand }
    }

    pub fn random_level(&mut self) -> LogLevel {
        LogLevel::from_draw(self.rand.uniform())
    }

    fn next_word(&mut self) -> &'static str {
        let stride = (self.rand.uniform() * 5.0) as usize;
        self.index = (self.index + stride) % WORDS.len();
        WORDS[self.index]
    }

    /// Returns a line of at least `min_len` characters.
    pub fn random_line(&mut self, min_len: usize) -> String {
        let mut line = String::from(self.next_word());
        while line.len() < min_len {
            line.push(' ');
            line.push_str(self.next_word());
        }
        line
    }
}

impl<R: RandSource> TickProducer for LogProducer<R> {
    fn schema(&self, _query: &StreamQuery, ref_id: &str) -> BufferedDataset {
        BufferedDataset::new(
            format!("Logs {ref_id}"),
            ref_id,
            vec![
                Field::new("Time", FieldType::Time),
                Field::new("Line", FieldType::String),
            ],
        )
    }

    fn next_row(&mut self, query: &StreamQuery, time: i64) -> Row {
        let level = self.random_level();
        let line = self.random_line(query.line_length);
        vec![Value::Time(time), Value::String(format!("[{level}] {line}"))]
    }

    fn next_interval(&mut self, interval: Duration) -> Duration {
        // 0.2 * [-0.5, 0.5) => ±10%
        let variance = 0.2 * (self.rand.uniform() - 0.5);
        interval.mul_f64(1.0 + variance)
    }
}

/// Vocabulary the line generator walks.
pub const WORDS: &[&str] = &[
    "At", "vero", "eos", "et", "accusamus", "et", "iusto", "odio", "dignissimos", "ducimus",
    "qui", "blanditiis", "praesentium", "voluptatum", "deleniti", "atque", "corrupti", "quos",
    "dolores", "et", "quas", "molestias", "excepturi", "sint", "occaecati", "cupiditate", "non",
    "provident", "similique", "sunt", "in", "culpa", "qui", "officia", "deserunt", "mollitia",
    "animi", "id", "est", "laborum", "et", "dolorum", "fuga", "Et", "harum", "quidem", "rerum",
    "facilis", "est", "et", "expedita", "distinctio", "Nam", "libero", "tempore", "cum",
    "soluta", "nobis", "est", "eligendi", "optio", "cumque", "nihil", "impedit", "quo", "minus",
    "id", "quod", "maxime", "placeat", "facere", "possimus", "omnis", "voluptas", "assumenda",
    "est", "omnis", "dolor", "repellendus", "Temporibus", "autem", "quibusdam", "et", "aut",
    "officiis", "debitis", "aut", "rerum", "necessitatibus", "saepe", "eveniet", "ut", "et",
    "voluptates", "repudiandae", "sint", "et", "molestiae", "non", "recusandae", "Itaque",
    "earum", "rerum", "hic", "tenetur", "a", "sapiente", "delectus", "ut", "aut", "reiciendis",
    "voluptatibus", "maiores", "alias", "consequatur", "aut", "perferendis", "doloribus",
    "asperiores", "repellat",
];
