//! Incremental CSV reading for chunked sources.
//!
//! Text arrives in arbitrary pieces. [`CsvStreamReader`] buffers the trailing
//! partial record and only hands complete records (a newline outside quotes)
//! to the `csv` parser. The first record is the header; column types are
//! inferred from the first data row and reported together with the header.

use crate::{Field, FieldType, Row, Value};
use csv::{ReaderBuilder, StringRecord, Trim};

/// Receives parse results.
pub trait RecordSink {
    /// Called once, before the first row, with the inferred schema.
    fn on_header(&mut self, fields: Vec<Field>);

    /// Called for every data row, aligned to the header's fields.
    fn on_row(&mut self, row: Row);
}

#[derive(Debug, Default)]
pub struct CsvStreamReader {
    pending: String,
    names: Option<Vec<String>>,
    fields: Option<Vec<Field>>,
}

impl CsvStreamReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema reported so far, if any.
    pub fn fields(&self) -> Option<&[Field]> {
        self.fields.as_deref()
    }

    /// Feeds decoded text. Complete records are parsed immediately; the
    /// remainder waits for more text.
    pub fn feed(&mut self, text: &str, sink: &mut impl RecordSink) {
        self.pending.push_str(text);
        let end = complete_len(&self.pending);
        if end == 0 {
            return;
        }
        let complete: String = self.pending.drain(..end).collect();
        self.parse(&complete, sink);
    }

    /// Parses whatever is left after end-of-data. A header without rows is
    /// reported with string-typed fields.
    pub fn finish(&mut self, sink: &mut impl RecordSink) {
        if !self.pending.is_empty() {
            let rest = core::mem::take(&mut self.pending);
            self.parse(&rest, sink);
        }
        if self.fields.is_none() {
            if let Some(names) = &self.names {
                let fields: Vec<Field> = names
                    .iter()
                    .map(|n| Field::new(n.clone(), FieldType::String))
                    .collect();
                self.fields = Some(fields.clone());
                sink.on_header(fields);
            }
        }
    }

    fn parse(&mut self, text: &str, sink: &mut impl RecordSink) {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .trim(Trim::All)
            .from_reader(text.as_bytes());

        for record in reader.records() {
            match record {
                Ok(record) => self.record(&record, sink),
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Skipping malformed CSV record: {_e}");
                }
            }
        }
    }

    fn record(&mut self, record: &StringRecord, sink: &mut impl RecordSink) {
        let Some(names) = &self.names else {
            self.names = Some(record.iter().map(str::to_string).collect());
            return;
        };

        if self.fields.is_none() {
            let fields: Vec<Field> = names
                .iter()
                .enumerate()
                .map(|(i, name)| Field::new(name.clone(), infer(name, record.get(i))))
                .collect();
            sink.on_header(fields.clone());
            self.fields = Some(fields);
        }
        let Some(fields) = &self.fields else {
            return;
        };

        let row = fields
            .iter()
            .enumerate()
            .map(|(i, field)| parse_cell(field.field_type, record.get(i).unwrap_or("")))
            .collect();
        sink.on_row(row);
    }
}

/// Byte length of the prefix of `text` that ends with a record terminator.
fn complete_len(text: &str) -> usize {
    let mut in_quotes = false;
    let mut end = 0;
    for (i, b) in text.bytes().enumerate() {
        match b {
            b'"' => in_quotes = !in_quotes,
            b'\n' if !in_quotes => end = i + 1,
            _ => {}
        }
    }
    end
}

fn infer(name: &str, sample: Option<&str>) -> FieldType {
    let numeric = sample.is_some_and(|s| s.parse::<f64>().is_ok());
    let lower = name.to_ascii_lowercase();
    if (lower == "time" || lower == "timestamp") && (numeric || sample.is_none_or(str::is_empty)) {
        FieldType::Time
    } else if numeric {
        FieldType::Number
    } else {
        FieldType::String
    }
}

fn parse_cell(field_type: FieldType, cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    match field_type {
        FieldType::Time => cell
            .parse::<i64>()
            .ok()
            .or_else(|| cell.parse::<f64>().ok().map(|v| v as i64))
            .map_or(Value::Null, Value::Time),
        FieldType::Number => cell.parse().map_or(Value::Null, Value::Number),
        FieldType::String => Value::String(cell.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect {
        headers: Vec<Vec<Field>>,
        rows: Vec<Row>,
    }

    impl RecordSink for Collect {
        fn on_header(&mut self, fields: Vec<Field>) {
            self.headers.push(fields);
        }

        fn on_row(&mut self, row: Row) {
            self.rows.push(row);
        }
    }

    #[test]
    fn infers_types_from_first_row() {
        let mut reader = CsvStreamReader::new();
        let mut sink = Collect::default();
        reader.feed("time,value,host\n1000,1.5,a\n2000,,b\n", &mut sink);

        assert_eq!(
            sink.headers,
            vec![vec![
                Field::new("time", FieldType::Time),
                Field::new("value", FieldType::Number),
                Field::new("host", FieldType::String),
            ]]
        );
        assert_eq!(
            sink.rows,
            vec![
                vec![Value::Time(1000), Value::Number(1.5), Value::String("a".into())],
                vec![Value::Time(2000), Value::Null, Value::String("b".into())],
            ]
        );
    }

    #[test]
    fn records_split_across_chunks_are_reassembled() {
        let text = "name,count\n\"a, b\",1\n\"multi\nline\",2\nlast,3\n";
        for split in 1..text.len() {
            let mut reader = CsvStreamReader::new();
            let mut sink = Collect::default();
            reader.feed(&text[..split], &mut sink);
            reader.feed(&text[split..], &mut sink);
            reader.finish(&mut sink);

            assert_eq!(sink.headers.len(), 1, "split at {split}");
            assert_eq!(
                sink.rows,
                vec![
                    vec![Value::String("a, b".into()), Value::Number(1.0)],
                    vec![Value::String("multi\nline".into()), Value::Number(2.0)],
                    vec![Value::String("last".into()), Value::Number(3.0)],
                ],
                "split at {split}"
            );
        }
    }

    #[test]
    fn rows_wait_for_their_terminator() {
        let mut reader = CsvStreamReader::new();
        let mut sink = Collect::default();
        reader.feed("a,b\n1,2", &mut sink);
        assert!(sink.rows.is_empty());
        reader.finish(&mut sink);
        assert_eq!(sink.rows, vec![vec![Value::Number(1.0), Value::Number(2.0)]]);
    }

    #[test]
    fn comments_are_skipped_and_short_rows_padded() {
        let mut reader = CsvStreamReader::new();
        let mut sink = Collect::default();
        reader.feed("# exported\nx,y,z\n1,2\n", &mut sink);
        assert_eq!(
            sink.rows,
            vec![vec![Value::Number(1.0), Value::Number(2.0), Value::Null]]
        );
        assert_eq!(reader.fields().unwrap()[2].field_type, FieldType::String);
    }

    #[test]
    fn header_only_input_reports_string_fields() {
        let mut reader = CsvStreamReader::new();
        let mut sink = Collect::default();
        reader.feed("a,b", &mut sink);
        reader.finish(&mut sink);
        assert_eq!(
            sink.headers,
            vec![vec![
                Field::new("a", FieldType::String),
                Field::new("b", FieldType::String)
            ]]
        );
        assert!(sink.rows.is_empty());
    }
}
