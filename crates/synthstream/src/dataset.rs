//! Buffered tabular data held by every stream.
//!
//! A [`BufferedDataset`] is a named, ordered list of typed [`Field`]s plus an
//! ordered list of rows positionally aligned to those fields. Appends are
//! capped: once the row count would exceed the capacity, the oldest rows are
//! evicted first.

use serde::{Deserialize, Serialize};

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Milliseconds since the Unix epoch.
    Time,
    Number,
    String,
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// A single cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Time(i64),
    Number(f64),
    String(String),
}

impl Value {
    /// Returns the timestamp held by a [`Value::Time`] cell.
    pub fn as_time(&self) -> Option<i64> {
        match self {
            Self::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// Returns the number held by a [`Value::Number`] cell.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the text held by a [`Value::String`] cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

/// One row, positionally aligned to the dataset's fields.
pub type Row = Vec<Value>;

/// A capped, ordered buffer of rows with a field schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferedDataset {
    pub name: Option<String>,
    pub ref_id: Option<String>,
    pub fields: Vec<Field>,
    pub rows: Vec<Row>,
}

impl BufferedDataset {
    /// Creates an empty dataset with the given schema.
    pub fn new(name: impl Into<String>, ref_id: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: Some(name.into()),
            ref_id: Some(ref_id.into()),
            fields,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends `rows` and evicts the oldest rows so that at most `capacity`
    /// remain.
    ///
    /// The surviving rows are always the last `capacity` rows of the full
    /// append history.
    pub fn append(&mut self, rows: &[Row], capacity: usize) {
        self.rows.extend_from_slice(rows);
        if self.rows.len() > capacity {
            let excess = self.rows.len() - capacity;
            self.rows.drain(..excess);
        }
    }

    /// Returns the index of the field named `name`.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(n: i64) -> Row {
        vec![Value::Time(n)]
    }

    #[test]
    fn append_below_capacity_keeps_everything() {
        let mut ds = BufferedDataset::default();
        ds.append(&[row(1), row(2)], 5);
        ds.append(&[row(3)], 5);
        assert_eq!(ds.rows, vec![row(1), row(2), row(3)]);
    }

    #[test]
    fn append_evicts_oldest_first() {
        let capacity = 4;
        let mut ds = BufferedDataset::default();
        let mut history = Vec::new();

        // Uneven batch sizes, including one larger than the capacity.
        let mut next = 0;
        for batch in [1, 3, 2, 6, 1, 0, 5] {
            let rows: Vec<Row> = (next..next + batch).map(row).collect();
            next += batch;
            history.extend(rows.iter().cloned());
            ds.append(&rows, capacity);

            assert!(ds.len() <= capacity);
            let keep = history.len().min(capacity);
            assert_eq!(ds.rows, history[history.len() - keep..]);
        }
    }

    #[test]
    fn zero_capacity_retains_nothing() {
        let mut ds = BufferedDataset::default();
        ds.append(&[row(1), row(2)], 0);
        assert!(ds.is_empty());
    }

    #[test]
    fn values_serialize_untagged() {
        let r = vec![
            Value::Time(5),
            Value::Number(1.5),
            Value::String("x".into()),
            Value::Null,
        ];
        assert_eq!(serde_json::to_string(&r).unwrap(), r#"[5,1.5,"x",null]"#);
    }

    #[test]
    fn field_index_finds_by_name() {
        let ds = BufferedDataset::new(
            "Signal A",
            "A",
            vec![
                Field::new("Time", FieldType::Time),
                Field::new("Value", FieldType::Number),
            ],
        );
        assert_eq!(ds.field_index("Value"), Some(1));
        assert_eq!(ds.field_index("Nope"), None);
    }
}
