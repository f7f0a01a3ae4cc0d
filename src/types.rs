use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DedupError, Result};

/// Position of a row in the ingested input; the row's identity for its whole life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(pub usize);

/// A recency value after normalization.
///
/// `Missing` is declared first so the derived ordering places it below every
/// real timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Recency {
    Missing,
    At(NaiveDateTime),
}

impl Recency {
    pub fn is_missing(&self) -> bool {
        matches!(self, Recency::Missing)
    }
}

/// One value in a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Cell {
    Null,
    Text(String),
    Recency(Recency),
    Flag(bool),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Maps an empty CSV field to `Null`, everything else to `Text`.
    pub fn from_field(field: &str) -> Self {
        if field.is_empty() {
            Cell::Null
        } else {
            Cell::Text(field.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Cell::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Recency(Recency::Missing) => Ok(()),
            Cell::Recency(Recency::At(ts)) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
            Cell::Flag(true) => f.write_str("1"),
            Cell::Flag(false) => f.write_str("0"),
        }
    }
}

/// Ordered column names of a dataset. Serialized as a plain list of names;
/// deserializing goes through [`Schema::new`], so duplicates are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Schema {
    columns: Vec<String>,
}

impl Schema {
    pub fn new(columns: Vec<String>) -> Result<Self> {
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(DedupError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Like `index_of`, but a missing column is a structural error.
    pub fn require(&self, name: &str) -> Result<usize> {
        self.index_of(name)
            .ok_or_else(|| DedupError::MissingColumn(name.to_string()))
    }

    pub fn require_all(&self, names: &[String]) -> Result<Vec<usize>> {
        names.iter().map(|n| self.require(n)).collect()
    }
}

impl TryFrom<Vec<String>> for Schema {
    type Error = DedupError;

    fn try_from(columns: Vec<String>) -> Result<Self> {
        Schema::new(columns)
    }
}

impl From<Schema> for Vec<String> {
    fn from(schema: Schema) -> Self {
        schema.columns
    }
}

/// Values of the entity-key columns of one row, in key order. `Cell::Null`
/// components are ordinary key values.
pub type GroupKey = Vec<Cell>;

/// Render a group key for reports; `None` marks a null component.
pub fn key_labels(key: &[Cell]) -> Vec<Option<String>> {
    key.iter()
        .map(|cell| (!cell.is_null()).then(|| cell.to_string()))
        .collect()
}

/// A single observation, cells ordered by the owning dataset's schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub id: RowId,
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(id: usize, cells: Vec<Cell>) -> Self {
        Self { id: RowId(id), cells }
    }

    pub fn get(&self, index: usize) -> &Cell {
        self.cells.get(index).unwrap_or(&Cell::Null)
    }

    pub fn key(&self, indices: &[usize]) -> GroupKey {
        indices.iter().map(|&i| self.get(i).clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub schema: Schema,
    pub rows: Vec<Row>,
}

impl Dataset {
    pub fn new(schema: Schema, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    /// Builds a dataset from string columns, assigning row ids by position.
    /// Empty strings become `Cell::Null`.
    pub fn from_text_rows(columns: &[&str], rows: &[Vec<&str>]) -> Result<Self> {
        let schema = Schema::new(columns.iter().map(|c| c.to_string()).collect())?;
        let rows = rows
            .iter()
            .enumerate()
            .map(|(i, fields)| Row::new(i, fields.iter().map(|f| Cell::from_field(f)).collect()))
            .collect();
        Ok(Self { schema, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Copy of the dataset with `name` removed; unchanged if the column is absent.
    pub fn without_column(&self, name: &str) -> Dataset {
        let Some(index) = self.schema.index_of(name) else {
            return self.clone();
        };
        let mut columns = self.schema.columns.clone();
        columns.remove(index);
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut cells = row.cells.clone();
                if index < cells.len() {
                    cells.remove(index);
                }
                Row { id: row.id, cells }
            })
            .collect();
        Dataset {
            schema: Schema { columns },
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn missing_orders_below_any_timestamp() {
        let early = NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(Recency::Missing < Recency::At(early));
        assert_eq!(
            [Recency::Missing, Recency::At(early)].iter().max(),
            Some(&Recency::At(early))
        );
    }

    #[test]
    fn schema_rejects_duplicate_columns() {
        let err = Schema::new(vec!["a".into(), "b".into(), "a".into()]).unwrap_err();
        assert!(matches!(err, DedupError::DuplicateColumn(c) if c == "a"));
    }

    #[test]
    fn deserialized_schema_rejects_duplicate_columns() {
        let schema: Schema = serde_json::from_str(r#"["Hostname","FQDN"]"#).unwrap();
        assert_eq!(schema.columns(), &["Hostname".to_string(), "FQDN".to_string()]);

        let err = serde_json::from_str::<Schema>(r#"["Hostname","FQDN","Hostname"]"#).unwrap_err();
        assert!(err.to_string().contains("Duplicate column in header: Hostname"));

        let ds = Dataset::from_text_rows(&["a", "b"], &[vec!["1", ""]]).unwrap();
        let back: Dataset = serde_json::from_str(&serde_json::to_string(&ds).unwrap()).unwrap();
        assert_eq!(back, ds);
        let forged = r#"{"schema":["a","a"],"rows":[]}"#;
        assert!(serde_json::from_str::<Dataset>(forged).is_err());
    }

    #[test]
    fn without_column_keeps_row_ids() {
        let ds = Dataset::from_text_rows(&["a", "b"], &[vec!["1", "2"], vec!["3", ""]]).unwrap();
        let stripped = ds.without_column("a");
        assert_eq!(stripped.schema.columns(), &["b".to_string()]);
        assert_eq!(stripped.rows[1].id, RowId(1));
        assert_eq!(stripped.rows[1].cells, vec![Cell::Null]);
        assert_eq!(ds.without_column("zzz"), ds);
    }

    #[test]
    fn cells_render_for_csv() {
        assert_eq!(Cell::Flag(true).to_string(), "1");
        assert_eq!(Cell::Recency(Recency::Missing).to_string(), "");
        assert_eq!(Cell::Null.to_string(), "");
    }
}
