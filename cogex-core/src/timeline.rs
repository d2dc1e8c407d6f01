use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};

/// One row of a timeline variable table: the parameter set substituted into
/// a block's trials for one iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimelineVariableRecord(Map<String, Value>);

impl TimelineVariableRecord {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl<K, V> FromIterator<(K, V)> for TimelineVariableRecord
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Ordered, read-only table of timeline variable records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimelineTable {
    records: Vec<TimelineVariableRecord>,
}

impl TimelineTable {
    pub fn new(records: Vec<TimelineVariableRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TimelineVariableRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimelineVariableRecord> {
        self.records.iter()
    }

    /// Reads one record per CSV row, keeping only `columns` when given.
    pub fn from_csv(path: impl AsRef<Path>, columns: Option<&[&str]>) -> Result<Self> {
        Self::from_csv_reader(File::open(path)?, columns)
    }

    pub fn from_csv_reader<R: Read>(reader: R, columns: Option<&[&str]>) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader.headers()?.clone();
        let selected: Vec<(usize, &str)> = match columns {
            Some(columns) => columns
                .iter()
                .map(|column| {
                    headers
                        .iter()
                        .position(|h| h == *column)
                        .map(|i| (i, *column))
                        .ok_or_else(|| Error::MissingColumn(column.to_string()))
                })
                .collect::<Result<_>>()?,
            None => headers.iter().enumerate().collect(),
        };

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            records.push(
                selected
                    .iter()
                    .map(|(i, name)| (*name, cell_value(row.get(*i).unwrap_or(""))))
                    .collect(),
            );
        }
        Ok(Self::new(records))
    }
}

/// Numbers and booleans are typed; an empty cell is missing (`Null`).
fn cell_value(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::from(i);
    }
    if let Some(n) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    match cell {
        "true" | "True" => Value::Bool(true),
        "false" | "False" => Value::Bool(false),
        _ => Value::from(cell),
    }
}

impl FromIterator<TimelineVariableRecord> for TimelineTable {
    fn from_iter<I: IntoIterator<Item = TimelineVariableRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a TimelineTable {
    type Item = &'a TimelineVariableRecord;
    type IntoIter = std::slice::Iter<'a, TimelineVariableRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_builder_and_lookup() {
        let record = TimelineVariableRecord::new()
            .with("word", "green")
            .with("color", "red")
            .with("correct", "j");

        assert_eq!(record.get("color"), Some(&json!("red")));
        assert!(record.contains("word"));
        assert!(record.get("congruency").is_none());
    }

    #[test]
    fn table_deserializes_from_plain_json_rows() {
        let table: TimelineTable = serde_json::from_value(json!([
            {"word": "RED", "color": "red"},
            {"word": "GREEN", "color": "red"}
        ]))
        .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[1].get("word"), Some(&json!("GREEN")));
    }

    const STROOP_CSV: &str = "word,color,correct,soa\nRED,red,f,100\nGREEN,red,f,\nRED,green,j,250.5\n";

    #[test]
    fn csv_rows_become_typed_records() {
        let table = TimelineTable::from_csv_reader(STROOP_CSV.as_bytes(), None).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.records()[0].get("soa"), Some(&json!(100)));
        assert_eq!(table.records()[1].get("soa"), Some(&Value::Null));
        assert_eq!(table.records()[2].get("soa"), Some(&json!(250.5)));
        assert_eq!(table.records()[2].get("color"), Some(&json!("green")));
    }

    #[test]
    fn csv_columns_are_selected() {
        let table =
            TimelineTable::from_csv_reader(STROOP_CSV.as_bytes(), Some(&["word", "correct"])).unwrap();
        assert_eq!(
            table.records()[0].fields().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            ["correct", "word"]
        );

        let missing = TimelineTable::from_csv_reader(STROOP_CSV.as_bytes(), Some(&["congruency"]));
        assert!(matches!(missing, Err(Error::MissingColumn(c)) if c == "congruency"));
    }

    #[test]
    fn csv_file_is_read_from_disk() {
        let path = std::env::temp_dir().join(format!("cogex-timeline-{}.csv", std::process::id()));
        std::fs::write(&path, STROOP_CSV).unwrap();

        let table = TimelineTable::from_csv(&path, None).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(table.len(), 3);
        assert!(TimelineTable::from_csv(&path, None).is_err());
    }
}
