use crate::data::{Exam, Record};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Record fields that can be used as grouping keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Name,
    Class,
    Subject,
    Exam,
}

impl Field {
    pub fn column(&self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::Class => "Class",
            Field::Subject => "Subject",
            Field::Exam => "Exam",
        }
    }

    pub fn value_of(&self, record: &Record) -> KeyValue {
        match self {
            Field::Name => KeyValue::Text(record.name.clone()),
            Field::Class => KeyValue::Text(record.class.clone()),
            Field::Subject => KeyValue::Text(record.subject.clone()),
            Field::Exam => KeyValue::Exam(record.exam.clone()),
        }
    }
}

/// One component of a grouping key. Exams keep their own ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum KeyValue {
    Text(String),
    Exam(Exam),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Text(s) => f.write_str(s),
            KeyValue::Exam(e) => e.fmt(f),
        }
    }
}

/// Mean Marks for one group. Serializes flat, e.g.
/// `{"Class": "10A", "Subject": "Math", "Marks": 65.0}`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub keys: Vec<(Field, KeyValue)>,
    pub marks: f64,
}

impl AggregateRow {
    pub fn value(&self, field: Field) -> Option<&KeyValue> {
        self.keys.iter().find(|(f, _)| *f == field).map(|(_, v)| v)
    }
}

impl Serialize for AggregateRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.keys.len() + 1))?;
        for (field, value) in &self.keys {
            map.serialize_entry(field.column(), value)?;
        }
        map.serialize_entry("Marks", &self.marks)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Average Marks")]
    pub average_marks: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterAssignment {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Marks")]
    pub marks: f64,
    #[serde(rename = "Cluster")]
    pub cluster: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeclineRecord {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Total Decline")]
    pub total_decline: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Class")]
    pub class: String,
    #[serde(rename = "Suggestion")]
    pub suggestion: String,
    pub average: f64,
    pub target: f64,
    pub required: f64,
    pub weakest_subject: String,
    pub weakest_average: f64,
    pub needs_attention: bool,
}

/// Five-number summary of one class's marks in a subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionRow {
    #[serde(rename = "Class")]
    pub class: String,
    #[serde(rename = "Count")]
    pub count: usize,
    #[serde(rename = "Min")]
    pub min: f64,
    #[serde(rename = "Q1")]
    pub q1: f64,
    #[serde(rename = "Median")]
    pub median: f64,
    #[serde(rename = "Q3")]
    pub q3: f64,
    #[serde(rename = "Max")]
    pub max: f64,
}
