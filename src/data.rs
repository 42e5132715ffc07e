use crate::error::{AnalyticsError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::{debug, info};

pub const REQUIRED_COLUMNS: [&str; 5] = ["Name", "Class", "Subject", "Exam", "Marks"];

/// Exam key as stored in the input. Integer cells keep numeric order,
/// everything else is an opaque label compared lexically. Ordinals sort
/// before labels; no date parsing happens here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Exam {
    Ordinal(i64),
    Label(String),
}

impl Exam {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<i64>() {
            Ok(n) => Exam::Ordinal(n),
            Err(_) => Exam::Label(raw.to_string()),
        }
    }
}

impl fmt::Display for Exam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exam::Ordinal(n) => write!(f, "{}", n),
            Exam::Label(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Class")]
    pub class: String,
    #[serde(rename = "Subject")]
    pub subject: String,
    #[serde(rename = "Exam")]
    pub exam: Exam,
    #[serde(rename = "Marks")]
    pub marks: f64,
}

impl Record {
    pub fn new(name: &str, class: &str, subject: &str, exam: &str, marks: f64) -> Self {
        Record {
            name: name.to_string(),
            class: class.to_string(),
            subject: subject.to_string(),
            exam: Exam::parse(exam),
            marks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Spreadsheet,
}

impl FileFormat {
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let ext = match file_name.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => return Err(AnalyticsError::UnsupportedFormat(String::new())),
        };
        match ext.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "xlsx" | "xls" | "xlsm" | "ods" => Ok(FileFormat::Spreadsheet),
            _ => Err(AnalyticsError::UnsupportedFormat(ext)),
        }
    }
}

/// Class / student / exam selection. An empty list places no constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFilter {
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub students: Vec<String>,
    #[serde(default)]
    pub exams: Vec<String>,
}

impl RecordFilter {
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.students.is_empty() && self.exams.is_empty()
    }

    /// Exam selections are parsed like input cells, so `01` selects the
    /// same rows as `1`.
    pub fn matches(&self, record: &Record) -> bool {
        let selected = |values: &[String], value: &str| {
            values.is_empty() || values.iter().any(|v| v == value)
        };
        selected(&self.classes, &record.class)
            && selected(&self.students, &record.name)
            && (self.exams.is_empty() || self.exams.iter().any(|v| Exam::parse(v) == record.exam))
    }
}

/// The uploaded table. Schema is checked once here; every analytic takes
/// `records()` explicitly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    pub fn new(records: Vec<Record>) -> Self {
        RecordSet { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Reads the whole file, then parses it according to its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        // Fail on the extension before touching the filesystem.
        FileFormat::from_file_name(&file_name)?;
        let bytes = std::fs::read(path)?;
        let set = Self::from_bytes(&bytes, &file_name)?;
        info!(path = %path.display(), records = set.len(), "loaded record set");
        Ok(set)
    }

    pub fn from_bytes(bytes: &[u8], file_name: &str) -> Result<Self> {
        match FileFormat::from_file_name(file_name)? {
            FileFormat::Csv => Self::from_csv_reader(bytes),
            FileFormat::Spreadsheet => Self::from_spreadsheet(bytes.to_vec()),
        }
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let header: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let columns = ColumnIndex::locate(&header)?;

        let mut records = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            let row = result?;
            let cells: Vec<String> = row.iter().map(str::to_string).collect();
            if let Some(record) = columns.parse_row(i + 1, &cells)? {
                records.push(record);
            }
        }
        Self::non_empty(records)
    }

    pub fn from_spreadsheet(bytes: Vec<u8>) -> Result<Self> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
            .map_err(|e| AnalyticsError::Spreadsheet(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| AnalyticsError::Spreadsheet("workbook has no worksheets".to_string()))?
            .map_err(|e| AnalyticsError::Spreadsheet(e.to_string()))?;

        let mut rows = range.rows();
        let header: Vec<String> = match rows.next() {
            Some(row) => row.iter().map(cell_text).collect(),
            None => Vec::new(),
        };
        let columns = ColumnIndex::locate(&header)?;

        let mut records = Vec::new();
        for (i, row) in rows.enumerate() {
            let cells: Vec<String> = row.iter().map(cell_text).collect();
            if let Some(record) = columns.parse_row(i + 1, &cells)? {
                records.push(record);
            }
        }
        Self::non_empty(records)
    }

    fn non_empty(records: Vec<Record>) -> Result<Self> {
        if records.is_empty() {
            return Err(AnalyticsError::EmptyInput("file contains no records".to_string()));
        }
        Ok(RecordSet { records })
    }

    pub fn filter(&self, filter: &RecordFilter) -> RecordSet {
        if filter.is_empty() {
            return self.clone();
        }
        let records: Vec<Record> = self
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        debug!(before = self.len(), after = records.len(), "applied record filter");
        RecordSet { records }
    }

    pub fn classes(&self) -> Vec<String> {
        distinct(self.records.iter().map(|r| r.class.clone()))
    }

    pub fn students(&self) -> Vec<String> {
        distinct(self.records.iter().map(|r| r.name.clone()))
    }

    pub fn exams(&self) -> Vec<String> {
        distinct(self.records.iter().map(|r| r.exam.to_string()))
    }
}

// first-seen order
fn distinct(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values.filter(|v| seen.insert(v.clone())).collect()
}

struct ColumnIndex {
    name: usize,
    class: usize,
    subject: usize,
    exam: usize,
    marks: usize,
}

impl ColumnIndex {
    fn locate(header: &[String]) -> Result<Self> {
        let find = |column: &str| header.iter().position(|h| h.trim() == column);
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| find(*c).is_none())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(AnalyticsError::SchemaError { missing });
        }
        let at = |column: &str| find(column).unwrap_or_default();
        Ok(ColumnIndex {
            name: at("Name"),
            class: at("Class"),
            subject: at("Subject"),
            exam: at("Exam"),
            marks: at("Marks"),
        })
    }

    /// `Ok(None)` for a blank row.
    fn parse_row(&self, row: usize, cells: &[String]) -> Result<Option<Record>> {
        if cells.iter().all(|c| c.trim().is_empty()) {
            return Ok(None);
        }
        let cell = |i: usize| cells.get(i).map(|c| c.trim()).unwrap_or("");
        let raw_marks = cell(self.marks);
        let marks = match raw_marks.parse::<f64>() {
            Ok(m) if m.is_finite() => m,
            _ => {
                return Err(AnalyticsError::InvalidRecord {
                    row,
                    reason: format!("Marks value {:?} is not a number", raw_marks),
                })
            }
        };
        Ok(Some(Record {
            name: cell(self.name).to_string(),
            class: cell(self.class).to_string(),
            subject: cell(self.subject).to_string(),
            exam: Exam::parse(cell(self.exam)),
            marks,
        }))
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (*f as i64).to_string(),
        Data::Float(f) => f.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Name,Class,Subject,Exam,Marks,Room\n\
        Alice,10A,Math,E1,80,R1\n\
        Alice,10A,Math,E2,60,R1\n\
        \n\
        Bob,10B,Science,E1, 50 ,R2\n";

    #[test]
    fn csv_with_extra_columns_loads() {
        let set = RecordSet::from_csv_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.records()[2], Record::new("Bob", "10B", "Science", "E1", 50.0));
    }

    #[test]
    fn missing_columns_are_reported_together() {
        let err = RecordSet::from_csv_reader("Name,Class,Subject\nA,1,M\n".as_bytes()).unwrap_err();
        match err {
            AnalyticsError::SchemaError { missing } => assert_eq!(missing, vec!["Exam", "Marks"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn column_names_are_case_sensitive() {
        let err = RecordSet::from_csv_reader("name,Class,Subject,Exam,Marks\n".as_bytes()).unwrap_err();
        assert!(matches!(err, AnalyticsError::SchemaError { ref missing } if missing == &["Name"]));
    }

    #[test]
    fn non_numeric_marks_fail_with_row_number() {
        let input = "Name,Class,Subject,Exam,Marks\nA,1,M,E1,70\nB,1,M,E1,absent\n";
        let err = RecordSet::from_csv_reader(input.as_bytes()).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidRecord { row: 2, .. }));
    }

    #[test]
    fn header_only_file_is_empty_input() {
        let err = RecordSet::from_csv_reader("Name,Class,Subject,Exam,Marks\n".as_bytes()).unwrap_err();
        assert_eq!(err.kind(), "empty_input");
    }

    #[test]
    fn format_detection_by_extension() {
        assert_eq!(FileFormat::from_file_name("marks.CSV").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_file_name("marks.xlsx").unwrap(), FileFormat::Spreadsheet);
        assert!(matches!(
            FileFormat::from_file_name("marks.json"),
            Err(AnalyticsError::UnsupportedFormat(ext)) if ext == "json"
        ));
        assert!(FileFormat::from_file_name("marks").is_err());
    }

    #[test]
    fn load_rejects_unknown_extension_before_reading() {
        let err = RecordSet::load("/nonexistent/marks.txt").unwrap_err();
        assert_eq!(err.kind(), "unsupported_format");
    }

    #[test]
    fn exam_ordinals_sort_numerically_before_labels() {
        let mut exams = vec![Exam::parse("10"), Exam::parse("Final"), Exam::parse("2"), Exam::parse("E1")];
        exams.sort();
        let rendered: Vec<String> = exams.iter().map(|e| e.to_string()).collect();
        assert_eq!(rendered, vec!["2", "10", "E1", "Final"]);
    }

    #[test]
    fn filter_combines_selections() {
        let set = RecordSet::from_csv_reader(SAMPLE.as_bytes()).unwrap();
        let filter = RecordFilter {
            classes: vec!["10A".to_string()],
            exams: vec!["E2".to_string()],
            ..Default::default()
        };
        let filtered = set.filter(&filter);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.records()[0].marks, 60.0);

        let nobody = set.filter(&RecordFilter {
            students: vec!["Carol".to_string()],
            ..Default::default()
        });
        assert!(nobody.is_empty());
    }

    #[test]
    fn exam_filter_uses_parsed_exam_keys() {
        let set = RecordSet::new(vec![
            Record::new("Alice", "10A", "Math", "01", 80.0),
            Record::new("Alice", "10A", "Math", "2", 60.0),
            Record::new("Bob", "10A", "Math", " Final ", 55.0),
        ]);
        let by_exam = |exam: &str| {
            set.filter(&RecordFilter {
                exams: vec![exam.to_string()],
                ..Default::default()
            })
        };
        assert_eq!(by_exam("01").len(), 1);
        assert_eq!(by_exam("1").records()[0].marks, 80.0);
        assert_eq!(by_exam("Final").len(), 1);
        assert!(by_exam("3").is_empty());
    }

    fn workbook(rows: &[(&str, f64, f64)]) -> Vec<u8> {
        let mut book = rust_xlsxwriter::Workbook::new();
        let sheet = book.add_worksheet();
        for (col, name) in ["Name", "Class", "Subject", "Exam", "Marks", "Room"].iter().enumerate() {
            sheet.write_string(0, col as u16, *name).unwrap();
        }
        for (i, (name, exam, marks)) in rows.iter().enumerate() {
            let row = i as u32 + 1;
            sheet.write_string(row, 0, *name).unwrap();
            sheet.write_string(row, 1, "10A").unwrap();
            sheet.write_string(row, 2, "Math").unwrap();
            sheet.write_number(row, 3, *exam).unwrap();
            sheet.write_number(row, 4, *marks).unwrap();
            sheet.write_string(row, 5, "R1").unwrap();
        }
        book.save_to_buffer().unwrap()
    }

    #[test]
    fn xlsx_numeric_cells_load_as_ordinals_and_marks() {
        let bytes = workbook(&[("Alice", 1.0, 80.0), ("Alice", 10.0, 60.0), ("Alice", 2.0, 70.5)]);
        let set = RecordSet::from_bytes(&bytes, "marks.xlsx").unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.records()[2], Record::new("Alice", "10A", "Math", "2", 70.5));

        let exams: Vec<Exam> = set.records().iter().map(|r| r.exam.clone()).collect();
        assert_eq!(exams, vec![Exam::Ordinal(1), Exam::Ordinal(10), Exam::Ordinal(2)]);
        let mut sorted = exams;
        sorted.sort();
        assert_eq!(sorted, vec![Exam::Ordinal(1), Exam::Ordinal(2), Exam::Ordinal(10)]);
        assert_eq!(set.exams(), vec!["1", "10", "2"]);
    }

    #[test]
    fn xlsx_header_only_is_empty_input() {
        let err = RecordSet::from_spreadsheet(workbook(&[])).unwrap_err();
        assert_eq!(err.kind(), "empty_input");
    }

    #[test]
    fn garbage_spreadsheet_bytes_are_spreadsheet_errors() {
        let err = RecordSet::from_bytes(b"not a zip", "marks.xlsx").unwrap_err();
        assert!(matches!(err, AnalyticsError::Spreadsheet(_)));
    }

    #[test]
    fn distinct_values_keep_first_seen_order() {
        let set = RecordSet::from_csv_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(set.students(), vec!["Alice", "Bob"]);
        assert_eq!(set.classes(), vec!["10A", "10B"]);
        assert_eq!(set.exams(), vec!["E1", "E2"]);
    }
}
