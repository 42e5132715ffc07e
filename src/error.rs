use std::fmt;

pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// Everything the loader, the analytics stages and the exporter can fail with.
#[derive(Debug)]
pub enum AnalyticsError {
    /// File extension the loader does not know how to parse.
    UnsupportedFormat(String),
    /// One or more of Name, Class, Subject, Exam, Marks is missing from the header.
    SchemaError { missing: Vec<String> },
    /// Bad `n`, `k` or an empty target list.
    InvalidArgument(String),
    /// No students to rank or cluster.
    EmptyInput(String),
    /// A data row failed basic type coercion (1-based data row number).
    InvalidRecord { row: usize, reason: String },
    Io(std::io::Error),
    Csv(csv::Error),
    Spreadsheet(String),
    Clustering(String),
    Render(String),
}

impl AnalyticsError {
    /// Short machine-readable name, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyticsError::UnsupportedFormat(_) => "unsupported_format",
            AnalyticsError::SchemaError { .. } => "schema_error",
            AnalyticsError::InvalidArgument(_) => "invalid_argument",
            AnalyticsError::EmptyInput(_) => "empty_input",
            AnalyticsError::InvalidRecord { .. } => "invalid_record",
            AnalyticsError::Io(_) => "io",
            AnalyticsError::Csv(_) => "csv",
            AnalyticsError::Spreadsheet(_) => "spreadsheet",
            AnalyticsError::Clustering(_) => "clustering",
            AnalyticsError::Render(_) => "render",
        }
    }
}

impl fmt::Display for AnalyticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyticsError::UnsupportedFormat(ext) => {
                write!(f, "unsupported file format: {:?}", ext)
            }
            AnalyticsError::SchemaError { missing } => {
                write!(f, "missing required columns: {}", missing.join(", "))
            }
            AnalyticsError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            AnalyticsError::EmptyInput(msg) => write!(f, "empty input: {}", msg),
            AnalyticsError::InvalidRecord { row, reason } => {
                write!(f, "invalid record at row {}: {}", row, reason)
            }
            AnalyticsError::Io(e) => write!(f, "i/o error: {}", e),
            AnalyticsError::Csv(e) => write!(f, "csv error: {}", e),
            AnalyticsError::Spreadsheet(msg) => write!(f, "spreadsheet error: {}", msg),
            AnalyticsError::Clustering(msg) => write!(f, "clustering failed: {}", msg),
            AnalyticsError::Render(msg) => write!(f, "report rendering failed: {}", msg),
        }
    }
}

impl std::error::Error for AnalyticsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalyticsError::Io(e) => Some(e),
            AnalyticsError::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AnalyticsError {
    fn from(e: std::io::Error) -> Self {
        AnalyticsError::Io(e)
    }
}

impl From<csv::Error> for AnalyticsError {
    fn from(e: csv::Error) -> Self {
        AnalyticsError::Csv(e)
    }
}
