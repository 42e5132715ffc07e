use crate::analytics::{
    class_summary, declining_students, exam_trends, marks_distribution, student_summary,
    subject_summary, top_bottom,
};
use crate::cluster::cluster_with_seed;
use crate::config::Settings;
use crate::data::RecordSet;
use crate::error::{AnalyticsError, Result};
use crate::model::{
    AggregateRow, ClusterAssignment, DeclineRecord, DistributionRow, Field, RankEntry, Suggestion,
};
use crate::report::Table;
use crate::suggestions::suggest;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{info, warn};

/// Outcome of one stage. A failed stage does not stop the others.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Section<T> {
    Ready(T),
    Failed { error: String, message: String },
}

impl<T> Section<T> {
    fn failed(stage: &str, err: &AnalyticsError) -> Self {
        warn!(stage, error = %err, "dashboard stage failed");
        Section::Failed {
            error: err.kind().to_string(),
            message: err.to_string(),
        }
    }

    fn from_result(stage: &str, result: Result<T>) -> Self {
        match result {
            Ok(value) => Section::Ready(value),
            Err(e) => Section::failed(stage, &e),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready(value) => Some(value),
            Section::Failed { .. } => None,
        }
    }
}

/// Every derived view of one record set.
#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub generated_at: DateTime<Utc>,
    pub record_count: usize,
    pub classes: Vec<String>,
    pub students: Vec<String>,
    pub exams: Vec<String>,
    pub class_summary: Vec<AggregateRow>,
    pub student_summary: Vec<AggregateRow>,
    pub exam_trends: Vec<AggregateRow>,
    pub subject_summary: Vec<AggregateRow>,
    pub distributions: BTreeMap<String, Vec<DistributionRow>>,
    pub top_students: Section<Vec<RankEntry>>,
    pub bottom_students: Section<Vec<RankEntry>>,
    pub clusters: Section<Vec<ClusterAssignment>>,
    pub declining: Vec<DeclineRecord>,
    pub suggestions: Section<Vec<Suggestion>>,
}

impl Dashboard {
    pub fn run(set: &RecordSet, settings: &Settings) -> Self {
        let records = set.records();

        let (top_students, bottom_students) = match top_bottom(records, settings.top_n) {
            Ok((top, bottom)) => (Section::Ready(top), Section::Ready(bottom)),
            Err(e) => (Section::failed("top", &e), Section::failed("bottom", &e)),
        };

        let mut distributions = BTreeMap::new();
        for subject in records.iter().map(|r| r.subject.as_str()) {
            if !distributions.contains_key(subject) {
                distributions.insert(subject.to_string(), marks_distribution(records, subject));
            }
        }

        let dashboard = Dashboard {
            generated_at: Utc::now(),
            record_count: set.len(),
            classes: set.classes(),
            students: set.students(),
            exams: set.exams(),
            class_summary: class_summary(records),
            student_summary: student_summary(records),
            exam_trends: exam_trends(records),
            subject_summary: subject_summary(records),
            distributions,
            top_students,
            bottom_students,
            clusters: Section::from_result(
                "clusters",
                cluster_with_seed(records, settings.clusters, settings.seed),
            ),
            declining: declining_students(records),
            suggestions: Section::from_result("suggestions", suggest(records, &settings.targets)),
        };
        info!(
            records = dashboard.record_count,
            students = dashboard.students.len(),
            "dashboard computed"
        );
        dashboard
    }
}

/// Which derived table to hand to the exporter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TableKind {
    #[default]
    Records,
    ClassSummary,
    StudentSummary,
    ExamTrends,
    SubjectSummary,
    Top,
    Bottom,
    Clusters,
    Declining,
    Suggestions,
    Distribution(String),
}

impl FromStr for TableKind {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        let kind = match s.trim() {
            "records" => TableKind::Records,
            "class_summary" => TableKind::ClassSummary,
            "student_summary" => TableKind::StudentSummary,
            "exam_trends" => TableKind::ExamTrends,
            "subject_summary" => TableKind::SubjectSummary,
            "top" => TableKind::Top,
            "bottom" => TableKind::Bottom,
            "clusters" => TableKind::Clusters,
            "declining" => TableKind::Declining,
            "suggestions" => TableKind::Suggestions,
            other => match other.strip_prefix("distribution:") {
                Some(subject) if !subject.is_empty() => TableKind::Distribution(subject.to_string()),
                _ => {
                    return Err(AnalyticsError::InvalidArgument(format!(
                        "unknown table {:?}",
                        other
                    )))
                }
            },
        };
        Ok(kind)
    }
}

impl TableKind {
    pub fn build(&self, set: &RecordSet, settings: &Settings) -> Result<Table> {
        let records = set.records();
        let table = match self {
            TableKind::Records => Table::from_rows(records),
            TableKind::ClassSummary => {
                Table::from_aggregates(&[Field::Class, Field::Subject], &class_summary(records))
            }
            TableKind::StudentSummary => {
                Table::from_aggregates(&[Field::Name, Field::Subject], &student_summary(records))
            }
            TableKind::ExamTrends => {
                Table::from_aggregates(&[Field::Exam, Field::Subject], &exam_trends(records))
            }
            TableKind::SubjectSummary => {
                Table::from_aggregates(&[Field::Subject], &subject_summary(records))
            }
            TableKind::Top => Table::from_rows(&top_bottom(records, settings.top_n)?.0),
            TableKind::Bottom => Table::from_rows(&top_bottom(records, settings.top_n)?.1),
            TableKind::Clusters => Table::from_rows(&cluster_with_seed(
                records,
                settings.clusters,
                settings.seed,
            )?),
            TableKind::Declining => Table::from_rows(&declining_students(records)),
            TableKind::Suggestions => Table::from_rows(&suggest(records, &settings.targets)?),
            TableKind::Distribution(subject) => {
                Table::from_rows(&marks_distribution(records, subject))
            }
        };
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Record;

    fn set() -> RecordSet {
        RecordSet::new(vec![
            Record::new("Alice", "10A", "Math", "E1", 80.0),
            Record::new("Alice", "10A", "Math", "E2", 60.0),
            Record::new("Bob", "10A", "Math", "E1", 50.0),
            Record::new("Bob", "10A", "Math", "E2", 70.0),
        ])
    }

    #[test]
    fn failing_stage_leaves_others_intact() {
        // three clusters from two students cannot work
        let dashboard = Dashboard::run(&set(), &Settings::default());
        assert!(dashboard.clusters.ready().is_none());
        assert_eq!(dashboard.top_students.ready().unwrap()[0].name, "Alice");
        assert_eq!(dashboard.declining.len(), 1);
        assert_eq!(dashboard.suggestions.ready().unwrap().len(), 2);

        let json = serde_json::to_value(&dashboard).unwrap();
        assert_eq!(json["clusters"]["error"], "invalid_argument");
        assert_eq!(json["class_summary"][0]["Marks"], 65.0);
    }

    #[test]
    fn empty_set_still_yields_aggregates() {
        let dashboard = Dashboard::run(&RecordSet::default(), &Settings::default());
        assert!(dashboard.class_summary.is_empty());
        assert!(dashboard.declining.is_empty());
        assert!(matches!(dashboard.top_students, Section::Failed { ref error, .. } if error == "empty_input"));
    }

    #[test]
    fn table_kinds_parse_and_build() {
        let settings = Settings { clusters: 2, ..Settings::default() };
        assert_eq!("top".parse::<TableKind>().unwrap(), TableKind::Top);
        assert_eq!(
            "distribution:Math".parse::<TableKind>().unwrap(),
            TableKind::Distribution("Math".to_string())
        );
        assert!("charts".parse::<TableKind>().is_err());

        let table = TableKind::Clusters.build(&set(), &settings).unwrap();
        assert_eq!(table.columns, vec!["Name", "Marks", "Cluster"]);
        assert_eq!(table.rows.len(), 2);

        let records = TableKind::default().build(&set(), &settings).unwrap();
        assert_eq!(records.rows.len(), 4);
    }
}
