use crate::data::Record;
use crate::error::{AnalyticsError, Result};
use crate::model::{AggregateRow, DeclineRecord, DistributionRow, Field, KeyValue, RankEntry};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

pub const DEFAULT_TOP_N: usize = 5;

/// Groups by the exact tuple of `group_by` values and averages Marks.
///
/// Groups come out in ascending key order, so identical input always gives
/// identical output. Empty input gives an empty result; an empty `group_by`
/// collapses everything into a single row.
pub fn aggregate(records: &[Record], group_by: &[Field]) -> Vec<AggregateRow> {
    let mut groups: BTreeMap<Vec<KeyValue>, (f64, usize)> = BTreeMap::new();
    for r in records {
        let key: Vec<KeyValue> = group_by.iter().map(|f| f.value_of(r)).collect();
        let e = groups.entry(key).or_insert((0.0, 0));
        e.0 += r.marks;
        e.1 += 1;
    }
    debug!(?group_by, groups = groups.len(), "aggregated marks");
    groups
        .into_iter()
        .map(|(key, (sum, count))| AggregateRow {
            keys: group_by.iter().copied().zip(key).collect(),
            marks: sum / count as f64,
        })
        .collect()
}

pub fn class_summary(records: &[Record]) -> Vec<AggregateRow> {
    aggregate(records, &[Field::Class, Field::Subject])
}

pub fn student_summary(records: &[Record]) -> Vec<AggregateRow> {
    aggregate(records, &[Field::Name, Field::Subject])
}

pub fn exam_trends(records: &[Record]) -> Vec<AggregateRow> {
    aggregate(records, &[Field::Exam, Field::Subject])
}

pub fn subject_summary(records: &[Record]) -> Vec<AggregateRow> {
    aggregate(records, &[Field::Subject])
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Each student's rows, in input order, keyed by name (ascending).
pub(crate) fn student_groups(records: &[Record]) -> BTreeMap<&str, Vec<&Record>> {
    let mut groups: BTreeMap<&str, Vec<&Record>> = BTreeMap::new();
    for r in records {
        groups.entry(r.name.as_str()).or_default().push(r);
    }
    groups
}

/// Overall mean Marks per student, ordered by name.
pub fn student_averages(records: &[Record]) -> Vec<RankEntry> {
    student_groups(records)
        .into_iter()
        .map(|(name, rows)| {
            let marks: Vec<f64> = rows.iter().map(|r| r.marks).collect();
            RankEntry {
                name: name.to_string(),
                average_marks: mean(&marks),
            }
        })
        .collect()
}

/// Top and bottom `n` students by average Marks.
///
/// Both sorts are stable over the averages as grouped, which is ascending
/// name order rather than input order. Students with equal averages
/// therefore appear by name in either list.
pub fn top_bottom(records: &[Record], n: usize) -> Result<(Vec<RankEntry>, Vec<RankEntry>)> {
    if n == 0 {
        return Err(AnalyticsError::InvalidArgument(
            "n must be a positive integer".to_string(),
        ));
    }
    let averages = student_averages(records);
    if averages.is_empty() {
        return Err(AnalyticsError::EmptyInput("no students to rank".to_string()));
    }

    let mut top = averages.clone();
    top.sort_by(|a, b| {
        b.average_marks
            .partial_cmp(&a.average_marks)
            .unwrap_or(Ordering::Equal)
    });
    top.truncate(n);

    let mut bottom = averages;
    bottom.sort_by(|a, b| {
        a.average_marks
            .partial_cmp(&b.average_marks)
            .unwrap_or(Ordering::Equal)
    });
    bottom.truncate(n);

    debug!(n, top = top.len(), bottom = bottom.len(), "ranked students");
    Ok((top, bottom))
}

/// Students whose marks, ordered by exam, sum to a strictly negative change.
pub fn declining_students(records: &[Record]) -> Vec<DeclineRecord> {
    let mut declining = Vec::new();
    for (name, mut rows) in student_groups(records) {
        // stable: rows sharing an exam keep input order
        rows.sort_by(|a, b| a.exam.cmp(&b.exam));
        let total: f64 = rows.windows(2).map(|w| w[1].marks - w[0].marks).sum();
        if total < 0.0 {
            declining.push(DeclineRecord {
                name: name.to_string(),
                total_decline: total,
            });
        }
    }
    debug!(declining = declining.len(), "detected declining students");
    declining
}

/// Per-class five-number summary for one subject. Unknown subject gives
/// an empty result.
pub fn marks_distribution(records: &[Record], subject: &str) -> Vec<DistributionRow> {
    let mut by_class: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for r in records.iter().filter(|r| r.subject == subject) {
        by_class.entry(r.class.as_str()).or_default().push(r.marks);
    }
    by_class
        .into_iter()
        .map(|(class, mut marks)| {
            marks.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            DistributionRow {
                class: class.to_string(),
                count: marks.len(),
                min: marks[0],
                q1: quantile(&marks, 0.25),
                median: quantile(&marks, 0.5),
                q3: quantile(&marks, 0.75),
                max: marks[marks.len() - 1],
            }
        })
        .collect()
}

// Linear interpolation between closest ranks; `sorted` must be non-empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
