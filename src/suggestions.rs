use crate::analytics::{mean, student_groups};
use crate::data::Record;
use crate::error::{AnalyticsError, Result};
use crate::model::Suggestion;
use std::collections::BTreeMap;
use tracing::debug;

pub const DEFAULT_TARGETS: [f64; 3] = [60.0, 75.0, 90.0];

const MIN_MARKS: f64 = 0.0;
const MAX_MARKS: f64 = 100.0;

/// One suggestion per student: the next-exam score needed to lift their
/// average to a target, and the subject to focus on.
pub fn suggest(records: &[Record], targets: &[f64]) -> Result<Vec<Suggestion>> {
    if targets.is_empty() {
        return Err(AnalyticsError::InvalidArgument(
            "at least one target average is required".to_string(),
        ));
    }

    let mut suggestions = Vec::new();
    for (name, rows) in student_groups(records) {
        let marks: Vec<f64> = rows.iter().map(|r| r.marks).collect();
        let average = mean(&marks);
        let n = marks.len();
        let current_total = average * n as f64;

        let mut target = targets[0];
        let mut required = required_score(target, n, current_total);
        for &t in targets {
            target = t;
            required = required_score(t, n, current_total);
            // `required` is clamped to MAX_MARKS, so the first target always wins
            if required <= MAX_MARKS {
                break;
            }
        }

        let (weakest_subject, weakest_average) = weakest_subject(&rows);
        let suggestion = format!(
            "Current average: {:.1}%. To reach {}% average, needs at least {:.1} in the next exam. Focus on {} (avg {:.1}%).",
            average, target, required, weakest_subject, weakest_average
        );

        suggestions.push(Suggestion {
            name: name.to_string(),
            class: rows[0].class.clone(),
            suggestion,
            average,
            target,
            required,
            weakest_subject,
            weakest_average,
            needs_attention: required > MIN_MARKS,
        });
    }
    debug!(students = suggestions.len(), "generated suggestions");
    Ok(suggestions)
}

/// Score needed in exam `n + 1` so the mean reaches `target`, rounded to one
/// decimal and clamped to the marks range.
pub fn required_score(target: f64, n: usize, current_total: f64) -> f64 {
    let raw = target * (n as f64 + 1.0) - current_total;
    round1(raw).clamp(MIN_MARKS, MAX_MARKS)
}

// Lowest per-subject mean; ties go to the subject that sorts first.
fn weakest_subject(rows: &[&Record]) -> (String, f64) {
    let mut by_subject: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for r in rows {
        by_subject.entry(r.subject.as_str()).or_default().push(r.marks);
    }
    let mut weakest: Option<(&str, f64)> = None;
    for (subject, marks) in by_subject {
        let avg = mean(&marks);
        match weakest {
            Some((_, lowest)) if avg >= lowest => {}
            _ => weakest = Some((subject, avg)),
        }
    }
    weakest
        .map(|(s, avg)| (s.to_string(), avg))
        .unwrap_or_default()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice_and_bob() -> Vec<Record> {
        vec![
            Record::new("Alice", "10A", "Math", "E1", 80.0),
            Record::new("Alice", "10A", "Math", "E2", 60.0),
            Record::new("Bob", "10A", "Math", "E1", 50.0),
            Record::new("Bob", "10A", "Math", "E2", 70.0),
        ]
    }

    #[test]
    fn suggestion_text_reports_average_target_required_and_focus() {
        let suggestions = suggest(&alice_and_bob(), &DEFAULT_TARGETS).unwrap();
        assert_eq!(suggestions.len(), 2);
        let alice = &suggestions[0];
        assert_eq!(alice.name, "Alice");
        assert_eq!(alice.class, "10A");
        assert_eq!(
            alice.suggestion,
            "Current average: 70.0%. To reach 60% average, needs at least 40.0 in the next exam. Focus on Math (avg 70.0%)."
        );
        assert!(alice.needs_attention);
    }

    #[test]
    fn first_target_is_always_reported() {
        // average exactly 60 over one exam
        let records = vec![Record::new("Cleo", "9C", "Art", "E1", 60.0)];
        let s = &suggest(&records, &[60.0, 75.0, 90.0]).unwrap()[0];
        assert_eq!(s.target, 60.0);
        assert_eq!(s.required, 60.0);

        // 60 * 2 - 10 = 110, clamped to 100, still the first target
        let records = vec![Record::new("Dan", "9C", "Art", "E1", 10.0)];
        let s = &suggest(&records, &[60.0, 75.0, 90.0]).unwrap()[0];
        assert_eq!(s.target, 60.0);
        assert_eq!(s.required, 100.0);
    }

    #[test]
    fn required_is_clamped_at_zero_for_strong_students() {
        let records = vec![
            Record::new("Eve", "9C", "Art", "E1", 95.0),
            Record::new("Eve", "9C", "Art", "E2", 95.0),
        ];
        let s = &suggest(&records, &DEFAULT_TARGETS).unwrap()[0];
        assert_eq!(s.required, 0.0);
        assert!(!s.needs_attention);
        assert!(s.suggestion.contains("needs at least 0.0 in the next exam"));
    }

    #[test]
    fn required_score_rounds_to_one_decimal() {
        // 75 * 4 - 3 * 66.66 = 100.02 -> 100.0
        assert_eq!(required_score(75.0, 3, 199.98), 100.0);
        assert_eq!(required_score(60.0, 2, 110.33), 69.7);
    }

    #[test]
    fn weakest_subject_breaks_ties_by_subject_order() {
        let records = vec![
            Record::new("Fay", "8B", "Science", "E1", 40.0),
            Record::new("Fay", "8B", "English", "E1", 40.0),
            Record::new("Fay", "8B", "Math", "E1", 90.0),
        ];
        let s = &suggest(&records, &DEFAULT_TARGETS).unwrap()[0];
        assert_eq!(s.weakest_subject, "English");
        assert_eq!(s.weakest_average, 40.0);
    }

    #[test]
    fn class_comes_from_first_row() {
        let records = vec![
            Record::new("Gus", "7A", "Math", "E1", 50.0),
            Record::new("Gus", "7B", "Math", "E2", 50.0),
        ];
        assert_eq!(suggest(&records, &DEFAULT_TARGETS).unwrap()[0].class, "7A");
    }

    #[test]
    fn empty_targets_are_rejected() {
        assert!(matches!(
            suggest(&alice_and_bob(), &[]),
            Err(AnalyticsError::InvalidArgument(_))
        ));
        assert!(suggest(&[], &DEFAULT_TARGETS).unwrap().is_empty());
    }
}
