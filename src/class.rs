use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::models::{CohortMark, MarkRecord};
use crate::policy::GradingPolicy;
use crate::score;

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectSummary {
    pub average_percentage: f64,
    pub pass_rate: f64,
    pub record_count: usize,
    pub student_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassAnalysis {
    pub subject_performance: BTreeMap<Uuid, SubjectSummary>,
    pub weakest_subject: Option<Uuid>,
    pub skipped_records: usize,
}

impl ClassAnalysis {
    pub fn record_count(&self) -> usize {
        self.subject_performance
            .values()
            .map(|summary| summary.record_count)
            .sum()
    }
}

pub fn analyze_cohort(
    marks: &[CohortMark],
    section: Option<Uuid>,
    policy: &GradingPolicy,
) -> ClassAnalysis {
    let in_scope = marks
        .iter()
        .filter(|mark| section.is_none() || mark.section_id == section)
        .map(|mark| &mark.record);
    aggregate(in_scope, policy)
}

fn aggregate<'a, I>(records: I, policy: &GradingPolicy) -> ClassAnalysis
where
    I: IntoIterator<Item = &'a MarkRecord>,
{
    let (marks, skipped_records) = score::normalize_all(records, policy);

    let mut by_subject: BTreeMap<Uuid, (Vec<f64>, usize, BTreeSet<Uuid>)> = BTreeMap::new();
    for mark in &marks {
        let entry = by_subject.entry(mark.subject_id).or_default();
        entry.0.push(mark.percentage);
        if mark.passed {
            entry.1 += 1;
        }
        entry.2.insert(mark.student_id);
    }

    let subject_performance: BTreeMap<Uuid, SubjectSummary> = by_subject
        .into_iter()
        .map(|(subject_id, (values, passed, students))| {
            let summary = SubjectSummary {
                average_percentage: score::mean(&values),
                pass_rate: 100.0 * passed as f64 / values.len() as f64,
                record_count: values.len(),
                student_count: students.len(),
            };
            (subject_id, summary)
        })
        .collect();

    // BTreeMap iterates ids ascending, so `min_by` keeps the lowest id on ties.
    let weakest_subject = subject_performance
        .iter()
        .min_by(|a, b| a.1.average_percentage.total_cmp(&b.1.average_percentage))
        .map(|(subject_id, _)| *subject_id);

    ClassAnalysis {
        subject_performance,
        weakest_subject,
        skipped_records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{legacy, mark};
    use proptest::prelude::*;

    fn cohort(section_id: Option<Uuid>, record: MarkRecord) -> CohortMark {
        CohortMark { section_id, record }
    }

    fn analyze_class(records: &[MarkRecord], policy: &GradingPolicy) -> ClassAnalysis {
        aggregate(records, policy)
    }

    #[test]
    fn lowest_average_subject_is_weakest() {
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();
        let students = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let mut records = Vec::new();
        let scores = [(90.0, 50.0), (85.0, 60.0), (95.0, 55.0)];
        for (student, (x_score, y_score)) in students.iter().zip(scores) {
            records.push(mark(*student, x, x_score, 100.0, legacy("Mid-1", "2-1")));
            records.push(mark(*student, y, y_score, 100.0, legacy("Mid-1", "2-1")));
        }

        let analysis = analyze_class(&records, &GradingPolicy::default());
        assert!((analysis.subject_performance[&x].average_percentage - 90.0).abs() < 1e-9);
        assert!((analysis.subject_performance[&y].average_percentage - 55.0).abs() < 1e-9);
        assert_eq!(analysis.weakest_subject, Some(y));
        assert_eq!(analysis.record_count(), 6);
        assert_eq!(analysis.subject_performance[&x].student_count, 3);
    }

    #[test]
    fn empty_cohort_has_no_weakest_subject() {
        let analysis = analyze_cohort(&[], None, &GradingPolicy::default());
        assert!(analysis.subject_performance.is_empty());
        assert_eq!(analysis.weakest_subject, None);
    }

    #[test]
    fn ties_resolve_to_lowest_subject_id() {
        let mut ids = [Uuid::new_v4(), Uuid::new_v4()];
        ids.sort();
        let student = Uuid::new_v4();
        let records = vec![
            mark(student, ids[1], 45.0, 100.0, legacy("Mid-1", "1-1")),
            mark(student, ids[0], 45.0, 100.0, legacy("Mid-1", "1-1")),
        ];
        let analysis = analyze_class(&records, &GradingPolicy::default());
        assert_eq!(analysis.weakest_subject, Some(ids[0]));
    }

    #[test]
    fn pass_rate_uses_policy() {
        let subject = Uuid::new_v4();
        let records = vec![
            mark(Uuid::new_v4(), subject, 30.0, 100.0, legacy("Mid-1", "1-1")),
            mark(Uuid::new_v4(), subject, 70.0, 100.0, legacy("Mid-1", "1-1")),
            mark(Uuid::new_v4(), subject, 70.0, 0.0, legacy("Mid-1", "1-1")),
        ];
        let analysis = analyze_class(&records, &GradingPolicy::new(40.0, 50.0).unwrap());
        let summary = &analysis.subject_performance[&subject];
        assert!((summary.pass_rate - 50.0).abs() < 1e-9);
        assert_eq!(summary.record_count, 2);
        assert_eq!(analysis.skipped_records, 1);
    }

    #[test]
    fn section_scope_excludes_other_sections() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let subject = Uuid::new_v4();
        let other = Uuid::new_v4();
        let marks = vec![
            cohort(Some(a), mark(Uuid::new_v4(), subject, 80.0, 100.0, legacy("Mid-1", "1-1"))),
            cohort(Some(b), mark(Uuid::new_v4(), subject, 20.0, 100.0, legacy("Mid-1", "1-1"))),
            cohort(Some(b), mark(Uuid::new_v4(), other, 10.0, 100.0, legacy("Mid-1", "1-1"))),
            cohort(None, mark(Uuid::new_v4(), other, 10.0, 100.0, legacy("Mid-1", "1-1"))),
        ];

        let scoped = analyze_cohort(&marks, Some(a), &GradingPolicy::default());
        assert_eq!(scoped.subject_performance.len(), 1);
        assert_eq!(scoped.subject_performance[&subject].average_percentage, 80.0);

        let unscoped = analyze_cohort(&marks, None, &GradingPolicy::default());
        assert_eq!(unscoped.record_count(), 4);
        assert_eq!(unscoped.weakest_subject, Some(other));
    }

    proptest! {
        #[test]
        fn section_results_only_reflect_section_records(
            rows in prop::collection::vec((0usize..3, 0usize..2, 0u32..=100), 0..30),
        ) {
            let sections = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
            let subjects = [Uuid::new_v4(), Uuid::new_v4()];
            let marks: Vec<CohortMark> = rows
                .iter()
                .map(|&(section, subject, obtained)| {
                    let exam_ref = legacy("Mid-1", "1-1");
                    let obtained = f64::from(obtained);
                    let record = mark(Uuid::new_v4(), subjects[subject], obtained, 100.0, exam_ref);
                    cohort(Some(sections[section]), record)
                })
                .collect();

            let policy = GradingPolicy::default();
            let scoped = analyze_cohort(&marks, Some(sections[0]), &policy);
            let only_section: Vec<MarkRecord> = marks
                .iter()
                .filter(|m| m.section_id == Some(sections[0]))
                .map(|m| m.record.clone())
                .collect();
            let expected = analyze_class(&only_section, &policy);
            prop_assert_eq!(&scoped, &expected);

            let unscoped = analyze_cohort(&marks, None, &policy);
            for subject in scoped.subject_performance.keys() {
                prop_assert!(unscoped.subject_performance.contains_key(subject));
            }
            prop_assert!(scoped.record_count() <= unscoped.record_count());
        }
    }
}
