use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::exam::{self, ExamKind};
use crate::models::{MarkRecord, SubjectDirectory};
use crate::policy::GradingPolicy;
use crate::score;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectPerformance {
    pub subject_name: String,
    pub subject_code: String,
    pub internal_marks: f64,
    pub university_marks: f64,
    pub total_marks: f64,
    pub max_total_marks: f64,
    pub is_passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemesterPerformance {
    pub semester_name: String,
    pub subjects: Vec<SubjectPerformance>,
    pub backlogs: usize,
}

#[derive(Default)]
struct Totals {
    internal: f64,
    university: f64,
    max: f64,
}

pub fn build_transcript(
    records: &[MarkRecord],
    subjects: &SubjectDirectory,
    policy: &GradingPolicy,
) -> Vec<SemesterPerformance> {
    let (marks, _) = score::normalize_all(records, policy);

    let mut semesters: BTreeMap<(usize, String), BTreeMap<Uuid, Totals>> = BTreeMap::new();
    for mark in &marks {
        let totals = semesters
            .entry(exam::semester_order(&mark.group.semester))
            .or_default()
            .entry(mark.subject_id)
            .or_default();
        if mark.group.kind() == ExamKind::University {
            totals.university += mark.obtained;
        } else {
            totals.internal += mark.obtained;
        }
        totals.max += mark.total;
    }

    semesters
        .into_iter()
        .map(|((_, semester_name), by_subject)| {
            let mut subject_rows: Vec<SubjectPerformance> = by_subject
                .into_iter()
                .map(|(subject_id, totals)| {
                    let total_marks = totals.internal + totals.university;
                    let is_passed = score::score(total_marks, totals.max, policy)
                        .map(|scored| scored.passed)
                        .unwrap_or(false);
                    let (subject_name, subject_code) = match subjects.get(&subject_id) {
                        Some(info) => (info.name.clone(), info.code.clone()),
                        None => (subject_id.to_string(), String::new()),
                    };
                    SubjectPerformance {
                        subject_name,
                        subject_code,
                        internal_marks: totals.internal,
                        university_marks: totals.university,
                        total_marks,
                        max_total_marks: totals.max,
                        is_passed,
                    }
                })
                .collect();
            subject_rows.sort_by(|a, b| a.subject_code.cmp(&b.subject_code));

            SemesterPerformance {
                semester_name,
                backlogs: subject_rows.iter().filter(|row| !row.is_passed).count(),
                subjects: subject_rows,
            }
        })
        .collect()
}
