use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use uuid::Uuid;

use crate::exam::ExamGroup;
use crate::models::{MarkRecord, SessionExamRef};
use crate::policy::GradingPolicy;
use crate::score::{self, NormalizedMark};

pub const TREND_EPSILON: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

/// Session groups serialize as an object, legacy groups as a bare number.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GroupTrend {
    Session {
        percentage: f64,
        exam_session: SessionExamRef,
    },
    Legacy(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub group_key: String,
    pub group_label: String,
    pub percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam_session: Option<SessionExamRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentAnalysis {
    pub average_percentage: f64,
    pub overall_trend: Trend,
    pub weak_subjects: Vec<Uuid>,
    pub semester_trend: BTreeMap<String, GroupTrend>,
    pub trend_points: Vec<TrendPoint>,
    pub passed_count: usize,
    pub failed_count: usize,
    pub skipped_records: usize,
}

pub fn analyze_student(records: &[MarkRecord], policy: &GradingPolicy) -> StudentAnalysis {
    let (marks, skipped_records) = score::normalize_all(records, policy);

    let percentages: Vec<f64> = marks.iter().map(|mark| mark.percentage).collect();
    let passed_count = marks.iter().filter(|mark| mark.passed).count();
    let trend_points = trend_points(&marks);
    let series: Vec<f64> = trend_points.iter().map(|point| point.percentage).collect();

    let semester_trend = trend_points
        .iter()
        .map(|point| {
            let entry = match &point.exam_session {
                Some(session) => GroupTrend::Session {
                    percentage: point.percentage,
                    exam_session: session.clone(),
                },
                None => GroupTrend::Legacy(point.percentage),
            };
            (point.group_key.clone(), entry)
        })
        .collect();

    StudentAnalysis {
        average_percentage: score::mean(&percentages),
        overall_trend: classify(&series),
        weak_subjects: weak_subjects(&marks, policy.weak_threshold),
        semester_trend,
        trend_points,
        passed_count,
        failed_count: marks.len() - passed_count,
        skipped_records,
    }
}

pub fn trend_points(marks: &[NormalizedMark]) -> Vec<TrendPoint> {
    let mut groups: HashMap<&str, (&ExamGroup, Vec<f64>)> = HashMap::new();
    for mark in marks {
        groups
            .entry(mark.group.key.as_str())
            .or_insert_with(|| (&mark.group, Vec::new()))
            .1
            .push(mark.percentage);
    }

    let mut ordered: Vec<(&ExamGroup, Vec<f64>)> = groups.into_values().collect();
    ordered.sort_by(|(a, _), (b, _)| a.sort_key.cmp(&b.sort_key).then_with(|| a.key.cmp(&b.key)));

    ordered
        .into_iter()
        .map(|(group, values)| TrendPoint {
            group_key: group.key.clone(),
            group_label: group.label.clone(),
            percentage: score::mean(&values),
            exam_session: group.session.clone(),
        })
        .collect()
}

/// Compare the mean of the first half of the series against the second half.
/// Odd lengths put the extra point in the second half.
pub fn classify(series: &[f64]) -> Trend {
    if series.len() < 2 {
        return Trend::Stable;
    }

    let split = series.len() / 2;
    let delta = score::mean(&series[split..]) - score::mean(&series[..split]);

    if delta > TREND_EPSILON {
        Trend::Improving
    } else if delta < -TREND_EPSILON {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

pub fn weak_subjects(marks: &[NormalizedMark], threshold: f64) -> Vec<Uuid> {
    let mut weak: Vec<(Uuid, f64)> = subject_means(marks)
        .into_iter()
        .filter(|(_, average)| *average < threshold)
        .collect();
    weak.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    weak.into_iter().map(|(subject_id, _)| subject_id).collect()
}

pub fn subject_means(marks: &[NormalizedMark]) -> BTreeMap<Uuid, f64> {
    let mut by_subject: BTreeMap<Uuid, Vec<f64>> = BTreeMap::new();
    for mark in marks {
        by_subject.entry(mark.subject_id).or_default().push(mark.percentage);
    }
    by_subject
        .into_iter()
        .map(|(subject_id, values)| (subject_id, score::mean(&values)))
        .collect()
}
