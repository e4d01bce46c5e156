use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use uuid::Uuid;

use crate::class::ClassAnalysis;
use crate::models::SubjectDirectory;
use crate::score;
use crate::trend::{GroupTrend, StudentAnalysis, Trend, TrendPoint};

#[derive(Debug, Clone, Serialize)]
pub struct StudentAnalysisResponse {
    pub average_percentage: f64,
    pub overall_trend: Trend,
    pub weak_subjects: Vec<String>,
    pub semester_trend: BTreeMap<String, GroupTrend>,
    pub trend_points: Vec<TrendPoint>,
    pub passed_count: usize,
    pub failed_count: usize,
    pub skipped_records: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassAnalysisResponse {
    pub subject_performance: BTreeMap<String, f64>,
    pub subject_pass_rate: BTreeMap<String, f64>,
    pub subject_student_count: BTreeMap<String, usize>,
    pub weakest_subject: Option<String>,
    pub record_count: usize,
    pub skipped_records: usize,
}

pub fn subject_label(subjects: &SubjectDirectory, subject_id: &Uuid) -> String {
    subjects
        .get(subject_id)
        .map(|info| info.name.clone())
        .unwrap_or_else(|| subject_id.to_string())
}

/// Names shared by more than one of `subject_ids` get their code appended so
/// response keys stay one-to-one with subjects.
pub fn subject_labels<'a, I>(subjects: &SubjectDirectory, subject_ids: I) -> HashMap<Uuid, String>
where
    I: IntoIterator<Item = &'a Uuid>,
{
    let mut ids: Vec<Uuid> = subject_ids.into_iter().copied().collect();
    ids.sort();
    ids.dedup();

    let mut name_counts: HashMap<String, usize> = HashMap::new();
    for id in &ids {
        *name_counts.entry(subject_label(subjects, id)).or_default() += 1;
    }

    ids.into_iter()
        .map(|id| {
            let name = subject_label(subjects, &id);
            let label = match subjects.get(&id) {
                Some(info) if name_counts[&name] > 1 => format!("{} ({})", info.name, info.code),
                _ => name,
            };
            (id, label)
        })
        .collect()
}

impl StudentAnalysisResponse {
    pub fn new(analysis: StudentAnalysis, subjects: &SubjectDirectory) -> Self {
        let mut labels = subject_labels(subjects, &analysis.weak_subjects);
        Self {
            average_percentage: analysis.average_percentage,
            overall_trend: analysis.overall_trend,
            weak_subjects: analysis
                .weak_subjects
                .iter()
                .filter_map(|subject_id| labels.remove(subject_id))
                .collect(),
            semester_trend: analysis.semester_trend,
            trend_points: analysis.trend_points,
            passed_count: analysis.passed_count,
            failed_count: analysis.failed_count,
            skipped_records: analysis.skipped_records,
        }
    }
}

impl ClassAnalysisResponse {
    pub fn new(analysis: &ClassAnalysis, subjects: &SubjectDirectory) -> Self {
        let labels = subject_labels(subjects, analysis.subject_performance.keys());
        let label_for = |subject_id: &Uuid| {
            labels
                .get(subject_id)
                .cloned()
                .unwrap_or_else(|| subject_label(subjects, subject_id))
        };

        let mut subject_performance = BTreeMap::new();
        let mut subject_pass_rate = BTreeMap::new();
        let mut subject_student_count = BTreeMap::new();
        for (subject_id, summary) in &analysis.subject_performance {
            let label = label_for(subject_id);
            subject_performance.insert(label.clone(), summary.average_percentage);
            subject_pass_rate.insert(label.clone(), summary.pass_rate);
            subject_student_count.insert(label, summary.student_count);
        }

        Self {
            subject_performance,
            subject_pass_rate,
            subject_student_count,
            weakest_subject: analysis.weakest_subject.as_ref().map(label_for),
            record_count: analysis.record_count(),
            skipped_records: analysis.skipped_records,
        }
    }
}

pub fn format_percentage(percentage: f64) -> String {
    format!("{:.1}%", score::display_percentage(percentage))
}
