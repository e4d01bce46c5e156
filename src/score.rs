use uuid::Uuid;

use crate::error::AnalysisError;
use crate::exam::{self, ExamGroup};
use crate::models::MarkRecord;
use crate::policy::GradingPolicy;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub percentage: f64,
    pub passed: bool,
}

#[derive(Debug, Clone)]
pub struct NormalizedMark {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub obtained: f64,
    pub total: f64,
    pub percentage: f64,
    pub passed: bool,
    pub group: ExamGroup,
}

pub fn score(obtained: f64, total: f64, policy: &GradingPolicy) -> Result<Score, AnalysisError> {
    if !total.is_finite() || total <= 0.0 {
        return Err(AnalysisError::MalformedRecord(format!(
            "total marks must be positive (got {total})"
        )));
    }
    if !obtained.is_finite() || obtained < 0.0 {
        return Err(AnalysisError::MalformedRecord(format!(
            "obtained marks must be non-negative (got {obtained})"
        )));
    }

    let percentage = 100.0 * obtained / total;
    Ok(Score {
        percentage,
        passed: percentage >= policy.pass_percentage,
    })
}

pub fn normalize(
    record: &MarkRecord,
    policy: &GradingPolicy,
) -> Result<NormalizedMark, AnalysisError> {
    let group = exam::resolve(record)?;
    let Score { percentage, passed } =
        score(record.obtained, record.total, policy).map_err(|err| match err {
            AnalysisError::MalformedRecord(reason) => {
                AnalysisError::MalformedRecord(format!("record {}: {reason}", record.id))
            }
            other => other,
        })?;

    Ok(NormalizedMark {
        student_id: record.student_id,
        subject_id: record.subject_id,
        obtained: record.obtained,
        total: record.total,
        percentage,
        passed,
        group,
    })
}

pub fn normalize_all<'a, I>(records: I, policy: &GradingPolicy) -> (Vec<NormalizedMark>, usize)
where
    I: IntoIterator<Item = &'a MarkRecord>,
{
    let mut marks = Vec::new();
    let mut skipped = 0usize;

    for record in records {
        match normalize(record, policy) {
            Ok(mark) => marks.push(mark),
            Err(err) => {
                tracing::debug!(record_id = %record.id, error = %err, "skipping mark record");
                skipped += 1;
            }
        }
    }

    (marks, skipped)
}

pub fn display_percentage(percentage: f64) -> f64 {
    percentage.clamp(0.0, 100.0)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
