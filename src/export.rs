use std::io::Write;

use serde::Serialize;
use uuid::Uuid;

use crate::exam;
use crate::models::LabeledMark;
use crate::policy::GradingPolicy;
use crate::score;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportFilter {
    pub department_id: Option<Uuid>,
    pub semester_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
}

impl ExportFilter {
    pub fn matches(&self, mark: &LabeledMark) -> bool {
        self.department_id.map_or(true, |id| id == mark.department_id)
            && self.semester_id.map_or(true, |id| id == mark.semester_id)
            && self.subject_id.map_or(true, |id| id == mark.record.subject_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    #[serde(rename = "Student Name")]
    pub student_name: String,
    #[serde(rename = "Roll Number")]
    pub roll_number: String,
    #[serde(rename = "Department")]
    pub department: String,
    #[serde(rename = "Semester")]
    pub semester: String,
    #[serde(rename = "Subject Code")]
    pub subject_code: String,
    #[serde(rename = "Subject Name")]
    pub subject_name: String,
    #[serde(rename = "Exam Group")]
    pub exam_group: String,
    #[serde(rename = "Exam Type")]
    pub exam_type: String,
    #[serde(rename = "Marks Obtained")]
    pub marks_obtained: f64,
    #[serde(rename = "Total Marks")]
    pub total_marks: f64,
    #[serde(rename = "Percentage")]
    pub percentage: String,
    #[serde(rename = "Result")]
    pub result: String,
}

pub fn build_rows(
    marks: &[LabeledMark],
    filter: &ExportFilter,
    policy: &GradingPolicy,
) -> Vec<ExportRow> {
    marks
        .iter()
        .filter(|mark| filter.matches(mark))
        .map(|mark| {
            let record = &mark.record;
            let derived = match (
                exam::resolve(record),
                score::score(record.obtained, record.total, policy),
            ) {
                (Ok(group), Ok(scored)) => Some((group, scored)),
                _ => None,
            };
            let (exam_group, exam_type, percentage, result) = match derived {
                Some((group, scored)) => (
                    group.label,
                    group.exam_type,
                    format!("{:.2}", scored.percentage),
                    if scored.passed { "Pass" } else { "Fail" }.to_string(),
                ),
                None => Default::default(),
            };

            ExportRow {
                student_name: mark.student_name.clone(),
                roll_number: mark.roll_number.clone(),
                department: mark.department_code.clone(),
                semester: mark.semester_name.clone(),
                subject_code: mark.subject_code.clone(),
                subject_name: mark.subject_name.clone(),
                exam_group,
                exam_type,
                marks_obtained: record.obtained,
                total_marks: record.total,
                percentage,
                result,
            }
        })
        .collect()
}

pub fn write_csv<W: Write>(rows: &[ExportRow], writer: W) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        writer.write_record(HEADERS)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

const HEADERS: [&str; 12] = [
    "Student Name",
    "Roll Number",
    "Department",
    "Semester",
    "Subject Code",
    "Subject Name",
    "Exam Group",
    "Exam Type",
    "Marks Obtained",
    "Total Marks",
    "Percentage",
    "Result",
];
