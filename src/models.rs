use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LegacyExamRef {
    pub exam_type: String,
    pub semester: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionExamRef {
    pub session_id: Uuid,
    pub exam_type: String,
    pub semester_name: String,
    pub academic_year: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExamRef {
    Legacy(LegacyExamRef),
    Session(SessionExamRef),
}

/// `exam_ref` is `None` when the stored row carries neither a session nor a
/// legacy exam type; the resolver rejects such records.
#[derive(Debug, Clone)]
pub struct MarkRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub obtained: f64,
    pub total: f64,
    pub exam_ref: Option<ExamRef>,
}

#[derive(Debug, Clone)]
pub struct CohortMark {
    pub section_id: Option<Uuid>,
    pub record: MarkRecord,
}

#[derive(Debug, Clone)]
pub struct LabeledMark {
    pub record: MarkRecord,
    pub student_name: String,
    pub roll_number: String,
    pub department_id: Uuid,
    pub department_code: String,
    pub semester_id: Uuid,
    pub semester_name: String,
    pub subject_code: String,
    pub subject_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectInfo {
    pub code: String,
    pub name: String,
}

pub type SubjectDirectory = HashMap<Uuid, SubjectInfo>;
