use crate::error::AnalysisError;
use crate::models::{ExamRef, MarkRecord, SessionExamRef};

const SEMESTER_ORDER: [&str; 8] = ["1-1", "1-2", "2-1", "2-2", "3-1", "3-2", "4-1", "4-2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExamKind {
    SlipTest,
    Mid1,
    Mid2,
    University,
    Other,
}

impl ExamKind {
    pub fn classify(exam_type: &str) -> Self {
        match exam_type.trim().to_ascii_lowercase().as_str() {
            "slip test" | "slip-test" | "sliptest" => ExamKind::SlipTest,
            "mid-1" | "mid 1" | "internal-1" => ExamKind::Mid1,
            "mid-2" | "mid 2" | "internal-2" => ExamKind::Mid2,
            "university" | "semester" => ExamKind::University,
            _ => ExamKind::Other,
        }
    }
}

pub fn semester_order(name: &str) -> (usize, String) {
    let name = name.trim();
    let position = SEMESTER_ORDER
        .iter()
        .position(|known| *known == name)
        .unwrap_or(SEMESTER_ORDER.len());
    (position, name.to_string())
}

/// Legacy groups carry no academic year and `None` sorts before every
/// `Some`, so a legacy group precedes all session groups.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey {
    pub academic_year: Option<String>,
    pub semester: (usize, String),
    pub kind: ExamKind,
    pub exam_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExamGroup {
    pub key: String,
    pub label: String,
    pub sort_key: SortKey,
    pub exam_type: String,
    pub semester: String,
    pub session: Option<SessionExamRef>,
}

impl ExamGroup {
    pub fn kind(&self) -> ExamKind {
        self.sort_key.kind
    }
}

pub fn resolve(record: &MarkRecord) -> Result<ExamGroup, AnalysisError> {
    match &record.exam_ref {
        None => Err(AnalysisError::MalformedRecord(format!(
            "record {} has no exam reference",
            record.id
        ))),
        Some(exam_ref) => resolve_ref(exam_ref).map_err(|reason| {
            AnalysisError::MalformedRecord(format!("record {}: {reason}", record.id))
        }),
    }
}

fn resolve_ref(exam_ref: &ExamRef) -> Result<ExamGroup, String> {
    match exam_ref {
        ExamRef::Session(session) => {
            let exam_type = required("exam_type", &session.exam_type)?;
            let semester = required("semester_name", &session.semester_name)?;
            let year = required("academic_year", &session.academic_year)?;
            Ok(ExamGroup {
                key: format!("session_{}", session.session_id),
                label: format!("{exam_type} - Sem {semester} (AY {year})"),
                sort_key: SortKey {
                    academic_year: Some(year.to_string()),
                    semester: semester_order(semester),
                    kind: ExamKind::classify(exam_type),
                    exam_type: exam_type.to_ascii_lowercase(),
                },
                exam_type: exam_type.to_string(),
                semester: semester.to_string(),
                session: Some(session.clone()),
            })
        }
        ExamRef::Legacy(legacy) => {
            let exam_type = required("exam_type", &legacy.exam_type)?;
            let semester = required("semester", &legacy.semester)?;
            Ok(ExamGroup {
                key: format!("legacy_{exam_type}_{semester}"),
                label: format!("{exam_type} - Sem {semester}"),
                sort_key: SortKey {
                    academic_year: None,
                    semester: semester_order(semester),
                    kind: ExamKind::classify(exam_type),
                    exam_type: exam_type.to_ascii_lowercase(),
                },
                exam_type: exam_type.to_string(),
                semester: semester.to_string(),
                session: None,
            })
        }
    }
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(format!("exam reference has an empty {field}"))
    } else {
        Ok(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{legacy, mark, session};
    use uuid::Uuid;

    fn record(exam_ref: Option<ExamRef>) -> MarkRecord {
        mark(Uuid::new_v4(), Uuid::new_v4(), 10.0, 20.0, exam_ref)
    }

    #[test]
    fn legacy_group_identity() {
        let group = resolve(&record(legacy("Mid-1", "3-1"))).unwrap();
        assert_eq!(group.key, "legacy_Mid-1_3-1");
        assert_eq!(group.label, "Mid-1 - Sem 3-1");
        assert_eq!(group.sort_key.academic_year, None);
        assert!(group.session.is_none());
    }

    #[test]
    fn session_group_identity() {
        let id = Uuid::new_v4();
        let group = resolve(&record(session(id, "Mid-2", "2-1", "2024-25"))).unwrap();
        assert_eq!(group.key, format!("session_{id}"));
        assert_eq!(group.label, "Mid-2 - Sem 2-1 (AY 2024-25)");
        assert_eq!(group.kind(), ExamKind::Mid2);
        assert_eq!(group.session.map(|s| s.session_id), Some(id));
    }

    #[test]
    fn resolving_twice_is_identical() {
        let rec = record(session(Uuid::new_v4(), "University", "4-2", "2025-26"));
        assert_eq!(resolve(&rec).unwrap(), resolve(&rec).unwrap());
    }

    #[test]
    fn missing_or_blank_reference_is_malformed() {
        assert!(matches!(
            resolve(&record(None)),
            Err(AnalysisError::MalformedRecord(_))
        ));
        assert!(matches!(
            resolve(&record(legacy("  ", "3-1"))),
            Err(AnalysisError::MalformedRecord(_))
        ));
        assert!(matches!(
            resolve(&record(session(Uuid::new_v4(), "Mid-1", "3-1", ""))),
            Err(AnalysisError::MalformedRecord(_))
        ));
    }

    #[test]
    fn exam_kinds_follow_precedence_and_aliases() {
        assert!(ExamKind::classify("Slip Test") < ExamKind::classify("Mid-1"));
        assert!(ExamKind::classify("Mid-1") < ExamKind::classify("Mid-2"));
        assert!(ExamKind::classify("Mid-2") < ExamKind::classify("University"));
        assert_eq!(ExamKind::classify("Internal-1"), ExamKind::Mid1);
        assert_eq!(ExamKind::classify("semester"), ExamKind::University);
        assert_eq!(ExamKind::classify("Quiz"), ExamKind::Other);
    }

    #[test]
    fn legacy_sorts_before_session_in_same_semester() {
        let old = resolve(&record(legacy("University", "3-1"))).unwrap();
        let new = resolve(&record(session(Uuid::new_v4(), "Slip Test", "1-1", "2023-24"))).unwrap();
        assert!(old.sort_key < new.sort_key);
    }

    #[test]
    fn chronological_order_within_scheme() {
        let y1 = resolve(&record(session(Uuid::new_v4(), "University", "1-2", "2023-24"))).unwrap();
        let y2 = resolve(&record(session(Uuid::new_v4(), "Slip Test", "2-1", "2024-25"))).unwrap();
        assert!(y1.sort_key < y2.sort_key);

        let a = resolve(&record(legacy("Mid-2", "2-2"))).unwrap();
        let b = resolve(&record(legacy("Mid-1", "3-1"))).unwrap();
        assert!(a.sort_key < b.sort_key);
    }

    #[test]
    fn unknown_semesters_sort_after_known() {
        assert!(semester_order("4-2") < semester_order("Summer"));
        assert_eq!(semester_order(" 1-1 "), (0, "1-1".to_string()));
    }
}
