use anyhow::Context;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::export::ExportFilter;
use crate::models::{
    CohortMark, ExamRef, LabeledMark, LegacyExamRef, MarkRecord, SessionExamRef, SubjectDirectory,
    SubjectInfo,
};
use crate::policy::GradingPolicy;

const MARK_COLUMNS: &str = "m.id, m.student_id, m.subject_id, m.marks_obtained, m.total_marks, \
     m.exam_type, COALESCE(m.semester, subj_sem.name) AS legacy_semester, \
     es.id AS session_id, es.exam_type AS session_exam_type, es.semester_name, \
     es.academic_year, es.exam_date";

const MARK_FROM: &str = "marks_analytics.marks m \
     JOIN marks_analytics.subjects subj ON subj.id = m.subject_id \
     JOIN marks_analytics.semesters subj_sem ON subj_sem.id = subj.semester_id \
     LEFT JOIN marks_analytics.exam_sessions es ON es.id = m.exam_session_id";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub struct SessionColumns {
    pub session_id: Uuid,
    pub exam_type: String,
    pub semester_name: String,
    pub academic_year: String,
    pub exam_date: Option<NaiveDate>,
}

pub fn exam_ref_from_columns(
    session: Option<SessionColumns>,
    exam_type: Option<String>,
    semester: Option<String>,
) -> Option<ExamRef> {
    if let Some(session) = session {
        return Some(ExamRef::Session(SessionExamRef {
            session_id: session.session_id,
            exam_type: session.exam_type,
            semester_name: session.semester_name,
            academic_year: session.academic_year,
            exam_date: session.exam_date,
        }));
    }

    match (exam_type, semester) {
        (Some(exam_type), Some(semester)) => {
            Some(ExamRef::Legacy(LegacyExamRef { exam_type, semester }))
        }
        _ => None,
    }
}

fn mark_from_row(row: &PgRow) -> MarkRecord {
    let session = row
        .get::<Option<Uuid>, _>("session_id")
        .map(|session_id| SessionColumns {
            session_id,
            exam_type: row.get("session_exam_type"),
            semester_name: row.get("semester_name"),
            academic_year: row.get("academic_year"),
            exam_date: row.get("exam_date"),
        });

    MarkRecord {
        id: row.get("id"),
        student_id: row.get("student_id"),
        subject_id: row.get("subject_id"),
        obtained: row.get("marks_obtained"),
        total: row.get("total_marks"),
        exam_ref: exam_ref_from_columns(session, row.get("exam_type"), row.get("legacy_semester")),
    }
}

pub async fn fetch_student_marks(
    pool: &PgPool,
    student_id: Uuid,
) -> anyhow::Result<Vec<MarkRecord>> {
    let query = format!("SELECT {MARK_COLUMNS} FROM {MARK_FROM} WHERE m.student_id = $1");
    let rows = sqlx::query(&query).bind(student_id).fetch_all(pool).await?;
    Ok(rows.iter().map(mark_from_row).collect())
}

pub async fn fetch_cohort_marks(
    pool: &PgPool,
    department_id: Uuid,
    semester_id: Uuid,
) -> anyhow::Result<Vec<CohortMark>> {
    let query = format!(
        "SELECT st.section_id, {MARK_COLUMNS} FROM {MARK_FROM} \
         JOIN marks_analytics.students st ON st.id = m.student_id \
         WHERE st.department_id = $1 AND st.semester_id = $2"
    );

    let rows = sqlx::query(&query)
        .bind(department_id)
        .bind(semester_id)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| CohortMark {
            section_id: row.get("section_id"),
            record: mark_from_row(row),
        })
        .collect())
}

pub async fn fetch_labeled_marks(
    pool: &PgPool,
    filter: &ExportFilter,
) -> anyhow::Result<Vec<LabeledMark>> {
    let query = format!(
        "SELECT st.full_name, st.roll_number, st.department_id, d.code AS department_code, \
         st.semester_id, st_sem.name AS student_semester, subj.code AS subject_code, \
         subj.name AS subject_name, {MARK_COLUMNS} FROM {MARK_FROM} \
         JOIN marks_analytics.students st ON st.id = m.student_id \
         JOIN marks_analytics.departments d ON d.id = st.department_id \
         JOIN marks_analytics.semesters st_sem ON st_sem.id = st.semester_id \
         WHERE ($1::uuid IS NULL OR st.department_id = $1) \
         AND ($2::uuid IS NULL OR st.semester_id = $2) \
         AND ($3::uuid IS NULL OR m.subject_id = $3) \
         ORDER BY d.code, st.roll_number, subj.code, m.id"
    );

    let rows = sqlx::query(&query)
        .bind(filter.department_id)
        .bind(filter.semester_id)
        .bind(filter.subject_id)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| LabeledMark {
            record: mark_from_row(row),
            student_name: row.get("full_name"),
            roll_number: row.get("roll_number"),
            department_id: row.get("department_id"),
            department_code: row.get("department_code"),
            semester_id: row.get("semester_id"),
            semester_name: row.get("student_semester"),
            subject_code: row.get("subject_code"),
            subject_name: row.get("subject_name"),
        })
        .collect())
}

pub async fn fetch_subjects(pool: &PgPool) -> anyhow::Result<SubjectDirectory> {
    let rows = sqlx::query("SELECT id, code, name FROM marks_analytics.subjects")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| {
            (
                row.get::<Uuid, _>("id"),
                SubjectInfo {
                    code: row.get("code"),
                    name: row.get("name"),
                },
            )
        })
        .collect())
}

pub async fn fetch_student(pool: &PgPool, student_id: Uuid) -> anyhow::Result<(String, String)> {
    let row = sqlx::query(
        "SELECT full_name, roll_number FROM marks_analytics.students WHERE id = $1",
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await?;
    require_student(student_id, row.map(|row| (row.get("full_name"), row.get("roll_number"))))
}

pub fn require_student(
    student_id: Uuid,
    columns: Option<(String, String)>,
) -> anyhow::Result<(String, String)> {
    columns.with_context(|| format!("student {student_id} not found"))
}

pub async fn fetch_cohort_label(
    pool: &PgPool,
    department_id: Uuid,
    semester_id: Uuid,
) -> anyhow::Result<String> {
    let row = sqlx::query(
        "SELECT d.code, s.name FROM marks_analytics.departments d, marks_analytics.semesters s \
         WHERE d.id = $1 AND s.id = $2",
    )
    .bind(department_id)
    .bind(semester_id)
    .fetch_optional(pool)
    .await?
    .context("department or semester not found")?;

    let code: String = row.get("code");
    let semester: String = row.get("name");
    Ok(format!("{code} {semester}"))
}

pub async fn fetch_policy(pool: &PgPool) -> anyhow::Result<GradingPolicy> {
    let row = sqlx::query(
        "SELECT pass_percentage, weak_threshold FROM marks_analytics.grading_policy WHERE id = 1",
    )
    .fetch_optional(pool)
    .await?;

    policy_from_columns(row.map(|row| (row.get("pass_percentage"), row.get("weak_threshold"))))
}

pub fn policy_from_columns(columns: Option<(f64, f64)>) -> anyhow::Result<GradingPolicy> {
    match columns {
        Some((pass_percentage, weak_threshold)) => {
            GradingPolicy::new(pass_percentage, weak_threshold)
                .context("stored grading policy is out of range")
        }
        None => Ok(GradingPolicy::default()),
    }
}

pub async fn put_policy(pool: &PgPool, policy: &GradingPolicy) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO marks_analytics.grading_policy (id, pass_percentage, weak_threshold)
        VALUES (1, $1, $2)
        ON CONFLICT (id) DO UPDATE
        SET pass_percentage = EXCLUDED.pass_percentage, weak_threshold = EXCLUDED.weak_threshold
        "#,
    )
    .bind(policy.pass_percentage)
    .bind(policy.weak_threshold)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let department = Uuid::parse_str("5b0f6f0e-3c2a-4d53-9a55-1f0c7b1d2e01")?;
    let sem_3_1 = Uuid::parse_str("a3c1e0b4-6f3e-4a8e-9f7a-0d2b6c9e3101")?;
    let section_a = Uuid::parse_str("c2d4f6a8-1b3d-4e5f-8a9b-0c1d2e3f4a01")?;
    let section_b = Uuid::parse_str("c2d4f6a8-1b3d-4e5f-8a9b-0c1d2e3f4a02")?;
    let session_mid_2 = Uuid::parse_str("e7f1a2b3-c4d5-4e6f-9a0b-1c2d3e4f5a02")?;

    sqlx::query(
        "INSERT INTO marks_analytics.departments (id, code, name) \
         VALUES ($1, 'CSE', 'Computer Science and Engineering') ON CONFLICT (id) DO NOTHING",
    )
    .bind(department)
    .execute(pool)
    .await?;

    sqlx::query(
        "INSERT INTO marks_analytics.semesters (id, name) VALUES ($1, '3-1') \
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(sem_3_1)
    .execute(pool)
    .await?;

    for (id, name) in [(section_a, "A"), (section_b, "B")] {
        sqlx::query(
            "INSERT INTO marks_analytics.sections (id, department_id, semester_id, name) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (id) DO NOTHING",
        )
        .bind(id)
        .bind(department)
        .bind(sem_3_1)
        .bind(name)
        .execute(pool)
        .await?;
    }

    let subjects = vec![
        (Uuid::parse_str("0f1e2d3c-4b5a-4968-8776-655443322101")?, "CS301", "Compiler Design"),
        (Uuid::parse_str("0f1e2d3c-4b5a-4968-8776-655443322102")?, "CS302", "Computer Networks"),
    ];
    for (id, code, name) in &subjects {
        sqlx::query(
            "INSERT INTO marks_analytics.subjects (id, code, name, department_id, semester_id) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT (id) DO NOTHING",
        )
        .bind(*id)
        .bind(*code)
        .bind(*name)
        .bind(department)
        .bind(sem_3_1)
        .execute(pool)
        .await?;
    }

    let students = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "206F1A0501",
            "Avery Lee",
            section_a,
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "206F1A0502",
            "Jules Moreno",
            section_a,
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "206F1A0503",
            "Kiara Patel",
            section_b,
        ),
    ];
    for (id, roll_number, name, section) in &students {
        sqlx::query(
            "INSERT INTO marks_analytics.students \
             (id, roll_number, full_name, department_id, semester_id, section_id) \
             VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (id) DO NOTHING",
        )
        .bind(*id)
        .bind(*roll_number)
        .bind(*name)
        .bind(department)
        .bind(sem_3_1)
        .bind(*section)
        .execute(pool)
        .await?;
    }

    sqlx::query(
        "INSERT INTO marks_analytics.exam_sessions \
         (id, exam_type, semester_name, academic_year, exam_date) \
         VALUES ($1, 'Mid-2', '3-1', '2024-25', $2) ON CONFLICT (id) DO NOTHING",
    )
    .bind(session_mid_2)
    .bind(NaiveDate::from_ymd_opt(2024, 12, 9).context("invalid date")?)
    .execute(pool)
    .await?;

    // Mid-1 marks predate exam sessions; Mid-2 marks reference the session.
    let scores: [(f64, f64); 3] = [(22.0, 26.0), (15.0, 12.0), (27.0, 18.0)];
    for ((student_id, roll_number, _, _), (compiler, networks)) in students.iter().zip(scores) {
        for ((subject_id, code, _), mid_1) in subjects.iter().zip([compiler, networks]) {
            let mid_2 = (mid_1 + 3.0).min(30.0);
            insert_mark(
                pool,
                &format!("seed-{roll_number}-{code}-mid1"),
                (*student_id, *subject_id),
                (Some("Mid-1"), Some("3-1"), None),
                (mid_1, 30.0),
            )
            .await?;
            insert_mark(
                pool,
                &format!("seed-{roll_number}-{code}-mid2"),
                (*student_id, *subject_id),
                (None, None, Some(session_mid_2)),
                (mid_2, 30.0),
            )
            .await?;
        }
    }

    Ok(())
}

async fn insert_mark(
    pool: &PgPool,
    source_key: &str,
    (student_id, subject_id): (Uuid, Uuid),
    (exam_type, semester, session_id): (Option<&str>, Option<&str>, Option<Uuid>),
    (obtained, total): (f64, f64),
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO marks_analytics.marks
        (id, student_id, subject_id, exam_type, semester, exam_session_id,
         marks_obtained, total_marks, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(subject_id)
    .bind(exam_type)
    .bind(semester)
    .bind(session_id)
    .bind(obtained)
    .bind(total)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        roll_number: String,
        subject_code: String,
        exam_type: Option<String>,
        semester: Option<String>,
        session_id: Option<Uuid>,
        marks_obtained: f64,
        total_marks: f64,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let line = line + 1;
        let student_id: Uuid =
            sqlx::query("SELECT id FROM marks_analytics.students WHERE roll_number = $1")
                .bind(&row.roll_number)
                .fetch_optional(pool)
                .await?
                .with_context(|| format!("row {line}: unknown roll number {}", row.roll_number))?
                .get("id");
        let subject_id: Uuid =
            sqlx::query("SELECT id FROM marks_analytics.subjects WHERE code = $1")
                .bind(&row.subject_code)
                .fetch_optional(pool)
                .await?
                .with_context(|| format!("row {line}: unknown subject code {}", row.subject_code))?
                .get("id");

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        let fresh = insert_mark(
            pool,
            &source_key,
            (student_id, subject_id),
            (row.exam_type.as_deref(), row.semester.as_deref(), row.session_id),
            (row.marks_obtained, row.total_marks),
        )
        .await?;

        if fresh {
            inserted += 1;
        }
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_columns_take_precedence() {
        let session_id = Uuid::new_v4();
        let exam_ref = exam_ref_from_columns(
            Some(SessionColumns {
                session_id,
                exam_type: "Mid-1".to_string(),
                semester_name: "2-2".to_string(),
                academic_year: "2024-25".to_string(),
                exam_date: None,
            }),
            Some("Mid-1".to_string()),
            Some("2-2".to_string()),
        );
        assert!(matches!(exam_ref, Some(ExamRef::Session(ref s)) if s.session_id == session_id));
    }

    #[test]
    fn legacy_needs_both_columns() {
        assert!(matches!(
            exam_ref_from_columns(None, Some("Mid-2".to_string()), Some("1-1".to_string())),
            Some(ExamRef::Legacy(_))
        ));
        assert_eq!(exam_ref_from_columns(None, Some("Mid-2".to_string()), None), None);
        assert_eq!(exam_ref_from_columns(None, None, None), None);
    }

    #[test]
    fn stored_policy_is_validated() {
        let policy = policy_from_columns(Some((35.0, 45.0))).unwrap();
        assert_eq!(policy.pass_percentage, 35.0);
        assert_eq!(policy.weak_threshold, 45.0);

        assert!(policy_from_columns(Some((140.0, 50.0))).is_err());
        assert!(policy_from_columns(Some((40.0, -1.0))).is_err());
        assert!(policy_from_columns(Some((f64::NAN, 50.0))).is_err());
    }

    #[test]
    fn unknown_student_is_an_error() {
        let student_id = Uuid::new_v4();
        let err = require_student(student_id, None).unwrap_err();
        assert_eq!(err.to_string(), format!("student {student_id} not found"));

        let found = ("Avery Lee".to_string(), "206F1A0501".to_string());
        assert_eq!(require_student(student_id, Some(found.clone())).unwrap(), found);
    }

    #[test]
    fn missing_policy_row_uses_defaults() {
        let policy = policy_from_columns(None).unwrap();
        assert_eq!(policy.pass_percentage, 40.0);
        assert_eq!(policy.weak_threshold, 50.0);
    }
}
