use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("malformed mark record: {0}")]
    MalformedRecord(String),

    #[error("invalid grading policy: {field} must be within 0..=100 (got {value})")]
    InvalidPolicy { field: &'static str, value: f64 },
}
