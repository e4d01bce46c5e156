use std::fmt::Write;

use crate::api::{format_percentage, ClassAnalysisResponse, StudentAnalysisResponse};
use crate::policy::GradingPolicy;
use crate::trend::Trend;

fn trend_word(trend: Trend) -> &'static str {
    match trend {
        Trend::Improving => "improving",
        Trend::Declining => "declining",
        Trend::Stable => "stable",
    }
}

pub fn build_student_report(
    student_label: &str,
    policy: &GradingPolicy,
    analysis: &StudentAnalysisResponse,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Student Performance Report");
    let _ = writeln!(
        output,
        "Generated for {} (pass at {}, weak below {})",
        student_label,
        format_percentage(policy.pass_percentage),
        format_percentage(policy.weak_threshold)
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");

    if analysis.trend_points.is_empty() {
        let _ = writeln!(output, "No marks recorded for this student.");
    } else {
        let _ = writeln!(
            output,
            "- Average: {}",
            format_percentage(analysis.average_percentage)
        );
        let _ = writeln!(output, "- Trend: {}", trend_word(analysis.overall_trend));
        let _ = writeln!(
            output,
            "- Results: {} passed, {} failed",
            analysis.passed_count, analysis.failed_count
        );
    }
    if analysis.skipped_records > 0 {
        let _ = writeln!(
            output,
            "- {} malformed records were excluded",
            analysis.skipped_records
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Exam Timeline");

    if analysis.trend_points.is_empty() {
        let _ = writeln!(output, "No exam groups to chart.");
    } else {
        for point in &analysis.trend_points {
            let _ = writeln!(
                output,
                "- {}: {}",
                point.group_label,
                format_percentage(point.percentage)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weak Subjects");

    if analysis.weak_subjects.is_empty() {
        let _ = writeln!(output, "No subjects below the weak threshold.");
    } else {
        for subject in &analysis.weak_subjects {
            let _ = writeln!(output, "- {}", subject);
        }
    }

    output
}

pub fn build_class_report(
    cohort_label: &str,
    policy: &GradingPolicy,
    analysis: &ClassAnalysisResponse,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Class Performance Report");
    let _ = writeln!(
        output,
        "Generated for {} (pass at {})",
        cohort_label,
        format_percentage(policy.pass_percentage)
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Subject Averages");

    if analysis.subject_performance.is_empty() {
        let _ = writeln!(output, "No marks recorded for this cohort.");
    } else {
        let mut subjects: Vec<(&String, &f64)> = analysis.subject_performance.iter().collect();
        subjects.sort_by(|a, b| a.1.total_cmp(b.1).then_with(|| a.0.cmp(b.0)));
        for (subject, average) in subjects {
            let pass_rate = analysis
                .subject_pass_rate
                .get(subject)
                .copied()
                .unwrap_or_default();
            let students = analysis
                .subject_student_count
                .get(subject)
                .copied()
                .unwrap_or_default();
            let _ = writeln!(
                output,
                "- {}: {} average, {} passing across {} students",
                subject,
                format_percentage(*average),
                format_percentage(pass_rate),
                students
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weakest Subject");
    match &analysis.weakest_subject {
        Some(subject) => {
            let _ = writeln!(output, "{}", subject);
        }
        None => {
            let _ = writeln!(output, "No subjects to compare.");
        }
    }

    output
}
