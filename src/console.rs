use std::fmt::Write;

use crate::pipeline::AnalysisResults;

fn or_na(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

/// Human-readable summary of a run for the terminal.
pub fn render_summary(results: &AnalysisResults) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Engagement Statistics:");
    for summary in &results.summaries {
        let _ = writeln!(output);
        let _ = writeln!(output, "{}:", summary.dataset);
        let _ = writeln!(output, "mean: {:.2}", summary.mean);
        let _ = writeln!(output, "median: {:.2}", summary.median);
        let _ = writeln!(output, "std: {}", or_na(summary.std_dev));
        let _ = writeln!(output, "users: {}", summary.count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Hypothesis Testing (2021 vs 2022):");
    for test in &results.t_tests {
        let _ = writeln!(
            output,
            "{} Users - mean {:.2} -> {:.2}, t: {:.4}, df: {:.1}, p-value: {:.4}",
            test.tier.label(),
            test.mean_2021,
            test.mean_2022,
            test.statistic,
            test.degrees_of_freedom,
            test.p_value
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Correlation Analysis:");
    let _ = writeln!(
        output,
        "minutes_watched vs certificates_issued: {:.4}",
        results.correlation
    );

    for dependency in &results.dependencies {
        let _ = writeln!(output);
        let _ = writeln!(output, "{} Users Dependencies:", dependency.tier.label());
        let _ = writeln!(output, "P(2021): {:.4}", dependency.p_2021);
        let _ = writeln!(output, "P(2022): {:.4}", dependency.p_2022);
        let _ = writeln!(output, "P(2022|2021): {:.4}", dependency.p_2022_given_2021);
        let _ = writeln!(output, "Independent?: {}", dependency.independent);
        let _ = writeln!(
            output,
            "({} students in 2021, {} in 2022, {} in both, {} overall)",
            dependency.students_2021,
            dependency.students_2022,
            dependency.retained,
            dependency.union
        );
    }

    let regression = &results.regression;
    let _ = writeln!(output);
    let _ = writeln!(output, "Certificate Prediction:");
    let _ = writeln!(
        output,
        "Linear Equation: y = {:.4}x + {:.4}",
        regression.slope, regression.intercept
    );
    let _ = writeln!(
        output,
        "R-squared: {:.4} ({} train / {} test rows)",
        regression.r2_score, regression.train_size, regression.test_size
    );
    let _ = writeln!(
        output,
        "Predicted certificates for {} minutes: {:.2}",
        regression.prediction_minutes, regression.prediction
    );

    output
}
