use std::collections::HashSet;

use serde::Deserialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::{AnalysisError, Result};
use crate::models::{Dataset, DependencyResult, PaymentTier, Record, TTestResult};
use crate::stats;

/// Which two-sample t-test to run.
///
/// Welch does not assume equal variances; Student pools them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TTestVariant {
    #[default]
    Welch,
    Student,
}

/// Two-sided test of equal means for two independent samples.
///
/// The statistic is `(mean(a) - mean(b)) / se`.
pub fn two_sample_t_test(
    tier: PaymentTier,
    earlier: &[f64],
    later: &[f64],
    variant: TTestVariant,
) -> Result<TTestResult> {
    let operation = || format!("t-test for {} users", tier.label().to_lowercase());
    let smaller = earlier.len().min(later.len());
    if smaller < 2 {
        return Err(AnalysisError::insufficient(operation(), 2, smaller));
    }

    let n1 = earlier.len() as f64;
    let n2 = later.len() as f64;
    let (Some(mean1), Some(mean2)) = (stats::mean(earlier), stats::mean(later)) else {
        return Err(AnalysisError::insufficient(operation(), 2, 0));
    };
    let (Some(var1), Some(var2)) = (
        stats::sample_variance(earlier),
        stats::sample_variance(later),
    ) else {
        return Err(AnalysisError::insufficient(operation(), 2, smaller));
    };

    let (std_error, df) = match variant {
        TTestVariant::Welch => {
            let a = var1 / n1;
            let b = var2 / n2;
            let df = (a + b).powi(2) / (a.powi(2) / (n1 - 1.0) + b.powi(2) / (n2 - 1.0));
            ((a + b).sqrt(), df)
        }
        TTestVariant::Student => {
            let df = n1 + n2 - 2.0;
            let pooled = ((n1 - 1.0) * var1 + (n2 - 1.0) * var2) / df;
            ((pooled * (1.0 / n1 + 1.0 / n2)).sqrt(), df)
        }
    };

    if std_error == 0.0 || !df.is_finite() {
        // Both samples are constant; there is no spread to test against.
        return Err(AnalysisError::insufficient(
            format!("{} (samples with non-zero variance)", operation()),
            1,
            0,
        ));
    }

    let statistic = (mean1 - mean2) / std_error;
    let distribution = StudentsT::new(0.0, 1.0, df)
        .map_err(|_| AnalysisError::insufficient(operation(), 2, smaller))?;
    let p_value = (2.0 * distribution.sf(statistic.abs())).min(1.0);

    Ok(TTestResult {
        tier,
        statistic,
        p_value,
        degrees_of_freedom: df,
        mean_2021: mean1,
        mean_2022: mean2,
    })
}

/// Membership-based dependency between two periods of one payment tier.
///
/// With A the students seen in the earlier period and B those in the later one:
/// `P(2021) = |A|/|A∪B|`, `P(2022) = |B|/|A∪B|`, `P(2022|2021) = |A∩B|/|A|`.
/// The periods are flagged independent when the conditional and marginal
/// probabilities of the later period differ by less than `tolerance`.
pub fn analyze_dependency<R: Record>(
    tier: PaymentTier,
    earlier: &Dataset<R>,
    later: &Dataset<R>,
    tolerance: f64,
) -> Result<DependencyResult> {
    let a: HashSet<&str> = earlier.records.iter().map(Record::student_id).collect();
    let b: HashSet<&str> = later.records.iter().map(Record::student_id).collect();
    if a.is_empty() {
        return Err(AnalysisError::EmptySet {
            operation: format!(
                "P(2022|2021) for {} users ({} has no students)",
                tier.label().to_lowercase(),
                earlier.id
            ),
        });
    }

    let union = a.union(&b).count();
    let retained = a.intersection(&b).count();
    let p_2021 = a.len() as f64 / union as f64;
    let p_2022 = b.len() as f64 / union as f64;
    let p_2022_given_2021 = retained as f64 / a.len() as f64;

    Ok(DependencyResult {
        tier,
        p_2021,
        p_2022,
        p_2022_given_2021,
        independent: (p_2022_given_2021 - p_2022).abs() < tolerance,
        students_2021: a.len(),
        students_2022: b.len(),
        retained,
        union,
    })
}

/// Pearson correlation coefficient of two equally long columns.
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> Result<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return Err(AnalysisError::insufficient("correlation", 2, n));
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return Err(AnalysisError::insufficient(
            "correlation (columns with non-zero variance)",
            1,
            0,
        ));
    }
    Ok(sxy / (sxx * syy).sqrt())
}
