use tracing::info;

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::hypothesis;
use crate::loader;
use crate::models::{
    BucketCounts, Datasets, DependencyResult, EngagementLevelSummary, PaymentTier,
    RegressionResult, StatisticsSummary, TTestResult,
};
use crate::outliers;
use crate::regression::{self, RegressionOptions};
use crate::stats;

/// Every value computed in one run, ready for presentation.
#[derive(Debug, Clone)]
pub struct AnalysisResults {
    pub summaries: Vec<StatisticsSummary>,
    pub buckets: Vec<BucketCounts>,
    pub t_tests: Vec<TTestResult>,
    pub correlation: f64,
    pub dependencies: Vec<DependencyResult>,
    pub engagement_levels: Vec<EngagementLevelSummary>,
    pub regression: RegressionResult,
}

/// Loads all sources and trims the engagement datasets.
pub fn prepare(config: &AnalysisConfig) -> Result<Datasets> {
    info!("loading datasets");
    let raw = loader::load_all(config)?;
    info!(
        threshold = config.outlier_threshold,
        "removing outliers from engagement data"
    );
    outliers::trim_engagement(&raw, config.outlier_threshold)
}

/// Runs every computation over already-trimmed datasets.
pub fn analyze(datasets: &Datasets, config: &AnalysisConfig) -> Result<AnalysisResults> {
    info!("computing descriptive statistics");
    let summaries = datasets
        .engagement()
        .into_iter()
        .map(stats::summary)
        .collect::<Result<Vec<_>>>()?;
    let buckets = datasets
        .engagement()
        .into_iter()
        .map(stats::engagement_buckets)
        .collect();
    let engagement_levels = stats::engagement_levels(&datasets.certificates)?;

    info!(variant = ?config.t_test, "testing 2021 vs 2022 means");
    let t_tests = PaymentTier::ALL
        .into_iter()
        .map(|tier| {
            let (earlier, later) = datasets.tier(tier);
            hypothesis::two_sample_t_test(
                tier,
                &earlier.minutes(),
                &later.minutes(),
                config.t_test,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let certificates = &datasets.certificates;
    let correlation = hypothesis::pearson_correlation(
        &certificates.minutes(),
        &certificates
            .records
            .iter()
            .map(|r| f64::from(r.certificates_issued))
            .collect::<Vec<_>>(),
    )?;

    info!("analyzing dependencies between periods");
    let dependencies = PaymentTier::ALL
        .into_iter()
        .map(|tier| {
            let (earlier, later) = datasets.tier(tier);
            hypothesis::analyze_dependency(tier, earlier, later, config.independence_tolerance)
        })
        .collect::<Result<Vec<_>>>()?;

    info!(seed = config.split_seed, "predicting certificates");
    let regression = regression::predict_certificates(
        certificates,
        RegressionOptions {
            seed: config.split_seed,
            test_fraction: config.test_fraction,
            prediction_minutes: config.prediction_minutes,
        },
    )?;

    Ok(AnalysisResults {
        summaries,
        buckets,
        t_tests,
        correlation,
        dependencies,
        engagement_levels,
        regression,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::models::DatasetId;
    use std::fs;

    fn write_sources(dir: &std::path::Path, free_2021: &str) {
        fs::write(
            dir.join(DatasetId::Q2_2021Free.default_file_name()),
            free_2021,
        )
        .unwrap();
        fs::write(
            dir.join(DatasetId::Q2_2021Paid.default_file_name()),
            "10,100,1\n11,250,1\n12,400,1\n13,90,1\n",
        )
        .unwrap();
        fs::write(
            dir.join(DatasetId::Q2_2022Free.default_file_name()),
            "1,40,0\n2,70,0\n4,20,0\n5,300,0\n",
        )
        .unwrap();
        fs::write(
            dir.join(DatasetId::Q2_2022Paid.default_file_name()),
            "10,500,1\n14,800,1\n15,120,1\n16,60,1\n",
        )
        .unwrap();
        let certificates: String = (1..=20)
            .map(|i| format!("c{i},{},{}\n", i * 50, i / 3))
            .collect();
        fs::write(
            dir.join(DatasetId::Certificates.default_file_name()),
            certificates,
        )
        .unwrap();
    }

    #[test]
    fn end_to_end_trims_and_analyzes() {
        let dir = tempfile::tempdir().unwrap();
        write_sources(dir.path(), "1,30,0\n2,90,0\n3,10000,0\n");
        let config = AnalysisConfig::new(dir.path(), dir.path());

        let datasets = prepare(&config).unwrap();
        let free_2021 = &datasets.q2_2021.free;
        assert_eq!(free_2021.len(), 2);
        assert_eq!(free_2021.records[0].student_id, "1");
        assert_eq!(free_2021.records[1].student_id, "2");
        assert_eq!(datasets.certificates.len(), 20);

        let results = analyze(&datasets, &config).unwrap();
        assert!((results.summaries[0].mean - 60.0).abs() < 1e-12);
        assert_eq!(results.summaries.len(), 4);
        assert_eq!(results.t_tests.len(), 2);
        assert_eq!(results.dependencies.len(), 2);
        assert!(results.correlation > 0.9);
        for (summary, buckets) in results.summaries.iter().zip(&results.buckets) {
            assert_eq!(summary.count, buckets.total());
        }
    }

    #[test]
    fn failure_names_the_dataset() {
        let dir = tempfile::tempdir().unwrap();
        write_sources(dir.path(), "1,30,0\n2,ninety,0\n");
        let config = AnalysisConfig::new(dir.path(), dir.path());

        let err = prepare(&config).unwrap_err();
        assert!(matches!(err, AnalysisError::SchemaMismatch { .. }));
        assert!(err.to_string().contains("q2_2021_paid_0"));
    }
}
