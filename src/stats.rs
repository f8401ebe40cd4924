use crate::error::{AnalysisError, Result};
use crate::models::{
    BucketCounts, CertificateRecord, Dataset, EngagementBucket, EngagementLevel,
    EngagementLevelSummary, Percentiles, Record, StatisticsSummary,
};

/// Percentile points reported for every engagement dataset.
pub const PERCENTILE_POINTS: [u8; 5] = [10, 25, 50, 75, 90];

/// Value at fraction `q` of sorted data, interpolating linearly at rank `q * (n - 1)`.
///
/// `sorted` must be non-empty and in ascending order.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    debug_assert!(sorted.is_sorted_by(|a, b| a <= b));

    let n = sorted.len();
    let rank = q.clamp(0.0, 1.0) * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(n - 1);
    let fraction = rank - lower as f64;

    sorted[lower] + fraction * (sorted[upper] - sorted[lower])
}

/// Collects a metric and sorts it ascending.
pub fn sorted_metric<R>(records: &[R], metric: impl Fn(&R) -> f64) -> Vec<f64> {
    let mut values: Vec<f64> = records.iter().map(metric).collect();
    values.sort_by(f64::total_cmp);
    values
}

/// Quantile of a dataset's metric; fails on an empty dataset.
pub fn quantile<R>(
    dataset: &Dataset<R>,
    metric: impl Fn(&R) -> f64,
    q: f64,
) -> Result<f64> {
    let sorted = sorted_metric(&dataset.records, metric);
    if sorted.is_empty() {
        return Err(AnalysisError::insufficient(
            format!("quantile of {}", dataset.id),
            1,
            0,
        ));
    }
    Ok(quantile_sorted(&sorted, q))
}

pub fn calculate_percentiles<R>(
    dataset: &Dataset<R>,
    metric: impl Fn(&R) -> f64,
) -> Result<Percentiles> {
    let sorted = sorted_metric(&dataset.records, metric);
    if sorted.is_empty() {
        return Err(AnalysisError::insufficient(
            format!("percentiles of {}", dataset.id),
            1,
            0,
        ));
    }
    Ok(percentiles_sorted(&sorted))
}

fn percentiles_sorted(sorted: &[f64]) -> Percentiles {
    let values = PERCENTILE_POINTS
        .iter()
        .map(|&p| (p, quantile_sorted(sorted, f64::from(p) / 100.0)))
        .collect();
    Percentiles { values }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Unbiased variance (divisor `n - 1`).
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let sum_sq = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    Some(sum_sq / (values.len() - 1) as f64)
}

pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}

/// Mean, median, spread and percentiles of minutes watched.
pub fn summary<R: Record>(dataset: &Dataset<R>) -> Result<StatisticsSummary> {
    let sorted = sorted_metric(&dataset.records, R::minutes_watched);
    let mean = mean(&sorted).ok_or_else(|| {
        AnalysisError::insufficient(format!("summary of {}", dataset.id), 1, 0)
    })?;
    let percentiles = calculate_percentiles(dataset, R::minutes_watched)?;

    Ok(StatisticsSummary {
        dataset: dataset.id,
        mean,
        median: quantile_sorted(&sorted, 0.5),
        std_dev: sample_std_dev(&sorted),
        count: sorted.len(),
        total_hours: sorted.iter().sum::<f64>() / 60.0,
        percentiles,
    })
}

pub fn engagement_buckets<R: Record>(dataset: &Dataset<R>) -> BucketCounts {
    let mut counts = [0usize; 4];
    for record in &dataset.records {
        let bucket = EngagementBucket::for_minutes(record.minutes_watched());
        counts[bucket as usize] += 1;
    }
    BucketCounts {
        dataset: dataset.id,
        counts,
    }
}

/// Splits certificate holders into four equal-frequency groups by minutes watched
/// and aggregates each group.
///
/// Group edges are the 0/25/50/75/100% quantiles; a record belongs to the first
/// group whose upper edge it does not exceed. Fails when the edges are not
/// strictly increasing, since the groups would then be ill-defined.
pub fn engagement_levels(
    dataset: &Dataset<CertificateRecord>,
) -> Result<Vec<EngagementLevelSummary>> {
    let sorted = sorted_metric(&dataset.records, |r| r.minutes_watched);
    if sorted.is_empty() {
        return Err(AnalysisError::insufficient(
            "engagement levels of certificates",
            1,
            0,
        ));
    }

    let edges: Vec<f64> = [0.0, 0.25, 0.5, 0.75, 1.0]
        .iter()
        .map(|&q| quantile_sorted(&sorted, q))
        .collect();
    let mut distinct = edges.clone();
    distinct.dedup();
    if distinct.len() != edges.len() {
        return Err(AnalysisError::insufficient(
            "engagement levels of certificates (distinct quartile edges)",
            edges.len(),
            distinct.len(),
        ));
    }

    let mut groups: Vec<(Vec<f64>, Vec<u32>)> = vec![(Vec::new(), Vec::new()); 4];
    for record in &dataset.records {
        let index = edges[1..]
            .iter()
            .position(|&edge| record.minutes_watched <= edge)
            .unwrap_or(3);
        groups[index].0.push(record.minutes_watched);
        groups[index].1.push(record.certificates_issued);
    }

    Ok(EngagementLevel::ALL
        .into_iter()
        .zip(groups)
        .map(|(level, (mut minutes, certificates))| {
            minutes.sort_by(f64::total_cmp);
            let issued: Vec<f64> = certificates.iter().map(|&c| f64::from(c)).collect();
            EngagementLevelSummary {
                level,
                certificates_count: certificates.len(),
                certificates_mean: mean(&issued),
                certificates_sum: certificates.iter().map(|&c| u64::from(c)).sum(),
                minutes_mean: mean(&minutes),
                minutes_median: (!minutes.is_empty()).then(|| quantile_sorted(&minutes, 0.5)),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DatasetId, EngagementRecord};

    fn engagement(minutes: &[f64]) -> Dataset<EngagementRecord> {
        let records = minutes
            .iter()
            .enumerate()
            .map(|(i, &m)| EngagementRecord {
                student_id: i.to_string(),
                minutes_watched: m,
                paid_in_q2: false,
            })
            .collect();
        Dataset::new(DatasetId::Q2_2021Free, records)
    }

    fn certificates(rows: &[(f64, u32)]) -> Dataset<CertificateRecord> {
        let records = rows
            .iter()
            .enumerate()
            .map(|(i, &(m, c))| CertificateRecord {
                student_id: i.to_string(),
                minutes_watched: m,
                certificates_issued: c,
            })
            .collect();
        Dataset::new(DatasetId::Certificates, records)
    }

    #[test]
    fn quantile_interpolates_between_order_statistics() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile_sorted(&sorted, 0.5) - 2.5).abs() < 1e-12);
        assert!((quantile_sorted(&sorted, 0.0) - 1.0).abs() < 1e-12);
        assert!((quantile_sorted(&sorted, 1.0) - 4.0).abs() < 1e-12);
        assert!((quantile_sorted(&sorted, 0.25) - 1.75).abs() < 1e-12);
    }

    #[test]
    fn quantile_of_single_value_is_that_value() {
        let dataset = engagement(&[42.0]);
        let q = quantile(&dataset, |r| r.minutes_watched, 0.99).unwrap();
        assert!((q - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn quantile_of_empty_dataset_fails() {
        let dataset = engagement(&[]);
        let err = quantile(&dataset, |r| r.minutes_watched, 0.99).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { .. }));
    }

    #[test]
    fn percentiles_are_monotonic() {
        let dataset = engagement(&[5.0, 400.0, 12.0, 75.0, 3.0, 900.0, 61.0, 61.0, 240.0]);
        let percentiles = calculate_percentiles(&dataset, |r| r.minutes_watched).unwrap();
        let values: Vec<f64> = percentiles.values.iter().map(|(_, v)| *v).collect();
        assert_eq!(values.len(), 5);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(Percentiles::label(10), "10th");
        assert!((percentiles.get(50).unwrap() - 61.0).abs() < f64::EPSILON);
    }

    #[test]
    fn summary_uses_sample_standard_deviation() {
        let dataset = engagement(&[30.0, 90.0]);
        let summary = summary(&dataset).unwrap();
        assert!((summary.mean - 60.0).abs() < 1e-12);
        assert!((summary.median - 60.0).abs() < 1e-12);
        // sqrt(((30-60)^2 + (90-60)^2) / 1)
        assert!((summary.std_dev.unwrap() - 1800.0_f64.sqrt()).abs() < 1e-9);
        assert_eq!(summary.count, 2);
        assert!((summary.total_hours - 2.0).abs() < 1e-12);
    }

    #[test]
    fn summary_of_single_record_has_no_std_dev() {
        let summary = summary(&engagement(&[10.0])).unwrap();
        assert!(summary.std_dev.is_none());
    }

    #[test]
    fn bucket_edges_are_upper_inclusive() {
        let dataset = engagement(&[0.0, 60.0, 60.5, 180.0, 600.0, 600.1, 5000.0]);
        let buckets = engagement_buckets(&dataset);
        assert_eq!(buckets.counts, [2, 2, 1, 2]);
    }

    #[test]
    fn bucket_counts_sum_to_record_count() {
        let dataset = engagement(&[1.0, 59.0, 61.0, 179.0, 181.0, 599.0, 601.0, 10_000.0]);
        let buckets = engagement_buckets(&dataset);
        assert_eq!(buckets.total(), dataset.len());
    }

    #[test]
    fn engagement_levels_split_by_quartiles() {
        let rows: Vec<(f64, u32)> = (1..=8).map(|i| (f64::from(i) * 100.0, i)).collect();
        let levels = engagement_levels(&certificates(&rows)).unwrap();

        assert_eq!(levels.len(), 4);
        assert!(levels.iter().all(|l| l.certificates_count == 2));
        assert_eq!(levels[0].level, EngagementLevel::Low);
        assert_eq!(levels[0].certificates_sum, 3);
        assert_eq!(levels[3].level, EngagementLevel::VeryHigh);
        assert_eq!(levels[3].certificates_sum, 15);
        assert!((levels[3].minutes_mean.unwrap() - 750.0).abs() < 1e-9);
        assert!((levels[1].minutes_median.unwrap() - 350.0).abs() < 1e-9);
    }

    #[test]
    fn engagement_levels_need_distinct_edges() {
        let rows = [(100.0, 1), (100.0, 1), (100.0, 2), (900.0, 3)];
        let err = engagement_levels(&certificates(&rows)).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { .. }));
    }
}
