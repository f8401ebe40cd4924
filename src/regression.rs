//! Certificates-from-minutes linear model.
//!
//! The held-out partition is drawn by shuffling row indices with a seeded
//! PCG generator, so a given seed always yields the same split.

use rand::{SeedableRng as _, seq::SliceRandom};
use rand_pcg::Pcg32;

use crate::error::{AnalysisError, Result};
use crate::models::{CertificateRecord, Dataset, RegressionResult};
use crate::stats;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Partitions `0..n` into train and test indices.
///
/// The test partition holds `ceil(n * test_fraction)` rows.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Split {
    let test_len = ((n as f64) * test_fraction).ceil() as usize;
    let test_len = test_len.min(n);

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = Pcg32::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(test_len);
    Split {
        train,
        test: indices,
    }
}

/// Ordinary least squares with a single predictor and an intercept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearModel {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearModel {
    pub fn fit(xs: &[f64], ys: &[f64]) -> Result<Self> {
        let n = xs.len().min(ys.len());
        if n < 2 {
            return Err(AnalysisError::insufficient("regression fit", 2, n));
        }
        let (xs, ys) = (&xs[..n], &ys[..n]);
        let mean_x = xs.iter().sum::<f64>() / n as f64;
        let mean_y = ys.iter().sum::<f64>() / n as f64;

        let (sxy, sxx) = xs
            .iter()
            .zip(ys)
            .fold((0.0, 0.0), |(sxy, sxx), (x, y)| {
                let dx = x - mean_x;
                (sxy + dx * (y - mean_y), sxx + dx * dx)
            });
        if sxx == 0.0 {
            return Err(AnalysisError::insufficient(
                "regression fit (distinct minutes_watched values)",
                2,
                1,
            ));
        }

        let slope = sxy / sxx;
        Ok(Self {
            slope,
            intercept: mean_y - slope * mean_x,
        })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Coefficient of determination against the mean of `actual`.
///
/// A constant `actual` scores 1.0 on an exact fit and 0.0 otherwise.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    let Some(mean) = stats::mean(actual) else {
        return 0.0;
    };
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

#[derive(Debug, Clone, Copy)]
pub struct RegressionOptions {
    pub seed: u64,
    pub test_fraction: f64,
    pub prediction_minutes: f64,
}

/// Fits certificates issued on minutes watched and scores the fit on the
/// held-out partition.
pub fn predict_certificates(
    dataset: &Dataset<CertificateRecord>,
    options: RegressionOptions,
) -> Result<RegressionResult> {
    let split = train_test_split(dataset.len(), options.test_fraction, options.seed);
    let smaller = split.train.len().min(split.test.len());
    if smaller < 2 {
        return Err(AnalysisError::insufficient(
            format!("train/test split of {}", dataset.id),
            2,
            smaller,
        ));
    }

    let columns = |indices: &[usize]| -> (Vec<f64>, Vec<f64>) {
        indices
            .iter()
            .map(|&i| {
                let record = &dataset.records[i];
                (
                    record.minutes_watched,
                    f64::from(record.certificates_issued),
                )
            })
            .unzip()
    };
    let (train_x, train_y) = columns(&split.train);
    let (test_x, test_y) = columns(&split.test);

    let model = LinearModel::fit(&train_x, &train_y)?;
    let predicted: Vec<f64> = test_x.iter().map(|&x| model.predict(x)).collect();

    Ok(RegressionResult {
        slope: model.slope,
        intercept: model.intercept,
        r2_score: r2_score(&test_y, &predicted),
        prediction_minutes: options.prediction_minutes,
        prediction: model.predict(options.prediction_minutes),
        train_size: split.train.len(),
        test_size: split.test.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DatasetId;

    const OPTIONS: RegressionOptions = RegressionOptions {
        seed: 365,
        test_fraction: 0.2,
        prediction_minutes: 1200.0,
    };

    fn certificates(rows: impl IntoIterator<Item = (f64, u32)>) -> Dataset<CertificateRecord> {
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(i, (m, c))| CertificateRecord {
                student_id: i.to_string(),
                minutes_watched: m,
                certificates_issued: c,
            })
            .collect();
        Dataset::new(DatasetId::Certificates, records)
    }

    #[test]
    fn split_is_a_partition_with_ceiled_test_size() {
        let split = train_test_split(11, 0.2, 365);
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 8);

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..11).collect::<Vec<_>>());
    }

    #[test]
    fn split_is_reproducible_for_a_seed() {
        assert_eq!(train_test_split(50, 0.2, 365), train_test_split(50, 0.2, 365));
        assert_ne!(train_test_split(50, 0.2, 365), train_test_split(50, 0.2, 366));
    }

    #[test]
    fn refitting_with_same_seed_is_identical() {
        let dataset = certificates((1..=40).map(|i| (f64::from(i * 37 % 900), i % 7)));
        let first = predict_certificates(&dataset, OPTIONS).unwrap();
        let second = predict_certificates(&dataset, OPTIONS).unwrap();
        assert_eq!(first.slope.to_bits(), second.slope.to_bits());
        assert_eq!(first.intercept.to_bits(), second.intercept.to_bits());
    }

    #[test]
    fn perfectly_linear_data_scores_one() {
        let dataset = certificates((1..=20).map(|i| (f64::from(i) * 100.0, i)));
        let result = predict_certificates(&dataset, OPTIONS).unwrap();

        assert!((result.slope - 0.01).abs() < 1e-12);
        assert!(result.intercept.abs() < 1e-9);
        assert!((result.r2_score - 1.0).abs() < 1e-12);
        assert_eq!(result.test_size, 4);
        assert_eq!(result.train_size, 16);
    }

    #[test]
    fn clustered_data_extrapolates_without_clamping() {
        let low = std::iter::repeat((100.0, 1)).take(10);
        let high = std::iter::repeat((1000.0, 10)).take(10);
        let result = predict_certificates(&certificates(low.chain(high)), OPTIONS).unwrap();

        assert!((result.slope - 0.01).abs() < 1e-12);
        assert!((result.prediction - 12.0).abs() < 1e-9);
        assert!((result.prediction_minutes - 1200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn too_few_records_for_split() {
        let dataset = certificates([(10.0, 1), (20.0, 2), (30.0, 3)]);
        let err = predict_certificates(&dataset, OPTIONS).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { .. }));
    }

    #[test]
    fn constant_minutes_cannot_be_fit() {
        let err = LinearModel::fit(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData { .. }));
    }

    #[test]
    fn r2_of_constant_target() {
        assert!((r2_score(&[2.0, 2.0], &[2.0, 2.0]) - 1.0).abs() < f64::EPSILON);
        assert!(r2_score(&[2.0, 2.0], &[1.0, 3.0]).abs() < f64::EPSILON);
    }
}
