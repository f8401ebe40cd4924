//! Upper-tail trimming.
//!
//! Each dataset is trimmed against its own distribution, so two trimmed
//! datasets generally do not share a cutoff.

use crate::error::Result;
use crate::models::{Dataset, Datasets, EngagementRecord, Period};
use crate::stats;

#[derive(Debug, Clone)]
pub struct TrimOutcome<R> {
    pub dataset: Dataset<R>,
    pub cutoff: f64,
    pub removed: usize,
}

/// Keeps only records whose metric is strictly below the dataset's own
/// `threshold` quantile. The input is left untouched.
pub fn remove_outliers<R: Clone>(
    dataset: &Dataset<R>,
    metric: impl Fn(&R) -> f64,
    threshold: f64,
) -> Result<TrimOutcome<R>> {
    let cutoff = stats::quantile(dataset, &metric, threshold)?;
    let records: Vec<R> = dataset
        .records
        .iter()
        .filter(|record| metric(*record) < cutoff)
        .cloned()
        .collect();

    Ok(TrimOutcome {
        removed: dataset.len() - records.len(),
        dataset: Dataset::new(dataset.id, records),
        cutoff,
    })
}

/// Trims minutes watched in the four engagement datasets. The certificates
/// dataset is carried over unchanged.
pub fn trim_engagement(datasets: &Datasets, threshold: f64) -> Result<Datasets> {
    let trim = |dataset: &Dataset<EngagementRecord>| -> Result<Dataset<EngagementRecord>> {
        let outcome = remove_outliers(dataset, |r| r.minutes_watched, threshold)?;
        tracing::debug!(
            dataset = %dataset.id,
            cutoff = outcome.cutoff,
            removed = outcome.removed,
            kept = outcome.dataset.len(),
            "trimmed upper tail"
        );
        if outcome.dataset.is_empty() {
            tracing::warn!(dataset = %dataset.id, "every record was at or above the cutoff");
        }
        Ok(outcome.dataset)
    };

    Ok(Datasets {
        q2_2021: Period {
            free: trim(&datasets.q2_2021.free)?,
            paid: trim(&datasets.q2_2021.paid)?,
        },
        q2_2022: Period {
            free: trim(&datasets.q2_2022.free)?,
            paid: trim(&datasets.q2_2022.paid)?,
        },
        certificates: datasets.certificates.clone(),
    })
}
