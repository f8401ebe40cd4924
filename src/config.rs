use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context};
use serde::Deserialize;

use crate::hypothesis::TTestVariant;
use crate::models::DatasetId;

pub const WORKBOOK_FILE: &str = "engagement_analysis.xlsx";
pub const DISTRIBUTIONS_CHART_FILE: &str = "engagement_distributions.png";
pub const CORRELATION_CHART_FILE: &str = "certificates_correlation.png";

pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 0.99;
pub const DEFAULT_SPLIT_SEED: u64 = 365;
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;
pub const DEFAULT_PREDICTION_MINUTES: f64 = 1200.0;
pub const DEFAULT_INDEPENDENCE_TOLERANCE: f64 = 0.05;
pub const DEFAULT_HISTOGRAM_BINS: usize = 50;

/// Everything one run needs, passed explicitly through the pipeline.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub sources: BTreeMap<DatasetId, PathBuf>,
    pub out_dir: PathBuf,
    pub outlier_threshold: f64,
    pub split_seed: u64,
    pub test_fraction: f64,
    pub prediction_minutes: f64,
    pub independence_tolerance: f64,
    pub t_test: TTestVariant,
    pub histogram_bins: usize,
}

impl AnalysisConfig {
    /// Default source table rooted at `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>, out_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.as_ref();
        let sources = DatasetId::ALL
            .into_iter()
            .map(|id| (id, data_dir.join(id.default_file_name())))
            .collect();

        Self {
            sources,
            out_dir: out_dir.into(),
            outlier_threshold: DEFAULT_OUTLIER_THRESHOLD,
            split_seed: DEFAULT_SPLIT_SEED,
            test_fraction: DEFAULT_TEST_FRACTION,
            prediction_minutes: DEFAULT_PREDICTION_MINUTES,
            independence_tolerance: DEFAULT_INDEPENDENCE_TOLERANCE,
            t_test: TTestVariant::default(),
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
        }
    }

    /// Reads a JSON config file and layers it over the defaults for `data_dir`.
    ///
    /// Relative paths inside the file resolve against the file's own directory.
    pub fn from_file(
        path: &Path,
        data_dir: impl AsRef<Path>,
        out_dir: impl Into<PathBuf>,
    ) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let file: ConfigFile = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(file.apply(base, Self::new(data_dir, out_dir)))
    }

    pub fn workbook_path(&self) -> PathBuf {
        self.out_dir.join(WORKBOOK_FILE)
    }

    pub fn distributions_chart_path(&self) -> PathBuf {
        self.out_dir.join(DISTRIBUTIONS_CHART_FILE)
    }

    pub fn correlation_chart_path(&self) -> PathBuf {
        self.out_dir.join(CORRELATION_CHART_FILE)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.outlier_threshold > 0.0 && self.outlier_threshold <= 1.0,
            "outlier threshold must be in (0, 1], got {}",
            self.outlier_threshold
        );
        ensure!(
            self.test_fraction > 0.0 && self.test_fraction < 1.0,
            "test fraction must be in (0, 1), got {}",
            self.test_fraction
        );
        ensure!(
            self.independence_tolerance >= 0.0,
            "independence tolerance must be non-negative"
        );
        ensure!(self.histogram_bins > 0, "histogram needs at least one bin");
        for id in DatasetId::ALL {
            ensure!(
                self.sources.contains_key(&id),
                "no source configured for dataset {id}"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    #[serde(default)]
    sources: BTreeMap<DatasetId, PathBuf>,
    outlier_threshold: Option<f64>,
    split_seed: Option<u64>,
    test_fraction: Option<f64>,
    prediction_minutes: Option<f64>,
    independence_tolerance: Option<f64>,
    t_test: Option<TTestVariant>,
    histogram_bins: Option<usize>,
}

impl ConfigFile {
    fn apply(self, base: &Path, defaults: AnalysisConfig) -> AnalysisConfig {
        let mut config = match self.data_dir {
            Some(data_dir) => AnalysisConfig::new(base.join(data_dir), defaults.out_dir.clone()),
            None => defaults,
        };

        for (id, path) in self.sources {
            config.sources.insert(id, base.join(path));
        }
        if let Some(out_dir) = self.out_dir {
            config.out_dir = base.join(out_dir);
        }
        if let Some(value) = self.outlier_threshold {
            config.outlier_threshold = value;
        }
        if let Some(value) = self.split_seed {
            config.split_seed = value;
        }
        if let Some(value) = self.test_fraction {
            config.test_fraction = value;
        }
        if let Some(value) = self.prediction_minutes {
            config.prediction_minutes = value;
        }
        if let Some(value) = self.independence_tolerance {
            config.independence_tolerance = value;
        }
        if let Some(value) = self.t_test {
            config.t_test = value;
        }
        if let Some(value) = self.histogram_bins {
            config.histogram_bins = value;
        }
        config
    }
}
