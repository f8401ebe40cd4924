use std::fmt;

use serde::{Deserialize, Deserializer};

/// Identifier of one of the five fixed input datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub enum DatasetId {
    #[serde(rename = "q2_2021_paid_0")]
    Q2_2021Free,
    #[serde(rename = "q2_2021_paid_1")]
    Q2_2021Paid,
    #[serde(rename = "q2_2022_paid_0")]
    Q2_2022Free,
    #[serde(rename = "q2_2022_paid_1")]
    Q2_2022Paid,
    #[serde(rename = "certificates")]
    Certificates,
}

impl DatasetId {
    pub const ALL: [DatasetId; 5] = [
        DatasetId::Q2_2021Free,
        DatasetId::Q2_2021Paid,
        DatasetId::Q2_2022Free,
        DatasetId::Q2_2022Paid,
        DatasetId::Certificates,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DatasetId::Q2_2021Free => "q2_2021_paid_0",
            DatasetId::Q2_2021Paid => "q2_2021_paid_1",
            DatasetId::Q2_2022Free => "q2_2022_paid_0",
            DatasetId::Q2_2022Paid => "q2_2022_paid_1",
            DatasetId::Certificates => "certificates",
        }
    }

    /// File name of the source inside the default data directory.
    pub fn default_file_name(self) -> &'static str {
        match self {
            DatasetId::Q2_2021Free => "minutes_watched_2021_paid_0.csv",
            DatasetId::Q2_2021Paid => "minutes_watched_2021_paid_1.csv",
            DatasetId::Q2_2022Free => "minutes_watched_2022_paid_0.csv",
            DatasetId::Q2_2022Paid => "minutes_watched_2022_paid_1.csv",
            DatasetId::Certificates => "minutes_and_certificates.csv",
        }
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTier {
    Free,
    Paid,
}

impl PaymentTier {
    pub const ALL: [PaymentTier; 2] = [PaymentTier::Free, PaymentTier::Paid];

    pub fn label(self) -> &'static str {
        match self {
            PaymentTier::Free => "Free",
            PaymentTier::Paid => "Paid",
        }
    }
}

/// Column access shared by both record kinds.
pub trait Record: Clone {
    /// Column names in file order; input files carry no header row.
    const COLUMNS: &'static [&'static str];

    fn student_id(&self) -> &str;
    fn minutes_watched(&self) -> f64;
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngagementRecord {
    pub student_id: String,
    pub minutes_watched: f64,
    #[serde(deserialize_with = "flag_from_int")]
    pub paid_in_q2: bool,
}

impl Record for EngagementRecord {
    const COLUMNS: &'static [&'static str] = &["student_id", "minutes_watched", "paid_in_q2"];

    fn student_id(&self) -> &str {
        &self.student_id
    }

    fn minutes_watched(&self) -> f64 {
        self.minutes_watched
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CertificateRecord {
    pub student_id: String,
    pub minutes_watched: f64,
    pub certificates_issued: u32,
}

impl Record for CertificateRecord {
    const COLUMNS: &'static [&'static str] =
        &["student_id", "minutes_watched", "certificates_issued"];

    fn student_id(&self) -> &str {
        &self.student_id
    }

    fn minutes_watched(&self) -> f64 {
        self.minutes_watched
    }
}

fn flag_from_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match u8::deserialize(deserializer)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(serde::de::Error::custom(format!(
            "paid_in_q2 must be 0 or 1, got {other}"
        ))),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset<R> {
    pub id: DatasetId,
    pub records: Vec<R>,
}

impl<R> Dataset<R> {
    pub fn new(id: DatasetId, records: Vec<R>) -> Self {
        Self { id, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<R: Record> Dataset<R> {
    pub fn minutes(&self) -> Vec<f64> {
        self.records.iter().map(Record::minutes_watched).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Period {
    pub free: Dataset<EngagementRecord>,
    pub paid: Dataset<EngagementRecord>,
}

/// All five datasets of one run.
#[derive(Debug, Clone)]
pub struct Datasets {
    pub q2_2021: Period,
    pub q2_2022: Period,
    pub certificates: Dataset<CertificateRecord>,
}

impl Datasets {
    /// Engagement datasets in report order.
    pub fn engagement(&self) -> [&Dataset<EngagementRecord>; 4] {
        [
            &self.q2_2021.free,
            &self.q2_2021.paid,
            &self.q2_2022.free,
            &self.q2_2022.paid,
        ]
    }

    /// The (2021, 2022) pair for a payment tier.
    pub fn tier(
        &self,
        tier: PaymentTier,
    ) -> (&Dataset<EngagementRecord>, &Dataset<EngagementRecord>) {
        match tier {
            PaymentTier::Free => (&self.q2_2021.free, &self.q2_2022.free),
            PaymentTier::Paid => (&self.q2_2021.paid, &self.q2_2022.paid),
        }
    }
}

/// Values at fixed percentile points, in ascending order of the point.
#[derive(Debug, Clone, PartialEq)]
pub struct Percentiles {
    pub values: Vec<(u8, f64)>,
}

impl Percentiles {
    pub fn get(&self, point: u8) -> Option<f64> {
        self.values
            .iter()
            .find(|(p, _)| *p == point)
            .map(|(_, value)| *value)
    }

    pub fn label(point: u8) -> String {
        format!("{point}th")
    }
}

#[derive(Debug, Clone)]
pub struct StatisticsSummary {
    pub dataset: DatasetId,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; `None` below two records.
    pub std_dev: Option<f64>,
    pub count: usize,
    pub total_hours: f64,
    pub percentiles: Percentiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementBucket {
    UpToOneHour,
    OneToThreeHours,
    ThreeToTenHours,
    TenPlusHours,
}

impl EngagementBucket {
    pub const ALL: [EngagementBucket; 4] = [
        EngagementBucket::UpToOneHour,
        EngagementBucket::OneToThreeHours,
        EngagementBucket::ThreeToTenHours,
        EngagementBucket::TenPlusHours,
    ];

    pub fn label(self) -> &'static str {
        match self {
            EngagementBucket::UpToOneHour => "0-1hr",
            EngagementBucket::OneToThreeHours => "1-3hrs",
            EngagementBucket::ThreeToTenHours => "3-10hrs",
            EngagementBucket::TenPlusHours => "10+hrs",
        }
    }

    /// Bins are half-open `(a, b]` on edges 0, 60, 180, 600; zero falls in the first bin.
    pub fn for_minutes(minutes: f64) -> Self {
        if minutes <= 60.0 {
            EngagementBucket::UpToOneHour
        } else if minutes <= 180.0 {
            EngagementBucket::OneToThreeHours
        } else if minutes <= 600.0 {
            EngagementBucket::ThreeToTenHours
        } else {
            EngagementBucket::TenPlusHours
        }
    }
}

#[derive(Debug, Clone)]
pub struct BucketCounts {
    pub dataset: DatasetId,
    /// Indexed in `EngagementBucket::ALL` order.
    pub counts: [usize; 4],
}

impl BucketCounts {
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl EngagementLevel {
    pub const ALL: [EngagementLevel; 4] = [
        EngagementLevel::Low,
        EngagementLevel::Medium,
        EngagementLevel::High,
        EngagementLevel::VeryHigh,
    ];

    pub fn label(self) -> &'static str {
        match self {
            EngagementLevel::Low => "Low",
            EngagementLevel::Medium => "Medium",
            EngagementLevel::High => "High",
            EngagementLevel::VeryHigh => "Very High",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngagementLevelSummary {
    pub level: EngagementLevel,
    pub certificates_count: usize,
    pub certificates_mean: Option<f64>,
    pub certificates_sum: u64,
    pub minutes_mean: Option<f64>,
    pub minutes_median: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TTestResult {
    pub tier: PaymentTier,
    pub statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: f64,
    pub mean_2021: f64,
    pub mean_2022: f64,
}

#[derive(Debug, Clone)]
pub struct DependencyResult {
    pub tier: PaymentTier,
    pub p_2021: f64,
    pub p_2022: f64,
    pub p_2022_given_2021: f64,
    pub independent: bool,
    pub students_2021: usize,
    pub students_2022: usize,
    pub retained: usize,
    pub union: usize,
}

#[derive(Debug, Clone)]
pub struct RegressionResult {
    pub slope: f64,
    pub intercept: f64,
    pub r2_score: f64,
    pub prediction_minutes: f64,
    pub prediction: f64,
    pub train_size: usize,
    pub test_size: usize,
}
