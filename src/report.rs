use crate::models::{
    BucketCounts, CertificateRecord, Dataset, Datasets, EngagementBucket, EngagementLevelSummary,
    EngagementRecord, Percentiles, Record, StatisticsSummary,
};
use crate::pipeline::AnalysisResults;
use crate::stats::{self, PERCENTILE_POINTS};

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Non-finite values have no spreadsheet representation and become blanks.
    pub fn number(value: f64) -> Self {
        if value.is_finite() {
            Cell::Number(value)
        } else {
            Cell::Empty
        }
    }

    pub fn optional(value: Option<f64>) -> Self {
        value.map_or(Cell::Empty, Cell::number)
    }

    pub fn count(value: usize) -> Self {
        Cell::Number(value as f64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    fn new(name: impl Into<String>, header: &[&str]) -> Self {
        Self {
            name: name.into(),
            header: header.iter().map(|h| (*h).to_string()).collect(),
            rows: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

/// Percentage change from the 2021 value; `None` when the 2021 value is zero.
pub fn yoy_change(value_2021: f64, value_2022: f64) -> Option<f64> {
    if value_2021 == 0.0 {
        return None;
    }
    Some((value_2022 - value_2021) / value_2021 * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn build_workbook(results: &AnalysisResults, datasets: &Datasets) -> Workbook {
    let mut sheets = vec![
        summary_sheet(&results.summaries),
        yoy_sheet(datasets),
        buckets_sheet(&results.buckets),
        certificates_sheet(&results.engagement_levels),
    ];

    for dataset in datasets.engagement() {
        sheets.push(raw_sheet(dataset));
    }
    sheets.push(raw_sheet(&datasets.certificates));

    Workbook { sheets }
}

fn summary_sheet(summaries: &[StatisticsSummary]) -> Sheet {
    let mut header = vec![
        "Dataset",
        "Mean Minutes",
        "Median Minutes",
        "Std Dev",
        "Total Users",
        "Total Hours",
    ];
    let labels: Vec<String> = PERCENTILE_POINTS
        .iter()
        .map(|&p| Percentiles::label(p))
        .collect();
    header.extend(labels.iter().map(String::as_str));

    let mut sheet = Sheet::new("Summary Stats", &header);
    for summary in summaries {
        let mut row = vec![
            Cell::text(summary.dataset.as_str()),
            Cell::number(summary.mean),
            Cell::number(summary.median),
            Cell::optional(summary.std_dev),
            Cell::count(summary.count),
            Cell::number(summary.total_hours),
        ];
        row.extend(
            PERCENTILE_POINTS
                .iter()
                .map(|&p| Cell::optional(summary.percentiles.get(p))),
        );
        sheet.rows.push(row);
    }
    sheet
}

fn yoy_sheet(datasets: &Datasets) -> Sheet {
    let mean = |dataset: &Dataset<EngagementRecord>| {
        stats::mean(&dataset.minutes()).unwrap_or(f64::NAN)
    };
    let metrics = [
        (
            "Free Users Count",
            datasets.q2_2021.free.len() as f64,
            datasets.q2_2022.free.len() as f64,
        ),
        (
            "Free Avg Minutes",
            mean(&datasets.q2_2021.free),
            mean(&datasets.q2_2022.free),
        ),
        (
            "Paid Users Count",
            datasets.q2_2021.paid.len() as f64,
            datasets.q2_2022.paid.len() as f64,
        ),
        (
            "Paid Avg Minutes",
            mean(&datasets.q2_2021.paid),
            mean(&datasets.q2_2022.paid),
        ),
    ];

    let mut sheet = Sheet::new(
        "YoY Comparison",
        &["Metric", "Q2 2021", "Q2 2022", "YoY Change %"],
    );
    for (metric, value_2021, value_2022) in metrics {
        sheet.rows.push(vec![
            Cell::text(metric),
            Cell::number(value_2021),
            Cell::number(value_2022),
            Cell::optional(yoy_change(value_2021, value_2022)),
        ]);
    }
    sheet
}

fn buckets_sheet(buckets: &[BucketCounts]) -> Sheet {
    let mut header = vec!["Bucket"];
    header.extend(buckets.iter().map(|b| b.dataset.as_str()));

    let mut sheet = Sheet::new("Engagement Buckets", &header);
    for (index, bucket) in EngagementBucket::ALL.iter().enumerate() {
        let mut row = vec![Cell::text(bucket.label())];
        row.extend(buckets.iter().map(|b| Cell::count(b.counts[index])));
        sheet.rows.push(row);
    }
    sheet
}

fn certificates_sheet(levels: &[EngagementLevelSummary]) -> Sheet {
    let mut sheet = Sheet::new(
        "Certificates Analysis",
        &[
            "Engagement Level",
            "certificates_issued count",
            "certificates_issued mean",
            "certificates_issued sum",
            "minutes_watched mean",
            "minutes_watched median",
        ],
    );
    for level in levels {
        sheet.rows.push(vec![
            Cell::text(level.level.label()),
            Cell::count(level.certificates_count),
            Cell::optional(level.certificates_mean.map(round2)),
            Cell::number(level.certificates_sum as f64),
            Cell::optional(level.minutes_mean.map(round2)),
            Cell::optional(level.minutes_median.map(round2)),
        ]);
    }
    sheet
}

/// Rendering of one record as a raw-data row.
pub trait RawRow {
    fn cells(&self) -> Vec<Cell>;
}

fn student_cell(student_id: &str) -> Cell {
    match student_id.parse::<f64>() {
        Ok(value) if value.is_finite() => Cell::Number(value),
        _ => Cell::text(student_id),
    }
}

impl RawRow for EngagementRecord {
    fn cells(&self) -> Vec<Cell> {
        vec![
            student_cell(&self.student_id),
            Cell::number(self.minutes_watched),
            Cell::Number(if self.paid_in_q2 { 1.0 } else { 0.0 }),
        ]
    }
}

impl RawRow for CertificateRecord {
    fn cells(&self) -> Vec<Cell> {
        vec![
            student_cell(&self.student_id),
            Cell::number(self.minutes_watched),
            Cell::Number(f64::from(self.certificates_issued)),
        ]
    }
}

fn raw_sheet<R: RawRow + Record>(dataset: &Dataset<R>) -> Sheet {
    let mut sheet = Sheet::new(format!("Raw_{}", dataset.id), R::COLUMNS);
    sheet.rows = dataset.records.iter().map(RawRow::cells).collect();
    sheet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DatasetId, Period};
    use crate::pipeline;

    fn engagement(id: DatasetId, minutes: &[f64]) -> Dataset<EngagementRecord> {
        Dataset::new(
            id,
            minutes
                .iter()
                .enumerate()
                .map(|(i, &m)| EngagementRecord {
                    student_id: (i + 1).to_string(),
                    minutes_watched: m,
                    paid_in_q2: matches!(id, DatasetId::Q2_2021Paid | DatasetId::Q2_2022Paid),
                })
                .collect(),
        )
    }

    fn sample_datasets() -> Datasets {
        let certificates = (1..=20u32)
            .map(|i| CertificateRecord {
                student_id: format!("c{i}"),
                minutes_watched: f64::from(i) * 60.0,
                certificates_issued: i / 4,
            })
            .collect();
        Datasets {
            q2_2021: Period {
                free: engagement(DatasetId::Q2_2021Free, &[30.0, 90.0, 200.0, 700.0]),
                paid: engagement(DatasetId::Q2_2021Paid, &[100.0, 300.0, 650.0]),
            },
            q2_2022: Period {
                free: engagement(DatasetId::Q2_2022Free, &[45.0, 60.0, 150.0, 900.0, 20.0]),
                paid: engagement(DatasetId::Q2_2022Paid, &[100.0, 500.0, 700.0, 800.0]),
            },
            certificates: Dataset::new(DatasetId::Certificates, certificates),
        }
    }

    fn find_sheet<'a>(workbook: &'a Workbook, name: &str) -> &'a Sheet {
        workbook
            .sheets
            .iter()
            .find(|sheet| sheet.name == name)
            .unwrap()
    }

    fn sample_workbook() -> Workbook {
        let datasets = sample_datasets();
        let config = crate::config::AnalysisConfig::new("data", "out");
        let results = pipeline::analyze(&datasets, &config).unwrap();
        build_workbook(&results, &datasets)
    }

    #[test]
    fn yoy_change_is_relative_to_2021() {
        assert!((yoy_change(50.0, 75.0).unwrap() - 50.0).abs() < 1e-12);
        assert!((yoy_change(4.0, 3.0).unwrap() + 25.0).abs() < 1e-12);
        assert!(yoy_change(0.0, 3.0).is_none());
    }

    #[test]
    fn workbook_has_every_sheet_in_order() {
        let workbook = sample_workbook();
        let names: Vec<&str> = workbook.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "Summary Stats",
                "YoY Comparison",
                "Engagement Buckets",
                "Certificates Analysis",
                "Raw_q2_2021_paid_0",
                "Raw_q2_2021_paid_1",
                "Raw_q2_2022_paid_0",
                "Raw_q2_2022_paid_1",
                "Raw_certificates",
            ]
        );
    }

    #[test]
    fn summary_sheet_has_one_row_per_engagement_dataset() {
        let workbook = sample_workbook();
        let sheet = find_sheet(&workbook, "Summary Stats");
        assert_eq!(sheet.header.len(), 11);
        assert_eq!(sheet.header[6], "10th");
        assert_eq!(sheet.header[10], "90th");
        assert_eq!(sheet.rows.len(), 4);
        assert_eq!(sheet.rows[0][0], Cell::text("q2_2021_paid_0"));
        assert_eq!(sheet.rows[0][4], Cell::Number(4.0));
        assert!(sheet.rows.iter().all(|row| row.len() == sheet.header.len()));
    }

    #[test]
    fn yoy_sheet_compares_counts_and_means() {
        let workbook = sample_workbook();
        let sheet = find_sheet(&workbook, "YoY Comparison");
        assert_eq!(sheet.rows.len(), 4);
        assert_eq!(sheet.rows[0][0], Cell::text("Free Users Count"));
        assert_eq!(sheet.rows[0][1], Cell::Number(4.0));
        assert_eq!(sheet.rows[0][2], Cell::Number(5.0));
        assert_eq!(sheet.rows[0][3], Cell::Number(25.0));
    }

    #[test]
    fn bucket_sheet_columns_follow_datasets() {
        let workbook = sample_workbook();
        let sheet = find_sheet(&workbook, "Engagement Buckets");
        assert_eq!(
            sheet.header,
            ["Bucket", "q2_2021_paid_0", "q2_2021_paid_1", "q2_2022_paid_0", "q2_2022_paid_1"]
        );
        let labels: Vec<&Cell> = sheet.rows.iter().map(|row| &row[0]).collect();
        assert_eq!(
            labels,
            [
                &Cell::text("0-1hr"),
                &Cell::text("1-3hrs"),
                &Cell::text("3-10hrs"),
                &Cell::text("10+hrs")
            ]
        );
        // 30, 90, 200 and 700 minutes land in one bucket each.
        assert_eq!(sheet.rows[0][1], Cell::Number(1.0));
        assert_eq!(sheet.rows[3][1], Cell::Number(1.0));
    }

    #[test]
    fn certificates_sheet_is_rounded() {
        let workbook = sample_workbook();
        let sheet = find_sheet(&workbook, "Certificates Analysis");
        assert_eq!(sheet.rows.len(), 4);
        for row in &sheet.rows {
            for cell in &row[1..] {
                if let Cell::Number(value) = cell {
                    assert!(((value * 100.0).round() - value * 100.0).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn raw_sheets_carry_records() {
        let workbook = sample_workbook();
        let sheet = find_sheet(&workbook, "Raw_q2_2021_paid_1");
        assert_eq!(sheet.header, ["student_id", "minutes_watched", "paid_in_q2"]);
        assert_eq!(
            sheet.rows[0],
            vec![Cell::Number(1.0), Cell::Number(100.0), Cell::Number(1.0)]
        );
        let certificates = find_sheet(&workbook, "Raw_certificates");
        assert_eq!(certificates.rows.len(), 20);
        assert_eq!(certificates.rows[0][0], Cell::text("c1"));
    }
}
