use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use serde::de::DeserializeOwned;

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::models::{
    CertificateRecord, Dataset, DatasetId, Datasets, EngagementRecord, Period, Record,
};

pub fn load_dataset<R>(id: DatasetId, path: &Path) -> Result<Dataset<R>>
where
    R: Record + DeserializeOwned,
{
    let unavailable = |source: io::Error| AnalysisError::DataUnavailable {
        dataset: id,
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(unavailable)?;
    let dataset = read_dataset::<R, _>(id, file).map_err(|err| match err {
        AnalysisError::DataUnavailable { source, .. } => unavailable(source),
        other => other,
    })?;

    tracing::debug!(
        dataset = %id,
        records = dataset.len(),
        path = %path.display(),
        "loaded dataset"
    );
    Ok(dataset)
}

/// Parses headerless rows whose column order is fixed by `R::COLUMNS`.
pub fn read_dataset<R, T>(id: DatasetId, input: T) -> Result<Dataset<R>>
where
    R: Record + DeserializeOwned,
    T: Read,
{
    let headers = StringRecord::from(R::COLUMNS.to_vec());
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input);

    let mut records = Vec::new();
    let mut row = StringRecord::new();
    loop {
        let more = reader
            .read_record(&mut row)
            .map_err(|err| row_error(id, records.len(), err))?;
        if !more {
            break;
        }

        let line = row.position().map_or(records.len() as u64 + 1, |p| p.line());
        if row.len() != R::COLUMNS.len() {
            return Err(AnalysisError::SchemaMismatch {
                dataset: id,
                line,
                reason: format!(
                    "expected {} columns ({}), found {}",
                    R::COLUMNS.len(),
                    R::COLUMNS.join(", "),
                    row.len()
                ),
            });
        }

        let record: R = row
            .deserialize(Some(&headers))
            .map_err(|err| AnalysisError::SchemaMismatch {
                dataset: id,
                line,
                reason: err.to_string(),
            })?;

        let minutes = record.minutes_watched();
        if !minutes.is_finite() || minutes < 0.0 {
            return Err(AnalysisError::SchemaMismatch {
                dataset: id,
                line,
                reason: format!("minutes_watched must be a non-negative number, got {minutes}"),
            });
        }
        records.push(record);
    }

    Ok(Dataset::new(id, records))
}

fn row_error(id: DatasetId, rows_read: usize, err: csv::Error) -> AnalysisError {
    let line = err
        .position()
        .map_or(rows_read as u64 + 1, csv::Position::line);
    let reason = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(source) => AnalysisError::DataUnavailable {
            dataset: id,
            path: PathBuf::new(),
            source,
        },
        _ => AnalysisError::SchemaMismatch {
            dataset: id,
            line,
            reason,
        },
    }
}

/// Loads every dataset named in the configuration's source table.
pub fn load_all(config: &AnalysisConfig) -> Result<Datasets> {
    let engagement = |id: DatasetId| -> Result<Dataset<EngagementRecord>> {
        load_dataset(id, &source_path(config, id)?)
    };

    Ok(Datasets {
        q2_2021: Period {
            free: engagement(DatasetId::Q2_2021Free)?,
            paid: engagement(DatasetId::Q2_2021Paid)?,
        },
        q2_2022: Period {
            free: engagement(DatasetId::Q2_2022Free)?,
            paid: engagement(DatasetId::Q2_2022Paid)?,
        },
        certificates: load_dataset::<CertificateRecord>(
            DatasetId::Certificates,
            &source_path(config, DatasetId::Certificates)?,
        )?,
    })
}

fn source_path(config: &AnalysisConfig, id: DatasetId) -> Result<PathBuf> {
    config
        .sources
        .get(&id)
        .cloned()
        .ok_or_else(|| AnalysisError::DataUnavailable {
            dataset: id,
            path: PathBuf::new(),
            source: io::Error::new(io::ErrorKind::NotFound, "no source configured"),
        })
}
