pub(crate) mod analysis;
pub(crate) mod boundaries;
pub(crate) mod regions;

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use encoding_rs::Encoding;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KpxError {
    #[error("failed to read input file: {0}")]
    Io(#[from] std::io::Error),
    #[error("file is not valid {0}")]
    Encoding(&'static str),
    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid trade date: {0}")]
    InvalidDate(String),
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// One row of the KPX export, with its original column names.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "거래일자")]
    trade_date: String,
    /// 1-based hour slot within the trade date (1..=24).
    #[serde(rename = "거래시간")]
    trade_hour: i64,
    #[serde(rename = "지역")]
    region: String,
    #[serde(rename = "연료원")]
    fuel_type: String,
    #[serde(rename = "전력거래량(MWh)")]
    volume_mwh: f64,
}

/// A single hourly generation observation after loading.
#[derive(Debug, Clone)]
pub struct GenerationRecord {
    /// Canonical region name (see [`regions`]).
    pub region: String,
    /// `trade_date + (trade_hour - 1)` hours, local wall-clock.
    pub timestamp: NaiveDateTime,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    /// Raw fuel label from the export, e.g. `태양광` or `풍력`.
    pub fuel_type: String,
    pub volume_mwh: f64,
}

/// The full loaded dataset, immutable after loading.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub records: Vec<GenerationRecord>,
    /// Distinct canonical region names observed in `records`, sorted.
    /// Universal join key for the aggregated views.
    pub regions: Vec<String>,
}

/// Read and decode the KPX CSV at `path`, then parse it into a [`Dataset`].
///
/// The 2024 export is CP949-encoded; pass `encoding_rs::EUC_KR`. Bytes that
/// do not decode under the given encoding fail the load rather than
/// corrupting region names.
pub fn load_dataset(path: &Path, encoding: &'static Encoding) -> Result<Dataset, KpxError> {
    let bytes = std::fs::read(path)?;
    let (text, _, had_errors) = encoding.decode(&bytes);
    if had_errors {
        return Err(KpxError::Encoding(encoding.name()));
    }
    parse_dataset(&text)
}

/// Parse decoded CSV text into a [`Dataset`].
///
/// Drops the mainland sentinel rows, canonicalizes region names and derives
/// the timestamp fields. `trade_hour` is not range-checked; out-of-range
/// slots simply derive into the neighboring day.
pub fn parse_dataset(text: &str) -> Result<Dataset, KpxError> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());

    let mut records = Vec::new();
    for row in reader.deserialize::<RawRow>() {
        let row = row?;
        if regions::is_sentinel(&row.region) {
            continue;
        }

        let date = parse_trade_date(&row.trade_date)?;
        let timestamp = date.and_time(NaiveTime::MIN) + Duration::hours(row.trade_hour - 1);

        records.push(GenerationRecord {
            region: regions::canonical_name(&row.region).to_string(),
            timestamp,
            month: timestamp.month(),
            day: timestamp.day(),
            hour: timestamp.hour(),
            fuel_type: row.fuel_type,
            volume_mwh: row.volume_mwh,
        });
    }

    let regions = records
        .iter()
        .map(|r| r.region.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    Ok(Dataset { records, regions })
}

fn parse_trade_date(raw: &str) -> Result<NaiveDate, KpxError> {
    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Ok(date);
        }
    }
    Err(KpxError::InvalidDate(raw.to_string()))
}
