use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::kpx::{Dataset, GenerationRecord};

/// Fuel labels as they appear in the KPX export.
pub const SOLAR_LABEL: &str = "태양광";
pub const WIND_LABEL: &str = "풍력";
/// The "all sources" choice offered alongside the two fuel labels.
pub const AGGREGATE_LABEL: &str = "합계";

/// Energy-source filter choice, independent of the time cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceSelection {
    Solar,
    Wind,
    #[default]
    Aggregate,
}

impl SourceSelection {
    /// Parse a selector value. Accepts the Korean labels and their English
    /// aliases; anything else is a caller error.
    pub fn parse(raw: &str) -> Option<SourceSelection> {
        match raw {
            SOLAR_LABEL | "solar" => Some(SourceSelection::Solar),
            WIND_LABEL | "wind" => Some(SourceSelection::Wind),
            AGGREGATE_LABEL | "all" => Some(SourceSelection::Aggregate),
            _ => None,
        }
    }

    /// Fuel label this selection filters on; `None` means no fuel predicate.
    pub fn fuel_label(self) -> Option<&'static str> {
        match self {
            SourceSelection::Solar => Some(SOLAR_LABEL),
            SourceSelection::Wind => Some(WIND_LABEL),
            SourceSelection::Aggregate => None,
        }
    }

    pub fn label(self) -> &'static str {
        self.fuel_label().unwrap_or(AGGREGATE_LABEL)
    }
}

/// The four filter choices. `None` on a time dimension means "aggregate"
/// (no predicate for that dimension).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub hour: Option<u32>,
    pub source: SourceSelection,
}

impl Selection {
    /// Enforce the selector cascade: a concrete day is only meaningful under
    /// a concrete month, a concrete hour only under a concrete month and day.
    /// Lower selections are forced back to aggregate otherwise.
    pub fn normalized(self) -> Selection {
        let month = self.month;
        let day = month.and(self.day);
        let hour = day.and(self.hour);
        Selection {
            month,
            day,
            hour,
            source: self.source,
        }
    }

    fn matches(&self, record: &GenerationRecord) -> bool {
        self.month.is_none_or(|m| record.month == m)
            && self.day.is_none_or(|d| record.day == d)
            && self.hour.is_none_or(|h| record.hour == h)
            && self
                .source
                .fuel_label()
                .is_none_or(|fuel| record.fuel_type == fuel)
    }
}

/// Total volume for one canonical region.
#[derive(Debug, Clone, Serialize)]
pub struct RegionTotal {
    pub region: String,
    pub volume_mwh: f64,
}

/// Total volume for one (timestamp, region) pair.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesPoint {
    pub timestamp: NaiveDateTime,
    pub region: String,
    pub volume_mwh: f64,
}

/// Total volume for one (hour, region) pair.
#[derive(Debug, Clone, Serialize)]
pub struct HourlyVolume {
    pub hour: u32,
    pub region: String,
    pub volume_mwh: f64,
}

impl Dataset {
    /// Distinct months present in the full dataset, sorted.
    pub fn month_options(&self) -> Vec<u32> {
        distinct_sorted(self.records.iter().map(|r| r.month))
    }

    /// Distinct days present in the given month, sorted. Recomputed from the
    /// current month selection so stale options are never offered.
    pub fn day_options(&self, month: u32) -> Vec<u32> {
        distinct_sorted(
            self.records
                .iter()
                .filter(|r| r.month == month)
                .map(|r| r.day),
        )
    }

    /// Distinct hours present in the given month and day, sorted.
    pub fn hour_options(&self, month: u32, day: u32) -> Vec<u32> {
        distinct_sorted(
            self.records
                .iter()
                .filter(|r| r.month == month && r.day == day)
                .map(|r| r.hour),
        )
    }

    fn filtered(&self, selection: Selection) -> impl Iterator<Item = &GenerationRecord> {
        self.records.iter().filter(move |r| selection.matches(r))
    }

    /// Sum of `volume_mwh` over the records matching `selection`.
    pub fn filtered_total(&self, selection: Selection) -> f64 {
        self.filtered(selection.normalized())
            .map(|r| r.volume_mwh)
            .sum()
    }

    /// Per-region totals over the filtered subset: one row per canonical
    /// region, in region order, with regions absent from the filtered subset
    /// carried at 0.0.
    pub fn region_totals(&self, selection: Selection) -> Vec<RegionTotal> {
        let selection = selection.normalized();
        let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
        for record in self.filtered(selection) {
            *sums.entry(record.region.as_str()).or_insert(0.0) += record.volume_mwh;
        }

        self.regions
            .iter()
            .map(|region| RegionTotal {
                region: region.clone(),
                volume_mwh: sums.get(region.as_str()).copied().unwrap_or(0.0),
            })
            .collect()
    }

    /// Per-(timestamp, region) totals over the filtered subset. Only
    /// observed pairs appear, ordered by timestamp then region.
    pub fn time_series(&self, selection: Selection) -> Vec<SeriesPoint> {
        let selection = selection.normalized();
        let mut sums: BTreeMap<(NaiveDateTime, &str), f64> = BTreeMap::new();
        for record in self.filtered(selection) {
            *sums
                .entry((record.timestamp, record.region.as_str()))
                .or_insert(0.0) += record.volume_mwh;
        }

        sums.into_iter()
            .map(|((timestamp, region), volume_mwh)| SeriesPoint {
                timestamp,
                region: region.to_string(),
                volume_mwh,
            })
            .collect()
    }

    /// Per-(hour, region) totals over the filtered subset, ordered by hour
    /// then region. Only defined while the hour selection is aggregate;
    /// returns `None` for a concrete hour.
    ///
    /// Unlike [`Dataset::region_totals`], rows are anchored on the grouped
    /// result: regions with no matching records in an hour are absent, not
    /// zero-filled.
    pub fn hourly_by_region(&self, selection: Selection) -> Option<Vec<HourlyVolume>> {
        let selection = selection.normalized();
        if selection.hour.is_some() {
            return None;
        }

        let mut sums: BTreeMap<(u32, &str), f64> = BTreeMap::new();
        for record in self.filtered(selection) {
            *sums
                .entry((record.hour, record.region.as_str()))
                .or_insert(0.0) += record.volume_mwh;
        }

        Some(
            sums.into_iter()
                .map(|((hour, region), volume_mwh)| HourlyVolume {
                    hour,
                    region: region.to_string(),
                    volume_mwh,
                })
                .collect(),
        )
    }
}

fn distinct_sorted(values: impl Iterator<Item = u32>) -> Vec<u32> {
    let mut distinct: Vec<u32> = values.collect();
    distinct.sort_unstable();
    distinct.dedup();
    distinct
}
