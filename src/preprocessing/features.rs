//! Feature and label construction
//!
//! Turns cleaned stop events into the modeling table: four predictors
//! (train type, delay at arrival, planned departure hour, station stop
//! count) and the binary `is_late` label.

use super::cleaning::CleanedRecord;
use crate::error::{PunctualityError, Result};
use crate::utils::{mean, quantile};
use chrono::Timelike;
use ndarray::Array1;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::info;

/// Accrued delay (seconds) above which a stop counts as late
pub const LATE_THRESHOLD_SECS: f64 = 60.0;

/// Predictor names in model-matrix order
pub const PREDICTORS: [&str; 4] = ["train_type", "delay_in", "planned_dep_hour", "station_stops"];

/// Service category derived from the relation code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TrainType {
    InterCity,
    International,
    Local,
    PeakExtra,
}

impl TrainType {
    /// Level order used for encoding
    pub const ALL: [TrainType; 4] = [
        TrainType::InterCity,
        TrainType::International,
        TrainType::Local,
        TrainType::PeakExtra,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrainType::InterCity => "InterCity",
            TrainType::International => "International",
            TrainType::Local => "Local",
            TrainType::PeakExtra => "Peak/Extra",
        }
    }

    /// Position in [`TrainType::ALL`]
    pub fn code(&self) -> usize {
        match self {
            TrainType::InterCity => 0,
            TrainType::International => 1,
            TrainType::Local => 2,
            TrainType::PeakExtra => 3,
        }
    }
}

impl std::fmt::Display for TrainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered relation-code rules; the first match wins
#[derive(Debug, Clone)]
pub struct TrainTypeRules {
    international: Regex,
    peak_extra: Regex,
    intercity: Regex,
}

impl TrainTypeRules {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| PunctualityError::PreprocessingError(e.to_string()))
        };
        Ok(Self {
            international: compile(r"^(EUR|ICE|INT|THAL|TGV|ICT)")?,
            peak_extra: compile(r"^P[0-9 ]|EXTRA")?,
            intercity: compile(r"IC")?,
        })
    }

    /// Classify a relation code such as `IC 01`, `P 7301` or `THAL`
    pub fn classify(&self, relation: &str) -> TrainType {
        let code = relation.trim().to_uppercase();
        if self.international.is_match(&code) {
            TrainType::International
        } else if self.peak_extra.is_match(&code) {
            TrainType::PeakExtra
        } else if self.intercity.is_match(&code) {
            TrainType::InterCity
        } else {
            TrainType::Local
        }
    }
}

/// Coarse time-of-day bucket of the planned departure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DayPeriod {
    Morning,
    MidDay,
    Afternoon,
    Night,
}

impl DayPeriod {
    pub const ALL: [DayPeriod; 4] = [
        DayPeriod::Morning,
        DayPeriod::MidDay,
        DayPeriod::Afternoon,
        DayPeriod::Night,
    ];

    /// 4-10 Morning, 11-15 Mid-day, 16-20 Afternoon, otherwise Night
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            4..=10 => DayPeriod::Morning,
            11..=15 => DayPeriod::MidDay,
            16..=20 => DayPeriod::Afternoon,
            _ => DayPeriod::Night,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayPeriod::Morning => "Morning",
            DayPeriod::MidDay => "Mid-day",
            DayPeriod::Afternoon => "Afternoon",
            DayPeriod::Night => "Night",
        }
    }
}

/// Cleaned record plus derived delays and categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineeredRecord {
    pub train_no: String,
    pub operator: String,
    pub station: String,
    pub delay_in: f64,
    pub delay_out: f64,
    pub accrued_delay: f64,
    pub train_type: TrainType,
    pub planned_dep_hour: u32,
    pub day_period: DayPeriod,
}

/// One row of the modeling table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelingRecord {
    pub train_type: TrainType,
    pub delay_in: f64,
    pub planned_dep_hour: u32,
    pub station_stops: usize,
    pub is_late: bool,
    // kept for error analysis only
    pub station: String,
    pub train_no: String,
    pub operator: String,
    pub delay_out: f64,
    pub accrued_delay: f64,
    pub day_period: DayPeriod,
}

/// The modeling table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelingTable {
    pub records: Vec<ModelingRecord>,
}

impl ModelingTable {
    pub fn new(records: Vec<ModelingRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Labels as 0/1 for the given rows
    pub fn labels(&self, indices: &[usize]) -> Array1<f64> {
        indices
            .iter()
            .map(|&i| if self.records[i].is_late { 1.0 } else { 0.0 })
            .collect()
    }

    /// Labels of every row
    pub fn all_labels(&self) -> Array1<f64> {
        self.records
            .iter()
            .map(|r| if r.is_late { 1.0 } else { 0.0 })
            .collect()
    }

    /// Share of late rows
    pub fn prevalence(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        self.records.iter().filter(|r| r.is_late).count() as f64 / self.records.len() as f64
    }
}

/// Accrued-delay summary for one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub group: String,
    pub n: usize,
    pub mean: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
}

/// Row accounting and exploratory tables for the feature stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureReport {
    pub input_rows: usize,
    pub dropped_missing_departure_delay: usize,
    pub dropped_missing_arrival_delay: usize,
    pub dropped_missing_planned_departure: usize,
    pub output_rows: usize,
    pub late_rows: usize,
    pub prevalence: f64,
    pub n_stations: usize,
    pub by_train_type: Vec<GroupSummary>,
    pub by_day_period: Vec<GroupSummary>,
}

enum Rejection {
    MissingDepartureDelay,
    MissingArrivalDelay,
    MissingPlannedDeparture,
}

/// Builds engineered records and the modeling table
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    rules: TrainTypeRules,
}

impl FeatureBuilder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            rules: TrainTypeRules::new()?,
        })
    }

    fn engineer(&self, record: &CleanedRecord) -> std::result::Result<EngineeredRecord, Rejection> {
        let delay_out = record
            .delay_departure
            .ok_or(Rejection::MissingDepartureDelay)?;

        let delay_in = match (record.planned_arrival, record.delay_arrival) {
            (None, _) => 0.0,
            (Some(_), Some(delay)) => delay,
            (Some(_), None) => return Err(Rejection::MissingArrivalDelay),
        };

        let planned_dep_hour = record
            .planned_departure
            .ok_or(Rejection::MissingPlannedDeparture)?
            .hour();

        Ok(EngineeredRecord {
            train_no: record.train_no.clone(),
            operator: record.operator.clone(),
            station: record.station.clone(),
            delay_in,
            delay_out,
            accrued_delay: delay_out - delay_in,
            train_type: self.rules.classify(&record.relation),
            planned_dep_hour,
            day_period: DayPeriod::from_hour(planned_dep_hour),
        })
    }

    /// Derive features, join station stop counts and label every row
    pub fn build(&self, cleaned: &[CleanedRecord]) -> (ModelingTable, FeatureReport) {
        let mut report = FeatureReport {
            input_rows: cleaned.len(),
            ..Default::default()
        };

        let mut engineered = Vec::with_capacity(cleaned.len());
        for record in cleaned {
            match self.engineer(record) {
                Ok(row) => engineered.push(row),
                Err(Rejection::MissingDepartureDelay) => report.dropped_missing_departure_delay += 1,
                Err(Rejection::MissingArrivalDelay) => report.dropped_missing_arrival_delay += 1,
                Err(Rejection::MissingPlannedDeparture) => report.dropped_missing_planned_departure += 1,
            }
        }

        let stops = station_stop_counts(&engineered);
        let records: Vec<ModelingRecord> = engineered
            .into_iter()
            .map(|row| ModelingRecord {
                train_type: row.train_type,
                delay_in: row.delay_in,
                planned_dep_hour: row.planned_dep_hour,
                station_stops: stops.get(&row.station).copied().unwrap_or(0),
                is_late: row.accrued_delay > LATE_THRESHOLD_SECS,
                station: row.station,
                train_no: row.train_no,
                operator: row.operator,
                delay_out: row.delay_out,
                accrued_delay: row.accrued_delay,
                day_period: row.day_period,
            })
            .collect();

        let table = ModelingTable::new(records);
        report.output_rows = table.len();
        report.late_rows = table.records.iter().filter(|r| r.is_late).count();
        report.prevalence = table.prevalence();
        report.n_stations = stops.len();
        report.by_train_type = summarise_by(&table, |r| r.train_type.as_str());
        report.by_day_period = summarise_by(&table, |r| r.day_period.as_str());

        info!(
            rows = report.output_rows,
            late = report.late_rows,
            prevalence = %format!("{:.3}", report.prevalence),
            stations = report.n_stations,
            "Modeling table built"
        );

        (table, report)
    }
}

/// Number of modeling rows per station name
pub fn station_stop_counts(rows: &[EngineeredRecord]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for row in rows {
        *counts.entry(row.station.clone()).or_insert(0) += 1;
    }
    counts
}

fn summarise_by<F>(table: &ModelingTable, key: F) -> Vec<GroupSummary>
where
    F: Fn(&ModelingRecord) -> &'static str,
{
    let mut groups: BTreeMap<&'static str, Vec<f64>> = BTreeMap::new();
    for record in &table.records {
        groups.entry(key(record)).or_default().push(record.accrued_delay);
    }

    groups
        .into_iter()
        .map(|(group, values)| GroupSummary {
            group: group.to_string(),
            n: values.len(),
            mean: mean(&values).unwrap_or(f64::NAN),
            q1: quantile(&values, 0.25).unwrap_or(f64::NAN),
            median: quantile(&values, 0.5).unwrap_or(f64::NAN),
            q3: quantile(&values, 0.75).unwrap_or(f64::NAN),
        })
        .collect()
}
