//! Timestamp repair and stop filtering

use super::schema::RawRecord;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// A stopping event with a resolved planned departure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedRecord {
    pub train_no: String,
    pub operator: String,
    pub relation: String,
    pub station: String,
    pub planned_arrival: Option<NaiveDateTime>,
    pub planned_departure: Option<NaiveDateTime>,
    pub actual_departure: Option<NaiveDateTime>,
    pub delay_arrival: Option<f64>,
    pub delay_departure: Option<f64>,
    /// Planned departure was reconstructed from the actual departure
    pub repaired: bool,
}

/// Row accounting for the cleaning stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub repair_targets: usize,
    pub repaired: usize,
    pub unrepairable: usize,
    pub pass_through_dropped: usize,
    pub output_rows: usize,
}

/// A record whose typed planned departure failed while the text is present
pub fn is_repair_target(record: &RawRecord) -> bool {
    record.planned_departure.is_none() && record.planned_departure_text.is_some()
}

/// planned departure = actual departure − departure delay.
///
/// Computed on full timestamps so a result past midnight carries the
/// next calendar date.
pub fn repair_planned_departure(record: &RawRecord) -> Option<NaiveDateTime> {
    let actual = record.actual_departure?;
    let delay = record.delay_departure?;
    actual.checked_sub_signed(Duration::seconds(delay.round() as i64))
}

/// The train passed the station without stopping
pub fn is_pass_through(record: &CleanedRecord) -> bool {
    match (record.planned_arrival, record.planned_departure) {
        (Some(arr), Some(dep)) => arr == dep,
        _ => false,
    }
}

/// Repairs malformed planned departures and drops non-stopping records
#[derive(Debug, Clone, Default)]
pub struct Cleaner;

impl Cleaner {
    pub fn new() -> Self {
        Self
    }

    /// Clean a batch of raw records
    pub fn clean(&self, records: &[RawRecord]) -> (Vec<CleanedRecord>, CleaningReport) {
        let mut report = CleaningReport {
            input_rows: records.len(),
            ..Default::default()
        };

        let mut cleaned = Vec::with_capacity(records.len());
        for record in records {
            let mut planned_departure = record.planned_departure;
            let mut repaired = false;

            if is_repair_target(record) {
                report.repair_targets += 1;
                match repair_planned_departure(record) {
                    Some(ts) => {
                        planned_departure = Some(ts);
                        repaired = true;
                        report.repaired += 1;
                    }
                    None => report.unrepairable += 1,
                }
            }

            let row = CleanedRecord {
                train_no: record.train_no.clone(),
                operator: record.operator.clone(),
                relation: record.relation.clone(),
                station: record.station.clone(),
                planned_arrival: record.planned_arrival,
                planned_departure,
                actual_departure: record.actual_departure,
                delay_arrival: record.delay_arrival,
                delay_departure: record.delay_departure,
                repaired,
            };

            if is_pass_through(&row) {
                report.pass_through_dropped += 1;
            } else {
                cleaned.push(row);
            }
        }

        report.output_rows = cleaned.len();

        if report.unrepairable > 0 {
            warn!(
                unrepairable = report.unrepairable,
                "Planned departures left unrepaired (no actual departure or delay)"
            );
        }
        info!(
            input = report.input_rows,
            repaired = report.repaired,
            pass_through = report.pass_through_dropped,
            output = report.output_rows,
            "Cleaning complete"
        );

        (cleaned, report)
    }
}
