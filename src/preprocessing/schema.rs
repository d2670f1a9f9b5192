//! Source schema and raw record extraction

use crate::error::{PunctualityError, Result};
use crate::utils::SourceFrames;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

pub const TRAIN_NO: &str = "TRAIN_NO";
pub const RELATION: &str = "RELATION";
pub const OPERATOR: &str = "TRAIN_SERV";
pub const STATION: &str = "PTCAR_LG_NM_NL";
pub const PLANNED_DATE_ARR: &str = "PLANNED_DATE_ARR";
pub const PLANNED_TIME_ARR: &str = "PLANNED_TIME_ARR";
pub const PLANNED_DATE_DEP: &str = "PLANNED_DATE_DEP";
pub const PLANNED_TIME_DEP: &str = "PLANNED_TIME_DEP";
pub const REAL_DATE_DEP: &str = "REAL_DATE_DEP";
pub const REAL_TIME_DEP: &str = "REAL_TIME_DEP";
pub const DELAY_ARR: &str = "DELAY_ARR";
pub const DELAY_DEP: &str = "DELAY_DEP";

/// Columns the pipeline cannot run without
pub const REQUIRED_COLUMNS: [&str; 12] = [
    TRAIN_NO,
    RELATION,
    OPERATOR,
    STATION,
    PLANNED_DATE_ARR,
    PLANNED_TIME_ARR,
    PLANNED_DATE_DEP,
    PLANNED_TIME_DEP,
    REAL_DATE_DEP,
    REAL_TIME_DEP,
    DELAY_ARR,
    DELAY_DEP,
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d%b%Y", "%d/%m/%Y"];
const TIME_FORMAT: &str = "%H:%M:%S";

/// One (train, station-stop) event as read from the export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub train_no: String,
    pub operator: String,
    pub relation: String,
    pub station: String,
    pub planned_arrival: Option<NaiveDateTime>,
    /// Typed planned departure; `None` when the date or time did not parse
    pub planned_departure: Option<NaiveDateTime>,
    /// Planned departure time exactly as written in the source
    pub planned_departure_text: Option<String>,
    pub actual_departure: Option<NaiveDateTime>,
    /// Seconds late at arrival
    pub delay_arrival: Option<f64>,
    /// Seconds late at departure
    pub delay_departure: Option<f64>,
}

/// Parse a date in any of the accepted formats
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// Parse a wall-clock time; hours outside 00-23 are rejected
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text.trim(), TIME_FORMAT).ok()
}

/// Combine a date and a time field into a timestamp
pub fn parse_timestamp(date: Option<&str>, time: Option<&str>) -> Option<NaiveDateTime> {
    let date = parse_date(date?)?;
    let time = parse_time(time?)?;
    Some(NaiveDateTime::new(date, time))
}

/// Fail with `DataError` when a required column is absent
pub fn check_columns(df: &DataFrame) -> Result<()> {
    let present: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !present.iter().any(|p| p == col))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PunctualityError::DataError(format!(
            "missing required columns: {}",
            missing.join(", ")
        )))
    }
}

fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| PunctualityError::ColumnNotFound(name.to_string()))?
        .cast(&DataType::String)?;
    let values = column
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|v| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .collect();
    Ok(values)
}

fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| PunctualityError::ColumnNotFound(name.to_string()))?
        .cast(&DataType::Float64)?;
    let values = column
        .as_materialized_series()
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| x.is_finite()))
        .collect();
    Ok(values)
}

/// Build raw records from the two parses of the source.
///
/// Delays come from the typed frame. Identifiers and temporal fields come
/// from the text frame; temporal fields are parsed strictly so a value that
/// matches no accepted format is missing in the typed view while its text
/// survives in `planned_departure_text`.
pub fn extract_records(frames: &SourceFrames) -> Result<Vec<RawRecord>> {
    check_columns(&frames.typed)?;
    check_columns(&frames.text)?;

    let text = &frames.text;
    let train_no = text_column(text, TRAIN_NO)?;
    let relation = text_column(text, RELATION)?;
    let operator = text_column(text, OPERATOR)?;
    let station = text_column(text, STATION)?;
    let pda = text_column(text, PLANNED_DATE_ARR)?;
    let pta = text_column(text, PLANNED_TIME_ARR)?;
    let pdd = text_column(text, PLANNED_DATE_DEP)?;
    let ptd = text_column(text, PLANNED_TIME_DEP)?;
    let rdd = text_column(text, REAL_DATE_DEP)?;
    let rtd = text_column(text, REAL_TIME_DEP)?;

    let delay_arr = numeric_column(&frames.typed, DELAY_ARR)?;
    let delay_dep = numeric_column(&frames.typed, DELAY_DEP)?;

    let records = (0..frames.height())
        .map(|i| RawRecord {
            train_no: train_no[i].clone().unwrap_or_default(),
            operator: operator[i].clone().unwrap_or_default(),
            relation: relation[i].clone().unwrap_or_default(),
            station: station[i].clone().unwrap_or_default(),
            planned_arrival: parse_timestamp(pda[i].as_deref(), pta[i].as_deref()),
            planned_departure: parse_timestamp(pdd[i].as_deref(), ptd[i].as_deref()),
            planned_departure_text: ptd[i].clone(),
            actual_departure: parse_timestamp(rdd[i].as_deref(), rtd[i].as_deref()),
            delay_arrival: delay_arr[i],
            delay_departure: delay_dep[i],
        })
        .collect();

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 1, 15);
        assert_eq!(parse_date("2023-01-15"), expected);
        assert_eq!(parse_date("15JAN2023"), expected);
        assert_eq!(parse_date("15/01/2023"), expected);
        assert_eq!(parse_date("Jan 15"), None);
    }

    #[test]
    fn test_parse_time_rejects_hour_24() {
        assert!(parse_time("23:59:00").is_some());
        assert!(parse_time("24:01:00").is_none());
    }

    #[test]
    fn test_parse_timestamp_needs_both_parts() {
        assert!(parse_timestamp(Some("2023-01-15"), Some("06:00:00")).is_some());
        assert!(parse_timestamp(None, Some("06:00:00")).is_none());
        assert!(parse_timestamp(Some("2023-01-15"), None).is_none());
    }
}
