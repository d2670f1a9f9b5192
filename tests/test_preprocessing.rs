//! Integration tests for loading, cleaning and feature construction

mod common;

use chrono::{Duration, Timelike};
use punctuality::preprocessing::{
    extract_records, prepare, Cleaner, Recipe, RecipeStep, TrainType, LATE_THRESHOLD_SECS,
};
use punctuality::utils::DataLoader;
use punctuality::PunctualityError;

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_both_parses_agree_on_rows() {
    let frames = common::frames(40, 1);
    assert_eq!(frames.height(), 43);
    assert_eq!(frames.typed.width(), 12);
    assert_eq!(frames.text.width(), 12);
}

#[test]
fn test_missing_required_column_is_data_error() {
    let csv = "TRAIN_NO;RELATION\n1;IC 01\n";
    let frames = DataLoader::new().parse(csv.as_bytes()).unwrap();
    let result = extract_records(&frames);
    assert!(matches!(result, Err(PunctualityError::DataError(_))));
}

#[test]
fn test_unparseable_departure_keeps_its_text() {
    let frames = common::frames(8, 2);
    let records = extract_records(&frames).unwrap();
    let broken = records.iter().find(|r| r.train_no == "9002").unwrap();
    assert!(broken.planned_departure.is_none());
    assert_eq!(broken.planned_departure_text.as_deref(), Some("24:05:00"));
}

// ============================================================================
// Cleaning and features
// ============================================================================

#[test]
fn test_prepare_accounts_for_every_row() {
    let prepared = prepare(&common::frames(60, 3)).unwrap();
    let c = &prepared.cleaning;
    let f = &prepared.features;

    assert_eq!(c.input_rows, 63);
    assert_eq!(c.repair_targets, 1);
    assert_eq!(c.repaired, 1);
    assert_eq!(c.pass_through_dropped, 1);
    assert_eq!(c.output_rows, 62);

    assert_eq!(f.input_rows, 62);
    assert_eq!(f.dropped_missing_departure_delay, 1);
    assert_eq!(f.output_rows, 61);
    assert_eq!(prepared.table.len(), 61);
}

#[test]
fn test_repaired_departure_rolls_to_next_day() {
    let frames = common::frames(8, 4);
    let records = extract_records(&frames).unwrap();
    let (cleaned, _) = Cleaner::new().clean(&records);
    let repaired = cleaned.iter().find(|r| r.train_no == "9002").unwrap();
    assert!(repaired.repaired);
    let ts = repaired.planned_departure.unwrap();
    assert_eq!(ts.date().to_string(), "2023-01-16");
    assert_eq!((ts.hour(), ts.minute()), (0, 5));
}

#[test]
fn test_every_rollover_is_repaired_exactly() {
    let csv = common::rollover_export(30, 5, 4, 9);
    let frames = DataLoader::new().parse(csv.as_bytes()).unwrap();
    let records = extract_records(&frames).unwrap();
    assert_eq!(records.len(), 39);
    let before = records.iter().filter(|r| r.planned_departure.is_none()).count();
    assert_eq!(before, 6);

    let (cleaned, report) = Cleaner::new().clean(&records);
    assert_eq!(report.repair_targets, 6);
    assert_eq!(report.repaired, 6);
    assert_eq!(report.unrepairable, 0);
    assert_eq!(report.pass_through_dropped, 4);
    assert_eq!(cleaned.len(), 35);
    assert_eq!(report.output_rows, 35);

    let missing = cleaned.iter().filter(|r| r.planned_departure.is_none()).count();
    assert_eq!(missing, 0);

    let repaired: Vec<_> = cleaned.iter().filter(|r| r.repaired).collect();
    assert_eq!(repaired.len(), 5);
    for r in &repaired {
        let actual = r.actual_departure.unwrap();
        let delay = Duration::seconds(r.delay_departure.unwrap() as i64);
        assert_eq!(r.planned_departure, Some(actual - delay), "train {}", r.train_no);
        assert_eq!(r.planned_departure.unwrap().date().to_string(), "2023-01-16");
        assert_eq!(r.planned_departure.unwrap().hour(), 0);
    }

    // the repaired departure equals the arrival, so the stop is a pass-through
    assert!(cleaned.iter().all(|r| !r.train_no.starts_with("92")));
    assert!(cleaned
        .iter()
        .all(|r| r.planned_arrival.is_none() || r.planned_arrival != r.planned_departure));
}

#[test]
fn test_labels_follow_accrued_delay() {
    let prepared = prepare(&common::frames(80, 5)).unwrap();
    for r in &prepared.table.records {
        assert_eq!(r.is_late, r.accrued_delay > LATE_THRESHOLD_SECS);
        assert!((r.accrued_delay - (r.delay_out - r.delay_in)).abs() < 1e-9);
        assert!(r.planned_dep_hour < 24);
    }
    let late = prepared.table.records.iter().filter(|r| r.is_late).count();
    assert!(late > 0 && late < prepared.table.len());
}

#[test]
fn test_station_stops_count_table_rows() {
    let prepared = prepare(&common::frames(48, 6)).unwrap();
    let table = &prepared.table;
    for r in &table.records {
        let expected = table.records.iter().filter(|o| o.station == r.station).count();
        assert_eq!(r.station_stops, expected);
    }
    assert_eq!(prepared.features.n_stations, 12);
}

#[test]
fn test_train_types_from_relations() {
    let prepared = prepare(&common::frames(40, 7)).unwrap();
    let types: Vec<TrainType> = prepared.table.records.iter().map(|r| r.train_type).collect();
    for t in TrainType::ALL {
        assert!(types.contains(&t), "{} missing", t);
    }
    let groups: Vec<&str> = prepared
        .features
        .by_train_type
        .iter()
        .map(|g| g.group.as_str())
        .collect();
    assert_eq!(groups.len(), 4);
}

// ============================================================================
// Recipes
// ============================================================================

#[test]
fn test_dummy_recipe_expands_train_type() {
    let prepared = prepare(&common::frames(40, 8)).unwrap();
    let rows: Vec<usize> = (0..prepared.table.len()).collect();
    let fitted = Recipe::new()
        .with_step(RecipeStep::Dummy)
        .with_step(RecipeStep::Normalize)
        .fit(&prepared.table, &rows)
        .unwrap();
    let x = fitted.bake(&prepared.table, &rows).unwrap();
    assert_eq!(x.nrows(), rows.len());
    assert_eq!(x.ncols(), 3 + TrainType::ALL.len() - 1);
    assert_eq!(fitted.feature_groups().len(), x.ncols());
}

#[test]
fn test_plain_recipe_keeps_four_columns() {
    let prepared = prepare(&common::frames(40, 9)).unwrap();
    let rows: Vec<usize> = (0..prepared.table.len()).collect();
    let fitted = Recipe::new().fit(&prepared.table, &rows).unwrap();
    assert_eq!(fitted.n_features(), 4);
}
