//! Synthetic punctuality exports shared by the integration tests

#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use punctuality::config::PipelineConfig;
use punctuality::utils::{DataLoader, SourceFrames};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::Path;

pub const HEADER: &str = "TRAIN_NO;RELATION;TRAIN_SERV;PTCAR_LG_NM_NL;\
PLANNED_DATE_ARR;PLANNED_TIME_ARR;PLANNED_DATE_DEP;PLANNED_TIME_DEP;\
REAL_DATE_DEP;REAL_TIME_DEP;DELAY_ARR;DELAY_DEP";

const RELATIONS: [&str; 4] = ["IC 01", "L 23", "P 7301", "THAL"];

fn date(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d").to_string()
}

fn time(ts: NaiveDateTime) -> String {
    ts.format("%H:%M:%S").to_string()
}

/// `n` stopping events with a learnable late signal: local and peak trains
/// arriving nearly on time tend to accrue delay at the stop
pub fn stop_rows(n: usize, seed: u64) -> Vec<String> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let day = NaiveDate::from_ymd_opt(2023, 1, 15)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();

    (0..n)
        .map(|i| {
            let relation = RELATIONS[i % RELATIONS.len()];
            let station = format!("Station {}", i % 12);
            let hour = 5 + (i * 7) % 18;
            let minute = (i * 13) % 60;
            let arrival = day + Duration::minutes((hour * 60 + minute) as i64);
            let departure = arrival + Duration::minutes(1 + (i % 2) as i64);

            let delay_in: f64 = rng.gen_range(-60.0..600.0_f64).round();
            let prone = matches!(i % 4, 1 | 2) && delay_in < 200.0;
            let p_late = if prone { 0.9 } else { 0.05 };
            let accrued = if rng.gen::<f64>() < p_late {
                rng.gen_range(90.0..300.0_f64).round()
            } else {
                rng.gen_range(-30.0..40.0_f64).round()
            };
            let delay_out = delay_in + accrued;
            let actual = departure + Duration::seconds(delay_out as i64);

            format!(
                "{};{};SNCB/NMBS;{};{};{};{};{};{};{};{};{}",
                8000 + i / 6,
                relation,
                station,
                date(arrival),
                time(arrival),
                date(departure),
                time(departure),
                date(actual),
                time(actual),
                delay_in,
                delay_out
            )
        })
        .collect()
}

/// A full export: synthetic stops plus one pass-through, one unparseable
/// planned departure and one stop without departure delay
pub fn export_csv(n: usize, seed: u64) -> String {
    let mut lines = vec![HEADER.to_string()];
    lines.extend(stop_rows(n, seed));
    // pass-through: arrival equals departure
    lines.push(
        "9001;IC 02;SNCB/NMBS;Station 0;2023-01-15;10:00:00;2023-01-15;10:00:00;\
         2023-01-15;10:00:30;30;30"
            .to_string(),
    );
    // planned departure past 23:59, repaired from the actual departure
    lines.push(
        "9002;L 05;SNCB/NMBS;Station 1;2023-01-15;23:58:00;2023-01-15;24:05:00;\
         2023-01-16;00:06:00;0;60"
            .to_string(),
    );
    // no departure delay
    lines.push(
        "9003;L 05;SNCB/NMBS;Station 2;2023-01-15;12:00:00;2023-01-15;12:01:00;\
         2023-01-15;12:01:00;0;"
            .to_string(),
    );
    lines.join("\n") + "\n"
}

/// An export where several planned departures are written past 23:59 and
/// several trains pass stations without stopping.
///
/// Rollover row `k` (train 9100 + k) has planned departure `24:0k:00` on the
/// 15th and departs `60 + 30k` seconds late. Pass-through row `k` (train
/// 9200 + k) has equal planned arrival and departure. The last pass-through
/// is also a rollover: its arrival is written on the 16th and only matches
/// the departure once the departure is repaired.
pub fn rollover_export(n_stops: usize, rollovers: usize, pass_throughs: usize, seed: u64) -> String {
    let mut lines = vec![HEADER.to_string()];
    lines.extend(stop_rows(n_stops, seed));
    let midnight = NaiveDate::from_ymd_opt(2023, 1, 16)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();

    for k in 0..rollovers {
        let delay = 60 + 30 * k as i64;
        let actual = midnight + Duration::minutes((k % 10) as i64) + Duration::seconds(delay);
        lines.push(format!(
            "{};L 05;SNCB/NMBS;Station {};2023-01-15;23:5{}:00;2023-01-15;24:0{}:00;{};{};0;{}",
            9100 + k,
            k % 12,
            k % 10,
            k % 10,
            date(actual),
            time(actual),
            delay
        ));
    }

    for k in 0..pass_throughs.saturating_sub(1) {
        lines.push(format!(
            "{};IC 02;SNCB/NMBS;Station {};2023-01-15;14:{:02}:00;2023-01-15;14:{:02}:00;\
             2023-01-15;14:{:02}:30;30;30",
            9200 + k,
            k % 12,
            k,
            k,
            k
        ));
    }
    if pass_throughs > 0 {
        lines.push(format!(
            "{};IC 02;SNCB/NMBS;Station 3;2023-01-16;00:02:00;2023-01-15;24:02:00;\
             2023-01-16;00:02:45;45;45",
            9200 + pass_throughs - 1
        ));
    }

    lines.join("\n") + "\n"
}

pub fn frames(n: usize, seed: u64) -> SourceFrames {
    DataLoader::new()
        .parse(export_csv(n, seed).as_bytes())
        .unwrap()
}

/// A small, fast configuration rooted in `dir`
pub fn small_config(dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default()
        .with_input(dir.join("export.csv"))
        .with_folds(3)
        .with_n_configs(3)
        .with_seed(7)
        .with_cache_dir(dir.join("cache"))
        .with_output_dir(dir.join("out"));
    config.tuning.n_threads = Some(2);
    config
}
