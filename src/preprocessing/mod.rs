//! Data preprocessing module
//!
//! Covers everything between the raw export and a model matrix:
//! - Source schema and raw record extraction
//! - Timestamp repair and stop filtering
//! - Feature and label construction
//! - Recipes (categorical encoding, normalisation) fitted per resample

pub mod schema;
pub mod cleaning;
pub mod features;
mod encoder;
mod scaler;
mod pipeline;

pub use schema::{extract_records, RawRecord, REQUIRED_COLUMNS};
pub use cleaning::{Cleaner, CleanedRecord, CleaningReport};
pub use features::{
    DayPeriod, EngineeredRecord, FeatureBuilder, FeatureReport, GroupSummary, ModelingRecord,
    ModelingTable, TrainType, TrainTypeRules, LATE_THRESHOLD_SECS, PREDICTORS,
};
pub use encoder::{Encoder, EncoderType};
pub use scaler::Scaler;
pub use pipeline::{FittedRecipe, Recipe, RecipeStep};

use crate::error::Result;
use crate::utils::SourceFrames;

/// Everything the first three stages produce
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub table: ModelingTable,
    pub cleaning: CleaningReport,
    pub features: FeatureReport,
}

/// Extract, clean and engineer the modeling table from the parsed source
pub fn prepare(frames: &SourceFrames) -> Result<PreparedData> {
    let raw = extract_records(frames)?;
    let (cleaned, cleaning) = Cleaner::new().clean(&raw);
    let (table, features) = FeatureBuilder::new()?.build(&cleaned);
    Ok(PreparedData {
        table,
        cleaning,
        features,
    })
}
