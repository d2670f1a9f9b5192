//! Categorical encoding of the train type predictor

use super::features::TrainType;
use serde::{Deserialize, Serialize};

/// How the nominal train type enters a model matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncoderType {
    /// A single column holding the level code
    Label,
    /// One indicator column per level except the first
    Dummy,
}

/// Train type encoder over the fixed level order of [`TrainType::ALL`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encoder {
    encoder_type: EncoderType,
}

impl Encoder {
    /// Create a new encoder
    pub fn new(encoder_type: EncoderType) -> Self {
        Self { encoder_type }
    }

    pub fn encoder_type(&self) -> EncoderType {
        self.encoder_type
    }

    /// Number of output columns
    pub fn width(&self) -> usize {
        match self.encoder_type {
            EncoderType::Label => 1,
            EncoderType::Dummy => TrainType::ALL.len() - 1,
        }
    }

    /// Output column names
    pub fn column_names(&self) -> Vec<String> {
        match self.encoder_type {
            EncoderType::Label => vec!["train_type".to_string()],
            EncoderType::Dummy => TrainType::ALL[1..]
                .iter()
                .map(|level| format!("train_type_{}", dummy_suffix(*level)))
                .collect(),
        }
    }

    /// Write the encoding of `value` into `out` (length [`width`](Self::width))
    pub fn encode_into(&self, value: TrainType, out: &mut [f64]) {
        match self.encoder_type {
            EncoderType::Label => out[0] = value.code() as f64,
            EncoderType::Dummy => {
                out.iter_mut().for_each(|v| *v = 0.0);
                // the first level is the reference and has no column
                if let Some(slot) = value.code().checked_sub(1) {
                    out[slot] = 1.0;
                }
            }
        }
    }
}

fn dummy_suffix(level: TrainType) -> &'static str {
    match level {
        TrainType::InterCity => "InterCity",
        TrainType::International => "International",
        TrainType::Local => "Local",
        TrainType::PeakExtra => "Peak.Extra",
    }
}
