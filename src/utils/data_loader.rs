//! Data loading utilities
//!
//! The raw punctuality export is read under two parsing policies:
//! a typed pass with schema inference and a text pass where every field
//! stays a string. Downstream code compares the two to find fields the
//! typed pass could not interpret.

use crate::config::SourceConfig;
use crate::error::{PunctualityError, Result};
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// The same source parsed under both policies
#[derive(Debug, Clone)]
pub struct SourceFrames {
    /// Schema-inferred frame
    pub typed: DataFrame,
    /// All-string frame
    pub text: DataFrame,
}

impl SourceFrames {
    /// Number of data rows (both frames agree)
    pub fn height(&self) -> usize {
        self.typed.height()
    }
}

/// Field separator of the punctuality export
pub const SEPARATOR: u8 = b';';

/// Loader for the semicolon-separated punctuality export
#[derive(Debug, Clone)]
pub struct DataLoader {
    timeout: Duration,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a loader with the export's defaults
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(120),
        }
    }

    /// Create a loader from the source configuration
    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Load the configured source: the local file when set, the URL otherwise
    pub async fn load(&self, config: &SourceConfig) -> Result<SourceFrames> {
        let bytes = match &config.input {
            Some(path) => self.read_local(path)?,
            None => self.fetch(&config.url).await?,
        };
        self.parse(&bytes)
    }

    /// Download the raw bytes with a plain GET. Failures are not retried.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let start = Instant::now();
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()?;

        let response = client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;

        info!(
            url = %url,
            bytes = bytes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Downloaded punctuality export"
        );
        Ok(bytes.to_vec())
    }

    /// Read the raw bytes of a local export
    pub fn read_local(&self, path: &Path) -> Result<Vec<u8>> {
        let bytes = std::fs::read(path)
            .map_err(|e| PunctualityError::DataError(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), bytes = bytes.len(), "Read local punctuality export");
        Ok(bytes)
    }

    /// Parse the bytes under both policies
    pub fn parse(&self, bytes: &[u8]) -> Result<SourceFrames> {
        let typed = self.parse_typed(bytes)?;
        let text = self.parse_text(bytes)?;

        if typed.height() != text.height() {
            return Err(PunctualityError::DataError(format!(
                "typed and text parses disagree on row count ({} vs {})",
                typed.height(),
                text.height()
            )));
        }

        debug!(rows = typed.height(), cols = typed.width(), "Parsed source under both policies");
        Ok(SourceFrames { typed, text })
    }

    /// Parse with schema inference over every row
    pub fn parse_typed(&self, bytes: &[u8]) -> Result<DataFrame> {
        self.read_frame(bytes, None)
    }

    /// Parse with every field kept as text
    pub fn parse_text(&self, bytes: &[u8]) -> Result<DataFrame> {
        self.read_frame(bytes, Some(0))
    }

    fn read_frame(&self, bytes: &[u8], infer_schema_length: Option<usize>) -> Result<DataFrame> {
        let parse_opts = CsvParseOptions::default()
            .with_separator(SEPARATOR);

        let reader = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(infer_schema_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(Cursor::new(bytes.to_vec()));

        reader.finish()
            .map_err(|e| PunctualityError::DataError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "TRAIN_NO;DELAY_DEP;PLANNED_TIME_DEP\n\
                          101;60;06:01:00\n\
                          102;;24:00:00\n";

    #[test]
    fn test_parse_both_policies() {
        let frames = DataLoader::new().parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(frames.height(), 2);
        assert_eq!(frames.text.width(), 3);

        let text_dtype = frames.text.column("DELAY_DEP").unwrap().dtype().clone();
        assert_eq!(text_dtype, DataType::String);

        let typed_dtype = frames.typed.column("DELAY_DEP").unwrap().dtype().clone();
        assert!(typed_dtype.is_primitive_numeric());
    }

    #[test]
    fn test_separator_is_fixed_to_semicolon() {
        assert_eq!(SEPARATOR, b';');
        let frames = DataLoader::new().parse(b"TRAIN_NO,DELAY_DEP\n101,60\n").unwrap();
        assert_eq!(frames.text.width(), 1);
        assert_eq!(frames.height(), 1);
    }

    #[test]
    fn test_read_local_missing_file() {
        let result = DataLoader::new().read_local(Path::new("/definitely/not/here.csv"));
        assert!(matches!(result, Err(PunctualityError::DataError(_))));
    }
}
