use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::import::{has_extension, ImportFormat};
use crate::models::Sample;

/// Loads a JSON array of samples in the serialized `Sample` shape
pub struct JsonImporter;

impl JsonImporter {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_str(content: &str) -> Result<Vec<Sample>> {
        serde_json::from_str(content).context("Failed to parse sample array")
    }
}

impl Default for JsonImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for JsonImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        has_extension(file_path, "json")
    }

    fn import_file(&self, file_path: &Path) -> Result<Vec<Sample>> {
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open sample file: {}", file_path.display()))?;

        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse sample file: {}", file_path.display()))
    }

    fn get_format_name(&self) -> &'static str {
        "JSON"
    }
}
