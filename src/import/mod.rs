use crate::models::Sample;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub mod csv;
pub mod json;
pub mod validation;

/// Trait for loading telemetry samples from different file formats
pub trait ImportFormat {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    /// Load samples from the file
    fn import_file(&self, file_path: &Path) -> Result<Vec<Sample>>;

    fn get_format_name(&self) -> &'static str;
}

/// Picks an importer by file extension and cleans what it returns
pub struct ImportManager {
    importers: Vec<Box<dyn ImportFormat>>,
}

impl ImportManager {
    pub fn new() -> Self {
        let importers: Vec<Box<dyn ImportFormat>> = vec![
            Box::new(csv::CsvImporter::new()),
            Box::new(json::JsonImporter::new()),
        ];

        Self { importers }
    }

    /// Import a single file, auto-detecting the format
    ///
    /// The result is validated and sorted by timestamp.
    pub fn import_file(&self, file_path: &Path) -> Result<Vec<Sample>> {
        for importer in &self.importers {
            if importer.can_import(file_path) {
                info!(
                    path = %file_path.display(),
                    format = importer.get_format_name(),
                    "Importing samples"
                );
                let mut samples = importer.import_file(file_path)?;
                validation::SampleValidator::clean(&mut samples);
                return Ok(samples);
            }
        }

        anyhow::bail!("No importer found for file: {}", file_path.display());
    }

    /// Import all supported files from a directory
    ///
    /// Files that fail to import are logged and skipped.
    pub fn import_directory(&self, dir_path: &Path) -> Result<Vec<Sample>> {
        let mut all_samples = Vec::new();

        for file_path in self.collect_importable_files(dir_path)? {
            match self.import_file(&file_path) {
                Ok(mut samples) => all_samples.append(&mut samples),
                Err(e) => warn!(path = %file_path.display(), "Failed to import: {}", e),
            }
        }

        crate::models::sort_samples(&mut all_samples);
        Ok(all_samples)
    }

    fn collect_importable_files(&self, dir_path: &Path) -> Result<Vec<PathBuf>> {
        if !dir_path.is_dir() {
            anyhow::bail!("Path is not a directory: {}", dir_path.display());
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir_path)? {
            let path = entry?.path();
            if path.is_file() && self.importers.iter().any(|i| i.can_import(&path)) {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn has_extension(file_path: &Path, expected: &str) -> bool {
    file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}
