//! # Document Loading
//!
//! Reads blueprints, payloads and topology snapshots from disk.
//! `.json` files go through `serde_json`; everything else is read as YAML.

use blueprint_core::BlueprintError;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Maximum input file size (16 MB).
pub const MAX_INPUT_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Input syntax, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Yaml,
        }
    }
}

/// Parse a document from text.
pub fn parse_document<T: DeserializeOwned>(raw: &str, format: Format) -> Result<T, BlueprintError> {
    match format {
        Format::Json => serde_json::from_str(raw)
            .map_err(|e| BlueprintError::SerializationError(format!("Invalid JSON: {}", e))),
        Format::Yaml => serde_yaml::from_str(raw)
            .map_err(|e| BlueprintError::SerializationError(format!("Invalid YAML: {}", e))),
    }
}

/// Read and parse a document from disk.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, BlueprintError> {
    let canonical = validate_file_path(path)?;
    validate_file_size(&canonical, MAX_INPUT_FILE_SIZE)?;

    let raw = std::fs::read_to_string(&canonical)
        .map_err(|e| BlueprintError::IoError(format!("Cannot read '{}': {}", path.display(), e)))?;
    tracing::debug!(path = %canonical.display(), bytes = raw.len(), "loaded document");
    parse_document(&raw, Format::from_path(&canonical))
}

fn validate_file_size(path: &Path, max_size: u64) -> Result<(), BlueprintError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| BlueprintError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(BlueprintError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize and require a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, BlueprintError> {
    let canonical = path.canonicalize().map_err(|e| {
        BlueprintError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(BlueprintError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

// =============================================================================
// TESTS
// =============================================================================
