//! File export of results too large to read comfortably inline.

use std::path::{Path, PathBuf};

use uuid::Uuid;
use weft_core::Timestamp;

use crate::error::EngineError;

const MAX_SLUG_CHARS: usize = 60;

/// An exported file, ready to hand to the delivery channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportArtifact {
    pub id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub created_at: Timestamp,
}

impl ExportArtifact {
    /// Write the artifact into `dir`, returning the file path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, EngineError> {
        std::fs::create_dir_all(dir).map_err(|e| EngineError::Export(e.to_string()))?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes).map_err(|e| EngineError::Export(e.to_string()))?;
        Ok(path)
    }
}

/// Turns text into a downloadable artifact.
pub trait Exporter: Send + Sync {
    fn export(&self, text: &str, suggested_title: &str) -> Result<ExportArtifact, EngineError>;
}

/// Plain UTF-8 text files.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextExporter;

impl Exporter for TextExporter {
    fn export(&self, text: &str, suggested_title: &str) -> Result<ExportArtifact, EngineError> {
        if text.trim().is_empty() {
            return Err(EngineError::Export("nothing to export".to_string()));
        }
        let slug = slugify(suggested_title);
        let file_name = if slug.is_empty() {
            "weft-export.txt".to_string()
        } else {
            format!("{}.txt", slug)
        };
        Ok(ExportArtifact {
            id: Uuid::new_v4(),
            file_name,
            mime_type: "text/plain; charset=utf-8".to_string(),
            bytes: text.as_bytes().to_vec(),
            created_at: Timestamp::now(),
        })
    }
}

/// Lowercase ASCII words joined by `-`.
fn slugify(title: &str) -> String {
    let words: Vec<String> = title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();
    let slug = words.join("-");
    slug.chars().take(MAX_SLUG_CHARS).collect::<String>().trim_end_matches('-').to_string()
}
