// src/core/snapshot.rs
use std::collections::BTreeMap;
use std::path::Path;

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AtlasError, Result};
use super::extractor::{ElementExtractor, ExtractedFile};
use super::process_map::ProcessMap;
use super::warnings::Warning;

/// One extracted version of a file set, optionally with its reconciled map
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub files: BTreeMap<String, ExtractedFile>,
    pub map: Option<ProcessMap>,
    pub warnings: Vec<Warning>,
}

impl Snapshot {
    /// Extract every source file. Extraction warnings are kept on the snapshot.
    pub fn from_sources(extractor: &ElementExtractor, sources: &BTreeMap<String, String>) -> Self {
        let mut warnings = Vec::new();
        let files = extractor
            .extract_all(sources)
            .into_iter()
            .map(|(name, staged)| (name, staged.drain_into(&mut warnings)))
            .collect();

        Self {
            files,
            map: None,
            warnings,
        }
    }

    pub fn with_map(mut self, map: ProcessMap) -> Self {
        self.map = Some(map);
        self
    }

    pub fn content_hash(&self, bpmn_file: &str) -> Option<&str> {
        self.files.get(bpmn_file).map(|f| f.content_hash.as_str())
    }
}

/// Read every `*.{extension}` file below `dir`, keyed by file name.
/// Non-UTF-8 bytes are replaced rather than rejected.
pub fn load_sources<P: AsRef<Path>>(
    dir: P,
    extension: &str,
    ignore_patterns: &[String],
) -> Result<BTreeMap<String, String>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(AtlasError::FileSystem(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut sources = BTreeMap::new();
    let walker = WalkBuilder::new(dir)
        .hidden(false)
        .git_ignore(true)
        .build();

    for entry in walker {
        let entry = entry.map_err(|e| AtlasError::FileSystem(e.to_string()))?;
        let path = entry.path();

        if !path.is_file() || !has_extension(path, extension) {
            continue;
        }
        let relative = path.strip_prefix(dir).unwrap_or(path);
        if is_ignored(relative, ignore_patterns) {
            continue;
        }

        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };
        let bytes = std::fs::read(path)?;
        if sources
            .insert(name.clone(), String::from_utf8_lossy(&bytes).into_owned())
            .is_some()
        {
            debug!("Duplicate file name {} below {}; last one wins", name, dir.display());
        }
    }

    debug!("Loaded {} source files from {}", sources.len(), dir.display());
    Ok(sources)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case(extension.trim_start_matches('.')))
}

fn is_ignored(path: &Path, ignore_patterns: &[String]) -> bool {
    let path = path.to_string_lossy();
    ignore_patterns
        .iter()
        .map(|p| p.trim_end_matches('/'))
        .filter(|p| !p.is_empty())
        .any(|p| path.split(['/', '\\']).any(|segment| segment == p))
}
