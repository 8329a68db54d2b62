use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AtlasError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Call-activity resolution conventions
    pub resolution: ResolutionConfig,

    /// Hierarchy assembly settings
    pub hierarchy: HierarchyConfig,

    /// Output settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Directory holding the BPMN files
    pub bpmn_dir: PathBuf,

    /// Root process file (e.g. "mortgage.bpmn")
    pub root_file: Option<String>,

    /// Where the persisted process map lives
    pub map_file: PathBuf,

    /// Paths to ignore while scanning
    pub ignore_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Filename prefix of the namespaced convention. Defaults to the root file stem.
    pub prefix: Option<String>,

    /// Separator between prefix and subprocess name ("mortgage-se-household.bpmn")
    pub namespace_separator: String,

    /// Extension of process files, without the dot
    pub file_extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Maximum call depth expanded below the root
    pub max_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Report format (markdown, json)
    pub format: String,

    /// Directory for rendered reports
    pub reports_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig {
                name: "Unnamed Project".to_string(),
                bpmn_dir: PathBuf::from("bpmn"),
                root_file: None,
                map_file: PathBuf::from("bpmn-map.json"),
                ignore_patterns: vec![
                    "target/".to_string(),
                    "node_modules/".to_string(),
                    ".git/".to_string(),
                ],
            },
            resolution: ResolutionConfig::default(),
            hierarchy: HierarchyConfig { max_depth: 32 },
            output: OutputConfig {
                format: "markdown".to_string(),
                reports_dir: PathBuf::from("reports"),
            },
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            namespace_separator: "-se-".to_string(),
            file_extension: "bpmn".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| AtlasError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AtlasError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration with fallback to default
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => {
                if p.as_ref().exists() {
                    Self::load(p)
                } else {
                    Ok(Self::default())
                }
            }
            None => {
                let candidates = [
                    "BpmnAtlas.toml",
                    "bpmn-atlas.toml",
                    ".bpmn-atlas.toml",
                ];

                for candidate in &candidates {
                    if Path::new(candidate).exists() {
                        return Self::load(candidate);
                    }
                }

                Ok(Self::default())
            }
        }
    }
}
