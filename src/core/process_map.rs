// src/core/process_map.rs

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};

/// How certain the resolver is about a call-activity-to-file match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
    None,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
            Confidence::None => "none",
        };
        f.write_str(label)
    }
}

/// Resolved link from one call activity to the subprocess file it invokes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallActivityLink {
    pub bpmn_file: String,
    pub bpmn_element_id: String,
    #[serde(default)]
    pub bpmn_element_name: Option<String>,
    #[serde(default)]
    pub called_element_attr: Option<String>,
    #[serde(default)]
    pub matched_subprocess_file: Option<String>,
    pub confidence: Confidence,
    pub reason: String,
    #[serde(default)]
    pub needs_manual_review: bool,
    /// Set by a human editing the map; survives re-resolution guesses
    #[serde(default)]
    pub manual_override: bool,
}

impl CallActivityLink {
    pub fn key(&self) -> (&str, &str) {
        (&self.bpmn_file, &self.bpmn_element_id)
    }

    /// Name shown for this call activity, falling back to its id
    pub fn display_name(&self) -> &str {
        self.bpmn_element_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.bpmn_element_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEntry {
    pub bpmn_file: String,
    pub process_id: String,
    #[serde(default)]
    pub call_activities: Vec<CallActivityLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMap {
    pub generated_at: DateTime<Utc>,
    pub root_process: String,
    /// Sorted by `bpmn_file`
    pub processes: Vec<ProcessEntry>,
}

impl ProcessMap {
    /// Build a map, enforcing the `bpmn_file` ordering of `processes`
    pub fn new(root_process: impl Into<String>, mut processes: Vec<ProcessEntry>) -> Self {
        processes.sort_by(|a, b| a.bpmn_file.cmp(&b.bpmn_file));
        Self {
            generated_at: Utc::now(),
            root_process: root_process.into(),
            processes,
        }
    }

    pub fn entry(&self, bpmn_file: &str) -> Option<&ProcessEntry> {
        self.processes
            .binary_search_by(|p| p.bpmn_file.as_str().cmp(bpmn_file))
            .ok()
            .map(|i| &self.processes[i])
    }

    pub fn links(&self) -> impl Iterator<Item = &CallActivityLink> {
        self.processes.iter().flat_map(|p| p.call_activities.iter())
    }

    /// Find a prior link in `bpmn_file` by element id, else by display name
    pub fn find_link(
        &self,
        bpmn_file: &str,
        element_id: &str,
        element_name: Option<&str>,
    ) -> Option<&CallActivityLink> {
        let entry = self.entry(bpmn_file)?;
        entry
            .call_activities
            .iter()
            .find(|l| l.bpmn_element_id == element_id)
            .or_else(|| {
                let name = element_name.filter(|n| !n.trim().is_empty())?;
                entry
                    .call_activities
                    .iter()
                    .find(|l| l.bpmn_element_name.as_deref() == Some(name))
            })
    }

    /// Parse a map document, re-establishing the sort invariant
    pub fn from_json(content: &str) -> Result<Self> {
        let mut map: ProcessMap = serde_json::from_str(content)?;
        map.processes.sort_by(|a, b| a.bpmn_file.cmp(&b.bpmn_file));
        Ok(map)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a persisted map; `Ok(None)` when the file does not exist yet
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
            .map(Some)
            .map_err(|e| AtlasError::InvalidMap(format!("{}: {}", path.display(), e)))
    }

    /// Write the map to a sibling temp file, then rename it over `path`
    pub fn save_atomic<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, self.to_json()?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(file: &str, id: &str, name: &str, target: Option<&str>) -> CallActivityLink {
        CallActivityLink {
            bpmn_file: file.to_string(),
            bpmn_element_id: id.to_string(),
            bpmn_element_name: Some(name.to_string()),
            called_element_attr: None,
            matched_subprocess_file: target.map(str::to_string),
            confidence: Confidence::Medium,
            reason: "test".to_string(),
            needs_manual_review: false,
            manual_override: false,
        }
    }

    #[test]
    fn test_new_sorts_processes_by_file() {
        let map = ProcessMap::new(
            "root",
            vec![
                ProcessEntry { bpmn_file: "z.bpmn".into(), process_id: "z".into(), call_activities: vec![] },
                ProcessEntry { bpmn_file: "a.bpmn".into(), process_id: "a".into(), call_activities: vec![] },
            ],
        );
        assert_eq!(map.processes[0].bpmn_file, "a.bpmn");
        assert!(map.entry("z.bpmn").is_some());
        assert!(map.entry("m.bpmn").is_none());
    }

    #[test]
    fn test_find_link_by_id_then_name() {
        let map = ProcessMap::new(
            "root",
            vec![ProcessEntry {
                bpmn_file: "a.bpmn".into(),
                process_id: "a".into(),
                call_activities: vec![link("a.bpmn", "ca1", "Household", Some("h.bpmn"))],
            }],
        );

        assert!(map.find_link("a.bpmn", "ca1", None).is_some());
        let renamed_id = map.find_link("a.bpmn", "Activity_9", Some("Household")).unwrap();
        assert_eq!(renamed_id.matched_subprocess_file.as_deref(), Some("h.bpmn"));
        assert!(map.find_link("a.bpmn", "other", Some("Other")).is_none());
        assert!(map.find_link("b.bpmn", "ca1", None).is_none());
    }

    #[test]
    fn test_json_uses_camel_case_and_tolerates_missing_optional_fields() {
        let json = r#"{
  "generatedAt": "2024-05-01T10:00:00Z",
  "rootProcess": "mortgage",
  "processes": [
    { "bpmnFile": "mortgage.bpmn", "processId": "mortgage", "callActivities": [
      { "bpmnFile": "mortgage.bpmn", "bpmnElementId": "ca", "confidence": "high", "reason": "manual" }
    ] }
  ]
}"#;
        let map = ProcessMap::from_json(json).unwrap();
        let link = map.links().next().unwrap();
        assert_eq!(link.confidence, Confidence::High);
        assert!(link.matched_subprocess_file.is_none());
        assert!(!link.manual_override);

        let out = map.to_json().unwrap();
        assert!(out.contains("\"bpmnElementId\": \"ca\""));
        assert!(out.contains("\"needsManualReview\": false"));
    }

    #[test]
    fn test_save_atomic_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("maps").join("bpmn-map.json");
        let map = ProcessMap::new("root", vec![]);

        map.save_atomic(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = ProcessMap::load(&path).unwrap().unwrap();
        assert_eq!(loaded.root_process, "root");
        assert!(ProcessMap::load(dir.path().join("missing.json")).unwrap().is_none());
    }
}
