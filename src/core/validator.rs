// src/core/validator.rs
use std::collections::BTreeSet;

use super::process_map::{CallActivityLink, ProcessMap};
use super::resolver::FileSet;
use super::warnings::{Warning, WarningKind};

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Links whose target file is not in the file set
    pub broken_references: Vec<CallActivityLink>,
    /// Files never targeted by a link, root excluded
    pub unused_files: Vec<String>,
    pub warnings: Vec<Warning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.broken_references.is_empty()
    }
}

/// Checks a process map against the files that actually exist
#[derive(Debug, Clone)]
pub struct MapValidator {
    root_file: String,
}

impl MapValidator {
    pub fn new(root_file: impl Into<String>) -> Self {
        Self {
            root_file: root_file.into(),
        }
    }

    /// The missing target, if the link points at a file outside `files`.
    /// Confidence plays no part: a High match can still name a deleted file.
    pub fn missing_target<'a>(&self, link: &'a CallActivityLink, files: &FileSet) -> Option<&'a str> {
        link.matched_subprocess_file
            .as_deref()
            .filter(|target| !files.contains(target))
    }

    /// Files that no link targets, excluding the root. Sorted.
    pub fn unused_files<'a>(
        &self,
        links: impl IntoIterator<Item = &'a CallActivityLink>,
        files: &FileSet,
    ) -> Vec<String> {
        let targeted: BTreeSet<&str> = links
            .into_iter()
            .filter_map(|l| l.matched_subprocess_file.as_deref())
            .collect();

        files
            .iter()
            .filter(|f| *f != self.root_file && !targeted.contains(f))
            .map(str::to_string)
            .collect()
    }

    pub fn unused_file_warning(&self, file: &str) -> Warning {
        Warning::new(
            WarningKind::UnusedFile,
            "file is not the target of any call activity and is not the root",
        )
        .in_file(file)
    }

    pub fn broken_reference_warning(&self, link: &CallActivityLink, missing: &str) -> Warning {
        Warning::new(
            WarningKind::BrokenReference,
            format!(
                "linked subprocess '{}' does not exist in the file set ({} confidence; {})",
                missing, link.confidence, link.reason
            ),
        )
        .in_file(&link.bpmn_file)
        .at_element(&link.bpmn_element_id)
    }

    /// Validate an already persisted map
    pub fn validate(&self, map: &ProcessMap, files: &FileSet) -> ValidationResult {
        let mut result = ValidationResult::default();

        for link in map.links() {
            if let Some(missing) = self.missing_target(link, files) {
                result.warnings.push(self.broken_reference_warning(link, missing));
                result.broken_references.push(link.clone());
            }
        }

        result.unused_files = self.unused_files(map.links(), files);
        for file in &result.unused_files {
            result.warnings.push(self.unused_file_warning(file));
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::process_map::{Confidence, ProcessEntry};

    fn link(target: &str) -> CallActivityLink {
        CallActivityLink {
            bpmn_file: "root.bpmn".into(),
            bpmn_element_id: format!("to-{}", target),
            bpmn_element_name: None,
            called_element_attr: Some(target.into()),
            matched_subprocess_file: Some(target.into()),
            confidence: Confidence::High,
            reason: "explicit".into(),
            needs_manual_review: false,
            manual_override: false,
        }
    }

    #[test]
    fn test_validate_reports_broken_and_unused() {
        let map = ProcessMap::new(
            "root",
            vec![ProcessEntry {
                bpmn_file: "root.bpmn".into(),
                process_id: "root".into(),
                call_activities: vec![link("a.bpmn"), link("deleted.bpmn")],
            }],
        );
        let files = FileSet::new(["root.bpmn", "a.bpmn", "util.bpmn"]);

        let result = MapValidator::new("root.bpmn").validate(&map, &files);
        assert!(!result.is_valid());
        assert_eq!(result.broken_references.len(), 1);
        assert_eq!(result.unused_files, vec!["util.bpmn"]);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::BrokenReference && w.element_id.as_deref() == Some("to-deleted.bpmn")));
    }
}
