// src/core/differ.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::extractor::{ElementKind, ExtractedFile};
use super::process_map::ProcessMap;
use super::snapshot::Snapshot;
use super::warnings::Warning;

/// Metadata fields compared between the two sides, besides name and type
pub const COMPARED_FIELDS: &[&str] = &[
    "processId",
    "calledElement",
    "callActivityCount",
    "taskCount",
    "parentPath",
    "matchedSubprocessFile",
    "confidence",
    "needsManualReview",
];

/// One comparable node. Process nodes are keyed by file, elements by `file::id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffNode {
    pub node_key: String,
    pub bpmn_file: String,
    pub bpmn_element_id: String,
    pub node_type: String,
    pub node_name: String,
    pub metadata: BTreeMap<String, String>,
}

impl DiffNode {
    pub fn process_key(bpmn_file: &str) -> String {
        bpmn_file.to_string()
    }

    pub fn element_key(bpmn_file: &str, element_id: &str) -> String {
        format!("{}::{}", bpmn_file, element_id)
    }

    /// Value of a compared field
    fn field(&self, field: &str) -> Option<&str> {
        match field {
            "name" => Some(self.node_name.as_str()),
            "type" => Some(self.node_type.as_str()),
            other => self.metadata.get(other).map(String::as_str),
        }
    }

    /// Nodes of one snapshot: a process node per file plus one node per element.
    /// Call-activity nodes carry their link from `map` when one is given.
    pub fn collect(files: &BTreeMap<String, ExtractedFile>, map: Option<&ProcessMap>) -> Vec<DiffNode> {
        let mut nodes = Vec::new();

        for file in files.values() {
            let mut metadata = BTreeMap::new();
            metadata.insert("processId".to_string(), file.process_id_or_stem());
            metadata.insert(
                "callActivityCount".to_string(),
                file.call_activities().count().to_string(),
            );
            metadata.insert("taskCount".to_string(), file.task_count().to_string());

            nodes.push(DiffNode {
                node_key: Self::process_key(&file.bpmn_file),
                bpmn_file: file.bpmn_file.clone(),
                bpmn_element_id: file.process_id_or_stem(),
                node_type: ElementKind::Process.as_str().to_string(),
                node_name: file.process_id_or_stem(),
                metadata,
            });

            for element in file.elements.iter().filter(|e| e.kind != ElementKind::Process) {
                let mut metadata = BTreeMap::new();
                if let Some(called) = &element.called_element {
                    metadata.insert("calledElement".to_string(), called.clone());
                }
                if !element.parent_path.is_empty() {
                    metadata.insert("parentPath".to_string(), element.parent_path.join(" / "));
                }
                if element.kind == ElementKind::CallActivity {
                    if let Some(link) = map.and_then(|m| m.find_link(&file.bpmn_file, &element.id, None)) {
                        if let Some(target) = &link.matched_subprocess_file {
                            metadata.insert("matchedSubprocessFile".to_string(), target.clone());
                        }
                        metadata.insert("confidence".to_string(), link.confidence.to_string());
                        metadata.insert(
                            "needsManualReview".to_string(),
                            link.needs_manual_review.to_string(),
                        );
                    }
                }

                nodes.push(DiffNode {
                    node_key: Self::element_key(&file.bpmn_file, &element.id),
                    bpmn_file: file.bpmn_file.clone(),
                    bpmn_element_id: element.id.clone(),
                    node_type: element.kind.as_str().to_string(),
                    node_name: element.name.clone(),
                    metadata,
                });
            }
        }

        nodes
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Option<String>,
    pub new: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifiedNode {
    pub node: DiffNode,
    pub old_node: DiffNode,
    pub changes: BTreeMap<String, FieldChange>,
}

/// Every node key of either side lands in exactly one bucket. Buckets are
/// sorted by node key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub added: Vec<DiffNode>,
    pub removed: Vec<DiffNode>,
    pub modified: Vec<ModifiedNode>,
    pub unchanged: Vec<DiffNode>,
}

impl DiffResult {
    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty())
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len() + self.unchanged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The diff restricted to one file, with presentation flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDiff {
    pub bpmn_file: String,
    pub result: DiffResult,
    /// Every node added, nothing removed, modified or unchanged
    pub is_new_file: bool,
    /// Every node removed, nothing added, modified or unchanged
    pub is_removed_file: bool,
    /// Both sides have byte-identical content
    pub content_unchanged: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub unchanged: usize,
    pub new_files: usize,
    pub removed_files: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeReport {
    pub files: Vec<FileDiff>,
    pub summary: DiffSummary,
    pub warnings: Vec<Warning>,
}

/// Pure structural comparison of two node sets
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralDiffer;

impl StructuralDiffer {
    pub fn new() -> Self {
        Self
    }

    /// Partition the union of both key sets into the four buckets
    pub fn diff(&self, old: &[DiffNode], new: &[DiffNode]) -> DiffResult {
        let old_index = index(old);
        let new_index = index(new);
        let mut result = DiffResult::default();

        for (key, new_node) in &new_index {
            match old_index.get(key) {
                None => result.added.push((*new_node).clone()),
                Some(old_node) => {
                    let changes = compare(old_node, new_node);
                    if changes.is_empty() {
                        result.unchanged.push((*new_node).clone());
                    } else {
                        result.modified.push(ModifiedNode {
                            node: (*new_node).clone(),
                            old_node: (*old_node).clone(),
                            changes,
                        });
                    }
                }
            }
        }

        for (key, old_node) in &old_index {
            if !new_index.contains_key(key) {
                result.removed.push((*old_node).clone());
            }
        }

        result
    }

    /// Diff two snapshots and split the result per file
    pub fn compare_snapshots(&self, old: &Snapshot, new: &Snapshot, warnings: Vec<Warning>) -> ChangeReport {
        let old_nodes = DiffNode::collect(&old.files, old.map.as_ref());
        let new_nodes = DiffNode::collect(&new.files, new.map.as_ref());
        let result = self.diff(&old_nodes, &new_nodes);

        let files = split_by_file(result, |file| {
            matches!(
                (old.content_hash(file), new.content_hash(file)),
                (Some(a), Some(b)) if a == b
            )
        });

        let mut summary = DiffSummary::default();
        for file in &files {
            summary.added += file.result.added.len();
            summary.removed += file.result.removed.len();
            summary.modified += file.result.modified.len();
            summary.unchanged += file.result.unchanged.len();
            summary.new_files += usize::from(file.is_new_file);
            summary.removed_files += usize::from(file.is_removed_file);
        }

        ChangeReport {
            files,
            summary,
            warnings,
        }
    }
}

/// Key -> node. On duplicate keys the greatest node wins, so input order never matters.
fn index(nodes: &[DiffNode]) -> BTreeMap<&str, &DiffNode> {
    let mut index: BTreeMap<&str, &DiffNode> = BTreeMap::new();
    for node in nodes {
        index
            .entry(node.node_key.as_str())
            .and_modify(|existing| {
                if node > *existing {
                    *existing = node;
                }
            })
            .or_insert(node);
    }
    index
}

fn compare(old: &DiffNode, new: &DiffNode) -> BTreeMap<String, FieldChange> {
    ["name", "type"]
        .iter()
        .chain(COMPARED_FIELDS.iter())
        .filter_map(|field| {
            let (before, after) = (old.field(field), new.field(field));
            (before != after).then(|| {
                (
                    field.to_string(),
                    FieldChange {
                        old: before.map(str::to_string),
                        new: after.map(str::to_string),
                    },
                )
            })
        })
        .collect()
}

fn split_by_file(result: DiffResult, content_unchanged: impl Fn(&str) -> bool) -> Vec<FileDiff> {
    let mut per_file: BTreeMap<String, DiffResult> = BTreeMap::new();

    for node in result.added {
        per_file.entry(node.bpmn_file.clone()).or_default().added.push(node);
    }
    for node in result.removed {
        per_file.entry(node.bpmn_file.clone()).or_default().removed.push(node);
    }
    for node in result.modified {
        per_file.entry(node.node.bpmn_file.clone()).or_default().modified.push(node);
    }
    for node in result.unchanged {
        per_file.entry(node.bpmn_file.clone()).or_default().unchanged.push(node);
    }

    per_file
        .into_iter()
        .map(|(bpmn_file, result)| {
            let only_added = !result.added.is_empty()
                && result.removed.is_empty()
                && result.modified.is_empty()
                && result.unchanged.is_empty();
            let only_removed = !result.removed.is_empty()
                && result.added.is_empty()
                && result.modified.is_empty()
                && result.unchanged.is_empty();
            FileDiff {
                content_unchanged: content_unchanged(&bpmn_file),
                is_new_file: only_added,
                is_removed_file: only_removed,
                bpmn_file,
                result,
            }
        })
        .collect()
}
