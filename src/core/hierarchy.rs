// src/core/hierarchy.rs

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AtlasError, Result};
use super::process_map::ProcessMap;
use super::warnings::{Warning, WarningKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HierarchyNodeType {
    Process,
    CallActivity,
}

/// Why expansion stopped at a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Diagnostic {
    /// `file` is already on the path; `path` lists the files from the root
    Cycle { file: String, path: Vec<String> },
    /// The target file has no entry in the map
    MissingSubprocess { file: String },
    DepthLimit { depth: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: HierarchyNodeType,
    /// File this node expands into; `None` for unresolved call activities
    pub bpmn_file: Option<String>,
    pub children: Vec<HierarchyNode>,
    /// Names of the ancestors, root first
    pub parent_path: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub diagnostic: Option<Diagnostic>,
}

impl HierarchyNode {
    /// Number of nodes in this subtree, self included
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(HierarchyNode::size).sum::<usize>()
    }

    /// Depth-first search by id
    pub fn find(&self, id: &str) -> Option<&HierarchyNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hierarchy {
    pub root: HierarchyNode,
    pub warnings: Vec<Warning>,
    /// Map files never reached from the root
    pub unreachable_files: Vec<String>,
}

#[derive(Debug, Clone)]
struct ArenaNode {
    parent: Option<usize>,
    id: String,
    name: String,
    node_type: HierarchyNodeType,
    bpmn_file: Option<String>,
    children: Vec<usize>,
    diagnostic: Option<Diagnostic>,
    depth: usize,
}

/// Flat node storage; parent links give each node its root path
#[derive(Debug, Clone, Default)]
pub struct HierarchyArena {
    nodes: Vec<ArenaNode>,
}

impl HierarchyArena {
    fn push(
        &mut self,
        parent: Option<usize>,
        id: String,
        name: String,
        node_type: HierarchyNodeType,
        bpmn_file: Option<String>,
    ) -> usize {
        let index = self.nodes.len();
        let depth = parent.map_or(0, |p| self.nodes[p].depth + 1);
        self.nodes.push(ArenaNode {
            parent,
            id,
            name,
            node_type,
            bpmn_file,
            children: Vec::new(),
            diagnostic: None,
            depth,
        });
        if let Some(p) = parent {
            self.nodes[p].children.push(index);
        }
        index
    }

    /// Start a new arena with a root node for `bpmn_file`
    pub fn with_root(id: impl Into<String>, name: impl Into<String>, bpmn_file: impl Into<String>) -> Self {
        let mut arena = Self::default();
        arena.push(None, id.into(), name.into(), HierarchyNodeType::Process, Some(bpmn_file.into()));
        arena
    }

    /// Add a call-activity node below `parent`
    pub fn add_call(
        &mut self,
        parent: usize,
        id: impl Into<String>,
        name: impl Into<String>,
        bpmn_file: Option<String>,
    ) -> usize {
        self.push(Some(parent), id.into(), name.into(), HierarchyNodeType::CallActivity, bpmn_file)
    }

    /// Files entered from the root down to `index`, root first
    pub fn path_files(&self, index: usize) -> Vec<String> {
        let mut files = Vec::new();
        let mut cursor = Some(index);
        while let Some(i) = cursor {
            if let Some(file) = &self.nodes[i].bpmn_file {
                files.push(file.clone());
            }
            cursor = self.nodes[i].parent;
        }
        files.reverse();
        files
    }

    /// Whether `file` was entered anywhere on the path from the root to `index`
    pub fn is_on_path(&self, index: usize, file: &str) -> bool {
        let mut cursor = Some(index);
        while let Some(i) = cursor {
            if self.nodes[i].bpmn_file.as_deref() == Some(file) {
                return true;
            }
            cursor = self.nodes[i].parent;
        }
        false
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn to_tree(&self, index: usize, parent_path: Vec<String>) -> HierarchyNode {
        let node = &self.nodes[index];
        let mut child_path = parent_path.clone();
        child_path.push(node.name.clone());

        HierarchyNode {
            id: node.id.clone(),
            name: node.name.clone(),
            node_type: node.node_type,
            bpmn_file: node.bpmn_file.clone(),
            children: node
                .children
                .iter()
                .map(|&c| self.to_tree(c, child_path.clone()))
                .collect(),
            parent_path,
            diagnostic: node.diagnostic.clone(),
        }
    }
}

/// Expands the map from the root file. A file is never re-entered on its own
/// root-to-node path; sibling paths expand the same file independently.
pub struct HierarchyAssembler {
    max_depth: usize,
}

impl HierarchyAssembler {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Assemble the tree below `root_file`. Cycles, missing subprocesses and
    /// the depth limit are diagnostics; only a missing root is an error.
    pub fn assemble(&self, map: &ProcessMap, root_file: &str) -> Result<Hierarchy> {
        let root_entry = map.entry(root_file).ok_or_else(|| AtlasError::RootMissing {
            root: root_file.to_string(),
            context: "process map".to_string(),
        })?;

        let mut arena = HierarchyArena::with_root(
            root_entry.process_id.clone(),
            root_entry.process_id.clone(),
            root_file,
        );
        let mut warnings = Vec::new();
        let mut reached: BTreeSet<String> = BTreeSet::new();
        let mut pending = vec![0usize];

        while let Some(index) = pending.pop() {
            let Some(file) = arena.nodes[index].bpmn_file.clone() else {
                continue;
            };

            let Some(entry) = map.entry(&file) else {
                warnings.push(
                    Warning::new(
                        WarningKind::MissingSubprocess,
                        format!("'{}' is linked but has no entry in the process map", file),
                    )
                    .in_file(&file)
                    .at_element(&arena.nodes[index].id),
                );
                arena.nodes[index].diagnostic = Some(Diagnostic::MissingSubprocess { file });
                continue;
            };
            reached.insert(file.clone());

            if arena.nodes[index].depth >= self.max_depth {
                let depth = arena.nodes[index].depth;
                warnings.push(
                    Warning::new(
                        WarningKind::DepthLimit,
                        format!("expansion stopped at depth {}", depth),
                    )
                    .in_file(&file),
                );
                arena.nodes[index].diagnostic = Some(Diagnostic::DepthLimit { depth });
                continue;
            }

            let mut expand = Vec::new();
            for link in &entry.call_activities {
                let child = arena.add_call(
                    index,
                    link.bpmn_element_id.clone(),
                    link.display_name().to_string(),
                    link.matched_subprocess_file.clone(),
                );

                let Some(target) = &link.matched_subprocess_file else {
                    continue;
                };
                if arena.is_on_path(index, target) {
                    let path = arena.path_files(index);
                    warnings.push(
                        Warning::new(
                            WarningKind::Cycle,
                            format!("'{}' re-enters '{}' (path: {})", link.display_name(), target, path.join(" -> ")),
                        )
                        .in_file(&link.bpmn_file)
                        .at_element(&link.bpmn_element_id),
                    );
                    arena.nodes[child].diagnostic = Some(Diagnostic::Cycle {
                        file: target.clone(),
                        path,
                    });
                } else {
                    expand.push(child);
                }
            }
            // Reverse so siblings are expanded in document order
            pending.extend(expand.into_iter().rev());
        }

        let unreachable_files = map
            .processes
            .iter()
            .map(|p| p.bpmn_file.clone())
            .filter(|f| !reached.contains(f))
            .collect();

        debug!("Assembled hierarchy with {} nodes", arena.len());

        Ok(Hierarchy {
            root: arena.to_tree(0, Vec::new()),
            warnings,
            unreachable_files,
        })
    }
}
