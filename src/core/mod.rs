// src/core/mod.rs
mod engine;
mod extractor;
mod resolver;
mod process_map;
mod reconciler;
mod validator;
mod differ;
mod hierarchy;
mod snapshot;
mod report;
mod warnings;

pub use extractor::{calculate_hash, file_stem, Element, ElementExtractor, ElementKind, ExtractedFile};
pub use resolver::{CallActivityResolver, FileSet, NamingConvention};
pub use process_map::{CallActivityLink, Confidence, ProcessEntry, ProcessMap};
pub use reconciler::{ChangeCounters, MapReconciler, MergeOutcome, ReconcileReport};
pub use validator::{MapValidator, ValidationResult};
pub use differ::{
    ChangeReport, DiffNode, DiffResult, DiffSummary, FieldChange, FileDiff, ModifiedNode,
    StructuralDiffer, COMPARED_FIELDS,
};
pub use hierarchy::{
    Diagnostic, Hierarchy, HierarchyArena, HierarchyAssembler, HierarchyNode, HierarchyNodeType,
};
pub use snapshot::{load_sources, Snapshot};
pub use report::{render_change_report, render_reconcile_summary, render_tree};
pub use warnings::{Staged, Warning, WarningKind};

// Export the main engine
pub use engine::{reconcile_sources, Engine, PipelineOutput};
