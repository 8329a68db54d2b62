// src/core/report.rs

use super::differ::{ChangeReport, FileDiff};
use super::hierarchy::{Diagnostic, Hierarchy, HierarchyNode};
use super::reconciler::ReconcileReport;

/// Render a change report as markdown
pub fn render_change_report(report: &ChangeReport, project: &str, generated_at: &str) -> String {
    let mut content = String::new();

    content.push_str(&format!(
        "---\n\
        report: bpmn_change_report\n\
        project: {}\n\
        generated_at: {}\n\
        files: {}\n\
        ---\n\n",
        project,
        generated_at,
        report.files.len()
    ));

    content.push_str("# BPMN change report\n\n");
    let s = &report.summary;
    content.push_str(&format!(
        "| Added | Removed | Modified | Unchanged | New files | Removed files |\n\
        |---|---|---|---|---|---|\n\
        | {} | {} | {} | {} | {} | {} |\n\n",
        s.added, s.removed, s.modified, s.unchanged, s.new_files, s.removed_files
    ));

    for file in report.files.iter().filter(|f| f.result.has_changes()) {
        render_file(&mut content, file);
    }

    let untouched: Vec<_> = report
        .files
        .iter()
        .filter(|f| !f.result.has_changes())
        .map(|f| {
            if f.content_unchanged {
                format!("`{}` (identical content)", f.bpmn_file)
            } else {
                format!("`{}`", f.bpmn_file)
            }
        })
        .collect();
    if !untouched.is_empty() {
        content.push_str("## Unchanged files\n\n");
        content.push_str(&untouched.join(", "));
        content.push_str("\n\n");
    }

    if !report.warnings.is_empty() {
        content.push_str("## Review items\n\n");
        for warning in &report.warnings {
            content.push_str(&format!("- {}\n", warning));
        }
        content.push('\n');
    }

    content
}

fn render_file(content: &mut String, file: &FileDiff) {
    let badge = if file.is_new_file {
        " (new file)"
    } else if file.is_removed_file {
        " (removed file)"
    } else {
        ""
    };
    content.push_str(&format!("## {}{}\n\n", file.bpmn_file, badge));

    for node in &file.result.added {
        content.push_str(&format!("- added {} `{}` {}\n", node.node_type, node.bpmn_element_id, node.node_name));
    }
    for node in &file.result.removed {
        content.push_str(&format!("- removed {} `{}` {}\n", node.node_type, node.bpmn_element_id, node.node_name));
    }
    for modified in &file.result.modified {
        content.push_str(&format!(
            "- modified {} `{}`\n",
            modified.node.node_type, modified.node.bpmn_element_id
        ));
        for (field, change) in &modified.changes {
            content.push_str(&format!(
                "  - {}: {} -> {}\n",
                field,
                change.old.as_deref().unwrap_or("(none)"),
                change.new.as_deref().unwrap_or("(none)")
            ));
        }
    }
    content.push('\n');
}

/// One-screen summary of a reconcile pass
pub fn render_reconcile_summary(report: &ReconcileReport) -> String {
    let c = &report.counters;
    let mut out = format!(
        "{} process(es): {} added, {} updated, {} removed, {} need review, {} broken reference(s), {} unused file(s)\n",
        report.map.processes.len(),
        c.added,
        c.updated,
        c.removed,
        c.needs_review,
        c.broken_references,
        c.unused_files
    );
    for warning in &report.warnings {
        out.push_str(&format!("  {}\n", warning));
    }
    out
}

/// Indented text tree
pub fn render_tree(hierarchy: &Hierarchy) -> String {
    let mut out = String::new();
    render_node(&mut out, &hierarchy.root, 0);
    if !hierarchy.unreachable_files.is_empty() {
        out.push_str(&format!(
            "\nUnreachable from root: {}\n",
            hierarchy.unreachable_files.join(", ")
        ));
    }
    out
}

fn render_node(out: &mut String, node: &HierarchyNode, depth: usize) {
    let target = node.bpmn_file.as_deref().unwrap_or("unresolved");
    let note = match &node.diagnostic {
        Some(Diagnostic::Cycle { file, .. }) => format!(" [cycle: re-enters {}]", file),
        Some(Diagnostic::MissingSubprocess { file }) => format!(" [missing: {}]", file),
        Some(Diagnostic::DepthLimit { depth }) => format!(" [depth limit {}]", depth),
        None => String::new(),
    };
    out.push_str(&format!("{}{} ({}){}\n", "  ".repeat(depth), node.name, target, note));
    for child in &node.children {
        render_node(out, child, depth + 1);
    }
}
