use std::collections::BTreeMap;

use bpmn_atlas::config::Config;
use bpmn_atlas::core::{
    reconcile_sources, Confidence, Diagnostic, HierarchyAssembler, ProcessMap, StructuralDiffer,
    WarningKind,
};

fn sources(files: &[(&str, &str)]) -> BTreeMap<String, String> {
    files
        .iter()
        .map(|(name, xml)| (name.to_string(), xml.to_string()))
        .collect()
}

const MORTGAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL" id="defs">
  <bpmn:process id="mortgage" isExecutable="false">
    <bpmn:startEvent id="start" />
    <bpmn:callActivity id="credit-evaluation" name="Credit evaluation" calledElement="credit-evaluation" />
    <bpmn:callActivity id="Activity_0x1" name="Object" />
    <bpmn:endEvent id="end" />
  </bpmn:process>
</bpmn:definitions>"#;

#[test]
fn mortgage_scenario_resolves_explicit_reference_with_high_confidence() {
    let files = sources(&[
        ("mortgage.bpmn", MORTGAGE),
        ("mortgage-se-credit-evaluation.bpmn", r#"<process id="credit-evaluation"/>"#),
        ("mortgage-se-object.bpmn", r#"<process id="object"/>"#),
    ]);

    let output = reconcile_sources(&Config::default(), &files, "mortgage.bpmn", None).unwrap();
    let links: Vec<_> = output.report.map.links().collect();

    let credit = links.iter().find(|l| l.bpmn_element_id == "credit-evaluation").unwrap();
    assert_eq!(
        credit.matched_subprocess_file.as_deref(),
        Some("mortgage-se-credit-evaluation.bpmn")
    );
    assert_eq!(credit.confidence, Confidence::High);

    let object = links.iter().find(|l| l.bpmn_element_id == "Activity_0x1").unwrap();
    assert_eq!(object.confidence, Confidence::Medium);
    assert!(object.needs_manual_review);
    assert_eq!(output.report.map.root_process, "mortgage");
}

#[test]
fn reconciling_twice_with_the_same_inputs_is_idempotent() {
    let files = sources(&[
        ("mortgage.bpmn", MORTGAGE),
        ("mortgage-se-credit-evaluation.bpmn", r#"<process id="credit-evaluation"/>"#),
        ("mortgage-se-object.bpmn", r#"<process id="object"/>"#),
        ("helper.bpmn", r#"<process id="helper"/>"#),
    ]);
    let prior = reconcile_sources(&Config::default(), &files, "mortgage.bpmn", None)
        .unwrap()
        .report
        .map;

    let first = reconcile_sources(&Config::default(), &files, "mortgage.bpmn", Some(&prior)).unwrap();
    let second = reconcile_sources(&Config::default(), &files, "mortgage.bpmn", Some(&prior)).unwrap();

    assert_eq!(first.report.map.processes, second.report.map.processes);
    assert_eq!(first.report.counters.added, 0);
    assert_eq!(first.report.unused_files, vec!["helper.bpmn"]);
}

#[test]
fn deleting_an_explicit_target_reports_a_broken_reference() {
    let before = sources(&[
        ("mortgage.bpmn", MORTGAGE),
        ("mortgage-se-credit-evaluation.bpmn", r#"<process id="credit-evaluation"/>"#),
        ("mortgage-se-object.bpmn", r#"<process id="object"/>"#),
    ]);
    let prior = reconcile_sources(&Config::default(), &before, "mortgage.bpmn", None)
        .unwrap()
        .report
        .map;

    let after = sources(&[
        ("mortgage.bpmn", MORTGAGE),
        ("mortgage-se-object.bpmn", r#"<process id="object"/>"#),
    ]);
    let report = reconcile_sources(&Config::default(), &after, "mortgage.bpmn", Some(&prior))
        .unwrap()
        .report;

    assert_eq!(report.counters.broken_references, 1);
    assert!(report.warnings.iter().any(|w| w.kind == WarningKind::BrokenReference
        && w.element_id.as_deref() == Some("credit-evaluation")));
}

#[test]
fn cyclic_map_assembles_into_a_finite_tree() {
    let files = sources(&[
        ("a.bpmn", r#"<process id="a"><callActivity id="call-b" calledElement="b"/></process>"#),
        ("b.bpmn", r#"<process id="b"><callActivity id="call-a" calledElement="a"/></process>"#),
    ]);
    let mut config = Config::default();
    config.resolution.prefix = Some(String::new());

    let map: ProcessMap = reconcile_sources(&config, &files, "a.bpmn", None).unwrap().report.map;
    let hierarchy = HierarchyAssembler::new(config.hierarchy.max_depth)
        .assemble(&map, "a.bpmn")
        .unwrap();

    let back_edge = hierarchy.root.find("call-a").unwrap();
    assert!(matches!(back_edge.diagnostic, Some(Diagnostic::Cycle { .. })));
    assert_eq!(hierarchy.root.size(), 3);
}

#[test]
fn renamed_task_shows_up_as_a_field_change() {
    let old = reconcile_sources(
        &Config::default(),
        &sources(&[("a.bpmn", r#"<process id="a"><userTask id="t1" name="Review"/></process>"#)]),
        "a.bpmn",
        None,
    )
    .unwrap();
    let new = reconcile_sources(
        &Config::default(),
        &sources(&[(
            "a.bpmn",
            r#"<process id="a"><userTask id="t1" name="Review Application"/></process>"#,
        )]),
        "a.bpmn",
        Some(&old.report.map),
    )
    .unwrap();

    let report = StructuralDiffer::new().compare_snapshots(&old.snapshot, &new.snapshot, new.report.warnings);
    let modified = &report.files[0].result.modified;
    assert_eq!(modified.len(), 1);
    assert_eq!(modified[0].node.bpmn_element_id, "t1");
    let change = &modified[0].changes["name"];
    assert_eq!(change.old.as_deref(), Some("Review"));
    assert_eq!(change.new.as_deref(), Some("Review Application"));
}

#[test]
fn retargeting_called_element_to_a_missing_file_is_broken() {
    let v1 = r#"<process id="mortgage"><callActivity id="ca" calledElement="household"/></process>"#;
    let v2 = r#"<process id="mortgage"><callActivity id="ca" calledElement="household-v2"/></process>"#;
    let household = ("mortgage-se-household.bpmn", r#"<process id="household"/>"#);

    let prior = reconcile_sources(
        &Config::default(),
        &sources(&[("mortgage.bpmn", v1), household]),
        "mortgage.bpmn",
        None,
    )
    .unwrap()
    .report
    .map;
    let report = reconcile_sources(
        &Config::default(),
        &sources(&[("mortgage.bpmn", v2), household]),
        "mortgage.bpmn",
        Some(&prior),
    )
    .unwrap()
    .report;

    let link = report.map.links().next().unwrap();
    assert_eq!(link.matched_subprocess_file, None);
    assert_eq!(link.confidence, Confidence::None);
    assert_eq!(report.counters.broken_references, 1);
    assert!(report.warnings.iter().any(|w| w.kind == WarningKind::BrokenReference));
    assert_eq!(report.unused_files, vec!["mortgage-se-household.bpmn"]);
}
