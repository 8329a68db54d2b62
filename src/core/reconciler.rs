// src/core/reconciler.rs

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AtlasError, Result};
use super::extractor::ExtractedFile;
use super::process_map::{CallActivityLink, Confidence, ProcessEntry, ProcessMap};
use super::resolver::FileSet;
use super::validator::MapValidator;
use super::warnings::{Warning, WarningKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeCounters {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub needs_review: usize,
    pub broken_references: usize,
    pub unused_files: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub map: ProcessMap,
    pub warnings: Vec<Warning>,
    pub counters: ChangeCounters,
    pub unused_files: Vec<String>,
}

/// What happened to one call activity during a merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No prior entry, explicit or otherwise authoritative match
    NewHighConfidence(CallActivityLink),
    /// No prior entry, heuristic match; flagged for review
    NewMediumConfidence(CallActivityLink),
    /// No prior entry, nothing matched; flagged for review
    NewUnresolved(CallActivityLink),
    /// High-confidence match replaced a different prior target
    Updated {
        link: CallActivityLink,
        previous_target: Option<String>,
        replaced_override: bool,
    },
    /// New resolution agrees with the prior target
    Confirmed(CallActivityLink),
    /// Prior manual override kept against a weaker re-resolution
    OverrideRetained {
        link: CallActivityLink,
        candidate: Option<String>,
    },
    /// Prior target kept over a differing guess; flagged for review
    RetainedWithReview {
        link: CallActivityLink,
        candidate: Option<String>,
        confidence: Confidence,
    },
    /// Previously unresolved link picked up a heuristic match; flagged for review
    Adopted(CallActivityLink),
    /// Prior target kept although nothing re-confirmed it; flagged for review
    RetainedNoMatch(CallActivityLink),
    /// Final target, or a declared `calledElement`, does not exist in the file set
    Broken {
        link: CallActivityLink,
        missing_target: String,
        is_new: bool,
    },
}

impl MergeOutcome {
    pub fn link(&self) -> &CallActivityLink {
        match self {
            Self::NewHighConfidence(link)
            | Self::NewMediumConfidence(link)
            | Self::NewUnresolved(link)
            | Self::Confirmed(link)
            | Self::Adopted(link)
            | Self::RetainedNoMatch(link) => link,
            Self::Updated { link, .. }
            | Self::OverrideRetained { link, .. }
            | Self::RetainedWithReview { link, .. }
            | Self::Broken { link, .. } => link,
        }
    }

    pub fn into_link(self) -> CallActivityLink {
        match self {
            Self::NewHighConfidence(link)
            | Self::NewMediumConfidence(link)
            | Self::NewUnresolved(link)
            | Self::Confirmed(link)
            | Self::Adopted(link)
            | Self::RetainedNoMatch(link) => link,
            Self::Updated { link, .. }
            | Self::OverrideRetained { link, .. }
            | Self::RetainedWithReview { link, .. }
            | Self::Broken { link, .. } => link,
        }
    }
}

pub struct MapReconciler {
    root_file: String,
    validator: MapValidator,
}

impl MapReconciler {
    pub fn new(root_file: impl Into<String>) -> Self {
        let root_file = root_file.into();
        Self {
            validator: MapValidator::new(root_file.clone()),
            root_file,
        }
    }

    /// Build the new map from the current extraction, the freshly resolved
    /// links and the prior map (absent on a first run).
    pub fn reconcile(
        &self,
        extracted: &BTreeMap<String, ExtractedFile>,
        links: Vec<CallActivityLink>,
        prior: Option<&ProcessMap>,
    ) -> Result<ReconcileReport> {
        if extracted.is_empty() {
            return Err(AtlasError::NoFiles);
        }
        let root = extracted
            .get(&self.root_file)
            .ok_or_else(|| AtlasError::RootMissing {
                root: self.root_file.clone(),
                context: "file set".to_string(),
            })?;

        let files = FileSet::new(extracted.keys().cloned());
        let prior_links: BTreeMap<(&str, &str), &CallActivityLink> = prior
            .map(|map| map.links().map(|l| (l.key(), l)).collect())
            .unwrap_or_default();

        let mut counters = ChangeCounters::default();
        let mut warnings = Vec::new();
        let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
        let mut by_file: BTreeMap<String, Vec<CallActivityLink>> = BTreeMap::new();

        for link in links {
            if !files.contains(&link.bpmn_file) {
                debug!("Dropping link from unknown file {}", link.bpmn_file);
                continue;
            }
            let key = (link.bpmn_file.clone(), link.bpmn_element_id.clone());
            if !seen.insert(key.clone()) {
                debug!("Duplicate call activity {}#{}", key.0, key.1);
                continue;
            }

            let prior_link = prior_links.get(&(key.0.as_str(), key.1.as_str())).copied();
            let outcome = self.classify(link, prior_link, &files);
            self.account(&outcome, &mut counters, &mut warnings);

            let link = outcome.into_link();
            by_file.entry(link.bpmn_file.clone()).or_default().push(link);
        }

        for (key, prior_link) in &prior_links {
            if !seen.contains(&(key.0.to_string(), key.1.to_string())) {
                counters.removed += 1;
                warnings.push(
                    Warning::new(
                        WarningKind::RemovedCallActivity,
                        format!(
                            "call activity no longer exists; dropped its mapping to {}",
                            prior_link.matched_subprocess_file.as_deref().unwrap_or("nothing")
                        ),
                    )
                    .in_file(key.0)
                    .at_element(key.1),
                );
            }
        }

        let processes: Vec<ProcessEntry> = extracted
            .values()
            .map(|file| ProcessEntry {
                bpmn_file: file.bpmn_file.clone(),
                process_id: file.process_id_or_stem(),
                call_activities: by_file.remove(&file.bpmn_file).unwrap_or_default(),
            })
            .collect();
        let map = ProcessMap::new(root.process_id_or_stem(), processes);

        let unused_files = self.validator.unused_files(map.links(), &files);
        counters.unused_files = unused_files.len();
        for file in &unused_files {
            warnings.push(self.validator.unused_file_warning(file));
        }

        debug!("Reconciled map: {:?}", counters);

        Ok(ReconcileReport {
            map,
            warnings,
            counters,
            unused_files,
        })
    }

    /// Decide the merge outcome for one call activity
    pub fn classify(
        &self,
        new: CallActivityLink,
        prior: Option<&CallActivityLink>,
        files: &FileSet,
    ) -> MergeOutcome {
        // A declared calledElement that misses is broken, whatever the prior map says
        if new.matched_subprocess_file.is_none() {
            if let Some(called) = new.called_element_attr.clone() {
                return MergeOutcome::Broken {
                    missing_target: called,
                    is_new: prior.is_none(),
                    link: flagged(CallActivityLink {
                        confidence: Confidence::None,
                        manual_override: false,
                        ..new
                    }),
                };
            }
        }

        let merged = match prior {
            None => match new.confidence {
                Confidence::High => MergeOutcome::NewHighConfidence(new),
                Confidence::Medium | Confidence::Low => {
                    MergeOutcome::NewMediumConfidence(flagged(new))
                }
                Confidence::None => MergeOutcome::NewUnresolved(flagged(new)),
            },
            Some(prior) => {
                let same_target = new.matched_subprocess_file == prior.matched_subprocess_file;
                match new.confidence {
                    Confidence::High if !same_target => MergeOutcome::Updated {
                        previous_target: prior.matched_subprocess_file.clone(),
                        replaced_override: prior.manual_override,
                        link: CallActivityLink {
                            needs_manual_review: false,
                            manual_override: false,
                            ..new
                        },
                    },
                    Confidence::High => MergeOutcome::Confirmed(CallActivityLink {
                        needs_manual_review: false,
                        manual_override: prior.manual_override,
                        ..new
                    }),
                    Confidence::Medium | Confidence::Low if same_target => {
                        MergeOutcome::Confirmed(CallActivityLink {
                            needs_manual_review: prior.needs_manual_review,
                            manual_override: prior.manual_override,
                            ..new
                        })
                    }
                    _ if prior.manual_override => MergeOutcome::OverrideRetained {
                        candidate: new.matched_subprocess_file.clone(),
                        link: retain(prior, &new, prior.needs_manual_review),
                    },
                    Confidence::Medium | Confidence::Low
                        if prior.matched_subprocess_file.is_none() =>
                    {
                        MergeOutcome::Adopted(flagged(new))
                    }
                    Confidence::Medium | Confidence::Low => MergeOutcome::RetainedWithReview {
                        candidate: new.matched_subprocess_file.clone(),
                        confidence: new.confidence,
                        link: retain(prior, &new, true),
                    },
                    Confidence::None => MergeOutcome::RetainedNoMatch(retain(prior, &new, true)),
                }
            }
        };

        let missing = self
            .validator
            .missing_target(merged.link(), files)
            .map(str::to_string);
        match missing {
            Some(missing_target) => MergeOutcome::Broken {
                missing_target,
                is_new: prior.is_none(),
                link: flagged(merged.into_link()),
            },
            None => merged,
        }
    }

    fn account(&self, outcome: &MergeOutcome, counters: &mut ChangeCounters, warnings: &mut Vec<Warning>) {
        let link = outcome.link();
        let warn = |kind: WarningKind, message: String| {
            Warning::new(kind, message)
                .in_file(&link.bpmn_file)
                .at_element(&link.bpmn_element_id)
        };

        match outcome {
            MergeOutcome::NewHighConfidence(_) => {
                counters.added += 1;
            }
            MergeOutcome::NewMediumConfidence(link) => {
                counters.added += 1;
                counters.needs_review += 1;
                warnings.push(warn(
                    WarningKind::AmbiguousMatch,
                    format!(
                        "new call activity '{}' matched '{}' with {} confidence only; confirm the link ({})",
                        link.display_name(),
                        link.matched_subprocess_file.as_deref().unwrap_or("-"),
                        link.confidence,
                        link.reason
                    ),
                ));
            }
            MergeOutcome::NewUnresolved(link) => {
                counters.added += 1;
                counters.needs_review += 1;
                warnings.push(warn(
                    WarningKind::UnresolvedCallActivity,
                    format!(
                        "new call activity '{}' could not be resolved ({})",
                        link.display_name(),
                        link.reason
                    ),
                ));
            }
            MergeOutcome::Updated {
                link,
                previous_target,
                replaced_override,
            } => {
                counters.updated += 1;
                if *replaced_override {
                    warnings.push(warn(
                        WarningKind::ManualOverrideReplaced,
                        format!(
                            "manual mapping to '{}' replaced by explicit reference to '{}' ({})",
                            previous_target.as_deref().unwrap_or("-"),
                            link.matched_subprocess_file.as_deref().unwrap_or("-"),
                            link.reason
                        ),
                    ));
                }
            }
            MergeOutcome::Confirmed(link) => {
                if link.needs_manual_review {
                    counters.needs_review += 1;
                }
            }
            MergeOutcome::OverrideRetained { link, candidate } => {
                if link.needs_manual_review {
                    counters.needs_review += 1;
                }
                debug!(
                    "Kept manual mapping of {}#{} over candidate {:?}",
                    link.bpmn_file, link.bpmn_element_id, candidate
                );
            }
            MergeOutcome::RetainedWithReview {
                link,
                candidate,
                confidence,
            } => {
                counters.needs_review += 1;
                warnings.push(warn(
                    WarningKind::AmbiguousMatch,
                    format!(
                        "kept prior target '{}' instead of {} guess '{}'; review the link",
                        link.matched_subprocess_file.as_deref().unwrap_or("-"),
                        confidence,
                        candidate.as_deref().unwrap_or("-")
                    ),
                ));
            }
            MergeOutcome::Adopted(link) => {
                counters.updated += 1;
                counters.needs_review += 1;
                warnings.push(warn(
                    WarningKind::AmbiguousMatch,
                    format!(
                        "previously unresolved call activity '{}' now matches '{}' with {} confidence; confirm the link ({})",
                        link.display_name(),
                        link.matched_subprocess_file.as_deref().unwrap_or("-"),
                        link.confidence,
                        link.reason
                    ),
                ));
            }
            MergeOutcome::RetainedNoMatch(link) => {
                counters.needs_review += 1;
                warnings.push(warn(
                    WarningKind::UnresolvedCallActivity,
                    format!(
                        "prior target '{}' was not re-confirmed by any rule; kept it for review",
                        link.matched_subprocess_file.as_deref().unwrap_or("-")
                    ),
                ));
            }
            MergeOutcome::Broken {
                link,
                missing_target,
                is_new,
            } => {
                if *is_new {
                    counters.added += 1;
                }
                counters.broken_references += 1;
                counters.needs_review += 1;
                warnings.push(self.validator.broken_reference_warning(link, missing_target));
            }
        }
    }
}

fn flagged(link: CallActivityLink) -> CallActivityLink {
    CallActivityLink {
        needs_manual_review: true,
        ..link
    }
}

/// Keep the prior target, refreshing the descriptive fields from `new`
fn retain(prior: &CallActivityLink, new: &CallActivityLink, needs_review: bool) -> CallActivityLink {
    CallActivityLink {
        bpmn_file: new.bpmn_file.clone(),
        bpmn_element_id: new.bpmn_element_id.clone(),
        bpmn_element_name: new.bpmn_element_name.clone(),
        called_element_attr: new.called_element_attr.clone(),
        matched_subprocess_file: prior.matched_subprocess_file.clone(),
        confidence: prior.confidence,
        reason: format!(
            "retained prior mapping to '{}'; re-resolution: {}",
            prior.matched_subprocess_file.as_deref().unwrap_or("-"),
            new.reason
        ),
        needs_manual_review: needs_review,
        manual_override: prior.manual_override,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::extractor::ElementExtractor;

    fn extracted(files: &[&str]) -> BTreeMap<String, ExtractedFile> {
        let extractor = ElementExtractor::new();
        files
            .iter()
            .map(|f| {
                let xml = format!(r#"<process id="{}"/>"#, crate::core::extractor::file_stem(f));
                (f.to_string(), extractor.extract(f, &xml).value)
            })
            .collect()
    }

    fn link(id: &str, target: Option<&str>, confidence: Confidence) -> CallActivityLink {
        CallActivityLink {
            bpmn_file: "root.bpmn".into(),
            bpmn_element_id: id.into(),
            bpmn_element_name: Some(format!("Call {}", id)),
            called_element_attr: None,
            matched_subprocess_file: target.map(str::to_string),
            confidence,
            reason: format!("{} rule", confidence),
            needs_manual_review: false,
            manual_override: false,
        }
    }

    fn prior(links: Vec<CallActivityLink>) -> ProcessMap {
        ProcessMap::new(
            "root",
            vec![ProcessEntry {
                bpmn_file: "root.bpmn".into(),
                process_id: "root".into(),
                call_activities: links,
            }],
        )
    }

    fn reconciler() -> MapReconciler {
        MapReconciler::new("root.bpmn")
    }

    #[test]
    fn test_first_run_records_added_and_flags_medium() {
        let files = extracted(&["root.bpmn", "a.bpmn", "b.bpmn"]);
        let report = reconciler()
            .reconcile(
                &files,
                vec![
                    link("ca1", Some("a.bpmn"), Confidence::High),
                    link("ca2", Some("b.bpmn"), Confidence::Medium),
                    link("ca3", None, Confidence::None),
                ],
                None,
            )
            .unwrap();

        assert_eq!(report.counters.added, 3);
        assert_eq!(report.counters.needs_review, 2);
        assert_eq!(report.counters.updated, 0);
        assert_eq!(report.map.root_process, "root");

        let links: Vec<_> = report.map.links().collect();
        assert!(!links[0].needs_manual_review);
        assert!(links[1].needs_manual_review);
        assert!(links[2].needs_manual_review);
        assert!(report.warnings.iter().any(|w| w.kind == WarningKind::AmbiguousMatch));
        assert!(report.warnings.iter().any(|w| w.kind == WarningKind::UnresolvedCallActivity));
    }

    #[test]
    fn test_high_confidence_updates_differing_prior_target() {
        let files = extracted(&["root.bpmn", "old.bpmn", "new.bpmn"]);
        let old = prior(vec![link("ca1", Some("old.bpmn"), Confidence::Medium)]);

        let report = reconciler()
            .reconcile(&files, vec![link("ca1", Some("new.bpmn"), Confidence::High)], Some(&old))
            .unwrap();

        assert_eq!(report.counters.updated, 1);
        assert_eq!(report.counters.added, 0);
        let merged = report.map.links().next().unwrap();
        assert_eq!(merged.matched_subprocess_file.as_deref(), Some("new.bpmn"));
        assert!(!merged.needs_manual_review);
    }

    #[test]
    fn test_medium_guess_never_overwrites_prior_target() {
        let files = extracted(&["root.bpmn", "trusted.bpmn", "guess.bpmn"]);
        let old = prior(vec![link("ca1", Some("trusted.bpmn"), Confidence::High)]);

        let outcome = reconciler().classify(
            link("ca1", Some("guess.bpmn"), Confidence::Medium),
            old.links().next(),
            &FileSet::new(files.keys().cloned()),
        );
        match &outcome {
            MergeOutcome::RetainedWithReview { link, candidate, confidence } => {
                assert_eq!(link.matched_subprocess_file.as_deref(), Some("trusted.bpmn"));
                assert_eq!(candidate.as_deref(), Some("guess.bpmn"));
                assert_eq!(*confidence, Confidence::Medium);
                assert!(link.needs_manual_review);
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let report = reconciler()
            .reconcile(&files, vec![link("ca1", Some("guess.bpmn"), Confidence::Medium)], Some(&old))
            .unwrap();
        assert_eq!(report.counters.needs_review, 1);
        assert_eq!(report.counters.updated, 0);
        assert!(report.warnings.iter().any(|w| w.kind == WarningKind::AmbiguousMatch
            && w.message.contains("trusted.bpmn")
            && w.message.contains("guess.bpmn")));
    }

    #[test]
    fn test_no_new_match_keeps_prior_and_flags() {
        let files = extracted(&["root.bpmn", "a.bpmn"]);
        let old = prior(vec![link("ca1", Some("a.bpmn"), Confidence::Medium)]);

        let report = reconciler()
            .reconcile(&files, vec![link("ca1", None, Confidence::None)], Some(&old))
            .unwrap();

        let merged = report.map.links().next().unwrap();
        assert_eq!(merged.matched_subprocess_file.as_deref(), Some("a.bpmn"));
        assert!(merged.needs_manual_review);
        assert_eq!(report.counters.needs_review, 1);
        assert!(report.unused_files.is_empty());
    }

    #[test]
    fn test_deleted_high_confidence_target_is_broken() {
        let files = extracted(&["root.bpmn"]);
        let mut explicit = link("ca1", Some("deleted.bpmn"), Confidence::High);
        explicit.called_element_attr = Some("deleted".into());
        let old = prior(vec![explicit]);

        let mut rerun = link("ca1", None, Confidence::None);
        rerun.called_element_attr = Some("deleted".into());

        let report = reconciler().reconcile(&files, vec![rerun], Some(&old)).unwrap();
        assert_eq!(report.counters.broken_references, 1);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::BrokenReference && w.element_id.as_deref() == Some("ca1")));
    }

    #[test]
    fn test_missing_called_element_on_new_link_is_broken() {
        let files = extracted(&["root.bpmn", "household.bpmn"]);
        let mut explicit = link("ca1", None, Confidence::None);
        explicit.called_element_attr = Some("household-v2".into());

        let report = reconciler().reconcile(&files, vec![explicit], None).unwrap();
        assert_eq!(report.counters.broken_references, 1);
        assert_eq!(report.counters.added, 1);
        assert!(report.warnings.iter().any(|w| w.kind == WarningKind::BrokenReference
            && w.message.contains("household-v2")));
        assert!(!report.warnings.iter().any(|w| w.kind == WarningKind::UnresolvedCallActivity));
        assert!(report.map.links().next().unwrap().needs_manual_review);
    }

    #[test]
    fn test_changed_called_element_does_not_keep_stale_target() {
        let files = extracted(&["root.bpmn", "household.bpmn"]);
        let mut before = link("ca1", Some("household.bpmn"), Confidence::High);
        before.called_element_attr = Some("household".into());
        let old = prior(vec![before]);

        let mut after = link("ca1", None, Confidence::None);
        after.called_element_attr = Some("household-v2".into());

        let report = reconciler().reconcile(&files, vec![after], Some(&old)).unwrap();
        let merged = report.map.links().next().unwrap();
        assert_eq!(merged.matched_subprocess_file, None);
        assert_eq!(merged.confidence, Confidence::None);
        assert_eq!(merged.called_element_attr.as_deref(), Some("household-v2"));
        assert!(merged.needs_manual_review);
        assert_eq!(report.counters.broken_references, 1);
        assert_eq!(report.counters.added, 0);
    }

    #[test]
    fn test_unresolved_prior_adopts_new_guess_for_review() {
        let files = extracted(&["root.bpmn", "household.bpmn"]);
        let old = prior(vec![link("ca1", None, Confidence::None)]);

        let report = reconciler()
            .reconcile(&files, vec![link("ca1", Some("household.bpmn"), Confidence::Medium)], Some(&old))
            .unwrap();
        let merged = report.map.links().next().unwrap();
        assert_eq!(merged.matched_subprocess_file.as_deref(), Some("household.bpmn"));
        assert!(merged.needs_manual_review);
        assert_eq!(report.counters.updated, 1);
        assert_eq!(report.counters.needs_review, 1);
        assert!(report.unused_files.is_empty());
        assert!(!report.warnings.iter().any(|w| w.message.contains("kept prior target")));
    }

    #[test]
    fn test_low_guess_is_labelled_low() {
        let files = extracted(&["root.bpmn", "trusted.bpmn", "guess.bpmn"]);
        let old = prior(vec![link("ca1", Some("trusted.bpmn"), Confidence::High)]);

        let report = reconciler()
            .reconcile(&files, vec![link("ca1", Some("guess.bpmn"), Confidence::Low)], Some(&old))
            .unwrap();
        assert!(report
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::AmbiguousMatch && w.message.contains("low guess")));
    }

    #[test]
    fn test_broken_check_applies_to_high_confidence_new_links() {
        let files = FileSet::new(["root.bpmn"]);
        let outcome = reconciler().classify(link("ca1", Some("ghost.bpmn"), Confidence::High), None, &files);
        assert!(matches!(outcome, MergeOutcome::Broken { is_new: true, .. }));
        assert!(outcome.link().needs_manual_review);
    }

    #[test]
    fn test_manual_override_survives_guesses_but_not_explicit_references() {
        let files = extracted(&["root.bpmn", "manual.bpmn", "guess.bpmn", "explicit.bpmn"]);
        let mut manual = link("ca1", Some("manual.bpmn"), Confidence::High);
        manual.manual_override = true;
        let old = prior(vec![manual]);

        let guessed = reconciler()
            .reconcile(&files, vec![link("ca1", Some("guess.bpmn"), Confidence::Medium)], Some(&old))
            .unwrap();
        let kept = guessed.map.links().next().unwrap();
        assert_eq!(kept.matched_subprocess_file.as_deref(), Some("manual.bpmn"));
        assert!(kept.manual_override);
        assert!(!kept.needs_manual_review);
        assert_eq!(guessed.counters.needs_review, 0);

        let explicit = reconciler()
            .reconcile(&files, vec![link("ca1", Some("explicit.bpmn"), Confidence::High)], Some(&old))
            .unwrap();
        let replaced = explicit.map.links().next().unwrap();
        assert_eq!(replaced.matched_subprocess_file.as_deref(), Some("explicit.bpmn"));
        assert!(explicit.warnings.iter().any(|w| w.kind == WarningKind::ManualOverrideReplaced));
    }

    #[test]
    fn test_removed_call_activities_and_unused_files() {
        let files = extracted(&["root.bpmn", "a.bpmn", "leaf.bpmn"]);
        let old = prior(vec![
            link("ca1", Some("a.bpmn"), Confidence::High),
            link("gone", Some("a.bpmn"), Confidence::High),
        ]);

        let report = reconciler()
            .reconcile(&files, vec![link("ca1", Some("a.bpmn"), Confidence::High)], Some(&old))
            .unwrap();
        assert_eq!(report.counters.removed, 1);
        assert_eq!(report.unused_files, vec!["leaf.bpmn"]);
        assert_eq!(report.counters.unused_files, 1);
    }

    #[test]
    fn test_reconcile_is_deterministic() {
        let files = extracted(&["root.bpmn", "a.bpmn", "b.bpmn"]);
        let old = prior(vec![link("ca1", Some("a.bpmn"), Confidence::Medium)]);
        let links = vec![
            link("ca1", Some("b.bpmn"), Confidence::Medium),
            link("ca2", Some("b.bpmn"), Confidence::High),
        ];

        let first = reconciler().reconcile(&files, links.clone(), Some(&old)).unwrap();
        let second = reconciler().reconcile(&files, links, Some(&old)).unwrap();
        assert_eq!(first.map.processes, second.map.processes);
        assert_eq!(first.warnings, second.warnings);
        assert_eq!(first.counters, second.counters);
    }

    #[test]
    fn test_fatal_inputs() {
        let empty = BTreeMap::new();
        assert!(matches!(reconciler().reconcile(&empty, vec![], None), Err(AtlasError::NoFiles)));

        let files = extracted(&["a.bpmn"]);
        assert!(matches!(
            reconciler().reconcile(&files, vec![], None),
            Err(AtlasError::RootMissing { .. })
        ));
    }
}
