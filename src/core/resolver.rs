// src/core/resolver.rs

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use tracing::debug;

use crate::config::ResolutionConfig;
use super::extractor::{file_stem, Element, ExtractedFile};
use super::process_map::{CallActivityLink, Confidence, ProcessMap};

/// Filename conventions for subprocess files
#[derive(Debug, Clone)]
pub struct NamingConvention {
    prefix: String,
    separator: String,
    extension: String,
}

impl NamingConvention {
    /// Prefix defaults to the root file stem ("mortgage.bpmn" -> "mortgage")
    pub fn new(config: &ResolutionConfig, root_file: &str) -> Self {
        Self {
            prefix: config
                .prefix
                .clone()
                .unwrap_or_else(|| file_stem(root_file).to_string()),
            separator: config.namespace_separator.clone(),
            extension: config.file_extension.trim_start_matches('.').to_string(),
        }
    }

    /// Candidate file names for a subprocess stem: namespaced form first, then bare
    pub fn candidates(&self, stem: &str) -> Vec<String> {
        let stem = stem.trim();
        if stem.is_empty() {
            return Vec::new();
        }

        let suffix = format!(".{}", self.extension);
        if stem.to_ascii_lowercase().ends_with(&suffix) {
            return vec![stem.to_string()];
        }

        let mut candidates = Vec::with_capacity(2);
        if !self.prefix.is_empty() {
            candidates.push(format!("{}{}{}{}", self.prefix, self.separator, stem, suffix));
        }
        candidates.push(format!("{}{}", stem, suffix));
        candidates
    }
}

/// The current file set, with case-insensitive fallback lookup
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    exact: BTreeSet<String>,
    lowercase: BTreeMap<String, String>,
}

impl FileSet {
    pub fn new<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for file in files {
            let file = file.into();
            set.lowercase.entry(file.to_lowercase()).or_insert_with(|| file.clone());
            set.exact.insert(file);
        }
        set
    }

    pub fn contains(&self, file: &str) -> bool {
        self.exact.contains(file)
    }

    /// Exact hit first, then case-insensitive
    pub fn lookup(&self, candidate: &str) -> Option<&str> {
        self.exact
            .get(candidate)
            .or_else(|| self.lowercase.get(&candidate.to_lowercase()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.exact.iter().map(String::as_str)
    }
}

/// Resolves call activities in rule order: explicit `calledElement`, prior map,
/// filename heuristic, unresolved
pub struct CallActivityResolver {
    naming: NamingConvention,
    whitespace: Regex,
}

impl CallActivityResolver {
    pub fn new(naming: NamingConvention) -> Self {
        Self {
            naming,
            whitespace: Regex::new(r"\s+").expect("Invalid whitespace regex"),
        }
    }

    /// Resolve every call activity of every file. Output is ordered by file
    /// name, then document order.
    pub fn resolve_all(
        &self,
        extracted: &BTreeMap<String, ExtractedFile>,
        prior: Option<&ProcessMap>,
    ) -> Vec<CallActivityLink> {
        let files = FileSet::new(extracted.keys().cloned());

        let links: Vec<CallActivityLink> = extracted
            .values()
            .flat_map(|file| {
                file.call_activities()
                    .map(|element| self.resolve(&file.bpmn_file, element, &files, prior))
                    .collect::<Vec<_>>()
            })
            .collect();

        debug!(
            "Resolved {} call activities ({} unresolved)",
            links.len(),
            links.iter().filter(|l| l.confidence == Confidence::None).count()
        );
        links
    }

    /// Resolve a single call activity
    pub fn resolve(
        &self,
        bpmn_file: &str,
        element: &Element,
        files: &FileSet,
        prior: Option<&ProcessMap>,
    ) -> CallActivityLink {
        let name = Some(element.name.clone()).filter(|n| !n.trim().is_empty());
        let link = |target: Option<&str>, confidence: Confidence, reason: String| CallActivityLink {
            bpmn_file: bpmn_file.to_string(),
            bpmn_element_id: element.id.clone(),
            bpmn_element_name: name.clone(),
            called_element_attr: element.called_element.clone(),
            matched_subprocess_file: target.map(str::to_string),
            confidence,
            reason,
            needs_manual_review: false,
            manual_override: false,
        };

        // Rule 1: explicit reference, terminal either way
        if let Some(called) = &element.called_element {
            let candidates = self.naming.candidates(called);
            if let Some(hit) = candidates.iter().find_map(|c| files.lookup(c)) {
                return link(
                    Some(hit),
                    Confidence::High,
                    format!("calledElement '{}' matched file '{}'", called, hit),
                );
            }
            return link(
                None,
                Confidence::None,
                format!(
                    "calledElement '{}' is declared but none of [{}] exists; broken explicit reference",
                    called,
                    candidates.join(", ")
                ),
            );
        }

        // Rule 2: continuity with the prior map
        let mut stale_note = String::new();
        if let Some(prior_link) =
            prior.and_then(|map| map.find_link(bpmn_file, &element.id, name.as_deref()))
        {
            let matched_by = if prior_link.bpmn_element_id == element.id { "id" } else { "name" };
            match prior_link.matched_subprocess_file.as_deref() {
                Some(target) if files.contains(target) => {
                    let confidence = if prior_link.called_element_attr.is_some() {
                        Confidence::High
                    } else {
                        Confidence::Medium
                    };
                    return link(
                        Some(target),
                        confidence,
                        format!(
                            "no calledElement; prior mapping of '{}' (matched by {}) to '{}' still valid",
                            prior_link.bpmn_element_id, matched_by, target
                        ),
                    );
                }
                Some(target) => {
                    stale_note = format!("; prior target '{}' no longer exists", target);
                }
                None => {}
            }
        }

        // Rule 3: name/id filename heuristic
        let forms = self.normalized_forms(&element.name, &element.id);
        let mut tried = Vec::new();
        for form in &forms {
            for candidate in self.naming.candidates(form) {
                if let Some(hit) = files.lookup(&candidate) {
                    if hit == bpmn_file {
                        continue;
                    }
                    return link(
                        Some(hit),
                        Confidence::Medium,
                        format!(
                            "no calledElement; normalized name/id '{}' matched file '{}'{}",
                            form, hit, stale_note
                        ),
                    );
                }
                tried.push(candidate);
            }
        }

        link(
            None,
            Confidence::None,
            format!(
                "no calledElement, no usable prior mapping{}, and none of [{}] exists",
                stale_note,
                tried.join(", ")
            ),
        )
    }

    /// Lowercased, whitespace-hyphenated forms of name then id, deduplicated
    fn normalized_forms(&self, name: &str, id: &str) -> Vec<String> {
        let mut forms: Vec<String> = Vec::new();
        for raw in [name, id] {
            let lowered = raw.trim().to_lowercase();
            if lowered.is_empty() {
                continue;
            }
            let hyphenated = self.whitespace.replace_all(&lowered, "-").into_owned();
            let underscored = hyphenated.replace('_', "-");
            for form in [hyphenated, underscored] {
                if !forms.contains(&form) {
                    forms.push(form);
                }
            }
        }
        forms
    }
}
