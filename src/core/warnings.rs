// src/core/warnings.rs

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningKind {
    MalformedXml,
    AmbiguousMatch,
    UnresolvedCallActivity,
    BrokenReference,
    UnusedFile,
    RemovedCallActivity,
    ManualOverrideReplaced,
    Cycle,
    MissingSubprocess,
    DepthLimit,
}

/// A recoverable data-quality finding. Never aborts a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub kind: WarningKind,
    pub bpmn_file: Option<String>,
    pub element_id: Option<String>,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            bpmn_file: None,
            element_id: None,
            message: message.into(),
        }
    }

    pub fn in_file(mut self, bpmn_file: impl Into<String>) -> Self {
        self.bpmn_file = Some(bpmn_file.into());
        self
    }

    pub fn at_element(mut self, element_id: impl Into<String>) -> Self {
        self.element_id = Some(element_id.into());
        self
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}]", self.kind)?;
        match (&self.bpmn_file, &self.element_id) {
            (Some(file), Some(id)) => write!(f, " {}#{}:", file, id)?,
            (Some(file), None) => write!(f, " {}:", file)?,
            (None, Some(id)) => write!(f, " #{}:", id)?,
            (None, None) => {}
        }
        write!(f, " {}", self.message)
    }
}

/// A stage result: the produced value together with the warnings raised
/// while producing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staged<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Staged<T> {
    pub fn new(value: T, warnings: Vec<Warning>) -> Self {
        Self { value, warnings }
    }

    pub fn clean(value: T) -> Self {
        Self::new(value, Vec::new())
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Staged<U> {
        Staged {
            value: f(self.value),
            warnings: self.warnings,
        }
    }

    /// Move the warnings into `sink` and return the bare value.
    pub fn drain_into(self, sink: &mut Vec<Warning>) -> T {
        sink.extend(self.warnings);
        self.value
    }
}
