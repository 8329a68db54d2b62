// src/core/extractor.rs
use std::collections::BTreeMap;
use std::ops::Range;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::warnings::{Staged, Warning, WarningKind};

/// Kinds of BPMN nodes the extractor keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementKind {
    Process,
    UserTask,
    ServiceTask,
    BusinessRuleTask,
    /// Plain, script, manual, send and receive tasks
    Task,
    CallActivity,
    SubProcess,
    Gateway,
    Event,
}

impl ElementKind {
    /// Map an element's local tag name (namespace prefix already stripped)
    /// onto a kind. Case-insensitive.
    pub fn from_tag(local_name: &str) -> Option<Self> {
        let tag = local_name.to_ascii_lowercase();
        match tag.as_str() {
            "process" => Some(Self::Process),
            "usertask" => Some(Self::UserTask),
            "servicetask" => Some(Self::ServiceTask),
            "businessruletask" => Some(Self::BusinessRuleTask),
            "task" | "scripttask" | "manualtask" | "sendtask" | "receivetask" => Some(Self::Task),
            "callactivity" => Some(Self::CallActivity),
            "subprocess" | "adhocsubprocess" | "transaction" => Some(Self::SubProcess),
            t if t.ends_with("gateway") => Some(Self::Gateway),
            t if t.ends_with("event") => Some(Self::Event),
            _ => None,
        }
    }

    /// Nodes whose textual span defines a level of `parent_path`
    pub fn is_container(self) -> bool {
        matches!(self, Self::CallActivity | Self::SubProcess)
    }

    pub fn is_task(self) -> bool {
        matches!(
            self,
            Self::UserTask | Self::ServiceTask | Self::BusinessRuleTask | Self::Task
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Process => "Process",
            Self::UserTask => "UserTask",
            Self::ServiceTask => "ServiceTask",
            Self::BusinessRuleTask => "BusinessRuleTask",
            Self::Task => "Task",
            Self::CallActivity => "CallActivity",
            Self::SubProcess => "SubProcess",
            Self::Gateway => "Gateway",
            Self::Event => "Event",
        }
    }
}

/// One structural node of a BPMN file. Identity is `(file, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: String,

    /// Display name; empty when the XML has none
    pub name: String,

    #[serde(rename = "type")]
    pub kind: ElementKind,

    /// Names of enclosing call activities / subprocesses, outermost first
    pub parent_path: Vec<String>,

    /// Value of the `calledElement` attribute, if declared
    pub called_element: Option<String>,

    /// All attributes, keys lowercased and namespace prefix stripped
    pub attributes: BTreeMap<String, String>,
}

impl Element {
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Extraction result for a single BPMN file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFile {
    pub bpmn_file: String,

    /// Id of the first `process` element, if any
    pub process_id: Option<String>,

    /// SHA-256 of the raw content
    pub content_hash: String,

    /// Elements in document order
    pub elements: Vec<Element>,
}

impl ExtractedFile {
    pub fn call_activities(&self) -> impl Iterator<Item = &Element> {
        self.elements
            .iter()
            .filter(|e| e.kind == ElementKind::CallActivity)
    }

    pub fn task_count(&self) -> usize {
        self.elements.iter().filter(|e| e.kind.is_task()).count()
    }

    /// The process id, falling back to the file stem
    pub fn process_id_or_stem(&self) -> String {
        self.process_id
            .clone()
            .unwrap_or_else(|| file_stem(&self.bpmn_file).to_string())
    }
}

/// Strip the extension from a file name ("a.bpmn" -> "a")
pub fn file_stem(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => &file_name[..dot],
        _ => file_name,
    }
}

/// Open tag on the nesting stack
struct OpenTag {
    local_name: String,
    element: Option<usize>,
    start: usize,
}

/// Byte range of a closed container element
struct ContainerSpan {
    element: usize,
    range: Range<usize>,
}

/// Lenient streaming extractor for BPMN XML
#[derive(Debug, Default, Clone, Copy)]
pub struct ElementExtractor;

impl ElementExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract every file of a set. Files are processed in parallel and
    /// collected keyed by file name.
    pub fn extract_all(
        &self,
        files: &BTreeMap<String, String>,
    ) -> BTreeMap<String, Staged<ExtractedFile>> {
        files
            .par_iter()
            .map(|(name, xml)| (name.clone(), self.extract(name, xml)))
            .collect()
    }

    /// Extract the elements of one file. Never fails: malformed input
    /// yields fewer elements plus a `MalformedXml` warning.
    pub fn extract(&self, bpmn_file: &str, xml: &str) -> Staged<ExtractedFile> {
        let mut reader = Reader::from_str(xml);
        let config = reader.config_mut();
        config.trim_text(true);
        config.check_end_names = false;

        let mut elements: Vec<Element> = Vec::new();
        let mut starts: Vec<usize> = Vec::new();
        let mut open: Vec<OpenTag> = Vec::new();
        let mut spans: Vec<ContainerSpan> = Vec::new();
        let mut warnings = Vec::new();

        loop {
            let offset = reader.buffer_position() as usize;
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let element = self.push_element(&e, offset, &mut elements, &mut starts);
                    open.push(OpenTag {
                        local_name: local_name(&e),
                        element,
                        start: offset,
                    });
                }
                Ok(Event::Empty(e)) => {
                    self.push_element(&e, offset, &mut elements, &mut starts);
                }
                Ok(Event::End(e)) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase();
                    // Tags opened after the matching one are never closed and get no span
                    if let Some(pos) = open.iter().rposition(|t| t.local_name == name) {
                        open.truncate(pos + 1);
                        if let Some(tag) = open.pop() {
                            if let Some(index) = tag.element {
                                if elements[index].kind.is_container() {
                                    spans.push(ContainerSpan {
                                        element: index,
                                        range: tag.start..reader.buffer_position() as usize,
                                    });
                                }
                            }
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    warnings.push(
                        Warning::new(
                            WarningKind::MalformedXml,
                            format!(
                                "XML parse error at position {}: {}; {} element(s) kept",
                                reader.error_position(),
                                e,
                                elements.len()
                            ),
                        )
                        .in_file(bpmn_file),
                    );
                    break;
                }
                _ => {}
            }
        }

        assign_parent_paths(&mut elements, &starts, &spans);

        let process_id = elements
            .iter()
            .find(|e| e.kind == ElementKind::Process)
            .map(|e| e.id.clone());

        debug!("Extracted {} elements from {}", elements.len(), bpmn_file);

        Staged::new(
            ExtractedFile {
                bpmn_file: bpmn_file.to_string(),
                process_id,
                content_hash: calculate_hash(xml),
                elements,
            },
            warnings,
        )
    }

    /// Record a recognised element; returns its index
    fn push_element(
        &self,
        tag: &BytesStart<'_>,
        offset: usize,
        elements: &mut Vec<Element>,
        starts: &mut Vec<usize>,
    ) -> Option<usize> {
        let kind = ElementKind::from_tag(&local_name(tag))?;
        let attributes = read_attributes(tag);

        let Some(id) = attributes.get("id").filter(|id| !id.is_empty()).cloned() else {
            debug!("Skipping {} without id", kind.as_str());
            return None;
        };

        elements.push(Element {
            id,
            name: attributes.get("name").cloned().unwrap_or_default(),
            kind,
            parent_path: Vec::new(),
            called_element: attributes
                .get("calledelement")
                .filter(|v| !v.trim().is_empty())
                .cloned(),
            attributes,
        });
        starts.push(offset);
        Some(elements.len() - 1)
    }
}

fn local_name(tag: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(tag.local_name().as_ref()).to_ascii_lowercase()
}

/// Attributes with lowercased, prefix-free keys. Broken attributes are skipped.
fn read_attributes(tag: &BytesStart<'_>) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();
    let mut iter = tag.attributes();
    iter.with_checks(false);

    for attr in iter.flatten() {
        if attr.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_ascii_lowercase();
        let value = match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        attributes.entry(key).or_insert(value);
    }

    attributes
}

/// Fill `parent_path` from container span containment
fn assign_parent_paths(elements: &mut [Element], starts: &[usize], spans: &[ContainerSpan]) {
    if spans.is_empty() {
        return;
    }

    let mut ordered: Vec<(&ContainerSpan, String)> = spans
        .iter()
        .map(|s| (s, elements[s.element].display_name().to_string()))
        .collect();
    ordered.sort_by_key(|(s, _)| s.range.start);

    for (index, element) in elements.iter_mut().enumerate() {
        if element.kind == ElementKind::Process {
            continue;
        }
        let at = starts[index];
        element.parent_path = ordered
            .iter()
            .filter(|(s, _)| s.element != index && s.range.start < at && at < s.range.end)
            .map(|(_, name)| name.clone())
            .collect();
    }
}

/// Calculate SHA256 hash of content
pub fn calculate_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
