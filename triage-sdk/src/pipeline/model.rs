//! Data carried through one triage run

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};
use crate::util::take_chars;

/// Characters of report text used as the fallback title
pub const FALLBACK_TITLE_CHARS: usize = 40;

/// An attached photo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: Option<String>,
}

impl Photo {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A field report, immutable once accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    text: String,
    machine_id: Option<String>,
    photo: Option<Photo>,
}

impl Report {
    /// Accept a report; the text must not be blank
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ServiceError::validation("No report text provided"));
        }

        Ok(Self {
            text,
            machine_id: None,
            photo: None,
        })
    }

    /// Blank machine ids are treated as absent
    pub fn with_machine_id(mut self, machine_id: impl Into<String>) -> Self {
        let machine_id = machine_id.into();
        let trimmed = machine_id.trim();
        self.machine_id = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    pub fn with_photo(mut self, photo: Photo) -> Self {
        self.photo = Some(photo);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn machine_id(&self) -> Option<&str> {
        self.machine_id.as_deref()
    }

    pub fn photo(&self) -> Option<&Photo> {
        self.photo.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Severity {
    Critical,
    Major,
    #[default]
    Minor,
}

impl Severity {
    /// Case-insensitive; anything unrecognized is `Minor`
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "major" => Severity::Major,
            "minor" => Severity::Minor,
            _ => Severity::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::Major => "Major",
            Severity::Minor => "Minor",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Category {
    Mechanical,
    Electrical,
    Software,
    Other,
    #[default]
    General,
}

impl Category {
    /// Case-insensitive; anything unrecognized is `General`
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "mechanical" => Category::Mechanical,
            "electrical" => Category::Electrical,
            "software" => Category::Software,
            "other" => Category::Other,
            "general" => Category::General,
            _ => Category::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Mechanical => "Mechanical",
            Category::Electrical => "Electrical",
            Category::Software => "Software",
            Category::Other => "Other",
            Category::General => "General",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a report. Always fully populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub severity: Severity,
    pub category: Category,
    pub title: String,
}

impl Classification {
    /// `Minor` / `General` with the first 40 characters of the report as title
    pub fn fallback(report_text: &str) -> Self {
        Self {
            severity: Severity::default(),
            category: Category::default(),
            title: fallback_title(report_text),
        }
    }
}

pub(crate) fn fallback_title(report_text: &str) -> String {
    let title = take_chars(report_text, FALLBACK_TITLE_CHARS);
    if title.trim().is_empty() {
        "Field report".to_string()
    } else {
        title
    }
}

/// Pipeline step a diagnostic belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classification,
    Upload,
    Session,
    Discovery,
    Execution,
    Attachment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// A note about something that happened during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub level: Level,
    pub message: String,
}

impl Diagnostic {
    pub fn info(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            level: Level::Info,
            message: message.into(),
        }
    }

    pub fn warning(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            level: Level::Warning,
            message: message.into(),
        }
    }

    pub fn error(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            level: Level::Error,
            message: message.into(),
        }
    }
}

/// What gets handed to a ticket backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDraft {
    pub title: String,
    pub description: String,
    pub attachment_url: Option<String>,
    pub classification: Classification,
}

impl TicketDraft {
    /// Title `[severity - category] title`, description is the report text
    /// plus a machine line when the report names one
    pub fn from_report(report: &Report, classification: Classification, attachment_url: Option<String>) -> Self {
        let title = format!(
            "[{} - {}] {}",
            classification.severity, classification.category, classification.title
        );

        let description = match report.machine_id() {
            Some(machine_id) => format!("{}\n\nMachine: {}", report.text(), machine_id),
            None => report.text().to_string(),
        };

        Self {
            title,
            description,
            attachment_url,
            classification,
        }
    }
}

/// What a ticket backend returns on success
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TicketReceipt {
    pub id: Option<String>,
    pub url: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Why a run failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    /// Stable error code, see `ServiceError::kind`
    pub kind: String,
    pub message: String,
}

impl From<&ServiceError> for FailureInfo {
    fn from(error: &ServiceError) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.root().to_string(),
        }
    }
}

/// The single result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    succeeded: bool,
    ticket_id: Option<String>,
    ticket_url: Option<String>,
    classification: Classification,
    diagnostics: Vec<Diagnostic>,
    failure: Option<FailureInfo>,
}

impl ExecutionOutcome {
    pub fn success(classification: Classification, receipt: TicketReceipt, mut diagnostics: Vec<Diagnostic>) -> Self {
        diagnostics.extend(receipt.diagnostics);
        Self {
            succeeded: true,
            ticket_id: receipt.id,
            ticket_url: receipt.url,
            classification,
            diagnostics,
            failure: None,
        }
    }

    pub fn failed(classification: Classification, error: &ServiceError, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            succeeded: false,
            ticket_id: None,
            ticket_url: None,
            classification,
            diagnostics,
            failure: Some(FailureInfo::from(error)),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn ticket_id(&self) -> Option<&str> {
        self.ticket_id.as_deref()
    }

    pub fn ticket_url(&self) -> Option<&str> {
        self.ticket_url.as_deref()
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn failure(&self) -> Option<&FailureInfo> {
        self.failure.as_ref()
    }

    /// Diagnostics recorded for one stage
    pub fn diagnostics_for(&self, stage: Stage) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.stage == stage)
    }
}

/// A previously filed report as listed from the ticket board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: String,
    pub name: String,
    pub desc: String,
    pub url: String,
    pub attachments: Vec<String>,
}
