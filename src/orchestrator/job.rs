//! Per-upload job state.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyze::{Ambiguity, ClassifiedDocument, Section};
use crate::error::Error;
use crate::model::{Document, Reference};
use crate::package::Package;
use crate::render::RenderWarning;
use crate::template::Template;

/// Identifier of an uploaded file.
pub type FileId = String;

/// Media type of a rendered package.
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Processing stage of a job.
///
/// A job only moves forward through the stages, or into `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Bytes stored, nothing parsed yet
    Uploaded,
    /// Package opened and document model built
    Built,
    /// Blocks classified and references extracted
    Classified,
    /// A template has been selected
    Templated,
    /// Output package rendered
    Rendered,
    /// Output fetched at least once
    Fetched,
    /// A fatal error ended the job
    Failed,
}

impl Stage {
    /// Lowercase stage name.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Uploaded => "uploaded",
            Stage::Built => "built",
            Stage::Classified => "classified",
            Stage::Templated => "templated",
            Stage::Rendered => "rendered",
            Stage::Fetched => "fetched",
            Stage::Failed => "failed",
        }
    }

    /// Whether the document has been classified.
    pub fn is_analyzed(&self) -> bool {
        matches!(
            self,
            Stage::Classified | Stage::Templated | Stage::Rendered | Stage::Fetched
        )
    }

    /// Whether output bytes are available.
    pub fn has_output(&self) -> bool {
        matches!(self, Stage::Rendered | Stage::Fetched)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Work currently running on a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    /// Opening the package and building the document model
    Build,
    /// Classifying blocks
    Classify,
    /// Rendering the output package
    Render,
}

impl Activity {
    /// Lowercase activity name, also used as the budget stage name.
    pub fn name(&self) -> &'static str {
        match self {
            Activity::Build => "build",
            Activity::Classify => "classify",
            Activity::Render => "render",
        }
    }
}

/// Why a stage failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    /// The work that failed
    pub activity: Activity,
    /// Stable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// When the failure happened
    pub at: DateTime<Utc>,
}

impl FailureReason {
    /// Record an error raised by an activity.
    pub fn new(activity: Activity, error: &Error) -> Self {
        Self {
            activity,
            code: error.code().to_string(),
            message: error.to_string(),
            at: Utc::now(),
        }
    }
}

/// Serializable snapshot of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    /// File identifier
    pub file_id: FileId,
    /// Current stage
    pub stage: Stage,
    /// Work running right now
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_flight: Option<Activity>,
    /// Selected template name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Rendering warnings
    pub warnings: Vec<RenderWarning>,
    /// Last retryable error (the stage did not change)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<FailureReason>,
    /// Fatal error (the job is `Failed`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
    /// Upload time
    pub created_at: DateTime<Utc>,
    /// Last stage change
    pub updated_at: DateTime<Utc>,
    /// First fetch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Analysis results of a classified job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    /// File identifier
    pub file_id: FileId,
    /// Title text, if a title was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Section outline
    pub sections: Vec<Section>,
    /// Number of blocks per label
    pub label_counts: BTreeMap<String, usize>,
    /// Number of in-text citations
    pub citation_count: usize,
    /// Extracted references in source order
    pub references: Vec<Reference>,
    /// Classification notes
    pub ambiguities: Vec<Ambiguity>,
}

impl Analysis {
    pub(crate) fn new(file_id: &str, classified: &ClassifiedDocument, references: &[Reference]) -> Self {
        Self {
            file_id: file_id.to_string(),
            title: classified.title(),
            sections: classified.sections.clone(),
            label_counts: classified.label_counts(),
            citation_count: classified.citations.len(),
            references: references.to_vec(),
            ambiguities: classified.ambiguities.clone(),
        }
    }
}

/// A rendered package ready for download.
#[derive(Debug, Clone)]
pub struct Download {
    /// Suggested file name, `formatted_{template}_{fileId}.docx`
    pub file_name: String,
    /// Media type
    pub content_type: &'static str,
    /// Package bytes
    pub bytes: Arc<[u8]>,
}

/// One upload moving through the pipeline.
#[derive(Debug)]
pub(crate) struct Job {
    pub id: FileId,
    pub stage: Stage,
    pub in_flight: Option<Activity>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub created: Instant,
    pub fetched: Option<Instant>,
    pub input: Arc<[u8]>,
    pub package: Option<Arc<Package>>,
    pub document: Option<Arc<Document>>,
    pub classified: Option<Arc<ClassifiedDocument>>,
    pub references: Option<Arc<Vec<Reference>>>,
    pub template: Option<Arc<Template>>,
    pub output: Option<Arc<[u8]>>,
    pub warnings: Vec<RenderWarning>,
    pub last_error: Option<FailureReason>,
    pub failure: Option<FailureReason>,
    pub cancel: Arc<AtomicBool>,
    /// Id chosen by the caller rather than generated
    pub caller_id: bool,
}

impl Job {
    pub fn new(id: FileId, input: Arc<[u8]>) -> Self {
        let now = Utc::now();
        Self {
            id,
            stage: Stage::Uploaded,
            in_flight: None,
            created_at: now,
            updated_at: now,
            fetched_at: None,
            created: Instant::now(),
            fetched: None,
            input,
            package: None,
            document: None,
            classified: None,
            references: None,
            template: None,
            output: None,
            warnings: Vec::new(),
            last_error: None,
            failure: None,
            cancel: Arc::new(AtomicBool::new(false)),
            caller_id: false,
        }
    }

    /// Mark the id as caller-issued.
    pub fn with_caller_id(mut self) -> Self {
        self.caller_id = true;
        self
    }

    /// Move to a later stage.
    pub fn advance(&mut self, stage: Stage) {
        debug_assert!(stage >= self.stage && self.stage != Stage::Failed);
        log::debug!("job {}: {} -> {}", self.id, self.stage, stage);
        self.stage = stage;
        self.updated_at = Utc::now();
    }

    /// Record a fatal error and end the job. Intermediate artifacts are dropped.
    pub fn fail(&mut self, activity: Activity, error: &Error) {
        log::warn!("job {} failed during {}: {}", self.id, activity.name(), error);
        self.failure = Some(FailureReason::new(activity, error));
        self.stage = Stage::Failed;
        self.updated_at = Utc::now();
        self.package = None;
        self.document = None;
        self.classified = None;
        self.output = None;
    }

    /// Mark the first fetch.
    pub fn mark_fetched(&mut self) {
        if self.fetched.is_none() {
            self.fetched = Some(Instant::now());
            self.fetched_at = Some(Utc::now());
        }
        if self.stage == Stage::Rendered {
            self.advance(Stage::Fetched);
        }
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            file_id: self.id.clone(),
            stage: self.stage,
            in_flight: self.in_flight,
            template: self.template.as_ref().map(|t| t.name.clone()),
            warnings: self.warnings.clone(),
            last_error: self.last_error.clone(),
            failure: self.failure.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            fetched_at: self.fetched_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_and_names() {
        assert!(Stage::Uploaded < Stage::Built);
        assert!(Stage::Rendered < Stage::Fetched);
        assert_eq!(Stage::Templated.to_string(), "templated");
        assert_eq!(serde_json::to_string(&Stage::Classified).unwrap(), "\"classified\"");
        assert!(Stage::Templated.is_analyzed());
        assert!(!Stage::Built.is_analyzed());
        assert!(Stage::Fetched.has_output());
    }

    #[test]
    fn test_job_lifecycle() {
        let mut job = Job::new("abc".to_string(), Arc::from(vec![1u8, 2, 3]));
        assert_eq!(job.status().stage, Stage::Uploaded);
        job.advance(Stage::Built);
        job.fail(Activity::Classify, &Error::MalformedMarkup("bad".into()));

        let status = job.status();
        assert_eq!(status.stage, Stage::Failed);
        let failure = status.failure.unwrap();
        assert_eq!(failure.activity, Activity::Classify);
        assert_eq!(failure.code, "malformed_markup");
    }

    #[test]
    fn test_first_fetch_recorded_once() {
        let mut job = Job::new("abc".to_string(), Arc::from(Vec::new()));
        job.stage = Stage::Rendered;
        job.mark_fetched();
        let first = job.fetched_at;
        job.mark_fetched();
        assert_eq!(job.stage, Stage::Fetched);
        assert_eq!(job.fetched_at, first);
    }

    #[test]
    fn test_status_serialization() {
        let job = Job::new("abc".to_string(), Arc::from(Vec::new()));
        let json = serde_json::to_value(job.status()).unwrap();
        assert_eq!(json["stage"], "uploaded");
        assert_eq!(json["file_id"], "abc");
        assert!(json.get("failure").is_none());
    }
}
