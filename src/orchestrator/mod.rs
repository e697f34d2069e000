//! Job orchestration.
//!
//! An [`Orchestrator`] tracks each upload as a job moving through
//! [`Stage`]s:
//!
//! ```text
//! Uploaded -> Built -> Classified -> Templated -> Rendered -> Fetched
//!                                     (any) -> Failed
//! ```
//!
//! Stage work runs on the caller's thread, outside the job lock, on
//! `Arc`-shared inputs. A job runs at most one stage at a time.
//!
//! ```no_run
//! use paperfmt::orchestrator::{Orchestrator, OrchestratorConfig};
//!
//! # fn main() -> paperfmt::Result<()> {
//! let orchestrator = Orchestrator::new(OrchestratorConfig::default())?;
//! let id = orchestrator.ingest(std::fs::read("paper.docx")?)?;
//! let download = orchestrator.download(&id, "ieee")?;
//! std::fs::write(&download.file_name, &download.bytes[..])?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "async")]
mod async_api;
mod config;
mod job;
mod reaper;
mod registry;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::analyze::{extract_references, SectionClassifier};
use crate::budget::StageBudget;
use crate::error::{Error, Result};
use crate::package::Package;
use crate::parser::DocxParser;
use crate::render::Renderer;
use crate::template::TemplateRegistry;

#[cfg(feature = "async")]
pub use async_api::AsyncOrchestrator;
pub use config::OrchestratorConfig;
pub use job::{
    Activity, Analysis, Download, FailureReason, FileId, JobStatus, Stage, DOCX_CONTENT_TYPE,
};
pub use reaper::Reaper;

use job::Job;
use registry::{lock, JobRegistry};

/// Drives uploads through the pipeline and owns their state.
#[derive(Debug)]
pub struct Orchestrator {
    config: OrchestratorConfig,
    templates: TemplateRegistry,
    jobs: JobRegistry,
    accepting: AtomicBool,
    running: AtomicUsize,
    reaper: Mutex<Option<Reaper>>,
}

/// Marks a job busy for the lifetime of a stage.
struct InFlight<'a> {
    job: Arc<Mutex<Job>>,
    running: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn start(job: &mut Job, entry: &Arc<Mutex<Job>>, activity: Activity, running: &'a AtomicUsize) -> Self {
        job.in_flight = Some(activity);
        running.fetch_add(1, Ordering::SeqCst);
        Self {
            job: Arc::clone(entry),
            running,
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        lock(&self.job).in_flight = None;
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Record an error on a job: fatal errors end it, others are kept for
/// inspection.
fn record_error(job: &mut Job, activity: Activity, error: &Error) {
    if error.is_fatal() {
        job.fail(activity, error);
    } else {
        log::info!("job {}: {} failed: {}", job.id, activity.name(), error);
        job.last_error = Some(FailureReason::new(activity, error));
    }
}

impl Orchestrator {
    /// Create an orchestrator with the built-in templates.
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        Ok(Self::with_templates(config, TemplateRegistry::with_builtins()?))
    }

    /// Create an orchestrator with a custom template registry.
    pub fn with_templates(config: OrchestratorConfig, templates: TemplateRegistry) -> Self {
        Self {
            config,
            templates,
            jobs: JobRegistry::new(),
            accepting: AtomicBool::new(true),
            running: AtomicUsize::new(0),
            reaper: Mutex::new(None),
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// The available templates.
    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    /// Number of live jobs.
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.accepting.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }

    fn budget(&self, activity: Activity, job: &Job) -> StageBudget {
        let limit = match activity {
            Activity::Build => self.config.build_timeout,
            Activity::Classify => self.config.classify_timeout,
            Activity::Render => self.config.render_timeout,
        };
        let budget = match limit {
            Some(limit) => StageBudget::with_limit(activity.name(), limit),
            None => StageBudget::unlimited(activity.name()),
        };
        budget.with_cancel_flag(Arc::clone(&job.cancel))
    }

    /// Store an upload under a fresh identifier.
    pub fn accept(&self, bytes: impl Into<Arc<[u8]>>) -> Result<FileId> {
        let id = uuid::Uuid::new_v4().to_string();
        self.store(Job::new(id.clone(), bytes.into()))?;
        Ok(id)
    }

    /// Store an upload under a caller-issued identifier.
    ///
    /// Fails with [`Error::DuplicateFileId`] if the id is live, or was
    /// cancelled or evicted within the retention period.
    pub fn accept_with_id(&self, id: impl Into<FileId>, bytes: impl Into<Arc<[u8]>>) -> Result<()> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::Other("file id must not be empty".to_string()));
        }
        self.store(Job::new(id, bytes.into()).with_caller_id())
    }

    fn store(&self, job: Job) -> Result<()> {
        self.ensure_accepting()?;
        log::debug!("accepted upload {} ({} bytes)", job.id, job.input.len());
        self.jobs.insert(job)?;
        Ok(())
    }

    /// Accept and process an upload.
    ///
    /// On a build failure the job is left `Failed`; use
    /// [`ingest_with_id`](Self::ingest_with_id) to keep its id.
    pub fn ingest(&self, bytes: impl Into<Arc<[u8]>>) -> Result<FileId> {
        let id = self.accept(bytes)?;
        self.process(&id)?;
        Ok(id)
    }

    /// Accept and process an upload under a caller-issued identifier.
    pub fn ingest_with_id(&self, id: impl Into<FileId>, bytes: impl Into<Arc<[u8]>>) -> Result<JobStatus> {
        let id = id.into();
        self.accept_with_id(id.clone(), bytes)?;
        self.process(&id)
    }

    /// Build and classify an uploaded job.
    ///
    /// Jobs past `Uploaded`, or already being processed, return their
    /// status unchanged.
    pub fn process(&self, id: &str) -> Result<JobStatus> {
        let entry = self.jobs.get(id)?;
        let mut job = lock(&entry);
        if job.stage != Stage::Uploaded || job.in_flight.is_some() {
            return Ok(job.status());
        }
        self.ensure_accepting()?;

        let input = Arc::clone(&job.input);
        let budget = self.budget(Activity::Build, &job);
        let _in_flight = InFlight::start(&mut job, &entry, Activity::Build, &self.running);
        drop(job);

        let built = Package::open_with_limits(&input, &self.config.limits, &budget).and_then(|package| {
            let document = DocxParser::with_options(&package, self.config.build.clone())
                .parse_with_budget(&budget)?;
            Ok((package, document))
        });

        let mut job = lock(&entry);
        let (package, document) = match built {
            Ok(built) => built,
            Err(e) => {
                record_error(&mut job, Activity::Build, &e);
                return Err(e);
            }
        };
        let document = Arc::new(document);
        job.package = Some(Arc::new(package));
        job.document = Some(Arc::clone(&document));
        job.advance(Stage::Built);
        job.in_flight = Some(Activity::Classify);
        let budget = self.budget(Activity::Classify, &job);
        drop(job);

        let classified = SectionClassifier::with_options(self.config.classifier.clone())
            .classify_with_budget(&document, &budget)
            .map(|classified| {
                let references = extract_references(&classified.document);
                (classified, references)
            });

        let mut job = lock(&entry);
        match classified {
            Ok((classified, references)) => {
                log::debug!(
                    "job {}: {} blocks, {} references, {} citations",
                    id,
                    classified.document.block_count(),
                    references.len(),
                    classified.citations.len()
                );
                job.classified = Some(Arc::new(classified));
                job.references = Some(Arc::new(references));
                job.document = None;
                job.advance(Stage::Classified);
                Ok(job.status())
            }
            Err(e) => {
                record_error(&mut job, Activity::Classify, &e);
                Err(e)
            }
        }
    }

    /// Analysis results, available from `Classified` onward.
    pub fn analyze(&self, id: &str) -> Result<Analysis> {
        let entry = self.jobs.get(id)?;
        let job = lock(&entry);
        match (&job.classified, &job.references) {
            (Some(classified), Some(references)) if job.stage.is_analyzed() => {
                Ok(Analysis::new(&job.id, classified, references))
            }
            _ => Err(Error::InvalidState {
                operation: "analyze",
                stage: job.stage,
            }),
        }
    }

    /// Choose the template for a classified job.
    ///
    /// The template may be changed until the job is rendered. Selecting the
    /// template a rendered job already uses is a no-op.
    pub fn select_template(&self, id: &str, name: &str) -> Result<JobStatus> {
        let entry = self.jobs.get(id)?;
        let mut job = lock(&entry);
        if job.in_flight.is_some() {
            return Err(Error::InvalidState {
                operation: "select a template (busy)",
                stage: job.stage,
            });
        }

        match job.stage {
            Stage::Classified | Stage::Templated => {
                let template = self.templates.resolve(name)?;
                log::debug!("job {}: template '{}'", id, template.name);
                job.template = Some(template);
                job.last_error = None;
                if job.stage == Stage::Classified {
                    job.advance(Stage::Templated);
                }
                Ok(job.status())
            }
            Stage::Rendered | Stage::Fetched => {
                let template = self.templates.resolve(name)?;
                let same = job.template.as_ref().is_some_and(|t| t.name == template.name);
                if same {
                    Ok(job.status())
                } else {
                    Err(Error::InvalidState {
                        operation: "select a different template",
                        stage: job.stage,
                    })
                }
            }
            stage => Err(Error::InvalidState {
                operation: "select a template",
                stage,
            }),
        }
    }

    /// Render a job with its selected template.
    ///
    /// A template that cannot be expressed in the output leaves the job
    /// `Templated` with the error recorded. Rendered jobs return their
    /// status unchanged.
    pub fn render(&self, id: &str) -> Result<JobStatus> {
        let entry = self.jobs.get(id)?;
        let mut job = lock(&entry);
        if job.in_flight.is_some() {
            return Err(Error::InvalidState {
                operation: "render (busy)",
                stage: job.stage,
            });
        }
        match job.stage {
            Stage::Templated => {}
            Stage::Rendered | Stage::Fetched => return Ok(job.status()),
            stage => {
                return Err(Error::InvalidState {
                    operation: "render",
                    stage,
                })
            }
        }
        self.ensure_accepting()?;

        let (package, classified, references, template) =
            match (&job.package, &job.classified, &job.references, &job.template) {
                (Some(p), Some(c), Some(r), Some(t)) => {
                    (Arc::clone(p), Arc::clone(c), Arc::clone(r), Arc::clone(t))
                }
                _ => return Err(Error::Other(format!("job {} is missing stage artifacts", id))),
            };
        let budget = self.budget(Activity::Render, &job);
        let _in_flight = InFlight::start(&mut job, &entry, Activity::Render, &self.running);
        drop(job);

        let result = Renderer::new(template).render_with_budget(&package, &classified, &references, &budget);

        let mut job = lock(&entry);
        match result {
            Ok(output) => {
                for warning in &output.warnings {
                    log::debug!("job {}: {}", id, warning);
                }
                job.output = Some(Arc::from(output.bytes));
                job.warnings = output.warnings;
                job.last_error = None;
                job.advance(Stage::Rendered);
                Ok(job.status())
            }
            Err(e) => {
                record_error(&mut job, Activity::Render, &e);
                Err(e)
            }
        }
    }

    /// Rendered package bytes. Repeated calls return the same bytes.
    pub fn fetch(&self, id: &str) -> Result<Arc<[u8]>> {
        let entry = self.jobs.get(id)?;
        let mut job = lock(&entry);
        if !job.stage.has_output() {
            return Err(Error::InvalidState {
                operation: "fetch",
                stage: job.stage,
            });
        }
        let output = job
            .output
            .clone()
            .ok_or_else(|| Error::Other(format!("job {} has no output", id)))?;
        job.mark_fetched();
        Ok(output)
    }

    /// Run whatever stages are still needed to produce output with
    /// `template`, then fetch it.
    pub fn download(&self, id: &str, template: &str) -> Result<Download> {
        let status = self.process(id)?;
        if !status.stage.is_analyzed() {
            return Err(Error::InvalidState {
                operation: "download",
                stage: status.stage,
            });
        }
        let status = self.select_template(id, template)?;
        if status.stage == Stage::Templated {
            self.render(id)?;
        }
        let bytes = self.fetch(id)?;
        let template_name = status.template.unwrap_or_else(|| template.to_lowercase());

        Ok(Download {
            file_name: format!("formatted_{}_{}.docx", template_name, id),
            content_type: DOCX_CONTENT_TYPE,
            bytes,
        })
    }

    /// Current status of a job.
    pub fn status(&self, id: &str) -> Result<JobStatus> {
        let entry = self.jobs.get(id)?;
        let status = lock(&entry).status();
        Ok(status)
    }

    /// Status of every live job.
    pub fn statuses(&self) -> Vec<JobStatus> {
        let mut statuses: Vec<JobStatus> = self.jobs.all().iter().map(|job| lock(job).status()).collect();
        statuses.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.file_id.cmp(&b.file_id)));
        statuses
    }

    /// Cancel a job and forget it. A running stage stops at its next
    /// budget check.
    pub fn cancel(&self, id: &str) -> Result<()> {
        let entry = self
            .jobs
            .remove(id)
            .ok_or_else(|| Error::UnknownFileId(id.to_string()))?;
        lock(&entry).cancel.store(true, Ordering::Release);
        log::info!("job {} cancelled", id);
        Ok(())
    }

    /// Evict jobs past their retention or fetch grace period. Returns the
    /// number evicted.
    pub fn evict_expired(&self) -> usize {
        let retention = self.config.retention;
        let grace = self.config.fetched_grace;
        let evicted = self.jobs.remove_where(|job| {
            job.created.elapsed() >= retention
                || job.fetched.is_some_and(|fetched| fetched.elapsed() >= grace)
        });
        for id in &evicted {
            log::debug!("job {} evicted", id);
        }
        self.jobs.prune_retired(retention);
        evicted.len()
    }

    /// Start the background reaper if it is not already running.
    pub fn spawn_reaper(self: &Arc<Self>) {
        let mut reaper = self.reaper.lock().unwrap_or_else(PoisonError::into_inner);
        if reaper.as_ref().is_some_and(Reaper::is_running) {
            return;
        }
        *reaper = Some(Reaper::spawn(Arc::downgrade(self), self.config.reaper_interval));
    }

    /// Whether the reaper thread is running.
    pub fn reaper_running(&self) -> bool {
        self.reaper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(Reaper::is_running)
    }

    /// Stop accepting work, wait up to `drain_timeout` for running stages,
    /// then stop the reaper and drop every job.
    ///
    /// Returns `false` if stages were still running when the timeout hit;
    /// those are cancelled.
    pub fn shutdown(&self, drain_timeout: Duration) -> bool {
        self.accepting.store(false, Ordering::SeqCst);
        log::info!("shutting down, {} stage(s) in flight", self.running.load(Ordering::SeqCst));

        let started = Instant::now();
        while self.running.load(Ordering::SeqCst) > 0 && started.elapsed() < drain_timeout {
            thread::sleep(Duration::from_millis(10));
        }
        let drained = self.running.load(Ordering::SeqCst) == 0;
        if !drained {
            log::warn!("drain timed out, cancelling running stages");
            for job in self.jobs.all() {
                lock(&job).cancel.store(true, Ordering::Release);
            }
        }

        let reaper = self.reaper.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(mut reaper) = reaper {
            reaper.stop();
        }
        self.jobs.clear();
        drained
    }
}
