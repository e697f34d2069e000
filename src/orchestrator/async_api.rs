//! Async wrapper for runtimes that must not block.

use std::sync::Arc;

use crate::error::{Error, Result};

use super::{Analysis, Download, FileId, JobStatus, Orchestrator};

/// Runs the blocking orchestrator operations on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct AsyncOrchestrator {
    inner: Arc<Orchestrator>,
}

impl AsyncOrchestrator {
    /// Wrap an orchestrator.
    pub fn new(inner: Arc<Orchestrator>) -> Self {
        Self { inner }
    }

    /// The wrapped orchestrator.
    pub fn inner(&self) -> &Arc<Orchestrator> {
        &self.inner
    }

    async fn run<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Orchestrator) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || work(inner.as_ref()))
            .await
            .map_err(|e| Error::Other(format!("blocking task failed: {}", e)))?
    }

    /// See [`Orchestrator::ingest`].
    pub async fn ingest(&self, bytes: Vec<u8>) -> Result<FileId> {
        self.run(move |o| o.ingest(bytes)).await
    }

    /// See [`Orchestrator::process`].
    pub async fn process(&self, id: FileId) -> Result<JobStatus> {
        self.run(move |o| o.process(&id)).await
    }

    /// See [`Orchestrator::analyze`].
    pub async fn analyze(&self, id: FileId) -> Result<Analysis> {
        self.run(move |o| o.analyze(&id)).await
    }

    /// See [`Orchestrator::select_template`].
    pub async fn select_template(&self, id: FileId, template: String) -> Result<JobStatus> {
        self.run(move |o| o.select_template(&id, &template)).await
    }

    /// See [`Orchestrator::render`].
    pub async fn render(&self, id: FileId) -> Result<JobStatus> {
        self.run(move |o| o.render(&id)).await
    }

    /// See [`Orchestrator::download`].
    pub async fn download(&self, id: FileId, template: String) -> Result<Download> {
        self.run(move |o| o.download(&id, &template)).await
    }

    /// See [`Orchestrator::status`]. Does not block.
    pub fn status(&self, id: &str) -> Result<JobStatus> {
        self.inner.status(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{OrchestratorConfig, Stage};
    use crate::test_support::{package_bytes, single_reference_body};

    #[tokio::test]
    async fn test_async_download() {
        let orchestrator = Arc::new(Orchestrator::new(OrchestratorConfig::default()).unwrap());
        let api = AsyncOrchestrator::new(orchestrator);

        let id = api.ingest(package_bytes(&single_reference_body())).await.unwrap();
        let download = api.download(id.clone(), "chicago".to_string()).await.unwrap();
        assert!(download.file_name.starts_with("formatted_chicago_"));
        assert_eq!(api.status(&id).unwrap().stage, Stage::Fetched);
    }
}
