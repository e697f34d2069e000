//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analyze::ClassifierOptions;
use crate::package::PackageLimits;
use crate::parser::BuildOptions;

/// Configuration for the job orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Archive limits applied when a package is opened
    pub limits: PackageLimits,

    /// Document model builder options
    pub build: BuildOptions,

    /// Section classifier options
    pub classifier: ClassifierOptions,

    /// Time allowed for opening and building a document
    pub build_timeout: Option<Duration>,

    /// Time allowed for classification
    pub classify_timeout: Option<Duration>,

    /// Time allowed for rendering
    pub render_timeout: Option<Duration>,

    /// Jobs are evicted this long after upload, whatever their stage
    pub retention: Duration,

    /// Jobs are evicted this long after their first fetch
    pub fetched_grace: Duration,

    /// How often the reaper looks for expired jobs
    pub reaper_interval: Duration,
}

impl OrchestratorConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set archive limits.
    pub fn with_limits(mut self, limits: PackageLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set builder options.
    pub fn with_build_options(mut self, options: BuildOptions) -> Self {
        self.build = options;
        self
    }

    /// Set classifier options.
    pub fn with_classifier_options(mut self, options: ClassifierOptions) -> Self {
        self.classifier = options;
        self
    }

    /// Set the same time budget for every stage.
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.build_timeout = Some(timeout);
        self.classify_timeout = Some(timeout);
        self.render_timeout = Some(timeout);
        self
    }

    /// Set the render time budget.
    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = Some(timeout);
        self
    }

    /// Set job retention.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Set the grace period after the first fetch.
    pub fn with_fetched_grace(mut self, grace: Duration) -> Self {
        self.fetched_grace = grace;
        self
    }

    /// Set the reaper tick interval.
    pub fn with_reaper_interval(mut self, interval: Duration) -> Self {
        self.reaper_interval = interval;
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            limits: PackageLimits::default(),
            build: BuildOptions::default(),
            classifier: ClassifierOptions::default(),
            build_timeout: Some(Duration::from_secs(30)),
            classify_timeout: Some(Duration::from_secs(30)),
            render_timeout: Some(Duration::from_secs(60)),
            retention: Duration::from_secs(60 * 60),
            fetched_grace: Duration::from_secs(10 * 60),
            reaper_interval: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = OrchestratorConfig::new()
            .with_stage_timeout(Duration::from_secs(5))
            .with_retention(Duration::from_secs(10));
        assert_eq!(config.render_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.retention, Duration::from_secs(10));
        assert_eq!(config.fetched_grace, Duration::from_secs(600));
    }

    #[test]
    fn test_partial_deserialization() {
        let config: OrchestratorConfig =
            serde_json::from_str(r#"{"retention":{"secs":5,"nanos":0}}"#).unwrap();
        assert_eq!(config.retention, Duration::from_secs(5));
        assert_eq!(config.limits, PackageLimits::default());
    }
}
