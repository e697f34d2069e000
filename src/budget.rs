//! Cooperative time and cancellation budget for pipeline stages.
//!
//! Long loops in the codec, builder, classifier and renderer call
//! [`StageBudget::check`] so a pathological input fails in bounded time
//! instead of pinning a worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Deadline and cancellation flag for one stage.
#[derive(Debug, Clone)]
pub struct StageBudget {
    stage: &'static str,
    started: Instant,
    limit: Option<Duration>,
    cancelled: Option<Arc<AtomicBool>>,
}

impl StageBudget {
    /// A budget that never expires.
    pub fn unlimited(stage: &'static str) -> Self {
        Self {
            stage,
            started: Instant::now(),
            limit: None,
            cancelled: None,
        }
    }

    /// A budget expiring `limit` from now.
    pub fn with_limit(stage: &'static str, limit: Duration) -> Self {
        Self {
            limit: Some(limit),
            ..Self::unlimited(stage)
        }
    }

    /// Attach a cancellation flag.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = Some(flag);
        self
    }

    /// Name of the stage this budget governs.
    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Time spent so far.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fail if the stage was cancelled or ran out of time.
    pub fn check(&self) -> Result<()> {
        if let Some(flag) = &self.cancelled {
            if flag.load(Ordering::Acquire) {
                return Err(Error::Cancelled);
            }
        }
        if let Some(limit) = self.limit {
            let elapsed = self.started.elapsed();
            if elapsed > limit {
                return Err(Error::Timeout {
                    stage: self.stage,
                    elapsed,
                });
            }
        }
        Ok(())
    }
}

impl Default for StageBudget {
    fn default() -> Self {
        Self::unlimited("pipeline")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_never_expires() {
        let budget = StageBudget::unlimited("build");
        assert!(budget.check().is_ok());
        assert_eq!(budget.stage(), "build");
    }

    #[test]
    fn test_zero_limit_expires() {
        let budget = StageBudget::with_limit("render", Duration::ZERO);
        std::thread::sleep(Duration::from_millis(2));
        assert!(matches!(
            budget.check(),
            Err(Error::Timeout { stage: "render", .. })
        ));
    }

    #[test]
    fn test_cancel_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let budget = StageBudget::unlimited("classify").with_cancel_flag(flag.clone());
        assert!(budget.check().is_ok());
        flag.store(true, Ordering::Release);
        assert!(matches!(budget.check(), Err(Error::Cancelled)));
    }
}
