//! Keyed store of live jobs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

use super::job::{FileId, Job};

/// Jobs keyed by file id, one mutex per job.
///
/// The map lock is only held to look up, insert or remove an entry.
/// Caller-issued ids are remembered after removal until pruned, so a
/// cancelled or evicted id cannot be taken over by a new upload. Generated
/// ids are unique already and are not remembered.
#[derive(Debug, Default)]
pub(crate) struct JobRegistry {
    jobs: RwLock<HashMap<FileId, Arc<Mutex<Job>>>>,
    retired: Mutex<HashMap<FileId, Instant>>,
}

/// Lock a job, recovering the state if a previous holder panicked.
pub(crate) fn lock(job: &Mutex<Job>) -> MutexGuard<'_, Job> {
    job.lock().unwrap_or_else(PoisonError::into_inner)
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new job. Fails if the id is live or retired.
    pub fn insert(&self, job: Job) -> Result<Arc<Mutex<Job>>> {
        let id = job.id.clone();
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let retired = self.retired.lock().unwrap_or_else(PoisonError::into_inner);
        if jobs.contains_key(&id) || retired.contains_key(&id) {
            return Err(Error::DuplicateFileId(id));
        }
        drop(retired);

        let entry = Arc::new(Mutex::new(job));
        jobs.insert(id, Arc::clone(&entry));
        Ok(entry)
    }

    pub fn get(&self, id: &str) -> Result<Arc<Mutex<Job>>> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownFileId(id.to_string()))
    }

    /// Remove a job, retiring its id if the caller issued it.
    pub fn remove(&self, id: &str) -> Option<Arc<Mutex<Job>>> {
        let removed = self
            .jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)?;
        if lock(&removed).caller_id {
            self.retire(id.to_string());
        }
        Some(removed)
    }

    fn retire(&self, id: FileId) {
        self.retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Instant::now());
    }

    /// Forget retired ids older than `age`.
    pub fn prune_retired(&self, age: Duration) {
        self.retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, at| at.elapsed() < age);
    }

    pub fn retired_len(&self) -> usize {
        self.retired.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Remove every job for which `expired` returns true. Returns the
    /// removed ids.
    pub fn remove_where<F>(&self, mut expired: F) -> Vec<FileId>
    where
        F: FnMut(&Job) -> bool,
    {
        let candidates: Vec<(FileId, Arc<Mutex<Job>>)> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, job)| (id.clone(), Arc::clone(job)))
            .collect();

        let mut removed = Vec::new();
        for (id, job) in candidates {
            // A job with work in flight is left for the next sweep.
            let done = {
                let job = lock(&job);
                job.in_flight.is_none() && expired(&job)
            };
            if done && self.remove(&id).is_some() {
                removed.push(id);
            }
        }
        removed
    }

    /// Snapshot of all live jobs.
    pub fn all(&self) -> Vec<Arc<Mutex<Job>>> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Drop every job, retiring caller-issued ids.
    pub fn clear(&self) {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let mut retired = self.retired.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        for (id, job) in jobs.drain() {
            if lock(&job).caller_id {
                retired.insert(id, now);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
