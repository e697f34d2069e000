//! Background eviction of expired jobs.

use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};

use super::Orchestrator;

/// Handle to the reaper thread. Dropping it stops the thread.
#[derive(Debug)]
pub struct Reaper {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Reaper {
    /// Start sweeping `orchestrator` every `interval`.
    ///
    /// The thread holds a weak reference and exits on its own once the
    /// orchestrator is dropped.
    pub(crate) fn spawn(orchestrator: Weak<Orchestrator>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticker = tick(interval);

        let handle = thread::Builder::new()
            .name("paperfmt-reaper".to_string())
            .spawn(move || loop {
                select! {
                    recv(ticker) -> _ => {
                        let Some(orchestrator) = orchestrator.upgrade() else {
                            break;
                        };
                        let evicted = orchestrator.evict_expired();
                        if evicted > 0 {
                            log::info!("reaper evicted {} expired job(s)", evicted);
                        }
                    }
                    recv(stop_rx) -> _ => break,
                }
            });

        match handle {
            Ok(handle) => Self {
                stop: Some(stop_tx),
                handle: Some(handle),
            },
            Err(e) => {
                log::error!("failed to start reaper thread: {}", e);
                Self {
                    stop: None,
                    handle: None,
                }
            }
        }
    }

    /// Whether the thread is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            // The receiver is gone if the thread already exited.
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                log::warn!("reaper thread panicked");
            }
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.stop();
    }
}
