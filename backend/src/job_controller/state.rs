//! Shared state of background certificate-rendering jobs.
//!
//! - `JobsState`: clonable handle injected into the Actix app in `main.rs`.
//! - `JobUpdate`: a status change sent by a worker.
//! - `start_job_updater`: long-running task that applies `JobUpdate`s to the map.

use common::jobs::JobStatus;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{mpsc, RwLock};

#[derive(Clone)]
pub struct JobsState {
    /// Current status per job id. Read by the status endpoint, written by the updater.
    pub jobs: Arc<RwLock<HashMap<String, JobStatus>>>,

    /// Workers report progress through this sender instead of locking `jobs` themselves.
    pub tx: mpsc::Sender<JobUpdate>,
}

#[derive(Debug)]
pub struct JobUpdate {
    pub(crate) job_id: String,
    pub(crate) status: JobStatus,
}

impl JobsState {
    /// Creates the state together with the receiver `start_job_updater` drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<JobUpdate>) {
        let (tx, rx) = mpsc::channel(capacity);
        let state = JobsState {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            tx,
        };
        (state, rx)
    }

    pub async fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.read().await.get(job_id).cloned()
    }
}

/// Applies every `JobUpdate` received on `rx` until all senders are dropped.
pub async fn start_job_updater(state: JobsState, mut rx: mpsc::Receiver<JobUpdate>) {
    while let Some(update) = rx.recv().await {
        let mut jobs = state.jobs.write().await;
        jobs.insert(update.job_id.clone(), update.status);
    }
}
