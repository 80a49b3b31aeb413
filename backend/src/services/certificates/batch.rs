//! # Batch Certificate Rendering
//!
//! `POST /api/certificates/batch` renders a PDF certificate for every stored record
//! into `<output_dir>/<job_id>/<record_id>.pdf` in the background.
//!
//! ## Workflow:
//!
//! 1.  **Job Scheduling**: `schedule_batch_job` snapshots the store, registers the job
//!     as `Pending` and returns its id at once so the client can poll
//!     `GET /api/certificates/status/{job_id}`.
//!
//! 2.  **Background Processing**: a Tokio task runs `render_batch_blocking` through
//!     `spawn_blocking`, which renders the certificates in parallel with `rayon`.
//!
//! 3.  **Progress Reporting**: the worker sends `BatchUpdate`s to a listener task that
//!     converts them into percentage `JobUpdate`s for the central job controller.

use crate::config::Config;
use crate::job_controller::state::{JobUpdate, JobsState};
use crate::services::certificates::pdf;
use actix_web::{web, HttpResponse, Responder};
use common::codec;
use common::jobs::JobStatus;
use common::model::record::Record;
use common::store::RecordStore;
use log::{info, warn};
use rayon::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Progress message from the blocking worker to its async listener.
#[derive(Debug)]
pub enum BatchUpdate {
    Job(JobStatus),
    Task { done: usize, total: usize },
}

/// Everything a worker needs to render, detached from the request.
#[derive(Debug, Clone)]
struct RenderSettings {
    public_origin: String,
    fonts_dir: PathBuf,
    output_dir: PathBuf,
}

pub(crate) async fn process(
    state: web::Data<JobsState>,
    store: web::Data<dyn RecordStore>,
    config: web::Data<Config>,
) -> impl Responder {
    match schedule_batch_job(state, store, config).await {
        Ok(job_id) => HttpResponse::Ok().json(serde_json::json!({ "job_id": job_id })),
        Err(err) => HttpResponse::InternalServerError().body(err),
    }
}

pub(crate) async fn status(
    job_id: web::Path<String>,
    state: web::Data<JobsState>,
) -> impl Responder {
    match state.status(&job_id.into_inner()).await {
        Some(status) => HttpResponse::Ok().json(status),
        None => HttpResponse::NotFound().body("Job ID not found"),
    }
}

async fn schedule_batch_job(
    state: web::Data<JobsState>,
    store: web::Data<dyn RecordStore>,
    config: web::Data<Config>,
) -> Result<String, String> {
    let job_id = Uuid::new_v4().to_string();
    state
        .jobs
        .write()
        .await
        .insert(job_id.clone(), JobStatus::Pending);

    let records = store.list();
    let settings = RenderSettings {
        public_origin: config.public_origin.clone(),
        fonts_dir: config.fonts_dir.clone(),
        output_dir: config.output_dir.join(&job_id),
    };
    let tx = state.tx.clone();
    let job_id_clone = job_id.clone();

    tokio::spawn(async move {
        let (batch_tx, mut batch_rx) = mpsc::channel::<BatchUpdate>(100);

        let job_updater_tx = tx.clone();
        let job_id_for_updater = job_id_clone.clone();
        let listener = tokio::spawn(async move {
            while let Some(update) = batch_rx.recv().await {
                let status = match update {
                    BatchUpdate::Job(job_status) => job_status,
                    BatchUpdate::Task { done, total } => JobStatus::InProgress(progress(done, total)),
                };
                let _ = job_updater_tx
                    .send(JobUpdate {
                        job_id: job_id_for_updater.clone(),
                        status,
                    })
                    .await;
            }
        });

        let handle =
            tokio::task::spawn_blocking(move || render_batch_blocking(batch_tx, records, &settings));

        let outcome = handle.await;
        // The worker's sender is gone now; drain the listener so no progress update
        // lands after the final status.
        let _ = listener.await;

        let final_status = match outcome {
            Ok(Ok(count)) => {
                info!("Batch {} rendered {} certificates", job_id_clone, count);
                JobStatus::Completed(format!("{} certificates rendered", count))
            }
            Ok(Err(e)) => {
                warn!("Batch {} failed: {}", job_id_clone, e);
                JobStatus::Failed(e)
            }
            Err(join_err) => JobStatus::Failed(format!("join error: {}", join_err)),
        };
        let _ = tx
            .send(JobUpdate {
                job_id: job_id_clone,
                status: final_status,
            })
            .await;
    });

    Ok(job_id)
}

fn progress(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 100;
    }
    (done as f32 / total as f32 * 100.0) as u32
}

fn render_one(record: &Record, settings: &RenderSettings) -> Result<(), String> {
    let verify_url = codec::encode(&settings.public_origin, record);
    let bare_url = codec::verify_url(&settings.public_origin, &record.id);
    let bytes = pdf::render_certificate(record, &verify_url, &bare_url, &settings.fonts_dir)
        .map_err(|e| format!("certificate {}: {}", record.id, e))?;
    fs::write(settings.output_dir.join(format!("{}.pdf", record.id)), bytes)
        .map_err(|e| format!("certificate {}: {}", record.id, e))
}

/// Renders every record; stops at the first failure. Runs on a blocking thread.
fn render_batch_blocking(
    tx: mpsc::Sender<BatchUpdate>,
    records: Vec<Record>,
    settings: &RenderSettings,
) -> Result<usize, String> {
    let _ = tx.blocking_send(BatchUpdate::Job(JobStatus::InProgress(0)));
    fs::create_dir_all(&settings.output_dir).map_err(|e| e.to_string())?;

    let total = records.len();
    let done = AtomicUsize::new(0);
    records.par_iter().try_for_each(|record| {
        render_one(record, settings)?;
        let done = done.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = tx.blocking_send(BatchUpdate::Task { done, total });
        Ok::<(), String>(())
    })?;

    Ok(total)
}
