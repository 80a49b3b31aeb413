//! # Certificate Service Module
//!
//! Printable certificates and their QR codes.
//!
//! ## Sub-modules:
//! - `pdf`: lays out one certificate with `genpdf`.
//! - `qr`: renders verification links as QR images.
//! - `batch`: renders every stored record in a background job.

pub(crate) mod batch;
pub(crate) mod pdf;
pub(crate) mod qr;

use crate::config::Config;
use actix_web::web::{get, post, scope};
use actix_web::{web, HttpResponse, Responder, Scope};
use common::codec;
use common::store::RecordStore;
use log::warn;

const API_PATH: &str = "/api/certificates";

/// Configures the Actix scope for certificate routes.
///
/// *   **`GET /{id}/pdf`**: the certificate of one record, served inline.
/// *   **`POST /batch`**: starts a background job rendering every record; returns `{ "job_id" }`.
/// *   **`GET /status/{job_id}`**: status of a batch job.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/batch", post().to(batch::process))
        .route("/status/{job_id}", get().to(batch::status))
        .route("/{id}/pdf", get().to(download))
}

async fn download(
    id: web::Path<String>,
    store: web::Data<dyn RecordStore>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(record) = store.get_by_id(&id) else {
        return HttpResponse::NotFound().body("Certificate not found");
    };

    let verify_url = codec::encode(&config.public_origin, &record);
    let bare_url = codec::verify_url(&config.public_origin, &record.id);
    let fonts_dir = config.fonts_dir.clone();
    let rendered = web::block(move || {
        pdf::render_certificate(&record, &verify_url, &bare_url, &fonts_dir)
            .map(|bytes| (record.id, bytes))
    })
    .await;

    match rendered {
        Ok(Ok((record_id, bytes))) => HttpResponse::Ok()
            .content_type("application/pdf")
            .insert_header((
                "Content-Disposition",
                format!("inline; filename=\"certificate-{}.pdf\"", record_id),
            ))
            .body(bytes),
        Ok(Err(e)) => {
            warn!("Rendering certificate {} failed: {}", id, e);
            HttpResponse::ServiceUnavailable().body(format!("PDF generation failed: {}", e))
        }
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;
    use crate::job_controller::state::{start_job_updater, JobsState};
    use actix_web::{test, App};
    use common::jobs::JobStatus;
    use common::store::MemoryRecordStore;
    use std::sync::Arc;

    #[actix_web::test]
    async fn unknown_certificate_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let (jobs, _rx) = JobsState::new(8);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::from(store))
                .app_data(web::Data::new(jobs))
                .app_data(web::Data::new(test_config(
                    dir.path().join("db.sqlite"),
                    dir.path().join("pdfs"),
                )))
                .service(configure_routes()),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/certificates/ICES-2024-404/pdf")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);

        let req = test::TestRequest::get()
            .uri("/api/certificates/status/no-such-job")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_web::test]
    async fn batch_over_empty_store_completes() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let (jobs, rx) = JobsState::new(8);
        actix_web::rt::spawn(start_job_updater(jobs.clone(), rx));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::from(store))
                .app_data(web::Data::new(jobs.clone()))
                .app_data(web::Data::new(test_config(
                    dir.path().join("db.sqlite"),
                    dir.path().join("pdfs"),
                )))
                .service(configure_routes()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/certificates/batch")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let job_id = body["job_id"].as_str().unwrap().to_string();

        let mut status = None;
        for _ in 0..200 {
            status = jobs.status(&job_id).await;
            if matches!(status, Some(JobStatus::Completed(_))) {
                break;
            }
            actix_web::rt::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(
            status,
            Some(JobStatus::Completed("0 certificates rendered".to_string()))
        );
    }
}
