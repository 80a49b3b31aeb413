mod config;
mod job_controller;
mod services;
mod store;

use crate::config::Config;
use crate::job_controller::state::JobsState;
use crate::store::SqliteRecordStore;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use common::store::RecordStore;
use env_logger::Env;
use include_dir::{include_dir, Dir};
use log::info;
use mime_guess::from_path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

static STATIC_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/static");

/// Page a QR code opens; every `/verify/...` path gets it.
const VERIFY_PAGE: &str = "verify.html";
const INDEX_PAGE: &str = "index.html";

fn embedded_page(file_path: &str) -> Option<HttpResponse> {
    STATIC_DIR.get_file(file_path).map(|file| {
        let mime = from_path(file_path).first_or_octet_stream();
        HttpResponse::Ok()
            .content_type(mime.as_ref())
            .body(file.contents().to_vec())
    })
}

async fn serve_embedded(req: HttpRequest) -> HttpResponse {
    let path = req.path().trim_start_matches('/');
    let file_path = if path.is_empty() {
        INDEX_PAGE
    } else if path.starts_with("verify/") {
        VERIFY_PAGE
    } else {
        path
    };

    embedded_page(file_path)
        .or_else(|| embedded_page(INDEX_PAGE))
        .unwrap_or_else(|| HttpResponse::NotFound().body("Not Found"))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let url = config.bind_url();

    if config.open_browser {
        let url_clone = url.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(500));
            let _ = webbrowser::open(&url_clone);
        });
    }

    let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::new(&config.db_path));
    info!(
        "{} records in {}",
        store.list().len(),
        config.db_path.display()
    );

    let (jobs_state, rx) = JobsState::new(100);
    let updater_state = jobs_state.clone();
    tokio::spawn(async move {
        job_controller::state::start_job_updater(updater_state, rx).await;
    });

    info!("Server running at {}", url);
    info!("Verification links point at {}", config.public_origin);

    let bind = (config.host.clone(), config.port);
    let store = web::Data::from(store);
    let config = web::Data::new(config);

    HttpServer::new(move || {
        App::new()
            .app_data(web::JsonConfig::default().limit(10 * 1024 * 1024)) // 10 MB
            .app_data(web::Data::new(jobs_state.clone()))
            .app_data(store.clone())
            .app_data(config.clone())
            .service(services::records::configure_routes())
            .service(services::certificates::configure_routes())
            .service(services::verify::configure_routes())
            .default_service(web::route().to(serve_embedded))
    })
    .bind(bind)?
    .run()
    .await
}
