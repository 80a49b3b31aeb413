//! # Verification Service Module
//!
//! Public endpoints behind the page a QR code opens.
//!
//! The verification page reads its own location and forwards the identifier, the
//! raw query and the raw fragment, since browsers never send the fragment to the
//! server. A negative outcome is still `200 OK` with `found: false`.

use actix_web::web::{get, post, scope};
use actix_web::{web, HttpRequest, HttpResponse, Responder, Scope};
use common::model::verification::VerificationResult;
use common::requests::VerifyRequest;
use common::resolution::{resolve, VerificationRequest};
use common::store::RecordStore;
use log::info;

const API_PATH: &str = "/api/verify";

/// Configures the Actix scope for verification routes.
///
/// *   **`POST ""`**: body `{ "id", "query", "fragment" }` as read by the page.
/// *   **`GET /{id}`**: same resolution, taking the token from the request's own
///     query string (`?data=...`). Useful for scanners that strip fragments.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", post().to(verify))
        .route("/{id}", get().to(verify_by_query))
}

fn respond(request: VerificationRequest, store: &dyn RecordStore) -> HttpResponse {
    let resolution = resolve(&request, store);
    match resolution.record() {
        Some(record) => info!("Verification of {}: verified as {}", request.id, record.id),
        None => info!("Verification of {}: not verified", request.id),
    }
    HttpResponse::Ok().json(VerificationResult::from(resolution))
}

async fn verify(
    body: web::Json<VerifyRequest>,
    store: web::Data<dyn RecordStore>,
) -> impl Responder {
    respond(body.into_inner().into(), store.get_ref())
}

async fn verify_by_query(
    req: HttpRequest,
    id: web::Path<String>,
    store: web::Data<dyn RecordStore>,
) -> impl Responder {
    // The request URI is `/api/verify/{id}?...`, which parses like a verification link.
    let request = VerificationRequest::parse(&req.uri().to_string())
        .unwrap_or_else(|| VerificationRequest::new(id.into_inner()));
    respond(request, store.get_ref())
}
