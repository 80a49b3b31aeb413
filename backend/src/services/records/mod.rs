//! # Record Service Module
//!
//! Operator endpoints for managing issued records under `/api/records`.
//!
//! ## Sub-modules:
//! - `spreadsheet`: turns an uploaded CSV or Excel workbook into freshly issued records.
//! - `upload`: the multipart upload handler.
//! - `list`: listing, single-record lookup and QR images.
//! - `delete`: removal of one or all records.

mod delete;
mod list;
pub(crate) mod spreadsheet;
mod upload;

use actix_web::web::{delete as delete_route, get, post, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/records";

/// Configures the Actix scope for record routes.
///
/// *   **`POST /upload`**: multipart form with a `file` field holding a `.csv` export or
///     an `.xlsx`/`.xls` workbook (first sheet).
///     Every data row becomes a new record with a fresh identifier; returns the records.
/// *   **`GET ""`**: every stored record in insertion order, each with its
///     `verificationUrl` and a QR thumbnail as a `qrCode` data URL.
/// *   **`GET /{id}`**: one record, or 404.
/// *   **`GET /{id}/qr?size=N`**: PNG of the record's verification QR code.
/// *   **`DELETE /{id}`** and **`DELETE ""`**: remove one record or all of them.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/upload", post().to(upload::process))
        .route("", get().to(list::list))
        .route("", delete_route().to(delete::delete_all))
        .route("/{id}", get().to(list::get))
        .route("/{id}", delete_route().to(delete::delete_one))
        .route("/{id}/qr", get().to(list::qr_code))
}
