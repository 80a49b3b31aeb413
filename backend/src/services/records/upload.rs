use crate::config::Config;
use crate::services::records::spreadsheet::{
    parse_spreadsheet, ImportError, ImportOptions, SheetFormat,
};
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use common::model::record::Record;
use common::store::{RecordStore, StoreError};
use futures_util::StreamExt;
use log::info;
use thiserror::Error;

/// Upper bound on an uploaded spreadsheet.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{0}")]
    Multipart(#[from] actix_multipart::MultipartError),
    #[error("The file must end with .csv, .xlsx or .xls")]
    WrongExtension,
    #[error("Missing file")]
    MissingFile,
    #[error("The file exceeds 10 MB")]
    TooLarge,
    #[error("{0}")]
    Import(#[from] ImportError),
    #[error("{0}")]
    Store(#[from] StoreError),
}

/// HTTP handler for `POST /api/records/upload`.
///
/// - On success: `200 OK` with the imported records as JSON.
/// - Bad upload or unreadable spreadsheet: `400 Bad Request`.
/// - Store write failure: `503 Service Unavailable`.
pub async fn process(
    payload: Multipart,
    store: web::Data<dyn RecordStore>,
    config: web::Data<Config>,
) -> impl Responder {
    match upload_records(payload, store.get_ref(), &config).await {
        Ok(records) => HttpResponse::Ok().json(records),
        Err(e @ UploadError::Store(_)) => {
            HttpResponse::ServiceUnavailable().body(format!("Error: {}", e))
        }
        Err(e) => HttpResponse::BadRequest().body(format!("Error: {}", e)),
    }
}

/// Reads the `file` part of the upload, imports it and appends the records to the store.
///
/// The file name's extension decides between CSV and Excel parsing.
pub async fn upload_records(
    mut payload: Multipart,
    store: &dyn RecordStore,
    config: &Config,
) -> Result<Vec<Record>, UploadError> {
    let mut contents: Option<(SheetFormat, Vec<u8>)> = None;

    while let Some(item) = payload.next().await {
        let mut field = item?;
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));
        if name.as_deref() != Some("file") {
            // Drain fields we do not use.
            while let Some(chunk) = field.next().await {
                chunk?;
            }
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename().map(|f| f.to_string()))
            .unwrap_or_default();
        let format = SheetFormat::from_filename(&filename).ok_or(UploadError::WrongExtension)?;

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(UploadError::TooLarge);
            }
            bytes.extend_from_slice(&chunk);
        }
        contents = Some((format, bytes));
    }

    let (format, bytes) = contents.ok_or(UploadError::MissingFile)?;
    let options = ImportOptions::new(config.id_prefix.clone());
    let records = parse_spreadsheet(&bytes, format, &options)?;
    store.insert(&records)?;
    info!("Imported {} records", records.len());
    Ok(records)
}
