use crate::config::Config;
use crate::services::certificates::qr;
use actix_web::{web, HttpResponse, Responder};
use common::codec;
use common::model::record::Record;
use common::requests::QrQuery;
use common::store::RecordStore;
use serde::Serialize;

/// A stored record together with its verification link and list thumbnail.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
    #[serde(flatten)]
    pub record: Record,
    pub verification_url: String,
    /// PNG data URL; empty when the QR code could not be rendered.
    pub qr_code: String,
}

impl RecordView {
    fn new(record: Record, origin: &str) -> Self {
        let verification_url = codec::encode(origin, &record);
        let qr_code = qr::render_data_url(&verification_url, qr::THUMBNAIL_SIZE);
        RecordView {
            record,
            verification_url,
            qr_code,
        }
    }
}

/// `GET /api/records`
pub async fn list(store: web::Data<dyn RecordStore>, config: web::Data<Config>) -> impl Responder {
    let views: Vec<RecordView> = store
        .list()
        .into_iter()
        .map(|record| RecordView::new(record, &config.public_origin))
        .collect();
    HttpResponse::Ok().json(views)
}

/// `GET /api/records/{id}`
pub async fn get(id: web::Path<String>, store: web::Data<dyn RecordStore>) -> impl Responder {
    match store.get_by_id(&id) {
        Some(record) => HttpResponse::Ok().json(record),
        None => HttpResponse::NotFound().body("Record not found"),
    }
}

/// `GET /api/records/{id}/qr?size=N`: PNG of the record's verification link.
pub async fn qr_code(
    id: web::Path<String>,
    query: web::Query<QrQuery>,
    store: web::Data<dyn RecordStore>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(record) = store.get_by_id(&id) else {
        return HttpResponse::NotFound().body("Record not found");
    };
    let url = codec::encode(&config.public_origin, &record);
    let png = qr::render_png(&url, query.size.unwrap_or(qr::THUMBNAIL_SIZE));
    if png.is_empty() {
        return HttpResponse::ServiceUnavailable().body("QR rendering failed");
    }
    HttpResponse::Ok().content_type("image/png").body(png)
}
