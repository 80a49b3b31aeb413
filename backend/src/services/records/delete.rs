use actix_web::{web, HttpResponse, Responder};
use common::store::RecordStore;
use log::info;

/// `DELETE /api/records/{id}`
pub async fn delete_one(id: web::Path<String>, store: web::Data<dyn RecordStore>) -> impl Responder {
    match store.delete_one(&id) {
        Ok(()) => {
            info!("Deleted record {}", id);
            HttpResponse::NoContent().finish()
        }
        Err(e) => HttpResponse::ServiceUnavailable().body(format!("Error: {}", e)),
    }
}

/// `DELETE /api/records`
pub async fn delete_all(store: web::Data<dyn RecordStore>) -> impl Responder {
    match store.delete_all() {
        Ok(()) => {
            info!("Deleted all records");
            HttpResponse::NoContent().finish()
        }
        Err(e) => HttpResponse::ServiceUnavailable().body(format!("Error: {}", e)),
    }
}
