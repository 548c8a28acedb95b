//! Owner-scoped crop and diagnosis records.

pub mod crops;
pub mod diagnoses;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/crops")
            .route("", web::get().to(crops::list_crops))
            .route("", web::post().to(crops::create_crop))
            .route("/{id}", web::get().to(crops::get_crop))
            .route("/{id}", web::put().to(crops::update_crop))
            .route("/{id}", web::delete().to(crops::delete_crop)),
    )
    .service(
        web::scope("/diagnoses")
            .route("", web::get().to(diagnoses::list_diagnoses))
            .route("", web::post().to(diagnoses::create_diagnosis))
            .route("/create", web::post().to(diagnoses::create_draft))
            .route("/save", web::post().to(diagnoses::save_draft))
            .route("/{id}", web::put().to(diagnoses::update_diagnosis)),
    );
}
