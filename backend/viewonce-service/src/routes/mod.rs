pub mod events;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(events::health)).service(
        web::scope("/api/v1").route("/events", web::post().to(events::receive_event)),
    );
}
