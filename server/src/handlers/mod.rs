use crate::connection::ws_index;
use crate::handlers::status::configure_status_handlers;
use actix_web::web;

mod status;

pub fn root(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws/").route(web::get().to(ws_index)));

    configure_status_handlers(cfg);
}
