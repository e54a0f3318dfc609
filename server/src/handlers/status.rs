use actix_web::{error, web, HttpResponse, Responder, Result};
use tokio::sync::oneshot;

use crate::server::{InspectCommand, ServerCommand, ServerTx, SessionStatus};

pub fn configure_status_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/status/").route(web::get().to(show_status)));
}

async fn show_status(srv_tx: web::Data<ServerTx>) -> Result<impl Responder> {
    let (tx, rx) = oneshot::channel::<SessionStatus>();

    srv_tx
        .get_ref()
        .send(ServerCommand::Inspect(InspectCommand::Status { tx }))
        .map_err(|_| error::ErrorInternalServerError("Internal Server Error"))?;

    let status = rx
        .await
        .map_err(|_| error::ErrorInternalServerError("Receiver await error"))?;

    Ok(HttpResponse::Ok().json(status))
}
