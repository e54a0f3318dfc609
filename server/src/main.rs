use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use clap::Parser;

use whiteboard_server::config::ServerConfig;
use whiteboard_server::credentials::{CredentialStore, SqliteCredentialStore};
use whiteboard_server::handlers;
use whiteboard_server::server::spawn_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = ServerConfig::parse();
    let credentials: Arc<dyn CredentialStore> = Arc::new(
        SqliteCredentialStore::open(&config.database)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?,
    );

    let srv_tx = spawn_server();

    log::info!("Whiteboard server listening on {}", config.bind);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(srv_tx.clone()))
            .app_data(web::Data::from(credentials.clone()))
            .configure(handlers::root)
    })
    .bind(config.bind)?
    .run()
    .await
}
