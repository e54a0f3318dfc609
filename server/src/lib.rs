pub mod broadcast;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod handler;
pub mod handlers;
pub mod history;
pub mod server;
pub mod session;
