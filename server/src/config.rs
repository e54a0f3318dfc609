use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Whiteboard session server: one teacher, many students, one shared canvas.
#[derive(Debug, Clone, Parser)]
#[command(name = "whiteboard-server", version)]
pub struct ServerConfig {
    /// Address the WebSocket endpoint listens on.
    #[arg(long, env = "WHITEBOARD_BIND", default_value = "127.0.0.1:9999")]
    pub bind: SocketAddr,

    /// SQLite file holding registered users. Created when missing.
    #[arg(long, env = "WHITEBOARD_DATABASE", default_value = "whiteboard.db")]
    pub database: PathBuf,
}
