use std::net::SocketAddr;

use anyhow::Context;

pub const DEFAULT_STORE_URL: &str = "http://localhost:1337/api";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:1337";
pub const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";

/// Settings for the collection store server, read from the environment
/// (and `.env` when present).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<ServerConfig> {
        dotenv::dotenv().ok();

        let bind_addr = dotenv::var("CHAT_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_owned());
        let bind_addr = bind_addr
            .parse()
            .with_context(|| format!("CHAT_BIND_ADDR {bind_addr:?} is not a socket address"))?;
        let database_url = dotenv::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_owned());

        Ok(ServerConfig { bind_addr, database_url })
    }

    /// An in-memory SQLite database exists per connection, so the pool must
    /// not grow past one.
    pub fn max_connections(&self) -> u32 {
        if self.database_url.contains(":memory:") || self.database_url.contains("mode=memory") {
            1
        } else {
            16
        }
    }
}
