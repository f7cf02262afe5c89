//! Recipe server binary.
//!
//! Configuration comes from `.env`, an optional `recipebox.{toml,yaml,json}`
//! file and `RECIPEBOX_*` environment variables.

use server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load()?;
    server::start_server(config).await
}
