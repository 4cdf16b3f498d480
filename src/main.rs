use anyhow::Context;
use clap::Parser;
use log::info;
use sketchwall::server::Server;
use sketchwall::{CollageOptions, ServerConfig};
use std::path::PathBuf;

/// Store PNG drawings and serve a collage of all of them.
#[derive(Parser, Debug)]
#[command(name = "sketchwall", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = sketchwall::DEFAULT_PORT)]
    port: u16,

    /// Interface to bind
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Directory where drawings are stored (created if missing)
    #[arg(long, env = "DRAWINGS_DIR", default_value = "drawings")]
    drawings_dir: PathBuf,

    /// Edge length of each collage cell in pixels
    #[arg(long, env = "CELL_SIZE", default_value_t = sketchwall::collage::DEFAULT_CELL_SIZE)]
    cell_size: u32,

    /// Largest accepted upload body in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = sketchwall::DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            drawings_dir: self.drawings_dir,
            max_body_bytes: self.max_body_bytes,
            collage: CollageOptions {
                cell_size: self.cell_size,
                ..Default::default()
            },
        }
    }
}

async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let server = Server::bind(config).context("failed to start server")?;
    if let Some(addr) = server.local_addr() {
        info!("Server running on http://{}", addr);
    }

    let runtime = tokio::runtime::Handle::current();
    tokio::task::spawn_blocking(move || server.run(runtime))
        .await
        .context("accept loop terminated")?;
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Cli::parse().into_config();
    if let Err(e) = run(config).await {
        eprintln!("sketchwall: {:#}", e);
        std::process::exit(1);
    }
}
