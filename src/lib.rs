//! Sketchwall
//!
//! A small HTTP service that stores PNG drawings submitted as base64 data URLs
//! and, on demand, tiles every stored drawing into a single grid collage.
//!
//! # Components
//!
//! - **Storage** ([`storage::DrawingStore`]): decodes `data:image/png;base64,`
//!   payloads and writes each one as `drawing_<unixMillis>_<nonce>.png`
//! - **Collage** ([`collage::CollageComposer`]): loads every stored drawing in
//!   parallel, cover-crops each into a square cell and lays them out in the
//!   smallest roughly-square grid
//! - **Server** ([`server::Server`]): `POST /upload` and `GET /collage`
//!
//! # Example
//!
//! ```no_run
//! use sketchwall::{server::Server, ServerConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig {
//!     port: 8080,
//!     drawings_dir: "/tmp/drawings".into(),
//!     ..Default::default()
//! };
//!
//! let runtime = tokio::runtime::Runtime::new()?;
//! let server = Server::bind(config)?;
//! server.run(runtime.handle().clone());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result};

pub mod collage;
pub mod server;
pub mod storage;

pub use collage::{Collage, CollageComposer, CollageOptions, GridLayout};
pub use storage::{DrawingName, DrawingStore};

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 3001;

/// Largest accepted upload body, in bytes (10 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Configuration for the drawing service
///
/// Every component receives its slice of this struct at construction; there
/// is no process-wide state besides the drawings directory itself.
///
/// # Examples
///
/// ```
/// let cfg = sketchwall::ServerConfig::default();
/// assert_eq!(cfg.port, 3001);
/// assert_eq!(cfg.collage.cell_size, 200);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to listen on
    pub host: String,
    /// TCP port to listen on
    pub port: u16,
    /// Directory holding stored drawings; created on start if absent
    pub drawings_dir: PathBuf,
    /// Upload bodies larger than this are rejected with 413
    pub max_body_bytes: usize,
    /// Collage cell size and background
    pub collage: CollageOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            drawings_dir: PathBuf::from("drawings"),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            collage: CollageOptions::default(),
        }
    }
}

impl ServerConfig {
    /// Reject settings that would make every request fail.
    pub fn validate(&self) -> Result<()> {
        if self.collage.cell_size == 0 {
            return Err(Error::ConfigError("cell size must be positive".into()));
        }
        if self.collage.cell_size > collage::MAX_CELL_SIZE {
            return Err(Error::ConfigError(format!(
                "cell size {} exceeds {}",
                self.collage.cell_size,
                collage::MAX_CELL_SIZE
            )));
        }
        if self.max_body_bytes == 0 {
            return Err(Error::ConfigError("max body size must be positive".into()));
        }
        if self.drawings_dir.as_os_str().is_empty() {
            return Err(Error::ConfigError("drawings directory must not be empty".into()));
        }
        Ok(())
    }

    /// `host:port` string suitable for binding.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
