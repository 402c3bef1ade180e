//! Gateway config loader (strict parsing).

pub mod schema;

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use pulseboard_core::error::{Result, PulseError};

pub use schema::{
    BroadcastSection, GatewayConfig, PersistenceBackend, PersistenceSection, ServerSection,
};

/// Load and validate a YAML config file.
///
/// A missing file yields the built-in defaults; any other read error or a
/// malformed file is an error.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<GatewayConfig> {
    let path = path.as_ref();
    let s = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            return Ok(GatewayConfig::default());
        }
        Err(e) => return Err(PulseError::Internal(format!("read config failed: {e}"))),
    };
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    let cfg: GatewayConfig = serde_yaml::from_str(s)
        .map_err(|e| PulseError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Apply a `PORT` override (as a plain port number) to `server.listen`.
pub fn apply_port_override(cfg: &mut GatewayConfig, port: Option<&str>) -> Result<()> {
    let Some(port) = port else { return Ok(()); };
    let port: u16 = port
        .trim()
        .parse()
        .map_err(|_| PulseError::BadRequest(format!("PORT must be a port number, got {port:?}")))?;
    let mut addr: std::net::SocketAddr = cfg
        .server
        .listen
        .parse()
        .map_err(|_| PulseError::BadRequest("server.listen must be a valid socket address".into()))?;
    addr.set_port(port);
    cfg.server.listen = addr.to_string();
    Ok(())
}
