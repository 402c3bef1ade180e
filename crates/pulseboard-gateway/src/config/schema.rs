use serde::Deserialize;
use pulseboard_core::error::{Result, PulseError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub broadcast: BroadcastSection,

    #[serde(default)]
    pub persistence: PersistenceSection,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            broadcast: BroadcastSection::default(),
            persistence: PersistenceSection::default(),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(PulseError::UnsupportedVersion);
        }

        self.server.validate()?;
        self.broadcast.validate()?;
        self.persistence.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            ping_interval_ms: default_ping_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        if self.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(PulseError::BadRequest(
                "server.listen must be a valid socket address".into(),
            ));
        }
        if !(5000..=120000).contains(&self.ping_interval_ms) {
            return Err(PulseError::BadRequest(
                "server.ping_interval_ms must be between 5000 and 120000".into(),
            ));
        }
        if !(10000..=600000).contains(&self.idle_timeout_ms) {
            return Err(PulseError::BadRequest(
                "server.idle_timeout_ms must be between 10000 and 600000".into(),
            ));
        }
        if self.idle_timeout_ms <= self.ping_interval_ms {
            return Err(PulseError::BadRequest(
                "server.idle_timeout_ms must be greater than ping_interval_ms".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:3000".into()
}
fn default_ping_interval_ms() -> u64 {
    20000
}
fn default_idle_timeout_ms() -> u64 {
    60000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BroadcastSection {
    /// Outbound queue depth per subscriber. A subscriber whose queue fills up
    /// is evicted.
    #[serde(default = "default_subscriber_queue")]
    pub subscriber_queue: usize,
}

impl Default for BroadcastSection {
    fn default() -> Self {
        Self {
            subscriber_queue: default_subscriber_queue(),
        }
    }
}

impl BroadcastSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=65536).contains(&self.subscriber_queue) {
            return Err(PulseError::BadRequest(
                "broadcast.subscriber_queue must be between 1 and 65536".into(),
            ));
        }
        Ok(())
    }
}

fn default_subscriber_queue() -> usize {
    256
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersistenceSection {
    #[serde(default = "default_backend")]
    pub backend: PersistenceBackend,

    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for PersistenceSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: default_url(),
            write_timeout_ms: default_write_timeout_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl PersistenceSection {
    pub fn validate(&self) -> Result<()> {
        if self.backend == PersistenceBackend::Sqlite && !self.url.starts_with("sqlite:") {
            return Err(PulseError::BadRequest(
                "persistence.url must start with sqlite: for the sqlite backend".into(),
            ));
        }
        if !(100..=60000).contains(&self.write_timeout_ms) {
            return Err(PulseError::BadRequest(
                "persistence.write_timeout_ms must be between 100 and 60000".into(),
            ));
        }
        if !(1..=65536).contains(&self.queue_capacity) {
            return Err(PulseError::BadRequest(
                "persistence.queue_capacity must be between 1 and 65536".into(),
            ));
        }
        Ok(())
    }
}

fn default_backend() -> PersistenceBackend {
    PersistenceBackend::Sqlite
}
fn default_url() -> String {
    "sqlite://data/pulseboard.db".into()
}
fn default_write_timeout_ms() -> u64 {
    2000
}
fn default_queue_capacity() -> usize {
    1024
}
