//! Configuration management for `preview.toml`.
//!
//! # Sections
//!
//! | Section     | Purpose                                             |
//! |-------------|-----------------------------------------------------|
//! | `[serve]`   | HTTP preview server (interface, port, channel port) |
//! | `[preview]` | Project root, fixed instance id (optional)          |

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::cli::Cli;

/// Default HTTP port for the preview server
pub const DEFAULT_HTTP_PORT: u16 = 8088;

/// Default WebSocket port for the broadcast channel
pub const DEFAULT_CHANNEL_PORT: u16 = 35730;

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing preview.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Project root directory (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Preview server settings
    pub serve: ServeConfig,

    /// Preview pipeline settings
    pub preview: PreviewSection,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            serve: ServeConfig::default(),
            preview: PreviewSection::default(),
        }
    }
}

/// `[serve]` section: development server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,

    /// HTTP port number.
    pub port: u16,

    /// WebSocket port for the preview broadcast channel.
    pub channel_port: u16,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: DEFAULT_HTTP_PORT,
            channel_port: DEFAULT_CHANNEL_PORT,
        }
    }
}

/// `[preview]` section: pipeline settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewSection {
    /// Fixed instance id. When unset, a unique id is generated at startup.
    /// Multiple editor instances may share one serving layer; each request
    /// is tagged with the instance it belongs to.
    pub instance_id: Option<String>,
}

impl PreviewConfig {
    /// Load configuration: `preview.toml` next to the project root if present,
    /// defaults otherwise, then CLI overrides on top.
    pub fn load(cli: &Cli) -> Result<Self> {
        let root = cli
            .project
            .canonicalize()
            .with_context(|| format!("project root not found: {}", cli.project.display()))?;

        let mut config = Self::from_file(&root.join(&cli.config))?;
        config.root = root;
        config.apply_cli(cli);
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("invalid config in {}", path.display()))?;
        if config.serve.port == config.serve.channel_port {
            bail!("serve.port and serve.channel_port must differ");
        }
        Ok(config)
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let crate::cli::Commands::Serve {
            interface, port, ..
        } = &cli.command
        {
            if let Some(interface) = interface {
                self.serve.interface = *interface;
            }
            if let Some(port) = port {
                self.serve.port = *port;
            }
        }
    }

    /// The instance id to answer requests for: configured or generated.
    pub fn instance_id(&self) -> String {
        self.preview
            .instance_id
            .clone()
            .unwrap_or_else(generate_instance_id)
    }
}

/// Generate a process-unique instance id (pid + monotonic-ish timestamp).
fn generate_instance_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    format!("{:x}-{:x}", std::process::id(), nanos)
}

// ============================================================================
// global config handle
// ============================================================================

static CONFIG: OnceLock<Arc<PreviewConfig>> = OnceLock::new();

/// Install the global config. Call once at startup.
pub fn init_config(config: PreviewConfig) -> Arc<PreviewConfig> {
    let config = Arc::new(config);
    let _ = CONFIG.set(Arc::clone(&config));
    config
}

/// Get the global config. Panics if `init_config` has not run.
pub fn cfg() -> Arc<PreviewConfig> {
    Arc::clone(CONFIG.get().expect("config not initialized"))
}

// ============================================================================
// Tests
// ============================================================================
