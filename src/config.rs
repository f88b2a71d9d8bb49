//! Configuration resolution.
//!
//! Settings are merged from an optional TOML file and the global command-line
//! flags, flags taking precedence. The file is looked up in this order:
//!   1. `--config PATH`  (explicit override)
//!   2. `./app-store-connect.toml`
//!   3. `<config dir>/app-store-connect/config.toml`

use anyhow::{bail, Context, Result};
use jsonwebtoken::EncodingKey;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::{Identity, TokenIssuer, DEFAULT_VALIDITY};
use crate::keys;

const LOCAL_CONFIG: &str = "app-store-connect.toml";

const MISSING_REQUIRED: &str =
    "missing required arguments: key-id, issuer-id, private-key, and bundle-id are required";

/// Top-level layout of the config file.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct FileConfig {
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ApiConfig {
    pub issuer_id: Option<String>,
    pub key_id: Option<String>,
    pub bundle_id: Option<String>,
    /// Path to the `.p8` file or the PEM itself.
    pub private_key: Option<String>,
    pub use_sandbox: Option<bool>,
    pub token_ttl_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("invalid TOML in {}", path.display()))
    }
}

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub issuer_id: Option<String>,
    pub key_id: Option<String>,
    pub bundle_id: Option<String>,
    pub private_key: Option<PathBuf>,
    pub use_sandbox: bool,
}

pub enum KeySource {
    Path(PathBuf),
    Inline(String),
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Self::Inline(_) => f.write_str("Inline(<redacted>)"),
        }
    }
}

/// Fully resolved settings the API client is built from.
#[derive(Debug)]
pub struct Settings {
    pub identity: Identity,
    pub key: KeySource,
    pub use_sandbox: bool,
    pub token_ttl: Duration,
}

impl Settings {
    /// Merge file values with command-line overrides.
    ///
    /// Relative key paths from the file resolve against `base_dir`.
    pub fn resolve(file: FileConfig, base_dir: &Path, cli: CliOverrides) -> Result<Self> {
        let api = file.api;

        let issuer_id = non_empty(cli.issuer_id.or(api.issuer_id));
        let key_id = non_empty(cli.key_id.or(api.key_id));
        let bundle_id = non_empty(cli.bundle_id.or(api.bundle_id));
        let key = match (cli.private_key, non_empty(api.private_key)) {
            (Some(p), _) if !p.as_os_str().is_empty() => Some(KeySource::Path(expand(&p))),
            (_, Some(v)) => Some(resolve_key(&v, base_dir)),
            _ => None,
        };

        let (Some(issuer_id), Some(key_id), Some(bundle_id), Some(key)) =
            (issuer_id, key_id, bundle_id, key)
        else {
            bail!(MISSING_REQUIRED);
        };

        Ok(Self {
            identity: Identity {
                issuer_id,
                bundle_id,
                key_id,
            },
            key,
            use_sandbox: cli.use_sandbox || api.use_sandbox.unwrap_or(false),
            token_ttl: api
                .token_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_VALIDITY),
        })
    }

    pub fn load_key(&self) -> crate::error::Result<EncodingKey> {
        match &self.key {
            KeySource::Path(p) => keys::load_private_key(p),
            KeySource::Inline(pem) => keys::parse_private_key(pem),
        }
    }

    /// Build a token issuer from these settings, loading the private key.
    pub fn issuer(&self) -> crate::error::Result<TokenIssuer> {
        TokenIssuer::new(self.identity.clone(), self.load_key()?).with_validity(self.token_ttl)
    }
}

/// Locate the config file, if any.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(p) = explicit {
        if !p.exists() {
            bail!("config file not found: {}", p.display());
        }
        return Ok(Some(p.to_path_buf()));
    }

    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Ok(Some(local));
    }

    Ok(dirs::config_dir()
        .map(|d| d.join("app-store-connect").join("config.toml"))
        .filter(|p| p.exists()))
}

/// Return the path `init` writes to: `./app-store-connect.toml` or the user config dir.
pub fn init_config_path(global: bool) -> Result<PathBuf> {
    if global {
        let dir = dirs::config_dir().context("could not determine config directory")?;
        Ok(dir.join("app-store-connect").join("config.toml"))
    } else {
        Ok(PathBuf::from(LOCAL_CONFIG))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

/// Resolve a private key value: either inline PEM or a path.
fn resolve_key(value: &str, relative_to: &Path) -> KeySource {
    if value.trim_start().starts_with("-----BEGIN") {
        return KeySource::Inline(value.to_string());
    }

    let path = expand(Path::new(value));
    if path.is_relative() {
        KeySource::Path(relative_to.join(path))
    } else {
        KeySource::Path(path)
    }
}

/// Template config for `init`.
pub const CONFIG_TEMPLATE: &str = r#"# app-store-connect-cli configuration
#
# API credentials from App Store Connect:
#   https://appstoreconnect.apple.com/access/integrations/api
#
# Command-line flags override anything set here.

[api]
issuer_id   = "YOUR_ISSUER_ID"
key_id      = "YOUR_KEY_ID"
bundle_id   = "com.example.myapp"
private_key = "path/to/AuthKey_XXXXXXXX.p8"

# use_sandbox = false
# token_ttl_secs = 1200  # at most 3600
"#;
