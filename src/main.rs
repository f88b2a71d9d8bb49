use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use app_store_connect_cli::client::{AscClient, Environment};
use app_store_connect_cli::config::{self, CliOverrides, FileConfig, Settings};
use app_store_connect_cli::types::TokenInfo;

// ─── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "app-store-connect-cli",
    version,
    about = "A simple CLI tool to interact with the App Store Connect API"
)]
struct Cli {
    /// The key ID of the API key.
    #[arg(long, global = true)]
    key_id: Option<String>,

    /// The issuer ID of the API key.
    #[arg(long, global = true)]
    issuer_id: Option<String>,

    /// The path to the private key file.
    #[arg(long = "private-key", global = true)]
    private_key: Option<PathBuf>,

    /// The bundle ID of the application.
    #[arg(long, global = true)]
    bundle_id: Option<String>,

    /// Use the sandbox environment.
    #[arg(long, global = true)]
    use_sandbox: bool,

    /// Config file (default: ./app-store-connect.toml, then the user config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format.
    #[arg(long, default_value = "text", global = true)]
    format: Format,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Clone, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Cmd {
    /// Write a template config file.
    Init {
        /// Write to the user config directory instead of ./app-store-connect.toml.
        #[arg(long)]
        global: bool,
    },

    /// Request a test server to server notification for your application.
    #[command(alias = "requestTestNotification")]
    RequestTestNotification,

    /// Mint a token with the configured credentials and print it.
    Token,
}

// ─── Entry ───────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "app_store_connect_cli=debug"
    } else {
        "app_store_connect_cli=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // `init` doesn't need credentials
    if let Cmd::Init { global } = &cli.cmd {
        return cmd_init(*global);
    }

    let settings = load_settings(&cli)?;
    debug!(
        key_id = %settings.identity.key_id,
        issuer_id = %settings.identity.issuer_id,
        bundle_id = %settings.identity.bundle_id,
        use_sandbox = settings.use_sandbox,
        "settings resolved"
    );

    match cli.cmd {
        Cmd::Init { .. } => unreachable!(),
        Cmd::RequestTestNotification => cmd_request_test_notification(&settings, &cli.format).await,
        Cmd::Token => cmd_token(&settings, &cli.format),
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let (file, base_dir) = match config::resolve_config_path(cli.config.as_deref())? {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            let base = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (FileConfig::load(&path)?, base)
        }
        None => (FileConfig::default(), PathBuf::from(".")),
    };

    let overrides = CliOverrides {
        issuer_id: cli.issuer_id.clone(),
        key_id: cli.key_id.clone(),
        bundle_id: cli.bundle_id.clone(),
        private_key: cli.private_key.clone(),
        use_sandbox: cli.use_sandbox,
    };
    Settings::resolve(file, &base_dir, overrides)
}

fn make_client(settings: &Settings) -> Result<AscClient> {
    let issuer = settings.issuer().context("failed to initialize API client")?;
    let client = AscClient::new(issuer, Environment::from_sandbox_flag(settings.use_sandbox))?;
    debug!("API client initialized");
    Ok(client)
}

// ─── init ────────────────────────────────────────────────────────────────────

fn cmd_init(global: bool) -> Result<()> {
    let path = config::init_config_path(global)?;
    if path.exists() {
        eprintln!("Config already exists: {}", path.display());
        return Ok(());
    }
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&path, config::CONFIG_TEMPLATE)
        .with_context(|| format!("could not write {}", path.display()))?;

    eprintln!("Created {}", path.display());
    eprintln!();
    eprintln!("Next steps:");
    eprintln!("  1. Edit {} with your API credentials", path.display());
    eprintln!("  2. Run `app-store-connect-cli token` to verify the key loads");
    eprintln!("  3. Run `app-store-connect-cli request-test-notification`");
    Ok(())
}

// ─── request-test-notification ───────────────────────────────────────────────

async fn cmd_request_test_notification(settings: &Settings, fmt: &Format) -> Result<()> {
    let client = make_client(settings)?;
    let token = client
        .request_test_notification()
        .await
        .context("Failed to send test notification")?;

    info!("Test notification sent");
    match fmt {
        Format::Json => {
            let out = serde_json::json!({ "test_notification_token": token });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Text => {
            if !token.is_empty() {
                println!("{token}");
            }
        }
    }
    Ok(())
}

// ─── token ───────────────────────────────────────────────────────────────────

fn cmd_token(settings: &Settings, fmt: &Format) -> Result<()> {
    let client = make_client(settings)?;
    let signed = client.issuer().mint()?;

    let info = TokenInfo {
        token: signed.token,
        key_id: settings.identity.key_id.clone(),
        issued_at: to_datetime(signed.claims.iat)?,
        expires_at: to_datetime(signed.claims.exp)?,
    };

    match fmt {
        Format::Json => println!("{}", serde_json::to_string_pretty(&info)?),
        Format::Text => {
            println!("{}", info.token);
            eprintln!("Expires: {}", info.expires_at.to_rfc3339());
        }
    }
    Ok(())
}

fn to_datetime(secs: u64) -> Result<chrono::DateTime<chrono::Utc>> {
    let secs = i64::try_from(secs).context("timestamp out of range")?;
    chrono::DateTime::from_timestamp(secs, 0).context("timestamp out of range")
}
