use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use url::Url;

use keygate::http::{build_router, AppState};
use keygate::{resolve_redirect, RootConfig, RootError, RootResult};
use keygate_core::{Timestamp, UNAUTHORIZED_CODE};
use keygate_handoff::{
    append_to_url, decode_from_url, HandoffSigner, SigningSecret, HANDOFF_TTL_SECONDS,
};

/// Keygate: URL-key access gate
///
/// Keeps the site and its administrator entry point closed until the
/// configured key parameter has been presented once per session.
#[derive(Parser, Debug)]
#[command(name = "keygate", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration with a fresh signing secret
    Init {
        /// Key parameter name to gate on
        #[arg(long)]
        security_key: Option<String>,

        /// Overwrite an existing signing secret
        #[arg(long)]
        rotate_secret: bool,
    },

    /// Run the gated HTTP host
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        bind: Option<String>,

        /// Port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print a freshly signed handoff URL for the configured redirect target
    Handoff {
        /// Denial text (defaults to the configured message)
        #[arg(short, long)]
        message: Option<String>,

        /// Denial code
        #[arg(long, default_value_t = UNAUTHORIZED_CODE)]
        code: u16,
    },

    /// Decode the handoff parameters of a URL and check them against the secret
    Inspect {
        /// URL carrying ba_* parameters
        url: String,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("keygate=debug,keygate_handoff=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("keygate=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn config_path(path: Option<&PathBuf>) -> PathBuf {
    path.cloned().unwrap_or_else(RootConfig::default_config_path)
}

fn load_config(path: Option<&PathBuf>) -> RootResult<RootConfig> {
    RootConfig::load(&config_path(path))
}

fn signer_for(config: &RootConfig) -> RootResult<HandoffSigner> {
    Ok(HandoffSigner::new(SigningSecret::from_source(config)?))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> RootResult<()> {
    match cli.command {
        Commands::Init {
            security_key,
            rotate_secret,
        } => cmd_init(cli.config.as_ref(), security_key, rotate_secret),
        Commands::Serve { bind, port } => cmd_serve(cli.config.as_ref(), bind, port).await,
        Commands::Handoff { message, code } => cmd_handoff(cli.config.as_ref(), message, code),
        Commands::Inspect { url } => cmd_inspect(cli.config.as_ref(), &url),
    }
}

fn cmd_init(
    path: Option<&PathBuf>,
    security_key: Option<String>,
    rotate_secret: bool,
) -> RootResult<()> {
    let save_path = config_path(path);
    let mut config = RootConfig::read(&save_path)?;

    if config.ensure_secret(rotate_secret) {
        info!("generated a new signing secret");
    }
    if let Some(key) = security_key {
        config.gate.security_key = key;
    }
    config.validate()?;
    config.save(&save_path)?;

    info!(path = %save_path.display(), "configuration written");
    println!("Keygate initialized.");
    println!("  Config:       {}", save_path.display());
    println!("  Area:         {}", config.gate.area);
    println!("  Block mode:   {}", config.gate.block_mode);
    if config.gate.is_configured() {
        println!("  Key param:    {}", config.gate.security_key);
    } else {
        println!("  Key param:    (unset, gate is open)");
    }
    Ok(())
}

async fn cmd_serve(
    path: Option<&PathBuf>,
    bind: Option<String>,
    port: Option<u16>,
) -> RootResult<()> {
    let mut config = load_config(path)?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let state = Arc::new(AppState::new(config)?);
    if !state.config.gate.is_configured() {
        tracing::warn!("no security_key configured, every request will be allowed");
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        addr = %addr,
        area = %state.config.gate.area,
        block_mode = %state.config.gate.block_mode,
        "keygate listening"
    );

    axum::serve(listener, build_router(state))
        .await
        .map_err(RootError::Io)
}

fn cmd_handoff(path: Option<&PathBuf>, message: Option<String>, code: u16) -> RootResult<()> {
    let config = load_config(path)?;
    let signer = signer_for(&config)?;
    let app_root = config.server.app_root_url()?;
    let target = resolve_redirect(&config.gate.redirect_url, &app_root);

    let text = message.unwrap_or_else(|| config.gate.message.clone());
    let msg = signer.issue(code, &text, Timestamp::now())?;
    println!("{}", append_to_url(&target, &msg));
    Ok(())
}

fn cmd_inspect(path: Option<&PathBuf>, raw: &str) -> RootResult<()> {
    let config = load_config(path)?;
    let url = Url::parse(raw).map_err(|e| keygate_core::KeygateError::InvalidUrl(e.to_string()))?;

    let Some(msg) = decode_from_url(&url, &config.gate.message)? else {
        println!("No handoff message in URL.");
        return Ok(());
    };

    let now = Timestamp::now();
    let age = now.abs_diff(msg.timestamp);
    let verified = signer_for(&config)?.verify(&msg, now, HANDOFF_TTL_SECONDS);

    println!("Handoff message:");
    println!("  Code:      {}", msg.code);
    println!("  Text:      {}", msg.text);
    println!("  Issued:    {} ({}s ago)", msg.timestamp.to_rfc3339(), age);
    println!("  Nonce:     {}", msg.nonce.as_str());
    println!("  Verifies:  {}", if verified { "yes" } else { "no" });
    Ok(())
}
