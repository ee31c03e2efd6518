use anyhow::Context;
use canvas_core::{CanvasClient, CanvasConfig, ShareRequest, SharedCanvas, Visibility};
use canvas_gateway::GatewayServer;
use canvas_sandbox::generate_preview_document_with;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod source;

use source::{load_single, SourceArgs};

/// Configuration file used when --config is not given
const DEFAULT_CONFIG_FILE: &str = "canvas.toml";

/// Code Canvas - sandboxed HTML/CSS/JS previews
#[derive(Parser)]
#[command(name = "canvas", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: ./canvas.toml when present)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the sandbox preview document for some code
    Render {
        #[command(flatten)]
        source: SourceArgs,

        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Split a code file into HTML/CSS/JS buffers and print them as JSON
    Extract {
        file: PathBuf,

        /// Language tag; guessed from the extension when omitted
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Run the canvas gateway
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Share code with the canvas service and print the link
    Share {
        #[arg(short, long)]
        title: String,

        /// public, unlisted or private
        #[arg(long, default_value = "public")]
        visibility: Visibility,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Show a shared canvas
    Fetch {
        share_id: String,

        /// Print the raw canvas as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default configuration file
    Init {
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Render { source, output } => {
            let config = load_config(cli.config.as_deref())?;
            let code = source.load()?;
            let document = generate_preview_document_with(&code, &config.document_options());
            match output {
                Some(path) => {
                    std::fs::write(&path, document)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    eprintln!("{} {}", "Preview written to".green(), path.display());
                }
                None => print!("{}", document),
            }
        }
        Commands::Extract { file, language } => {
            let code = load_single(&file, language.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&code)?);
        }
        Commands::Serve { host, port } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(host) = host {
                config = config.with_host(host);
            }
            if let Some(port) = port {
                config = config.with_port(port);
            }
            config.validate()?;
            serve(config).await?;
        }
        Commands::Share {
            title,
            visibility,
            source,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let code = source.load()?;
            let request = ShareRequest::new(title, &code, visibility);
            request.validate()?;

            let client = CanvasClient::new(&config.share)?;
            let shared = client
                .share_canvas(&request)
                .await
                .context("Failed to share canvas")?;
            println!("{}", client.full_share_url(&shared.share_url).green().bold());
        }
        Commands::Fetch { share_id, json } => {
            let config = load_config(cli.config.as_deref())?;
            let client = CanvasClient::new(&config.share)?;
            let canvas = client.public_canvas(&share_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&canvas)?);
            } else {
                print_canvas(&canvas);
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { path, force } => {
                let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
                if path.exists() && !force {
                    anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
                }
                CanvasConfig::default().to_file(&path)?;
                println!("{} {}", "Wrote default configuration to".green(), path.display());
            }
            ConfigAction::Show => {
                let mut config = load_config(cli.config.as_deref())?;
                if config.share.token.is_some() {
                    config.share.token = Some("********".to_string());
                }
                print!("{}", toml::to_string_pretty(&config)?);
            }
        },
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .init();
}

/// Load the configuration file, then apply `CANVAS_API_URL` and
/// `CANVAS_API_TOKEN` from the environment.
fn load_config(path: Option<&Path>) -> anyhow::Result<CanvasConfig> {
    let mut config = match path {
        Some(path) => CanvasConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            CanvasConfig::from_file(DEFAULT_CONFIG_FILE)?
        }
        None => CanvasConfig::default(),
    };

    config = apply_env(
        config,
        std::env::var("CANVAS_API_URL").ok(),
        std::env::var("CANVAS_API_TOKEN").ok(),
    );
    tracing::debug!("Configuration loaded (api: {})", config.share.api_base_url);
    Ok(config)
}

/// The API URL always wins; the token only fills in a missing one.
fn apply_env(mut config: CanvasConfig, url: Option<String>, token: Option<String>) -> CanvasConfig {
    if let Some(url) = url {
        config = config.with_api_base_url(url);
    }
    if let Some(token) = token {
        if config.share.token.is_none() {
            config = config.with_token(token);
        }
    }
    config
}

async fn serve(config: CanvasConfig) -> anyhow::Result<()> {
    println!(
        "{} http://{}:{}",
        "Code Canvas gateway on".cyan().bold(),
        config.gateway.host,
        config.gateway.port
    );
    println!("Press Ctrl+C to stop");

    let server = Arc::new(GatewayServer::new(config));
    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_server.shutdown();
        }
    });

    server.start().await?;
    Ok(())
}

fn print_canvas(canvas: &SharedCanvas) {
    println!("{}", canvas.title.bold());
    println!(
        "{} {}  {} {}  {} {}",
        "visibility:".dimmed(),
        canvas.visibility,
        "views:".dimmed(),
        canvas.stats.views,
        "forks:".dimmed(),
        canvas.stats.forks
    );
    for (label, body) in [("HTML", &canvas.html), ("CSS", &canvas.css), ("JS", &canvas.js)] {
        if body.is_empty() {
            continue;
        }
        println!();
        println!("{}", format!("── {} ──", label).cyan());
        println!("{}", body);
    }
}
