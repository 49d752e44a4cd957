//! SDKWork TTS gateway CLI
//!
//! Runs the HTTP front door, or performs a single synthesis from the command
//! line against the configured backend.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use sdkwork_tts_gateway::protocol::{AudioFormat, ProfileKind};
use sdkwork_tts_gateway::server::{ServerConfig, TtsServer};
use sdkwork_tts_gateway::synthesis::{SynthesisOptions, SynthesisService};
use sdkwork_tts_gateway::VERSION;

/// Backend profile presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProfileArg {
    /// Model-serving backend, API key in header
    Dashscope,
    /// Token-gateway backend, signed token in URI
    Nls,
}

impl From<ProfileArg> for ProfileKind {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Dashscope => ProfileKind::Dashscope,
            ProfileArg::Nls => ProfileKind::Nls,
        }
    }
}

/// SDKWork TTS gateway - duplex streaming cloud TTS
#[derive(Parser, Debug)]
#[command(name = "sdkwork-tts-gateway")]
#[command(author, version, about, long_about = None)]
#[command(long_about = "
Synthesizes speech through a duplex WebSocket TTS backend and delivers the
audio to local disk or an object store.

Examples:
  # Write a starter config for the token-gateway backend
  sdkwork-tts-gateway init-config --profile nls --output server.yaml

  # Serve POST /api/tts
  TTS_API_KEY=sk-... sdkwork-tts-gateway serve --port 8080

  # One-off synthesis to a file
  sdkwork-tts-gateway synth --text \"Hello world\" --output hello.mp3
")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// API key (profile A)
    #[arg(long, global = true, env = "TTS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Access key id (profile B)
    #[arg(long, global = true, env = "TTS_ACCESS_KEY_ID", hide_env_values = true)]
    access_key_id: Option<String>,

    /// Access key secret (profile B)
    #[arg(long, global = true, env = "TTS_ACCESS_KEY_SECRET", hide_env_values = true)]
    access_key_secret: Option<String>,

    /// Application key (profile B)
    #[arg(long, global = true, env = "TTS_APPKEY")]
    appkey: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Host to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Synthesize text once
    Synth {
        /// Text to synthesize
        #[arg(short, long, conflicts_with = "text_file")]
        text: Option<String>,

        /// Read text from a file
        #[arg(long)]
        text_file: Option<PathBuf>,

        /// Write audio here instead of the configured storage
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Voice override
        #[arg(long)]
        voice: Option<String>,

        /// Model override
        #[arg(long)]
        model: Option<String>,

        /// Output format (mp3, wav, opus)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Write a configuration file with profile defaults
    InitConfig {
        /// Backend profile
        #[arg(long, value_enum, default_value = "dashscope")]
        profile: ProfileArg,

        /// Destination path
        #[arg(short, long, default_value = "server.yaml")]
        output: PathBuf,
    },
}

fn setup_logging(verbose: bool, configured: &str) {
    let level = if verbose {
        Level::DEBUG
    } else {
        Level::from_str(configured).unwrap_or(Level::INFO)
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already installed");
    }
}

fn load_config(cli: &Cli) -> Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ServerConfig::default(),
    };

    let backend = &mut config.backend;
    if cli.api_key.is_some() {
        backend.api_key = cli.api_key.clone();
    }
    if cli.access_key_id.is_some() {
        backend.access_key_id = cli.access_key_id.clone();
    }
    if cli.access_key_secret.is_some() {
        backend.access_key_secret = cli.access_key_secret.clone();
    }
    if cli.appkey.is_some() {
        backend.appkey = cli.appkey.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    setup_logging(cli.verbose, &config.logging.level);
    info!("SDKWork TTS gateway v{}", VERSION);

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            let server = TtsServer::new(config).context("Invalid server configuration")?;
            server.run().await.context("Server terminated")?;
        }

        Commands::Synth {
            text,
            text_file,
            output,
            voice,
            model,
            format,
        } => {
            let text = match (text, text_file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => anyhow::bail!("either --text or --text-file is required"),
            };
            let format = format
                .map(|f| AudioFormat::from_str(&f))
                .transpose()
                .map_err(anyhow::Error::msg)?;

            config.validate().context("Invalid configuration")?;
            let service = SynthesisService::from_config(&config)?;
            let options = SynthesisOptions {
                voice,
                model,
                format,
                api_key: None,
            };

            let start = Instant::now();
            match output {
                Some(path) => {
                    let audio = service.synthesize(&text, &options).await?;
                    if audio.is_empty() {
                        warn!("Backend returned no audio");
                    }
                    std::fs::write(&path, audio.audio())
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!(
                        bytes = audio.len(),
                        chunks = audio.chunk_count(),
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Audio written to {}",
                        path.display()
                    );
                }
                None => {
                    let stored = service.synthesize_and_store(&text, &options).await?;
                    info!(
                        chars = stored.char_count,
                        bytes = stored.bytes,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Audio stored"
                    );
                    println!("{}", stored.url);
                }
            }
        }

        Commands::InitConfig { profile, output } => {
            let config = match ProfileKind::from(profile) {
                ProfileKind::Dashscope => ServerConfig::default_dashscope(),
                ProfileKind::Nls => ServerConfig::default_nls(),
            };
            config
                .save(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Wrote {} config to {}", ProfileKind::from(profile), output.display());
        }
    }

    Ok(())
}
