use std::path::PathBuf;

use anyhow::{anyhow, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use listendoctor_client::{
    ClientConfig, ClientSession, ProcessingRequest, Room, SessionPhase, observer_fn,
};

/// Listen Doctor client - authenticate, follow progress and submit recordings
#[derive(Parser, Debug)]
#[command(name = "listendoctor")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authenticate with the configured client credentials
    Auth,

    /// Join a room and print channel notifications until Ctrl-C
    Listen {
        /// Room to join (a random one if omitted)
        #[arg(short = 'r', long = "room")]
        room: Option<String>,
    },

    /// Submit a recording and print progress and the result
    Process {
        /// Recording to upload
        #[arg(short = 'f', long = "file", value_name = "FILE")]
        file: PathBuf,

        /// Room to follow progress in (a random one if omitted)
        #[arg(short = 'r', long = "room")]
        room: Option<String>,

        #[arg(long)]
        prompt: Option<String>,

        #[arg(long)]
        language: Option<String>,

        #[arg(long)]
        speciality: Option<i32>,

        #[arg(long)]
        category: Option<String>,

        /// Date label sent with the recording (current time if omitted)
        #[arg(long)]
        datetime: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Must be installed before any TLS connection is attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let config = if let Some(config_path) = cli.config {
        info!("Loading configuration from {}", config_path.display());
        ClientConfig::from_file(&config_path)?
    } else {
        ClientConfig::from_env()?
    };

    let session = ClientSession::new(config)?;
    if session.phase().await == SessionPhase::Unconfigured {
        bail!("No API key configured (set LISTENDOCTOR_API_KEY or credentials.api_key)");
    }

    let result = run(&session, cli.command).await;
    session.disconnect().await?;
    result
}

async fn run(session: &ClientSession, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Auth => {
            session.authenticate_from_config().await?;
            println!("Authenticated");
        }
        Commands::Listen { room } => {
            session.add_observer(observer_fn(|message| println!("{message}")));
            session.authenticate_from_config().await?;
            session.connect_channel().await?;

            let room = room.map(Room::new).unwrap_or_else(Room::generate);
            session.join_room(room.as_str()).await?;
            println!("Listening in room {room}, press Ctrl-C to stop");

            tokio::signal::ctrl_c().await?;
        }
        Commands::Process {
            file,
            room,
            prompt,
            language,
            speciality,
            category,
            datetime,
        } => {
            let mut request = ProcessingRequest::from_file(&file, &session.config().processing)
                .await
                .map_err(|e| anyhow!("Failed to read {}: {}", file.display(), e))?;
            if let Some(prompt) = prompt {
                request = request.with_prompt(prompt);
            }
            if let Some(language) = language {
                request = request.with_language(language);
            }
            if let Some(speciality) = speciality {
                request = request.with_speciality(speciality);
            }
            if let Some(category) = category {
                request = request.with_category(category);
            }
            if let Some(datetime) = datetime {
                request = request.with_timestamp_label(datetime);
            }

            session.add_observer(observer_fn(|message| println!("{message}")));
            session.authenticate_from_config().await?;
            session.connect_channel().await?;

            let room = room.map(Room::new).unwrap_or_else(Room::generate);
            session.join_room(room.as_str()).await?;

            let result = session.submit_audio(request).await?;
            println!("Summary:\n{}", result.summary);
            if let Some(transcription) = result.transcription {
                println!("\nTranscription:\n{transcription}");
            }
        }
    }
    Ok(())
}
