use anyhow::Context;
use clap::Parser;
use gmusic_clipd::clipboard::SystemClipboard;
use gmusic_clipd::error::FatalError;
use gmusic_clipd::ledger::DownloadLedger;
use gmusic_clipd::poller::Poller;
use gmusic_clipd::tagger::{Id3v2Tagger, LoftyTagger, Tagger};
use gmusic_clipd::worker::{Worker, WorkerSettings};
use gmusic_proto::config::{Config, TaggerBackend, TaggerConfig};
use gmusic_proto::google::GoogleMusicClient;
use gmusic_proto::platform;
use gmusic_proto::service::MusicService;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Download Google Music tracks whose share links are copied to the clipboard.
#[derive(Debug, Parser)]
#[command(name = "gmusic-clipd", version)]
struct Cli {
    /// Config file (TOML, or legacy JSON when named *.json / *.conf)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Account email, overrides `Email`
    #[arg(long, env = "GMUSIC_EMAIL")]
    email: Option<String>,

    /// Account password, overrides `Password`
    #[arg(long, env = "GMUSIC_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Where downloaded tracks are written
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// 16 hex character Android device id
    #[arg(long)]
    device_id: Option<String>,

    /// Tagging backend: id3v2 or lofty
    #[arg(long)]
    tagger: Option<TaggerBackend>,

    /// Clipboard poll interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(email) = self.email {
            config.email = email;
        }
        if let Some(password) = self.password {
            config.password = password;
        }
        if let Some(output_dir) = self.output_dir {
            config.output_dir = output_dir;
        }
        if let Some(device_id) = self.device_id {
            config.device_id = device_id;
        }
        if let Some(backend) = self.tagger {
            config.tagger.backend = backend;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.poller.interval_ms = interval_ms;
        }
    }
}

fn init_logging() -> anyhow::Result<PathBuf> {
    let log_path = platform::log_path();
    if let Some(dir) = log_path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Create layers: file writer + stderr
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "info,gmusic_clipd=debug,hyper_util=warn,reqwest=warn",
                )
            }),
        )
        .init();

    Ok(log_path)
}

fn build_tagger(config: &TaggerConfig) -> Box<dyn Tagger> {
    match config.backend {
        TaggerBackend::Id3v2 => {
            let program = config
                .id3v2_path
                .clone()
                .or_else(platform::find_id3v2_binary)
                .unwrap_or_else(|| {
                    warn!("id3v2 not found, downloads will stay untagged until it is installed");
                    PathBuf::from("id3v2")
                });
            let tagger = Id3v2Tagger::new(program);
            info!(program = %tagger.program().display(), "Tagging with id3v2");
            Box::new(tagger)
        }
        TaggerBackend::Lofty => {
            info!("Tagging with lofty");
            Box::new(LoftyTagger)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_path = init_logging()?;
    eprintln!("gmusic-clipd log: {}", log_path.display());

    // ── Config ───────────────────────────────────────────────────────────────
    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Error reading config")?;
    cli.apply(&mut config);
    config
        .validate()
        .with_context(|| format!("Incomplete config, edit {}", config_path.display()))?;
    info!(path = %config_path.display(), "Config loaded");

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("Couldn't create {}", config.output_dir.display()))?;

    // ── Login ────────────────────────────────────────────────────────────────
    let mut client = GoogleMusicClient::new(config.http.timeout())?;
    info!(email = %config.email, "Logging in...");
    if let Err(e) = client.login(&config.email, &config.password).await {
        let fatal = FatalError::Auth(e);
        error!("{}", fatal);
        return Err(fatal.into());
    }
    info!(".. done");

    let clipboard = SystemClipboard::new().map_err(|e| {
        error!("Error opening clipboard: {}", e);
        FatalError::from(e)
    })?;

    // ── Pipeline ─────────────────────────────────────────────────────────────
    let (queue_tx, queue_rx) = mpsc::channel(config.poller.queue_capacity);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (ledger, _ledger_task) = DownloadLedger::spawn(events_rx);

    let mut http = reqwest::Client::builder();
    if let Some(timeout) = config.http.timeout() {
        http = http.timeout(timeout);
    }
    let worker = Worker::new(
        client,
        build_tagger(&config.tagger),
        http.build()?,
        WorkerSettings {
            output_dir: config.output_dir.clone(),
            device_id: config.device_id.clone(),
        },
    )
    .with_events(events_tx.clone());
    let worker_handle = tokio::spawn(worker.run(queue_rx));

    // The poller stays on this task: clipboard handles are not always Send.
    let poller = Poller::new(clipboard, queue_tx, config.poller.interval()).with_events(events_tx);

    let result = tokio::select! {
        polled = poller.run() => match polled {
            Err(e) => {
                let fatal = FatalError::from(e);
                error!("Error reading clipboard: {}", fatal);
                Err(fatal.into())
            }
            Ok(()) => {
                let joined = worker_handle.await;
                Err(anyhow::anyhow!("download worker stopped unexpectedly: {:?}", joined.err()))
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            Ok(())
        }
    };

    info!(summary = %ledger.read().await.summary(), "Session finished");
    result
}
