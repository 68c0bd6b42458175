use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use echoplay_core::AppConfig;
use echoplay_engine::{audio_event_channel, spawn, Command, CoordinatorHandle, Player, Queue};
use echoplay_notify::{press, run_presenter, ConsolePresenter, HttpArtSource};
use echoplay_providers::{load_fusion_sources, Catalog, HttpCatalog};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

mod audio;
mod console;

use audio::build_audio_backend;
use console::{format_status, parse_line, ConsoleCommand, HELP};

#[derive(Parser, Debug)]
#[command(
    name = "echoplay",
    about = "Catalog -> Playback Coordinator -> Notification"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive player reading commands from stdin
    Run,
    /// Check the catalog API
    Status,
    Users,
    Songs {
        #[arg(long)]
        search: Option<String>,
    },
    Playlists {
        #[arg(long)]
        user: Option<i64>,
    },
    PlaylistSongs {
        id: i64,
    },
    CreatePlaylist {
        name: String,
        #[arg(long)]
        user: Option<i64>,
    },
    DeletePlaylist {
        id: i64,
    },
    AddSong {
        playlist: i64,
        song: i64,
    },
    RemoveSong {
        playlist: i64,
        song: i64,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cmd = cli.command.unwrap_or(Commands::Run);
    let cfg_path = cli.config.unwrap_or_else(default_config_path);

    if let Commands::Config {
        action: ConfigAction::Init,
    } = cmd
    {
        init_config(&cfg_path)?;
        println!("Initialized config at {}", cfg_path.display());
        return Ok(());
    }

    let cfg = load_or_default(&cfg_path)?;
    init_logging(&cfg.log_level);
    let catalog = HttpCatalog::new(&cfg.api_base_url, &cfg.http)?;

    match cmd {
        Commands::Run => run(cfg, Arc::new(catalog)).await,
        Commands::Status => status(&catalog).await,
        Commands::Users => {
            for user in catalog.users().await? {
                println!("{:>5}  {}", user.id, user.name);
            }
            Ok(())
        }
        Commands::Songs { search } => {
            let tracks = match search {
                Some(q) => catalog.search_tracks(&q).await?,
                None => catalog.tracks().await?,
            };
            for track in tracks {
                println!("{:>5}  {} - {}", track.id, track.artist, track.title);
            }
            Ok(())
        }
        Commands::Playlists { user } => {
            let user_id = resolve_user(user, &cfg)?;
            for playlist in catalog.playlists(user_id).await? {
                println!("{:>5}  {}", playlist.id, playlist.name);
            }
            Ok(())
        }
        Commands::PlaylistSongs { id } => {
            for (idx, track) in catalog.playlist_tracks(id).await?.iter().enumerate() {
                println!("{idx:>3}  #{}  {} - {}", track.id, track.artist, track.title);
            }
            Ok(())
        }
        Commands::CreatePlaylist { name, user } => {
            let user_id = resolve_user(user, &cfg)?;
            let playlist = catalog.create_playlist(&name, user_id).await?;
            println!("Created playlist {} ({})", playlist.id, playlist.name);
            Ok(())
        }
        Commands::DeletePlaylist { id } => {
            catalog.delete_playlist(id).await?;
            println!("Deleted playlist {id}");
            Ok(())
        }
        Commands::AddSong { playlist, song } => {
            catalog.add_track_to_playlist(playlist, song).await?;
            println!("Added song {song} to playlist {playlist}");
            Ok(())
        }
        Commands::RemoveSong { playlist, song } => {
            catalog.remove_track_from_playlist(playlist, song).await?;
            println!("Removed song {song} from playlist {playlist}");
            Ok(())
        }
        Commands::Config { .. } => Ok(()),
    }
}

async fn run(cfg: AppConfig, catalog: Arc<dyn Catalog>) -> Result<()> {
    let (events_tx, events_rx) = audio_event_channel();
    let backend = build_audio_backend(&cfg.playback, events_tx)?;
    let player = Player::new(backend, Queue::new()).with_looping(cfg.playback.start_looping);
    let (handle, coordinator) = spawn(player, events_rx);

    let presenter = if cfg.notification.enabled {
        let art = HttpArtSource::new(
            Duration::from_millis(cfg.http.connect_timeout_ms),
            Duration::from_millis(cfg.http.request_timeout_ms),
        )?;
        let snapshots = handle.subscribe();
        let title = cfg.notification.app_title.clone();
        Some(tokio::spawn(async move {
            run_presenter(
                snapshots,
                ConsolePresenter::new(tokio::io::stdout()),
                Arc::new(art),
                &title,
            )
            .await
        }))
    } else {
        None
    };

    info!(api = %cfg.api_base_url, backend = %cfg.playback.audio_backend, "echoplay started");
    println!("{HELP}");

    let mut lines = spawn_stdin_reader();
    loop {
        tokio::select! {
            line = lines.recv() => match line {
                Some(line) => match parse_line(&line) {
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(cmd)) => {
                        if let Err(err) = execute(&handle, catalog.as_ref(), cmd).await {
                            warn!(error=%err, "command failed");
                            println!("error: {err:#}");
                        }
                    }
                    Ok(None) => {}
                    Err(err) => println!("{err}"),
                },
                None => {
                    info!("stdin closed; shutting down");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("received ctrl-c; shutting down");
                break;
            }
        }
    }

    if let Err(err) = handle.shutdown().await {
        warn!(error=%err, "coordinator already stopped");
    }
    drop(handle);
    if let Err(err) = coordinator.await {
        error!(error=%err, "coordinator task failed");
    }
    if let Some(presenter) = presenter {
        if let Err(err) = presenter.await {
            error!(error=%err, "presenter task failed");
        }
    }
    Ok(())
}

// Interactive stdin lives on its own thread so a pending read never holds up
// runtime shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    error!(error=%err, "failed to read stdin");
                    break;
                }
            }
        }
    });
    rx
}

async fn execute(handle: &CoordinatorHandle, catalog: &dyn Catalog, cmd: ConsoleCommand) -> Result<()> {
    let command = match cmd {
        ConsoleCommand::Play(None) => Command::Play,
        ConsoleCommand::Play(Some(id)) => Command::PlaySingle(catalog.track(id).await?),
        ConsoleCommand::Playlist { id, shuffle, start } => {
            let tracks = catalog.playlist_tracks(id).await?;
            if tracks.is_empty() {
                bail!("playlist {id} has no songs");
            }
            if let Some(index) = start.filter(|i| *i >= tracks.len()) {
                bail!("playlist {id} has {} songs; no index {index}", tracks.len());
            }
            Command::PlayPlaylist {
                tracks,
                shuffle,
                start,
            }
        }
        ConsoleCommand::Fusion(ids) => {
            let sources = load_fusion_sources(catalog, &ids).await?;
            if sources.iter().all(Vec::is_empty) {
                bail!("the selected playlists have no songs");
            }
            Command::PlayFusionMix(sources)
        }
        ConsoleCommand::Pause => Command::Pause,
        ConsoleCommand::Toggle => Command::PlayPause,
        ConsoleCommand::Next => Command::Next,
        ConsoleCommand::Prev => Command::Previous,
        ConsoleCommand::Stop => Command::Stop,
        ConsoleCommand::Seek(pct) => Command::Seek(pct),
        ConsoleCommand::Loop => Command::ToggleLooping,
        ConsoleCommand::Shuffle(on) => Command::SetShuffle(on),
        ConsoleCommand::Press(button) => {
            if !press(handle, button).await? {
                println!("{button:?} does nothing outside a playlist");
            }
            return Ok(());
        }
        ConsoleCommand::Status => {
            println!("{}", format_status(&handle.snapshot()));
            return Ok(());
        }
        ConsoleCommand::Help => {
            println!("{HELP}");
            return Ok(());
        }
        ConsoleCommand::Quit => return Ok(()),
    };
    handle.dispatch(command).await?;
    Ok(())
}

async fn status(catalog: &HttpCatalog) -> Result<()> {
    println!("api: {}", catalog.base_url());
    match catalog.users().await {
        Ok(users) => println!("users: {}", users.len()),
        Err(err) => {
            println!("api: not reachable");
            println!("error: {err}");
            return Ok(());
        }
    }
    match catalog.tracks().await {
        Ok(tracks) => println!("songs: {}", tracks.len()),
        Err(err) => println!("error: {err}"),
    }
    Ok(())
}

fn resolve_user(flag: Option<i64>, cfg: &AppConfig) -> Result<i64> {
    match flag.or(cfg.user_id) {
        Some(id) => Ok(id),
        None => bail!("no user selected; pass --user or set user_id in the config"),
    }
}

fn default_config_path() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("echoplay").join("config.toml")
}

fn init_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let cfg = AppConfig::default();
    let toml = toml::to_string_pretty(&cfg)?;
    std::fs::write(path, toml)
        .with_context(|| format!("failed to write config file {}", path.display()))?;
    Ok(())
}

fn load_or_default(path: &Path) -> Result<AppConfig> {
    let mut cfg = if !path.exists() {
        AppConfig::default()
    } else {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))?
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

fn init_logging(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .try_init();
}

fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Ok(v) = std::env::var("ECHOPLAY_API_BASE_URL") {
        if !v.trim().is_empty() {
            cfg.api_base_url = v;
        }
    }
    if let Ok(v) = std::env::var("ECHOPLAY_LOG_LEVEL") {
        if !v.trim().is_empty() {
            cfg.log_level = v;
        }
    }
    if let Ok(v) = std::env::var("ECHOPLAY_USER_ID") {
        if let Ok(parsed) = v.trim().parse::<i64>() {
            cfg.user_id = Some(parsed);
        }
    }
}
