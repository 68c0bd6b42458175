use crate::audio::{AudioEventReceiver, AudioSink};
use crate::player::{Player, Snapshot};
use echoplay_core::Track;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    PlayPause,
    Next,
    Previous,
    Stop,
    Seek(f32),
    ToggleLooping,
    SetShuffle(bool),
    PlaySingle(Track),
    PlayPlaylist {
        tracks: Vec<Track>,
        shuffle: bool,
        start: Option<usize>,
    },
    PlayFusionMix(Vec<Vec<Track>>),
}

#[derive(Debug, Error)]
#[error("playback coordinator is not running")]
pub struct CoordinatorClosed;

enum Request {
    Command(Command),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable entry point used by UI code and by the notification presenter.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Request>,
    snapshots: watch::Receiver<Snapshot>,
}

impl CoordinatorHandle {
    pub async fn dispatch(&self, command: Command) -> Result<(), CoordinatorClosed> {
        self.tx
            .send(Request::Command(command))
            .await
            .map_err(|_| CoordinatorClosed)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Releases the playback session and waits until the owner task is done
    /// with the audio engine.
    pub async fn shutdown(&self) -> Result<(), CoordinatorClosed> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Request::Shutdown(ack_tx))
            .await
            .map_err(|_| CoordinatorClosed)?;
        ack_rx.await.map_err(|_| CoordinatorClosed)
    }
}

/// Moves the player into its owner task. Commands from every handle share one
/// channel and are applied strictly in arrival order.
pub fn spawn<S>(player: Player<S>, events: AudioEventReceiver) -> (CoordinatorHandle, JoinHandle<()>)
where
    S: AudioSink + 'static,
{
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let (snapshot_tx, snapshot_rx) = watch::channel(player.snapshot());
    let task = tokio::spawn(run(player, rx, events, snapshot_tx));
    (
        CoordinatorHandle {
            tx,
            snapshots: snapshot_rx,
        },
        task,
    )
}

async fn run<S: AudioSink>(
    mut player: Player<S>,
    mut rx: mpsc::Receiver<Request>,
    mut events: AudioEventReceiver,
    snapshot_tx: watch::Sender<Snapshot>,
) {
    info!(sink = player.sink().name(), "playback coordinator started");

    loop {
        tokio::select! {
            req = rx.recv() => match req {
                Some(Request::Command(command)) => {
                    apply(&mut player, command);
                    publish(&player, &snapshot_tx);
                }
                Some(Request::Shutdown(ack)) => {
                    player.release();
                    publish(&player, &snapshot_tx);
                    let _ = ack.send(());
                    break;
                }
                None => {
                    player.release();
                    publish(&player, &snapshot_tx);
                    break;
                }
            },
            Some(event) = events.recv() => {
                if player.handle(event) {
                    publish(&player, &snapshot_tx);
                }
            }
        }
    }

    info!("playback coordinator stopped");
}

fn apply<S: AudioSink>(player: &mut Player<S>, command: Command) {
    debug!(?command, "command");
    match command {
        Command::Play => player.play(),
        Command::Pause => player.pause(),
        Command::PlayPause => player.play_pause(),
        Command::Next => player.next(),
        Command::Previous => player.previous(),
        Command::Stop => player.stop(),
        Command::Seek(percent) => player.seek(percent),
        Command::ToggleLooping => {
            player.toggle_looping();
        }
        Command::SetShuffle(enabled) => {
            player.set_shuffle(enabled);
        }
        Command::PlaySingle(track) => player.select_single(track),
        Command::PlayPlaylist {
            tracks,
            shuffle,
            start,
        } => {
            if let Err(err) = player.select_playlist(tracks, shuffle, start) {
                warn!(error = %err, "playlist not started");
            }
        }
        Command::PlayFusionMix(playlists) => {
            if let Err(err) = player.select_fusion_mix(&playlists) {
                warn!(error = %err, "fusion mix not started");
            }
        }
    }
}

// The whole snapshot is replaced in one step so readers never see a mix of
// two transitions.
fn publish<S: AudioSink>(player: &Player<S>, tx: &watch::Sender<Snapshot>) {
    let next = player.snapshot();
    tx.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}
