use crate::art::ArtSource;
use crate::{NotificationEngine, NotificationView, NotifyAction};
use anyhow::{Context, Result};
use async_trait::async_trait;
use echoplay_engine::Snapshot;
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Platform notification surface.
#[async_trait]
pub trait Presenter: Send {
    async fn start(&mut self, view: &NotificationView) -> Result<()>;
    async fn update(&mut self, view: &NotificationView) -> Result<()>;
    async fn dismiss(&mut self) -> Result<()>;
}

/// Writes one JSON object per notification change.
pub struct ConsolePresenter<W> {
    out: W,
}

impl<W> ConsolePresenter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    async fn emit(&mut self, payload: serde_json::Value) -> Result<()> {
        let mut line = serde_json::to_vec(&payload).context("failed to encode notification")?;
        line.push(b'\n');
        self.out
            .write_all(&line)
            .await
            .context("failed to write notification")?;
        self.out.flush().await.context("failed to flush notification")
    }
}

#[async_trait]
impl<W> Presenter for ConsolePresenter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn start(&mut self, view: &NotificationView) -> Result<()> {
        self.emit(json!({ "cmd": "START_FOREGROUND", "view": view }))
            .await
    }

    async fn update(&mut self, view: &NotificationView) -> Result<()> {
        self.emit(json!({ "cmd": "NOTIFY", "view": view })).await
    }

    async fn dismiss(&mut self) -> Result<()> {
        self.emit(json!({ "cmd": "STOP_FOREGROUND" })).await
    }
}

type ArtResult = (String, Result<Vec<u8>>);

/// Follows coordinator snapshots until the coordinator goes away.
pub async fn run_presenter<P>(
    mut snapshots: watch::Receiver<Snapshot>,
    mut presenter: P,
    art: Arc<dyn ArtSource>,
    app_title: &str,
) where
    P: Presenter,
{
    let mut engine = NotificationEngine::new(app_title);
    let (art_tx, mut art_rx) = mpsc::unbounded_channel::<ArtResult>();

    let initial = snapshots.borrow_and_update().clone();
    let out = engine.update(&initial);
    if let Some(url) = out.fetch_art {
        spawn_art_fetch(art.clone(), url, art_tx.clone());
    }
    deliver(&mut presenter, out.action).await;

    info!("notification presenter started");

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                let out = engine.update(&snapshot);
                if let Some(url) = out.fetch_art {
                    spawn_art_fetch(art.clone(), url, art_tx.clone());
                }
                deliver(&mut presenter, out.action).await;
            }
            Some((url, result)) = art_rx.recv() => match result {
                Ok(bytes) => {
                    debug!(url = %url, bytes = bytes.len(), "cover art loaded");
                    let action = engine.art_loaded(&url, bytes);
                    deliver(&mut presenter, action).await;
                }
                Err(err) => {
                    warn!(error=%err, url = %url, "cover art unavailable; showing notification without it");
                    engine.art_failed(&url);
                }
            }
        }
    }

    if engine.is_foreground() {
        deliver(&mut presenter, NotifyAction::Dismiss).await;
    }
    info!("notification presenter stopped");
}

fn spawn_art_fetch(art: Arc<dyn ArtSource>, url: String, tx: mpsc::UnboundedSender<ArtResult>) {
    tokio::spawn(async move {
        let result = art.fetch(&url).await;
        let _ = tx.send((url, result));
    });
}

async fn deliver<P: Presenter>(presenter: &mut P, action: NotifyAction) {
    let result = match &action {
        NotifyAction::Start(view) => presenter.start(view).await,
        NotifyAction::Update(view) => presenter.update(view).await,
        NotifyAction::Dismiss => presenter.dismiss().await,
        NotifyAction::None => return,
    };
    if let Err(err) = result {
        warn!(error=%err, "notification update failed");
    }
}

#[cfg(test)]
mod tests {
    use super::{run_presenter, ConsolePresenter, Presenter};
    use crate::art::ArtSource;
    use crate::{NotificationView, PlayPauseIcon};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use echoplay_core::{QueueMode, Track};
    use echoplay_engine::{PlayerState, Snapshot};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{mpsc, watch};
    use tokio::time::timeout;

    #[derive(Debug)]
    enum Seen {
        Start(NotificationView),
        Update(NotificationView),
        Dismiss,
    }

    struct Recorder(mpsc::UnboundedSender<Seen>);

    #[async_trait]
    impl Presenter for Recorder {
        async fn start(&mut self, view: &NotificationView) -> Result<()> {
            let _ = self.0.send(Seen::Start(view.clone()));
            Ok(())
        }

        async fn update(&mut self, view: &NotificationView) -> Result<()> {
            let _ = self.0.send(Seen::Update(view.clone()));
            Ok(())
        }

        async fn dismiss(&mut self) -> Result<()> {
            let _ = self.0.send(Seen::Dismiss);
            Ok(())
        }
    }

    struct FixedArt;

    #[async_trait]
    impl ArtSource for FixedArt {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            if url.ends_with("missing.jpg") {
                Err(anyhow!("404"))
            } else {
                Ok(vec![0xFF, 0xD8, 0xFF])
            }
        }
    }

    fn playing(id: i64, cover: &str) -> Snapshot {
        Snapshot {
            track: Some(Track {
                id,
                title: format!("Song {id}"),
                artist: "Artist".to_string(),
                cover_url: cover.to_string(),
                audio_url: format!("https://cdn.example/{id}.mp3"),
            }),
            state: PlayerState::Playing,
            is_playing: true,
            mode: Some(QueueMode::LinearPlaylist),
            queue_len: 2,
            cursor: Some(0),
            ..Snapshot::idle()
        }
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("presenter went quiet")
            .expect("presenter dropped")
    }

    #[tokio::test]
    async fn starts_then_adds_art_then_dismisses() {
        let (snap_tx, snap_rx) = watch::channel(Snapshot::idle());
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            run_presenter(snap_rx, Recorder(seen_tx), Arc::new(FixedArt), "Echo Play").await
        });

        snap_tx.send(playing(1, "https://cdn.example/1.jpg")).unwrap();
        match next(&mut seen_rx).await {
            Seen::Start(view) => {
                assert_eq!(view.title, "Song 1");
                assert!(view.art.is_none());
                assert!(view.transport_enabled);
            }
            other => panic!("expected start, got {other:?}"),
        }
        match next(&mut seen_rx).await {
            Seen::Update(view) => {
                assert_eq!(view.art_url.as_deref(), Some("https://cdn.example/1.jpg"));
            }
            other => panic!("expected art update, got {other:?}"),
        }

        snap_tx.send(Snapshot::idle()).unwrap();
        assert!(matches!(next(&mut seen_rx).await, Seen::Dismiss));

        drop(snap_tx);
        timeout(Duration::from_secs(2), task)
            .await
            .expect("presenter did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn missing_art_keeps_notification_text() {
        let (snap_tx, snap_rx) = watch::channel(Snapshot::idle());
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            run_presenter(snap_rx, Recorder(seen_tx), Arc::new(FixedArt), "Echo Play").await
        });

        snap_tx
            .send(playing(4, "https://cdn.example/missing.jpg"))
            .unwrap();
        assert!(matches!(next(&mut seen_rx).await, Seen::Start(_)));

        let mut paused = playing(4, "https://cdn.example/missing.jpg");
        paused.is_playing = false;
        paused.state = PlayerState::Paused;
        snap_tx.send(paused).unwrap();
        match next(&mut seen_rx).await {
            Seen::Update(view) => {
                assert_eq!(view.icon, PlayPauseIcon::Play);
                assert!(view.art_url.is_none());
            }
            other => panic!("expected update, got {other:?}"),
        }

        drop(snap_tx);
        timeout(Duration::from_secs(2), task)
            .await
            .expect("presenter did not stop")
            .unwrap();
        assert!(matches!(next(&mut seen_rx).await, Seen::Dismiss));
    }

    #[tokio::test]
    async fn attaching_mid_song_still_loads_its_cover() {
        let (snap_tx, snap_rx) = watch::channel(playing(2, "https://cdn.example/2.jpg"));
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            run_presenter(snap_rx, Recorder(seen_tx), Arc::new(FixedArt), "Echo Play").await
        });

        assert!(matches!(next(&mut seen_rx).await, Seen::Start(_)));
        match next(&mut seen_rx).await {
            Seen::Update(view) => {
                assert_eq!(view.art_url.as_deref(), Some("https://cdn.example/2.jpg"));
                assert_eq!(view.art.map(|a| a.len()), Some(3));
            }
            other => panic!("expected art update, got {other:?}"),
        }

        drop(snap_tx);
        timeout(Duration::from_secs(2), task)
            .await
            .expect("presenter did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn console_presenter_writes_json_lines() {
        let mut presenter = ConsolePresenter::new(Vec::new());
        let view = NotificationView {
            title: "Song 1".to_string(),
            subtitle: "Artist".to_string(),
            is_playing: true,
            ongoing: true,
            icon: PlayPauseIcon::Pause,
            transport_enabled: false,
            art_url: None,
            art: None,
        };
        presenter.start(&view).await.unwrap();
        presenter.dismiss().await.unwrap();

        let out = String::from_utf8(presenter.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["cmd"], "START_FOREGROUND");
        assert_eq!(lines[0]["view"]["title"], "Song 1");
        assert_eq!(lines[0]["view"]["icon"], "pause");
        assert_eq!(lines[1]["cmd"], "STOP_FOREGROUND");
    }
}
